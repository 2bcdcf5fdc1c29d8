use crate::problems::{ClassRef, ProblemKind};
use crate::repository::ClassRepository;
use crate::runtime;
use jarlink_classfile::{ClassFile, ClassSymbol, FieldSymbol, MemberInfo, MethodSymbol, Symbol};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::warn;

/// Methods every class inherits from `java.lang.Object`. The runtime is
/// not on the classpath, so the walk consults this table when it reaches
/// the root of the hierarchy.
const OBJECT_METHODS: &[(&str, &str)] = &[
    ("<init>", "()V"),
    ("clone", "()Ljava/lang/Object;"),
    ("equals", "(Ljava/lang/Object;)Z"),
    ("finalize", "()V"),
    ("getClass", "()Ljava/lang/Class;"),
    ("hashCode", "()I"),
    ("notify", "()V"),
    ("notifyAll", "()V"),
    ("toString", "()Ljava/lang/String;"),
    ("wait", "()V"),
    ("wait", "(J)V"),
    ("wait", "(JI)V"),
];

fn object_declares(name: &str, descriptor: &str) -> bool {
    OBJECT_METHODS
        .iter()
        .any(|(method, desc)| *method == name && *desc == descriptor)
}

/// A reference that failed to resolve, before cause attribution.
#[derive(Debug)]
pub(crate) struct Unresolved {
    pub kind: ProblemKind,
    /// The symbol to report, which may differ from the referenced one
    /// (a member reference against a missing class reports the class).
    pub symbol: Symbol,
    pub target: Option<ClassRef>,
}

#[derive(Debug)]
pub(crate) enum Outcome {
    Resolved,
    Unresolved(Unresolved),
    /// The hierarchy was malformed (for example cyclic); logged and not
    /// reported as a linkage problem.
    Skipped,
}

/// The class a reference originates from.
pub(crate) struct SourceContext {
    pub class_file: Arc<ClassFile>,
    pub class_ref: ClassRef,
}

enum MemberSearch {
    Found {
        holder: Arc<ClassFile>,
        holder_ref: ClassRef,
        member: MemberInfo,
    },
    FoundOnObject,
    NotFound {
        /// The walk crossed into the runtime or a missing class, so absence
        /// is not conclusive.
        inconclusive: bool,
    },
    Malformed,
}

/// Applies JVM linkage rules against a [`ClassRepository`].
pub(crate) struct LinkageResolver<'a> {
    repository: &'a ClassRepository,
}

impl<'a> LinkageResolver<'a> {
    pub fn new(repository: &'a ClassRepository) -> Self {
        Self { repository }
    }

    pub fn resolve(&self, symbol: &Symbol, source: &SourceContext) -> Outcome {
        match symbol {
            Symbol::Class(class_symbol) => self.resolve_class(class_symbol, source),
            Symbol::Method(method_symbol) => self.resolve_method(method_symbol, source),
            Symbol::Field(field_symbol) => self.resolve_field(field_symbol, source),
        }
    }

    fn resolve_class(&self, symbol: &ClassSymbol, source: &SourceContext) -> Outcome {
        let name = symbol.binary_name.as_str();
        if runtime::is_runtime_class(name) {
            return Outcome::Resolved;
        }

        let Some((class_file, entry)) = self.repository.find_class(name) else {
            return Outcome::Unresolved(Unresolved {
                kind: ProblemKind::ClassNotFound,
                symbol: Symbol::Class(symbol.clone()),
                target: None,
            });
        };

        let target = ClassRef::new(name, entry.clone());
        if self.class_accessible(&class_file, source) {
            Outcome::Resolved
        } else {
            Outcome::Unresolved(Unresolved {
                kind: ProblemKind::Inaccessible,
                symbol: Symbol::Class(symbol.clone()),
                target: Some(target),
            })
        }
    }

    fn resolve_method(&self, symbol: &MethodSymbol, source: &SourceContext) -> Outcome {
        let owner_name = symbol.owner.as_str();
        if runtime::is_runtime_class(owner_name) {
            return Outcome::Resolved;
        }

        let Some((owner, owner_entry)) = self.repository.find_class(owner_name) else {
            return Outcome::Unresolved(Unresolved {
                kind: ProblemKind::ClassNotFound,
                symbol: Symbol::Class(ClassSymbol::new(owner_name)),
                target: None,
            });
        };
        let owner_ref = ClassRef::new(owner_name, owner_entry.clone());

        if !self.class_accessible(&owner, source) {
            return Outcome::Unresolved(Unresolved {
                kind: ProblemKind::Inaccessible,
                symbol: Symbol::Class(ClassSymbol::new(owner_name)),
                target: Some(owner_ref),
            });
        }

        // An interface-method reference must name an interface and vice
        // versa; a mismatch is an incompatible change of the owner.
        if symbol.interface != owner.is_interface() {
            return Outcome::Unresolved(Unresolved {
                kind: ProblemKind::IncompatibleClassChange,
                symbol: Symbol::Method(symbol.clone()),
                target: Some(owner_ref),
            });
        }

        let search = if symbol.interface {
            self.search_interface_method(&owner, &symbol.name, &symbol.descriptor)
        } else {
            self.search_class_member(&owner, &symbol.name, &symbol.descriptor, true)
        };

        match search {
            MemberSearch::Found { holder, holder_ref, member } => {
                if !self.member_accessible(&member, &holder, source) {
                    return Outcome::Unresolved(Unresolved {
                        kind: ProblemKind::Inaccessible,
                        symbol: Symbol::Method(symbol.clone()),
                        target: Some(holder_ref),
                    });
                }
                // A concrete owner with only an abstract declaration in its
                // hierarchy throws AbstractMethodError when invoked.
                if member.is_abstract() && !owner.is_interface() && !owner.is_abstract() {
                    return Outcome::Unresolved(Unresolved {
                        kind: ProblemKind::AbstractMethodUnimplemented,
                        symbol: Symbol::Method(symbol.clone()),
                        target: Some(owner_ref),
                    });
                }
                Outcome::Resolved
            }
            MemberSearch::FoundOnObject => Outcome::Resolved,
            MemberSearch::NotFound { inconclusive: true } => Outcome::Resolved,
            MemberSearch::NotFound { inconclusive: false } => {
                Outcome::Unresolved(Unresolved {
                    kind: ProblemKind::SymbolNotFound,
                    symbol: Symbol::Method(symbol.clone()),
                    target: Some(owner_ref),
                })
            }
            MemberSearch::Malformed => Outcome::Skipped,
        }
    }

    fn resolve_field(&self, symbol: &FieldSymbol, source: &SourceContext) -> Outcome {
        let owner_name = symbol.owner.as_str();
        if runtime::is_runtime_class(owner_name) {
            return Outcome::Resolved;
        }

        let Some((owner, owner_entry)) = self.repository.find_class(owner_name) else {
            return Outcome::Unresolved(Unresolved {
                kind: ProblemKind::ClassNotFound,
                symbol: Symbol::Class(ClassSymbol::new(owner_name)),
                target: None,
            });
        };
        let owner_ref = ClassRef::new(owner_name, owner_entry.clone());

        if !self.class_accessible(&owner, source) {
            return Outcome::Unresolved(Unresolved {
                kind: ProblemKind::Inaccessible,
                symbol: Symbol::Class(ClassSymbol::new(owner_name)),
                target: Some(owner_ref),
            });
        }

        match self.search_class_member(&owner, &symbol.name, &symbol.descriptor, false) {
            MemberSearch::Found { holder, holder_ref, member } => {
                if self.member_accessible(&member, &holder, source) {
                    Outcome::Resolved
                } else {
                    Outcome::Unresolved(Unresolved {
                        kind: ProblemKind::Inaccessible,
                        symbol: Symbol::Field(symbol.clone()),
                        target: Some(holder_ref),
                    })
                }
            }
            MemberSearch::FoundOnObject => Outcome::Resolved,
            MemberSearch::NotFound { inconclusive: true } => Outcome::Resolved,
            MemberSearch::NotFound { inconclusive: false } => {
                Outcome::Unresolved(Unresolved {
                    kind: ProblemKind::SymbolNotFound,
                    symbol: Symbol::Field(symbol.clone()),
                    target: Some(owner_ref),
                })
            }
            MemberSearch::Malformed => Outcome::Skipped,
        }
    }

    /// Superclass chain first, then the interfaces of every class on that
    /// chain in breadth-first order. `methods` selects the member table.
    fn search_class_member(
        &self,
        owner: &Arc<ClassFile>,
        name: &str,
        descriptor: &str,
        methods: bool,
    ) -> MemberSearch {
        let mut visited: HashSet<String> = HashSet::new();
        let mut interface_queue: VecDeque<String> = VecDeque::new();
        let mut inconclusive = false;
        let mut reached_object = false;

        let mut current = Some(owner.clone());
        while let Some(class_file) = current {
            if !visited.insert(class_file.binary_name.clone()) {
                warn!(class = %class_file.binary_name, "cycle in superclass chain");
                return MemberSearch::Malformed;
            }

            if let Some(member) = find_member(&class_file, name, descriptor, methods) {
                let holder_ref = self.class_ref_of(&class_file);
                return MemberSearch::Found {
                    member,
                    holder: class_file.clone(),
                    holder_ref,
                };
            }
            interface_queue.extend(class_file.interfaces.iter().cloned());

            current = match class_file.super_name.as_deref() {
                None => None,
                Some("java/lang/Object") => {
                    reached_object = true;
                    None
                }
                Some(super_name) if runtime::is_runtime_class(super_name) => {
                    // The rest of the chain lives in the runtime; absence
                    // below this point proves nothing.
                    inconclusive = true;
                    None
                }
                Some(super_name) => match self.repository.find_class(super_name) {
                    Some((super_class, _)) => Some(super_class),
                    None => {
                        inconclusive = true;
                        None
                    }
                },
            };
        }

        match self.search_interfaces(&mut interface_queue, &mut visited, name, descriptor, methods)
        {
            InterfaceSearch::Found(found) => return found,
            InterfaceSearch::Inconclusive => inconclusive = true,
            InterfaceSearch::NotFound => {}
        }

        if methods && reached_object && object_declares(name, descriptor) {
            return MemberSearch::FoundOnObject;
        }

        MemberSearch::NotFound { inconclusive }
    }

    /// Interface reference lookup: the owner interface, its superinterfaces
    /// breadth-first, then `java.lang.Object`.
    fn search_interface_method(
        &self,
        owner: &Arc<ClassFile>,
        name: &str,
        descriptor: &str,
    ) -> MemberSearch {
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(owner.binary_name.clone());

        if let Some(member) = find_member(owner, name, descriptor, true) {
            let holder_ref = self.class_ref_of(owner);
            return MemberSearch::Found {
                member,
                holder: owner.clone(),
                holder_ref,
            };
        }

        let mut queue: VecDeque<String> = owner.interfaces.iter().cloned().collect();
        let mut inconclusive = false;
        match self.search_interfaces(&mut queue, &mut visited, name, descriptor, true) {
            InterfaceSearch::Found(found) => return found,
            InterfaceSearch::Inconclusive => inconclusive = true,
            InterfaceSearch::NotFound => {}
        }

        if object_declares(name, descriptor) {
            return MemberSearch::FoundOnObject;
        }

        MemberSearch::NotFound { inconclusive }
    }

    fn search_interfaces(
        &self,
        queue: &mut VecDeque<String>,
        visited: &mut HashSet<String>,
        name: &str,
        descriptor: &str,
        methods: bool,
    ) -> InterfaceSearch {
        let mut inconclusive = false;

        while let Some(interface_name) = queue.pop_front() {
            if !visited.insert(interface_name.clone()) {
                continue;
            }
            if runtime::is_runtime_class(&interface_name) {
                inconclusive = true;
                continue;
            }
            let Some((interface, _)) = self.repository.find_class(&interface_name) else {
                inconclusive = true;
                continue;
            };

            if let Some(member) = find_member(&interface, name, descriptor, methods) {
                let holder_ref = self.class_ref_of(&interface);
                return InterfaceSearch::Found(MemberSearch::Found {
                    member,
                    holder: interface.clone(),
                    holder_ref,
                });
            }
            queue.extend(interface.interfaces.iter().cloned());
        }

        if inconclusive {
            InterfaceSearch::Inconclusive
        } else {
            InterfaceSearch::NotFound
        }
    }

    fn class_ref_of(&self, class_file: &ClassFile) -> ClassRef {
        // The holder was loaded through the repository, so this cannot
        // miss outside of cache races.
        match self.repository.find_class(&class_file.binary_name) {
            Some((_, entry)) => ClassRef::new(class_file.binary_name.clone(), entry.clone()),
            None => ClassRef::new(
                class_file.binary_name.clone(),
                self.repository.entries()[0].clone(),
            ),
        }
    }

    /// JVM class accessibility: public everywhere, otherwise same package.
    fn class_accessible(&self, target: &ClassFile, source: &SourceContext) -> bool {
        target.is_public() || target.package() == source.class_file.package()
    }

    /// JVM member accessibility from the source class.
    fn member_accessible(
        &self,
        member: &MemberInfo,
        holder: &ClassFile,
        source: &SourceContext,
    ) -> bool {
        let source_class = &source.class_file;
        if member.is_public() {
            return true;
        }
        if member.is_private() {
            // Nestmates: inner and outer classes of one top-level class
            // share private members.
            return top_level_of(&holder.binary_name) == top_level_of(&source_class.binary_name);
        }
        let same_package = holder.package() == source_class.package();
        if member.is_protected() {
            return same_package || self.is_subclass_of(source_class, &holder.binary_name);
        }
        same_package
    }

    fn is_subclass_of(&self, class_file: &ClassFile, ancestor: &str) -> bool {
        let mut visited: HashSet<String> = HashSet::new();
        let mut current = class_file.super_name.clone();
        while let Some(name) = current {
            if name == ancestor {
                return true;
            }
            if !visited.insert(name.clone()) {
                return false;
            }
            if runtime::is_runtime_class(&name) {
                return false;
            }
            current = match self.repository.find_class(&name) {
                Some((super_class, _)) => super_class.super_name.clone(),
                None => None,
            };
        }
        false
    }
}

enum InterfaceSearch {
    Found(MemberSearch),
    NotFound,
    Inconclusive,
}

fn find_member(
    class_file: &ClassFile,
    name: &str,
    descriptor: &str,
    methods: bool,
) -> Option<MemberInfo> {
    if methods {
        class_file.find_method(name, descriptor).cloned()
    } else {
        class_file.find_field(name, descriptor).cloned()
    }
}

fn top_level_of(binary_name: &str) -> &str {
    binary_name.split('$').next().unwrap_or(binary_name)
}
