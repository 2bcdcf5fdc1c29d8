use crate::class_file::ClassFile;
use crate::constant_pool::Constant;
use crate::descriptor::{element_class_name, validate_field_descriptor, validate_method_descriptor};
use crate::reader::ClassFileError;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A referenced class.
///
/// `via_super` marks the reference that came from the source's super-class
/// declaration. It participates in equality during extraction and is
/// stripped when a linkage problem is materialised, so problems that differ
/// only in reference site merge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassSymbol {
    pub binary_name: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub via_super: bool,
}

impl ClassSymbol {
    pub fn new(binary_name: impl Into<String>) -> Self {
        Self {
            binary_name: binary_name.into(),
            via_super: false,
        }
    }

    pub fn via_super(binary_name: impl Into<String>) -> Self {
        Self {
            binary_name: binary_name.into(),
            via_super: true,
        }
    }

    /// The same symbol without the super-declaration marker.
    pub fn demoted(&self) -> Self {
        Self::new(self.binary_name.clone())
    }
}

impl fmt::Display for ClassSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.binary_name.replace('/', "."))
    }
}

/// A referenced method, including whether the call site used an
/// interface-method reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodSymbol {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    pub interface: bool,
}

impl MethodSymbol {
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
        interface: bool,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
            interface,
        }
    }
}

impl fmt::Display for MethodSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}'s method \"{}{}\"",
            self.owner.replace('/', "."),
            self.name,
            self.descriptor
        )
    }
}

/// A referenced field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldSymbol {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

impl FieldSymbol {
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }
}

impl fmt::Display for FieldSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}'s field \"{}\"",
            self.owner.replace('/', "."),
            self.name
        )
    }
}

/// Any outbound symbolic reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Symbol {
    Class(ClassSymbol),
    Method(MethodSymbol),
    Field(FieldSymbol),
}

impl Symbol {
    /// The internal name of the class expected to provide the symbol.
    pub fn owner(&self) -> &str {
        match self {
            Symbol::Class(symbol) => &symbol.binary_name,
            Symbol::Method(symbol) => &symbol.owner,
            Symbol::Field(symbol) => &symbol.owner,
        }
    }

    /// Collapses a super-class reference to an ordinary class reference.
    pub fn demoted(&self) -> Symbol {
        match self {
            Symbol::Class(symbol) if symbol.via_super => Symbol::Class(symbol.demoted()),
            other => other.clone(),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Class(symbol) => symbol.fmt(f),
            Symbol::Method(symbol) => symbol.fmt(f),
            Symbol::Field(symbol) => symbol.fmt(f),
        }
    }
}

/// The outbound references of one class file, partitioned by kind and
/// deduplicated in pool-emission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolReferences {
    pub classes: IndexSet<ClassSymbol>,
    pub methods: IndexSet<MethodSymbol>,
    pub fields: IndexSet<FieldSymbol>,
}

impl SymbolReferences {
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.methods.is_empty() && self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.classes.len() + self.methods.len() + self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.classes
            .iter()
            .cloned()
            .map(Symbol::Class)
            .chain(self.methods.iter().cloned().map(Symbol::Method))
            .chain(self.fields.iter().cloned().map(Symbol::Field))
    }
}

/// Enumerates every outbound reference of `class_file`.
///
/// Self references are dropped, array owners are unwrapped to their element
/// classes (primitive arrays are discarded entirely), and member descriptors
/// are validated against the descriptor grammar. Extraction is pure; running
/// it twice yields equal sets.
pub fn extract_references(class_file: &ClassFile) -> Result<SymbolReferences, ClassFileError> {
    let pool = class_file.constant_pool();
    let mut references = SymbolReferences::default();

    for constant in pool.entries() {
        match constant {
            Constant::Class { name_index } => {
                let pool_name = pool.utf8(*name_index)?;
                let Some(name) = element_class_name(pool_name) else {
                    continue;
                };
                if name == class_file.binary_name {
                    continue;
                }
                let via_super = class_file.super_name.as_deref() == Some(name.as_str());
                references.classes.insert(ClassSymbol {
                    binary_name: name,
                    via_super,
                });
            }
            Constant::MethodRef {
                class_index,
                name_and_type_index,
            } => {
                let owner = pool.class_name(*class_index)?;
                if owner.starts_with('[') {
                    // Array pseudo-methods (clone and the Object set) always
                    // bind against the runtime.
                    continue;
                }
                let (name, descriptor) = pool.name_and_type(*name_and_type_index)?;
                validate_method_descriptor(descriptor)?;
                references
                    .methods
                    .insert(MethodSymbol::new(owner, name, descriptor, false));
            }
            Constant::InterfaceMethodRef {
                class_index,
                name_and_type_index,
            } => {
                let owner = pool.class_name(*class_index)?;
                if owner.starts_with('[') {
                    continue;
                }
                let (name, descriptor) = pool.name_and_type(*name_and_type_index)?;
                validate_method_descriptor(descriptor)?;
                references
                    .methods
                    .insert(MethodSymbol::new(owner, name, descriptor, true));
            }
            Constant::FieldRef {
                class_index,
                name_and_type_index,
            } => {
                let owner = pool.class_name(*class_index)?;
                if owner.starts_with('[') {
                    continue;
                }
                let (name, descriptor) = pool.name_and_type(*name_and_type_index)?;
                validate_field_descriptor(descriptor)?;
                references
                    .fields
                    .insert(FieldSymbol::new(owner, name, descriptor));
            }
            _ => {}
        }
    }

    // An inner class depends on its enclosing class even when no pool entry
    // references it directly.
    for entry in &class_file.inner_classes {
        if entry.inner.as_deref() == Some(class_file.binary_name.as_str()) {
            if let Some(outer) = &entry.outer {
                if outer != &class_file.binary_name {
                    references.classes.insert(ClassSymbol::new(outer.clone()));
                }
            }
        }
    }

    Ok(references)
}
