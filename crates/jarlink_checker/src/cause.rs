use crate::problems::{Cause, LinkageProblem, ProblemKind};
use crate::repository::ClassRepository;
use jarlink_classfile::{parse_class, ClassFile, Symbol};
use jarlink_graph::ClassPathResult;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::ZipArchive;

/// Explains unresolved problems from the classpath builder's records:
/// version conflicts, exclusions, and missing archives. Attribution is
/// best-effort; anything it cannot pin down stays [`Cause::Unknown`].
pub(crate) struct CauseAttributor<'a> {
    classpath: &'a ClassPathResult,
    repository: &'a ClassRepository,
    /// Class-name listings of archives outside the classpath (losing
    /// versions, excluded artifacts), read lazily at most once each.
    listings: RefCell<HashMap<PathBuf, Option<HashSet<String>>>>,
}

impl<'a> CauseAttributor<'a> {
    pub fn new(classpath: &'a ClassPathResult, repository: &'a ClassRepository) -> Self {
        Self {
            classpath,
            repository,
            listings: RefCell::new(HashMap::new()),
        }
    }

    pub fn attribute(&self, problem: &LinkageProblem) -> Cause {
        match problem.kind() {
            ProblemKind::ClassNotFound => self.attribute_missing_class(problem),
            ProblemKind::SymbolNotFound | ProblemKind::AbstractMethodUnimplemented => {
                self.attribute_missing_symbol(problem)
            }
            ProblemKind::Inaccessible | ProblemKind::IncompatibleClassChange => Cause::Unknown,
        }
    }

    /// The owner class exists nowhere on the classpath. Blame an excluded
    /// artifact or an unselected version that ships it, else a missing
    /// archive reachable from the source's path.
    fn attribute_missing_class(&self, problem: &LinkageProblem) -> Cause {
        let owner = problem.symbol().owner();

        for suppression in self.classpath.suppressions() {
            let Some(archive) = &suppression.archive else {
                continue;
            };
            if self.archive_contains(archive, owner) {
                return Cause::ExcludedArtifact {
                    filter: suppression.filter.clone(),
                    path: suppression.path.clone(),
                };
            }
        }

        for alternative in self.classpath.all_alternatives() {
            let Some(archive) = &alternative.candidate_archive else {
                continue;
            };
            if self.archive_contains(archive, owner) {
                return Cause::DependencyConflict {
                    selected: alternative.selected.clone(),
                    selected_path: alternative.selected_path.clone(),
                    unselected: alternative.candidate.clone(),
                    unselected_path: alternative.candidate_path.clone(),
                };
            }
        }

        // Without the archive on disk the contents cannot be checked; a
        // missing artifact that shares a module with the source's own path
        // is the most plausible supplier.
        if let Some(source_artifact) = &problem.source().entry.artifact {
            if let Some(source_path) = self.classpath.selected_path(&source_artifact.module_key())
            {
                for missing in self.classpath.missing() {
                    let through_source = source_path
                        .segments()
                        .iter()
                        .any(|segment| missing.path.passes_through(&segment.artifact.module_key()));
                    if through_source {
                        return Cause::MissingArtifact {
                            artifact: missing.artifact.clone(),
                            path: missing.path.clone(),
                        };
                    }
                }
            }
        }
        if let [only] = self.classpath.missing() {
            return Cause::MissingArtifact {
                artifact: only.artifact.clone(),
                path: only.path.clone(),
            };
        }

        Cause::Unknown
    }

    /// The owner class exists but lacks the symbol. Blame a version of the
    /// same module, or a shadowed definition of the class, that declares
    /// it.
    fn attribute_missing_symbol(&self, problem: &LinkageProblem) -> Cause {
        let Some(target) = problem.target() else {
            return Cause::Unknown;
        };
        let symbol = problem.symbol();

        if let Some(selected_artifact) = &target.entry.artifact {
            let key = selected_artifact.module_key();
            for alternative in self.classpath.alternatives(&key) {
                let Some(archive) = &alternative.candidate_archive else {
                    continue;
                };
                if self.archive_declares(archive, symbol) {
                    return Cause::DependencyConflict {
                        selected: alternative.selected.clone(),
                        selected_path: alternative.selected_path.clone(),
                        unselected: alternative.candidate.clone(),
                        unselected_path: alternative.candidate_path.clone(),
                    };
                }
            }
        }

        // Same class name provided by a different selected module further
        // down the classpath.
        let shadows = self.repository.find_shadows(symbol.owner());
        for (class_file, entry) in shadows.iter().skip(1) {
            if !declares(class_file, symbol) {
                continue;
            }
            let (Some(selected), Some(shadow_artifact)) =
                (&target.entry.artifact, &entry.artifact)
            else {
                continue;
            };
            let (Some(selected_path), Some(shadow_path)) = (
                self.classpath.selected_path(&selected.module_key()),
                self.classpath.selected_path(&shadow_artifact.module_key()),
            ) else {
                continue;
            };
            return Cause::DependencyConflict {
                selected: selected.clone(),
                selected_path: selected_path.clone(),
                unselected: shadow_artifact.clone(),
                unselected_path: shadow_path.clone(),
            };
        }

        Cause::Unknown
    }

    fn archive_contains(&self, archive: &Path, binary_name: &str) -> bool {
        let mut listings = self.listings.borrow_mut();
        let listing = listings
            .entry(archive.to_path_buf())
            .or_insert_with(|| list_classes(archive));
        match listing {
            Some(names) => names.contains(binary_name),
            None => false,
        }
    }

    fn archive_declares(&self, archive: &Path, symbol: &Symbol) -> bool {
        if !self.archive_contains(archive, symbol.owner()) {
            return false;
        }
        match read_class(archive, symbol.owner()) {
            Some(class_file) => declares(&class_file, symbol),
            None => false,
        }
    }
}

/// Whether a class file declares the symbol at any accessibility.
fn declares(class_file: &ClassFile, symbol: &Symbol) -> bool {
    match symbol {
        Symbol::Class(_) => true,
        Symbol::Method(method) => class_file
            .find_method(&method.name, &method.descriptor)
            .is_some(),
        Symbol::Field(field) => class_file
            .find_field(&field.name, &field.descriptor)
            .is_some(),
    }
}

fn list_classes(archive: &Path) -> Option<HashSet<String>> {
    let file = File::open(archive)
        .map_err(|error| debug!(archive = %archive.display(), error = %error, "cannot open archive for attribution"))
        .ok()?;
    let zip = ZipArchive::new(BufReader::new(file))
        .map_err(|error| debug!(archive = %archive.display(), error = %error, "cannot read archive for attribution"))
        .ok()?;
    Some(
        zip.file_names()
            .filter_map(|name| name.strip_suffix(".class"))
            .map(str::to_string)
            .collect(),
    )
}

fn read_class(archive: &Path, binary_name: &str) -> Option<ClassFile> {
    let file = File::open(archive).ok()?;
    let mut zip = ZipArchive::new(BufReader::new(file)).ok()?;
    let mut entry = zip.by_name(&format!("{binary_name}.class")).ok()?;
    let mut bytes = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut bytes).ok()?;
    parse_class(&bytes)
        .map_err(|error| {
            debug!(
                archive = %archive.display(),
                class = %binary_name,
                error = %error,
                "cannot parse class for attribution"
            )
        })
        .ok()
}
