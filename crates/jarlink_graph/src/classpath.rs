use crate::resolver::{DependencyGraph, DependencySource};
use indexmap::IndexMap;
use jarlink_model::{Artifact, DependencyPath, ExclusionFilter, ModuleKey};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// One archive on the classpath, optionally identified by coordinates.
/// Entries appended from explicit file arguments carry no artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ClassPathEntry {
    pub artifact: Option<Artifact>,
    pub path: PathBuf,
}

impl ClassPathEntry {
    pub fn from_artifact(artifact: Artifact, path: PathBuf) -> Self {
        Self {
            artifact: Some(artifact),
            path,
        }
    }

    pub fn from_file(path: PathBuf) -> Self {
        Self {
            artifact: None,
            path,
        }
    }
}

impl fmt::Display for ClassPathEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.artifact {
            Some(artifact) => artifact.fmt(f),
            None => f.write_str(&self.path.display().to_string()),
        }
    }
}

/// A version that lost nearest-wins selection for its module key. The
/// candidate's archive is located eagerly so blame attribution can inspect
/// it without a dependency source at hand.
#[derive(Debug, Clone)]
pub struct UnselectedAlternative {
    pub module_key: ModuleKey,
    pub selected: Artifact,
    pub selected_path: DependencyPath,
    pub candidate: Artifact,
    pub candidate_path: DependencyPath,
    pub candidate_archive: Option<PathBuf>,
}

/// A graph artifact whose archive could not be located on disk.
#[derive(Debug, Clone)]
pub struct MissingArchive {
    pub artifact: Artifact,
    pub path: DependencyPath,
}

/// An excluded dependency, with its archive located for later inspection.
#[derive(Debug, Clone)]
pub struct Suppression {
    pub artifact: Artifact,
    pub path: DependencyPath,
    pub filter: ExclusionFilter,
    pub archive: Option<PathBuf>,
}

/// The ordered classpath plus everything the cause attributor needs to
/// assign blame: selected paths per module key, unselected alternatives,
/// archives that were missing, and exclusion suppressions.
#[derive(Debug, Clone, Default)]
pub struct ClassPathResult {
    entries: Vec<ClassPathEntry>,
    selected_paths: IndexMap<ModuleKey, DependencyPath>,
    alternatives: IndexMap<ModuleKey, Vec<UnselectedAlternative>>,
    missing: Vec<MissingArchive>,
    suppressions: Vec<Suppression>,
}

impl ClassPathResult {
    pub fn entries(&self) -> &[ClassPathEntry] {
        &self.entries
    }

    pub fn selected_path(&self, key: &ModuleKey) -> Option<&DependencyPath> {
        self.selected_paths.get(key)
    }

    pub fn alternatives(&self, key: &ModuleKey) -> &[UnselectedAlternative] {
        self.alternatives
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn all_alternatives(&self) -> impl Iterator<Item = &UnselectedAlternative> {
        self.alternatives.values().flatten()
    }

    pub fn missing(&self) -> &[MissingArchive] {
        &self.missing
    }

    pub fn suppressions(&self) -> &[Suppression] {
        &self.suppressions
    }

    /// The dependency-path listing for a set of problematic entries, one
    /// block per entry in classpath order.
    pub fn format_dependency_paths<'a>(
        &self,
        entries: impl IntoIterator<Item = &'a ClassPathEntry>,
    ) -> String {
        let mut output = String::new();
        for entry in entries {
            let Some(artifact) = &entry.artifact else {
                continue;
            };
            if let Some(path) = self.selected_path(&artifact.module_key()) {
                output.push_str(&format!("{} is at:\n  {}\n", artifact, path));
            }
        }
        output
    }
}

/// Reduces a dependency graph to an ordered classpath under module-key
/// deduplication, first entry wins.
pub struct ClassPathBuilder;

impl ClassPathBuilder {
    pub fn build(
        graph: &DependencyGraph,
        source: &dyn DependencySource,
        extra_archives: &[PathBuf],
    ) -> ClassPathResult {
        let mut result = ClassPathResult::default();
        let mut selected: IndexMap<ModuleKey, Artifact> = IndexMap::new();

        for node in &graph.nodes {
            let key = node.artifact.module_key();
            if let Some(selected_artifact) = selected.get(&key) {
                let selected_path = result.selected_paths[&key].clone();
                result
                    .alternatives
                    .entry(key.clone())
                    .or_default()
                    .push(UnselectedAlternative {
                        module_key: key,
                        selected: selected_artifact.clone(),
                        selected_path,
                        candidate: node.artifact.clone(),
                        candidate_path: node.path.clone(),
                        candidate_archive: source.locate(&node.artifact),
                    });
                continue;
            }

            match source.locate(&node.artifact) {
                Some(archive) => {
                    result
                        .entries
                        .push(ClassPathEntry::from_artifact(node.artifact.clone(), archive));
                    result
                        .selected_paths
                        .insert(key.clone(), node.path.clone());
                    selected.insert(key, node.artifact.clone());
                }
                None => {
                    result.missing.push(MissingArchive {
                        artifact: node.artifact.clone(),
                        path: node.path.clone(),
                    });
                }
            }
        }

        for suppressed in &graph.suppressed {
            result.suppressions.push(Suppression {
                artifact: suppressed.artifact.clone(),
                path: suppressed.path.clone(),
                filter: suppressed.filter.clone(),
                archive: source.locate(&suppressed.artifact),
            });
        }

        for path in extra_archives {
            result.entries.push(ClassPathEntry::from_file(path.clone()));
        }

        result
    }
}
