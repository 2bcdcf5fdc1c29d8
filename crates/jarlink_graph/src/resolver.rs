use jarlink_model::{
    Artifact, DependencyPath, DependencyScope, ExclusionFilter, ExclusionRule, ModuleKey,
    PathSegment,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

/// Failures while resolving the dependency graph. Only
/// [`GraphError::ResolutionFailed`] is expected in normal operation; the
/// descriptor variants surface a broken local repository.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("failed to resolve root artifact {artifact}: {reason}")]
    ResolutionFailed { artifact: Artifact, reason: String },
    #[error("artifact {artifact} has no descriptor in the repository")]
    UnknownArtifact { artifact: Artifact },
    #[error("cycle in parent descriptors at {artifact}")]
    ParentCycle { artifact: Artifact },
    #[error("failed to read descriptor for {artifact}")]
    DescriptorIo {
        artifact: Artifact,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to interpret descriptor for {artifact}: {message}")]
    DescriptorParse { artifact: Artifact, message: String },
}

/// A dependency as declared by an artifact's descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredDependency {
    pub artifact: Artifact,
    pub scope: DependencyScope,
    pub optional: bool,
    pub exclusions: Vec<ExclusionFilter>,
}

impl DeclaredDependency {
    pub fn new(artifact: Artifact, scope: DependencyScope) -> Self {
        Self {
            artifact,
            scope,
            optional: false,
            exclusions: Vec::new(),
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn excluding(mut self, filter: ExclusionFilter) -> Self {
        self.exclusions.push(filter);
        self
    }
}

/// Supplier of dependency metadata and archive locations.
///
/// Implementations must present a transitively-closed view: every artifact
/// they name in a [`DeclaredDependency`] can itself be queried. An artifact
/// without a descriptor is reported via [`GraphError::UnknownArtifact`]; the
/// resolver downgrades that to a leaf except for roots.
pub trait DependencySource {
    fn direct_dependencies(
        &self,
        artifact: &Artifact,
    ) -> Result<Vec<DeclaredDependency>, GraphError>;

    /// The on-disk archive for `artifact`, when one exists.
    fn locate(&self, artifact: &Artifact) -> Option<PathBuf>;
}

/// One visited artifact and the path that reached it first.
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub artifact: Artifact,
    pub path: DependencyPath,
}

/// A dependency suppressed by an exclusion, retained for blame.
#[derive(Debug, Clone)]
pub struct SuppressedDependency {
    pub artifact: Artifact,
    /// The path the artifact would have had.
    pub path: DependencyPath,
    pub filter: ExclusionFilter,
}

/// The transitive dependency graph in breadth-first visit order.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    pub nodes: Vec<GraphNode>,
    pub suppressed: Vec<SuppressedDependency>,
}

impl DependencyGraph {
    pub fn artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.nodes.iter().map(|node| &node.artifact)
    }
}

/// Walks a [`DependencySource`] breadth-first from a root set, producing
/// `(artifact, dependency path)` pairs under nearest-wins version pinning.
///
/// The first version seen for a module key is the one whose dependencies
/// are expanded; a later, different version still becomes a node (so the
/// classpath builder can report the conflict) but contributes nothing
/// below itself. Ties between equal-depth candidates fall to source
/// emission order.
pub struct DependencyGraphResolver<'a> {
    source: &'a dyn DependencySource,
    rules: Vec<ExclusionRule>,
    include_optional: bool,
}

struct QueueItem {
    artifact: Artifact,
    path: DependencyPath,
    inherited_exclusions: Vec<ExclusionFilter>,
    is_root: bool,
}

impl<'a> DependencyGraphResolver<'a> {
    pub fn new(source: &'a dyn DependencySource) -> Self {
        Self {
            source,
            rules: Vec::new(),
            include_optional: false,
        }
    }

    pub fn with_exclusion_rules(mut self, rules: Vec<ExclusionRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn include_optional(mut self, include: bool) -> Self {
        self.include_optional = include;
        self
    }

    pub fn resolve(&self, roots: &[Artifact]) -> Result<DependencyGraph, GraphError> {
        let mut graph = DependencyGraph::default();
        let mut visited: HashSet<Artifact> = HashSet::new();
        let mut pinned_versions: HashMap<ModuleKey, String> = HashMap::new();
        let mut queue: VecDeque<QueueItem> = VecDeque::new();

        for root in roots {
            queue.push_back(QueueItem {
                artifact: root.clone(),
                path: DependencyPath::root(root.clone()),
                inherited_exclusions: Vec::new(),
                is_root: true,
            });
        }

        while let Some(item) = queue.pop_front() {
            if !visited.insert(item.artifact.clone()) {
                continue;
            }

            let key = item.artifact.module_key();
            let expand = match pinned_versions.get(&key) {
                Some(pinned) => pinned == &item.artifact.version,
                None => {
                    pinned_versions.insert(key, item.artifact.version.clone());
                    true
                }
            };

            graph.nodes.push(GraphNode {
                artifact: item.artifact.clone(),
                path: item.path.clone(),
            });

            if !expand {
                // Losing version of a nearest-wins race: keep the node for
                // conflict reporting, do not walk below it.
                continue;
            }

            let declared = match self.source.direct_dependencies(&item.artifact) {
                Ok(declared) => declared,
                Err(GraphError::UnknownArtifact { artifact }) if !item.is_root => {
                    warn!(artifact = %artifact, "no descriptor for non-root artifact; treating as leaf");
                    continue;
                }
                Err(GraphError::UnknownArtifact { artifact }) => {
                    return Err(GraphError::ResolutionFailed {
                        reason: "root artifact has no descriptor".to_string(),
                        artifact,
                    });
                }
                Err(error) if item.is_root => {
                    return Err(GraphError::ResolutionFailed {
                        artifact: item.artifact.clone(),
                        reason: error.to_string(),
                    });
                }
                Err(error) => return Err(error),
            };

            for dependency in declared {
                if !dependency.scope.on_classpath() {
                    continue;
                }
                if dependency.scope == DependencyScope::Provided && !item.is_root {
                    continue;
                }
                if dependency.optional && !self.include_optional {
                    continue;
                }

                let child_path = item.path.extend(PathSegment::new(
                    dependency.artifact.clone(),
                    dependency.scope,
                    dependency.optional,
                ));

                if let Some(filter) = self.suppression_for(
                    &item.artifact,
                    &dependency.artifact,
                    &item.inherited_exclusions,
                ) {
                    graph.suppressed.push(SuppressedDependency {
                        artifact: dependency.artifact.clone(),
                        path: child_path,
                        filter,
                    });
                    continue;
                }

                let mut child_exclusions = item.inherited_exclusions.clone();
                child_exclusions.extend(dependency.exclusions.iter().cloned());

                queue.push_back(QueueItem {
                    artifact: dependency.artifact,
                    path: child_path,
                    inherited_exclusions: child_exclusions,
                    is_root: false,
                });
            }
        }

        Ok(graph)
    }

    fn suppression_for(
        &self,
        parent: &Artifact,
        candidate: &Artifact,
        inherited: &[ExclusionFilter],
    ) -> Option<ExclusionFilter> {
        if let Some(filter) = inherited.iter().find(|filter| filter.matches(candidate)) {
            return Some(filter.clone());
        }
        self.rules
            .iter()
            .find(|rule| rule.applies_below(parent) && rule.filter.matches(candidate))
            .map(|rule| rule.filter.clone())
    }
}
