use crate::resolver::{DeclaredDependency, DependencySource, GraphError};
use indexmap::IndexMap;
use jarlink_model::{Artifact, DependencyScope, ExclusionFilter};
use roxmltree::{Document, Node};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::warn;

/// A [`DependencySource`] over a Maven-layout directory tree.
///
/// Only files already on disk are consulted; nothing is fetched. A POM that
/// is absent makes its artifact an unknown (leaf) node, and a JAR that is
/// absent surfaces through [`DependencySource::locate`] returning `None`.
pub struct LocalRepositorySource {
    root: PathBuf,
    cache: RefCell<HashMap<Artifact, Rc<EffectivePom>>>,
}

impl LocalRepositorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// The conventional `~/.m2/repository`.
    pub fn default_root() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".m2").join("repository"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The artifacts pinned by a BOM's `dependencyManagement`, in
    /// declaration order. This is the root set for BOM mode.
    pub fn load_bom(&self, artifact: &Artifact) -> Result<Vec<Artifact>, GraphError> {
        let effective = self.effective_pom(artifact, &mut HashSet::new())?;
        Ok(effective
            .managed
            .values()
            .map(|managed| managed.artifact.clone())
            .collect())
    }

    fn pom_path(&self, artifact: &Artifact) -> PathBuf {
        self.root
            .join(artifact.version_path())
            .join(artifact.pom_file_name())
    }

    fn effective_pom(
        &self,
        artifact: &Artifact,
        parent_stack: &mut HashSet<Artifact>,
    ) -> Result<Rc<EffectivePom>, GraphError> {
        // One descriptor covers every classifier/extension of a version.
        let plain = Artifact {
            classifier: None,
            extension: None,
            ..artifact.clone()
        };

        if let Some(cached) = self.cache.borrow().get(&plain) {
            return Ok(cached.clone());
        }

        if !parent_stack.insert(plain.clone()) {
            return Err(GraphError::ParentCycle {
                artifact: plain.clone(),
            });
        }

        // The stack entry must come off on every path, including the error
        // ones an import expansion recovers from.
        let result = self.load_effective_pom(&plain, parent_stack);
        parent_stack.remove(&plain);

        let shared = Rc::new(result?);
        self.cache.borrow_mut().insert(plain, shared.clone());
        Ok(shared)
    }

    fn load_effective_pom(
        &self,
        plain: &Artifact,
        parent_stack: &mut HashSet<Artifact>,
    ) -> Result<EffectivePom, GraphError> {
        let pom_path = self.pom_path(plain);
        let text = match fs::read_to_string(&pom_path) {
            Ok(text) => text,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(GraphError::UnknownArtifact {
                    artifact: plain.clone(),
                });
            }
            Err(source) => {
                return Err(GraphError::DescriptorIo {
                    artifact: plain.clone(),
                    source,
                });
            }
        };

        let model = PomModel::parse(&text).map_err(|message| GraphError::DescriptorParse {
            artifact: plain.clone(),
            message,
        })?;

        let parent_effective = match &model.parent {
            Some(parent) => Some(self.effective_pom(
                &Artifact::new(
                    parent.group.clone(),
                    parent.name.clone(),
                    parent.version.clone(),
                ),
                parent_stack,
            )?),
            None => None,
        };

        self.merge_effective(plain, model, parent_effective.as_deref(), parent_stack)
    }

    fn merge_effective(
        &self,
        artifact: &Artifact,
        model: PomModel,
        parent: Option<&EffectivePom>,
        parent_stack: &mut HashSet<Artifact>,
    ) -> Result<EffectivePom, GraphError> {
        let mut properties = parent
            .map(|parent| parent.properties.clone())
            .unwrap_or_default();
        properties.extend(model.properties);
        properties.insert("project.groupId".to_string(), artifact.group.clone());
        properties.insert("project.artifactId".to_string(), artifact.name.clone());
        properties.insert("project.version".to_string(), artifact.version.clone());

        let mut managed: IndexMap<(String, String), ManagedDependency> = parent
            .map(|parent| parent.managed.clone())
            .unwrap_or_default();

        for entry in model.dependency_management {
            let Some(group) = resolve_property(entry.group.as_deref(), &properties) else {
                continue;
            };
            let Some(name) = resolve_property(entry.name.as_deref(), &properties) else {
                continue;
            };
            let Some(version) = resolve_property(entry.version.as_deref(), &properties) else {
                continue;
            };

            let is_import = entry.dep_type.as_deref() == Some("pom")
                && entry.scope.as_deref() == Some("import");
            if is_import {
                // A BOM import splices the imported management section in
                // place of the import row. The shared stack catches
                // import cycles.
                let bom = Artifact::new(group, name, version);
                match self.effective_pom(&bom, parent_stack) {
                    Ok(imported) => {
                        for (key, value) in imported.managed.iter() {
                            managed.entry(key.clone()).or_insert_with(|| value.clone());
                        }
                    }
                    Err(error) => {
                        warn!(artifact = %bom, error = %error, "skipping unreadable BOM import");
                    }
                }
                continue;
            }

            let mut coords = Artifact::new(group.clone(), name.clone(), version);
            if let Some(classifier) = resolve_property(entry.classifier.as_deref(), &properties) {
                coords = coords.with_classifier(classifier);
            }
            managed.insert(
                (group, name),
                ManagedDependency {
                    artifact: coords,
                    scope: entry.scope.clone(),
                },
            );
        }

        let mut dependencies = Vec::new();
        for entry in model.dependencies {
            let Some(group) = resolve_property(entry.group.as_deref(), &properties) else {
                continue;
            };
            let Some(name) = resolve_property(entry.name.as_deref(), &properties) else {
                continue;
            };

            let managed_entry = managed.get(&(group.clone(), name.clone()));
            let version = resolve_property(entry.version.as_deref(), &properties)
                .or_else(|| managed_entry.map(|managed| managed.artifact.version.clone()));
            let Some(version) = version else {
                warn!(
                    group = %group,
                    name = %name,
                    declaring = %artifact,
                    "dependency without a resolvable version; skipping"
                );
                continue;
            };

            let scope_text = entry
                .scope
                .clone()
                .or_else(|| managed_entry.and_then(|managed| managed.scope.clone()));
            if scope_text.as_deref() == Some("system") {
                continue;
            }
            let scope = match scope_text.as_deref().unwrap_or("compile").parse() {
                Ok(scope) => scope,
                Err(_) => {
                    warn!(
                        group = %group,
                        name = %name,
                        scope = %scope_text.unwrap_or_default(),
                        "unknown dependency scope; skipping"
                    );
                    continue;
                }
            };

            let mut coords = Artifact::new(group, name, version);
            if let Some(classifier) = resolve_property(entry.classifier.as_deref(), &properties) {
                coords = coords.with_classifier(classifier);
            }

            let exclusions = entry
                .exclusions
                .iter()
                .map(|(group, name)| ExclusionFilter::new(group.clone(), name.clone()))
                .collect();

            dependencies.push(DeclaredDependency {
                artifact: coords,
                scope,
                optional: entry.optional,
                exclusions,
            });
        }

        Ok(EffectivePom {
            properties,
            managed,
            dependencies,
        })
    }
}

impl DependencySource for LocalRepositorySource {
    fn direct_dependencies(
        &self,
        artifact: &Artifact,
    ) -> Result<Vec<DeclaredDependency>, GraphError> {
        let effective = self.effective_pom(artifact, &mut HashSet::new())?;
        Ok(effective.dependencies.clone())
    }

    fn locate(&self, artifact: &Artifact) -> Option<PathBuf> {
        let path = self
            .root
            .join(artifact.version_path())
            .join(artifact.archive_file_name());
        path.is_file().then_some(path)
    }
}

#[derive(Debug, Clone)]
struct EffectivePom {
    properties: HashMap<String, String>,
    managed: IndexMap<(String, String), ManagedDependency>,
    dependencies: Vec<DeclaredDependency>,
}

#[derive(Debug, Clone)]
struct ManagedDependency {
    artifact: Artifact,
    scope: Option<String>,
}

#[derive(Debug, Clone)]
struct PomModel {
    parent: Option<PomParent>,
    properties: HashMap<String, String>,
    dependency_management: Vec<PomDependency>,
    dependencies: Vec<PomDependency>,
}

#[derive(Debug, Clone)]
struct PomParent {
    group: String,
    name: String,
    version: String,
}

#[derive(Debug, Clone, Default)]
struct PomDependency {
    group: Option<String>,
    name: Option<String>,
    version: Option<String>,
    classifier: Option<String>,
    scope: Option<String>,
    dep_type: Option<String>,
    optional: bool,
    exclusions: Vec<(String, String)>,
}

impl PomModel {
    fn parse(xml: &str) -> Result<Self, String> {
        let document = Document::parse(xml).map_err(|error| error.to_string())?;
        let project = document
            .descendants()
            .find(|node| node.has_tag_name("project"))
            .ok_or_else(|| "descriptor has no <project> element".to_string())?;

        let parent = project
            .children()
            .find(|node| node.is_element() && node.tag_name().name() == "parent")
            .map(|node| {
                Ok::<PomParent, String>(PomParent {
                    group: required_text(&node, "groupId")?,
                    name: required_text(&node, "artifactId")?,
                    version: required_text(&node, "version")?,
                })
            })
            .transpose()?;

        let properties = project
            .children()
            .find(|node| node.is_element() && node.tag_name().name() == "properties")
            .map(|props| {
                props
                    .children()
                    .filter(|child| child.is_element())
                    .filter_map(|prop| {
                        let key = prop.tag_name().name().to_string();
                        let value = prop.text().map(str::trim)?.to_string();
                        Some((key, value))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let dependency_management = project
            .children()
            .find(|node| node.is_element() && node.tag_name().name() == "dependencyManagement")
            .and_then(|management| {
                management
                    .children()
                    .find(|child| child.is_element() && child.tag_name().name() == "dependencies")
            })
            .map(|deps| parse_dependencies(&deps))
            .unwrap_or_default();

        let dependencies = project
            .children()
            .find(|node| node.is_element() && node.tag_name().name() == "dependencies")
            .map(|deps| parse_dependencies(&deps))
            .unwrap_or_default();

        Ok(Self {
            parent,
            properties,
            dependency_management,
            dependencies,
        })
    }
}

fn parse_dependencies(container: &Node<'_, '_>) -> Vec<PomDependency> {
    container
        .children()
        .filter(|child| child.is_element() && child.tag_name().name() == "dependency")
        .map(|node| {
            let exclusions = node
                .children()
                .find(|child| child.is_element() && child.tag_name().name() == "exclusions")
                .map(|exclusions_node| {
                    exclusions_node
                        .children()
                        .filter(|child| child.is_element() && child.tag_name().name() == "exclusion")
                        .filter_map(|exclusion| {
                            let group = node_text(&exclusion, "groupId")?;
                            let name = node_text(&exclusion, "artifactId")?;
                            Some((group, name))
                        })
                        .collect()
                })
                .unwrap_or_default();

            PomDependency {
                group: node_text(&node, "groupId"),
                name: node_text(&node, "artifactId"),
                version: node_text(&node, "version"),
                classifier: node_text(&node, "classifier"),
                scope: node_text(&node, "scope"),
                dep_type: node_text(&node, "type"),
                optional: node_text(&node, "optional")
                    .map(|value| value.eq_ignore_ascii_case("true"))
                    .unwrap_or(false),
                exclusions,
            }
        })
        .collect()
}

fn node_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == tag)
        .and_then(|child| child.text())
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

fn required_text(node: &Node<'_, '_>, tag: &str) -> Result<String, String> {
    node_text(node, tag).ok_or_else(|| format!("<parent> is missing <{tag}>"))
}

/// Interpolates `${…}` references, bounded to defeat self-referential
/// property sets.
fn resolve_property(value: Option<&str>, properties: &HashMap<String, String>) -> Option<String> {
    let mut current = value?.trim().to_string();
    if current.is_empty() {
        return None;
    }

    let mut attempts = 0;
    while current.contains("${") {
        attempts += 1;
        if attempts > 8 {
            return None;
        }

        let mut result = String::new();
        let mut rest = current.as_str();
        while let Some(start) = rest.find("${") {
            result.push_str(&rest[..start]);
            let suffix = &rest[start + 2..];
            let end = suffix.find('}')?;
            let key = &suffix[..end];
            result.push_str(properties.get(key)?);
            rest = &suffix[end + 1..];
        }
        result.push_str(rest);
        current = result;
    }

    Some(current)
}
