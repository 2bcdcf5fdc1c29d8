use crate::{Artifact, ModuleKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown dependency scope '{invalid}': expected one of compile, runtime, provided, test")]
pub struct ScopeParseError {
    pub invalid: String,
}

/// Scope declared on a dependency edge.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DependencyScope {
    #[default]
    Compile,
    Runtime,
    Provided,
    Test,
}

impl DependencyScope {
    pub const fn as_str(self) -> &'static str {
        match self {
            DependencyScope::Compile => "compile",
            DependencyScope::Runtime => "runtime",
            DependencyScope::Provided => "provided",
            DependencyScope::Test => "test",
        }
    }

    /// Scopes that place an archive on the runtime classpath.
    pub fn on_classpath(self) -> bool {
        !matches!(self, DependencyScope::Test)
    }
}

impl fmt::Display for DependencyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DependencyScope {
    type Err = ScopeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "compile" => Ok(DependencyScope::Compile),
            "runtime" => Ok(DependencyScope::Runtime),
            "provided" => Ok(DependencyScope::Provided),
            "test" => Ok(DependencyScope::Test),
            other => Err(ScopeParseError {
                invalid: other.to_string(),
            }),
        }
    }
}

/// One step on a dependency path: the artifact reached, and how the edge
/// into it was declared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathSegment {
    pub artifact: Artifact,
    pub scope: DependencyScope,
    pub optional: bool,
}

impl PathSegment {
    pub fn new(artifact: Artifact, scope: DependencyScope, optional: bool) -> Self {
        Self {
            artifact,
            scope,
            optional,
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}", self.artifact, self.scope)?;
        if self.optional {
            f.write_str(", optional")?;
        }
        f.write_str(")")
    }
}

/// A non-empty ordered walk from a root artifact to a leaf.
///
/// Paths are the blame record for an archive's presence on the classpath.
/// They are immutable once built; [`DependencyPath::extend`] returns a new
/// path sharing no mutable state with its parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyPath {
    segments: Arc<Vec<PathSegment>>,
}

impl DependencyPath {
    /// A single-segment path rooted at `artifact`.
    pub fn root(artifact: Artifact) -> Self {
        Self {
            segments: Arc::new(vec![PathSegment::new(
                artifact,
                DependencyScope::Compile,
                false,
            )]),
        }
    }

    /// The path one edge deeper than `self`.
    pub fn extend(&self, segment: PathSegment) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend(self.segments.iter().cloned());
        segments.push(segment);
        Self {
            segments: Arc::new(segments),
        }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn root_artifact(&self) -> &Artifact {
        &self.segments[0].artifact
    }

    pub fn leaf(&self) -> &Artifact {
        &self.segments[self.segments.len() - 1].artifact
    }

    /// Whether any segment of the path names `key`.
    pub fn passes_through(&self, key: &ModuleKey) -> bool {
        self.segments
            .iter()
            .any(|segment| segment.artifact.module_key() == *key)
    }
}

impl fmt::Display for DependencyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, segment) in self.segments.iter().enumerate() {
            if index == 0 {
                write!(f, "{}", segment.artifact)?;
            } else {
                write!(f, " > {}", segment)?;
            }
        }
        Ok(())
    }
}

/// A `group:name` pattern where either side may be the `*` wildcard.
///
/// Matching is whole-segment only; `com.*` is a literal, not a prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExclusionFilter {
    pub group: String,
    pub name: String,
}

impl ExclusionFilter {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }

    pub fn matches(&self, artifact: &Artifact) -> bool {
        segment_matches(&self.group, &artifact.group) && segment_matches(&self.name, &artifact.name)
    }
}

impl fmt::Display for ExclusionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.name)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid exclusion filter '{invalid}': expected group:name")]
pub struct FilterParseError {
    pub invalid: String,
}

impl FromStr for ExclusionFilter {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((group, name)) if !group.is_empty() && !name.is_empty() => {
                Ok(ExclusionFilter::new(group, name))
            }
            _ => Err(FilterParseError {
                invalid: s.to_string(),
            }),
        }
    }
}

fn segment_matches(pattern: &str, value: &str) -> bool {
    pattern == "*" || pattern == value
}

/// A caller-supplied exclusion: suppress descendants matching `filter`
/// below edges out of `from` (or below every edge when `from` is `None`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionRule {
    pub from: Option<ModuleKey>,
    pub filter: ExclusionFilter,
}

impl ExclusionRule {
    pub fn anywhere(filter: ExclusionFilter) -> Self {
        Self { from: None, filter }
    }

    pub fn below(from: ModuleKey, filter: ExclusionFilter) -> Self {
        Self {
            from: Some(from),
            filter,
        }
    }

    pub fn applies_below(&self, parent: &Artifact) -> bool {
        match &self.from {
            Some(key) => parent.module_key() == *key,
            None => true,
        }
    }
}
