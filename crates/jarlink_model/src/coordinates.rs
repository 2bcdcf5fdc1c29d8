use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised when parsing artifact coordinates from text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoordinateError {
    #[error("invalid coordinates '{input}': expected group:name[:classifier]:version")]
    InvalidFormat { input: String },
    #[error("invalid coordinates '{input}': empty {field}")]
    EmptyField { input: String, field: &'static str },
}

/// A versioned artifact identified by Maven-style coordinates.
///
/// Two artifacts with the same [`ModuleKey`] but different versions compete
/// for the same classpath slot; version selection itself happens upstream and
/// is never revisited here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Artifact {
    pub group: String,
    pub name: String,
    pub version: String,
    pub classifier: Option<String>,
    pub extension: Option<String>,
}

impl Artifact {
    pub fn new(
        group: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            version: version.into(),
            classifier: None,
            extension: None,
        }
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    pub fn classifier(&self) -> Option<&str> {
        self.classifier.as_deref()
    }

    /// The archive extension, `jar` unless declared otherwise.
    pub fn extension(&self) -> &str {
        self.extension.as_deref().unwrap_or("jar")
    }

    /// The version-independent identity used for classpath deduplication.
    pub fn module_key(&self) -> ModuleKey {
        ModuleKey {
            group: self.group.clone(),
            name: self.name.clone(),
            classifier: self.classifier.clone(),
            extension: self.extension.clone(),
        }
    }

    /// `group/…/name/version` relative directory inside a Maven-layout
    /// repository.
    pub fn version_path(&self) -> String {
        format!(
            "{}/{}/{}",
            self.group.replace('.', "/"),
            self.name,
            self.version
        )
    }

    /// The archive file name inside the version directory.
    pub fn archive_file_name(&self) -> String {
        match self.classifier() {
            Some(classifier) => format!(
                "{}-{}-{}.{}",
                self.name,
                self.version,
                classifier,
                self.extension()
            ),
            None => format!("{}-{}.{}", self.name, self.version, self.extension()),
        }
    }

    /// The POM file name inside the version directory.
    pub fn pom_file_name(&self) -> String {
        format!("{}-{}.pom", self.name, self.version)
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.classifier {
            Some(classifier) => write!(
                f,
                "{}:{}:{}:{}",
                self.group, self.name, classifier, self.version
            ),
            None => write!(f, "{}:{}:{}", self.group, self.name, self.version),
        }
    }
}

impl FromStr for Artifact {
    type Err = CoordinateError;

    /// Parses `group:name:version` or `group:name:classifier:version`.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = input.split(':').collect();
        let (group, name, classifier, version) = match parts.as_slice() {
            [group, name, version] => (*group, *name, None, *version),
            [group, name, classifier, version] => (*group, *name, Some(*classifier), *version),
            _ => {
                return Err(CoordinateError::InvalidFormat {
                    input: input.to_string(),
                })
            }
        };

        for (field, value) in [("group", group), ("name", name), ("version", version)] {
            if value.trim().is_empty() {
                return Err(CoordinateError::EmptyField {
                    input: input.to_string(),
                    field,
                });
            }
        }

        let mut artifact = Artifact::new(group, name, version);
        if let Some(classifier) = classifier {
            if classifier.trim().is_empty() {
                return Err(CoordinateError::EmptyField {
                    input: input.to_string(),
                    field: "classifier",
                });
            }
            artifact = artifact.with_classifier(classifier);
        }
        Ok(artifact)
    }
}

impl PartialOrd for Artifact {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Artifact {
    fn cmp(&self, other: &Self) -> Ordering {
        self.module_key()
            .cmp(&other.module_key())
            .then_with(|| self.version.cmp(&other.version))
    }
}

/// The equivalence class of artifacts ignoring version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleKey {
    pub group: String,
    pub name: String,
    pub classifier: Option<String>,
    pub extension: Option<String>,
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.name)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{}", classifier)?;
        }
        Ok(())
    }
}
