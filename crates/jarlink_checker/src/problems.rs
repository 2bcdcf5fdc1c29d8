use jarlink_classfile::Symbol;
use jarlink_graph::ClassPathEntry;
use jarlink_model::{Artifact, DependencyPath, ExclusionFilter};
use serde::Serialize;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A class pinned to the classpath entry that defines it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ClassRef {
    pub binary_name: String,
    pub entry: ClassPathEntry,
}

impl ClassRef {
    pub fn new(binary_name: impl Into<String>, entry: ClassPathEntry) -> Self {
        Self {
            binary_name: binary_name.into(),
            entry,
        }
    }
}

impl fmt::Display for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.binary_name.replace('/', "."), self.entry)
    }
}

/// The fixed linkage-problem taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemKind {
    ClassNotFound,
    SymbolNotFound,
    Inaccessible,
    IncompatibleClassChange,
    AbstractMethodUnimplemented,
}

impl ProblemKind {
    /// Phrase appended to the symbol in reports.
    pub fn message(self) -> &'static str {
        match self {
            ProblemKind::ClassNotFound | ProblemKind::SymbolNotFound => "is not found",
            ProblemKind::Inaccessible => "is not accessible from the referencing class",
            ProblemKind::IncompatibleClassChange => {
                "has changed incompatibly (class vs interface)"
            }
            ProblemKind::AbstractMethodUnimplemented => "is abstract and has no implementation",
        }
    }
}

/// Why an unresolved reference could not be satisfied, as determined by the
/// cause attributor from the classpath builder's records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum Cause {
    MissingArtifact {
        artifact: Artifact,
        path: DependencyPath,
    },
    ExcludedArtifact {
        filter: ExclusionFilter,
        path: DependencyPath,
    },
    DependencyConflict {
        selected: Artifact,
        selected_path: DependencyPath,
        unselected: Artifact,
        unselected_path: DependencyPath,
    },
    Unknown,
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cause::MissingArtifact { artifact, path } => {
                write!(
                    f,
                    "The archive of {} is missing; it was requested via:\n  {}",
                    artifact, path
                )
            }
            Cause::ExcludedArtifact { filter, path } => {
                write!(
                    f,
                    "The artifact was excluded by the {} exclusion on the path:\n  {}",
                    filter, path
                )
            }
            Cause::DependencyConflict {
                selected,
                selected_path,
                unselected,
                unselected_path,
            } => {
                write!(
                    f,
                    "Dependency conflict: {} does not define the symbol but {} defines it.\n  selected: {}\n  unselected: {}",
                    selected, unselected, selected_path, unselected_path
                )
            }
            Cause::Unknown => f.write_str("Unknown reason"),
        }
    }
}

/// An invalid reference from `source` to `symbol`.
///
/// Equality and hashing consider only `(symbol, source, target)`, so the
/// same bad reference reported under two kinds or with different causes
/// deduplicates. The symbol is stored demoted: a super-class reference
/// collapses to an ordinary class reference here.
#[derive(Debug, Clone, Serialize)]
pub struct LinkageProblem {
    symbol: Symbol,
    source: ClassRef,
    target: Option<ClassRef>,
    kind: ProblemKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    cause: Option<Cause>,
}

impl LinkageProblem {
    pub fn new(
        symbol: &Symbol,
        source: ClassRef,
        target: Option<ClassRef>,
        kind: ProblemKind,
    ) -> Self {
        Self {
            symbol: symbol.demoted(),
            source,
            target,
            kind,
            cause: None,
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn source(&self) -> &ClassRef {
        &self.source
    }

    /// The class expected to contain the symbol; `None` exactly when the
    /// class itself was not found.
    pub fn target(&self) -> Option<&ClassRef> {
        self.target.as_ref()
    }

    pub fn kind(&self) -> ProblemKind {
        self.kind
    }

    pub fn cause(&self) -> Option<&Cause> {
        self.cause.as_ref()
    }

    /// Attaches the attributed cause. Attribution runs exactly once, before
    /// the problem set is handed to callers.
    pub(crate) fn set_cause(&mut self, cause: Cause) {
        debug_assert!(self.cause.is_none());
        self.cause = Some(cause);
    }

    /// The symbol-side description without the referencing class, used for
    /// report grouping.
    pub fn format_symbol_problem(&self) -> String {
        match (self.kind, &self.target) {
            (ProblemKind::AbstractMethodUnimplemented, Some(target)) => {
                format!("{} does not implement {}", target, self.symbol)
            }
            (_, Some(target)) => {
                format!("({}) {} {}", target.entry, self.symbol, self.kind.message())
            }
            (_, None) => format!("{} {}", self.symbol, self.kind.message()),
        }
    }
}

impl PartialEq for LinkageProblem {
    fn eq(&self, other: &Self) -> bool {
        self.symbol == other.symbol && self.source == other.source && self.target == other.target
    }
}

impl Eq for LinkageProblem {}

impl Hash for LinkageProblem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.symbol.hash(state);
        self.source.hash(state);
        self.target.hash(state);
    }
}

impl fmt::Display for LinkageProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, referenced by {}",
            self.format_symbol_problem(),
            self.source
        )
    }
}
