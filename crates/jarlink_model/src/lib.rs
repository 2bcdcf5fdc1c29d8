// jarlink_model - shared artifact and dependency data model
mod coordinates;
mod dependency;

pub use coordinates::{Artifact, CoordinateError, ModuleKey};
pub use dependency::{
    DependencyPath, DependencyScope, ExclusionFilter, ExclusionRule, FilterParseError, PathSegment,
    ScopeParseError,
};

#[cfg(test)]
mod tests;
