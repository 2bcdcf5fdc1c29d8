// jarlink_graph - dependency graph traversal and classpath construction
mod classpath;
mod maven_repo;
mod resolver;

pub use classpath::{
    ClassPathBuilder, ClassPathEntry, ClassPathResult, MissingArchive, Suppression,
    UnselectedAlternative,
};
pub use maven_repo::LocalRepositorySource;
pub use resolver::{
    DeclaredDependency, DependencyGraph, DependencyGraphResolver, DependencySource, GraphError,
    GraphNode, SuppressedDependency,
};
