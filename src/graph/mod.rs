//! Project dependency graph
//!
//! Built on quick-xml + petgraph: the catalog decoder fills an arena of
//! projects, the DAG picks a root and fixes a traversal order.

pub mod catalog;
pub mod dag;
pub mod projects;

pub use catalog::parse_catalog;
pub use dag::{ProjectDag, RootStrategy};
pub use projects::{Project, ProjectId, Projects};
