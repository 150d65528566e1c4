//! Release contents
//!
//! - **manifest**: `use` declarations, packages and release directories
//! - **resolver**: first-match package lookup in DAG order
//! - **diff**: package differences between two release tags

pub mod diff;
pub mod manifest;
pub mod resolver;

pub use diff::ReleaseDiffer;
pub use manifest::{Package, ReleaseDirs};
pub use resolver::PackageResolver;
