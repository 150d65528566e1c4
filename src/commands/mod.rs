//! CLI commands for cmtkit
//!
//! ## Environment
//! - **setup**: Source a release setup, optionally saving the environment
//!
//! ## Project tree
//! - **projects**: Show the project catalog (text, JSON, DOT)
//! - **dag**: Show root selection and traversal order
//!
//! ## Packages
//! - **find-pkg**: Resolve a package along the DAG order
//! - **version**: Ask the tool for a package version
//! - **checkout**: Check out a package
//!
//! ## Releases
//! - **tag-diff**: Package differences between two release tags
//! - **latest-tag**: Newest tag of a package in version control
//!
//! All commands accept `&CmtContext` so the configuration is loaded once.

pub mod latest_tag;
pub mod package;
pub mod projects;
pub mod setup;
pub mod tag_diff;

pub use latest_tag::run_latest_tag;
pub use package::{run_checkout, run_find_pkg, run_version};
pub use projects::{ProjectsFormat, run_dag, run_projects};
pub use setup::run_setup;
pub use tag_diff::run_tag_diff;
