//! Integration tests for cmtkit
//!
//! Every test drives the built binary against a fake release installation.

mod helpers;

mod test_environment;
mod test_latest_tag;
mod test_packages;
mod test_projects;
mod test_tag_diff;
