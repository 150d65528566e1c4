//! Core building blocks shared by every command
//!
//! - **config**: cmtkit.toml parsing and validation
//! - **context**: per-invocation context (root directory + config)
//! - **error**: error taxonomy with exit codes and contextual help

pub mod config;
pub mod context;
pub mod error;
