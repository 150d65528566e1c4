//! Configuration tool wrapper

pub mod tool;

pub use tool::CmtTool;
