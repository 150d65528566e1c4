//! Terminal output helpers

pub mod progress;

pub use progress::{ScanBar, ScanProgress};
