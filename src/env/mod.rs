//! Environment recovery
//!
//! - **model**: key/value environment with relocatable snapshots
//! - **session**: persistent shell with sentinel-framed queries
//! - **sourcer**: one-shot script sourcing with full environment capture
//! - **protocol**: sentinel tokens, quoting and env-dump parsing

pub mod model;
pub mod protocol;
pub mod session;
pub mod sourcer;

pub use model::EnvModel;
pub use session::ShellSession;
pub use sourcer::ScriptSourcer;
