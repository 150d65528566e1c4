//! Version-control operations (tag listings)

pub mod system_svn;

pub use system_svn::SystemSvn;
