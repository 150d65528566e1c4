//! Invocation context - build once, pass everywhere
//!
//! ```text
//! main.rs:
//!   CmtContext::build() -> &CmtContext
//!   |
//!   v
//! commands/projects.rs, tag_diff.rs, etc:
//!   fn run_xxx(ctx: &CmtContext, ...)
//! ```

use crate::core::config::CmtConfig;
use crate::core::error::{CmtError, CmtResult};
use crate::setup::Setup;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where a command gets its release environment from
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
  /// Fresh setup with these tags
  pub tags: Option<String>,
  /// Snapshot written by `setup --save`
  pub cache: Option<PathBuf>,
  /// Work area replacing the snapshot's one
  pub topdir: Option<PathBuf>,
}

/// Shared data for one invocation
#[derive(Clone)]
pub struct CmtContext {
  /// Directory the configuration was searched from
  pub root: PathBuf,

  /// cmtkit.toml (defaults when absent)
  pub config: Arc<CmtConfig>,
}

impl CmtContext {
  pub fn build(root: &Path) -> CmtResult<Self> {
    let config = CmtConfig::load(root)?;
    Ok(Self {
      root: root.to_path_buf(),
      config: Arc::new(config),
    })
  }

  /// Open the environment described by `source`; a cache wins over tags.
  pub fn open_setup(&self, source: &EnvSource) -> CmtResult<Setup> {
    if let Some(cache) = &source.cache {
      let cache = self.resolve(cache);
      let topdir = source.topdir.as_ref().map(|dir| self.resolve(dir));
      return Setup::from_cache(&self.config, &cache, topdir.as_deref());
    }
    match &source.tags {
      Some(tags) => Setup::new(&self.config, tags),
      None => Err(CmtError::with_help(
        "no release environment given",
        "Pass --tags <tags> for a fresh setup or --cache <file> to restore one saved with 'cmtkit setup --save'.",
      )),
    }
  }

  fn resolve(&self, path: &Path) -> PathBuf {
    if path.is_absolute() {
      path.to_path_buf()
    } else {
      self.root.join(path)
    }
  }
}
