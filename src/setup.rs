//! Configured release environments
//!
//! A `Setup` owns a work area (a private temporary directory unless the
//! caller provides one) and a shell session in which the release setup
//! script has been sourced. Everything that talks to the configuration
//! tool goes through that session.

use crate::core::config::CmtConfig;
use crate::core::error::{CmtError, CmtResult, MultiError, ResultExt};
use crate::env::{EnvModel, ScriptSourcer, ShellSession};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Name of the setup configuration written into the work area
pub const SETUP_CFG: &str = ".asetup.cfg";

/// Variables the shell maintains itself; replaying them is meaningless or fatal
const SHELL_MANAGED: &[&str] = &[
  "_",
  "SHLVL",
  "PPID",
  "UID",
  "EUID",
  "OLDPWD",
  "BASHOPTS",
  "SHELLOPTS",
  "BASH_VERSINFO",
];

enum WorkArea {
  Owned(TempDir),
  Borrowed(PathBuf),
}

impl WorkArea {
  fn fresh() -> CmtResult<Self> {
    let dir = tempfile::Builder::new()
      .prefix("cmtkit-mgr-")
      .tempdir()
      .context("Failed to create work area")?;
    Ok(WorkArea::Owned(dir))
  }

  fn path(&self) -> &Path {
    match self {
      WorkArea::Owned(dir) => dir.path(),
      WorkArea::Borrowed(path) => path,
    }
  }

  fn close(self) -> CmtResult<()> {
    match self {
      WorkArea::Owned(dir) => {
        let path = dir.path().display().to_string();
        dir.close().with_context(|| format!("Failed to remove work area {}", path))
      }
      WorkArea::Borrowed(_) => Ok(()),
    }
  }
}

pub struct Setup {
  name: String,
  setup_script: PathBuf,
  config: CmtConfig,
  // Field order matters on drop: the shell goes before its work area.
  session: ShellSession,
  topdir: WorkArea,
}

impl Setup {
  /// Source the release setup for `tags` in a fresh work area.
  pub fn new(config: &CmtConfig, tags: &str) -> CmtResult<Self> {
    let topdir = WorkArea::fresh()?;
    let session = ShellSession::spawn(&config.shell, config.timeout())?;
    let mut setup = Self {
      name: config.project.clone(),
      setup_script: config.setup_script_path(),
      config: config.clone(),
      session,
      topdir,
    };
    setup.enter_topdir()?;
    setup.source_setup(tags)?;
    Ok(setup)
  }

  /// Restore an environment written by [`Setup::save`].
  ///
  /// `topdir` replaces the work area the snapshot was taken in; a fresh
  /// temporary one is used when absent.
  pub fn from_cache(config: &CmtConfig, cache: &Path, topdir: Option<&Path>) -> CmtResult<Self> {
    let topdir = match topdir {
      Some(dir) => WorkArea::Borrowed(dir.to_path_buf()),
      None => WorkArea::fresh()?,
    };
    let session = ShellSession::spawn(&config.shell, config.timeout())?;
    let mut setup = Self {
      name: "AtlasInvalid".to_string(),
      setup_script: config.setup_script_path(),
      config: config.clone(),
      session,
      topdir,
    };

    let file = fs::File::open(cache).with_context(|| format!("Failed to open cache {}", cache.display()))?;
    setup.load(file)?;

    let project = setup.session.get_variable("AtlasProject")?;
    if !project.is_empty() {
      setup.name = project;
    }
    let script = setup.session.get_variable("AtlasSetup")?;
    if !script.is_empty() {
      setup.setup_script = PathBuf::from(script);
    }

    setup.enter_topdir()?;
    info!(project = %setup.name, cache = %cache.display(), "restored cached setup");
    Ok(setup)
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn topdir(&self) -> &Path {
    self.topdir.path()
  }

  pub fn setup_script(&self) -> &Path {
    &self.setup_script
  }

  pub fn config(&self) -> &CmtConfig {
    &self.config
  }

  pub fn session(&mut self) -> &mut ShellSession {
    &mut self.session
  }

  /// Snapshot of the session's current environment
  pub fn env_model(&mut self) -> CmtResult<EnvModel> {
    Ok(EnvModel::from_pairs(self.session.environ()?))
  }

  /// Write the session environment as a relocatable JSON snapshot.
  pub fn save<W: Write>(&mut self, sink: W) -> CmtResult<()> {
    let env = self.env_model()?;
    env.save(sink, self.topdir.path())
  }

  /// Replay a snapshot into the session, rooted at this work area.
  ///
  /// The working directory of the session is left unchanged.
  pub fn load<R: Read>(&mut self, source: R) -> CmtResult<()> {
    let wd = self.session.getwd()?;
    let env = EnvModel::load(source, self.topdir.path())?;
    let replayed = self.replay(&env);
    let restored = self.session.chdir(&wd);
    replayed?;
    restored
  }

  /// Run `f` against this setup, then close it whatever the outcome.
  pub fn scoped<T>(mut self, f: impl FnOnce(&mut Setup) -> CmtResult<T>) -> CmtResult<T> {
    let result = f(&mut self);
    let closed = self.close();
    match (result, closed) {
      (Ok(value), Ok(())) => Ok(value),
      (Ok(_), Err(err)) => Err(err),
      (Err(err), Ok(())) => Err(err),
      (Err(err), Err(close_err)) => {
        warn!("cleanup after failure also failed: {}", close_err);
        Err(err)
      }
    }
  }

  /// Stop the shell and remove an owned work area.
  pub fn close(self) -> CmtResult<()> {
    let Setup { session, topdir, .. } = self;
    MultiError::combine([session.close(), topdir.close()])
  }

  fn enter_topdir(&mut self) -> CmtResult<()> {
    let dir = self.topdir.path().to_path_buf();
    self.session.chdir(&dir)
  }

  fn source_setup(&mut self, tags: &str) -> CmtResult<()> {
    let cfg = self.topdir.path().join(SETUP_CFG);
    fs::write(&cfg, self.config.render_setup_cfg()).with_context(|| format!("Failed to write {}", cfg.display()))?;
    debug!(cfg = %cfg.display(), "wrote setup configuration");

    let args = [format!("--input={}", cfg.display()), tags.to_string()];
    let script = self.setup_script.clone();
    info!(script = %script.display(), tags = %tags, "sourcing release setup");

    if self.config.isolated_setup {
      let mut env = self.env_model()?;
      env.chdir(self.topdir.path());
      ScriptSourcer::new(&self.config.shell).source(&mut env, &script, &args)?;
      self.replay(&env)?;
    } else {
      let reply = self.session.source_script(&script, &args)?;
      if !reply.success() {
        return Err(CmtError::Process {
          command: format!("source {} {}", script.display(), args.join(" ")),
          status: Some(reply.status),
          output: reply.output,
        });
      }
      debug!(output = %reply.output, "setup script output");
    }

    let tool = self.config.tool.clone();
    let paths = self
      .session
      .run(&tool, &["show", "path"])
      .with_context(|| format!("error running '{} show path'", tool))?;
    debug!(output = %paths, "{} show path", tool);
    Ok(())
  }

  /// Export every entry of `env` inside the session.
  ///
  /// Exports are not acknowledged one by one; a final framed query makes
  /// sure the shell consumed them all and is still alive.
  fn replay(&mut self, env: &EnvModel) -> CmtResult<()> {
    for (key, value) in env.to_pairs() {
      if SHELL_MANAGED.contains(&key) {
        continue;
      }
      self.session.set_variable(key, value)?;
    }
    self.session.getwd()?;
    debug!(vars = env.len(), "replayed environment");
    Ok(())
  }
}
