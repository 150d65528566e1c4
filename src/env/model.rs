//! In-memory model of a process environment
//!
//! The model is the unit that gets saved, relocated and restored. Tool
//! invocations that run outside a shell session get exactly this
//! environment, this `PWD` and a program resolved through this `PATH`.

use crate::core::error::{CmtError, CmtResult, ResultExt};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Stands in for the work-area root inside a saved snapshot
pub const TOPDIR_PLACEHOLDER: &str = "@@CMT_TOPDIR@@";

/// Last-command artifact of the shell; never persisted
const LAST_ARG_VAR: &str = "_";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvModel {
  vars: BTreeMap<String, String>,
}

impl EnvModel {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
  where
    K: Into<String>,
    V: Into<String>,
  {
    let mut env = Self::new();
    env.merge(pairs);
    env
  }

  /// Value of `key`, empty when unset
  pub fn get(&self, key: &str) -> &str {
    self.vars.get(key).map(String::as_str).unwrap_or("")
  }

  pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
    self.vars.insert(key.into(), value.into());
  }

  /// Overwrite with every pair from a captured environment, dropping `_`.
  pub fn merge<K, V>(&mut self, pairs: impl IntoIterator<Item = (K, V)>)
  where
    K: Into<String>,
    V: Into<String>,
  {
    for (key, value) in pairs {
      let key = key.into();
      if key == LAST_ARG_VAR || key.is_empty() {
        continue;
      }
      self.vars.insert(key, value.into());
    }
  }

  /// Pairs in key order
  pub fn to_pairs(&self) -> Vec<(&str, &str)> {
    self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
  }

  /// `KEY=VALUE` strings in key order
  pub fn environ(&self) -> Vec<String> {
    self.vars.iter().map(|(k, v)| format!("{}={}", k, v)).collect()
  }

  pub fn len(&self) -> usize {
    self.vars.len()
  }

  pub fn getwd(&self) -> Option<PathBuf> {
    self.vars.get("PWD").filter(|p| !p.is_empty()).map(PathBuf::from)
  }

  pub fn chdir(&mut self, dir: &Path) {
    self.set("PWD", dir.to_string_lossy());
  }

  /// Search `file` in the directories of this model's `PATH`.
  ///
  /// A name containing `/` is checked directly. Empty `PATH` entries mean
  /// the current directory.
  pub fn look_path(&self, file: &str) -> CmtResult<PathBuf> {
    if file.contains('/') {
      let candidate = PathBuf::from(file);
      if is_executable(&candidate) {
        return Ok(candidate);
      }
      return Err(CmtError::not_found("executable", file));
    }

    let path_var = self.get("PATH");
    for dir in path_var.split(':').filter(|_| !path_var.is_empty()) {
      let dir = if dir.is_empty() { "." } else { dir };
      let candidate = Path::new(dir).join(file);
      if is_executable(&candidate) {
        return Ok(candidate);
      }
    }
    Err(CmtError::not_found("executable", file))
  }

  /// Build a command that runs with exactly this environment.
  pub fn command<S: AsRef<str>>(&self, program: &str, args: &[S]) -> CmtResult<Command> {
    let resolved = self.look_path(program)?;
    let mut cmd = Command::new(resolved);
    cmd.args(args.iter().map(AsRef::as_ref));
    cmd.env_clear();
    cmd.envs(self.vars.iter());
    if let Some(pwd) = self.getwd() {
      cmd.current_dir(pwd);
    }
    Ok(cmd)
  }

  /// Serialize as one JSON object, replacing `root` with the placeholder.
  pub fn save<W: Write>(&self, mut sink: W, root: &Path) -> CmtResult<()> {
    let root = root.to_string_lossy();
    let relocatable: BTreeMap<&str, String> = self
      .vars
      .iter()
      .filter(|(k, _)| k.as_str() != LAST_ARG_VAR)
      .map(|(k, v)| {
        let v = if root.is_empty() {
          v.clone()
        } else {
          v.replace(root.as_ref(), TOPDIR_PLACEHOLDER)
        };
        (k.as_str(), v)
      })
      .collect();

    serde_json::to_writer_pretty(&mut sink, &relocatable).context("Failed to encode environment snapshot")?;
    sink.flush()?;
    Ok(())
  }

  /// Decode a snapshot written by [`EnvModel::save`], rooted at `new_root`.
  ///
  /// The result is literal; derived variables only become valid once the
  /// entries are replayed through a shell (see `Setup::load`).
  pub fn load<R: Read>(source: R, new_root: &Path) -> CmtResult<Self> {
    let data: BTreeMap<String, String> =
      serde_json::from_reader(source).context("Failed to decode environment snapshot")?;
    let new_root = new_root.to_string_lossy();

    let mut env = Self::new();
    env.merge(
      data
        .into_iter()
        .map(|(k, v)| (k, v.replace(TOPDIR_PLACEHOLDER, new_root.as_ref()))),
    );
    Ok(env)
  }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
  use std::os::unix::fs::PermissionsExt;
  match std::fs::metadata(path) {
    Ok(meta) => !meta.is_dir() && meta.permissions().mode() & 0o111 != 0,
    Err(_) => false,
  }
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
  path.is_file()
}
