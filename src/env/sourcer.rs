//! One-shot environment capture
//!
//! Setup scripts that must not be sourced twice run in a throw-away shell:
//! a generated wrapper sources the script, then prints a markup token, the
//! whole environment, and the token again. Only what lies between the two
//! tokens is trusted.

use super::model::EnvModel;
use super::protocol::{Sentinel, between_markers, parse_env_dump, shell_join, shell_quote};
use crate::core::error::{CmtError, CmtResult, ResultExt};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

pub struct ScriptSourcer {
  shell: PathBuf,
}

impl ScriptSourcer {
  pub fn new(shell: impl Into<PathBuf>) -> Self {
    Self { shell: shell.into() }
  }

  /// Source `script` with `args` in a disposable shell running with `env`,
  /// then merge the resulting environment into `env`.
  ///
  /// The wrapper lives in a private temporary directory that is removed on
  /// every exit path.
  pub fn source<S: AsRef<str>>(&self, env: &mut EnvModel, script: &Path, args: &[S]) -> CmtResult<()> {
    let tmp = tempfile::Builder::new()
      .prefix("cmtkit-env-source-")
      .tempdir()
      .context("Failed to create wrapper directory")?;

    let script = absolute(script, env)?;
    let markup = Sentinel::markup();
    let wrapper = write_wrapper(&tmp, &script, args, &markup)?;

    let shell = self.shell.to_string_lossy();
    let wrapper_str = wrapper.to_string_lossy();
    let output = env
      .command(&shell, &[wrapper_str.as_ref()])?
      .output()
      .with_context(|| format!("Failed to run {} {}", shell, wrapper_str))?;

    let combined = String::from_utf8_lossy(&output.stdout).into_owned();
    if !output.status.success() {
      return Err(CmtError::Process {
        command: format!("{} {}", shell, script.display()),
        status: output.status.code(),
        output: combined,
      });
    }

    let pairs = capture_environment(&combined, &markup)?;
    debug!(script = %script.display(), vars = pairs.len(), "captured sourced environment");
    env.merge(pairs);
    Ok(())
  }
}

/// Parse the `KEY=VALUE` lines between the first two `markup` occurrences.
pub fn capture_environment(output: &str, markup: &str) -> CmtResult<Vec<(String, String)>> {
  let body = between_markers(output, markup)?;
  Ok(parse_env_dump(body.trim_matches('\n')))
}

fn write_wrapper<S: AsRef<str>>(tmp: &TempDir, script: &Path, args: &[S], markup: &str) -> CmtResult<PathBuf> {
  let mut set_args = String::from("set --");
  if !args.is_empty() {
    set_args.push(' ');
    set_args.push_str(&shell_join(args));
  }

  let wrapper = tmp.path().join("env.sh");
  let content = format!(
    "#!/bin/sh\nexec 2>&1\n{set_args}\n. {script}\n\nprintf '%s\\n' {markup}\nenv\nprintf '%s\\n' {markup}\n",
    set_args = set_args,
    script = shell_quote(&script.to_string_lossy()),
    markup = shell_quote(markup),
  );
  fs::write(&wrapper, content).with_context(|| format!("Failed to write {}", wrapper.display()))?;
  Ok(wrapper)
}

/// Relative scripts are taken relative to the modelled working directory.
fn absolute(script: &Path, env: &EnvModel) -> CmtResult<PathBuf> {
  if script.is_absolute() {
    return Ok(script.to_path_buf());
  }
  let base = match env.getwd() {
    Some(pwd) => pwd,
    None => std::env::current_dir()?,
  };
  Ok(base.join(script))
}
