//! Version-control client backend
//!
//! Tags live as directories under a repository URL; listing that URL and
//! filtering by `<basename>-` is all the tag queries need.

use crate::core::error::{CmtError, CmtResult, ResultExt};
use regex::Regex;
use std::process::Command;
use tracing::debug;

/// Version-control client invoked as a subprocess
pub struct SystemSvn {
  program: String,
}

impl SystemSvn {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
    }
  }

  /// Entries directly under `url`, trailing `/` removed.
  pub fn list(&self, url: &str) -> CmtResult<Vec<String>> {
    let output = self
      .svn_cmd()
      .args(["ls", url])
      .output()
      .with_context(|| format!("Failed to execute {} ls", self.program))?;

    if !output.status.success() {
      return Err(CmtError::Process {
        command: format!("{} ls {}", self.program, url),
        status: output.status.code(),
        output: String::from_utf8_lossy(&output.stderr).into_owned(),
      });
    }

    let entries: Vec<String> = String::from_utf8_lossy(&output.stdout)
      .lines()
      .map(|line| line.trim().trim_end_matches('/').to_string())
      .filter(|line| !line.is_empty())
      .collect();
    debug!(url = %url, entries = entries.len(), "listed repository");
    Ok(entries)
  }

  /// Greatest `<basename>-…` tag under `url`.
  pub fn latest_tag(&self, url: &str, basename: &str) -> CmtResult<String> {
    let entries = self.list(url)?;
    select_latest_tag(&entries, basename)?.ok_or_else(|| CmtError::not_found("tag", format!("{}-*", basename)))
  }

  /// Create a command with an isolated environment
  fn svn_cmd(&self) -> Command {
    let mut cmd = Command::new(&self.program);
    cmd.arg("--non-interactive");

    cmd.env_clear();
    for key in ["PATH", "HOME", "USER"] {
      if let Ok(value) = std::env::var(key) {
        cmd.env(key, value);
      }
    }
    // Stable, untranslated output
    cmd.env("LC_ALL", "C");
    cmd
  }
}

/// Pick the greatest tag named `<basename>-<version>`.
///
/// Versions compare field by field on their numeric runs, so
/// `Widget-00-10-00` beats `Widget-00-09-12`; ties fall back to plain text.
pub fn select_latest_tag(entries: &[String], basename: &str) -> CmtResult<Option<String>> {
  let digits = Regex::new(r"\d+")?;
  let prefix = format!("{}-", basename);

  let latest = entries
    .iter()
    .filter_map(|entry| entry.strip_prefix(&prefix).map(|version| (entry, version)))
    .map(|(entry, version)| {
      let key: Vec<u64> = digits
        .find_iter(version)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();
      (key, entry)
    })
    .max()
    .map(|(_, entry)| entry.clone());
  Ok(latest)
}
