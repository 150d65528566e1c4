//! Framing helpers shared by the shell session and the one-shot sourcer
//!
//! A shell has no structured IPC: everything comes back as one byte stream.
//! Each exchange is therefore bracketed by tokens nobody else prints, and a
//! response only counts once both brackets have been seen.

use crate::core::error::{CmtError, CmtResult};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};

static SENTINEL_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A pair of unique begin/end markers for one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentinel {
  pub begin: String,
  pub end: String,
}

impl Sentinel {
  /// Derive a fresh token from the process id, a counter and the clock.
  pub fn fresh() -> Self {
    let token = fresh_token();
    Self {
      begin: format!("@@CMTKIT:{}:BEGIN@@", token),
      end: format!("@@CMTKIT:{}:END@@", token),
    }
  }

  /// Single marker printed twice around an environment dump
  pub fn markup() -> String {
    format!("=== CMTKIT {} ===", fresh_token())
  }
}

fn fresh_token() -> String {
  let count = SENTINEL_COUNTER.fetch_add(1, Ordering::Relaxed);
  let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();

  let mut hasher = Sha256::new();
  hasher.update(std::process::id().to_le_bytes());
  hasher.update(count.to_le_bytes());
  hasher.update(nanos.to_le_bytes());
  let digest = hasher.finalize();

  digest.iter().take(8).map(|b| format!("{:02x}", b)).collect()
}

/// Quote a word for POSIX sh using single quotes.
pub fn shell_quote(word: &str) -> String {
  if !word.is_empty()
    && word
      .bytes()
      .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'/' | b'.' | b'_' | b'-' | b'=' | b',' | b':' | b'+' | b'@'))
  {
    return word.to_string();
  }
  format!("'{}'", word.replace('\'', r"'\''"))
}

/// Join words into one shell command line.
pub fn shell_join<S: AsRef<str>>(words: &[S]) -> String {
  words.iter().map(|w| shell_quote(w.as_ref())).collect::<Vec<_>>().join(" ")
}

/// Check that `key` is usable as a shell variable name.
pub fn validate_key(key: &str) -> CmtResult<()> {
  let mut chars = key.chars();
  let valid = match chars.next() {
    Some(c) if c.is_ascii_alphabetic() || c == '_' => chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
    _ => false,
  };
  if valid {
    Ok(())
  } else {
    Err(CmtError::message(format!("Invalid environment variable name {:?}", key)))
  }
}

/// Parse `KEY=VALUE` lines as printed by `env`.
///
/// Splits on the first `=` only and drops `_`. A line without `=` continues
/// the previous value (multi-line values).
pub fn parse_env_dump(text: &str) -> Vec<(String, String)> {
  let mut pairs: Vec<(String, String)> = Vec::new();
  for line in text.lines() {
    let line = line.strip_suffix('\r').unwrap_or(line);
    match line.split_once('=') {
      Some((key, value)) if validate_key(key).is_ok() => pairs.push((key.to_string(), value.to_string())),
      _ => {
        if let Some((_, value)) = pairs.last_mut() {
          value.push('\n');
          value.push_str(line);
        }
      }
    }
  }
  pairs.retain(|(key, _)| key != "_");
  pairs
}

/// Return the text strictly between the first two occurrences of `markup`.
pub fn between_markers<'a>(output: &'a str, markup: &str) -> CmtResult<&'a str> {
  let start = output
    .find(markup)
    .ok_or_else(|| CmtError::protocol("opening marker missing from captured output"))?;
  let rest = &output[start + markup.len()..];
  let stop = rest
    .find(markup)
    .ok_or_else(|| CmtError::protocol("closing marker missing from captured output"))?;
  Ok(&rest[..stop])
}
