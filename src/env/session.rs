//! Persistent shell session with sentinel-framed request/response
//!
//! One `/bin/sh` subprocess, stdin written by the caller, stdout drained by
//! a single background thread that republishes raw chunks on a channel.
//! Chunks carry no message boundaries, so every query is wrapped in a fresh
//! begin/end sentinel pair and the caller accumulates chunks until both have
//! been seen. Bytes in front of the begin marker belong to an earlier,
//! abandoned exchange and are dropped.
//!
//! Programs started through [`ShellSession::run`] write stderr to a file in
//! the session's scratch directory, so diagnostics never mix with the
//! output callers parse.
//!
//! All queries take `&mut self`: one request in flight per session.

use super::protocol::{Sentinel, parse_env_dump, shell_join, shell_quote, validate_key};
use crate::core::error::{CmtError, CmtResult};
use crate::core::error::ResultExt;
use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing::{debug, trace, warn};

/// Output and exit status of one framed exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
  pub status: i32,
  pub output: String,
}

impl Reply {
  pub fn success(&self) -> bool {
    self.status == 0
  }
}

pub struct ShellSession {
  child: Child,
  stdin: Option<ChildStdin>,
  responses: Receiver<Vec<u8>>,
  pending: Vec<u8>,
  timeout: Duration,
  shell: PathBuf,
  scratch: TempDir,
}

impl ShellSession {
  /// Start `shell` with the current process environment.
  pub fn spawn(shell: &Path, timeout: Duration) -> CmtResult<Self> {
    let mut cmd = Command::new(shell);
    cmd.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::null());

    let mut child = cmd.spawn().map_err(|e| CmtError::Process {
      command: shell.display().to_string(),
      status: None,
      output: e.to_string(),
    })?;

    let scratch = tempfile::Builder::new()
      .prefix("cmtkit-sh-")
      .tempdir()
      .context("Failed to create shell scratch directory")?;

    let stdin = child.stdin.take();
    let stdout = child
      .stdout
      .take()
      .ok_or_else(|| CmtError::protocol("shell stdout was not captured"))?;

    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
      .name("cmtkit-shell-reader".to_string())
      .spawn(move || drain(stdout, tx))?;

    let mut session = Self {
      child,
      stdin,
      responses: rx,
      pending: Vec::new(),
      timeout,
      shell: shell.to_path_buf(),
      scratch,
    };
    // Route the shell's own diagnostics into the framed stream.
    session.write_line("exec 2>&1")?;
    debug!(shell = %shell.display(), pid = session.child.id(), "started shell session");
    Ok(session)
  }

  /// `export key=value`; no acknowledgement is read.
  pub fn set_variable(&mut self, key: &str, value: &str) -> CmtResult<()> {
    validate_key(key)?;
    self.write_line(&format!("export {}={}", key, shell_quote(value)))
  }

  /// Current value of `key` in the session, empty when unset.
  pub fn get_variable(&mut self, key: &str) -> CmtResult<String> {
    validate_key(key)?;
    let reply = self.exchange(&format!("get ${}", key), &format!("printf '%s\\n' \"${{{}}}\"", key))?;
    Ok(reply.output.trim_end_matches(['\n', '\r']).to_string())
  }

  /// Source `path` with `args` as positional parameters.
  ///
  /// The sourced script's variables stay in the session. A non-zero status
  /// is returned, not raised; callers decide what failure means.
  pub fn source_script<S: AsRef<str>>(&mut self, path: &Path, args: &[S]) -> CmtResult<Reply> {
    let path_str = path.to_string_lossy();
    let mut body = String::from("set --");
    for arg in args {
      body.push(' ');
      body.push_str(&shell_quote(arg.as_ref()));
    }
    body.push_str(&format!("; . {}", shell_quote(&path_str)));
    self.exchange(&format!("source {}", path_str), &body)
  }

  /// Run a program inside the session and return its stdout.
  ///
  /// Stderr is kept apart: logged on success, appended to the
  /// [`CmtError::Process`] output on failure.
  pub fn run<S: AsRef<str>>(&mut self, program: &str, args: &[S]) -> CmtResult<String> {
    let mut words = vec![program.to_string()];
    words.extend(args.iter().map(|a| a.as_ref().to_string()));
    let command = words.join(" ");

    let stderr_path = self.scratch.path().join("stderr");
    let body = format!(
      "{} 2>{}",
      shell_join(&words),
      shell_quote(&stderr_path.to_string_lossy())
    );
    let reply = self.exchange(&command, &body)?;
    let stderr = match fs::read_to_string(&stderr_path) {
      Ok(text) => text,
      Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
      Err(e) => return Err(CmtError::from(e).context(format!("Failed to read stderr of {}", command))),
    };

    if !reply.success() {
      let mut output = reply.output;
      if !stderr.is_empty() {
        if !output.is_empty() && !output.ends_with('\n') {
          output.push('\n');
        }
        output.push_str(&stderr);
      }
      return Err(CmtError::Process {
        command,
        status: Some(reply.status),
        output,
      });
    }
    if !stderr.trim().is_empty() {
      debug!(command = %command, stderr = %stderr.trim_end(), "program diagnostics");
    }
    Ok(reply.output)
  }

  /// Run a raw shell snippet, framed like every other query.
  pub fn exec(&mut self, snippet: &str) -> CmtResult<Reply> {
    self.exchange(snippet, snippet)
  }

  pub fn chdir(&mut self, dir: &Path) -> CmtResult<()> {
    let dir_str = dir.to_string_lossy();
    let reply = self.exchange(&format!("cd {}", dir_str), &format!("cd {}", shell_quote(&dir_str)))?;
    if !reply.success() {
      return Err(CmtError::Process {
        command: format!("cd {}", dir_str),
        status: Some(reply.status),
        output: reply.output,
      });
    }
    Ok(())
  }

  pub fn getwd(&mut self) -> CmtResult<PathBuf> {
    let reply = self.exchange("pwd", "pwd")?;
    Ok(PathBuf::from(reply.output.trim_end_matches(['\n', '\r'])))
  }

  /// Every exported variable of the session, `_` excluded.
  pub fn environ(&mut self) -> CmtResult<Vec<(String, String)>> {
    let reply = self.exchange("env", "env")?;
    if !reply.success() {
      return Err(CmtError::Process {
        command: "env".to_string(),
        status: Some(reply.status),
        output: reply.output,
      });
    }
    Ok(parse_env_dump(&reply.output))
  }

  /// Terminate the shell. The session is unusable afterwards.
  pub fn close(mut self) -> CmtResult<()> {
    self.shutdown()
  }

  fn exchange(&mut self, operation: &str, body: &str) -> CmtResult<Reply> {
    let sentinel = Sentinel::fresh();
    let script = format!(
      "printf '%s\\n' {begin}\n{{ {body}\n}}\n__cmtkit_rc=$?\nprintf '%s %s\\n' {end} \"$__cmtkit_rc\"",
      begin = shell_quote(&sentinel.begin),
      end = shell_quote(&sentinel.end),
      body = body,
    );
    trace!(operation, "shell request");
    self.write_line(&script)?;
    self.receive(operation, &sentinel)
  }

  fn receive(&mut self, operation: &str, sentinel: &Sentinel) -> CmtResult<Reply> {
    let deadline = Instant::now() + self.timeout;
    loop {
      if let Some(reply) = extract_frame(&mut self.pending, sentinel)? {
        trace!(operation, status = reply.status, "shell reply");
        return Ok(reply);
      }

      let remaining = deadline.saturating_duration_since(Instant::now());
      if remaining.is_zero() {
        return Err(self.timed_out(operation));
      }
      match self.responses.recv_timeout(remaining) {
        Ok(chunk) => self.pending.extend_from_slice(&chunk),
        Err(RecvTimeoutError::Timeout) => return Err(self.timed_out(operation)),
        Err(RecvTimeoutError::Disconnected) => {
          let tail = String::from_utf8_lossy(&self.pending).into_owned();
          self.pending.clear();
          return Err(CmtError::protocol(format!(
            "shell exited while waiting for `{}`{}",
            operation,
            if tail.trim().is_empty() {
              String::new()
            } else {
              format!("; last output:\n{}", tail.trim_end())
            }
          )));
        }
      }
    }
  }

  fn timed_out(&self, operation: &str) -> CmtError {
    warn!(operation, timeout = ?self.timeout, "shell session did not answer in time");
    CmtError::ProtocolTimeout {
      operation: operation.to_string(),
      timeout: self.timeout,
    }
  }

  fn write_line(&mut self, line: &str) -> CmtResult<()> {
    let stdin = self
      .stdin
      .as_mut()
      .ok_or_else(|| CmtError::protocol("shell session is closed"))?;
    let write = stdin
      .write_all(line.as_bytes())
      .and_then(|_| stdin.write_all(b"\n"))
      .and_then(|_| stdin.flush());
    write.map_err(|e| CmtError::protocol(format!("failed to write to {}: {}", self.shell.display(), e)))
  }

  fn shutdown(&mut self) -> CmtResult<()> {
    if let Some(mut stdin) = self.stdin.take() {
      // Best effort: the shell may already be gone.
      let _ = stdin.write_all(b"exit 0\n");
    }

    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
      match self.child.try_wait()? {
        Some(status) => {
          debug!(pid = self.child.id(), ?status, "shell session exited");
          return Ok(());
        }
        None if Instant::now() >= deadline => break,
        None => thread::sleep(Duration::from_millis(10)),
      }
    }

    warn!(pid = self.child.id(), "shell session did not exit, killing it");
    match self.child.kill() {
      Ok(()) => {}
      Err(e) if e.kind() == ErrorKind::InvalidInput => {}
      Err(e) => return Err(e.into()),
    }
    self.child.wait()?;
    Ok(())
  }
}

impl Drop for ShellSession {
  fn drop(&mut self) {
    if self.stdin.is_some()
      && let Err(e) = self.shutdown()
    {
      warn!("failed to stop shell session: {}", e);
    }
  }
}

/// Background reader: forward every chunk until EOF or until nobody listens.
fn drain(mut stdout: impl Read, tx: mpsc::Sender<Vec<u8>>) {
  let mut buf = [0u8; 4096];
  loop {
    match stdout.read(&mut buf) {
      Ok(0) => break,
      Ok(n) => {
        if tx.send(buf[..n].to_vec()).is_err() {
          break;
        }
      }
      Err(e) if e.kind() == ErrorKind::Interrupted => continue,
      Err(_) => break,
    }
  }
}

/// Cut one complete frame for `sentinel` out of `pending`.
///
/// Returns `None` until the begin line, the end marker and the status line
/// terminator are all present. Consumed bytes (including stale output in
/// front of the begin marker) are removed; anything after the frame stays.
fn extract_frame(pending: &mut Vec<u8>, sentinel: &Sentinel) -> CmtResult<Option<Reply>> {
  let begin_line = format!("{}\n", sentinel.begin);
  let Some(begin_at) = find(pending, begin_line.as_bytes()) else {
    return Ok(None);
  };
  let body_start = begin_at + begin_line.len();

  let Some(end_rel) = find(&pending[body_start..], sentinel.end.as_bytes()) else {
    return Ok(None);
  };
  let end_at = body_start + end_rel;
  let status_start = end_at + sentinel.end.len();

  let Some(nl_rel) = pending[status_start..].iter().position(|&b| b == b'\n') else {
    return Ok(None);
  };
  let frame_end = status_start + nl_rel + 1;

  let status_text = String::from_utf8_lossy(&pending[status_start..frame_end]).trim().to_string();
  let status = status_text
    .parse::<i32>()
    .map_err(|_| CmtError::protocol(format!("unreadable exit status {:?} after end marker", status_text)))?;
  let output = String::from_utf8_lossy(&pending[body_start..end_at]).into_owned();

  if begin_at > 0 {
    debug!(bytes = begin_at, "discarding shell output from an earlier exchange");
  }
  pending.drain(..frame_end);

  Ok(Some(Reply { status, output }))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
  if needle.is_empty() || haystack.len() < needle.len() {
    return None;
  }
  haystack.windows(needle.len()).position(|w| w == needle)
}
