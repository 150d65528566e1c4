//! Error types for cmtkit with contextual messages and exit codes
//!
//! Every failure of the wrapped tool, the shell protocol or the project tree
//! maps onto one `CmtError` variant. Operations fail closed: a partial or
//! ambiguous result is always one of these errors, never an empty value.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Exit codes for cmtkit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
  /// User error (config, invalid args, unknown package)
  User = 1,
  /// System error (subprocess, shell protocol, I/O)
  System = 2,
  /// Validation failure (inconsistent project tree, malformed manifest)
  Validation = 3,
}

impl ExitCode {
  /// Convert to i32 for process exit
  pub fn as_i32(self) -> i32 {
    self as i32
  }
}

/// Main error type for cmtkit
#[derive(Debug)]
pub enum CmtError {
  /// A subprocess failed to start or exited non-zero where success was required
  Process {
    command: String,
    status: Option<i32>,
    output: String,
  },

  /// Sentinel markers missing or the shell went away mid-frame
  Protocol { message: String },

  /// A blocking read on a shell session exceeded its deadline
  ProtocolTimeout { operation: String, timeout: Duration },

  /// The project catalog did not yield exactly one root
  InconsistentTree { message: String },

  /// A `use` line did not split into the expected fields
  MalformedManifest { path: PathBuf, line: String },

  /// Package, tag or executable not found
  NotFound { what: &'static str, name: String },

  /// Configuration errors
  Config(ConfigError),

  /// I/O errors
  Io(io::Error),

  /// Several independent failures, in the order they happened
  Multi(MultiError),

  /// Generic error with message and optional context
  Message {
    message: String,
    context: Option<String>,
    help: Option<String>,
  },
}

impl CmtError {
  /// Create a simple error message
  pub fn message(msg: impl Into<String>) -> Self {
    CmtError::Message {
      message: msg.into(),
      context: None,
      help: None,
    }
  }

  /// Create an error with help text
  pub fn with_help(msg: impl Into<String>, help: impl Into<String>) -> Self {
    CmtError::Message {
      message: msg.into(),
      context: None,
      help: Some(help.into()),
    }
  }

  pub fn protocol(msg: impl Into<String>) -> Self {
    CmtError::Protocol { message: msg.into() }
  }

  pub fn inconsistent(msg: impl Into<String>) -> Self {
    CmtError::InconsistentTree { message: msg.into() }
  }

  pub fn not_found(what: &'static str, name: impl Into<String>) -> Self {
    CmtError::NotFound {
      what,
      name: name.into(),
    }
  }

  /// Add context to an existing error
  pub fn context(self, ctx: impl Into<String>) -> Self {
    let ctx_str = ctx.into();
    match self {
      CmtError::Message { message, context, help } => CmtError::Message {
        message,
        context: Some(context.map(|c| format!("{}\n{}", ctx_str, c)).unwrap_or(ctx_str)),
        help,
      },
      CmtError::Io(err) => CmtError::Message {
        message: format!("{}: {}", ctx_str, err),
        context: None,
        help: None,
      },
      _ => self,
    }
  }

  /// Get the appropriate exit code for this error
  pub fn exit_code(&self) -> ExitCode {
    match self {
      CmtError::Process { .. } => ExitCode::System,
      CmtError::Protocol { .. } => ExitCode::System,
      CmtError::ProtocolTimeout { .. } => ExitCode::System,
      CmtError::InconsistentTree { .. } => ExitCode::Validation,
      CmtError::MalformedManifest { .. } => ExitCode::Validation,
      CmtError::NotFound { .. } => ExitCode::User,
      CmtError::Config(_) => ExitCode::User,
      CmtError::Io(_) => ExitCode::System,
      CmtError::Multi(multi) => multi.errors.first().map(CmtError::exit_code).unwrap_or(ExitCode::System),
      CmtError::Message { .. } => ExitCode::User,
    }
  }

  /// Get contextual help message for this error
  pub fn help_message(&self) -> Option<String> {
    match self {
      CmtError::Config(e) => e.help_message(),
      CmtError::ProtocolTimeout { .. } => {
        Some("The shell stopped answering. Raise `timeout_secs` in cmtkit.toml if the setup is slow.".to_string())
      }
      CmtError::InconsistentTree { .. } => {
        Some("Run `cmtkit projects` to inspect the catalog reported by the configuration tool.".to_string())
      }
      CmtError::NotFound { what: "executable", .. } => {
        Some("Check that the setup script puts the tool on PATH.".to_string())
      }
      CmtError::Message { help, .. } => help.clone(),
      _ => None,
    }
  }
}

impl fmt::Display for CmtError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      CmtError::Process {
        command,
        status,
        output,
      } => {
        match status {
          Some(code) => write!(f, "Command failed with status {}: {}", code, command)?,
          None => write!(f, "Command failed: {}", command)?,
        }
        if !output.trim().is_empty() {
          write!(f, "\n{}", output.trim_end())?;
        }
        Ok(())
      }
      CmtError::Protocol { message } => write!(f, "Shell protocol error: {}", message),
      CmtError::ProtocolTimeout { operation, timeout } => {
        write!(f, "Shell protocol timeout after {:?} waiting for {}", timeout, operation)
      }
      CmtError::InconsistentTree { message } => write!(f, "Project tree inconsistency: {}", message),
      CmtError::MalformedManifest { path, line } => {
        write!(f, "Malformed requirements file [{}]: {:?}", path.display(), line)
      }
      CmtError::NotFound { what, name } => write!(f, "{} [{}] not found", what, name),
      CmtError::Config(e) => write!(f, "{}", e),
      CmtError::Io(e) => write!(f, "I/O error: {}", e),
      CmtError::Multi(e) => write!(f, "{}", e),
      CmtError::Message { message, context, .. } => {
        write!(f, "{}", message)?;
        if let Some(ctx) = context {
          write!(f, "\n{}", ctx)?;
        }
        Ok(())
      }
    }
  }
}

impl std::error::Error for CmtError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      CmtError::Io(e) => Some(e),
      _ => None,
    }
  }
}

impl From<io::Error> for CmtError {
  fn from(err: io::Error) -> Self {
    CmtError::Io(err)
  }
}

impl From<String> for CmtError {
  fn from(msg: String) -> Self {
    CmtError::message(msg)
  }
}

impl From<&str> for CmtError {
  fn from(msg: &str) -> Self {
    CmtError::message(msg)
  }
}

impl From<MultiError> for CmtError {
  fn from(err: MultiError) -> Self {
    CmtError::Multi(err)
  }
}

impl From<toml_edit::de::Error> for CmtError {
  fn from(err: toml_edit::de::Error) -> Self {
    CmtError::message(format!("TOML deserialization error: {}", err))
  }
}

impl From<serde_json::Error> for CmtError {
  fn from(err: serde_json::Error) -> Self {
    CmtError::message(format!("JSON error: {}", err))
  }
}

impl From<quick_xml::DeError> for CmtError {
  fn from(err: quick_xml::DeError) -> Self {
    CmtError::message(format!("XML decoding error: {}", err))
  }
}

impl From<glob::PatternError> for CmtError {
  fn from(err: glob::PatternError) -> Self {
    CmtError::message(format!("Glob pattern error: {}", err))
  }
}

impl From<glob::GlobError> for CmtError {
  fn from(err: glob::GlobError) -> Self {
    CmtError::message(format!("Glob error: {}", err))
  }
}

impl From<regex::Error> for CmtError {
  fn from(err: regex::Error) -> Self {
    CmtError::message(format!("Regex error: {}", err))
  }
}

impl From<std::string::FromUtf8Error> for CmtError {
  fn from(err: std::string::FromUtf8Error) -> Self {
    CmtError::message(format!("UTF-8 conversion error: {}", err))
  }
}

impl From<anyhow::Error> for CmtError {
  fn from(err: anyhow::Error) -> Self {
    CmtError::message(err.to_string())
  }
}

/// Ordered collection of independent failures.
///
/// Rendered as one `[i]: error` line per entry, in insertion order.
#[derive(Debug, Default)]
pub struct MultiError {
  pub errors: Vec<CmtError>,
}

impl MultiError {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, err: CmtError) {
    self.errors.push(err);
  }

  /// Collapse into a result: `Ok` when empty, the lone error when there is
  /// exactly one, `Multi` otherwise.
  pub fn into_result(mut self) -> CmtResult<()> {
    match self.errors.len() {
      0 => Ok(()),
      1 => Err(self.errors.remove(0)),
      _ => Err(CmtError::Multi(self)),
    }
  }

  /// Combine a set of results, keeping every failure.
  pub fn combine(results: impl IntoIterator<Item = CmtResult<()>>) -> CmtResult<()> {
    let mut multi = MultiError::new();
    for result in results {
      if let Err(err) = result {
        multi.push(err);
      }
    }
    multi.into_result()
  }
}

impl fmt::Display for MultiError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, err) in self.errors.iter().enumerate() {
      if i > 0 {
        writeln!(f)?;
      }
      write!(f, "[{}]: {}", i, err)?;
    }
    Ok(())
  }
}

impl std::error::Error for MultiError {}

/// Configuration-related errors
#[derive(Debug)]
pub enum ConfigError {
  /// A field has a value cmtkit cannot work with
  InvalidField { field: String, reason: String },

  /// Config file could not be parsed
  Parse { path: PathBuf, message: String },
}

impl ConfigError {
  fn help_message(&self) -> Option<String> {
    match self {
      ConfigError::InvalidField { field, .. } => Some(format!("Fix or remove `{}` in cmtkit.toml.", field)),
      ConfigError::Parse { .. } => Some("cmtkit.toml must be valid TOML; see the README for the keys.".to_string()),
    }
  }
}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigError::InvalidField { field, reason } => write!(f, "Invalid config field '{}': {}", field, reason),
      ConfigError::Parse { path, message } => write!(f, "Failed to parse {}: {}", path.display(), message),
    }
  }
}

/// Result type alias for cmtkit
pub type CmtResult<T> = Result<T, CmtError>;

/// Helper trait to add context to Results
pub trait ResultExt<T> {
  /// Add context to an error result
  fn context(self, ctx: impl Into<String>) -> CmtResult<T>;

  /// Add context using a closure (lazy evaluation)
  fn with_context<F>(self, f: F) -> CmtResult<T>
  where
    F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
  E: Into<CmtError>,
{
  fn context(self, ctx: impl Into<String>) -> CmtResult<T> {
    self.map_err(|e| e.into().context(ctx))
  }

  fn with_context<F>(self, f: F) -> CmtResult<T>
  where
    F: FnOnce() -> String,
  {
    self.map_err(|e| e.into().context(f()))
  }
}

/// Pretty-print an error to stderr with help text
pub fn print_error(error: &CmtError) {
  eprintln!("\n❌ {}\n", error);

  if let Some(help) = error.help_message() {
    eprintln!("💡 Help: {}\n", help);
  }
}
