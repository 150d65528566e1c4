use crate::core::error::{CmtError, CmtResult, ConfigError, ResultExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Project name used when neither the config nor `AtlasProject` names one
pub const DEFAULT_PROJECT: &str = "AtlasOffline";

/// Install root of the setup scripts on the shared filesystem
pub const DEFAULT_SETUP_ROOT: &str = "/afs/cern.ch/atlas/software/dist/AtlasSetup";

/// Configuration for cmtkit
/// Searched in order: cmtkit.toml, .cmtkit.toml, .config/cmtkit.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmtConfig {
  /// Release project to set up (overridden by `AtlasProject`)
  #[serde(default = "default_project")]
  pub project: String,

  /// Directory holding the setup distribution
  #[serde(default = "default_setup_root")]
  pub setup_root: PathBuf,

  /// Setup script; defaults to `<setup_root>/scripts/asetup.sh`
  #[serde(default)]
  pub setup_script: Option<PathBuf>,

  /// Source the setup script in a disposable shell instead of the session
  #[serde(default)]
  pub isolated_setup: bool,

  /// Shell used for sessions and wrapper scripts
  #[serde(default = "default_shell")]
  pub shell: PathBuf,

  /// Configuration tool executable, resolved on the session PATH
  #[serde(default = "default_tool")]
  pub tool: String,

  /// Version-control client used for tag listings
  #[serde(default = "default_vcs")]
  pub vcs: String,

  /// Deadline for one shell session response
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,

  /// Extra project name → release directory entries
  #[serde(default)]
  pub release_dirs: BTreeMap<String, String>,

  /// `[defaults]` block written into the generated `.asetup.cfg`
  #[serde(default = "default_setup_defaults")]
  pub setup_defaults: Vec<String>,
}

fn default_project() -> String {
  DEFAULT_PROJECT.to_string()
}

fn default_setup_root() -> PathBuf {
  PathBuf::from(DEFAULT_SETUP_ROOT)
}

fn default_shell() -> PathBuf {
  PathBuf::from("/bin/sh")
}

fn default_tool() -> String {
  "cmt.exe".to_string()
}

fn default_vcs() -> String {
  "svn".to_string()
}

fn default_timeout_secs() -> u64 {
  60
}

fn default_setup_defaults() -> Vec<String> {
  [
    "opt = True",
    "lang = C",
    "hastest = True  ## to prepend pwd to cmtpath",
    "pedantic = True",
    "runtime = True",
    "setup = True",
    "os = slc6",
    "save = True",
    "testarea=<pwd>",
  ]
  .iter()
  .map(|s| s.to_string())
  .collect()
}

impl Default for CmtConfig {
  fn default() -> Self {
    Self {
      project: default_project(),
      setup_root: default_setup_root(),
      setup_script: None,
      isolated_setup: false,
      shell: default_shell(),
      tool: default_tool(),
      vcs: default_vcs(),
      timeout_secs: default_timeout_secs(),
      release_dirs: BTreeMap::new(),
      setup_defaults: default_setup_defaults(),
    }
  }
}

impl CmtConfig {
  /// Find config file in search order: cmtkit.toml, .cmtkit.toml, .config/cmtkit.toml
  pub fn find_config_path(path: &Path) -> Option<PathBuf> {
    let candidates = vec![
      path.join("cmtkit.toml"),
      path.join(".cmtkit.toml"),
      path.join(".config").join("cmtkit.toml"),
    ];

    candidates.into_iter().find(|p| p.exists())
  }

  /// Load config from the working directory, falling back to defaults.
  ///
  /// `AtlasProject` in the process environment wins over the file.
  pub fn load(path: &Path) -> CmtResult<Self> {
    let mut config = match Self::find_config_path(path) {
      Some(config_path) => Self::load_file(&config_path)?,
      None => Self::default(),
    };

    if let Ok(project) = std::env::var("AtlasProject")
      && !project.is_empty()
    {
      config.project = project;
    }

    config.validate()?;
    Ok(config)
  }

  /// Parse one config file without applying environment overrides
  pub fn load_file(config_path: &Path) -> CmtResult<Self> {
    let content = fs::read_to_string(config_path)
      .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
    toml_edit::de::from_str(&content).map_err(|e| {
      CmtError::Config(ConfigError::Parse {
        path: config_path.to_path_buf(),
        message: e.to_string(),
      })
    })
  }

  pub fn validate(&self) -> CmtResult<()> {
    if self.shell.as_os_str().is_empty() {
      return Err(invalid("shell", "must not be empty"));
    }
    if self.tool.trim().is_empty() {
      return Err(invalid("tool", "must not be empty"));
    }
    if self.vcs.trim().is_empty() {
      return Err(invalid("vcs", "must not be empty"));
    }
    if self.timeout_secs == 0 {
      return Err(invalid("timeout_secs", "must be at least 1"));
    }
    Ok(())
  }

  /// Setup script path, derived from `setup_root` unless set explicitly
  pub fn setup_script_path(&self) -> PathBuf {
    self
      .setup_script
      .clone()
      .unwrap_or_else(|| self.setup_root.join("scripts").join("asetup.sh"))
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }

  /// Text of the `.asetup.cfg` file handed to the setup script
  pub fn render_setup_cfg(&self) -> String {
    let mut out = format!(
      "# generated by cmtkit on {}\n[defaults]\n",
      chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    for line in &self.setup_defaults {
      out.push_str(line);
      out.push('\n');
    }
    out
  }
}

fn invalid(field: &str, reason: &str) -> CmtError {
  CmtError::Config(ConfigError::InvalidField {
    field: field.to_string(),
    reason: reason.to_string(),
  })
}
