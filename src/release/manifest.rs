//! Release manifests (`<project>/<Release dir>/cmt/requirements`)
//!
//! Only `use` declarations matter here:
//!
//! ```text
//! use <name> <version> [<group-path>]
//! ```

use crate::core::error::{CmtError, CmtResult, ResultExt};
use crate::graph::Project;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

pub const MANIFEST_DIR: &str = "cmt";
pub const MANIFEST_FILE: &str = "requirements";

/// Release package directory per project name; `<Name>Release` otherwise.
#[derive(Debug, Clone)]
pub struct ReleaseDirs {
  table: BTreeMap<String, String>,
}

impl ReleaseDirs {
  pub fn builtin() -> Self {
    let table = [
      ("LCGCMT", "LCG_Release"),
      ("dqm-common", "DQMCRelease"),
      ("tdaq-common", "TDAQCRelease"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    Self { table }
  }

  /// Built-in table with `overrides` layered on top
  pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Self {
    let mut dirs = Self::builtin();
    dirs.table.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    dirs
  }

  pub fn dir_for(&self, project: &str) -> String {
    self
      .table
      .get(project)
      .cloned()
      .unwrap_or_else(|| format!("{}Release", project))
  }

  pub fn manifest_path(&self, project: &Project) -> PathBuf {
    project
      .path
      .join(self.dir_for(&project.name))
      .join(MANIFEST_DIR)
      .join(MANIFEST_FILE)
  }
}

impl Default for ReleaseDirs {
  fn default() -> Self {
    Self::builtin()
  }
}

/// A named, versioned unit declared in a project manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
  /// Possibly path-qualified: `Control/AthenaCommon`
  pub name: String,
  pub version: String,
  pub project: String,
}

impl Package {
  /// Placeholder for the side of a diff where a package is absent
  pub fn none(project: impl Into<String>) -> Self {
    Self {
      name: "None".to_string(),
      version: "None-00-00-00".to_string(),
      project: project.into(),
    }
  }

  /// Last path component of the name
  pub fn base(&self) -> &str {
    self.name.rsplit('/').next().unwrap_or(&self.name)
  }

  /// Group path of the name; `.` when unqualified
  pub fn dir(&self) -> &str {
    match self.name.rfind('/') {
      Some(0) => "/",
      Some(idx) => &self.name[..idx],
      None => ".",
    }
  }

  /// Version with the `<base>-` prefix removed: `Widget-03-01-00` → `03-01-00`
  pub fn short_version(&self) -> String {
    self.version.replace(&format!("{}-", self.base()), "")
  }
}

impl fmt::Display for Package {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {} ({})", self.name, self.version, self.project)
  }
}

/// Fields after `use`, or `None` for any other line.
pub fn use_fields(line: &str) -> Option<Vec<&str>> {
  let rest = line.trim().strip_prefix("use")?;
  if !rest.is_empty() && !rest.starts_with([' ', '\t']) {
    return None;
  }
  Some(rest.split_whitespace().collect())
}

fn qualified(name: &str, group: Option<&str>) -> String {
  match group {
    Some(group) => format!("{}/{}", group.trim_end_matches('/'), name),
    None => name.to_string(),
  }
}

/// Strict form: exactly `name version` or `name version group`.
pub fn package_from_fields(fields: &[&str], project: &str, manifest: &Path, line: &str) -> CmtResult<Package> {
  match fields {
    [name, version] => Ok(Package {
      name: qualified(name, None),
      version: version.to_string(),
      project: project.to_string(),
    }),
    [name, version, group] => Ok(Package {
      name: qualified(name, Some(group)),
      version: version.to_string(),
      project: project.to_string(),
    }),
    _ => Err(CmtError::MalformedManifest {
      path: manifest.to_path_buf(),
      line: line.trim().to_string(),
    }),
  }
}

/// Every `use` declaration of a manifest, in file order.
///
/// Lenient form: a bare name gets version `*`, fields past the group are
/// ignored. Only a `use` with no name at all is malformed.
pub fn read_uses(manifest: &Path, project: &str) -> CmtResult<Vec<Package>> {
  let file = File::open(manifest).with_context(|| format!("Failed to open {}", manifest.display()))?;
  let mut packages = Vec::new();
  for line in BufReader::new(file).lines() {
    let line = line?;
    let Some(fields) = use_fields(&line) else {
      continue;
    };
    let package = match fields.as_slice() {
      [] => {
        return Err(CmtError::MalformedManifest {
          path: manifest.to_path_buf(),
          line: line.trim().to_string(),
        });
      }
      [name] => Package {
        name: qualified(name, None),
        version: "*".to_string(),
        project: project.to_string(),
      },
      [name, version] => Package {
        name: qualified(name, None),
        version: version.to_string(),
        project: project.to_string(),
      },
      [name, version, group, ..] => Package {
        name: qualified(name, Some(group)),
        version: version.to_string(),
        project: project.to_string(),
      },
    };
    tracing::trace!(manifest = %manifest.display(), package = %package, "use declaration");
    packages.push(package);
  }
  Ok(packages)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use tempfile::TempDir;

  #[test]
  fn test_release_dir_table() {
    let mut overrides = BTreeMap::new();
    overrides.insert("Gaudi".to_string(), "GaudiRelease_v2".to_string());
    let dirs = ReleaseDirs::with_overrides(&overrides);

    assert_eq!(dirs.dir_for("LCGCMT"), "LCG_Release");
    assert_eq!(dirs.dir_for("tdaq-common"), "TDAQCRelease");
    assert_eq!(dirs.dir_for("AtlasCore"), "AtlasCoreRelease");
    assert_eq!(dirs.dir_for("Gaudi"), "GaudiRelease_v2");
  }

  #[test]
  fn test_use_fields() {
    assert_eq!(use_fields("  use Widget Widget-03-01-00 Tools\r"), Some(vec!["Widget", "Widget-03-01-00", "Tools"]));
    assert_eq!(use_fields("use\tGaudi v21"), Some(vec!["Gaudi", "v21"]));
    assert_eq!(use_fields("use_if tag=x pkg=Widget"), None);
    assert_eq!(use_fields("# use Widget"), None);
    assert_eq!(use_fields("use"), Some(vec![]));
  }

  #[test]
  fn test_strict_parse() {
    let path = Path::new("/r/cmt/requirements");
    let two = package_from_fields(&["Widget", "3-1-0"], "A", path, "use Widget 3-1-0").unwrap();
    assert_eq!(
      two,
      Package {
        name: "Widget".into(),
        version: "3-1-0".into(),
        project: "A".into()
      }
    );

    let three = package_from_fields(&["Widget", "3-1-0", "Tools"], "A", path, "").unwrap();
    assert_eq!(three.name, "Tools/Widget");
    assert_eq!(three.base(), "Widget");
    assert_eq!(three.dir(), "Tools");

    let bad = package_from_fields(&["Widget"], "A", path, "use Widget").unwrap_err();
    assert!(matches!(bad, CmtError::MalformedManifest { .. }));
  }

  #[test]
  fn test_short_version() {
    let pkg = Package {
      name: "Tools/Widget".into(),
      version: "Widget-03-01-00".into(),
      project: "Core".into(),
    };
    assert_eq!(pkg.short_version(), "03-01-00");
    assert_eq!(Package::none("Core").short_version(), "00-00-00");
    assert_eq!(Package::none("Core").dir(), ".");
  }

  #[test]
  fn test_read_uses_lenient() {
    let temp = TempDir::new().unwrap();
    let manifest = temp.path().join("requirements");
    fs::write(
      &manifest,
      "package AtlasCoreRelease\n\nuse Widget Widget-03-01-00 Tools\nuse Gadget\n  use Gizmo Gizmo-00-00-01\n",
    )
    .unwrap();

    let uses = read_uses(&manifest, "Core").unwrap();
    let names: Vec<(&str, &str)> = uses.iter().map(|p| (p.name.as_str(), p.version.as_str())).collect();
    assert_eq!(
      names,
      vec![("Tools/Widget", "Widget-03-01-00"), ("Gadget", "*"), ("Gizmo", "Gizmo-00-00-01")]
    );
    assert!(uses.iter().all(|p| p.project == "Core"));
  }

  #[test]
  fn test_read_uses_missing_file() {
    assert!(read_uses(Path::new("/nonexistent/requirements"), "X").is_err());
  }
}
