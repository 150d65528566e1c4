//! First-match package lookup along the DAG order

use super::manifest::{Package, ReleaseDirs, package_from_fields, use_fields};
use crate::core::error::{CmtError, CmtResult, ResultExt};
use crate::graph::ProjectDag;
use std::fs::File;
use std::io::{BufRead, BufReader};
use tracing::{debug, trace};

pub struct PackageResolver<'a> {
  dag: &'a ProjectDag,
  dirs: &'a ReleaseDirs,
}

impl<'a> PackageResolver<'a> {
  pub fn new(dag: &'a ProjectDag, dirs: &'a ReleaseDirs) -> Self {
    Self { dag, dirs }
  }

  /// Resolve `name` to the first matching `use` line in DAG order.
  ///
  /// The declared name only has to start with `name`. Projects without a
  /// manifest are skipped.
  pub fn resolve(&self, name: &str) -> CmtResult<Package> {
    if name.trim().is_empty() {
      return Err(CmtError::message("package name must not be empty"));
    }

    for project in self.dag.iter() {
      let manifest = self.dirs.manifest_path(project);
      if !manifest.is_file() {
        trace!(project = %project.name, manifest = %manifest.display(), "no manifest");
        continue;
      }

      let file = File::open(&manifest).with_context(|| format!("Failed to open {}", manifest.display()))?;
      for line in BufReader::new(file).lines() {
        let line = line.with_context(|| format!("Failed to read {}", manifest.display()))?;
        let Some(fields) = use_fields(&line) else {
          continue;
        };
        if !fields.first().is_some_and(|declared| declared.starts_with(name)) {
          continue;
        }
        let package = package_from_fields(&fields, &project.name, &manifest, &line)?;
        debug!(package = %package, manifest = %manifest.display(), "package resolved");
        return Ok(package);
      }
    }

    Err(CmtError::not_found("package", name))
  }
}
