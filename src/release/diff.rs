//! Package-level differences between two release tags
//!
//! Each tag gets its own setup, tool and DAG; every manifest along the DAG
//! is scanned and the declared uses are unioned into one map per tag. The
//! two pipelines run on separate threads and report over one channel.

use super::manifest::{MANIFEST_DIR, MANIFEST_FILE, Package, read_uses};
use crate::cmt::CmtTool;
use crate::core::config::CmtConfig;
use crate::core::error::{CmtError, CmtResult, MultiError};
use crate::graph::{Project, ProjectDag};
use crate::setup::Setup;
use crate::ui::{ScanBar, ScanProgress};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, mpsc};
use std::thread;
use tracing::{debug, error, info};

/// Package name → declaration
pub type PackageMap = BTreeMap<String, Package>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
  Old,
  New,
}

impl fmt::Display for Side {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Side::Old => write!(f, "old"),
      Side::New => write!(f, "new"),
    }
  }
}

/// One differing package, both sides present (absent = [`Package::none`])
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffRow {
  pub name: String,
  pub old: Package,
  pub new: Package,
}

/// Project label used in diff output: `AtlasCore` → `Core`
pub fn project_label(name: &str) -> &str {
  name.strip_prefix("Atlas").unwrap_or(name)
}

/// Union of all `use` declarations along the DAG.
///
/// Projects are scanned in parallel; the union is folded in DAG order so
/// a later declaration of a package replaces an earlier one. Broken manifests do not stop
/// the scan but fail it as a whole at the end.
pub fn release_packages(dag: &ProjectDag, progress: Option<&ScanBar>) -> CmtResult<PackageMap> {
  let projects: Vec<&Project> = dag.iter().collect();
  let scans: Vec<CmtResult<Vec<Package>>> = projects
    .into_par_iter()
    .map(|project| {
      let scan = scan_project(project);
      if let Some(bar) = progress {
        bar.inc();
      }
      scan
    })
    .collect();

  let mut packages = PackageMap::new();
  let mut failures = MultiError::new();
  for scan in scans {
    match scan {
      Ok(uses) => {
        for package in uses {
          packages.insert(package.name.clone(), package);
        }
      }
      Err(err) => failures.push(err),
    }
  }
  failures.into_result()?;
  Ok(packages)
}

/// Declarations of one project; empty unless exactly one `*Release`
/// directory exists under its install path.
fn scan_project(project: &Project) -> CmtResult<Vec<Package>> {
  let pattern = project.path.join("*Release");
  let matches: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())?.collect::<Result<_, _>>()?;
  let [release] = matches.as_slice() else {
    debug!(project = %project.name, candidates = matches.len(), "no unique release directory");
    return Ok(Vec::new());
  };
  let manifest = release.join(MANIFEST_DIR).join(MANIFEST_FILE);
  read_uses(&manifest, project_label(&project.name))
}

/// Rows for every package whose version differs or that exists on one side only, sorted by name.
pub fn diff(old: &PackageMap, new: &PackageMap) -> Vec<DiffRow> {
  let mut rows: BTreeMap<&str, DiffRow> = BTreeMap::new();

  for (name, before) in old {
    match new.get(name) {
      None => {
        rows.insert(
          name,
          DiffRow {
            name: name.clone(),
            old: before.clone(),
            new: Package::none(&before.project),
          },
        );
      }
      Some(after) if after.version != before.version => {
        rows.insert(
          name,
          DiffRow {
            name: name.clone(),
            old: before.clone(),
            new: after.clone(),
          },
        );
      }
      Some(_) => {}
    }
  }

  for (name, after) in new {
    if !old.contains_key(name) {
      rows.insert(
        name,
        DiffRow {
          name: name.clone(),
          old: Package::none(&after.project),
          new: after.clone(),
        },
      );
    }
  }

  rows.into_values().collect()
}

/// Run `pipeline` for both tags concurrently and diff the results.
///
/// The first failure is returned as soon as it arrives; the other pipeline
/// is left to finish on its own and its result is dropped.
pub fn diff_releases<F>(old_tag: &str, new_tag: &str, pipeline: F) -> CmtResult<Vec<DiffRow>>
where
  F: Fn(Side, &str) -> CmtResult<PackageMap> + Send + Sync + 'static,
{
  let pipeline = Arc::new(pipeline);
  let (tx, rx) = mpsc::channel::<(Side, CmtResult<PackageMap>)>();

  for (side, tag) in [(Side::Old, old_tag), (Side::New, new_tag)] {
    let tx = tx.clone();
    let pipeline = Arc::clone(&pipeline);
    let tag = tag.to_string();
    thread::Builder::new()
      .name(format!("cmtkit-{}-release", side))
      .spawn(move || {
        let result = pipeline(side, &tag);
        // Nobody listens any more once the sibling has failed.
        let _ = tx.send((side, result));
      })?;
  }
  drop(tx);

  let mut old = None;
  let mut new = None;
  for _ in 0..2 {
    let (side, result) = rx
      .recv()
      .map_err(|_| CmtError::protocol("release pipeline ended without reporting"))?;
    match result {
      Ok(packages) => match side {
        Side::Old => old = Some(packages),
        Side::New => new = Some(packages),
      },
      Err(err) => {
        let tag = match side {
          Side::Old => old_tag,
          Side::New => new_tag,
        };
        error!("setup of [{}] ({}) failed: {}", side, tag, err);
        return Err(err);
      }
    }
  }

  match (old, new) {
    (Some(old), Some(new)) => Ok(diff(&old, &new)),
    _ => Err(CmtError::protocol("release pipeline reported twice for one tag")),
  }
}

/// Tag differ running the real setup pipeline
pub struct ReleaseDiffer {
  config: CmtConfig,
  progress: Option<ScanProgress>,
}

impl ReleaseDiffer {
  pub fn new(config: CmtConfig) -> Self {
    Self { config, progress: None }
  }

  pub fn with_progress(mut self, progress: ScanProgress) -> Self {
    self.progress = Some(progress);
    self
  }

  pub fn run(&self, old_tag: &str, new_tag: &str) -> CmtResult<Vec<DiffRow>> {
    let config = self.config.clone();
    let progress = self.progress.clone();
    diff_releases(old_tag, new_tag, move |side, tag| {
      scan_release(&config, side, tag, progress.as_ref())
    })
  }
}

fn scan_release(config: &CmtConfig, side: Side, tag: &str, progress: Option<&ScanProgress>) -> CmtResult<PackageMap> {
  info!("setup {} env. [{}]", side, tag);
  Setup::new(config, tag)?.scoped(|setup| {
    let dag = CmtTool::new(setup)?.dag()?;
    let bar = progress.and_then(|p| p.add_bar(dag.len(), format!("scanning {} [{}]", side, tag)));
    let packages = release_packages(&dag, bar.as_ref())?;
    info!("{} [{}]: {} packages in {} projects", side, tag, packages.len(), dag.len());
    Ok(packages)
  })
}

/// Fixed-width table, one row per differing package.
pub fn render_table(rows: &[DiffRow]) -> String {
  let line = |a: &str, b: &str, c: &str, d: &str, e: &str| format!("{:<15} {:<15} | {:<15} {:<15} | {:<45}\n", a, b, c, d, e);
  let rule = format!("{}\n", "-".repeat(120));

  let mut out = line("old", "old-proj", "new", "new-project", "pkg-name");
  out.push_str(&rule);
  for row in rows {
    out.push_str(&line(
      &row.old.short_version(),
      &row.old.project,
      &row.new.short_version(),
      &row.new.project,
      &row.name,
    ));
  }
  out.push_str(&rule);
  out.push_str(&format!("::: found [{}] tags which are different\n", rows.len()));
  out
}
