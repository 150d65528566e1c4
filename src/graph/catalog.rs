//! Decoder for `cmt show projects -xml`
//!
//! The listing names edges by install path, and a project may reference one
//! that appears later in the document. Nodes are therefore created in a
//! first pass and edges resolved in a second one.

use super::projects::{LinkKind, Project, Projects};
use crate::core::error::{CmtError, CmtResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Catalog artifacts that are not real build units
pub const PSEUDO_PROJECTS: [&str; 2] = ["CMTHOME", "CMTUSERCONTEXT"];

#[derive(Debug, Deserialize)]
#[serde(rename = "projects")]
struct XmlCatalog {
  #[serde(rename = "project", default)]
  projects: Vec<XmlProject>,
}

#[derive(Debug, Deserialize)]
struct XmlProject {
  #[serde(rename = "@current", default)]
  current: Option<String>,
  #[serde(default)]
  name: String,
  #[serde(default)]
  order: i64,
  #[serde(default)]
  version: String,
  #[serde(rename = "cmtpath", alias = "path")]
  path: PathBuf,
  #[serde(default)]
  clients: Option<XmlRefs>,
  #[serde(default)]
  uses: Option<XmlRefs>,
}

#[derive(Debug, Default, Deserialize)]
struct XmlRefs {
  #[serde(rename = "project", default)]
  projects: Vec<XmlRef>,
}

#[derive(Debug, Deserialize)]
struct XmlRef {
  #[serde(default)]
  name: String,
  #[serde(rename = "cmtpath", alias = "path")]
  path: PathBuf,
}

/// Decode a project listing into the project arena.
pub fn parse_catalog(xml: &str) -> CmtResult<Projects> {
  let catalog: XmlCatalog = quick_xml::de::from_str(xml)?;
  let mut projects = Projects::new();

  for xp in &catalog.projects {
    let name = Project::name_from_path(&xp.path);
    if is_pseudo(&xp.name, &xp.path) {
      debug!(project = %name, "skipping pseudo project");
      continue;
    }
    projects.insert(Project {
      name,
      version: xp.version.clone(),
      path: xp.path.clone(),
      order: xp.order,
      is_current: xp.current.as_deref().is_some_and(|c| c.trim().eq_ignore_ascii_case("yes")),
    })?;
  }

  for xp in &catalog.projects {
    let Some(id) = projects.find(&xp.path) else {
      continue;
    };
    let lists = [(LinkKind::Client, &xp.clients), (LinkKind::Uses, &xp.uses)];
    for (kind, refs) in lists {
      let Some(refs) = refs else { continue };
      for (rank, r) in refs.projects.iter().enumerate() {
        match projects.find(&r.path) {
          Some(target) => projects.link(id, target, kind, rank),
          None if is_pseudo(&r.name, &r.path) => {}
          None => {
            return Err(CmtError::inconsistent(format!(
              "project [{}] references unknown project path [{}]",
              xp.path.display(),
              r.path.display()
            )));
          }
        }
      }
    }
  }

  Ok(projects)
}

fn is_pseudo(name: &str, path: &Path) -> bool {
  let derived = Project::name_from_path(path);
  PSEUDO_PROJECTS.iter().any(|p| *p == name.trim() || *p == derived)
}
