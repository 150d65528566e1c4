//! Project nodes and their `uses`/`clients` edges
//!
//! ## Graph Structure
//!
//! - **Arena**: every `Project` lives in one petgraph `DiGraph`; edges are
//!   node indices, never owning references
//! - **Edges**: `A -Uses-> B` (A depends on B) and `A -Client-> C` (C depends
//!   on A), both kept as listed in the catalog since the two lists are not
//!   guaranteed to mirror each other
//! - **Order**: each edge carries its position in the catalog list, so
//!   neighbour queries come back in catalog order
//! - **Index**: install path → node

use crate::core::error::{CmtError, CmtResult};
use petgraph::Direction;
use petgraph::algo;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

pub type ProjectId = NodeIndex;

/// A coarse-grained installed release unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
  pub name: String,
  pub version: String,
  /// Install path; also the catalog key
  pub path: PathBuf,
  pub order: i64,
  pub is_current: bool,
}

impl Project {
  /// Name as derived from an install path: `/x/AtlasCore/17.0.1` → `AtlasCore`
  pub fn name_from_path(path: &Path) -> String {
    path
      .parent()
      .and_then(Path::file_name)
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_default()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
  Uses,
  Client,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
  pub kind: LinkKind,
  /// Position in the catalog list this edge came from
  pub rank: usize,
}

#[derive(Debug, Default)]
pub struct Projects {
  graph: DiGraph<Project, Link>,
  by_path: BTreeMap<PathBuf, ProjectId>,
}

impl Projects {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a node. Install paths must be unique.
  pub fn insert(&mut self, project: Project) -> CmtResult<ProjectId> {
    if self.by_path.contains_key(&project.path) {
      return Err(CmtError::inconsistent(format!(
        "project path [{}] listed twice",
        project.path.display()
      )));
    }
    let path = project.path.clone();
    let id = self.graph.add_node(project);
    self.by_path.insert(path, id);
    Ok(id)
  }

  pub fn link(&mut self, from: ProjectId, to: ProjectId, kind: LinkKind, rank: usize) {
    self.graph.add_edge(from, to, Link { kind, rank });
  }

  pub fn find(&self, path: &Path) -> Option<ProjectId> {
    self.by_path.get(path).copied()
  }

  pub fn get(&self, id: ProjectId) -> &Project {
    &self.graph[id]
  }

  pub fn len(&self) -> usize {
    self.graph.node_count()
  }

  pub fn is_empty(&self) -> bool {
    self.graph.node_count() == 0
  }

  /// Node ids in install-path order
  pub fn ids(&self) -> impl Iterator<Item = ProjectId> + '_ {
    self.by_path.values().copied()
  }

  /// Projects `id` depends on, in catalog order
  pub fn uses(&self, id: ProjectId) -> Vec<ProjectId> {
    self.neighbors(id, LinkKind::Uses)
  }

  /// Projects depending on `id`, in catalog order
  pub fn clients(&self, id: ProjectId) -> Vec<ProjectId> {
    self.neighbors(id, LinkKind::Client)
  }

  pub fn neighbors(&self, id: ProjectId, kind: LinkKind) -> Vec<ProjectId> {
    let mut edges: Vec<(usize, ProjectId)> = self
      .graph
      .edges_directed(id, Direction::Outgoing)
      .filter(|e| e.weight().kind == kind)
      .map(|e| (e.weight().rank, e.target()))
      .collect();
    edges.sort_by_key(|(rank, _)| *rank);
    edges.into_iter().map(|(_, target)| target).collect()
  }

  /// Human-readable one-liner with neighbour names
  pub fn describe(&self, id: ProjectId) -> String {
    let names = |ids: Vec<ProjectId>| ids.into_iter().map(|i| self.graph[i].name.clone()).collect::<Vec<_>>();
    let project = &self.graph[id];
    format!(
      "Project{{name={:?}, version={:?}, clients={:?}, uses={:?}}}",
      project.name,
      project.version,
      names(self.clients(id)),
      names(self.uses(id))
    )
  }

  /// Detect cycles in the `uses` relation using Tarjan's SCC algorithm.
  ///
  /// Returns components with more than one project, names sorted.
  pub fn find_cycles(&self) -> Vec<Vec<String>> {
    let uses_only = self.graph.filter_map(
      |_, project| Some(project.name.clone()),
      |_, link| (link.kind == LinkKind::Uses).then_some(()),
    );

    let mut cycles: Vec<Vec<String>> = algo::tarjan_scc(&uses_only)
      .into_iter()
      .filter(|component| component.len() > 1)
      .map(|component| {
        let mut names: Vec<String> = component.into_iter().map(|idx| uses_only[idx].clone()).collect();
        names.sort();
        names
      })
      .collect();
    cycles.sort();
    cycles
  }

  /// Export graph to DOT format (Graphviz).
  ///
  /// `uses` edges are solid, `clients` edges dashed; the current project is
  /// filled.
  pub fn to_dot(&self) -> String {
    use petgraph::dot::{Config, Dot};

    let dot = Dot::with_attr_getters(
      &self.graph,
      &[Config::EdgeNoLabel, Config::NodeNoLabel],
      &|_, edge_ref| match edge_ref.weight().kind {
        LinkKind::Uses => String::new(),
        LinkKind::Client => "style=dashed color=gray".to_string(),
      },
      &|_, (_idx, project)| {
        if project.is_current {
          format!(
            "label=\"{} {}\" shape=box style=filled fillcolor=lightblue",
            project.name, project.version
          )
        } else {
          format!("label=\"{} {}\" shape=box", project.name, project.version)
        }
      },
    );

    format!("{:?}", dot)
  }
}

impl fmt::Display for Projects {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for id in self.ids() {
      writeln!(f, "{}", self.describe(id))?;
    }
    Ok(())
  }
}
