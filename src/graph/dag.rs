//! Rooted traversal of the project graph
//!
//! Two root policies exist because catalogs in the wild are not always
//! coherent:
//!
//! - **current**: the single project flagged current, walked through `clients`
//! - **orphan**: the single project with no clients but some uses, walked
//!   through `uses`
//!
//! `auto` tries both, prefers `current`, and reports when they disagree.

use super::projects::{LinkKind, Project, ProjectId, Projects};
use crate::core::error::{CmtError, CmtResult, MultiError};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootPolicy {
  CurrentFlag,
  Orphan,
}

impl RootPolicy {
  /// Edge kind followed from the root
  pub fn follows(self) -> LinkKind {
    match self {
      RootPolicy::CurrentFlag => LinkKind::Client,
      RootPolicy::Orphan => LinkKind::Uses,
    }
  }

  pub fn select(self, projects: &Projects) -> CmtResult<ProjectId> {
    match self {
      RootPolicy::CurrentFlag => {
        let current: Vec<ProjectId> = projects.ids().filter(|id| projects.get(*id).is_current).collect();
        match current.as_slice() {
          [root] => Ok(*root),
          _ => Err(CmtError::inconsistent(format!(
            "found [{}] current projects (expected exactly one)",
            current.len()
          ))),
        }
      }
      RootPolicy::Orphan => {
        let orphans: Vec<ProjectId> = projects
          .ids()
          .filter(|id| projects.clients(*id).is_empty() && !projects.uses(*id).is_empty())
          .collect();
        match orphans.as_slice() {
          [root] => Ok(*root),
          [] => Err(CmtError::inconsistent("no project without clients that uses others")),
          many => {
            let names: Vec<&str> = many.iter().map(|id| projects.get(*id).name.as_str()).collect();
            Err(CmtError::inconsistent(format!(
              "more than one root candidate: {}",
              names.join(", ")
            )))
          }
        }
      }
    }
  }
}

impl fmt::Display for RootPolicy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RootPolicy::CurrentFlag => write!(f, "current"),
      RootPolicy::Orphan => write!(f, "orphan"),
    }
  }
}

/// Root selection requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RootStrategy {
  #[default]
  Auto,
  Fixed(RootPolicy),
}

impl FromStr for RootStrategy {
  type Err = CmtError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "auto" => Ok(RootStrategy::Auto),
      "current" => Ok(RootStrategy::Fixed(RootPolicy::CurrentFlag)),
      "orphan" => Ok(RootStrategy::Fixed(RootPolicy::Orphan)),
      _ => Err(CmtError::with_help(
        format!("unknown root policy '{}'", s),
        "valid policies: auto, current, orphan",
      )),
    }
  }
}

/// Projects ordered by a depth-first walk from the root.
#[derive(Debug)]
pub struct ProjectDag {
  projects: Projects,
  root: ProjectId,
  policy: RootPolicy,
  order: Vec<ProjectId>,
  warnings: Vec<String>,
}

impl ProjectDag {
  pub fn build(projects: Projects, strategy: RootStrategy) -> CmtResult<Self> {
    if projects.is_empty() {
      return Err(CmtError::inconsistent("no projects found"));
    }

    let mut warnings = Vec::new();
    let (root, policy) = match strategy {
      RootStrategy::Fixed(policy) => (policy.select(&projects)?, policy),
      RootStrategy::Auto => {
        let by_flag = RootPolicy::CurrentFlag.select(&projects);
        let by_orphan = RootPolicy::Orphan.select(&projects);
        match (by_flag, by_orphan) {
          (Ok(flagged), Ok(orphan)) => {
            if flagged != orphan {
              let msg = format!(
                "current project [{}] differs from orphan root [{}]",
                projects.get(flagged).name,
                projects.get(orphan).name
              );
              warn!("{}", msg);
              warnings.push(msg);
            }
            (flagged, RootPolicy::CurrentFlag)
          }
          (Ok(flagged), Err(_)) => (flagged, RootPolicy::CurrentFlag),
          (Err(_), Ok(orphan)) => {
            let flagged = projects.ids().filter(|id| projects.get(*id).is_current).count();
            if flagged > 1 {
              let msg = format!(
                "[{}] projects flagged current, using orphan root [{}]",
                flagged,
                projects.get(orphan).name
              );
              warn!("{}", msg);
              warnings.push(msg);
            }
            (orphan, RootPolicy::Orphan)
          }
          (Err(a), Err(b)) => {
            let mut multi = MultiError::new();
            multi.push(a);
            multi.push(b);
            return Err(CmtError::Multi(multi));
          }
        }
      }
    };

    let order = walk(&projects, root, policy.follows());
    debug!(
      root = %projects.get(root).name,
      policy = %policy,
      reached = order.len(),
      total = projects.len(),
      "project dag built"
    );

    Ok(Self {
      projects,
      root,
      policy,
      order,
      warnings,
    })
  }

  pub fn root(&self) -> &Project {
    self.projects.get(self.root)
  }

  pub fn policy(&self) -> RootPolicy {
    self.policy
  }

  /// Projects in traversal order
  pub fn iter(&self) -> impl Iterator<Item = &Project> + '_ {
    self.order.iter().map(|id| self.projects.get(*id))
  }

  pub fn len(&self) -> usize {
    self.order.len()
  }

  /// Consistency notes gathered while picking the root
  pub fn warnings(&self) -> &[String] {
    &self.warnings
  }
}

/// Pre-order DFS; every node is emitted once even in diamonds or cycles.
fn walk(projects: &Projects, root: ProjectId, kind: LinkKind) -> Vec<ProjectId> {
  let mut order = Vec::new();
  let mut seen = HashSet::new();
  let mut stack = vec![root];

  while let Some(id) = stack.pop() {
    if !seen.insert(id) {
      continue;
    }
    order.push(id);
    for next in projects.neighbors(id, kind).into_iter().rev() {
      if !seen.contains(&next) {
        stack.push(next);
      }
    }
  }
  order
}
