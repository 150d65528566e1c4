//! `cmtkit projects` and `cmtkit dag` - Inspect the project tree
//!
//! `projects` shows the catalog as the tool reports it (text, JSON or DOT);
//! `dag` shows the rooted traversal order every package lookup follows.

use crate::cmt::CmtTool;
use crate::core::context::{CmtContext, EnvSource};
use crate::core::error::{CmtError, CmtResult};
use crate::graph::{ProjectDag, Projects, RootStrategy};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectsFormat {
  Text,
  Json,
  Dot,
}

impl ProjectsFormat {
  pub fn from_flags(json: bool, dot: bool) -> CmtResult<Self> {
    match (json, dot) {
      (true, true) => Err(CmtError::message("--json and --dot are mutually exclusive")),
      (true, false) => Ok(Self::Json),
      (false, true) => Ok(Self::Dot),
      (false, false) => Ok(Self::Text),
    }
  }
}

/// Run the projects command
pub fn run_projects(ctx: &CmtContext, source: EnvSource, format: ProjectsFormat) -> CmtResult<()> {
  let projects = ctx.open_setup(&source)?.scoped(|setup| CmtTool::new(setup)?.projects())?;

  match format {
    ProjectsFormat::Text => display_projects_text(&projects),
    ProjectsFormat::Json => display_projects_json(&projects)?,
    ProjectsFormat::Dot => print!("{}", projects.to_dot()),
  }
  Ok(())
}

fn display_projects_text(projects: &Projects) {
  print!("{}", projects);

  let cycles = projects.find_cycles();
  if !cycles.is_empty() {
    println!();
    println!("⚠️  {} cycle(s) in 'uses':", cycles.len());
    for cycle in &cycles {
      println!("  🔄 {}", cycle.join(" → "));
    }
  }
}

fn display_projects_json(projects: &Projects) -> CmtResult<()> {
  let names = |ids: Vec<crate::graph::ProjectId>| -> Vec<String> {
    ids.into_iter().map(|id| projects.get(id).name.clone()).collect()
  };

  let entries: Vec<_> = projects
    .ids()
    .map(|id| {
      let project = projects.get(id);
      json!({
        "name": project.name,
        "version": project.version,
        "path": project.path,
        "order": project.order,
        "current": project.is_current,
        "uses": names(projects.uses(id)),
        "clients": names(projects.clients(id)),
      })
    })
    .collect();

  let output = json!({
    "projects": entries,
    "cycles": projects.find_cycles(),
  });
  println!("{}", serde_json::to_string_pretty(&output)?);
  Ok(())
}

/// Run the dag command
pub fn run_dag(ctx: &CmtContext, source: EnvSource, policy: String, json: bool) -> CmtResult<()> {
  let strategy: RootStrategy = policy.parse()?;
  let dag = ctx
    .open_setup(&source)?
    .scoped(|setup| CmtTool::with_strategy(setup, strategy)?.dag())?;

  for warning in dag.warnings() {
    eprintln!("⚠️  {}", warning);
  }

  if json {
    display_dag_json(&dag)
  } else {
    display_dag_text(&dag);
    Ok(())
  }
}

fn display_dag_text(dag: &ProjectDag) {
  println!(
    "root: {} {} (policy: {})",
    dag.root().name,
    dag.root().version,
    dag.policy()
  );
  for (i, project) in dag.iter().enumerate() {
    println!("{:>3}. {:<25} {:<12} {}", i + 1, project.name, project.version, project.path.display());
  }
}

fn display_dag_json(dag: &ProjectDag) -> CmtResult<()> {
  let order: Vec<_> = dag
    .iter()
    .map(|p| json!({ "name": p.name, "version": p.version, "path": p.path }))
    .collect();

  let output = json!({
    "root": dag.root().name,
    "policy": dag.policy().to_string(),
    "order": order,
    "warnings": dag.warnings(),
  });
  println!("{}", serde_json::to_string_pretty(&output)?);
  Ok(())
}
