//! `cmtkit find-pkg`, `cmtkit version` and `cmtkit checkout` - Package queries

use crate::cmt::CmtTool;
use crate::core::context::{CmtContext, EnvSource};
use crate::core::error::CmtResult;
use serde_json::json;

/// Run the find-pkg command
pub fn run_find_pkg(ctx: &CmtContext, source: EnvSource, name: String, json: bool) -> CmtResult<()> {
  let package = ctx
    .open_setup(&source)?
    .scoped(|setup| CmtTool::new(setup)?.package(&name))?;

  if json {
    let output = json!({
      "name": package.name,
      "base": package.base(),
      "group": package.dir(),
      "version": package.version,
      "project": package.project,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
  } else {
    println!("{} {} (project: {})", package.name, package.version, package.project);
  }
  Ok(())
}

/// Run the version command
pub fn run_version(ctx: &CmtContext, source: EnvSource, pkg: String) -> CmtResult<()> {
  let version = ctx
    .open_setup(&source)?
    .scoped(|setup| CmtTool::new(setup)?.package_version(&pkg))?;
  println!("{}", version);
  Ok(())
}

/// Run the checkout command
pub fn run_checkout(ctx: &CmtContext, source: EnvSource, pkg: String, revision: Option<String>) -> CmtResult<()> {
  ctx
    .open_setup(&source)?
    .scoped(|setup| CmtTool::new(setup)?.checkout(&pkg, revision.as_deref()))?;
  println!("## {} [OK]", pkg);
  Ok(())
}
