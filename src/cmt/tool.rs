//! Typed front-end to the configuration tool
//!
//! Every invocation runs inside the setup's shell session, so the tool sees
//! exactly the environment the release setup produced.

use crate::core::error::{CmtError, CmtResult};
use crate::env::protocol::shell_quote;
use crate::graph::{ProjectDag, Projects, RootStrategy, parse_catalog};
use crate::release::{Package, PackageResolver, ReleaseDirs};
use crate::setup::Setup;
use tracing::{debug, error, info, warn};

pub struct CmtTool<'a> {
  setup: &'a mut Setup,
  bin: String,
  dirs: ReleaseDirs,
  strategy: RootStrategy,
}

impl<'a> CmtTool<'a> {
  /// Locate the tool on the session PATH and check the project tree is usable.
  pub fn new(setup: &'a mut Setup) -> CmtResult<Self> {
    Self::with_strategy(setup, RootStrategy::Auto)
  }

  pub fn with_strategy(setup: &'a mut Setup, strategy: RootStrategy) -> CmtResult<Self> {
    let name = setup.config().tool.clone();
    let dirs = ReleaseDirs::with_overrides(&setup.config().release_dirs);

    let reply = setup.session().exec(&format!("command -v {}", shell_quote(&name)))?;
    let bin = reply.output.trim().to_string();
    if !reply.success() || bin.is_empty() {
      return Err(CmtError::not_found("executable", name));
    }
    debug!(bin = %bin, "configuration tool resolved");

    let mut tool = Self {
      setup,
      bin,
      dirs,
      strategy,
    };
    if tool.projects()?.is_empty() {
      return Err(CmtError::inconsistent("no projects found. corrupted environment?"));
    }
    Ok(tool)
  }

  pub fn bin(&self) -> &str {
    &self.bin
  }

  /// Check out `pkg` (full name, e.g. `Control/AthenaKernel`), at `version`
  /// when given and at the head otherwise.
  pub fn checkout(&mut self, pkg: &str, version: Option<&str>) -> CmtResult<()> {
    let args: Vec<&str> = match version {
      Some(version) if !version.is_empty() => vec!["co", "-r", version, pkg],
      _ => vec!["co", pkg],
    };
    match self.setup.session().run(&self.bin, &args) {
      Ok(_) => {
        info!("## {} [OK]", pkg);
        Ok(())
      }
      Err(err) => {
        error!("failed to issue {} {}", self.bin, args.join(" "));
        if let CmtError::Process { output, .. } = &err {
          warn!("{}", output);
        }
        Err(err)
      }
    }
  }

  /// Version of `pkg` as seen by the tool, ignoring the user's test area.
  pub fn package_version(&mut self, pkg: &str) -> CmtResult<String> {
    let out = self.run(&["show", "versions", pkg])?;
    let area = self.setup.session().get_variable("TestArea")?;
    debug!(test_area = %area, "resolving package version");

    out
      .lines()
      .filter(|line| !line.trim().is_empty())
      .find(|line| area.is_empty() || !line.contains(area.as_str()))
      .and_then(|line| line.split_whitespace().nth(1))
      .map(str::to_string)
      .ok_or_else(|| CmtError::not_found("package version", pkg))
  }

  /// `show <args...>`
  pub fn show(&mut self, args: &[&str]) -> CmtResult<String> {
    let mut full = vec!["show"];
    full.extend_from_slice(args);
    self.run(&full)
  }

  /// Unordered project tree
  pub fn projects(&mut self) -> CmtResult<Projects> {
    let xml = self.show(&["projects", "-xml"])?;
    parse_catalog(&xml)
  }

  /// Project tree rooted and ordered per the configured strategy
  pub fn dag(&mut self) -> CmtResult<ProjectDag> {
    let projects = self.projects()?;
    ProjectDag::build(projects, self.strategy)
  }

  /// First declaration of a package in DAG order
  pub fn package(&mut self, name: &str) -> CmtResult<Package> {
    let dag = self.dag()?;
    PackageResolver::new(&dag, &self.dirs).resolve(name)
  }

  fn run(&mut self, args: &[&str]) -> CmtResult<String> {
    debug!("running {} {}", self.bin, args.join(" "));
    match self.setup.session().run(&self.bin, args) {
      Ok(out) => {
        debug!(output = %out, "{} {}", self.bin, args.join(" "));
        Ok(out)
      }
      Err(err) => {
        error!("failed to issue {} {}", self.bin, args.join(" "));
        Err(err)
      }
    }
  }
}
