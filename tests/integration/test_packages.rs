//! Tests for `find-pkg`, `version` and `checkout`

use crate::helpers::*;
use anyhow::Result;

const CORE: &str = "\
package AtlasCoreRelease
use Gizmo Gizmo-00-00-01
use Widget Widget-02-00-00 Tools
";

const OFFLINE: &str = "\
package AtlasOfflineRelease
use Widget Widget-03-01-00 Tools
use Gadget Gadget-01-00-00
";

fn standard_release() -> Result<TestRelease> {
  let release = TestRelease::new()?;
  release.add_standard_release("rel_1", CORE, OFFLINE)?;
  Ok(release)
}

#[test]
fn test_find_pkg_first_project_in_order_wins() -> Result<()> {
  let release = standard_release()?;

  let output = run_cmtkit(&release.work, &["find-pkg", "Widget", "--tags", "rel_1"])?;

  assert_eq!(
    stdout(&output).trim(),
    "Tools/Widget Widget-02-00-00 (project: AtlasCore)"
  );

  Ok(())
}

#[test]
fn test_find_pkg_json() -> Result<()> {
  let release = standard_release()?;

  let output = run_cmtkit(&release.work, &["find-pkg", "Gad", "--tags", "rel_1", "--json"])?;
  let json: serde_json::Value = serde_json::from_str(&stdout(&output))?;

  assert_eq!(json["name"], "Gadget");
  assert_eq!(json["version"], "Gadget-01-00-00");
  assert_eq!(json["project"], "AtlasOffline");
  assert_eq!(json["group"], ".");

  let output = run_cmtkit(&release.work, &["find-pkg", "Widget", "--tags", "rel_1", "--json"])?;
  let json: serde_json::Value = serde_json::from_str(&stdout(&output))?;
  assert_eq!(json["name"], "Tools/Widget");
  assert_eq!(json["base"], "Widget");
  assert_eq!(json["group"], "Tools");

  Ok(())
}

#[test]
fn test_find_pkg_unknown_package() -> Result<()> {
  let release = standard_release()?;

  let output = run_cmtkit_raw(&release.work, &["find-pkg", "Sprocket", "--tags", "rel_1"])?;

  assert!(!output.status.success());
  assert!(stderr(&output).contains("package [Sprocket] not found"));

  Ok(())
}

#[test]
fn test_find_pkg_malformed_manifest() -> Result<()> {
  let release = TestRelease::new()?;
  release.add_standard_release("rel_1", "use Widget Widget-02-00-00 Tools extra\n", OFFLINE)?;

  let output = run_cmtkit_raw(&release.work, &["find-pkg", "Widget", "--tags", "rel_1"])?;

  assert!(!output.status.success());
  assert!(stderr(&output).contains("Malformed requirements file"));

  Ok(())
}

#[test]
fn test_version_skips_test_area() -> Result<()> {
  let release = standard_release()?;

  let output = run_cmtkit(&release.work, &["version", "Widget", "--tags", "rel_1"])?;

  assert_eq!(stdout(&output).trim(), "Widget-03-01-00");

  Ok(())
}

#[test]
fn test_checkout_with_revision() -> Result<()> {
  let release = standard_release()?;

  let output = run_cmtkit(
    &release.work,
    &["checkout", "Tools/Widget", "-r", "Widget-03-01-00", "--tags", "rel_1"],
  )?;

  assert!(stdout(&output).contains("## Tools/Widget [OK]"));

  Ok(())
}

#[test]
fn test_checkout_failure_reports_tool_output() -> Result<()> {
  let release = standard_release()?;

  let output = run_cmtkit_raw(&release.work, &["checkout", "MissingPkg", "--tags", "rel_1"])?;

  assert!(!output.status.success());
  assert!(stderr(&output).contains("package MissingPkg not found"));

  Ok(())
}
