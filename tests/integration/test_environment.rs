//! Tests for `setup` and the environment selection shared by query commands

use crate::helpers::*;
use anyhow::Result;

const CORE: &str = "package AtlasCoreRelease\nuse Gizmo Gizmo-00-00-01\n";
const OFFLINE: &str = "package AtlasOfflineRelease\nuse Widget Widget-03-01-00 Tools\n";

#[test]
fn test_setup_reports_ready_environment() -> Result<()> {
  let release = TestRelease::new()?;
  release.add_standard_release("rel_1", CORE, OFFLINE)?;

  let output = run_cmtkit(&release.work, &["setup", "rel_1"])?;
  let out = stdout(&output);

  assert!(out.contains("::: setup env. [rel_1]..."));
  assert!(out.contains("AtlasOffline environment ready"));
  assert!(out.contains("cmt.exe"));

  Ok(())
}

#[test]
fn test_setup_prints_environment() -> Result<()> {
  let release = TestRelease::new()?;
  release.add_standard_release("rel_1", CORE, OFFLINE)?;

  let output = run_cmtkit(&release.work, &["setup", "rel_1", "--print-env"])?;
  let out = stdout(&output);

  assert!(out.contains("asetup.sh"));
  let release_line = format!("CMTKIT_FAKE_RELEASE={}", release.root.join("releases").join("rel_1").display());
  assert!(out.lines().any(|line| line == release_line));
  assert!(out.lines().any(|line| line == "AtlasProject=AtlasOffline"));

  Ok(())
}

#[test]
fn test_setup_unknown_tags_fails() -> Result<()> {
  let release = TestRelease::new()?;
  release.add_standard_release("rel_1", CORE, OFFLINE)?;

  let output = run_cmtkit_raw(&release.work, &["setup", "rel_9"])?;

  assert!(!output.status.success());
  assert!(stderr(&output).contains("unknown release [rel_9]"));

  Ok(())
}

#[test]
fn test_saved_environment_is_reusable() -> Result<()> {
  let release = TestRelease::new()?;
  release.add_standard_release("rel_1", CORE, OFFLINE)?;

  run_cmtkit(&release.work, &["setup", "rel_1", "--save", "env.json"])?;
  let saved = std::fs::read_to_string(release.work.join("env.json"))?;
  assert!(saved.contains("CMTKIT_FAKE_RELEASE"));

  // The cached environment answers without sourcing the setup script again
  std::fs::remove_file(release.root.join("asetup.sh"))?;
  let output = run_cmtkit(&release.work, &["find-pkg", "Gizmo", "--cache", "env.json"])?;
  assert!(stdout(&output).contains("Gizmo Gizmo-00-00-01 (project: AtlasCore)"));

  Ok(())
}

#[test]
fn test_cache_into_given_topdir() -> Result<()> {
  let release = TestRelease::new()?;
  release.add_standard_release("rel_1", CORE, OFFLINE)?;
  let topdir = release.root.join("area");
  std::fs::create_dir_all(&topdir)?;

  run_cmtkit(&release.work, &["setup", "rel_1", "--save", "env.json"])?;
  run_cmtkit(
    &release.work,
    &[
      "checkout",
      "Tools/Widget",
      "--cache",
      "env.json",
      "--topdir",
      topdir.to_str().unwrap(),
    ],
  )?;

  // A borrowed work area is kept after the command
  assert_eq!(std::fs::read_to_string(topdir.join("Tools/Widget/revision"))?.trim(), "head");

  Ok(())
}

#[test]
fn test_query_without_environment_fails_with_help() -> Result<()> {
  let release = TestRelease::new()?;

  let output = run_cmtkit_raw(&release.work, &["projects"])?;

  assert!(!output.status.success());
  let err = stderr(&output);
  assert!(err.contains("no release environment given"));
  assert!(err.contains("--cache"));

  Ok(())
}

#[test]
fn test_tags_and_cache_conflict() -> Result<()> {
  let release = TestRelease::new()?;

  let output = run_cmtkit_raw(&release.work, &["projects", "--tags", "rel_1", "--cache", "env.json"])?;

  assert!(!output.status.success());
  assert!(stderr(&output).contains("cannot be used with"));

  Ok(())
}
