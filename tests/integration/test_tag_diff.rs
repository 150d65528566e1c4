//! Tests for the `tag-diff` command

use crate::helpers::*;
use anyhow::Result;

fn two_releases() -> Result<TestRelease> {
  let release = TestRelease::new()?;
  release.add_standard_release(
    "rel_1",
    "use Gizmo Gizmo-00-00-01\nuse Widget Widget-02-00-00 Tools\n",
    "use Widget Widget-03-01-00 Tools\nuse Gadget Gadget-01-00-00\n",
  )?;
  release.add_standard_release(
    "rel_2",
    "use Gizmo Gizmo-00-00-01\n",
    "use Widget Widget-03-02-00 Tools\nuse Gadget Gadget-01-00-00\nuse Added Added-00-00-01\n",
  )?;
  Ok(release)
}

#[test]
fn test_tag_diff_json_rows() -> Result<()> {
  let release = two_releases()?;

  let output = run_cmtkit(&release.work, &["tag-diff", "rel_1", "rel_2", "--json"])?;
  let rows: serde_json::Value = serde_json::from_str(&stdout(&output))?;
  let rows = rows.as_array().expect("rows array");

  assert_eq!(rows.len(), 2);

  assert_eq!(rows[0]["name"], "Added");
  assert_eq!(rows[0]["old"]["version"], "None-00-00-00");
  assert_eq!(rows[0]["new"]["version"], "Added-00-00-01");
  assert_eq!(rows[0]["new"]["project"], "Offline");

  // rel_1 declares Widget in both projects; Offline comes later in the DAG
  assert_eq!(rows[1]["name"], "Tools/Widget");
  assert_eq!(rows[1]["old"]["version"], "Widget-03-01-00");
  assert_eq!(rows[1]["old"]["project"], "Offline");
  assert_eq!(rows[1]["new"]["version"], "Widget-03-02-00");
  assert_eq!(rows[1]["new"]["project"], "Offline");

  Ok(())
}

#[test]
fn test_tag_diff_table() -> Result<()> {
  let release = two_releases()?;

  let output = run_cmtkit(&release.work, &["tag-diff", "rel_1", "rel_2"])?;
  let out = stdout(&output);

  assert!(out.contains("pkg-name"));
  assert!(out.contains("00-00-01"));
  assert!(out.contains("Tools/Widget"));
  assert!(out.contains("::: found [2] tags which are different"));

  Ok(())
}

#[test]
fn test_tag_diff_identical_releases() -> Result<()> {
  let release = two_releases()?;

  let output = run_cmtkit(&release.work, &["tag-diff", "rel_1", "rel_1"])?;

  assert!(stdout(&output).contains("no tag differences between [rel_1] and [rel_1]"));

  Ok(())
}

#[test]
fn test_tag_diff_fails_when_one_side_fails() -> Result<()> {
  let release = two_releases()?;

  let output = run_cmtkit_raw(&release.work, &["tag-diff", "rel_1", "rel_404", "--json"])?;

  assert!(!output.status.success());
  assert!(stderr(&output).contains("unknown release [rel_404]"));
  assert!(stdout(&output).is_empty());

  Ok(())
}
