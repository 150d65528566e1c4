//! Tests for the `projects` and `dag` commands

use crate::helpers::*;
use anyhow::Result;

fn standard_release() -> Result<TestRelease> {
  let release = TestRelease::new()?;
  release.add_standard_release(
    "rel_1",
    "use Gizmo Gizmo-00-00-01\n",
    "use Widget Widget-03-01-00 Tools\n",
  )?;
  Ok(release)
}

#[test]
fn test_projects_text_lists_catalog() -> Result<()> {
  let release = standard_release()?;

  let output = run_cmtkit(&release.work, &["projects", "--tags", "rel_1"])?;
  let out = stdout(&output);

  assert!(out.contains("AtlasCore"));
  assert!(out.contains("AtlasOffline"));
  assert!(!out.contains("CMTUSERCONTEXT"));
  assert!(!out.contains("cycle"));

  Ok(())
}

#[test]
fn test_projects_json_has_links() -> Result<()> {
  let release = standard_release()?;

  let output = run_cmtkit(&release.work, &["projects", "--tags", "rel_1", "--json"])?;
  let json: serde_json::Value = serde_json::from_str(&stdout(&output))?;

  let projects = json["projects"].as_array().expect("projects array");
  assert_eq!(projects.len(), 2);

  let core = projects.iter().find(|p| p["name"] == "AtlasCore").expect("AtlasCore");
  assert_eq!(core["current"], true);
  assert_eq!(core["version"], "17.2.0");
  assert_eq!(core["clients"], serde_json::json!(["AtlasOffline"]));

  let offline = projects.iter().find(|p| p["name"] == "AtlasOffline").expect("AtlasOffline");
  assert_eq!(offline["current"], false);
  assert_eq!(offline["uses"], serde_json::json!(["AtlasCore"]));

  assert_eq!(json["cycles"], serde_json::json!([]));

  Ok(())
}

#[test]
fn test_projects_dot_output() -> Result<()> {
  let release = standard_release()?;

  let output = run_cmtkit(&release.work, &["projects", "--tags", "rel_1", "--dot"])?;
  let out = stdout(&output);

  assert!(out.starts_with("digraph"));
  assert!(out.contains("AtlasCore"));
  assert!(out.contains("->"));

  Ok(())
}

#[test]
fn test_projects_reports_uses_cycle() -> Result<()> {
  let release = TestRelease::new()?;
  release.add_release(
    "rel_1",
    &[
      ProjectSpec {
        name: "AtlasCore",
        current: true,
        uses: &["AtlasEvent"],
        clients: &["AtlasEvent"],
        requirements: "",
      },
      ProjectSpec {
        name: "AtlasEvent",
        current: false,
        uses: &["AtlasCore"],
        clients: &["AtlasCore"],
        requirements: "",
      },
    ],
  )?;

  let output = run_cmtkit(&release.work, &["projects", "--tags", "rel_1", "--json"])?;
  let json: serde_json::Value = serde_json::from_str(&stdout(&output))?;

  assert_eq!(json["cycles"], serde_json::json!([["AtlasCore", "AtlasEvent"]]));

  Ok(())
}

#[test]
fn test_dag_auto_prefers_current_flag() -> Result<()> {
  let release = standard_release()?;

  let output = run_cmtkit(&release.work, &["dag", "--tags", "rel_1"])?;
  let out = stdout(&output);

  assert!(out.contains("root: AtlasCore 17.2.0 (policy: current)"));
  assert!(out.contains("  1. AtlasCore"));
  assert!(out.contains("  2. AtlasOffline"));

  // The orphan policy would have picked AtlasOffline
  assert!(stderr(&output).contains("current project [AtlasCore] differs from orphan root [AtlasOffline]"));

  Ok(())
}

#[test]
fn test_dag_orphan_policy_walks_uses() -> Result<()> {
  let release = standard_release()?;

  let output = run_cmtkit(&release.work, &["dag", "--tags", "rel_1", "--policy", "orphan", "--json"])?;
  let json: serde_json::Value = serde_json::from_str(&stdout(&output))?;

  assert_eq!(json["root"], "AtlasOffline");
  assert_eq!(json["policy"], "orphan");
  let order: Vec<&str> = json["order"]
    .as_array()
    .expect("order array")
    .iter()
    .filter_map(|p| p["name"].as_str())
    .collect();
  assert_eq!(order, vec!["AtlasOffline", "AtlasCore"]);
  assert_eq!(json["warnings"], serde_json::json!([]));

  Ok(())
}

#[test]
fn test_dag_rejects_unknown_policy() -> Result<()> {
  let release = standard_release()?;

  let output = run_cmtkit_raw(&release.work, &["dag", "--tags", "rel_1", "--policy", "newest"])?;

  assert!(!output.status.success());
  assert!(stderr(&output).contains("newest"));

  Ok(())
}
