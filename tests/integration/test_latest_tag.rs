//! Tests for the `latest-tag` command

use crate::helpers::*;
use anyhow::Result;

#[test]
fn test_latest_tag_compares_numerically() -> Result<()> {
  let release = TestRelease::new()?;

  let output = run_cmtkit(
    &release.work,
    &["latest-tag", "svn+ssh://svn.example.org/repo/Tools/Widget/tags", "Widget"],
  )?;

  assert_eq!(stdout(&output).trim(), "Widget-00-10-00");

  Ok(())
}

#[test]
fn test_latest_tag_without_matching_tags() -> Result<()> {
  let release = TestRelease::new()?;

  let output = run_cmtkit_raw(
    &release.work,
    &["latest-tag", "svn+ssh://svn.example.org/repo/Tools/Widget/tags", "Gadget"],
  )?;

  assert!(!output.status.success());
  assert!(stderr(&output).contains("not found"));

  Ok(())
}

#[test]
fn test_latest_tag_listing_failure() -> Result<()> {
  let release = TestRelease::new()?;

  let output = run_cmtkit_raw(&release.work, &["latest-tag", "svn+ssh://svn.example.org/repo/Nope", "Nope"])?;

  assert!(!output.status.success());
  assert!(stderr(&output).contains("E170000"));

  Ok(())
}
