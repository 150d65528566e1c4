//! `cmtkit tag-diff` - Package differences between two release tags

use crate::core::context::CmtContext;
use crate::core::error::CmtResult;
use crate::release::ReleaseDiffer;
use crate::release::diff::render_table;
use crate::ui::ScanProgress;

/// Run the tag-diff command
pub fn run_tag_diff(ctx: &CmtContext, old: String, new: String, json: bool) -> CmtResult<()> {
  let mut differ = ReleaseDiffer::new(ctx.config.as_ref().clone());
  if !json {
    differ = differ.with_progress(ScanProgress::new());
  }

  let rows = differ.run(&old, &new)?;

  if json {
    println!("{}", serde_json::to_string_pretty(&rows)?);
  } else if rows.is_empty() {
    println!("::: no tag differences between [{}] and [{}]", old, new);
  } else {
    print!("{}", render_table(&rows));
  }
  Ok(())
}
