//! `cmtkit latest-tag` - Newest `<basename>-…` tag under a repository URL

use crate::core::context::CmtContext;
use crate::core::error::CmtResult;
use crate::vcs::SystemSvn;

/// Run the latest-tag command
pub fn run_latest_tag(ctx: &CmtContext, url: String, basename: String) -> CmtResult<()> {
  let tag = SystemSvn::new(ctx.config.vcs.clone()).latest_tag(&url, &basename)?;
  println!("{}", tag);
  Ok(())
}
