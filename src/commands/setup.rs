//! `cmtkit setup` - Build a release environment, optionally saving it

use crate::cmt::CmtTool;
use crate::core::context::CmtContext;
use crate::core::error::{CmtResult, ResultExt};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

/// Run the setup command
pub fn run_setup(ctx: &CmtContext, tags: String, save: Option<PathBuf>, print_env: bool) -> CmtResult<()> {
  println!("::: setup env. [{}]...", tags);
  let setup = crate::setup::Setup::new(&ctx.config, &tags)?;

  setup.scoped(|setup| {
    let bin = CmtTool::new(setup)?.bin().to_string();
    println!("✅ {} environment ready", setup.name());
    println!("   script:    {}", setup.setup_script().display());
    println!("   work area: {}", setup.topdir().display());
    println!("   tool:      {}", bin);

    if print_env {
      println!();
      for line in setup.env_model()?.environ() {
        println!("{}", line);
      }
    }

    if let Some(path) = save {
      let path = if path.is_absolute() { path } else { ctx.root.join(path) };
      let file = File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
      setup.save(BufWriter::new(file))?;
      println!("💾 environment saved to {}", path.display());
    }
    Ok(())
  })
}
