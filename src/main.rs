mod cmt;
mod commands;
mod core;
mod env;
mod graph;
mod release;
mod setup;
mod ui;
mod vcs;

use clap::{Args, Parser, Subcommand};
use core::context::{CmtContext, EnvSource};
use core::error::{CmtError, print_error};
use std::path::PathBuf;

/// Query release environments, project trees and packages of a CMT-managed release
#[derive(Parser)]
#[command(name = "cmtkit")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(styles = get_styles())]
struct Cli {
  /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
  #[arg(short, long, action = clap::ArgAction::Count, global = true)]
  verbose: u8,

  #[command(subcommand)]
  command: Commands,
}

/// Release environment selection shared by the query commands
#[derive(Args, Debug, Clone)]
struct EnvArgs {
  /// Set up a fresh environment with these tags (e.g. "rel1,devval")
  #[arg(long)]
  tags: Option<String>,
  /// Restore an environment saved with `setup --save`
  #[arg(long, conflicts_with = "tags")]
  cache: Option<PathBuf>,
  /// Work area to restore the cached environment into
  #[arg(long, requires = "cache")]
  topdir: Option<PathBuf>,
}

impl From<EnvArgs> for EnvSource {
  fn from(args: EnvArgs) -> Self {
    EnvSource {
      tags: args.tags,
      cache: args.cache,
      topdir: args.topdir,
    }
  }
}

#[derive(Subcommand)]
enum Commands {
  // ============================================================================
  // Environment
  // ============================================================================
  /// Source the release setup for the given tags
  Setup {
    /// Setup tags (e.g. "17.2.0,slc6")
    tags: String,
    /// Save the resulting environment to this file
    #[arg(long)]
    save: Option<PathBuf>,
    /// Print the resulting environment as KEY=VALUE lines
    #[arg(long)]
    print_env: bool,
  },

  // ============================================================================
  // Project tree
  // ============================================================================
  /// Show the project catalog
  Projects {
    #[command(flatten)]
    env: EnvArgs,
    /// Output in JSON format
    #[arg(long)]
    json: bool,
    /// Output in Graphviz DOT format
    #[arg(long, conflicts_with = "json")]
    dot: bool,
  },

  /// Show the root project and the traversal order
  Dag {
    #[command(flatten)]
    env: EnvArgs,
    /// Root policy: auto, current, orphan
    #[arg(long, default_value = "auto")]
    policy: String,
    /// Output in JSON format
    #[arg(long)]
    json: bool,
  },

  // ============================================================================
  // Packages
  // ============================================================================
  /// Find the project declaring a package
  FindPkg {
    /// Package name (prefix match)
    name: String,
    #[command(flatten)]
    env: EnvArgs,
    /// Output in JSON format
    #[arg(long)]
    json: bool,
  },

  /// Show the version of a package
  Version {
    /// Package name
    pkg: String,
    #[command(flatten)]
    env: EnvArgs,
  },

  /// Check out a package
  Checkout {
    /// Full package name (e.g. Control/AthenaKernel)
    pkg: String,
    /// Revision to check out (default: head)
    #[arg(short, long)]
    revision: Option<String>,
    #[command(flatten)]
    env: EnvArgs,
  },

  // ============================================================================
  // Releases
  // ============================================================================
  /// Show package differences between two release tags
  TagDiff {
    /// Old release tags
    old: String,
    /// New release tags
    new: String,
    /// Output in JSON format
    #[arg(long)]
    json: bool,
  },

  /// Show the newest tag of a package in version control
  LatestTag {
    /// Repository URL holding the tags
    url: String,
    /// Package basename; tags are named <basename>-<version>
    basename: String,
  },
}

fn get_styles() -> clap::builder::Styles {
  clap::builder::Styles::styled()
    .usage(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .header(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .literal(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
    .invalid(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .error(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .valid(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
    )
    .placeholder(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))))
}

/// Logs go to stderr; stdout carries command output only.
fn init_tracing(verbose: u8) {
  use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

  let default_level = match verbose {
    0 => "warn",
    1 => "info",
    _ => "debug",
  };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

  let formatter = tracing_subscriber::fmt::layer()
    .with_writer(std::io::stderr)
    .with_target(false);

  tracing_subscriber::registry().with(filter).with(formatter).init();
}

fn main() {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  let root = match std::env::current_dir() {
    Ok(dir) => dir,
    Err(e) => handle_error(CmtError::message(format!("Failed to get current directory: {}", e))),
  };

  let ctx = match CmtContext::build(&root) {
    Ok(ctx) => ctx,
    Err(e) => handle_error(e),
  };

  let result = match cli.command {
    Commands::Setup { tags, save, print_env } => commands::run_setup(&ctx, tags, save, print_env),
    Commands::Projects { env, json, dot } => {
      commands::ProjectsFormat::from_flags(json, dot).and_then(|format| commands::run_projects(&ctx, env.into(), format))
    }
    Commands::Dag { env, policy, json } => commands::run_dag(&ctx, env.into(), policy, json),
    Commands::FindPkg { name, env, json } => commands::run_find_pkg(&ctx, env.into(), name, json),
    Commands::Version { pkg, env } => commands::run_version(&ctx, env.into(), pkg),
    Commands::Checkout { pkg, revision, env } => commands::run_checkout(&ctx, env.into(), pkg, revision),
    Commands::TagDiff { old, new, json } => commands::run_tag_diff(&ctx, old, new, json),
    Commands::LatestTag { url, basename } => commands::run_latest_tag(&ctx, url, basename),
  };

  if let Err(err) = result {
    handle_error(err);
  }
}

fn handle_error(err: CmtError) -> ! {
  print_error(&err);
  std::process::exit(err.exit_code().as_i32());
}
