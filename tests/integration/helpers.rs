//! Test helpers for integration tests
//!
//! `TestRelease` lays out a fake release installation:
//!
//! ```text
//! <root>/bin/cmt.exe            fake configuration tool
//! <root>/bin/svn                fake version-control client
//! <root>/asetup.sh              fake setup script, picks releases/<tags>
//! <root>/releases/<tag>/...     catalog.xml + project trees with manifests
//! <root>/work/cmtkit.toml       configuration pointing at the above
//! ```

use anyhow::{Context, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const FAKE_TOOL: &str = r##"#!/bin/sh
if [ -z "$CMTKIT_FAKE_RELEASE" ]; then
  echo "no release configured"
  exit 2
fi
case "$1" in
  show)
    case "$2" in
      path) echo "# Add path $CMTKIT_FAKE_RELEASE" ;;
      projects)
        echo "#CMT---> Warning: package CMTUSERCONTEXT not found" >&2
        cat "$CMTKIT_FAKE_RELEASE/catalog.xml"
        ;;
      versions)
        echo "#CMT---> Warning: structuring style used for $3" >&2
        echo "$3 $3-99-00-00 $TestArea/$3"
        echo "$3 $3-03-01-00 $CMTKIT_FAKE_RELEASE/$3"
        ;;
      *) echo "unknown show $2"; exit 1 ;;
    esac
    ;;
  co)
    if [ "$2" = "-r" ]; then pkg="$4"; rev="$3"; else pkg="$2"; rev=head; fi
    case "$pkg" in
      Missing*) echo "#CMT---> package $pkg not found"; exit 3 ;;
    esac
    mkdir -p "$pkg" && echo "$rev" > "$pkg/revision"
    echo "checked out $pkg at $rev"
    ;;
  *) echo "unknown command $1"; exit 1 ;;
esac
"##;

const FAKE_SVN: &str = r#"#!/bin/sh
[ "$1" = "--non-interactive" ] && shift
[ "$1" = "ls" ] || exit 1
case "$2" in
  */Widget/tags)
    printf 'Widget-00-09-12/\nWidget-00-10-00/\nWidget-00-02-00/\nREADME\n'
    ;;
  *)
    echo "svn: E170000: URL '$2' doesn't exist" >&2
    exit 1
    ;;
esac
"#;

/// A manifest of one project of one release
pub struct ProjectSpec<'a> {
  pub name: &'a str,
  pub current: bool,
  pub uses: &'a [&'a str],
  pub clients: &'a [&'a str],
  pub requirements: &'a str,
}

/// A fake release installation plus a work directory configured for it
pub struct TestRelease {
  _root: TempDir,
  pub root: PathBuf,
  pub work: PathBuf,
}

impl TestRelease {
  pub fn new() -> Result<Self> {
    let root_dir = TempDir::new()?;
    let root = root_dir.path().to_path_buf();
    let work = root.join("work");
    fs::create_dir_all(&work)?;
    fs::create_dir_all(root.join("bin"))?;

    write_executable(&root.join("bin").join("cmt.exe"), FAKE_TOOL)?;
    write_executable(&root.join("bin").join("svn"), FAKE_SVN)?;

    let setup = format!(
      r#"export PATH="{root}/bin:$PATH"
export AtlasProject=AtlasOffline
export AtlasSetup="{root}/asetup.sh"
export TestArea="$PWD"
cmtkit_tags=""
for arg in "$@"; do
  case "$arg" in
    --input=*) [ -f "${{arg#--input=}}" ] || {{ echo "missing setup cfg"; return 4; }} ;;
    *) cmtkit_tags="$arg" ;;
  esac
done
if [ ! -d "{root}/releases/$cmtkit_tags" ]; then
  echo "unknown release [$cmtkit_tags]"
  return 1
fi
export CMTKIT_FAKE_RELEASE="{root}/releases/$cmtkit_tags"
"#,
      root = root.display()
    );
    fs::write(root.join("asetup.sh"), setup)?;

    fs::write(
      work.join("cmtkit.toml"),
      format!(
        "setup_script = \"{root}/asetup.sh\"\nvcs = \"{root}/bin/svn\"\ntimeout_secs = 30\n",
        root = root.display()
      ),
    )?;

    Ok(Self {
      _root: root_dir,
      root,
      work,
    })
  }

  /// Install path of `project` in release `tag`
  pub fn project_path(&self, tag: &str, project: &str) -> PathBuf {
    self.root.join("releases").join(tag).join("sw").join(project).join("17.2.0")
  }

  /// Install a release: one catalog plus a manifest per project.
  ///
  /// A `CMTUSERCONTEXT` entry is always added to the catalog.
  pub fn add_release(&self, tag: &str, projects: &[ProjectSpec<'_>]) -> Result<()> {
    let refs = |names: &[&str]| -> String {
      names
        .iter()
        .map(|n| {
          format!(
            "<project><name>{n}</name><version>17.2.0</version><cmtpath>{}</cmtpath></project>",
            self.project_path(tag, n).display()
          )
        })
        .collect()
    };

    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<projects>\n");
    for (order, project) in projects.iter().enumerate() {
      let path = self.project_path(tag, project.name);
      let manifest_dir = path.join(format!("{}Release", project.name)).join("cmt");
      fs::create_dir_all(&manifest_dir)?;
      fs::write(manifest_dir.join("requirements"), project.requirements)?;

      xml.push_str(&format!(
        "  <project current=\"{}\">\n    <name>{}</name>\n    <order>{}</order>\n    <version>17.2.0</version>\n    <cmtpath>{}</cmtpath>\n    <clients>{}</clients>\n    <uses>{}</uses>\n  </project>\n",
        if project.current { "yes" } else { "no" },
        project.name,
        order,
        path.display(),
        refs(project.clients),
        refs(project.uses),
      ));
    }
    xml.push_str(&format!(
      "  <project current=\"no\">\n    <name>CMTUSERCONTEXT</name>\n    <order>{}</order>\n    <version>v1</version>\n    <cmtpath>{}</cmtpath>\n  </project>\n</projects>\n",
      projects.len(),
      self.root.join("usercontext").join("CMTUSERCONTEXT").join("v1").display()
    ));

    fs::write(self.root.join("releases").join(tag).join("catalog.xml"), xml)?;
    Ok(())
  }

  /// Two-project release: AtlasCore (current) is used by AtlasOffline.
  pub fn add_standard_release(&self, tag: &str, core: &str, offline: &str) -> Result<()> {
    self.add_release(
      tag,
      &[
        ProjectSpec {
          name: "AtlasCore",
          current: true,
          uses: &[],
          clients: &["AtlasOffline"],
          requirements: core,
        },
        ProjectSpec {
          name: "AtlasOffline",
          current: false,
          uses: &["AtlasCore"],
          clients: &[],
          requirements: offline,
        },
      ],
    )
  }
}

fn write_executable(path: &Path, content: &str) -> Result<()> {
  fs::write(path, content)?;
  fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
  Ok(())
}

/// Run cmtkit and return its output whatever the exit status
pub fn run_cmtkit_raw(cwd: &Path, args: &[&str]) -> Result<Output> {
  let cmtkit_bin = env!("CARGO_BIN_EXE_cmtkit");

  Command::new(cmtkit_bin)
    .current_dir(cwd)
    .args(args)
    .env_remove("RUST_LOG")
    .env_remove("AtlasProject")
    .output()
    .context("Failed to run cmtkit")
}

/// Run cmtkit CLI command, failing on a non-zero exit
pub fn run_cmtkit(cwd: &Path, args: &[&str]) -> Result<Output> {
  let output = run_cmtkit_raw(cwd, args)?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    anyhow::bail!(
      "cmtkit command failed: cmtkit {}\nstdout: {}\nstderr: {}",
      args.join(" "),
      stdout,
      stderr
    );
  }

  Ok(output)
}

pub fn stdout(output: &Output) -> String {
  String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
  String::from_utf8_lossy(&output.stderr).into_owned()
}
