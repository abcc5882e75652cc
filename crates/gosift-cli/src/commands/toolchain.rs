//! Modes that shell out to the `go` tool instead of checking in process.
//!
//! `auto` picks a test build for a `_test.go` file, a throwaway build for a
//! `package main` file and `go install` for anything else. Output binaries
//! go to the null device. On failure the tool's stderr is copied through and
//! the exit code is 1.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Context;
use clap::Args;
use tracing::{debug, info};

use gosift_engine::{parse_file, FileSet, ParseOptions};

use crate::commands::parse_go_bool;

#[cfg(windows)]
const NULL_DEVICE: &str = "NUL";
#[cfg(not(windows))]
const NULL_DEVICE: &str = "/dev/null";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolMode {
    Auto,
    Build,
    TestBuild,
    Install,
}

#[derive(Debug, Clone, Args)]
pub struct ToolArgs {
    /// File whose package is built
    #[arg(env = "GOSUBL_LINT_FILENAME")]
    pub file: Option<PathBuf>,

    /// Pass -i to the go tool
    #[arg(short = 'i')]
    pub install_deps: bool,

    /// Prepare the command but do not run it
    #[arg(long, env = "MARGOCOMPLINT_BENCHMARK", value_parser = parse_go_bool)]
    pub benchmark: bool,

    /// The go tool to run
    #[arg(long, env = "GOSIFT_GO", default_value = "go")]
    pub go: PathBuf,
}

impl ToolMode {
    /// The concrete mode for `hint`.
    pub fn resolve(self, hint: Option<&Path>) -> ToolMode {
        if self != ToolMode::Auto {
            return self;
        }
        match hint {
            Some(path) if path.to_string_lossy().ends_with("_test.go") => ToolMode::TestBuild,
            Some(path) if is_main_package(path) => ToolMode::Build,
            _ => ToolMode::Install,
        }
    }

    fn go_args(self, install_deps: bool) -> Vec<&'static str> {
        let mut args = match self {
            ToolMode::TestBuild => vec!["test", "-c", "-o", NULL_DEVICE],
            ToolMode::Build => vec!["build", "-o", NULL_DEVICE],
            ToolMode::Install | ToolMode::Auto => vec!["install"],
        };
        if install_deps {
            args.push("-i");
        }
        args
    }
}

/// Whether `path` declares `package main`.
fn is_main_package(path: &Path) -> bool {
    let Ok(bytes) = std::fs::read(path) else {
        return false;
    };
    let fset = FileSet::new();
    let file = fset.add_file_bytes(path.to_string_lossy(), bytes);
    let options = ParseOptions {
        imports_only: true,
        ..Default::default()
    };
    parse_file(&file, options, None).is_ok_and(|ast| ast.package.name == "main")
}

pub fn execute(mode: ToolMode, args: ToolArgs) -> anyhow::Result<u8> {
    let mode = mode.resolve(args.file.as_deref());
    let go_args = mode.go_args(args.install_deps);
    let dir = match args.file.as_deref().and_then(Path::parent) {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().context("cannot determine working directory")?,
    };
    let mut command = Command::new(&args.go);
    command.args(&go_args).current_dir(&dir);
    debug!(
        ?mode,
        go = %args.go.display(),
        args = ?go_args,
        dir = %dir.display(),
        "prepared go command"
    );

    if args.benchmark {
        info!("benchmark mode; not running the go tool");
        return Ok(0);
    }

    let output = command
        .output()
        .with_context(|| format!("failed to run {}", args.go.display()))?;
    if !output.status.success() {
        std::io::stderr().write_all(&output.stderr)?;
        return Ok(1);
    }
    if !output.stdout.is_empty() {
        std::io::stdout().write_all(&output.stdout)?;
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_auto_mode_selection() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("main.go");
        fs::write(&main, "package main\n\nfunc main() {}\n").unwrap();
        let lib = dir.path().join("lib.go");
        fs::write(&lib, "package lib\n").unwrap();
        let test = dir.path().join("lib_test.go");
        fs::write(&test, "package lib\n").unwrap();

        assert_eq!(ToolMode::Auto.resolve(Some(&main)), ToolMode::Build);
        assert_eq!(ToolMode::Auto.resolve(Some(&lib)), ToolMode::Install);
        assert_eq!(ToolMode::Auto.resolve(Some(&test)), ToolMode::TestBuild);
        assert_eq!(ToolMode::Auto.resolve(None), ToolMode::Install);
        assert_eq!(ToolMode::Build.resolve(Some(&test)), ToolMode::Build);
    }

    #[test]
    fn test_go_arguments() {
        assert_eq!(ToolMode::TestBuild.go_args(false), vec!["test", "-c", "-o", NULL_DEVICE]);
        assert_eq!(ToolMode::Build.go_args(true), vec!["build", "-o", NULL_DEVICE, "-i"]);
        assert_eq!(ToolMode::Install.go_args(false), vec!["install"]);
    }
}
