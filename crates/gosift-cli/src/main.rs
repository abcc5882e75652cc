//! gosift command-line tool
//!
//! Reports syntax and type errors for the Go package of a file, for editors
//! to run on save. Without a subcommand it type-checks in process; the
//! other subcommands hand the package to the `go` tool.
//!
//! Exit status: 0 when clean, 2 when diagnostics were reported, 1 when the
//! check could not run.

mod commands;
mod config;
mod logging;
mod output;

use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};

use commands::check::CheckArgs;
use commands::toolchain::{ToolArgs, ToolMode};

#[derive(Parser)]
#[command(name = "gosift")]
#[command(about = "Save-time diagnostics for Go packages", long_about = None)]
#[command(version, args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    check: CheckArgs,

    /// More log output (-v, -vv, -vvv); GOSIFT_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Type-check the package of a file (the default)
    Check(CheckArgs),

    /// Test build for _test.go files, build for package main, install otherwise
    Auto(ToolArgs),

    /// Run `go build` with output discarded
    Build(ToolArgs),

    /// Run `go test -c` with output discarded
    TestBuild(ToolArgs),

    /// Run `go install`
    Install(ToolArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let result = match cli.command.unwrap_or(Commands::Check(cli.check)) {
        Commands::Check(args) => commands::check::execute(args),
        Commands::Auto(args) => commands::toolchain::execute(ToolMode::Auto, args),
        Commands::Build(args) => commands::toolchain::execute(ToolMode::Build, args),
        Commands::TestBuild(args) => commands::toolchain::execute(ToolMode::TestBuild, args),
        Commands::Install(args) => commands::toolchain::execute(ToolMode::Install, args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("gosift: {e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_bare_invocation_checks() {
        let cli = Cli::try_parse_from(["gosift", "pkg/a.go", "--max-errors", "3"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.check.max_errors, Some(3));
    }

    #[test]
    fn test_subcommand_parsing() {
        let cli = Cli::try_parse_from(["gosift", "test-build", "-i", "x_test.go"]).unwrap();
        match cli.command {
            Some(Commands::TestBuild(args)) => assert!(args.install_deps),
            _ => panic!("expected test-build"),
        }
    }
}
