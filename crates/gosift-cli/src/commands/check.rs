//! `gosift check`: type-check the package of a file in process.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use tracing::{debug, warn};

use gosift_engine::build::platform::{is_known_arch, is_known_os};
use gosift_engine::{
    Driver, DriverConfig, ImportRoots, OutputFormat, Platform, RunRequest, DEFAULT_MAX_ERRORS,
};

use crate::commands::parse_go_bool;
use crate::config::GosiftConfig;
use crate::output::{resolve_color_choice, DiagnosticWriter};

#[derive(Debug, Clone, Default, Args)]
pub struct CheckArgs {
    /// A file of the package to check (defaults to the current directory)
    #[arg(env = "GOSUBL_LINT_FILENAME")]
    pub file: Option<PathBuf>,

    /// Target operating system
    #[arg(long, env = "GOOS")]
    pub goos: Option<String>,

    /// Target architecture
    #[arg(long, env = "GOARCH")]
    pub goarch: Option<String>,

    /// Extra build tags, comma separated
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Include in-package test files
    #[arg(long, overrides_with = "no_tests")]
    pub tests: bool,

    /// Exclude test files even for a `_test.go` file
    #[arg(long)]
    pub no_tests: bool,

    /// Enable cgo files
    #[arg(long, overrides_with = "no_cgo")]
    pub cgo: bool,

    /// Disable cgo files
    #[arg(long)]
    pub no_cgo: bool,

    /// Stop after this many type errors (0 = no limit)
    #[arg(long)]
    pub max_errors: Option<usize>,

    /// Report every syntax error of a file
    #[arg(long, env = "GOSUBL_ALL_ERRORS", value_parser = parse_go_bool)]
    pub all_errors: bool,

    /// Analyze for the OS the file is constrained to
    #[arg(long)]
    pub match_file_os: bool,

    /// Read the file's contents from stdin
    #[arg(long, requires = "file")]
    pub stdin: bool,

    /// Go installation root
    #[arg(long, env = "GOROOT")]
    pub goroot: Option<PathBuf>,

    /// Go workspace path list
    #[arg(long, env = "GOPATH")]
    pub gopath: Option<String>,

    /// Output format: plain, pretty or json
    #[arg(long)]
    pub format: Option<OutputFormat>,

    /// When to color pretty output: auto, always or never
    #[arg(long)]
    pub color: Option<String>,

    /// Config file (defaults to the nearest gosift.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl CheckArgs {
    fn include_tests(&self) -> Option<bool> {
        match (self.tests, self.no_tests) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }

    fn cgo(&self) -> Option<bool> {
        match (self.cgo, self.no_cgo) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

/// Run a check and return the process exit code.
pub fn execute(args: CheckArgs) -> anyhow::Result<u8> {
    let start_dir = match args.file.as_deref().and_then(Path::parent) {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().context("cannot determine working directory")?,
    };
    let (config, config_path) = GosiftConfig::load(args.config.as_deref(), &start_dir)?;
    if let Some(path) = &config_path {
        debug!(config = %path.display(), "loaded config");
    }

    let driver_config = driver_config(&args, &config);
    let format = args.format.or(config.output.format).unwrap_or_default();
    let request = RunRequest {
        hint: args.file.clone(),
        include_tests: args.include_tests().or(config.check.tests),
        source: if args.stdin { Some(read_stdin()?) } else { None },
    };

    let mut writer = DiagnosticWriter::stderr(format, resolve_color_choice(args.color.as_deref()));
    let outcome = Driver::new(driver_config).run(&request, &mut writer);
    debug!(
        errors = outcome.state.error_count,
        bailout = outcome.state.bailout_triggered,
        files = outcome.files,
        "check finished"
    );
    Ok(outcome.status.code() as u8)
}

/// Merge flags, config and defaults, in that order.
fn driver_config(args: &CheckArgs, config: &GosiftConfig) -> DriverConfig {
    let host = Platform::host();
    let goos = args
        .goos
        .clone()
        .or_else(|| config.target.goos.clone())
        .unwrap_or(host.goos);
    let goarch = args
        .goarch
        .clone()
        .or_else(|| config.target.goarch.clone())
        .unwrap_or(host.goarch);
    if !is_known_os(&goos) {
        warn!(goos = %goos, "unknown GOOS");
    }
    if !is_known_arch(&goarch) {
        warn!(goarch = %goarch, "unknown GOARCH");
    }
    let mut platform = Platform::new(goos, goarch);
    if let Some(cgo) = args.cgo().or(config.target.cgo) {
        platform = platform.with_cgo(cgo);
    }
    let tags = if args.tags.is_empty() {
        config.target.tags.clone()
    } else {
        args.tags.clone()
    };
    let platform = platform.with_build_tags(tags);

    let gopath = match &args.gopath {
        Some(list) => std::env::split_paths(list).filter(|p| !p.as_os_str().is_empty()).collect(),
        None => config.import.gopath.clone(),
    };
    let import_roots = ImportRoots {
        goroot: args.goroot.clone().or_else(|| config.import.goroot.clone()),
        gopath,
    };

    DriverConfig {
        platform,
        import_roots,
        max_errors: args.max_errors.or(config.check.max_errors).unwrap_or(DEFAULT_MAX_ERRORS),
        all_errors: args.all_errors || config.check.all_errors.unwrap_or(false),
        match_file_os: args.match_file_os || config.check.match_file_os.unwrap_or(false),
    }
}

fn read_stdin() -> anyhow::Result<Arc<str>> {
    let mut source = String::new();
    std::io::stdin()
        .read_to_string(&mut source)
        .context("failed to read source from stdin")?;
    Ok(Arc::from(source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let config = GosiftConfig::from_str(
            "[check]\nmax_errors = 3\n\n\
             [target]\ngoos = \"windows\"\ngoarch = \"386\"\ntags = [\"a\"]\n",
        )
        .unwrap();
        let args = CheckArgs {
            goarch: Some("arm64".into()),
            tags: vec!["b".into()],
            ..Default::default()
        };
        let merged = driver_config(&args, &config);
        assert_eq!(merged.platform.goos, "windows");
        assert_eq!(merged.platform.goarch, "arm64");
        assert_eq!(merged.platform.word_size, 8);
        assert_eq!(merged.platform.build_tags, vec!["b"]);
        assert_eq!(merged.max_errors, 3);
    }

    #[test]
    fn test_defaults() {
        let merged = driver_config(&CheckArgs::default(), &GosiftConfig::default());
        assert_eq!(merged.max_errors, DEFAULT_MAX_ERRORS);
        assert!(!merged.all_errors);
        assert_eq!(merged.platform.goos, Platform::host().goos);
    }

    #[test]
    fn test_test_inclusion_flags() {
        let args = CheckArgs {
            no_tests: true,
            ..Default::default()
        };
        assert_eq!(args.include_tests(), Some(false));
        assert_eq!(CheckArgs::default().include_tests(), None);
    }
}
