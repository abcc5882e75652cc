//! `gosift.toml` loading.
//!
//! The file is found by walking up from the package directory. Every key is
//! optional; command-line flags override it and it overrides the defaults.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use gosift_engine::OutputFormat;

pub const CONFIG_FILE: &str = "gosift.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GosiftConfig {
    pub check: CheckSection,
    pub target: TargetSection,
    pub import: ImportSection,
    pub output: OutputSection,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CheckSection {
    /// 0 disables the limit.
    pub max_errors: Option<usize>,
    pub all_errors: Option<bool>,
    pub tests: Option<bool>,
    pub match_file_os: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetSection {
    pub goos: Option<String>,
    pub goarch: Option<String>,
    pub cgo: Option<bool>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImportSection {
    pub goroot: Option<PathBuf>,
    pub gopath: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSection {
    pub format: Option<OutputFormat>,
}

impl GosiftConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_str(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load `explicit` if given, else the nearest `gosift.toml` above
    /// `start_dir`, else the defaults.
    pub fn load(
        explicit: Option<&Path>,
        start_dir: &Path,
    ) -> anyhow::Result<(Self, Option<PathBuf>)> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => find_config(start_dir),
        };
        match path {
            Some(path) => Ok((Self::from_file(&path)?, Some(path))),
            None => Ok((Self::default(), None)),
        }
    }
}

/// Nearest directory at or above `start_dir` holding a `gosift.toml`.
pub fn find_config(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir;
    loop {
        let candidate = current.join(CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        current = current.parent()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_parse_full_config() {
        let config = GosiftConfig::from_str(
            r#"
[check]
max_errors = 25
all_errors = true
tests = false
match_file_os = true

[target]
goos = "windows"
goarch = "386"
cgo = false
tags = ["integration", "netgo"]

[import]
goroot = "/usr/local/go"
gopath = ["/home/me/go"]

[output]
format = "json"
"#,
        )
        .unwrap();
        assert_eq!(config.check.max_errors, Some(25));
        assert_eq!(config.check.all_errors, Some(true));
        assert_eq!(config.check.tests, Some(false));
        assert_eq!(config.target.goos.as_deref(), Some("windows"));
        assert_eq!(config.target.tags, vec!["integration", "netgo"]);
        assert_eq!(config.import.goroot, Some(PathBuf::from("/usr/local/go")));
        assert_eq!(config.output.format, Some(OutputFormat::Json));
    }

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(GosiftConfig::from_str("").unwrap(), GosiftConfig::default());
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        assert!(GosiftConfig::from_str("[check]\nmax_erors = 3\n").is_err());
    }

    #[test]
    fn test_find_config_walks_up() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::write(root.join(CONFIG_FILE), "[check]\nmax_errors = 3\n").unwrap();
        let nested = root.join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_config(&nested), Some(root.join(CONFIG_FILE)));
        let (config, path) = GosiftConfig::load(None, &nested).unwrap();
        assert_eq!(config.check.max_errors, Some(3));
        assert_eq!(path, Some(root.join(CONFIG_FILE)));
    }
}
