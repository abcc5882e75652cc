//! File Selector: decides which `.go` files of a directory form the package
//! for a platform.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, trace};

use crate::build::constraint::{good_os_arch_file, scan_header, should_build};
use crate::build::platform::{is_known_os, host_goos, Platform, TagSet};
use crate::parser::fileset::decode_source;
use crate::parser::lexer::lex;
use crate::parser::{parse_file, FileSet, ParseOptions, TokenKind};

/// Role of a selected file within the package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRole {
    Go,
    Cgo,
    Test,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectedFile {
    pub path: PathBuf,
    pub role: FileRole,
}

/// Why a candidate file was left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// `_GOOS`/`_GOARCH` suffix does not match.
    FileName,
    /// Build constraint not satisfied.
    Constraint,
    /// Imports `"C"` but cgo is disabled.
    CgoDisabled,
    /// `_test.go` file while tests are excluded.
    Test,
    /// `package x_test` file.
    ExternalTest,
    /// `package documentation`.
    Documentation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IgnoredFile {
    pub path: PathBuf,
    pub reason: IgnoreReason,
}

/// The outcome of selecting a directory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Selection {
    pub dir: PathBuf,
    /// Package name, if any file was selected.
    pub package: Option<String>,
    /// Files in build order: plain Go files, cgo files, then test files.
    pub files: Vec<SelectedFile>,
    pub ignored: Vec<IgnoredFile>,
    /// Every tag mentioned by any candidate file.
    pub all_tags: TagSet,
}

impl Selection {
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum SelectError {
    #[error("cannot read directory {}: {source}", dir.display())]
    ReadDir {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot read {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(
        "found packages {first} ({first_file}) and {second} ({second_file}) in {}",
        dir.display()
    )]
    MultiplePackages {
        dir: PathBuf,
        first: String,
        first_file: String,
        second: String,
        second_file: String,
    },
    #[error("{}: {message}", path.display())]
    InvalidFile { path: PathBuf, message: String },
}

/// What the selector needs from a file's package clause and imports.
struct FileHeader {
    package: String,
    imports_c: bool,
}

/// Select the package files of `dir` for `platform`.
pub fn select(
    dir: &Path,
    include_tests: bool,
    platform: &Platform,
) -> Result<Selection, SelectError> {
    let entries = fs::read_dir(dir).map_err(|source| SelectError::ReadDir {
        dir: dir.to_path_buf(),
        source,
    })?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| SelectError::ReadDir {
            dir: dir.to_path_buf(),
            source,
        })?;
        let is_file = entry.file_type().map(|t| !t.is_dir()).unwrap_or(false);
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_file && name.ends_with(".go") && !name.starts_with(['_', '.']) {
            names.push(name);
        }
    }
    names.sort();

    let mut selection = Selection {
        dir: dir.to_path_buf(),
        ..Selection::default()
    };
    let mut go_files = Vec::new();
    let mut cgo_files = Vec::new();
    let mut test_files = Vec::new();
    // First package seen among non-ignored files, with the file it came from.
    let mut first_package: Option<(String, String)> = None;

    for name in names {
        let path = dir.join(&name);
        let mut tags = TagSet::new();
        let ignore = |selection: &mut Selection, reason: IgnoreReason| {
            trace!(file = %name, ?reason, "ignoring file");
            selection.ignored.push(IgnoredFile {
                path: path.clone(),
                reason,
            });
        };

        if !good_os_arch_file(&name, platform, &mut tags) {
            selection.all_tags.merge(&tags);
            ignore(&mut selection, IgnoreReason::FileName);
            continue;
        }

        let bytes = fs::read(&path).map_err(|source| SelectError::ReadFile {
            path: path.clone(),
            source,
        })?;
        // Invalid UTF-8 is reported by the parse phase.
        let (source, _) = decode_source(bytes);
        let header = scan_header(&source).map_err(|err| SelectError::InvalidFile {
            path: path.clone(),
            message: err.to_string(),
        })?;
        let build =
            should_build(&header, platform, &mut tags).map_err(|err| SelectError::InvalidFile {
                path: path.clone(),
                message: err.to_string(),
            })?;
        selection.all_tags.merge(&tags);
        if !build {
            ignore(&mut selection, IgnoreReason::Constraint);
            continue;
        }

        let info = read_header(&name, source);
        if info.package == "documentation" {
            ignore(&mut selection, IgnoreReason::Documentation);
            continue;
        }

        let is_test = name.ends_with("_test.go");
        let mut package = info.package.as_str();
        let mut external = false;
        if is_test {
            if let Some(base) = package.strip_suffix("_test") {
                package = base;
                external = true;
            }
        }

        let conflict = first_package.as_ref().filter(|(first, _)| first != package).cloned();
        if let Some((first, first_file)) = conflict {
            return Err(SelectError::MultiplePackages {
                dir: dir.to_path_buf(),
                first,
                first_file,
                second: package.to_string(),
                second_file: name,
            });
        }
        if first_package.is_none() {
            first_package = Some((package.to_string(), name.clone()));
        }

        if info.imports_c && is_test {
            return Err(SelectError::InvalidFile {
                path,
                message: format!("use of cgo in test {name} not supported"),
            });
        }

        if external {
            ignore(&mut selection, IgnoreReason::ExternalTest);
        } else if is_test {
            if include_tests {
                test_files.push(path);
            } else {
                ignore(&mut selection, IgnoreReason::Test);
            }
        } else if info.imports_c {
            if platform.cgo_enabled {
                cgo_files.push(path);
            } else {
                ignore(&mut selection, IgnoreReason::CgoDisabled);
            }
        } else {
            go_files.push(path);
        }
    }

    let roles = [
        (go_files, FileRole::Go),
        (cgo_files, FileRole::Cgo),
        (test_files, FileRole::Test),
    ];
    for (paths, role) in roles {
        selection
            .files
            .extend(paths.into_iter().map(|path| SelectedFile { path, role }));
    }
    if !selection.files.is_empty() {
        selection.package = first_package.map(|(name, _)| name);
    }

    debug!(
        dir = %dir.display(),
        selected = selection.files.len(),
        ignored = selection.ignored.len(),
        "selected package files"
    );
    Ok(selection)
}

/// Package name and `"C"` import of a file.
///
/// A file whose header doesn't parse is still selected; its syntax error is
/// reported by the parse phase. The package name then comes from a token scan.
fn read_header(name: &str, source: String) -> FileHeader {
    let fset = FileSet::new();
    let file = fset.add_file(name, Arc::from(source));
    let options = ParseOptions {
        imports_only: true,
        ..ParseOptions::default()
    };
    match parse_file(&file, options, None) {
        Ok(ast) => {
            let imports_c = ast.imports().any(|i| i.path == "C");
            FileHeader {
                imports_c,
                package: ast.package.name,
            }
        }
        Err(_) => scan_package_clause(file.source()),
    }
}

fn scan_package_clause(source: &str) -> FileHeader {
    let tokens = lex(source).tokens;
    let mut package = String::new();
    let mut imports_c = false;
    for (i, tok) in tokens.iter().enumerate() {
        let next = tokens.get(i + 1);
        match tok.kind {
            TokenKind::Package if package.is_empty() => {
                if let Some(ident) = next.filter(|t| t.kind == TokenKind::Ident) {
                    package = ident.text(source).to_string();
                }
            }
            TokenKind::Import => {
                if let Some(path) = next.filter(|t| t.kind == TokenKind::String) {
                    imports_c |= path.text(source) == "\"C\"";
                }
            }
            TokenKind::Func | TokenKind::Type | TokenKind::Var | TokenKind::Const => break,
            _ => {}
        }
    }
    FileHeader { package, imports_c }
}

/// The OS a hinted file is constrained to, when it differs from
/// `platform.goos`. Used to analyze a `foo_windows.go` file as Windows code.
pub fn retarget_for_file(platform: &Platform, hint: &Path) -> Option<String> {
    let name = hint.file_name()?.to_string_lossy().into_owned();
    let mut tags = TagSet::new();
    good_os_arch_file(&name, platform, &mut tags);
    if let Ok(bytes) = fs::read(hint) {
        let (source, _) = decode_source(bytes);
        if let Ok(header) = scan_header(&source) {
            // Only the mentions matter here; the result is ignored.
            let _ = should_build(&header, platform, &mut tags);
        }
    }
    os_from_tags(platform, &tags, host_goos())
}

fn os_from_tags(platform: &Platform, tags: &TagSet, host: &str) -> Option<String> {
    if tags.is_positive(&platform.goos) {
        return None;
    }
    for (tag, positive) in tags.sorted() {
        if !is_known_os(tag) {
            continue;
        }
        if positive && tag != platform.goos {
            return Some(tag.to_string());
        }
        if !positive && tag == platform.goos && host != platform.goos && tags.get(host).is_some() {
            return Some(host.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn linux() -> Platform {
        Platform::new("linux", "amd64").with_cgo(false)
    }

    fn package(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, source) in files {
            fs::write(dir.path().join(name), source).unwrap();
        }
        dir
    }

    fn names(selection: &Selection) -> Vec<String> {
        selection
            .files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_empty_directory_is_clean() {
        let dir = package(&[]);
        let selection = select(dir.path(), false, &linux()).unwrap();
        assert!(selection.is_empty());
        assert_eq!(selection.package, None);
    }

    #[test]
    fn test_filename_and_tag_filtering() {
        let dir = package(&[
            ("a.go", "package p\n"),
            ("a_windows.go", "package p\n"),
            ("a_linux.go", "package p\n"),
            ("b.go", "//go:build ignore\n\npackage p\n"),
            ("c.go", "// +build linux\n\npackage p\n"),
            ("_skip.go", "package p\n"),
            ("notes.txt", "hello"),
        ]);
        let selection = select(dir.path(), false, &linux()).unwrap();
        assert_eq!(names(&selection), ["a.go", "a_linux.go", "c.go"]);
        assert_eq!(selection.package.as_deref(), Some("p"));
        assert!(selection.all_tags.is_positive("windows"));
        assert!(selection.all_tags.is_positive("ignore"));
    }

    #[test]
    fn test_filename_mismatch_wins_over_tags() {
        let dir = package(&[("x_darwin.go", "//go:build linux\n\npackage p\n")]);
        let selection = select(dir.path(), false, &linux()).unwrap();
        assert!(selection.is_empty());
        assert_eq!(selection.ignored[0].reason, IgnoreReason::FileName);
    }

    #[test]
    fn test_tests_and_external_tests() {
        let dir = package(&[
            ("a.go", "package p\n"),
            ("a_test.go", "package p\n"),
            ("x_test.go", "package p_test\n"),
        ]);
        let without = select(dir.path(), false, &linux()).unwrap();
        assert_eq!(names(&without), ["a.go"]);
        let with = select(dir.path(), true, &linux()).unwrap();
        assert_eq!(names(&with), ["a.go", "a_test.go"]);
        assert_eq!(with.files[1].role, FileRole::Test);
    }

    #[test]
    fn test_multiple_packages_is_fatal() {
        let dir = package(&[("a.go", "package a\n"), ("b.go", "package b\n")]);
        let err = select(dir.path(), false, &linux()).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("found packages a (a.go) and b (b.go) in"), "{message}");
    }

    #[test]
    fn test_documentation_package_is_ignored() {
        let dir = package(&[("a.go", "package p\n"), ("doc.go", "package documentation\n")]);
        let selection = select(dir.path(), false, &linux()).unwrap();
        assert_eq!(names(&selection), ["a.go"]);
    }

    #[test]
    fn test_cgo_files() {
        let files = [("a.go", "package p\n"), ("b.go", "package p\n\nimport \"C\"\n")];
        let dir = package(&files);
        let off = select(dir.path(), false, &linux()).unwrap();
        assert_eq!(names(&off), ["a.go"]);
        assert_eq!(off.ignored[0].reason, IgnoreReason::CgoDisabled);

        let on = select(dir.path(), false, &linux().with_cgo(true)).unwrap();
        assert_eq!(names(&on), ["a.go", "b.go"]);
        assert_eq!(on.files[1].role, FileRole::Cgo);
    }

    #[test]
    fn test_syntax_error_in_header_still_selected() {
        let dir = package(&[("a.go", "package p\n\nimport (\n\t\"fmt\"\n")]);
        let selection = select(dir.path(), false, &linux()).unwrap();
        assert_eq!(names(&selection), ["a.go"]);
        assert_eq!(selection.package.as_deref(), Some("p"));
    }

    #[test]
    fn test_bad_go_build_line_is_fatal() {
        let dir = package(&[("a.go", "//go:build linux &&\n\npackage p\n")]);
        let err = select(dir.path(), false, &linux()).unwrap_err();
        assert!(matches!(err, SelectError::InvalidFile { .. }));
    }

    #[test]
    fn test_missing_directory_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = select(&dir.path().join("nope"), false, &linux()).unwrap_err();
        assert!(matches!(err, SelectError::ReadDir { .. }));
    }

    #[test]
    fn test_retarget_to_positive_os() {
        let mut tags = TagSet::new();
        tags.record("windows", true);
        assert_eq!(os_from_tags(&linux(), &tags, "linux").as_deref(), Some("windows"));

        let mut tags = TagSet::new();
        tags.record("linux", true);
        assert_eq!(os_from_tags(&linux(), &tags, "linux"), None);
    }

    #[test]
    fn test_retarget_negated_target_falls_back_to_host() {
        let platform = Platform::new("windows", "amd64");
        let mut tags = TagSet::new();
        tags.record("windows", false);
        tags.record("linux", false);
        assert_eq!(os_from_tags(&platform, &tags, "linux").as_deref(), Some("linux"));
        assert_eq!(os_from_tags(&platform, &tags, "windows"), None);
    }

    #[test]
    fn test_retarget_for_file_suffix() {
        let dir = package(&[("x_windows.go", "package p\n")]);
        let hint = dir.path().join("x_windows.go");
        assert_eq!(retarget_for_file(&linux(), &hint).as_deref(), Some("windows"));
    }
}
