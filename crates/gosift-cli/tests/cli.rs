//! Integration tests for the gosift binary.
//!
//! Exercises the exit status contract and output formats the way an editor
//! invokes the tool.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;

fn write(dir: &Path, name: &str, source: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, source).unwrap();
    path
}

/// The binary with every environment input the tool reads cleared.
fn gosift() -> Command {
    let mut cmd = Command::cargo_bin("gosift").unwrap();
    for var in [
        "GOSUBL_LINT_FILENAME",
        "GOSUBL_ALL_ERRORS",
        "GOOS",
        "GOARCH",
        "GOROOT",
        "GOPATH",
        "MARGOCOMPLINT_BENCHMARK",
        "GOSIFT_LOG",
        "GOSIFT_GO",
    ] {
        cmd.env_remove(var);
    }
    cmd.args(["--goos", "linux", "--goarch", "amd64"]);
    cmd
}

// ────────────────────────────────────────────────────────────────────────────
// In-process check
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_clean_package_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let source = "package main\n\nfunc main() {\n\tx := 1\n\t_ = x\n}\n";
    let main = write(dir.path(), "main.go", source);
    gosift().arg(&main).assert().code(0).stderr(predicate::str::is_empty());
}

#[test]
fn test_type_error_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "a.go", "package p\n\nfunc f() int {\n\treturn missing\n}\n");
    gosift()
        .arg(&main)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("a.go:4:9: undefined: missing"));
}

#[test]
fn test_hint_from_environment() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "a.go", "package p\n\nvar s string = 1\n");
    gosift()
        .env("GOSUBL_LINT_FILENAME", &main)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("a.go:3:16"));
}

#[test]
fn test_syntax_error_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "a.go", "package p\n\nfunc f() {\n");
    gosift().arg(&main).assert().code(2).stderr(predicate::str::contains("a.go:"));
}

#[test]
fn test_invalid_utf8_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.go");
    fs::write(&path, b"package p\n\nvar s = \"\xff\xfe\"\n").unwrap();
    gosift()
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("a.go:3:10: illegal UTF-8 encoding"));
}

#[test]
fn test_missing_directory_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    let hint = dir.path().join("nope").join("a.go");
    gosift()
        .arg(&hint)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot read directory"));
}

#[test]
fn test_json_output() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "a.go", "package p\n\nvar _ = missing\n");
    gosift()
        .args(["--format", "json"])
        .arg(&main)
        .assert()
        .code(2)
        .stderr(
            predicate::str::contains("\"message\":\"undefined: missing\"")
                .and(predicate::str::contains("\"kind\":\"type\"")),
        );
}

#[test]
fn test_config_file_sets_error_budget() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "gosift.toml", "[check]\nmax_errors = 1\n");
    let main = write(dir.path(), "a.go", "package p\n\nvar _ = one\nvar _ = two\nvar _ = three\n");
    let output = gosift().arg(&main).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert_eq!(stderr.lines().count(), 1, "{stderr}");
}

#[test]
fn test_stdin_replaces_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "a.go", "package p\n\nvar _ = missing\n");
    gosift()
        .arg("--stdin")
        .arg(&main)
        .write_stdin("package p\n\nvar _ = 1\n")
        .assert()
        .code(0);
}

// ────────────────────────────────────────────────────────────────────────────
// go tool modes
// ────────────────────────────────────────────────────────────────────────────

fn tool() -> Command {
    let mut cmd = Command::cargo_bin("gosift").unwrap();
    cmd.env_remove("MARGOCOMPLINT_BENCHMARK").env_remove("GOSUBL_LINT_FILENAME");
    cmd
}

#[test]
fn test_benchmark_mode_skips_the_tool() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "main.go", "package main\n\nfunc main() {}\n");
    tool()
        .env("MARGOCOMPLINT_BENCHMARK", "1")
        .args(["auto", "--go", "/nonexistent/go"])
        .arg(&main)
        .assert()
        .code(0);
}

#[test]
fn test_unavailable_tool_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "main.go", "package main\n\nfunc main() {}\n");
    tool()
        .args(["build", "--go", "/nonexistent/go"])
        .arg(&main)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to run"));
}
