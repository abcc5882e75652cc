//! Integration tests for the run pipeline.
//!
//! Each test lays out a package on disk and runs the driver over it the way
//! an editor would after saving a file.

use std::fs;
use std::path::{Path, PathBuf};

use gosift_engine::{
    Diagnostic, DiagnosticKind, Driver, DriverConfig, ExitStatus, ImportRoots, Platform,
    RunOutcome, RunRequest,
};

fn write(dir: &Path, name: &str, source: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, source).unwrap();
    path
}

fn linux_driver(goroot: Option<&Path>) -> Driver {
    Driver::new(DriverConfig {
        platform: Platform::new("linux", "amd64").with_cgo(true),
        import_roots: ImportRoots {
            goroot: goroot.map(Path::to_path_buf),
            gopath: Vec::new(),
        },
        ..Default::default()
    })
}

fn run(driver: &Driver, hint: &Path) -> (RunOutcome, Vec<Diagnostic>) {
    let mut found = Vec::new();
    let outcome = driver.run(&RunRequest::for_file(hint), &mut found);
    (outcome, found)
}

// ────────────────────────────────────────────────────────────────────────────
// File selection
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_os_arch_filenames_are_excluded() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "main.go", "package p\n\nfunc f() int { return impl() }\n");
    write(dir.path(), "impl_linux.go", "package p\n\nfunc impl() int { return 1 }\n");
    // Would redeclare impl if it were selected, and a build tag does not
    // override the filename.
    write(
        dir.path(),
        "impl_windows.go",
        "//go:build linux\n\npackage p\n\nfunc impl() int { return 2 }\n",
    );
    write(dir.path(), "impl_arm64.go", "package p\n\nfunc impl() int { return 3 }\n");

    let (outcome, found) = run(&linux_driver(None), &main);
    assert!(found.is_empty(), "{found:?}");
    assert_eq!(outcome.files, 2);
    assert_eq!(outcome.status, ExitStatus::Clean);
}

#[test]
fn test_build_constraints() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "main.go", "package p\n\nvar _ = value\n");
    write(dir.path(), "on.go", "//go:build linux && !windows\n\npackage p\n\nconst value = 1\n");
    write(dir.path(), "off.go", "//go:build ignore\n\npackage p\n\nconst value = 2\n");
    write(dir.path(), "legacy.go", "// +build darwin\n\npackage p\n\nconst value = 3\n");

    let (outcome, found) = run(&linux_driver(None), &main);
    assert!(found.is_empty(), "{found:?}");
    assert_eq!(outcome.files, 2);
}

// ────────────────────────────────────────────────────────────────────────────
// Exit status contract
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_undeclared_name_is_one_diagnostic() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "main.go", "package p\n\nfunc f() int {\n\treturn missing\n}\n");
    let (outcome, found) = run(&linux_driver(None), &main);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].kind, DiagnosticKind::Type);
    assert_eq!(found[0].message, "undefined: missing");
    let position = found[0].position.as_ref().unwrap();
    assert_eq!((position.line, position.column), (4, 9));
    assert_eq!(outcome.status.code(), 2);
}

#[test]
fn test_unterminated_construct_stops_before_checking() {
    let dir = tempfile::tempdir().unwrap();
    let good = write(dir.path(), "a.go", "package p\n\nvar x int = \"not checked\"\n");
    write(dir.path(), "b.go", "package p\n\nfunc f() {\n\tif true {\n");
    let (outcome, found) = run(&linux_driver(None), &good);
    assert!(!found.is_empty());
    for diag in &found {
        assert_eq!(diag.kind, DiagnosticKind::Syntax);
        assert!(diag.position.as_ref().unwrap().filename.ends_with("b.go"));
    }
    assert_eq!(outcome.status.code(), 2);
}

#[test]
fn test_unreadable_directory_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let hint = dir.path().join("missing").join("main.go");
    let (outcome, found) = run(&linux_driver(None), &hint);
    assert_eq!(outcome.status.code(), 1);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].kind, DiagnosticKind::Fatal);
}

#[test]
fn test_repeated_runs_are_identical() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(
        dir.path(),
        "main.go",
        "package p\n\nfunc f() {\n\ta := 1\n\tb := \"x\" + 1\n\t_ = c\n}\n",
    );
    for i in 0..6 {
        write(
            dir.path(),
            &format!("extra{i}.go"),
            &format!("package p\n\nfunc g{i}() int {{ return {i} }}\n"),
        );
    }
    let driver = linux_driver(None);
    let (first, first_found) = run(&driver, &main);
    for _ in 0..5 {
        let (outcome, found) = run(&driver, &main);
        assert_eq!(outcome, first);
        assert_eq!(found, first_found);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Imports
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_cgo_only_file_has_no_import_diagnostic() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(
        dir.path(),
        "main.go",
        "package p\n\n// #include <stdio.h>\nimport \"C\"\n\n\
         func f() { C.puts(C.CString(\"hi\")) }\n",
    );
    let (outcome, found) = run(&linux_driver(None), &main);
    assert!(found.is_empty(), "{found:?}");
    assert_eq!(outcome.status, ExitStatus::Clean);
}

#[test]
fn test_source_importer_reads_goroot() {
    let root = tempfile::tempdir().unwrap();
    write(
        root.path(),
        "src/strings/strings.go",
        "package strings\n\nfunc Repeat(s string, n int) string { return s }\n\n\
         const internal = 1\n",
    );
    let dir = tempfile::tempdir().unwrap();
    let main = write(
        dir.path(),
        "main.go",
        "package p\n\nimport (\n\t\"strings\"\n\t\"nowhere/pkg\"\n)\n\n\
         var _ = strings.Repeat(\"a\", 2)\nvar _ = strings.internal\nvar _ = pkg.X\n",
    );
    let (outcome, found) = run(&linux_driver(Some(root.path())), &main);
    let messages: Vec<&str> = found.iter().map(|d| d.message.as_str()).collect();
    assert_eq!(messages.len(), 2, "{messages:?}");
    assert!(messages[0].starts_with("could not import nowhere/pkg"), "{messages:?}");
    assert!(messages[1].contains("strings.internal"), "{messages:?}");
    assert_eq!(outcome.status, ExitStatus::Diagnostics);
}

#[test]
fn test_deeply_nested_expression_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let depth = 1000;
    let source = format!("package p\n\nvar _ = {}1{}\n", "(".repeat(depth), ")".repeat(depth));
    let main = write(dir.path(), "a.go", &source);

    let (outcome, found) = run(&linux_driver(None), &main);
    assert!(found.is_empty(), "{found:?}");
    assert_eq!(outcome.status, ExitStatus::Clean);
}
