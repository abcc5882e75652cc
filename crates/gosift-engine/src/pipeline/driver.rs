//! The run driver.
//!
//! A run goes select → parse → check. Fatal errors (unreadable directory,
//! conflicting package names, unreadable file) are reported once and end
//! the run. A syntax error is reported and the package is never checked.
//! Type errors stream to the reporter until the error budget is spent.

use std::env;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossbeam::channel;
use tracing::{debug, info};

use crate::build::{retarget_for_file, select, Platform};
use crate::checker::{
    check_package, CheckConfig, CheckOutcome, FakeCImporter, ImportRoots, Importer, SourceImporter,
};
use crate::diagnostic::Diagnostic;
use crate::parser::{ast, FileSet};
use crate::pipeline::parse::{parse_files, Overlay, ParseConfig, ParseFailure};
use crate::pipeline::{ExitStatus, PipelineError, RunState};

/// Errors reported before the checker stops, unless configured otherwise.
pub const DEFAULT_MAX_ERRORS: usize = 10;

/// The checker recurses once per nesting level of the trees it walks.
const CHECK_STACK_SIZE: usize = 256 * 1024 * 1024;

/// Receives the diagnostics of a run as they are found.
pub trait Reporter {
    /// `fset` holds every file parsed so far, for rendering snippets.
    fn report(&mut self, fset: &FileSet, diag: &Diagnostic);
}

impl Reporter for Vec<Diagnostic> {
    fn report(&mut self, _fset: &FileSet, diag: &Diagnostic) {
        self.push(diag.clone());
    }
}

/// Settings shared by every run of a driver.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub platform: Platform,
    pub import_roots: ImportRoots,
    /// Stop checking after this many type errors; 0 means no limit.
    pub max_errors: usize,
    /// Keep every syntax error of a file.
    pub all_errors: bool,
    /// Analyze for the OS the hinted file is constrained to.
    pub match_file_os: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            platform: Platform::host(),
            import_roots: ImportRoots::default(),
            max_errors: DEFAULT_MAX_ERRORS,
            all_errors: false,
            match_file_os: false,
        }
    }
}

/// One request: usually "the file the editor just saved".
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// A file of the package to check. Without one, the current directory
    /// is checked.
    pub hint: Option<PathBuf>,
    /// Include in-package test files. Defaults to whether the hint is a
    /// `_test.go` file.
    pub include_tests: Option<bool>,
    /// Unsaved contents of the hinted file.
    pub source: Option<Arc<str>>,
}

impl RunRequest {
    pub fn for_file(hint: impl Into<PathBuf>) -> Self {
        RunRequest {
            hint: Some(hint.into()),
            ..Default::default()
        }
    }

    fn include_tests(&self) -> bool {
        self.include_tests.unwrap_or_else(|| {
            self.hint
                .as_deref()
                .and_then(Path::file_name)
                .is_some_and(|name| name.to_string_lossy().ends_with("_test.go"))
        })
    }
}

/// Result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub status: ExitStatus,
    pub state: RunState,
    /// Number of files parsed.
    pub files: usize,
}

impl RunOutcome {
    fn fatal(state: RunState) -> Self {
        RunOutcome {
            status: ExitStatus::Fatal,
            state,
            files: 0,
        }
    }
}

/// Runs the pipeline. Holds configuration only.
pub struct Driver {
    config: DriverConfig,
    importer: Option<Arc<dyn Importer>>,
}

impl Driver {
    pub fn new(config: DriverConfig) -> Self {
        Driver { config, importer: None }
    }

    /// Resolve imports with `importer` instead of reading `GOROOT`/`GOPATH`.
    /// The cgo pseudo-import is still answered by the driver.
    pub fn with_importer(mut self, importer: Arc<dyn Importer>) -> Self {
        self.importer = Some(importer);
        self
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn run(&self, request: &RunRequest, reporter: &mut dyn Reporter) -> RunOutcome {
        let fset = FileSet::new();
        let mut state = RunState::default();

        let dir = match package_dir(request.hint.as_deref()) {
            Ok(dir) => dir,
            Err(err) => return fatal(&fset, &mut state, reporter, err),
        };
        let platform = self.platform_for(request);
        let include_tests = request.include_tests();
        debug!(
            dir = %dir.display(),
            goos = %platform.goos,
            goarch = %platform.goarch,
            include_tests,
            "starting run"
        );

        let selection = match select(&dir, include_tests, &platform) {
            Ok(selection) => selection,
            Err(err) => return fatal(&fset, &mut state, reporter, err.into()),
        };
        if selection.is_empty() {
            debug!(ignored = selection.ignored.len(), "no buildable files");
            return RunOutcome {
                status: ExitStatus::Clean,
                state,
                files: 0,
            };
        }
        let paths = selection.paths();
        debug!(files = paths.len(), ignored = selection.ignored.len(), "selected package files");

        let mut overlay = Overlay::default();
        if let (Some(hint), Some(source)) = (&request.hint, &request.source) {
            if let Some(name) = hint.file_name() {
                overlay.insert(dir.join(name), Arc::clone(source));
            }
        }
        let parse_config = ParseConfig {
            all_errors: self.config.all_errors,
        };
        let files = match parse_files(&fset, &paths, &overlay, parse_config) {
            Ok(files) => files,
            Err(ParseFailure::Syntax(err)) => {
                debug!(
                    file = err.filename(),
                    errors = err.len(),
                    "syntax errors; skipping type check"
                );
                for diag in Diagnostic::from_syntax_error(&err) {
                    state.error_count += 1;
                    reporter.report(&fset, &diag);
                }
                return RunOutcome {
                    status: ExitStatus::from_state(&state),
                    state,
                    files: paths.len(),
                };
            }
            Err(ParseFailure::Fatal(err)) => return fatal(&fset, &mut state, reporter, err),
        };

        let importer: Arc<dyn Importer> = match &self.importer {
            Some(inner) => Arc::new(FakeCImporter::new(Arc::clone(inner))),
            None => Arc::new(FakeCImporter::new(SourceImporter::new(
                self.config.import_roots.clone(),
                platform.clone(),
            ))),
        };
        let checked = self.check(
            &files,
            &fset,
            &dir,
            &platform,
            importer.as_ref(),
            &mut state,
            reporter,
        );
        let outcome = match checked {
            Ok(outcome) => outcome,
            Err(err) => return fatal(&fset, &mut state, reporter, err),
        };
        state.bailout_triggered = outcome.bailout_triggered;
        if outcome.bailout_triggered {
            info!(errors = state.error_count, "error budget spent; stopped checking");
        }
        debug!(errors = state.error_count, "run finished");

        RunOutcome {
            status: ExitStatus::from_state(&state),
            state,
            files: files.len(),
        }
    }

    /// Type-check on a dedicated thread with room for deeply nested trees.
    /// Diagnostics come back over a channel and reach `reporter` here; the
    /// task stops itself once the error budget is spent.
    #[allow(clippy::too_many_arguments)]
    fn check(
        &self,
        files: &[ast::File],
        fset: &FileSet,
        dir: &Path,
        platform: &Platform,
        importer: &dyn Importer,
        state: &mut RunState,
        reporter: &mut dyn Reporter,
    ) -> Result<CheckOutcome, PipelineError> {
        let max_errors = self.config.max_errors;
        let scoped = crossbeam::thread::scope(|scope| {
            let (tx, rx) = channel::unbounded::<Diagnostic>();
            let task = scope
                .builder()
                .name("gosift-check".to_string())
                .stack_size(CHECK_STACK_SIZE)
                .spawn(move |_| {
                    let mut found = 0;
                    let mut sink = |diag: Diagnostic| {
                        found += 1;
                        // The receiver outlives the task.
                        let _ = tx.send(diag);
                        if max_errors > 0 && found >= max_errors {
                            ControlFlow::Break(())
                        } else {
                            ControlFlow::Continue(())
                        }
                    };
                    let config = CheckConfig {
                        dir,
                        platform,
                        importer,
                    };
                    check_package(files, fset, config, &mut sink)
                })
                .map_err(|source| PipelineError::Spawn { source })?;
            for diag in rx {
                state.error_count += 1;
                reporter.report(fset, &diag);
            }
            task.join().map_err(|_| PipelineError::TaskPanicked)
        });
        scoped.unwrap_or(Err(PipelineError::TaskPanicked))
    }

    fn platform_for(&self, request: &RunRequest) -> Platform {
        let platform = &self.config.platform;
        if !self.config.match_file_os {
            return platform.clone();
        }
        match request.hint.as_deref().and_then(|hint| retarget_for_file(platform, hint)) {
            Some(goos) => {
                debug!(from = %platform.goos, to = %goos, "retargeting to the hinted file's OS");
                platform.with_goos(goos)
            }
            None => platform.clone(),
        }
    }
}

/// Directory of the hint, or the current directory.
fn package_dir(hint: Option<&Path>) -> Result<PathBuf, PipelineError> {
    match hint.and_then(Path::parent) {
        Some(parent) if !parent.as_os_str().is_empty() => Ok(parent.to_path_buf()),
        _ => env::current_dir().map_err(PipelineError::WorkingDir),
    }
}

fn fatal(
    fset: &FileSet,
    state: &mut RunState,
    reporter: &mut dyn Reporter,
    err: PipelineError,
) -> RunOutcome {
    debug!(error = %err, "fatal error");
    state.error_count += 1;
    reporter.report(fset, &Diagnostic::fatal(err.to_string()));
    RunOutcome::fatal(*state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::{MemberKind, MemoryImporter, Package};
    use crate::diagnostic::DiagnosticKind;
    use std::fs;

    fn driver(max_errors: usize) -> Driver {
        let config = DriverConfig {
            platform: Platform::new("linux", "amd64"),
            max_errors,
            ..Default::default()
        };
        let fmt = Package::new("fmt", "fmt").with_member("Println", MemberKind::Func);
        let importer = MemoryImporter::new().with_package(fmt);
        Driver::new(config).with_importer(Arc::new(importer))
    }

    fn run(driver: &Driver, hint: &Path) -> (RunOutcome, Vec<Diagnostic>) {
        let mut found = Vec::new();
        let outcome = driver.run(&RunRequest::for_file(hint), &mut found);
        (outcome, found)
    }

    #[test]
    fn test_clean_package() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("main.go");
        let main_source =
            "package main\n\nimport \"fmt\"\n\nfunc main() { fmt.Println(helper()) }\n";
        fs::write(&main, main_source).unwrap();
        let helper = "package main\n\nfunc helper() int { return 1 }\n";
        fs::write(dir.path().join("helper.go"), helper).unwrap();
        let (outcome, found) = run(&driver(10), &main);
        assert_eq!(found, Vec::new());
        assert_eq!(outcome.status, ExitStatus::Clean);
        assert_eq!(outcome.files, 2);
    }

    #[test]
    fn test_empty_directory_is_clean() {
        let dir = tempfile::tempdir().unwrap();
        let (outcome, found) = run(&driver(10), &dir.path().join("new.go"));
        assert!(found.is_empty());
        assert_eq!(outcome.status, ExitStatus::Clean);
    }

    #[test]
    fn test_syntax_error_skips_checking() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.go");
        fs::write(&a, "package p\n\nfunc f() {\n\tx := undefined\n").unwrap();
        let (outcome, found) = run(&driver(10), &a);
        assert_eq!(outcome.status, ExitStatus::Diagnostics);
        assert!(!found.is_empty());
        assert!(found.iter().all(|d| d.kind == DiagnosticKind::Syntax));
    }

    #[test]
    fn test_error_budget() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.go");
        let body: String = (0..15).map(|i| format!("\t_ = missing{i}\n")).collect();
        fs::write(&a, format!("package p\n\nfunc f() {{\n{body}}}\n")).unwrap();

        let (outcome, found) = run(&driver(10), &a);
        assert_eq!(found.len(), 10);
        assert!(outcome.state.bailout_triggered);
        assert_eq!(outcome.status, ExitStatus::Diagnostics);

        let (outcome, found) = run(&driver(0), &a);
        assert_eq!(found.len(), 15);
        assert!(!outcome.state.bailout_triggered);
    }

    #[test]
    fn test_below_budget_reports_everything() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.go");
        let body: String = (0..9).map(|i| format!("\t_ = missing{i}\n")).collect();
        fs::write(&a, format!("package p\n\nfunc f() {{\n{body}}}\n")).unwrap();
        let (outcome, found) = run(&driver(10), &a);
        assert_eq!(found.len(), 9);
        assert!(!outcome.state.bailout_triggered);
    }

    #[test]
    fn test_multiple_packages_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.go");
        fs::write(&a, "package a\n").unwrap();
        fs::write(dir.path().join("b.go"), "package b\n").unwrap();
        let (outcome, found) = run(&driver(10), &a);
        assert_eq!(outcome.status, ExitStatus::Fatal);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, DiagnosticKind::Fatal);
    }

    #[test]
    fn test_unsaved_source_replaces_disk() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.go");
        fs::write(&a, "package p\n\nvar x int = \"s\"\n").unwrap();
        let request = RunRequest {
            source: Some(Arc::from("package p\n\nvar x int = 1\n")),
            ..RunRequest::for_file(&a)
        };
        let mut found = Vec::new();
        let outcome = driver(10).run(&request, &mut found);
        assert!(found.is_empty(), "{found:?}");
        assert_eq!(outcome.status, ExitStatus::Clean);
    }

    #[test]
    fn test_test_files_follow_the_hint() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.go");
        fs::write(&a, "package p\n\nfunc f() int { return 1 }\n").unwrap();
        let t = dir.path().join("a_test.go");
        fs::write(&t, "package p\n\nfunc g() { undefinedInTest() }\n").unwrap();

        let (outcome, _) = run(&driver(10), &a);
        assert_eq!(outcome.status, ExitStatus::Clean);
        assert_eq!(outcome.files, 1);

        let (outcome, found) = run(&driver(10), &t);
        assert_eq!(outcome.files, 2);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].message, "undefined: undefinedInTest");
    }
}
