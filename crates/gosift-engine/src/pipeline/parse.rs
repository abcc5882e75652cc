//! Concurrent parsing of a package's files.
//!
//! Every file gets its own parse task inside a scoped task group. Results
//! travel back over a channel tagged with the file's index, so the output
//! keeps input order whatever the completion order. The first failure
//! raises a shared cancellation flag; the remaining parsers notice it at
//! their next statement boundary and return early. The scope joins every
//! task before [`parse_files`] returns.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam::channel;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::parser::{ast, parse_file, FileSet, ParseOptions, SyntaxError};
use crate::pipeline::PipelineError;

/// Parser threads recurse once per nesting level, up to `MAX_NEST_DEPTH`.
const PARSE_STACK_SIZE: usize = 256 * 1024 * 1024;

/// Contents that replace the on-disk file, keyed by path. Editors use this
/// to check an unsaved buffer.
pub type Overlay = FxHashMap<PathBuf, Arc<str>>;

#[derive(Debug, Clone, Copy, Default)]
pub struct ParseConfig {
    /// Keep every syntax error instead of the first ten, one per line.
    pub all_errors: bool,
}

/// Why a package could not be parsed.
#[derive(Debug)]
pub enum ParseFailure {
    /// A file has syntax errors.
    Syntax(SyntaxError),
    /// A file could not be read, or a task died.
    Fatal(PipelineError),
}

impl From<SyntaxError> for ParseFailure {
    fn from(err: SyntaxError) -> Self {
        ParseFailure::Syntax(err)
    }
}

impl From<PipelineError> for ParseFailure {
    fn from(err: PipelineError) -> Self {
        ParseFailure::Fatal(err)
    }
}

/// Parse `paths` concurrently into `fset`.
///
/// Returns the ASTs in the order of `paths`, or the first failure observed.
pub fn parse_files(
    fset: &FileSet,
    paths: &[PathBuf],
    overlay: &Overlay,
    config: ParseConfig,
) -> Result<Vec<ast::File>, ParseFailure> {
    if paths.is_empty() {
        return Ok(Vec::new());
    }
    let options = ParseOptions {
        all_errors: config.all_errors,
        ..Default::default()
    };
    let cancel = AtomicBool::new(false);
    let mut slots: Vec<Option<ast::File>> = Vec::with_capacity(paths.len());
    slots.resize_with(paths.len(), || None);
    let mut failure: Option<ParseFailure> = None;

    let scoped = crossbeam::thread::scope(|scope| {
        let (tx, rx) = channel::unbounded::<(usize, Result<ast::File, ParseFailure>)>();
        for (index, path) in paths.iter().enumerate() {
            let tx = tx.clone();
            let cancel = &cancel;
            let spawned = scope
                .builder()
                .name(format!("gosift-parse-{index}"))
                .stack_size(PARSE_STACK_SIZE)
                .spawn(move |_| {
                    let result = parse_one(fset, path, overlay, options, cancel);
                    // The receiver outlives every task.
                    let _ = tx.send((index, result));
                });
            if let Err(source) = spawned {
                cancel.store(true, Ordering::Relaxed);
                failure.get_or_insert(ParseFailure::Fatal(PipelineError::Spawn { source }));
                break;
            }
        }
        drop(tx);

        for (index, result) in rx {
            match result {
                Ok(file) => slots[index] = Some(file),
                Err(err) => {
                    if failure.is_none() {
                        debug!(file = %paths[index].display(), "parse failed; cancelling siblings");
                        cancel.store(true, Ordering::Relaxed);
                        failure = Some(err);
                    }
                }
            }
        }
    });
    if scoped.is_err() {
        return Err(ParseFailure::Fatal(PipelineError::TaskPanicked));
    }
    if let Some(failure) = failure {
        return Err(failure);
    }

    let files: Option<Vec<ast::File>> = slots.into_iter().collect();
    files.ok_or(ParseFailure::Fatal(PipelineError::TaskPanicked))
}

fn parse_one(
    fset: &FileSet,
    path: &Path,
    overlay: &Overlay,
    options: ParseOptions,
    cancel: &AtomicBool,
) -> Result<ast::File, ParseFailure> {
    let file = match overlay.get(path) {
        Some(source) => fset.add_file(path.to_string_lossy(), Arc::clone(source)),
        None => {
            let bytes = std::fs::read(path).map_err(|source| PipelineError::ReadFile {
                path: path.to_path_buf(),
                source,
            })?;
            fset.add_file_bytes(path.to_string_lossy(), bytes)
        }
    };
    trace!(file = file.name(), "parsing");
    Ok(parse_file(&file, options, Some(cancel))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn parse_default(fset: &FileSet, paths: &[PathBuf]) -> Result<Vec<ast::File>, ParseFailure> {
        parse_files(fset, paths, &Overlay::default(), ParseConfig::default())
    }

    fn write(dir: &Path, name: &str, source: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, source).unwrap();
        path
    }

    #[test]
    fn test_output_keeps_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = (0..12)
            .map(|i| {
                let body = "var _ = 1 + 2\n".repeat(i * 20);
                write(dir.path(), &format!("f{i}.go"), &format!("package p\n\n// file {i}\n{body}"))
            })
            .collect();
        let fset = FileSet::new();
        let files = parse_default(&fset, &paths).unwrap();
        assert_eq!(files.len(), 12);
        for (i, file) in files.iter().enumerate() {
            assert_eq!(file.decls.len(), i * 20);
        }
        assert_eq!(fset.len(), 12);
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let good = write(dir.path(), "a.go", "package p\n\nfunc f() {}\n");
        let bad = write(dir.path(), "b.go", "package p\n\nfunc g() {\n");
        let fset = FileSet::new();
        let err = parse_default(&fset, &[good, bad]).unwrap_err();
        match err {
            ParseFailure::Syntax(err) => assert!(err.filename().ends_with("b.go")),
            ParseFailure::Fatal(err) => panic!("unexpected fatal error: {err}"),
        }
    }

    #[test]
    fn test_invalid_utf8_is_a_syntax_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.go");
        fs::write(&path, b"package p\n\nvar s = \"\xff\"\n").unwrap();
        let fset = FileSet::new();
        let err = parse_default(&fset, &[path]).unwrap_err();
        match err {
            ParseFailure::Syntax(err) => {
                let first = &err.errors()[0];
                assert_eq!((first.position.line, first.position.column), (3, 10));
                assert_eq!(first.message, "illegal UTF-8 encoding");
            }
            ParseFailure::Fatal(err) => panic!("unexpected fatal error: {err}"),
        }
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let fset = FileSet::new();
        let missing = dir.path().join("gone.go");
        let err = parse_default(&fset, &[missing]).unwrap_err();
        assert!(matches!(err, ParseFailure::Fatal(PipelineError::ReadFile { .. })));
    }

    #[test]
    fn test_overlay_replaces_disk_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "a.go", "package p\n\nfunc f( {\n");
        let mut overlay = Overlay::default();
        overlay.insert(path.clone(), Arc::from("package p\n\nfunc f() {}\n"));
        let fset = FileSet::new();
        let files = parse_files(&fset, &[path], &overlay, ParseConfig::default()).unwrap();
        assert_eq!(files[0].decls.len(), 1);
    }

    #[test]
    fn test_empty_input() {
        let fset = FileSet::new();
        let files = parse_default(&fset, &[]).unwrap();
        assert!(files.is_empty());
    }
}
