//! gosift engine
//!
//! Save-time diagnostics for Go packages:
//! - **Build**: platform context, build constraints and file selection (`build` module)
//! - **Parser**: lexer, AST and recovering parser for Go source (`parser` module)
//! - **Checker**: whole-package type checking with a streaming sink (`checker` module)
//! - **Pipeline**: concurrent parsing and the run driver (`pipeline` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use gosift_engine::{Driver, DriverConfig, RunRequest};
//!
//! let driver = Driver::new(DriverConfig::default());
//! let mut diagnostics = Vec::new();
//! let outcome = driver.run(&RunRequest::for_file("pkg/main.go"), &mut diagnostics);
//! std::process::exit(outcome.status.code());
//! ```

#![warn(rust_2018_idioms)]
#![allow(clippy::too_many_arguments)]

// ============================================================================
// Core Modules
// ============================================================================

/// Platform context, build constraints and package file selection
pub mod build;

/// Go lexer, AST and parser
pub mod parser;

/// Type representation and the package checker
pub mod checker;

/// Diagnostics and renderers
pub mod diagnostic;

/// Concurrent parsing and the run driver
pub mod pipeline;

// ============================================================================
// Re-exports
// ============================================================================

pub use build::{select, Platform, SelectError, Selection};
pub use checker::{
    check_package, CheckConfig, CheckOutcome, FakeCImporter, ImportError, ImportRoots, Importer,
    MemoryImporter, Package, SourceImporter,
};
pub use diagnostic::{Diagnostic, DiagnosticKind, OutputFormat, Renderer, Severity};
pub use parser::{parse_file, FileSet, ParseOptions, Position, SyntaxError};
pub use pipeline::{
    driver::DEFAULT_MAX_ERRORS, Driver, DriverConfig, ExitStatus, PipelineError, Reporter,
    RunOutcome, RunRequest, RunState,
};
