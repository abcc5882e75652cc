//! Go type checker.
//!
//! This module provides:
//! - Type representation and interning
//! - The universe scope and the `unsafe` package
//! - Constant evaluation and target sizes
//! - The importer seam (cgo pseudo-import, source importer)
//! - Whole-package checking with a streaming diagnostics sink

pub mod check;
pub mod constant;
pub mod importer;
pub mod objects;
pub mod sizes;
pub mod types;
pub mod universe;

// Re-export main types
pub use check::{check_package, CheckConfig, CheckOutcome, Sink};
pub use constant::ConstValue;
pub use importer::{
    default_package_name, FakeCImporter, ImportError, ImportRoots, Importer, MemberKind,
    MemoryImporter, Package, SourceImporter,
};
pub use sizes::Sizes;
pub use types::{BasicKind, Type, TypeContext, TypeId};
