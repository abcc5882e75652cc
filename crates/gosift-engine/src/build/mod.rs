//! Build context: target platform, build constraints and package file
//! selection.

pub mod constraint;
pub mod platform;
pub mod selector;

pub use constraint::{Constraint, ConstraintError};
pub use platform::{Platform, TagSet};
pub use selector::{
    retarget_for_file, select, FileRole, IgnoreReason, IgnoredFile, SelectError, SelectedFile,
    Selection,
};
