//! Select, parse and check one package.
//!
//! [`Driver`] runs the phases in order and streams every diagnostic to a
//! [`Reporter`]. All state of a run lives in the run itself; a driver can be
//! reused for any number of runs.

pub mod driver;
pub mod parse;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::build::SelectError;

pub use driver::{Driver, DriverConfig, Reporter, RunOutcome, RunRequest};
pub use parse::{parse_files, Overlay, ParseConfig, ParseFailure};

/// Errors that stop a run before any diagnostic can be produced.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("cannot determine working directory: {0}")]
    WorkingDir(#[source] io::Error),
    #[error(transparent)]
    Select(#[from] SelectError),
    #[error("cannot read {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot start parse task: {source}")]
    Spawn {
        #[source]
        source: io::Error,
    },
    #[error("a parse task panicked")]
    TaskPanicked,
}

/// Counters of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunState {
    pub error_count: usize,
    pub bailout_triggered: bool,
}

/// How a run ended, mapped to a process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// No diagnostics.
    Clean,
    /// The run could not proceed.
    Fatal,
    /// At least one syntax or type error.
    Diagnostics,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Clean => 0,
            ExitStatus::Fatal => 1,
            ExitStatus::Diagnostics => 2,
        }
    }

    pub(crate) fn from_state(state: &RunState) -> Self {
        if state.error_count == 0 {
            ExitStatus::Clean
        } else {
            ExitStatus::Diagnostics
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitStatus::Clean.code(), 0);
        assert_eq!(ExitStatus::Fatal.code(), 1);
        assert_eq!(ExitStatus::Diagnostics.code(), 2);
    }

    #[test]
    fn test_status_from_state() {
        assert_eq!(ExitStatus::from_state(&RunState::default()), ExitStatus::Clean);
        let state = RunState {
            error_count: 3,
            bailout_triggered: false,
        };
        assert_eq!(ExitStatus::from_state(&state), ExitStatus::Diagnostics);
    }
}
