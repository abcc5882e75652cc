//! Syntax error types.

use std::fmt;

use thiserror::Error;

use crate::parser::fileset::{Pos, Position};

/// A single scanner or parser error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{position}: {message}")]
pub struct ParseError {
    /// Global position (orders errors across files).
    pub pos: Pos,
    /// Resolved position.
    pub position: Position,
    pub message: String,
}

/// All syntax errors of one file, sorted by position. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct SyntaxError {
    errors: Vec<ParseError>,
}

impl SyntaxError {
    /// Build from a non-empty error list. Returns `None` for an empty list.
    pub fn new(mut errors: Vec<ParseError>) -> Option<Self> {
        if errors.is_empty() {
            return None;
        }
        errors.sort_by(|a, b| {
            (a.position.line, a.position.column, &a.message)
                .cmp(&(b.position.line, b.position.column, &b.message))
        });
        errors.dedup_by(|a, b| a.position.line == b.position.line && a.message == b.message);
        Some(SyntaxError { errors })
    }

    /// Keep only the first `n` errors (at least one).
    pub(crate) fn truncate(&mut self, n: usize) {
        self.errors.truncate(n.max(1));
    }

    /// Individual errors in position order.
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    /// Name of the file the errors belong to.
    pub fn filename(&self) -> &str {
        &self.errors[0].position.filename
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.errors[0])?;
        if self.errors.len() > 1 {
            write!(f, " (and {} more errors)", self.errors.len() - 1)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err(line: u32, column: u32, message: &str) -> ParseError {
        ParseError {
            pos: Pos(line * 100 + column),
            position: Position {
                filename: "a.go".into(),
                line,
                column,
                offset: 0,
            },
            message: message.into(),
        }
    }

    #[test]
    fn test_sorted_and_summarized() {
        let e = SyntaxError::new(vec![err(3, 1, "second"), err(1, 5, "first")]).unwrap();
        assert_eq!(e.errors()[0].message, "first");
        assert_eq!(e.to_string(), "a.go:1:5: first (and 1 more errors)");
    }

    #[test]
    fn test_empty_list_is_not_an_error() {
        assert!(SyntaxError::new(Vec::new()).is_none());
    }
}
