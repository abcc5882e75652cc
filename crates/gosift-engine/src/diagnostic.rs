//! Diagnostics and their renderers.
//!
//! A [`Diagnostic`] is a plain value: message, optional position, severity
//! and the phase that produced it. [`Renderer`] writes diagnostics in one of
//! three formats: the line-oriented `file:line:col: message` form editors
//! parse, a codespan-rendered form with source snippets, or one JSON object
//! per line.

use std::io;
use std::str::FromStr;

use codespan_reporting::diagnostic::{Diagnostic as CsDiagnostic, Label, Severity as CsSeverity};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use termcolor::WriteColor;

use crate::parser::{FileSet, ParseError, Position, SyntaxError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Which phase produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    /// The run could not proceed (I/O, conflicting packages).
    Fatal,
    Syntax,
    Type,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
    pub position: Option<Position>,
}

impl Diagnostic {
    pub fn error(
        kind: DiagnosticKind,
        message: impl Into<String>,
        position: Option<Position>,
    ) -> Self {
        Diagnostic {
            severity: Severity::Error,
            kind,
            message: message.into(),
            position,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::error(DiagnosticKind::Fatal, message, None)
    }

    pub fn type_error(message: impl Into<String>, position: Position) -> Self {
        Self::error(DiagnosticKind::Type, message, Some(position))
    }

    /// One diagnostic per individual syntax error.
    pub fn from_syntax_error(err: &SyntaxError) -> Vec<Diagnostic> {
        err.errors().iter().map(Diagnostic::from).collect()
    }
}

impl From<&ParseError> for Diagnostic {
    fn from(err: &ParseError) -> Self {
        Diagnostic::error(DiagnosticKind::Syntax, err.message.clone(), Some(err.position.clone()))
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.position {
            Some(pos) if !pos.filename.is_empty() => write!(f, "{pos}: {}", self.message),
            _ => f.write_str(&self.message),
        }
    }
}

/// Output format for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `file:line:column: message`
    #[default]
    Plain,
    /// Source snippets via codespan-reporting.
    Pretty,
    /// One JSON object per line.
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(OutputFormat::Plain),
            "pretty" => Ok(OutputFormat::Pretty),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!(
                "unknown output format '{other}' (expected plain, pretty or json)"
            )),
        }
    }
}

/// Writes diagnostics in the selected format.
pub struct Renderer {
    format: OutputFormat,
    files: SimpleFiles<String, String>,
    file_ids: FxHashMap<String, usize>,
}

impl Renderer {
    pub fn new(format: OutputFormat) -> Self {
        Renderer {
            format,
            files: SimpleFiles::new(),
            file_ids: FxHashMap::default(),
        }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Make the sources of `fileset` available for snippets.
    pub fn add_sources(&mut self, fileset: &FileSet) {
        for file in fileset.files() {
            if !self.file_ids.contains_key(file.name()) {
                let id = self.files.add(file.name().to_string(), file.source().to_string());
                self.file_ids.insert(file.name().to_string(), id);
            }
        }
    }

    pub fn render(&self, diag: &Diagnostic, out: &mut dyn WriteColor) -> io::Result<()> {
        match self.format {
            OutputFormat::Plain => writeln!(out, "{diag}"),
            OutputFormat::Json => {
                let line = serde_json::to_string(diag).map_err(io::Error::other)?;
                writeln!(out, "{line}")
            }
            OutputFormat::Pretty => self.render_pretty(diag, out),
        }
    }

    fn render_pretty(&self, diag: &Diagnostic, out: &mut dyn WriteColor) -> io::Result<()> {
        let severity = match diag.severity {
            Severity::Error => CsSeverity::Error,
            Severity::Warning => CsSeverity::Warning,
        };
        let mut cs = CsDiagnostic::new(severity).with_message(&diag.message);
        if let Some(pos) = &diag.position {
            match self.file_ids.get(&pos.filename) {
                Some(&id) => {
                    let len = self.files.get(id).map(|f| f.source().len()).unwrap_or(0);
                    let start = pos.offset.min(len);
                    let end = (start + 1).min(len);
                    cs = cs.with_labels(vec![Label::primary(id, start..end)]);
                }
                None => cs = cs.with_notes(vec![format!("at {pos}")]),
            }
        }
        let config = term::Config::default();
        term::emit(out, &config, &self.files, &cs).map_err(io::Error::other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use termcolor::NoColor;

    fn position() -> Position {
        Position {
            filename: "a.go".into(),
            line: 3,
            column: 7,
            offset: 20,
        }
    }

    fn render(format: OutputFormat, diag: &Diagnostic) -> String {
        let mut renderer = Renderer::new(format);
        let fset = FileSet::new();
        fset.add_file("a.go", Arc::from("package p\n\nfunc f() { x := 1 }\n"));
        renderer.add_sources(&fset);
        let mut out = NoColor::new(Vec::new());
        renderer.render(diag, &mut out).unwrap();
        String::from_utf8(out.into_inner()).unwrap()
    }

    #[test]
    fn test_plain_format() {
        let diag = Diagnostic::type_error("declared and not used: x", position());
        assert_eq!(render(OutputFormat::Plain, &diag), "a.go:3:7: declared and not used: x\n");
        assert_eq!(render(OutputFormat::Plain, &Diagnostic::fatal("boom")), "boom\n");
    }

    #[test]
    fn test_json_format() {
        let diag = Diagnostic::type_error("undefined: y", position());
        let line = render(OutputFormat::Json, &diag);
        let value: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(value["message"], "undefined: y");
        assert_eq!(value["kind"], "type");
        assert_eq!(value["position"]["line"], 3);
    }

    #[test]
    fn test_pretty_format_shows_source() {
        let diag = Diagnostic::type_error("declared and not used: x", position());
        let text = render(OutputFormat::Pretty, &diag);
        assert!(text.contains("declared and not used: x"));
        assert!(text.contains("a.go"));
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("json".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
