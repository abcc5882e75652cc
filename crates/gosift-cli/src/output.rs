//! Diagnostic output on stderr.
//!
//! Uses `termcolor` for colored output. Respects `NO_COLOR` and `--color`.

use std::io::Write;

use termcolor::{ColorChoice, StandardStream, WriteColor};

use gosift_engine::parser::FileSet;
use gosift_engine::{Diagnostic, OutputFormat, Renderer, Reporter};

/// Resolve `ColorChoice` from the `--color` flag and environment.
///
/// Priority: `NO_COLOR` env > `--color` flag > auto-detect TTY.
pub fn resolve_color_choice(flag: Option<&str>) -> ColorChoice {
    if std::env::var_os("NO_COLOR").is_some() {
        return ColorChoice::Never;
    }
    match flag {
        Some("always") => ColorChoice::Always,
        Some("never") => ColorChoice::Never,
        _ => ColorChoice::Auto,
    }
}

/// Streams diagnostics to a writer as the driver reports them.
pub struct DiagnosticWriter<W: WriteColor> {
    renderer: Renderer,
    out: W,
    /// Files already handed to the renderer.
    sources: usize,
}

impl DiagnosticWriter<StandardStream> {
    pub fn stderr(format: OutputFormat, color: ColorChoice) -> Self {
        // Plain lines are parsed by editors; never color them.
        let color = match format {
            OutputFormat::Pretty => color,
            OutputFormat::Plain | OutputFormat::Json => ColorChoice::Never,
        };
        DiagnosticWriter::new(format, StandardStream::stderr(color))
    }
}

impl<W: WriteColor> DiagnosticWriter<W> {
    pub fn new(format: OutputFormat, out: W) -> Self {
        DiagnosticWriter {
            renderer: Renderer::new(format),
            out,
            sources: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: WriteColor> Reporter for DiagnosticWriter<W> {
    fn report(&mut self, fset: &FileSet, diag: &Diagnostic) {
        if self.renderer.format() == OutputFormat::Pretty && fset.len() != self.sources {
            self.renderer.add_sources(fset);
            self.sources = fset.len();
        }
        // A closed stderr leaves nowhere to complain to.
        let _ = self.renderer.render(diag, &mut self.out);
        let _ = self.out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gosift_engine::Position;
    use termcolor::NoColor;

    fn diag() -> Diagnostic {
        Diagnostic::type_error(
            "undefined: x",
            Position {
                filename: "a.go".into(),
                line: 4,
                column: 2,
                offset: 30,
            },
        )
    }

    #[test]
    fn test_plain_lines() {
        let mut writer = DiagnosticWriter::new(OutputFormat::Plain, NoColor::new(Vec::new()));
        writer.report(&FileSet::new(), &diag());
        writer.report(&FileSet::new(), &Diagnostic::fatal("cannot read directory"));
        let text = String::from_utf8(writer.into_inner().into_inner()).unwrap();
        assert_eq!(text, "a.go:4:2: undefined: x\ncannot read directory\n");
    }

    #[test]
    fn test_json_lines() {
        let mut writer = DiagnosticWriter::new(OutputFormat::Json, NoColor::new(Vec::new()));
        writer.report(&FileSet::new(), &diag());
        let text = String::from_utf8(writer.into_inner().into_inner()).unwrap();
        assert!(text.starts_with('{') && text.ends_with("}\n"), "{text}");
        assert!(text.contains("\"message\":\"undefined: x\""), "{text}");
    }

    #[test]
    fn test_no_color_env_wins() {
        std::env::set_var("NO_COLOR", "1");
        assert!(matches!(resolve_color_choice(Some("always")), ColorChoice::Never));
        std::env::remove_var("NO_COLOR");
    }
}
