//! Build constraints: `//go:build` expressions, legacy `// +build` lines and
//! `_GOOS_GOARCH` filename suffixes.

use thiserror::Error;

use crate::build::platform::{is_known_arch, is_known_os, Platform, TagSet};

/// A parsed constraint expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    Tag(String),
    Not(Box<Constraint>),
    And(Box<Constraint>, Box<Constraint>),
    Or(Box<Constraint>, Box<Constraint>),
}

impl Constraint {
    /// Evaluate against `platform`, recording every tag in `tags`.
    ///
    /// Both sides of `&&` and `||` are always evaluated so that every
    /// mentioned tag is recorded.
    pub fn eval(&self, platform: &Platform, tags: &mut TagSet) -> bool {
        self.eval_inner(platform, tags, true)
    }

    fn eval_inner(&self, platform: &Platform, tags: &mut TagSet, positive: bool) -> bool {
        match self {
            Constraint::Tag(tag) => {
                tags.record(tag, positive);
                platform.matches_tag(tag)
            }
            Constraint::Not(x) => !x.eval_inner(platform, tags, !positive),
            Constraint::And(x, y) => {
                let a = x.eval_inner(platform, tags, positive);
                let b = y.eval_inner(platform, tags, positive);
                a && b
            }
            Constraint::Or(x, y) => {
                let a = x.eval_inner(platform, tags, positive);
                let b = y.eval_inner(platform, tags, positive);
                a || b
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstraintError {
    #[error("parsing //go:build line: {0}")]
    GoBuild(String),
    #[error("invalid // +build line: {0}")]
    PlusBuild(String),
    #[error("multiple //go:build comments")]
    MultipleGoBuild,
}

// ============================================================================
// //go:build expressions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Not,
    And,
    Or,
    LParen,
    RParen,
    Tag(String),
}

fn tokenize(expr: &str) -> Result<Vec<Tok>, String> {
    let mut out = Vec::new();
    let mut chars = expr.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            ' ' | '\t' => {}
            '!' => out.push(Tok::Not),
            '(' => out.push(Tok::LParen),
            ')' => out.push(Tok::RParen),
            '&' | '|' => {
                if chars.next_if(|(_, next)| *next == c).is_none() {
                    return Err(format!("invalid syntax at {c}"));
                }
                out.push(if c == '&' { Tok::And } else { Tok::Or });
            }
            c if is_tag_char(c) => {
                let mut end = i + c.len_utf8();
                while let Some((j, next)) = chars.next_if(|(_, n)| is_tag_char(*n)) {
                    end = j + next.len_utf8();
                }
                out.push(Tok::Tag(expr[i..end].to_string()));
            }
            other => return Err(format!("invalid syntax at {other}")),
        }
    }
    Ok(out)
}

fn is_tag_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

struct ExprParser {
    toks: Vec<Tok>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn or(&mut self) -> Result<Constraint, String> {
        let mut x = self.and()?;
        while self.peek() == Some(&Tok::Or) {
            self.pos += 1;
            let y = self.and()?;
            x = Constraint::Or(Box::new(x), Box::new(y));
        }
        Ok(x)
    }

    fn and(&mut self) -> Result<Constraint, String> {
        let mut x = self.not()?;
        while self.peek() == Some(&Tok::And) {
            self.pos += 1;
            let y = self.not()?;
            x = Constraint::And(Box::new(x), Box::new(y));
        }
        Ok(x)
    }

    fn not(&mut self) -> Result<Constraint, String> {
        if self.peek() == Some(&Tok::Not) {
            self.pos += 1;
            if self.peek() == Some(&Tok::Not) {
                return Err("double negation not allowed".to_string());
            }
            return Ok(Constraint::Not(Box::new(self.atom()?)));
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<Constraint, String> {
        match self.toks.get(self.pos).cloned() {
            Some(Tok::LParen) => {
                self.pos += 1;
                let x = self.or()?;
                if self.peek() != Some(&Tok::RParen) {
                    return Err("missing close paren".to_string());
                }
                self.pos += 1;
                Ok(x)
            }
            Some(Tok::Tag(tag)) => {
                self.pos += 1;
                Ok(Constraint::Tag(tag))
            }
            Some(_) => Err("unexpected token".to_string()),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

/// Parse the expression of a `//go:build` line (the text after the prefix).
pub fn parse_go_build(expr: &str) -> Result<Constraint, ConstraintError> {
    let toks = tokenize(expr).map_err(ConstraintError::GoBuild)?;
    let mut parser = ExprParser { toks, pos: 0 };
    let x = parser.or().map_err(ConstraintError::GoBuild)?;
    if parser.pos != parser.toks.len() {
        return Err(ConstraintError::GoBuild("unexpected token".to_string()));
    }
    Ok(x)
}

/// Parse the options of a `// +build` line (the text after `+build`).
/// Space-separated options are ORed, comma-separated terms ANDed.
pub fn parse_plus_build(options: &str) -> Result<Constraint, ConstraintError> {
    let mut result: Option<Constraint> = None;
    for option in options.split_whitespace() {
        let mut clause: Option<Constraint> = None;
        for term in option.split(',') {
            let (negated, name) = match term.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, term),
            };
            if name.is_empty() || name.starts_with('!') || !name.chars().all(is_tag_char) {
                return Err(ConstraintError::PlusBuild(option.to_string()));
            }
            let mut x = Constraint::Tag(name.to_string());
            if negated {
                x = Constraint::Not(Box::new(x));
            }
            clause = Some(match clause {
                Some(c) => Constraint::And(Box::new(c), Box::new(x)),
                None => x,
            });
        }
        if let Some(clause) = clause {
            result = Some(match result {
                Some(r) => Constraint::Or(Box::new(r), Box::new(clause)),
                None => clause,
            });
        }
    }
    result.ok_or_else(|| ConstraintError::PlusBuild(options.to_string()))
}

// ============================================================================
// File headers
// ============================================================================

/// Constraint comments found in a file header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    pub go_build: Option<String>,
    /// `// +build` option strings that are followed by a blank line.
    pub plus_build: Vec<String>,
}

/// Scan the leading comments of a Go file for constraint lines.
///
/// The header ends at the first non-comment text. `// +build` lines only
/// count if a blank line separates them from that text.
pub fn scan_header(source: &str) -> Result<Header, ConstraintError> {
    let mut header = Header::default();
    let mut candidates: Vec<(usize, String)> = Vec::new();
    let mut last_blank = 0usize;
    let mut in_block_comment = false;

    'lines: for (line_no, raw) in source.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() && !in_block_comment {
            last_blank = line_no + 1;
            continue;
        }

        if !in_block_comment {
            if let Some(rest) = line.strip_prefix("//go:build") {
                if rest.is_empty() || rest.starts_with([' ', '\t']) {
                    if header.go_build.is_some() {
                        return Err(ConstraintError::MultipleGoBuild);
                    }
                    header.go_build = Some(rest.trim().to_string());
                }
            } else if let Some(rest) = line.strip_prefix("//") {
                if let Some(options) = rest.trim_start().strip_prefix("+build") {
                    if options.is_empty() || options.starts_with([' ', '\t']) {
                        candidates.push((line_no, options.trim().to_string()));
                    }
                }
            }
        }

        let mut rest = line;
        while !rest.is_empty() {
            if in_block_comment {
                match rest.find("*/") {
                    Some(i) => {
                        in_block_comment = false;
                        rest = rest[i + 2..].trim();
                        continue;
                    }
                    None => continue 'lines,
                }
            }
            if rest.starts_with("//") {
                continue 'lines;
            }
            if let Some(after) = rest.strip_prefix("/*") {
                in_block_comment = true;
                rest = after.trim();
                continue;
            }
            // Non-comment text ends the header.
            break 'lines;
        }
    }

    header.plus_build = candidates
        .into_iter()
        .filter(|(line_no, _)| *line_no < last_blank)
        .map(|(_, options)| options)
        .collect();
    Ok(header)
}

/// Whether a file with this header should be built. `//go:build` wins over
/// `// +build` lines.
pub fn should_build(
    header: &Header,
    platform: &Platform,
    tags: &mut TagSet,
) -> Result<bool, ConstraintError> {
    if let Some(expr) = &header.go_build {
        let x = parse_go_build(expr)?;
        return Ok(x.eval(platform, tags));
    }
    let mut ok = true;
    for options in &header.plus_build {
        let x = parse_plus_build(options)?;
        if !x.eval(platform, tags) {
            ok = false;
        }
    }
    Ok(ok)
}

/// Apply the `name_GOOS_GOARCH.go` / `name_GOOS.go` / `name_GOARCH.go` rule.
pub fn good_os_arch_file(name: &str, platform: &Platform, tags: &mut TagSet) -> bool {
    let stem = name.split('.').next().unwrap_or(name);
    // Everything before the first '_' is ignored.
    let Some(i) = stem.find('_') else {
        return true;
    };
    let mut parts: Vec<&str> = stem[i..].split('_').collect();
    if parts.last() == Some(&"test") {
        parts.pop();
    }
    let n = parts.len();
    if n >= 2 && is_known_os(parts[n - 2]) && is_known_arch(parts[n - 1]) {
        tags.record(parts[n - 2], true);
        tags.record(parts[n - 1], true);
        return platform.matches_tag(parts[n - 1]) && platform.matches_tag(parts[n - 2]);
    }
    if n >= 1 && (is_known_os(parts[n - 1]) || is_known_arch(parts[n - 1])) {
        tags.record(parts[n - 1], true);
        return platform.matches_tag(parts[n - 1]);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux() -> Platform {
        Platform::new("linux", "amd64").with_cgo(false)
    }

    #[test]
    fn test_go_build_expressions() {
        let p = linux();
        let mut tags = TagSet::new();
        let eval = |s: &str, tags: &mut TagSet| parse_go_build(s).unwrap().eval(&p, tags);
        assert!(eval("linux", &mut tags));
        assert!(eval("linux && amd64", &mut tags));
        assert!(!eval("linux && !amd64", &mut tags));
        assert!(eval("(darwin || linux) && !windows", &mut tags));
        assert!(eval("go1.18", &mut tags));
        assert!(!eval("ignore", &mut tags));
        assert_eq!(tags.get("windows"), Some(false));
        assert_eq!(tags.get("darwin"), Some(true));
    }

    #[test]
    fn test_go_build_syntax_errors() {
        assert!(parse_go_build("linux &&").is_err());
        assert!(parse_go_build("linux & amd64").is_err());
        assert!(parse_go_build("(linux").is_err());
        assert!(parse_go_build("!!linux").is_err());
    }

    #[test]
    fn test_plus_build_lines() {
        let p = linux();
        let mut tags = TagSet::new();
        assert!(parse_plus_build("darwin linux").unwrap().eval(&p, &mut tags));
        assert!(!parse_plus_build("linux,386").unwrap().eval(&p, &mut tags));
        assert!(parse_plus_build("!windows,amd64").unwrap().eval(&p, &mut tags));
    }

    #[test]
    fn test_header_requires_blank_line_after_plus_build() {
        let with_blank = "// +build windows\n\npackage p\n";
        let without = "// +build windows\npackage p\n";
        assert_eq!(scan_header(with_blank).unwrap().plus_build, ["windows"]);
        assert!(scan_header(without).unwrap().plus_build.is_empty());
    }

    #[test]
    fn test_header_go_build_wins() {
        let src = "// Copyright\n\n//go:build linux\n// +build windows\n\npackage p\n";
        let header = scan_header(src).unwrap();
        assert_eq!(header.go_build.as_deref(), Some("linux"));
        let mut tags = TagSet::new();
        assert!(should_build(&header, &linux(), &mut tags).unwrap());
    }

    #[test]
    fn test_header_stops_at_package_clause() {
        let src = "package p\n\n//go:build ignore\n";
        assert_eq!(scan_header(src).unwrap(), Header::default());
    }

    #[test]
    fn test_header_skips_block_comments() {
        let src = "/* license\n   text */\n\n//go:build windows\n\npackage p\n";
        assert_eq!(scan_header(src).unwrap().go_build.as_deref(), Some("windows"));
    }

    #[test]
    fn test_filename_suffixes() {
        let p = linux();
        let mut tags = TagSet::new();
        assert!(good_os_arch_file("file.go", &p, &mut tags));
        assert!(good_os_arch_file("linux.go", &p, &mut tags));
        assert!(good_os_arch_file("file_linux.go", &p, &mut tags));
        assert!(good_os_arch_file("file_linux_amd64_test.go", &p, &mut tags));
        assert!(!good_os_arch_file("file_windows.go", &p, &mut tags));
        assert!(!good_os_arch_file("file_arm64.go", &p, &mut tags));
        assert!(!good_os_arch_file("file_linux_386.go", &p, &mut tags));
        assert!(good_os_arch_file("file_other.go", &p, &mut tags));
        assert!(tags.is_positive("windows"));
    }

    #[test]
    fn test_android_matches_linux_files() {
        let p = Platform::new("android", "arm64");
        let mut tags = TagSet::new();
        assert!(good_os_arch_file("x_linux.go", &p, &mut tags));
        assert!(!good_os_arch_file("x_darwin.go", &p, &mut tags));
    }
}
