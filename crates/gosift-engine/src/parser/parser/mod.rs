//! Recursive-descent parser for Go.
//!
//! The parser works over the token vector produced by the lexer. Grammar
//! productions live in free functions split by area (`decl`, `stmt`, `expr`,
//! `types`), all taking `&mut Parser`.
//!
//! Errors never abort a production: every production returns a node (a
//! `Bad` one if need be) and records the error. By default at most
//! [`MAX_SYNTAX_ERRORS`] errors are kept per file and only the first error on
//! each line; after that the parser halts. A halted parser reports `EOF` as
//! the current token, which unwinds every loop without special casing.

mod decl;
mod expr;
mod guards;
mod recovery;
mod stmt;
mod types;

use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::parser::ast::{self, Ident};
use crate::parser::error::{ParseError, SyntaxError};
use crate::parser::fileset::{Pos, SourceFile};
use crate::parser::lexer;
use crate::parser::token::{Token, TokenKind};

pub use guards::MAX_NEST_DEPTH;
use guards::DepthGuard;

/// Errors kept per file unless `all_errors` is set.
pub const MAX_SYNTAX_ERRORS: usize = 10;

/// Parser options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Keep every error instead of the first per line, at most ten.
    pub all_errors: bool,
    /// Stop after the import declarations.
    pub imports_only: bool,
}

/// Parser state for one file.
pub struct Parser<'a> {
    file: &'a SourceFile,
    source: &'a str,
    tokens: Vec<Token>,
    index: usize,

    /// < 0: in control clause, >= 0: in expression.
    pub(crate) expr_lev: i32,
    depth: Rc<Cell<usize>>,

    options: ParseOptions,
    errors: Vec<ParseError>,
    lex_errors: Vec<ParseError>,
    halted: bool,
    cancel: Option<&'a AtomicBool>,
    cancelled: bool,

    // Recovery bookkeeping (see `recovery::advance`).
    sync_index: usize,
    sync_count: usize,
}

impl<'a> Parser<'a> {
    /// Tokenize `file` and prepare to parse it.
    pub fn new(file: &'a SourceFile, options: ParseOptions) -> Self {
        let source = file.source();
        let lexed = lexer::lex(source);
        let invalid = file.invalid_utf8();
        // Invalid UTF-8 reads as NUL; report the encoding, not the NUL.
        let encoding_errors = invalid
            .iter()
            .map(|range| (range.start, "illegal UTF-8 encoding".to_string()));
        let token_errors = lexed
            .errors
            .into_iter()
            .filter(|e| !invalid.iter().any(|range| range.contains(&e.offset)))
            .map(|e| (e.offset, e.message));
        let lex_errors = encoding_errors
            .chain(token_errors)
            .map(|(offset, message)| {
                let pos = file.pos(offset);
                ParseError {
                    pos,
                    position: file.position(pos),
                    message,
                }
            })
            .collect();
        Parser {
            file,
            source,
            tokens: lexed.tokens,
            index: 0,
            expr_lev: 0,
            depth: Rc::new(Cell::new(0)),
            options,
            errors: Vec::new(),
            lex_errors,
            halted: false,
            cancel: None,
            cancelled: false,
            sync_index: 0,
            sync_count: 0,
        }
    }

    /// Observe a shared cancellation flag at statement boundaries.
    pub fn with_cancel(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Whether parsing stopped because the cancellation flag was raised.
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    // ========================================================================
    // Token access
    // ========================================================================

    fn token(&self) -> Token {
        self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    /// Current token kind; `Eof` once the parser has halted.
    pub(crate) fn tok(&self) -> TokenKind {
        if self.halted {
            TokenKind::Eof
        } else {
            self.token().kind
        }
    }

    /// Kind of the token `n` positions ahead.
    pub(crate) fn peek(&self, n: usize) -> TokenKind {
        if self.halted {
            return TokenKind::Eof;
        }
        let idx = (self.index + n).min(self.tokens.len() - 1);
        self.tokens[idx].kind
    }

    /// Position of the current token.
    pub(crate) fn pos(&self) -> Pos {
        self.file.pos(self.token().start as usize)
    }

    /// Source text of the current token.
    pub(crate) fn text(&self) -> &'a str {
        self.token().text(self.source)
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.tok() == TokenKind::Eof
    }

    /// Whether the current token is a semicolon inserted at a line end.
    pub(crate) fn at_newline(&self) -> bool {
        self.tok() == TokenKind::Semicolon && self.token().is_implicit_semicolon(self.source)
    }

    pub(crate) fn next(&mut self) {
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
    }

    /// Kind of the token `n` positions ahead of `index`, for bracket scans.
    pub(crate) fn kind_at(&self, index: usize) -> TokenKind {
        self.tokens[index.min(self.tokens.len() - 1)].kind
    }

    // ========================================================================
    // Errors
    // ========================================================================

    /// Record an error at `pos`.
    pub(crate) fn error(&mut self, pos: Pos, message: impl Into<String>) {
        if self.halted {
            return;
        }
        let position = self.file.position(pos);
        if !self.options.all_errors {
            // One error per line: later ones are usually follow-on noise.
            if let Some(last) = self.errors.last() {
                if last.position.line == position.line {
                    return;
                }
            }
        }
        self.errors.push(ParseError {
            pos,
            position,
            message: message.into(),
        });
        if !self.options.all_errors && self.errors.len() >= MAX_SYNTAX_ERRORS {
            self.halted = true;
        }
    }

    /// Describe the current token the way `found ...` messages do.
    fn found(&self) -> String {
        let tok = self.token();
        if self.at_newline() {
            "newline".to_string()
        } else if tok.kind.is_literal() {
            self.text().to_string()
        } else {
            format!("'{}'", tok.kind)
        }
    }

    /// Record "expected `what`", naming the current token when `pos` is at it.
    pub(crate) fn error_expected(&mut self, pos: Pos, what: &str) {
        let mut message = format!("expected {what}");
        if pos == self.pos() {
            message.push_str(", found ");
            message.push_str(&self.found());
        }
        self.error(pos, message);
    }

    // ========================================================================
    // Expectations
    // ========================================================================

    /// Consume `kind` if present.
    pub(crate) fn got(&mut self, kind: TokenKind) -> bool {
        if self.tok() == kind {
            self.next();
            true
        } else {
            false
        }
    }

    /// Expect `kind`, report otherwise, and always make progress.
    pub(crate) fn expect(&mut self, kind: TokenKind) -> Pos {
        let pos = self.pos();
        if self.tok() != kind {
            self.error_expected(pos, &format!("'{kind}'"));
        }
        self.next();
        pos
    }

    /// Like `expect`, but flags a line break that probably lost a comma.
    pub(crate) fn expect_closing(&mut self, kind: TokenKind, context: &str) -> Pos {
        if self.tok() != kind && self.at_newline() {
            let pos = self.pos();
            self.error(pos, format!("missing ',' before newline in {context}"));
            self.next();
        }
        self.expect(kind)
    }

    /// Statement terminator. Optional before `)` and `}`.
    pub(crate) fn expect_semi(&mut self) {
        match self.tok() {
            TokenKind::RParen | TokenKind::RBrace => {}
            TokenKind::Semicolon => self.next(),
            TokenKind::Comma => {
                // Tolerate a ',' where a ';' belongs, but complain.
                let pos = self.pos();
                self.error_expected(pos, "';'");
                self.next();
            }
            _ => {
                let pos = self.pos();
                self.error_expected(pos, "';'");
                recovery::advance_to_stmt_start(self);
            }
        }
    }

    /// Whether list parsing continues: true at a comma, or when a comma is
    /// missing before something other than `follow` (reported, then assumed).
    pub(crate) fn at_comma(&mut self, context: &str, follow: TokenKind) -> bool {
        let tok = self.tok();
        if tok == TokenKind::Comma {
            return true;
        }
        if tok != follow && tok != TokenKind::Eof {
            let mut message = "missing ','".to_string();
            if self.at_newline() {
                message.push_str(" before newline");
            }
            let pos = self.pos();
            self.error(pos, format!("{message} in {context}"));
            return true;
        }
        false
    }

    /// Raise the halt flag if another task asked us to stop.
    pub(crate) fn check_cancel(&mut self) {
        if let Some(flag) = self.cancel {
            if flag.load(Ordering::Relaxed) {
                self.cancelled = true;
                self.halted = true;
            }
        }
    }

    /// Enter a nested production. Returns `None` (after reporting) when the
    /// nesting limit is exceeded; the parser is halted in that case.
    pub(crate) fn nest(&mut self) -> Option<DepthGuard> {
        match DepthGuard::new(Rc::clone(&self.depth)) {
            Some(guard) => Some(guard),
            None => {
                let pos = self.pos();
                self.error(pos, "exceeded max nesting depth");
                self.halted = true;
                None
            }
        }
    }

    /// Force one token of progress if a loop iteration consumed nothing.
    pub(crate) fn ensure_progress(&mut self, start: usize) {
        if self.index == start && !self.at_eof() {
            self.next();
        }
    }

    // ========================================================================
    // Shared small productions
    // ========================================================================

    pub(crate) fn parse_ident(&mut self) -> Ident {
        let pos = self.pos();
        if self.tok() == TokenKind::Ident {
            let name = self.text().to_string();
            self.next();
            Ident::new(name, pos)
        } else {
            self.expect(TokenKind::Ident);
            Ident::new("_", pos)
        }
    }

    pub(crate) fn parse_ident_list(&mut self) -> Vec<Ident> {
        let mut list = vec![self.parse_ident()];
        while self.got(TokenKind::Comma) {
            list.push(self.parse_ident());
        }
        list
    }

    /// Whether the `[` at the current token closes into `]` followed by one
    /// of `follow`. Used to tell `List[int]` from `a [4]int`.
    pub(crate) fn bracket_followed_by(&self, follow: &[TokenKind]) -> bool {
        if self.tok() != TokenKind::LBrack {
            return false;
        }
        let mut depth = 0usize;
        let mut idx = self.index;
        loop {
            match self.kind_at(idx) {
                TokenKind::LBrack | TokenKind::LParen | TokenKind::LBrace => depth += 1,
                TokenKind::RBrack | TokenKind::RParen | TokenKind::RBrace => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return follow.contains(&self.kind_at(idx + 1));
                    }
                }
                TokenKind::Eof => return false,
                _ => {}
            }
            idx += 1;
        }
    }

    fn finish(self, file: ast::File) -> Result<ast::File, SyntaxError> {
        let mut errors = self.lex_errors;
        errors.extend(self.errors);
        match SyntaxError::new(errors) {
            Some(mut err) => {
                if !self.options.all_errors {
                    err.truncate(MAX_SYNTAX_ERRORS);
                }
                Err(err)
            }
            None => Ok(file),
        }
    }
}

/// Parse a complete file.
///
/// Returns the AST, or every syntax error of the file. The cancellation flag,
/// when given, is polled at statement boundaries.
pub fn parse_file(
    file: &SourceFile,
    options: ParseOptions,
    cancel: Option<&AtomicBool>,
) -> Result<ast::File, SyntaxError> {
    let mut parser = Parser::new(file, options);
    if let Some(flag) = cancel {
        parser = parser.with_cancel(flag);
    }
    let ast = decl::parse_source_file(&mut parser);
    parser.finish(ast)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::parser::ast::{Decl, ExprKind, Spec, StmtKind};
    use crate::parser::fileset::FileSet;

    fn parse(source: &str) -> Result<ast::File, SyntaxError> {
        let fset = FileSet::new();
        let file = fset.add_file("test.go", Arc::from(source));
        parse_file(&file, ParseOptions::default(), None)
    }

    fn messages(source: &str) -> Vec<String> {
        match parse(source) {
            Ok(_) => Vec::new(),
            Err(err) => err.errors().iter().map(|e| e.to_string()).collect(),
        }
    }

    #[test]
    fn test_parse_minimal_package() {
        let file = parse("package main\n\nfunc main() {}\n").unwrap();
        assert_eq!(file.package.name, "main");
        assert_eq!(file.decls.len(), 1);
    }

    #[test]
    fn test_parse_imports() {
        let source = "package p\n\nimport (\n\t\"fmt\"\n\tx \"os\"\n)\nimport . \"strings\"\n";
        let file = parse(source).unwrap();
        let paths: Vec<_> = file.imports().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, ["fmt", "os", "strings"]);
        let names: Vec<_> = file
            .imports()
            .map(|i| i.name.as_ref().map(|n| n.name.as_str()))
            .collect();
        assert_eq!(names, [None, Some("x"), Some(".")]);
    }

    #[test]
    fn test_missing_package_clause() {
        assert_eq!(messages("func main() {}\n"), ["test.go:1:1: expected 'package', found 'func'"]);
    }

    #[test]
    fn test_invalid_utf8_is_a_syntax_error() {
        let fset = FileSet::new();
        let bytes = b"package p\n\nvar s = \"\xff\xfe\"\nvar t = 1 // \x80\n".to_vec();
        let file = fset.add_file_bytes("test.go", bytes);
        let err = parse_file(&file, ParseOptions::default(), None).unwrap_err();
        let messages: Vec<String> = err.errors().iter().map(|e| e.to_string()).collect();
        assert_eq!(
            messages,
            ["test.go:3:10: illegal UTF-8 encoding", "test.go:4:14: illegal UTF-8 encoding"]
        );
    }

    #[test]
    fn test_unterminated_block() {
        assert_eq!(
            messages("package p\n\nfunc f() {\n\tx := 1\n"),
            ["test.go:5:1: expected '}', found 'EOF'"]
        );
    }

    #[test]
    fn test_missing_comma_before_newline() {
        let msgs = messages("package p\n\nvar x = f(1,\n\t2\n)\n");
        assert_eq!(msgs, ["test.go:4:3: missing ',' before newline in argument list"]);
    }

    #[test]
    fn test_one_error_per_line() {
        let src = "package p\n\nvar = 1\n";
        assert_eq!(messages(src), ["test.go:3:5: expected 'IDENT', found '='"]);

        let fset = FileSet::new();
        let file = fset.add_file("test.go", Arc::from(src));
        let options = ParseOptions {
            all_errors: true,
            ..Default::default()
        };
        let err = parse_file(&file, options, None).unwrap_err();
        assert_eq!(err.len(), 2);
    }

    #[test]
    fn test_error_limit() {
        let mut src = String::from("package p\n\n");
        for _ in 0..20 {
            src.push_str("var = 1\n");
        }
        assert_eq!(messages(&src).len(), MAX_SYNTAX_ERRORS);

        let fset = FileSet::new();
        let file = fset.add_file("test.go", Arc::from(src.as_str()));
        let options = ParseOptions {
            all_errors: true,
            ..Default::default()
        };
        let err = parse_file(&file, options, None).unwrap_err();
        assert!(err.len() > MAX_SYNTAX_ERRORS);
    }

    #[test]
    fn test_composite_literal_in_if_header() {
        // `T{}` in a control clause is a block, not a literal.
        let file = parse("package p\n\nfunc f(x int) {\n\tif x == y {\n\t}\n}\n").unwrap();
        let Decl::Func(func) = &file.decls[0] else { panic!("expected func") };
        let body = func.body.as_ref().unwrap();
        assert!(matches!(body.stmts[0].kind, StmtKind::If { .. }));
    }

    #[test]
    fn test_generic_type_and_function() {
        let src = "package p\n\ntype List[T any] struct { items []T }\n\n\
                   func Map[K comparable, V any](m map[K]V) []K { return nil }\n\n\
                   var _ = Map[string, int]\n";
        let file = parse(src).unwrap();
        let Decl::Gen(gen) = &file.decls[0] else { panic!() };
        let Spec::Type(spec) = &gen.specs[0] else { panic!() };
        assert_eq!(spec.type_params.len(), 1);
        let Decl::Func(func) = &file.decls[1] else { panic!() };
        assert_eq!(func.type_params.len(), 2);
    }

    #[test]
    fn test_array_type_decl_is_not_generic() {
        let file = parse("package p\n\nconst N = 4\n\ntype A [N]int\n").unwrap();
        let Decl::Gen(gen) = &file.decls[1] else { panic!() };
        let Spec::Type(spec) = &gen.specs[0] else { panic!() };
        assert!(spec.type_params.is_empty());
        assert!(matches!(spec.ty.kind, ExprKind::ArrayType { .. }));
    }

    #[test]
    fn test_go_requires_call() {
        let msgs = messages("package p\n\nfunc f() {\n\tgo 1\n}\n");
        assert_eq!(msgs, ["test.go:4:5: expression in go must be function call"]);
    }

    #[test]
    fn test_imports_only_stops_early() {
        let fset = FileSet::new();
        let file = fset.add_file(
            "test.go",
            Arc::from("package p\nimport \"C\"\nfunc broken( {\n"),
        );
        let options = ParseOptions {
            imports_only: true,
            ..Default::default()
        };
        let ast = parse_file(&file, options, None).unwrap();
        assert_eq!(ast.imports().count(), 1);
    }

    #[test]
    fn test_cancel_flag_halts() {
        let fset = FileSet::new();
        let file = fset.add_file("test.go", Arc::from("package p\nfunc f() { x := 1; _ = x }\n"));
        let flag = AtomicBool::new(true);
        let mut parser = Parser::new(&file, ParseOptions::default()).with_cancel(&flag);
        let _ = decl::parse_source_file(&mut parser);
        assert!(parser.was_cancelled());
    }
}
