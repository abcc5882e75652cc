//! Lexer for Go source.
//!
//! Raw tokenization is done by logos. A small driver loop on top of it
//! implements Go's automatic semicolon insertion: a newline (or a block
//! comment spanning lines, or EOF) after an identifier, literal, one of the
//! keywords `break continue fallthrough return`, or one of `++ -- ) ] }`
//! becomes a `;` token.

use logos::Logos;

use crate::parser::token::{Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumberKind {
    Int,
    Float,
    Imag,
}

/// Logos-based token enum for lexing.
///
/// Converted to [`TokenKind`] by the driver loop.
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\r\f]+")]
enum RawToken {
    #[token("\n")]
    Newline,

    #[regex(r"//[^\n]*")]
    LineComment,

    // Carries whether the comment spans a newline.
    #[token("/*", lex_block_comment)]
    BlockComment(bool),

    #[regex(r"[\p{L}_][\p{L}\p{Nd}_]*")]
    Word,

    #[regex(r"[0-9]", lex_number)]
    #[regex(r"\.[0-9]", lex_number)]
    Number(NumberKind),

    #[regex(r#""([^"\\\n]|\\[^\n])*""#)]
    Str,

    #[regex(r"`[^`]*`")]
    RawStr,

    #[regex(r"'([^'\\\n]|\\[^\n])*'")]
    Char,

    #[token("+")]
    Add,
    #[token("-")]
    Sub,
    #[token("*")]
    Mul,
    #[token("/")]
    Quo,
    #[token("%")]
    Rem,
    #[token("&")]
    And,
    #[token("|")]
    Or,
    #[token("^")]
    Xor,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token("&^")]
    AndNot,
    #[token("+=")]
    AddAssign,
    #[token("-=")]
    SubAssign,
    #[token("*=")]
    MulAssign,
    #[token("/=")]
    QuoAssign,
    #[token("%=")]
    RemAssign,
    #[token("&=")]
    AndAssign,
    #[token("|=")]
    OrAssign,
    #[token("^=")]
    XorAssign,
    #[token("<<=")]
    ShlAssign,
    #[token(">>=")]
    ShrAssign,
    #[token("&^=")]
    AndNotAssign,
    #[token("&&")]
    LAnd,
    #[token("||")]
    LOr,
    #[token("<-")]
    Arrow,
    #[token("++")]
    Inc,
    #[token("--")]
    Dec,
    #[token("==")]
    Eql,
    #[token("<")]
    Lss,
    #[token(">")]
    Gtr,
    #[token("=")]
    Assign,
    #[token("!")]
    Not,
    #[token("!=")]
    Neq,
    #[token("<=")]
    Leq,
    #[token(">=")]
    Geq,
    #[token(":=")]
    Define,
    #[token("...")]
    Ellipsis,
    #[token("(")]
    LParen,
    #[token("[")]
    LBrack,
    #[token("{")]
    LBrace,
    #[token(",")]
    Comma,
    #[token(".")]
    Period,
    #[token(")")]
    RParen,
    #[token("]")]
    RBrack,
    #[token("}")]
    RBrace,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token("~")]
    Tilde,
}

/// Consume a block comment. Unterminated comments swallow the rest of the
/// file and produce an error token.
fn lex_block_comment(lex: &mut logos::Lexer<RawToken>) -> Option<bool> {
    let rest = lex.remainder();
    match rest.find("*/") {
        Some(end) => {
            let spans_line = rest[..end].contains('\n');
            lex.bump(end + 2);
            Some(spans_line)
        }
        None => {
            lex.bump(rest.len());
            None
        }
    }
}

/// Consume the remainder of a numeric literal whose first character (or
/// `.digit`) was matched by the regex.
fn lex_number(lex: &mut logos::Lexer<RawToken>) -> NumberKind {
    let first = lex.slice().as_bytes()[0];
    let rest = lex.remainder().as_bytes();
    let mut i = 0;
    let mut kind = NumberKind::Int;

    let scan = |i: &mut usize, pred: fn(u8) -> bool| {
        while *i < rest.len() && (pred(rest[*i]) || rest[*i] == b'_') {
            *i += 1;
        }
    };

    if first == b'.' {
        kind = NumberKind::Float;
        scan(&mut i, |b| b.is_ascii_digit());
        scan_exponent(rest, &mut i, b"eE", &mut kind);
    } else if first == b'0' && i < rest.len() && matches!(rest[i], b'x' | b'X') {
        i += 1;
        scan(&mut i, |b| b.is_ascii_hexdigit());
        if i < rest.len() && rest[i] == b'.' {
            kind = NumberKind::Float;
            i += 1;
            scan(&mut i, |b| b.is_ascii_hexdigit());
        }
        scan_exponent(rest, &mut i, b"pP", &mut kind);
    } else if first == b'0' && i < rest.len() && matches!(rest[i], b'b' | b'B' | b'o' | b'O') {
        i += 1;
        scan(&mut i, |b| b.is_ascii_digit());
    } else {
        scan(&mut i, |b| b.is_ascii_digit());
        if i < rest.len() && rest[i] == b'.' && !rest[i + 1..].starts_with(b"..") {
            kind = NumberKind::Float;
            i += 1;
            scan(&mut i, |b| b.is_ascii_digit());
        }
        scan_exponent(rest, &mut i, b"eE", &mut kind);
    }

    if i < rest.len() && rest[i] == b'i' {
        i += 1;
        kind = NumberKind::Imag;
    }
    lex.bump(i);
    kind
}

fn scan_exponent(rest: &[u8], i: &mut usize, markers: &[u8], kind: &mut NumberKind) {
    if *i < rest.len() && markers.contains(&rest[*i]) {
        *kind = NumberKind::Float;
        *i += 1;
        if *i < rest.len() && matches!(rest[*i], b'+' | b'-') {
            *i += 1;
        }
        while *i < rest.len() && (rest[*i].is_ascii_digit() || rest[*i] == b'_') {
            *i += 1;
        }
    }
}

/// A lexical error at a byte offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub offset: usize,
    pub message: String,
}

/// Result of lexing a source file. Tokens always end with `Eof`.
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<Token>,
    pub errors: Vec<LexError>,
}

/// Tokenize `source`, inserting semicolons per the Go spec.
pub fn lex(source: &str) -> LexResult {
    let mut tokens = Vec::with_capacity(source.len() / 4);
    let mut errors = Vec::new();
    let mut insert_semi = false;

    // A leading byte order mark is permitted and ignored.
    let skip = if source.starts_with('\u{feff}') { 3 } else { 0 };
    let mut lexer = RawToken::lexer(&source[skip..]);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let (start, end) = (span.start + skip, span.end + skip);
        let kind = match result {
            Ok(RawToken::Newline) => {
                if insert_semi {
                    tokens.push(Token::new(TokenKind::Semicolon, start, end));
                    insert_semi = false;
                }
                continue;
            }
            Ok(RawToken::LineComment) => continue,
            Ok(RawToken::BlockComment(spans_line)) => {
                if spans_line && insert_semi {
                    tokens.push(Token::new(TokenKind::Semicolon, start, start));
                    insert_semi = false;
                }
                continue;
            }
            Ok(RawToken::Word) => {
                TokenKind::keyword(lexer.slice()).unwrap_or(TokenKind::Ident)
            }
            Ok(RawToken::Number(kind)) => {
                if let Some(message) = validate_number(lexer.slice()) {
                    errors.push(LexError {
                        offset: start,
                        message,
                    });
                }
                match kind {
                    NumberKind::Int => TokenKind::Int,
                    NumberKind::Float => TokenKind::Float,
                    NumberKind::Imag => TokenKind::Imag,
                }
            }
            Ok(RawToken::Str) | Ok(RawToken::RawStr) => TokenKind::String,
            Ok(RawToken::Char) => {
                if let Some(message) = validate_rune(lexer.slice()) {
                    errors.push(LexError {
                        offset: start,
                        message,
                    });
                }
                TokenKind::Char
            }
            Ok(raw) => convert_operator(raw),
            Err(()) => {
                match recover_from_error(&mut lexer, source, start) {
                    Some((kind, message)) => {
                        errors.push(LexError {
                            offset: start,
                            message,
                        });
                        if let Some(kind) = kind {
                            let end = lexer.span().end + skip;
                            tokens.push(Token::new(kind, start, end));
                            insert_semi = kind.inserts_semicolon();
                        }
                    }
                    None => {}
                }
                continue;
            }
        };
        tokens.push(Token::new(kind, start, end));
        insert_semi = kind.inserts_semicolon();
    }

    let len = source.len();
    if insert_semi {
        tokens.push(Token::new(TokenKind::Semicolon, len, len));
    }
    tokens.push(Token::new(TokenKind::Eof, len, len));

    LexResult { tokens, errors }
}

/// Classify an error token. Unterminated literals still yield a token so
/// the parser doesn't cascade; stray characters are dropped.
fn recover_from_error(
    lexer: &mut logos::Lexer<RawToken>,
    source: &str,
    start: usize,
) -> Option<(Option<TokenKind>, String)> {
    let text = lexer.slice();
    if text.starts_with("/*") {
        return Some((None, "comment not terminated".to_string()));
    }
    let ch = source[start..].chars().next()?;
    let line_rest = |lexer: &logos::Lexer<RawToken>| {
        let rem = lexer.remainder();
        rem.find('\n').unwrap_or(rem.len())
    };
    match ch {
        '"' => {
            let n = line_rest(lexer);
            lexer.bump(n);
            Some((Some(TokenKind::String), "string literal not terminated".to_string()))
        }
        '\'' => {
            let n = line_rest(lexer);
            lexer.bump(n);
            Some((Some(TokenKind::Char), "rune literal not terminated".to_string()))
        }
        '`' => {
            let n = lexer.remainder().len();
            lexer.bump(n);
            Some((
                Some(TokenKind::String),
                "raw string literal not terminated".to_string(),
            ))
        }
        c => {
            // logos may have consumed only part of a multi-byte character.
            let consumed = text.len();
            if consumed < c.len_utf8() {
                lexer.bump(c.len_utf8() - consumed);
            }
            Some((None, format!("invalid character U+{:04X} '{}'", c as u32, c)))
        }
    }
}

fn validate_number(text: &str) -> Option<String> {
    let lower = text.to_ascii_lowercase();
    let body = lower.trim_end_matches('i');
    let (prefix, digits) = if body.len() > 1 && body.starts_with('0') {
        match body.as_bytes()[1] {
            b'x' => ("hexadecimal", &body[2..]),
            b'b' => ("binary", &body[2..]),
            b'o' => ("octal", &body[2..]),
            _ => ("", body),
        }
    } else {
        ("", body)
    };
    match prefix {
        "" => {
            let legacy_octal = body.len() > 1
                && body.starts_with('0')
                && body.bytes().all(|b| b.is_ascii_digit() || b == b'_')
                && !text.ends_with('i');
            if legacy_octal {
                if let Some(bad) = body.chars().find(|c| *c == '8' || *c == '9') {
                    return Some(format!("invalid digit '{bad}' in octal literal"));
                }
            }
            None
        }
        _ if digits.is_empty() || digits.starts_with(['.', 'p']) && digits.len() == 1 => {
            Some(format!("{prefix} literal has no digits"))
        }
        "binary" => digits
            .chars()
            .find(|c| !matches!(c, '0' | '1' | '_'))
            .map(|c| format!("invalid digit '{c}' in binary literal")),
        "octal" => digits
            .chars()
            .find(|c| !matches!(c, '0'..='7' | '_'))
            .map(|c| format!("invalid digit '{c}' in octal literal")),
        _ => None,
    }
}

fn validate_rune(text: &str) -> Option<String> {
    let inner = &text[1..text.len() - 1];
    if inner.starts_with('\\') {
        return None;
    }
    match inner.chars().count() {
        0 => Some("empty rune literal or unescaped ' in rune literal".to_string()),
        1 => None,
        _ => Some("more than one character in rune literal".to_string()),
    }
}

fn convert_operator(raw: RawToken) -> TokenKind {
    use TokenKind as T;
    match raw {
        RawToken::Add => T::Add,
        RawToken::Sub => T::Sub,
        RawToken::Mul => T::Mul,
        RawToken::Quo => T::Quo,
        RawToken::Rem => T::Rem,
        RawToken::And => T::And,
        RawToken::Or => T::Or,
        RawToken::Xor => T::Xor,
        RawToken::Shl => T::Shl,
        RawToken::Shr => T::Shr,
        RawToken::AndNot => T::AndNot,
        RawToken::AddAssign => T::AddAssign,
        RawToken::SubAssign => T::SubAssign,
        RawToken::MulAssign => T::MulAssign,
        RawToken::QuoAssign => T::QuoAssign,
        RawToken::RemAssign => T::RemAssign,
        RawToken::AndAssign => T::AndAssign,
        RawToken::OrAssign => T::OrAssign,
        RawToken::XorAssign => T::XorAssign,
        RawToken::ShlAssign => T::ShlAssign,
        RawToken::ShrAssign => T::ShrAssign,
        RawToken::AndNotAssign => T::AndNotAssign,
        RawToken::LAnd => T::LAnd,
        RawToken::LOr => T::LOr,
        RawToken::Arrow => T::Arrow,
        RawToken::Inc => T::Inc,
        RawToken::Dec => T::Dec,
        RawToken::Eql => T::Eql,
        RawToken::Lss => T::Lss,
        RawToken::Gtr => T::Gtr,
        RawToken::Assign => T::Assign,
        RawToken::Not => T::Not,
        RawToken::Neq => T::Neq,
        RawToken::Leq => T::Leq,
        RawToken::Geq => T::Geq,
        RawToken::Define => T::Define,
        RawToken::Ellipsis => T::Ellipsis,
        RawToken::LParen => T::LParen,
        RawToken::LBrack => T::LBrack,
        RawToken::LBrace => T::LBrace,
        RawToken::Comma => T::Comma,
        RawToken::Period => T::Period,
        RawToken::RParen => T::RParen,
        RawToken::RBrack => T::RBrack,
        RawToken::RBrace => T::RBrace,
        RawToken::Semicolon => T::Semicolon,
        RawToken::Colon => T::Colon,
        RawToken::Tilde => T::Tilde,
        // Non-operator tokens are converted by the driver loop.
        RawToken::Newline
        | RawToken::LineComment
        | RawToken::BlockComment(_)
        | RawToken::Word
        | RawToken::Number(_)
        | RawToken::Str
        | RawToken::RawStr
        | RawToken::Char => T::Eof,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let result = lex(source);
        assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);
        result.tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_semicolon_insertion_after_ident() {
        use TokenKind::*;
        assert_eq!(
            kinds("package main\nvar x = y\n"),
            vec![Package, Ident, Semicolon, Var, Ident, Assign, Ident, Semicolon, Eof]
        );
    }

    #[test]
    fn test_no_semicolon_after_operator() {
        use TokenKind::*;
        assert_eq!(kinds("x +\ny"), vec![Ident, Add, Ident, Semicolon, Eof]);
    }

    #[test]
    fn test_semicolon_at_eof_and_after_brace() {
        use TokenKind::*;
        assert_eq!(kinds("}"), vec![RBrace, Semicolon, Eof]);
        assert_eq!(kinds("return"), vec![Return, Semicolon, Eof]);
    }

    #[test]
    fn test_block_comment_with_newline_inserts_semicolon() {
        use TokenKind::*;
        assert_eq!(kinds("x /* a\nb */ y"), vec![Ident, Semicolon, Ident, Semicolon, Eof]);
        assert_eq!(kinds("x /* a b */ y"), vec![Ident, Ident, Semicolon, Eof]);
    }

    #[test]
    fn test_numbers() {
        use TokenKind::*;
        assert_eq!(
            kinds("1 0x1F 1.5 .5 1e9 0x1p-2 2i 0b101 0o17 1_000"),
            vec![Int, Int, Float, Float, Float, Float, Imag, Int, Int, Int, Semicolon, Eof]
        );
    }

    #[test]
    fn test_strings_and_runes() {
        use TokenKind::*;
        assert_eq!(
            kinds(r#""a\"b" `raw
string` '\'' 'x'"#),
            vec![String, String, Char, Char, Semicolon, Eof]
        );
    }

    #[test]
    fn test_operators() {
        use TokenKind::*;
        assert_eq!(
            kinds("a &^= b <- c ... := &&"),
            vec![Ident, AndNotAssign, Ident, Arrow, Ident, Ellipsis, Define, LAnd, Eof]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let result = lex("x := \"abc\ny := 1\n");
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].message, "string literal not terminated");
        assert_eq!(result.errors[0].offset, 5);
    }

    #[test]
    fn test_unterminated_comment() {
        let result = lex("x /* never closed");
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].message, "comment not terminated");
    }

    #[test]
    fn test_invalid_character() {
        let result = lex("x @ y");
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].message, "invalid character U+0040 '@'");
    }

    #[test]
    fn test_invalid_octal_digit() {
        let result = lex("x = 09");
        assert_eq!(result.errors[0].message, "invalid digit '9' in octal literal");
    }

    #[test]
    fn test_unicode_identifier() {
        use TokenKind::*;
        assert_eq!(kinds("héllo"), vec![Ident, Semicolon, Eof]);
    }
}
