//! Error recovery for the parser.
//!
//! After an error the parser skips tokens until it reaches one from a
//! synchronization set, then resumes. Repeated syncs at the same spot are
//! capped so recovery can never spin without consuming input.

use super::Parser;
use crate::parser::token::TokenKind;

/// Tokens that start a statement.
const STMT_START: &[TokenKind] = &[
    TokenKind::Break,
    TokenKind::Const,
    TokenKind::Continue,
    TokenKind::Defer,
    TokenKind::Fallthrough,
    TokenKind::For,
    TokenKind::Go,
    TokenKind::Goto,
    TokenKind::If,
    TokenKind::Return,
    TokenKind::Select,
    TokenKind::Switch,
    TokenKind::Type,
    TokenKind::Var,
];

/// Tokens that start a top-level declaration.
const DECL_START: &[TokenKind] = &[
    TokenKind::Import,
    TokenKind::Const,
    TokenKind::Type,
    TokenKind::Var,
    TokenKind::Func,
];

/// Tokens that end an expression.
const EXPR_END: &[TokenKind] = &[
    TokenKind::Comma,
    TokenKind::Colon,
    TokenKind::Semicolon,
    TokenKind::RParen,
    TokenKind::RBrack,
    TokenKind::RBrace,
];

/// Most syncs allowed at one token before recovery forces progress.
const MAX_SYNCS_WITHOUT_PROGRESS: usize = 10;

pub fn advance_to_stmt_start(parser: &mut Parser) {
    advance(parser, STMT_START);
}

pub fn advance_to_decl_start(parser: &mut Parser) {
    advance(parser, DECL_START);
}

pub fn advance_to_expr_end(parser: &mut Parser) {
    advance(parser, EXPR_END);
}

/// Skip to the next token in `to`.
///
/// Returns at a sync token only if the parser moved since the last sync, or
/// has synced there fewer than [`MAX_SYNCS_WITHOUT_PROGRESS`] times;
/// otherwise consumes at least one more token.
fn advance(parser: &mut Parser, to: &[TokenKind]) {
    while !parser.at_eof() {
        if to.contains(&parser.tok()) {
            let here = parser.index();
            if here == parser.sync_index && parser.sync_count < MAX_SYNCS_WITHOUT_PROGRESS {
                parser.sync_count += 1;
                return;
            }
            if here > parser.sync_index {
                parser.sync_index = here;
                parser.sync_count = 0;
                return;
            }
        }
        parser.next();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::parser::fileset::FileSet;
    use crate::parser::parser::ParseOptions;

    #[test]
    fn test_advance_stops_at_statement_keyword() {
        let fset = FileSet::new();
        let file = fset.add_file("t.go", Arc::from("a b c return x"));
        let mut parser = Parser::new(&file, ParseOptions::default());
        advance_to_stmt_start(&mut parser);
        assert_eq!(parser.tok(), TokenKind::Return);
    }

    #[test]
    fn test_repeated_sync_forces_progress() {
        let fset = FileSet::new();
        let file = fset.add_file("t.go", Arc::from("return return"));
        let mut parser = Parser::new(&file, ParseOptions::default());
        for _ in 0..=MAX_SYNCS_WITHOUT_PROGRESS + 1 {
            advance_to_stmt_start(&mut parser);
        }
        assert!(parser.index() > 0);
    }
}
