//! Go front end: tokens, lexer, AST, parser and the shared position table.

pub mod ast;
pub mod error;
pub mod fileset;
pub mod lexer;
pub mod literal;
#[allow(clippy::module_inception)]
pub mod parser;
pub mod token;

pub use ast::File;
pub use error::{ParseError, SyntaxError};
pub use fileset::{FileSet, Pos, Position, SourceFile};
pub use parser::{parse_file, ParseOptions, Parser, MAX_SYNTAX_ERRORS};
pub use token::{Token, TokenKind};
