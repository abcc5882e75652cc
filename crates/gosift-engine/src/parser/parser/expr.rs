//! Expression parsing.

use super::recovery;
use super::stmt::parse_block;
use super::types::{parse_signature, parse_type, try_type};
use super::Parser;
use crate::parser::ast::{ChanDir, Expr, ExprKind, LitKind};
use crate::parser::token::TokenKind;

/// ExpressionList = Expression { "," Expression } .
pub fn parse_list(p: &mut Parser) -> Vec<Expr> {
    let mut list = vec![parse_expr(p)];
    while p.got(TokenKind::Comma) {
        list.push(parse_expr(p));
    }
    list
}

pub fn parse_rhs(p: &mut Parser) -> Expr {
    parse_expr(p)
}

pub fn parse_expr(p: &mut Parser) -> Expr {
    parse_binary_expr(p, None, 1)
}

/// Precedence climbing over binary operators of precedence `>= prec1`.
pub fn parse_binary_expr(p: &mut Parser, lhs: Option<Expr>, prec1: u8) -> Expr {
    let mut x = match lhs {
        Some(x) => x,
        None => parse_unary_expr(p),
    };
    loop {
        let op = p.tok();
        let prec = op.precedence();
        if prec < prec1 || prec == 0 {
            return x;
        }
        let op_pos = p.pos();
        p.next();
        let y = parse_binary_expr(p, None, prec + 1);
        let pos = x.pos;
        x = Expr::new(
            pos,
            ExprKind::Binary {
                op,
                op_pos,
                x: Box::new(x),
                y: Box::new(y),
            },
        );
    }
}

pub fn parse_unary_expr(p: &mut Parser) -> Expr {
    let Some(_guard) = p.nest() else {
        return Expr::bad(p.pos());
    };
    let pos = p.pos();
    match p.tok() {
        op @ (TokenKind::Add
        | TokenKind::Sub
        | TokenKind::Not
        | TokenKind::Xor
        | TokenKind::And
        | TokenKind::Tilde) => {
            p.next();
            let x = parse_unary_expr(p);
            Expr::new(pos, ExprKind::Unary { op, x: Box::new(x) })
        }
        TokenKind::Arrow => {
            p.next();
            let x = parse_unary_expr(p);
            // `<-chan T` is a channel type, not a receive.
            match x.kind {
                ExprKind::ChanType {
                    dir: ChanDir::Both,
                    elem,
                } => Expr::new(
                    pos,
                    ExprKind::ChanType {
                        dir: ChanDir::Recv,
                        elem,
                    },
                ),
                ExprKind::ChanType { dir, elem } => {
                    p.error_expected(x.pos, "'chan'");
                    Expr::new(x.pos, ExprKind::ChanType { dir, elem })
                }
                kind => Expr::new(
                    pos,
                    ExprKind::Unary {
                        op: TokenKind::Arrow,
                        x: Box::new(Expr::new(x.pos, kind)),
                    },
                ),
            }
        }
        TokenKind::Mul => {
            p.next();
            let x = parse_unary_expr(p);
            Expr::new(pos, ExprKind::Star(Box::new(x)))
        }
        _ => parse_primary_expr(p, None),
    }
}

/// Operand followed by selectors, indices, slices, type assertions, calls
/// and composite literal bodies.
pub fn parse_primary_expr(p: &mut Parser, operand: Option<Expr>) -> Expr {
    let mut x = match operand {
        Some(x) => x,
        None => parse_operand(p),
    };
    loop {
        match p.tok() {
            TokenKind::Period => {
                p.next();
                match p.tok() {
                    TokenKind::Ident => {
                        let sel = p.parse_ident();
                        let pos = x.pos;
                        x = Expr::new(
                            pos,
                            ExprKind::Selector {
                                x: Box::new(x),
                                sel,
                            },
                        );
                    }
                    TokenKind::LParen => {
                        p.next();
                        let ty = if p.got(TokenKind::Type) {
                            None
                        } else {
                            Some(Box::new(parse_type(p)))
                        };
                        p.expect(TokenKind::RParen);
                        let pos = x.pos;
                        x = Expr::new(pos, ExprKind::TypeAssert { x: Box::new(x), ty });
                    }
                    _ => {
                        let pos = p.pos();
                        p.error_expected(pos, "selector or type assertion");
                        if p.tok() != TokenKind::RBrace {
                            p.next();
                        }
                        let xpos = x.pos;
                        x = Expr::new(
                            xpos,
                            ExprKind::Selector {
                                x: Box::new(x),
                                sel: crate::parser::ast::Ident::new("_", pos),
                            },
                        );
                    }
                }
            }
            TokenKind::LBrack => x = parse_index_or_slice(p, x),
            TokenKind::LParen => x = parse_call(p, x),
            TokenKind::LBrace => {
                // A `{` after a type is a composite literal, unless we're in
                // a control clause and the type is just a name.
                let inner = x.unparen();
                let literal_type = match &inner.kind {
                    ExprKind::Bad
                    | ExprKind::Ident(_)
                    | ExprKind::Selector { .. }
                    | ExprKind::Index { .. } => p.expr_lev >= 0,
                    ExprKind::ArrayType { .. }
                    | ExprKind::SliceType(_)
                    | ExprKind::StructType(_)
                    | ExprKind::MapType { .. } => true,
                    _ => false,
                };
                if !literal_type {
                    return x;
                }
                if !std::ptr::eq(inner, &x) {
                    let inner_pos = inner.pos;
                    p.error(inner_pos, "cannot parenthesize type in composite literal");
                }
                x = parse_literal_value(p, Some(x));
            }
            _ => return x,
        }
    }
}

fn parse_operand(p: &mut Parser) -> Expr {
    let pos = p.pos();
    match p.tok() {
        TokenKind::Ident => Expr::ident(p.parse_ident()),
        kind @ (TokenKind::Int
        | TokenKind::Float
        | TokenKind::Imag
        | TokenKind::Char
        | TokenKind::String) => {
            let lit_kind = match kind {
                TokenKind::Int => LitKind::Int,
                TokenKind::Float => LitKind::Float,
                TokenKind::Imag => LitKind::Imag,
                TokenKind::Char => LitKind::Char,
                _ => LitKind::String,
            };
            let value = p.text().to_string();
            p.next();
            Expr::new(
                pos,
                ExprKind::BasicLit {
                    kind: lit_kind,
                    value,
                },
            )
        }
        TokenKind::LParen => {
            p.next();
            p.expr_lev += 1;
            let x = parse_expr(p);
            p.expr_lev -= 1;
            p.expect(TokenKind::RParen);
            Expr::new(pos, ExprKind::Paren(Box::new(x)))
        }
        TokenKind::Func => parse_func_type_or_lit(p),
        _ => {
            if let Some(ty) = try_type(p) {
                // Type for a composite literal or conversion.
                return ty;
            }
            p.error_expected(pos, "operand");
            recovery::advance_to_stmt_start(p);
            Expr::bad(pos)
        }
    }
}

fn parse_func_type_or_lit(p: &mut Parser) -> Expr {
    let pos = p.expect(TokenKind::Func);
    let ty = parse_signature(p, pos);
    if p.tok() != TokenKind::LBrace {
        return Expr::new(pos, ExprKind::FuncType(ty));
    }
    let outer = p.expr_lev;
    p.expr_lev = 0;
    let body = parse_block(p);
    p.expr_lev = outer;
    Expr::new(pos, ExprKind::FuncLit { ty, body })
}

fn parse_index_or_slice(p: &mut Parser, x: Expr) -> Expr {
    let lbrack = p.expect(TokenKind::LBrack);
    if p.tok() == TokenKind::RBrack {
        let pos = p.pos();
        p.error_expected(pos, "operand");
        p.next();
        let xpos = x.pos;
        return Expr::new(
            xpos,
            ExprKind::Index {
                x: Box::new(x),
                indices: vec![Expr::bad(pos)],
            },
        );
    }

    p.expr_lev += 1;
    let mut index: [Option<Expr>; 3] = [None, None, None];
    let mut colons = [lbrack; 2];
    let mut ncolons = 0;
    let mut list = Vec::new();

    if p.tok() != TokenKind::Colon {
        index[0] = Some(parse_rhs(p));
    }
    match p.tok() {
        TokenKind::Colon => {
            while p.tok() == TokenKind::Colon && ncolons < 2 {
                colons[ncolons] = p.pos();
                ncolons += 1;
                p.next();
                if !matches!(
                    p.tok(),
                    TokenKind::Colon | TokenKind::RBrack | TokenKind::Eof
                ) {
                    index[ncolons] = Some(parse_rhs(p));
                }
            }
        }
        TokenKind::Comma => {
            // Instance with several type arguments.
            list.extend(index[0].take());
            while p.got(TokenKind::Comma) {
                if matches!(p.tok(), TokenKind::RBrack | TokenKind::Eof) {
                    break;
                }
                list.push(parse_type(p));
            }
        }
        _ => {}
    }
    p.expr_lev -= 1;
    p.expect(TokenKind::RBrack);

    let pos = x.pos;
    if ncolons > 0 {
        let [low, high, max] = index;
        let three = ncolons == 2;
        if three {
            if high.is_none() {
                p.error(colons[0], "middle index required in 3-index slice");
            }
            if max.is_none() {
                p.error(colons[1], "final index required in 3-index slice");
            }
        }
        return Expr::new(
            pos,
            ExprKind::Slice {
                x: Box::new(x),
                low: low.map(Box::new),
                high: high.map(Box::new),
                max: max.map(Box::new),
                three,
            },
        );
    }

    if list.is_empty() {
        list.extend(index[0].take());
    }
    Expr::new(
        pos,
        ExprKind::Index {
            x: Box::new(x),
            indices: list,
        },
    )
}

fn parse_call(p: &mut Parser, func: Expr) -> Expr {
    p.expect(TokenKind::LParen);
    p.expr_lev += 1;
    let mut args = Vec::new();
    let mut ellipsis = false;
    while p.tok() != TokenKind::RParen && !p.at_eof() && !ellipsis {
        let start = p.index();
        args.push(parse_expr(p));
        if p.got(TokenKind::Ellipsis) {
            ellipsis = true;
        }
        if !p.at_comma("argument list", TokenKind::RParen) {
            break;
        }
        p.next();
        p.ensure_progress(start);
    }
    p.expr_lev -= 1;
    p.expect_closing(TokenKind::RParen, "argument list");
    let pos = func.pos;
    Expr::new(
        pos,
        ExprKind::Call {
            func: Box::new(func),
            args,
            ellipsis,
        },
    )
}

/// LiteralValue = "{" [ ElementList [ "," ] ] "}" , for type `ty` (absent
/// for elided element types).
fn parse_literal_value(p: &mut Parser, ty: Option<Expr>) -> Expr {
    let lbrace = p.expect(TokenKind::LBrace);
    p.expr_lev += 1;
    let mut elts = Vec::new();
    while p.tok() != TokenKind::RBrace && !p.at_eof() {
        let start = p.index();
        elts.push(parse_element(p));
        if !p.at_comma("composite literal", TokenKind::RBrace) {
            break;
        }
        p.next();
        p.ensure_progress(start);
    }
    p.expr_lev -= 1;
    p.expect_closing(TokenKind::RBrace, "composite literal");
    let pos = ty.as_ref().map_or(lbrace, |t| t.pos);
    Expr::new(
        pos,
        ExprKind::CompositeLit {
            ty: ty.map(Box::new),
            elts,
        },
    )
}

fn parse_element(p: &mut Parser) -> Expr {
    let x = parse_value(p);
    if p.got(TokenKind::Colon) {
        let value = parse_value(p);
        let pos = x.pos;
        return Expr::new(
            pos,
            ExprKind::KeyValue {
                key: Box::new(x),
                value: Box::new(value),
            },
        );
    }
    x
}

fn parse_value(p: &mut Parser) -> Expr {
    if p.tok() == TokenKind::LBrace {
        parse_literal_value(p, None)
    } else {
        parse_expr(p)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::parser::fileset::FileSet;
    use crate::parser::parser::ParseOptions;

    fn expr(src: &str) -> (Expr, usize) {
        let fset = FileSet::new();
        let file = fset.add_file("e.go", Arc::from(src));
        let mut p = Parser::new(&file, ParseOptions::default());
        let e = parse_expr(&mut p);
        (e, p.errors.len())
    }

    #[test]
    fn test_precedence() {
        let (e, errors) = expr("a + b * c == d && e || f");
        assert_eq!(errors, 0);
        let ExprKind::Binary { op, .. } = e.kind else { panic!() };
        assert_eq!(op, TokenKind::LOr);
    }

    #[test]
    fn test_round_trip_display() {
        for src in [
            "f(a, b...)",
            "x.y[1:2:3]",
            "m[k]",
            "v.(T)",
            "<-ch",
            "*p",
            "-x + y",
            "[]int{…}",
            "map[string]T{…}",
            "G[int, string]",
        ] {
            let (e, _) = expr(&src.replace('…', "1"));
            assert_eq!(e.to_string(), src, "{src}");
        }
    }

    #[test]
    fn test_recv_chan_type() {
        let (e, _) = expr("<-chan int");
        assert!(matches!(e.kind, ExprKind::ChanType { dir: ChanDir::Recv, .. }));
    }

    #[test]
    fn test_slice_requires_indices() {
        let (_, errors) = expr("s[1::]");
        assert_eq!(errors, 1);
    }

    #[test]
    fn test_func_literal() {
        let (e, errors) = expr("func(x int) int { return x }");
        assert_eq!(errors, 0);
        assert_eq!(e.to_string(), "(func(x int) int literal)");
    }

    #[test]
    fn test_missing_operand() {
        let (e, errors) = expr(")");
        assert!(matches!(e.kind, ExprKind::Bad));
        assert_eq!(errors, 1);
    }
}
