//! Type syntax: type names, composite type literals, signatures, parameter
//! lists and type parameter lists.

use super::recovery;
use super::Parser;
use crate::parser::ast::{ChanDir, Expr, ExprKind, Field, FuncType, Ident, InterfaceElem};
use crate::parser::fileset::Pos;
use crate::parser::literal::unquote_string;
use crate::parser::token::TokenKind;

/// Parse a type, reporting "expected type" if there is none.
pub fn parse_type(p: &mut Parser) -> Expr {
    match try_type(p) {
        Some(ty) => ty,
        None => {
            let pos = p.pos();
            p.error_expected(pos, "type");
            recovery::advance_to_expr_end(p);
            Expr::bad(pos)
        }
    }
}

/// Parse a type if the current token can start one.
pub fn try_type(p: &mut Parser) -> Option<Expr> {
    let _guard = p.nest()?;
    let pos = p.pos();
    let ty = match p.tok() {
        TokenKind::Ident => {
            let name = parse_type_name(p);
            if p.tok() == TokenKind::LBrack {
                parse_type_args(p, name)
            } else {
                name
            }
        }
        TokenKind::LBrack => {
            p.next();
            parse_array_type_after_lbrack(p, pos)
        }
        TokenKind::Struct => parse_struct_type(p),
        TokenKind::Mul => {
            p.next();
            let elem = parse_type(p);
            Expr::new(pos, ExprKind::Star(Box::new(elem)))
        }
        TokenKind::Func => {
            p.next();
            let sig = parse_signature(p, pos);
            Expr::new(pos, ExprKind::FuncType(sig))
        }
        TokenKind::Interface => parse_interface_type(p),
        TokenKind::Map => parse_map_type(p),
        TokenKind::Chan | TokenKind::Arrow => parse_chan_type(p),
        TokenKind::LParen => {
            p.next();
            let inner = parse_type(p);
            p.expect(TokenKind::RParen);
            Expr::new(pos, ExprKind::Paren(Box::new(inner)))
        }
        _ => return None,
    };
    Some(ty)
}

/// TypeName = identifier | PackageName "." identifier .
pub fn parse_type_name(p: &mut Parser) -> Expr {
    let ident = p.parse_ident();
    if p.tok() == TokenKind::Period {
        p.next();
        let sel = p.parse_ident();
        let pos = ident.pos;
        Expr::new(
            pos,
            ExprKind::Selector {
                x: Box::new(Expr::ident(ident)),
                sel,
            },
        )
    } else {
        Expr::ident(ident)
    }
}

/// TypeArgs = "[" TypeList [ "," ] "]" , applied to `x`.
pub fn parse_type_args(p: &mut Parser, x: Expr) -> Expr {
    let lbrack = p.expect(TokenKind::LBrack);
    p.expr_lev += 1;
    let mut args = Vec::new();
    while p.tok() != TokenKind::RBrack && !p.at_eof() {
        let start = p.index();
        args.push(parse_type(p));
        if !p.at_comma("type argument list", TokenKind::RBrack) {
            break;
        }
        p.next();
        p.ensure_progress(start);
    }
    p.expr_lev -= 1;
    if args.is_empty() {
        p.error_expected(lbrack, "type argument list");
    }
    p.expect_closing(TokenKind::RBrack, "type argument list");
    let pos = x.pos;
    Expr::new(
        pos,
        ExprKind::Index {
            x: Box::new(x),
            indices: args,
        },
    )
}

/// Array or slice type after its `[`: `]T`, `...]T` or `N]T`.
pub fn parse_array_type_after_lbrack(p: &mut Parser, lbrack: Pos) -> Expr {
    if p.got(TokenKind::RBrack) {
        let elem = parse_type(p);
        return Expr::new(lbrack, ExprKind::SliceType(Box::new(elem)));
    }
    let len = if p.tok() == TokenKind::Ellipsis {
        p.next();
        None
    } else {
        p.expr_lev += 1;
        let len = super::expr::parse_rhs(p);
        p.expr_lev -= 1;
        Some(Box::new(len))
    };
    p.expect(TokenKind::RBrack);
    let elem = parse_type(p);
    Expr::new(
        lbrack,
        ExprKind::ArrayType {
            len,
            elem: Box::new(elem),
        },
    )
}

fn parse_map_type(p: &mut Parser) -> Expr {
    let pos = p.expect(TokenKind::Map);
    p.expect(TokenKind::LBrack);
    let key = parse_type(p);
    p.expect(TokenKind::RBrack);
    let value = parse_type(p);
    Expr::new(
        pos,
        ExprKind::MapType {
            key: Box::new(key),
            value: Box::new(value),
        },
    )
}

fn parse_chan_type(p: &mut Parser) -> Expr {
    let pos = p.pos();
    let dir = if p.got(TokenKind::Chan) {
        if p.got(TokenKind::Arrow) {
            ChanDir::Send
        } else {
            ChanDir::Both
        }
    } else {
        p.expect(TokenKind::Arrow);
        p.expect(TokenKind::Chan);
        ChanDir::Recv
    };
    let elem = parse_type(p);
    Expr::new(
        pos,
        ExprKind::ChanType {
            dir,
            elem: Box::new(elem),
        },
    )
}

// ============================================================================
// Struct and interface types
// ============================================================================

fn parse_struct_type(p: &mut Parser) -> Expr {
    let pos = p.expect(TokenKind::Struct);
    p.expect(TokenKind::LBrace);
    let mut fields = Vec::new();
    while matches!(
        p.tok(),
        TokenKind::Ident | TokenKind::Mul | TokenKind::LParen
    ) {
        let start = p.index();
        fields.push(parse_field_decl(p));
        p.ensure_progress(start);
    }
    p.expect(TokenKind::RBrace);
    Expr::new(pos, ExprKind::StructType(fields))
}

fn parse_field_decl(p: &mut Parser) -> Field {
    let pos = p.pos();
    let (names, ty) = match p.tok() {
        TokenKind::Ident => {
            let name = p.parse_ident();
            let embedded = matches!(
                p.tok(),
                TokenKind::Period | TokenKind::String | TokenKind::Semicolon | TokenKind::RBrace
            ) || p.bracket_followed_by(&[
                TokenKind::Semicolon,
                TokenKind::RBrace,
                TokenKind::String,
            ]);
            if embedded {
                (Vec::new(), finish_embedded_name(p, name))
            } else {
                let mut names = vec![name];
                while p.got(TokenKind::Comma) {
                    names.push(p.parse_ident());
                }
                (names, parse_type(p))
            }
        }
        TokenKind::Mul => {
            p.next();
            if p.tok() == TokenKind::LParen {
                let lparen = p.pos();
                p.error(lparen, "cannot parenthesize embedded type");
                p.next();
                let inner = parse_embedded_name(p);
                p.expect(TokenKind::RParen);
                (Vec::new(), Expr::new(pos, ExprKind::Star(Box::new(inner))))
            } else {
                let inner = parse_embedded_name(p);
                (Vec::new(), Expr::new(pos, ExprKind::Star(Box::new(inner))))
            }
        }
        _ => {
            p.error(pos, "cannot parenthesize embedded type");
            p.next();
            let inner = parse_type(p);
            p.expect(TokenKind::RParen);
            (Vec::new(), inner)
        }
    };

    let tag = if p.tok() == TokenKind::String {
        let tag = unquote_string(p.text());
        p.next();
        tag
    } else {
        None
    };
    p.expect_semi();

    Field {
        pos,
        names,
        ty,
        tag,
    }
}

fn parse_embedded_name(p: &mut Parser) -> Expr {
    let name = p.parse_ident();
    finish_embedded_name(p, name)
}

/// Qualify and instantiate an embedded type name whose first identifier has
/// been consumed.
fn finish_embedded_name(p: &mut Parser, name: Ident) -> Expr {
    let pos = name.pos;
    let mut ty = Expr::ident(name);
    if p.got(TokenKind::Period) {
        let sel = p.parse_ident();
        ty = Expr::new(
            pos,
            ExprKind::Selector {
                x: Box::new(ty),
                sel,
            },
        );
    }
    if p.tok() == TokenKind::LBrack {
        ty = parse_type_args(p, ty);
    }
    ty
}

fn parse_interface_type(p: &mut Parser) -> Expr {
    let pos = p.expect(TokenKind::Interface);
    p.expect(TokenKind::LBrace);
    let mut elems = Vec::new();
    loop {
        let start = p.index();
        let elem = match p.tok() {
            TokenKind::Ident => {
                let name = p.parse_ident();
                if p.tok() == TokenKind::LParen {
                    let sig_pos = p.pos();
                    let ty = parse_signature(p, sig_pos);
                    InterfaceElem::Method { name, ty }
                } else {
                    let first = finish_embedded_name(p, name);
                    InterfaceElem::Embed(continue_union(p, first))
                }
            }
            TokenKind::Tilde => InterfaceElem::Embed(parse_constraint(p)),
            _ => match try_type(p) {
                Some(first) => InterfaceElem::Embed(continue_union(p, first)),
                None => break,
            },
        };
        elems.push(elem);
        p.expect_semi();
        p.ensure_progress(start);
    }
    p.expect(TokenKind::RBrace);
    Expr::new(pos, ExprKind::InterfaceType(elems))
}

/// Constraint = Term { "|" Term } .
pub fn parse_constraint(p: &mut Parser) -> Expr {
    let first = parse_type_term(p);
    continue_union(p, first)
}

fn continue_union(p: &mut Parser, first: Expr) -> Expr {
    let mut x = first;
    while p.tok() == TokenKind::Or {
        let op_pos = p.pos();
        p.next();
        let y = parse_type_term(p);
        let pos = x.pos;
        x = Expr::new(
            pos,
            ExprKind::Binary {
                op: TokenKind::Or,
                op_pos,
                x: Box::new(x),
                y: Box::new(y),
            },
        );
    }
    x
}

fn parse_type_term(p: &mut Parser) -> Expr {
    if p.tok() == TokenKind::Tilde {
        let pos = p.pos();
        p.next();
        let ty = parse_type(p);
        Expr::new(
            pos,
            ExprKind::Unary {
                op: TokenKind::Tilde,
                x: Box::new(ty),
            },
        )
    } else {
        parse_type(p)
    }
}

// ============================================================================
// Signatures and parameter lists
// ============================================================================

/// Signature = Parameters [ Result ] .
pub fn parse_signature(p: &mut Parser, pos: Pos) -> FuncType {
    let params = parse_parameters(p);
    let results = parse_result(p);
    FuncType {
        pos,
        params,
        results,
    }
}

/// Result = Parameters | Type .
pub fn parse_result(p: &mut Parser) -> Vec<Field> {
    if p.tok() == TokenKind::LParen {
        return parse_parameters(p);
    }
    match try_type(p) {
        Some(ty) => vec![Field {
            pos: ty.pos,
            names: Vec::new(),
            ty,
            tag: None,
        }],
        None => Vec::new(),
    }
}

/// Parameters = "(" [ ParameterList [ "," ] ] ")" .
pub fn parse_parameters(p: &mut Parser) -> Vec<Field> {
    p.expect(TokenKind::LParen);
    let fields = if p.tok() != TokenKind::RParen {
        parse_parameter_list(p)
    } else {
        Vec::new()
    };
    p.expect_closing(TokenKind::RParen, "parameter list");
    fields
}

fn parse_parameter_list(p: &mut Parser) -> Vec<Field> {
    // A list of identifiers looks like a list of type names until a type
    // follows it.
    let mut list = Vec::new();
    loop {
        list.push(parse_param_type(p));
        if p.tok() != TokenKind::Comma {
            break;
        }
        p.next();
        if p.tok() == TokenKind::RParen {
            break;
        }
    }

    let Some(ty) = try_param_type(p) else {
        // Type { "," Type } (anonymous parameters)
        return list
            .into_iter()
            .map(|ty| Field {
                pos: ty.pos,
                names: Vec::new(),
                ty,
                tag: None,
            })
            .collect();
    };

    // IdentifierList Type { "," IdentifierList Type }
    let names = make_ident_list(p, list);
    let mut fields = vec![Field {
        pos: names[0].pos,
        names,
        ty,
        tag: None,
    }];
    if !p.at_comma("parameter list", TokenKind::RParen) {
        return fields;
    }
    p.next();
    while p.tok() != TokenKind::RParen && !p.at_eof() {
        let start = p.index();
        let pos = p.pos();
        let names = p.parse_ident_list();
        if matches!(p.tok(), TokenKind::Comma | TokenKind::RParen) {
            p.error(pos, "mixed named and unnamed parameters");
            fields.push(Field {
                pos,
                names,
                ty: Expr::bad(pos),
                tag: None,
            });
        } else {
            let ty = parse_param_type(p);
            fields.push(Field {
                pos,
                names,
                ty,
                tag: None,
            });
        }
        if !p.at_comma("parameter list", TokenKind::RParen) {
            break;
        }
        p.next();
        p.ensure_progress(start);
    }
    fields
}

fn parse_param_type(p: &mut Parser) -> Expr {
    match try_param_type(p) {
        Some(ty) => ty,
        None => {
            let pos = p.pos();
            p.error_expected(pos, "type");
            p.next();
            Expr::bad(pos)
        }
    }
}

/// A parameter type, `...T`, or a bare name that may turn out to be a
/// parameter name. `name [N]T` keeps the brackets for the type.
fn try_param_type(p: &mut Parser) -> Option<Expr> {
    match p.tok() {
        TokenKind::Ellipsis => {
            let pos = p.pos();
            p.next();
            let elem = match try_type(p) {
                Some(ty) => ty,
                None => {
                    p.error(pos, "'...' parameter is missing type");
                    Expr::bad(pos)
                }
            };
            Some(Expr::new(pos, ExprKind::Ellipsis(Some(Box::new(elem)))))
        }
        TokenKind::Ident => {
            let name = parse_type_name(p);
            let instantiated = p.bracket_followed_by(&[
                TokenKind::Comma,
                TokenKind::RParen,
                TokenKind::Ellipsis,
            ]);
            if instantiated {
                Some(parse_type_args(p, name))
            } else {
                Some(name)
            }
        }
        _ => try_type(p),
    }
}

fn make_ident_list(p: &mut Parser, list: Vec<Expr>) -> Vec<Ident> {
    list.into_iter()
        .map(|expr| match expr.kind {
            ExprKind::Ident(name) => Ident::new(name, expr.pos),
            _ => {
                p.error_expected(expr.pos, "identifier");
                Ident::new("_", expr.pos)
            }
        })
        .collect()
}

/// TypeParameters after the opening `[`, through the closing `]`.
pub fn parse_type_params(p: &mut Parser) -> Vec<Field> {
    let mut fields = Vec::new();
    while p.tok() != TokenKind::RBrack && !p.at_eof() {
        let start = p.index();
        let pos = p.pos();
        let names = p.parse_ident_list();
        let constraint = if matches!(p.tok(), TokenKind::Comma | TokenKind::RBrack) {
            p.error(pos, "missing type constraint");
            Expr::bad(pos)
        } else {
            parse_constraint(p)
        };
        fields.push(Field {
            pos,
            names,
            ty: constraint,
            tag: None,
        });
        if !p.at_comma("type parameter list", TokenKind::RBrack) {
            break;
        }
        p.next();
        p.ensure_progress(start);
    }
    let rbrack = p.expect(TokenKind::RBrack);
    if fields.is_empty() {
        p.error(rbrack, "empty type parameter list");
    }
    fields
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::parser::fileset::FileSet;
    use crate::parser::parser::ParseOptions;

    fn with_parser<T>(src: &str, f: impl FnOnce(&mut Parser) -> T) -> (T, usize) {
        let fset = FileSet::new();
        let file = fset.add_file("t.go", Arc::from(src));
        let mut p = Parser::new(&file, ParseOptions::default());
        let out = f(&mut p);
        (out, p.errors.len())
    }

    #[test]
    fn test_named_and_anonymous_parameters() {
        let (fields, errors) = with_parser("(a, b int, c ...string)", parse_parameters);
        assert_eq!(errors, 0);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].names.len(), 2);
        assert!(matches!(fields[1].ty.kind, ExprKind::Ellipsis(_)));

        let (fields, errors) = with_parser("(int, *T, []byte)", parse_parameters);
        assert_eq!(errors, 0);
        assert_eq!(fields.len(), 3);
        assert!(fields.iter().all(|f| f.names.is_empty()));
    }

    #[test]
    fn test_array_param_vs_instantiation() {
        let (fields, _) = with_parser("(a [4]int)", parse_parameters);
        assert_eq!(fields[0].names[0].name, "a");
        assert!(matches!(fields[0].ty.kind, ExprKind::ArrayType { .. }));

        let (fields, _) = with_parser("(List[int])", parse_parameters);
        assert!(fields[0].names.is_empty());
        assert!(matches!(fields[0].ty.kind, ExprKind::Index { .. }));
    }

    #[test]
    fn test_mixed_parameters() {
        let (_, errors) = with_parser("(a int, string)", parse_parameters);
        assert_eq!(errors, 1);
    }

    #[test]
    fn test_chan_directions() {
        let (ty, _) = with_parser("<-chan int", parse_type);
        assert!(matches!(ty.kind, ExprKind::ChanType { dir: ChanDir::Recv, .. }));
        let (ty, _) = with_parser("chan<- int", parse_type);
        assert!(matches!(ty.kind, ExprKind::ChanType { dir: ChanDir::Send, .. }));
    }

    #[test]
    fn test_interface_with_type_set() {
        let (ty, errors) = with_parser("interface{ ~int | ~string; String() string }", parse_type);
        assert_eq!(errors, 0);
        let ExprKind::InterfaceType(elems) = ty.kind else { panic!() };
        assert_eq!(elems.len(), 2);
        assert!(matches!(elems[1], InterfaceElem::Method { .. }));
    }

    #[test]
    fn test_missing_type() {
        let (ty, errors) = with_parser(")", parse_type);
        assert!(matches!(ty.kind, ExprKind::Bad));
        assert_eq!(errors, 1);
    }
}
