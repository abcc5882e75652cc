//! Statement parsing.

use super::decl::parse_gen_decl;
use super::expr::{parse_expr, parse_list, parse_rhs};
use super::recovery;
use super::types::parse_type;
use super::Parser;
use crate::parser::ast::{Block, CaseClause, CommClause, Expr, ExprKind, Ident, Stmt, StmtKind};
use crate::parser::fileset::Pos;
use crate::parser::token::TokenKind;

#[derive(Clone, Copy, PartialEq, Eq)]
enum SimpleMode {
    Basic,
    LabelOk,
    RangeOk,
}

/// A simple statement, or the header of a range clause.
enum Simple {
    Stmt(Stmt),
    Range {
        pos: Pos,
        lhs: Vec<Expr>,
        define: bool,
        x: Expr,
    },
}

impl Simple {
    fn into_stmt(self) -> Stmt {
        match self {
            Simple::Stmt(stmt) => stmt,
            Simple::Range { pos, .. } => Stmt::new(pos, StmtKind::Bad),
        }
    }
}

/// Block = "{" StatementList "}" .
pub fn parse_block(p: &mut Parser) -> Block {
    let lbrace = p.expect(TokenKind::LBrace);
    let stmts = parse_stmt_list(p);
    let rbrace = p.expect(TokenKind::RBrace);
    Block {
        lbrace,
        stmts,
        rbrace,
    }
}

fn parse_stmt_list(p: &mut Parser) -> Vec<Stmt> {
    let mut list = Vec::new();
    while !matches!(
        p.tok(),
        TokenKind::Case | TokenKind::Default | TokenKind::RBrace | TokenKind::Eof
    ) {
        let start = p.index();
        list.push(parse_stmt(p));
        p.ensure_progress(start);
    }
    list
}

pub fn parse_stmt(p: &mut Parser) -> Stmt {
    p.check_cancel();
    let Some(_guard) = p.nest() else {
        return Stmt::new(p.pos(), StmtKind::Bad);
    };
    let pos = p.pos();
    match p.tok() {
        keyword @ (TokenKind::Const | TokenKind::Type | TokenKind::Var) => {
            Stmt::new(pos, StmtKind::Decl(parse_gen_decl(p, keyword)))
        }
        TokenKind::Ident
        | TokenKind::Int
        | TokenKind::Float
        | TokenKind::Imag
        | TokenKind::Char
        | TokenKind::String
        | TokenKind::Func
        | TokenKind::LParen
        | TokenKind::LBrack
        | TokenKind::Struct
        | TokenKind::Map
        | TokenKind::Chan
        | TokenKind::Interface
        | TokenKind::Add
        | TokenKind::Sub
        | TokenKind::Mul
        | TokenKind::And
        | TokenKind::Xor
        | TokenKind::Arrow
        | TokenKind::Not
        | TokenKind::Tilde => {
            let stmt = parse_simple_stmt(p, SimpleMode::LabelOk).into_stmt();
            if !matches!(stmt.kind, StmtKind::Labeled { .. }) {
                p.expect_semi();
            }
            stmt
        }
        kind @ (TokenKind::Go | TokenKind::Defer) => parse_go_defer(p, kind),
        TokenKind::Return => {
            p.next();
            let results = if !matches!(p.tok(), TokenKind::Semicolon | TokenKind::RBrace) {
                parse_list(p)
            } else {
                Vec::new()
            };
            p.expect_semi();
            Stmt::new(pos, StmtKind::Return(results))
        }
        tok @ (TokenKind::Break
        | TokenKind::Continue
        | TokenKind::Goto
        | TokenKind::Fallthrough) => {
            p.next();
            let label = if tok != TokenKind::Fallthrough && p.tok() == TokenKind::Ident {
                Some(p.parse_ident())
            } else {
                None
            };
            p.expect_semi();
            Stmt::new(pos, StmtKind::Branch { tok, label })
        }
        TokenKind::LBrace => {
            let block = parse_block(p);
            p.expect_semi();
            Stmt::new(pos, StmtKind::Block(block))
        }
        TokenKind::If => parse_if_stmt(p),
        TokenKind::Switch => parse_switch_stmt(p),
        TokenKind::Select => parse_select_stmt(p),
        TokenKind::For => parse_for_stmt(p),
        TokenKind::Semicolon => {
            p.next();
            Stmt::new(pos, StmtKind::Empty)
        }
        // A '}' ends the list without being consumed.
        TokenKind::RBrace => Stmt::new(pos, StmtKind::Empty),
        _ => {
            p.error_expected(pos, "statement");
            recovery::advance_to_stmt_start(p);
            Stmt::new(pos, StmtKind::Bad)
        }
    }
}

fn parse_simple_stmt(p: &mut Parser, mode: SimpleMode) -> Simple {
    let pos = p.pos();
    let lhs = parse_list(p);

    match p.tok() {
        op @ (TokenKind::Define
        | TokenKind::Assign
        | TokenKind::AddAssign
        | TokenKind::SubAssign
        | TokenKind::MulAssign
        | TokenKind::QuoAssign
        | TokenKind::RemAssign
        | TokenKind::AndAssign
        | TokenKind::OrAssign
        | TokenKind::XorAssign
        | TokenKind::ShlAssign
        | TokenKind::ShrAssign
        | TokenKind::AndNotAssign) => {
            let op_pos = p.pos();
            p.next();
            if mode == SimpleMode::RangeOk
                && p.tok() == TokenKind::Range
                && matches!(op, TokenKind::Define | TokenKind::Assign)
            {
                p.next();
                let x = parse_rhs(p);
                return Simple::Range {
                    pos,
                    lhs,
                    define: op == TokenKind::Define,
                    x,
                };
            }
            let rhs = parse_list(p);
            return Simple::Stmt(Stmt::new(
                pos,
                StmtKind::Assign {
                    lhs,
                    op,
                    op_pos,
                    rhs,
                },
            ));
        }
        _ => {}
    }

    if lhs.len() > 1 {
        p.error_expected(lhs[0].pos, "1 expression");
    }
    let Some(x) = lhs.into_iter().next() else {
        return Simple::Stmt(Stmt::new(pos, StmtKind::Bad));
    };

    match p.tok() {
        TokenKind::Colon => {
            let colon = p.pos();
            p.next();
            if let (SimpleMode::LabelOk, ExprKind::Ident(name)) = (mode, &x.kind) {
                let label = Ident::new(name.clone(), x.pos);
                let stmt = parse_stmt(p);
                return Simple::Stmt(Stmt::new(
                    pos,
                    StmtKind::Labeled {
                        label,
                        stmt: Box::new(stmt),
                    },
                ));
            }
            p.error(colon, "illegal label declaration");
            Simple::Stmt(Stmt::new(pos, StmtKind::Bad))
        }
        TokenKind::Arrow => {
            p.next();
            let value = parse_rhs(p);
            Simple::Stmt(Stmt::new(pos, StmtKind::Send { chan: x, value }))
        }
        kind @ (TokenKind::Inc | TokenKind::Dec) => {
            p.next();
            Simple::Stmt(Stmt::new(
                pos,
                StmtKind::IncDec {
                    x,
                    inc: kind == TokenKind::Inc,
                },
            ))
        }
        _ => Simple::Stmt(Stmt::new(pos, StmtKind::Expr(x))),
    }
}

fn parse_go_defer(p: &mut Parser, keyword: TokenKind) -> Stmt {
    let pos = p.expect(keyword);
    let x = parse_rhs(p);
    p.expect_semi();

    let what = keyword.as_str();
    let call = if let ExprKind::Paren(_) = x.kind {
        p.error(x.pos, format!("expression in {what} must not be parenthesized"));
        x.unparen().clone()
    } else {
        x
    };
    if !matches!(call.kind, ExprKind::Call { .. }) {
        if !matches!(call.kind, ExprKind::Bad) {
            p.error(call.pos, format!("expression in {what} must be function call"));
        }
        return Stmt::new(pos, StmtKind::Bad);
    }
    let kind = if keyword == TokenKind::Go {
        StmtKind::Go(call)
    } else {
        StmtKind::Defer(call)
    };
    Stmt::new(pos, kind)
}

/// Turn a simple statement that should be an expression into one.
fn make_expr(p: &mut Parser, stmt: Option<Stmt>, want: &str) -> Option<Expr> {
    let stmt = stmt?;
    match stmt.kind {
        StmtKind::Expr(x) => Some(x),
        kind => {
            let found = if matches!(kind, StmtKind::Assign { .. }) {
                "assignment"
            } else {
                "simple statement"
            };
            p.error(
                stmt.pos,
                format!(
                    "expected {want}, found {found} (missing parentheses around composite literal?)"
                ),
            );
            Some(Expr::bad(stmt.pos))
        }
    }
}

fn parse_if_stmt(p: &mut Parser) -> Stmt {
    let pos = p.expect(TokenKind::If);
    let (init, cond) = parse_if_header(p);
    let then = parse_block(p);

    let els = if p.got(TokenKind::Else) {
        match p.tok() {
            TokenKind::If => Some(Box::new(parse_if_stmt(p))),
            TokenKind::LBrace => {
                let else_pos = p.pos();
                let block = parse_block(p);
                p.expect_semi();
                Some(Box::new(Stmt::new(else_pos, StmtKind::Block(block))))
            }
            _ => {
                let else_pos = p.pos();
                p.error_expected(else_pos, "if statement or block");
                Some(Box::new(Stmt::new(else_pos, StmtKind::Bad)))
            }
        }
    } else {
        p.expect_semi();
        None
    };

    Stmt::new(
        pos,
        StmtKind::If {
            init,
            cond,
            then,
            els,
        },
    )
}

fn parse_if_header(p: &mut Parser) -> (Option<Box<Stmt>>, Expr) {
    if p.tok() == TokenKind::LBrace {
        let pos = p.pos();
        p.error(pos, "missing condition in if statement");
        return (None, Expr::bad(pos));
    }

    let outer = p.expr_lev;
    p.expr_lev = -1;

    let mut init = None;
    if p.tok() != TokenKind::Semicolon {
        // Accept a var declaration but complain.
        if p.tok() == TokenKind::Var {
            p.next();
            let pos = p.pos();
            p.error(pos, "var declaration not allowed in if initializer");
        }
        init = Some(parse_simple_stmt(p, SimpleMode::Basic).into_stmt());
    }

    let mut cond_stmt = None;
    let mut semi: Option<(Pos, bool)> = None;
    if p.tok() != TokenKind::LBrace {
        if p.tok() == TokenKind::Semicolon {
            semi = Some((p.pos(), p.at_newline()));
            p.next();
        } else {
            p.expect(TokenKind::Semicolon);
        }
        if p.tok() != TokenKind::LBrace {
            cond_stmt = Some(parse_simple_stmt(p, SimpleMode::Basic).into_stmt());
        }
    } else {
        cond_stmt = init.take();
    }

    let cond = match make_expr(p, cond_stmt, "boolean expression") {
        Some(cond) => cond,
        None => {
            if let Some((semi_pos, newline)) = semi {
                if newline {
                    p.error(semi_pos, "unexpected newline, expecting { after if clause");
                } else {
                    p.error(semi_pos, "missing condition in if statement");
                }
            }
            Expr::bad(p.pos())
        }
    };
    p.expr_lev = outer;

    (init.map(Box::new), cond)
}

fn parse_switch_stmt(p: &mut Parser) -> Stmt {
    let pos = p.expect(TokenKind::Switch);

    let mut s1 = None;
    let mut s2 = None;
    if p.tok() != TokenKind::LBrace {
        let outer = p.expr_lev;
        p.expr_lev = -1;
        if p.tok() != TokenKind::Semicolon {
            s2 = Some(parse_simple_stmt(p, SimpleMode::Basic).into_stmt());
        }
        if p.tok() == TokenKind::Semicolon {
            p.next();
            s1 = s2.take();
            if p.tok() != TokenKind::LBrace {
                s2 = Some(parse_simple_stmt(p, SimpleMode::Basic).into_stmt());
            }
        }
        p.expr_lev = outer;
    }

    let guard = s2.as_ref().and_then(|s| type_switch_guard(p, s));
    let is_type_switch = guard.is_some();

    p.expect(TokenKind::LBrace);
    let mut body = Vec::new();
    while matches!(p.tok(), TokenKind::Case | TokenKind::Default) {
        body.push(parse_case_clause(p, is_type_switch));
    }
    p.expect(TokenKind::RBrace);
    p.expect_semi();

    let init = s1.map(Box::new);
    match guard {
        Some((bind, x)) => Stmt::new(pos, StmtKind::TypeSwitch { init, bind, x, body }),
        None => {
            let tag = make_expr(p, s2, "switch expression");
            Stmt::new(pos, StmtKind::Switch { init, tag, body })
        }
    }
}

/// `x.(type)` or `v := x.(type)`: the binding and the asserted operand.
fn type_switch_guard(p: &mut Parser, stmt: &Stmt) -> Option<(Option<Ident>, Expr)> {
    fn asserted(e: &Expr) -> Option<&Expr> {
        match &e.kind {
            ExprKind::TypeAssert { x, ty: None } => Some(x),
            _ => None,
        }
    }
    match &stmt.kind {
        StmtKind::Expr(e) => asserted(e).map(|x| (None, x.clone())),
        StmtKind::Assign { lhs, op, op_pos, rhs } if lhs.len() == 1 && rhs.len() == 1 => {
            let x = asserted(&rhs[0])?;
            if *op == TokenKind::Assign {
                p.error(*op_pos, "expected ':=', found '='");
            } else if *op != TokenKind::Define {
                return None;
            }
            let bind = match &lhs[0].kind {
                ExprKind::Ident(name) => Ident::new(name.clone(), lhs[0].pos),
                _ => {
                    p.error_expected(lhs[0].pos, "identifier");
                    Ident::new("_", lhs[0].pos)
                }
            };
            Some((Some(bind), x.clone()))
        }
        _ => None,
    }
}

fn parse_case_clause(p: &mut Parser, type_switch: bool) -> CaseClause {
    let pos = p.pos();
    let list = if p.got(TokenKind::Case) {
        let mut list = Vec::new();
        if type_switch {
            list.push(parse_type(p));
            while p.got(TokenKind::Comma) {
                list.push(parse_type(p));
            }
        } else {
            list = parse_list(p);
        }
        Some(list)
    } else {
        p.expect(TokenKind::Default);
        None
    };
    p.expect(TokenKind::Colon);
    let body = parse_stmt_list(p);
    CaseClause { pos, list, body }
}

fn parse_select_stmt(p: &mut Parser) -> Stmt {
    let pos = p.expect(TokenKind::Select);
    p.expect(TokenKind::LBrace);
    let mut clauses = Vec::new();
    while matches!(p.tok(), TokenKind::Case | TokenKind::Default) {
        clauses.push(parse_comm_clause(p));
    }
    p.expect(TokenKind::RBrace);
    p.expect_semi();
    Stmt::new(pos, StmtKind::Select(clauses))
}

fn parse_comm_clause(p: &mut Parser) -> CommClause {
    let pos = p.pos();
    let comm = if p.got(TokenKind::Case) {
        let stmt_pos = p.pos();
        let mut lhs = parse_list(p);
        let stmt = match p.tok() {
            TokenKind::Arrow => {
                if lhs.len() > 1 {
                    p.error_expected(lhs[0].pos, "1 expression");
                }
                p.next();
                let value = parse_rhs(p);
                let chan = lhs.swap_remove(0);
                Stmt::new(stmt_pos, StmtKind::Send { chan, value })
            }
            op @ (TokenKind::Assign | TokenKind::Define) => {
                if lhs.len() > 2 {
                    p.error_expected(lhs[0].pos, "1 or 2 expressions");
                    lhs.truncate(2);
                }
                let op_pos = p.pos();
                p.next();
                let rhs = vec![parse_rhs(p)];
                Stmt::new(stmt_pos, StmtKind::Assign { lhs, op, op_pos, rhs })
            }
            _ => {
                if lhs.len() > 1 {
                    p.error_expected(lhs[0].pos, "1 expression");
                }
                Stmt::new(stmt_pos, StmtKind::Expr(lhs.swap_remove(0)))
            }
        };
        Some(Box::new(stmt))
    } else {
        p.expect(TokenKind::Default);
        None
    };
    p.expect(TokenKind::Colon);
    let body = parse_stmt_list(p);
    CommClause { pos, comm, body }
}

fn parse_for_stmt(p: &mut Parser) -> Stmt {
    let pos = p.expect(TokenKind::For);

    let mut s1 = None;
    let mut s2: Option<Simple> = None;
    let mut s3 = None;
    if p.tok() != TokenKind::LBrace {
        let outer = p.expr_lev;
        p.expr_lev = -1;
        if p.tok() != TokenKind::Semicolon {
            if p.tok() == TokenKind::Range {
                // for range x
                let range_pos = p.pos();
                p.next();
                let x = parse_rhs(p);
                s2 = Some(Simple::Range {
                    pos: range_pos,
                    lhs: Vec::new(),
                    define: false,
                    x,
                });
            } else {
                s2 = Some(parse_simple_stmt(p, SimpleMode::RangeOk));
            }
        }
        let is_range = matches!(s2, Some(Simple::Range { .. }));
        if !is_range && p.tok() == TokenKind::Semicolon {
            p.next();
            s1 = s2.take().map(Simple::into_stmt);
            if p.tok() != TokenKind::Semicolon {
                s2 = Some(parse_simple_stmt(p, SimpleMode::Basic));
            }
            p.expect_semi();
            if p.tok() != TokenKind::LBrace {
                s3 = Some(parse_simple_stmt(p, SimpleMode::Basic).into_stmt());
            }
        }
        p.expr_lev = outer;
    }

    let body = parse_block(p);
    p.expect_semi();

    match s2 {
        Some(Simple::Range {
            lhs, define, x, ..
        }) => {
            if lhs.len() > 2 {
                p.error_expected(lhs[0].pos, "at most 2 expressions");
            }
            let mut lhs = lhs.into_iter();
            let key = lhs.next();
            let value = lhs.next();
            Stmt::new(
                pos,
                StmtKind::Range {
                    key,
                    value,
                    define,
                    x,
                    body,
                },
            )
        }
        other => {
            let cond = make_expr(p, other.map(Simple::into_stmt), "boolean or range expression");
            Stmt::new(
                pos,
                StmtKind::For {
                    init: s1.map(Box::new),
                    cond,
                    post: s3.map(Box::new),
                    body,
                },
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::parser::fileset::FileSet;
    use crate::parser::parser::ParseOptions;

    fn stmts(src: &str) -> (Vec<Stmt>, Vec<String>) {
        let fset = FileSet::new();
        let file = fset.add_file("s.go", Arc::from(src));
        let mut p = Parser::new(&file, ParseOptions::default());
        let block = parse_block(&mut p);
        let errors = p.errors.iter().map(|e| e.message.clone()).collect();
        (block.stmts, errors)
    }

    #[test]
    fn test_assignments_and_incdec() {
        let (list, errors) = stmts("{ a, b := 1, 2; a += b; a++; ch <- a }");
        assert!(errors.is_empty(), "{errors:?}");
        assert!(matches!(list[0].kind, StmtKind::Assign { op: TokenKind::Define, .. }));
        assert!(matches!(list[1].kind, StmtKind::Assign { op: TokenKind::AddAssign, .. }));
        assert!(matches!(list[2].kind, StmtKind::IncDec { inc: true, .. }));
        assert!(matches!(list[3].kind, StmtKind::Send { .. }));
    }

    #[test]
    fn test_for_forms() {
        let (list, errors) = stmts(
            "{\n for {}\n for x < 3 {}\n for i := 0; i < 3; i++ {}\n\
             for k, v := range m {}\n for range ch {}\n}",
        );
        assert!(errors.is_empty(), "{errors:?}");
        assert!(matches!(list[0].kind, StmtKind::For { cond: None, .. }));
        assert!(matches!(list[1].kind, StmtKind::For { cond: Some(_), .. }));
        assert!(matches!(list[2].kind, StmtKind::For { init: Some(_), post: Some(_), .. }));
        assert!(matches!(list[3].kind, StmtKind::Range { define: true, value: Some(_), .. }));
        assert!(matches!(list[4].kind, StmtKind::Range { key: None, .. }));
    }

    #[test]
    fn test_type_switch() {
        let (list, errors) =
            stmts("{ switch v := x.(type) { case int, string: _ = v; default: } }");
        assert!(errors.is_empty(), "{errors:?}");
        let StmtKind::TypeSwitch { bind, body, .. } = &list[0].kind else { panic!() };
        assert_eq!(bind.as_ref().map(|b| b.name.as_str()), Some("v"));
        assert_eq!(body.len(), 2);
        assert_eq!(body[0].list.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn test_if_else_chain_and_labels() {
        let (list, errors) =
            stmts("{ L: for { if a { break L } else if b { continue } else { goto L } } }");
        assert!(errors.is_empty(), "{errors:?}");
        assert!(matches!(list[0].kind, StmtKind::Labeled { .. }));
    }

    #[test]
    fn test_select() {
        let (list, errors) =
            stmts("{ select { case v, ok := <-ch: _ = v; case out <- 1: default: } }");
        assert!(errors.is_empty(), "{errors:?}");
        let StmtKind::Select(clauses) = &list[0].kind else { panic!() };
        assert_eq!(clauses.len(), 3);
    }

    #[test]
    fn test_missing_if_condition() {
        let (_, errors) = stmts("{ if {} }");
        assert_eq!(errors, ["missing condition in if statement"]);
    }

    #[test]
    fn test_assignment_as_condition() {
        let (_, errors) = stmts("{ if x = 1 {} }");
        assert_eq!(
            errors,
            [
                "expected boolean expression, found assignment \
                 (missing parentheses around composite literal?)"
            ]
        );
    }

    #[test]
    fn test_defer_parenthesized() {
        let (_, errors) = stmts("{ defer (f()) }");
        assert_eq!(errors, ["expression in defer must not be parenthesized"]);
    }
}
