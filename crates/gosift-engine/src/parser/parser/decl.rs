//! Declaration parsing: package clause, imports, const/var/type specs and
//! function declarations.

use super::recovery;
use super::stmt::parse_block;
use super::types::{
    parse_array_type_after_lbrack, parse_parameters, parse_result, parse_type, parse_type_params,
};
use super::Parser;
use crate::parser::ast::{
    Decl, File, FuncDecl, FuncType, GenDecl, Ident, ImportSpec, Spec, TypeSpec, ValueSpec,
};
use crate::parser::literal::unquote_string;
use crate::parser::token::TokenKind;

/// SourceFile = PackageClause ";" { ImportDecl ";" } { TopLevelDecl ";" } .
pub fn parse_source_file(p: &mut Parser) -> File {
    let package_pos = p.expect(TokenKind::Package);
    let package = p.parse_ident();
    if package.is_blank() {
        p.error(package.pos, "invalid package name _");
    }
    p.expect_semi();

    let mut file = File {
        name: p.file.name().to_string(),
        package_pos,
        package,
        decls: Vec::new(),
        end: p.file.pos(p.file.size()),
    };

    // The rest is noise if the package clause is broken.
    if !p.errors.is_empty() {
        return file;
    }

    while p.tok() == TokenKind::Import {
        file.decls.push(Decl::Gen(parse_gen_decl(p, TokenKind::Import)));
    }

    if p.options.imports_only {
        return file;
    }

    while !p.at_eof() {
        p.check_cancel();
        let start = p.index();
        file.decls.push(parse_decl(p));
        p.ensure_progress(start);
    }
    file
}

fn parse_decl(p: &mut Parser) -> Decl {
    match p.tok() {
        keyword @ (TokenKind::Const | TokenKind::Var | TokenKind::Type) => {
            Decl::Gen(parse_gen_decl(p, keyword))
        }
        TokenKind::Func => Decl::Func(parse_func_decl(p)),
        TokenKind::Import => {
            let pos = p.pos();
            p.error(pos, "imports must appear before other declarations");
            Decl::Gen(parse_gen_decl(p, TokenKind::Import))
        }
        _ => {
            let pos = p.pos();
            p.error_expected(pos, "declaration");
            recovery::advance_to_decl_start(p);
            Decl::Bad(pos)
        }
    }
}

/// GenDecl = keyword ( Spec | "(" { Spec ";" } ")" ) .
pub fn parse_gen_decl(p: &mut Parser, keyword: TokenKind) -> GenDecl {
    let pos = p.expect(keyword);
    let mut specs = Vec::new();
    if p.got(TokenKind::LParen) {
        let mut iota = 0;
        while p.tok() != TokenKind::RParen && !p.at_eof() {
            let start = p.index();
            specs.push(parse_spec(p, keyword, iota));
            iota += 1;
            p.ensure_progress(start);
        }
        p.expect(TokenKind::RParen);
        p.expect_semi();
    } else {
        specs.push(parse_spec(p, keyword, 0));
    }
    GenDecl {
        keyword,
        pos,
        specs,
    }
}

fn parse_spec(p: &mut Parser, keyword: TokenKind, iota: usize) -> Spec {
    match keyword {
        TokenKind::Import => Spec::Import(parse_import_spec(p)),
        TokenKind::Type => Spec::Type(parse_type_spec(p)),
        _ => Spec::Value(parse_value_spec(p, keyword, iota)),
    }
}

fn parse_import_spec(p: &mut Parser) -> ImportSpec {
    let name = match p.tok() {
        TokenKind::Period => {
            let ident = Ident::new(".", p.pos());
            p.next();
            Some(ident)
        }
        TokenKind::Ident => Some(p.parse_ident()),
        _ => None,
    };

    let pos = p.pos();
    let mut path = String::new();
    if p.tok() == TokenKind::String {
        match unquote_string(p.text()) {
            Some(unquoted) if !unquoted.is_empty() => path = unquoted,
            _ => p.error(pos, format!("invalid import path: {}", p.text())),
        }
        p.next();
    } else if p.tok().is_literal() {
        p.error(pos, "import path must be a string");
        p.next();
    } else {
        p.error(pos, "missing import path");
        recovery::advance_to_expr_end(p);
    }
    p.expect_semi();

    ImportSpec { name, path, pos }
}

fn parse_value_spec(p: &mut Parser, keyword: TokenKind, iota: usize) -> ValueSpec {
    let pos = p.pos();
    let names = p.parse_ident_list();
    let mut ty = None;
    let mut values = Vec::new();

    if keyword == TokenKind::Const {
        // Type and values are optional for constants (implicit repetition).
        if !matches!(p.tok(), TokenKind::Eof | TokenKind::Semicolon | TokenKind::RParen) {
            if p.tok() != TokenKind::Assign {
                ty = Some(parse_type(p));
            }
            if p.got(TokenKind::Assign) {
                values = super::expr::parse_list(p);
            }
        }
    } else {
        if p.tok() != TokenKind::Assign {
            ty = Some(parse_type(p));
        }
        if p.got(TokenKind::Assign) {
            values = super::expr::parse_list(p);
        }
    }
    p.expect_semi();

    ValueSpec {
        pos,
        names,
        ty,
        values,
        iota,
    }
}

fn parse_type_spec(p: &mut Parser) -> TypeSpec {
    let name = p.parse_ident();
    let mut type_params = Vec::new();
    let mut ty = None;

    if p.tok() == TokenKind::LBrack {
        let lbrack = p.pos();
        if starts_type_params(p) {
            p.next();
            type_params = parse_type_params(p);
        } else {
            p.next();
            ty = Some(parse_array_type_after_lbrack(p, lbrack));
        }
    }

    let assign = ty.is_none() && p.got(TokenKind::Assign);
    let ty = ty.unwrap_or_else(|| parse_type(p));
    p.expect_semi();

    TypeSpec {
        name,
        type_params,
        assign,
        ty,
    }
}

/// At `[` after a type name: does a type parameter list follow (as opposed
/// to an array length)?
fn starts_type_params(p: &Parser) -> bool {
    if p.peek(1) != TokenKind::Ident {
        return false;
    }
    match p.peek(2) {
        TokenKind::Ident
        | TokenKind::Comma
        | TokenKind::Interface
        | TokenKind::Func
        | TokenKind::Map
        | TokenKind::Chan
        | TokenKind::Struct
        | TokenKind::Tilde => true,
        // `[T []E]` but not `[N[0]]`.
        TokenKind::LBrack => p.peek(3) == TokenKind::RBrack,
        _ => false,
    }
}

fn parse_func_decl(p: &mut Parser) -> FuncDecl {
    let pos = p.expect(TokenKind::Func);

    let recv = if p.tok() == TokenKind::LParen {
        let recv_pos = p.pos();
        let mut fields = parse_parameters(p);
        match fields.len() {
            0 => {
                p.error(recv_pos, "method has no receiver");
                None
            }
            1 => fields.pop(),
            _ => {
                p.error(recv_pos, "method has multiple receivers");
                fields.truncate(1);
                fields.pop()
            }
        }
    } else {
        None
    };

    let name = p.parse_ident();

    let mut type_params = Vec::new();
    if p.tok() == TokenKind::LBrack {
        let lbrack = p.pos();
        p.next();
        type_params = parse_type_params(p);
        if recv.is_some() {
            p.error(lbrack, "method must have no type parameters");
        }
    }

    let sig_pos = p.pos();
    let params = parse_parameters(p);
    let results = parse_result(p);

    let body = if p.tok() == TokenKind::LBrace {
        let outer = p.expr_lev;
        p.expr_lev = 0;
        let block = parse_block(p);
        p.expr_lev = outer;
        Some(block)
    } else {
        None
    };
    p.expect_semi();

    FuncDecl {
        pos,
        recv,
        name,
        type_params,
        ty: FuncType {
            pos: sig_pos,
            params,
            results,
        },
        body,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::parser::ast::ExprKind;
    use crate::parser::fileset::FileSet;
    use crate::parser::parser::ParseOptions;

    fn parse(src: &str) -> (File, usize) {
        let fset = FileSet::new();
        let file = fset.add_file("d.go", Arc::from(src));
        let mut p = Parser::new(&file, ParseOptions::default());
        let ast = parse_source_file(&mut p);
        let n = p.errors.len() + p.lex_errors.len();
        (ast, n)
    }

    #[test]
    fn test_const_group_iota_and_repetition() {
        let (file, errors) = parse("package p\nconst (\n\tA = iota\n\tB\n\tC\n)\n");
        assert_eq!(errors, 0);
        let Decl::Gen(gen) = &file.decls[0] else { panic!() };
        assert_eq!(gen.specs.len(), 3);
        let Spec::Value(c) = &gen.specs[2] else { panic!() };
        assert_eq!(c.iota, 2);
        assert!(c.values.is_empty());
    }

    #[test]
    fn test_method_decl() {
        let (file, errors) = parse("package p\nfunc (l *List[T]) Len() int { return 0 }\n");
        assert_eq!(errors, 0);
        let Decl::Func(f) = &file.decls[0] else { panic!() };
        assert!(f.recv.is_some());
        assert_eq!(f.name.name, "Len");
        assert_eq!(f.ty.results.len(), 1);
    }

    #[test]
    fn test_alias_and_struct_tags() {
        let (file, errors) = parse(
            "package p\ntype A = int\n\
             type S struct {\n\tX int `json:\"x\"`\n\tio.Reader\n\t*T\n}\n",
        );
        assert_eq!(errors, 0);
        let Decl::Gen(gen) = &file.decls[0] else { panic!() };
        let Spec::Type(alias) = &gen.specs[0] else { panic!() };
        assert!(alias.assign);
        let Decl::Gen(gen) = &file.decls[1] else { panic!() };
        let Spec::Type(s) = &gen.specs[0] else { panic!() };
        let ExprKind::StructType(fields) = &s.ty.kind else { panic!() };
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].tag.as_deref(), Some("json:\"x\""));
        assert!(fields[1].names.is_empty());
    }

    #[test]
    fn test_import_after_decl_is_reported() {
        let (_, errors) = parse("package p\nvar x int\nimport \"fmt\"\n");
        assert_eq!(errors, 1);
    }

    #[test]
    fn test_garbage_at_top_level() {
        let (file, errors) = parse("package p\n)\nfunc f() {}\n");
        assert_eq!(errors, 1);
        assert!(matches!(file.decls.last(), Some(Decl::Func(_))));
    }
}
