//! Abstract syntax tree for Go source files.
//!
//! Nodes carry global [`Pos`] values from the shared [`FileSet`], so nodes
//! from different files of one package can be compared and sorted directly.
//!
//! [`FileSet`]: crate::parser::FileSet

use std::fmt;

use crate::parser::fileset::Pos;
use crate::parser::token::TokenKind;

// ============================================================================
// Files and declarations
// ============================================================================

/// An identifier with its position.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub pos: Pos,
}

impl Ident {
    pub fn new(name: impl Into<String>, pos: Pos) -> Self {
        Ident {
            name: name.into(),
            pos,
        }
    }

    /// The blank identifier `_`.
    pub fn is_blank(&self) -> bool {
        self.name == "_"
    }

    /// Exported names start with an upper-case letter.
    pub fn is_exported(&self) -> bool {
        is_exported(&self.name)
    }
}

/// Whether a Go name is exported.
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

/// One parsed source file.
#[derive(Debug, Clone)]
pub struct File {
    /// Name the file was registered under.
    pub name: String,
    /// Position of the `package` keyword.
    pub package_pos: Pos,
    /// Package name.
    pub package: Ident,
    pub decls: Vec<Decl>,
    /// Position just past the last byte of the file.
    pub end: Pos,
}

impl File {
    /// All import specs of the file, in source order.
    pub fn imports(&self) -> impl Iterator<Item = &ImportSpec> {
        self.decls
            .iter()
            .flat_map(|decl| {
                let specs: &[Spec] = match decl {
                    Decl::Gen(gen) if gen.keyword == TokenKind::Import => &gen.specs,
                    _ => &[],
                };
                specs
            })
            .filter_map(|spec| match spec {
                Spec::Import(import) => Some(import),
                _ => None,
            })
    }
}

/// A top-level or local declaration.
#[derive(Debug, Clone)]
pub enum Decl {
    Gen(GenDecl),
    Func(FuncDecl),
    Bad(Pos),
}

/// `import`, `const`, `type` or `var` declaration, possibly grouped.
#[derive(Debug, Clone)]
pub struct GenDecl {
    pub keyword: TokenKind,
    pub pos: Pos,
    pub specs: Vec<Spec>,
}

#[derive(Debug, Clone)]
pub enum Spec {
    Import(ImportSpec),
    Value(ValueSpec),
    Type(TypeSpec),
}

#[derive(Debug, Clone)]
pub struct ImportSpec {
    /// Local name: an identifier, `.` or `_`.
    pub name: Option<Ident>,
    /// Unquoted import path.
    pub path: String,
    pub pos: Pos,
}

/// A `const` or `var` spec.
#[derive(Debug, Clone)]
pub struct ValueSpec {
    pub pos: Pos,
    pub names: Vec<Ident>,
    pub ty: Option<Expr>,
    pub values: Vec<Expr>,
    /// Index of the spec within its group; the value of `iota` for constants.
    pub iota: usize,
}

#[derive(Debug, Clone)]
pub struct TypeSpec {
    pub name: Ident,
    pub type_params: Vec<Field>,
    /// Alias declaration (`type A = B`).
    pub assign: bool,
    pub ty: Expr,
}

#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub pos: Pos,
    pub recv: Option<Field>,
    pub name: Ident,
    pub type_params: Vec<Field>,
    pub ty: FuncType,
    pub body: Option<Block>,
}

/// A parameter, result, receiver, struct field or type parameter group.
/// `names` is empty for anonymous parameters and embedded fields.
#[derive(Debug, Clone)]
pub struct Field {
    pub pos: Pos,
    pub names: Vec<Ident>,
    pub ty: Expr,
    pub tag: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FuncType {
    pub pos: Pos,
    pub params: Vec<Field>,
    pub results: Vec<Field>,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub lbrace: Pos,
    pub stmts: Vec<Stmt>,
    pub rbrace: Pos,
}

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LitKind {
    Int,
    Float,
    Imag,
    Char,
    String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

#[derive(Debug, Clone)]
pub enum InterfaceElem {
    Method { name: Ident, ty: FuncType },
    /// Embedded interface or type-set term (`~int | string`).
    Embed(Expr),
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub pos: Pos,
    pub kind: ExprKind,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Bad,
    Ident(String),
    /// Literal with its source text.
    BasicLit { kind: LitKind, value: String },
    CompositeLit { ty: Option<Box<Expr>>, elts: Vec<Expr> },
    KeyValue { key: Box<Expr>, value: Box<Expr> },
    FuncLit { ty: FuncType, body: Block },
    Paren(Box<Expr>),
    Selector { x: Box<Expr>, sel: Ident },
    /// Index or generic instantiation.
    Index { x: Box<Expr>, indices: Vec<Expr> },
    Slice {
        x: Box<Expr>,
        low: Option<Box<Expr>>,
        high: Option<Box<Expr>>,
        max: Option<Box<Expr>>,
        three: bool,
    },
    /// `x.(T)`; `ty` is `None` for `x.(type)` in type switches.
    TypeAssert { x: Box<Expr>, ty: Option<Box<Expr>> },
    Call { func: Box<Expr>, args: Vec<Expr>, ellipsis: bool },
    /// Dereference or pointer type.
    Star(Box<Expr>),
    Unary { op: TokenKind, x: Box<Expr> },
    Binary { op: TokenKind, op_pos: Pos, x: Box<Expr>, y: Box<Expr> },
    /// `[N]T`; `len` is `None` for `[...]T`.
    ArrayType { len: Option<Box<Expr>>, elem: Box<Expr> },
    SliceType(Box<Expr>),
    StructType(Vec<Field>),
    FuncType(FuncType),
    InterfaceType(Vec<InterfaceElem>),
    MapType { key: Box<Expr>, value: Box<Expr> },
    ChanType { dir: ChanDir, elem: Box<Expr> },
    /// `...T` in a parameter list.
    Ellipsis(Option<Box<Expr>>),
}

impl Expr {
    pub fn new(pos: Pos, kind: ExprKind) -> Self {
        Expr { pos, kind }
    }

    pub fn bad(pos: Pos) -> Self {
        Expr::new(pos, ExprKind::Bad)
    }

    pub fn ident(ident: Ident) -> Self {
        Expr::new(ident.pos, ExprKind::Ident(ident.name))
    }

    /// Identifier name, if this is a bare identifier.
    pub fn as_ident(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    /// Strip any number of enclosing parentheses.
    pub fn unparen(&self) -> &Expr {
        let mut e = self;
        while let ExprKind::Paren(inner) = &e.kind {
            e = inner;
        }
        e
    }

    /// Whether the expression is syntactically a type (used to resolve
    /// ambiguities in parameter lists and composite literals).
    pub fn is_type_syntax(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::ArrayType { .. }
                | ExprKind::SliceType(_)
                | ExprKind::StructType(_)
                | ExprKind::FuncType(_)
                | ExprKind::InterfaceType(_)
                | ExprKind::MapType { .. }
                | ExprKind::ChanType { .. }
        )
    }
}

// ============================================================================
// Statements
// ============================================================================

#[derive(Debug, Clone)]
pub struct Stmt {
    pub pos: Pos,
    pub kind: StmtKind,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Bad,
    Decl(GenDecl),
    Empty,
    Labeled { label: Ident, stmt: Box<Stmt> },
    Expr(Expr),
    Send { chan: Expr, value: Expr },
    IncDec { x: Expr, inc: bool },
    /// Plain, short-variable (`:=`) or compound assignment.
    Assign { lhs: Vec<Expr>, op: TokenKind, op_pos: Pos, rhs: Vec<Expr> },
    Go(Expr),
    Defer(Expr),
    Return(Vec<Expr>),
    Branch { tok: TokenKind, label: Option<Ident> },
    Block(Block),
    If {
        init: Option<Box<Stmt>>,
        cond: Expr,
        then: Block,
        els: Option<Box<Stmt>>,
    },
    Switch {
        init: Option<Box<Stmt>>,
        tag: Option<Expr>,
        body: Vec<CaseClause>,
    },
    /// `switch [init;] [bind :=] x.(type) { ... }`; `x` is the asserted operand.
    TypeSwitch {
        init: Option<Box<Stmt>>,
        bind: Option<Ident>,
        x: Expr,
        body: Vec<CaseClause>,
    },
    Select(Vec<CommClause>),
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
        body: Block,
    },
    Range {
        key: Option<Expr>,
        value: Option<Expr>,
        define: bool,
        x: Expr,
        body: Block,
    },
}

impl Stmt {
    pub fn new(pos: Pos, kind: StmtKind) -> Self {
        Stmt { pos, kind }
    }
}

/// A `case` or `default` clause. `list` is `None` for `default`.
#[derive(Debug, Clone)]
pub struct CaseClause {
    pub pos: Pos,
    pub list: Option<Vec<Expr>>,
    pub body: Vec<Stmt>,
}

/// A `select` clause. `comm` is `None` for `default`.
#[derive(Debug, Clone)]
pub struct CommClause {
    pub pos: Pos,
    pub comm: Option<Box<Stmt>>,
    pub body: Vec<Stmt>,
}

// ============================================================================
// Printing
// ============================================================================

// Expressions print in the shortened form used by diagnostics: function
// literal bodies and composite literal elements are elided.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Bad => f.write_str("BadExpr"),
            ExprKind::Ident(name) => f.write_str(name),
            ExprKind::BasicLit { value, .. } => f.write_str(value),
            ExprKind::CompositeLit { ty, .. } => match ty {
                Some(ty) => write!(f, "{ty}{{…}}"),
                None => f.write_str("{…}"),
            },
            ExprKind::KeyValue { key, value } => write!(f, "{key}: {value}"),
            ExprKind::FuncLit { ty, .. } => {
                f.write_str("(func")?;
                write_signature(f, ty)?;
                f.write_str(" literal)")
            }
            ExprKind::Paren(x) => write!(f, "({x})"),
            ExprKind::Selector { x, sel } => write!(f, "{x}.{}", sel.name),
            ExprKind::Index { x, indices } => {
                write!(f, "{x}[")?;
                write_list(f, indices)?;
                f.write_str("]")
            }
            ExprKind::Slice {
                x,
                low,
                high,
                max,
                three,
            } => {
                write!(f, "{x}[")?;
                if let Some(low) = low {
                    write!(f, "{low}")?;
                }
                f.write_str(":")?;
                if let Some(high) = high {
                    write!(f, "{high}")?;
                }
                if *three {
                    f.write_str(":")?;
                    if let Some(max) = max {
                        write!(f, "{max}")?;
                    }
                }
                f.write_str("]")
            }
            ExprKind::TypeAssert { x, ty } => match ty {
                Some(ty) => write!(f, "{x}.({ty})"),
                None => write!(f, "{x}.(type)"),
            },
            ExprKind::Call {
                func,
                args,
                ellipsis,
            } => {
                write!(f, "{func}(")?;
                write_list(f, args)?;
                if *ellipsis {
                    f.write_str("...")?;
                }
                f.write_str(")")
            }
            ExprKind::Star(x) => write!(f, "*{x}"),
            ExprKind::Unary { op, x } => write!(f, "{op}{x}"),
            ExprKind::Binary { op, x, y, .. } => write!(f, "{x} {op} {y}"),
            ExprKind::ArrayType { len, elem } => match len {
                Some(len) => write!(f, "[{len}]{elem}"),
                None => write!(f, "[...]{elem}"),
            },
            ExprKind::SliceType(elem) => write!(f, "[]{elem}"),
            ExprKind::StructType(fields) => {
                f.write_str("struct{")?;
                write_fields(f, fields, "; ")?;
                f.write_str("}")
            }
            ExprKind::FuncType(ty) => {
                f.write_str("func")?;
                write_signature(f, ty)
            }
            ExprKind::InterfaceType(elems) => {
                f.write_str("interface{")?;
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    match elem {
                        InterfaceElem::Method { name, ty } => {
                            f.write_str(&name.name)?;
                            write_signature(f, ty)?;
                        }
                        InterfaceElem::Embed(e) => write!(f, "{e}")?,
                    }
                }
                f.write_str("}")
            }
            ExprKind::MapType { key, value } => write!(f, "map[{key}]{value}"),
            ExprKind::ChanType { dir, elem } => match dir {
                ChanDir::Both => write!(f, "chan {elem}"),
                ChanDir::Send => write!(f, "chan<- {elem}"),
                ChanDir::Recv => write!(f, "<-chan {elem}"),
            },
            ExprKind::Ellipsis(elem) => match elem {
                Some(elem) => write!(f, "...{elem}"),
                None => f.write_str("..."),
            },
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, exprs: &[Expr]) -> fmt::Result {
    for (i, e) in exprs.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{e}")?;
    }
    Ok(())
}

fn write_fields(f: &mut fmt::Formatter<'_>, fields: &[Field], sep: &str) -> fmt::Result {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        for (j, name) in field.names.iter().enumerate() {
            if j > 0 {
                f.write_str(", ")?;
            }
            f.write_str(&name.name)?;
        }
        if !field.names.is_empty() {
            f.write_str(" ")?;
        }
        write!(f, "{}", field.ty)?;
    }
    Ok(())
}

fn write_signature(f: &mut fmt::Formatter<'_>, ty: &FuncType) -> fmt::Result {
    f.write_str("(")?;
    write_fields(f, &ty.params, ", ")?;
    f.write_str(")")?;
    match ty.results.as_slice() {
        [] => Ok(()),
        [single] if single.names.is_empty() => write!(f, " {}", single.ty),
        results => {
            f.write_str(" (")?;
            write_fields(f, results, ", ")?;
            f.write_str(")")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Expr {
        Expr::ident(Ident::new(name, Pos::NONE))
    }

    #[test]
    fn test_display_binary_and_call() {
        let call = Expr::new(
            Pos::NONE,
            ExprKind::Call {
                func: Box::new(ident("f")),
                args: vec![ident("a"), ident("b")],
                ellipsis: true,
            },
        );
        let sum = Expr::new(
            Pos::NONE,
            ExprKind::Binary {
                op: TokenKind::Add,
                op_pos: Pos::NONE,
                x: Box::new(call),
                y: Box::new(ident("c")),
            },
        );
        assert_eq!(sum.to_string(), "f(a, b...) + c");
    }

    #[test]
    fn test_display_types() {
        let map = Expr::new(
            Pos::NONE,
            ExprKind::MapType {
                key: Box::new(ident("string")),
                value: Box::new(Expr::new(
                    Pos::NONE,
                    ExprKind::SliceType(Box::new(ident("int"))),
                )),
            },
        );
        assert_eq!(map.to_string(), "map[string][]int");

        let ch = Expr::new(
            Pos::NONE,
            ExprKind::ChanType {
                dir: ChanDir::Recv,
                elem: Box::new(ident("T")),
            },
        );
        assert_eq!(ch.to_string(), "<-chan T");
    }

    #[test]
    fn test_exported() {
        assert!(is_exported("Foo"));
        assert!(!is_exported("foo"));
        assert!(!is_exported("_"));
    }
}
