//! Operands: the result of evaluating an expression.

use crate::checker::constant::ConstValue;
use crate::checker::objects::Builtin;
use crate::checker::types::{BasicKind, Type, TypeContext, TypeId};
use crate::parser::ast::Expr;
use crate::parser::Pos;

#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    /// Evaluation failed; an error has been reported.
    Invalid,
    /// A call of a function without results.
    NoValue,
    Builtin(Builtin),
    TypeExpr,
    Constant(ConstValue),
    /// Addressable value.
    Variable,
    MapIndex,
    Value,
    /// Value that may be used in a comma-ok assignment.
    CommaOk,
}

#[derive(Debug, Clone)]
pub struct Operand<'a> {
    pub mode: Mode,
    pub ty: TypeId,
    pub expr: Option<&'a Expr>,
    pub pos: Pos,
}

impl<'a> Operand<'a> {
    pub fn invalid(expr: &'a Expr) -> Self {
        Operand {
            mode: Mode::Invalid,
            ty: TypeId::INVALID,
            expr: Some(expr),
            pos: expr.pos,
        }
    }

    pub fn new(mode: Mode, ty: TypeId, expr: &'a Expr) -> Self {
        Operand {
            mode,
            ty,
            expr: Some(expr),
            pos: expr.pos,
        }
    }

    /// An operand without an expression (a value of a multi-value call).
    pub fn synthetic(mode: Mode, ty: TypeId, pos: Pos) -> Self {
        Operand {
            mode,
            ty,
            expr: None,
            pos,
        }
    }

    pub fn is_invalid(&self) -> bool {
        self.mode == Mode::Invalid
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.mode, Mode::Constant(_))
    }

    pub fn value(&self) -> Option<&ConstValue> {
        match &self.mode {
            Mode::Constant(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_nil(&self, tcx: &TypeContext) -> bool {
        matches!(tcx.get(self.ty), Type::Basic(BasicKind::UntypedNil))
    }

    /// Whether the operand denotes a value (as opposed to a type, a
    /// builtin or nothing).
    pub fn is_value(&self) -> bool {
        matches!(
            self.mode,
            Mode::Constant(_) | Mode::Variable | Mode::MapIndex | Mode::Value | Mode::CommaOk
        )
    }

    pub fn set_invalid(&mut self) {
        self.mode = Mode::Invalid;
    }

    pub fn expr_string(&self) -> String {
        self.expr.map(|e| e.to_string()).unwrap_or_default()
    }

    /// The operand as printed in diagnostics, e.g. `x (variable of type int)`
    /// or `1 (untyped int constant)`.
    pub fn describe(&self, tcx: &TypeContext) -> String {
        if self.mode == Mode::Value && self.is_nil(tcx) {
            return "nil".to_string();
        }
        let mut expr = self.expr_string();
        if expr.is_empty() {
            match &self.mode {
                Mode::Builtin(b) => expr = b.name().to_string(),
                Mode::TypeExpr => expr = tcx.type_string(self.ty),
                Mode::Constant(v) => expr = v.to_string(),
                _ => {}
            }
        }

        let mut out = String::new();
        if !expr.is_empty() {
            out.push_str(&expr);
            out.push_str(" (");
        }

        let mut has_type = false;
        match self.mode {
            Mode::Invalid | Mode::NoValue | Mode::Builtin(_) | Mode::TypeExpr => {}
            _ => {
                if tcx.is_untyped(self.ty) {
                    out.push_str(&tcx.type_string(self.ty));
                    out.push(' ');
                } else {
                    has_type = true;
                }
            }
        }

        out.push_str(match self.mode {
            Mode::Invalid => "invalid operand",
            Mode::NoValue => "no value",
            Mode::Builtin(_) => "built-in",
            Mode::TypeExpr => "type",
            Mode::Constant(_) => "constant",
            Mode::Variable => "variable",
            Mode::MapIndex => "map index expression",
            Mode::Value => "value",
            Mode::CommaOk => "comma, ok expression",
        });

        if let Mode::Constant(v) = &self.mode {
            let s = v.to_string();
            if !v.is_unknown() && s != expr {
                out.push(' ');
                out.push_str(&s);
            }
        }

        if has_type {
            if tcx.is_invalid(self.ty) {
                out.push_str(" with invalid type");
            } else {
                out.push_str(" of type ");
                out.push_str(&tcx.type_string(self.ty));
            }
        }

        if !expr.is_empty() {
            out.push(')');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::{ExprKind, LitKind};

    fn ident(name: &str) -> Expr {
        Expr::new(Pos::NONE, ExprKind::Ident(name.to_string()))
    }

    #[test]
    fn test_describe_variable() {
        let tcx = TypeContext::new();
        let e = ident("x");
        let op = Operand::new(Mode::Variable, tcx.basic(BasicKind::Int), &e);
        assert_eq!(op.describe(&tcx), "x (variable of type int)");
    }

    #[test]
    fn test_describe_constants() {
        let tcx = TypeContext::new();
        let lit = Expr::new(
            Pos::NONE,
            ExprKind::BasicLit {
                kind: LitKind::Int,
                value: "300".into(),
            },
        );
        let untyped_int = tcx.basic(BasicKind::UntypedInt);
        let op = Operand::new(Mode::Constant(ConstValue::Int(300)), untyped_int, &lit);
        assert_eq!(op.describe(&tcx), "300 (untyped int constant)");

        let c = ident("c");
        let named = Operand::new(Mode::Constant(ConstValue::Int(5)), untyped_int, &c);
        assert_eq!(named.describe(&tcx), "c (untyped int constant 5)");

        let int8 = tcx.basic(BasicKind::Int8);
        let typed = Operand::new(Mode::Constant(ConstValue::Int(5)), int8, &c);
        assert_eq!(typed.describe(&tcx), "c (constant 5 of type int8)");
    }

    #[test]
    fn test_describe_no_value() {
        let tcx = TypeContext::new();
        let e = ident("f()");
        let op = Operand::new(Mode::NoValue, TypeId::INVALID, &e);
        assert_eq!(op.describe(&tcx), "f() (no value)");
    }
}
