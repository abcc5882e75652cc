//! Assignability, implicit conversion of untyped values, and the
//! assignment forms: `=`, `:=`, variable initialization and `return`.

use rustc_hash::FxHashSet;

use crate::checker::constant::{representable, ConstValue};
use crate::checker::objects::{ObjId, ObjKind};
use crate::checker::types::{BasicKind, Type, TypeId};
use crate::parser::ast::{ChanDir, Expr, ExprKind, Ident};
use crate::parser::{Pos, TokenKind};

use super::{Checker, Mode, Operand};

/// Why an untyped value could not take a target type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConversionError {
    Truncated,
    Overflows,
    Invalid,
}

/// `"1 variable"`, `"2 values"`.
fn measure(n: usize, unit: &str) -> String {
    if n == 1 {
        format!("{n} {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

impl<'a> Checker<'a> {
    // ========================================================================
    // Untyped values
    // ========================================================================

    /// The type (and possibly updated constant) an untyped operand takes
    /// when used where `target` is expected.
    pub(crate) fn implicit_type(
        &self,
        x: &Operand<'a>,
        target: TypeId,
    ) -> Result<(TypeId, Option<ConstValue>), ConversionError> {
        if x.is_invalid() || !self.tcx.is_untyped(x.ty) || self.tcx.is_invalid(target) {
            return Ok((x.ty, None));
        }
        if self.tcx.is_permissive(target) {
            return Ok((target, None));
        }
        if self.tcx.is_untyped(target) {
            return self
                .max_untyped(x.ty, target)
                .map(|t| (t, None))
                .ok_or(ConversionError::Invalid);
        }
        if x.is_nil(&self.tcx) {
            return if self.tcx.has_nil(target) {
                Ok((target, None))
            } else {
                Err(ConversionError::Invalid)
            };
        }
        let x_kind = self.tcx.basic_kind(x.ty).unwrap_or(BasicKind::UntypedNil);
        match self.tcx.under(target) {
            Type::Basic(kind) => {
                let kind = *kind;
                if let Mode::Constant(value) = &x.mode {
                    return match representable(value, kind, self.word_size()) {
                        Ok(v) => Ok((target, Some(v))),
                        Err(_) if x_kind.is_numeric() && kind.is_numeric() => {
                            if !x_kind.is_integer() && kind.is_integer() {
                                Err(ConversionError::Truncated)
                            } else {
                                Err(ConversionError::Overflows)
                            }
                        }
                        Err(_) => Err(ConversionError::Invalid),
                    };
                }
                let ok = match x_kind {
                    BasicKind::UntypedBool => kind.is_boolean(),
                    BasicKind::UntypedInt
                    | BasicKind::UntypedRune
                    | BasicKind::UntypedFloat
                    | BasicKind::UntypedComplex => kind.is_numeric(),
                    BasicKind::UntypedString => kind.is_string(),
                    _ => false,
                };
                if ok {
                    Ok((target, None))
                } else {
                    Err(ConversionError::Invalid)
                }
            }
            Type::Interface(_) => {
                if self.is_empty_interface(target) {
                    Ok((self.tcx.default_type(x.ty), None))
                } else {
                    Err(ConversionError::Invalid)
                }
            }
            _ => Err(ConversionError::Invalid),
        }
    }

    /// The larger of two untyped numeric kinds, or either one if they
    /// are the same kind.
    fn max_untyped(&self, a: TypeId, b: TypeId) -> Option<TypeId> {
        let (ka, kb) = (self.tcx.basic_kind(a)?, self.tcx.basic_kind(b)?);
        if ka == kb {
            return Some(a);
        }
        if ka.is_numeric() && kb.is_numeric() {
            return Some(if rank(ka) >= rank(kb) { a } else { b });
        }
        None
    }

    /// Convert an untyped operand to `target` in place, reporting failure.
    pub(crate) fn convert_untyped(&mut self, x: &mut Operand<'a>, target: TypeId) {
        match self.implicit_type(x, target) {
            Ok((ty, value)) => {
                if let Some(v) = value {
                    x.mode = Mode::Constant(v);
                }
                x.ty = ty;
            }
            Err(err) => {
                let d = self.describe(x);
                let ts = self.type_string(self.tcx.underlying(target));
                let message = match err {
                    ConversionError::Truncated => format!("{d} truncated to {ts}"),
                    ConversionError::Overflows => format!("{d} overflows {ts}"),
                    ConversionError::Invalid => format!("cannot convert {d} to type {ts}"),
                };
                self.error(x.pos, message);
                x.set_invalid();
            }
        }
    }

    // ========================================================================
    // Assignability
    // ========================================================================

    /// Whether `x` may be assigned to a variable of type `t`; the error
    /// carries an optional cause.
    pub(crate) fn assignable_to(&mut self, x: &Operand<'a>, t: TypeId) -> Result<(), String> {
        let v = x.ty;
        if x.is_invalid() || self.tcx.is_invalid(t) || self.tcx.identical(v, t) {
            return Ok(());
        }
        if self.tcx.contains_permissive(v) || self.tcx.contains_permissive(t) {
            return Ok(());
        }
        if self.tcx.is_untyped(v) {
            return self.implicit_type(x, t).map(|_| ()).map_err(|_| String::new());
        }

        let vu = self.tcx.underlying(v);
        let tu = self.tcx.underlying(t);
        if self.tcx.identical(vu, tu) && (!self.tcx.is_named(v) || !self.tcx.is_named(t)) {
            return Ok(());
        }

        let t_iface = self.tcx.is_interface(t);
        let t_iface_ptr = matches!(
            self.tcx.get(tu),
            Type::Pointer(base) if self.tcx.is_interface(*base),
        );
        if t_iface || t_iface_ptr {
            return self.implements(v, t);
        }

        if self.tcx.is_interface(v) && self.implements(t, v).is_ok() {
            return Err("need type assertion".to_string());
        }

        if let (Type::Chan { dir: vd, elem: ve }, Type::Chan { elem: te, .. }) = (
            self.tcx.get(vu),
            self.tcx.get(tu),
        ) {
            if *vd == ChanDir::Both
                && self.tcx.identical(*ve, *te)
                && (!self.tcx.is_named(v) || !self.tcx.is_named(t))
            {
                return Ok(());
            }
        }
        Err(String::new())
    }

    /// Check that `x` can be assigned to a variable of type `target`
    /// (`None` for the blank identifier), converting untyped values.
    pub(crate) fn assignment(
        &mut self,
        x: &mut Operand<'a>,
        target: Option<TypeId>,
        context: &str,
    ) {
        self.single_value(x);
        match x.mode {
            Mode::Invalid => return,
            Mode::Constant(_) | Mode::Variable | Mode::MapIndex | Mode::Value | Mode::CommaOk => {}
            _ => {
                let d = self.describe(x);
                let ts = target.map(|t| self.type_string(t)).unwrap_or_else(|| "_".to_string());
                self.error(x.pos, format!("cannot assign {d} to {ts} in {context}"));
                x.set_invalid();
                return;
            }
        }

        if self.tcx.is_untyped(x.ty) {
            let conv_target = if x.is_nil(&self.tcx) {
                match target {
                    Some(t) => t,
                    None => {
                        self.error(x.pos, format!("use of untyped nil in {context}"));
                        x.set_invalid();
                        return;
                    }
                }
            } else {
                match target {
                    Some(t) if !self.tcx.is_interface(t) || self.tcx.is_type_param(t) => t,
                    _ => self.tcx.default_type(x.ty),
                }
            };
            match self.implicit_type(x, conv_target) {
                Ok((ty, value)) => {
                    if let Some(v) = value {
                        x.mode = Mode::Constant(v);
                    }
                    x.ty = ty;
                }
                Err(err) => {
                    let d = self.describe(x);
                    let ts = self.type_string(conv_target);
                    let suffix = match err {
                        ConversionError::Truncated => " (truncated)",
                        ConversionError::Overflows => " (overflows)",
                        ConversionError::Invalid => "",
                    };
                    self.error(x.pos, format!("cannot use {d} as {ts} value in {context}{suffix}"));
                    x.set_invalid();
                    return;
                }
            }
        }

        let Some(target) = target else {
            return;
        };
        if let Err(cause) = self.assignable_to(x, target) {
            let d = self.describe(x);
            let ts = self.type_string(target);
            if cause.is_empty() {
                self.error(x.pos, format!("cannot use {d} as {ts} value in {context}"));
            } else {
                self.error(x.pos, format!("cannot use {d} as {ts} value in {context}: {cause}"));
            }
            x.set_invalid();
        }
    }

    // ========================================================================
    // Variable initialization
    // ========================================================================

    /// Initialize `obj` from `x`. Without a declared type the variable takes
    /// the (default) type of `x`.
    pub(crate) fn init_var(
        &mut self,
        obj: ObjId,
        declared: Option<TypeId>,
        x: &mut Operand<'a>,
        context: &str,
    ) {
        if x.is_invalid()
            || self.tcx.is_invalid(x.ty)
            || declared.is_some_and(|t| self.tcx.is_invalid(t))
        {
            if declared.is_none() {
                self.table.obj_mut(obj).ty = TypeId::INVALID;
            }
            x.set_invalid();
            return;
        }
        let target = match declared {
            Some(t) => t,
            None => {
                let mut ty = x.ty;
                if self.tcx.is_untyped(ty) {
                    if x.is_nil(&self.tcx) {
                        self.error(x.pos, format!("use of untyped nil in {context}"));
                        self.table.obj_mut(obj).ty = TypeId::INVALID;
                        x.set_invalid();
                        return;
                    }
                    ty = self.tcx.default_type(ty);
                }
                self.table.obj_mut(obj).ty = ty;
                ty
            }
        };
        self.assignment(x, Some(target), context);
    }

    /// Initialize several variables from `rhs`, which is either one
    /// expression per variable or a single multi-valued expression.
    pub(crate) fn init_vars(&mut self, lhs: &[(ObjId, Option<TypeId>)], rhs: &'a [Expr]) {
        let (l, r) = (lhs.len(), rhs.len());
        let is_call = r == 1 && matches!(rhs[0].unparen().kind, ExprKind::Call { .. });

        if l == r && !is_call {
            for (&(obj, declared), e) in lhs.iter().zip(rhs) {
                let mut x = self.expr(e);
                self.init_var(obj, declared, &mut x, "assignment");
            }
            return;
        }

        if r != 1 {
            if self.use_exprs(rhs) {
                self.assign_error(rhs, l, r);
            }
            self.invalidate_untyped_vars(lhs);
            return;
        }

        let values = self.multi_expr(&rhs[0], l, l == 2);
        if values.len() == l {
            for (&(obj, declared), mut x) in lhs.iter().zip(values) {
                self.init_var(obj, declared, &mut x, "assignment");
            }
            return;
        }
        if values.first().is_some_and(|v| !v.is_invalid()) {
            self.assign_error(rhs, l, values.len());
        }
        self.invalidate_untyped_vars(lhs);
    }

    fn invalidate_untyped_vars(&mut self, lhs: &[(ObjId, Option<TypeId>)]) {
        for &(obj, declared) in lhs {
            if declared.is_none() {
                self.table.obj_mut(obj).ty = TypeId::INVALID;
            }
        }
    }

    fn assign_error(&mut self, rhs: &'a [Expr], l: usize, r: usize) {
        let vars = measure(l, "variable");
        let vals = measure(r, "value");
        let Some(first) = rhs.first() else {
            return;
        };
        if rhs.len() == 1 {
            if let ExprKind::Call { func, .. } = &first.unparen().kind {
                self.error(
                    first.pos,
                    format!("assignment mismatch: {vars} but {func} returns {vals}"),
                );
                return;
            }
        }
        self.error(first.pos, format!("assignment mismatch: {vars} but {vals}"));
    }

    // ========================================================================
    // Assignment statements
    // ========================================================================

    /// Type of an assignment target; `None` for the blank identifier.
    fn lhs_var(&mut self, lhs: &'a Expr) -> Option<TypeId> {
        let ident = lhs.unparen().as_ident();
        if ident == Some("_") {
            return None;
        }
        // Assigning to a variable does not count as using it.
        let restore = ident
            .and_then(|name| self.lookup(name))
            .and_then(|obj| match self.table.obj(obj).kind {
                ObjKind::Var { used, .. } => Some((obj, used)),
                _ => None,
            });
        let x = self.expr(lhs);
        if let Some((obj, was_used)) = restore {
            if let ObjKind::Var { used, .. } = &mut self.table.obj_mut(obj).kind {
                *used = was_used;
            }
        }

        match x.mode {
            Mode::Invalid => Some(TypeId::INVALID),
            Mode::Variable | Mode::MapIndex => Some(x.ty),
            _ => {
                let target = lhs.unparen();
                if self.map_fields.contains(&(target as *const Expr as usize)) {
                    self.error(x.pos, format!("cannot assign to struct field {target} in map"));
                } else {
                    self.error(
                        x.pos,
                        format!(
                            "cannot assign to {lhs} \
                             (neither addressable nor a map index expression)"
                        ),
                    );
                }
                Some(TypeId::INVALID)
            }
        }
    }

    /// Check `lhs = x` for an already evaluated `x`.
    pub(super) fn assign_var(&mut self, lhs: &'a Expr, x: &mut Operand<'a>, context: &str) {
        let target = self.lhs_var(lhs);
        if target.is_some_and(|t| self.tcx.is_invalid(t)) {
            x.set_invalid();
            return;
        }
        let context = if target.is_none() && context == "assignment" {
            "assignment to _ identifier"
        } else {
            context
        };
        self.assignment(x, target, context);
    }

    /// Check `lhs = rhs`.
    fn assign_var_expr(&mut self, lhs: &'a Expr, rhs: &'a Expr) {
        let target = self.lhs_var(lhs);
        if target.is_some_and(|t| self.tcx.is_invalid(t)) {
            self.use_exprs(std::slice::from_ref(rhs));
            return;
        }
        let mut x = self.expr(rhs);
        let context = if target.is_none() {
            "assignment to _ identifier"
        } else {
            "assignment"
        };
        self.assignment(&mut x, target, context);
    }

    pub(crate) fn assign_vars(&mut self, lhs: &'a [Expr], rhs: &'a [Expr]) {
        let (l, r) = (lhs.len(), rhs.len());
        let is_call = r == 1 && matches!(rhs[0].unparen().kind, ExprKind::Call { .. });

        if l == r && !is_call {
            for (target, value) in lhs.iter().zip(rhs) {
                self.assign_var_expr(target, value);
            }
            return;
        }

        if r != 1 {
            let ok_lhs = self.use_lhs(lhs);
            let ok_rhs = self.use_exprs(rhs);
            if ok_lhs && ok_rhs {
                self.assign_error(rhs, l, r);
            }
            return;
        }

        let values = self.multi_expr(&rhs[0], l, l == 2);
        if values.len() == l {
            for (target, mut x) in lhs.iter().zip(values) {
                self.assign_var(target, &mut x, "assignment");
            }
            return;
        }
        if values.first().is_some_and(|v| !v.is_invalid()) {
            self.assign_error(rhs, l, values.len());
        }
        self.use_lhs(lhs);
    }

    /// `x op= y`.
    pub(crate) fn assign_op(
        &mut self,
        lhs: &'a [Expr],
        op: TokenKind,
        op_pos: Pos,
        rhs: &'a [Expr],
    ) {
        let (Some(target), Some(value), 1, 1) = (lhs.first(), rhs.first(), lhs.len(), rhs.len())
        else {
            self.error(
                op_pos,
                format!("assignment operation {op} requires single-valued expressions"),
            );
            return;
        };
        let mut x = self.binary(None, target, value, op.without_assign(), op_pos);
        if x.is_invalid() {
            return;
        }
        self.assign_var(target, &mut x, "assignment operation");
    }

    /// `x++` and `x--`.
    pub(crate) fn inc_dec(&mut self, e: &'a Expr, inc: bool) {
        let mut x = self.expr(e);
        if x.is_invalid() {
            return;
        }
        let numeric = self.tcx.is_permissive(x.ty)
            || self.tcx.basic_kind(x.ty).is_some_and(BasicKind::is_numeric);
        if !numeric {
            let op = if inc { "++" } else { "--" };
            let ts = self.type_string(x.ty);
            self.error(e.pos, format!("invalid operation: {e}{op} (non-numeric type {ts})"));
            return;
        }
        self.assign_var(e, &mut x, "assignment");
    }

    pub(crate) fn short_var_decl(&mut self, pos: Pos, lhs: &'a [Expr], rhs: &'a [Expr]) {
        let scope = self.scope;
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        let mut targets: Vec<(ObjId, Option<TypeId>)> = Vec::with_capacity(lhs.len());
        let mut new_vars = Vec::new();
        let mut has_err = false;

        for e in lhs {
            let Some(name) = e.as_ident() else {
                self.use_lhs(std::slice::from_ref(e));
                self.error(e.pos, format!("non-name {e} on left side of :="));
                has_err = true;
                targets.push((self.new_var(&Ident::new("_", e.pos), TypeId::INVALID), None));
                continue;
            };
            if name != "_" && !seen.insert(name) {
                self.error(e.pos, format!("{name} repeated on left side of :="));
                has_err = true;
                targets.push((self.new_var(&Ident::new("_", e.pos), TypeId::INVALID), None));
                continue;
            }
            if let Some(alt) = self.table.lookup_local(scope, name) {
                if self.table.obj(alt).is_var() {
                    let ty = self.table.obj(alt).ty;
                    targets.push((alt, Some(ty)));
                } else {
                    self.error(e.pos, format!("cannot assign to {e}"));
                    has_err = true;
                    targets.push((self.new_var(&Ident::new("_", e.pos), TypeId::INVALID), None));
                }
                continue;
            }
            let obj = self.new_var(&Ident::new(name, e.pos), TypeId::INVALID);
            targets.push((obj, None));
            if name != "_" {
                new_vars.push(obj);
            }
        }

        self.init_vars(&targets, rhs);

        if new_vars.is_empty() && !has_err {
            self.error(pos, "no new variables on left side of :=");
            return;
        }
        for obj in new_vars {
            self.declare_local(obj);
        }
    }

    // ========================================================================
    // Return statements
    // ========================================================================

    pub(crate) fn return_stmt(&mut self, pos: Pos, results: &'a [Expr]) {
        let Some(want) = self.ctx.results.clone() else {
            return;
        };
        if results.is_empty() && (want.is_empty() || self.ctx.named_results) {
            return;
        }
        let (l, r) = (want.len(), results.len());
        let is_call = r == 1 && matches!(results[0].unparen().kind, ExprKind::Call { .. });

        if l == r && !is_call {
            for (e, &t) in results.iter().zip(&want) {
                let mut x = self.expr(e);
                self.assignment(&mut x, Some(t), "return statement");
            }
            return;
        }

        if r != 1 {
            if self.use_exprs(results) {
                let positions: Vec<Pos> = results.iter().map(|e| e.pos).collect();
                self.return_error(pos, l, &positions);
            }
            return;
        }

        let values = self.multi_expr(&results[0], l, false);
        if values.len() == l {
            for (mut x, &t) in values.into_iter().zip(&want) {
                self.assignment(&mut x, Some(t), "return statement");
            }
            return;
        }
        if values.first().is_some_and(|v| !v.is_invalid()) {
            let positions: Vec<Pos> = values.iter().map(|v| v.pos).collect();
            self.return_error(pos, l, &positions);
        }
    }

    fn return_error(&mut self, pos: Pos, l: usize, values: &[Pos]) {
        let r = values.len();
        let (at, qualifier) = if r > l {
            (values[l], "too many")
        } else if r > 0 {
            (values[r - 1], "not enough")
        } else {
            (pos, "not enough")
        };
        self.error(at, format!("{qualifier} return values"));
    }

    // ========================================================================
    // Evaluation for effect
    // ========================================================================

    /// Evaluate expressions whose values are not needed; report whether
    /// all of them were valid.
    pub(crate) fn use_exprs(&mut self, exprs: &'a [Expr]) -> bool {
        let mut ok = true;
        for e in exprs {
            let x = self.raw_expr(e, None);
            ok &= !x.is_invalid();
        }
        ok
    }

    /// Like [`Self::use_exprs`], but assigning targets are not marked used.
    pub(crate) fn use_lhs(&mut self, exprs: &'a [Expr]) -> bool {
        let mut ok = true;
        for e in exprs {
            let ident = e.unparen().as_ident();
            if ident == Some("_") {
                continue;
            }
            let restore = ident
                .and_then(|name| self.lookup(name))
                .and_then(|obj| match self.table.obj(obj).kind {
                    ObjKind::Var { used, .. } => Some((obj, used)),
                    _ => None,
                });
            let x = self.raw_expr(e, None);
            if let Some((obj, was_used)) = restore {
                if let ObjKind::Var { used, .. } = &mut self.table.obj_mut(obj).kind {
                    *used = was_used;
                }
            }
            ok &= !x.is_invalid();
        }
        ok
    }
}

/// Order of untyped numeric kinds: int < rune < float < complex.
fn rank(kind: BasicKind) -> u8 {
    match kind {
        BasicKind::UntypedInt => 0,
        BasicKind::UntypedRune => 1,
        BasicKind::UntypedFloat => 2,
        BasicKind::UntypedComplex => 3,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure() {
        assert_eq!(measure(1, "variable"), "1 variable");
        assert_eq!(measure(2, "value"), "2 values");
        assert_eq!(measure(0, "value"), "0 values");
    }

    #[test]
    fn test_rank_orders_untyped_kinds() {
        assert!(rank(BasicKind::UntypedFloat) > rank(BasicKind::UntypedRune));
        assert!(rank(BasicKind::UntypedComplex) > rank(BasicKind::UntypedFloat));
    }
}
