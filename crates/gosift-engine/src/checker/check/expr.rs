//! Expressions: identifiers, literals, operators, indexing and slicing.

use rustc_hash::FxHashSet;

use crate::checker::constant::{
    binary_op, compare, representable, shift, unary_op, ConstValue, ReprError,
};
use crate::checker::objects::{ObjKind, ObjState};
use crate::checker::types::{BasicKind, Type, TypeId};
use crate::parser::ast::{Block, ChanDir, Expr, ExprKind, FuncType, LitKind};
use crate::parser::{Pos, TokenKind};

use super::{Checker, FuncInfo, Mode, Operand};

/// Largest constant shift count; enough to express the smallest float64.
const MAX_SHIFT: i128 = 1023 - 1 + 52;

fn is_comparison(op: TokenKind) -> bool {
    use TokenKind::*;
    matches!(op, Eql | Neq | Lss | Leq | Gtr | Geq)
}

fn is_shift(op: TokenKind) -> bool {
    matches!(op, TokenKind::Shl | TokenKind::Shr)
}

impl<'a> Checker<'a> {
    // ========================================================================
    // Entry points
    // ========================================================================

    /// Evaluate `e`, which must denote a single value.
    pub(crate) fn expr(&mut self, e: &'a Expr) -> Operand<'a> {
        let mut x = self.raw_expr(e, None);
        self.exclude(&mut x, false);
        self.single_value(&mut x);
        x
    }

    /// Like [`Self::expr`]. `hint` is the element type of the enclosing
    /// composite literal, for literals whose type is elided.
    pub(crate) fn expr_with_hint(&mut self, e: &'a Expr, hint: TypeId) -> Operand<'a> {
        let mut x = self.raw_expr(e, Some(hint));
        self.exclude(&mut x, false);
        self.single_value(&mut x);
        x
    }

    /// Evaluate `e`, which may denote a value or a type.
    pub(crate) fn expr_or_type(&mut self, e: &'a Expr) -> Operand<'a> {
        let mut x = self.raw_expr(e, None);
        self.exclude(&mut x, true);
        self.single_value(&mut x);
        x
    }

    /// Evaluate an expression that may have several values: a call with
    /// several results or, if `comma_ok` is set, a map index, receive or
    /// type assertion with its extra boolean. A call of an opaque function
    /// yields as many values as wanted.
    pub(crate) fn multi_expr(
        &mut self,
        e: &'a Expr,
        want: usize,
        comma_ok: bool,
    ) -> Vec<Operand<'a>> {
        let mut x = self.raw_expr(e, None);
        self.exclude(&mut x, false);
        if x.is_invalid() {
            return vec![x];
        }
        if let Type::Tuple(items) = self.tcx.get(x.ty) {
            let items = items.clone();
            return items.into_iter().map(|ty| Operand::new(Mode::Value, ty, e)).collect();
        }
        let permissive = self.tcx.is_permissive(x.ty);
        if permissive && want > 1 && matches!(e.unparen().kind, ExprKind::Call { .. }) {
            return (0..want).map(|_| Operand::new(Mode::Value, TypeId::OPAQUE, e)).collect();
        }
        let with_ok = comma_ok && (permissive || matches!(x.mode, Mode::MapIndex | Mode::CommaOk));
        let mut values = vec![x];
        if with_ok {
            let ok = self.tcx.basic(BasicKind::UntypedBool);
            values.push(Operand::new(Mode::Value, ok, e));
        }
        values
    }

    /// Reject operands that are not values (or types, if allowed).
    fn exclude(&mut self, x: &mut Operand<'a>, allow_type: bool) {
        let message = match x.mode {
            Mode::NoValue if allow_type => "used as value or type",
            Mode::NoValue => "used as value",
            Mode::Builtin(_) => "must be called",
            Mode::TypeExpr if !allow_type => "is not an expression",
            _ => return,
        };
        let d = self.describe(x);
        self.error(x.pos, format!("{d} {message}"));
        x.set_invalid();
    }

    pub(crate) fn single_value(&mut self, x: &mut Operand<'a>) {
        if x.mode == Mode::Value && matches!(self.tcx.get(x.ty), Type::Tuple(_)) {
            let d = self.describe(x);
            self.error(x.pos, format!("multiple-value {d} in single-value context"));
            x.set_invalid();
        }
    }

    /// Evaluate `e` without restricting what it may denote.
    pub(crate) fn raw_expr(&mut self, e: &'a Expr, hint: Option<TypeId>) -> Operand<'a> {
        if self.halted() {
            return Operand::invalid(e);
        }
        let mut x = self.expr_kind(e, hint);
        x.expr = Some(e);
        x.pos = e.pos;
        x
    }

    fn expr_kind(&mut self, e: &'a Expr, hint: Option<TypeId>) -> Operand<'a> {
        match &e.kind {
            ExprKind::Bad => Operand::invalid(e),
            ExprKind::Ident(name) => self.ident(e, name),
            ExprKind::BasicLit { kind, value } => {
                let basic = match kind {
                    LitKind::Int => BasicKind::UntypedInt,
                    LitKind::Float => BasicKind::UntypedFloat,
                    LitKind::Imag => BasicKind::UntypedComplex,
                    LitKind::Char => BasicKind::UntypedRune,
                    LitKind::String => BasicKind::UntypedString,
                };
                let ty = self.tcx.basic(basic);
                Operand::new(Mode::Constant(ConstValue::from_literal(*kind, value)), ty, e)
            }
            ExprKind::FuncLit { ty, body } => self.func_lit(e, ty, body),
            ExprKind::CompositeLit { ty, elts } => self.composite_lit(e, ty.as_deref(), elts, hint),
            ExprKind::KeyValue { .. } => {
                self.error(e.pos, "no key:value expected");
                Operand::invalid(e)
            }
            ExprKind::Paren(inner) => self.raw_expr(inner, hint),
            ExprKind::Selector { x, sel } => self.selector(e, x, sel),
            ExprKind::Index { x, indices } => self.index_expr(e, x, indices),
            ExprKind::Slice {
                x,
                low,
                high,
                max,
                three,
            } => self.slice_expr(e, x, [low.as_deref(), high.as_deref(), max.as_deref()], *three),
            ExprKind::TypeAssert { x, ty } => self.type_assert(e, x, ty.as_deref()),
            ExprKind::Call { func, args, ellipsis } => self.call(e, func, args, *ellipsis),
            ExprKind::Star(inner) => self.star(e, inner),
            ExprKind::Unary { op, x } => self.unary(e, *op, x),
            ExprKind::Binary { op, op_pos, x, y } => self.binary(Some(e), x, y, *op, *op_pos),
            ExprKind::ArrayType { .. }
            | ExprKind::SliceType(_)
            | ExprKind::StructType(_)
            | ExprKind::FuncType(_)
            | ExprKind::InterfaceType(_)
            | ExprKind::MapType { .. }
            | ExprKind::ChanType { .. } => {
                let ty = self.type_expr(e);
                if self.tcx.is_invalid(ty) {
                    Operand::invalid(e)
                } else {
                    Operand::new(Mode::TypeExpr, ty, e)
                }
            }
            ExprKind::Ellipsis(_) => {
                self.error(e.pos, "invalid use of '...'");
                Operand::invalid(e)
            }
        }
    }

    // ========================================================================
    // Identifiers
    // ========================================================================

    fn ident(&mut self, e: &'a Expr, name: &str) -> Operand<'a> {
        if name == "_" {
            self.error(e.pos, "cannot use _ as value");
            return Operand::invalid(e);
        }
        let Some(obj) = self.lookup(name) else {
            if self.in_opaque_dot_scope() {
                return Operand::new(Mode::Variable, TypeId::OPAQUE, e);
            }
            self.error(e.pos, format!("undefined: {name}"));
            return Operand::invalid(e);
        };

        if obj == self.universe.iota {
            return match self.iota.clone() {
                Some(value) => Operand::new(
                    Mode::Constant(value),
                    self.tcx.basic(BasicKind::UntypedInt),
                    e,
                ),
                None => {
                    self.error(e.pos, "cannot use iota outside constant declaration");
                    Operand::invalid(e)
                }
            };
        }

        match self.table.obj(obj).kind {
            ObjKind::TypeName => {
                let ty = self.type_name_type(obj);
                return if self.tcx.is_invalid(ty) {
                    Operand::invalid(e)
                } else {
                    Operand::new(Mode::TypeExpr, ty, e)
                };
            }
            ObjKind::PkgName { .. } => {
                self.mark_used(obj);
                self.error(e.pos, format!("use of package {name} not in selector"));
                return Operand::invalid(e);
            }
            ObjKind::Builtin(b) => return Operand::new(Mode::Builtin(b), TypeId::INVALID, e),
            ObjKind::Nil => return Operand::new(
                Mode::Value,
                self.tcx.basic(BasicKind::UntypedNil),
                e,
            ),
            ObjKind::Member => return Operand::new(Mode::Variable, TypeId::OPAQUE, e),
            _ => {}
        }

        match self.table.obj(obj).state {
            ObjState::Unresolved => self.resolve_obj(obj),
            ObjState::Resolving if !matches!(self.table.obj(obj).kind, ObjKind::Func) => {
                self.resolve_obj(obj);
                return Operand::invalid(e);
            }
            _ => {}
        }

        let object = self.table.obj(obj);
        let ty = object.ty;
        let mode = match &object.kind {
            ObjKind::Const(value) => Mode::Constant(value.clone()),
            ObjKind::Var { .. } => Mode::Variable,
            _ => Mode::Value,
        };
        if mode == Mode::Variable {
            self.mark_used(obj);
        }
        if self.tcx.is_invalid(ty) {
            return Operand::invalid(e);
        }
        Operand::new(mode, ty, e)
    }

    // ========================================================================
    // Literals
    // ========================================================================

    fn func_lit(&mut self, e: &'a Expr, ty: &'a FuncType, body: &'a Block) -> Operand<'a> {
        let (params, results, variadic) = self.signature_of(ty);
        let sig = self.make_signature(&params, &results, variadic);
        let info = FuncInfo {
            scope: self.scope,
            params,
            results,
            sig,
        };
        self.func_body(&info, body);
        Operand::new(Mode::Value, sig, e)
    }

    fn composite_lit(
        &mut self,
        e: &'a Expr,
        ty: Option<&'a Expr>,
        elts: &'a [Expr],
        hint: Option<TypeId>,
    ) -> Operand<'a> {
        let (typ, base, is_elem) = match (ty, hint) {
            (Some(ty), _) => {
                if let ExprKind::ArrayType { len: None, elem } = &ty.kind {
                    // [...]T takes its length from the literal.
                    let elem = self.type_expr(elem);
                    let n = self.indexed_elts(elts, elem, None);
                    let typ = self.tcx.intern(Type::Array { len: Some(n), elem });
                    return Operand::new(Mode::Value, typ, e);
                }
                let typ = self.type_expr(ty);
                (typ, typ, false)
            }
            (None, Some(hint)) => {
                let base = match self.tcx.under(hint) {
                    Type::Pointer(base) => *base,
                    _ => hint,
                };
                (hint, base, true)
            }
            (None, None) => {
                self.error(e.pos, "missing type in composite literal");
                (TypeId::INVALID, TypeId::INVALID, false)
            }
        };

        match self.tcx.under(base).clone() {
            Type::Struct(fields) => self.struct_lit(e, base, &fields, elts),
            Type::Array { len, elem } => {
                self.indexed_elts(elts, elem, len);
            }
            Type::Slice(elem) => {
                self.indexed_elts(elts, elem, None);
            }
            Type::Map { key, value } => self.map_lit(elts, key, value),
            _ => {
                self.use_elts(elts);
                if self.tcx.is_invalid(typ) {
                    return Operand::invalid(e);
                }
                if !self.tcx.is_permissive(base) {
                    let qualifier = if is_elem { " element" } else { "" };
                    let ts = self.type_string(typ);
                    self.error(e.pos, format!("invalid composite literal{qualifier} type {ts}"));
                    return Operand::invalid(e);
                }
            }
        }
        Operand::new(Mode::Value, typ, e)
    }

    fn use_elts(&mut self, elts: &'a [Expr]) {
        for elt in elts {
            let value = match &elt.kind {
                ExprKind::KeyValue { value, .. } => value.as_ref(),
                _ => elt,
            };
            self.raw_expr(value, None);
        }
    }

    fn struct_lit(
        &mut self,
        e: &'a Expr,
        base: TypeId,
        fields: &[crate::checker::types::Field],
        elts: &'a [Expr],
    ) {
        let Some(first) = elts.first() else {
            return;
        };
        if matches!(first.kind, ExprKind::KeyValue { .. }) {
            let mut seen = FxHashSet::default();
            for elt in elts {
                let ExprKind::KeyValue { key, value } = &elt.kind else {
                    self.error(
                        elt.pos,
                        "mixture of field:value and value elements in struct literal",
                    );
                    continue;
                };
                let mut x = self.expr(value);
                let Some(name) = key.as_ident() else {
                    self.error(elt.pos, format!("invalid field name {key} in struct literal"));
                    continue;
                };
                let Some(index) = fields.iter().position(|f| f.name == name) else {
                    let ts = self.type_string(base);
                    self.error(
                        key.pos,
                        format!("unknown field {name} in struct literal of type {ts}"),
                    );
                    continue;
                };
                self.assignment(&mut x, Some(fields[index].ty), "struct literal");
                if !seen.insert(index) {
                    self.error(x.pos, format!("duplicate field name {name} in struct literal"));
                }
            }
            return;
        }

        for (i, elt) in elts.iter().enumerate() {
            if matches!(elt.kind, ExprKind::KeyValue { .. }) {
                self.error(elt.pos, "mixture of field:value and value elements in struct literal");
                continue;
            }
            let mut x = self.expr(elt);
            let Some(field) = fields.get(i) else {
                let ts = self.type_string(base);
                self.error(x.pos, format!("too many values in struct literal of type {ts}"));
                break;
            };
            self.assignment(&mut x, Some(field.ty), "struct literal");
        }
        if elts.len() < fields.len() {
            let ts = self.type_string(base);
            self.error(e.pos, format!("too few values in struct literal of type {ts}"));
        }
    }

    /// Check the elements of an array or slice literal and return the
    /// literal's length.
    fn indexed_elts(&mut self, elts: &'a [Expr], elem: TypeId, len: Option<u64>) -> u64 {
        let length = len.map(i128::from);
        let mut visited = FxHashSet::default();
        let mut index: i128 = 0;
        let mut max: i128 = 0;
        for elt in elts {
            let mut valid = false;
            let value = match &elt.kind {
                ExprKind::KeyValue { key, value } => {
                    match self.index(key, length) {
                        Some(Some(i)) => {
                            index = i;
                            valid = true;
                        }
                        Some(None) => self.error(
                            elt.pos,
                            format!("index {key} must be integer constant"),
                        ),
                        None => {}
                    }
                    value.as_ref()
                }
                _ => {
                    match length {
                        Some(n) if index >= n => {
                            self.error(elt.pos, format!("index {index} is out of bounds (>= {n})"));
                        }
                        _ => valid = true,
                    }
                    elt
                }
            };
            if valid && !visited.insert(index) {
                self.error(elt.pos, format!("duplicate index {index} in array or slice literal"));
            }
            index += 1;
            max = max.max(index);

            let mut x = self.expr_with_hint(value, elem);
            self.assignment(&mut x, Some(elem), "array or slice literal");
        }
        max as u64
    }

    fn map_lit(&mut self, elts: &'a [Expr], key: TypeId, value: TypeId) {
        let key_is_interface = self.tcx.is_interface(key);
        let mut seen: Vec<(ConstValue, TypeId)> = Vec::new();
        for elt in elts {
            let ExprKind::KeyValue { key: k, value: v } = &elt.kind else {
                self.error(elt.pos, "missing key in map literal");
                continue;
            };
            let mut x = self.expr_with_hint(k, key);
            self.assignment(&mut x, Some(key), "map literal");
            if let Mode::Constant(val) = &x.mode {
                if !val.is_unknown() {
                    let duplicate = seen
                        .iter()
                        .any(|(seen_val, ty)| {
                            seen_val == val
                                && (!key_is_interface || self.tcx.identical(*ty, x.ty))
                        });
                    if duplicate {
                        self.error(x.pos, format!("duplicate key {val} in map literal"));
                        continue;
                    }
                    seen.push((val.clone(), x.ty));
                }
            }
            let mut y = self.expr_with_hint(v, value);
            self.assignment(&mut y, Some(value), "map literal");
        }
    }

    // ========================================================================
    // Indexing and slicing
    // ========================================================================

    /// Check an index against an optional exclusive bound. `None` if the
    /// index is invalid, `Some(None)` if it is not a known constant.
    pub(super) fn index(&mut self, e: &'a Expr, max: Option<i128>) -> Option<Option<i128>> {
        let mut x = self.expr(e);
        if !self.valid_index(&mut x, "index", false) {
            return None;
        }
        let Mode::Constant(value) = &x.mode else {
            return Some(None);
        };
        let v = value.as_int()?;
        if let Some(max) = max.filter(|m| v >= *m) {
            self.error(x.pos, format!("invalid argument: index {v} out of bounds [0:{max}]"));
            return None;
        }
        Some(Some(v))
    }

    /// An index, length or capacity must be an integer; constants must be
    /// representable as `int` and, unless allowed, non-negative.
    pub(super) fn valid_index(
        &mut self,
        x: &mut Operand<'a>,
        what: &str,
        allow_negative: bool,
    ) -> bool {
        if x.is_invalid() {
            return false;
        }
        let int = self.tcx.basic(BasicKind::Int);
        self.convert_untyped(x, int);
        if x.is_invalid() {
            return false;
        }
        if !self.all(x.ty, BasicKind::is_integer) {
            let d = self.describe(x);
            self.error(x.pos, format!("invalid argument: {what} {d} must be integer"));
            return false;
        }
        if let Mode::Constant(value) = &x.mode {
            let problem = if !allow_negative && value.is_negative() {
                Some("must not be negative")
            } else if representable(value, BasicKind::Int, self.word_size()).is_err() {
                Some("overflows int")
            } else {
                None
            };
            if let Some(problem) = problem {
                let d = self.describe(x);
                self.error(x.pos, format!("invalid argument: {what} {d} {problem}"));
                return false;
            }
        }
        true
    }

    fn single_index(&mut self, pos: Pos, indices: &'a [Expr]) -> Option<&'a Expr> {
        match indices {
            [] => {
                self.error(pos, "expected operand");
                None
            }
            [index] => Some(index),
            [_, second, ..] => {
                self.error(second.pos, "invalid operation: more than one index");
                None
            }
        }
    }

    fn index_expr(&mut self, e: &'a Expr, x_expr: &'a Expr, indices: &'a [Expr]) -> Operand<'a> {
        let x = self.expr_or_type(x_expr);
        match x.mode {
            Mode::Invalid => {
                self.use_exprs(indices);
                return Operand::invalid(e);
            }
            Mode::TypeExpr => {
                let ty = self.type_expr(e);
                return if self.tcx.is_invalid(ty) {
                    Operand::invalid(e)
                } else {
                    Operand::new(Mode::TypeExpr, ty, e)
                };
            }
            _ => {}
        }
        if self.tcx.is_permissive(x.ty) {
            self.use_exprs(indices);
            return Operand::new(Mode::Variable, TypeId::OPAQUE, e);
        }
        if matches!(self.tcx.under(x.ty), Type::Func(_)) && self.tcx.contains_permissive(x.ty) {
            // Instantiation of a generic function.
            for index in indices {
                self.type_expr(index);
            }
            return Operand::new(Mode::Value, x.ty, e);
        }

        let mut length: Option<i128> = None;
        let result = match self.tcx.under(x.ty).clone() {
            Type::Basic(kind) if kind.is_string() => {
                if let Mode::Constant(ConstValue::String(s)) = &x.mode {
                    length = Some(s.len() as i128);
                }
                Some((Mode::Value, self.tcx.basic(BasicKind::Byte)))
            }
            Type::Array { len, elem } => {
                length = len.map(i128::from);
                let mode = if x.mode == Mode::Variable { Mode::Variable } else { Mode::Value };
                Some((mode, elem))
            }
            Type::Pointer(base) => match self.tcx.under(base) {
                Type::Array { len, elem } => {
                    length = len.map(i128::from);
                    Some((Mode::Variable, *elem))
                }
                _ => None,
            },
            Type::Slice(elem) => Some((Mode::Variable, elem)),
            Type::Map { key, value } => {
                let Some(index) = self.single_index(e.pos, indices) else {
                    return Operand::invalid(e);
                };
                let mut k = self.expr(index);
                self.assignment(&mut k, Some(key), "map index");
                return Operand::new(Mode::MapIndex, value, e);
            }
            _ => None,
        };
        let Some((mode, ty)) = result else {
            let d = self.describe(&x);
            self.error(x.pos, format!("invalid operation: cannot index {d}"));
            self.use_exprs(indices);
            return Operand::invalid(e);
        };
        let Some(index) = self.single_index(e.pos, indices) else {
            return Operand::invalid(e);
        };
        self.index(index, length);
        Operand::new(mode, ty, e)
    }

    fn slice_expr(
        &mut self,
        e: &'a Expr,
        x_expr: &'a Expr,
        bounds: [Option<&'a Expr>; 3],
        three: bool,
    ) -> Operand<'a> {
        let x = self.expr(x_expr);
        let use_bounds = |this: &mut Self| {
            for bound in bounds.iter().flatten() {
                this.raw_expr(bound, None);
            }
        };
        if x.is_invalid() {
            use_bounds(self);
            return Operand::invalid(e);
        }
        if self.tcx.is_permissive(x.ty) {
            use_bounds(self);
            return Operand::new(Mode::Value, x.ty, e);
        }

        let mut length: Option<i128> = None;
        let result = match self.tcx.under(x.ty).clone() {
            Type::Basic(kind) if kind.is_string() => {
                if three {
                    let at = bounds[2].unwrap_or(e);
                    self.error(at.pos, "invalid operation: 3-index slice of string");
                    return Operand::invalid(e);
                }
                if let Mode::Constant(ConstValue::String(s)) = &x.mode {
                    length = Some(s.len() as i128);
                }
                if self.tcx.is_untyped(x.ty) {
                    Some(self.tcx.basic(BasicKind::String))
                } else {
                    Some(x.ty)
                }
            }
            Type::Array { len, elem } => {
                if x.mode != Mode::Variable {
                    let d = self.describe(&x);
                    self.error(
                        x.pos,
                        format!("invalid operation: cannot slice {d} (value not addressable)"),
                    );
                    return Operand::invalid(e);
                }
                length = len.map(i128::from);
                Some(self.tcx.slice(elem))
            }
            Type::Pointer(base) => match self.tcx.under(base).clone() {
                Type::Array { len, elem } => {
                    length = len.map(i128::from);
                    Some(self.tcx.slice(elem))
                }
                _ => None,
            },
            Type::Slice(_) => Some(x.ty),
            _ => None,
        };
        let Some(ty) = result else {
            let d = self.describe(&x);
            self.error(x.pos, format!("cannot slice {d}"));
            return Operand::invalid(e);
        };

        if three && (bounds[1].is_none() || bounds[2].is_none()) {
            self.error(e.pos, "2nd and 3rd index required in 3-index slice");
            return Operand::invalid(e);
        }

        let mut ind: [Option<i128>; 3] = [None; 3];
        for (i, bound) in bounds.iter().enumerate() {
            ind[i] = match bound {
                Some(b) => self.index(b, length.map(|n| n + 1)).flatten(),
                None if i == 0 => Some(0),
                None => length,
            };
        }
        'outer: for i in 0..2 {
            let Some(lo) = ind[i].filter(|v| *v > 0) else {
                continue;
            };
            for j in i + 1..3 {
                if let Some(hi) = ind[j].filter(|v| *v < lo) {
                    let at = bounds[j].map_or(e.pos, |b| b.pos);
                    self.error(at, format!("invalid slice indices: {hi} < {lo}"));
                    break 'outer;
                }
            }
        }
        Operand::new(Mode::Value, ty, e)
    }

    // ========================================================================
    // Type assertions
    // ========================================================================

    fn type_assert(&mut self, e: &'a Expr, x_expr: &'a Expr, ty: Option<&'a Expr>) -> Operand<'a> {
        let x = self.expr(x_expr);
        if x.is_invalid() {
            return Operand::invalid(e);
        }
        let Some(ty) = ty else {
            self.error(e.pos, "use of .(type) outside type switch");
            return Operand::invalid(e);
        };
        if self.tcx.is_type_param(x.ty) {
            let d = self.describe(&x);
            self.error(
                x.pos,
                format!("invalid operation: cannot use type assertion on type parameter value {d}"),
            );
            return Operand::invalid(e);
        }
        if !self.tcx.is_permissive(x.ty) && !self.tcx.is_interface(x.ty) {
            let d = self.describe(&x);
            self.error(x.pos, format!("invalid operation: {d} is not an interface"));
            return Operand::invalid(e);
        }
        let t = self.type_expr(ty);
        if self.tcx.is_invalid(t) {
            return Operand::invalid(e);
        }
        self.type_assertion(e, &x, t, false);
        Operand::new(Mode::CommaOk, t, e)
    }

    /// Report an assertion of `x` to `t` that can never succeed.
    pub(super) fn type_assertion(&mut self, e: &Expr, x: &Operand<'a>, t: TypeId, in_switch: bool) {
        if self.tcx.is_permissive(x.ty)
            || self.tcx.contains_permissive(t)
            || self.tcx.is_interface(t)
        {
            return;
        }
        if self.missing_method(t, x.ty).is_ok() {
            return;
        }
        if in_switch {
            self.error(e.pos, format!("impossible type switch case: {e}"));
        } else {
            self.error(e.pos, format!("impossible type assertion: {e}"));
        }
    }

    // ========================================================================
    // Operators
    // ========================================================================

    /// Whether every operation on `ty` must be accepted or `ty` is a basic
    /// type satisfying `pred`.
    pub(super) fn all(&self, ty: TypeId, pred: fn(BasicKind) -> bool) -> bool {
        self.tcx.is_permissive(ty) || self.tcx.basic_kind(ty).is_some_and(pred)
    }

    fn star(&mut self, e: &'a Expr, inner: &'a Expr) -> Operand<'a> {
        let x = self.expr_or_type(inner);
        match x.mode {
            Mode::Invalid => Operand::invalid(e),
            Mode::TypeExpr => {
                let ty = self.tcx.pointer(x.ty);
                Operand::new(Mode::TypeExpr, ty, e)
            }
            _ if self.tcx.is_permissive(x.ty) => Operand::new(Mode::Variable, TypeId::OPAQUE, e),
            _ => match self.tcx.under(x.ty) {
                Type::Pointer(base) => {
                    let base = *base;
                    Operand::new(Mode::Variable, base, e)
                }
                _ => {
                    if x.is_nil(&self.tcx) {
                        self.error(x.pos, "invalid operation: cannot indirect nil");
                    } else {
                        let d = self.describe(&x);
                        self.error(x.pos, format!("invalid operation: cannot indirect {d}"));
                    }
                    Operand::invalid(e)
                }
            },
        }
    }

    fn unary(&mut self, e: &'a Expr, op: TokenKind, x_expr: &'a Expr) -> Operand<'a> {
        let x = self.expr(x_expr);
        if x.is_invalid() {
            return Operand::invalid(e);
        }
        match op {
            TokenKind::And => {
                let literal = matches!(x_expr.unparen().kind, ExprKind::CompositeLit { .. });
                if !literal && x.mode != Mode::Variable {
                    let d = self.describe(&x);
                    self.error(x.pos, format!("invalid operation: cannot take address of {d}"));
                    return Operand::invalid(e);
                }
                let ty = self.tcx.pointer(x.ty);
                return Operand::new(Mode::Value, ty, e);
            }
            TokenKind::Arrow => {
                if self.tcx.is_permissive(x.ty) {
                    return Operand::new(Mode::CommaOk, TypeId::OPAQUE, e);
                }
                let (dir, elem) = match self.tcx.under(x.ty) {
                    Type::Chan { dir, elem } => (*dir, *elem),
                    _ => {
                        let d = self.describe(&x);
                        self.error(
                            x.pos,
                            format!("invalid operation: cannot receive from non-channel {d}"),
                        );
                        return Operand::invalid(e);
                    }
                };
                if dir == ChanDir::Send {
                    let d = self.describe(&x);
                    self.error(
                        x.pos,
                        format!("invalid operation: cannot receive from send-only channel {d}"),
                    );
                    return Operand::invalid(e);
                }
                return Operand::new(Mode::CommaOk, elem, e);
            }
            TokenKind::Tilde => {
                self.error(e.pos, "cannot use ~ outside of interface or type constraint");
                return Operand::invalid(e);
            }
            _ => {}
        }

        let defined = match op {
            TokenKind::Add | TokenKind::Sub => self.all(x.ty, BasicKind::is_numeric),
            TokenKind::Xor => self.all(x.ty, BasicKind::is_integer),
            TokenKind::Not => self.all(x.ty, BasicKind::is_boolean),
            _ => false,
        };
        if !defined {
            let d = self.describe(&x);
            self.error(x.pos, format!("invalid operation: operator {op} not defined on {d}"));
            return Operand::invalid(e);
        }

        let Mode::Constant(value) = &x.mode else {
            return Operand::new(Mode::Value, x.ty, e);
        };
        if value.is_unknown() {
            return Operand::new(x.mode.clone(), x.ty, e);
        }
        let bits = if self.tcx.basic_kind(x.ty).is_some_and(BasicKind::is_unsigned) {
            self.sizes().sizeof(&self.tcx, x.ty).map(|size| (size * 8) as u32)
        } else {
            None
        };
        let mut result = Operand::new(Mode::Constant(unary_op(op, value, bits)), x.ty, e);
        self.overflow(&mut result);
        result
    }

    /// Binary operation `lhs op rhs`. `e` is the whole expression, or
    /// `None` for an assignment operation.
    pub(crate) fn binary(
        &mut self,
        e: Option<&'a Expr>,
        lhs: &'a Expr,
        rhs: &'a Expr,
        op: TokenKind,
        op_pos: Pos,
    ) -> Operand<'a> {
        let mut x = self.expr(lhs);
        let mut y = self.expr(rhs);
        let at = e.unwrap_or(lhs);
        if x.is_invalid() {
            return x;
        }
        if y.is_invalid() {
            x.set_invalid();
            return x;
        }

        if is_shift(op) {
            return self.shift(x, y, at, op);
        }

        if self.tcx.is_permissive(x.ty) || self.tcx.is_permissive(y.ty) {
            x.ty = if is_comparison(op) {
                self.tcx.basic(BasicKind::UntypedBool)
            } else if self.tcx.is_permissive(x.ty) {
                x.ty
            } else {
                y.ty
            };
            x.mode = if x.is_constant() && y.is_constant() {
                Mode::Constant(ConstValue::Unknown)
            } else {
                Mode::Value
            };
            return x;
        }

        self.match_types(&mut x, &mut y);
        if x.is_invalid() {
            return x;
        }

        if is_comparison(op) {
            self.comparison(&mut x, &y, op, false);
            return x;
        }

        if !self.tcx.identical(x.ty, y.ty) {
            if !self.tcx.is_invalid(x.ty) && !self.tcx.is_invalid(y.ty) {
                let (xs, ys) = (self.type_string(x.ty), self.type_string(y.ty));
                match e {
                    Some(e) => self.error(
                        e.pos,
                        format!("invalid operation: {e} (mismatched types {xs} and {ys})"),
                    ),
                    None => self.error(
                        x.pos,
                        format!(
                            "invalid operation: {lhs} {op}= {rhs} (mismatched types {xs} and {ys})"
                        ),
                    ),
                }
            }
            x.set_invalid();
            return x;
        }

        let defined = match op {
            TokenKind::Add => self.all(x.ty, |k| k.is_numeric() || k.is_string()),
            TokenKind::Sub | TokenKind::Mul | TokenKind::Quo => {
                self.all(x.ty, BasicKind::is_numeric)
            }
            TokenKind::Rem
            | TokenKind::And
            | TokenKind::Or
            | TokenKind::Xor
            | TokenKind::AndNot => {
                self.all(x.ty, BasicKind::is_integer)
            }
            TokenKind::LAnd | TokenKind::LOr => self.all(x.ty, BasicKind::is_boolean),
            _ => {
                self.error(op_pos, format!("unknown operator {op}"));
                x.set_invalid();
                return x;
            }
        };
        if !defined {
            let d = self.describe(&x);
            self.error(x.pos, format!("invalid operation: operator {op} not defined on {d}"));
            x.set_invalid();
            return x;
        }

        let integer = self.tcx.basic_kind(x.ty).is_some_and(BasicKind::is_integer);
        if matches!(op, TokenKind::Quo | TokenKind::Rem)
            && (x.is_constant() || integer)
            && y.value().is_some_and(ConstValue::is_zero)
        {
            self.error(y.pos, "invalid operation: division by zero");
            x.set_invalid();
            return x;
        }

        let folded = match (&x.mode, &y.mode) {
            (Mode::Constant(a), Mode::Constant(b)) => Some(if a.is_unknown() || b.is_unknown() {
                ConstValue::Unknown
            } else {
                binary_op(a, op, b, integer)
            }),
            _ => None,
        };
        match folded {
            Some(value) => {
                x.mode = Mode::Constant(value);
                x.expr = Some(at);
                x.pos = at.pos;
                self.overflow(&mut x);
            }
            None => x.mode = Mode::Value,
        }
        x
    }

    /// Convert untyped operands of a binary operation towards each other.
    pub(super) fn match_types(&mut self, x: &mut Operand<'a>, y: &mut Operand<'a>) {
        if !self.may_convert(x, y) {
            return;
        }
        self.convert_untyped(x, y.ty);
        if x.is_invalid() {
            return;
        }
        self.convert_untyped(y, x.ty);
        if y.is_invalid() {
            x.set_invalid();
        }
    }

    fn may_convert(&self, x: &Operand<'a>, y: &Operand<'a>) -> bool {
        let tcx = &self.tcx;
        if !tcx.is_untyped(x.ty) && !tcx.is_untyped(y.ty) {
            return false;
        }
        if tcx.is_interface(x.ty) && !tcx.is_type_param(x.ty)
            || tcx.is_interface(y.ty) && !tcx.is_type_param(y.ty)
        {
            return true;
        }
        let is = |ty: TypeId, pred: fn(BasicKind) -> bool| tcx.basic_kind(ty).is_some_and(pred);
        if is(x.ty, BasicKind::is_boolean) != is(y.ty, BasicKind::is_boolean) {
            return false;
        }
        if is(x.ty, BasicKind::is_string) != is(y.ty, BasicKind::is_string) {
            return false;
        }
        if x.is_nil(tcx) {
            return tcx.has_nil(y.ty);
        }
        if y.is_nil(tcx) {
            return tcx.has_nil(x.ty);
        }
        !matches!(tcx.under(x.ty), Type::Pointer(_)) && !matches!(tcx.under(y.ty), Type::Pointer(_))
    }

    /// Check a comparison; on success `x` becomes an untyped boolean. In a
    /// switch, `x` is the case value and `y` the tag.
    pub(super) fn comparison(
        &mut self,
        x: &mut Operand<'a>,
        y: &Operand<'a>,
        op: TokenKind,
        switch_case: bool,
    ) {
        let untyped_bool = self.tcx.basic(BasicKind::UntypedBool);
        if self.tcx.is_invalid(x.ty) || self.tcx.is_invalid(y.ty) {
            x.set_invalid();
            return;
        }
        if self.tcx.is_permissive(x.ty) || self.tcx.is_permissive(y.ty) {
            x.mode = if x.is_constant() && y.is_constant() {
                Mode::Constant(ConstValue::Unknown)
            } else {
                Mode::Value
            };
            x.ty = untyped_bool;
            return;
        }
        let op = if switch_case { TokenKind::Eql } else { op };

        let mut blame_y = false;
        let mut cause = String::new();
        let assignable = self.assignable_to(x, y.ty).is_ok() || self.assignable_to(y, x.ty).is_ok();
        let failed = if !assignable {
            blame_y = true;
            cause = format!(
                "mismatched types {} and {}",
                self.type_string(x.ty),
                self.type_string(y.ty)
            );
            true
        } else if matches!(op, TokenKind::Eql | TokenKind::Neq) {
            let (x_nil, y_nil) = (x.is_nil(&self.tcx), y.is_nil(&self.tcx));
            if x_nil || y_nil {
                let other = if x_nil { y.ty } else { x.ty };
                blame_y = true;
                !self.tcx.has_nil(other)
            } else if !self.tcx.comparable(x.ty) {
                cause = self.incomparable_cause(x.ty);
                true
            } else if !self.tcx.comparable(y.ty) {
                blame_y = true;
                cause = self.incomparable_cause(y.ty);
                true
            } else {
                false
            }
        } else if !self.all(x.ty, BasicKind::is_ordered) {
            true
        } else if !self.all(y.ty, BasicKind::is_ordered) {
            blame_y = true;
            true
        } else {
            false
        };

        if failed {
            if cause.is_empty() {
                let offender = if blame_y { y.ty } else { x.ty };
                cause = format!("operator {op} not defined on {}", self.kind_string(offender));
            }
            let (xs, ys) = (operand_text(x), operand_text(y));
            if switch_case {
                self.error(x.pos, format!("invalid case {xs} in switch on {ys} ({cause})"));
            } else {
                let at = if blame_y { y.pos } else { x.pos };
                self.error(at, format!("invalid operation: {xs} {op} {ys} ({cause})"));
            }
            x.set_invalid();
            return;
        }

        x.mode = match (&x.mode, &y.mode) {
            (Mode::Constant(a), Mode::Constant(b)) => {
                Mode::Constant(compare(a, op, b).map_or(ConstValue::Unknown, ConstValue::Bool))
            }
            _ => Mode::Value,
        };
        x.ty = untyped_bool;
    }

    fn kind_string(&self, ty: TypeId) -> String {
        match self.tcx.under(ty) {
            Type::Array { .. } => "array".to_string(),
            Type::Slice(_) => "slice".to_string(),
            Type::Struct(_) => "struct".to_string(),
            Type::Pointer(_) => "pointer".to_string(),
            Type::Func(_) => "func".to_string(),
            Type::Interface(_) => "interface".to_string(),
            Type::Map { .. } => "map".to_string(),
            Type::Chan { .. } => "chan".to_string(),
            _ => self.type_string(ty),
        }
    }

    fn incomparable_cause(&self, ty: TypeId) -> String {
        match self.tcx.under(ty) {
            Type::Slice(_) | Type::Func(_) | Type::Map { .. } => {
                format!("{} can only be compared to nil", self.kind_string(ty))
            }
            Type::Struct(fields) => fields
                .iter()
                .find(|f| !self.tcx.comparable(f.ty))
                .map(|f| format!("struct containing {} cannot be compared", self.type_string(f.ty)))
                .unwrap_or_default(),
            Type::Array { .. } => format!(
                "{} cannot be compared",
                self.type_string(self.tcx.underlying(ty)),
            ),
            _ => String::new(),
        }
    }

    fn shift(
        &mut self,
        mut x: Operand<'a>,
        mut y: Operand<'a>,
        at: &'a Expr,
        op: TokenKind,
    ) -> Operand<'a> {
        let x_int = match &x.mode {
            Mode::Constant(v) => v.is_unknown() || v.as_int().is_some(),
            _ => false,
        };
        if !(self.all(x.ty, BasicKind::is_integer) || self.tcx.is_untyped(x.ty) && x_int) {
            let d = self.describe(&x);
            self.error(x.pos, format!("invalid operation: shifted operand {d} must be integer"));
            x.set_invalid();
            return x;
        }

        let uint = self.tcx.basic(BasicKind::Uint);
        if let Mode::Constant(count) = &y.mode {
            if count.as_int().is_some_and(|s| s < 0) {
                let d = self.describe(&y);
                self.error(y.pos, format!("invalid operation: negative shift count {d}"));
                x.set_invalid();
                return x;
            }
            if self.tcx.is_untyped(y.ty) && !self.check_representable(&mut y, uint) {
                x.set_invalid();
                return x;
            }
        } else if !self.all(y.ty, BasicKind::is_integer) {
            if self.tcx.is_untyped(y.ty) {
                self.convert_untyped(&mut y, uint);
                if y.is_invalid() {
                    x.set_invalid();
                    return x;
                }
            } else {
                let d = self.describe(&y);
                self.error(y.pos, format!("invalid operation: shift count {d} must be integer"));
                x.set_invalid();
                return x;
            }
        }

        if let Mode::Constant(value) = &x.mode {
            if let Mode::Constant(count) = &y.mode {
                let x_integer = self.tcx.basic_kind(x.ty).is_some_and(BasicKind::is_integer);
                if value.is_unknown() || count.is_unknown() {
                    x.mode = Mode::Constant(ConstValue::Unknown);
                    if !x_integer {
                        x.ty = self.tcx.basic(BasicKind::UntypedInt);
                    }
                    return x;
                }
                let Some(s) = count.as_int().filter(|s| *s <= MAX_SHIFT) else {
                    let d = self.describe(&y);
                    self.error(y.pos, format!("invalid operation: invalid shift count {d}"));
                    x.set_invalid();
                    return x;
                };
                let shifted = shift(value, op, s as u64);
                if !x_integer {
                    x.ty = self.tcx.basic(BasicKind::UntypedInt);
                }
                x.mode = Mode::Constant(shifted);
                x.expr = Some(at);
                x.pos = at.pos;
                self.overflow(&mut x);
                return x;
            }
            if self.tcx.is_untyped(x.ty) {
                // The type is that of the left operand alone.
                x.mode = Mode::Value;
                return x;
            }
        }

        if !self.all(x.ty, BasicKind::is_integer) {
            let d = self.describe(&x);
            self.error(x.pos, format!("invalid operation: shifted operand {d} must be integer"));
            x.set_invalid();
            return x;
        }
        x.mode = Mode::Value;
        x
    }

    /// Typed constant results must fit their type.
    pub(super) fn overflow(&mut self, x: &mut Operand<'a>) {
        if self.tcx.is_untyped(x.ty) || x.value().map_or(true, ConstValue::is_unknown) {
            return;
        }
        let ty = x.ty;
        self.check_representable(x, ty);
    }

    /// Check that constant `x` is representable by `target`, replacing
    /// its value by the converted one.
    pub(super) fn check_representable(&mut self, x: &mut Operand<'a>, target: TypeId) -> bool {
        let (Mode::Constant(value), Some(kind)) = (&x.mode, self.tcx.basic_kind(target)) else {
            return true;
        };
        match representable(value, kind, self.word_size()) {
            Ok(v) => {
                x.mode = Mode::Constant(v);
                true
            }
            Err(err) => {
                let d = self.describe(x);
                let ts = self.type_string(self.tcx.underlying(target));
                let message = match err {
                    ReprError::Truncated => format!("{d} truncated to {ts}"),
                    ReprError::Overflows => format!("{d} overflows {ts}"),
                    ReprError::Mismatch => format!("cannot convert {d} to type {ts}"),
                };
                self.error(x.pos, message);
                x.set_invalid();
                false
            }
        }
    }
}

/// An operand as written, or its value if it has no expression (the
/// implicit `true` of a tagless switch).
fn operand_text(x: &Operand<'_>) -> String {
    match (x.expr, &x.mode) {
        (Some(e), _) => e.to_string(),
        (None, Mode::Constant(v)) => v.to_string(),
        (None, _) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_classes() {
        assert!(is_comparison(TokenKind::Leq));
        assert!(!is_comparison(TokenKind::Shl));
        assert!(is_shift(TokenKind::Shr));
        assert!(!is_shift(TokenKind::Add));
    }

    #[test]
    fn test_operand_text_prefers_expression() {
        let e = Expr::ident(crate::parser::ast::Ident::new("x", Pos::NONE));
        let with_expr = Operand::new(Mode::Value, TypeId::INVALID, &e);
        assert_eq!(operand_text(&with_expr), "x");
        let tag = Operand::synthetic(
            Mode::Constant(ConstValue::Bool(true)),
            TypeId::INVALID,
            Pos::NONE,
        );
        assert_eq!(operand_text(&tag), "true");
    }
}
