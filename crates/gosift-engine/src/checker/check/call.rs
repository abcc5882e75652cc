//! Calls, conversions and the predeclared functions.

use crate::checker::constant::{compare, representable, ConstValue};
use crate::checker::objects::Builtin;
use crate::checker::types::{BasicKind, Signature, Type, TypeId};
use crate::parser::ast::{Expr, ExprKind};
use crate::parser::TokenKind;

use super::lookup::Selection;
use super::{Checker, Mode, Operand};

/// How a call expression may be used as a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum CallKind {
    Conversion,
    /// A predeclared function whose result must be used.
    Expression,
    Statement,
}

/// Identity of an expression node, for side tables keyed by address.
pub(super) fn expr_key(e: &Expr) -> usize {
    e as *const Expr as usize
}

/// Whether evaluating `e` calls a function or receives from a channel.
fn has_call_or_recv(e: &Expr) -> bool {
    match &e.kind {
        ExprKind::Call { .. } => true,
        ExprKind::Unary {
            op: TokenKind::Arrow, ..
        } => true,
        ExprKind::Paren(x) | ExprKind::Star(x) | ExprKind::Unary { x, .. } => has_call_or_recv(x),
        ExprKind::Selector { x, .. } | ExprKind::TypeAssert { x, .. } => has_call_or_recv(x),
        ExprKind::Index { x, indices } => {
            has_call_or_recv(x) || indices.iter().any(has_call_or_recv)
        }
        ExprKind::Slice { x, low, high, max, .. } => {
            has_call_or_recv(x)
                || [low, high, max]
                    .into_iter()
                    .flatten()
                    .any(|b| has_call_or_recv(b))
        }
        ExprKind::Binary { x, y, .. } => has_call_or_recv(x) || has_call_or_recv(y),
        ExprKind::CompositeLit { elts, .. } => elts.iter().any(has_call_or_recv),
        ExprKind::KeyValue { key, value } => has_call_or_recv(key) || has_call_or_recv(value),
        _ => false,
    }
}

impl<'a> Checker<'a> {
    fn record_call(&mut self, e: &Expr, kind: CallKind) {
        self.call_kinds.insert(expr_key(e), kind);
    }

    pub(super) fn call_kind(&self, e: &Expr) -> Option<CallKind> {
        self.call_kinds.get(&expr_key(e)).copied()
    }

    pub(super) fn call(
        &mut self,
        e: &'a Expr,
        func: &'a Expr,
        args: &'a [Expr],
        ellipsis: bool,
    ) -> Operand<'a> {
        let mut x = self.raw_expr(func, None);
        if x.mode == Mode::NoValue {
            let d = self.describe(&x);
            self.error(x.pos, format!("{d} used as value or type"));
            x.set_invalid();
        }
        self.single_value(&mut x);

        match x.mode {
            Mode::Invalid => {
                self.record_call(e, CallKind::Statement);
                self.use_exprs(args);
                return Operand::invalid(e);
            }
            Mode::TypeExpr => {
                self.record_call(e, CallKind::Conversion);
                return self.conversion_call(e, x.ty, args, ellipsis);
            }
            Mode::Builtin(b) => {
                let kind = if b.is_statement() {
                    CallKind::Statement
                } else {
                    CallKind::Expression
                };
                self.record_call(e, kind);
                if b == Builtin::Panic {
                    self.panics.insert(expr_key(e));
                }
                return self.builtin(e, b, args, ellipsis);
            }
            _ => {}
        }

        self.record_call(e, CallKind::Statement);
        if self.tcx.is_permissive(x.ty) {
            self.use_exprs(args);
            return Operand::new(Mode::Value, TypeId::OPAQUE, e);
        }
        let Some(sig) = self.tcx.signature(x.ty).cloned() else {
            let d = self.describe(&x);
            self.error(x.pos, format!("invalid operation: cannot call non-function {d}"));
            self.use_exprs(args);
            return Operand::invalid(e);
        };

        let ops = self.arg_list(args, sig.params.len());
        self.arguments(e, func, &sig, args, ops, ellipsis);

        match sig.results.as_slice() {
            [] => Operand::new(Mode::NoValue, TypeId::INVALID, e),
            [ty] => Operand::new(Mode::Value, *ty, e),
            results => {
                let ty = self.tcx.tuple(results.to_vec());
                Operand::new(Mode::Value, ty, e)
            }
        }
    }

    /// Evaluate call arguments. A single call argument may supply several
    /// values.
    fn arg_list(&mut self, args: &'a [Expr], want: usize) -> Vec<Operand<'a>> {
        match args {
            [single] => self.multi_expr(single, want.max(1), false),
            _ => args.iter().map(|arg| self.expr(arg)).collect(),
        }
    }

    /// Check argument count and assignability against `sig`.
    fn arguments(
        &mut self,
        e: &'a Expr,
        func: &'a Expr,
        sig: &Signature,
        args: &'a [Expr],
        mut ops: Vec<Operand<'a>>,
        ellipsis: bool,
    ) {
        if ops.iter().any(Operand::is_invalid) {
            return;
        }
        let nargs = ops.len();
        let mut params = sig.params.clone();
        if sig.variadic {
            if ellipsis {
                if args.len() == 1 && nargs > 1 {
                    self.error(
                        args[0].pos,
                        format!("cannot use ... with {nargs}-valued {}", args[0]),
                    );
                    return;
                }
            } else if nargs + 1 >= params.len() {
                if let Some(last) = params.pop() {
                    let elem = match self.tcx.under(last) {
                        Type::Slice(elem) => *elem,
                        _ => TypeId::OPAQUE,
                    };
                    params.resize(nargs, elem);
                }
            }
        } else if ellipsis {
            self.error(e.pos, format!("cannot use ... in call to non-variadic {func}"));
            return;
        }

        if nargs != params.len() {
            if nargs < params.len() {
                let at = ops.last().map_or(e.pos, |x| x.pos);
                self.error(at, format!("not enough arguments in call to {func}"));
            } else {
                let at = ops[params.len()].pos;
                self.error(at, format!("too many arguments in call to {func}"));
            }
            return;
        }

        let context = format!("argument to {func}");
        for (x, param) in ops.iter_mut().zip(params) {
            self.assignment(x, Some(param), &context);
        }
    }

    // ========================================================================
    // Conversions
    // ========================================================================

    fn conversion_call(
        &mut self,
        e: &'a Expr,
        target: TypeId,
        args: &'a [Expr],
        ellipsis: bool,
    ) -> Operand<'a> {
        let ts = self.type_string(target);
        if ellipsis {
            self.error(e.pos, format!("invalid use of ... in conversion to {ts}"));
            self.use_exprs(args);
            return Operand::invalid(e);
        }
        let arg = match args {
            [] => {
                self.error(e.pos, format!("missing argument in conversion to {ts}"));
                return Operand::invalid(e);
            }
            [arg] => arg,
            [.., last] => {
                self.error(last.pos, format!("too many arguments in conversion to {ts}"));
                self.use_exprs(args);
                return Operand::invalid(e);
            }
        };
        let mut x = self.expr(arg);
        if x.is_invalid() {
            return Operand::invalid(e);
        }
        self.conversion(&mut x, target);
        Operand::new(x.mode, x.ty, e)
    }

    /// Convert `x` to type `target` in place.
    fn conversion(&mut self, x: &mut Operand<'a>, target: TypeId) {
        if self.tcx.is_permissive(x.ty) || self.tcx.contains_permissive(target) {
            if !x.is_constant() {
                x.mode = Mode::Value;
            }
            x.ty = target;
            return;
        }

        let x_integer = self.tcx.basic_kind(x.ty).is_some_and(BasicKind::is_integer);
        let constant = x.value().cloned().filter(|_| self.is_const_type(target));
        let ok = if let Some(value) = constant {
            match self.const_convert(&value, x_integer, target) {
                Some(v) => {
                    x.mode = Mode::Constant(v);
                    true
                }
                None if x_integer
                    && self.tcx.basic_kind(target).is_some_and(BasicKind::is_integer) =>
                {
                    let ts = self.type_string(target);
                    self.error(x.pos, format!("constant {value} overflows {ts}"));
                    x.set_invalid();
                    return;
                }
                None => false,
            }
        } else if self.convertible_to(x, target) {
            x.mode = Mode::Value;
            true
        } else {
            false
        };

        if !ok {
            let d = self.describe(x);
            let ts = self.type_string(target);
            self.error(x.pos, format!("cannot convert {d} to type {ts}"));
            x.set_invalid();
            return;
        }
        x.ty = target;
    }

    fn const_convert(
        &self,
        value: &ConstValue,
        integer: bool,
        target: TypeId,
    ) -> Option<ConstValue> {
        let kind = self.tcx.basic_kind(target)?;
        if let Ok(v) = representable(value, kind, self.word_size()) {
            return Some(v);
        }
        if integer && kind.is_string() {
            let c = value
                .as_int()
                .and_then(|i| u32::try_from(i).ok())
                .and_then(char::from_u32)
                .unwrap_or(char::REPLACEMENT_CHARACTER);
            return Some(ConstValue::String(c.to_string()));
        }
        None
    }

    fn is_bytes_or_runes(&self, ty: TypeId) -> bool {
        match self.tcx.under(ty) {
            Type::Slice(elem) => matches!(
                self.tcx.basic_kind(*elem).map(BasicKind::canonical),
                Some(BasicKind::Uint8 | BasicKind::Int32)
            ),
            _ => false,
        }
    }

    /// Whether a non-constant `x` converts to `target`.
    fn convertible_to(&mut self, x: &Operand<'a>, target: TypeId) -> bool {
        if self.assignable_to(x, target).is_ok() {
            return true;
        }
        let (v, t) = (x.ty, target);
        let (vu, tu) = (self.tcx.underlying(v), self.tcx.underlying(t));
        if self.tcx.identical(vu, tu) {
            return true;
        }
        let kind = |ty: TypeId| self.tcx.basic_kind(ty);
        let is = |ty: TypeId, pred: fn(BasicKind) -> bool| kind(ty).is_some_and(pred);

        match (self.tcx.get(v), self.tcx.get(t)) {
            (Type::Pointer(a), Type::Pointer(b)) => {
                if self.tcx.identical(self.tcx.underlying(*a), self.tcx.underlying(*b)) {
                    return true;
                }
            }
            _ => {}
        }
        let int_or_float = |ty| is(ty, BasicKind::is_integer) || is(ty, BasicKind::is_float);
        if int_or_float(v) && int_or_float(t) {
            return true;
        }
        if is(v, BasicKind::is_complex) && is(t, BasicKind::is_complex) {
            return true;
        }
        if (is(v, BasicKind::is_integer) || self.is_bytes_or_runes(v)) && is(
            t,
            BasicKind::is_string,
        ) {
            return true;
        }
        if is(v, BasicKind::is_string) && self.is_bytes_or_runes(t) {
            return true;
        }
        let unsafe_pointer = |ty| kind(ty) == Some(BasicKind::UnsafePointer);
        let uintptr = |ty| kind(ty) == Some(BasicKind::Uintptr);
        let pointer = |ty| matches!(self.tcx.under(ty), Type::Pointer(_));
        if (pointer(v) || uintptr(v)) && unsafe_pointer(t) {
            return true;
        }
        if unsafe_pointer(v) && (pointer(t) || uintptr(t)) {
            return true;
        }
        if let Type::Slice(elem) = self.tcx.get(vu) {
            let array_elem = match self.tcx.get(tu) {
                Type::Array { elem, .. } => Some(*elem),
                Type::Pointer(base) => match self.tcx.under(*base) {
                    Type::Array { elem, .. } => Some(*elem),
                    _ => None,
                },
                _ => None,
            };
            if array_elem.is_some_and(|a| self.tcx.identical(a, *elem)) {
                return true;
            }
        }
        false
    }

    // ========================================================================
    // Predeclared functions
    // ========================================================================

    fn builtin(
        &mut self,
        e: &'a Expr,
        b: Builtin,
        args: &'a [Expr],
        ellipsis: bool,
    ) -> Operand<'a> {
        let name = b.name();
        if ellipsis && b != Builtin::Append {
            self.error(
                e.pos,
                format!("invalid operation: invalid use of ... with built-in {name}"),
            );
            self.use_exprs(args);
            return Operand::invalid(e);
        }

        // make, new and unsafe.Offsetof take something other than values.
        let mut ops = match b {
            Builtin::Make | Builtin::New | Builtin::Offsetof => Vec::new(),
            _ => {
                let ops = self.arg_list(args, b.arity().0);
                if ops.iter().any(Operand::is_invalid) {
                    return Operand::invalid(e);
                }
                if let ([arg], [x, ..]) = (args, ops.as_slice()) {
                    if self.tcx.is_permissive(x.ty) && matches!(
                        arg.unparen().kind,
                        ExprKind::Call { .. },
                    ) {
                        return Operand::new(Mode::Value, TypeId::OPAQUE, e);
                    }
                }
                ops
            }
        };
        let nargs = match b {
            Builtin::Make | Builtin::New | Builtin::Offsetof => args.len(),
            _ => ops.len(),
        };

        let (min, variadic) = b.arity();
        let problem = if nargs < min {
            Some("not enough")
        } else if !variadic && nargs > min {
            Some("too many")
        } else {
            None
        };
        if let Some(problem) = problem {
            self.error(
                e.pos,
                format!(
                    "invalid operation: {problem} arguments for {e} \
                     (expected {min}, found {nargs})"
                ),
            );
            return Operand::invalid(e);
        }

        let int = self.tcx.basic(BasicKind::Int);
        let uintptr = self.tcx.basic(BasicKind::Uintptr);
        let unsafe_pointer = self.tcx.basic(BasicKind::UnsafePointer);

        match b {
            Builtin::Append => self.builtin_append(e, args, ops, ellipsis),
            Builtin::Len | Builtin::Cap => {
                let x = &ops[0];
                let under = match self.tcx.under(x.ty) {
                    Type::Pointer(base) if matches!(self.tcx.under(*base), Type::Array { .. }) => {
                        *base
                    }
                    _ => x.ty,
                };
                let mode = match self.tcx.under(under) {
                    Type::Basic(kind) if kind.is_string() && b == Builtin::Len => match &x.mode {
                        Mode::Constant(ConstValue::String(s)) => {
                            Some(Mode::Constant(ConstValue::Int(s.len() as i128)))
                        }
                        _ => Some(Mode::Value),
                    },
                    Type::Array { len, .. } => Some(if has_call_or_recv(&args[0]) {
                        Mode::Value
                    } else {
                        Mode::Constant(len.map_or(
                            ConstValue::Unknown,
                            |n| ConstValue::Int(i128::from(n)),
                        ))
                    }),
                    Type::Slice(_) | Type::Chan { .. } => Some(Mode::Value),
                    Type::Map { .. } if b == Builtin::Len => Some(Mode::Value),
                    _ if self.tcx.is_permissive(x.ty) => Some(Mode::Value),
                    _ => None,
                };
                match mode {
                    Some(mode) => Operand::new(mode, int, e),
                    None => {
                        let d = self.describe(x);
                        self.error(x.pos, format!("invalid argument: {d} for built-in {name}"));
                        Operand::invalid(e)
                    }
                }
            }
            Builtin::Clear => {
                let x = &ops[0];
                if !self.tcx.is_permissive(x.ty) && !matches!(
                    self.tcx.under(x.ty),
                    Type::Map { .. } | Type::Slice(_),
                ) {
                    let d = self.describe(x);
                    self.error(
                        x.pos,
                        format!(
                            "invalid argument: cannot clear {d}: \
                             argument must be (or constrained by) map or slice"
                        ),
                    );
                    return Operand::invalid(e);
                }
                Operand::new(Mode::NoValue, TypeId::INVALID, e)
            }
            Builtin::Close => {
                let x = &ops[0];
                if !self.tcx.is_permissive(x.ty) {
                    let problem = match self.tcx.under(x.ty) {
                        Type::Chan { dir, .. } if *dir == crate::parser::ast::ChanDir::Recv => {
                            Some("cannot close receive-only channel")
                        }
                        Type::Chan { .. } => None,
                        _ => Some("cannot close non-channel"),
                    };
                    if let Some(problem) = problem {
                        let d = self.describe(x);
                        self.error(x.pos, format!("invalid operation: {problem} {d}"));
                        return Operand::invalid(e);
                    }
                }
                Operand::new(Mode::NoValue, TypeId::INVALID, e)
            }
            Builtin::Complex => self.builtin_complex(e, ops),
            Builtin::Copy => {
                let (x, y) = (&ops[0], &ops[1]);
                if self.tcx.is_permissive(x.ty) || self.tcx.is_permissive(y.ty) {
                    return Operand::new(Mode::Value, int, e);
                }
                let dst = match self.tcx.under(x.ty) {
                    Type::Slice(elem) => Some(*elem),
                    _ => None,
                };
                let src = match self.tcx.under(y.ty) {
                    Type::Slice(elem) => Some(*elem),
                    Type::Basic(kind) if kind.is_string() => Some(self.tcx.basic(BasicKind::Byte)),
                    _ => None,
                };
                let (Some(dst), Some(src)) = (dst, src) else {
                    let (dx, dy) = (self.describe(x), self.describe(y));
                    self.error(
                        x.pos,
                        format!(
                            "invalid argument: copy expects slice arguments; found {dx} and {dy}"
                        ),
                    );
                    return Operand::invalid(e);
                };
                if !self.tcx.identical(dst, src) {
                    let (dx, dy) = (self.describe(x), self.describe(y));
                    let (ds, ss) = (self.type_string(dst), self.type_string(src));
                    self.error(
                        x.pos,
                        format!(
                            "invalid argument: arguments to copy {dx} and {dy} \
                             have different element types {ds} and {ss}"
                        ),
                    );
                    return Operand::invalid(e);
                }
                Operand::new(Mode::Value, int, e)
            }
            Builtin::Delete => {
                let key = match self.tcx.under(ops[0].ty) {
                    Type::Map { key, .. } => Some(*key),
                    _ if self.tcx.is_permissive(ops[0].ty) => None,
                    _ => {
                        let d = self.describe(&ops[0]);
                        self.error(ops[0].pos, format!("invalid argument: {d} is not a map"));
                        return Operand::invalid(e);
                    }
                };
                if let Some(key) = key {
                    self.assignment(&mut ops[1], Some(key), "argument to delete");
                }
                Operand::new(Mode::NoValue, TypeId::INVALID, e)
            }
            Builtin::Imag | Builtin::Real => {
                let x = &ops[0];
                if self.tcx.is_permissive(x.ty) {
                    return Operand::new(Mode::Value, TypeId::OPAQUE, e);
                }
                let untyped_numeric = self.tcx.is_untyped(x.ty)
                    && x.is_constant()
                    && self.tcx.basic_kind(x.ty).is_some_and(BasicKind::is_numeric);
                if untyped_numeric {
                    let value = match (b, x.value()) {
                        (Builtin::Real, Some(v @ (ConstValue::Int(_) | ConstValue::Float(_)))) => {
                            v.clone()
                        }
                        (Builtin::Imag, Some(ConstValue::Int(_) | ConstValue::Float(_))) => {
                            ConstValue::Int(0)
                        }
                        _ => ConstValue::Unknown,
                    };
                    return Operand::new(
                        Mode::Constant(value),
                        self.tcx.basic(BasicKind::UntypedFloat),
                        e,
                    );
                }
                let result = match self.tcx.basic_kind(x.ty) {
                    Some(BasicKind::Complex64) => BasicKind::Float32,
                    Some(BasicKind::Complex128) => BasicKind::Float64,
                    _ => {
                        let ts = self.type_string(x.ty);
                        self.error(
                            x.pos,
                            format!(
                                "invalid argument: argument has type {ts}, expected complex type"
                            ),
                        );
                        return Operand::invalid(e);
                    }
                };
                let mode = if x.is_constant() {
                    Mode::Constant(ConstValue::Unknown)
                } else {
                    Mode::Value
                };
                Operand::new(mode, self.tcx.basic(result), e)
            }
            Builtin::Make => self.builtin_make(e, args),
            Builtin::Max | Builtin::Min => self.builtin_min_max(e, b, ops),
            Builtin::New => {
                let ty = self.type_expr(&args[0]);
                if self.tcx.is_invalid(ty) {
                    return Operand::invalid(e);
                }
                let ptr = self.tcx.pointer(ty);
                Operand::new(Mode::Value, ptr, e)
            }
            Builtin::Panic => {
                let any = self.universe.any;
                self.assignment(&mut ops[0], Some(any), "argument to panic");
                Operand::new(Mode::NoValue, TypeId::INVALID, e)
            }
            Builtin::Print | Builtin::Println => {
                let context = format!("argument to built-in {name}");
                for x in &mut ops {
                    self.assignment(x, None, &context);
                }
                Operand::new(Mode::NoValue, TypeId::INVALID, e)
            }
            Builtin::Recover => {
                let any = self.universe.any;
                Operand::new(Mode::Value, any, e)
            }
            Builtin::Add => {
                self.assignment(&mut ops[0], Some(unsafe_pointer), "argument to unsafe.Add");
                self.valid_index(&mut ops[1], "length", true);
                Operand::new(Mode::Value, unsafe_pointer, e)
            }
            Builtin::Alignof | Builtin::Sizeof => {
                let x = &mut ops[0];
                self.assignment(x, None, &format!("argument to unsafe.{name}"));
                if x.is_invalid() {
                    return Operand::invalid(e);
                }
                let size = if self.tcx.contains_permissive(x.ty) {
                    None
                } else if b == Builtin::Sizeof {
                    self.sizes().sizeof(&self.tcx, x.ty)
                } else {
                    self.sizes().alignof(&self.tcx, x.ty)
                };
                let value = size.map_or(ConstValue::Unknown, |s| ConstValue::Int(i128::from(s)));
                Operand::new(Mode::Constant(value), uintptr, e)
            }
            Builtin::Offsetof => self.builtin_offsetof(e, &args[0]),
            Builtin::Slice => {
                let elem = match self.tcx.under(ops[0].ty) {
                    Type::Pointer(elem) => Some(*elem),
                    _ if self.tcx.is_permissive(ops[0].ty) => None,
                    _ => {
                        let d = self.describe(&ops[0]);
                        self.error(ops[0].pos, format!("invalid argument: {d} is not a pointer"));
                        return Operand::invalid(e);
                    }
                };
                if !self.valid_index(&mut ops[1], "length", false) {
                    return Operand::invalid(e);
                }
                match elem {
                    Some(elem) => {
                        let ty = self.tcx.slice(elem);
                        Operand::new(Mode::Value, ty, e)
                    }
                    None => Operand::new(Mode::Value, TypeId::OPAQUE, e),
                }
            }
            Builtin::SliceData => {
                let elem = match self.tcx.under(ops[0].ty) {
                    Type::Slice(elem) => *elem,
                    _ if self.tcx.is_permissive(ops[0].ty) => return Operand::new(
                        Mode::Value,
                        TypeId::OPAQUE,
                        e,
                    ),
                    _ => {
                        let d = self.describe(&ops[0]);
                        self.error(ops[0].pos, format!("invalid argument: {d} is not a slice"));
                        return Operand::invalid(e);
                    }
                };
                let ty = self.tcx.pointer(elem);
                Operand::new(Mode::Value, ty, e)
            }
            Builtin::String => {
                let byte = self.tcx.basic(BasicKind::Byte);
                let byte_ptr = self.tcx.pointer(byte);
                self.assignment(&mut ops[0], Some(byte_ptr), "argument to unsafe.String");
                if ops[0].is_invalid() || !self.valid_index(&mut ops[1], "length", false) {
                    return Operand::invalid(e);
                }
                Operand::new(Mode::Value, self.tcx.basic(BasicKind::String), e)
            }
            Builtin::StringData => {
                let string = self.tcx.basic(BasicKind::String);
                self.assignment(&mut ops[0], Some(string), "argument to unsafe.StringData");
                if ops[0].is_invalid() {
                    return Operand::invalid(e);
                }
                let byte = self.tcx.basic(BasicKind::Byte);
                let ty = self.tcx.pointer(byte);
                Operand::new(Mode::Value, ty, e)
            }
        }
    }

    fn builtin_append(
        &mut self,
        e: &'a Expr,
        args: &'a [Expr],
        ops: Vec<Operand<'a>>,
        ellipsis: bool,
    ) -> Operand<'a> {
        let s = ops[0].ty;
        if self.tcx.is_permissive(s) {
            return Operand::new(Mode::Value, s, e);
        }
        let elem = match self.tcx.under(s) {
            Type::Slice(elem) => *elem,
            _ => {
                let cause = if ops[0].is_nil(&self.tcx) {
                    "have untyped nil".to_string()
                } else {
                    format!("have {}", self.describe(&ops[0]))
                };
                self.error(
                    ops[0].pos,
                    format!("first argument to append must be a slice; {cause}"),
                );
                return Operand::invalid(e);
            }
        };

        // append([]byte, string...) appends the bytes of the string.
        if ops.len() == 2 && ellipsis {
            let byte = self.tcx.basic(BasicKind::Byte);
            let bytes = self.tcx.slice(byte);
            if self.assignable_to(&ops[0], bytes).is_ok()
                && self.tcx.basic_kind(ops[1].ty).is_some_and(BasicKind::is_string)
            {
                return Operand::new(Mode::Value, s, e);
            }
        }

        let rest = self.tcx.slice(elem);
        let sig = Signature {
            params: vec![s, rest],
            results: vec![s],
            variadic: true,
        };
        let func = match &e.kind {
            ExprKind::Call { func, .. } => func.as_ref(),
            _ => e,
        };
        self.arguments(e, func, &sig, args, ops, ellipsis);
        Operand::new(Mode::Value, s, e)
    }

    fn builtin_complex(&mut self, e: &'a Expr, mut ops: Vec<Operand<'a>>) -> Operand<'a> {
        let mut y = ops.pop().unwrap_or_else(|| Operand::invalid(e));
        let mut x = ops.pop().unwrap_or_else(|| Operand::invalid(e));
        if self.tcx.is_permissive(x.ty) || self.tcx.is_permissive(y.ty) {
            return Operand::new(Mode::Value, TypeId::OPAQUE, e);
        }

        let untyped = (self.tcx.is_untyped(x.ty), self.tcx.is_untyped(y.ty));
        match untyped {
            (true, false) => self.convert_untyped(&mut x, y.ty),
            (false, true) => self.convert_untyped(&mut y, x.ty),
            (true, true) if x.is_constant() && y.is_constant() => {
                let real = |v: Option<&ConstValue>| matches!(
                    v,
                    Some(ConstValue::Int(_) | ConstValue::Float(_) | ConstValue::Unknown),
                );
                if real(x.value()) && real(y.value()) {
                    let ty = self.tcx.basic(BasicKind::UntypedComplex);
                    return Operand::new(Mode::Constant(ConstValue::Unknown), ty, e);
                }
            }
            _ => {}
        }
        if x.is_invalid() || y.is_invalid() {
            return Operand::invalid(e);
        }
        if !self.tcx.identical(x.ty, y.ty) {
            let (xs, ys) = (self.type_string(x.ty), self.type_string(y.ty));
            self.error(x.pos, format!("invalid operation: {e} (mismatched types {xs} and {ys})"));
            return Operand::invalid(e);
        }
        let result = match self.tcx.basic_kind(x.ty) {
            Some(BasicKind::Float32) => BasicKind::Complex64,
            Some(BasicKind::Float64) => BasicKind::Complex128,
            _ => {
                let ts = self.type_string(x.ty);
                self.error(
                    x.pos,
                    format!("invalid argument: arguments have type {ts}, expected floating-point"),
                );
                return Operand::invalid(e);
            }
        };
        let mode = if x.is_constant() && y.is_constant() {
            Mode::Constant(ConstValue::Unknown)
        } else {
            Mode::Value
        };
        Operand::new(mode, self.tcx.basic(result), e)
    }

    fn builtin_make(&mut self, e: &'a Expr, args: &'a [Expr]) -> Operand<'a> {
        let ty = self.type_expr(&args[0]);
        if self.tcx.is_invalid(ty) {
            self.use_exprs(&args[1..]);
            return Operand::invalid(e);
        }
        if self.tcx.is_permissive(ty) {
            self.use_exprs(&args[1..]);
            return Operand::new(Mode::Value, ty, e);
        }
        let min = match self.tcx.under(ty) {
            Type::Slice(_) => 2,
            Type::Map { .. } | Type::Chan { .. } => 1,
            _ => {
                self.error(
                    args[0].pos,
                    format!(
                        "invalid argument: cannot make {}; type must be slice, map, or channel",
                        args[0],
                    ),
                );
                self.use_exprs(&args[1..]);
                return Operand::invalid(e);
            }
        };
        let nargs = args.len();
        if nargs < min || min + 1 < nargs {
            self.error(
                e.pos,
                format!(
                    "invalid operation: {e} expects {min} or {} arguments; found {nargs}",
                    min + 1,
                ),
            );
            return Operand::invalid(e);
        }
        let sizes: Vec<i128> = args[1..]
            .iter()
            .filter_map(|arg| self.index(arg, None).flatten())
            .collect();
        if let [len, cap] = sizes.as_slice() {
            if len > cap {
                self.error(args[1].pos, "invalid argument: length and capacity swapped");
            }
        }
        Operand::new(Mode::Value, ty, e)
    }

    fn builtin_min_max(&mut self, e: &'a Expr, b: Builtin, ops: Vec<Operand<'a>>) -> Operand<'a> {
        let op = if b == Builtin::Min { TokenKind::Lss } else { TokenKind::Gtr };
        let mut result: Option<Operand<'a>> = None;
        for mut a in ops {
            if !self.all(a.ty, BasicKind::is_ordered) {
                let d = self.describe(&a);
                self.error(a.pos, format!("invalid argument: {d} cannot be ordered"));
                return Operand::invalid(e);
            }
            let Some(mut x) = result.take() else {
                result = Some(a);
                continue;
            };
            self.match_types(&mut x, &mut a);
            if x.is_invalid() {
                return Operand::invalid(e);
            }
            if !self.tcx.identical(x.ty, a.ty)
                && !self.tcx.is_permissive(x.ty)
                && !self.tcx.is_permissive(a.ty)
            {
                let (xs, ys) = (self.type_string(x.ty), self.type_string(a.ty));
                self.error(
                    a.pos,
                    format!(
                        "invalid argument: mismatched types {xs} (previous argument) \
                         and {ys} (type of {})",
                        a.expr_string()
                    ),
                );
                return Operand::invalid(e);
            }
            let replaced = match (&x.mode, &a.mode) {
                (Mode::Constant(xv), Mode::Constant(av)) => compare(av, op, xv) == Some(true),
                _ => {
                    x.mode = Mode::Value;
                    false
                }
            };
            result = Some(if replaced { a } else { x });
        }
        let Some(x) = result else {
            return Operand::invalid(e);
        };
        let mode = if x.is_constant() { x.mode } else { Mode::Value };
        Operand::new(mode, x.ty, e)
    }

    fn builtin_offsetof(&mut self, e: &'a Expr, arg: &'a Expr) -> Operand<'a> {
        let uintptr = self.tcx.basic(BasicKind::Uintptr);
        let ExprKind::Selector { x: base, sel } = &arg.unparen().kind else {
            self.error(arg.pos, format!("invalid argument: {arg} is not a selector expression"));
            self.use_exprs(std::slice::from_ref(arg));
            return Operand::invalid(e);
        };
        let x = self.expr(base);
        if x.is_invalid() {
            return Operand::invalid(e);
        }
        if self.tcx.is_permissive(x.ty) {
            return Operand::new(Mode::Constant(ConstValue::Unknown), uintptr, e);
        }
        let name = sel.name.as_str();
        match self.lookup_field_or_method(x.ty, false, name) {
            Selection::Field { .. } | Selection::Opaque => {}
            Selection::Method { .. }
            | Selection::InterfaceMethod { .. }
            | Selection::PointerReceiver => {
                self.error(arg.pos, format!("invalid argument: {arg} is a method value"));
                return Operand::invalid(e);
            }
            Selection::Ambiguous | Selection::NotFound => {
                self.error(arg.pos, format!("invalid argument: {arg} has no single field {name}"));
                return Operand::invalid(e);
            }
        }

        // Only direct fields have an offset computed here.
        let offset = match self.tcx.under(x.ty) {
            Type::Struct(fields) => fields.iter().position(|f| f.name == name).and_then(|i| {
                let types: Vec<TypeId> = fields.iter().map(|f| f.ty).collect();
                self.sizes().offsetsof(&self.tcx, &types).map(|offsets| offsets[i])
            }),
            _ => None,
        };
        let value = offset.map_or(ConstValue::Unknown, |o| ConstValue::Int(i128::from(o)));
        Operand::new(Mode::Constant(value), uintptr, e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::Ident;
    use crate::parser::Pos;

    fn ident(name: &str) -> Expr {
        Expr::ident(Ident::new(name, Pos::NONE))
    }

    fn call(func: Expr, args: Vec<Expr>) -> Expr {
        Expr::new(
            Pos::NONE,
            ExprKind::Call {
                func: Box::new(func),
                args,
                ellipsis: false,
            },
        )
    }

    #[test]
    fn test_has_call_or_recv() {
        assert!(!has_call_or_recv(&ident("a")));
        assert!(has_call_or_recv(&call(ident("f"), vec![])));
        let recv = Expr::new(
            Pos::NONE,
            ExprKind::Unary {
                op: TokenKind::Arrow,
                x: Box::new(ident("ch")),
            },
        );
        assert!(has_call_or_recv(&recv));
        let index = Expr::new(
            Pos::NONE,
            ExprKind::Index {
                x: Box::new(ident("a")),
                indices: vec![call(ident("f"), vec![])],
            },
        );
        assert!(has_call_or_recv(&index));
    }

    #[test]
    fn test_expr_key_is_identity() {
        let a = ident("a");
        let b = ident("a");
        assert_eq!(expr_key(&a), expr_key(&a));
        assert_ne!(expr_key(&a), expr_key(&b));
    }
}
