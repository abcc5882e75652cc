//! Statements, branch and label checks, and terminating statement analysis.

use rustc_hash::FxHashMap;

use crate::checker::constant::ConstValue;
use crate::checker::objects::{ObjKind, ScopeKind};
use crate::checker::types::{BasicKind, Type, TypeId};
use crate::parser::ast::{
    Block, CaseClause, ChanDir, CommClause, Expr, ExprKind, Ident, Stmt, StmtKind,
};
use crate::parser::{Pos, TokenKind};

use super::call::{expr_key, CallKind};
use super::{Checker, Mode, Operand};

/// What the enclosing statements allow.
#[derive(Debug, Clone, Copy, Default)]
struct StmtContext {
    break_ok: bool,
    continue_ok: bool,
    fallthrough_ok: bool,
    final_switch_case: bool,
    in_type_switch: bool,
}

impl StmtContext {
    /// Context for statements nested in the current one.
    fn inner(self) -> Self {
        StmtContext {
            fallthrough_ok: false,
            final_switch_case: false,
            in_type_switch: false,
            ..self
        }
    }
}

/// A label seen while checking branches.
#[derive(Debug, Clone, Copy)]
struct LabelState {
    pos: Pos,
    used: bool,
}

/// A block in the label pass: the labels declared so far and the
/// labeled statement it is the body of.
struct LabelBlock<'a> {
    labeled: Option<&'a Stmt>,
    labels: Vec<&'a str>,
}

/// Forward `goto`s of one block and the variable declarations they skip.
#[derive(Default)]
struct Jumps<'a> {
    forward: Vec<&'a Ident>,
    var_decl: Option<Pos>,
    over_var_decl: Vec<&'a Ident>,
}

impl<'a> Jumps<'a> {
    fn record_var_decl(&mut self, pos: Pos) {
        self.var_decl = Some(pos);
        self.over_var_decl = self.forward.clone();
    }

    fn jumps_over_var_decl(&self, jump: &Ident) -> Option<Pos> {
        self.var_decl
            .filter(|_| self.over_var_decl.iter().any(|j| std::ptr::eq(*j, jump)))
    }
}

fn trim_trailing_empty(list: &[Stmt]) -> &[Stmt] {
    let end = list
        .iter()
        .rposition(|s| !matches!(s.kind, StmtKind::Empty))
        .map_or(0, |i| i + 1);
    &list[..end]
}

impl<'a> Checker<'a> {
    /// Check the statements of a function body.
    pub(super) fn stmt_list(&mut self, list: &'a [Stmt]) {
        self.stmts(list, StmtContext::default());
    }

    fn stmts(&mut self, list: &'a [Stmt], ctx: StmtContext) {
        let fallthrough_ok = ctx.fallthrough_ok;
        let inner = StmtContext {
            fallthrough_ok: false,
            ..ctx
        };
        let list = trim_trailing_empty(list);
        for (i, s) in list.iter().enumerate() {
            if self.halted() {
                return;
            }
            let mut ctx = inner;
            if fallthrough_ok && i + 1 == list.len() {
                ctx.fallthrough_ok = true;
            }
            self.stmt(s, ctx);
        }
    }

    fn simple_stmt(&mut self, s: Option<&'a Stmt>) {
        if let Some(s) = s {
            self.stmt(s, StmtContext::default());
        }
    }

    fn block(&mut self, block: &'a Block, ctx: StmtContext) {
        let saved = self.scope;
        self.open_scope(ScopeKind::Block);
        self.stmts(&block.stmts, ctx);
        self.close_scope(saved);
    }

    fn stmt(&mut self, s: &'a Stmt, ctx: StmtContext) {
        let inner = ctx.inner();
        match &s.kind {
            StmtKind::Bad | StmtKind::Empty => {}
            StmtKind::Decl(gen) => self.decl_stmt(gen),
            StmtKind::Labeled { stmt, .. } => self.stmt(stmt, ctx),
            StmtKind::Expr(e) => self.expr_stmt(e),
            StmtKind::Send { chan, value } => self.send_stmt(s.pos, chan, value),
            StmtKind::IncDec { x, inc } => self.inc_dec(x, *inc),
            StmtKind::Assign { lhs, op, op_pos, rhs } => match op {
                TokenKind::Assign => self.assign_vars(lhs, rhs),
                TokenKind::Define => self.short_var_decl(s.pos, lhs, rhs),
                _ => self.assign_op(lhs, *op, *op_pos, rhs),
            },
            StmtKind::Go(call) => self.suspended_call("go", call),
            StmtKind::Defer(call) => self.suspended_call("defer", call),
            StmtKind::Return(results) => self.return_stmt(s.pos, results),
            StmtKind::Branch { tok, label } => {
                if label.is_some() {
                    // Labeled branches are checked with the labels.
                    return;
                }
                match tok {
                    TokenKind::Break if !ctx.break_ok => {
                        self.error(s.pos, "break is not in a loop, switch, or select");
                    }
                    TokenKind::Continue if !ctx.continue_ok => {
                        self.error(s.pos, "continue is not in a loop");
                    }
                    TokenKind::Fallthrough if !ctx.fallthrough_ok => {
                        let message = if ctx.final_switch_case {
                            "cannot fallthrough final case in switch"
                        } else if ctx.in_type_switch {
                            "cannot fallthrough in type switch"
                        } else {
                            "fallthrough statement out of place"
                        };
                        self.error(s.pos, message);
                    }
                    _ => {}
                }
            }
            StmtKind::Block(block) => self.block(block, inner),
            StmtKind::If { init, cond, then, els } => {
                let saved = self.scope;
                self.open_scope(ScopeKind::Block);
                self.simple_stmt(init.as_deref());
                self.condition(cond, "if");
                self.block(then, inner);
                if let Some(els) = els {
                    self.stmt(els, inner);
                }
                self.close_scope(saved);
            }
            StmtKind::Switch { init, tag, body } => self.switch_stmt(
                init.as_deref(),
                tag.as_ref(),
                body,
                inner,
            ),
            StmtKind::TypeSwitch { init, bind, x, body } => {
                self.type_switch_stmt(init.as_deref(), bind.as_ref(), x, body, inner)
            }
            StmtKind::Select(clauses) => self.select_stmt(clauses, inner),
            StmtKind::For { init, cond, post, body } => {
                let saved = self.scope;
                self.open_scope(ScopeKind::Block);
                self.simple_stmt(init.as_deref());
                if let Some(cond) = cond {
                    self.condition(cond, "for");
                }
                if let Some(post) = post {
                    if let StmtKind::Assign {
                        op: TokenKind::Define,
                        lhs,
                        ..
                    } = &post.kind
                    {
                        self.error(post.pos, "cannot declare in post statement");
                        self.use_exprs(lhs);
                    }
                    self.simple_stmt(Some(post));
                }
                let loop_ctx = StmtContext {
                    break_ok: true,
                    continue_ok: true,
                    ..inner
                };
                self.block(body, loop_ctx);
                self.close_scope(saved);
            }
            StmtKind::Range {
                key,
                value,
                define,
                x,
                body,
            } => {
                let loop_ctx = StmtContext {
                    break_ok: true,
                    continue_ok: true,
                    ..inner
                };
                self.range_stmt(s.pos, key.as_ref(), value.as_ref(), *define, x, body, loop_ctx);
            }
        }
    }

    fn condition(&mut self, cond: &'a Expr, keyword: &str) {
        let x = self.expr(cond);
        if !x.is_invalid() && !self.all(x.ty, BasicKind::is_boolean) {
            self.error(cond.pos, format!("non-boolean condition in {keyword} statement"));
        }
    }

    fn expr_stmt(&mut self, e: &'a Expr) {
        let x = self.raw_expr(e, None);
        let inner = e.unparen();
        let statement = match &inner.kind {
            ExprKind::Call { .. } => self.call_kind(inner) == Some(CallKind::Statement),
            ExprKind::Unary {
                op: TokenKind::Arrow, ..
            } => true,
            _ => false,
        };
        let message = match x.mode {
            Mode::Invalid => return,
            Mode::Builtin(_) => "must be called",
            Mode::TypeExpr => "is not an expression",
            _ if statement => return,
            _ => "is not used",
        };
        let d = self.describe(&x);
        self.error(x.pos, format!("{d} {message}"));
    }

    fn suspended_call(&mut self, keyword: &str, call: &'a Expr) {
        if !matches!(call.kind, ExprKind::Call { .. }) {
            self.error(call.pos, format!("expression in {keyword} must be function call"));
            self.use_exprs(std::slice::from_ref(call));
            return;
        }
        let x = self.raw_expr(call, None);
        let message = match self.call_kind(call) {
            Some(CallKind::Conversion) => "requires function call, not conversion",
            Some(CallKind::Expression) => "discards result of",
            _ => return,
        };
        let d = self.describe(&x);
        self.error(x.pos, format!("{keyword} {message} {d}"));
    }

    fn send_stmt(&mut self, pos: Pos, chan: &'a Expr, value: &'a Expr) {
        let ch = self.expr(chan);
        let mut val = self.expr(value);
        if ch.is_invalid() || val.is_invalid() {
            return;
        }
        if self.tcx.is_permissive(ch.ty) {
            return;
        }
        let (dir, elem) = match self.tcx.under(ch.ty) {
            Type::Chan { dir, elem } => (*dir, *elem),
            _ => {
                let d = self.describe(&ch);
                self.error(pos, format!("invalid operation: cannot send to non-channel {d}"));
                return;
            }
        };
        if dir == ChanDir::Recv {
            let d = self.describe(&ch);
            self.error(pos, format!("invalid operation: cannot send to receive-only channel {d}"));
            return;
        }
        self.assignment(&mut val, Some(elem), "send");
    }

    // ========================================================================
    // Switch and select
    // ========================================================================

    fn multiple_defaults(&mut self, first: &mut Option<Pos>, clause_pos: Pos) {
        match first {
            Some(first) => {
                let at = self.fset.position(*first);
                self.error(clause_pos, format!("multiple defaults (first at {at})"));
            }
            None => *first = Some(clause_pos),
        }
    }

    fn switch_stmt(
        &mut self,
        init: Option<&'a Stmt>,
        tag: Option<&'a Expr>,
        body: &'a [CaseClause],
        ctx: StmtContext,
    ) {
        let saved = self.scope;
        self.open_scope(ScopeKind::Block);
        self.simple_stmt(init);

        let x = match tag {
            Some(tag) => {
                let mut x = self.expr(tag);
                self.assignment(&mut x, None, "switch expression");
                if !x.is_invalid() && !self.tcx.comparable(x.ty) && !self.tcx.has_nil(x.ty) {
                    let d = self.describe(&x);
                    let ts = self.type_string(x.ty);
                    self.error(x.pos, format!("cannot switch on {d} ({ts} is not comparable)"));
                    x.set_invalid();
                }
                x
            }
            None => {
                let pos = body.first().map_or(Pos::NONE, |c| c.pos);
                Operand::synthetic(
                    Mode::Constant(ConstValue::Bool(true)),
                    self.tcx.basic(BasicKind::Bool),
                    pos,
                )
            }
        };

        let mut first_default = None;
        let mut seen: Vec<(ConstValue, TypeId)> = Vec::new();
        let ctx = StmtContext { break_ok: true, ..ctx };
        for (i, clause) in body.iter().enumerate() {
            match &clause.list {
                Some(values) => self.case_values(&x, values, &mut seen),
                None => self.multiple_defaults(&mut first_default, clause.pos),
            }
            let mut clause_ctx = ctx;
            if i + 1 < body.len() {
                clause_ctx.fallthrough_ok = true;
            } else {
                clause_ctx.final_switch_case = true;
            }
            let outer = self.scope;
            self.open_scope(ScopeKind::Block);
            self.stmts(&clause.body, clause_ctx);
            self.close_scope(outer);
        }
        self.close_scope(saved);
    }

    fn case_values(
        &mut self,
        x: &Operand<'a>,
        values: &'a [Expr],
        seen: &mut Vec<(ConstValue, TypeId)>,
    ) {
        for e in values {
            let mut v = self.expr(e);
            if x.is_invalid() || v.is_invalid() {
                continue;
            }
            self.convert_untyped(&mut v, x.ty);
            if v.is_invalid() {
                continue;
            }
            // Compare the case value against the tag so errors point at the case.
            let mut res = v.clone();
            self.comparison(&mut res, x, TokenKind::Eql, true);
            if res.is_invalid() {
                continue;
            }
            if let Mode::Constant(value) = &v.mode {
                if value.is_unknown() {
                    continue;
                }
                if seen
                    .iter()
                    .any(|(seen_val, ty)| seen_val == value && self.tcx.identical(*ty, v.ty))
                {
                    let d = self.describe(&v);
                    self.error(v.pos, format!("duplicate case {d} in expression switch"));
                    continue;
                }
                seen.push((value.clone(), v.ty));
            }
        }
    }

    fn is_nil_expr(&mut self, e: &Expr) -> bool {
        e.unparen()
            .as_ident()
            .and_then(|name| self.lookup(name))
            .is_some_and(|obj| matches!(self.table.obj(obj).kind, ObjKind::Nil))
    }

    fn type_switch_stmt(
        &mut self,
        init: Option<&'a Stmt>,
        bind: Option<&'a Ident>,
        x_expr: &'a Expr,
        body: &'a [CaseClause],
        ctx: StmtContext,
    ) {
        let saved = self.scope;
        self.open_scope(ScopeKind::Block);
        self.simple_stmt(init);

        let bind = match bind {
            Some(ident) if ident.is_blank() => {
                self.error(ident.pos, "no new variable on left side of :=");
                None
            }
            other => other,
        };

        let x = self.expr(x_expr);
        if x.is_invalid() {
            self.close_scope(saved);
            return;
        }
        if self.tcx.is_type_param(x.ty) {
            let d = self.describe(&x);
            self.error(x.pos, format!("cannot use type switch on type parameter value {d}"));
            self.close_scope(saved);
            return;
        }
        if !self.tcx.is_permissive(x.ty) && !self.tcx.is_interface(x.ty) {
            let d = self.describe(&x);
            self.error(x.pos, format!("{d} is not an interface"));
            self.close_scope(saved);
            return;
        }

        let ctx = StmtContext {
            break_ok: true,
            in_type_switch: true,
            ..ctx
        };
        let mut first_default = None;
        let mut seen: Vec<(Option<TypeId>, Pos)> = Vec::new();
        let mut clause_vars = Vec::new();
        for clause in body {
            let single = match &clause.list {
                Some(types) => self.case_types(&x, types, &mut seen),
                None => {
                    self.multiple_defaults(&mut first_default, clause.pos);
                    None
                }
            };
            let outer = self.scope;
            self.open_scope(ScopeKind::Block);
            if let Some(bind) = bind {
                let ty = single.unwrap_or(x.ty);
                let obj = self.new_var(bind, ty);
                self.declare(self.scope, obj);
                clause_vars.push(obj);
            }
            self.stmts(&clause.body, ctx);
            self.close_scope(outer);
        }

        if let Some(bind) = bind {
            let used = clause_vars
                .iter()
                .any(|&obj| matches!(self.table.obj(obj).kind, ObjKind::Var { used: true, .. }));
            if !used {
                self.error(bind.pos, format!("{} declared and not used", bind.name));
            }
        }
        self.close_scope(saved);
    }

    /// Check the types of a type switch case. Returns the case type if the
    /// clause lists exactly one non-nil type.
    fn case_types(
        &mut self,
        x: &Operand<'a>,
        types: &'a [Expr],
        seen: &mut Vec<(Option<TypeId>, Pos)>,
    ) -> Option<TypeId> {
        let mut single = None;
        for e in types {
            let t = if self.is_nil_expr(e) {
                self.expr(e);
                None
            } else {
                let t = self.type_expr(e);
                if self.tcx.is_invalid(t) {
                    continue;
                }
                Some(t)
            };
            let duplicate = seen.iter().any(|(other, _)| match (other, t) {
                (None, None) => true,
                (Some(a), Some(b)) => self.tcx.identical(*a, b),
                _ => false,
            });
            if duplicate {
                let ts = t.map_or_else(|| "nil".to_string(), |t| self.type_string(t));
                self.error(e.pos, format!("duplicate case {ts} in type switch"));
                continue;
            }
            seen.push((t, e.pos));
            if let Some(t) = t {
                self.type_assertion(e, x, t, true);
            }
            single = t;
        }
        if types.len() == 1 {
            single
        } else {
            None
        }
    }

    fn select_stmt(&mut self, clauses: &'a [CommClause], ctx: StmtContext) {
        let ctx = StmtContext { break_ok: true, ..ctx };
        let mut first_default = None;
        for clause in clauses {
            let valid = match clause.comm.as_deref() {
                None => {
                    self.multiple_defaults(&mut first_default, clause.pos);
                    true
                }
                Some(comm) => match &comm.kind {
                    StmtKind::Send { .. } => true,
                    StmtKind::Expr(e) => is_receive(e),
                    StmtKind::Assign { rhs, .. } => matches!(rhs.as_slice(), [e] if is_receive(e)),
                    _ => false,
                },
            };
            if !valid {
                let at = clause.comm.as_ref().map_or(clause.pos, |c| c.pos);
                self.error(at, "select case must be receive, send or assign recv");
                continue;
            }
            let outer = self.scope;
            self.open_scope(ScopeKind::Block);
            if let Some(comm) = clause.comm.as_deref() {
                self.stmt(comm, ctx);
            }
            self.stmts(&clause.body, ctx);
            self.close_scope(outer);
        }
    }

    // ========================================================================
    // Range
    // ========================================================================

    /// Key and value types of ranging over `x`, or the reason it fails.
    fn range_types(
        &self,
        x: &Operand<'a>,
    ) -> Result<(TypeId, Option<TypeId>), Option<&'static str>> {
        let int = self.tcx.basic(BasicKind::Int);
        if self.tcx.is_permissive(x.ty) {
            return Ok((TypeId::OPAQUE, Some(TypeId::OPAQUE)));
        }
        let under = match self.tcx.under(x.ty) {
            Type::Pointer(base) if matches!(self.tcx.under(*base), Type::Array { .. }) => {
                self.tcx.under(*base)
            }
            other => other,
        };
        match under {
            Type::Basic(kind) if kind.is_string() => Ok((
                int,
                Some(self.tcx.basic(BasicKind::Rune)),
            )),
            Type::Basic(kind) if kind.is_integer() => Ok((x.ty, None)),
            Type::Array { elem, .. } | Type::Slice(elem) => Ok((int, Some(*elem))),
            Type::Map { key, value } => Ok((*key, Some(*value))),
            Type::Chan { dir, elem } => {
                if *dir == ChanDir::Send {
                    Err(Some("receive from send-only channel"))
                } else {
                    Ok((*elem, None))
                }
            }
            _ => Err(None),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn range_stmt(
        &mut self,
        pos: Pos,
        key: Option<&'a Expr>,
        value: Option<&'a Expr>,
        define: bool,
        x_expr: &'a Expr,
        body: &'a Block,
        ctx: StmtContext,
    ) {
        let saved = self.scope;
        self.open_scope(ScopeKind::Block);

        let x = self.expr(x_expr);
        let mut types = [None, None];
        if !x.is_invalid() {
            match self.range_types(&x) {
                Ok((k, v)) => {
                    if value.is_some() && v.is_none() {
                        let d = self.describe(&x);
                        self.error(
                            x.pos,
                            format!("range over {d} permits only one iteration variable"),
                        );
                    }
                    types = [Some(k), v];
                }
                Err(cause) => {
                    let d = self.describe(&x);
                    match cause {
                        Some(cause) => self.error(x.pos, format!("cannot range over {d}: {cause}")),
                        None => self.error(x.pos, format!("cannot range over {d}")),
                    }
                }
            }
        }

        let lhs = [key, value];
        if define {
            let mut vars = Vec::new();
            for (lhs, ty) in lhs.into_iter().zip(types) {
                let Some(lhs) = lhs else {
                    continue;
                };
                let Some(name) = lhs.as_ident() else {
                    self.error(lhs.pos, format!("non-name {lhs} on left side of :="));
                    self.use_exprs(std::slice::from_ref(lhs));
                    continue;
                };
                let ident = Ident::new(name, lhs.pos);
                let obj = self.new_var(&ident, TypeId::INVALID);
                if let Some(ty) = ty {
                    let mut v = self.iteration_value(&x, ty);
                    self.init_var(obj, None, &mut v, "range clause");
                }
                vars.push(obj);
            }
            if vars.is_empty() {
                self.error(pos, "no new variables on left side of :=");
            }
            for obj in vars {
                self.declare_local(obj);
            }
        } else {
            for (lhs, ty) in lhs.into_iter().zip(types) {
                let Some(lhs) = lhs else {
                    continue;
                };
                match ty {
                    Some(ty) => {
                        let mut v = self.iteration_value(&x, ty);
                        self.assign_var(lhs, &mut v, "range clause");
                    }
                    None => {
                        self.use_lhs(std::slice::from_ref(lhs));
                    }
                }
            }
        }

        self.block(body, ctx);
        self.close_scope(saved);
    }

    /// The operand assigned to an iteration variable of type `ty`.
    fn iteration_value(&self, x: &Operand<'a>, ty: TypeId) -> Operand<'a> {
        let mode = if ty == x.ty { x.mode.clone() } else { Mode::Value };
        let mut v = x.clone();
        v.mode = mode;
        v.ty = ty;
        v
    }

    // ========================================================================
    // Labels
    // ========================================================================

    /// Check labels and labeled branches of a function body.
    pub(super) fn check_labels(&mut self, body: &'a [Stmt]) {
        let mut all: FxHashMap<&'a str, LabelState> = FxHashMap::default();
        let mut blocks = Vec::new();
        let forward = self.block_branches(&mut all, &mut blocks, None, body);

        for jump in forward {
            let name = jump.name.as_str();
            match all.get_mut(name) {
                Some(label) => {
                    label.used = true;
                    self.error(jump.pos, format!("goto {name} jumps into block"));
                }
                None => self.error(jump.pos, format!("label {name} not declared")),
            }
        }

        let mut unused: Vec<(Pos, &str)> = all
            .iter()
            .filter(|(_, label)| !label.used)
            .map(|(name, label)| (label.pos, *name))
            .collect();
        unused.sort();
        for (pos, name) in unused {
            self.error(pos, format!("label {name} declared and not used"));
        }
    }

    /// Walk one block; returns the `goto`s whose label is not (yet) visible.
    fn block_branches(
        &mut self,
        all: &mut FxHashMap<&'a str, LabelState>,
        blocks: &mut Vec<LabelBlock<'a>>,
        labeled: Option<&'a Stmt>,
        list: &'a [Stmt],
    ) -> Vec<&'a Ident> {
        blocks.push(LabelBlock {
            labeled,
            labels: Vec::new(),
        });
        let mut jumps = Jumps::default();
        for s in list {
            self.stmt_branches(all, blocks, &mut jumps, s, None);
        }
        blocks.pop();
        jumps.forward
    }

    fn stmt_branches(
        &mut self,
        all: &mut FxHashMap<&'a str, LabelState>,
        blocks: &mut Vec<LabelBlock<'a>>,
        jumps: &mut Jumps<'a>,
        s: &'a Stmt,
        labeled: Option<&'a Stmt>,
    ) {
        match &s.kind {
            StmtKind::Decl(gen) if gen.keyword == TokenKind::Var => jumps.record_var_decl(s.pos),
            StmtKind::Assign {
                op: TokenKind::Define, ..
            } => jumps.record_var_decl(s.pos),
            StmtKind::Labeled { label, stmt } => {
                let name = label.name.as_str();
                if name != "_" {
                    if all.contains_key(name) {
                        self.error(label.pos, format!("label {name} already declared"));
                    } else {
                        all.insert(
                            name,
                            LabelState {
                                pos: label.pos,
                                used: false,
                            },
                        );
                        if let Some(block) = blocks.last_mut() {
                            block.labels.push(name);
                        }
                    }
                    let (matched, pending): (Vec<&'a Ident>, Vec<&'a Ident>) =
                        std::mem::take(&mut jumps.forward)
                            .into_iter()
                            .partition(|jump| jump.name == name);
                    jumps.forward = pending;
                    for jump in matched {
                        if let Some(label) = all.get_mut(name) {
                            label.used = true;
                        }
                        if let Some(decl) = jumps.jumps_over_var_decl(jump) {
                            let line = self.fset.position(decl).line;
                            self.error(
                                jump.pos,
                                format!(
                                    "goto {name} jumps over variable declaration at line {line}"
                                ),
                            );
                        }
                    }
                }
                self.stmt_branches(all, blocks, jumps, stmt, Some(s));
            }
            StmtKind::Branch { tok, label: Some(label) } => {
                let name = label.name.as_str();
                let target = || {
                    blocks
                        .iter()
                        .rev()
                        .filter_map(|b| b.labeled)
                        .find_map(|l| match &l.kind {
                            StmtKind::Labeled { label, stmt } if label.name == name => {
                                Some(&stmt.kind)
                            }
                            _ => None,
                        })
                };
                match tok {
                    TokenKind::Break => {
                        let valid = matches!(
                            target(),
                            Some(
                                StmtKind::For { .. }
                                    | StmtKind::Range { .. }
                                    | StmtKind::Switch { .. }
                                    | StmtKind::TypeSwitch { .. }
                                    | StmtKind::Select(_)
                            )
                        );
                        if !valid {
                            self.error(label.pos, format!("invalid break label {name}"));
                            return;
                        }
                    }
                    TokenKind::Continue => {
                        let valid = matches!(
                            target(),
                            Some(StmtKind::For { .. } | StmtKind::Range { .. }),
                        );
                        if !valid {
                            self.error(label.pos, format!("invalid continue label {name}"));
                            return;
                        }
                    }
                    TokenKind::Goto => {
                        let visible = blocks.iter().rev().any(|b| b.labels.contains(&name));
                        if !visible {
                            jumps.forward.push(label);
                            return;
                        }
                    }
                    _ => return,
                }
                if let Some(label) = all.get_mut(name) {
                    label.used = true;
                }
            }
            StmtKind::Block(block) => {
                let forward = self.block_branches(all, blocks, labeled, &block.stmts);
                jumps.forward.extend(forward);
            }
            StmtKind::If { then, els, .. } => {
                let forward = self.block_branches(all, blocks, labeled, &then.stmts);
                jumps.forward.extend(forward);
                if let Some(els) = els {
                    self.stmt_branches(all, blocks, jumps, els, labeled);
                }
            }
            StmtKind::Switch { body, .. } | StmtKind::TypeSwitch { body, .. } => {
                for clause in body {
                    let forward = self.block_branches(all, blocks, labeled, &clause.body);
                    jumps.forward.extend(forward);
                }
            }
            StmtKind::Select(clauses) => {
                for clause in clauses {
                    let forward = self.block_branches(all, blocks, labeled, &clause.body);
                    jumps.forward.extend(forward);
                }
            }
            StmtKind::For { body, .. } | StmtKind::Range { body, .. } => {
                let forward = self.block_branches(all, blocks, labeled, &body.stmts);
                jumps.forward.extend(forward);
            }
            _ => {}
        }
    }

    // ========================================================================
    // Terminating statements
    // ========================================================================

    pub(super) fn is_terminating_list(&self, list: &[Stmt], label: &str) -> bool {
        trim_trailing_empty(list)
            .last()
            .is_some_and(|s| self.is_terminating(s, label))
    }

    fn is_terminating(&self, s: &Stmt, label: &str) -> bool {
        match &s.kind {
            StmtKind::Labeled { label, stmt } => self.is_terminating(stmt, &label.name),
            StmtKind::Expr(e) => {
                let call = e.unparen();
                matches!(call.kind, ExprKind::Call { .. }) && self.panics.contains(&expr_key(call))
            }
            StmtKind::Return(_) => true,
            StmtKind::Branch { tok, .. } => matches!(tok, TokenKind::Goto | TokenKind::Fallthrough),
            StmtKind::Block(block) => self.is_terminating_list(&block.stmts, ""),
            StmtKind::If { then, els, .. } => els
                .as_ref()
                .is_some_and(|els| self.is_terminating_list(&then.stmts, "") && self.is_terminating(
                    els,
                    "",
                )),
            StmtKind::Switch { body, .. } | StmtKind::TypeSwitch { body, .. } => {
                let mut has_default = false;
                for clause in body {
                    has_default |= clause.list.is_none();
                    if !self.is_terminating_list(&clause.body, "") || has_break_list(
                        &clause.body,
                        label,
                        true,
                    ) {
                        return false;
                    }
                }
                has_default
            }
            StmtKind::Select(clauses) => clauses
                .iter()
                .all(|c| self.is_terminating_list(&c.body, "") && !has_break_list(
                    &c.body,
                    label,
                    true,
                )),
            StmtKind::For { cond: None, body, .. } => !has_break_list(&body.stmts, label, true),
            _ => false,
        }
    }
}

fn is_receive(e: &Expr) -> bool {
    matches!(
        e.unparen().kind,
        ExprKind::Unary {
            op: TokenKind::Arrow, ..
        }
    )
}

/// Whether `s` contains a break out of the statement labeled `label` or,
/// if `implicit`, out of the closest breakable statement.
fn has_break(s: &Stmt, label: &str, implicit: bool) -> bool {
    match &s.kind {
        StmtKind::Labeled { stmt, .. } => has_break(stmt, label, implicit),
        StmtKind::Branch {
            tok: TokenKind::Break,
            label: target,
        } => match target {
            None => implicit,
            Some(target) => target.name == label,
        },
        StmtKind::Block(block) => has_break_list(&block.stmts, label, implicit),
        StmtKind::If { then, els, .. } => {
            has_break_list(&then.stmts, label, implicit)
                || els.as_ref().is_some_and(|els| has_break(els, label, implicit))
        }
        StmtKind::Switch { body, .. } | StmtKind::TypeSwitch { body, .. } => {
            !label.is_empty() && body.iter().any(|c| has_break_list(&c.body, label, false))
        }
        StmtKind::Select(clauses) => !label.is_empty() && clauses.iter().any(|c| has_break_list(
            &c.body,
            label,
            false,
        )),
        StmtKind::For { body, .. } | StmtKind::Range { body, .. } => {
            !label.is_empty() && has_break_list(&body.stmts, label, false)
        }
        _ => false,
    }
}

fn has_break_list(list: &[Stmt], label: &str, implicit: bool) -> bool {
    list.iter().any(|s| has_break(s, label, implicit))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branch(tok: TokenKind, label: Option<&str>) -> Stmt {
        Stmt::new(
            Pos::NONE,
            StmtKind::Branch {
                tok,
                label: label.map(|l| Ident::new(l, Pos::NONE)),
            },
        )
    }

    #[test]
    fn test_trim_trailing_empty() {
        let list = vec![branch(TokenKind::Break, None), Stmt::new(Pos::NONE, StmtKind::Empty)];
        assert_eq!(trim_trailing_empty(&list).len(), 1);
        let empty = vec![Stmt::new(Pos::NONE, StmtKind::Empty)];
        assert!(trim_trailing_empty(&empty).is_empty());
    }

    #[test]
    fn test_has_break() {
        let plain = branch(TokenKind::Break, None);
        assert!(has_break(&plain, "", true));
        assert!(!has_break(&plain, "", false));

        let labeled = branch(TokenKind::Break, Some("L"));
        assert!(has_break(&labeled, "L", false));
        assert!(!has_break(&labeled, "M", true));

        let nested = Stmt::new(
            Pos::NONE,
            StmtKind::For {
                init: None,
                cond: None,
                post: None,
                body: Block {
                    lbrace: Pos::NONE,
                    stmts: vec![branch(TokenKind::Break, None)],
                    rbrace: Pos::NONE,
                },
            },
        );
        // An unlabeled break in a nested loop leaves only that loop.
        assert!(!has_break(&nested, "", true));
    }
}
