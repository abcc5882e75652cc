//! Declarations: lazy resolution of package-level objects, local
//! declarations and function bodies.

use crate::checker::constant::ConstValue;
use crate::checker::objects::{ObjId, ObjKind, ObjState, Object, ScopeId, ScopeKind};
use crate::checker::types::{BasicKind, Type, TypeId};
use crate::parser::ast::{
    Block, Expr, ExprKind, FuncDecl, GenDecl, Ident, Spec, TypeSpec, ValueSpec,
};
use crate::parser::{Pos, TokenKind};

use super::typexpr::ALIAS_DEPTH;
use super::{Checker, DeclInfo, FuncContext, FuncInfo, Mode, Operand};

impl DeclInfo<'_> {
    /// File scope the declaration appears in.
    pub(crate) fn scope(&self) -> ScopeId {
        match self {
            DeclInfo::Const { scope, .. }
            | DeclInfo::Var { scope, .. }
            | DeclInfo::Type { scope, .. }
            | DeclInfo::Func { scope, .. } => *scope,
        }
    }
}

impl<'a> Checker<'a> {
    // ========================================================================
    // Package-level objects
    // ========================================================================

    /// Resolve a package-level object. A reference to an object that is
    /// still being resolved is a cycle.
    pub(super) fn resolve_obj(&mut self, obj: ObjId) {
        match self.table.obj(obj).state {
            ObjState::Resolved => return,
            ObjState::Resolving => {
                self.value_cycle(obj);
                return;
            }
            ObjState::Unresolved => {}
        }
        let Some(info) = self.decls.get(&obj).cloned() else {
            self.table.obj_mut(obj).state = ObjState::Resolved;
            return;
        };

        self.table.obj_mut(obj).state = ObjState::Resolving;
        self.decl_path.push(obj);
        let saved_scope = std::mem::replace(&mut self.scope, info.scope());
        let saved_ctx = std::mem::take(&mut self.ctx);
        let saved_iota = self.iota.take();

        match info {
            DeclInfo::Const { ty, init, iota, .. } => self.const_decl(obj, ty, init, iota),
            DeclInfo::Var { spec, objs, .. } => self.package_var_decl(obj, spec, &objs),
            DeclInfo::Type { spec, .. } => self.type_decl(obj, spec),
            DeclInfo::Func { decl, .. } => self.func_decl(obj, decl),
        }

        self.iota = saved_iota;
        self.ctx = saved_ctx;
        self.scope = saved_scope;
        self.decl_path.pop();
        self.table.obj_mut(obj).state = ObjState::Resolved;
    }

    fn value_cycle(&mut self, obj: ObjId) {
        let cycle: Vec<ObjId> = match self.decl_path.iter().position(|o| *o == obj) {
            Some(start) => self.decl_path[start..].to_vec(),
            None => vec![obj],
        };
        if cycle.iter().any(|o| self.cycle_reported.contains(o)) {
            return;
        }
        self.cycle_reported.extend(cycle.iter().copied());
        let Some(&first) = cycle.iter().min_by_key(|o| self.table.obj(**o).pos) else {
            return;
        };
        let all_values = cycle
            .iter()
            .all(|o| matches!(self.table.obj(*o).kind, ObjKind::Const(_) | ObjKind::Var { .. }));
        let (name, pos) = {
            let o = self.table.obj(first);
            (o.name.clone(), o.pos)
        };
        let message = match (cycle.len(), all_values) {
            (1, true) => format!("initialization cycle: {name} refers to itself"),
            (_, true) => format!("initialization cycle for {name}"),
            (1, false) => format!("invalid cycle in declaration: {name} refers to itself"),
            (_, false) => format!("invalid cycle in declaration of {name}"),
        };
        self.error(pos, message);
    }

    fn const_decl(
        &mut self,
        obj: ObjId,
        ty: Option<&'a Expr>,
        init: Option<&'a Expr>,
        iota: usize,
    ) {
        let saved_iota = self.iota.replace(ConstValue::Int(iota as i128));
        let declared = match ty {
            Some(ty_expr) => {
                let t = self.type_expr(ty_expr);
                if !self.tcx.is_permissive(t) && !self.is_const_type(t) {
                    let ts = self.type_string(t);
                    self.error(ty_expr.pos, format!("invalid constant type {ts}"));
                    self.table.obj_mut(obj).ty = TypeId::INVALID;
                    self.iota = saved_iota;
                    return;
                }
                Some(t)
            }
            None => None,
        };
        match init {
            Some(init) => {
                let mut x = self.expr(init);
                self.init_const(obj, declared, &mut x);
            }
            None => self.table.obj_mut(obj).ty = declared.unwrap_or(TypeId::INVALID),
        }
        self.iota = saved_iota;
    }

    fn init_const(&mut self, obj: ObjId, declared: Option<TypeId>, x: &mut Operand<'a>) {
        if x.is_invalid()
            || self.tcx.is_invalid(x.ty)
            || declared.is_some_and(|t| self.tcx.is_invalid(t))
        {
            self.table.obj_mut(obj).ty = declared.unwrap_or(TypeId::INVALID);
            return;
        }
        if self.tcx.is_permissive(x.ty) || declared.is_some_and(|t| self.tcx.is_permissive(t)) {
            let o = self.table.obj_mut(obj);
            o.ty = declared.unwrap_or(x.ty);
            o.kind = ObjKind::Const(ConstValue::Unknown);
            return;
        }
        if !x.is_constant() {
            let d = self.describe(x);
            self.error(x.pos, format!("{d} is not constant"));
            self.table.obj_mut(obj).ty = declared.unwrap_or(TypeId::INVALID);
            return;
        }
        let target = declared.unwrap_or(x.ty);
        self.table.obj_mut(obj).ty = target;
        self.assignment(x, Some(target), "constant declaration");
        if let Mode::Constant(value) = &x.mode {
            self.table.obj_mut(obj).kind = ObjKind::Const(value.clone());
        }
    }

    /// Declared type of a `var` spec, evaluated once for all its names.
    fn spec_type(&mut self, spec: &'a ValueSpec) -> Option<TypeId> {
        let ty = spec.ty.as_ref()?;
        if let Some(&t) = self.spec_types.get(&spec.pos) {
            return Some(t);
        }
        let t = self.type_expr(ty);
        self.spec_types.insert(spec.pos, t);
        Some(t)
    }

    fn package_var_decl(&mut self, obj: ObjId, spec: &'a ValueSpec, objs: &[ObjId]) {
        let declared = self.spec_type(spec);
        if spec.values.len() == 1 && objs.len() > 1 {
            // One multi-valued initializer assigns all names at once.
            for &o in objs {
                self.table.obj_mut(o).state = ObjState::Resolving;
            }
            let lhs: Vec<(ObjId, Option<TypeId>)> = objs.iter().map(|o| (*o, declared)).collect();
            self.init_vars(&lhs, &spec.values);
            for &o in objs {
                self.table.obj_mut(o).state = ObjState::Resolved;
            }
            return;
        }
        let index = objs.iter().position(|o| *o == obj).unwrap_or(0);
        self.var_decl(obj, declared, spec.values.get(index));
    }

    fn var_decl(&mut self, obj: ObjId, declared: Option<TypeId>, init: Option<&'a Expr>) {
        if let Some(t) = declared {
            self.table.obj_mut(obj).ty = t;
        }
        let Some(init) = init else {
            if declared.is_none() {
                self.table.obj_mut(obj).ty = TypeId::INVALID;
            }
            return;
        };
        let mut x = self.expr(init);
        self.init_var(obj, declared, &mut x, "variable declaration");
    }

    fn type_decl(&mut self, obj: ObjId, spec: &'a TypeSpec) {
        if spec.assign {
            self.type_path.push((obj, ALIAS_DEPTH));
            let ty = self.type_expr(&spec.ty);
            self.type_path.pop();
            self.table.obj_mut(obj).ty = ty;
            if self.tcx.named(ty).is_some_and(|info| info.pkg.is_none()) {
                self.attach_methods(obj, ty);
            }
            return;
        }

        let named = self.tcx.new_named(&spec.name.name, None, Some(obj));
        self.table.obj_mut(obj).ty = named;

        let saved = self.scope;
        if !spec.type_params.is_empty() {
            self.open_scope(ScopeKind::Block);
            let tparams = self.declare_type_params(&spec.type_params);
            if let Some(info) = self.tcx.named_mut(named) {
                info.type_params = tparams;
            }
        }
        self.type_path.push((obj, self.indirection));
        let rhs = self.type_expr(&spec.ty);
        self.type_path.pop();
        self.close_scope(saved);

        let mut underlying = self.tcx.underlying(rhs);
        if self.tcx.is_type_param(rhs) {
            self.error(spec.ty.pos, "cannot use a type parameter as RHS in type declaration");
            underlying = TypeId::INVALID;
        }
        if let Some(info) = self.tcx.named_mut(named) {
            info.underlying = underlying;
        }
        self.attach_methods(obj, named);
    }

    /// Attach the methods declared on `type_obj` to `named`.
    fn attach_methods(&mut self, type_obj: ObjId, named: TypeId) {
        let Some(methods) = self.methods.get(&type_obj).cloned() else {
            return;
        };
        let fields: Vec<String> = match self.tcx.under(named) {
            Type::Struct(fields) => fields.iter().map(|f| f.name.clone()).collect(),
            _ => Vec::new(),
        };
        let type_name = self.type_string(named);
        let mut seen: Vec<(String, Pos)> = Vec::new();
        for method in methods {
            let (name, pos) = {
                let o = self.table.obj(method);
                (o.name.clone(), o.pos)
            };
            if let Some((_, prev)) = seen.iter().find(|(n, _)| *n == name) {
                let at = self.fset.position(*prev);
                self.error(pos, format!("method {type_name}.{name} already declared at {at}"));
                continue;
            }
            seen.push((name.clone(), pos));
            if fields.contains(&name) {
                self.error(pos, format!("field and method with the same name {name}"));
                continue;
            }
            if let Some(info) = self.tcx.named_mut(named) {
                if !info.methods.contains(&method) {
                    info.methods.push(method);
                }
            }
        }
    }

    fn func_decl(&mut self, obj: ObjId, decl: &'a FuncDecl) {
        let saved = self.scope;
        let scope = self.open_scope(ScopeKind::Func);
        let mut params = Vec::new();
        if let Some(recv) = &decl.recv {
            self.declare_receiver_type_params(&recv.ty);
            if let Some(tparam) = decl.type_params.first() {
                self.error(tparam.pos, "methods cannot have type parameters");
            }
            let recv_ty = self.type_expr(&recv.ty);
            let at = recv.names.first().map_or(recv.ty.pos, |n| n.pos);
            self.check_receiver(at, recv_ty);
            params.push((recv.names.first().cloned(), recv_ty));
        } else if !decl.type_params.is_empty() {
            self.declare_type_params(&decl.type_params);
        }
        let (sig_params, results, variadic) = self.signature_of(&decl.ty);
        let sig = self.make_signature(&sig_params, &results, variadic);
        params.extend(sig_params);
        self.close_scope(saved);

        self.table.obj_mut(obj).ty = sig;
        self.funcs.insert(
            obj,
            FuncInfo {
                scope,
                params,
                results,
                sig,
            },
        );
    }

    /// Declare the type parameters named in a receiver such as `*List[T]`.
    fn declare_receiver_type_params(&mut self, ty: &'a Expr) {
        let mut e = ty.unparen();
        if let ExprKind::Star(inner) = &e.kind {
            e = inner.unparen();
        }
        let ExprKind::Index { indices, .. } = &e.kind else {
            return;
        };
        for index in indices {
            let Some(name) = index.as_ident() else {
                self.error(
                    index.pos,
                    format!("receiver type parameter {index} must be an identifier"),
                );
                continue;
            };
            let tp = self.tcx.new_type_param(name, self.universe.any);
            let obj = self.table.new_object(Object::new(name, ObjKind::TypeName, tp, index.pos));
            self.declare(self.scope, obj);
        }
    }

    fn check_receiver(&mut self, at: Pos, recv: TypeId) {
        if self.tcx.is_invalid(recv) {
            return;
        }
        let base = match self.tcx.get(recv) {
            Type::Pointer(base) => *base,
            _ => recv,
        };
        let base = self.tcx.origin(base);
        let base_str = self.type_string(base);
        if base == TypeId::OPAQUE {
            self.error(at, "cannot define new methods on non-local type");
            return;
        }
        let local = match self.tcx.named(base) {
            Some(info) => {
                info.pkg.is_none() && info.obj.is_some_and(|o| self.table.obj(o).pos != Pos::NONE)
            }
            None => {
                match self.tcx.get(base) {
                    Type::Basic(_) => {
                        self.error(
                            at,
                            format!("cannot define new methods on non-local type {base_str}"),
                        )
                    }
                    Type::TypeParam(_) => {
                        self.error(
                            at,
                            format!("cannot use a type parameter as receiver base type {base_str}"),
                        )
                    }
                    _ => {
                        let rs = self.type_string(recv);
                        self.error(at, format!("invalid receiver type {rs}"));
                    }
                }
                return;
            }
        };
        if !local {
            self.error(at, format!("cannot define new methods on non-local type {base_str}"));
            return;
        }
        let cause = match self.tcx.under(base) {
            Type::Basic(BasicKind::UnsafePointer) => "unsafe.Pointer",
            Type::Pointer(_) | Type::Interface(_) => "pointer or interface type",
            _ => return,
        };
        self.error(at, format!("invalid receiver type {base_str} ({cause})"));
    }

    // ========================================================================
    // Function bodies
    // ========================================================================

    pub(super) fn func_body_decl(&mut self, obj: ObjId, decl: &'a FuncDecl) {
        let Some(body) = &decl.body else {
            return;
        };
        self.obj_type(obj);
        let Some(info) = self.funcs.get(&obj).cloned() else {
            return;
        };
        let saved = std::mem::replace(&mut self.scope, info.scope);
        self.func_body(&info, body);
        self.scope = saved;
    }

    /// Check a function body in a new scope below the current one.
    pub(super) fn func_body(&mut self, info: &FuncInfo, body: &'a Block) {
        let named_results = info
            .results
            .iter()
            .any(|(name, _)| name.as_ref().is_some_and(|n| !n.name.is_empty()));
        let saved_ctx = std::mem::replace(
            &mut self.ctx,
            FuncContext {
                results: Some(info.results.iter().map(|(_, t)| *t).collect()),
                named_results,
                ..FuncContext::default()
            },
        );
        let saved_scope = self.scope;
        self.open_scope(ScopeKind::Func);
        for (name, ty) in info.params.iter().chain(&info.results) {
            if let Some(name) = name {
                let obj = self.new_var(name, *ty);
                self.declare(self.scope, obj);
            }
        }

        self.stmt_list(&body.stmts);
        self.check_labels(&body.stmts);
        if !info.results.is_empty() && !self.halted() && !self.is_terminating_list(
            &body.stmts,
            "",
        ) {
            self.error(body.rbrace, "missing return");
        }
        self.report_unused_locals();

        self.close_scope(saved_scope);
        self.ctx = saved_ctx;
    }

    fn report_unused_locals(&mut self) {
        let mut unused: Vec<(Pos, String)> = self
            .ctx
            .locals
            .iter()
            .filter_map(|&obj| {
                let o = self.table.obj(obj);
                match o.kind {
                    ObjKind::Var { used: false, .. } => Some((o.pos, o.name.clone())),
                    _ => None,
                }
            })
            .collect();
        unused.sort();
        for (pos, name) in unused {
            self.error(pos, format!("declared and not used: {name}"));
        }
    }

    // ========================================================================
    // Local declarations
    // ========================================================================

    /// A new variable, not yet declared in any scope.
    pub(super) fn new_var(&mut self, name: &Ident, ty: TypeId) -> ObjId {
        self.table.new_object(Object::new(
            &name.name,
            ObjKind::Var {
                used: false,
                local: true,
            },
            ty,
            name.pos,
        ))
    }

    /// Declare a local variable in the current scope; it takes part in
    /// the unused check.
    pub(super) fn declare_local(&mut self, obj: ObjId) {
        if self.declare(self.scope, obj) && self.table.obj(obj).name != "_" {
            self.ctx.locals.push(obj);
        }
    }

    pub(super) fn decl_stmt(&mut self, gen: &'a GenDecl) {
        match gen.keyword {
            TokenKind::Const => self.local_consts(gen),
            TokenKind::Var => {
                for spec in &gen.specs {
                    if let Spec::Value(spec) = spec {
                        self.local_vars(spec);
                    }
                }
            }
            TokenKind::Type => {
                for spec in &gen.specs {
                    if let Spec::Type(spec) = spec {
                        let mut object = Object::new(
                            &spec.name.name,
                            ObjKind::TypeName,
                            TypeId::INVALID,
                            spec.name.pos,
                        );
                        object.state = ObjState::Resolving;
                        let obj = self.table.new_object(object);
                        // The scope of a local type starts at its name.
                        self.declare(self.scope, obj);
                        self.type_decl(obj, spec);
                        self.table.obj_mut(obj).state = ObjState::Resolved;
                    }
                }
            }
            _ => {}
        }
    }

    fn local_consts(&mut self, gen: &'a GenDecl) {
        let mut last: Option<(Option<&'a Expr>, &'a [Expr])> = None;
        for spec in &gen.specs {
            let Spec::Value(spec) = spec else { continue };
            let inherited = spec.ty.is_none() && spec.values.is_empty() && last.is_some();
            let (ty, values) = match last {
                Some(prev) if inherited => prev,
                _ => (spec.ty.as_ref(), spec.values.as_slice()),
            };
            if !inherited {
                last = Some((ty, values));
            }
            let mut objs = Vec::with_capacity(spec.names.len());
            for (i, name) in spec.names.iter().enumerate() {
                let obj = self.table.new_object(Object::new(
                    &name.name,
                    ObjKind::Const(ConstValue::Unknown),
                    TypeId::INVALID,
                    name.pos,
                ));
                self.const_decl(obj, ty, values.get(i), spec.iota);
                objs.push(obj);
            }
            self.arity(spec.pos, &spec.names, values, true, inherited);
            for obj in objs {
                self.declare(self.scope, obj);
            }
        }
    }

    fn local_vars(&mut self, spec: &'a ValueSpec) {
        let declared = self.spec_type(spec);
        let objs: Vec<ObjId> = spec
            .names
            .iter()
            .map(|name| self.new_var(name, declared.unwrap_or(TypeId::INVALID)))
            .collect();
        if spec.values.len() == 1 && objs.len() > 1 {
            let lhs: Vec<(ObjId, Option<TypeId>)> = objs.iter().map(|o| (*o, declared)).collect();
            self.init_vars(&lhs, &spec.values);
        } else {
            for (i, &obj) in objs.iter().enumerate() {
                self.var_decl(obj, declared, spec.values.get(i));
            }
        }
        if spec.ty.is_none() || !spec.values.is_empty() {
            self.arity(spec.pos, &spec.names, &spec.values, false, false);
        }
        for obj in objs {
            self.declare_local(obj);
        }
    }
}
