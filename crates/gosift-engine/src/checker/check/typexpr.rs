//! Type expressions.

use rustc_hash::FxHashSet;

use crate::checker::constant::representable;
use crate::checker::importer::MemberKind;
use crate::checker::objects::{ObjId, ObjKind, ObjState, Object};
use crate::checker::types::{BasicKind, Field, Interface, Method, Signature, Type, TypeId};
use crate::parser::ast::{self, is_exported, Expr, ExprKind, FuncType, Ident, InterfaceElem};
use crate::parser::TokenKind;

use super::{Checker, Mode};

/// Start depth recorded for aliases, which may never refer to themselves.
pub(super) const ALIAS_DEPTH: u32 = u32::MAX;

/// A parameter or result with its optional name.
pub(crate) type Param = (Option<Ident>, TypeId);

impl<'a> Checker<'a> {
    /// Evaluate a type expression; errors yield `TypeId::INVALID`.
    pub(crate) fn type_expr(&mut self, e: &'a Expr) -> TypeId {
        let ty = self.type_expr_inner(e);
        if let Some(info) = self.tcx.named(ty) {
            if !info.type_params.is_empty() {
                let name = info.name.clone();
                self.error(e.pos, format!("cannot use generic type {name} without instantiation"));
                return TypeId::INVALID;
            }
        }
        ty
    }

    /// Evaluate a type expression found below a pointer, slice, map,
    /// channel or function: such references may be recursive.
    fn indirect_type(&mut self, e: &'a Expr) -> TypeId {
        self.indirection += 1;
        let ty = self.type_expr(e);
        self.indirection -= 1;
        ty
    }

    fn type_expr_inner(&mut self, e: &'a Expr) -> TypeId {
        match &e.kind {
            ExprKind::Bad => TypeId::INVALID,
            ExprKind::Ident(name) => self.type_ident(e, name),
            ExprKind::Selector { x, sel } => self.qualified_type(e, x, sel),
            ExprKind::Paren(inner) => self.type_expr_inner(inner),
            ExprKind::Index { x, indices } => self.instantiate(x, indices),
            ExprKind::Star(inner) => {
                let base = self.indirect_type(inner);
                self.tcx.pointer(base)
            }
            ExprKind::ArrayType { len: Some(len), elem } => {
                let len = self.array_length(len);
                let elem = self.type_expr(elem);
                self.tcx.intern(Type::Array { len, elem })
            }
            ExprKind::ArrayType { len: None, elem } => {
                self.error(e.pos, "invalid use of [...] array (outside a composite literal)");
                self.type_expr(elem);
                TypeId::INVALID
            }
            ExprKind::SliceType(elem) => {
                let elem = self.indirect_type(elem);
                self.tcx.slice(elem)
            }
            ExprKind::MapType { key, value } => {
                let k = self.indirect_type(key);
                let v = self.indirect_type(value);
                if !self.tcx.is_permissive(k)
                    && !self.tcx.comparable(k)
                    && !self.tcx.is_invalid(self.tcx.underlying(k))
                {
                    let ks = self.type_string(k);
                    self.error(key.pos, format!("invalid map key type {ks}"));
                }
                self.tcx.intern(Type::Map { key: k, value: v })
            }
            ExprKind::ChanType { dir, elem } => {
                let elem = self.indirect_type(elem);
                self.tcx.intern(Type::Chan { dir: *dir, elem })
            }
            ExprKind::FuncType(ft) => {
                self.indirection += 1;
                let ty = self.signature_type(ft);
                self.indirection -= 1;
                ty
            }
            ExprKind::StructType(fields) => self.struct_type(fields),
            ExprKind::InterfaceType(elems) => {
                self.indirection += 1;
                let ty = self.interface_type(elems);
                self.indirection -= 1;
                ty
            }
            _ => {
                self.error(e.pos, format!("{e} is not a type"));
                TypeId::INVALID
            }
        }
    }

    fn type_ident(&mut self, e: &'a Expr, name: &str) -> TypeId {
        if name == "_" {
            self.error(e.pos, "cannot use _ as value or type");
            return TypeId::INVALID;
        }
        let Some(obj) = self.lookup(name) else {
            if self.in_opaque_dot_scope() {
                return TypeId::OPAQUE;
            }
            self.error(e.pos, format!("undefined: {name}"));
            return TypeId::INVALID;
        };
        match self.table.obj(obj).kind {
            ObjKind::TypeName => self.type_name_type(obj),
            ObjKind::PkgName { .. } => {
                self.mark_used(obj);
                self.error(e.pos, format!("use of package {name} not in selector"));
                TypeId::INVALID
            }
            _ => {
                self.error(e.pos, format!("{name} is not a type"));
                TypeId::INVALID
            }
        }
    }

    /// Type denoted by a type name, resolving it if needed and detecting
    /// invalid recursive definitions.
    pub(crate) fn type_name_type(&mut self, obj: ObjId) -> TypeId {
        match self.table.obj(obj).state {
            ObjState::Resolved => self.table.obj(obj).ty,
            ObjState::Unresolved => self.obj_type(obj),
            ObjState::Resolving => {
                if let Some(index) = self.type_path.iter().position(|(o, _)| *o == obj) {
                    let start = self.type_path[index].1;
                    if start == ALIAS_DEPTH || start == self.indirection {
                        self.type_cycle(index);
                        return TypeId::INVALID;
                    }
                }
                self.table.obj(obj).ty
            }
        }
    }

    fn type_cycle(&mut self, index: usize) {
        let cycle: Vec<ObjId> = self.type_path[index..].iter().map(|(o, _)| *o).collect();
        let Some(&first) = cycle.iter().min_by_key(|o| self.table.obj(**o).pos) else {
            return;
        };
        if cycle.iter().any(|o| self.cycle_reported.contains(o)) {
            return;
        }
        self.cycle_reported.extend(cycle.iter().copied());
        let (name, pos) = {
            let o = self.table.obj(first);
            (o.name.clone(), o.pos)
        };
        if cycle.len() == 1 {
            self.error(pos, format!("invalid recursive type: {name} refers to itself"));
        } else {
            self.error(pos, format!("invalid recursive type {name}"));
        }
    }

    fn qualified_type(&mut self, e: &'a Expr, x: &'a Expr, sel: &'a Ident) -> TypeId {
        let pkg = x.as_ident().and_then(|name| self.lookup(name)).filter(|obj| {
            matches!(self.table.obj(*obj).kind, ObjKind::PkgName { .. })
        });
        let Some(pkg_obj) = pkg else {
            self.error(e.pos, format!("{e} is not a type"));
            return TypeId::INVALID;
        };
        self.mark_used(pkg_obj);
        let ObjKind::PkgName { package, .. } = &self.table.obj(pkg_obj).kind else {
            return TypeId::INVALID;
        };
        let package = package.clone();

        if package.path == "unsafe" {
            return match self.table.lookup_local(self.universe.unsafe_scope, &sel.name) {
                Some(obj) if self.table.obj(obj).is_type() => self.table.obj(obj).ty,
                Some(_) => {
                    self.error(e.pos, format!("{e} is not a type"));
                    TypeId::INVALID
                }
                None => {
                    self.error(sel.pos, format!("undefined: {e}"));
                    TypeId::INVALID
                }
            };
        }
        if package.fake {
            return TypeId::OPAQUE;
        }
        if !is_exported(&sel.name) {
            self.error(
                sel.pos,
                format!("name {} not exported by package {}", sel.name, package.name),
            );
            return TypeId::INVALID;
        }
        match package.members.get(&sel.name) {
            Some(MemberKind::Type) => TypeId::OPAQUE,
            Some(_) => {
                self.error(e.pos, format!("{e} is not a type"));
                TypeId::INVALID
            }
            None => {
                self.error(sel.pos, format!("undefined: {e}"));
                TypeId::INVALID
            }
        }
    }

    fn instantiate(&mut self, x: &'a Expr, indices: &'a [Expr]) -> TypeId {
        let base = self.type_expr_inner(x);
        let args: Vec<TypeId> = indices.iter().map(|index| self.type_expr(index)).collect();
        if self.tcx.is_permissive(base) {
            return base;
        }
        let Some(info) = self.tcx.named(base) else {
            self.error(x.pos, format!("{x} is not a generic type"));
            return TypeId::INVALID;
        };
        let want = info.type_params.len();
        if want == 0 {
            self.error(x.pos, format!("{x} is not a generic type"));
            return TypeId::INVALID;
        }
        let got = indices.len();
        if got != want {
            let qualifier = if got < want { "not enough" } else { "too many" };
            let name = info.name.clone();
            self.error(
                x.pos,
                format!("{qualifier} type arguments for type {name}: have {got}, want {want}"),
            );
            return TypeId::INVALID;
        }
        self.tcx.instance(base, args)
    }

    /// Length of an array type, or `None` (reported) when invalid.
    pub(crate) fn array_length(&mut self, e: &'a Expr) -> Option<u64> {
        if let Some(name) = e.as_ident() {
            if self.lookup(name).is_none() && !self.in_opaque_dot_scope() {
                self.error(
                    e.pos,
                    format!("undefined array length {name} or missing type constraint"),
                );
                return None;
            }
        }
        let x = self.expr(e);
        if x.is_invalid() || self.tcx.is_permissive(x.ty) {
            return None;
        }
        let Mode::Constant(value) = &x.mode else {
            let d = self.describe(&x);
            self.error(x.pos, format!("array length {d} must be constant"));
            return None;
        };
        if value.is_unknown() {
            return None;
        }
        let kind = self.tcx.basic_kind(x.ty);
        if self.tcx.is_untyped(x.ty) || kind.is_some_and(BasicKind::is_integer) {
            if let Ok(v) = representable(value, BasicKind::Int, self.word_size()) {
                if let Some(n) = v.as_int().filter(|n| *n >= 0) {
                    return Some(n as u64);
                }
            }
        }
        let d = self.describe(&x);
        if kind.is_some_and(BasicKind::is_integer) {
            self.error(x.pos, format!("invalid array length {d}"));
        } else {
            self.error(x.pos, format!("array length {d} must be integer"));
        }
        None
    }

    // ========================================================================
    // Composite types
    // ========================================================================

    /// Parameter list; the last parameter may be variadic.
    pub(crate) fn collect_params(
        &mut self,
        fields: &'a [ast::Field],
        variadic_ok: bool,
    ) -> (Vec<Param>, bool) {
        let mut params = Vec::new();
        let mut variadic = false;
        for (i, field) in fields.iter().enumerate() {
            let (ty_expr, dots) = match &field.ty.kind {
                ExprKind::Ellipsis(Some(elem)) => (&**elem, true),
                _ => (&field.ty, false),
            };
            let mut ty = self.type_expr(ty_expr);
            if dots {
                if variadic_ok && i + 1 == fields.len() && field.names.len() <= 1 {
                    variadic = true;
                } else {
                    self.error(field.ty.pos, "can only use ... with final parameter in list");
                }
                ty = self.tcx.slice(ty);
            }
            if field.names.is_empty() {
                params.push((None, ty));
            } else {
                params.extend(field.names.iter().map(|n| (Some(n.clone()), ty)));
            }
        }
        (params, variadic)
    }

    pub(crate) fn signature_of(&mut self, ft: &'a FuncType) -> (Vec<Param>, Vec<Param>, bool) {
        let (params, variadic) = self.collect_params(&ft.params, true);
        let (results, _) = self.collect_params(&ft.results, false);
        (params, results, variadic)
    }

    pub(crate) fn make_signature(
        &mut self,
        params: &[Param],
        results: &[Param],
        variadic: bool,
    ) -> TypeId {
        self.tcx.func(Signature {
            params: params.iter().map(|(_, t)| *t).collect(),
            results: results.iter().map(|(_, t)| *t).collect(),
            variadic,
        })
    }

    pub(crate) fn signature_type(&mut self, ft: &'a FuncType) -> TypeId {
        let (params, results, variadic) = self.signature_of(ft);
        self.make_signature(&params, &results, variadic)
    }

    fn struct_type(&mut self, fields: &'a [ast::Field]) -> TypeId {
        let mut out = Vec::new();
        let mut seen = FxHashSet::default();
        for field in fields {
            let ty = self.type_expr(&field.ty);
            if field.names.is_empty() {
                let name = embedded_name(&field.ty).unwrap_or("_").to_string();
                self.check_embedded(&field.ty, ty);
                if name != "_" && !seen.insert(name.clone()) {
                    self.error(field.ty.pos, format!("{name} redeclared"));
                    continue;
                }
                out.push(Field {
                    name,
                    ty,
                    embedded: true,
                });
                continue;
            }
            for name in &field.names {
                if !name.is_blank() && !seen.insert(name.name.clone()) {
                    self.error(name.pos, format!("{} redeclared", name.name));
                    continue;
                }
                out.push(Field {
                    name: name.name.clone(),
                    ty,
                    embedded: false,
                });
            }
        }
        self.tcx.intern(Type::Struct(out))
    }

    fn check_embedded(&mut self, e: &'a Expr, ty: TypeId) {
        if self.tcx.is_permissive(ty) {
            return;
        }
        let (base, is_ptr) = match self.tcx.get(ty) {
            Type::Pointer(base) => (*base, true),
            _ => (ty, false),
        };
        if self.tcx.is_permissive(base) {
            return;
        }
        let message = match self.tcx.under(base) {
            Type::Pointer(_) => "embedded field type cannot be a pointer",
            Type::Basic(BasicKind::UnsafePointer) => "embedded field type cannot be unsafe.Pointer",
            Type::Interface(_) if is_ptr => {
                "embedded field type cannot be a pointer to an interface"
            }
            _ => return,
        };
        self.error(e.pos, message);
    }

    fn interface_type(&mut self, elems: &'a [InterfaceElem]) -> TypeId {
        let mut iface = Interface::default();
        let mut seen = FxHashSet::default();
        for elem in elems {
            match elem {
                InterfaceElem::Method { name, ty } => {
                    let sig = self.signature_type(ty);
                    if name.is_blank() {
                        self.error(name.pos, "methods must have a unique non-blank name");
                        continue;
                    }
                    if !seen.insert(name.name.clone()) {
                        self.error(name.pos, format!("duplicate method {}", name.name));
                        continue;
                    }
                    iface.methods.push(Method {
                        name: name.name.clone(),
                        sig,
                    });
                }
                InterfaceElem::Embed(e) => {
                    if is_type_term(e) {
                        iface.has_terms = true;
                        self.type_terms(e);
                        continue;
                    }
                    let ty = self.type_expr(e);
                    if self.tcx.is_interface(ty) || self.tcx.is_permissive(ty) {
                        iface.embeds.push(ty);
                    } else {
                        iface.has_terms = true;
                    }
                }
            }
        }
        iface.methods.sort_by(|a, b| a.name.cmp(&b.name));
        self.tcx.intern(Type::Interface(iface))
    }

    /// Check the types of a union or `~T` term.
    fn type_terms(&mut self, e: &'a Expr) {
        match &e.kind {
            ExprKind::Binary {
                op: TokenKind::Or, x, y, ..
            } => {
                self.type_terms(x);
                self.type_terms(y);
            }
            ExprKind::Unary {
                op: TokenKind::Tilde,
                x,
            } => {
                self.type_expr(x);
            }
            _ => {
                self.type_expr(e);
            }
        }
    }

    /// Declare type parameters in the current scope.
    pub(crate) fn declare_type_params(&mut self, fields: &'a [ast::Field]) -> Vec<TypeId> {
        let mut tparams = Vec::new();
        for field in fields {
            for name in &field.names {
                let tp = self.tcx.new_type_param(&name.name, self.universe.any);
                let obj = self.table.new_object(Object::new(
                    &name.name,
                    ObjKind::TypeName,
                    tp,
                    name.pos,
                ));
                self.declare(self.scope, obj);
                tparams.push(tp);
            }
        }
        let mut index = 0;
        for field in fields {
            let constraint = self.constraint_type(&field.ty);
            for _ in &field.names {
                if let Some(&tp) = tparams.get(index) {
                    self.tcx.set_type_param_constraint(tp, constraint);
                }
                index += 1;
            }
        }
        tparams
    }

    fn constraint_type(&mut self, e: &'a Expr) -> TypeId {
        if is_type_term(e) {
            self.type_terms(e);
            return self.tcx.intern(Type::Interface(Interface {
                has_terms: true,
                ..Interface::default()
            }));
        }
        self.type_expr(e)
    }

    /// Whether `ty` may be the type of a constant.
    pub(crate) fn is_const_type(&self, ty: TypeId) -> bool {
        self.tcx.basic_kind(ty).is_some_and(|k| k.is_const_type())
    }
}

fn is_type_term(e: &Expr) -> bool {
    matches!(
        e.kind,
        ExprKind::Binary { op: TokenKind::Or, .. } | ExprKind::Unary { op: TokenKind::Tilde, .. }
    )
}

/// Field name of an embedded field: the type name without package
/// qualifier, pointer or type arguments.
fn embedded_name(e: &Expr) -> Option<&str> {
    match &e.kind {
        ExprKind::Ident(name) => Some(name),
        ExprKind::Selector { sel, .. } => Some(&sel.name),
        ExprKind::Star(inner) | ExprKind::Paren(inner) => embedded_name(inner),
        ExprKind::Index { x, .. } => embedded_name(x),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Pos;

    fn ident(name: &str) -> Expr {
        Expr::new(Pos::NONE, ExprKind::Ident(name.to_string()))
    }

    #[test]
    fn test_embedded_name() {
        let star = Expr::new(Pos::NONE, ExprKind::Star(Box::new(ident("T"))));
        assert_eq!(embedded_name(&star), Some("T"));
        let qualified = Expr::new(
            Pos::NONE,
            ExprKind::Selector {
                x: Box::new(ident("io")),
                sel: Ident::new("Reader", Pos::NONE),
            },
        );
        assert_eq!(embedded_name(&qualified), Some("Reader"));
    }

    #[test]
    fn test_type_terms() {
        let tilde = Expr::new(
            Pos::NONE,
            ExprKind::Unary {
                op: TokenKind::Tilde,
                x: Box::new(ident("int")),
            },
        );
        assert!(is_type_term(&tilde));
        assert!(!is_type_term(&ident("int")));
    }
}
