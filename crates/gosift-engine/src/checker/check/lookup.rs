//! Selectors, field and method lookup, and interface satisfaction.

use rustc_hash::FxHashSet;

use crate::checker::importer::MemberKind;
use crate::checker::objects::{ObjId, ObjKind};
use crate::checker::constant::ConstValue;
use crate::checker::types::{Method, Signature, Type, TypeId};
use crate::parser::ast::{is_exported, Expr, Ident};

use super::{Checker, Mode, Operand};

/// Result of looking up a field or method by name.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Selection {
    Field { ty: TypeId, indirect: bool },
    /// A method declared on a named type.
    Method { obj: ObjId },
    /// A method of an interface type.
    InterfaceMethod { sig: TypeId },
    /// Found on an opaque embedded type; anything goes.
    Opaque,
    /// The method has a pointer receiver and the operand is not addressable.
    PointerReceiver,
    Ambiguous,
    NotFound,
}

/// A type to search at the current embedding depth.
#[derive(Debug, Clone, Copy)]
struct Embedded {
    ty: TypeId,
    indirect: bool,
    multiples: bool,
}

const MAX_EMBED_DEPTH: usize = 16;

impl<'a> Checker<'a> {
    /// Look up a field or method of `ty`, searching embedded fields
    /// breadth-first. Names at a shallower depth shadow deeper ones.
    pub(crate) fn lookup_field_or_method(
        &mut self,
        ty: TypeId,
        addressable: bool,
        name: &str,
    ) -> Selection {
        if name == "_" {
            return Selection::NotFound;
        }
        let (base, is_ptr) = match self.tcx.get(ty) {
            Type::Pointer(base) => (*base, true),
            _ => (ty, false),
        };
        if self.tcx.is_permissive(base) {
            return Selection::Opaque;
        }
        if is_ptr && self.tcx.is_interface(base) {
            return Selection::NotFound;
        }

        let mut current = vec![Embedded {
            ty: base,
            indirect: is_ptr,
            multiples: false,
        }];
        let mut seen: FxHashSet<TypeId> = FxHashSet::default();

        for _ in 0..MAX_EMBED_DEPTH {
            if current.is_empty() {
                break;
            }
            let mut found: Option<(Selection, bool)> = None;
            let mut collision = false;
            let mut opaque = false;
            let mut next = Vec::new();

            for entry in &current {
                if self.tcx.is_permissive(entry.ty) {
                    opaque = true;
                    continue;
                }
                if let Some(info) = self.tcx.named(entry.ty) {
                    if !seen.insert(entry.ty) {
                        continue;
                    }
                    let method = info
                        .methods
                        .iter()
                        .copied()
                        .find(|m| self.table.obj(*m).name == name);
                    if let Some(method) = method {
                        if found.is_some() || entry.multiples {
                            collision = true;
                        }
                        found = Some((Selection::Method { obj: method }, entry.indirect));
                        continue;
                    }
                }
                match self.tcx.under(entry.ty).clone() {
                    Type::Struct(fields) => {
                        for field in &fields {
                            if field.name == name {
                                if found.is_some() || entry.multiples {
                                    collision = true;
                                }
                                found = Some((
                                    Selection::Field {
                                        ty: field.ty,
                                        indirect: entry.indirect,
                                    },
                                    entry.indirect,
                                ));
                                continue;
                            }
                            if found.is_none() && field.embedded {
                                let (ty, ptr) = match self.tcx.get(field.ty) {
                                    Type::Pointer(base) => (*base, true),
                                    _ => (field.ty, false),
                                };
                                next.push(Embedded {
                                    ty,
                                    indirect: entry.indirect || ptr,
                                    multiples: entry.multiples,
                                });
                            }
                        }
                    }
                    Type::Interface(_) => {
                        let (methods, iface_opaque) = self.interface_method_set(entry.ty);
                        if let Some(m) = methods.iter().find(|m| m.name == name) {
                            if found.is_some() || entry.multiples {
                                collision = true;
                            }
                            found = Some((
                                Selection::InterfaceMethod { sig: m.sig },
                                entry.indirect,
                            ));
                        } else if iface_opaque {
                            opaque = true;
                        }
                    }
                    _ => {}
                }
            }

            if collision {
                return Selection::Ambiguous;
            }
            if let Some((selection, indirect)) = found {
                if let Selection::Method { obj } = selection {
                    if self.ptr_recv.contains(&obj) && !indirect && !addressable {
                        return Selection::PointerReceiver;
                    }
                }
                return selection;
            }
            if opaque {
                return Selection::Opaque;
            }
            current = consolidate(next);
        }
        Selection::NotFound
    }

    /// All methods of an interface, embedded ones included, sorted by name.
    /// The flag is set when an embedded interface is opaque.
    pub(crate) fn interface_method_set(&self, iface: TypeId) -> (Vec<Method>, bool) {
        let mut methods = Vec::new();
        let mut opaque = false;
        self.collect_interface_methods(iface, &mut methods, &mut opaque, 0);
        methods.sort_by(|a, b| a.name.cmp(&b.name));
        methods.dedup_by(|a, b| a.name == b.name);
        (methods, opaque)
    }

    fn collect_interface_methods(
        &self,
        iface: TypeId,
        out: &mut Vec<Method>,
        opaque: &mut bool,
        depth: u32,
    ) {
        if depth > 16 {
            return;
        }
        if self.tcx.is_permissive(iface) {
            *opaque = true;
            return;
        }
        if let Type::Interface(i) = self.tcx.under(iface) {
            out.extend(i.methods.iter().cloned());
            for &embed in &i.embeds {
                self.collect_interface_methods(embed, out, opaque, depth + 1);
            }
        }
    }

    /// Whether the interface has no methods and no type terms.
    pub(crate) fn is_empty_interface(&self, ty: TypeId) -> bool {
        match self.tcx.under(ty) {
            Type::Interface(i) => {
                !i.has_terms && !i.comparable && {
                    let (methods, opaque) = self.interface_method_set(ty);
                    methods.is_empty() && !opaque
                }
            }
            _ => false,
        }
    }

    fn is_interface_ptr(&self, ty: TypeId) -> bool {
        match self.tcx.under(ty) {
            Type::Pointer(base) => self.tcx.is_interface(*base),
            _ => false,
        }
    }

    fn interface_ptr_error(&self, ty: TypeId) -> String {
        format!("type {} is pointer to interface, not interface", self.type_string(ty))
    }

    // ========================================================================
    // Interface satisfaction
    // ========================================================================

    /// Check that `v` implements the interface `t`; the error is the full
    /// cause, e.g. `T does not implement I (missing method M)`.
    pub(crate) fn implements(&mut self, v: TypeId, t: TypeId) -> Result<(), String> {
        if self.tcx.is_permissive(v) || self.tcx.is_permissive(t) {
            return Ok(());
        }
        if let Type::Pointer(base) = self.tcx.under(v) {
            if self.tcx.is_permissive(*base) {
                return Ok(());
            }
        }
        let vs = self.type_string(v);
        let ts = self.type_string(t);
        if !self.tcx.is_interface(t) {
            let detail = if self.is_interface_ptr(t) {
                self.interface_ptr_error(t)
            } else {
                format!("{ts} is not an interface")
            };
            return Err(format!("{vs} does not implement {ts} ({detail})"));
        }
        if self.is_empty_interface(t) {
            return Ok(());
        }
        if let Err(cause) = self.missing_method(v, t) {
            return Err(format!("{vs} does not implement {ts} {cause}"));
        }
        if let Type::Interface(i) = self.tcx.under(t) {
            if i.comparable && !self.tcx.comparable(v) {
                return Err(format!("{vs} does not implement comparable"));
            }
        }
        Ok(())
    }

    /// The first method of interface `t` that `v` lacks, as a parenthesized
    /// cause.
    pub(crate) fn missing_method(&mut self, v: TypeId, t: TypeId) -> Result<(), String> {
        let (methods, t_opaque) = self.interface_method_set(t);
        if t_opaque {
            return Ok(());
        }

        if self.tcx.is_interface(v) {
            let (have, v_opaque) = self.interface_method_set(v);
            if v_opaque {
                return Ok(());
            }
            for m in &methods {
                match have.iter().find(|h| h.name == m.name) {
                    None => return Err(format!("(missing method {})", m.name)),
                    Some(h) if !self.tcx.identical(h.sig, m.sig) => {
                        return Err(format!("(wrong type for method {})", m.name))
                    }
                    Some(_) => {}
                }
            }
            return Ok(());
        }

        for m in &methods {
            match self.lookup_field_or_method(v, false, &m.name) {
                Selection::Opaque => return Ok(()),
                Selection::Method { obj } => {
                    let sig = self.obj_type(obj);
                    if !self.tcx.identical(sig, m.sig) && !self.tcx.contains_permissive(sig) {
                        return Err(format!("(wrong type for method {})", m.name));
                    }
                }
                Selection::InterfaceMethod { sig } => {
                    if !self.tcx.identical(sig, m.sig) {
                        return Err(format!("(wrong type for method {})", m.name));
                    }
                }
                Selection::Field { .. } => {
                    let vs = self.type_string(v);
                    return Err(format!("({vs}.{} is a field, not a method)", m.name));
                }
                Selection::PointerReceiver => {
                    return Err(format!("(method {} has pointer receiver)", m.name));
                }
                Selection::Ambiguous => {
                    let vs = self.type_string(v);
                    return Err(format!("(ambiguous selector {vs}.{})", m.name));
                }
                Selection::NotFound => {
                    let cause = if self.is_interface_ptr(v) {
                        self.interface_ptr_error(v)
                    } else {
                        format!("missing method {}", m.name)
                    };
                    return Err(format!("({cause})"));
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Selector expressions
    // ========================================================================

    pub(super) fn selector(
        &mut self,
        e: &'a Expr,
        x_expr: &'a Expr,
        sel: &'a Ident,
    ) -> Operand<'a> {
        if let Some(name) = x_expr.as_ident() {
            if let Some(obj) = self.lookup(name) {
                if let ObjKind::PkgName { .. } = self.table.obj(obj).kind {
                    return self.qualified_ident(e, obj, sel);
                }
            }
        }

        let x = self.expr_or_type(x_expr);
        match x.mode {
            Mode::Invalid => return Operand::invalid(e),
            Mode::Builtin(_) => {
                let d = self.describe(&x);
                self.error(e.pos, format!("invalid use of {d} in selector expression"));
                return Operand::invalid(e);
            }
            _ => {}
        }
        if self.tcx.is_invalid(self.tcx.underlying(x.ty)) && !self.tcx.is_named(x.ty) {
            return Operand::invalid(e);
        }

        let name = sel.name.as_str();
        let addressable = x.mode == Mode::Variable;
        let selection = self.lookup_field_or_method(x.ty, addressable, name);
        let xs = x.expr_string();
        let ts = self.type_string(x.ty);

        match selection {
            Selection::Opaque => {
                let mode = if x.mode == Mode::TypeExpr { Mode::Value } else { Mode::Variable };
                Operand::new(mode, TypeId::OPAQUE, e)
            }
            Selection::Ambiguous => {
                self.error(sel.pos, format!("ambiguous selector {xs}.{name}"));
                Operand::invalid(e)
            }
            Selection::PointerReceiver => {
                if x.mode == Mode::TypeExpr {
                    self.error(
                        sel.pos,
                        format!(
                            "invalid method expression {xs}.{name} \
                             (needs pointer receiver (*{ts}).{name})"
                        ),
                    );
                } else {
                    self.error(sel.pos, format!("cannot call pointer method {name} on {ts}"));
                }
                Operand::invalid(e)
            }
            Selection::NotFound => {
                if self.tcx.is_invalid(self.tcx.underlying(x.ty)) {
                    return Operand::invalid(e);
                }
                let why = if self.is_interface_ptr(x.ty) {
                    self.interface_ptr_error(x.ty)
                } else {
                    format!("type {ts} has no field or method {name}")
                };
                self.error(sel.pos, format!("{xs}.{name} undefined ({why})"));
                Operand::invalid(e)
            }
            Selection::Field { ty, indirect } => {
                if x.mode == Mode::TypeExpr {
                    self.error(
                        sel.pos,
                        format!("{xs}.{name} undefined (type {ts} has no method {name})"),
                    );
                    return Operand::invalid(e);
                }
                if x.mode == Mode::MapIndex {
                    self.map_fields.insert(e as *const Expr as usize);
                }
                let mode = if x.mode == Mode::Variable || indirect {
                    Mode::Variable
                } else {
                    Mode::Value
                };
                Operand::new(mode, ty, e)
            }
            Selection::Method { obj } => {
                let sig = self.obj_type(obj);
                if x.mode == Mode::TypeExpr {
                    return Operand::new(Mode::Value, self.method_expr_type(x.ty, sig), e);
                }
                Operand::new(Mode::Value, sig, e)
            }
            Selection::InterfaceMethod { sig } => {
                if x.mode == Mode::TypeExpr {
                    return Operand::new(Mode::Value, self.method_expr_type(x.ty, sig), e);
                }
                Operand::new(Mode::Value, sig, e)
            }
        }
    }

    /// Function type of a method expression `T.m`: the receiver becomes
    /// the first parameter.
    fn method_expr_type(&mut self, recv: TypeId, sig: TypeId) -> TypeId {
        let Some(sig) = self.tcx.signature(sig).cloned() else {
            return TypeId::INVALID;
        };
        let mut params = Vec::with_capacity(sig.params.len() + 1);
        params.push(recv);
        params.extend(sig.params);
        self.tcx.func(Signature {
            params,
            results: sig.results,
            variadic: sig.variadic,
        })
    }

    /// `pkg.Name`, where `pkg` is an imported package.
    fn qualified_ident(&mut self, e: &'a Expr, pkg_obj: ObjId, sel: &'a Ident) -> Operand<'a> {
        self.mark_used(pkg_obj);
        let ObjKind::PkgName { package, .. } = &self.table.obj(pkg_obj).kind else {
            return Operand::invalid(e);
        };
        let package = package.clone();
        let name = sel.name.as_str();

        if package.path == "unsafe" {
            let Some(member) = self.table.lookup_local(self.universe.unsafe_scope, name) else {
                self.error(sel.pos, format!("undefined: {e}"));
                return Operand::invalid(e);
            };
            let member = self.table.obj(member);
            return match member.kind {
                ObjKind::Builtin(b) => Operand::new(Mode::Builtin(b), TypeId::INVALID, e),
                _ => Operand::new(Mode::TypeExpr, member.ty, e),
            };
        }
        if package.fake {
            return Operand::new(Mode::Variable, TypeId::OPAQUE, e);
        }
        // Imported packages only carry their exported members.
        if !is_exported(name) {
            self.error(sel.pos, format!("name {name} not exported by package {}", package.name));
            return Operand::invalid(e);
        }
        let Some(kind) = package.members.get(name).copied() else {
            self.error(sel.pos, format!("undefined: {e}"));
            return Operand::invalid(e);
        };
        match kind {
            MemberKind::Const => Operand::new(
                Mode::Constant(ConstValue::Unknown),
                TypeId::OPAQUE,
                e,
            ),
            MemberKind::Type => Operand::new(Mode::TypeExpr, TypeId::OPAQUE, e),
            MemberKind::Var => Operand::new(Mode::Variable, TypeId::OPAQUE, e),
            MemberKind::Func => Operand::new(Mode::Value, TypeId::OPAQUE, e),
        }
    }
}

/// Drop duplicate types at one depth, marking them as found more than
/// once.
fn consolidate(list: Vec<Embedded>) -> Vec<Embedded> {
    let mut out: Vec<Embedded> = Vec::with_capacity(list.len());
    for entry in list {
        match out.iter_mut().find(|e| e.ty == entry.ty) {
            Some(existing) => existing.multiples = true,
            None => out.push(entry),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consolidate_marks_multiples() {
        let a = TypeId(10);
        let b = TypeId(11);
        let list = vec![
            Embedded {
                ty: a,
                indirect: false,
                multiples: false,
            },
            Embedded {
                ty: b,
                indirect: false,
                multiples: false,
            },
            Embedded {
                ty: a,
                indirect: true,
                multiples: false,
            },
        ];
        let out = consolidate(list);
        assert_eq!(out.len(), 2);
        assert!(out[0].multiples);
        assert!(!out[1].multiples);
    }
}
