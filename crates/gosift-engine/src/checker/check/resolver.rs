//! Collection of package-level objects and imports.

use std::sync::Arc;

use crate::checker::constant::ConstValue;
use crate::checker::importer::{default_package_name, MemberKind, Package};
use crate::checker::objects::{ObjId, ObjKind, ObjState, Object, ScopeId, ScopeKind};
use crate::checker::types::TypeId;
use crate::parser::ast::{
    Decl, Expr, ExprKind, FuncDecl, GenDecl, Ident, ImportSpec, Spec, TypeSpec,
};
use crate::parser::{Pos, TokenKind};

use super::{Checker, DeclInfo, ImportUse};

/// Object standing for a member of an imported package.
pub(super) fn member_object(name: &str, kind: MemberKind, pos: Pos) -> Object {
    let kind = match kind {
        MemberKind::Const => ObjKind::Const(ConstValue::Unknown),
        MemberKind::Type => ObjKind::TypeName,
        MemberKind::Var | MemberKind::Func => ObjKind::Member,
    };
    Object::new(name, kind, TypeId::OPAQUE, pos)
}

/// Name of the receiver base type: `T` in `T`, `*T`, `T[K]` or `*T[K]`.
pub(super) fn receiver_base(ty: &Expr) -> Option<(&str, bool)> {
    let mut e = ty.unparen();
    let mut ptr = false;
    if let ExprKind::Star(inner) = &e.kind {
        ptr = true;
        e = inner.unparen();
    }
    if let ExprKind::Index { x, .. } = &e.kind {
        e = x.unparen();
    }
    e.as_ident().map(|name| (name, ptr))
}

impl<'a> Checker<'a> {
    pub(super) fn collect_objects(&mut self) {
        let files = self.files;
        let mut file_scopes = Vec::with_capacity(files.len());
        let mut methods: Vec<(ObjId, &'a str, bool)> = Vec::new();

        for file in files {
            let file_scope = self.table.new_scope(ScopeKind::File, Some(self.pkg_scope));
            file_scopes.push(file_scope);
            for decl in &file.decls {
                match decl {
                    Decl::Gen(gen) => match gen.keyword {
                        TokenKind::Import => {
                            for spec in &gen.specs {
                                if let Spec::Import(import) = spec {
                                    self.collect_import(file_scope, import);
                                }
                            }
                        }
                        TokenKind::Const => self.collect_consts(file_scope, gen),
                        TokenKind::Var => self.collect_vars(file_scope, gen),
                        TokenKind::Type => {
                            for spec in &gen.specs {
                                if let Spec::Type(spec) = spec {
                                    self.collect_type(file_scope, spec);
                                }
                            }
                        }
                        _ => {}
                    },
                    Decl::Func(func) => {
                        if let Some(method) = self.collect_func(file_scope, func) {
                            methods.push(method);
                        }
                    }
                    Decl::Bad(_) => {}
                }
            }
        }

        for (obj, base, ptr) in methods {
            if ptr {
                self.ptr_recv.insert(obj);
            }
            if let Some(type_obj) = self.table.lookup_local(self.pkg_scope, base) {
                if self.table.obj(type_obj).is_type() {
                    self.methods.entry(type_obj).or_default().push(obj);
                }
            }
        }

        self.check_import_conflicts(&file_scopes);
    }

    fn new_pkg_object(&mut self, object: Object, info: DeclInfo<'a>) -> ObjId {
        let obj = self.table.new_object(Object {
            state: ObjState::Unresolved,
            ..object
        });
        self.decls.insert(obj, info);
        self.order.push(obj);
        obj
    }

    fn collect_import(&mut self, file_scope: ScopeId, import: &'a ImportSpec) {
        let path = import.path.as_str();
        if path.is_empty() {
            self.error(import.pos, "invalid import path (empty string)");
            return;
        }
        let package = if path == "unsafe" {
            Arc::new(Package::new("unsafe", "unsafe"))
        } else {
            match self.importer.import(path, self.dir) {
                Ok(package) => package,
                Err(err) => {
                    self.error(import.pos, format!("could not import {path} ({err})"));
                    Arc::new(Package::fake(path))
                }
            }
        };

        let name = match &import.name {
            Some(alias) => alias.name.clone(),
            None => package.name.clone(),
        };
        match name.as_str() {
            "_" => {}
            "." => {
                if package.fake {
                    self.opaque_dot_scopes.insert(file_scope);
                    return;
                }
                let mut members: Vec<_> = package.members.iter().collect();
                members.sort_by(|a, b| a.0.cmp(b.0));
                for (member, kind) in members {
                    let obj = self.table.new_object(member_object(member, *kind, import.pos));
                    // Duplicate dot-imported names shadow silently.
                    let _ = self.table.insert(file_scope, obj);
                }
            }
            _ => {
                let obj = self.table.new_object(Object::new(
                    name,
                    ObjKind::PkgName {
                        package,
                        path: path.to_string(),
                        used: false,
                    },
                    TypeId::INVALID,
                    import.pos,
                ));
                self.declare(file_scope, obj);
                if path != "C" {
                    self.imports.push(ImportUse {
                        obj,
                        path: path.to_string(),
                        pos: import.pos,
                    });
                }
            }
        }
    }

    fn collect_consts(&mut self, file_scope: ScopeId, gen: &'a GenDecl) {
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
            for (i, name) in spec.names.iter().enumerate() {
                let obj = self.new_pkg_object(
                    Object::new(
                        &name.name,
                        ObjKind::Const(ConstValue::Unknown),
                        TypeId::INVALID,
                        name.pos,
                    ),
                    DeclInfo::Const {
                        scope: file_scope,
                        ty,
                        init: values.get(i),
                        iota: spec.iota,
                    },
                );
                self.declare(self.pkg_scope, obj);
            }
            self.arity(spec.pos, &spec.names, values, true, inherited);
        }
    }

    fn collect_vars(&mut self, file_scope: ScopeId, gen: &'a GenDecl) {
        for spec in &gen.specs {
            let Spec::Value(spec) = spec else { continue };
            let objs: Vec<ObjId> = spec
                .names
                .iter()
                .map(|name| {
                    let mut object = Object::new(
                        &name.name,
                        ObjKind::Var {
                            used: false,
                            local: false,
                        },
                        TypeId::INVALID,
                        name.pos,
                    );
                    object.state = ObjState::Unresolved;
                    self.table.new_object(object)
                })
                .collect();
            for &obj in &objs {
                self.decls.insert(
                    obj,
                    DeclInfo::Var {
                        scope: file_scope,
                        spec,
                        objs: objs.clone(),
                    },
                );
                self.order.push(obj);
                self.declare(self.pkg_scope, obj);
            }
            if spec.ty.is_none() || !spec.values.is_empty() {
                self.arity(spec.pos, &spec.names, &spec.values, false, false);
            }
        }
    }

    fn collect_type(&mut self, file_scope: ScopeId, spec: &'a TypeSpec) {
        let obj = self.new_pkg_object(
            Object::new(&spec.name.name, ObjKind::TypeName, TypeId::INVALID, spec.name.pos),
            DeclInfo::Type {
                scope: file_scope,
                spec,
            },
        );
        self.declare(self.pkg_scope, obj);
    }

    /// Collect a function; methods are returned with their receiver base
    /// type name for later association.
    fn collect_func(
        &mut self,
        file_scope: ScopeId,
        func: &'a FuncDecl,
    ) -> Option<(ObjId, &'a str, bool)> {
        let name = func.name.name.as_str();
        let obj = self.new_pkg_object(
            Object::new(name, ObjKind::Func, TypeId::INVALID, func.name.pos),
            DeclInfo::Func {
                scope: file_scope,
                decl: func,
            },
        );

        if let Some(recv) = &func.recv {
            if name == "_" {
                return None;
            }
            return receiver_base(&recv.ty).map(|(base, ptr)| (obj, base, ptr));
        }

        if name == "init" || (name == "main" && self.pkg_name == "main") {
            if let Some(tparam) = func.type_params.first() {
                self.error(tparam.pos, format!("func {name} must have no type parameters"));
            }
            if !func.ty.params.is_empty() || !func.ty.results.is_empty() {
                self.error(
                    func.name.pos,
                    format!("func {name} must have no arguments and no return values"),
                );
            }
        }
        if name == "init" {
            if func.body.is_none() {
                self.error(func.name.pos, "missing function body");
            }
        } else {
            self.declare(self.pkg_scope, obj);
        }
        None
    }

    /// Report a count mismatch between names and initializers.
    pub(super) fn arity(
        &mut self,
        pos: Pos,
        names: &[Ident],
        values: &[Expr],
        is_const: bool,
        inherited: bool,
    ) {
        let (l, r) = (names.len(), values.len());
        if l < r {
            let extra = &values[l];
            if inherited {
                let at = self.fset.position(extra.pos);
                self.error(pos, format!("extra init expr at {at}"));
            } else {
                self.error(extra.pos, "extra init expr");
            }
        } else if l > r && (is_const || r != 1) {
            let name = &names[r];
            self.error(name.pos, format!("missing init expr for {}", name.name));
        }
    }

    fn check_import_conflicts(&mut self, file_scopes: &[ScopeId]) {
        let mut conflicts = Vec::new();
        for &scope in file_scopes {
            for (name, &obj) in &self.table.scope(scope).names {
                if let Some(alt) = self.table.lookup_local(self.pkg_scope, name) {
                    conflicts.push((alt, obj));
                }
            }
        }
        conflicts.sort_by_key(|(alt, _)| self.table.obj(*alt).pos);
        for (alt, obj) in conflicts {
            let (alt_name, alt_pos) = {
                let o = self.table.obj(alt);
                (o.name.clone(), o.pos)
            };
            let message = match &self.table.obj(obj).kind {
                ObjKind::PkgName { package, path, .. } => format!(
                    "{alt_name} already declared through import of package {} (\"{path}\")",
                    package.name
                ),
                _ => format!("{alt_name} already declared through dot-import"),
            };
            self.error(alt_pos, message);
        }
    }

    pub(super) fn report_unused_imports(&mut self) {
        for import in std::mem::take(&mut self.imports) {
            let used = matches!(
                self.table.obj(import.obj).kind,
                ObjKind::PkgName { used: true, .. }
            );
            if used {
                continue;
            }
            let name = &self.table.obj(import.obj).name;
            let message = if name == default_package_name(&import.path) {
                format!("\"{}\" imported and not used", import.path)
            } else {
                format!("\"{}\" imported as {name} and not used", import.path)
            };
            self.error(import.pos, message);
        }
    }
}
