//! The package type checker.
//!
//! A check runs in four phases:
//!
//! 1. Collect package-level objects and imports across all files.
//! 2. Resolve every package-level object. Resolution is lazy: a reference to
//!    an unresolved object resolves it on the spot, and a reference to an
//!    object that is being resolved is a cycle.
//! 3. Check function bodies in source order.
//! 4. Report unused imports.
//!
//! Every diagnostic goes through the sink. When the sink answers
//! [`ControlFlow::Break`] the checker stops walking and returns.

mod assign;
mod call;
mod decl;
mod expr;
mod lookup;
pub mod operand;
mod resolver;
mod stmt;
mod typexpr;

use std::ops::ControlFlow;
use std::path::Path;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::build::Platform;
use crate::checker::constant::ConstValue;
use crate::checker::importer::Importer;
use crate::checker::objects::{ObjId, ObjKind, ObjState, ScopeId, ScopeKind, SymbolTable};
use crate::checker::sizes::Sizes;
use crate::checker::types::{TypeContext, TypeId};
use crate::checker::universe::{self, Universe};
use crate::diagnostic::Diagnostic;
use crate::parser::ast::{self, Expr, FuncDecl, TypeSpec, ValueSpec};
use crate::parser::{FileSet, Pos};

use call::CallKind;
pub use operand::{Mode, Operand};
use typexpr::Param;

/// Receives each diagnostic as it is found.
pub type Sink<'s> = dyn FnMut(Diagnostic) -> ControlFlow<()> + 's;

/// Summary of one check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckOutcome {
    /// Diagnostics handed to the sink.
    pub reported: usize,
    /// The sink asked to stop before the package was fully checked.
    pub bailout_triggered: bool,
}

/// Everything a check needs besides the files.
pub struct CheckConfig<'a> {
    /// Directory of the package, for relative and vendored imports.
    pub dir: &'a Path,
    pub platform: &'a Platform,
    pub importer: &'a dyn Importer,
}

/// Type-check one package and stream diagnostics to `sink`.
pub fn check_package<'a>(
    files: &'a [ast::File],
    fset: &'a FileSet,
    config: CheckConfig<'a>,
    sink: &'a mut Sink<'a>,
) -> CheckOutcome {
    let mut checker = Checker::new(files, fset, config, sink);
    checker.run();
    CheckOutcome {
        reported: checker.reported,
        bailout_triggered: checker.halted,
    }
}

// ============================================================================
// Checker state
// ============================================================================

/// Source of a package-level object, kept until the object is resolved.
#[derive(Debug, Clone)]
pub(crate) enum DeclInfo<'a> {
    Const {
        scope: ScopeId,
        ty: Option<&'a Expr>,
        init: Option<&'a Expr>,
        iota: usize,
    },
    Var {
        scope: ScopeId,
        spec: &'a ValueSpec,
        /// Objects for all names of the spec, blank ones included.
        objs: Vec<ObjId>,
    },
    Type {
        scope: ScopeId,
        spec: &'a TypeSpec,
    },
    Func {
        scope: ScopeId,
        decl: &'a FuncDecl,
    },
}

/// Parameters of a resolved function, for checking its body.
#[derive(Debug, Clone)]
pub(crate) struct FuncInfo {
    /// Scope holding type parameters, if any; parent of the body scope.
    pub scope: ScopeId,
    /// Receiver first, then parameters.
    pub params: Vec<Param>,
    pub results: Vec<Param>,
    pub sig: TypeId,
}

/// Per-function state. Function literals get their own.
#[derive(Debug, Default)]
pub(crate) struct FuncContext {
    /// Result types; `None` outside any function.
    pub results: Option<Vec<TypeId>>,
    pub named_results: bool,
    /// Locals declared so far, for the unused check.
    pub locals: Vec<ObjId>,
}

/// An import to report if it ends up unused.
#[derive(Debug, Clone)]
pub(crate) struct ImportUse {
    pub obj: ObjId,
    pub path: String,
    pub pos: Pos,
}

pub(crate) struct Checker<'a> {
    files: &'a [ast::File],
    fset: &'a FileSet,
    dir: &'a Path,
    importer: &'a dyn Importer,
    sink: &'a mut Sink<'a>,
    sizes: Sizes,

    pub(crate) tcx: TypeContext,
    pub(crate) table: SymbolTable,
    pub(crate) universe: Universe,
    pkg_scope: ScopeId,
    pkg_name: String,

    decls: FxHashMap<ObjId, DeclInfo<'a>>,
    /// Package-level objects in source order.
    order: Vec<ObjId>,
    /// Methods by receiver base type object.
    methods: FxHashMap<ObjId, Vec<ObjId>>,
    /// Methods whose receiver is a pointer.
    ptr_recv: FxHashSet<ObjId>,
    funcs: FxHashMap<ObjId, FuncInfo>,
    imports: Vec<ImportUse>,
    /// File scopes with a dot-import of a package we know nothing about;
    /// undefined names there are not reported.
    opaque_dot_scopes: FxHashSet<ScopeId>,

    /// Current scope.
    scope: ScopeId,
    /// Value of `iota` inside a constant declaration.
    iota: Option<ConstValue>,
    ctx: FuncContext,
    /// Objects being resolved, innermost last.
    decl_path: Vec<ObjId>,
    /// Type declarations being resolved, with the pointer depth at which
    /// each started.
    type_path: Vec<(ObjId, u32)>,
    indirection: u32,
    /// Objects already reported as part of a cycle.
    cycle_reported: FxHashSet<ObjId>,
    /// Declared types of `var` specs, so a shared type is checked once.
    spec_types: FxHashMap<Pos, TypeId>,
    /// Selector expressions (by address) naming a field of a map element.
    map_fields: FxHashSet<usize>,
    /// How each call expression (by address) may be used as a statement.
    call_kinds: FxHashMap<usize, CallKind>,
    /// Calls of the predeclared `panic`.
    panics: FxHashSet<usize>,

    reported: usize,
    halted: bool,
}

impl<'a> Checker<'a> {
    fn new(
        files: &'a [ast::File],
        fset: &'a FileSet,
        config: CheckConfig<'a>,
        sink: &'a mut Sink<'a>,
    ) -> Self {
        let mut tcx = TypeContext::new();
        let mut table = SymbolTable::new();
        let universe = universe::build(&mut tcx, &mut table);
        let pkg_scope = table.new_scope(ScopeKind::Package, Some(universe.scope));
        Checker {
            files,
            fset,
            dir: config.dir,
            importer: config.importer,
            sink,
            sizes: Sizes::for_platform(config.platform),
            tcx,
            table,
            universe,
            pkg_scope,
            pkg_name: files.first().map(|f| f.package.name.clone()).unwrap_or_default(),
            decls: FxHashMap::default(),
            order: Vec::new(),
            methods: FxHashMap::default(),
            ptr_recv: FxHashSet::default(),
            funcs: FxHashMap::default(),
            imports: Vec::new(),
            opaque_dot_scopes: FxHashSet::default(),
            scope: pkg_scope,
            iota: None,
            ctx: FuncContext::default(),
            decl_path: Vec::new(),
            type_path: Vec::new(),
            indirection: 0,
            cycle_reported: FxHashSet::default(),
            spec_types: FxHashMap::default(),
            map_fields: FxHashSet::default(),
            call_kinds: FxHashMap::default(),
            panics: FxHashSet::default(),
            reported: 0,
            halted: false,
        }
    }

    fn run(&mut self) {
        self.collect_objects();
        debug!(objects = self.order.len(), "collected package objects");

        let order = self.order.clone();
        for obj in order {
            if self.halted {
                return;
            }
            self.resolve_obj(obj);
        }

        for obj in self.order.clone() {
            if self.halted {
                return;
            }
            if let Some(DeclInfo::Func { decl, .. }) = self.decls.get(&obj) {
                let decl = *decl;
                self.func_body_decl(obj, decl);
            }
        }
        self.report_unused_imports();
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Report a type error. Messages about operands or types that already
    /// failed are follow-on errors and are dropped.
    pub(crate) fn error(&mut self, pos: Pos, message: impl Into<String>) {
        if self.halted {
            return;
        }
        let message = message.into();
        if is_follow_on(&message) {
            return;
        }
        let position = self.fset.position(pos);
        self.reported += 1;
        if (self.sink)(Diagnostic::type_error(message, position)).is_break() {
            self.halted = true;
        }
    }

    pub(crate) fn halted(&self) -> bool {
        self.halted
    }

    // ========================================================================
    // Scopes
    // ========================================================================

    pub(crate) fn open_scope(&mut self, kind: ScopeKind) -> ScopeId {
        let scope = self.table.new_scope(kind, Some(self.scope));
        self.scope = scope;
        scope
    }

    pub(crate) fn close_scope(&mut self, previous: ScopeId) {
        self.scope = previous;
    }

    /// Declare `obj` in `scope`, reporting a redeclaration. Blank names are
    /// never declared.
    pub(crate) fn declare(&mut self, scope: ScopeId, obj: ObjId) -> bool {
        let (name, pos) = {
            let o = self.table.obj(obj);
            (o.name.clone(), o.pos)
        };
        if name == "_" {
            return true;
        }
        match self.table.insert(scope, obj) {
            Ok(()) => true,
            Err(_) => {
                self.error(pos, format!("{name} redeclared in this block"));
                false
            }
        }
    }

    /// Look a name up from the current scope, resolving package-level
    /// objects on first use.
    pub(crate) fn lookup(&mut self, name: &str) -> Option<ObjId> {
        let (_, obj) = self.table.lookup(self.scope, name)?;
        Some(obj)
    }

    /// Whether undefined names in the current file must be tolerated.
    pub(crate) fn in_opaque_dot_scope(&self) -> bool {
        let mut current = Some(self.scope);
        while let Some(id) = current {
            if self.opaque_dot_scopes.contains(&id) {
                return true;
            }
            current = self.table.scope(id).parent;
        }
        false
    }

    /// Type of an object, resolving it if needed.
    pub(crate) fn obj_type(&mut self, obj: ObjId) -> TypeId {
        if self.table.obj(obj).state == ObjState::Unresolved {
            self.resolve_obj(obj);
        }
        self.table.obj(obj).ty
    }

    pub(crate) fn mark_used(&mut self, obj: ObjId) {
        match &mut self.table.obj_mut(obj).kind {
            ObjKind::Var { used, .. } | ObjKind::PkgName { used, .. } => *used = true,
            _ => {}
        }
    }

    pub(crate) fn word_size(&self) -> u64 {
        self.sizes.word_size as u64
    }

    pub(crate) fn sizes(&self) -> Sizes {
        self.sizes
    }

    pub(crate) fn type_string(&self, ty: TypeId) -> String {
        self.tcx.type_string(ty)
    }

    pub(crate) fn describe(&self, op: &Operand<'_>) -> String {
        op.describe(&self.tcx)
    }
}

fn is_follow_on(message: &str) -> bool {
    ["invalid operand", "invalid type"]
        .iter()
        .any(|needle| message.find(needle).is_some_and(|at| at > 0))
}

#[cfg(test)]
mod tests;
