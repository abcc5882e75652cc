//! Declared entities and the scope tree.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::checker::constant::ConstValue;
use crate::checker::importer::Package;
use crate::checker::types::TypeId;
use crate::parser::Pos;

/// Index of an object in the checker's object table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjId(pub(crate) u32);

/// Predeclared functions, including the `unsafe` ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Append,
    Cap,
    Clear,
    Close,
    Complex,
    Copy,
    Delete,
    Imag,
    Len,
    Make,
    Max,
    Min,
    New,
    Panic,
    Print,
    Println,
    Real,
    Recover,
    // unsafe
    Add,
    Alignof,
    Offsetof,
    Sizeof,
    Slice,
    SliceData,
    String,
    StringData,
}

impl Builtin {
    pub fn name(self) -> &'static str {
        use Builtin::*;
        match self {
            Append => "append",
            Cap => "cap",
            Clear => "clear",
            Close => "close",
            Complex => "complex",
            Copy => "copy",
            Delete => "delete",
            Imag => "imag",
            Len => "len",
            Make => "make",
            Max => "max",
            Min => "min",
            New => "new",
            Panic => "panic",
            Print => "print",
            Println => "println",
            Real => "real",
            Recover => "recover",
            Add => "Add",
            Alignof => "Alignof",
            Offsetof => "Offsetof",
            Sizeof => "Sizeof",
            Slice => "Slice",
            SliceData => "SliceData",
            String => "String",
            StringData => "StringData",
        }
    }

    /// Minimum argument count and whether more are accepted.
    pub fn arity(self) -> (usize, bool) {
        use Builtin::*;
        match self {
            Append => (1, true),
            Cap | Clear | Close | Imag | Len | New | Panic | Real => (1, false),
            Alignof | Offsetof | Sizeof | SliceData | StringData => (1, false),
            Complex | Copy | Delete | Add | Slice | String => (2, false),
            Make => (1, true),
            Max | Min => (1, true),
            Print | Println => (0, true),
            Recover => (0, false),
        }
    }

    /// Whether a call may appear as an expression statement.
    pub fn is_statement(self) -> bool {
        use Builtin::*;
        matches!(self, Clear | Close | Copy | Delete | Panic | Print | Println | Recover)
    }

    pub const UNIVERSE: [Builtin; 18] = [
        Builtin::Append,
        Builtin::Cap,
        Builtin::Clear,
        Builtin::Close,
        Builtin::Complex,
        Builtin::Copy,
        Builtin::Delete,
        Builtin::Imag,
        Builtin::Len,
        Builtin::Make,
        Builtin::Max,
        Builtin::Min,
        Builtin::New,
        Builtin::Panic,
        Builtin::Print,
        Builtin::Println,
        Builtin::Real,
        Builtin::Recover,
    ];

    pub const UNSAFE: [Builtin; 8] = [
        Builtin::Add,
        Builtin::Alignof,
        Builtin::Offsetof,
        Builtin::Sizeof,
        Builtin::Slice,
        Builtin::SliceData,
        Builtin::String,
        Builtin::StringData,
    ];
}

/// Resolution state of a package-level object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjState {
    Unresolved,
    Resolving,
    Resolved,
}

#[derive(Debug, Clone)]
pub enum ObjKind {
    Const(ConstValue),
    Var {
        used: bool,
        /// Function-local variable subject to the unused check.
        local: bool,
    },
    TypeName,
    Func,
    PkgName {
        package: Arc<Package>,
        path: String,
        used: bool,
    },
    Builtin(Builtin),
    Nil,
    /// A member of an imported package we only know by name.
    Member,
}

#[derive(Debug, Clone)]
pub struct Object {
    pub name: String,
    pub kind: ObjKind,
    pub ty: TypeId,
    pub pos: Pos,
    pub state: ObjState,
}

impl Object {
    pub fn new(name: impl Into<String>, kind: ObjKind, ty: TypeId, pos: Pos) -> Self {
        Object {
            name: name.into(),
            kind,
            ty,
            pos,
            state: ObjState::Resolved,
        }
    }

    pub fn is_type(&self) -> bool {
        matches!(self.kind, ObjKind::TypeName)
    }

    pub fn is_var(&self) -> bool {
        matches!(self.kind, ObjKind::Var { .. })
    }
}

/// Scope identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Universe,
    Package,
    File,
    Func,
    Block,
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    pub names: FxHashMap<String, ObjId>,
}

/// Objects and scopes of one check.
#[derive(Debug, Default)]
pub struct SymbolTable {
    objects: Vec<Object>,
    scopes: Vec<Scope>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_object(&mut self, object: Object) -> ObjId {
        let id = ObjId(self.objects.len() as u32);
        self.objects.push(object);
        id
    }

    pub fn obj(&self, id: ObjId) -> &Object {
        &self.objects[id.0 as usize]
    }

    pub fn obj_mut(&mut self, id: ObjId) -> &mut Object {
        &mut self.objects[id.0 as usize]
    }

    pub fn new_scope(&mut self, kind: ScopeKind, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            kind,
            parent,
            names: FxHashMap::default(),
        });
        id
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    /// Declare `obj` in `scope`. Returns the previous object of that name
    /// if there is one; the scope is then left unchanged.
    pub fn insert(&mut self, scope: ScopeId, obj: ObjId) -> Result<(), ObjId> {
        let name = self.objects[obj.0 as usize].name.clone();
        let names = &mut self.scopes[scope.0 as usize].names;
        if let Some(&existing) = names.get(&name) {
            return Err(existing);
        }
        names.insert(name, obj);
        Ok(())
    }

    /// Look `name` up in `scope` only.
    pub fn lookup_local(&self, scope: ScopeId, name: &str) -> Option<ObjId> {
        self.scope(scope).names.get(name).copied()
    }

    /// Look `name` up through the scope chain.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<(ScopeId, ObjId)> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = self.scope(id);
            if let Some(&obj) = scope.names.get(name) {
                return Some((id, obj));
            }
            current = scope.parent;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_chain_lookup() {
        let mut table = SymbolTable::new();
        let outer = table.new_scope(ScopeKind::Package, None);
        let inner = table.new_scope(ScopeKind::Block, Some(outer));
        let x = table.new_object(Object::new("x", ObjKind::TypeName, TypeId::INVALID, Pos::NONE));
        table.insert(outer, x).unwrap();
        assert_eq!(table.lookup(inner, "x"), Some((outer, x)));
        assert_eq!(table.lookup_local(inner, "x"), None);
    }

    #[test]
    fn test_redeclaration_is_rejected() {
        let mut table = SymbolTable::new();
        let scope = table.new_scope(ScopeKind::Block, None);
        let a = table.new_object(Object::new("a", ObjKind::Func, TypeId::INVALID, Pos::NONE));
        let b = table.new_object(Object::new("a", ObjKind::Func, TypeId::INVALID, Pos::NONE));
        assert!(table.insert(scope, a).is_ok());
        assert_eq!(table.insert(scope, b), Err(a));
    }
}
