//! Predeclared identifiers and the `unsafe` package.

use crate::checker::constant::ConstValue;
use crate::checker::objects::{Builtin, ObjId, ObjKind, Object, ScopeId, ScopeKind, SymbolTable};
use crate::checker::types::{BasicKind, Interface, Method, Signature, Type, TypeContext, TypeId};
use crate::parser::Pos;

/// Well-known scopes, types and objects.
#[derive(Debug, Clone, Copy)]
pub struct Universe {
    pub scope: ScopeId,
    /// Members of package `unsafe`.
    pub unsafe_scope: ScopeId,
    pub error: TypeId,
    pub any: TypeId,
    pub comparable: TypeId,
    pub iota: ObjId,
}

const BASIC_NAMES: [(&str, BasicKind); 19] = [
    ("bool", BasicKind::Bool),
    ("int", BasicKind::Int),
    ("int8", BasicKind::Int8),
    ("int16", BasicKind::Int16),
    ("int32", BasicKind::Int32),
    ("int64", BasicKind::Int64),
    ("uint", BasicKind::Uint),
    ("uint8", BasicKind::Uint8),
    ("uint16", BasicKind::Uint16),
    ("uint32", BasicKind::Uint32),
    ("uint64", BasicKind::Uint64),
    ("uintptr", BasicKind::Uintptr),
    ("float32", BasicKind::Float32),
    ("float64", BasicKind::Float64),
    ("complex64", BasicKind::Complex64),
    ("complex128", BasicKind::Complex128),
    ("string", BasicKind::String),
    ("byte", BasicKind::Byte),
    ("rune", BasicKind::Rune),
];

fn declare(table: &mut SymbolTable, scope: ScopeId, object: Object) -> ObjId {
    let id = table.new_object(object);
    // Universe names are unique; a clash would be a bug in the tables above.
    let _ = table.insert(scope, id);
    id
}

/// Populate the universe and `unsafe` scopes.
pub fn build(tcx: &mut TypeContext, table: &mut SymbolTable) -> Universe {
    let scope = table.new_scope(ScopeKind::Universe, None);

    for (name, kind) in BASIC_NAMES {
        declare(table, scope, Object::new(name, ObjKind::TypeName, tcx.basic(kind), Pos::NONE));
    }

    let any = tcx.intern(Type::Interface(Interface::default()));
    declare(table, scope, Object::new("any", ObjKind::TypeName, any, Pos::NONE));

    let comparable = tcx.intern(Type::Interface(Interface {
        comparable: true,
        ..Interface::default()
    }));
    declare(table, scope, Object::new("comparable", ObjKind::TypeName, comparable, Pos::NONE));

    let string = tcx.basic(BasicKind::String);
    let error_sig = tcx.func(Signature {
        params: Vec::new(),
        results: vec![string],
        variadic: false,
    });
    let error_iface = tcx.intern(Type::Interface(Interface {
        methods: vec![Method {
            name: "Error".to_string(),
            sig: error_sig,
        }],
        ..Interface::default()
    }));
    let error = tcx.new_named("error", None, None);
    let error_obj = declare(
        table,
        scope,
        Object::new("error", ObjKind::TypeName, error, Pos::NONE),
    );
    if let Some(info) = tcx.named_mut(error) {
        info.underlying = error_iface;
        info.obj = Some(error_obj);
    }

    let untyped_bool = tcx.basic(BasicKind::UntypedBool);
    for (name, value) in [("true", true), ("false", false)] {
        declare(
            table,
            scope,
            Object::new(name, ObjKind::Const(ConstValue::Bool(value)), untyped_bool, Pos::NONE),
        );
    }
    let iota = declare(
        table,
        scope,
        Object::new(
            "iota",
            ObjKind::Const(ConstValue::Int(0)),
            tcx.basic(BasicKind::UntypedInt),
            Pos::NONE,
        ),
    );
    declare(
        table,
        scope,
        Object::new("nil", ObjKind::Nil, tcx.basic(BasicKind::UntypedNil), Pos::NONE),
    );

    for builtin in Builtin::UNIVERSE {
        declare(
            table,
            scope,
            Object::new(builtin.name(), ObjKind::Builtin(builtin), TypeId::INVALID, Pos::NONE),
        );
    }

    let unsafe_scope = table.new_scope(ScopeKind::Package, None);
    declare(
        table,
        unsafe_scope,
        Object::new("Pointer", ObjKind::TypeName, tcx.basic(BasicKind::UnsafePointer), Pos::NONE),
    );
    for builtin in Builtin::UNSAFE {
        declare(
            table,
            unsafe_scope,
            Object::new(builtin.name(), ObjKind::Builtin(builtin), TypeId::INVALID, Pos::NONE),
        );
    }

    Universe {
        scope,
        unsafe_scope,
        error,
        any,
        comparable,
        iota,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_universe_names() {
        let mut tcx = TypeContext::new();
        let mut table = SymbolTable::new();
        let universe = build(&mut tcx, &mut table);
        for name in ["int", "byte", "error", "any", "true", "nil", "len", "append", "iota"] {
            assert!(table.lookup(universe.scope, name).is_some(), "{name}");
        }
        assert!(table.lookup_local(universe.unsafe_scope, "Sizeof").is_some());
        assert_eq!(tcx.type_string(universe.error), "error");
        assert!(tcx.is_interface(universe.error));
    }
}
