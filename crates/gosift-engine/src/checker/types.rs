//! Type representation for the checker.
//!
//! Types are interned in a [`TypeContext`] and referred to by [`TypeId`].
//! Structural types with identical contents share an id; named types and
//! type parameters are unique per declaration.

use std::fmt::Write as _;

use rustc_hash::FxHashMap;

use crate::checker::objects::ObjId;
use crate::parser::ast::ChanDir;

/// Unique identifier for a type in the type context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) u32);

impl TypeId {
    pub const INVALID: TypeId = TypeId(0);
    pub const OPAQUE: TypeId = TypeId(1);

    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

/// Predeclared basic types, including the untyped constant kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BasicKind {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    Complex64,
    Complex128,
    String,
    UnsafePointer,
    UntypedBool,
    UntypedInt,
    UntypedRune,
    UntypedFloat,
    UntypedComplex,
    UntypedString,
    UntypedNil,
    // Aliases
    Byte,
    Rune,
}

impl BasicKind {
    pub const ALL: [BasicKind; 27] = [
        BasicKind::Bool,
        BasicKind::Int,
        BasicKind::Int8,
        BasicKind::Int16,
        BasicKind::Int32,
        BasicKind::Int64,
        BasicKind::Uint,
        BasicKind::Uint8,
        BasicKind::Uint16,
        BasicKind::Uint32,
        BasicKind::Uint64,
        BasicKind::Uintptr,
        BasicKind::Float32,
        BasicKind::Float64,
        BasicKind::Complex64,
        BasicKind::Complex128,
        BasicKind::String,
        BasicKind::UnsafePointer,
        BasicKind::UntypedBool,
        BasicKind::UntypedInt,
        BasicKind::UntypedRune,
        BasicKind::UntypedFloat,
        BasicKind::UntypedComplex,
        BasicKind::UntypedString,
        BasicKind::UntypedNil,
        BasicKind::Byte,
        BasicKind::Rune,
    ];

    pub fn name(self) -> &'static str {
        use BasicKind::*;
        match self {
            Bool => "bool",
            Int => "int",
            Int8 => "int8",
            Int16 => "int16",
            Int32 => "int32",
            Int64 => "int64",
            Uint => "uint",
            Uint8 => "uint8",
            Uint16 => "uint16",
            Uint32 => "uint32",
            Uint64 => "uint64",
            Uintptr => "uintptr",
            Float32 => "float32",
            Float64 => "float64",
            Complex64 => "complex64",
            Complex128 => "complex128",
            String => "string",
            UnsafePointer => "unsafe.Pointer",
            UntypedBool => "untyped bool",
            UntypedInt => "untyped int",
            UntypedRune => "untyped rune",
            UntypedFloat => "untyped float",
            UntypedComplex => "untyped complex",
            UntypedString => "untyped string",
            UntypedNil => "untyped nil",
            Byte => "byte",
            Rune => "rune",
        }
    }

    /// The kind an alias stands for.
    pub fn canonical(self) -> BasicKind {
        match self {
            BasicKind::Byte => BasicKind::Uint8,
            BasicKind::Rune => BasicKind::Int32,
            k => k,
        }
    }

    pub fn is_untyped(self) -> bool {
        use BasicKind::*;
        matches!(
            self,
            UntypedBool
                | UntypedInt
                | UntypedRune
                | UntypedFloat
                | UntypedComplex
                | UntypedString
                | UntypedNil
        )
    }

    pub fn is_boolean(self) -> bool {
        matches!(self, BasicKind::Bool | BasicKind::UntypedBool)
    }

    pub fn is_integer(self) -> bool {
        use BasicKind::*;
        matches!(
            self.canonical(),
            Int | Int8
                | Int16
                | Int32
                | Int64
                | Uint
                | Uint8
                | Uint16
                | Uint32
                | Uint64
                | Uintptr
                | UntypedInt
                | UntypedRune
        )
    }

    pub fn is_unsigned(self) -> bool {
        use BasicKind::*;
        matches!(self.canonical(), Uint | Uint8 | Uint16 | Uint32 | Uint64 | Uintptr)
    }

    pub fn is_float(self) -> bool {
        matches!(self, BasicKind::Float32 | BasicKind::Float64 | BasicKind::UntypedFloat)
    }

    pub fn is_complex(self) -> bool {
        matches!(self, BasicKind::Complex64 | BasicKind::Complex128 | BasicKind::UntypedComplex)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float() || self.is_complex()
    }

    pub fn is_string(self) -> bool {
        matches!(self, BasicKind::String | BasicKind::UntypedString)
    }

    pub fn is_ordered(self) -> bool {
        self.is_integer() || self.is_float() || self.is_string()
    }

    /// Types a constant may have.
    pub fn is_const_type(self) -> bool {
        self.is_boolean() || self.is_numeric() || self.is_string()
    }

    /// Default type of an untyped kind.
    pub fn default_kind(self) -> BasicKind {
        use BasicKind::*;
        match self {
            UntypedBool => Bool,
            UntypedInt => Int,
            UntypedRune => Rune,
            UntypedFloat => Float64,
            UntypedComplex => Complex128,
            UntypedString => String,
            k => k,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: String,
    pub ty: TypeId,
    pub embedded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub params: Vec<TypeId>,
    pub results: Vec<TypeId>,
    /// The last parameter is `...T`, stored as `[]T`.
    pub variadic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Method {
    pub name: String,
    pub sig: TypeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Interface {
    /// Explicit methods, sorted by name.
    pub methods: Vec<Method>,
    pub embeds: Vec<TypeId>,
    /// Has type terms (`~int | string`); only usable as a constraint.
    pub has_terms: bool,
    /// The predeclared `comparable` constraint.
    pub comparable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// Result of an earlier error; every operation on it is silently accepted.
    Invalid,
    /// A type we know nothing about (cgo and imported members).
    Opaque,
    Basic(BasicKind),
    Pointer(TypeId),
    Slice(TypeId),
    /// `len` is `None` when the length expression was invalid.
    Array { len: Option<u64>, elem: TypeId },
    Map { key: TypeId, value: TypeId },
    Chan { dir: ChanDir, elem: TypeId },
    Struct(Vec<Field>),
    Func(Signature),
    Interface(Interface),
    Tuple(Vec<TypeId>),
    Named(u32),
    TypeParam(u32),
    /// A generic type with type arguments. Members are not substituted, so
    /// operations on it are accepted unchecked.
    Instance { origin: TypeId, args: Vec<TypeId> },
}

/// A defined type.
#[derive(Debug, Clone)]
pub struct NamedInfo {
    pub name: String,
    /// Package qualifier for types from other packages.
    pub pkg: Option<String>,
    pub obj: Option<ObjId>,
    pub underlying: TypeId,
    pub methods: Vec<ObjId>,
    pub type_params: Vec<TypeId>,
}

#[derive(Debug, Clone)]
pub struct TypeParamInfo {
    pub name: String,
    pub constraint: TypeId,
}

/// Storage and interning for all types of one check.
#[derive(Debug, Clone)]
pub struct TypeContext {
    types: Vec<Type>,
    interned: FxHashMap<Type, TypeId>,
    named: Vec<NamedInfo>,
    type_params: Vec<TypeParamInfo>,
}

impl Default for TypeContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeContext {
    pub fn new() -> Self {
        let mut tcx = TypeContext {
            types: Vec::new(),
            interned: FxHashMap::default(),
            named: Vec::new(),
            type_params: Vec::new(),
        };
        tcx.intern(Type::Invalid);
        tcx.intern(Type::Opaque);
        for kind in BasicKind::ALL {
            tcx.intern(Type::Basic(kind));
        }
        tcx
    }

    /// Intern a structural type.
    pub fn intern(&mut self, ty: Type) -> TypeId {
        if let Some(&id) = self.interned.get(&ty) {
            return id;
        }
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty.clone());
        self.interned.insert(ty, id);
        id
    }

    pub fn get(&self, id: TypeId) -> &Type {
        self.types.get(id.0 as usize).unwrap_or(&Type::Invalid)
    }

    pub fn basic(&self, kind: BasicKind) -> TypeId {
        let index = BasicKind::ALL.iter().position(|k| *k == kind).unwrap_or(0);
        TypeId(2 + index as u32)
    }

    pub fn basic_kind(&self, id: TypeId) -> Option<BasicKind> {
        match self.get(self.underlying(id)) {
            Type::Basic(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn pointer(&mut self, elem: TypeId) -> TypeId {
        self.intern(Type::Pointer(elem))
    }

    pub fn slice(&mut self, elem: TypeId) -> TypeId {
        self.intern(Type::Slice(elem))
    }

    pub fn tuple(&mut self, items: Vec<TypeId>) -> TypeId {
        self.intern(Type::Tuple(items))
    }

    pub fn func(&mut self, sig: Signature) -> TypeId {
        self.intern(Type::Func(sig))
    }

    /// The instance of generic type `origin` for `args`. Equal arguments
    /// yield the same id.
    pub fn instance(&mut self, origin: TypeId, args: Vec<TypeId>) -> TypeId {
        self.intern(Type::Instance { origin, args })
    }

    /// The generic type an instance was made from; other types unchanged.
    pub fn origin(&self, id: TypeId) -> TypeId {
        match self.get(id) {
            Type::Instance { origin, .. } => *origin,
            _ => id,
        }
    }

    /// Allocate a new defined type with an unset underlying type.
    pub fn new_named(
        &mut self,
        name: impl Into<String>,
        pkg: Option<String>,
        obj: Option<ObjId>,
    ) -> TypeId {
        let index = self.named.len() as u32;
        self.named.push(NamedInfo {
            name: name.into(),
            pkg,
            obj,
            underlying: TypeId::INVALID,
            methods: Vec::new(),
            type_params: Vec::new(),
        });
        let id = TypeId(self.types.len() as u32);
        self.types.push(Type::Named(index));
        id
    }

    pub fn new_type_param(&mut self, name: impl Into<String>, constraint: TypeId) -> TypeId {
        let index = self.type_params.len() as u32;
        self.type_params.push(TypeParamInfo {
            name: name.into(),
            constraint,
        });
        let id = TypeId(self.types.len() as u32);
        self.types.push(Type::TypeParam(index));
        id
    }

    pub fn named(&self, id: TypeId) -> Option<&NamedInfo> {
        match self.get(id) {
            Type::Named(index) => self.named.get(*index as usize),
            _ => None,
        }
    }

    pub fn named_mut(&mut self, id: TypeId) -> Option<&mut NamedInfo> {
        match self.types.get(id.0 as usize) {
            Some(Type::Named(index)) => self.named.get_mut(*index as usize),
            _ => None,
        }
    }

    pub fn type_param(&self, id: TypeId) -> Option<&TypeParamInfo> {
        match self.get(id) {
            Type::TypeParam(index) => self.type_params.get(*index as usize),
            _ => None,
        }
    }

    pub fn set_type_param_constraint(&mut self, id: TypeId, constraint: TypeId) {
        if let Type::TypeParam(index) = self.get(id) {
            let index = *index as usize;
            if let Some(info) = self.type_params.get_mut(index) {
                info.constraint = constraint;
            }
        }
    }

    /// Underlying type: follows defined types to their structure.
    pub fn underlying(&self, id: TypeId) -> TypeId {
        let mut id = id;
        // Bounded to guard against invalid recursive definitions.
        for _ in 0..64 {
            match self.named(id) {
                Some(info) => id = info.underlying,
                None => return id,
            }
        }
        TypeId::INVALID
    }

    pub fn under(&self, id: TypeId) -> &Type {
        self.get(self.underlying(id))
    }

    pub fn is_named(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Named(_)) || matches!(self.get(id), Type::Basic(_))
    }

    pub fn is_invalid(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Invalid)
    }

    pub fn is_untyped(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Basic(k) if k.is_untyped())
    }

    pub fn is_interface(&self, id: TypeId) -> bool {
        matches!(self.under(id), Type::Interface(_))
    }

    pub fn is_type_param(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::TypeParam(_))
    }

    /// Whether operations on the type must be accepted without checking.
    pub fn is_permissive(&self, id: TypeId) -> bool {
        matches!(
            self.get(id),
            Type::Invalid | Type::Opaque | Type::TypeParam(_) | Type::Instance { .. }
        ) || matches!(self.under(id), Type::Invalid | Type::Opaque | Type::Instance { .. })
    }

    /// Whether the type mentions anything permissive at any depth.
    pub fn contains_permissive(&self, id: TypeId) -> bool {
        self.contains_permissive_depth(id, 0)
    }

    fn contains_permissive_depth(&self, id: TypeId, depth: u32) -> bool {
        if depth > 16 {
            return false;
        }
        let d = depth + 1;
        match self.get(id) {
            Type::Invalid | Type::Opaque | Type::TypeParam(_) | Type::Instance { .. } => true,
            Type::Basic(_) | Type::Interface(_) | Type::Struct(_) => false,
            Type::Named(_) => self.named(id).is_some_and(|info| {
                !info.type_params.is_empty() || self.is_invalid(info.underlying)
            }),
            Type::Pointer(e) | Type::Slice(e) => self.contains_permissive_depth(*e, d),
            Type::Array { len, elem } => len.is_none() || self.contains_permissive_depth(*elem, d),
            Type::Map { key, value } => {
                self.contains_permissive_depth(*key, d) || self.contains_permissive_depth(*value, d)
            }
            Type::Chan { elem, .. } => self.contains_permissive_depth(*elem, d),
            Type::Func(sig) => sig
                .params
                .iter()
                .chain(sig.results.iter())
                .any(|t| self.contains_permissive_depth(*t, d)),
            Type::Tuple(items) => items.iter().any(|t| self.contains_permissive_depth(*t, d)),
        }
    }

    /// Type identity.
    pub fn identical(&self, a: TypeId, b: TypeId) -> bool {
        self.identical_depth(a, b, 0)
    }

    fn identical_depth(&self, a: TypeId, b: TypeId, depth: u32) -> bool {
        if a == b {
            return true;
        }
        if depth > 32 {
            return false;
        }
        let d = depth + 1;
        match (self.get(a), self.get(b)) {
            (Type::Basic(x), Type::Basic(y)) => x.canonical() == y.canonical(),
            (Type::Pointer(x), Type::Pointer(y)) | (Type::Slice(x), Type::Slice(y)) => {
                self.identical_depth(*x, *y, d)
            }
            (Type::Array { len: l1, elem: e1 }, Type::Array { len: l2, elem: e2 }) => {
                l1 == l2 && self.identical_depth(*e1, *e2, d)
            }
            (Type::Map { key: k1, value: v1 }, Type::Map { key: k2, value: v2 }) => {
                self.identical_depth(*k1, *k2, d) && self.identical_depth(*v1, *v2, d)
            }
            (Type::Chan { dir: d1, elem: e1 }, Type::Chan { dir: d2, elem: e2 }) => {
                d1 == d2 && self.identical_depth(*e1, *e2, d)
            }
            (Type::Struct(f1), Type::Struct(f2)) => {
                f1.len() == f2.len()
                    && f1.iter().zip(f2).all(|(x, y)| {
                        x.name == y.name && x.embedded == y.embedded && self.identical_depth(
                            x.ty,
                            y.ty,
                            d,
                        )
                    })
            }
            (Type::Func(s1), Type::Func(s2)) => {
                s1.variadic == s2.variadic
                    && self.identical_list(&s1.params, &s2.params, d)
                    && self.identical_list(&s1.results, &s2.results, d)
            }
            (Type::Tuple(t1), Type::Tuple(t2)) => self.identical_list(t1, t2, d),
            (Type::Instance { origin: o1, args: a1 }, Type::Instance { origin: o2, args: a2 }) => {
                o1 == o2 && self.identical_list(a1, a2, d)
            }
            (Type::Interface(i1), Type::Interface(i2)) => {
                i1.comparable == i2.comparable
                    && i1.has_terms == i2.has_terms
                    && i1.embeds.len() == i2.embeds.len()
                    && i1.embeds.iter().zip(&i2.embeds).all(|(x, y)| self.identical_depth(
                        *x,
                        *y,
                        d,
                    ))
                    && i1.methods.len() == i2.methods.len()
                    && i1
                        .methods
                        .iter()
                        .zip(&i2.methods)
                        .all(|(x, y)| x.name == y.name && self.identical_depth(x.sig, y.sig, d))
            }
            _ => false,
        }
    }

    fn identical_list(&self, a: &[TypeId], b: &[TypeId], depth: u32) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| self.identical_depth(*x, *y, depth))
    }

    /// Whether values of the type can be compared with `==`.
    pub fn comparable(&self, id: TypeId) -> bool {
        self.comparable_depth(id, 0)
    }

    fn comparable_depth(&self, id: TypeId, depth: u32) -> bool {
        if depth > 16 {
            return true;
        }
        match self.under(id) {
            Type::Invalid | Type::Opaque | Type::TypeParam(_) | Type::Instance { .. } => true,
            Type::Basic(k) => *k != BasicKind::UntypedNil,
            Type::Pointer(_) | Type::Chan { .. } | Type::Interface(_) => true,
            Type::Struct(fields) => fields.iter().all(|f| self.comparable_depth(f.ty, depth + 1)),
            Type::Array { elem, .. } => self.comparable_depth(*elem, depth + 1),
            Type::Slice(_)
            | Type::Map { .. }
            | Type::Func(_)
            | Type::Tuple(_)
            | Type::Named(_) => false,
        }
    }

    /// Whether `nil` is a valid value of the type.
    pub fn has_nil(&self, id: TypeId) -> bool {
        match self.under(id) {
            Type::Basic(k) => *k == BasicKind::UnsafePointer,
            Type::Pointer(_)
            | Type::Slice(_)
            | Type::Map { .. }
            | Type::Chan { .. }
            | Type::Func(_)
            | Type::Interface(_)
            | Type::Opaque
            | Type::Invalid
            | Type::TypeParam(_)
            | Type::Instance { .. } => true,
            _ => false,
        }
    }

    /// Default type for untyped values.
    pub fn default_type(&self, id: TypeId) -> TypeId {
        match self.get(id) {
            Type::Basic(k) if k.is_untyped() && *k != BasicKind::UntypedNil => {
                self.basic(k.default_kind())
            }
            _ => id,
        }
    }

    pub fn signature(&self, id: TypeId) -> Option<&Signature> {
        match self.under(id) {
            Type::Func(sig) => Some(sig),
            _ => None,
        }
    }

    // ========================================================================
    // Printing
    // ========================================================================

    /// Type as written in diagnostics. Types from other packages are
    /// qualified by package name.
    pub fn type_string(&self, id: TypeId) -> String {
        let mut out = String::new();
        self.write_type(&mut out, id, 0);
        out
    }

    fn write_type(&self, out: &mut String, id: TypeId, depth: u32) {
        if depth > 8 {
            out.push_str("...");
            return;
        }
        let d = depth + 1;
        match self.get(id) {
            Type::Invalid => out.push_str("invalid type"),
            Type::Opaque => out.push_str("opaque type"),
            Type::Basic(kind) => out.push_str(kind.name()),
            Type::Pointer(elem) => {
                out.push('*');
                self.write_type(out, *elem, d);
            }
            Type::Slice(elem) => {
                out.push_str("[]");
                self.write_type(out, *elem, d);
            }
            Type::Array { len, elem } => {
                match len {
                    Some(n) => {
                        let _ = write!(out, "[{n}]");
                    }
                    None => out.push_str("[-1]"),
                }
                self.write_type(out, *elem, d);
            }
            Type::Map { key, value } => {
                out.push_str("map[");
                self.write_type(out, *key, d);
                out.push(']');
                self.write_type(out, *value, d);
            }
            Type::Chan { dir, elem } => {
                out.push_str(match dir {
                    ChanDir::Both => "chan ",
                    ChanDir::Send => "chan<- ",
                    ChanDir::Recv => "<-chan ",
                });
                let paren = *dir != ChanDir::Recv
                    && matches!(self.get(*elem), Type::Chan { dir: ChanDir::Recv, .. });
                if paren {
                    out.push('(');
                }
                self.write_type(out, *elem, d);
                if paren {
                    out.push(')');
                }
            }
            Type::Struct(fields) => {
                out.push_str("struct{");
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        out.push_str("; ");
                    }
                    if !field.embedded {
                        out.push_str(&field.name);
                        out.push(' ');
                    }
                    self.write_type(out, field.ty, d);
                }
                out.push('}');
            }
            Type::Func(sig) => {
                out.push_str("func");
                self.write_signature(out, sig, d);
            }
            Type::Interface(iface) => {
                if iface.comparable {
                    out.push_str("comparable");
                    return;
                }
                if iface.methods.is_empty() && iface.embeds.is_empty() {
                    out.push_str("any");
                    return;
                }
                out.push_str("interface{");
                let mut first = true;
                for embed in &iface.embeds {
                    if !first {
                        out.push_str("; ");
                    }
                    first = false;
                    self.write_type(out, *embed, d);
                }
                for method in &iface.methods {
                    if !first {
                        out.push_str("; ");
                    }
                    first = false;
                    out.push_str(&method.name);
                    if let Type::Func(sig) = self.get(method.sig) {
                        self.write_signature(out, sig, d);
                    }
                }
                out.push('}');
            }
            Type::Tuple(items) => self.write_tuple(out, items, false, d),
            Type::Named(_) => {
                if let Some(info) = self.named(id) {
                    if let Some(pkg) = &info.pkg {
                        out.push_str(pkg);
                        out.push('.');
                    }
                    out.push_str(&info.name);
                    if !info.type_params.is_empty() {
                        out.push('[');
                        for (i, tp) in info.type_params.iter().enumerate() {
                            if i > 0 {
                                out.push_str(", ");
                            }
                            self.write_type(out, *tp, d);
                        }
                        out.push(']');
                    }
                }
            }
            Type::TypeParam(_) => {
                if let Some(info) = self.type_param(id) {
                    out.push_str(&info.name);
                }
            }
            Type::Instance { origin, args } => {
                match self.named(*origin) {
                    Some(info) => {
                        if let Some(pkg) = &info.pkg {
                            out.push_str(pkg);
                            out.push('.');
                        }
                        out.push_str(&info.name);
                    }
                    None => self.write_type(out, *origin, d),
                }
                out.push('[');
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write_type(out, *arg, d);
                }
                out.push(']');
            }
        }
    }

    fn write_tuple(&self, out: &mut String, items: &[TypeId], variadic: bool, depth: u32) {
        out.push('(');
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            if variadic && i + 1 == items.len() {
                out.push_str("...");
                match self.get(*item) {
                    Type::Slice(elem) => self.write_type(out, *elem, depth),
                    _ => self.write_type(out, *item, depth),
                }
            } else {
                self.write_type(out, *item, depth);
            }
        }
        out.push(')');
    }

    fn write_signature(&self, out: &mut String, sig: &Signature, depth: u32) {
        self.write_tuple(out, &sig.params, sig.variadic, depth);
        match sig.results.len() {
            0 => {}
            1 => {
                out.push(' ');
                self.write_type(out, sig.results[0], depth);
            }
            _ => {
                out.push(' ');
                self.write_tuple(out, &sig.results, false, depth);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_shares_structural_types() {
        let mut tcx = TypeContext::new();
        let int = tcx.basic(BasicKind::Int);
        let a = tcx.slice(int);
        let b = tcx.slice(int);
        assert_eq!(a, b);
        assert_eq!(tcx.type_string(a), "[]int");
    }

    #[test]
    fn test_named_types_are_distinct() {
        let mut tcx = TypeContext::new();
        let a = tcx.new_named("T", None, None);
        let b = tcx.new_named("T", None, None);
        assert_ne!(a, b);
        assert!(!tcx.identical(a, b));
        let int = tcx.basic(BasicKind::Int);
        if let Some(info) = tcx.named_mut(a) {
            info.underlying = int;
        }
        assert_eq!(tcx.underlying(a), int);
    }

    #[test]
    fn test_byte_is_uint8() {
        let mut tcx = TypeContext::new();
        let byte = tcx.basic(BasicKind::Byte);
        let uint8 = tcx.basic(BasicKind::Uint8);
        assert!(tcx.identical(byte, uint8));
        let s1 = tcx.slice(byte);
        let s2 = tcx.slice(uint8);
        assert!(tcx.identical(s1, s2));
        assert_eq!(tcx.type_string(s1), "[]byte");
    }

    #[test]
    fn test_signature_strings() {
        let mut tcx = TypeContext::new();
        let int = tcx.basic(BasicKind::Int);
        let string = tcx.basic(BasicKind::String);
        let ints = tcx.slice(int);
        let f = tcx.func(Signature {
            params: vec![string, ints],
            results: vec![int, string],
            variadic: true,
        });
        assert_eq!(tcx.type_string(f), "func(string, ...int) (int, string)");
        let chan = tcx.intern(Type::Chan {
            dir: ChanDir::Recv,
            elem: int,
        });
        assert_eq!(tcx.type_string(chan), "<-chan int");
    }

    #[test]
    fn test_comparable() {
        let mut tcx = TypeContext::new();
        let int = tcx.basic(BasicKind::Int);
        let ints = tcx.slice(int);
        let s = tcx.intern(Type::Struct(vec![Field {
            name: "x".into(),
            ty: ints,
            embedded: false,
        }]));
        assert!(tcx.comparable(int));
        assert!(!tcx.comparable(ints));
        assert!(!tcx.comparable(s));
    }

    #[test]
    fn test_instances_are_interned() {
        let mut tcx = TypeContext::new();
        let list = tcx.new_named("List", None, None);
        let int = tcx.basic(BasicKind::Int);
        let string = tcx.basic(BasicKind::String);
        let a = tcx.instance(list, vec![int]);
        let b = tcx.instance(list, vec![int]);
        assert_eq!(a, b);
        assert_eq!(tcx.origin(a), list);
        assert!(tcx.is_permissive(a));
        assert!(tcx.identical(a, b));
        let pair = tcx.instance(list, vec![string, int]);
        assert_ne!(pair, a);
        assert_eq!(tcx.type_string(pair), "List[string, int]");
    }
}
