//! Target sizes and alignments, following the gc compiler's standard rules.

use crate::build::Platform;
use crate::checker::types::{BasicKind, Type, TypeContext, TypeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sizes {
    pub word_size: i64,
    pub max_align: i64,
}

impl Sizes {
    pub fn for_platform(platform: &Platform) -> Self {
        Sizes {
            word_size: platform.word_size as i64,
            max_align: platform.max_align as i64,
        }
    }

    /// Alignment of `ty`, or `None` when unknown.
    pub fn alignof(&self, tcx: &TypeContext, ty: TypeId) -> Option<i64> {
        self.alignof_depth(tcx, ty, 0)
    }

    fn alignof_depth(&self, tcx: &TypeContext, ty: TypeId, depth: u32) -> Option<i64> {
        if depth > 32 {
            return None;
        }
        match tcx.under(ty) {
            Type::Array { elem, .. } => self.alignof_depth(tcx, *elem, depth + 1),
            Type::Struct(fields) => {
                let mut max = 1;
                for field in fields {
                    max = max.max(self.alignof_depth(tcx, field.ty, depth + 1)?);
                }
                Some(max)
            }
            Type::Slice(_) | Type::Interface(_) => Some(self.word_size),
            Type::Basic(kind) if kind.is_string() => Some(self.word_size),
            Type::Basic(BasicKind::Complex64) => Some(4),
            Type::Basic(BasicKind::Complex128) => Some(8.min(self.max_align)),
            _ => {
                let size = self.sizeof_depth(tcx, ty, depth + 1)?;
                Some(size.clamp(1, self.max_align))
            }
        }
    }

    /// Size of `ty` in bytes, or `None` when unknown.
    pub fn sizeof(&self, tcx: &TypeContext, ty: TypeId) -> Option<i64> {
        self.sizeof_depth(tcx, ty, 0)
    }

    fn sizeof_depth(&self, tcx: &TypeContext, ty: TypeId, depth: u32) -> Option<i64> {
        if depth > 32 {
            return None;
        }
        let w = self.word_size;
        match tcx.under(ty) {
            Type::Basic(kind) => Some(match kind.canonical() {
                BasicKind::Bool | BasicKind::Int8 | BasicKind::Uint8 => 1,
                BasicKind::Int16 | BasicKind::Uint16 => 2,
                BasicKind::Int32 | BasicKind::Uint32 | BasicKind::Float32 => 4,
                BasicKind::Int64
                | BasicKind::Uint64
                | BasicKind::Float64
                | BasicKind::Complex64 => 8,
                BasicKind::Complex128 => 16,
                BasicKind::String => 2 * w,
                BasicKind::Int
                | BasicKind::Uint
                | BasicKind::Uintptr
                | BasicKind::UnsafePointer => w,
                _ => return None,
            }),
            Type::Array { len, elem } => {
                let n = i64::try_from((*len)?).ok()?;
                if n == 0 {
                    return Some(0);
                }
                let size = self.sizeof_depth(tcx, *elem, depth + 1)?;
                let align = self.alignof_depth(tcx, *elem, depth + 1)?;
                let stride = align_up(size, align);
                stride.checked_mul(n - 1)?.checked_add(size)
            }
            Type::Slice(_) => Some(3 * w),
            Type::Struct(fields) => {
                if fields.is_empty() {
                    return Some(0);
                }
                let tys: Vec<TypeId> = fields.iter().map(|f| f.ty).collect();
                let offsets = self.offsets_depth(tcx, &tys, depth + 1)?;
                let last = *tys.last()?;
                let end = offsets.last()? + self.sizeof_depth(tcx, last, depth + 1)?;
                let align = self.alignof_depth(tcx, ty, depth + 1)?;
                Some(align_up(end, align))
            }
            Type::Interface(_) => Some(2 * w),
            Type::Pointer(_) | Type::Map { .. } | Type::Chan { .. } | Type::Func(_) => Some(w),
            _ => None,
        }
    }

    /// Field offsets for a struct with the given field types.
    pub fn offsetsof(&self, tcx: &TypeContext, fields: &[TypeId]) -> Option<Vec<i64>> {
        self.offsets_depth(tcx, fields, 0)
    }

    fn offsets_depth(&self, tcx: &TypeContext, fields: &[TypeId], depth: u32) -> Option<Vec<i64>> {
        let mut offsets = Vec::with_capacity(fields.len());
        let mut offset = 0;
        for field in fields {
            let align = self.alignof_depth(tcx, *field, depth)?;
            offset = align_up(offset, align);
            offsets.push(offset);
            offset += self.sizeof_depth(tcx, *field, depth)?;
        }
        Some(offsets)
    }
}

fn align_up(x: i64, align: i64) -> i64 {
    if align <= 1 {
        x
    } else {
        (x + align - 1) / align * align
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::types::Field;

    fn sizes(word: i64) -> Sizes {
        Sizes {
            word_size: word,
            max_align: word,
        }
    }

    #[test]
    fn test_basic_sizes() {
        let tcx = TypeContext::new();
        let int = tcx.basic(BasicKind::Int);
        let string = tcx.basic(BasicKind::String);
        assert_eq!(sizes(8).sizeof(&tcx, int), Some(8));
        assert_eq!(sizes(4).sizeof(&tcx, int), Some(4));
        assert_eq!(sizes(8).sizeof(&tcx, string), Some(16));
        assert_eq!(sizes(4).alignof(&tcx, tcx.basic(BasicKind::Int64)), Some(4));
    }

    #[test]
    fn test_struct_layout() {
        let mut tcx = TypeContext::new();
        let b = tcx.basic(BasicKind::Bool);
        let i64t = tcx.basic(BasicKind::Int64);
        let s = tcx.intern(Type::Struct(vec![
            Field {
                name: "a".into(),
                ty: b,
                embedded: false,
            },
            Field {
                name: "b".into(),
                ty: i64t,
                embedded: false,
            },
            Field {
                name: "c".into(),
                ty: b,
                embedded: false,
            },
        ]));
        assert_eq!(sizes(8).sizeof(&tcx, s), Some(24));
        assert_eq!(sizes(8).offsetsof(&tcx, &[b, i64t, b]), Some(vec![0, 8, 16]));
        assert_eq!(sizes(4).sizeof(&tcx, s), Some(16));
    }

    #[test]
    fn test_array_size() {
        let mut tcx = TypeContext::new();
        let i32t = tcx.basic(BasicKind::Int32);
        let arr = tcx.intern(Type::Array { len: Some(10), elem: i32t });
        assert_eq!(sizes(8).sizeof(&tcx, arr), Some(40));
    }
}
