//! The closed set of pointer-like wrappers that field access sees through.

use tml_ir::Type;

/// How to reach a wrapper's payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum WrapperKind {
    /// `Box[T]`, `Heap[T]`: `{ ptr }` to the payload.
    Owned,
    /// `Arc[T]`, `Shared[T]`, `Rc[T]`: `{ ptr }` to a counted block
    /// `{ i64 strong, i64 weak, T data }`.
    RefCounted,
    /// `Ptr[T]`, `RawPtr[T]`, raw pointers and references: the value is the
    /// payload address.
    Raw,
}

/// Counted block fields preceding the payload.
pub const REF_COUNT_HEADER_FIELDS: u32 = 2;

/// Name of the counted block type for `RefCounted` wrappers.
pub const REF_COUNT_BLOCK: &str = "ArcInner";

impl WrapperKind {
    pub fn from_name(name: &str) -> Option<WrapperKind> {
        match name {
            "Box" | "Heap" => Some(WrapperKind::Owned),
            "Arc" | "Shared" | "Rc" => Some(WrapperKind::RefCounted),
            "Ptr" | "RawPtr" => Some(WrapperKind::Raw),
            _ => None,
        }
    }

    /// Wrapper kind and payload type of `ty`, if it is a wrapper.
    pub fn classify(ty: &Type) -> Option<(WrapperKind, &Type)> {
        match ty {
            Type::Named { name, args, .. } if args.len() == 1 => {
                WrapperKind::from_name(name).map(|kind| (kind, &args[0]))
            }
            Type::Ptr(inner) | Type::Ref { inner, .. } => Some((WrapperKind::Raw, inner)),
            _ => None,
        }
    }

    /// Whether the wrapper value is a one-field struct holding the pointer.
    pub fn is_boxed_struct(self) -> bool {
        matches!(self, WrapperKind::Owned | WrapperKind::RefCounted)
    }

    /// Field of the counted block holding the payload.
    pub fn payload_index(self) -> Option<u32> {
        match self {
            WrapperKind::RefCounted => Some(REF_COUNT_HEADER_FIELDS),
            WrapperKind::Owned | WrapperKind::Raw => None,
        }
    }
}

/// Number of directly nested wrapper layers: `Box[Arc[Point]]` is 2.
pub fn wrapper_depth(ty: &Type) -> usize {
    let mut depth = 0;
    let mut current = ty;
    while let Some((_, inner)) = WrapperKind::classify(current) {
        depth += 1;
        current = inner;
    }
    depth
}
