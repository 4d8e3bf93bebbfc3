//! Semantic types attached to the resolved AST.
//!
//! Types are plain trees produced by the type checker. A generic parameter is
//! represented as a [`Type::Named`] with no arguments; whether that name is a
//! parameter depends on the generic scope it is read in, so every query that
//! cares takes the set of generic names explicitly.

use std::fmt;

/// Built-in scalar and string types.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum PrimitiveKind {
    I8,
    I16,
    I32,
    I64,
    I128,
    U8,
    U16,
    U32,
    U64,
    U128,
    F32,
    F64,
    Bool,
    Char,
    Str,
    Unit,
    Never,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 17] = [
        PrimitiveKind::I8,
        PrimitiveKind::I16,
        PrimitiveKind::I32,
        PrimitiveKind::I64,
        PrimitiveKind::I128,
        PrimitiveKind::U8,
        PrimitiveKind::U16,
        PrimitiveKind::U32,
        PrimitiveKind::U64,
        PrimitiveKind::U128,
        PrimitiveKind::F32,
        PrimitiveKind::F64,
        PrimitiveKind::Bool,
        PrimitiveKind::Char,
        PrimitiveKind::Str,
        PrimitiveKind::Unit,
        PrimitiveKind::Never,
    ];

    /// Source-level spelling, also used as the mangled token.
    pub const fn name(self) -> &'static str {
        match self {
            PrimitiveKind::I8 => "I8",
            PrimitiveKind::I16 => "I16",
            PrimitiveKind::I32 => "I32",
            PrimitiveKind::I64 => "I64",
            PrimitiveKind::I128 => "I128",
            PrimitiveKind::U8 => "U8",
            PrimitiveKind::U16 => "U16",
            PrimitiveKind::U32 => "U32",
            PrimitiveKind::U64 => "U64",
            PrimitiveKind::U128 => "U128",
            PrimitiveKind::F32 => "F32",
            PrimitiveKind::F64 => "F64",
            PrimitiveKind::Bool => "Bool",
            PrimitiveKind::Char => "Char",
            PrimitiveKind::Str => "Str",
            PrimitiveKind::Unit => "Unit",
            PrimitiveKind::Never => "Never",
        }
    }

    /// Parse a primitive name. `Usize`/`Isize` are accepted as 64-bit aliases.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Usize" => Some(PrimitiveKind::U64),
            "Isize" => Some(PrimitiveKind::I64),
            _ => Self::ALL.iter().copied().find(|kind| kind.name() == name),
        }
    }

    pub const fn is_signed_int(self) -> bool {
        matches!(
            self,
            PrimitiveKind::I8
                | PrimitiveKind::I16
                | PrimitiveKind::I32
                | PrimitiveKind::I64
                | PrimitiveKind::I128
        )
    }

    pub const fn is_unsigned_int(self) -> bool {
        matches!(
            self,
            PrimitiveKind::U8
                | PrimitiveKind::U16
                | PrimitiveKind::U32
                | PrimitiveKind::U64
                | PrimitiveKind::U128
        )
    }

    pub const fn is_integer(self) -> bool {
        self.is_signed_int() || self.is_unsigned_int()
    }

    pub const fn is_float(self) -> bool {
        matches!(self, PrimitiveKind::F32 | PrimitiveKind::F64)
    }

    /// Width in bits for numeric kinds; `Bool` is 1, `Char` is 32.
    pub const fn bit_width(self) -> Option<u32> {
        match self {
            PrimitiveKind::I8 | PrimitiveKind::U8 => Some(8),
            PrimitiveKind::I16 | PrimitiveKind::U16 => Some(16),
            PrimitiveKind::I32 | PrimitiveKind::U32 | PrimitiveKind::Char | PrimitiveKind::F32 => {
                Some(32)
            }
            PrimitiveKind::I64 | PrimitiveKind::U64 | PrimitiveKind::F64 => Some(64),
            PrimitiveKind::I128 | PrimitiveKind::U128 => Some(128),
            PrimitiveKind::Bool => Some(1),
            PrimitiveKind::Str | PrimitiveKind::Unit | PrimitiveKind::Never => None,
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A resolved semantic type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Type {
    Primitive(PrimitiveKind),
    /// User or library nominal type. `module` is empty for the local module.
    Named {
        name: String,
        module: String,
        args: Vec<Type>,
    },
    Ref {
        mutable: bool,
        inner: Box<Type>,
    },
    Ptr(Box<Type>),
    /// Plain function pointer type.
    Func {
        params: Vec<Type>,
        ret: Box<Type>,
    },
    /// Closure type; values may carry a captured environment.
    Closure {
        params: Vec<Type>,
        ret: Box<Type>,
    },
    Tuple(Vec<Type>),
    Array {
        elem: Box<Type>,
        len: u64,
    },
    Slice(Box<Type>),
    DynBehavior {
        name: String,
        args: Vec<Type>,
    },
    Class(String),
}

impl Type {
    pub const UNIT: Type = Type::Primitive(PrimitiveKind::Unit);
    pub const I32: Type = Type::Primitive(PrimitiveKind::I32);
    pub const I64: Type = Type::Primitive(PrimitiveKind::I64);
    pub const BOOL: Type = Type::Primitive(PrimitiveKind::Bool);
    pub const STR: Type = Type::Primitive(PrimitiveKind::Str);
    pub const F64: Type = Type::Primitive(PrimitiveKind::F64);

    /// Local nominal type with type arguments.
    pub fn named(name: impl Into<String>, args: Vec<Type>) -> Type {
        Type::Named {
            name: name.into(),
            module: String::new(),
            args,
        }
    }

    /// Nominal type without arguments; also how generic parameters are spelled.
    pub fn param(name: impl Into<String>) -> Type {
        Type::named(name, Vec::new())
    }

    pub fn ptr(inner: Type) -> Type {
        Type::Ptr(Box::new(inner))
    }

    pub fn reference(mutable: bool, inner: Type) -> Type {
        Type::Ref {
            mutable,
            inner: Box::new(inner),
        }
    }

    pub fn func(params: Vec<Type>, ret: Type) -> Type {
        Type::Func {
            params,
            ret: Box::new(ret),
        }
    }

    pub fn closure(params: Vec<Type>, ret: Type) -> Type {
        Type::Closure {
            params,
            ret: Box::new(ret),
        }
    }

    pub fn dyn_behavior(name: impl Into<String>, args: Vec<Type>) -> Type {
        Type::DynBehavior {
            name: name.into(),
            args,
        }
    }

    pub fn array(elem: Type, len: u64) -> Type {
        Type::Array {
            elem: Box::new(elem),
            len,
        }
    }

    pub fn as_primitive(&self) -> Option<PrimitiveKind> {
        match self {
            Type::Primitive(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Type::Primitive(PrimitiveKind::Unit))
            || matches!(self, Type::Tuple(elems) if elems.is_empty())
    }

    /// Types that produce no value at runtime.
    pub fn is_void_like(&self) -> bool {
        self.is_unit() || matches!(self, Type::Primitive(PrimitiveKind::Never))
    }

    /// Name and arguments of a nominal type.
    pub fn as_named(&self) -> Option<(&str, &[Type])> {
        match self {
            Type::Named { name, args, .. } => Some((name, args)),
            _ => None,
        }
    }

    /// Parameter and return types of function-like types.
    pub fn fn_signature(&self) -> Option<(&[Type], &Type)> {
        match self {
            Type::Func { params, ret } | Type::Closure { params, ret } => Some((params, ret)),
            _ => None,
        }
    }

    /// Equality that ignores module qualifiers on nominal types.
    pub fn structurally_eq(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Primitive(a), Type::Primitive(b)) => a == b,
            (
                Type::Named {
                    name: a, args: aa, ..
                },
                Type::Named {
                    name: b, args: ba, ..
                },
            )
            | (
                Type::DynBehavior { name: a, args: aa },
                Type::DynBehavior { name: b, args: ba },
            ) => a == b && all_structurally_eq(aa, ba),
            (
                Type::Ref {
                    mutable: am,
                    inner: a,
                },
                Type::Ref {
                    mutable: bm,
                    inner: b,
                },
            ) => am == bm && a.structurally_eq(b),
            (Type::Ptr(a), Type::Ptr(b)) | (Type::Slice(a), Type::Slice(b)) => {
                a.structurally_eq(b)
            }
            (
                Type::Func {
                    params: ap,
                    ret: ar,
                },
                Type::Func {
                    params: bp,
                    ret: br,
                },
            )
            | (
                Type::Closure {
                    params: ap,
                    ret: ar,
                },
                Type::Closure {
                    params: bp,
                    ret: br,
                },
            ) => all_structurally_eq(ap, bp) && ar.structurally_eq(br),
            (Type::Tuple(a), Type::Tuple(b)) => all_structurally_eq(a, b),
            (Type::Array { elem: a, len: al }, Type::Array { elem: b, len: bl }) => {
                al == bl && a.structurally_eq(b)
            }
            (Type::Class(a), Type::Class(b)) => a == b,
            _ => false,
        }
    }

    /// Whether any nominal leaf of this type is one of `generic_names`.
    pub fn mentions_any<S: AsRef<str>>(&self, generic_names: &[S]) -> bool {
        let is_param = |name: &str| generic_names.iter().any(|g| g.as_ref() == name);
        match self {
            Type::Primitive(_) | Type::Class(_) => false,
            Type::Named { name, args, .. } => {
                (args.is_empty() && is_param(name))
                    || args.iter().any(|a| a.mentions_any(generic_names))
            }
            Type::DynBehavior { args, .. } | Type::Tuple(args) => {
                args.iter().any(|a| a.mentions_any(generic_names))
            }
            Type::Ref { inner, .. } | Type::Ptr(inner) | Type::Slice(inner) => {
                inner.mentions_any(generic_names)
            }
            Type::Array { elem, .. } => elem.mentions_any(generic_names),
            Type::Func { params, ret } | Type::Closure { params, ret } => {
                params.iter().any(|p| p.mentions_any(generic_names))
                    || ret.mentions_any(generic_names)
            }
        }
    }
}

fn all_structurally_eq(a: &[Type], b: &[Type]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.structurally_eq(y))
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Type]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(kind) => write!(f, "{kind}"),
            Type::Named { name, module, args } => {
                if !module.is_empty() {
                    write!(f, "{module}::")?;
                }
                f.write_str(name)?;
                if !args.is_empty() {
                    f.write_str("[")?;
                    write_list(f, args)?;
                    f.write_str("]")?;
                }
                Ok(())
            }
            Type::Ref { mutable, inner } => {
                if *mutable {
                    write!(f, "mut ref {inner}")
                } else {
                    write!(f, "ref {inner}")
                }
            }
            Type::Ptr(inner) => write!(f, "Ptr[{inner}]"),
            Type::Func { params, ret } => {
                f.write_str("func(")?;
                write_list(f, params)?;
                write!(f, ") -> {ret}")
            }
            Type::Closure { params, ret } => {
                f.write_str("do(")?;
                write_list(f, params)?;
                write!(f, ") -> {ret}")
            }
            Type::Tuple(elems) => {
                f.write_str("(")?;
                write_list(f, elems)?;
                f.write_str(")")
            }
            Type::Array { elem, len } => write!(f, "[{elem}; {len}]"),
            Type::Slice(elem) => write!(f, "[{elem}]"),
            Type::DynBehavior { name, args } => {
                write!(f, "dyn {name}")?;
                if !args.is_empty() {
                    f.write_str("[")?;
                    write_list(f, args)?;
                    f.write_str("]")?;
                }
                Ok(())
            }
            Type::Class(name) => write!(f, "class {name}"),
        }
    }
}

impl From<PrimitiveKind> for Type {
    fn from(kind: PrimitiveKind) -> Self {
        Type::Primitive(kind)
    }
}

#[cfg(test)]
mod tests;
