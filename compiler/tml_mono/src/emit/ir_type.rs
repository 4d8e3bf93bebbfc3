//! Low-level value types of the emitted instruction stream.

use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum IrType {
    Void,
    I1,
    I8,
    I16,
    I32,
    I64,
    I128,
    Float,
    Double,
    Ptr,
    /// Zero-sized aggregate `{}`; the runtime shape of `Unit`.
    Empty,
    /// Identified type, written with its sigil: `%struct.Point`.
    Named(String),
    /// Literal struct `{ a, b }`.
    Anon(Vec<IrType>),
    Array(u64, Box<IrType>),
}

impl IrType {
    /// `{ ptr, ptr }`: closure values and dyn values share this shape.
    pub fn fat_ptr() -> IrType {
        IrType::Anon(vec![IrType::Ptr, IrType::Ptr])
    }

    pub fn named(sigil_name: impl Into<String>) -> IrType {
        IrType::Named(sigil_name.into())
    }

    pub fn is_void(&self) -> bool {
        matches!(self, IrType::Void)
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            IrType::Empty | IrType::Named(_) | IrType::Anon(_) | IrType::Array(..)
        )
    }

    pub fn int_bits(&self) -> Option<u32> {
        match self {
            IrType::I1 => Some(1),
            IrType::I8 => Some(8),
            IrType::I16 => Some(16),
            IrType::I32 => Some(32),
            IrType::I64 => Some(64),
            IrType::I128 => Some(128),
            _ => None,
        }
    }

    /// A constant of this type usable as a placeholder or zero value.
    pub fn zero_literal(&self) -> &'static str {
        match self {
            IrType::Void => "",
            IrType::I1 => "false",
            IrType::I8 | IrType::I16 | IrType::I32 | IrType::I64 | IrType::I128 => "0",
            IrType::Float | IrType::Double => "0.0",
            IrType::Ptr => "null",
            IrType::Empty | IrType::Named(_) | IrType::Anon(_) | IrType::Array(..) => {
                "zeroinitializer"
            }
        }
    }

    /// Suffix used when a constructor overload is keyed by argument types.
    pub fn overload_suffix(&self) -> String {
        match self {
            IrType::I1 => "Bool".to_string(),
            IrType::I8 => "I8".to_string(),
            IrType::I16 => "I16".to_string(),
            IrType::I32 => "I32".to_string(),
            IrType::I64 => "I64".to_string(),
            IrType::I128 => "I128".to_string(),
            IrType::Float => "F32".to_string(),
            IrType::Double => "F64".to_string(),
            IrType::Ptr | IrType::Named(_) => "ptr".to_string(),
            IrType::Void | IrType::Empty => "Unit".to_string(),
            IrType::Anon(_) | IrType::Array(..) => "agg".to_string(),
        }
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::Void => f.write_str("void"),
            IrType::I1 => f.write_str("i1"),
            IrType::I8 => f.write_str("i8"),
            IrType::I16 => f.write_str("i16"),
            IrType::I32 => f.write_str("i32"),
            IrType::I64 => f.write_str("i64"),
            IrType::I128 => f.write_str("i128"),
            IrType::Float => f.write_str("float"),
            IrType::Double => f.write_str("double"),
            IrType::Ptr => f.write_str("ptr"),
            IrType::Empty => f.write_str("{}"),
            IrType::Named(name) => f.write_str(name),
            IrType::Anon(fields) if fields.is_empty() => f.write_str("{}"),
            IrType::Anon(fields) => {
                f.write_str("{ ")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{field}")?;
                }
                f.write_str(" }")
            }
            IrType::Array(len, elem) => write!(f, "[{len} x {elem}]"),
        }
    }
}
