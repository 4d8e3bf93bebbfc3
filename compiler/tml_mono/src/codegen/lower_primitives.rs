//! Static methods on primitive types and numeric conversions.
//!
//! `I64::max_value()`, `F32::default()`, `I32::from(x)` and friends are
//! folded to constants or a single cast instruction; they never become
//! calls.

use tml_ir::{Expr, Path, PrimitiveKind, Type};

use crate::emit::IrType;

use super::context::primitive_ir;
use super::expr_lowerer::{FnLowerer, Value};
use super::lower_literals::float_literal;

/// Width and signedness of a kind that participates in numeric casts.
fn numeric_shape(kind: PrimitiveKind) -> Option<(u32, bool)> {
    let signed = kind.is_signed_int();
    match kind {
        PrimitiveKind::Str | PrimitiveKind::Unit | PrimitiveKind::Never => None,
        _ => kind.bit_width().map(|bits| (bits, signed)),
    }
}

/// Cast instruction converting `from` to `to`, or `None` when the two share
/// a representation.
pub(crate) fn conversion_op(from: PrimitiveKind, to: PrimitiveKind) -> Option<&'static str> {
    let (from_bits, from_signed) = numeric_shape(from)?;
    let (to_bits, to_signed) = numeric_shape(to)?;
    match (from.is_float(), to.is_float()) {
        (false, false) if from_bits < to_bits => Some(if from_signed { "sext" } else { "zext" }),
        (false, false) if from_bits > to_bits => Some("trunc"),
        (false, false) => None,
        (false, true) => Some(if from_signed { "sitofp" } else { "uitofp" }),
        (true, false) => Some(if to_signed { "fptosi" } else { "fptoui" }),
        (true, true) if from_bits < to_bits => Some("fpext"),
        (true, true) if from_bits > to_bits => Some("fptrunc"),
        (true, true) => None,
    }
}

/// Smallest and largest value of a numeric kind as constant text.
fn bounds(kind: PrimitiveKind) -> Option<(String, String)> {
    match kind {
        PrimitiveKind::Bool => Some(("false".to_string(), "true".to_string())),
        PrimitiveKind::F32 => {
            let max = f64::from(f32::MAX);
            Some((
                float_literal(-max, kind),
                float_literal(max, kind),
            ))
        }
        PrimitiveKind::F64 => Some((
            float_literal(f64::MIN, kind),
            float_literal(f64::MAX, kind),
        )),
        PrimitiveKind::Char => Some(("0".to_string(), u32::from(char::MAX).to_string())),
        // All ones is the unsigned maximum whatever the width.
        _ if kind.is_unsigned_int() => Some(("0".to_string(), "-1".to_string())),
        _ if kind.is_signed_int() => {
            let bits = kind.bit_width()?;
            let max = i128::MAX >> (128 - bits);
            let min = -max - 1;
            Some((min.to_string(), max.to_string()))
        }
        _ => None,
    }
}

impl FnLowerer<'_, '_> {
    /// Stage 1 of call resolution.
    pub(crate) fn try_primitive_static(
        &mut self,
        path: &Path,
        args: &[Expr],
        expr: &Expr,
    ) -> Option<Value> {
        let kind = PrimitiveKind::from_name(&path.qualifier()?)?;
        let method = path.last()?;
        let ir = primitive_ir(kind);
        let ty = Type::Primitive(kind);
        let constant = |repr: String| Some(Value::new(repr, ir.clone(), ty.clone()));

        match method {
            "default" | "zero" if args.is_empty() => match kind {
                PrimitiveKind::Unit | PrimitiveKind::Never => Some(Value::unit()),
                PrimitiveKind::Str => {
                    let global = self.cx.emitter.string_literal("");
                    constant(global)
                }
                _ => constant(ir.zero_literal().to_string()),
            },
            "one" if args.is_empty() => match kind {
                _ if kind.is_float() => constant(float_literal(1.0, kind)),
                PrimitiveKind::Bool => constant("true".to_string()),
                _ if kind.is_integer() || kind == PrimitiveKind::Char => constant("1".to_string()),
                _ => None,
            },
            "min_value" | "max_value" if args.is_empty() => {
                let (min, max) = bounds(kind)?;
                constant(if method == "min_value" { min } else { max })
            }
            "from" if args.len() == 1 => {
                let value = self.lower_expr(&args[0], None);
                tracing::trace!(from = %value.ty, to = %kind, span = ?expr.span, "primitive conversion");
                Some(self.convert(value, kind))
            }
            _ => None,
        }
    }

    /// Numeric cast of `value` to `to`; non-numeric values pass through.
    pub(crate) fn convert(&mut self, value: Value, to: PrimitiveKind) -> Value {
        let Some(from) = value.ty.as_primitive() else {
            return value;
        };
        let to_ir = primitive_ir(to);
        match conversion_op(from, to) {
            Some(op) => {
                let result = self.fresh();
                self.emit(format!("{result} = {op} {} {} to {to_ir}", value.ir, value.repr));
                Value::new(result, to_ir, Type::Primitive(to))
            }
            None => Value::new(value.repr, to_ir, Type::Primitive(to)),
        }
    }

    /// Bring an argument to the parameter's representation when both are
    /// primitives of different widths.
    pub(crate) fn convert_to(&mut self, value: Value, target: &Type, target_ir: &IrType) -> Value {
        if value.ir == *target_ir {
            return value;
        }
        match (value.ty.as_primitive(), target.as_primitive()) {
            (Some(_), Some(to)) => self.convert(value, to),
            _ => value,
        }
    }
}
