//! Literals, identifiers and bare paths used as values.

use tml_diagnostic::ErrorCode;
use tml_ir::{Expr, Literal, Path, PrimitiveKind, Type};

use crate::emit::IrType;

use super::context::primitive_ir;
use super::expr_lowerer::{FnLowerer, Value};
use super::scope::Storage;

/// LLVM spelling of a floating-point constant. Hex keeps every value exact;
/// `float` constants are written as the widened double.
pub(crate) fn float_literal(value: f64, kind: PrimitiveKind) -> String {
    let bits = if kind == PrimitiveKind::F32 {
        #[expect(clippy::cast_possible_truncation, reason = "narrowing to F32 is the point")]
        let narrow = value as f32;
        f64::from(narrow).to_bits()
    } else {
        value.to_bits()
    };
    format!("0x{bits:016X}")
}

impl FnLowerer<'_, '_> {
    pub(crate) fn lower_literal(
        &mut self,
        lit: &Literal,
        expr: &Expr,
        expected: Option<&Type>,
    ) -> Value {
        let target = expr
            .ty
            .as_ref()
            .map(|t| self.subst(t))
            .or_else(|| expected.cloned())
            .and_then(|t| t.as_primitive());
        match lit {
            Literal::Int(n) => match target {
                Some(kind) if kind.is_float() => {
                    #[expect(clippy::cast_precision_loss, reason = "integer literal used as float")]
                    let as_float = *n as f64;
                    Value::new(float_literal(as_float, kind), primitive_ir(kind), kind.into())
                }
                Some(kind) if kind.is_integer() => {
                    Value::new(n.to_string(), primitive_ir(kind), kind.into())
                }
                _ => Value::new(n.to_string(), IrType::I32, Type::I32),
            },
            Literal::Float(f) => {
                let kind = target.filter(|k| k.is_float()).unwrap_or(PrimitiveKind::F64);
                Value::new(float_literal(*f, kind), primitive_ir(kind), kind.into())
            }
            Literal::Bool(b) => Value::new(b.to_string(), IrType::I1, Type::BOOL),
            Literal::Str(s) => {
                let global = self.cx.emitter.string_literal(s);
                Value::new(global, IrType::Ptr, Type::STR)
            }
            Literal::Unit => Value::unit(),
        }
    }

    pub(crate) fn lower_ident(&mut self, name: &str, expr: &Expr, expected: Option<&Type>) -> Value {
        if let Some(local) = self.scope.lookup(name) {
            let local = local.clone();
            return match local.storage {
                Storage::Slot { addr } => {
                    let repr = self.load(&local.ir, &addr);
                    Value::new(repr, local.ir, local.ty).with_conv(local.conv)
                }
                Storage::Direct { value } => Value::new(value, local.ir, local.ty),
            };
        }
        let env = self.cx.env;
        if env.function(name).is_some() {
            return self.lower_func_ref(name, expr, expected);
        }
        if env.enum_with_variant(name).is_some() {
            return self.lower_path_value(&Path::new(&[name]), expr, expected);
        }
        self.error(
            ErrorCode::E5011,
            expr.span,
            format!("unknown identifier `{name}`"),
            "not found in this scope",
        );
        Value::placeholder(IrType::I32, Type::I32)
    }

    /// A path in value position: a payload-free variant (`Maybe::Nothing`)
    /// or a function (`math::square`).
    pub(crate) fn lower_path_value(
        &mut self,
        path: &Path,
        expr: &Expr,
        expected: Option<&Type>,
    ) -> Value {
        if let Some(value) = self.try_enum_constructor(path, &[], expr, expected) {
            return value;
        }
        let joined = path.joined();
        if self.cx.env.function(&joined).is_some() {
            return self.lower_func_ref(&joined, expr, expected);
        }
        self.error(
            ErrorCode::E5006,
            expr.span,
            format!("unknown variant or item `{joined}`"),
            "not found",
        );
        Value::placeholder(IrType::I32, Type::I32)
    }
}
