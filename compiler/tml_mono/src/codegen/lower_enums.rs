//! Tagged-union construction.
//!
//! An enum value is `{ i32 tag, [W x i64] payload }`, or just `{ i32 }` when
//! no variant carries data. Construction goes through a stack slot: store the
//! tag, store the payload reinterpreted at field 1, then load the whole
//! value.

use tml_diagnostic::ErrorCode;
use tml_ir::{EnumDef, Expr, Path, Type};

use crate::emit::IrType;
use crate::layout::variant_payload;
use crate::unify::{bindings_for, substitute_all, GenericBinder};

use super::expr_lowerer::{FnLowerer, Value};

impl FnLowerer<'_, '_> {
    /// Stage 2 of call resolution, also used for payload-free variants in
    /// value position. Returns `None` when `path` names no variant.
    pub(crate) fn try_enum_constructor(
        &mut self,
        path: &Path,
        args: &[Expr],
        expr: &Expr,
        expected: Option<&Type>,
    ) -> Option<Value> {
        let env = self.cx.env;
        let (def, index) = match path.segments.as_slice() {
            [variant] => env.enum_with_variant(variant)?,
            _ => {
                let def = env.enum_def(&path.qualifier()?)?;
                let index = def.variant_index(path.last()?)?;
                (def, index)
            }
        };
        Some(self.construct_variant(def, index, path, args, expr, expected))
    }

    fn construct_variant(
        &mut self,
        def: &EnumDef,
        index: usize,
        path: &Path,
        args: &[Expr],
        expr: &Expr,
        expected: Option<&Type>,
    ) -> Value {
        let variant = &def.variants[index];
        let mut pre = Vec::new();
        let type_args = if def.generics.is_empty() {
            Vec::new()
        } else {
            let explicit: Vec<Type> = path.generics.iter().map(|t| self.subst(t)).collect();
            let mut binder = GenericBinder::new(&def.generics);
            binder.explicit(&explicit);
            pre = self.infer_from_args(&mut binder, &variant.payload, args);
            if let Some(expected) = expected {
                binder.expect(&def.self_type(), expected);
            }
            let resolution = binder.resolve(&Type::I32);
            self.cx
                .report_defaulted(&format!("{}::{}", def.name, variant.name), &resolution, expr.span);
            resolution.args
        };

        let enum_ty = Type::named(def.name.clone(), type_args.clone());
        let ir = self.cx.ir_type(&enum_ty);
        if args.len() != variant.payload.len() {
            for arg in args {
                self.lower_expr(arg, None);
            }
            self.error(
                ErrorCode::E5004,
                expr.span,
                format!(
                    "variant `{}::{}` takes {} value(s) but {} were supplied",
                    def.name,
                    variant.name,
                    variant.payload.len(),
                    args.len()
                ),
                "wrong number of payload values",
            );
            return Value::placeholder(ir, enum_ty);
        }
        tracing::trace!(enum_name = %def.name, variant = %variant.name, tag = index, "enum constructor");

        let bindings = bindings_for(&def.generics, &type_args);
        let payload_tys = substitute_all(&variant.payload, &bindings);
        let payload = self.lower_args(&payload_tys, args, pre);
        if self.cx.is_open(&enum_ty) {
            return Value::new(index.to_string(), ir, enum_ty);
        }

        let slot = self.alloca(&ir);
        let tag = self.gep_field(&ir, &slot, 0);
        self.emit(format!("store i32 {index}, ptr {tag}"));

        let stored = variant_payload(def, variant, &type_args)
            .is_some_and(|ty| !self.cx.layouts.is_zero_sized(&ty));
        if stored {
            let data = self.gep_field(&ir, &slot, 1);
            match payload.as_slice() {
                [(field_ir, repr)] => self.emit(format!("store {field_ir} {repr}, ptr {data}")),
                fields => {
                    let record = IrType::Anon(fields.iter().map(|(i, _)| i.clone()).collect());
                    let mut acc = "undef".to_string();
                    for (i, (field_ir, repr)) in fields.iter().enumerate() {
                        let next = self.fresh();
                        self.emit(format!(
                            "{next} = insertvalue {record} {acc}, {field_ir} {repr}, {i}"
                        ));
                        acc = next;
                    }
                    self.emit(format!("store {record} {acc}, ptr {data}"));
                }
            }
        }

        let repr = self.load(&ir, &slot);
        Value::new(repr, ir, enum_ty)
    }
}
