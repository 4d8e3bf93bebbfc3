//! Struct, union and class literals.
//!
//! A struct literal is built in a stack slot, in this order:
//!
//! 1. `..base`, stored whole;
//! 2. the listed fields, each evaluated against its declared type;
//! 3. declaration defaults for fields neither listed nor covered by a base.
//!
//! A union literal stores its single member at offset 0. A class literal
//! allocates an instance (heap or stack) and fills its fields in place.

use rustc_hash::FxHashSet;
use tml_diagnostic::ErrorCode;
use tml_ir::{ClassDef, Expr, FieldDef, FieldInit, Path, StructDef, Type};

use crate::emit::IrType;
use crate::layout::field_types;
use crate::unify::GenericBinder;

use super::expr_lowerer::{FnLowerer, Value};

impl FnLowerer<'_, '_> {
    pub(crate) fn lower_struct_literal(
        &mut self,
        expr: &Expr,
        path: &Path,
        fields: &[FieldInit],
        base: Option<&Expr>,
        expected: Option<&Type>,
    ) -> Value {
        let env = self.cx.env;
        let name = path.joined();
        if let Some(def) = env.struct_def(&name) {
            let args = self.bind_literal_generics(
                &def.name, &def.generics, &def.fields, path, fields, base, expr, expected,
            );
            return if def.is_union {
                self.lower_union_literal(def, &args, fields, base, expr)
            } else {
                self.lower_plain_struct(def, &args, fields, base, expr)
            };
        }
        if let Some(class) = env.class_def(&name) {
            let args = self.bind_literal_generics(
                &class.name, &class.generics, &class.fields, path, fields, base, expr, expected,
            );
            return self.lower_class_literal(class, &args, fields, expr);
        }

        for init in fields {
            self.lower_expr(&init.value, None);
        }
        self.error(
            ErrorCode::E5006,
            expr.span,
            format!("unknown struct `{name}`"),
            "no struct, union or class with this name",
        );
        let ty = expected.cloned().unwrap_or(Type::UNIT);
        let ir = self.cx.ir_type(&ty);
        Value::placeholder(ir, ty)
    }

    /// Type arguments of a literal: explicit, then from field values, then
    /// from the base, then from context; `Unit` if nothing binds.
    fn bind_literal_generics(
        &mut self,
        item: &str,
        generics: &[String],
        decls: &[FieldDef],
        path: &Path,
        fields: &[FieldInit],
        base: Option<&Expr>,
        expr: &Expr,
        expected: Option<&Type>,
    ) -> Vec<Type> {
        if generics.is_empty() {
            return Vec::new();
        }
        let explicit: Vec<Type> = path.generics.iter().map(|t| self.subst(t)).collect();
        let self_ty = Type::named(item, generics.iter().map(Type::param).collect());
        let mut binder = GenericBinder::new(generics);
        binder.explicit(&explicit);
        for init in fields {
            let decl = decls.iter().find(|d| d.name == init.name);
            if let (Some(decl), Some(ty)) = (decl, self.static_type(&init.value)) {
                binder.infer(&decl.ty, &ty);
            }
        }
        if let Some(ty) = base.and_then(|b| self.static_type(b)) {
            binder.infer(&self_ty, &ty);
        }
        if let Some(expected) = expected {
            binder.expect(&self_ty, expected);
        }
        let resolution = binder.resolve(&Type::UNIT);
        self.cx.report_defaulted(item, &resolution, expr.span);
        resolution.args
    }

    fn lower_plain_struct(
        &mut self,
        def: &StructDef,
        args: &[Type],
        fields: &[FieldInit],
        base: Option<&Expr>,
        expr: &Expr,
    ) -> Value {
        let ty = Type::named(def.name.clone(), args.to_vec());
        let ir = self.cx.ir_type(&ty);
        let field_tys = field_types(&def.generics, &def.fields, args);
        let slot = self.alloca(&ir);

        if let Some(base) = base {
            let value = self.lower_expr(base, Some(&ty));
            self.store(&value, &slot);
        }

        let mut written: FxHashSet<usize> = FxHashSet::default();
        for init in fields {
            let Some(index) = def.field_index(&init.name) else {
                self.lower_expr(&init.value, None);
                self.error(
                    ErrorCode::E5005,
                    init.span,
                    format!("struct `{}` has no field `{}`", def.name, init.name),
                    "unknown field",
                );
                continue;
            };
            self.store_field(&init.value, &field_tys[index], &ir, &slot, index);
            written.insert(index);
        }

        if base.is_none() {
            for (index, decl) in def.fields.iter().enumerate() {
                if written.contains(&index) {
                    continue;
                }
                match &decl.default {
                    Some(default) => self.store_field(default, &field_tys[index], &ir, &slot, index),
                    None => self.error(
                        ErrorCode::E5005,
                        expr.span,
                        format!("missing field `{}` in literal of `{}`", decl.name, def.name),
                        "field not initialized",
                    ),
                }
            }
        }

        let repr = self.load(&ir, &slot);
        Value::new(repr, ir, ty)
    }

    fn store_field(
        &mut self,
        value: &Expr,
        field_ty: &Type,
        agg: &IrType,
        slot: &str,
        index: usize,
    ) {
        let field_ir = self.cx.ir_type(field_ty);
        let value = self.lower_expr(value, Some(field_ty));
        let value = self.convert_to(value, field_ty, &field_ir);
        let addr = self.gep_field(agg, slot, index);
        self.emit(format!("store {field_ir} {}, ptr {addr}", value.repr));
    }

    fn lower_union_literal(
        &mut self,
        def: &StructDef,
        args: &[Type],
        fields: &[FieldInit],
        base: Option<&Expr>,
        expr: &Expr,
    ) -> Value {
        let ty = Type::named(def.name.clone(), args.to_vec());
        let ir = self.cx.ir_type(&ty);
        let [init] = fields else {
            for init in fields {
                self.lower_expr(&init.value, None);
            }
            self.error(
                ErrorCode::E5010,
                expr.span,
                format!(
                    "union `{}` literal must set exactly one field, found {}",
                    def.name,
                    fields.len()
                ),
                "union literal",
            );
            return Value::placeholder(ir, ty);
        };
        if base.is_some() {
            self.error(
                ErrorCode::E5010,
                expr.span,
                format!("union `{}` literal cannot use `..base`", def.name),
                "union literal",
            );
        }
        let Some(index) = def.field_index(&init.name) else {
            self.lower_expr(&init.value, None);
            self.error(
                ErrorCode::E5005,
                init.span,
                format!("union `{}` has no field `{}`", def.name, init.name),
                "unknown field",
            );
            return Value::placeholder(ir, ty);
        };
        let field_ty = field_types(&def.generics, &def.fields, args).swap_remove(index);
        let field_ir = self.cx.ir_type(&field_ty);
        let slot = self.alloca(&ir);
        let value = self.lower_expr(&init.value, Some(&field_ty));
        let value = self.convert_to(value, &field_ty, &field_ir);
        self.emit(format!("store {field_ir} {}, ptr {slot}", value.repr));
        let repr = self.load(&ir, &slot);
        Value::new(repr, ir, ty)
    }

    fn lower_class_literal(
        &mut self,
        class: &ClassDef,
        args: &[Type],
        fields: &[FieldInit],
        expr: &Expr,
    ) -> Value {
        let instance = self.alloc_instance(class, args);
        let env = self.cx.env;
        let mut written: FxHashSet<&str> = FxHashSet::default();
        for init in fields {
            let Some(place) = self.class_field(&instance, &class.name, args, &init.name) else {
                self.lower_expr(&init.value, None);
                self.error(
                    ErrorCode::E5005,
                    init.span,
                    format!("class `{}` has no field `{}`", class.name, init.name),
                    "unknown field",
                );
                continue;
            };
            let field_ir = self.cx.ir_type(&place.ty);
            let value = self.lower_expr(&init.value, Some(&place.ty));
            let value = self.convert_to(value, &place.ty, &field_ir);
            self.emit(format!("store {field_ir} {}, ptr {}", value.repr, place.addr));
            written.insert(init.name.as_str());
        }

        for owner in env.class_chain(&class.name) {
            for decl in &owner.fields {
                if written.contains(decl.name.as_str()) {
                    continue;
                }
                let Some(default) = &decl.default else {
                    self.error(
                        ErrorCode::E5005,
                        expr.span,
                        format!("missing field `{}` in literal of `{}`", decl.name, class.name),
                        "field not initialized",
                    );
                    continue;
                };
                if let Some(place) = self.class_field(&instance, &class.name, args, &decl.name) {
                    let field_ir = self.cx.ir_type(&place.ty);
                    let value = self.lower_expr(default, Some(&place.ty));
                    let value = self.convert_to(value, &place.ty, &field_ir);
                    self.emit(format!("store {field_ir} {}, ptr {}", value.repr, place.addr));
                }
            }
        }
        self.instance_value(class, args, instance)
    }
}
