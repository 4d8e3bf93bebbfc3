//! Field addressing and auto-dereference.
//!
//! `object.field` resolves against the static type of `object`. When that
//! type has no such field but is one of the smart-pointer wrappers
//! ([`WrapperKind`]), one wrapper layer is peeled and the lookup retried, at
//! most once per layer the static type actually has.

use tml_diagnostic::ErrorCode;
use tml_ir::{Expr, ExprKind, Span, Type};

use crate::emit::IrType;
use crate::layout::{field_types, wrapper_depth, WrapperKind};

use super::expr_lowerer::{FnLowerer, Place, Value};
use super::scope::Storage;

/// Where the object currently being searched lives.
#[derive(Clone, Debug)]
enum Cursor {
    /// Address of the object.
    Addr(String),
    /// The object is itself a pointer value (instance pointer of a
    /// reference class bound directly).
    Pointer(String),
}

impl FnLowerer<'_, '_> {
    pub(crate) fn lower_field_read(&mut self, expr: &Expr, object: &Expr, field: &str) -> Value {
        let Some(place) = self.field_place(object, field, expr.span) else {
            let ty = expr.ty.as_ref().map_or(Type::I32, |t| self.subst(t));
            let ir = self.cx.ir_type(&ty);
            return Value::placeholder(ir, ty);
        };
        let ir = self.cx.ir_type(&place.ty);
        let repr = self.load(&ir, &place.addr);
        Value::new(repr, ir, place.ty)
    }

    /// Address and type of `object.field`. Reports `E5005` when no field is
    /// found after peeling every wrapper layer.
    pub(crate) fn field_place(&mut self, object: &Expr, field: &str, span: Span) -> Option<Place> {
        let (mut cursor, mut ty) = self.object_cursor(object)?;
        let depth = wrapper_depth(&ty);
        for _ in 0..=depth {
            if let Some(place) = self.direct_field(&cursor, &ty, field) {
                return Some(place);
            }
            let Some((kind, inner)) = WrapperKind::classify(&ty) else {
                break;
            };
            let inner = inner.clone();
            tracing::trace!(wrapper = ?kind, inner = %inner, field, "auto-deref");
            cursor = self.peel(cursor, &ty, kind, &inner);
            // The payload type may only now be needed.
            self.cx.ir_type(&inner);
            ty = inner;
        }
        self.error(
            ErrorCode::E5005,
            span,
            format!("no field `{field}` on type `{ty}`"),
            "unknown field",
        );
        None
    }

    fn object_cursor(&mut self, object: &Expr) -> Option<(Cursor, Type)> {
        if let ExprKind::Ident(name) = &object.kind {
            if let Some(local) = self.scope.lookup(name) {
                if let Storage::Direct { value } = &local.storage {
                    return Some((Cursor::Pointer(value.clone()), local.ty.clone()));
                }
            }
        }
        let place = self.lower_place(object)?;
        Some((Cursor::Addr(place.addr), place.ty))
    }

    /// The pointer value held at `cursor`.
    fn pointer_at(&mut self, cursor: Cursor) -> String {
        match cursor {
            Cursor::Addr(addr) => self.load(&IrType::Ptr, &addr),
            Cursor::Pointer(ptr) => ptr,
        }
    }

    /// Step from a wrapper value to the address of its payload.
    fn peel(&mut self, cursor: Cursor, wrapper_ty: &Type, kind: WrapperKind, inner: &Type) -> Cursor {
        match kind {
            WrapperKind::Raw => Cursor::Addr(self.pointer_at(cursor)),
            WrapperKind::Owned | WrapperKind::RefCounted => {
                let boxed = match cursor {
                    Cursor::Addr(addr) => {
                        let wrapper_ir = self.cx.ir_type(wrapper_ty);
                        let slot = self.gep_field(&wrapper_ir, &addr, 0);
                        self.load(&IrType::Ptr, &slot)
                    }
                    Cursor::Pointer(ptr) => ptr,
                };
                match kind.payload_index() {
                    Some(index) => {
                        let block = self.cx.ref_count_block(inner);
                        Cursor::Addr(self.gep_field(&block, &boxed, index as usize))
                    }
                    None => Cursor::Addr(boxed),
                }
            }
        }
    }

    /// Field of a struct, union or class, without auto-deref.
    fn direct_field(&mut self, cursor: &Cursor, ty: &Type, field: &str) -> Option<Place> {
        let (name, args) = match ty {
            Type::Named { name, args, .. } => (name.as_str(), args.as_slice()),
            Type::Class(name) => (name.as_str(), &[][..]),
            _ => return None,
        };
        let env = self.cx.env;
        if let Some(def) = env.struct_def(name) {
            let index = def.field_index(field)?;
            let field_ty = field_types(&def.generics, &def.fields, args).swap_remove(index);
            let ir = self.cx.ir_type(ty);
            let base = match cursor {
                Cursor::Addr(addr) => addr.clone(),
                Cursor::Pointer(ptr) => ptr.clone(),
            };
            // Every union member lives at offset 0.
            let addr = if def.is_union {
                base
            } else {
                self.gep_field(&ir, &base, index)
            };
            return Some(Place { addr, ty: field_ty });
        }
        if let Some(class) = env.class_def(name) {
            let instance = if class.is_value_class() {
                match cursor {
                    Cursor::Addr(addr) | Cursor::Pointer(addr) => addr.clone(),
                }
            } else {
                self.pointer_at(cursor.clone())
            };
            return self.class_field(&instance, name, args, field);
        }
        None
    }

    /// Address of `field` in the instance at `instance`, walking the base
    /// chain one embedded block at a time.
    pub(crate) fn class_field(
        &mut self,
        instance: &str,
        class: &str,
        args: &[Type],
        field: &str,
    ) -> Option<Place> {
        let env = self.cx.env;
        let chain = env.class_chain(class);
        // Nearest class in the chain declaring the field.
        let depth = chain.iter().position(|c| c.field_index(field).is_some())?;
        let mut block = instance.to_string();
        let mut block_ir = self.cx.class_struct_ir(class, args);
        for ancestor in &chain[1..=depth] {
            block = self.gep_field(&block_ir, &block, 0);
            block_ir = self.cx.class_struct_ir(&ancestor.name, &[]);
        }
        let owner = chain[depth];
        let owner_args: &[Type] = if depth == 0 { args } else { &[] };
        let index = owner.field_index(field)?;
        // Slot 0 is the vtable pointer or the base block.
        let ty = field_types(&owner.generics, &owner.fields, owner_args).swap_remove(index);
        let addr = self.gep_field(&block_ir, &block, index + 1);
        Some(Place { addr, ty })
    }
}
