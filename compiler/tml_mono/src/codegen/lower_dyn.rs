//! Dynamic dispatch through `dyn Behavior` values.
//!
//! A dyn value is `{ ptr data, ptr vtable }`. A call loads both halves,
//! indexes the vtable by the method's slot in
//! [`VtableRegistry::method_order`](crate::vtable::VtableRegistry::method_order)
//! and calls the loaded pointer with the data pointer as the receiver.

use tml_diagnostic::ErrorCode;
use tml_ir::{Expr, Type};

use crate::emit::IrType;
use crate::unify::{bindings_for, substitute, substitute_all};

use super::expr_lowerer::{FnLowerer, Place, Value};
use super::lower_calls::Signature;
use super::lower_classes::MALLOC;
use super::lower_methods::nominal_parts;

impl FnLowerer<'_, '_> {
    /// `recv.method(args)` where `recv` is a `dyn behavior[behavior_args]`
    /// stored at `place`.
    pub(crate) fn lower_dyn_call(
        &mut self,
        place: &Place,
        behavior: &str,
        behavior_args: &[Type],
        method: &str,
        args: &[Expr],
        expr: &Expr,
    ) -> Value {
        let env = self.cx.env;
        let slot = self.cx.vtables.slot_of(env, behavior, method);
        let sig = env
            .behavior(behavior)
            .and_then(|b| Some((b, b.methods.iter().find(|m| m.name == method)?)));
        let (Some(slot), Some((def, method_sig))) = (slot, sig) else {
            for arg in args {
                self.lower_expr(arg, None);
            }
            self.error(
                ErrorCode::E5009,
                expr.span,
                format!("behavior `{behavior}` has no method `{method}`"),
                "not declared by the behavior",
            );
            return Value::placeholder(IrType::I32, Type::I32);
        };
        let bindings = bindings_for(&def.generics, behavior_args);
        let sig = Signature {
            name: format!("{behavior}::{method}"),
            params: substitute_all(&method_sig.params, &bindings),
            ret: substitute(&method_sig.ret, &bindings),
        };
        tracing::debug!(behavior, method, slot, "dyn dispatch");

        let dyn_ir = self.cx.dyn_type(behavior, behavior_args);
        let data_addr = self.gep_field(&dyn_ir, &place.addr, 0);
        let data = self.load(&IrType::Ptr, &data_addr);
        let vtable_addr = self.gep_field(&dyn_ir, &place.addr, 1);
        let vtable = self.load(&IrType::Ptr, &vtable_addr);
        self.call_vtable_slot(&vtable, slot, data, &sig, args, Vec::new(), expr)
    }

    /// Call slot `slot` of `vtable` with `receiver` as the first argument.
    /// `pre` holds arguments already lowered for generic inference.
    pub(crate) fn call_vtable_slot(
        &mut self,
        vtable: &str,
        slot: usize,
        receiver: String,
        sig: &Signature,
        args: &[Expr],
        pre: Vec<Option<Value>>,
        expr: &Expr,
    ) -> Value {
        let entry = self.fresh();
        self.emit(format!(
            "{entry} = getelementptr inbounds ptr, ptr {vtable}, i64 {slot}"
        ));
        let callee = self.load(&IrType::Ptr, &entry);
        self.emit_direct_call(&callee, sig, args, pre, Some((IrType::Ptr, receiver)), expr)
    }

    /// Box `value` as a `dyn behavior[args]`: the data is copied to the heap
    /// (reference-class instances are already pointers) and paired with the
    /// vtable of its concrete type.
    pub(crate) fn coerce_to_dyn(&mut self, value: Value, behavior: &str, args: &[Type]) -> Value {
        let dyn_ir = self.cx.dyn_type(behavior, args);
        let is_instance = value.ir == IrType::Ptr
            && nominal_parts(&value.ty)
                .and_then(|(name, _)| self.cx.env.class_def(name))
                .is_some_and(|c| !c.is_value_class());
        let data = if is_instance {
            value.repr.clone()
        } else {
            let size = self.cx.layouts.size_of(&value.ty).max(1);
            self.cx
                .declare_runtime(MALLOC, &IrType::Ptr, &[IrType::I64]);
            let data = self.fresh();
            self.emit(format!("{data} = call ptr {MALLOC}(i64 {size})"));
            if !value.ir.is_void() && value.ir != IrType::Empty {
                self.store(&value, &data);
            }
            data
        };
        let vtable = self
            .cx
            .vtables
            .require_behavior_vtable(&value.ty, behavior, args);
        tracing::debug!(ty = %value.ty, behavior, %vtable, "coerce to dyn");
        let half = self.fresh();
        self.emit(format!("{half} = insertvalue {dyn_ir} undef, ptr {data}, 0"));
        let whole = self.fresh();
        self.emit(format!("{whole} = insertvalue {dyn_ir} {half}, ptr {vtable}, 1"));
        Value::new(whole, dyn_ir, Type::dyn_behavior(behavior, args.to_vec()))
    }
}
