//! Method calls `receiver.method(args)`.
//!
//! Resolution order on the receiver's static type (references stripped):
//!
//! 1. `dyn Behavior`: vtable dispatch (`lower_dyn.rs`);
//! 2. a function-typed field named `method`: closure bridge;
//! 3. a class method, searched from the class up its base chain; virtual
//!    methods of reference classes go through the instance's vtable;
//! 4. an impl method of the receiver's nominal type.
//!
//! Every method takes its receiver as a pointer: the instance pointer of a
//! reference class, the receiver's address otherwise.

use tml_diagnostic::ErrorCode;
use tml_ir::{ClassDef, Expr, ExprKind, FunctionDef, Type};

use crate::emit::IrType;
use crate::registry::{method_symbol, InstKind};
use crate::unify::{bindings_for, substitute, unify, Bindings, GenericBinder};

use super::expr_lowerer::{FnLowerer, Place, Value};
use super::lower_calls::Signature;
use super::scope::Storage;

/// Name and type arguments of a nominal type, as impls and classes are
/// keyed.
pub(crate) fn nominal_parts(ty: &Type) -> Option<(&str, &[Type])> {
    match ty {
        Type::Named { name, args, .. } => Some((name.as_str(), args.as_slice())),
        Type::Class(name) => Some((name.as_str(), &[])),
        Type::Primitive(kind) => Some((kind.name(), &[])),
        _ => None,
    }
}

impl FnLowerer<'_, '_> {
    pub(crate) fn lower_method_call(
        &mut self,
        expr: &Expr,
        receiver: &Expr,
        method: &str,
        args: &[Expr],
    ) -> Value {
        if self.is_callable_field(receiver, method) {
            return self.lower_field_call(expr, receiver, method, args);
        }
        let Some((recv, ty)) = self.receiver_operand(receiver) else {
            for arg in args {
                self.lower_expr(arg, None);
            }
            return Value::placeholder(IrType::I32, Type::I32);
        };
        tracing::trace!(receiver = %ty, method, "resolving method call");

        if let Type::DynBehavior { name, args: behavior_args } = &ty {
            let place = Place {
                addr: recv,
                ty: ty.clone(),
            };
            return self.lower_dyn_call(&place, name, behavior_args, method, args, expr);
        }

        let env = self.cx.env;
        if let Some((name, type_args)) = nominal_parts(&ty) {
            if let Some(class) = env.class_def(name) {
                if let Some(value) = self.lower_class_method(class, type_args, &recv, method, args, expr) {
                    return value;
                }
            }
            if let Some(value) = self.lower_impl_method(&ty, name, type_args, recv, method, args, expr) {
                return value;
            }
        }

        for arg in args {
            self.lower_expr(arg, None);
        }
        self.error(
            ErrorCode::E5012,
            expr.span,
            format!("no method `{method}` on type `{ty}`"),
            "method not found",
        );
        let ty = expr.ty.as_ref().map_or(Type::I32, |t| self.subst(t));
        let ir = self.cx.ir_type(&ty);
        Value::placeholder(ir, ty)
    }

    /// Whether `receiver.method` names a function-typed field rather than a
    /// method.
    fn is_callable_field(&self, receiver: &Expr, method: &str) -> bool {
        let Some(ty) = self.static_type(receiver) else {
            return false;
        };
        let ty = match ty {
            Type::Ref { inner, .. } => *inner,
            other => other,
        };
        let env = self.cx.env;
        let Some((name, _)) = nominal_parts(&ty) else {
            return false;
        };
        let field_ty = if let Some(def) = env.struct_def(name) {
            def.field_index(method).map(|i| &def.fields[i].ty)
        } else if let Some(class) = env.class_def(name) {
            let chain = env.class_chain(&class.name);
            if chain.iter().any(|c| c.method(method).is_some()) {
                return false;
            }
            chain
                .into_iter()
                .find_map(|c| c.field_index(method).map(|i| &c.fields[i].ty))
        } else {
            None
        };
        field_ty.is_some_and(|t| t.fn_signature().is_some())
    }

    /// The receiver as a pointer, with its static type. References are
    /// followed; reference-class instances yield the instance pointer.
    fn receiver_operand(&mut self, receiver: &Expr) -> Option<(String, Type)> {
        if let ExprKind::Ident(name) = &receiver.kind {
            if let Some(local) = self.scope.lookup(name) {
                if let Storage::Direct { value } = &local.storage {
                    return Some((value.clone(), local.ty.clone()));
                }
            }
        }
        let place = self.lower_place(receiver)?;
        let (addr, ty) = match place.ty {
            Type::Ref { inner, .. } => (self.load(&IrType::Ptr, &place.addr), *inner),
            ty => (place.addr, ty),
        };
        let env = self.cx.env;
        let is_instance = nominal_parts(&ty)
            .and_then(|(name, _)| env.class_def(name))
            .is_some_and(|c| !c.is_value_class());
        if is_instance {
            let instance = self.load(&IrType::Ptr, &addr);
            return Some((instance, ty));
        }
        Some((addr, ty))
    }

    /// Bind a method's own generics from the call arguments.
    fn bind_method_generics(
        &mut self,
        owner: &str,
        def: &FunctionDef,
        bindings: &mut Bindings,
        args: &[Expr],
        expr: &Expr,
    ) -> (Vec<Type>, Vec<Option<Value>>) {
        if !def.is_generic() {
            return (Vec::new(), Vec::new());
        }
        let params: Vec<Type> = def
            .params
            .iter()
            .map(|p| substitute(&p.ty, bindings))
            .collect();
        let mut binder = GenericBinder::new(&def.generics);
        let pre = self.infer_from_args(&mut binder, &params, args);
        let resolution = binder.resolve(&Type::UNIT);
        self.cx
            .report_defaulted(&format!("{owner}::{}", def.name), &resolution, expr.span);
        bindings.extend(bindings_for(&def.generics, &resolution.args));
        (resolution.args, pre)
    }

    /// Symbol of a method, instantiating it when the owner or the method is
    /// generic.
    fn method_callee(
        &mut self,
        owner: &str,
        owner_args: &[Type],
        method: &str,
        method_args: &[Type],
        generic: bool,
    ) -> String {
        let mangled = if !generic {
            method_symbol(owner, &[], method, &[])
        } else if owner_args.iter().chain(method_args).any(|a| self.cx.is_open(a)) {
            self.cx
                .registry
                .defer_unresolved(InstKind::Method, owner, owner_args)
        } else {
            self.cx
                .registry
                .require_method_instantiation(owner, owner_args, method, method_args)
        };
        self.cx.symbol(&mangled)
    }

    fn lower_class_method(
        &mut self,
        class: &ClassDef,
        class_args: &[Type],
        instance: &str,
        method: &str,
        args: &[Expr],
        expr: &Expr,
    ) -> Option<Value> {
        let env = self.cx.env;
        let chain = env.class_chain(&class.name);
        let (depth, def) = chain
            .iter()
            .enumerate()
            .find_map(|(depth, c)| Some((depth, c.method(method).filter(|m| m.has_self())?)))?;
        let owner = chain[depth];
        let owner_args: &[Type] = if depth == 0 { class_args } else { &[] };

        let mut bindings = bindings_for(&owner.generics, owner_args);
        let (method_args, pre) = self.bind_method_generics(&owner.name, def, &mut bindings, args, expr);
        let sig = Signature::of(format!("{}::{method}", owner.name), def, &bindings);

        let slot = self.cx.vtables.class_slot_of(env, &class.name, method);
        if let (Some(slot), false) = (slot, class.is_value_class()) {
            tracing::debug!(class = %class.name, method, slot, "virtual call");
            let vtable = self.load(&IrType::Ptr, instance);
            return Some(self.call_vtable_slot(&vtable, slot, instance.to_string(), &sig, args, pre, expr));
        }

        let generic = !owner_args.is_empty() || def.is_generic();
        let symbol = self.method_callee(&owner.name, owner_args, method, &method_args, generic);
        if !generic && env.local.classes.get(&owner.name).is_none() {
            self.declare_callee(&symbol, &sig, true);
        }
        Some(self.emit_direct_call(&symbol, &sig, args, pre, Some((IrType::Ptr, instance.to_string())), expr))
    }

    fn lower_impl_method(
        &mut self,
        recv_ty: &Type,
        type_name: &str,
        type_args: &[Type],
        recv: String,
        method: &str,
        args: &[Expr],
        expr: &Expr,
    ) -> Option<Value> {
        let env = self.cx.env;
        let (imp, def) = env.impl_method(type_name, method)?;
        if !def.has_self() {
            return None;
        }
        let mut bindings = Bindings::default();
        unify(&imp.self_ty, recv_ty, &imp.generics, &mut bindings);
        let (method_args, pre) = self.bind_method_generics(type_name, def, &mut bindings, args, expr);
        let sig = Signature::of(format!("{type_name}::{method}"), def, &bindings);

        let generic = !imp.generics.is_empty() || def.is_generic();
        let symbol = self.method_callee(type_name, type_args, method, &method_args, generic);
        let local = env.local.impls.iter().any(|i| std::ptr::eq(i, imp));
        if !generic && !local {
            self.declare_callee(&symbol, &sig, true);
        }
        tracing::trace!(%symbol, "impl method call");
        Some(self.emit_direct_call(&symbol, &sig, args, pre, Some((IrType::Ptr, recv)), expr))
    }
}
