//! Call resolution.
//!
//! A call `callee(args)` is resolved by trying each stage in order; the
//! first stage that recognizes the callee lowers the call:
//!
//! 1. primitive static methods (`I64::max_value()`, `F64::from(x)`)
//! 2. enum variant constructors (`Maybe::Just(5)`, `Just(5)`)
//! 3. builtin intrinsics (`lower_intrinsics.rs`)
//! 4. generic free functions, instantiated per call site
//! 5. class constructors (`Point::new(1, 2)`)
//! 6. static methods needing an instantiation (`Stack[I32]::new()`)
//! 7. ordinary functions and non-generic static methods
//! 8. function-typed locals, through the closure bridge
//!
//! Field callees (`self.on_click(x)`) always go through the closure bridge.
//! Nothing matching is an unresolved call (`E5001`).

use smallvec::SmallVec;
use tml_diagnostic::ErrorCode;
use tml_ir::{Expr, ExprKind, FnFlags, FunctionDef, Path, Type};

use crate::emit::IrType;
use crate::registry::{method_symbol, InstKind};
use crate::unify::{bindings_for, substitute, substitute_all, Bindings, GenericBinder};

use super::expr_lowerer::{FnLowerer, Value};

/// Lowered call arguments: `(type, operand)` pairs.
pub(crate) type CallArgs = SmallVec<[(IrType, String); 4]>;

/// A fully bound callee signature. `name` is only used in diagnostics.
pub(crate) struct Signature {
    pub name: String,
    pub params: Vec<Type>,
    pub ret: Type,
}

impl Signature {
    pub fn of(name: impl Into<String>, def: &FunctionDef, bindings: &Bindings) -> Self {
        Signature {
            name: name.into(),
            params: def
                .params
                .iter()
                .map(|p| substitute(&p.ty, bindings))
                .collect(),
            ret: substitute(&def.ret, bindings),
        }
    }
}

impl FnLowerer<'_, '_> {
    pub(crate) fn lower_call(
        &mut self,
        expr: &Expr,
        callee: &Expr,
        args: &[Expr],
        expected: Option<&Type>,
    ) -> Value {
        let path = match &callee.kind {
            ExprKind::Path(path) => path.clone(),
            ExprKind::Ident(name) => Path::new(&[name]),
            ExprKind::Field { object, field } => {
                return self.lower_field_call(expr, object, field, args);
            }
            _ => return self.lower_value_call(expr, callee, args),
        };
        tracing::trace!(callee = %path.joined(), "resolving call");

        if let Some(value) = self.try_primitive_static(&path, args, expr) {
            return value;
        }
        if let Some(value) = self.try_enum_constructor(&path, args, expr, expected) {
            return value;
        }
        if let Some(value) = self.try_intrinsic(&path, args, expr) {
            return value;
        }
        if let Some(value) = self.try_generic_function(&path, args, expr, expected) {
            return value;
        }
        if let Some(value) = self.try_class_constructor(&path, args) {
            return value;
        }
        if let Some(value) = self.try_generic_static_method(&path, args, expr, expected) {
            return value;
        }
        if let Some(value) = self.try_user_function(&path, args, expr) {
            return value;
        }
        if let Some(value) = self.try_local_call(&path, args, expr) {
            return value;
        }

        for arg in args {
            self.lower_expr(arg, None);
        }
        self.error(
            ErrorCode::E5001,
            expr.span,
            format!("unresolved call to `{}`", path.joined()),
            "no function, constructor or intrinsic with this name",
        );
        let ty = expected.cloned().unwrap_or(Type::I32);
        let ir = self.cx.ir_type(&ty);
        Value::placeholder(ir, ty)
    }

    // -----------------------------------------------------------------------
    // Argument handling
    // -----------------------------------------------------------------------

    /// Feed argument types to `binder`. Arguments whose type is not evident
    /// are lowered here; the returned values are reused by
    /// [`Self::lower_args`] so nothing is evaluated twice.
    pub(crate) fn infer_from_args(
        &mut self,
        binder: &mut GenericBinder<'_>,
        params: &[Type],
        args: &[Expr],
    ) -> Vec<Option<Value>> {
        let mut pre = Vec::with_capacity(args.len());
        for (param, arg) in params.iter().zip(args) {
            if let Some(ty) = self.static_type(arg) {
                binder.infer(param, &ty);
                pre.push(None);
            } else if binder.is_complete() {
                pre.push(None);
            } else {
                let value = self.lower_expr(arg, None);
                binder.infer(param, &value.ty);
                pre.push(Some(value));
            }
        }
        pre
    }

    /// Lower arguments against concrete parameter types.
    pub(crate) fn lower_args(
        &mut self,
        params: &[Type],
        args: &[Expr],
        mut pre: Vec<Option<Value>>,
    ) -> CallArgs {
        pre.resize(args.len(), None);
        let mut lowered = CallArgs::new();
        for ((arg, param), pre) in args.iter().zip(params).zip(pre) {
            let value = match pre {
                Some(value) => value,
                None => self.lower_expr(arg, Some(param)),
            };
            let ir = self.cx.ir_type(param);
            let value = self.convert_to(value, param, &ir);
            lowered.push((ir, value.repr));
        }
        lowered
    }

    /// Check the argument count. On mismatch the arguments are still
    /// evaluated, the error reported, and `false` returned.
    pub(crate) fn check_arity(&mut self, name: &str, expected: usize, args: &[Expr], expr: &Expr) -> bool {
        if args.len() == expected {
            return true;
        }
        for arg in args {
            self.lower_expr(arg, None);
        }
        let message = if args.len() < expected {
            format!(
                "`{name}` takes {expected} argument(s) but {} were supplied; missing argument",
                args.len()
            )
        } else {
            format!(
                "`{name}` takes {expected} argument(s) but {} were supplied",
                args.len()
            )
        };
        self.error(ErrorCode::E5004, expr.span, message, "wrong number of arguments");
        false
    }

    /// Direct call to `symbol` with a bound signature. `receiver` is
    /// prepended to the lowered arguments.
    pub(crate) fn emit_direct_call(
        &mut self,
        symbol: &str,
        sig: &Signature,
        args: &[Expr],
        pre: Vec<Option<Value>>,
        receiver: Option<(IrType, String)>,
        expr: &Expr,
    ) -> Value {
        let ret_ir = self.cx.ret_type(&sig.ret);
        if !self.check_arity(&sig.name, sig.params.len(), args, expr) {
            let storage = self.cx.ir_type(&sig.ret);
            return Value::placeholder(storage, sig.ret.clone());
        }
        let mut lowered = self.lower_args(&sig.params, args, pre);
        if let Some(receiver) = receiver {
            lowered.insert(0, receiver);
        }
        let result = self.emit_call(&ret_ir, symbol, &lowered);
        self.call_value(result, ret_ir, sig.ret.clone())
    }

    /// Declare a function that is called but not defined in this module.
    pub(crate) fn declare_callee(&mut self, symbol: &str, sig: &Signature, with_receiver: bool) {
        let ret = self.cx.ret_type(&sig.ret);
        let mut params: Vec<IrType> = Vec::with_capacity(sig.params.len() + 1);
        if with_receiver {
            params.push(IrType::Ptr);
        }
        for param in &sig.params {
            params.push(self.cx.ir_type(param));
        }
        self.cx.declare_runtime(symbol, &ret, &params);
    }

    // -----------------------------------------------------------------------
    // Stage 4: generic free functions
    // -----------------------------------------------------------------------

    fn try_generic_function(
        &mut self,
        path: &Path,
        args: &[Expr],
        expr: &Expr,
        expected: Option<&Type>,
    ) -> Option<Value> {
        let env = self.cx.env;
        let def = env.function(&path.joined()).filter(|d| d.is_generic())?;
        let explicit: Vec<Type> = path.generics.iter().map(|t| self.subst(t)).collect();
        let param_tys: Vec<Type> = def.params.iter().map(|p| p.ty.clone()).collect();

        let mut binder = GenericBinder::new(&def.generics);
        binder.explicit(&explicit);
        let pre = self.infer_from_args(&mut binder, &param_tys, args);
        if let Some(expected) = expected {
            binder.expect(&def.ret, expected);
        }
        let resolution = binder.resolve(&Type::UNIT);
        self.cx.report_defaulted(&def.name, &resolution, expr.span);

        let mangled = if resolution.args.iter().any(|a| self.cx.is_open(a)) {
            self.cx
                .registry
                .defer_unresolved(InstKind::Func, &def.name, &resolution.args)
        } else {
            self.cx
                .registry
                .require_func_instantiation(&def.name, &resolution.args)
        };
        tracing::debug!(function = %def.name, instance = %mangled, "generic call");
        let symbol = self.cx.symbol(&mangled);
        let sig = Signature::of(&def.name, def, &bindings_for(&def.generics, &resolution.args));
        Some(self.emit_direct_call(&symbol, &sig, args, pre, None, expr))
    }

    // -----------------------------------------------------------------------
    // Stage 6: static methods that need an instantiation
    // -----------------------------------------------------------------------

    fn try_generic_static_method(
        &mut self,
        path: &Path,
        args: &[Expr],
        expr: &Expr,
        expected: Option<&Type>,
    ) -> Option<Value> {
        let owner = path.qualifier()?;
        let method = path.last()?;
        let env = self.cx.env;

        // Owner generics, owner type pattern, and the method definition.
        let (owner_name, owner_generics, pattern, def) = if let Some(class) = env.class_def(&owner) {
            let def = if method == "new" {
                class.constructors.first()?
            } else {
                class.method(method).filter(|m| !m.has_self())?
            };
            let pattern = Type::named(
                class.name.clone(),
                class.generics.iter().map(Type::param).collect(),
            );
            (class.name.as_str(), class.generics.as_slice(), pattern, def)
        } else {
            let type_name = env
                .struct_def(&owner)
                .map(|d| d.name.as_str())
                .or_else(|| env.enum_def(&owner).map(|d| d.name.as_str()))?;
            let (imp, def) = env.impl_method(type_name, method)?;
            if def.has_self() {
                return None;
            }
            (type_name, imp.generics.as_slice(), imp.self_ty.clone(), def)
        };
        if owner_generics.is_empty() && !def.is_generic() {
            return None;
        }

        let mut generics: Vec<String> = owner_generics.to_vec();
        generics.extend(def.generics.iter().cloned());
        let explicit: Vec<Type> = path.generics.iter().map(|t| self.subst(t)).collect();
        let param_tys: Vec<Type> = def.params.iter().map(|p| p.ty.clone()).collect();

        let mut binder = GenericBinder::new(&generics);
        binder.explicit(&explicit);
        let pre = self.infer_from_args(&mut binder, &param_tys, args);
        if let Some(expected) = expected {
            binder.expect(&pattern, expected);
            binder.expect(&def.ret, expected);
        }
        let resolution = binder.resolve(&Type::UNIT);
        self.cx
            .report_defaulted(&path.joined(), &resolution, expr.span);

        let bindings = bindings_for(&generics, &resolution.args);
        let owner_args = substitute_all(
            pattern.as_named().map(|(_, a)| a).unwrap_or_default(),
            &bindings,
        );
        let method_args = resolution.args[owner_generics.len()..].to_vec();
        let mangled = if resolution.args.iter().any(|a| self.cx.is_open(a)) {
            self.cx
                .registry
                .defer_unresolved(InstKind::Method, owner_name, &owner_args)
        } else {
            self.cx
                .registry
                .require_method_instantiation(owner_name, &owner_args, method, &method_args)
        };
        tracing::debug!(owner = owner_name, method, instance = %mangled, "generic static call");
        let symbol = self.cx.symbol(&mangled);
        let mut sig = Signature::of(path.joined(), def, &bindings);
        if method == "new" && env.class_def(owner_name).is_some() {
            sig.ret = Type::named(owner_name, owner_args);
        }
        Some(self.emit_direct_call(&symbol, &sig, args, pre, None, expr))
    }

    // -----------------------------------------------------------------------
    // Stage 7: ordinary functions and static methods
    // -----------------------------------------------------------------------

    fn try_user_function(&mut self, path: &Path, args: &[Expr], expr: &Expr) -> Option<Value> {
        let env = self.cx.env;
        if let Some(def) = env.function(&path.joined()) {
            if def.is_generic() || def.is_closure_body() {
                return None;
            }
            let sig = Signature::of(&def.name, def, &Bindings::default());
            let symbol = if def.flags.contains(FnFlags::EXTERN) {
                let symbol = format!("@{}", def.name);
                self.declare_callee(&symbol, &sig, false);
                symbol
            } else {
                let symbol = self.cx.symbol(&def.name);
                if env.local.functions.get(&def.name).is_none() {
                    self.declare_callee(&symbol, &sig, false);
                }
                symbol
            };
            return Some(self.emit_direct_call(&symbol, &sig, args, Vec::new(), None, expr));
        }

        let owner = path.qualifier()?;
        let method = path.last()?;
        let (owner_name, def, local) = if let Some(class) = env.class_def(&owner) {
            let def = class.method(method).filter(|m| !m.has_self())?;
            let local = env.local.classes.get(&class.name).is_some();
            (class.name.as_str(), def, local)
        } else {
            let type_name = env
                .struct_def(&owner)
                .map(|d| d.name.as_str())
                .or_else(|| env.enum_def(&owner).map(|d| d.name.as_str()))?;
            let (imp, def) = env.impl_method(type_name, method)?;
            if def.has_self() {
                return None;
            }
            let local = env.local.impls.iter().any(|i| std::ptr::eq(i, imp));
            (type_name, def, local)
        };
        let sig = Signature::of(path.joined(), def, &Bindings::default());
        let symbol = self.cx.symbol(&method_symbol(owner_name, &[], method, &[]));
        if !local {
            self.declare_callee(&symbol, &sig, false);
        }
        Some(self.emit_direct_call(&symbol, &sig, args, Vec::new(), None, expr))
    }

    // -----------------------------------------------------------------------
    // Stage 8 and non-path callees: calls through function values
    // -----------------------------------------------------------------------

    fn try_local_call(&mut self, path: &Path, args: &[Expr], expr: &Expr) -> Option<Value> {
        let [name] = path.segments.as_slice() else {
            return None;
        };
        self.scope.lookup(name)?;
        let callee = Expr::ident(name.clone()).with_span(expr.span);
        let value = self.lower_expr(&callee, None);
        Some(self.call_function_value(value, args, expr))
    }

    fn lower_value_call(&mut self, expr: &Expr, callee: &Expr, args: &[Expr]) -> Value {
        let value = self.lower_expr(callee, None);
        self.call_function_value(value, args, expr)
    }

    /// Call a `{ ptr, ptr }` function value with its tracked convention.
    pub(crate) fn call_function_value(&mut self, value: Value, args: &[Expr], expr: &Expr) -> Value {
        let Some((params, ret)) = value.ty.fn_signature() else {
            for arg in args {
                self.lower_expr(arg, None);
            }
            self.error(
                ErrorCode::E5002,
                expr.span,
                format!("value of type `{}` is not callable", value.ty),
                "not a function",
            );
            return Value::placeholder(IrType::I32, Type::I32);
        };
        let sig = Signature {
            name: "function value".to_string(),
            params: params.to_vec(),
            ret: ret.clone(),
        };
        if !self.check_arity(&sig.name, sig.params.len(), args, expr) {
            let storage = self.cx.ir_type(&sig.ret);
            return Value::placeholder(storage, sig.ret);
        }
        let lowered = self.lower_args(&sig.params, args, Vec::new());
        let conv = value.conv;
        self.call_through_bridge(&value, conv, &sig.ret, &lowered)
    }
}
