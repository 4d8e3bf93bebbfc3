//! Function values and the thin/fat calling-convention bridge.
//!
//! Every function value is `{ ptr code, ptr env }`. A named function used
//! as a value has a null `env` and is called with its declared arguments
//! only; a capturing closure has a heap `env` record that is passed as a
//! hidden first argument. When the convention of a value is not known
//! statically, the call branches on `env == null`:
//!
//! ```text
//!   %isnull = icmp eq ptr %env, null
//!   br i1 %isnull, label %fp_thinN, label %fp_fatN
//! fp_thinN:  call code(args)        ; br label %fp_mergeN
//! fp_fatN:   call code(env, args)   ; br label %fp_mergeN
//! fp_mergeN: phi [thin result], [fat result]
//! ```

use tml_diagnostic::ErrorCode;
use tml_ir::{Expr, FnFlags, FunctionDef, Type};

use crate::emit::IrType;
use crate::registry::InstKind;
use crate::unify::{bindings_for, substitute, Bindings, GenericBinder};

use super::expr_lowerer::{FnLowerer, Value};
use super::lower_calls::{CallArgs, Signature};
use super::lower_classes::MALLOC;
use super::scope::CallConv;

impl FnLowerer<'_, '_> {
    /// A named function as a thin function value. Generic functions are
    /// instantiated from the expected function type.
    pub(crate) fn lower_func_ref(&mut self, name: &str, expr: &Expr, expected: Option<&Type>) -> Value {
        let env = self.cx.env;
        let Some(def) = env.function(name) else {
            self.error(
                ErrorCode::E5011,
                expr.span,
                format!("unknown function `{name}`"),
                "not found",
            );
            return Value::placeholder(IrType::fat_ptr(), Type::func(Vec::new(), Type::UNIT));
        };
        let (symbol, ty) = if def.is_generic() {
            let mut binder = GenericBinder::new(&def.generics);
            if let Some(expected) = expected {
                binder.expect(&def.fn_type(), expected);
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
            let bindings = bindings_for(&def.generics, &resolution.args);
            (self.cx.symbol(&mangled), substitute(&def.fn_type(), &bindings))
        } else if def.flags.contains(FnFlags::EXTERN) {
            let symbol = format!("@{}", def.name);
            let sig = Signature::of(&def.name, def, &Bindings::default());
            self.declare_callee(&symbol, &sig, false);
            (symbol, def.fn_type())
        } else {
            let symbol = self.cx.symbol(&def.name);
            if env.local.functions.get(&def.name).is_none() {
                let sig = Signature::of(&def.name, def, &Bindings::default());
                self.declare_callee(&symbol, &sig, false);
            }
            (symbol, def.fn_type())
        };
        Value::new(format!("{{ ptr {symbol}, ptr null }}"), IrType::fat_ptr(), ty)
            .with_conv(CallConv::Thin)
    }

    /// `Closure { func, captures }`: copy the captured values into a heap
    /// environment record laid out as `func`'s `env`.
    pub(crate) fn lower_closure(&mut self, func: &str, captures: &[String], expr: &Expr) -> Value {
        let env = self.cx.env;
        let Some(def) = env.function(func).filter(|d| d.is_closure_body()) else {
            self.error(
                ErrorCode::E5011,
                expr.span,
                format!("unknown closure body `{func}`"),
                "not found",
            );
            return Value::placeholder(IrType::fat_ptr(), Type::closure(Vec::new(), Type::UNIT));
        };
        if def.env.len() != captures.len() {
            self.error(
                ErrorCode::E5004,
                expr.span,
                format!(
                    "closure `{func}` captures {} value(s) but {} were supplied",
                    def.env.len(),
                    captures.len()
                ),
                "wrong number of captures",
            );
            return Value::placeholder(IrType::fat_ptr(), Type::closure(Vec::new(), Type::UNIT));
        }

        let tys: Vec<Type> = def.env.iter().map(|c| self.subst(&c.ty)).collect();
        let irs: Vec<IrType> = tys.iter().map(|t| self.cx.ir_type(t)).collect();
        let record = IrType::Anon(irs.clone());
        let size = self.cx.layouts.size_of(&Type::Tuple(tys)).max(1);
        self.cx
            .declare_runtime(MALLOC, &IrType::Ptr, &[IrType::I64]);
        let env_ptr = self.fresh();
        self.emit(format!("{env_ptr} = call ptr {MALLOC}(i64 {size})"));
        for (i, (name, ir)) in captures.iter().zip(irs).enumerate() {
            let captured = Expr::ident(name.clone()).with_span(expr.span);
            let value = self.lower_expr(&captured, None);
            let slot = self.gep_field(&record, &env_ptr, i);
            self.emit(format!("store {ir} {}, ptr {slot}", value.repr));
        }

        let symbol = self.closure_symbol(def);
        let closure = self.fresh();
        self.emit(format!(
            "{closure} = insertvalue {{ ptr, ptr }} {{ ptr {symbol}, ptr null }}, ptr {env_ptr}, 1"
        ));
        let params = def.params.iter().map(|p| self.subst(&p.ty)).collect();
        let ret = self.subst(&def.ret);
        Value::new(closure, IrType::fat_ptr(), Type::closure(params, ret))
            .with_conv(CallConv::Capturing)
    }

    /// Code symbol of a closure body. A body that mentions the enclosing
    /// function's type parameters is instantiated once per binding of them.
    fn closure_symbol(&mut self, def: &FunctionDef) -> String {
        let params = self.cx.closure_type_params(def);
        if params.is_empty() {
            return self.cx.symbol(&def.name);
        }
        let args: Vec<Type> = params.iter().map(|p| self.subst(&Type::param(p.clone()))).collect();
        let mangled = if args.iter().any(|a| self.cx.is_open(a)) {
            self.cx
                .registry
                .defer_unresolved(InstKind::Func, &def.name, &args)
        } else {
            self.cx.registry.require_func_instantiation(&def.name, &args)
        };
        self.cx.symbol(&mangled)
    }

    /// `object.field(args)` where the field holds a function value. Fields
    /// can be reassigned anywhere, so the convention is always checked at
    /// runtime.
    pub(crate) fn lower_field_call(
        &mut self,
        expr: &Expr,
        object: &Expr,
        field: &str,
        args: &[Expr],
    ) -> Value {
        let Some(place) = self.field_place(object, field, expr.span) else {
            for arg in args {
                self.lower_expr(arg, None);
            }
            return Value::placeholder(IrType::I32, Type::I32);
        };
        if place.ty.fn_signature().is_none() {
            for arg in args {
                self.lower_expr(arg, None);
            }
            self.error(
                ErrorCode::E5003,
                expr.span,
                format!("field `{field}` of type `{}` is not a function", place.ty),
                "not callable",
            );
            return Value::placeholder(IrType::I32, Type::I32);
        }
        let repr = self.load(&IrType::fat_ptr(), &place.addr);
        let value = Value::new(repr, IrType::fat_ptr(), place.ty);
        self.call_function_value(value, args, expr)
    }

    /// Call a function value with lowered `args` according to `conv`.
    pub(crate) fn call_through_bridge(
        &mut self,
        value: &Value,
        conv: CallConv,
        ret: &Type,
        args: &CallArgs,
    ) -> Value {
        let ret_ir = self.cx.ret_type(ret);
        let code = self.fresh();
        self.emit(format!("{code} = extractvalue {{ ptr, ptr }} {}, 0", value.repr));
        let env = self.fresh();
        self.emit(format!("{env} = extractvalue {{ ptr, ptr }} {}, 1", value.repr));

        let mut fat_args = CallArgs::with_capacity(args.len() + 1);
        fat_args.push((IrType::Ptr, env.clone()));
        fat_args.extend(args.iter().cloned());

        tracing::trace!(?conv, "function value call");
        let result = match conv {
            CallConv::Thin => self.emit_call(&ret_ir, &code, args),
            CallConv::Capturing => self.emit_call(&ret_ir, &code, &fat_args),
            CallConv::Unknown => {
                let id = self.cx.emitter.fresh_label_id();
                let (thin, fat, merge) = (
                    format!("fp_thin{id}"),
                    format!("fp_fat{id}"),
                    format!("fp_merge{id}"),
                );
                let is_null = self.fresh();
                self.emit(format!("{is_null} = icmp eq ptr {env}, null"));
                self.emit(format!("br i1 {is_null}, label %{thin}, label %{fat}"));

                self.cx.emitter.emit_label(&thin);
                let thin_result = self.emit_call(&ret_ir, &code, args);
                self.emit(format!("br label %{merge}"));

                self.cx.emitter.emit_label(&fat);
                let fat_result = self.emit_call(&ret_ir, &code, &fat_args);
                self.emit(format!("br label %{merge}"));

                self.cx.emitter.emit_label(&merge);
                match (thin_result, fat_result) {
                    (Some(thin_value), Some(fat_value)) => {
                        let joined = self.fresh();
                        self.emit(format!(
                            "{joined} = phi {ret_ir} [ {thin_value}, %{thin} ], [ {fat_value}, %{fat} ]"
                        ));
                        Some(joined)
                    }
                    _ => None,
                }
            }
        };
        self.call_value(result, ret_ir, ret.clone())
    }
}
