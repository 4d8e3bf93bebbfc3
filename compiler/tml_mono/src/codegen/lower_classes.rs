//! Class instances and constructors.
//!
//! Every class instantiation has an identified type
//! `%class.M`. A root class is `{ ptr vtable, fields... }`; a derived class
//! is `{ %class.Base, fields... }`, so every ancestor block starts at the
//! instance address and the vtable pointer is always the first word.
//! Reference classes live on the heap and are passed around as the instance
//! pointer; value classes are stack allocated and copied by value.
//!
//! Non-generic constructors are overloaded on their lowered parameter types:
//! `Point::new(i32, i32)` is registered under the key `Point_new_i32_i32`
//! and emitted as `@tml_Point_new_I32_I32`.

use tml_ir::{ClassDef, Expr, FunctionDef, Path, Type};

use crate::emit::IrType;
use crate::mangle::mangle;
use crate::unify::Bindings;

use super::context::{CodegenCx, CtorInfo};
use super::expr_lowerer::{FnLowerer, Receiver, Value};
use super::scope::{CallConv, Local, Storage};

/// Lookup key of a constructor overload.
pub(crate) fn ctor_key(class: &str, params: &[IrType]) -> String {
    let mut key = format!("{class}_new");
    for param in params {
        key.push('_');
        key.push_str(&param.to_string());
    }
    key
}

/// Mangled name of a constructor overload, without the symbol prefix.
pub(crate) fn ctor_mangled(class: &str, params: &[IrType]) -> String {
    let mut name = format!("{class}_new");
    for param in params {
        name.push('_');
        name.push_str(&param.overload_suffix());
    }
    name
}

/// `malloc` as seen by generated code.
pub(crate) const MALLOC: &str = "@malloc";

impl CodegenCx<'_> {
    /// Identified struct type of `class[args]`, instantiating it on first
    /// use.
    pub fn class_struct_ir(&mut self, class: &str, args: &[Type]) -> IrType {
        self.ir_type(&Type::named(class, args.to_vec()));
        IrType::Named(format!("%class.{}", mangle(class, args)))
    }

    /// Value type of an instance: the struct for value classes, the
    /// instance pointer otherwise.
    pub fn instance_ir(&mut self, def: &ClassDef, args: &[Type]) -> IrType {
        let struct_ir = self.class_struct_ir(&def.name, args);
        if def.is_value_class() {
            struct_ir
        } else {
            IrType::Ptr
        }
    }

    /// Register every non-generic constructor under its overload key.
    pub fn register_constructors(&mut self) {
        let env = self.env;
        for module in env.modules() {
            for class in module.classes.iter().filter(|c| c.generics.is_empty()) {
                for ctor in &class.constructors {
                    let params: Vec<IrType> =
                        ctor.params.iter().map(|p| self.ir_type(&p.ty)).collect();
                    let ret = self.instance_ir(class, &[]);
                    let key = ctor_key(&class.name, &params);
                    let symbol = self.symbol(&ctor_mangled(&class.name, &params));
                    tracing::trace!(%key, %symbol, "registered constructor");
                    self.ctors.entry(key).or_insert(CtorInfo { symbol, ret });
                }
            }
        }
    }
}

impl<'a, 'env> FnLowerer<'a, 'env> {
    /// Stage 5 of call resolution: `Class::new(args)` on a non-generic class.
    pub(crate) fn try_class_constructor(
        &mut self,
        path: &Path,
        args: &[Expr],
    ) -> Option<Value> {
        if path.last()? != "new" {
            return None;
        }
        let env = self.cx.env;
        let class = env
            .class_def(&path.qualifier()?)
            .filter(|c| c.generics.is_empty())?;

        let mut lowered: Vec<(IrType, String)> = Vec::with_capacity(args.len());
        for arg in args {
            let value = self.lower_expr(arg, None);
            lowered.push((value.ir, value.repr));
        }
        let irs: Vec<IrType> = lowered.iter().map(|(ir, _)| ir.clone()).collect();
        let exact = ctor_key(&class.name, &irs);
        let fallback = format!("{}_new", class.name);
        let ctor = match self
            .cx
            .ctors
            .get(&exact)
            .or_else(|| self.cx.ctors.get(&fallback))
        {
            Some(ctor) => ctor.clone(),
            None => {
                let ret = self.cx.instance_ir(class, &[]);
                let symbol = self.cx.symbol(&ctor_mangled(&class.name, &irs));
                tracing::debug!(class = %class.name, %symbol, "constructor not registered; declaring");
                self.cx.declare_runtime(&symbol, &ret, &irs);
                CtorInfo { symbol, ret }
            }
        };
        let result = self.emit_call(&ctor.ret, &ctor.symbol, &lowered);
        Some(self.call_value(result, ctor.ret, Type::named(class.name.clone(), Vec::new())))
    }

    /// Allocate an instance of `class[args]` and initialize its vtable
    /// pointers. Returns the instance address.
    pub(crate) fn alloc_instance(&mut self, class: &ClassDef, args: &[Type]) -> String {
        let struct_ir = self.cx.class_struct_ir(&class.name, args);
        if class.is_value_class() {
            let slot = self.alloca(&struct_ir);
            self.emit(format!("store {struct_ir} zeroinitializer, ptr {slot}"));
            return slot;
        }
        let size = self.cx.layouts.class_layout(class, args).size;
        self.cx
            .declare_runtime(MALLOC, &IrType::Ptr, &[IrType::I64]);
        let instance = self.fresh();
        self.emit(format!("{instance} = call ptr {MALLOC}(i64 {size})"));

        // Ancestor blocks all start at the instance address, so the root's
        // vtable slot is the first word.
        let vtable = self.cx.vtables.require_class_vtable(&class.name, args);
        self.emit(format!("store ptr {vtable}, ptr {instance}"));
        instance
    }

    /// The instance as a value: the pointer, or the loaded struct for value
    /// classes.
    pub(crate) fn instance_value(&mut self, class: &ClassDef, args: &[Type], addr: String) -> Value {
        let ty = Type::named(class.name.clone(), args.to_vec());
        if class.is_value_class() {
            let struct_ir = self.cx.class_struct_ir(&class.name, args);
            let repr = self.load(&struct_ir, &addr);
            Value::new(repr, struct_ir, ty)
        } else {
            Value::new(addr, IrType::Ptr, ty)
        }
    }

    /// Emit a constructor body. The body initializes `self`; the instance is
    /// returned implicitly.
    pub fn lower_constructor(
        cx: &'a mut CodegenCx<'env>,
        class: &ClassDef,
        args: &[Type],
        def: &FunctionDef,
        symbol: &str,
        subs: Bindings,
    ) {
        tracing::debug!(symbol, class = %class.name, "lowering constructor");
        let class_ty = Type::named(class.name.clone(), args.to_vec());
        let mut this = FnLowerer::new(cx, subs, class_ty.clone());

        let mut header_params = Vec::with_capacity(def.params.len());
        let mut params = Vec::with_capacity(def.params.len());
        for param in &def.params {
            let ty = this.subst(&param.ty);
            let ir = this.cx.ir_type(&ty);
            header_params.push(format!("{ir} %arg.{}", param.name));
            params.push((param.name.clone(), ty, ir));
        }
        let ret_ir = this.cx.instance_ir(class, args);
        this.cx.emitter.begin_function(&format!(
            "define {ret_ir} {symbol}({}) {{",
            header_params.join(", ")
        ));
        this.cx
            .emitter
            .emit_coverage(symbol.trim_start_matches('@'));

        let instance = this.alloc_instance(class, args);
        this.bind_self(
            Receiver {
                ty: class_ty,
                by_pointer: !class.is_value_class(),
            },
            instance.clone(),
        );
        this.bind_params(params);
        if let Some(body) = &def.body {
            this.lower_block(body, None);
        }
        let value = this.instance_value(class, args, instance);
        this.emit(format!("ret {} {}", value.ir, value.repr));
        this.cx.emitter.end_function();
    }

    /// Spill incoming parameters to stack slots.
    pub(crate) fn bind_params(&mut self, params: Vec<(String, Type, IrType)>) {
        for (name, ty, ir) in params {
            let addr = self.alloca(&ir);
            self.emit(format!("store {ir} %arg.{name}, ptr {addr}"));
            self.scope.bind(name, Local {
                storage: Storage::Slot { addr },
                ty,
                ir,
                conv: CallConv::Unknown,
            });
        }
    }
}
