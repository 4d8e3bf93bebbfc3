//! Whole-module driver.
//!
//! Compilation runs in three phases:
//!
//! 1. register constructor overloads and lower every non-generic item of
//!    the local module;
//! 2. drain the instantiation worklist round by round, emitting requested
//!    vtables between rounds (a vtable can request method instantiations,
//!    and an instantiation can request vtables);
//! 3. report deferred instantiations and assemble the output.

use tml_diagnostic::{Diagnostic, ErrorCode};
use tml_ir::{ClassDef, EnumDef, FnFlags, FunctionDef, StructDef, SymbolEnv, Type};

use crate::config::CodegenConfig;
use crate::emit::IrType;
use crate::layout::{field_types, variant_payload};
use crate::registry::{method_symbol, InstKind, WorkItem};
use crate::unify::{bindings_for, substitute, unify, Bindings};
use crate::vtable::VtableRequest;
use crate::MonoError;

use super::context::CodegenCx;
use super::expr_lowerer::{FnLowerer, Receiver};
use super::lower_classes::ctor_mangled;
use super::lower_methods::nominal_parts;

/// Result of compiling one module.
#[derive(Debug)]
pub struct CodegenOutput {
    /// The instruction stream: type definitions, globals, declarations,
    /// then function bodies.
    pub ir: String,
    pub diagnostics: Vec<Diagnostic>,
    /// Every instantiation generated, in the order it was processed.
    pub instantiations: Vec<WorkItem>,
    /// Requests that still had unbound type arguments.
    pub deferred: Vec<WorkItem>,
    /// Worklist rounds needed to reach the fixed point.
    pub rounds: usize,
}

impl CodegenOutput {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    /// Whether an instantiation with this mangled name was generated.
    pub fn instantiated(&self, mangled: &str) -> bool {
        self.instantiations.iter().any(|w| w.mangled == mangled)
    }
}

pub struct ModuleCompiler<'env> {
    cx: CodegenCx<'env>,
}

impl<'env> ModuleCompiler<'env> {
    pub fn new(env: &'env SymbolEnv, config: CodegenConfig) -> Self {
        ModuleCompiler {
            cx: CodegenCx::new(env, config),
        }
    }

    pub fn compile(mut self) -> Result<CodegenOutput, MonoError> {
        let env = self.cx.env;
        let _span = tracing::info_span!("compile_module", module = %env.local.path).entered();

        self.cx.register_constructors();
        self.lower_local_items();
        self.drain()?;
        self.report_deferred();
        Ok(self.finish())
    }

    // -----------------------------------------------------------------------
    // Phase 1: non-generic items
    // -----------------------------------------------------------------------

    fn lower_local_items(&mut self) {
        let env = self.cx.env;
        for def in env.local.functions.iter() {
            if def.is_generic() || def.body.is_none() || def.flags.contains(FnFlags::EXTERN) {
                continue;
            }
            // Generated per instantiation of the enclosing function.
            if def.is_closure_body() && !self.cx.closure_type_params(def).is_empty() {
                continue;
            }
            let symbol = self.cx.symbol(&def.name);
            FnLowerer::lower_function(&mut self.cx, def, &symbol, Bindings::default(), None);
        }

        for imp in env.local.impls.iter().filter(|i| i.generics.is_empty()) {
            let Some(type_name) = imp.type_name() else {
                continue;
            };
            let by_pointer = self.is_reference_class(type_name);
            for def in imp.methods.iter().filter(|m| !m.is_generic() && m.body.is_some()) {
                let symbol = self
                    .cx
                    .symbol(&method_symbol(type_name, &[], &def.name, &[]));
                let receiver = def.has_self().then(|| Receiver {
                    ty: imp.self_ty.clone(),
                    by_pointer,
                });
                FnLowerer::lower_function(&mut self.cx, def, &symbol, Bindings::default(), receiver);
            }
        }

        for class in env.local.classes.iter().filter(|c| c.generics.is_empty()) {
            for ctor in &class.constructors {
                let params: Vec<IrType> = ctor.params.iter().map(|p| self.cx.ir_type(&p.ty)).collect();
                let symbol = self.cx.symbol(&ctor_mangled(&class.name, &params));
                FnLowerer::lower_constructor(&mut self.cx, class, &[], ctor, &symbol, Bindings::default());
            }
            for def in class.methods.iter().filter(|m| !m.is_generic() && m.body.is_some()) {
                let symbol = self
                    .cx
                    .symbol(&method_symbol(&class.name, &[], &def.name, &[]));
                let receiver = def.has_self().then(|| Self::class_receiver(class, &[]));
                FnLowerer::lower_function(&mut self.cx, def, &symbol, Bindings::default(), receiver);
            }
        }
    }

    fn is_reference_class(&self, name: &str) -> bool {
        self.cx
            .env
            .class_def(name)
            .is_some_and(|c| !c.is_value_class())
    }

    fn class_receiver(class: &ClassDef, args: &[Type]) -> Receiver {
        Receiver {
            ty: Type::named(class.name.clone(), args.to_vec()),
            by_pointer: !class.is_value_class(),
        }
    }

    // -----------------------------------------------------------------------
    // Phase 2: the worklist
    // -----------------------------------------------------------------------

    fn drain(&mut self) -> Result<(), MonoError> {
        loop {
            self.emit_pending_vtables();
            match self.cx.registry.next_round()? {
                Some(batch) => {
                    for item in &batch {
                        self.generate(item);
                    }
                }
                None if self.cx.vtables.has_pending() => {}
                None => return Ok(()),
            }
        }
    }

    fn generate(&mut self, item: &WorkItem) {
        tracing::debug!(kind = %item.kind, name = %item.mangled, "generating instantiation");
        let env = self.cx.env;
        let found = match item.kind {
            InstKind::Struct => env
                .struct_def(&item.base)
                .map(|def| self.define_struct(item, def)),
            InstKind::Enum => env.enum_def(&item.base).map(|def| self.define_enum(item, def)),
            InstKind::Class => env
                .class_def(&item.base)
                .map(|def| self.define_class(item, def)),
            InstKind::Func => env.function(&item.base).map(|def| {
                let symbol = self.cx.symbol(&item.mangled);
                let subs = if def.is_closure_body() && !def.is_generic() {
                    bindings_for(&self.cx.closure_type_params(def), &item.args)
                } else {
                    bindings_for(&def.generics, &item.args)
                };
                FnLowerer::lower_function(&mut self.cx, def, &symbol, subs, None);
            }),
            InstKind::Method => self.generate_method(item),
        };
        if found.is_none() {
            self.cx.report(
                Diagnostic::error(ErrorCode::E9002)
                    .with_message(format!("no definition for instantiation `{}`", item.mangled))
                    .with_note(format!("requested as a {} instantiation of `{}`", item.kind, item.base)),
            );
        }
    }

    fn define_struct(&mut self, item: &WorkItem, def: &StructDef) {
        if def.is_union {
            let size = self
                .cx
                .layouts
                .size_of(&Type::named(def.name.clone(), item.args.clone()));
            // Members may be nominal types that need their own definitions.
            for ty in field_types(&def.generics, &def.fields, &item.args) {
                self.cx.ir_type(&ty);
            }
            let body = IrType::Anon(vec![IrType::Array(size, Box::new(IrType::I8))]);
            self.cx
                .emitter
                .define_type(&format!("%union.{}", item.mangled), &body);
        } else {
            let fields = field_types(&def.generics, &def.fields, &item.args)
                .iter()
                .map(|t| self.cx.ir_type(t))
                .collect();
            self.cx
                .emitter
                .define_type(&format!("%struct.{}", item.mangled), &IrType::Anon(fields));
        }
    }

    fn define_enum(&mut self, item: &WorkItem, def: &EnumDef) {
        for variant in &def.variants {
            if let Some(payload) = variant_payload(def, variant, &item.args) {
                self.cx.ir_type(&payload);
            }
        }
        let words = self.cx.layouts.enum_payload_words(def, &item.args);
        let body = if words == 0 {
            IrType::Anon(vec![IrType::I32])
        } else {
            IrType::Anon(vec![IrType::I32, IrType::Array(words, Box::new(IrType::I64))])
        };
        self.cx
            .emitter
            .define_type(&format!("%struct.{}", item.mangled), &body);
    }

    fn define_class(&mut self, item: &WorkItem, def: &ClassDef) {
        let mut fields = Vec::with_capacity(def.fields.len() + 1);
        fields.push(match &def.base {
            Some(base) => self.cx.class_struct_ir(base, &[]),
            None => IrType::Ptr,
        });
        for ty in field_types(&def.generics, &def.fields, &item.args) {
            fields.push(self.cx.ir_type(&ty));
        }
        self.cx
            .emitter
            .define_type(&format!("%class.{}", item.mangled), &IrType::Anon(fields));
    }

    fn generate_method(&mut self, item: &WorkItem) -> Option<()> {
        let env = self.cx.env;
        let key = item.method.as_ref()?;
        let symbol = self.cx.symbol(&item.mangled);
        let owner_ty = Type::named(item.base.clone(), item.args.clone());

        if let Some(class) = env.class_def(&item.base) {
            let mut subs = bindings_for(&class.generics, &item.args);
            if key.name == "new" {
                if let Some(ctor) = class.constructors.first() {
                    subs.extend(bindings_for(&ctor.generics, &key.args));
                    FnLowerer::lower_constructor(&mut self.cx, class, &item.args, ctor, &symbol, subs);
                    return Some(());
                }
            }
            let def = class.method(&key.name)?;
            subs.extend(bindings_for(&def.generics, &key.args));
            let receiver = def
                .has_self()
                .then(|| Self::class_receiver(class, &item.args));
            FnLowerer::lower_function(&mut self.cx, def, &symbol, subs, receiver);
            return Some(());
        }

        let (imp, def) = env.impl_method(&item.base, &key.name)?;
        let mut subs = Bindings::default();
        unify(&imp.self_ty, &owner_ty, &imp.generics, &mut subs);
        subs.extend(bindings_for(&def.generics, &key.args));
        let receiver = def.has_self().then(|| Receiver {
            ty: owner_ty,
            by_pointer: self.is_reference_class(&item.base),
        });
        FnLowerer::lower_function(&mut self.cx, def, &symbol, subs, receiver);
        Some(())
    }

    // -----------------------------------------------------------------------
    // Vtables
    // -----------------------------------------------------------------------

    fn emit_pending_vtables(&mut self) {
        for request in self.cx.vtables.take_pending() {
            let (global, entries) = match request {
                VtableRequest::Behavior {
                    self_ty,
                    behavior,
                    args,
                    global,
                } => {
                    tracing::trace!(behavior, ?args, "behavior vtable");
                    let entries = self.behavior_entries(&self_ty, &behavior);
                    (global, entries)
                }
                VtableRequest::Class { class, args, global } => {
                    let entries = self.class_entries(&class, &args);
                    (global, entries)
                }
            };
            tracing::debug!(%global, slots = entries.len(), "emitting vtable");
            let body = if entries.is_empty() {
                "zeroinitializer".to_string()
            } else {
                let list: Vec<String> = entries.iter().map(|e| format!("ptr {e}")).collect();
                format!("[{}]", list.join(", "))
            };
            self.cx.emitter.add_global(format!(
                "{global} = internal constant [{} x ptr] {body}",
                entries.len()
            ));
        }
    }

    /// Function pointers of `self_ty`'s implementation of `behavior`, in
    /// the behavior's method order.
    fn behavior_entries(&mut self, self_ty: &Type, behavior: &str) -> Vec<String> {
        let env = self.cx.env;
        let order = self
            .cx
            .vtables
            .method_order(env, behavior)
            .map(<[String]>::to_vec)
            .unwrap_or_default();
        let (type_name, type_args) = nominal_parts(self_ty).unwrap_or(("", &[]));
        let imp = env.impl_of(type_name, behavior);
        let mut entries = Vec::with_capacity(order.len());
        for method in &order {
            let def = imp.and_then(|i| i.method(method).map(|m| (i, m)));
            let Some((imp, def)) = def.filter(|(_, m)| !m.is_generic()) else {
                self.cx.report(
                    Diagnostic::error(ErrorCode::E5009)
                        .with_message(format!(
                            "`{self_ty}` has no implementation of `{behavior}::{method}`"
                        ))
                        .with_note("the vtable slot is left null"),
                );
                entries.push("null".to_string());
                continue;
            };
            let symbol = if imp.generics.is_empty() {
                let symbol = self
                    .cx
                    .symbol(&method_symbol(type_name, &[], method, &[]));
                if !env.local.impls.iter().any(|i| std::ptr::eq(i, imp)) {
                    let mut subs = Bindings::default();
                    unify(&imp.self_ty, self_ty, &imp.generics, &mut subs);
                    self.declare_method(&symbol, def, &subs);
                }
                symbol
            } else {
                let mangled = self
                    .cx
                    .registry
                    .require_method_instantiation(type_name, type_args, method, &[]);
                self.cx.symbol(&mangled)
            };
            entries.push(symbol);
        }
        entries
    }

    /// Function pointers of every virtual slot of `class[args]`, root class
    /// first.
    fn class_entries(&mut self, class: &str, args: &[Type]) -> Vec<String> {
        let env = self.cx.env;
        let slots = self.cx.vtables.class_slots(env, class).to_vec();
        let mut entries = Vec::with_capacity(slots.len());
        for slot in slots {
            let Some(owner) = env.class_def(&slot.owner) else {
                entries.push("null".to_string());
                continue;
            };
            let Some(def) = owner.method(&slot.method).filter(|m| m.body.is_some()) else {
                // Abstract slot.
                entries.push("null".to_string());
                continue;
            };
            let symbol = if owner.generics.is_empty() {
                let symbol = self
                    .cx
                    .symbol(&method_symbol(&owner.name, &[], &slot.method, &[]));
                if env.local.classes.get(&owner.name).is_none() {
                    self.declare_method(&symbol, def, &Bindings::default());
                }
                symbol
            } else {
                let owner_args = if owner.name == class { args } else { &[] };
                let mangled = self.cx.registry.require_method_instantiation(
                    &owner.name,
                    owner_args,
                    &slot.method,
                    &[],
                );
                self.cx.symbol(&mangled)
            };
            entries.push(symbol);
        }
        entries
    }

    fn declare_method(&mut self, symbol: &str, def: &FunctionDef, subs: &Bindings) {
        let ret = self.cx.ret_type(&substitute(&def.ret, subs));
        let mut params = vec![IrType::Ptr];
        for param in &def.params {
            params.push(self.cx.ir_type(&substitute(&param.ty, subs)));
        }
        self.cx.declare_runtime(symbol, &ret, &params);
    }

    // -----------------------------------------------------------------------
    // Phase 3
    // -----------------------------------------------------------------------

    fn report_deferred(&mut self) {
        let deferred = self.cx.registry.deferred().to_vec();
        for item in deferred {
            let args: Vec<String> = item.args.iter().map(ToString::to_string).collect();
            self.cx.report(
                Diagnostic::warning(ErrorCode::W5002)
                    .with_message(format!(
                        "{} instantiation of `{}` deferred: [{}] still has unbound type parameters",
                        item.kind,
                        item.base,
                        args.join(", ")
                    ))
                    .with_note(format!("calls use the placeholder symbol `{}`", item.mangled)),
            );
        }
    }

    fn finish(self) -> CodegenOutput {
        let CodegenCx {
            emitter,
            registry,
            mut diagnostics,
            ..
        } = self.cx;
        let rounds = registry.rounds();
        let (instantiations, deferred) = registry.into_records();
        tracing::info!(
            instantiations = instantiations.len(),
            deferred = deferred.len(),
            rounds,
            "module compiled"
        );
        CodegenOutput {
            ir: emitter.finish(),
            diagnostics: diagnostics.flush(),
            instantiations,
            deferred,
            rounds,
        }
    }
}

/// Compile the local module of `env`.
pub fn compile_module(env: &SymbolEnv, config: CodegenConfig) -> Result<CodegenOutput, MonoError> {
    ModuleCompiler::new(env, config).compile()
}
