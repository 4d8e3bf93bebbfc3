//! Module-wide code generation state shared by every function lowering.

use rustc_hash::FxHashMap;
use tml_diagnostic::{Diagnostic, DiagnosticConfig, DiagnosticQueue, ErrorCode};
use tml_ir::{Block, Expr, ExprKind, FunctionDef, PrimitiveKind, Span, Stmt, SymbolEnv, Type};

use crate::config::CodegenConfig;
use crate::emit::{Emitter, IrType};
use crate::layout::{LayoutCx, WrapperKind, REF_COUNT_BLOCK};
use crate::mangle::{mangle, mangle_type};
use crate::registry::{InstKind, InstantiationRegistry};
use crate::stack::ensure_sufficient_stack;
use crate::unify::Resolution;
use crate::vtable::VtableRegistry;

/// A registered class constructor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct CtorInfo {
    pub symbol: String,
    pub ret: IrType,
}

pub(crate) struct CodegenCx<'env> {
    pub env: &'env SymbolEnv,
    pub config: CodegenConfig,
    pub emitter: Emitter,
    pub registry: InstantiationRegistry,
    pub layouts: LayoutCx<'env>,
    pub vtables: VtableRegistry,
    pub diagnostics: DiagnosticQueue,
    /// Constructor key (`Point_new_i32_i32`, or `Point_new`) to constructor.
    pub ctors: FxHashMap<String, CtorInfo>,
}

impl<'env> CodegenCx<'env> {
    pub fn new(env: &'env SymbolEnv, config: CodegenConfig) -> Self {
        let diagnostics = DiagnosticQueue::with_config(DiagnosticConfig {
            error_limit: config.error_limit,
            ..DiagnosticConfig::default()
        });
        CodegenCx {
            env,
            emitter: Emitter::new(config.coverage),
            registry: InstantiationRegistry::new(config.max_instantiation_rounds),
            layouts: LayoutCx::new(env),
            vtables: VtableRegistry::new(),
            diagnostics,
            ctors: FxHashMap::default(),
            config,
        }
    }

    /// Function symbol for a mangled name: `@tml_<mangled>`.
    pub fn symbol(&self, mangled: &str) -> String {
        format!("@{}{mangled}", self.config.symbol_prefix)
    }

    pub fn report(&mut self, diag: Diagnostic) {
        if diag.is_error() {
            tracing::warn!(code = %diag.code, message = %diag.message, "codegen error");
        }
        self.diagnostics.push(diag);
    }

    /// Warn about (or, in strict mode, reject) parameters bound only by the
    /// fallback default.
    pub fn report_defaulted(&mut self, item: &str, resolution: &Resolution, span: Span) {
        if resolution.defaulted.is_empty() {
            return;
        }
        let params = resolution.defaulted.join(", ");
        let diag = if self.config.strict_generics {
            Diagnostic::error(ErrorCode::E5007)
        } else {
            Diagnostic::warning(ErrorCode::W5001)
        };
        self.report(
            diag.with_message(format!(
                "cannot infer type parameter(s) {params} of `{item}`; using a default type"
            ))
            .with_label(span, "type arguments needed here"),
        );
    }

    /// Whether `ty` still mentions a name that is not a known type, which is
    /// how an unbound generic parameter shows up after substitution.
    pub fn is_open(&self, ty: &Type) -> bool {
        match ty {
            Type::Primitive(_) | Type::Class(_) => false,
            Type::Named { name, args, .. } => {
                if args.is_empty() {
                    !self.is_known_type(name)
                } else {
                    args.iter().any(|a| self.is_open(a))
                }
            }
            Type::DynBehavior { args, .. } | Type::Tuple(args) => args.iter().any(|a| self.is_open(a)),
            Type::Ref { inner, .. } | Type::Ptr(inner) | Type::Slice(inner) => self.is_open(inner),
            Type::Array { elem, .. } => self.is_open(elem),
            Type::Func { params, ret } | Type::Closure { params, ret } => {
                params.iter().any(|p| self.is_open(p)) || self.is_open(ret)
            }
        }
    }

    fn is_known_type(&self, name: &str) -> bool {
        PrimitiveKind::from_name(name).is_some()
            || self.env.struct_def(name).is_some()
            || self.env.enum_def(name).is_some()
            || self.env.class_def(name).is_some()
            || self.env.behavior(name).is_some()
    }

    /// Type parameters a closure body mentions, sorted by name. A closure
    /// has no generics of its own, so these come from the enclosing
    /// function and key the body's instantiation.
    pub fn closure_type_params(&self, def: &FunctionDef) -> Vec<String> {
        let mut names = Vec::new();
        for p in def.params.iter().chain(&def.env) {
            self.collect_params(&p.ty, &mut names);
        }
        self.collect_params(&def.ret, &mut names);
        if let Some(body) = &def.body {
            self.collect_block_params(body, &mut names);
        }
        names.sort();
        names.dedup();
        names
    }

    fn collect_params(&self, ty: &Type, out: &mut Vec<String>) {
        match ty {
            Type::Primitive(_) | Type::Class(_) => {}
            Type::Named { name, args, .. } if args.is_empty() => {
                if !self.is_known_type(name) {
                    out.push(name.clone());
                }
            }
            Type::Named { args, .. } | Type::DynBehavior { args, .. } | Type::Tuple(args) => {
                for a in args {
                    self.collect_params(a, out);
                }
            }
            Type::Ref { inner, .. } | Type::Ptr(inner) | Type::Slice(inner) => {
                self.collect_params(inner, out);
            }
            Type::Array { elem, .. } => self.collect_params(elem, out),
            Type::Func { params, ret } | Type::Closure { params, ret } => {
                for p in params {
                    self.collect_params(p, out);
                }
                self.collect_params(ret, out);
            }
        }
    }

    fn collect_block_params(&self, block: &Block, out: &mut Vec<String>) {
        for stmt in &block.stmts {
            match stmt {
                Stmt::Let { ty, init, .. } => {
                    if let Some(ty) = ty {
                        self.collect_params(ty, out);
                    }
                    self.collect_expr_params(init, out);
                }
                Stmt::Assign { target, value, .. } => {
                    self.collect_expr_params(target, out);
                    self.collect_expr_params(value, out);
                }
                Stmt::Expr(e) | Stmt::Return(Some(e), _) => self.collect_expr_params(e, out),
                Stmt::Return(None, _) => {}
            }
        }
        if let Some(tail) = &block.tail {
            self.collect_expr_params(tail, out);
        }
    }

    fn collect_expr_params(&self, expr: &Expr, out: &mut Vec<String>) {
        ensure_sufficient_stack(|| {
            if let Some(ty) = &expr.ty {
                self.collect_params(ty, out);
            }
            match &expr.kind {
                ExprKind::Lit(_)
                | ExprKind::Ident(_)
                | ExprKind::FuncRef(_)
                | ExprKind::Closure { .. } => {}
                ExprKind::Path(path) => {
                    for g in &path.generics {
                        self.collect_params(g, out);
                    }
                }
                ExprKind::Call { callee, args } => {
                    self.collect_expr_params(callee, out);
                    for a in args {
                        self.collect_expr_params(a, out);
                    }
                }
                ExprKind::MethodCall { receiver, args, .. } => {
                    self.collect_expr_params(receiver, out);
                    for a in args {
                        self.collect_expr_params(a, out);
                    }
                }
                ExprKind::Field { object, .. } => self.collect_expr_params(object, out),
                ExprKind::StructLit { path, fields, base } => {
                    for g in &path.generics {
                        self.collect_params(g, out);
                    }
                    for f in fields {
                        self.collect_expr_params(&f.value, out);
                    }
                    if let Some(base) = base {
                        self.collect_expr_params(base, out);
                    }
                }
                ExprKind::Block(block) => self.collect_block_params(block, out),
            }
        });
    }

    // -----------------------------------------------------------------------
    // Semantic type -> IR type
    // -----------------------------------------------------------------------

    /// Storage type of a value of `ty`. Nominal types are instantiated on
    /// first use.
    pub fn ir_type(&mut self, ty: &Type) -> IrType {
        ensure_sufficient_stack(|| self.ir_type_inner(ty))
    }

    /// Return type in a signature: void-like types become `void`.
    pub fn ret_type(&mut self, ty: &Type) -> IrType {
        if ty.is_void_like() {
            IrType::Void
        } else {
            self.ir_type(ty)
        }
    }

    fn ir_type_inner(&mut self, ty: &Type) -> IrType {
        match ty {
            Type::Primitive(kind) => primitive_ir(*kind),
            Type::Ref { .. } | Type::Ptr(_) => IrType::Ptr,
            Type::Func { .. } | Type::Closure { .. } => IrType::fat_ptr(),
            Type::DynBehavior { name, args } => self.dyn_type(name, args),
            Type::Slice(_) => IrType::Anon(vec![IrType::Ptr, IrType::I64]),
            Type::Tuple(elems) if elems.is_empty() => IrType::Empty,
            Type::Tuple(elems) => IrType::Anon(elems.iter().map(|e| self.ir_type(e)).collect()),
            Type::Array { elem, len } => IrType::Array(*len, Box::new(self.ir_type(elem))),
            Type::Class(name) => self.nominal_ir(name, &[]),
            Type::Named { name, args, .. } => {
                if let Some(kind) = PrimitiveKind::from_name(name).filter(|_| args.is_empty()) {
                    return primitive_ir(kind);
                }
                self.nominal_ir(name, args)
            }
        }
    }

    /// `%dyn.<Behavior>`, defined on first use.
    pub fn dyn_type(&mut self, behavior: &str, args: &[Type]) -> IrType {
        let name = format!("%dyn.{}", mangle(behavior, args));
        self.emitter.define_type(&name, &IrType::fat_ptr());
        IrType::Named(name)
    }

    fn nominal_ir(&mut self, name: &str, args: &[Type]) -> IrType {
        let env = self.env;
        if let (Some(kind), [inner]) = (WrapperKind::from_name(name), args) {
            if !kind.is_boxed_struct() {
                return IrType::Ptr;
            }
            let ir_name = format!("%struct.{}", mangle(name, args));
            self.emitter.define_type(&ir_name, &IrType::Anon(vec![IrType::Ptr]));
            if !self.is_open(inner) {
                self.ir_type(inner);
            }
            return IrType::Named(ir_name);
        }
        let open = args.iter().any(|a| self.is_open(a));
        if let Some(def) = env.struct_def(name) {
            let mangled = self.require(InstKind::Struct, &def.name, args, open);
            let sigil = if def.is_union { "%union" } else { "%struct" };
            return IrType::Named(format!("{sigil}.{mangled}"));
        }
        if let Some(def) = env.enum_def(name) {
            let mangled = self.require(InstKind::Enum, &def.name, args, open);
            // No layout exists for an unresolved instance; keep the tag only.
            if open {
                return IrType::I32;
            }
            return IrType::Named(format!("%struct.{mangled}"));
        }
        if let Some(def) = env.class_def(name) {
            let mangled = self.require(InstKind::Class, &def.name, args, open);
            if def.is_value_class() {
                return IrType::Named(format!("%class.{mangled}"));
            }
            return IrType::Ptr;
        }
        // Unbound generic parameter or opaque runtime type.
        IrType::Ptr
    }

    fn require(&mut self, kind: InstKind, base: &str, args: &[Type], open: bool) -> String {
        if open {
            return self.registry.defer_unresolved(kind, base, args);
        }
        match kind {
            InstKind::Struct => self.registry.require_struct_instantiation(base, args),
            InstKind::Enum => self.registry.require_enum_instantiation(base, args),
            InstKind::Class => self.registry.require_class_instantiation(base, args),
            InstKind::Func | InstKind::Method => mangle(base, args),
        }
    }

    /// `%struct.ArcInner__<T>`: the counted block behind a reference-counted
    /// wrapper.
    pub fn ref_count_block(&mut self, payload: &Type) -> IrType {
        let name = format!(
            "%struct.{REF_COUNT_BLOCK}{}{}",
            crate::mangle::SEPARATOR,
            mangle_type(payload)
        );
        let payload_ir = self.ir_type(payload);
        self.emitter.define_type(
            &name,
            &IrType::Anon(vec![IrType::I64, IrType::I64, payload_ir]),
        );
        IrType::Named(name)
    }

    /// Declare a runtime function once.
    pub fn declare_runtime(&mut self, symbol: &str, ret: &IrType, params: &[IrType]) {
        self.emitter.declare(symbol, ret, params);
    }
}

pub(crate) fn primitive_ir(kind: PrimitiveKind) -> IrType {
    match kind {
        PrimitiveKind::I8 | PrimitiveKind::U8 => IrType::I8,
        PrimitiveKind::I16 | PrimitiveKind::U16 => IrType::I16,
        PrimitiveKind::I32 | PrimitiveKind::U32 | PrimitiveKind::Char => IrType::I32,
        PrimitiveKind::I64 | PrimitiveKind::U64 => IrType::I64,
        PrimitiveKind::I128 | PrimitiveKind::U128 => IrType::I128,
        PrimitiveKind::F32 => IrType::Float,
        PrimitiveKind::F64 => IrType::Double,
        PrimitiveKind::Bool => IrType::I1,
        PrimitiveKind::Str => IrType::Ptr,
        PrimitiveKind::Unit | PrimitiveKind::Never => IrType::Empty,
    }
}
