//! Per-function expression lowering.
//!
//! `FnLowerer` owns the state of the function being emitted (scope,
//! substitutions of the current instantiation, return type) and dispatches
//! each `ExprKind` to a focused `lower_*` method implemented in the sibling
//! `lower_*.rs` files.

use std::fmt::Write;

use tml_diagnostic::{Diagnostic, ErrorCode};
use tml_ir::{Block, Expr, ExprKind, FunctionDef, Literal, Span, Stmt, Type};

use crate::emit::IrType;
use crate::stack::ensure_sufficient_stack;
use crate::unify::{substitute, Bindings};

use super::context::CodegenCx;
use super::scope::{CallConv, Local, Scope, Storage};

// ---------------------------------------------------------------------------
// Values and places
// ---------------------------------------------------------------------------

/// A lowered expression: its operand text, IR type and semantic type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Value {
    pub repr: String,
    pub ir: IrType,
    pub ty: Type,
    /// Calling convention, for function-typed values.
    pub conv: CallConv,
}

impl Value {
    pub fn new(repr: impl Into<String>, ir: IrType, ty: Type) -> Self {
        Value {
            repr: repr.into(),
            ir,
            ty,
            conv: CallConv::Unknown,
        }
    }

    #[must_use]
    pub fn with_conv(mut self, conv: CallConv) -> Self {
        self.conv = conv;
        self
    }

    pub fn unit() -> Self {
        Value::new("zeroinitializer", IrType::Empty, Type::UNIT)
    }

    /// Stand-in for an expression that failed to lower, so siblings can
    /// continue.
    pub fn placeholder(ir: IrType, ty: Type) -> Self {
        if ir.is_void() {
            return Value::unit();
        }
        Value::new(ir.zero_literal(), ir, ty)
    }
}

/// An address holding a value of `ty`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Place {
    pub addr: String,
    pub ty: Type,
}

/// The receiver of a method body.
#[derive(Clone, Debug)]
pub(crate) struct Receiver {
    pub ty: Type,
    /// Reference-class receivers are the instance pointer itself.
    pub by_pointer: bool,
}

// ---------------------------------------------------------------------------
// FnLowerer
// ---------------------------------------------------------------------------

pub(crate) struct FnLowerer<'a, 'env> {
    pub cx: &'a mut CodegenCx<'env>,
    pub scope: Scope,
    /// Type arguments of the instantiation being lowered.
    pub subs: Bindings,
    pub ret_ty: Type,
}

impl<'a, 'env> FnLowerer<'a, 'env> {
    pub fn new(cx: &'a mut CodegenCx<'env>, subs: Bindings, ret_ty: Type) -> Self {
        FnLowerer {
            cx,
            scope: Scope::new(),
            subs,
            ret_ty,
        }
    }

    /// Emit a whole function definition named `symbol`.
    pub fn lower_function(
        cx: &'a mut CodegenCx<'env>,
        def: &FunctionDef,
        symbol: &str,
        subs: Bindings,
        receiver: Option<Receiver>,
    ) {
        tracing::debug!(symbol, "lowering function");
        let ret_ty = substitute(&def.ret, &subs);
        let mut this = FnLowerer::new(cx, subs, ret_ty);

        let mut header_params: Vec<String> = Vec::new();
        if def.is_closure_body() {
            header_params.push("ptr %env".to_string());
        }
        if receiver.is_some() {
            header_params.push("ptr %self".to_string());
        }
        let mut params = Vec::with_capacity(def.params.len());
        for param in &def.params {
            let ty = this.subst(&param.ty);
            let ir = this.cx.ir_type(&ty);
            header_params.push(format!("{ir} %arg.{}", param.name));
            params.push((param.name.clone(), ty, ir));
        }
        let ret_ty = this.ret_ty.clone();
        let ret_ir = this.cx.ret_type(&ret_ty);
        this.cx.emitter.begin_function(&format!(
            "define {ret_ir} {symbol}({}) {{",
            header_params.join(", ")
        ));
        this.cx
            .emitter
            .emit_coverage(symbol.trim_start_matches('@'));

        if def.is_closure_body() {
            this.bind_captures(def);
        }
        if let Some(receiver) = receiver {
            this.bind_self(receiver, "%self".to_string());
        }
        this.bind_params(params);

        let result = match &def.body {
            Some(body) => this.lower_block(body, Some(&ret_ty)),
            None => Value::unit(),
        };
        this.emit_return(&result);
        this.cx.emitter.end_function();
    }

    fn bind_captures(&mut self, def: &FunctionDef) {
        let mut tys = Vec::with_capacity(def.env.len());
        let mut irs = Vec::with_capacity(def.env.len());
        for capture in &def.env {
            let ty = self.subst(&capture.ty);
            irs.push(self.cx.ir_type(&ty));
            tys.push(ty);
        }
        let record = IrType::Anon(irs.clone());
        for (i, ((capture, ty), ir)) in def.env.iter().zip(tys).zip(irs).enumerate() {
            let addr = self.gep_field(&record, "%env", i);
            self.scope.bind(capture.name.clone(), Local {
                storage: Storage::Slot { addr },
                ty,
                ir,
                conv: CallConv::Unknown,
            });
        }
    }

    /// Bind `self`. `at` is the instance pointer of a reference class, or
    /// the address of the receiver for anything else.
    pub(crate) fn bind_self(&mut self, receiver: Receiver, at: String) {
        let ir = self.cx.ir_type(&receiver.ty);
        let storage = if receiver.by_pointer {
            Storage::Direct { value: at }
        } else {
            Storage::Slot { addr: at }
        };
        self.scope.bind("self", Local {
            storage,
            ty: receiver.ty,
            ir,
            conv: CallConv::Unknown,
        });
    }

    pub(crate) fn emit_return(&mut self, value: &Value) {
        let ret_ty = self.ret_ty.clone();
        let ret_ir = self.cx.ret_type(&ret_ty);
        if ret_ir.is_void() {
            self.emit("ret void");
        } else {
            self.emit(format!("ret {ret_ir} {}", value.repr));
        }
    }

    // -----------------------------------------------------------------------
    // Small helpers
    // -----------------------------------------------------------------------

    pub(crate) fn subst(&self, ty: &Type) -> Type {
        substitute(ty, &self.subs)
    }

    pub(crate) fn emit(&mut self, line: impl AsRef<str>) {
        self.cx.emitter.emit_line(line);
    }

    pub(crate) fn fresh(&mut self) -> String {
        self.cx.emitter.fresh_temp()
    }

    pub(crate) fn alloca(&mut self, ir: &IrType) -> String {
        let slot = self.fresh();
        self.emit(format!("{slot} = alloca {ir}"));
        slot
    }

    pub(crate) fn load(&mut self, ir: &IrType, addr: &str) -> String {
        let value = self.fresh();
        self.emit(format!("{value} = load {ir}, ptr {addr}"));
        value
    }

    pub(crate) fn store(&mut self, value: &Value, addr: &str) {
        self.emit(format!("store {} {}, ptr {addr}", value.ir, value.repr));
    }

    /// Address of field `index` of the aggregate `agg` stored at `addr`.
    pub(crate) fn gep_field(&mut self, agg: &IrType, addr: &str, index: usize) -> String {
        let field = self.fresh();
        self.emit(format!(
            "{field} = getelementptr inbounds {agg}, ptr {addr}, i32 0, i32 {index}"
        ));
        field
    }

    /// Store `value` in a fresh stack slot.
    pub(crate) fn spill(&mut self, value: &Value) -> Place {
        let addr = self.alloca(&value.ir);
        self.store(value, &addr);
        Place {
            addr,
            ty: value.ty.clone(),
        }
    }

    /// Emit `call`. Returns the result temporary, or `None` for void calls.
    pub(crate) fn emit_call(
        &mut self,
        ret: &IrType,
        callee: &str,
        args: &[(IrType, String)],
    ) -> Option<String> {
        let mut arg_list = String::new();
        for (i, (ir, repr)) in args.iter().enumerate() {
            if i > 0 {
                arg_list.push_str(", ");
            }
            let _ = write!(arg_list, "{ir} {repr}");
        }
        if ret.is_void() {
            self.emit(format!("call void {callee}({arg_list})"));
            None
        } else {
            let result = self.fresh();
            self.emit(format!("{result} = call {ret} {callee}({arg_list})"));
            Some(result)
        }
    }

    /// Wrap a call result as a value of `ty`.
    pub(crate) fn call_value(&mut self, result: Option<String>, ret: IrType, ty: Type) -> Value {
        match result {
            Some(repr) => Value::new(repr, ret, ty),
            None => Value::unit(),
        }
    }

    /// Semantic type of `expr` without lowering it, when it is evident.
    pub(crate) fn static_type(&self, expr: &Expr) -> Option<Type> {
        if let Some(ty) = &expr.ty {
            return Some(self.subst(ty));
        }
        match &expr.kind {
            ExprKind::Lit(Literal::Int(_)) => Some(Type::I32),
            ExprKind::Lit(Literal::Float(_)) => Some(Type::F64),
            ExprKind::Lit(Literal::Bool(_)) => Some(Type::BOOL),
            ExprKind::Lit(Literal::Str(_)) => Some(Type::STR),
            ExprKind::Lit(Literal::Unit) => Some(Type::UNIT),
            ExprKind::Ident(name) => self.scope.lookup(name).map(|l| l.ty.clone()),
            ExprKind::FuncRef(name) => self.cx.env.function(name).map(FunctionDef::fn_type),
            ExprKind::StructLit { path, .. } if path.generics.is_empty() => {
                let name = path.joined();
                let env = self.cx.env;
                let generics = env
                    .struct_def(&name)
                    .map(|d| &d.generics)
                    .or_else(|| env.class_def(&name).map(|d| &d.generics))?;
                generics
                    .is_empty()
                    .then(|| Type::named(path.last().unwrap_or_default(), Vec::new()))
            }
            ExprKind::Block(block) => block.tail.as_deref().and_then(|t| self.static_type(t)),
            _ => None,
        }
    }

    pub(crate) fn error(&mut self, code: ErrorCode, span: Span, message: String, label: &str) {
        self.cx
            .report(Diagnostic::error(code).with_message(message).with_label(span, label));
    }

    // -----------------------------------------------------------------------
    // Main dispatch
    // -----------------------------------------------------------------------

    /// Lower `expr`. `expected` is the type the context wants, used to bind
    /// generic parameters and to coerce into `dyn` values.
    pub fn lower_expr(&mut self, expr: &Expr, expected: Option<&Type>) -> Value {
        ensure_sufficient_stack(|| self.lower_expr_inner(expr, expected))
    }

    fn lower_expr_inner(&mut self, expr: &Expr, expected: Option<&Type>) -> Value {
        let value = match &expr.kind {
            ExprKind::Lit(lit) => self.lower_literal(lit, expr, expected),
            ExprKind::Ident(name) => self.lower_ident(name, expr, expected),
            ExprKind::Path(path) => self.lower_path_value(path, expr, expected),
            ExprKind::Call { callee, args } => self.lower_call(expr, callee, args, expected),
            ExprKind::MethodCall {
                receiver,
                method,
                args,
            } => self.lower_method_call(expr, receiver, method, args),
            ExprKind::Field { object, field } => self.lower_field_read(expr, object, field),
            ExprKind::StructLit { path, fields, base } => {
                self.lower_struct_literal(expr, path, fields, base.as_deref(), expected)
            }
            ExprKind::FuncRef(name) => self.lower_func_ref(name, expr, expected),
            ExprKind::Closure { func, captures } => self.lower_closure(func, captures, expr),
            ExprKind::Block(block) => self.lower_block(block, expected),
        };
        match expected {
            Some(Type::DynBehavior { name, args }) if !matches!(value.ty, Type::DynBehavior { .. }) => {
                self.coerce_to_dyn(value, name, args)
            }
            _ => value,
        }
    }

    pub(crate) fn lower_block(&mut self, block: &Block, expected: Option<&Type>) -> Value {
        for stmt in &block.stmts {
            self.lower_stmt(stmt);
        }
        match &block.tail {
            Some(tail) => self.lower_expr(tail, expected),
            None => Value::unit(),
        }
    }

    fn lower_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Let { name, ty, init, .. } => {
                let declared = ty.as_ref().map(|t| self.subst(t));
                let value = self.lower_expr(init, declared.as_ref());
                let (ty, ir) = match declared {
                    Some(ty) => {
                        let ir = self.cx.ir_type(&ty);
                        (ty, ir)
                    }
                    None => (value.ty.clone(), value.ir.clone()),
                };
                let addr = self.alloca(&ir);
                self.emit(format!("store {ir} {}, ptr {addr}", value.repr));
                self.scope.bind(name.clone(), Local {
                    storage: Storage::Slot { addr },
                    ty,
                    ir,
                    conv: value.conv,
                });
            }
            Stmt::Assign {
                target,
                value,
                span,
            } => self.lower_assign(target, value, *span),
            Stmt::Expr(expr) => {
                self.lower_expr(expr, None);
            }
            Stmt::Return(value, _) => {
                let ret_ty = self.ret_ty.clone();
                let result = match value {
                    Some(value) => self.lower_expr(value, Some(&ret_ty)),
                    None => Value::unit(),
                };
                self.emit_return(&result);
                // Anything after a return lands in its own unreachable block.
                self.start_dead_block();
            }
        }
    }

    fn lower_assign(&mut self, target: &Expr, value: &Expr, span: Span) {
        let place = match &target.kind {
            ExprKind::Ident(name) => match self.scope.lookup(name).cloned() {
                Some(Local {
                    storage: Storage::Slot { addr },
                    ty,
                    ..
                }) => Some((Place { addr, ty }, Some(name.as_str()))),
                Some(Local {
                    storage: Storage::Direct { .. },
                    ..
                }) => {
                    self.error(
                        ErrorCode::E5002,
                        span,
                        format!("cannot assign to `{name}`"),
                        "not assignable",
                    );
                    None
                }
                None => {
                    self.error(
                        ErrorCode::E5011,
                        target.span,
                        format!("unknown local `{name}`"),
                        "not found in this scope",
                    );
                    None
                }
            },
            ExprKind::Field { object, field } => self
                .field_place(object, field, target.span)
                .map(|p| (p, None)),
            _ => {
                self.error(
                    ErrorCode::E5002,
                    span,
                    "invalid assignment target".to_string(),
                    "cannot assign to this expression",
                );
                None
            }
        };
        let Some((place, local)) = place else {
            self.lower_expr(value, None);
            return;
        };
        let result = self.lower_expr(value, Some(&place.ty));
        let ir = self.cx.ir_type(&place.ty);
        self.emit(format!("store {ir} {}, ptr {}", result.repr, place.addr));
        if let Some(name) = local {
            self.scope.merge_conv(name, result.conv);
        }
    }

    /// Address of `expr`: locals and fields in place, anything else spilled.
    pub(crate) fn lower_place(&mut self, expr: &Expr) -> Option<Place> {
        match &expr.kind {
            ExprKind::Ident(name) => {
                if let Some(local) = self.scope.lookup(name) {
                    let local = local.clone();
                    return Some(match local.storage {
                        Storage::Slot { addr } => Place { addr, ty: local.ty },
                        Storage::Direct { value } => {
                            self.spill(&Value::new(value, local.ir, local.ty))
                        }
                    });
                }
                let value = self.lower_expr(expr, None);
                Some(self.spill(&value))
            }
            ExprKind::Field { object, field } => self.field_place(object, field, expr.span),
            _ => {
                let value = self.lower_expr(expr, None);
                Some(self.spill(&value))
            }
        }
    }
}
