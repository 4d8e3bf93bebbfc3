//! Builtin and runtime-library intrinsics.
//!
//! Intrinsics are grouped in families. A bare name (`sleep`) resolves to the
//! first family declaring it, in priority order:
//!
//! ```text
//! intrinsic > io > mem > atomic > sync > time > math > string > assert > async
//! ```
//!
//! A qualified name (`async::sleep`, `std::mem::alloc`) looks only in the
//! family named by its last qualifier segment. Most intrinsics are a single
//! call into a `declare`d runtime function; the rest expand inline.

use std::fmt;

use tml_diagnostic::ErrorCode;
use tml_ir::{Expr, Path, PrimitiveKind, Type};

use crate::emit::IrType;

use super::expr_lowerer::{FnLowerer, Value};

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum Family {
    Intrinsic,
    Io,
    Mem,
    Atomic,
    Sync,
    Time,
    Math,
    String,
    Assert,
    Async,
}

impl Family {
    pub const PRIORITY: [Family; 10] = [
        Family::Intrinsic,
        Family::Io,
        Family::Mem,
        Family::Atomic,
        Family::Sync,
        Family::Time,
        Family::Math,
        Family::String,
        Family::Assert,
        Family::Async,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Family::Intrinsic => "intrinsic",
            Family::Io => "io",
            Family::Mem => "mem",
            Family::Atomic => "atomic",
            Family::Sync => "sync",
            Family::Time => "time",
            Family::Math => "math",
            Family::String => "string",
            Family::Assert => "assert",
            Family::Async => "async",
        }
    }

    pub fn from_name(name: &str) -> Option<Family> {
        Self::PRIORITY.into_iter().find(|f| f.as_str() == name)
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime calling-convention type of an intrinsic parameter or result.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Abi {
    Bool,
    I32,
    I64,
    F64,
    Str,
    Ptr,
    Void,
}

impl Abi {
    fn ir(self) -> IrType {
        match self {
            Abi::Bool => IrType::I1,
            Abi::I32 => IrType::I32,
            Abi::I64 => IrType::I64,
            Abi::F64 => IrType::Double,
            Abi::Str | Abi::Ptr => IrType::Ptr,
            Abi::Void => IrType::Void,
        }
    }

    fn ty(self) -> Type {
        match self {
            Abi::Bool => Type::BOOL,
            Abi::I32 => Type::I32,
            Abi::I64 => Type::I64,
            Abi::F64 => Type::F64,
            Abi::Str => Type::STR,
            Abi::Ptr => Type::ptr(Type::Primitive(PrimitiveKind::U8)),
            Abi::Void => Type::UNIT,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Shape {
    /// One call to a runtime function.
    Runtime {
        symbol: &'static str,
        params: &'static [Abi],
        ret: Abi,
    },
    Unreachable,
    SizeOf,
    AlignOf,
    AtomicLoad,
    AtomicStore,
    /// `atomicrmw <op>`; returns the previous value.
    AtomicRmw(&'static str),
    Fence,
    Assert,
    AssertEq { negate: bool },
    Panic,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Intrinsic {
    pub family: Family,
    pub name: &'static str,
    pub shape: Shape,
}

const fn runtime(
    family: Family,
    name: &'static str,
    symbol: &'static str,
    params: &'static [Abi],
    ret: Abi,
) -> Intrinsic {
    Intrinsic {
        family,
        name,
        shape: Shape::Runtime {
            symbol,
            params,
            ret,
        },
    }
}

const fn special(family: Family, name: &'static str, shape: Shape) -> Intrinsic {
    Intrinsic {
        family,
        name,
        shape,
    }
}

/// Every intrinsic, grouped by family in priority order.
static INTRINSICS: &[Intrinsic] = &[
    special(Family::Intrinsic, "unreachable", Shape::Unreachable),
    special(Family::Intrinsic, "size_of", Shape::SizeOf),
    special(Family::Intrinsic, "align_of", Shape::AlignOf),
    runtime(Family::Io, "print", "@print", &[Abi::Str], Abi::Void),
    runtime(Family::Io, "println", "@println", &[Abi::Str], Abi::Void),
    runtime(Family::Io, "eprintln", "@eprintln", &[Abi::Str], Abi::Void),
    runtime(Family::Io, "print_i64", "@print_i64", &[Abi::I64], Abi::Void),
    runtime(Family::Io, "read_line", "@read_line", &[], Abi::Str),
    runtime(Family::Mem, "alloc", "@malloc", &[Abi::I64], Abi::Ptr),
    runtime(Family::Mem, "dealloc", "@free", &[Abi::Ptr], Abi::Void),
    runtime(Family::Mem, "mem_copy", "@mem_copy", &[Abi::Ptr, Abi::Ptr, Abi::I64], Abi::Void),
    runtime(Family::Mem, "mem_set", "@mem_set", &[Abi::Ptr, Abi::I32, Abi::I64], Abi::Void),
    runtime(Family::Mem, "mem_eq", "@mem_eq", &[Abi::Ptr, Abi::Ptr, Abi::I64], Abi::Bool),
    special(Family::Atomic, "atomic_load", Shape::AtomicLoad),
    special(Family::Atomic, "atomic_store", Shape::AtomicStore),
    special(Family::Atomic, "atomic_add", Shape::AtomicRmw("add")),
    special(Family::Atomic, "atomic_sub", Shape::AtomicRmw("sub")),
    special(Family::Atomic, "atomic_exchange", Shape::AtomicRmw("xchg")),
    special(Family::Atomic, "atomic_and", Shape::AtomicRmw("and")),
    special(Family::Atomic, "atomic_or", Shape::AtomicRmw("or")),
    special(Family::Atomic, "fence", Shape::Fence),
    runtime(Family::Sync, "mutex_create", "@mutex_create", &[], Abi::Ptr),
    runtime(Family::Sync, "mutex_lock", "@mutex_lock", &[Abi::Ptr], Abi::Void),
    runtime(Family::Sync, "mutex_unlock", "@mutex_unlock", &[Abi::Ptr], Abi::Void),
    runtime(Family::Sync, "mutex_destroy", "@mutex_destroy", &[Abi::Ptr], Abi::Void),
    runtime(Family::Sync, "thread_yield", "@thread_yield", &[], Abi::Void),
    runtime(Family::Time, "time_ms", "@time_ms", &[], Abi::I64),
    runtime(Family::Time, "time_ns", "@time_ns", &[], Abi::I64),
    runtime(Family::Time, "sleep", "@sleep_ms", &[Abi::I64], Abi::Void),
    runtime(Family::Math, "sqrt", "@llvm.sqrt.f64", &[Abi::F64], Abi::F64),
    runtime(Family::Math, "pow", "@llvm.pow.f64", &[Abi::F64, Abi::F64], Abi::F64),
    runtime(Family::Math, "fabs", "@llvm.fabs.f64", &[Abi::F64], Abi::F64),
    runtime(Family::Math, "floor", "@llvm.floor.f64", &[Abi::F64], Abi::F64),
    runtime(Family::Math, "ceil", "@llvm.ceil.f64", &[Abi::F64], Abi::F64),
    runtime(Family::Math, "sin", "@llvm.sin.f64", &[Abi::F64], Abi::F64),
    runtime(Family::Math, "cos", "@llvm.cos.f64", &[Abi::F64], Abi::F64),
    runtime(Family::String, "str_len", "@str_len", &[Abi::Str], Abi::I64),
    runtime(Family::String, "str_eq", "@str_eq", &[Abi::Str, Abi::Str], Abi::Bool),
    runtime(Family::String, "str_concat", "@str_concat", &[Abi::Str, Abi::Str], Abi::Str),
    runtime(Family::String, "str_hash", "@str_hash", &[Abi::Str], Abi::I64),
    runtime(Family::String, "i64_to_str", "@i64_to_str", &[Abi::I64], Abi::Str),
    special(Family::Assert, "assert", Shape::Assert),
    special(Family::Assert, "assert_eq", Shape::AssertEq { negate: false }),
    special(Family::Assert, "assert_ne", Shape::AssertEq { negate: true }),
    special(Family::Assert, "panic", Shape::Panic),
    runtime(Family::Async, "sleep", "@async_sleep", &[Abi::I64], Abi::Void),
    runtime(Family::Async, "yield_now", "@async_yield", &[], Abi::Void),
    runtime(Family::Async, "block_on", "@async_block_on", &[Abi::Ptr], Abi::Ptr),
];

/// Intrinsic named by `path`, honoring family priority.
pub(crate) fn lookup_intrinsic(path: &Path) -> Option<&'static Intrinsic> {
    let name = path.last()?;
    let family = match path.segments.len() {
        0 | 1 => None,
        n => Some(Family::from_name(&path.segments[n - 2])?),
    };
    INTRINSICS
        .iter()
        .filter(|i| family.is_none_or(|f| i.family == f))
        .find(|i| i.name == name)
}

const PANIC: &str = "@panic";

// ---------------------------------------------------------------------------
// Lowering
// ---------------------------------------------------------------------------

impl FnLowerer<'_, '_> {
    /// Stage 3 of call resolution.
    pub(crate) fn try_intrinsic(&mut self, path: &Path, args: &[Expr], expr: &Expr) -> Option<Value> {
        let intrinsic = lookup_intrinsic(path)?;
        tracing::trace!(family = %intrinsic.family, name = intrinsic.name, "intrinsic call");
        Some(match intrinsic.shape {
            Shape::Runtime {
                symbol,
                params,
                ret,
            } => self.lower_runtime_intrinsic(intrinsic.name, symbol, params, ret, args, expr),
            Shape::Unreachable => {
                self.emit("unreachable");
                self.start_dead_block();
                Value::unit()
            }
            Shape::SizeOf | Shape::AlignOf => {
                let Some(ty) = self.intrinsic_type_arg(path, intrinsic.name, expr) else {
                    return Some(Value::placeholder(IrType::I64, Type::I64));
                };
                let layout = self.cx.layouts.size_align(&ty);
                let n = if intrinsic.shape == Shape::SizeOf {
                    layout.size
                } else {
                    layout.align
                };
                Value::new(n.to_string(), IrType::I64, Type::I64)
            }
            Shape::AtomicLoad => self.lower_atomic(path, args, expr, None),
            Shape::AtomicStore => self.lower_atomic(path, args, expr, Some("store")),
            Shape::AtomicRmw(op) => self.lower_atomic(path, args, expr, Some(op)),
            Shape::Fence => {
                self.emit("fence seq_cst");
                Value::unit()
            }
            Shape::Assert => self.lower_assert(args, expr),
            Shape::AssertEq { negate } => self.lower_assert_eq(args, expr, negate),
            Shape::Panic => {
                let message = match args.first() {
                    Some(arg) => self.lower_expr(arg, Some(&Type::STR)).repr,
                    None => self.cx.emitter.string_literal("explicit panic"),
                };
                self.emit_panic(&message);
                Value::unit()
            }
        })
    }

    fn lower_runtime_intrinsic(
        &mut self,
        name: &str,
        symbol: &str,
        params: &[Abi],
        ret: Abi,
        args: &[Expr],
        expr: &Expr,
    ) -> Value {
        let param_tys: Vec<Type> = params.iter().map(|p| p.ty()).collect();
        let param_irs: Vec<IrType> = params.iter().map(|p| p.ir()).collect();
        let ret_ty = expr
            .ty
            .as_ref()
            .map(|t| self.subst(t))
            .filter(|t| ret != Abi::Void && self.cx.ir_type(t) == ret.ir())
            .unwrap_or_else(|| ret.ty());
        if !self.check_arity(name, params.len(), args, expr) {
            return Value::placeholder(ret.ir(), ret_ty);
        }
        let lowered = self.lower_args(&param_tys, args, Vec::new());
        self.cx.declare_runtime(symbol, &ret.ir(), &param_irs);
        let result = self.emit_call(&ret.ir(), symbol, &lowered);
        self.call_value(result, ret.ir(), ret_ty)
    }

    /// `T` of `size_of[T]()`.
    fn intrinsic_type_arg(&mut self, path: &Path, name: &str, expr: &Expr) -> Option<Type> {
        if let Some(ty) = path.generics.first() {
            return Some(self.subst(ty));
        }
        self.error(
            ErrorCode::E5004,
            expr.span,
            format!("`{name}` needs a type argument"),
            "write the type as `name[T]()`",
        );
        None
    }

    /// `atomic_load(p)`, `atomic_store(p, v)` and `atomicrmw` forms. The
    /// element type comes from an explicit type argument, then from the
    /// value operand, then defaults to `I32`.
    fn lower_atomic(&mut self, path: &Path, args: &[Expr], expr: &Expr, op: Option<&str>) -> Value {
        let arity = if op.is_some() { 2 } else { 1 };
        if !self.check_arity(path.last().unwrap_or_default(), arity, args, expr) {
            return Value::placeholder(IrType::I32, Type::I32);
        }
        let elem = path
            .generics
            .first()
            .map(|t| self.subst(t))
            .or_else(|| args.get(1).and_then(|a| self.static_type(a)))
            .unwrap_or(Type::I32);
        let ir = self.cx.ir_type(&elem);
        let align = self.cx.layouts.size_align(&elem).align;
        let ptr = self.lower_expr(&args[0], None);

        match op {
            None => {
                let result = self.fresh();
                self.emit(format!(
                    "{result} = load atomic {ir}, ptr {} seq_cst, align {align}",
                    ptr.repr
                ));
                Value::new(result, ir, elem)
            }
            Some(op) => {
                let value = self.lower_expr(&args[1], Some(&elem));
                let value = self.convert_to(value, &elem, &ir);
                if op == "store" {
                    self.emit(format!(
                        "store atomic {ir} {}, ptr {} seq_cst, align {align}",
                        value.repr, ptr.repr
                    ));
                    return Value::unit();
                }
                let result = self.fresh();
                self.emit(format!(
                    "{result} = atomicrmw {op} ptr {}, {ir} {} seq_cst, align {align}",
                    ptr.repr, value.repr
                ));
                Value::new(result, ir, elem)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Assertions
    // -----------------------------------------------------------------------

    fn lower_assert(&mut self, args: &[Expr], expr: &Expr) -> Value {
        let Some(cond) = args.first() else {
            self.check_arity("assert", 1, args, expr);
            return Value::unit();
        };
        let cond = self.lower_expr(cond, Some(&Type::BOOL));
        let message = self.assert_message(args.get(1), "assertion failed");
        self.branch_on_assert(&cond.repr, &message);
        Value::unit()
    }

    fn lower_assert_eq(&mut self, args: &[Expr], expr: &Expr, negate: bool) -> Value {
        let name = if negate { "assert_ne" } else { "assert_eq" };
        let [left, right, rest @ ..] = args else {
            self.check_arity(name, 2, args, expr);
            return Value::unit();
        };
        let left = self.lower_expr(left, None);
        let right = self.lower_expr(right, Some(&left.ty));
        let right = self.convert_to(right, &left.ty, &left.ir);
        let equal = self.emit_equality(&left, &right);
        let cond = if negate {
            let flipped = self.fresh();
            self.emit(format!("{flipped} = xor i1 {equal}, true"));
            flipped
        } else {
            equal
        };
        let default = if negate {
            "assertion failed: values are equal"
        } else {
            "assertion failed: values differ"
        };
        let message = self.assert_message(rest.first(), default);
        self.branch_on_assert(&cond, &message);
        Value::unit()
    }

    /// `i1` that is true when `left == right`.
    fn emit_equality(&mut self, left: &Value, right: &Value) -> String {
        let result = self.fresh();
        match left.ty.as_primitive() {
            Some(PrimitiveKind::Str) => {
                self.cx
                    .declare_runtime("@str_eq", &IrType::I1, &[IrType::Ptr, IrType::Ptr]);
                self.emit(format!(
                    "{result} = call i1 @str_eq(ptr {}, ptr {})",
                    left.repr, right.repr
                ));
            }
            Some(kind) if kind.is_float() => {
                self.emit(format!(
                    "{result} = fcmp oeq {} {}, {}",
                    left.ir, left.repr, right.repr
                ));
            }
            _ if !left.ir.is_aggregate() => {
                self.emit(format!(
                    "{result} = icmp eq {} {}, {}",
                    left.ir, left.repr, right.repr
                ));
            }
            _ => {
                let size = self.cx.layouts.size_of(&left.ty);
                let a = self.spill(left);
                let b = self.spill(right);
                self.cx.declare_runtime(
                    "@mem_eq",
                    &IrType::I1,
                    &[IrType::Ptr, IrType::Ptr, IrType::I64],
                );
                self.emit(format!(
                    "{result} = call i1 @mem_eq(ptr {}, ptr {}, i64 {size})",
                    a.addr, b.addr
                ));
            }
        }
        result
    }

    fn assert_message(&mut self, arg: Option<&Expr>, default: &str) -> String {
        match arg {
            Some(arg) => self.lower_expr(arg, Some(&Type::STR)).repr,
            None => self.cx.emitter.string_literal(default),
        }
    }

    fn branch_on_assert(&mut self, cond: &str, message: &str) {
        let id = self.cx.emitter.fresh_label_id();
        let ok = format!("assert_ok{id}");
        let fail = format!("assert_fail{id}");
        self.emit(format!("br i1 {cond}, label %{ok}, label %{fail}"));
        self.cx.emitter.emit_label(&fail);
        self.emit_panic_call(message);
        self.emit("unreachable");
        self.cx.emitter.emit_label(&ok);
    }

    fn emit_panic_call(&mut self, message: &str) {
        self.cx.declare_runtime(PANIC, &IrType::Void, &[IrType::Ptr]);
        self.emit(format!("call void {PANIC}(ptr {message})"));
    }

    fn emit_panic(&mut self, message: &str) {
        self.emit_panic_call(message);
        self.emit("unreachable");
        self.start_dead_block();
    }

    /// Open a block for code following a terminator.
    pub(crate) fn start_dead_block(&mut self) {
        let dead = self.cx.emitter.fresh_label("dead");
        self.cx.emitter.emit_label(&dead);
    }
}
