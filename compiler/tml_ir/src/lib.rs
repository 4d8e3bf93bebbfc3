//! TML IR - resolved program representation for code generation.
//!
//! This crate holds the inputs of the monomorphization layer:
//! - [`Span`] source locations
//! - [`Type`] semantic types produced by the type checker
//! - the resolved expression tree ([`Expr`], [`Stmt`], [`Block`])
//! - item definitions ([`FunctionDef`], [`StructDef`], [`EnumDef`],
//!   [`ClassDef`], [`BehaviorDef`], [`ImplDef`])
//! - [`SymbolEnv`], the queryable environment over the local and imported
//!   modules
//!
//! # Design
//!
//! Everything here is plain owned data. The type checker builds it once and
//! code generation only reads it, so there is no interning or arena.

mod ast;
mod defs;
mod env;
mod span;
mod ty;

pub use ast::{Block, Expr, ExprKind, FieldInit, Literal, Path, Stmt};
pub use defs::{
    BehaviorDef, ClassDef, ClassFlags, EnumDef, FieldDef, FnFlags, FunctionDef, ImplDef,
    MethodSig, Named, Param, StructDef, VariantDef,
};
pub use env::{Module, SymbolEnv, Table};
pub use span::Span;
pub use ty::{PrimitiveKind, Type};
