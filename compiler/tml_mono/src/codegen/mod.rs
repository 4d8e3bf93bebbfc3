//! Lowering of a type-checked module to the instruction stream.
//!
//! [`ModuleCompiler`] drives the whole module. Each function body is
//! lowered by a `FnLowerer`, whose methods are split by concern:
//!
//! | File | Lowers |
//! |------|--------|
//! | `lower_literals.rs` | literals, identifiers, paths used as values |
//! | `lower_calls.rs` | call resolution stages and argument passing |
//! | `lower_primitives.rs` | `I64::max_value()` and numeric conversions |
//! | `lower_enums.rs` | tagged-union construction |
//! | `lower_intrinsics.rs` | builtin intrinsics, asserts, panics |
//! | `lower_classes.rs` | instances and constructors |
//! | `lower_structs.rs` | struct, union and class literals |
//! | `lower_fields.rs` | field addressing and auto-deref |
//! | `lower_methods.rs` | method calls |
//! | `lower_dyn.rs` | `dyn Behavior` values and dispatch |
//! | `lower_closures.rs` | function values and the thin/fat bridge |

mod context;
mod expr_lowerer;
mod lower_calls;
mod lower_classes;
mod lower_closures;
mod lower_dyn;
mod lower_enums;
mod lower_fields;
mod lower_intrinsics;
mod lower_literals;
mod lower_methods;
mod lower_primitives;
mod lower_structs;
mod module;
mod scope;

pub use module::{compile_module, CodegenOutput, ModuleCompiler};

#[cfg(test)]
mod tests;
