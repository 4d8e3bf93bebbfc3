//! Monomorphization and value representation for TML code generation.
//!
//! Given a type-checked module ([`tml_ir::SymbolEnv`]), this crate decides
//! which concrete versions of generic items must exist, names them, queues
//! them until a fixed point is reached, and lowers every call, constructor
//! and field access to a typed, text-based instruction stream.
//!
//! # Pieces
//!
//! - [`unify`]: pattern-against-concrete unification and substitution
//! - [`mangle`]: canonical instantiation names and their inverse
//! - [`registry`]: the instantiation worklist
//! - [`layout`]: sizes and alignments, smart-pointer wrappers
//! - [`vtable`]: slot ordering shared by vtable emission and dispatch
//! - [`emit`]: the output buffers
//! - [`codegen`]: expression lowering and the module driver
//!
//! # Debug Environment Variables
//!
//! - `RUST_LOG=tml_mono=debug`: instantiation, dispatch and vtable decisions
//!   (after [`init_tracing`]).
//! - `RUST_LOG=tml_mono=trace`: per-call resolution steps.
//! - `TML_MAX_INSTANTIATION_ROUNDS`, `TML_STRICT_GENERICS`, `TML_COVERAGE`:
//!   see [`CodegenConfig::from_env`].

#![allow(
    // Lowering threads expression parts, types and context through helpers
    clippy::too_many_arguments,
)]

pub mod codegen;
pub mod config;
pub mod emit;
mod error;
pub mod layout;
pub mod mangle;
pub mod registry;
pub mod stack;
pub mod unify;
pub mod vtable;

use std::sync::Once;

pub use codegen::{compile_module, CodegenOutput, ModuleCompiler};
pub use config::CodegenConfig;
pub use error::MonoError;
pub use mangle::{mangle, split_instantiation, unmangle};
pub use registry::{InstKind, InstantiationRegistry, WorkItem};
pub use unify::{substitute, unify, Bindings, GenericBinder};

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber filtered by `RUST_LOG`.
///
/// Does nothing unless `RUST_LOG` is set. Safe to call more than once.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}
