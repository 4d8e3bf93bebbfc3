//! Diagnostics for the TML code generator.
//!
//! Every diagnostic carries an [`ErrorCode`] for tooling, a message, and a
//! primary span. Codegen is fail-soft: an expression that cannot be lowered
//! reports a diagnostic and yields a placeholder, so one run reports as many
//! problems as possible.

mod diagnostic;
mod error_code;
pub mod queue;

pub use diagnostic::{Diagnostic, Label, Severity};
pub use error_code::ErrorCode;
pub use queue::{DiagnosticConfig, DiagnosticQueue};
