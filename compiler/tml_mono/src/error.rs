//! Internal errors that abort code generation.
//!
//! Everything recoverable is a [`Diagnostic`] in the output; a `MonoError`
//! means the module cannot be monomorphized at all.

use tml_diagnostic::{Diagnostic, ErrorCode};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MonoError {
    /// The instantiation worklist kept growing past the round limit, which
    /// happens when a generic item instantiates itself with ever larger
    /// type arguments.
    #[error(
        "instantiation worklist did not converge after {rounds} rounds; pending: {}",
        .pending.join(", ")
    )]
    NonConvergent { rounds: usize, pending: Vec<String> },
}

impl MonoError {
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            MonoError::NonConvergent { pending, .. } => Diagnostic::error(ErrorCode::E9001)
                .with_message(self.to_string())
                .with_note(format!(
                    "{} instantiation(s) still pending; look for a generic item that calls itself with a larger type",
                    pending.len()
                )),
        }
    }
}
