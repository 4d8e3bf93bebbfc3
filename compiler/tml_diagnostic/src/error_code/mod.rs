//! Error codes for code generation diagnostics.
//!
//! Format: `E5xxx` for codegen errors, `W5xxx` for codegen warnings, `E9xxx`
//! for internal compiler errors.

use std::fmt;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
pub enum ErrorCode {
    /// No call resolution strategy matched
    E5001,
    /// Callee expression shape is not callable
    E5002,
    /// Called field is not a function
    E5003,
    /// Missing required argument
    E5004,
    /// Unknown or missing struct field
    E5005,
    /// Unknown enum variant or type
    E5006,
    /// Generic parameter could not be inferred (strict mode)
    E5007,
    /// Method not declared by the behavior
    E5009,
    /// Union literal must initialize exactly one field
    E5010,
    /// Unknown identifier
    E5011,
    /// Unresolved method
    E5012,

    /// Generic parameter fell back to a default type
    W5001,
    /// Instantiation deferred with unbound type arguments
    W5002,

    /// Instantiation worklist did not converge
    E9001,
    /// Internal invariant violated during lowering
    E9002,
}

impl ErrorCode {
    /// Every code, for exhaustive tests and parsing.
    pub const ALL: &[ErrorCode] = &[
        ErrorCode::E5001,
        ErrorCode::E5002,
        ErrorCode::E5003,
        ErrorCode::E5004,
        ErrorCode::E5005,
        ErrorCode::E5006,
        ErrorCode::E5007,
        ErrorCode::E5009,
        ErrorCode::E5010,
        ErrorCode::E5011,
        ErrorCode::E5012,
        ErrorCode::W5001,
        ErrorCode::W5002,
        ErrorCode::E9001,
        ErrorCode::E9002,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E5001 => "E5001",
            ErrorCode::E5002 => "E5002",
            ErrorCode::E5003 => "E5003",
            ErrorCode::E5004 => "E5004",
            ErrorCode::E5005 => "E5005",
            ErrorCode::E5006 => "E5006",
            ErrorCode::E5007 => "E5007",
            ErrorCode::E5009 => "E5009",
            ErrorCode::E5010 => "E5010",
            ErrorCode::E5011 => "E5011",
            ErrorCode::E5012 => "E5012",
            ErrorCode::W5001 => "W5001",
            ErrorCode::W5002 => "W5002",
            ErrorCode::E9001 => "E9001",
            ErrorCode::E9002 => "E9002",
        }
    }

    pub fn is_codegen_error(&self) -> bool {
        self.as_str().starts_with("E5")
    }

    pub fn is_internal_error(&self) -> bool {
        matches!(self, ErrorCode::E9001 | ErrorCode::E9002)
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, ErrorCode::W5001 | ErrorCode::W5002)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive parse of `"E5001"`-style strings.
impl std::str::FromStr for ErrorCode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|code| code.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or(())
    }
}
