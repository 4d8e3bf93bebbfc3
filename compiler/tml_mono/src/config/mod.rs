//! Code generation configuration.
//!
//! Defaults suit normal compilation. [`CodegenConfig::from_env`] lets the
//! driver flip debugging switches without new command-line flags:
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `TML_MAX_INSTANTIATION_ROUNDS` | worklist round limit |
//! | `TML_STRICT_GENERICS` | uninferable type parameters are errors |
//! | `TML_COVERAGE` | emit function coverage markers |

/// Rounds after which a non-empty instantiation worklist is a cycle.
pub const MAX_INSTANTIATION_ROUNDS: usize = 100;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodegenConfig {
    pub max_instantiation_rounds: usize,
    /// Report a type parameter that only the fallback default could bind as
    /// an error instead of a warning.
    pub strict_generics: bool,
    /// Call `@tml_cover_func` on entry to every lowered function.
    pub coverage: bool,
    /// Prefix of every emitted function symbol.
    pub symbol_prefix: String,
    /// Maximum errors kept (0 = unlimited).
    pub error_limit: usize,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        CodegenConfig {
            max_instantiation_rounds: MAX_INSTANTIATION_ROUNDS,
            strict_generics: false,
            coverage: false,
            symbol_prefix: "tml_".to_string(),
            error_limit: 0,
        }
    }
}

impl CodegenConfig {
    /// Defaults overridden by `TML_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = CodegenConfig::default();
        if let Some(raw) = lookup("TML_MAX_INSTANTIATION_ROUNDS") {
            match raw.trim().parse::<usize>() {
                Ok(rounds) if rounds > 0 => config.max_instantiation_rounds = rounds,
                _ => tracing::warn!(value = %raw, "ignoring invalid TML_MAX_INSTANTIATION_ROUNDS"),
            }
        }
        if let Some(raw) = lookup("TML_STRICT_GENERICS") {
            config.strict_generics = is_truthy(&raw);
        }
        if let Some(raw) = lookup("TML_COVERAGE") {
            config.coverage = is_truthy(&raw);
        }
        config
    }

    #[must_use]
    pub fn with_strict_generics(mut self, strict: bool) -> Self {
        self.strict_generics = strict;
        self
    }

    #[must_use]
    pub fn with_coverage(mut self, coverage: bool) -> Self {
        self.coverage = coverage;
        self
    }

    #[must_use]
    pub fn with_max_instantiation_rounds(mut self, rounds: usize) -> Self {
        self.max_instantiation_rounds = rounds;
        self
    }
}

fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests;
