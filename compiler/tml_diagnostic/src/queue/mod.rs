//! Diagnostic queue: collects, deduplicates, limits and sorts diagnostics.

use rustc_hash::FxHashSet;

use crate::{Diagnostic, ErrorCode};

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct DiagnosticConfig {
    /// Maximum number of errors kept (0 = unlimited). Warnings are not counted.
    pub error_limit: usize,
    /// Drop diagnostics identical in code, primary span and message.
    pub deduplicate: bool,
}

impl Default for DiagnosticConfig {
    fn default() -> Self {
        DiagnosticConfig {
            error_limit: 0,
            deduplicate: true,
        }
    }
}

type DedupKey = (ErrorCode, u32, u32, String);

#[derive(Debug, Default)]
pub struct DiagnosticQueue {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    seen: FxHashSet<DedupKey>,
    config: DiagnosticConfig,
}

impl DiagnosticQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: DiagnosticConfig) -> Self {
        DiagnosticQueue {
            config,
            ..Self::default()
        }
    }

    /// Record `diag`. Returns `false` if it was dropped as a duplicate or
    /// because the error limit was reached.
    pub fn push(&mut self, diag: Diagnostic) -> bool {
        if diag.is_error() && self.limit_reached() {
            return false;
        }
        if self.config.deduplicate {
            let span = diag.primary_span();
            let key = (diag.code, span.start, span.end, diag.message.clone());
            if !self.seen.insert(key) {
                return false;
            }
        }
        if diag.is_error() {
            self.error_count += 1;
        }
        self.diagnostics.push(diag);
        true
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn limit_reached(&self) -> bool {
        self.config.error_limit > 0 && self.error_count >= self.config.error_limit
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Take all diagnostics, sorted by primary span start. Emission order is
    /// kept for diagnostics at the same position.
    pub fn flush(&mut self) -> Vec<Diagnostic> {
        let mut out = std::mem::take(&mut self.diagnostics);
        out.sort_by_key(|d| d.primary_span().start);
        self.seen.clear();
        self.error_count = 0;
        out
    }
}

#[cfg(test)]
mod tests;
