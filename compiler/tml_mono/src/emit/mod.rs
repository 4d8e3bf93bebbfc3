//! Text emission of the typed instruction stream.
//!
//! The [`Emitter`] owns the output buffers: identified type definitions,
//! globals (string constants, vtables), runtime declarations, and finished
//! function bodies. Lowering only ever appends through three primitives:
//! [`Emitter::fresh_temp`], [`Emitter::emit_line`] and
//! [`Emitter::emit_coverage`].

mod ir_type;

use std::fmt::Write;

use rustc_hash::{FxHashMap, FxHashSet};

pub use ir_type::IrType;

/// Runtime hook called on entry to every function when coverage is on.
pub const COVER_FUNC: &str = "@tml_cover_func";

#[derive(Debug, Default)]
pub struct Emitter {
    coverage: bool,
    temp_counter: u32,
    label_counter: u32,
    type_defs: Vec<String>,
    type_names: FxHashSet<String>,
    globals: Vec<String>,
    declarations: Vec<String>,
    declared: FxHashSet<String>,
    strings: FxHashMap<String, String>,
    coverage_names: FxHashMap<String, String>,
    functions: Vec<String>,
    body: String,
}

impl Emitter {
    pub fn new(coverage: bool) -> Self {
        Emitter {
            coverage,
            ..Self::default()
        }
    }

    /// Fresh SSA temporary, `%t<n>`.
    pub fn fresh_temp(&mut self) -> String {
        let n = self.temp_counter;
        self.temp_counter += 1;
        format!("%t{n}")
    }

    /// Fresh label number shared by a group of related labels.
    pub fn fresh_label_id(&mut self) -> u32 {
        let n = self.label_counter;
        self.label_counter += 1;
        n
    }

    pub fn fresh_label(&mut self, prefix: &str) -> String {
        format!("{prefix}{}", self.fresh_label_id())
    }

    /// Append one instruction to the current function.
    pub fn emit_line(&mut self, line: impl AsRef<str>) {
        self.body.push_str("  ");
        self.body.push_str(line.as_ref());
        self.body.push('\n');
    }

    pub fn emit_label(&mut self, label: &str) {
        self.body.push_str(label);
        self.body.push_str(":\n");
    }

    /// Record that `name` executed. No-op unless coverage is enabled.
    pub fn emit_coverage(&mut self, name: &str) {
        if !self.coverage {
            return;
        }
        self.declare(COVER_FUNC, &IrType::Void, &[IrType::Ptr]);
        let global = match self.coverage_names.get(name) {
            Some(global) => global.clone(),
            None => {
                let global = format!("@.cov.{}", self.coverage_names.len());
                self.add_global(format!(
                    "{global} = private unnamed_addr constant {}",
                    c_string(name)
                ));
                self.coverage_names.insert(name.to_string(), global.clone());
                global
            }
        };
        self.emit_line(format!("call void {COVER_FUNC}(ptr {global})"));
    }

    /// Define an identified type once. Returns `false` if it already exists.
    pub fn define_type(&mut self, name: &str, body: &IrType) -> bool {
        if !self.type_names.insert(name.to_string()) {
            return false;
        }
        self.type_defs.push(format!("{name} = type {body}"));
        true
    }

    pub fn add_global(&mut self, line: String) {
        self.globals.push(line);
    }

    /// Declare an external function once.
    pub fn declare(&mut self, symbol: &str, ret: &IrType, params: &[IrType]) {
        if !self.declared.insert(symbol.to_string()) {
            return;
        }
        let mut line = format!("declare {ret} {symbol}(");
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                line.push_str(", ");
            }
            let _ = write!(line, "{param}");
        }
        line.push(')');
        self.declarations.push(line);
    }

    /// Global constant holding `value` as a NUL-terminated byte string.
    pub fn string_literal(&mut self, value: &str) -> String {
        if let Some(global) = self.strings.get(value) {
            return global.clone();
        }
        let global = format!("@.str.{}", self.strings.len());
        self.add_global(format!(
            "{global} = private unnamed_addr constant {}",
            c_string(value)
        ));
        self.strings.insert(value.to_string(), global.clone());
        global
    }

    /// Start a function body after `header` (`define ... {`).
    pub fn begin_function(&mut self, header: &str) {
        self.body.clear();
        self.body.push_str(header);
        self.body.push_str("\nentry:\n");
    }

    pub fn end_function(&mut self) {
        self.body.push_str("}\n");
        self.functions.push(std::mem::take(&mut self.body));
    }

    /// Text of the function currently being emitted.
    pub fn current_body(&self) -> &str {
        &self.body
    }

    /// Assemble the module: types, globals, declarations, functions.
    pub fn finish(self) -> String {
        let mut out = String::new();
        for section in [&self.type_defs, &self.globals, &self.declarations] {
            if section.is_empty() {
                continue;
            }
            for line in section {
                out.push_str(line);
                out.push('\n');
            }
            out.push('\n');
        }
        for function in &self.functions {
            out.push_str(function);
            out.push('\n');
        }
        out
    }
}

/// `[N x i8] c"..."` with non-printable bytes hex-escaped.
fn c_string(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 8);
    for byte in value.bytes() {
        if (byte.is_ascii_graphic() && byte != b'"' && byte != b'\\') || byte == b' ' {
            escaped.push(char::from(byte));
        } else {
            let _ = write!(escaped, "\\{byte:02X}");
        }
    }
    format!("[{} x i8] c\"{escaped}\\00\"", value.len() + 1)
}
