//! Local bindings of the function being lowered.
//!
//! Every binding lives in memory: parameters and `let`s are spilled to an
//! `alloca` slot on entry, so assignment is a plain store and field access
//! can always start from an address.

use rustc_hash::FxHashMap;
use tml_ir::Type;

use crate::emit::IrType;

/// How a function-typed binding must be called.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CallConv {
    /// Always holds a plain function: call without the environment.
    Thin,
    /// Always holds a capturing closure: prepend the environment.
    Capturing,
    /// Could hold either; decide at runtime on a null environment.
    Unknown,
}

impl CallConv {
    /// Convention after another value with convention `other` is stored.
    #[must_use]
    pub fn join(self, other: CallConv) -> CallConv {
        if self == other {
            self
        } else {
            CallConv::Unknown
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Storage {
    /// `addr` points at the value.
    Slot { addr: String },
    /// The SSA value itself; used for the instance pointer of reference
    /// classes, which is never reassigned.
    Direct { value: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Local {
    pub storage: Storage,
    pub ty: Type,
    pub ir: IrType,
    pub conv: CallConv,
}

#[derive(Debug, Default)]
pub struct Scope {
    bindings: FxHashMap<String, Local>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, name: impl Into<String>, local: Local) {
        self.bindings.insert(name.into(), local);
    }

    pub fn lookup(&self, name: &str) -> Option<&Local> {
        self.bindings.get(name)
    }

    /// Record that a value with convention `conv` was stored into `name`.
    pub fn merge_conv(&mut self, name: &str, conv: CallConv) {
        if let Some(local) = self.bindings.get_mut(name) {
            local.conv = local.conv.join(conv);
        }
    }
}
