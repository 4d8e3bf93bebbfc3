//! Vtable slot ordering, shared by vtable emission and dynamic dispatch.
//!
//! A behavior's vtable lists one function pointer per method in the
//! behavior's declaration order; the dispatch side indexes the same order.
//! Both go through [`VtableRegistry::method_order`], which memoizes the order
//! per behavior name, so a vtable can never disagree with a call site.
//!
//! Class vtables list virtual methods root class first. An override keeps
//! the slot of the method it overrides.

use rustc_hash::{FxHashMap, FxHashSet};
use tml_ir::{FnFlags, SymbolEnv, Type};

use crate::mangle::{mangle, mangle_type};

/// Global holding the vtable of `self_ty` for `behavior[args]`.
pub fn behavior_vtable_global(self_ty: &Type, behavior: &str, args: &[Type]) -> String {
    format!("@vtable.{}.{}", mangle_type(self_ty), mangle(behavior, args))
}

/// Global holding the vtable of `class[args]`.
pub fn class_vtable_global(class: &str, args: &[Type]) -> String {
    format!("@vtable.{}", mangle(class, args))
}

/// One virtual method slot of a class vtable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassSlot {
    pub method: String,
    /// Class providing the implementation used by this vtable.
    pub owner: String,
}

/// A vtable that must be emitted before the module is finished.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VtableRequest {
    Behavior {
        self_ty: Type,
        behavior: String,
        args: Vec<Type>,
        global: String,
    },
    Class {
        class: String,
        args: Vec<Type>,
        global: String,
    },
}

#[derive(Debug, Default)]
pub struct VtableRegistry {
    method_orders: FxHashMap<String, Vec<String>>,
    class_slots: FxHashMap<String, Vec<ClassSlot>>,
    requested: FxHashSet<String>,
    pending: Vec<VtableRequest>,
}

impl VtableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Method names of `behavior` in slot order.
    pub fn method_order(&mut self, env: &SymbolEnv, behavior: &str) -> Option<&[String]> {
        if !self.method_orders.contains_key(behavior) {
            let def = env.behavior(behavior)?;
            let order = def.methods.iter().map(|m| m.name.clone()).collect();
            self.method_orders.insert(behavior.to_string(), order);
        }
        self.method_orders.get(behavior).map(Vec::as_slice)
    }

    pub fn slot_of(&mut self, env: &SymbolEnv, behavior: &str, method: &str) -> Option<usize> {
        self.method_order(env, behavior)?
            .iter()
            .position(|m| m == method)
    }

    /// Virtual slots of `class`, including inherited ones.
    pub fn class_slots(&mut self, env: &SymbolEnv, class: &str) -> &[ClassSlot] {
        if !self.class_slots.contains_key(class) {
            let mut slots: Vec<ClassSlot> = Vec::new();
            for def in env.class_chain(class).iter().rev() {
                for method in def.methods.iter().filter(|m| m.flags.contains(FnFlags::VIRTUAL)) {
                    match slots.iter_mut().find(|s| s.method == method.name) {
                        Some(slot) => slot.owner.clone_from(&def.name),
                        None => slots.push(ClassSlot {
                            method: method.name.clone(),
                            owner: def.name.clone(),
                        }),
                    }
                }
            }
            self.class_slots.insert(class.to_string(), slots);
        }
        self.class_slots.get(class).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn class_slot_of(&mut self, env: &SymbolEnv, class: &str, method: &str) -> Option<usize> {
        self.class_slots(env, class)
            .iter()
            .position(|s| s.method == method)
    }

    /// Name the vtable of `self_ty` for `behavior` and queue its emission.
    pub fn require_behavior_vtable(&mut self, self_ty: &Type, behavior: &str, args: &[Type]) -> String {
        let global = behavior_vtable_global(self_ty, behavior, args);
        if self.requested.insert(global.clone()) {
            tracing::debug!(%global, "queued behavior vtable");
            self.pending.push(VtableRequest::Behavior {
                self_ty: self_ty.clone(),
                behavior: behavior.to_string(),
                args: args.to_vec(),
                global: global.clone(),
            });
        }
        global
    }

    pub fn require_class_vtable(&mut self, class: &str, args: &[Type]) -> String {
        let global = class_vtable_global(class, args);
        if self.requested.insert(global.clone()) {
            tracing::debug!(%global, "queued class vtable");
            self.pending.push(VtableRequest::Class {
                class: class.to_string(),
                args: args.to_vec(),
                global: global.clone(),
            });
        }
        global
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn take_pending(&mut self) -> Vec<VtableRequest> {
        std::mem::take(&mut self.pending)
    }
}
