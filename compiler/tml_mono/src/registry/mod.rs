//! Instantiation registry: the monomorphization worklist.
//!
//! Every "this concrete version must exist" request goes through here. The
//! first request for a key mangles its name, records it, and queues a
//! [`WorkItem`]; later requests return the cached name. After the primary
//! lowering pass the driver drains the queue in rounds with
//! [`InstantiationRegistry::next_round`]. Generating one item may request
//! more (a `Box[Box[I32]]` needs `Box[I32]`), so rounds repeat until the
//! queue is empty or the round limit proves a cycle.

use std::collections::VecDeque;
use std::fmt;

use rustc_hash::FxHashSet;
use tml_ir::Type;

use crate::mangle::{mangle, unresolved_name};
use crate::MonoError;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InstKind {
    Struct,
    Enum,
    Class,
    Func,
    /// Static or instance method of a generic struct, enum or class.
    Method,
}

impl fmt::Display for InstKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InstKind::Struct => "struct",
            InstKind::Enum => "enum",
            InstKind::Class => "class",
            InstKind::Func => "func",
            InstKind::Method => "method",
        };
        f.write_str(name)
    }
}

/// Method part of a [`InstKind::Method`] key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodKey {
    pub name: String,
    pub args: Vec<Type>,
}

/// One queued instantiation. The semantic type arguments travel with the
/// mangled name, so nothing downstream has to parse names back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkItem {
    pub kind: InstKind,
    /// Generic item name; the owner's name for methods.
    pub base: String,
    /// Concrete type arguments; the owner's arguments for methods.
    pub args: Vec<Type>,
    pub method: Option<MethodKey>,
    pub mangled: String,
}

/// Mangled symbol of a method on a (possibly generic) owner.
pub fn method_symbol(owner: &str, owner_args: &[Type], method: &str, method_args: &[Type]) -> String {
    let mut name = mangle(owner, owner_args);
    name.push('_');
    name.push_str(&mangle(method, method_args));
    name
}

#[derive(Debug)]
pub struct InstantiationRegistry {
    generated: FxHashSet<(InstKind, String)>,
    queue: VecDeque<WorkItem>,
    processed: Vec<WorkItem>,
    deferred: Vec<WorkItem>,
    rounds: usize,
    max_rounds: usize,
}

impl InstantiationRegistry {
    pub fn new(max_rounds: usize) -> Self {
        InstantiationRegistry {
            generated: FxHashSet::default(),
            queue: VecDeque::new(),
            processed: Vec::new(),
            deferred: Vec::new(),
            rounds: 0,
            max_rounds,
        }
    }

    fn require(&mut self, item: WorkItem) -> String {
        let key = (item.kind, item.mangled.clone());
        if !self.generated.insert(key) {
            return item.mangled;
        }
        tracing::debug!(kind = %item.kind, name = %item.mangled, "queued instantiation");
        let mangled = item.mangled.clone();
        self.queue.push_back(item);
        mangled
    }

    fn require_simple(&mut self, kind: InstKind, base: &str, args: &[Type]) -> String {
        self.require(WorkItem {
            kind,
            base: base.to_string(),
            args: args.to_vec(),
            method: None,
            mangled: mangle(base, args),
        })
    }

    pub fn require_struct_instantiation(&mut self, base: &str, args: &[Type]) -> String {
        self.require_simple(InstKind::Struct, base, args)
    }

    pub fn require_enum_instantiation(&mut self, base: &str, args: &[Type]) -> String {
        self.require_simple(InstKind::Enum, base, args)
    }

    pub fn require_class_instantiation(&mut self, base: &str, args: &[Type]) -> String {
        self.require_simple(InstKind::Class, base, args)
    }

    pub fn require_func_instantiation(&mut self, base: &str, args: &[Type]) -> String {
        self.require_simple(InstKind::Func, base, args)
    }

    pub fn require_method_instantiation(
        &mut self,
        owner: &str,
        owner_args: &[Type],
        method: &str,
        method_args: &[Type],
    ) -> String {
        self.require(WorkItem {
            kind: InstKind::Method,
            base: owner.to_string(),
            args: owner_args.to_vec(),
            method: Some(MethodKey {
                name: method.to_string(),
                args: method_args.to_vec(),
            }),
            mangled: method_symbol(owner, owner_args, method, method_args),
        })
    }

    /// Record a request whose arguments still mention open generic
    /// parameters. Nothing is queued; the returned placeholder name lets the
    /// caller keep lowering.
    pub fn defer_unresolved(&mut self, kind: InstKind, base: &str, args: &[Type]) -> String {
        let mangled = unresolved_name(base);
        let already = self
            .deferred
            .iter()
            .any(|d| d.kind == kind && d.base == base && d.args == args);
        if !already {
            tracing::debug!(%kind, base, "deferred unresolved instantiation");
            self.deferred.push(WorkItem {
                kind,
                base: base.to_string(),
                args: args.to_vec(),
                method: None,
                mangled: mangled.clone(),
            });
        }
        mangled
    }

    pub fn is_generated(&self, kind: InstKind, mangled: &str) -> bool {
        self.generated.contains(&(kind, mangled.to_string()))
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Take the whole queue as the next round.
    ///
    /// Returns `Ok(None)` once the queue is empty. Fails when items remain
    /// after the round limit, which means generating them keeps requesting
    /// new ones.
    pub fn next_round(&mut self) -> Result<Option<Vec<WorkItem>>, MonoError> {
        if self.queue.is_empty() {
            return Ok(None);
        }
        if self.rounds >= self.max_rounds {
            let mut pending: Vec<String> = self.queue.iter().map(|w| w.mangled.clone()).collect();
            pending.sort();
            pending.dedup();
            return Err(MonoError::NonConvergent {
                rounds: self.rounds,
                pending,
            });
        }
        self.rounds += 1;
        let batch: Vec<WorkItem> = self.queue.drain(..).collect();
        tracing::debug!(round = self.rounds, items = batch.len(), "instantiation round");
        self.processed.extend(batch.iter().cloned());
        Ok(Some(batch))
    }

    /// Items handed out by [`Self::next_round`], in order.
    pub fn processed(&self) -> &[WorkItem] {
        &self.processed
    }

    pub fn deferred(&self) -> &[WorkItem] {
        &self.deferred
    }

    pub fn into_records(self) -> (Vec<WorkItem>, Vec<WorkItem>) {
        (self.processed, self.deferred)
    }
}

#[cfg(test)]
mod tests;
