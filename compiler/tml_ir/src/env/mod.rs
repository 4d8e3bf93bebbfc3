//! Symbol environment: the local module plus imported modules.
//!
//! Lookups accept bare names (`Maybe`) or qualified names (`std::Maybe`).
//! Bare names search the local module first, then imports in the order they
//! were added, so resolution is deterministic.

use rustc_hash::FxHashMap;

use crate::defs::Named;
use crate::{BehaviorDef, ClassDef, EnumDef, FunctionDef, ImplDef, StructDef};

/// Insertion-ordered table with a name index.
#[derive(Clone, Debug)]
pub struct Table<T> {
    items: Vec<T>,
    index: FxHashMap<String, usize>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Table {
            items: Vec::new(),
            index: FxHashMap::default(),
        }
    }
}

impl<T: Named> Table<T> {
    /// Insert `item`, replacing any earlier item with the same name.
    pub fn insert(&mut self, item: T) {
        let name = item.name().to_string();
        if let Some(&idx) = self.index.get(&name) {
            self.items[idx] = item;
        } else {
            self.index.insert(name, self.items.len());
            self.items.push(item);
        }
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.index.get(name).map(|&idx| &self.items[idx])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Definitions of one module.
#[derive(Clone, Debug, Default)]
pub struct Module {
    /// `::`-separated module path; empty for the root module.
    pub path: String,
    pub functions: Table<FunctionDef>,
    pub structs: Table<StructDef>,
    pub enums: Table<EnumDef>,
    pub classes: Table<ClassDef>,
    pub behaviors: Table<BehaviorDef>,
    pub impls: Vec<ImplDef>,
}

impl Module {
    pub fn new(path: impl Into<String>) -> Self {
        Module {
            path: path.into(),
            ..Module::default()
        }
    }

    #[must_use]
    pub fn with_function(mut self, def: FunctionDef) -> Self {
        self.functions.insert(def);
        self
    }

    #[must_use]
    pub fn with_struct(mut self, def: StructDef) -> Self {
        self.structs.insert(def);
        self
    }

    #[must_use]
    pub fn with_enum(mut self, def: EnumDef) -> Self {
        self.enums.insert(def);
        self
    }

    #[must_use]
    pub fn with_class(mut self, def: ClassDef) -> Self {
        self.classes.insert(def);
        self
    }

    #[must_use]
    pub fn with_behavior(mut self, def: BehaviorDef) -> Self {
        self.behaviors.insert(def);
        self
    }

    #[must_use]
    pub fn with_impl(mut self, def: ImplDef) -> Self {
        self.impls.push(def);
        self
    }

    /// Whether a qualifier such as `std::collections` or `collections`
    /// names this module.
    fn matches_qualifier(&self, qualifier: &str) -> bool {
        self.path == qualifier
            || self
                .path
                .strip_suffix(qualifier)
                .is_some_and(|prefix| prefix.ends_with("::"))
    }
}

/// Everything code generation can look up.
#[derive(Clone, Debug, Default)]
pub struct SymbolEnv {
    pub local: Module,
    pub imports: Vec<Module>,
}

fn split_qualified(name: &str) -> (Option<&str>, &str) {
    match name.rfind("::") {
        Some(pos) => (Some(&name[..pos]), &name[pos + 2..]),
        None => (None, name),
    }
}

impl SymbolEnv {
    pub fn new(local: Module) -> Self {
        SymbolEnv {
            local,
            imports: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_import(mut self, module: Module) -> Self {
        self.imports.push(module);
        self
    }

    /// Local module first, then imports in order.
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        std::iter::once(&self.local).chain(self.imports.iter())
    }

    fn lookup<'a, T: Named>(
        &'a self,
        name: &str,
        table: impl Fn(&'a Module) -> &'a Table<T>,
    ) -> Option<&'a T> {
        let (qualifier, bare) = split_qualified(name);
        match qualifier {
            Some(q) => self
                .modules()
                .filter(|m| m.matches_qualifier(q))
                .find_map(|m| table(m).get(bare)),
            None => self.modules().find_map(|m| table(m).get(bare)),
        }
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.lookup(name, |m| &m.functions)
    }

    pub fn struct_def(&self, name: &str) -> Option<&StructDef> {
        self.lookup(name, |m| &m.structs)
    }

    pub fn enum_def(&self, name: &str) -> Option<&EnumDef> {
        self.lookup(name, |m| &m.enums)
    }

    pub fn class_def(&self, name: &str) -> Option<&ClassDef> {
        self.lookup(name, |m| &m.classes)
    }

    pub fn behavior(&self, name: &str) -> Option<&BehaviorDef> {
        self.lookup(name, |m| &m.behaviors)
    }

    /// Enum declaring a variant called `variant`, for bare-identifier
    /// constructors such as `Just(5)`.
    pub fn enum_with_variant(&self, variant: &str) -> Option<(&EnumDef, usize)> {
        self.modules().find_map(|m| {
            m.enums
                .iter()
                .find_map(|e| e.variant_index(variant).map(|idx| (e, idx)))
        })
    }

    pub fn impls(&self) -> impl Iterator<Item = &ImplDef> {
        self.modules().flat_map(|m| m.impls.iter())
    }

    pub fn impl_of(&self, type_name: &str, behavior: &str) -> Option<&ImplDef> {
        self.impls()
            .find(|i| i.type_name() == Some(type_name) && i.behavior.as_deref() == Some(behavior))
    }

    /// Method `method` on `type_name`, inherent impls before behavior impls.
    pub fn impl_method(&self, type_name: &str, method: &str) -> Option<(&ImplDef, &FunctionDef)> {
        let find = |inherent: bool| {
            self.impls()
                .filter(|i| i.type_name() == Some(type_name) && i.behavior.is_none() == inherent)
                .find_map(|i| i.method(method).map(|m| (i, m)))
        };
        find(true).or_else(|| find(false))
    }

    /// `name` followed by its ancestors, nearest first. Stops on a cycle or an
    /// unknown base.
    pub fn class_chain(&self, name: &str) -> Vec<&ClassDef> {
        let mut chain: Vec<&ClassDef> = Vec::new();
        let mut current = self.class_def(name);
        while let Some(class) = current {
            if chain.iter().any(|c| c.name == class.name) {
                break;
            }
            chain.push(class);
            current = class.base.as_deref().and_then(|b| self.class_def(b));
        }
        chain
    }
}
