//! Type unification and substitution for generic instantiation.
//!
//! Unification here is one-directional: a generic *pattern* (a declared
//! parameter type such as `Maybe[T]`) is matched against a *concrete* type
//! (an argument's inferred type such as `Maybe[I32]`), and every generic
//! name found in the pattern is bound to the concrete subtree at the same
//! position. There are no inference variables and no occurs check; types
//! coming out of the type checker are already consistent.
//!
//! # Binding precedence
//!
//! [`GenericBinder`] combines the sources a call site offers, per parameter,
//! highest first:
//!
//! 1. explicit type arguments (`identity[I64](x)`)
//! 2. unification against argument types
//! 3. the contextual expected type (let annotation, parameter, field, return)
//! 4. a fallback default
//!
//! Parameters that only the fallback could bind are listed in
//! [`Resolution::defaulted`] so callers can warn or reject.

use rustc_hash::FxHashMap;
use tml_ir::Type;

use crate::stack::ensure_sufficient_stack;

/// Generic parameter name to concrete type.
pub type Bindings = FxHashMap<String, Type>;

fn is_generic<S: AsRef<str>>(name: &str, generic_names: &[S]) -> bool {
    generic_names.iter().any(|g| g.as_ref() == name)
}

/// Bind generic names in `pattern` to the matching parts of `concrete`.
///
/// The first binding for a name wins; later conflicting matches are ignored.
/// Shapes that do not line up bind nothing.
pub fn unify<S: AsRef<str>>(
    pattern: &Type,
    concrete: &Type,
    generic_names: &[S],
    bindings: &mut Bindings,
) {
    ensure_sufficient_stack(|| unify_inner(pattern, concrete, generic_names, bindings));
}

fn unify_all<S: AsRef<str>>(
    patterns: &[Type],
    concretes: &[Type],
    generic_names: &[S],
    bindings: &mut Bindings,
) {
    if patterns.len() != concretes.len() {
        return;
    }
    for (p, c) in patterns.iter().zip(concretes) {
        unify(p, c, generic_names, bindings);
    }
}

fn unify_inner<S: AsRef<str>>(
    pattern: &Type,
    concrete: &Type,
    generic_names: &[S],
    bindings: &mut Bindings,
) {
    match (pattern, concrete) {
        (Type::Named { name, args, .. }, _) if args.is_empty() && is_generic(name, generic_names) => {
            bindings
                .entry(name.clone())
                .or_insert_with(|| concrete.clone());
        }
        (
            Type::Named {
                name: pn, args: pa, ..
            },
            Type::Named {
                name: cn, args: ca, ..
            },
        )
        | (
            Type::DynBehavior { name: pn, args: pa },
            Type::DynBehavior { name: cn, args: ca },
        ) if pn == cn => unify_all(pa, ca, generic_names, bindings),
        (Type::Ref { inner: p, .. }, Type::Ref { inner: c, .. })
        | (Type::Ptr(p), Type::Ptr(c))
        | (Type::Slice(p), Type::Slice(c))
        | (Type::Array { elem: p, .. }, Type::Array { elem: c, .. }) => {
            unify(p, c, generic_names, bindings);
        }
        // `ref T` parameter receiving a plain value binds through the reference.
        (Type::Ref { inner: p, .. }, _) => unify(p, concrete, generic_names, bindings),
        (
            Type::Func {
                params: pp,
                ret: pr,
            }
            | Type::Closure {
                params: pp,
                ret: pr,
            },
            Type::Func {
                params: cp,
                ret: cr,
            }
            | Type::Closure {
                params: cp,
                ret: cr,
            },
        ) => {
            unify_all(pp, cp, generic_names, bindings);
            unify(pr, cr, generic_names, bindings);
        }
        (Type::Tuple(p), Type::Tuple(c)) => unify_all(p, c, generic_names, bindings),
        _ => {}
    }
}

/// Replace bound generic names in `ty`. Unbound names are left as they are.
pub fn substitute(ty: &Type, bindings: &Bindings) -> Type {
    if bindings.is_empty() {
        return ty.clone();
    }
    ensure_sufficient_stack(|| substitute_inner(ty, bindings))
}

pub fn substitute_all(types: &[Type], bindings: &Bindings) -> Vec<Type> {
    types.iter().map(|t| substitute(t, bindings)).collect()
}

fn substitute_inner(ty: &Type, bindings: &Bindings) -> Type {
    match ty {
        Type::Primitive(_) | Type::Class(_) => ty.clone(),
        Type::Named { name, module, args } => {
            if args.is_empty() {
                if let Some(bound) = bindings.get(name) {
                    return bound.clone();
                }
            }
            Type::Named {
                name: name.clone(),
                module: module.clone(),
                args: substitute_all(args, bindings),
            }
        }
        Type::Ref { mutable, inner } => Type::Ref {
            mutable: *mutable,
            inner: Box::new(substitute(inner, bindings)),
        },
        Type::Ptr(inner) => Type::Ptr(Box::new(substitute(inner, bindings))),
        Type::Slice(inner) => Type::Slice(Box::new(substitute(inner, bindings))),
        Type::Array { elem, len } => Type::Array {
            elem: Box::new(substitute(elem, bindings)),
            len: *len,
        },
        Type::Func { params, ret } => Type::Func {
            params: substitute_all(params, bindings),
            ret: Box::new(substitute(ret, bindings)),
        },
        Type::Closure { params, ret } => Type::Closure {
            params: substitute_all(params, bindings),
            ret: Box::new(substitute(ret, bindings)),
        },
        Type::Tuple(elems) => Type::Tuple(substitute_all(elems, bindings)),
        Type::DynBehavior { name, args } => Type::DynBehavior {
            name: name.clone(),
            args: substitute_all(args, bindings),
        },
    }
}

/// Pair each generic name with its argument.
pub fn bindings_for(generics: &[String], args: &[Type]) -> Bindings {
    generics.iter().cloned().zip(args.iter().cloned()).collect()
}

/// Outcome of binding a generic item's parameters at one call site.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    /// Concrete argument per parameter, in declaration order.
    pub args: Vec<Type>,
    /// Parameters bound only by the fallback default.
    pub defaulted: Vec<String>,
}

/// Collects bindings from every source and resolves them by precedence.
#[derive(Debug)]
pub struct GenericBinder<'g> {
    generics: &'g [String],
    explicit: Bindings,
    inferred: Bindings,
    contextual: Bindings,
}

impl<'g> GenericBinder<'g> {
    pub fn new(generics: &'g [String]) -> Self {
        GenericBinder {
            generics,
            explicit: Bindings::default(),
            inferred: Bindings::default(),
            contextual: Bindings::default(),
        }
    }

    /// Explicit type arguments, positionally. Extra arguments are ignored.
    pub fn explicit(&mut self, args: &[Type]) -> &mut Self {
        for (name, arg) in self.generics.iter().zip(args) {
            self.explicit.insert(name.clone(), arg.clone());
        }
        self
    }

    /// Unify a declared parameter type with an argument's inferred type.
    pub fn infer(&mut self, pattern: &Type, concrete: &Type) -> &mut Self {
        unify(pattern, concrete, self.generics, &mut self.inferred);
        self
    }

    /// Unify the item's result type with the type the context expects.
    pub fn expect(&mut self, pattern: &Type, expected: &Type) -> &mut Self {
        unify(pattern, expected, self.generics, &mut self.contextual);
        self
    }

    /// Whether every parameter is bound without the fallback.
    pub fn is_complete(&self) -> bool {
        self.generics.iter().all(|g| self.lookup(g).is_some())
    }

    fn lookup(&self, name: &str) -> Option<&Type> {
        self.explicit
            .get(name)
            .or_else(|| self.inferred.get(name))
            .or_else(|| self.contextual.get(name))
    }

    pub fn resolve(&self, fallback: &Type) -> Resolution {
        let mut defaulted = Vec::new();
        let args = self
            .generics
            .iter()
            .map(|name| {
                self.lookup(name).cloned().unwrap_or_else(|| {
                    defaulted.push(name.clone());
                    fallback.clone()
                })
            })
            .collect();
        Resolution { args, defaulted }
    }
}

#[cfg(test)]
mod tests;
