//! Name mangling for concrete instantiations.
//!
//! Mangled names are valid symbol fragments built from `__`-separated
//! tokens. The outermost type lists its arguments directly
//! (`Outcome__Str__I32`); a generic type that appears *inside* an argument
//! list carries an arity token first (`Maybe__List__1__I32`), so nested
//! argument lists never need brackets. Arity tokens start with a digit and
//! can never be mistaken for a type name.
//!
//! | Type | Mangled |
//! |------|---------|
//! | primitive | `I32`, `Str`, `Unit` |
//! | `List[I32]` | `List__I32` (nested: `List__1__I32`) |
//! | `Ptr[T]` | `ptr_T` |
//! | `ref T` / `mut ref T` | `ref_T` / `mutref_T` |
//! | `[T; 4]` | `arr4_T` |
//! | `[T]` | `slice_T` |
//! | `(A, B)` | `tuple__2__A__B` |
//! | `func(A) -> R` | `fn__1__A__R` |
//! | `do(A) -> R` | `closure__1__A__R` |
//! | `dyn Show` | `dyn_Show` |
//! | `class C` | `class_C` |
//!
//! Module qualifiers are not part of the name. Type names are assumed to be
//! identifiers that do not contain `__` and do not begin with one of the
//! lowercase prefixes above.

use std::fmt::Write;

use tml_ir::{PrimitiveKind, Type};

use crate::stack::ensure_sufficient_stack;

pub const SEPARATOR: &str = "__";

/// Suffix marking a request whose type arguments were not fully bound.
pub const UNRESOLVED_SUFFIX: &str = "UNRESOLVED";

const PTR_PREFIX: &str = "ptr_";
const REF_PREFIX: &str = "ref_";
const MUT_REF_PREFIX: &str = "mutref_";
const SLICE_PREFIX: &str = "slice_";
const DYN_PREFIX: &str = "dyn_";
const CLASS_PREFIX: &str = "class_";
const ARRAY_PREFIX: &str = "arr";
const TUPLE_HEAD: &str = "tuple";
const FN_HEAD: &str = "fn";
const CLOSURE_HEAD: &str = "closure";

/// `base` alone, or `base__A1__A2...` with each argument in nested form.
pub fn mangle(base: &str, args: &[Type]) -> String {
    let mut out = String::with_capacity(base.len() + args.len() * 8);
    out.push_str(base);
    for arg in args {
        out.push_str(SEPARATOR);
        write_type(&mut out, arg, true);
    }
    out
}

/// Mangled form of a whole type.
pub fn mangle_type(ty: &Type) -> String {
    let mut out = String::with_capacity(16);
    write_type(&mut out, ty, false);
    out
}

/// Placeholder name for an instantiation that cannot be named yet.
pub fn unresolved_name(base: &str) -> String {
    format!("{base}{SEPARATOR}{UNRESOLVED_SUFFIX}")
}

pub fn is_unresolved_name(name: &str) -> bool {
    name.ends_with(UNRESOLVED_SUFFIX)
        && name
            .strip_suffix(UNRESOLVED_SUFFIX)
            .is_some_and(|rest| rest.ends_with(SEPARATOR))
}

fn write_list(out: &mut String, items: &[Type]) {
    for item in items {
        out.push_str(SEPARATOR);
        write_type(out, item, true);
    }
}

fn write_type(out: &mut String, ty: &Type, nested: bool) {
    ensure_sufficient_stack(|| match ty {
        Type::Primitive(kind) => out.push_str(kind.name()),
        Type::Named { name, args, .. } => {
            out.push_str(name);
            if !args.is_empty() {
                if nested {
                    let _ = write!(out, "{SEPARATOR}{}", args.len());
                }
                write_list(out, args);
            }
        }
        Type::DynBehavior { name, args } => {
            out.push_str(DYN_PREFIX);
            out.push_str(name);
            if !args.is_empty() {
                let _ = write!(out, "{SEPARATOR}{}", args.len());
                write_list(out, args);
            }
        }
        Type::Ref { mutable, inner } => {
            out.push_str(if *mutable { MUT_REF_PREFIX } else { REF_PREFIX });
            write_type(out, inner, true);
        }
        Type::Ptr(inner) => {
            out.push_str(PTR_PREFIX);
            write_type(out, inner, true);
        }
        Type::Slice(inner) => {
            out.push_str(SLICE_PREFIX);
            write_type(out, inner, true);
        }
        Type::Array { elem, len } => {
            let _ = write!(out, "{ARRAY_PREFIX}{len}_");
            write_type(out, elem, true);
        }
        Type::Tuple(elems) => {
            let _ = write!(out, "{TUPLE_HEAD}{SEPARATOR}{}", elems.len());
            write_list(out, elems);
        }
        Type::Func { params, ret } | Type::Closure { params, ret } => {
            let head = if matches!(ty, Type::Func { .. }) {
                FN_HEAD
            } else {
                CLOSURE_HEAD
            };
            let _ = write!(out, "{head}{SEPARATOR}{}", params.len());
            write_list(out, params);
            out.push_str(SEPARATOR);
            write_type(out, ret, true);
        }
        Type::Class(name) => {
            out.push_str(CLASS_PREFIX);
            out.push_str(name);
        }
    });
}

/// Parse a name produced by [`mangle_type`].
pub fn unmangle(mangled: &str) -> Option<Type> {
    let mut parser = Parser::new(mangled);
    let ty = parser.parse_top()?;
    parser.at_end().then_some(ty)
}

/// Split a name produced by [`mangle`] into its base and type arguments.
pub fn split_instantiation(mangled: &str) -> Option<(String, Vec<Type>)> {
    let mut parser = Parser::new(mangled);
    let base = parser.next()?.to_string();
    let mut args = Vec::new();
    while !parser.at_end() {
        args.push(parser.parse_nested()?);
    }
    Some((base, args))
}

/// Recursive-descent parser over `__`-separated tokens.
struct Parser<'a> {
    tokens: Vec<&'a str>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Parser {
            tokens: input.split(SEPARATOR).collect(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn next(&mut self) -> Option<&'a str> {
        let token = self.tokens.get(self.pos).copied()?;
        self.pos += 1;
        Some(token)
    }

    fn peek_count(&self) -> Option<usize> {
        let token = self.tokens.get(self.pos)?;
        if token.bytes().next()?.is_ascii_digit() {
            token.parse().ok()
        } else {
            None
        }
    }

    fn next_count(&mut self) -> Option<usize> {
        let count = self.peek_count()?;
        self.pos += 1;
        Some(count)
    }

    fn parse_many(&mut self, count: usize) -> Option<Vec<Type>> {
        (0..count).map(|_| self.parse_nested()).collect()
    }

    /// Outermost type: a generic name takes all remaining tokens as arguments.
    fn parse_top(&mut self) -> Option<Type> {
        let head = self.next()?;
        if is_plain_name(head) && PrimitiveKind::from_name(head).is_none() {
            let mut args = Vec::new();
            while !self.at_end() {
                args.push(self.parse_nested()?);
            }
            return Some(Type::named(head, args));
        }
        self.parse_head(head)
    }

    fn parse_nested(&mut self) -> Option<Type> {
        let head = self.next()?;
        self.parse_head(head)
    }

    fn parse_head(&mut self, head: &'a str) -> Option<Type> {
        ensure_sufficient_stack(|| self.parse_head_inner(head))
    }

    fn parse_head_inner(&mut self, head: &'a str) -> Option<Type> {
        if let Some(rest) = head.strip_prefix(PTR_PREFIX) {
            return Some(Type::ptr(self.parse_head(rest)?));
        }
        if let Some(rest) = head.strip_prefix(MUT_REF_PREFIX) {
            return Some(Type::reference(true, self.parse_head(rest)?));
        }
        if let Some(rest) = head.strip_prefix(REF_PREFIX) {
            return Some(Type::reference(false, self.parse_head(rest)?));
        }
        if let Some(rest) = head.strip_prefix(SLICE_PREFIX) {
            return Some(Type::Slice(Box::new(self.parse_head(rest)?)));
        }
        if let Some(name) = head.strip_prefix(DYN_PREFIX) {
            let args = self.parse_counted_args()?;
            return Some(Type::dyn_behavior(name, args));
        }
        if let Some(name) = head.strip_prefix(CLASS_PREFIX) {
            return Some(Type::Class(name.to_string()));
        }
        if let Some((len, rest)) = split_array_head(head) {
            return Some(Type::array(self.parse_head(rest)?, len));
        }
        match head {
            TUPLE_HEAD => {
                let count = self.next_count()?;
                return Some(Type::Tuple(self.parse_many(count)?));
            }
            FN_HEAD | CLOSURE_HEAD => {
                let count = self.next_count()?;
                let params = self.parse_many(count)?;
                let ret = self.parse_nested()?;
                return Some(if head == FN_HEAD {
                    Type::func(params, ret)
                } else {
                    Type::closure(params, ret)
                });
            }
            _ => {}
        }
        if let Some(kind) = PrimitiveKind::from_name(head) {
            return Some(Type::Primitive(kind));
        }
        if !is_plain_name(head) {
            return None;
        }
        let args = self.parse_counted_args()?;
        Some(Type::named(head, args))
    }

    /// Optional `__<n>__A1...An` argument list.
    fn parse_counted_args(&mut self) -> Option<Vec<Type>> {
        match self.next_count() {
            Some(count) => self.parse_many(count),
            None => Some(Vec::new()),
        }
    }
}

fn is_plain_name(token: &str) -> bool {
    let mut chars = token.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !token.starts_with(PTR_PREFIX)
        && !token.starts_with(REF_PREFIX)
        && !token.starts_with(MUT_REF_PREFIX)
        && !token.starts_with(SLICE_PREFIX)
        && !token.starts_with(DYN_PREFIX)
        && !token.starts_with(CLASS_PREFIX)
        && split_array_head(token).is_none()
        && !matches!(token, TUPLE_HEAD | FN_HEAD | CLOSURE_HEAD)
}

/// `arr<len>_<rest>` -> `(len, rest)`.
fn split_array_head(token: &str) -> Option<(u64, &str)> {
    let rest = token.strip_prefix(ARRAY_PREFIX)?;
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let len = rest[..digits].parse().ok()?;
    let inner = rest[digits..].strip_prefix('_')?;
    Some((len, inner))
}

#[cfg(test)]
mod tests;
