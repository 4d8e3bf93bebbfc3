//! Memory layout of concrete types.
//!
//! Sizes follow C layout rules over the shapes the emitter produces:
//!
//! - structs: fields in declaration order, each aligned, size rounded up
//! - unions: every field at offset 0, size of the largest
//! - enums: `{ i32 tag }` or `{ i32 tag, [W x i64] payload }` with the
//!   payload at field 1, W words holding the largest variant
//! - classes: `{ ptr vtable, [base block], own fields... }`; reference
//!   classes are pointers when stored elsewhere
//! - closures and dyn values: two pointers
//!
//! Reference-class allocation sizes come from here, so instantiating a
//! generic class with a larger argument grows its allocation.

mod wrapper;

use rustc_hash::{FxHashMap, FxHashSet};
use tml_ir::{ClassDef, EnumDef, PrimitiveKind, StructDef, SymbolEnv, Type, VariantDef};

use crate::mangle::mangle_type;
use crate::stack::ensure_sufficient_stack;
use crate::unify::{bindings_for, substitute, substitute_all};

pub use wrapper::{wrapper_depth, WrapperKind, REF_COUNT_BLOCK, REF_COUNT_HEADER_FIELDS};

pub const POINTER_SIZE: u64 = 8;

/// Size of one enum payload word.
pub const PAYLOAD_WORD: u64 = 8;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SizeAlign {
    pub size: u64,
    pub align: u64,
}

impl SizeAlign {
    pub const ZERO: SizeAlign = SizeAlign { size: 0, align: 1 };
    pub const POINTER: SizeAlign = SizeAlign {
        size: POINTER_SIZE,
        align: POINTER_SIZE,
    };

    pub const fn new(size: u64, align: u64) -> Self {
        SizeAlign { size, align }
    }

    /// C layout of fields in order.
    pub fn record(fields: impl IntoIterator<Item = SizeAlign>) -> SizeAlign {
        let mut size = 0;
        let mut align = 1;
        for field in fields {
            size = round_up(size, field.align) + field.size;
            align = align.max(field.align);
        }
        SizeAlign::new(round_up(size, align), align)
    }

    /// Every field at offset 0.
    pub fn overlay(fields: impl IntoIterator<Item = SizeAlign>) -> SizeAlign {
        let (size, align) = fields
            .into_iter()
            .fold((0, 1), |(s, a), f| (s.max(f.size), a.max(f.align)));
        SizeAlign::new(round_up(size, align), align)
    }
}

fn round_up(value: u64, align: u64) -> u64 {
    if align <= 1 {
        value
    } else {
        value.div_ceil(align) * align
    }
}

fn primitive_layout(kind: PrimitiveKind) -> SizeAlign {
    match kind {
        PrimitiveKind::I8 | PrimitiveKind::U8 | PrimitiveKind::Bool => SizeAlign::new(1, 1),
        PrimitiveKind::I16 | PrimitiveKind::U16 => SizeAlign::new(2, 2),
        PrimitiveKind::I32 | PrimitiveKind::U32 | PrimitiveKind::F32 | PrimitiveKind::Char => {
            SizeAlign::new(4, 4)
        }
        PrimitiveKind::I64 | PrimitiveKind::U64 | PrimitiveKind::F64 => SizeAlign::new(8, 8),
        PrimitiveKind::I128 | PrimitiveKind::U128 => SizeAlign::new(16, 16),
        PrimitiveKind::Str => SizeAlign::POINTER,
        PrimitiveKind::Unit | PrimitiveKind::Never => SizeAlign::ZERO,
    }
}

/// Concrete field types of a struct or class instantiated with `args`.
pub fn field_types(generics: &[String], fields: &[tml_ir::FieldDef], args: &[Type]) -> Vec<Type> {
    let bindings = bindings_for(generics, args);
    fields.iter().map(|f| substitute(&f.ty, &bindings)).collect()
}

/// Stored payload type of `variant`, or `None` for payload-free variants.
/// Several payload values are stored as one tuple.
pub fn variant_payload(def: &EnumDef, variant: &VariantDef, args: &[Type]) -> Option<Type> {
    let bindings = bindings_for(&def.generics, args);
    let payload = substitute_all(&variant.payload, &bindings);
    match payload.len() {
        0 => None,
        1 => payload.into_iter().next(),
        _ => Some(Type::Tuple(payload)),
    }
}

/// Size and alignment queries, memoized per concrete type.
#[derive(Debug)]
pub struct LayoutCx<'env> {
    env: &'env SymbolEnv,
    cache: FxHashMap<String, SizeAlign>,
    in_progress: FxHashSet<String>,
}

impl<'env> LayoutCx<'env> {
    pub fn new(env: &'env SymbolEnv) -> Self {
        LayoutCx {
            env,
            cache: FxHashMap::default(),
            in_progress: FxHashSet::default(),
        }
    }

    pub fn size_align(&mut self, ty: &Type) -> SizeAlign {
        ensure_sufficient_stack(|| self.size_align_inner(ty))
    }

    pub fn size_of(&mut self, ty: &Type) -> u64 {
        self.size_align(ty).size
    }

    /// A type with no runtime bytes.
    pub fn is_zero_sized(&mut self, ty: &Type) -> bool {
        self.size_of(ty) == 0
    }

    fn size_align_inner(&mut self, ty: &Type) -> SizeAlign {
        match ty {
            Type::Primitive(kind) => primitive_layout(*kind),
            Type::Ref { .. } | Type::Ptr(_) => SizeAlign::POINTER,
            Type::Func { .. } | Type::Closure { .. } | Type::DynBehavior { .. } | Type::Slice(_) => {
                SizeAlign::new(2 * POINTER_SIZE, POINTER_SIZE)
            }
            Type::Tuple(elems) => {
                let fields: Vec<_> = elems.iter().map(|e| self.size_align(e)).collect();
                SizeAlign::record(fields)
            }
            Type::Array { elem, len } => {
                let elem = self.size_align(elem);
                SizeAlign::new(round_up(elem.size, elem.align) * len, elem.align)
            }
            Type::Class(name) => self.nominal(ty, name, &[]),
            Type::Named { name, args, .. } => self.nominal(ty, name, args),
        }
    }

    fn nominal(&mut self, ty: &Type, name: &str, args: &[Type]) -> SizeAlign {
        if WrapperKind::from_name(name).is_some() && args.len() == 1 {
            return SizeAlign::POINTER;
        }
        let key = mangle_type(ty);
        if let Some(cached) = self.cache.get(&key) {
            return *cached;
        }
        // A type that contains itself by value can only be reached through a
        // pointer at runtime.
        if !self.in_progress.insert(key.clone()) {
            return SizeAlign::POINTER;
        }
        let env = self.env;
        let layout = if let Some(def) = env.struct_def(name) {
            self.struct_layout(def, args)
        } else if let Some(def) = env.enum_def(name) {
            self.enum_layout(def, args)
        } else if let Some(def) = env.class_def(name) {
            if def.is_value_class() {
                self.class_layout(def, args)
            } else {
                SizeAlign::POINTER
            }
        } else {
            SizeAlign::POINTER
        };
        self.in_progress.remove(&key);
        self.cache.insert(key, layout);
        layout
    }

    fn struct_layout(&mut self, def: &StructDef, args: &[Type]) -> SizeAlign {
        let fields: Vec<_> = field_types(&def.generics, &def.fields, args)
            .iter()
            .map(|t| self.size_align(t))
            .collect();
        if def.is_union {
            SizeAlign::overlay(fields)
        } else {
            SizeAlign::record(fields)
        }
    }

    fn enum_layout(&mut self, def: &EnumDef, args: &[Type]) -> SizeAlign {
        let words = self.enum_payload_words(def, args);
        if words == 0 {
            SizeAlign::new(4, 4)
        } else {
            SizeAlign::record([
                SizeAlign::new(4, 4),
                SizeAlign::new(words * PAYLOAD_WORD, PAYLOAD_WORD),
            ])
        }
    }

    /// Payload words needed by the largest variant.
    pub fn enum_payload_words(&mut self, def: &EnumDef, args: &[Type]) -> u64 {
        let largest = def
            .variants
            .iter()
            .filter_map(|v| variant_payload(def, v, args))
            .map(|payload| self.size_of(&payload))
            .max()
            .unwrap_or(0);
        largest.div_ceil(PAYLOAD_WORD)
    }

    /// In-memory size of a class instance (the allocation of a reference
    /// class), including every ancestor block.
    pub fn class_layout(&mut self, def: &ClassDef, args: &[Type]) -> SizeAlign {
        let env = self.env;
        let mut chain = env.class_chain(&def.name);
        if chain.first().is_none_or(|c| c.name != def.name) {
            chain = vec![def];
        }
        // Root first. The root block leads with the vtable pointer; every
        // derived block leads with its base block.
        let mut block: Option<SizeAlign> = None;
        for (depth, class) in chain.iter().enumerate().rev() {
            let class_args = if depth == 0 { args } else { &[] };
            let mut fields = vec![block.unwrap_or(SizeAlign::POINTER)];
            for ty in field_types(&class.generics, &class.fields, class_args) {
                fields.push(self.size_align(&ty));
            }
            block = Some(SizeAlign::record(fields));
        }
        block.unwrap_or(SizeAlign::POINTER)
    }
}

#[cfg(test)]
mod tests;
