//! Item definitions: functions, structs, enums, classes, behaviors, impls.

use bitflags::bitflags;

use crate::{Block, Expr, Span, Type};

/// Items that are looked up by name.
pub trait Named {
    fn name(&self) -> &str;
}

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Param {
            name: name.into(),
            ty,
        }
    }
}

bitflags! {
    /// Function and method modifiers.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct FnFlags: u8 {
        /// Method takes `self` as a pointer to its owner.
        const HAS_SELF = 1 << 0;
        /// Class method dispatched through the class vtable.
        const VIRTUAL = 1 << 1;
        /// Body provided by the runtime; only declared.
        const EXTERN = 1 << 2;
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub generics: Vec<String>,
    pub params: Vec<Param>,
    pub ret: Type,
    pub body: Option<Block>,
    /// Captured bindings for closure bodies, laid out in this order in the
    /// environment record passed as the hidden first argument.
    pub env: Vec<Param>,
    pub flags: FnFlags,
    pub span: Span,
}

impl FunctionDef {
    pub fn new(name: impl Into<String>, params: Vec<Param>, ret: Type, body: Block) -> Self {
        FunctionDef {
            name: name.into(),
            generics: Vec::new(),
            params,
            ret,
            body: Some(body),
            env: Vec::new(),
            flags: FnFlags::empty(),
            span: Span::DUMMY,
        }
    }

    #[must_use]
    pub fn with_generics<S: AsRef<str>>(mut self, generics: &[S]) -> Self {
        self.generics = generics.iter().map(|g| g.as_ref().to_string()).collect();
        self
    }

    #[must_use]
    pub fn with_env(mut self, env: Vec<Param>) -> Self {
        self.env = env;
        self
    }

    #[must_use]
    pub fn with_flags(mut self, flags: FnFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn is_generic(&self) -> bool {
        !self.generics.is_empty()
    }

    pub fn has_self(&self) -> bool {
        self.flags.contains(FnFlags::HAS_SELF)
    }

    pub fn is_closure_body(&self) -> bool {
        !self.env.is_empty()
    }

    /// Function type of this definition as a value.
    pub fn fn_type(&self) -> Type {
        Type::func(
            self.params.iter().map(|p| p.ty.clone()).collect(),
            self.ret.clone(),
        )
    }
}

impl Named for FunctionDef {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub ty: Type,
    pub default: Option<Expr>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        FieldDef {
            name: name.into(),
            ty,
            default: None,
        }
    }

    #[must_use]
    pub fn with_default(mut self, default: Expr) -> Self {
        self.default = Some(default);
        self
    }
}

fn field_position(fields: &[FieldDef], name: &str) -> Option<usize> {
    fields.iter().position(|f| f.name == name)
}

/// Struct or union definition. Field index equals declaration order.
#[derive(Clone, Debug, PartialEq)]
pub struct StructDef {
    pub name: String,
    pub generics: Vec<String>,
    pub fields: Vec<FieldDef>,
    /// All fields alias offset 0.
    pub is_union: bool,
    pub span: Span,
}

impl StructDef {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        StructDef {
            name: name.into(),
            generics: Vec::new(),
            fields,
            is_union: false,
            span: Span::DUMMY,
        }
    }

    pub fn union(name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        StructDef {
            is_union: true,
            ..StructDef::new(name, fields)
        }
    }

    #[must_use]
    pub fn with_generics<S: AsRef<str>>(mut self, generics: &[S]) -> Self {
        self.generics = generics.iter().map(|g| g.as_ref().to_string()).collect();
        self
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        field_position(&self.fields, name)
    }
}

impl Named for StructDef {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VariantDef {
    pub name: String,
    pub payload: Vec<Type>,
}

impl VariantDef {
    pub fn new(name: impl Into<String>, payload: Vec<Type>) -> Self {
        VariantDef {
            name: name.into(),
            payload,
        }
    }
}

/// Tagged union. A variant's index is its discriminant.
#[derive(Clone, Debug, PartialEq)]
pub struct EnumDef {
    pub name: String,
    pub generics: Vec<String>,
    pub variants: Vec<VariantDef>,
    pub span: Span,
}

impl EnumDef {
    pub fn new(name: impl Into<String>, variants: Vec<VariantDef>) -> Self {
        EnumDef {
            name: name.into(),
            generics: Vec::new(),
            variants,
            span: Span::DUMMY,
        }
    }

    #[must_use]
    pub fn with_generics<S: AsRef<str>>(mut self, generics: &[S]) -> Self {
        self.generics = generics.iter().map(|g| g.as_ref().to_string()).collect();
        self
    }

    pub fn variant_index(&self, name: &str) -> Option<usize> {
        self.variants.iter().position(|v| v.name == name)
    }

    /// The enum's own type with its parameters as arguments, e.g. `Maybe[T]`.
    pub fn self_type(&self) -> Type {
        Type::named(
            self.name.clone(),
            self.generics.iter().map(Type::param).collect(),
        )
    }
}

impl Named for EnumDef {
    fn name(&self) -> &str {
        &self.name
    }
}

bitflags! {
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct ClassFlags: u8 {
        /// Cannot be subclassed.
        const SEALED = 1 << 0;
        const ABSTRACT = 1 << 1;
        /// Declared as a value class: stack allocated, copied by value.
        const VALUE = 1 << 2;
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClassDef {
    pub name: String,
    pub generics: Vec<String>,
    pub base: Option<String>,
    pub fields: Vec<FieldDef>,
    pub constructors: Vec<FunctionDef>,
    pub methods: Vec<FunctionDef>,
    pub flags: ClassFlags,
    pub span: Span,
}

impl ClassDef {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        ClassDef {
            name: name.into(),
            generics: Vec::new(),
            base: None,
            fields,
            constructors: Vec::new(),
            methods: Vec::new(),
            flags: ClassFlags::empty(),
            span: Span::DUMMY,
        }
    }

    #[must_use]
    pub fn with_generics<S: AsRef<str>>(mut self, generics: &[S]) -> Self {
        self.generics = generics.iter().map(|g| g.as_ref().to_string()).collect();
        self
    }

    #[must_use]
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    #[must_use]
    pub fn with_flags(mut self, flags: ClassFlags) -> Self {
        self.flags |= flags;
        self
    }

    #[must_use]
    pub fn with_constructor(mut self, ctor: FunctionDef) -> Self {
        self.constructors.push(ctor);
        self
    }

    #[must_use]
    pub fn with_method(mut self, method: FunctionDef) -> Self {
        self.methods.push(method);
        self
    }

    /// Own fields only; inherited fields live in the base block.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        field_position(&self.fields, name)
    }

    pub fn method(&self, name: &str) -> Option<&FunctionDef> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Sealed (or explicitly `VALUE`) classes with no base and no virtual
    /// methods are copied by value.
    pub fn is_value_class(&self) -> bool {
        if self.flags.contains(ClassFlags::VALUE) {
            return true;
        }
        self.flags.contains(ClassFlags::SEALED)
            && self.base.is_none()
            && !self
                .methods
                .iter()
                .any(|m| m.flags.contains(FnFlags::VIRTUAL))
    }
}

impl Named for ClassDef {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Method signature declared by a behavior. `self` is implicit.
#[derive(Clone, Debug, PartialEq)]
pub struct MethodSig {
    pub name: String,
    pub params: Vec<Type>,
    pub ret: Type,
}

impl MethodSig {
    pub fn new(name: impl Into<String>, params: Vec<Type>, ret: Type) -> Self {
        MethodSig {
            name: name.into(),
            params,
            ret,
        }
    }
}

/// Interface-like behavior. Method order is the vtable slot order.
#[derive(Clone, Debug, PartialEq)]
pub struct BehaviorDef {
    pub name: String,
    pub generics: Vec<String>,
    pub methods: Vec<MethodSig>,
}

impl BehaviorDef {
    pub fn new(name: impl Into<String>, methods: Vec<MethodSig>) -> Self {
        BehaviorDef {
            name: name.into(),
            generics: Vec::new(),
            methods,
        }
    }
}

impl Named for BehaviorDef {
    fn name(&self) -> &str {
        &self.name
    }
}

/// `impl [Behavior for] Type { ... }` block.
#[derive(Clone, Debug, PartialEq)]
pub struct ImplDef {
    pub generics: Vec<String>,
    /// Implementing type, e.g. `Range[T]` for a generic impl.
    pub self_ty: Type,
    pub behavior: Option<String>,
    pub methods: Vec<FunctionDef>,
}

impl ImplDef {
    pub fn inherent(self_ty: Type, methods: Vec<FunctionDef>) -> Self {
        ImplDef {
            generics: Vec::new(),
            self_ty,
            behavior: None,
            methods,
        }
    }

    pub fn behavior(behavior: impl Into<String>, self_ty: Type, methods: Vec<FunctionDef>) -> Self {
        ImplDef {
            generics: Vec::new(),
            self_ty,
            behavior: Some(behavior.into()),
            methods,
        }
    }

    #[must_use]
    pub fn with_generics<S: AsRef<str>>(mut self, generics: &[S]) -> Self {
        self.generics = generics.iter().map(|g| g.as_ref().to_string()).collect();
        self
    }

    /// Name of the implementing nominal type.
    pub fn type_name(&self) -> Option<&str> {
        match &self.self_ty {
            Type::Named { name, .. } | Type::Class(name) => Some(name),
            _ => None,
        }
    }

    pub fn method(&self, name: &str) -> Option<&FunctionDef> {
        self.methods.iter().find(|m| m.name == name)
    }
}

#[cfg(test)]
mod tests;
