//! Resolved expression tree.
//!
//! The type checker has already run: every expression may carry its semantic
//! type in [`Expr::ty`]. Code generation treats a missing annotation as
//! "infer locally" (literal defaults, local bindings, definitions).

use crate::{Span, Type};

/// Literal values.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Int(i128),
    Float(f64),
    Bool(bool),
    Str(String),
    Unit,
}

/// A `::`-separated path with optional explicit type arguments.
///
/// `generics` apply to the item the path resolves to: the enum for
/// `Maybe[I64]::Just`, the function for `identity[I32]`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Path {
    pub segments: Vec<String>,
    pub generics: Vec<Type>,
}

impl Path {
    pub fn new<S: AsRef<str>>(segments: &[S]) -> Self {
        Path {
            segments: segments.iter().map(|s| s.as_ref().to_string()).collect(),
            generics: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_generics(mut self, generics: Vec<Type>) -> Self {
        self.generics = generics;
        self
    }

    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// The path minus its last segment, joined with `::`.
    pub fn qualifier(&self) -> Option<String> {
        match self.segments.len() {
            0 | 1 => None,
            n => Some(self.segments[..n - 1].join("::")),
        }
    }

    pub fn joined(&self) -> String {
        self.segments.join("::")
    }
}

/// Field initializer inside a struct literal.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldInit {
    pub name: String,
    pub value: Expr,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Lit(Literal),
    Ident(String),
    /// Bare path used as a value, e.g. a unit enum variant.
    Path(Path),
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    MethodCall {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    Field {
        object: Box<Expr>,
        field: String,
    },
    StructLit {
        path: Path,
        fields: Vec<FieldInit>,
        base: Option<Box<Expr>>,
    },
    /// A named function used as a value; produces a thin function pointer.
    FuncRef(String),
    /// A capturing closure. `func` names a function whose `env` lists the
    /// captured bindings in the same order as `captures`.
    Closure {
        func: String,
        captures: Vec<String>,
    },
    Block(Block),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    pub ty: Option<Type>,
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Expr {
            kind,
            span: Span::DUMMY,
            ty: None,
        }
    }

    #[must_use]
    pub fn with_ty(mut self, ty: Type) -> Self {
        self.ty = Some(ty);
        self
    }

    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn int(value: i128) -> Self {
        Expr::new(ExprKind::Lit(Literal::Int(value)))
    }

    pub fn float(value: f64) -> Self {
        Expr::new(ExprKind::Lit(Literal::Float(value)))
    }

    pub fn bool(value: bool) -> Self {
        Expr::new(ExprKind::Lit(Literal::Bool(value)))
    }

    pub fn str(value: impl Into<String>) -> Self {
        Expr::new(ExprKind::Lit(Literal::Str(value.into())))
    }

    pub fn unit() -> Self {
        Expr::new(ExprKind::Lit(Literal::Unit))
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Expr::new(ExprKind::Ident(name.into()))
    }

    pub fn path(path: Path) -> Self {
        Expr::new(ExprKind::Path(path))
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        Expr::new(ExprKind::Call {
            callee: Box::new(callee),
            args,
        })
    }

    /// Call through a path, e.g. `Maybe::Just(5)`.
    pub fn call_path(path: Path, args: Vec<Expr>) -> Self {
        Expr::call(Expr::path(path), args)
    }

    pub fn method_call(receiver: Expr, method: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::new(ExprKind::MethodCall {
            receiver: Box::new(receiver),
            method: method.into(),
            args,
        })
    }

    pub fn field(object: Expr, field: impl Into<String>) -> Self {
        Expr::new(ExprKind::Field {
            object: Box::new(object),
            field: field.into(),
        })
    }

    pub fn struct_lit(path: Path, fields: Vec<(&str, Expr)>, base: Option<Expr>) -> Self {
        Expr::new(ExprKind::StructLit {
            path,
            fields: fields
                .into_iter()
                .map(|(name, value)| FieldInit {
                    name: name.to_string(),
                    value,
                    span: Span::DUMMY,
                })
                .collect(),
            base: base.map(Box::new),
        })
    }

    pub fn func_ref(name: impl Into<String>) -> Self {
        Expr::new(ExprKind::FuncRef(name.into()))
    }

    pub fn closure(func: impl Into<String>, captures: Vec<&str>) -> Self {
        Expr::new(ExprKind::Closure {
            func: func.into(),
            captures: captures.into_iter().map(str::to_string).collect(),
        })
    }

    pub fn block(block: Block) -> Self {
        Expr::new(ExprKind::Block(block))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Let {
        name: String,
        ty: Option<Type>,
        init: Expr,
        span: Span,
    },
    Assign {
        target: Expr,
        value: Expr,
        span: Span,
    },
    Expr(Expr),
    Return(Option<Expr>, Span),
}

impl Stmt {
    pub fn let_(name: impl Into<String>, ty: Option<Type>, init: Expr) -> Self {
        Stmt::Let {
            name: name.into(),
            ty,
            init,
            span: Span::DUMMY,
        }
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Stmt::Assign {
            target,
            value,
            span: Span::DUMMY,
        }
    }
}

/// Statements followed by an optional tail expression (the block's value).
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub tail: Option<Box<Expr>>,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>, tail: Option<Expr>) -> Self {
        Block {
            stmts,
            tail: tail.map(Box::new),
        }
    }

    /// Block that only evaluates `expr`.
    pub fn expr(expr: Expr) -> Self {
        Block::new(Vec::new(), Some(expr))
    }
}

#[cfg(test)]
mod tests;
