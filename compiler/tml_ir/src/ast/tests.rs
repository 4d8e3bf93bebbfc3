use super::*;
use pretty_assertions::assert_eq;

#[test]
fn path_qualifier_and_last() {
    let path = Path::new(&["std", "Maybe", "Just"]);
    assert_eq!(path.last(), Some("Just"));
    assert_eq!(path.qualifier().as_deref(), Some("std::Maybe"));
    assert_eq!(Path::new(&["main"]).qualifier(), None);
}

#[test]
fn struct_literal_builder_keeps_field_order() {
    let expr = Expr::struct_lit(
        Path::new(&["Point"]),
        vec![("y", Expr::int(2)), ("x", Expr::int(1))],
        Some(Expr::ident("base")),
    );
    let ExprKind::StructLit { fields, base, .. } = expr.kind else {
        panic!("expected struct literal");
    };
    let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["y", "x"]);
    assert_eq!(base.map(|b| b.kind), Some(ExprKind::Ident("base".into())));
}

#[test]
fn annotation_builders() {
    let expr = Expr::int(3).with_ty(Type::I64).with_span(Span::new(1, 2));
    assert_eq!(expr.ty, Some(Type::I64));
    assert_eq!(expr.span, Span::new(1, 2));
}
