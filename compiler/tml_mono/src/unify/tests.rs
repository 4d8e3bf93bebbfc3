use super::*;
use pretty_assertions::assert_eq;
use tml_ir::PrimitiveKind;

fn t() -> Type {
    Type::param("T")
}

fn generics(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| (*n).to_string()).collect()
}

#[test]
fn binds_nested_parameter() {
    let mut bindings = Bindings::default();
    let pattern = Type::named("Maybe", vec![t()]);
    let concrete = Type::named("Maybe", vec![Type::named("List", vec![Type::I32])]);
    unify(&pattern, &concrete, &["T"], &mut bindings);
    assert_eq!(
        bindings.get("T"),
        Some(&Type::named("List", vec![Type::I32]))
    );
}

#[test]
fn first_binding_wins() {
    let mut bindings = Bindings::default();
    let pattern = Type::Tuple(vec![t(), t()]);
    let concrete = Type::Tuple(vec![Type::I32, Type::STR]);
    unify(&pattern, &concrete, &["T"], &mut bindings);
    assert_eq!(bindings.get("T"), Some(&Type::I32));
}

#[test]
fn mismatched_shapes_bind_nothing() {
    let mut bindings = Bindings::default();
    unify(
        &Type::named("Maybe", vec![t()]),
        &Type::named("Outcome", vec![Type::I32, Type::STR]),
        &["T"],
        &mut bindings,
    );
    unify(
        &Type::Tuple(vec![t()]),
        &Type::Tuple(vec![Type::I32, Type::I32]),
        &["T"],
        &mut bindings,
    );
    assert!(bindings.is_empty());
}

#[test]
fn reference_pattern_binds_through_plain_value() {
    let mut bindings = Bindings::default();
    unify(
        &Type::reference(false, t()),
        &Type::named("Point", vec![]),
        &["T"],
        &mut bindings,
    );
    assert_eq!(bindings.get("T"), Some(&Type::named("Point", vec![])));
}

#[test]
fn function_patterns_match_closures() {
    let mut bindings = Bindings::default();
    let pattern = Type::func(vec![t()], Type::param("U"));
    let concrete = Type::closure(vec![Type::I64], Type::BOOL);
    unify(&pattern, &concrete, &["T", "U"], &mut bindings);
    assert_eq!(bindings.get("T"), Some(&Type::I64));
    assert_eq!(bindings.get("U"), Some(&Type::BOOL));
}

#[test]
fn non_generic_names_are_not_bound() {
    let mut bindings = Bindings::default();
    unify(&Type::param("Point"), &Type::I32, &["T"], &mut bindings);
    assert!(bindings.is_empty());
}

#[test]
fn substitute_rewrites_only_bound_names() {
    let bindings = bindings_for(&generics(&["T"]), &[Type::I32]);
    let ty = Type::func(
        vec![Type::ptr(t()), Type::param("U")],
        Type::named("Maybe", vec![t()]),
    );
    assert_eq!(
        substitute(&ty, &bindings),
        Type::func(
            vec![Type::ptr(Type::I32), Type::param("U")],
            Type::named("Maybe", vec![Type::I32]),
        )
    );
}

#[test]
fn substitute_does_not_replace_applied_names() {
    // `T[I32]` is a nominal type application, not the parameter `T`.
    let bindings = bindings_for(&generics(&["T"]), &[Type::STR]);
    let applied = Type::named("T", vec![Type::I32]);
    assert_eq!(substitute(&applied, &bindings), applied);
}

#[test]
fn precedence_explicit_over_inferred_over_context() {
    let names = generics(&["T", "E"]);
    let mut binder = GenericBinder::new(&names);
    binder
        .explicit(&[Type::I64])
        .infer(&t(), &Type::I32)
        .expect(
            &Type::named("Outcome", vec![t(), Type::param("E")]),
            &Type::named("Outcome", vec![Type::STR, Type::BOOL]),
        );
    let resolution = binder.resolve(&Type::UNIT);
    assert_eq!(resolution.args, vec![Type::I64, Type::BOOL]);
    assert!(resolution.defaulted.is_empty());
}

#[test]
fn context_fills_parameters_arguments_cannot_see() {
    let names = generics(&["T", "E"]);
    let mut binder = GenericBinder::new(&names);
    binder.infer(&t(), &Type::STR).expect(
        &Type::named("Outcome", vec![t(), Type::param("E")]),
        &Type::named("Outcome", vec![Type::STR, Type::I32]),
    );
    assert!(binder.is_complete());
    assert_eq!(binder.resolve(&Type::UNIT).args, vec![Type::STR, Type::I32]);
}

#[test]
fn fallback_is_reported() {
    let names = generics(&["T"]);
    let binder = GenericBinder::new(&names);
    assert!(!binder.is_complete());
    let resolution = binder.resolve(&Type::Primitive(PrimitiveKind::I32));
    assert_eq!(resolution.args, vec![Type::I32]);
    assert_eq!(resolution.defaulted, vec!["T".to_string()]);
}
