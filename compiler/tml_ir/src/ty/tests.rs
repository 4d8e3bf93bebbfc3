use super::*;
use pretty_assertions::assert_eq;

#[test]
fn primitive_names_round_trip() {
    for kind in PrimitiveKind::ALL {
        assert_eq!(PrimitiveKind::from_name(kind.name()), Some(kind));
    }
}

#[test]
fn size_aliases_map_to_64_bit() {
    assert_eq!(PrimitiveKind::from_name("Usize"), Some(PrimitiveKind::U64));
    assert_eq!(PrimitiveKind::from_name("Isize"), Some(PrimitiveKind::I64));
    assert_eq!(PrimitiveKind::from_name("Maybe"), None);
}

#[test]
fn structural_eq_ignores_module() {
    let local = Type::named("List", vec![Type::I32]);
    let imported = Type::Named {
        name: "List".to_string(),
        module: "std::collections".to_string(),
        args: vec![Type::I32],
    };
    assert!(local.structurally_eq(&imported));
    assert_ne!(local, imported);
}

#[test]
fn structural_eq_distinguishes_mutability() {
    let a = Type::reference(true, Type::I32);
    let b = Type::reference(false, Type::I32);
    assert!(!a.structurally_eq(&b));
}

#[test]
fn mentions_generic_parameter() {
    let ty = Type::named("Pair", vec![Type::param("T"), Type::ptr(Type::param("U"))]);
    assert!(ty.mentions_any(&["U"]));
    assert!(!ty.mentions_any(&["V"]));
    // `Pair` itself has args, so it is never treated as a parameter.
    assert!(!ty.mentions_any(&["Pair"]));
}

#[test]
fn display_uses_surface_syntax() {
    let ty = Type::named("Outcome", vec![Type::STR, Type::I32]);
    assert_eq!(ty.to_string(), "Outcome[Str, I32]");
    assert_eq!(
        Type::func(vec![Type::I32], Type::BOOL).to_string(),
        "func(I32) -> Bool"
    );
    assert_eq!(Type::dyn_behavior("Display", vec![]).to_string(), "dyn Display");
}

#[test]
fn empty_tuple_is_unit() {
    assert!(Type::Tuple(vec![]).is_unit());
    assert!(Type::Primitive(PrimitiveKind::Never).is_void_like());
    assert!(!Type::I32.is_void_like());
}
