use super::*;
use pretty_assertions::assert_eq;

fn maybe() -> EnumDef {
    EnumDef::new(
        "Maybe",
        vec![
            VariantDef::new("Just", vec![Type::param("T")]),
            VariantDef::new("Nothing", vec![]),
        ],
    )
    .with_generics(&["T"])
}

#[test]
fn variant_index_is_declaration_order() {
    let def = maybe();
    assert_eq!(def.variant_index("Just"), Some(0));
    assert_eq!(def.variant_index("Nothing"), Some(1));
    assert_eq!(def.variant_index("Some"), None);
}

#[test]
fn enum_self_type_uses_parameters() {
    assert_eq!(
        maybe().self_type(),
        Type::named("Maybe", vec![Type::param("T")])
    );
}

#[test]
fn field_index_is_stable() {
    let def = StructDef::new(
        "Point",
        vec![FieldDef::new("x", Type::I32), FieldDef::new("y", Type::I32)],
    );
    for _ in 0..3 {
        assert_eq!(def.field_index("y"), Some(1));
    }
}

#[test]
fn value_class_detection() {
    let sealed = ClassDef::new("Vec2", vec![]).with_flags(ClassFlags::SEALED);
    assert!(sealed.is_value_class());

    let virtual_method = FunctionDef::new("area", vec![], Type::F64, Block::default())
        .with_flags(FnFlags::HAS_SELF | FnFlags::VIRTUAL);
    let shape = ClassDef::new("Shape", vec![])
        .with_flags(ClassFlags::SEALED)
        .with_method(virtual_method);
    assert!(!shape.is_value_class());

    let derived = ClassDef::new("Circle", vec![])
        .with_base("Shape")
        .with_flags(ClassFlags::SEALED);
    assert!(!derived.is_value_class());

    assert!(ClassDef::new("Tiny", vec![])
        .with_flags(ClassFlags::VALUE)
        .is_value_class());
}

#[test]
fn impl_type_name() {
    let imp = ImplDef::inherent(Type::named("Range", vec![Type::param("T")]), vec![])
        .with_generics(&["T"]);
    assert_eq!(imp.type_name(), Some("Range"));
    assert!(imp.behavior.is_none());
}
