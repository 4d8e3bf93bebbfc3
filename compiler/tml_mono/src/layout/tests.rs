use pretty_assertions::assert_eq;
use tml_ir::{
    ClassDef, ClassFlags, EnumDef, FieldDef, Module, PrimitiveKind, StructDef, SymbolEnv, Type,
    VariantDef,
};

use super::*;

fn env() -> SymbolEnv {
    SymbolEnv::new(
        Module::new("shapes")
            .with_struct(StructDef::new(
                "Point",
                vec![FieldDef::new("x", Type::I32), FieldDef::new("y", Type::I32)],
            ))
            .with_struct(StructDef::new(
                "Mixed",
                vec![
                    FieldDef::new("flag", Type::BOOL),
                    FieldDef::new("big", Type::I64),
                    FieldDef::new("small", Type::I32),
                ],
            ))
            .with_struct(
                StructDef::new("Pair", vec![
                    FieldDef::new("first", Type::param("A")),
                    FieldDef::new("second", Type::param("B")),
                ])
                .with_generics(&["A", "B"]),
            )
            .with_struct(StructDef::union(
                "Bits",
                vec![
                    FieldDef::new("word", Type::I64),
                    FieldDef::new("byte", Type::Primitive(PrimitiveKind::U8)),
                ],
            ))
            .with_enum(
                EnumDef::new("Maybe", vec![
                    VariantDef::new("Just", vec![Type::param("T")]),
                    VariantDef::new("Nothing", vec![]),
                ])
                .with_generics(&["T"]),
            )
            .with_enum(EnumDef::new("Color", vec![
                VariantDef::new("Red", vec![]),
                VariantDef::new("Green", vec![]),
            ]))
            .with_struct(StructDef::new(
                "Node",
                vec![
                    FieldDef::new("value", Type::I32),
                    FieldDef::new("next", Type::named("Node", vec![])),
                ],
            ))
            .with_class(ClassDef::new("Animal", vec![FieldDef::new("legs", Type::I32)]))
            .with_class(
                ClassDef::new("Dog", vec![FieldDef::new("age", Type::I64)]).with_base("Animal"),
            )
            .with_class(
                ClassDef::new("Vec2", vec![
                    FieldDef::new("x", Type::F64),
                    FieldDef::new("y", Type::F64),
                ])
                .with_flags(ClassFlags::SEALED),
            ),
    )
}

#[test]
fn primitives_and_pointers() {
    let env = env();
    let mut cx = LayoutCx::new(&env);
    assert_eq!(cx.size_align(&Type::I32), SizeAlign::new(4, 4));
    assert_eq!(cx.size_align(&Type::BOOL), SizeAlign::new(1, 1));
    assert_eq!(cx.size_align(&Type::STR), SizeAlign::POINTER);
    assert_eq!(cx.size_align(&Type::UNIT), SizeAlign::ZERO);
    assert_eq!(cx.size_of(&Type::closure(vec![Type::I32], Type::I32)), 16);
    assert_eq!(cx.size_of(&Type::dyn_behavior("Show", vec![])), 16);
}

#[test]
fn struct_fields_are_aligned() {
    let env = env();
    let mut cx = LayoutCx::new(&env);
    assert_eq!(cx.size_align(&Type::named("Point", vec![])), SizeAlign::new(8, 4));
    assert_eq!(cx.size_align(&Type::named("Mixed", vec![])), SizeAlign::new(24, 8));
}

#[test]
fn generic_struct_uses_arguments() {
    let env = env();
    let mut cx = LayoutCx::new(&env);
    let small = Type::named("Pair", vec![Type::BOOL, Type::BOOL]);
    let large = Type::named("Pair", vec![Type::I64, Type::STR]);
    assert_eq!(cx.size_of(&small), 2);
    assert_eq!(cx.size_of(&large), 16);
}

#[test]
fn union_is_largest_member() {
    let env = env();
    let mut cx = LayoutCx::new(&env);
    assert_eq!(cx.size_align(&Type::named("Bits", vec![])), SizeAlign::new(8, 8));
}

#[test]
fn enum_payload_words() {
    let env = env();
    let mut cx = LayoutCx::new(&env);
    let maybe = env.enum_def("Maybe").unwrap_or_else(|| panic!("Maybe is defined"));
    assert_eq!(cx.enum_payload_words(maybe, &[Type::I32]), 1);
    assert_eq!(cx.enum_payload_words(maybe, &[Type::named("Pair", vec![Type::I64, Type::I64])]), 2);
    assert_eq!(cx.size_of(&Type::named("Maybe", vec![Type::I32])), 16);
    assert_eq!(cx.size_of(&Type::named("Color", vec![])), 4);
}

#[test]
fn multi_value_payload_is_a_tuple() {
    let def = EnumDef::new("Shape", vec![
        VariantDef::new("Rect", vec![Type::I32, Type::param("T")]),
        VariantDef::new("Empty", vec![]),
    ])
    .with_generics(&["T"]);
    assert_eq!(
        variant_payload(&def, &def.variants[0], &[Type::F64]),
        Some(Type::Tuple(vec![Type::I32, Type::F64]))
    );
    assert_eq!(variant_payload(&def, &def.variants[1], &[Type::F64]), None);
}

#[test]
fn self_containing_struct_terminates() {
    let env = env();
    let mut cx = LayoutCx::new(&env);
    // The inner occurrence is treated as a pointer.
    assert_eq!(cx.size_of(&Type::named("Node", vec![])), 16);
}

#[test]
fn class_layouts() {
    let env = env();
    let mut cx = LayoutCx::new(&env);
    let animal = env.class_def("Animal").unwrap_or_else(|| panic!("Animal is defined"));
    let dog = env.class_def("Dog").unwrap_or_else(|| panic!("Dog is defined"));
    assert_eq!(cx.class_layout(animal, &[]), SizeAlign::new(16, 8));
    // Animal block (vtable, legs), age
    assert_eq!(cx.class_layout(dog, &[]), SizeAlign::new(24, 8));
    // Reference classes are pointers when stored.
    assert_eq!(cx.size_align(&Type::named("Dog", vec![])), SizeAlign::POINTER);
    // Value classes are inline.
    assert_eq!(cx.size_of(&Type::named("Vec2", vec![])), 24);
}

#[test]
fn wrappers_are_pointer_sized() {
    let env = env();
    let mut cx = LayoutCx::new(&env);
    let boxed = Type::named("Box", vec![Type::named("Point", vec![])]);
    assert_eq!(cx.size_align(&boxed), SizeAlign::POINTER);
}

#[test]
fn wrapper_classification() {
    let point = Type::named("Point", vec![]);
    let arc = Type::named("Arc", vec![point.clone()]);
    assert_eq!(WrapperKind::classify(&arc), Some((WrapperKind::RefCounted, &point)));
    assert_eq!(
        WrapperKind::classify(&Type::ptr(point.clone())),
        Some((WrapperKind::Raw, &point))
    );
    assert_eq!(WrapperKind::classify(&point), None);
    assert_eq!(WrapperKind::RefCounted.payload_index(), Some(2));
    assert_eq!(WrapperKind::Owned.payload_index(), None);
    assert!(WrapperKind::Owned.is_boxed_struct());
    assert!(!WrapperKind::Raw.is_boxed_struct());
}

#[test]
fn wrapper_nesting_depth() {
    let point = Type::named("Point", vec![]);
    assert_eq!(wrapper_depth(&point), 0);
    let nested = Type::named("Box", vec![Type::named("Arc", vec![point])]);
    assert_eq!(wrapper_depth(&nested), 2);
    assert_eq!(wrapper_depth(&Type::reference(false, nested)), 3);
}
