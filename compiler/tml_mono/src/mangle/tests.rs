use super::*;
use pretty_assertions::assert_eq;

fn list(elem: Type) -> Type {
    Type::named("List", vec![elem])
}

#[test]
fn base_without_args_is_unchanged() {
    assert_eq!(mangle("Point", &[]), "Point");
}

#[test]
fn flat_arguments() {
    assert_eq!(mangle("Outcome", &[Type::STR, Type::I32]), "Outcome__Str__I32");
    assert_eq!(mangle("Maybe", &[Type::I32]), "Maybe__I32");
}

#[test]
fn nested_generic_carries_arity() {
    assert_eq!(mangle("Maybe", &[list(Type::I32)]), "Maybe__List__1__I32");
    assert_eq!(
        mangle("Pair", &[list(Type::I32), Type::STR]),
        "Pair__List__1__I32__Str"
    );
}

#[test]
fn top_level_type_omits_arity() {
    assert_eq!(mangle_type(&list(Type::I32)), "List__I32");
    assert_eq!(
        mangle_type(&Type::named("Outcome", vec![Type::STR, Type::I32])),
        mangle("Outcome", &[Type::STR, Type::I32])
    );
}

#[test]
fn wrapper_prefixes() {
    assert_eq!(mangle_type(&Type::ptr(Type::I32)), "ptr_I32");
    assert_eq!(mangle_type(&Type::reference(false, Type::STR)), "ref_Str");
    assert_eq!(mangle_type(&Type::reference(true, Type::STR)), "mutref_Str");
    assert_eq!(mangle_type(&Type::ptr(list(Type::Primitive(PrimitiveKind::U8)))), "ptr_List__1__U8");
    assert_eq!(mangle_type(&Type::array(Type::F64, 4)), "arr4_F64");
    assert_eq!(mangle_type(&Type::Slice(Box::new(Type::BOOL))), "slice_Bool");
}

#[test]
fn compound_types() {
    assert_eq!(
        mangle_type(&Type::Tuple(vec![Type::I32, Type::STR])),
        "tuple__2__I32__Str"
    );
    assert_eq!(mangle_type(&Type::Tuple(vec![])), "tuple__0");
    assert_eq!(
        mangle_type(&Type::func(vec![Type::I32], Type::BOOL)),
        "fn__1__I32__Bool"
    );
    assert_eq!(
        mangle_type(&Type::closure(vec![], Type::UNIT)),
        "closure__0__Unit"
    );
    assert_eq!(
        mangle_type(&Type::dyn_behavior("Iter", vec![Type::I32])),
        "dyn_Iter__1__I32"
    );
    assert_eq!(mangle_type(&Type::Class("Shape".into())), "class_Shape");
}

#[test]
fn unmangle_examples() {
    let cases = [
        Type::I32,
        list(Type::I32),
        Type::named("Pair", vec![list(list(Type::I32)), Type::STR]),
        Type::ptr(Type::named("Node", vec![Type::param("Key")])),
        Type::array(Type::Tuple(vec![Type::Primitive(PrimitiveKind::I8), Type::Primitive(PrimitiveKind::U8)]), 16),
        Type::func(vec![Type::ptr(Type::I32), list(Type::STR)], Type::UNIT),
        Type::dyn_behavior("Show", vec![]),
        Type::reference(true, Type::dyn_behavior("Iter", vec![list(Type::Primitive(PrimitiveKind::F32))])),
    ];
    for ty in cases {
        let mangled = mangle_type(&ty);
        assert_eq!(unmangle(&mangled), Some(ty), "round trip of {mangled}");
    }
}

#[test]
fn unmangle_accepts_size_aliases() {
    assert_eq!(unmangle("Usize"), Some(Type::Primitive(tml_ir::PrimitiveKind::U64)));
    assert_eq!(
        unmangle("ptr_Isize"),
        Some(Type::ptr(Type::Primitive(tml_ir::PrimitiveKind::I64)))
    );
}

#[test]
fn unmangle_rejects_garbage() {
    assert_eq!(unmangle(""), None);
    assert_eq!(unmangle("tuple__2__I32"), None);
    assert_eq!(unmangle("fn__x__I32"), None);
    assert_eq!(unmangle("ptr_"), None);
    assert_eq!(unmangle("List__1__I32__I64__1x"), None);
}

#[test]
fn split_inverts_mangle() {
    let args = vec![list(Type::I32), Type::ptr(Type::STR)];
    let mangled = mangle("Cache", &args);
    assert_eq!(split_instantiation(&mangled), Some(("Cache".to_string(), args)));
    assert_eq!(split_instantiation("Point"), Some(("Point".to_string(), vec![])));
}

#[test]
fn unresolved_marker() {
    let name = unresolved_name("Maybe");
    assert_eq!(name, "Maybe__UNRESOLVED");
    assert!(is_unresolved_name(&name));
    assert!(!is_unresolved_name("Maybe__I32"));
    assert!(!is_unresolved_name("MaybeUNRESOLVED"));
}
