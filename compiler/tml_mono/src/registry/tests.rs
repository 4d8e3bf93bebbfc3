use super::*;
use pretty_assertions::assert_eq;

fn boxed(inner: Type) -> Type {
    Type::named("Box", vec![inner])
}

#[test]
fn repeated_requests_enqueue_once() {
    let mut registry = InstantiationRegistry::new(100);
    let first = registry.require_struct_instantiation("Pair", &[Type::I32, Type::STR]);
    let second = registry.require_struct_instantiation("Pair", &[Type::I32, Type::STR]);
    assert_eq!(first, "Pair__I32__Str");
    assert_eq!(first, second);
    assert_eq!(registry.pending(), 1);
    assert!(registry.is_generated(InstKind::Struct, "Pair__I32__Str"));
}

#[test]
fn kinds_are_separate_keys() {
    let mut registry = InstantiationRegistry::new(100);
    let _ = registry.require_struct_instantiation("Wrap", &[Type::I32]);
    let _ = registry.require_func_instantiation("Wrap", &[Type::I32]);
    assert_eq!(registry.pending(), 2);
    assert!(!registry.is_generated(InstKind::Enum, "Wrap__I32"));
}

#[test]
fn method_names_join_owner_and_method() {
    let mut registry = InstantiationRegistry::new(100);
    let name = registry.require_method_instantiation("Range", &[Type::I64], "new", &[]);
    assert_eq!(name, "Range__I64_new");
    let generic = registry.require_method_instantiation("Vec", &[Type::I32], "map", &[Type::STR]);
    assert_eq!(generic, "Vec__I32_map__Str");
}

#[test]
fn drain_reaches_fixed_point() {
    let mut registry = InstantiationRegistry::new(100);
    let _ = registry.require_struct_instantiation("Box", &[boxed(Type::I32)]);

    let mut generated = Vec::new();
    while let Ok(Some(batch)) = registry.next_round() {
        for item in batch {
            // Generating `Box[Box[T]]` needs `Box[T]`.
            if let Some((_, [inner])) = item.args[0].as_named() {
                let _ = registry.require_struct_instantiation("Box", std::slice::from_ref(inner));
            }
            generated.push(item.mangled);
        }
    }
    assert_eq!(generated, vec!["Box__Box__1__I32", "Box__I32"]);
    assert_eq!(registry.rounds(), 2);
    assert_eq!(registry.processed().len(), 2);
}

#[test]
fn self_growing_requests_do_not_converge() {
    let mut registry = InstantiationRegistry::new(5);
    let mut ty = Type::I32;
    let _ = registry.require_struct_instantiation("Box", std::slice::from_ref(&ty));
    let err = loop {
        match registry.next_round() {
            Ok(Some(_)) => {
                ty = boxed(ty);
                let _ = registry.require_struct_instantiation("Box", std::slice::from_ref(&ty));
            }
            Ok(None) => panic!("worklist unexpectedly converged"),
            Err(err) => break err,
        }
    };
    let MonoError::NonConvergent { rounds, pending } = err;
    assert_eq!(rounds, 5);
    assert_eq!(pending.len(), 1);
}

#[test]
fn unresolved_requests_are_deferred_not_queued() {
    let mut registry = InstantiationRegistry::new(100);
    let name = registry.defer_unresolved(InstKind::Enum, "Maybe", &[Type::param("T")]);
    let again = registry.defer_unresolved(InstKind::Enum, "Maybe", &[Type::param("T")]);
    assert_eq!(name, "Maybe__UNRESOLVED");
    assert_eq!(name, again);
    assert_eq!(registry.pending(), 0);
    assert_eq!(registry.deferred().len(), 1);
}
