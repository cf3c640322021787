/// Unit tests for bindings, generic arguments and cache keys

use activation_cache::{callbacks, Binding, CacheKey, GenericArgument, ScopeRef};
use proptest::prelude::*;
use std::any::TypeId;
use std::sync::Arc;

#[test]
fn test_binding_identity_not_name() {
    let a = Binding::new("Sword");
    let b = Binding::new("Sword");
    assert!(a.same_as(&a.clone()));
    assert!(!a.same_as(&b));
    assert_eq!(a.service(), b.service());
}

#[test]
fn test_binding_resolves_its_scope() {
    let scope = ScopeRef::new(Arc::new(()));
    let binding = Binding::with_scope("Sword", callbacks::of_scope(&scope));
    assert_eq!(binding.resolve_scope().unwrap().id(), scope.id());
    assert!(Binding::new("Transient").resolve_scope().is_none());
}

#[test]
fn test_generic_argument_compares_by_type() {
    assert_eq!(GenericArgument::of::<i32>(), GenericArgument::of::<i32>());
    assert_ne!(GenericArgument::of::<i32>(), GenericArgument::of::<f64>());
    assert_eq!(GenericArgument::of::<String>().type_id(), TypeId::of::<String>());
    assert!(GenericArgument::of::<String>().name().contains("String"));
}

#[test]
fn test_empty_generic_arguments_mean_none() {
    let binding = Binding::new("Repository<T>");
    let key = CacheKey::new(binding.clone(), Some(&[]));
    assert!(key.generic_arguments().is_none());
    assert!(key.matches(&binding, None));
    assert!(key.matches(&binding, Some(&[])));
}

#[test]
fn test_generic_arguments_compare_by_position() {
    let binding = Binding::new("Map<K, V>");
    let key = CacheKey::new(
        binding.clone(),
        Some(&[GenericArgument::of::<String>(), GenericArgument::of::<u32>()]),
    );
    let same = [GenericArgument::of::<String>(), GenericArgument::of::<u32>()];
    let swapped = [GenericArgument::of::<u32>(), GenericArgument::of::<String>()];
    assert!(key.matches(&binding, Some(&same)));
    assert!(!key.matches(&binding, Some(&swapped)));
    assert!(!key.matches(&binding, Some(&[GenericArgument::of::<String>()])));
}

fn argument(index: u8) -> GenericArgument {
    match index % 4 {
        0 => GenericArgument::of::<i32>(),
        1 => GenericArgument::of::<f64>(),
        2 => GenericArgument::of::<String>(),
        _ => GenericArgument::of::<Vec<u8>>(),
    }
}

// Property: a key matches exactly the argument lists equal to its own
proptest! {
    #[test]
    fn key_matches_iff_arguments_equal(
        ours in prop::collection::vec(0u8..4, 0..4),
        theirs in prop::collection::vec(0u8..4, 0..4),
    ) {
        let binding = Binding::new("Generic");
        let ours: Vec<GenericArgument> = ours.into_iter().map(argument).collect();
        let theirs: Vec<GenericArgument> = theirs.into_iter().map(argument).collect();

        let key = CacheKey::new(binding.clone(), Some(ours.as_slice()));
        prop_assert!(key.matches(&binding, Some(ours.as_slice())));
        prop_assert_eq!(key.matches(&binding, Some(theirs.as_slice())), ours == theirs);
        prop_assert!(!key.matches(&Binding::new("Generic"), Some(ours.as_slice())));
    }
}
