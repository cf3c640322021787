use activation_cache::{
    callbacks, ActivationCache, Binding, CacheError, Context, DeactivationContext,
    DeactivationError, DeactivationReason, GenericArgument, InstanceReference, ObjectId, Pipeline,
    ScopeRef,
};
use std::sync::{Arc, Mutex};

/// Pipeline that records every deactivation it sees.
#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<(ObjectId, DeactivationReason)>>,
}

impl Recorder {
    fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn count_for<T>(&self, instance: &Arc<T>) -> usize {
        let id = ObjectId::of(instance);
        self.calls.lock().unwrap().iter().filter(|(seen, _)| *seen == id).count()
    }

    fn reasons(&self) -> Vec<DeactivationReason> {
        self.calls.lock().unwrap().iter().map(|(_, reason)| *reason).collect()
    }
}

impl Pipeline for Recorder {
    fn deactivate(
        &self,
        context: &DeactivationContext,
        reference: &InstanceReference,
    ) -> Result<(), DeactivationError> {
        self.calls.lock().unwrap().push((reference.id(), context.reason()));
        Ok(())
    }
}

fn cache_with_recorder() -> (ActivationCache, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    (ActivationCache::new(recorder.clone()), recorder)
}

struct Sword {
    damage: u32,
}

#[test]
fn test_remember_then_try_get_returns_same_instance() {
    let (cache, _) = cache_with_recorder();
    let scope = Arc::new(());
    let ctx = Context::new(Binding::with_scope("Sword", callbacks::of(&scope)));

    let sword = Arc::new(Sword { damage: 7 });
    cache.remember(&ctx, InstanceReference::new(sword.clone())).unwrap();

    let cached = cache.try_get_as::<Sword, _>(&ctx).unwrap();
    assert!(Arc::ptr_eq(&cached, &sword));
    assert_eq!(cached.damage, 7);
    assert_eq!(cache.count(), 1);
    assert_eq!(cache.scope_count(), 1);
}

#[test]
fn test_try_get_misses_for_other_binding_in_same_scope() {
    let (cache, _) = cache_with_recorder();
    let scope = Arc::new(());
    let sword = Context::new(Binding::with_scope("Sword", callbacks::of(&scope)));
    let shield = Context::new(Binding::with_scope("Shield", callbacks::of(&scope)));

    cache.remember(&sword, InstanceReference::new(Arc::new(Sword { damage: 1 }))).unwrap();
    assert!(cache.try_get(&shield).is_none());
}

#[test]
fn test_bindings_with_same_name_are_distinct() {
    let (cache, _) = cache_with_recorder();
    let scope = Arc::new(());
    let first = Context::new(Binding::with_scope("Sword", callbacks::of(&scope)));
    let second = Context::new(Binding::with_scope("Sword", callbacks::of(&scope)));

    cache.remember(&first, InstanceReference::new(Arc::new(Sword { damage: 1 }))).unwrap();
    assert!(cache.try_get(&first).is_some());
    assert!(cache.try_get(&second).is_none());
}

#[test]
fn test_generic_arguments_discriminate_entries() {
    let (cache, _) = cache_with_recorder();
    let scope = Arc::new(());
    let binding = Binding::with_scope("Repository", callbacks::of(&scope));

    let ints =
        Context::new(binding.clone()).with_generic_arguments(vec![GenericArgument::of::<i32>()]);
    let doubles =
        Context::new(binding.clone()).with_generic_arguments(vec![GenericArgument::of::<f64>()]);
    let bare = Context::new(binding);

    cache.remember(&ints, InstanceReference::new(Arc::new(1u8))).unwrap();

    assert!(cache.try_get(&doubles).is_none());
    assert!(cache.try_get(&bare).is_none());
    assert!(cache.try_get(&ints).is_some());
}

#[test]
fn test_scopeless_instances_are_never_returned() {
    let (cache, recorder) = cache_with_recorder();
    let ctx = Context::new(Binding::with_scope("Transient", callbacks::transient()));

    let instance = Arc::new(3u32);
    cache.remember(&ctx, InstanceReference::new(instance.clone())).unwrap();
    assert!(cache.try_get(&ctx).is_none());

    // Still tracked, so it can be released
    assert_eq!(cache.count(), 1);
    assert!(cache.release(&instance).unwrap());
    assert_eq!(recorder.count_for(&instance), 1);
}

#[test]
fn test_scopeless_instances_can_be_left_untracked() {
    let recorder = Arc::new(Recorder::default());
    let cache = ActivationCache::builder(recorder.clone())
        .settings(activation_cache::CacheSettings::default().with_track_scopeless(false))
        .build();
    let ctx = Context::new(Binding::new("Transient"));

    let instance = Arc::new(3u32);
    cache.remember(&ctx, InstanceReference::new(instance.clone())).unwrap();
    assert_eq!(cache.count(), 0);
    assert!(!cache.release(&instance).unwrap());
    assert_eq!(recorder.count(), 0);
}

#[test]
fn test_context_scope_overrides_binding_scope() {
    let (cache, _) = cache_with_recorder();
    let binding_scope = Arc::new(1u8);
    let request = Arc::new(2u8);
    let binding = Binding::with_scope("Sword", callbacks::of(&binding_scope));

    let in_request = Context::new(binding.clone()).with_scope(callbacks::of(&request));
    cache.remember(&in_request, InstanceReference::new(Arc::new(Sword { damage: 2 }))).unwrap();

    assert!(cache.try_get(&in_request).is_some());
    assert!(cache.try_get(&Context::new(binding)).is_none());
    assert_eq!(cache.clear_scope_of(&request).unwrap(), 1);
}

#[test]
fn test_lookup_returns_first_remembered_instance() {
    let (cache, _) = cache_with_recorder();
    let scope = ScopeRef::new(Arc::new(()));
    let ctx = Context::new(Binding::with_scope("Sword", callbacks::of_scope(&scope)));

    let first = Arc::new(Sword { damage: 1 });
    cache.remember(&ctx, InstanceReference::new(first.clone())).unwrap();
    cache.remember(&ctx, InstanceReference::new(Arc::new(Sword { damage: 2 }))).unwrap();

    assert_eq!(cache.count(), 2);
    let cached = cache.try_get_as::<Sword, _>(&ctx).unwrap();
    assert!(Arc::ptr_eq(&cached, &first));
}

#[test]
fn test_release_is_idempotent() {
    let (cache, recorder) = cache_with_recorder();
    let scope = Arc::new(());
    let ctx = Context::new(Binding::with_scope("Sword", callbacks::of(&scope)));

    let sword = Arc::new(Sword { damage: 5 });
    cache.remember(&ctx, InstanceReference::new(sword.clone())).unwrap();

    assert!(cache.release(&sword).unwrap());
    assert_eq!(recorder.count_for(&sword), 1);
    assert_eq!(recorder.reasons(), vec![DeactivationReason::Released]);

    assert!(!cache.release(&sword).unwrap());
    assert_eq!(recorder.count_for(&sword), 1);
    assert!(cache.try_get(&ctx).is_none());
    assert_eq!(cache.scope_count(), 0);
}

#[test]
fn test_release_of_unknown_instance_returns_false() {
    let (cache, recorder) = cache_with_recorder();
    assert!(!cache.release(&Arc::new(0u8)).unwrap());
    assert_eq!(recorder.count(), 0);
}

#[test]
fn test_instance_cached_under_two_scopes_is_deactivated_once() {
    let (cache, recorder) = cache_with_recorder();
    let a = Arc::new(1u8);
    let b = Arc::new(2u8);
    let in_a = Context::new(Binding::with_scope("Shared", callbacks::of(&a)));
    let in_b = Context::new(Binding::with_scope("Shared", callbacks::of(&b)));

    let shared = Arc::new(Sword { damage: 3 });
    cache.remember(&in_a, InstanceReference::new(shared.clone())).unwrap();
    cache.remember(&in_b, InstanceReference::new(shared.clone())).unwrap();
    assert_eq!(cache.count(), 2);

    assert!(cache.release(&shared).unwrap());
    assert_eq!(cache.count(), 0);
    assert_eq!(recorder.count_for(&shared), 1);
}

#[test]
fn test_instance_shared_by_two_scopes_outlives_the_first() {
    let (cache, recorder) = cache_with_recorder();
    let a = Arc::new(1u8);
    let b = Arc::new(2u8);
    let in_a = Context::new(Binding::with_scope("Shared", callbacks::of(&a)));
    let in_b = Context::new(Binding::with_scope("Shared", callbacks::of(&b)));

    let shared = Arc::new(Sword { damage: 4 });
    cache.remember(&in_a, InstanceReference::new(shared.clone())).unwrap();
    cache.remember(&in_b, InstanceReference::new(shared.clone())).unwrap();

    // Scope a ends: its entry goes, but b still holds the instance
    drop(a);
    assert_eq!(cache.prune().unwrap(), 1);
    assert_eq!(cache.count(), 1);
    assert_eq!(recorder.count(), 0);
    let cached = cache.try_get_as::<Sword, _>(&in_b).unwrap();
    assert!(Arc::ptr_eq(&cached, &shared));

    assert_eq!(cache.clear_scope_of(&b).unwrap(), 1);
    assert_eq!(cache.count(), 0);
    assert_eq!(recorder.count_for(&shared), 1);
    assert_eq!(recorder.reasons(), vec![DeactivationReason::ScopeCleared]);
    assert!(cache.try_get(&in_b).is_none());
}

#[test]
fn test_clear_removes_everything_once() {
    let (cache, recorder) = cache_with_recorder();
    let scope = Arc::new(());
    let ctx = Context::new(Binding::with_scope("Sword", callbacks::of(&scope)));

    let sword = Arc::new(Sword { damage: 9 });
    cache.remember(&ctx, InstanceReference::new(sword.clone())).unwrap();
    assert_eq!(cache.count(), 1);

    assert_eq!(cache.clear().unwrap(), 1);
    assert_eq!(cache.count(), 0);
    assert_eq!(recorder.count_for(&sword), 1);
    assert_eq!(recorder.reasons(), vec![DeactivationReason::Cleared]);

    // Nothing left to deactivate
    assert_eq!(cache.clear().unwrap(), 0);
    assert_eq!(recorder.count(), 1);
}

#[test]
fn test_clear_includes_scopeless_instances() {
    let (cache, recorder) = cache_with_recorder();
    cache
        .remember(&Context::new(Binding::new("Transient")), InstanceReference::new(Arc::new(1u8)))
        .unwrap();
    assert_eq!(cache.clear().unwrap(), 1);
    assert_eq!(recorder.count(), 1);
}

#[test]
fn test_metrics_track_hits_and_misses() {
    let (cache, _) = cache_with_recorder();
    let scope = Arc::new(());
    let ctx = Context::new(Binding::with_scope("Sword", callbacks::of(&scope)));

    assert!(cache.try_get(&ctx).is_none());
    cache.remember(&ctx, InstanceReference::new(Arc::new(Sword { damage: 1 }))).unwrap();
    assert!(cache.try_get(&ctx).is_some());
    assert!(cache.try_get(&ctx).is_some());

    let metrics = cache.metrics();
    assert_eq!(metrics.hits, 2);
    assert_eq!(metrics.misses, 1);
    assert_eq!(metrics.remembered, 1);
    assert!((metrics.hit_ratio() - 2.0 / 3.0).abs() < f64::EPSILON);
}

#[test]
fn test_remember_after_dispose_fails() {
    let (cache, _) = cache_with_recorder();
    cache.dispose().unwrap();
    assert!(cache.is_disposed());

    let scope = Arc::new(());
    let ctx = Context::new(Binding::with_scope("Sword", callbacks::of(&scope)));
    let err = cache.remember(&ctx, InstanceReference::new(Arc::new(1u8))).unwrap_err();
    assert_eq!(err, CacheError::Disposed);
    assert!(cache.try_get(&ctx).is_none());
    assert_eq!(cache.count(), 0);
}

#[test]
fn test_clones_share_state() {
    let (cache, _) = cache_with_recorder();
    let other = cache.clone();
    let scope = Arc::new(());
    let ctx = Context::new(Binding::with_scope("Sword", callbacks::of(&scope)));

    cache.remember(&ctx, InstanceReference::new(Arc::new(1u8))).unwrap();
    assert!(other.try_get(&ctx).is_some());
    assert_eq!(other.count(), 1);
}
