#![no_main]

use activation_cache::{
    callbacks, ActivationCache, Binding, Context, DeactivationContext, DeactivationError,
    InstanceReference, ObjectId,
};
use libfuzzer_sys::fuzz_target;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

const SCOPES: usize = 4;

// Interprets each byte as one cache operation and checks that no instance is
// ever deactivated twice and that the count matches a model.
fuzz_target!(|data: &[u8]| {
    let deactivated: Arc<Mutex<HashMap<ObjectId, usize>>> = Arc::new(Mutex::new(HashMap::new()));
    let seen = deactivated.clone();
    let cache = ActivationCache::new(Arc::new(
        move |_: &DeactivationContext,
              reference: &InstanceReference|
              -> Result<(), DeactivationError> {
            *seen.lock().unwrap().entry(reference.id()).or_insert(0) += 1;
            Ok(())
        },
    ));

    let mut scopes: Vec<Option<Arc<usize>>> = (0..SCOPES).map(|i| Some(Arc::new(i))).collect();
    let bindings: Vec<Binding> = (0..SCOPES).map(|_| Binding::new("Fuzzed")).collect();
    // Instances are kept alive so their ids stay unique
    let mut instances: Vec<Arc<u8>> = Vec::new();
    let mut live: HashSet<ObjectId> = HashSet::new();

    for &byte in data {
        let slot = (byte >> 3) as usize % SCOPES;
        match byte & 0b111 {
            0 | 1 => {
                let Some(scope) = scopes[slot].clone() else { continue };
                let ctx = Context::new(bindings[slot].clone()).with_scope(callbacks::of(&scope));
                let instance = Arc::new(byte);
                if cache.remember(&ctx, InstanceReference::new(instance.clone())).is_ok() {
                    live.insert(ObjectId::of(&instance));
                }
                instances.push(instance);
            }
            2 => {
                if let Some(instance) = instances.get(byte as usize % instances.len().max(1)) {
                    let _ = cache.release(instance);
                }
            }
            3 => {
                if let Some(scope) = &scopes[slot] {
                    let _ = cache.clear_scope_of(scope);
                }
            }
            4 => {
                scopes[slot] = None;
            }
            5 => {
                let _ = cache.prune();
            }
            6 => {
                let _ = cache.clear();
            }
            _ => {
                scopes[slot] = Some(Arc::new(slot));
            }
        }

        let counts = deactivated.lock().unwrap();
        assert!(counts.values().all(|&n| n == 1));
        let remaining = live.iter().filter(|id| !counts.contains_key(id)).count();
        assert_eq!(cache.count(), remaining);
    }

    cache.dispose().unwrap();
    assert_eq!(cache.count(), 0);
});
