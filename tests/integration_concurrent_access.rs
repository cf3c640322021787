/// Concurrent access integration tests
///
/// These tests race release, clear, clear-scope, prune and disposal against
/// each other and check that every instance is deactivated at most once.

use activation_cache::{
    callbacks, ActivationBlock, ActivationCache, Binding, CachePruner, Context, DeactivationContext,
    DeactivationError, InstanceReference, ObjectId, Pipeline, ScopeRef,
};
use std::collections::HashMap;
use std::sync::{Arc, Barrier, Mutex};
use std::time::Duration;

/// Counts deactivations per instance. Deactivated references are kept alive
/// so their addresses are not reused by later instances.
#[derive(Default)]
struct CountingPipeline {
    counts: Mutex<HashMap<ObjectId, usize>>,
    retained: Mutex<Vec<InstanceReference>>,
}

impl CountingPipeline {
    fn total(&self) -> usize {
        self.counts.lock().unwrap().values().sum()
    }

    fn max_per_instance(&self) -> usize {
        self.counts.lock().unwrap().values().copied().max().unwrap_or(0)
    }
}

impl Pipeline for CountingPipeline {
    fn deactivate(
        &self,
        _context: &DeactivationContext,
        reference: &InstanceReference,
    ) -> Result<(), DeactivationError> {
        *self.counts.lock().unwrap().entry(reference.id()).or_insert(0) += 1;
        self.retained.lock().unwrap().push(reference.clone());
        Ok(())
    }
}

const INSTANCES: usize = 200;

#[test]
fn test_racing_removals_deactivate_at_most_once() {
    let pipeline = Arc::new(CountingPipeline::default());
    let cache = ActivationCache::new(pipeline.clone());
    let scope = ScopeRef::new(Arc::new(()));
    let binding = Binding::new("Raced");
    let ctx = Context::new(binding).with_scope(callbacks::of_scope(&scope));

    let instances: Vec<Arc<usize>> = (0..INSTANCES).map(Arc::new).collect();
    for instance in &instances {
        cache.remember(&ctx, InstanceReference::new(instance.clone())).unwrap();
    }
    assert_eq!(cache.count(), INSTANCES);

    let barrier = Barrier::new(4);
    crossbeam_utils::thread::scope(|s| {
        s.spawn(|_| {
            barrier.wait();
            for instance in &instances {
                cache.release(instance).unwrap();
            }
        });
        s.spawn(|_| {
            barrier.wait();
            for instance in instances.iter().rev() {
                cache.release(instance).unwrap();
            }
        });
        s.spawn(|_| {
            barrier.wait();
            cache.clear_scope(&scope).unwrap();
        });
        s.spawn(|_| {
            barrier.wait();
            cache.clear().unwrap();
        });
    })
    .unwrap();

    assert_eq!(cache.count(), 0);
    assert_eq!(pipeline.total(), INSTANCES);
    assert_eq!(pipeline.max_per_instance(), 1);
}

#[test]
fn test_prune_racing_release_deactivates_at_most_once() {
    let pipeline = Arc::new(CountingPipeline::default());
    let cache = ActivationCache::new(pipeline.clone());

    let mut instances = Vec::new();
    {
        let scope = Arc::new(());
        let ctx = Context::new(Binding::with_scope("Raced", callbacks::of(&scope)));
        for i in 0..INSTANCES {
            let instance = Arc::new(i);
            cache.remember(&ctx, InstanceReference::new(instance.clone())).unwrap();
            instances.push(instance);
        }
    }

    let barrier = Barrier::new(3);
    crossbeam_utils::thread::scope(|s| {
        s.spawn(|_| {
            barrier.wait();
            for instance in &instances {
                cache.release(instance).unwrap();
            }
        });
        s.spawn(|_| {
            barrier.wait();
            for _ in 0..50 {
                cache.prune().unwrap();
            }
        });
        s.spawn(|_| {
            barrier.wait();
            cache.dispose().unwrap();
        });
    })
    .unwrap();

    assert_eq!(cache.count(), 0);
    assert_eq!(pipeline.total(), INSTANCES);
    assert_eq!(pipeline.max_per_instance(), 1);
}

#[test]
fn test_concurrent_remember_and_lookup_across_scopes() {
    let pipeline = Arc::new(CountingPipeline::default());
    let cache = ActivationCache::new(pipeline.clone());
    let threads = 8;
    let per_thread = 50;

    crossbeam_utils::thread::scope(|s| {
        for _ in 0..threads {
            s.spawn(|_| {
                let request = Arc::new(());
                let ctx = Context::new(Binding::with_scope("Session", callbacks::of(&request)));
                for i in 0..per_thread {
                    let instance = Arc::new(i);
                    cache.remember(&ctx, InstanceReference::new(instance)).unwrap();
                    // Each thread only ever sees its own request's first instance
                    let first = cache.try_get_as::<usize, _>(&ctx).unwrap();
                    assert_eq!(*first, 0);
                }
                cache.clear_scope_of(&request).unwrap();
            });
        }
    })
    .unwrap();

    assert_eq!(cache.count(), 0);
    assert_eq!(pipeline.total(), threads * per_thread);
    assert_eq!(pipeline.max_per_instance(), 1);
}

#[test]
fn test_block_disposal_racing_clear() {
    let pipeline = Arc::new(CountingPipeline::default());
    let cache = ActivationCache::new(pipeline.clone());

    for _ in 0..50 {
        let block = ActivationBlock::new();
        let ctx =
            Context::new(Binding::new("Unit")).with_scope(callbacks::of_scope(&block.scope()));
        for i in 0..4 {
            cache.remember(&ctx, InstanceReference::new(Arc::new(i))).unwrap();
        }

        let barrier = Barrier::new(2);
        crossbeam_utils::thread::scope(|s| {
            s.spawn(|_| {
                barrier.wait();
                block.dispose();
            });
            s.spawn(|_| {
                barrier.wait();
                cache.clear().unwrap();
            });
        })
        .unwrap();
        assert_eq!(cache.count(), 0);
    }

    assert_eq!(pipeline.total(), 200);
    assert_eq!(pipeline.max_per_instance(), 1);
}

#[test]
fn test_background_pruner_with_concurrent_requests() {
    let pipeline = Arc::new(CountingPipeline::default());
    let pruner = CachePruner::new(Duration::from_millis(2));
    let cache = ActivationCache::builder(pipeline.clone()).pruner(&pruner).build();
    pruner.start().unwrap();

    crossbeam_utils::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|_| {
                for _ in 0..25 {
                    let request = Arc::new(());
                    let ctx = Context::new(Binding::with_scope("Request", callbacks::of(&request)));
                    cache.remember(&ctx, InstanceReference::new(Arc::new(0u8))).unwrap();
                    std::thread::sleep(Duration::from_micros(200));
                }
            });
        }
    })
    .unwrap();

    pruner.stop();
    cache.prune().unwrap();

    assert_eq!(cache.count(), 0);
    assert_eq!(pipeline.total(), 100);
    assert_eq!(pipeline.max_per_instance(), 1);
}
