//! The activation cache.
//!
//! Instances are remembered under the scope their binding resolves to and
//! handed back to later activations in the same scope. Scopes are held weakly;
//! when a scope dies its instances are deactivated by the next prune, or
//! immediately if the scope announces its own disposal.

mod entry;
mod index;

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::config::CacheSettings;
use crate::context::{ActivationContext, DeactivationContext, DeactivationReason};
use crate::error::{pass_result, CacheError, CacheResult, DeactivationError};
use crate::instance::{AnyArc, InstanceReference, ObjectId};
use crate::internal::catch_deactivation;
use crate::key::CacheKey;
use crate::metrics::{CacheMetrics, MetricsSnapshot};
use crate::observer::{CacheObserver, CacheObservers};
use crate::pruner::{CachePruner, PrunerInner};
use crate::scope::{DisposedCallback, NotifyWhenDisposed, ScopeRef};
use crate::traits::Pipeline;

use entry::InstanceEntry;
use index::{Inserted, Removal, ScopeIndex};

/// Scope-bound instance cache.
///
/// Cloning an `ActivationCache` yields another handle to the same cache. All
/// operations are safe to call concurrently from any number of threads.
///
/// # Examples
///
/// ```
/// use activation_cache::{ActivationCache, Binding, Context, DisposingPipeline, InstanceReference};
/// use activation_cache::callbacks;
/// use std::sync::Arc;
///
/// struct Sword;
///
/// let cache = ActivationCache::new(Arc::new(DisposingPipeline));
/// let request = Arc::new("request-1".to_string());
/// let binding = Binding::with_scope("Sword", callbacks::of(&request));
/// let ctx = Context::new(binding);
///
/// assert!(cache.try_get(&ctx).is_none());
///
/// let sword = Arc::new(Sword);
/// cache.remember(&ctx, InstanceReference::new(sword.clone())).unwrap();
/// let cached = cache.try_get(&ctx).unwrap();
/// assert!(Arc::ptr_eq(&cached.downcast::<Sword>().unwrap(), &sword));
///
/// // The request ends: its instances become prunable
/// drop(request);
/// assert_eq!(cache.prune().unwrap(), 1);
/// assert_eq!(cache.count(), 0);
/// ```
#[derive(Clone)]
pub struct ActivationCache {
    inner: Arc<CacheInner>,
}

pub(crate) struct CacheInner {
    pipeline: Arc<dyn Pipeline>,
    settings: CacheSettings,
    observers: CacheObservers,
    metrics: CacheMetrics,
    state: Mutex<CacheState>,
    pruner: Mutex<Option<Weak<PrunerInner>>>,
}

struct CacheState {
    index: ScopeIndex,
    disposed: bool,
}

/// Builder for [`ActivationCache`].
pub struct CacheBuilder {
    pipeline: Arc<dyn Pipeline>,
    settings: CacheSettings,
    observers: CacheObservers,
    pruner: Option<CachePruner>,
}

impl CacheBuilder {
    /// Uses `settings` instead of the defaults.
    pub fn settings(mut self, settings: CacheSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Adds an observer.
    pub fn observer(mut self, observer: Arc<dyn CacheObserver>) -> Self {
        self.observers.add(observer);
        self
    }

    /// Registers the built cache with `pruner`.
    pub fn pruner(mut self, pruner: &CachePruner) -> Self {
        self.pruner = Some(pruner.clone());
        self
    }

    /// Builds the cache.
    pub fn build(self) -> ActivationCache {
        let cache = ActivationCache {
            inner: Arc::new(CacheInner {
                pipeline: self.pipeline,
                settings: self.settings,
                observers: self.observers,
                metrics: CacheMetrics::default(),
                state: Mutex::new(CacheState {
                    index: ScopeIndex::new(),
                    disposed: false,
                }),
                pruner: Mutex::new(None),
            }),
        };
        if let Some(pruner) = self.pruner {
            pruner.register(&cache);
        }
        cache
    }
}

impl ActivationCache {
    /// Creates a cache with default settings.
    pub fn new(pipeline: Arc<dyn Pipeline>) -> Self {
        Self::builder(pipeline).build()
    }

    /// Starts building a cache.
    pub fn builder(pipeline: Arc<dyn Pipeline>) -> CacheBuilder {
        CacheBuilder {
            pipeline,
            settings: CacheSettings::default(),
            observers: CacheObservers::new(),
            pruner: None,
        }
    }

    /// Returns the instance cached for `ctx`, if any.
    ///
    /// A context whose scope resolves to nothing always misses.
    pub fn try_get<C>(&self, ctx: &C) -> Option<AnyArc>
    where
        C: ActivationContext + ?Sized,
    {
        self.try_get_reference(ctx)
            .map(|reference| reference.instance().clone())
    }

    /// Typed variant of [`try_get`](Self::try_get).
    pub fn try_get_as<T, C>(&self, ctx: &C) -> Option<Arc<T>>
    where
        T: std::any::Any + Send + Sync,
        C: ActivationContext + ?Sized,
    {
        self.try_get_reference(ctx)?.downcast::<T>()
    }

    /// Like [`try_get`](Self::try_get), but returns the full reference.
    pub fn try_get_reference<C>(&self, ctx: &C) -> Option<InstanceReference>
    where
        C: ActivationContext + ?Sized,
    {
        self.inner.try_get(ctx)
    }

    /// Remembers `reference` as the instance produced for `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Disposed`] once the cache is disposed. If the
    /// context's scope was already disposed, the instance is deactivated
    /// straight away and any failure is returned.
    pub fn remember<C>(&self, ctx: &C, reference: InstanceReference) -> CacheResult<()>
    where
        C: ActivationContext + ?Sized,
    {
        self.inner.remember(ctx, reference)
    }

    /// Deactivates and forgets `instance`. Returns whether it was cached.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Deactivation`] if the pipeline failed; the
    /// instance is forgotten regardless.
    pub fn release<T: ?Sized>(&self, instance: &Arc<T>) -> CacheResult<bool> {
        self.inner.release(ObjectId::of(instance))
    }

    /// Forgets every entry cached under `scope`, deactivating instances not
    /// cached anywhere else. Returns the number of entries removed.
    pub fn clear_scope(&self, scope: &ScopeRef) -> CacheResult<usize> {
        self.inner
            .clear_scope_id(scope.id(), None, DeactivationReason::ScopeCleared)
    }

    /// Like [`clear_scope`](Self::clear_scope), for a scope given as a plain
    /// shared object.
    pub fn clear_scope_of<T: ?Sized>(&self, scope: &Arc<T>) -> CacheResult<usize> {
        self.inner
            .clear_scope_id(ObjectId::of(scope), None, DeactivationReason::ScopeCleared)
    }

    /// Deactivates and forgets every cached instance, scope-less ones
    /// included. Returns the number of entries removed.
    pub fn clear(&self) -> CacheResult<usize> {
        let removal = self.inner.state.lock().index.take_all(DeactivationReason::Cleared);
        self.inner.finish(removal)
    }

    /// Deactivates instances whose scope is no longer alive. Returns the
    /// number of entries removed. An instance still cached under a live
    /// scope stays cached.
    ///
    /// A disposed cache prunes nothing.
    pub fn prune(&self) -> CacheResult<usize> {
        let (removed, failures) = self.inner.prune_pass();
        pass_result(removed, failures)
    }

    /// Number of tracked entries.
    pub fn count(&self) -> usize {
        self.inner.state.lock().index.len()
    }

    /// Number of scopes with at least one tracked instance.
    pub fn scope_count(&self) -> usize {
        self.inner.state.lock().index.scope_count()
    }

    /// Deactivates everything, refuses further `remember` calls and leaves
    /// the pruner. Calling it again does nothing.
    pub fn dispose(&self) -> CacheResult<()> {
        self.inner.dispose().map(|_| ())
    }

    /// Whether [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Settings the cache was built with.
    pub fn settings(&self) -> &CacheSettings {
        &self.inner.settings
    }

    /// Current counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    pub(crate) fn inner(&self) -> &Arc<CacheInner> {
        &self.inner
    }

    pub(crate) fn from_inner(inner: Arc<CacheInner>) -> Self {
        Self { inner }
    }
}

impl CacheInner {
    fn try_get<C>(&self, ctx: &C) -> Option<InstanceReference>
    where
        C: ActivationContext + ?Sized,
    {
        let binding = ctx.binding();
        let found = match ctx.resolve_scope() {
            Some(scope) => {
                let state = self.state.lock();
                if state.disposed {
                    None
                } else {
                    state
                        .index
                        .find(scope.id(), binding, ctx.generic_arguments())
                        .map(|entry| entry.reference().clone())
                }
            }
            None => None,
        };

        if found.is_some() {
            self.metrics.record_hit();
            self.observers.hit(binding);
        } else {
            self.metrics.record_miss();
            self.observers.miss(binding);
        }
        found
    }

    fn remember<C>(self: &Arc<Self>, ctx: &C, reference: InstanceReference) -> CacheResult<()>
    where
        C: ActivationContext + ?Sized,
    {
        let scope = ctx.resolve_scope();
        if scope.is_none() && !self.settings.track_scopeless {
            return if self.is_disposed() {
                Err(CacheError::Disposed)
            } else {
                Ok(())
            };
        }

        let key = CacheKey::new(ctx.binding().clone(), ctx.generic_arguments());
        let entry = InstanceEntry::new(key.clone(), reference);
        let inserted = {
            let mut state = self.state.lock();
            if state.disposed {
                drop(state);
                return Err(CacheError::Disposed);
            }
            state.index.insert(scope.as_ref(), entry)
        };

        self.metrics.record_remembered();
        if self.observers.has_observers() {
            self.observers.remembered(&key, scope.is_some());
        }

        match (scope, inserted) {
            (Some(scope), Inserted::NewScope { generation }) => match scope.notifier() {
                Some(notifier) => self.watch_disposal(scope.id(), generation, notifier),
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }

    /// Subscribes to a new scope's disposal. The subscription is made outside
    /// the lock and attached afterwards; a record removed in between gets its
    /// subscription dropped here.
    fn watch_disposal(
        self: &Arc<Self>,
        scope: ObjectId,
        generation: u64,
        notifier: &Arc<dyn NotifyWhenDisposed>,
    ) -> CacheResult<()> {
        let cache = Arc::downgrade(self);
        let callback: DisposedCallback = Box::new(move || {
            if let Some(cache) = cache.upgrade() {
                if let Err(err) =
                    cache.clear_scope_id(scope, Some(generation), DeactivationReason::ScopeDisposed)
                {
                    log::warn!("[activation-cache] clearing disposed scope {}: {}", scope, err);
                }
            }
        });

        match notifier.subscribe(callback) {
            Some(subscription) => {
                let attached = self
                    .state
                    .lock()
                    .index
                    .attach_subscription(scope, generation, subscription);
                if !attached {
                    notifier.unsubscribe(subscription);
                }
                Ok(())
            }
            None => self
                .clear_scope_id(scope, Some(generation), DeactivationReason::ScopeDisposed)
                .map(|_| ()),
        }
    }

    fn release(&self, instance: ObjectId) -> CacheResult<bool> {
        let removal = self.state.lock().index.take_instance(instance);
        let found = !removal.is_empty();
        self.finish(removal).map(|_| found)
    }

    pub(crate) fn clear_scope_id(
        &self,
        scope: ObjectId,
        generation: Option<u64>,
        reason: DeactivationReason,
    ) -> CacheResult<usize> {
        let removal = self.state.lock().index.take_scope(scope, generation, reason);
        self.finish(removal)
    }

    pub(crate) fn prune_pass(&self) -> (usize, Vec<DeactivationError>) {
        let (removal, scopes) = {
            let mut state = self.state.lock();
            if state.disposed {
                return (0, Vec::new());
            }
            state.index.take_dead()
        };

        self.metrics.record_prune(scopes);
        if scopes > 0 {
            log::debug!(
                "[activation-cache] pruning {} unreachable scope(s), {} instance(s)",
                scopes,
                removal.removed
            );
        }
        let (removed, failures) = self.deactivate_all(removal);
        self.observers.pruned(scopes, removed);
        (removed, failures)
    }

    fn dispose(&self) -> CacheResult<usize> {
        let removal = {
            let mut state = self.state.lock();
            if state.disposed {
                return Ok(0);
            }
            state.disposed = true;
            state.index.take_all(DeactivationReason::CacheDisposed)
        };

        let pruner = self.pruner.lock().take();
        if let Some(pruner) = pruner.and_then(|weak| weak.upgrade()) {
            pruner.forget(self);
        }
        self.finish(removal)
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    /// Records the pruner this cache is registered with, returning the
    /// previous one.
    pub(crate) fn attach_pruner(&self, pruner: Weak<PrunerInner>) -> Option<Weak<PrunerInner>> {
        self.pruner.lock().replace(pruner)
    }

    pub(crate) fn detach_pruner(&self, pruner: &Weak<PrunerInner>) {
        let mut current = self.pruner.lock();
        if current.as_ref().map_or(false, |weak| weak.ptr_eq(pruner)) {
            *current = None;
        }
    }

    fn finish(&self, removal: Removal) -> CacheResult<usize> {
        let (removed, failures) = self.deactivate_all(removal);
        pass_result(removed, failures)
    }

    /// Deactivates removed instances outside the lock. Returns the number of
    /// entries removed, which counts an instance once per key it was cached
    /// under.
    fn deactivate_all(&self, removal: Removal) -> (usize, Vec<DeactivationError>) {
        for scope in removal.scopes {
            scope.unsubscribe();
        }

        let removed = removal.removed;
        let mut failures = Vec::new();
        for (entry, reason) in removal.entries {
            if let Err(err) = self.deactivate(&entry, reason) {
                failures.push(err);
            }
        }
        (removed, failures)
    }

    fn deactivate(
        &self,
        entry: &InstanceEntry,
        reason: DeactivationReason,
    ) -> Result<(), DeactivationError> {
        let context = DeactivationContext::new(entry.key().clone(), reason);
        let result = catch_deactivation(entry.service(), || {
            self.pipeline.deactivate(&context, entry.reference())
        });

        self.metrics.record_deactivation(result.is_err());
        match &result {
            Ok(()) => self.observers.deactivated(&context),
            Err(err) => {
                log::warn!("[activation-cache] {}", err);
                self.observers.deactivation_failed(&context, err);
            }
        }
        result
    }
}

impl Drop for CacheInner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.disposed {
            return;
        }
        let removal = state.index.take_all(DeactivationReason::CacheDisposed);
        if !removal.is_empty() {
            log::warn!(
                "[activation-cache] cache dropped with {} undeactivated instance(s). \
                 Call dispose() before dropping.",
                removal.removed
            );
        }
        for scope in removal.scopes {
            scope.unsubscribe();
        }
    }
}

impl std::fmt::Debug for ActivationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ActivationCache")
            .field("count", &state.index.len())
            .field("scopes", &state.index.scope_count())
            .field("disposed", &state.disposed)
            .finish()
    }
}
