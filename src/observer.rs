//! Diagnostic observers for cache activity.
//!
//! Observers see every remember, lookup, deactivation and prune pass. They are
//! always called outside the cache lock. A panicking observer is logged and
//! skipped.

use std::sync::Arc;

use crate::context::DeactivationContext;
use crate::error::DeactivationError;
use crate::internal::catch_observer;
use crate::key::{Binding, CacheKey};

/// Observer trait for activation cache events.
///
/// # Performance
///
/// Observer calls are made synchronously on the calling thread (or the pruner
/// thread). Keep implementations lightweight.
///
/// # Examples
///
/// ```
/// use activation_cache::{CacheKey, CacheObserver, DeactivationContext};
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// #[derive(Default)]
/// struct CountingObserver {
///     deactivated: AtomicUsize,
/// }
///
/// impl CacheObserver for CountingObserver {
///     fn remembered(&self, _key: &CacheKey, _scoped: bool) {}
///
///     fn deactivated(&self, _context: &DeactivationContext) {
///         self.deactivated.fetch_add(1, Ordering::SeqCst);
///     }
/// }
/// ```
pub trait CacheObserver: Send + Sync {
    /// An instance was added to the cache.
    fn remembered(&self, key: &CacheKey, scoped: bool);

    /// An instance left the cache and its deactivation succeeded.
    fn deactivated(&self, context: &DeactivationContext);

    /// Lookup found a cached instance.
    fn hit(&self, _binding: &Binding) {}

    /// Lookup found nothing.
    fn miss(&self, _binding: &Binding) {}

    /// An instance left the cache but its deactivation failed.
    fn deactivation_failed(&self, _context: &DeactivationContext, _error: &DeactivationError) {}

    /// A prune pass finished.
    fn pruned(&self, _scopes: usize, _entries: usize) {}
}

/// Observer that writes cache events to the `log` facade.
///
/// Remember/deactivate go to `debug`, lookups to `trace`, failures to `warn`.
///
/// # Examples
///
/// ```
/// use activation_cache::{ActivationCache, DisposingPipeline, LoggingObserver};
/// use std::sync::Arc;
///
/// let cache = ActivationCache::builder(Arc::new(DisposingPipeline))
///     .observer(Arc::new(LoggingObserver::with_prefix("[request-cache]")))
///     .build();
/// assert_eq!(cache.count(), 0);
/// ```
pub struct LoggingObserver {
    prefix: String,
}

impl LoggingObserver {
    /// Creates a new logging observer with default prefix.
    pub fn new() -> Self {
        Self {
            prefix: "[activation-cache]".to_string(),
        }
    }

    /// Creates a new logging observer with a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheObserver for LoggingObserver {
    fn remembered(&self, key: &CacheKey, scoped: bool) {
        log::debug!(
            "{} Remembered: {}{}",
            self.prefix,
            key.binding().service(),
            if scoped { "" } else { " (no scope)" }
        );
    }

    fn deactivated(&self, context: &DeactivationContext) {
        log::debug!(
            "{} Deactivated: {} ({:?})",
            self.prefix,
            context.binding().service(),
            context.reason()
        );
    }

    fn hit(&self, binding: &Binding) {
        log::trace!("{} Hit: {}", self.prefix, binding.service());
    }

    fn miss(&self, binding: &Binding) {
        log::trace!("{} Miss: {}", self.prefix, binding.service());
    }

    fn deactivation_failed(&self, context: &DeactivationContext, error: &DeactivationError) {
        log::warn!(
            "{} Deactivation failed ({:?}): {}",
            self.prefix,
            context.reason(),
            error
        );
    }

    fn pruned(&self, scopes: usize, entries: usize) {
        if scopes > 0 {
            log::debug!(
                "{} Pruned {} scope(s), {} instance(s)",
                self.prefix,
                scopes,
                entries
            );
        }
    }
}

/// Collection of observers for fan-out notification.
#[derive(Default, Clone)]
pub(crate) struct CacheObservers {
    observers: Vec<Arc<dyn CacheObserver>>,
}

impl CacheObservers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn CacheObserver>) {
        self.observers.push(observer);
    }

    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    fn each(&self, event: &'static str, notify: impl Fn(&dyn CacheObserver)) {
        for observer in &self.observers {
            catch_observer(event, || notify(observer.as_ref()));
        }
    }

    pub(crate) fn remembered(&self, key: &CacheKey, scoped: bool) {
        self.each("remembered", |observer| observer.remembered(key, scoped));
    }

    pub(crate) fn deactivated(&self, context: &DeactivationContext) {
        self.each("deactivated", |observer| observer.deactivated(context));
    }

    pub(crate) fn hit(&self, binding: &Binding) {
        self.each("hit", |observer| observer.hit(binding));
    }

    pub(crate) fn miss(&self, binding: &Binding) {
        self.each("miss", |observer| observer.miss(binding));
    }

    pub(crate) fn deactivation_failed(
        &self,
        context: &DeactivationContext,
        error: &DeactivationError,
    ) {
        self.each("deactivation_failed", |observer| observer.deactivation_failed(context, error));
    }

    pub(crate) fn pruned(&self, scopes: usize, entries: usize) {
        self.each("pruned", |observer| observer.pruned(scopes, entries));
    }
}
