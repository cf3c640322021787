//! Disposal trait for resource cleanup.

/// Trait for synchronous resource disposal.
///
/// Implement this trait for instances that need structured teardown (e.g. flushing buffers,
/// closing connections). Wrap such instances with [`InstanceReference::disposable`] and the
/// [`DisposingPipeline`] runs `dispose` when the cache deactivates them.
///
/// [`InstanceReference::disposable`]: crate::InstanceReference::disposable
/// [`DisposingPipeline`]: crate::DisposingPipeline
///
/// # Examples
///
/// ```
/// use activation_cache::{ActivationCache, Binding, Context, Dispose, DisposingPipeline};
/// use activation_cache::{callbacks, InstanceReference};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// struct Cache {
///     flushed: AtomicBool,
/// }
///
/// impl Dispose for Cache {
///     fn dispose(&self) {
///         self.flushed.store(true, Ordering::SeqCst);
///     }
/// }
///
/// let request = Arc::new(());
/// let cache = ActivationCache::new(Arc::new(DisposingPipeline));
/// let binding = Binding::with_scope("Cache", callbacks::of(&request));
///
/// let instance = Arc::new(Cache { flushed: AtomicBool::new(false) });
/// let reference = InstanceReference::disposable(instance.clone());
/// cache.remember(&Context::new(binding), reference).unwrap();
/// cache.clear().unwrap();
///
/// assert!(instance.flushed.load(Ordering::SeqCst));
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Perform synchronous cleanup of resources.
    fn dispose(&self);
}
