//! Disposal notifications for scopes that end deterministically.

use std::sync::Arc;

use parking_lot::Mutex;

use super::ScopeRef;

/// Callback fired once when a scope is disposed.
pub type DisposedCallback = Box<dyn FnOnce() + Send>;

/// Handle returned by [`NotifyWhenDisposed::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Optional capability of a scope object: announce its own disposal.
///
/// Implementations must not invoke the callback from inside `subscribe`; a
/// scope that is already disposed returns `None` instead. Callbacks must be
/// invoked without holding any lock of the implementation, since they re-enter
/// the cache.
pub trait NotifyWhenDisposed: Send + Sync {
    /// Registers `callback`, or returns `None` if already disposed.
    fn subscribe(&self, callback: DisposedCallback) -> Option<SubscriptionId>;

    /// Drops a previously registered callback. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

#[derive(Default)]
struct NotifierState {
    next_id: u64,
    callbacks: Vec<(SubscriptionId, DisposedCallback)>,
    disposed: bool,
}

/// Reusable observer list implementing [`NotifyWhenDisposed`].
///
/// # Examples
///
/// ```rust
/// use activation_cache::{DisposalNotifier, NotifyWhenDisposed};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// let notifier = DisposalNotifier::new();
/// let fired = Arc::new(AtomicBool::new(false));
/// let flag = fired.clone();
///
/// notifier.subscribe(Box::new(move || flag.store(true, Ordering::SeqCst)));
/// assert_eq!(notifier.notify(), 1);
/// assert!(fired.load(Ordering::SeqCst));
///
/// // Later subscriptions are refused
/// assert!(notifier.subscribe(Box::new(|| {})).is_none());
/// ```
#[derive(Default)]
pub struct DisposalNotifier {
    state: Mutex<NotifierState>,
}

impl DisposalNotifier {
    /// Creates an empty notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the notifier disposed and fires every pending callback once.
    ///
    /// Returns the number of callbacks fired; later calls fire nothing.
    pub fn notify(&self) -> usize {
        let callbacks = {
            let mut state = self.state.lock();
            if state.disposed {
                return 0;
            }
            state.disposed = true;
            std::mem::take(&mut state.callbacks)
        };

        let fired = callbacks.len();
        for (_, callback) in callbacks {
            callback();
        }
        fired
    }

    /// Whether `notify` has run.
    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    /// Number of pending subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.state.lock().callbacks.len()
    }
}

impl NotifyWhenDisposed for DisposalNotifier {
    fn subscribe(&self, callback: DisposedCallback) -> Option<SubscriptionId> {
        let mut state = self.state.lock();
        if state.disposed {
            return None;
        }
        let id = SubscriptionId(state.next_id);
        state.next_id += 1;
        state.callbacks.push((id, callback));
        Some(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.state.lock().callbacks.retain(|(sub, _)| *sub != id);
    }
}

/// An explicit scope whose instances are deactivated when it is disposed.
///
/// Disposal happens on [`ActivationBlock::dispose`] or when the last handle is
/// dropped, whichever comes first.
///
/// # Examples
///
/// ```rust
/// use activation_cache::{ActivationBlock, ActivationCache, Binding, Context, InstanceReference};
/// use activation_cache::callbacks;
/// use std::sync::Arc;
///
/// let cache = ActivationCache::new(Arc::new(activation_cache::DisposingPipeline));
/// let block = ActivationBlock::new();
/// let binding = Binding::with_scope("Unit", callbacks::of_scope(&block.scope()));
///
/// cache.remember(&Context::new(binding.clone()), InstanceReference::new(Arc::new(1u8))).unwrap();
/// assert_eq!(cache.count(), 1);
///
/// block.dispose();
/// assert_eq!(cache.count(), 0);
/// ```
pub struct ActivationBlock {
    notifier: DisposalNotifier,
}

impl ActivationBlock {
    /// Creates a new block.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            notifier: DisposalNotifier::new(),
        })
    }

    /// Scope handle for this block.
    pub fn scope(self: &Arc<Self>) -> ScopeRef {
        ScopeRef::notifying(self.clone())
    }

    /// Deactivates everything cached in this block.
    pub fn dispose(&self) {
        self.notifier.notify();
    }

    /// Whether the block has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.notifier.is_disposed()
    }
}

impl NotifyWhenDisposed for ActivationBlock {
    fn subscribe(&self, callback: DisposedCallback) -> Option<SubscriptionId> {
        self.notifier.subscribe(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.notifier.unsubscribe(id);
    }
}

impl Drop for ActivationBlock {
    fn drop(&mut self) {
        self.notifier.notify();
    }
}
