//! Standard scope callbacks.
//!
//! A binding decides which scope its instances live in by carrying one of
//! these callbacks. Every callback holds its scope weakly: a binding never
//! keeps a scope alive.

use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use super::ScopeRef;

/// Resolves the scope an activation belongs to, or `None` for no scope.
pub type ScopeCallback = Arc<dyn Fn() -> Option<ScopeRef> + Send + Sync>;

/// No scope: instances are never returned by lookup.
pub fn transient() -> ScopeCallback {
    Arc::new(|| None)
}

/// The container's root scope. Instances live until the root is dropped or
/// the cache is cleared.
pub fn singleton(root: &ScopeRef) -> ScopeCallback {
    of_scope(root)
}

/// A fixed, externally owned scope.
pub fn of_scope(scope: &ScopeRef) -> ScopeCallback {
    let weak = scope.downgrade();
    Arc::new(move || weak.upgrade_ref())
}

/// A fixed scope object of any shared type.
pub fn of<T: std::any::Any + Send + Sync>(scope: &Arc<T>) -> ScopeCallback {
    let weak: Weak<T> = Arc::downgrade(scope);
    Arc::new(move || weak.upgrade().map(ScopeRef::new))
}

/// The calling thread. The scope dies when the thread exits, so thread-scoped
/// instances become prunable then.
pub fn thread() -> ScopeCallback {
    Arc::new(|| Some(current_thread_scope()))
}

/// Scope object owned by one thread.
#[derive(Debug)]
pub struct ThreadScope {
    thread: ThreadId,
}

impl ThreadScope {
    /// The thread owning this scope.
    pub fn thread(&self) -> ThreadId {
        self.thread
    }
}

thread_local! {
    static THREAD_SCOPE: Arc<ThreadScope> = Arc::new(ThreadScope {
        thread: thread::current().id(),
    });
}

/// Scope handle of the calling thread.
pub fn current_thread_scope() -> ScopeRef {
    THREAD_SCOPE.with(|scope| ScopeRef::new(scope.clone()))
}
