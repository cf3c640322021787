//! Scope handles.
//!
//! A scope is any shared object whose lifetime bounds the instances activated
//! within it: a web request, an activation block, a thread, the root container.
//! The cache only ever holds scopes through [`WeakScope`], so being indexed
//! never extends a scope's life.

pub mod callbacks;
mod notify;

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::instance::ObjectId;

pub use notify::{
    ActivationBlock, DisposalNotifier, DisposedCallback, NotifyWhenDisposed, SubscriptionId,
};

/// Strong handle to a scope object, as returned by scope resolution.
///
/// Scopes that can announce their own disposal are built with
/// [`ScopeRef::notifying`]; the cache then clears them as soon as they are
/// disposed instead of waiting for the next prune.
#[derive(Clone)]
pub struct ScopeRef {
    object: Arc<dyn Any + Send + Sync>,
    notifier: Option<Arc<dyn NotifyWhenDisposed>>,
}

impl ScopeRef {
    /// Scope backed by any shared object.
    pub fn new<T: Any + Send + Sync>(scope: Arc<T>) -> Self {
        Self {
            object: scope,
            notifier: None,
        }
    }

    /// Scope backed by an object that notifies when disposed.
    pub fn notifying<T: NotifyWhenDisposed + Any>(scope: Arc<T>) -> Self {
        let notifier: Arc<dyn NotifyWhenDisposed> = scope.clone();
        Self {
            object: scope,
            notifier: Some(notifier),
        }
    }

    /// Scope backed by a type-erased object.
    pub fn from_any(scope: Arc<dyn Any + Send + Sync>) -> Self {
        Self {
            object: scope,
            notifier: None,
        }
    }

    /// Identity of the scope object.
    pub fn id(&self) -> ObjectId {
        ObjectId::of(&self.object)
    }

    /// The scope object.
    pub fn object(&self) -> &Arc<dyn Any + Send + Sync> {
        &self.object
    }

    /// Disposal notifications, if the scope supports them.
    pub fn notifier(&self) -> Option<&Arc<dyn NotifyWhenDisposed>> {
        self.notifier.as_ref()
    }

    /// Whether this handle refers to `other`.
    pub fn is<T: ?Sized>(&self, other: &Arc<T>) -> bool {
        self.id() == ObjectId::of(other)
    }

    /// Non-owning handle to the same scope.
    pub fn downgrade(&self) -> WeakScope {
        WeakScope {
            id: self.id(),
            object: Arc::downgrade(&self.object),
            notifier: self.notifier.as_ref().map(Arc::downgrade),
        }
    }
}

impl fmt::Debug for ScopeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeRef")
            .field("id", &self.id())
            .field("notifying", &self.notifier.is_some())
            .finish()
    }
}

/// Non-owning handle to a scope object.
///
/// The identity is captured at creation time, so it stays usable after the
/// scope itself is gone.
#[derive(Clone)]
pub struct WeakScope {
    id: ObjectId,
    object: Weak<dyn Any + Send + Sync>,
    notifier: Option<Weak<dyn NotifyWhenDisposed>>,
}

impl WeakScope {
    /// Identity of the scope object.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Whether the scope object is still alive.
    pub fn is_alive(&self) -> bool {
        self.object.strong_count() > 0
    }

    /// The scope object, if still alive.
    pub fn upgrade(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        self.object.upgrade()
    }

    /// A strong scope handle, if the scope is still alive.
    pub fn upgrade_ref(&self) -> Option<ScopeRef> {
        let object = self.object.upgrade()?;
        let notifier = self.notifier.as_ref().and_then(Weak::upgrade);
        Some(ScopeRef { object, notifier })
    }

    /// Disposal notifications, if the scope supports them and is still alive.
    pub fn notifier(&self) -> Option<Arc<dyn NotifyWhenDisposed>> {
        self.notifier.as_ref().and_then(Weak::upgrade)
    }
}

impl fmt::Debug for WeakScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakScope")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .finish()
    }
}
