//! # activation-cache
//!
//! Scope-bound instance caching for dependency injection containers.
//!
//! An [`ActivationCache`] remembers each instance a container activates, keyed
//! by the binding that produced it and bucketed by the *scope* that binding
//! resolves to. Later activations in the same scope get the cached instance
//! back. Scopes are ordinary shared objects held weakly: when the last strong
//! reference to a scope goes away, its instances are deactivated by the next
//! prune, or at once if the scope announces its own disposal.
//!
//! ## Features
//!
//! - **Weak scopes**: the cache never keeps a scope alive
//! - **At-most-once deactivation**: release, clear, prune and dispose can race freely
//! - **Disposal notification**: scopes implementing [`NotifyWhenDisposed`] are cleared eagerly
//! - **Cascading release**: an instance that is itself a scope takes its scope's instances with it
//! - **Pruning**: timer thread, tokio task (`async` feature) or on demand via [`CachePruner`]
//!
//! ## Quick Start
//!
//! ```rust
//! use activation_cache::{ActivationCache, Binding, Context, DisposingPipeline, Dispose};
//! use activation_cache::{callbacks, InstanceReference};
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct Connection {
//!     closed: AtomicBool,
//! }
//!
//! impl Dispose for Connection {
//!     fn dispose(&self) {
//!         self.closed.store(true, Ordering::SeqCst);
//!     }
//! }
//!
//! let cache = ActivationCache::new(Arc::new(DisposingPipeline));
//!
//! let request = Arc::new(());
//! let ctx = Context::new(Binding::with_scope("Connection", callbacks::of(&request)));
//!
//! let connection = Arc::new(Connection::default());
//! cache.remember(&ctx, InstanceReference::disposable(connection.clone())).unwrap();
//! assert!(cache.try_get_as::<Connection, _>(&ctx).is_some());
//!
//! drop(request);
//! cache.prune().unwrap();
//! assert!(connection.closed.load(Ordering::SeqCst));
//! ```
//!
//! ## Activation Blocks
//!
//! ```rust
//! use activation_cache::{ActivationBlock, ActivationCache, Binding, Context, DisposingPipeline};
//! use activation_cache::{callbacks, InstanceReference};
//! use std::sync::Arc;
//!
//! let cache = ActivationCache::new(Arc::new(DisposingPipeline));
//! let block = ActivationBlock::new();
//! let ctx = Context::new(Binding::new("Unit")).with_scope(callbacks::of_scope(&block.scope()));
//!
//! cache.remember(&ctx, InstanceReference::new(Arc::new(5u32))).unwrap();
//! assert_eq!(cache.count(), 1);
//!
//! // Disposing the block clears its instances without waiting for a prune
//! block.dispose();
//! assert_eq!(cache.count(), 0);
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod instance;
pub mod key;
pub mod metrics;
pub mod observer;
pub mod pipeline;
pub mod pruner;
pub mod scope;
pub mod traits;

mod internal;

pub use cache::{ActivationCache, CacheBuilder};
pub use config::{CacheSettings, DEFAULT_PRUNING_INTERVAL};
pub use context::{ActivationContext, Context, DeactivationContext, DeactivationReason};
pub use error::{CacheError, CacheResult, DeactivationError};
pub use instance::{AnyArc, InstanceReference, ObjectId};
pub use key::{Binding, CacheKey, GenericArgument};
pub use metrics::{CacheMetrics, MetricsSnapshot};
pub use observer::{CacheObserver, LoggingObserver};
pub use pipeline::DisposingPipeline;
pub use pruner::{CachePruner, PruneReport};
pub use scope::callbacks;
pub use scope::callbacks::ScopeCallback;
pub use scope::{
    ActivationBlock, DisposalNotifier, DisposedCallback, NotifyWhenDisposed, ScopeRef,
    SubscriptionId, WeakScope,
};
pub use traits::{Dispose, Pipeline};
