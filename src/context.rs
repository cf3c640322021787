//! Activation and deactivation contexts.

use std::fmt;

use crate::key::{Binding, CacheKey, GenericArgument};
use crate::scope::callbacks::ScopeCallback;
use crate::scope::ScopeRef;

/// What the cache needs to know about an activation request.
///
/// Implemented by the host's request context. [`Context`] is the stock
/// implementation.
pub trait ActivationContext {
    /// Scope the requested instance belongs to, or `None` for no scope.
    fn resolve_scope(&self) -> Option<ScopeRef>;

    /// Binding that produces the instance.
    fn binding(&self) -> &Binding;

    /// Generic arguments inferred for this request, if any.
    fn generic_arguments(&self) -> Option<&[GenericArgument]> {
        None
    }
}

/// Stock activation context: a binding, optional generic arguments, and an
/// optional scope override.
///
/// # Examples
///
/// ```rust
/// use activation_cache::{ActivationContext, Binding, Context, GenericArgument};
/// use activation_cache::callbacks;
/// use std::sync::Arc;
///
/// let request = Arc::new("request-1".to_string());
/// let binding = Binding::with_scope("Repository<T>", callbacks::of(&request));
/// let ctx = Context::new(binding).with_generic_arguments(vec![GenericArgument::of::<u32>()]);
///
/// assert!(ctx.resolve_scope().unwrap().is(&request));
/// assert_eq!(ctx.generic_arguments().unwrap().len(), 1);
/// ```
#[derive(Clone)]
pub struct Context {
    binding: Binding,
    generic_arguments: Vec<GenericArgument>,
    scope: Option<ScopeCallback>,
}

impl Context {
    /// Context for `binding`, resolving the scope through the binding.
    pub fn new(binding: Binding) -> Self {
        Self {
            binding,
            generic_arguments: Vec::new(),
            scope: None,
        }
    }

    /// Sets the generic arguments in effect.
    pub fn with_generic_arguments(mut self, arguments: Vec<GenericArgument>) -> Self {
        self.generic_arguments = arguments;
        self
    }

    /// Resolves the scope through `callback` instead of the binding.
    pub fn with_scope(mut self, callback: ScopeCallback) -> Self {
        self.scope = Some(callback);
        self
    }
}

impl ActivationContext for Context {
    fn resolve_scope(&self) -> Option<ScopeRef> {
        match &self.scope {
            Some(callback) => callback(),
            None => self.binding.resolve_scope(),
        }
    }

    fn binding(&self) -> &Binding {
        &self.binding
    }

    fn generic_arguments(&self) -> Option<&[GenericArgument]> {
        if self.generic_arguments.is_empty() {
            None
        } else {
            Some(&self.generic_arguments)
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("binding", &self.binding)
            .field("generic_arguments", &self.generic_arguments)
            .field("scope_override", &self.scope.is_some())
            .finish()
    }
}

/// Why an instance is being deactivated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeactivationReason {
    /// Released explicitly
    Released,
    /// Its scope was cleared explicitly
    ScopeCleared,
    /// Its scope announced its own disposal
    ScopeDisposed,
    /// Its scope became unreachable and was pruned
    Pruned,
    /// The whole cache was cleared
    Cleared,
    /// The cache was disposed
    CacheDisposed,
    /// It was cached under another instance that was removed
    Cascaded,
}

/// Minimal context rebuilt for a removed entry and handed to the pipeline.
#[derive(Debug, Clone)]
pub struct DeactivationContext {
    key: CacheKey,
    reason: DeactivationReason,
}

impl DeactivationContext {
    pub(crate) fn new(key: CacheKey, reason: DeactivationReason) -> Self {
        Self { key, reason }
    }

    /// Binding that produced the instance.
    pub fn binding(&self) -> &Binding {
        self.key.binding()
    }

    /// Generic arguments the instance was produced with.
    pub fn generic_arguments(&self) -> Option<&[GenericArgument]> {
        self.key.generic_arguments()
    }

    /// Full cache key of the instance.
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Why the instance is being deactivated.
    pub fn reason(&self) -> DeactivationReason {
        self.reason
    }
}
