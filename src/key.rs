//! Cache key types: binding identity plus inferred generic arguments.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use crate::scope::callbacks::{self, ScopeCallback};
use crate::scope::ScopeRef;

/// Identity of the configuration that produced an instance.
///
/// Bindings compare by identity, never by value: two bindings created with the
/// same service name are still different cache keys. Cloning a `Binding`
/// yields the same identity.
///
/// # Examples
///
/// ```rust
/// use activation_cache::Binding;
///
/// let a = Binding::new("Sword");
/// let b = Binding::new("Sword");
///
/// assert!(a.same_as(&a.clone()));
/// assert!(!a.same_as(&b));
/// ```
#[derive(Clone)]
pub struct Binding {
    inner: Arc<BindingConfiguration>,
}

struct BindingConfiguration {
    service: &'static str,
    scope: ScopeCallback,
}

impl Binding {
    /// Creates a transient binding (no scope, never cached by lookup).
    pub fn new(service: &'static str) -> Self {
        Self::with_scope(service, callbacks::transient())
    }

    /// Creates a binding whose instances live in the scope returned by `scope`.
    pub fn with_scope(service: &'static str, scope: ScopeCallback) -> Self {
        Self {
            inner: Arc::new(BindingConfiguration { service, scope }),
        }
    }

    /// Diagnostic name of the bound service.
    pub fn service(&self) -> &'static str {
        self.inner.service
    }

    /// Runs the binding's scope callback.
    pub fn resolve_scope(&self) -> Option<ScopeRef> {
        (self.inner.scope)()
    }

    /// Identity comparison.
    pub fn same_as(&self, other: &Binding) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("service", &self.inner.service)
            .field("id", &Arc::as_ptr(&self.inner))
            .finish()
    }
}

/// A concrete type argument inferred for an open generic service.
///
/// Equality uses the `TypeId` only; the name is kept for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct GenericArgument {
    id: TypeId,
    name: &'static str,
}

impl GenericArgument {
    /// Generic argument for `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The argument's `TypeId`.
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// The argument's type name, for diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for GenericArgument {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for GenericArgument {}

/// Lookup key of a cached instance.
///
/// An empty generic argument list is stored as `None`, so "no arguments" and
/// "zero arguments" are the same key.
#[derive(Debug, Clone)]
pub struct CacheKey {
    binding: Binding,
    generic_arguments: Option<Box<[GenericArgument]>>,
}

impl CacheKey {
    /// Builds a key from a binding and the generic arguments in effect.
    pub fn new(binding: Binding, generic_arguments: Option<&[GenericArgument]>) -> Self {
        Self {
            binding,
            generic_arguments: normalize(generic_arguments).map(Box::from),
        }
    }

    /// The binding part of the key.
    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    /// The generic arguments part of the key.
    pub fn generic_arguments(&self) -> Option<&[GenericArgument]> {
        self.generic_arguments.as_deref()
    }

    /// Explicit key equality: binding identity, then position-wise generic
    /// argument comparison.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use activation_cache::{Binding, CacheKey, GenericArgument};
    ///
    /// let binding = Binding::new("Repository<T>");
    /// let key = CacheKey::new(binding.clone(), Some(&[GenericArgument::of::<i32>()]));
    ///
    /// assert!(key.matches(&binding, Some(&[GenericArgument::of::<i32>()])));
    /// assert!(!key.matches(&binding, Some(&[GenericArgument::of::<f64>()])));
    /// assert!(!key.matches(&binding, None));
    /// ```
    pub fn matches(
        &self,
        binding: &Binding,
        generic_arguments: Option<&[GenericArgument]>,
    ) -> bool {
        if !self.binding.same_as(binding) {
            return false;
        }
        match (self.generic_arguments(), normalize(generic_arguments)) {
            (None, None) => true,
            (Some(ours), Some(theirs)) => {
                ours.len() == theirs.len() && ours.iter().zip(theirs).all(|(a, b)| a == b)
            }
            _ => false,
        }
    }
}

fn normalize(arguments: Option<&[GenericArgument]>) -> Option<&[GenericArgument]> {
    arguments.filter(|args| !args.is_empty())
}
