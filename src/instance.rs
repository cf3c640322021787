//! Instance references and object identity.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::traits::Dispose;

/// Type-erased shared instance.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// Address identity of a shared allocation.
///
/// Two `Arc`s have the same `ObjectId` iff they point at the same allocation,
/// whatever their static type. Instances and scopes share this identity space,
/// which lets an instance act as the scope of other instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(usize);

impl ObjectId {
    /// Identity of the allocation behind `value`.
    pub fn of<T: ?Sized>(value: &Arc<T>) -> Self {
        ObjectId(Arc::as_ptr(value) as *const () as usize)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// An activated instance handed to the cache, plus the hook that tears it down.
///
/// # Examples
///
/// ```rust
/// use activation_cache::{Dispose, InstanceReference};
/// use std::sync::Arc;
///
/// struct Connection;
/// impl Dispose for Connection {
///     fn dispose(&self) {
///         println!("closing connection");
///     }
/// }
///
/// let plain = InstanceReference::new(Arc::new(42u32));
/// assert!(plain.disposer().is_none());
///
/// let conn = Arc::new(Connection);
/// let reference = InstanceReference::disposable(conn.clone());
/// assert!(reference.disposer().is_some());
/// assert!(reference.is(&conn));
/// ```
#[derive(Clone)]
pub struct InstanceReference {
    instance: AnyArc,
    disposer: Option<Arc<dyn Dispose>>,
}

impl InstanceReference {
    /// Wraps an instance with no teardown hook.
    pub fn new<T: Any + Send + Sync>(instance: Arc<T>) -> Self {
        Self {
            instance,
            disposer: None,
        }
    }

    /// Wraps an instance whose `Dispose` impl runs on deactivation.
    pub fn disposable<T: Dispose>(instance: Arc<T>) -> Self {
        let disposer: Arc<dyn Dispose> = instance.clone();
        Self {
            instance,
            disposer: Some(disposer),
        }
    }

    /// Wraps an already type-erased instance.
    pub fn from_any(instance: AnyArc) -> Self {
        Self {
            instance,
            disposer: None,
        }
    }

    /// The instance itself.
    pub fn instance(&self) -> &AnyArc {
        &self.instance
    }

    /// Identity of the instance.
    pub fn id(&self) -> ObjectId {
        ObjectId::of(&self.instance)
    }

    /// Whether this reference points at `other`.
    pub fn is<T: ?Sized>(&self, other: &Arc<T>) -> bool {
        self.id() == ObjectId::of(other)
    }

    /// Typed view of the instance.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.instance.clone().downcast::<T>().ok()
    }

    /// Teardown hook, if the instance was registered as disposable.
    pub fn disposer(&self) -> Option<&Arc<dyn Dispose>> {
        self.disposer.as_ref()
    }
}

impl fmt::Debug for InstanceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceReference")
            .field("id", &self.id())
            .field("disposable", &self.disposer.is_some())
            .finish()
    }
}
