//! Error types for the activation cache.

use std::fmt;

/// A single instance whose deactivation did not complete cleanly.
///
/// The entry is always removed from the cache before deactivation runs, so a
/// failure here never leaves the instance tracked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeactivationError {
    /// Diagnostic name of the binding that produced the instance
    pub service: &'static str,
    /// Message returned by the pipeline, or the panic payload
    pub message: String,
}

impl DeactivationError {
    /// Creates a deactivation error for the given service.
    pub fn new(service: &'static str, message: impl Into<String>) -> Self {
        Self {
            service,
            message: message.into(),
        }
    }
}

impl fmt::Display for DeactivationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Deactivation of {} failed: {}", self.service, self.message)
    }
}

impl std::error::Error for DeactivationError {}

/// Activation cache errors
///
/// Lookup misses are not errors; `try_get` returns `None` for those.
///
/// # Examples
///
/// ```rust
/// use activation_cache::{CacheError, DeactivationError};
///
/// let invalid = CacheError::InvalidArgument("pruning interval must be non-zero");
/// let disposed = CacheError::Disposed;
/// let failed = CacheError::Deactivation(vec![
///     DeactivationError::new("Database", "connection already closed"),
/// ]);
///
/// println!("Error: {}", invalid);
/// println!("Error: {}", disposed);
/// println!("Error: {}", failed);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Precondition violated by the caller
    InvalidArgument(&'static str),
    /// One or more instances failed to deactivate during a pass
    Deactivation(Vec<DeactivationError>),
    /// The cache has been disposed
    Disposed,
    /// The background pruner thread could not be started
    Spawn(String),
}

impl CacheError {
    /// Returns the deactivation failures carried by this error, if any.
    pub fn deactivation_failures(&self) -> &[DeactivationError] {
        match self {
            CacheError::Deactivation(failures) => failures,
            _ => &[],
        }
    }
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CacheError::Deactivation(failures) => {
                let services: Vec<&str> = failures.iter().map(|e| e.service).collect();
                write!(
                    f,
                    "{} instance(s) failed to deactivate: {}",
                    failures.len(),
                    services.join(", ")
                )
            }
            CacheError::Disposed => write!(f, "Activation cache has been disposed"),
            CacheError::Spawn(msg) => write!(f, "Failed to start pruner thread: {}", msg),
        }
    }
}

impl std::error::Error for CacheError {}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Folds collected deactivation failures into a pass result.
pub(crate) fn pass_result<T>(value: T, failures: Vec<DeactivationError>) -> CacheResult<T> {
    if failures.is_empty() {
        Ok(value)
    } else {
        Err(CacheError::Deactivation(failures))
    }
}
