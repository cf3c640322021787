//! Deactivation pipeline seam.

use crate::context::DeactivationContext;
use crate::error::DeactivationError;
use crate::instance::InstanceReference;

/// Runs teardown logic for instances the cache lets go of.
///
/// The cache calls `deactivate` exactly once per removed instance, after the
/// entry has left the index and without holding the cache lock, so
/// implementations may call back into the cache (e.g. to release nested
/// instances). Errors and panics are collected; they never stop a pass.
///
/// Closures with the matching signature implement `Pipeline`:
///
/// ```
/// use activation_cache::{
///     ActivationCache, DeactivationContext, DeactivationError, InstanceReference,
/// };
/// use std::sync::Arc;
///
/// let cache = ActivationCache::new(Arc::new(
///     |ctx: &DeactivationContext, _: &InstanceReference| -> Result<(), DeactivationError> {
///         println!("deactivating {}", ctx.binding().service());
///         Ok(())
///     },
/// ));
/// assert_eq!(cache.count(), 0);
/// ```
pub trait Pipeline: Send + Sync {
    /// Deactivates one instance.
    fn deactivate(
        &self,
        context: &DeactivationContext,
        reference: &InstanceReference,
    ) -> Result<(), DeactivationError>;
}

impl<F> Pipeline for F
where
    F: Fn(&DeactivationContext, &InstanceReference) -> Result<(), DeactivationError> + Send + Sync,
{
    fn deactivate(
        &self,
        context: &DeactivationContext,
        reference: &InstanceReference,
    ) -> Result<(), DeactivationError> {
        self(context, reference)
    }
}
