//! Stock deactivation pipeline.

use crate::context::DeactivationContext;
use crate::error::DeactivationError;
use crate::instance::InstanceReference;
use crate::traits::Pipeline;

/// Pipeline that runs the [`Dispose`](crate::Dispose) hook carried by each
/// instance reference. Instances without a hook are left alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisposingPipeline;

impl Pipeline for DisposingPipeline {
    fn deactivate(
        &self,
        context: &DeactivationContext,
        reference: &InstanceReference,
    ) -> Result<(), DeactivationError> {
        if let Some(disposer) = reference.disposer() {
            log::trace!(
                "disposing {} ({}) after {:?}",
                context.binding().service(),
                reference.id(),
                context.reason()
            );
            disposer.dispose();
        }
        Ok(())
    }
}
