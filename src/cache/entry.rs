//! Cached instance entries.

use crate::instance::{InstanceReference, ObjectId};
use crate::key::{Binding, CacheKey, GenericArgument};

/// One activated instance and the key it was produced under.
#[derive(Debug, Clone)]
pub(crate) struct InstanceEntry {
    key: CacheKey,
    reference: InstanceReference,
}

impl InstanceEntry {
    pub(crate) fn new(key: CacheKey, reference: InstanceReference) -> Self {
        Self { key, reference }
    }

    pub(crate) fn key(&self) -> &CacheKey {
        &self.key
    }

    pub(crate) fn reference(&self) -> &InstanceReference {
        &self.reference
    }

    pub(crate) fn id(&self) -> ObjectId {
        self.reference.id()
    }

    pub(crate) fn service(&self) -> &'static str {
        self.key.binding().service()
    }

    pub(crate) fn matches(
        &self,
        binding: &Binding,
        generic_arguments: Option<&[GenericArgument]>,
    ) -> bool {
        self.key.matches(binding, generic_arguments)
    }
}
