//! Internal implementation details.

pub(crate) mod catch;

pub(crate) use catch::{catch_deactivation, catch_observer};
