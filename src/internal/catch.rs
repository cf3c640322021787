//! Panic isolation around pipeline and observer calls.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::error::DeactivationError;

/// Runs one deactivation, turning a panic into a `DeactivationError`.
///
/// A panicking pipeline must not abort the surrounding pass, so the payload is
/// captured instead of resumed.
pub(crate) fn catch_deactivation<F>(service: &'static str, f: F) -> Result<(), DeactivationError>
where
    F: FnOnce() -> Result<(), DeactivationError>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(DeactivationError::new(
            service,
            format!("panicked: {}", panic_message(payload.as_ref())),
        )),
    }
}

/// Runs one observer callback. A panic is logged and swallowed so the rest of
/// the fan-out, and the pass that triggered it, carry on.
pub(crate) fn catch_observer<F: FnOnce()>(event: &'static str, f: F) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
        log::error!(
            "[activation-cache] observer panicked in {}: {}",
            event,
            panic_message(payload.as_ref())
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "<non-string panic payload>"
    }
}
