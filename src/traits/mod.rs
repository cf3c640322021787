//! Core traits for the activation cache.

mod dispose;
mod pipeline;

pub use dispose::Dispose;
pub use pipeline::Pipeline;
