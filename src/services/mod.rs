//! Business logic services.
//!
//! Services orchestrate the conversation store and the tagging pipeline.

mod retag;
pub mod tagging;

pub use retag::{RetagService, RetagStats};
