//! The external vision model the relay talks to.

mod prompt;
mod provider;
pub mod providers;

pub use prompt::identify_prompt;
pub use provider::{VisionModel, VisionModelKind};
