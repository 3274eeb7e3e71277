//! Vision model providers.

mod fake;
mod gemini;

pub use fake::FakeVisionModel;
pub use gemini::{GeminiModel, GeminiVisionModel, GeminiVisionModelBuilder, DEFAULT_BASE_URL};
