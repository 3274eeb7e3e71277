//! Vision model trait.

use crate::error::Result;
use crate::image::EncodedImage;
use async_trait::async_trait;

/// Vision model kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisionModelKind {
    /// Google Gemini.
    Gemini,
    /// In-process canned replies.
    Fake,
}

impl std::fmt::Display for VisionModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gemini => write!(f, "gemini"),
            Self::Fake => write!(f, "fake"),
        }
    }
}

/// A model that answers a text instruction about one image.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Sends `prompt` plus the inline image in a single turn and returns the
    /// reply text.
    async fn describe(&self, prompt: &str, image: &EncodedImage) -> Result<String>;

    /// Returns the kind of this model.
    fn kind(&self) -> VisionModelKind;

    /// Returns the model identifier used in API calls.
    fn model_name(&self) -> &str;

    /// Returns the name of this model for display.
    fn name(&self) -> &str {
        match self.kind() {
            VisionModelKind::Gemini => "Gemini (Google)",
            VisionModelKind::Fake => "Fake",
        }
    }

    /// Checks if the model is reachable and authenticated.
    async fn health_check(&self) -> Result<()>;
}
