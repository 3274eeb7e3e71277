//! Fake vision model for tests and offline demos.
//!
//! Replies are canned; nothing leaves the process.

use crate::error::{PlantIdError, Result};
use crate::image::EncodedImage;
use crate::model::provider::{VisionModel, VisionModelKind};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
enum FakeReply {
    Text(String),
    Fail(String),
}

/// A vision model that returns a fixed reply.
///
/// Every call is recorded so tests can check what the relay forwarded.
#[derive(Debug)]
pub struct FakeVisionModel {
    reply: FakeReply,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last_request: Mutex<Option<(String, EncodedImage)>>,
}

impl FakeVisionModel {
    /// Answers every image with `text`.
    pub fn with_reply(text: impl Into<String>) -> Self {
        Self::from_reply(FakeReply::Text(text.into()))
    }

    /// Fails every call, health checks included, with an upstream error
    /// carrying `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::from_reply(FakeReply::Fail(message.into()))
    }

    fn from_reply(reply: FakeReply) -> Self {
        Self {
            reply,
            delay: None,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `describe` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The prompt and image of the most recent call.
    pub fn last_request(&self) -> Option<(String, EncodedImage)> {
        self.last_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl VisionModel for FakeVisionModel {
    async fn describe(&self, prompt: &str, image: &EncodedImage) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .last_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) =
            Some((prompt.to_string(), image.clone()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.reply {
            FakeReply::Text(text) => Ok(text.clone()),
            FakeReply::Fail(message) => Err(PlantIdError::UpstreamModel {
                status: Some(500),
                message: message.clone(),
            }),
        }
    }

    fn kind(&self) -> VisionModelKind {
        VisionModelKind::Fake
    }

    fn model_name(&self) -> &str {
        "fake"
    }

    async fn health_check(&self) -> Result<()> {
        match &self.reply {
            FakeReply::Text(_) => Ok(()),
            FakeReply::Fail(message) => Err(PlantIdError::UpstreamModel {
                status: Some(500),
                message: message.clone(),
            }),
        }
    }
}
