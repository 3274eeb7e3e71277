//! Gemini (Google) vision provider.

use crate::error::{sanitize_error_message, PlantIdError, Result};
use crate::image::EncodedImage;
use crate::model::provider::{VisionModel, VisionModelKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini model variants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GeminiModel {
    /// Gemini 1.5 Flash, latest revision.
    #[default]
    Flash15Latest,
    /// Gemini 2.5 Flash.
    Flash25,
    /// Any other model identifier.
    Custom(String),
}

impl GeminiModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Flash15Latest => "gemini-1.5-flash-latest",
            Self::Flash25 => "gemini-2.5-flash",
            Self::Custom(name) => name,
        }
    }
}

impl From<&str> for GeminiModel {
    fn from(name: &str) -> Self {
        match name {
            "gemini-1.5-flash-latest" => Self::Flash15Latest,
            "gemini-2.5-flash" => Self::Flash25,
            other => Self::Custom(other.to_string()),
        }
    }
}

/// Builder for GeminiVisionModel.
#[derive(Debug, Clone, Default)]
pub struct GeminiVisionModelBuilder {
    api_key: Option<String>,
    model: GeminiModel,
    base_url: Option<String>,
}

impl GeminiVisionModelBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `GOOGLE_API_KEY`, then `API_SECRET`.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the Gemini model variant.
    pub fn model(mut self, model: impl Into<GeminiModel>) -> Self {
        self.model = model.into();
        self
    }

    /// Points the client at a different API root.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Builds the model, resolving the API key.
    pub fn build(self) -> Result<GeminiVisionModel> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
            .or_else(|| std::env::var("API_SECRET").ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                PlantIdError::Auth("GOOGLE_API_KEY not set and no API key provided".into())
            })?;

        Ok(GeminiVisionModel {
            client: reqwest::Client::new(),
            api_key,
            model: self.model,
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

/// Gemini vision model.
pub struct GeminiVisionModel {
    client: reqwest::Client,
    api_key: String,
    model: GeminiModel,
    base_url: String,
}

impl std::fmt::Debug for GeminiVisionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiVisionModel")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GeminiVisionModel {
    /// Creates a new `GeminiVisionModelBuilder`.
    pub fn builder() -> GeminiVisionModelBuilder {
        GeminiVisionModelBuilder::new()
    }

    async fn describe_impl(&self, prompt: &str, image: &EncodedImage) -> Result<String> {
        let start = Instant::now();

        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url,
            self.model.as_str(),
        );

        let body = GeminiRequest::new(prompt, image);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status.as_u16(), &text));
        }

        let gemini_response: GeminiResponse = response.json().await?;
        let text = gemini_response.into_text()?;

        tracing::debug!(
            model = self.model.as_str(),
            duration_ms = start.elapsed().as_millis() as u64,
            chars = text.chars().count(),
            "gemini replied"
        );

        Ok(text)
    }

    fn parse_error(&self, status: u16, text: &str) -> PlantIdError {
        let text = sanitize_error_message(text);
        if status == 404 {
            return PlantIdError::UpstreamModel {
                status: Some(status),
                message: format!(
                    "model '{}' not found. Verify the model name is correct.",
                    self.model.as_str()
                ),
            };
        }
        if status == 401 || status == 403 {
            return PlantIdError::Auth(text);
        }
        let lower = text.to_lowercase();
        if lower.contains("safety") || lower.contains("blocked") || lower.contains("prohibited") {
            return PlantIdError::ContentBlocked(text);
        }
        PlantIdError::UpstreamModel {
            status: Some(status),
            message: text,
        }
    }
}

#[async_trait]
impl VisionModel for GeminiVisionModel {
    async fn describe(&self, prompt: &str, image: &EncodedImage) -> Result<String> {
        self.describe_impl(prompt, image).await
    }

    fn kind(&self) -> VisionModelKind {
        VisionModelKind::Gemini
    }

    fn model_name(&self) -> &str {
        self.model.as_str()
    }

    async fn health_check(&self) -> Result<()> {
        let url = format!("{}/models/{}", self.base_url, self.model.as_str());

        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;

        match response.status().as_u16() {
            401 | 403 => Err(PlantIdError::Auth("Invalid API key".into())),
            s if !(200..300).contains(&s) => Err(PlantIdError::UpstreamModel {
                status: Some(s),
                message: "Health check failed".into(),
            }),
            _ => Ok(()),
        }
    }
}

// Request/Response types
#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiRequestPart>,
}

/// A part in a Gemini request - can be text or inline image data.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiRequestPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

impl GeminiRequest {
    /// One user turn: the instruction first, then the image.
    fn new(prompt: &str, image: &EncodedImage) -> Self {
        Self {
            contents: vec![GeminiContent {
                role: "user",
                parts: vec![
                    GeminiRequestPart::Text {
                        text: prompt.to_string(),
                    },
                    GeminiRequestPart::InlineData {
                        inline_data: GeminiInlineData {
                            mime_type: image.file_type.clone(),
                            data: image.base64_image.clone(),
                        },
                    },
                ],
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
    #[serde(default)]
    block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
struct GeminiPartResponse {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiResponse {
    /// Concatenates the text parts of the first candidate.
    fn into_text(self) -> Result<String> {
        // Blocked prompts still come back as HTTP 200
        if let Some(feedback) = self.prompt_feedback {
            if let Some(reason) = feedback.block_reason {
                let msg = feedback
                    .block_reason_message
                    .unwrap_or_else(|| format!("Prompt blocked: {}", reason));
                return Err(PlantIdError::ContentBlocked(msg));
            }
        }

        let candidate = self.candidates.into_iter().next().ok_or_else(|| {
            PlantIdError::UpstreamModel {
                status: None,
                message: "No candidates in Gemini response".into(),
            }
        })?;

        if let Some(ref finish_reason) = candidate.finish_reason {
            match finish_reason.as_str() {
                "SAFETY" | "RECITATION" | "PROHIBITED_CONTENT" | "BLOCKLIST" | "SPII" => {
                    return Err(PlantIdError::ContentBlocked(format!(
                        "Content blocked by Gemini safety filter: {}",
                        finish_reason
                    )));
                }
                _ => {} // STOP, MAX_TOKENS, etc. are normal
            }
        }

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(PlantIdError::UpstreamModel {
                status: None,
                message: "No text in Gemini response".into(),
            });
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> EncodedImage {
        EncodedImage::from_wire("image/jpeg", "/9j/4AAQ")
    }

    #[test]
    fn test_gemini_model_as_str() {
        assert_eq!(GeminiModel::Flash15Latest.as_str(), "gemini-1.5-flash-latest");
        assert_eq!(GeminiModel::Flash25.as_str(), "gemini-2.5-flash");
        assert_eq!(
            GeminiModel::from("gemini-2.0-pro").as_str(),
            "gemini-2.0-pro"
        );
    }

    #[test]
    fn test_gemini_model_default() {
        assert_eq!(GeminiModel::default(), GeminiModel::Flash15Latest);
    }

    #[test]
    fn test_builder_with_explicit_key() {
        let model = GeminiVisionModelBuilder::new()
            .api_key("test-key")
            .model(GeminiModel::Flash25)
            .base_url("http://localhost:9999/v1beta/")
            .build()
            .unwrap();
        assert_eq!(model.model_name(), "gemini-2.5-flash");
        assert_eq!(model.base_url, "http://localhost:9999/v1beta");
        assert_eq!(model.kind(), VisionModelKind::Gemini);
    }

    #[test]
    fn test_request_has_prompt_then_image() {
        let req = GeminiRequest::new("Identify this plant", &image());
        let json = serde_json::to_value(&req).unwrap();

        let parts = &json["contents"][0]["parts"];
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(parts[0]["text"], "Identify this plant");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[1]["inlineData"]["data"], "/9j/4AAQ");
        assert!(parts[1].get("inline_data").is_none());
    }

    #[test]
    fn test_response_text_is_joined() {
        let json = r#"{
            "candidates": [{
                "content": {
                    "parts": [{"text": "Scientific Name: Rosa\n"}, {"text": "Common Name: Rose"}]
                },
                "finishReason": "STOP"
            }]
        }"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            resp.into_text().unwrap(),
            "Scientific Name: Rosa\nCommon Name: Rose"
        );
    }

    #[test]
    fn test_response_with_prompt_feedback_block() {
        let json = r#"{
            "candidates": [],
            "promptFeedback": {
                "blockReason": "SAFETY",
                "blockReasonMessage": "Prompt was blocked due to safety"
            }
        }"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        match resp.into_text() {
            Err(PlantIdError::ContentBlocked(msg)) => {
                assert_eq!(msg, "Prompt was blocked due to safety")
            }
            other => panic!("expected ContentBlocked, got {other:?}"),
        }
    }

    #[test]
    fn test_response_safety_finish_reason() {
        let json = r#"{"candidates": [{"finishReason": "SAFETY"}]}"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(
            resp.into_text(),
            Err(PlantIdError::ContentBlocked(_))
        ));
    }

    #[test]
    fn test_response_without_candidates() {
        let resp: GeminiResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            resp.into_text(),
            Err(PlantIdError::UpstreamModel { status: None, .. })
        ));
    }

    #[test]
    fn test_parse_error_mapping() {
        let model = GeminiVisionModel::builder().api_key("k").build().unwrap();
        assert!(matches!(
            model.parse_error(403, "API key not valid"),
            PlantIdError::Auth(_)
        ));
        assert!(matches!(
            model.parse_error(400, "Request blocked by safety settings"),
            PlantIdError::ContentBlocked(_)
        ));
        assert!(matches!(
            model.parse_error(503, "overloaded"),
            PlantIdError::UpstreamModel {
                status: Some(503),
                ..
            }
        ));
    }
}
