//! Error types for plant identification.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

/// Message shown to the person who asked for an identification, whatever
/// actually went wrong.
pub const USER_FACING_FAILURE: &str = "Failed to identify plant. Please try again.";

/// Longest upstream error body kept for logging.
const MAX_ERROR_MESSAGE_CHARS: usize = 500;

static API_KEY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(AIza[0-9A-Za-z_\-]{20,}|(?i)(?:key|api_key|x-goog-api-key)=[^&\s]+)")
        .expect("Invalid API key regex")
});

/// Errors that can occur anywhere in the identification pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PlantIdError {
    /// Image transcoding or compression failed.
    #[error("image conversion failed: {message}")]
    Conversion {
        /// What was being attempted.
        message: String,
        /// Underlying decoder/encoder failure, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Reading the image failed.
    #[error("failed to read image: {0}")]
    Read(#[from] std::io::Error),

    /// Network or HTTP error talking to the relay or the model.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The relay answered with a non-success status.
    #[error("identification failed: {status} - {body}")]
    Identification {
        /// HTTP status returned by the relay.
        status: u16,
        /// Response body text.
        body: String,
    },

    /// The external model call failed.
    #[error("model error: {message}")]
    UpstreamModel {
        /// HTTP status from the model API, when there was one.
        status: Option<u16>,
        /// Sanitized failure description.
        message: String,
    },

    /// API key missing or rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The model refused the content.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// The model call exceeded the configured timeout.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The model reply matched neither supported shape.
    #[error("failed to parse model response: {0}")]
    Parse(String),

    /// Request did not have the expected shape.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Another identification is already running in this session.
    #[error("an identification is already in progress")]
    Busy,
}

impl PlantIdError {
    /// Creates a conversion error without an underlying cause.
    pub fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a conversion error wrapping the decoder/encoder failure.
    pub fn conversion_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Conversion {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// The single message surfaced to users. The cause stays in `Display`
    /// and is meant for logs only.
    pub fn user_message(&self) -> &'static str {
        USER_FACING_FAILURE
    }

    /// Returns true if the failure happened on the model side of the relay.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::UpstreamModel { .. } | Self::Auth(_) | Self::ContentBlocked(_) | Self::Timeout(_)
        )
    }
}

/// Truncates an upstream error body and masks anything that looks like an
/// API key before it reaches a log line.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let masked = API_KEY_REGEX.replace_all(text.trim(), "[REDACTED]");
    if masked.chars().count() > MAX_ERROR_MESSAGE_CHARS {
        let truncated: String = masked.chars().take(MAX_ERROR_MESSAGE_CHARS).collect();
        format!("{truncated}...")
    } else {
        masked.into_owned()
    }
}

/// Result type alias for identification operations.
pub type Result<T> = std::result::Result<T, PlantIdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_is_uniform() {
        let errors = [
            PlantIdError::conversion("bad heic"),
            PlantIdError::Parse("no fence".into()),
            PlantIdError::Identification {
                status: 500,
                body: "boom".into(),
            },
            PlantIdError::Busy,
        ];
        for err in &errors {
            assert_eq!(err.user_message(), USER_FACING_FAILURE);
        }
    }

    #[test]
    fn test_is_upstream() {
        assert!(PlantIdError::Auth("bad key".into()).is_upstream());
        assert!(PlantIdError::Timeout(Duration::from_secs(30)).is_upstream());
        assert!(PlantIdError::UpstreamModel {
            status: Some(503),
            message: "overloaded".into()
        }
        .is_upstream());

        assert!(!PlantIdError::Parse("x".into()).is_upstream());
        assert!(!PlantIdError::Busy.is_upstream());
    }

    #[test]
    fn test_error_display() {
        let err = PlantIdError::Identification {
            status: 400,
            body: "Missing required fields".into(),
        };
        assert_eq!(
            err.to_string(),
            "identification failed: 400 - Missing required fields"
        );

        let err = PlantIdError::ContentBlocked("Safety filter triggered".into());
        assert_eq!(err.to_string(), "content blocked: Safety filter triggered");
    }

    #[test]
    fn test_conversion_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::InvalidData, "truncated file");
        let err = PlantIdError::conversion_with("HEIC decode failed", io);
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("truncated file"));
    }

    #[test]
    fn test_sanitize_masks_keys_and_truncates() {
        let text = "request to ...?key=AIzaSyA1234567890abcdefghijklmno failed";
        let clean = sanitize_error_message(text);
        assert!(!clean.contains("AIzaSy"));
        assert!(clean.contains("[REDACTED]"));

        let long = "x".repeat(2000);
        let clean = sanitize_error_message(&long);
        assert_eq!(clean.chars().count(), MAX_ERROR_MESSAGE_CHARS + 3);
        assert!(clean.ends_with("..."));
    }
}
