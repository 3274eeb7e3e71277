//! Relay configuration from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{PlantIdError, Result};
use crate::model::providers::{GeminiModel, GeminiVisionModel};

/// Default listen address.
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

/// Default cap on the `base64Image` field, in bytes of base64 text.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Relay settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Address the relay listens on.
    pub bind: SocketAddr,
    /// Gemini model identifier.
    pub model: String,
    /// Largest accepted `base64Image`, in bytes.
    pub max_payload_bytes: usize,
    /// Upper bound on one model call; `None` waits indefinitely.
    pub model_timeout: Option<Duration>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            model: GeminiModel::default().as_str().to_string(),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            model_timeout: None,
        }
    }
}

impl RelayConfig {
    /// Load configuration from the process environment.
    ///
    /// Optional:
    /// - `PLANT_HELPLINE_BIND`: listen address (default: 127.0.0.1:3000)
    /// - `PLANT_HELPLINE_MODEL`: model name (default: gemini-1.5-flash-latest)
    /// - `PLANT_HELPLINE_MAX_PAYLOAD_BYTES`: payload cap (default: 5 MiB)
    /// - `PLANT_HELPLINE_MODEL_TIMEOUT_SECS`: model call timeout (default: none)
    ///
    /// The API key is read by the model builder, not here.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let bind = match get("PLANT_HELPLINE_BIND") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| invalid("PLANT_HELPLINE_BIND", &raw))?,
            None => defaults.bind,
        };

        let model = get("PLANT_HELPLINE_MODEL")
            .map(|m| m.trim().to_string())
            .unwrap_or(defaults.model);

        let max_payload_bytes = match get("PLANT_HELPLINE_MAX_PAYLOAD_BYTES") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| invalid("PLANT_HELPLINE_MAX_PAYLOAD_BYTES", &raw))?,
            None => defaults.max_payload_bytes,
        };

        let model_timeout = match get("PLANT_HELPLINE_MODEL_TIMEOUT_SECS") {
            Some(raw) => Some(
                raw.trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|n| *n > 0)
                    .map(Duration::from_secs)
                    .ok_or_else(|| invalid("PLANT_HELPLINE_MODEL_TIMEOUT_SECS", &raw))?,
            ),
            None => None,
        };

        Ok(Self {
            bind,
            model,
            max_payload_bytes,
            model_timeout,
        })
    }

    /// Builds the Gemini model this configuration names.
    pub fn gemini_model(&self) -> Result<GeminiVisionModel> {
        GeminiVisionModel::builder()
            .model(self.model.as_str())
            .build()
    }
}

fn invalid(name: &str, value: &str) -> PlantIdError {
    PlantIdError::Config(format!("invalid {name}: {value:?}"))
}
