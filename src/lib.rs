#![warn(missing_docs)]
//! Plant Helpline - identify plants from photos.
//!
//! A photo goes through a short pipeline: HEIC/HEIF uploads are converted to
//! JPEG, the image is optionally compressed and base64-encoded, a relay
//! forwards it with a fixed prompt to a vision model, and the model's free
//! text is parsed into a [`PlantInfo`] record.
//!
//! # Quick Start - Client
//!
//! ```no_run
//! use plant_helpline::{is_unidentified, IdentificationClient};
//!
//! #[tokio::main]
//! async fn main() -> plant_helpline::Result<()> {
//!     let client = IdentificationClient::builder()
//!         .base_url("http://localhost:3000")
//!         .build()?;
//!     let info = client.identify_path("fern.heic").await?;
//!     if !is_unidentified(&info) {
//!         println!("{}", info.scientific_name.short);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Quick Start - Relay
//!
//! ```no_run
//! # #[cfg(feature = "server")]
//! # async fn run() -> plant_helpline::Result<()> {
//! use std::sync::Arc;
//! use plant_helpline::relay::{serve, RelayConfig, RelayState};
//!
//! let config = RelayConfig::from_env()?;
//! let model = Arc::new(config.gemini_model()?);
//! let listener = tokio::net::TcpListener::bind(config.bind).await?;
//! serve(listener, Arc::new(RelayState::from_config(model, &config))).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - `server`: the axum relay (`relay` module)
//! - `cli`: the `plant-helpline` binary
//! - `heic`: native HEIC/HEIF decoding through libheif

mod error;

pub mod api;
pub mod client;
pub mod image;
pub mod model;
pub mod parser;
pub mod plant;
pub mod present;
pub mod session;

#[cfg(feature = "server")]
pub mod relay;

// Re-export error types at crate root
pub use error::{PlantIdError, Result, USER_FACING_FAILURE};

pub use client::{IdentificationClient, IdentificationClientBuilder};
pub use image::{EncodedImage, HeifDecoder, ImageBlob, ImageFormat, ImageNormalizer};
pub use model::providers::{
    FakeVisionModel, GeminiModel, GeminiVisionModel, GeminiVisionModelBuilder,
};
pub use model::{identify_prompt, VisionModel, VisionModelKind};
pub use parser::{parse_response, ResponseParser};
pub use plant::{InfoDetail, PlantField, PlantInfo};
pub use present::{is_unidentified, render_summary};
pub use session::IdentificationSession;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::client::IdentificationClient;
    pub use crate::error::{PlantIdError, Result};
    pub use crate::image::{EncodedImage, ImageBlob, ImageNormalizer};
    pub use crate::model::VisionModel;
    pub use crate::parser::{parse_response, ResponseParser};
    pub use crate::plant::{InfoDetail, PlantInfo};
    pub use crate::present::is_unidentified;
    pub use crate::session::IdentificationSession;
}
