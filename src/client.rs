//! Client side of the pipeline: normalize, encode, post to the relay, parse.

use std::path::Path;
use std::sync::Arc;

use crate::api::{IdentifyResponse, IDENTIFY_PATH};
use crate::error::{PlantIdError, Result};
use crate::image::{EncodedImage, ImageBlob, ImageNormalizer};
use crate::parser::{AutoParser, ResponseParser};
use crate::plant::PlantInfo;

/// Relay used when neither the builder nor the environment names one.
pub const DEFAULT_RELAY_URL: &str = "http://127.0.0.1:3000";

/// Builder for IdentificationClient.
#[derive(Default)]
pub struct IdentificationClientBuilder {
    base_url: Option<String>,
    normalizer: Option<ImageNormalizer>,
    parser: Option<Box<dyn ResponseParser>>,
    http: Option<reqwest::Client>,
}

impl IdentificationClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the relay root, e.g. `http://localhost:3000`. Falls back to
    /// `PLANT_HELPLINE_RELAY_URL`, then [`DEFAULT_RELAY_URL`].
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the image normalizer (HEIC decoder, compression target).
    pub fn normalizer(mut self, normalizer: ImageNormalizer) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    /// Replaces the response parser.
    pub fn parser(mut self, parser: impl ResponseParser + 'static) -> Self {
        self.parser = Some(Box::new(parser));
        self
    }

    /// Reuses an existing HTTP client.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http = Some(client);
        self
    }

    /// Builds the client.
    pub fn build(self) -> Result<IdentificationClient> {
        let base_url = self
            .base_url
            .or_else(|| std::env::var("PLANT_HELPLINE_RELAY_URL").ok())
            .unwrap_or_else(|| DEFAULT_RELAY_URL.to_string());
        let base_url = base_url.trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(PlantIdError::Config(format!(
                "relay URL must be http(s): {base_url}"
            )));
        }

        Ok(IdentificationClient {
            http: self.http.unwrap_or_default(),
            endpoint: format!("{base_url}{IDENTIFY_PATH}"),
            normalizer: Arc::new(self.normalizer.unwrap_or_default()),
            parser: self.parser.unwrap_or_else(|| Box::new(AutoParser::new())),
        })
    }
}

/// Talks to the relay. One request per identification; no retries.
pub struct IdentificationClient {
    http: reqwest::Client,
    endpoint: String,
    normalizer: Arc<ImageNormalizer>,
    parser: Box<dyn ResponseParser>,
}

impl std::fmt::Debug for IdentificationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentificationClient")
            .field("endpoint", &self.endpoint)
            .field("normalizer", &self.normalizer)
            .finish_non_exhaustive()
    }
}

impl IdentificationClient {
    /// Creates a new `IdentificationClientBuilder`.
    pub fn builder() -> IdentificationClientBuilder {
        IdentificationClientBuilder::new()
    }

    /// Full URL of the identification endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Posts the payload and returns the model's raw text.
    pub async fn request_raw(&self, payload: &EncodedImage) -> Result<String> {
        let response = self.http.post(&self.endpoint).json(payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::debug!(%status, error = %e, "failed to read relay error body");
                    String::new()
                }
            };
            return Err(PlantIdError::Identification {
                status: status.as_u16(),
                body,
            });
        }

        let reply: IdentifyResponse = response.json().await?;
        Ok(reply.response)
    }

    /// Posts the payload and parses the reply.
    pub async fn identify(&self, payload: &EncodedImage) -> Result<PlantInfo> {
        let raw = self.request_raw(payload).await?;
        self.parser.parse(&raw)
    }

    /// Runs the whole pipeline for one uploaded image. The returned record's
    /// `image_url` is a data URL of the image that was actually sent.
    pub async fn identify_blob(&self, blob: ImageBlob) -> Result<PlantInfo> {
        let filename = blob.filename.clone();
        let result = self.run_pipeline(blob).await;
        match &result {
            Ok(info) => tracing::info!(%filename, plant = %info.name, "plant identified"),
            Err(e) => tracing::warn!(%filename, error = %e, "plant identification failed"),
        }
        result
    }

    /// Reads `path` and runs [`identify_blob`](Self::identify_blob).
    pub async fn identify_path(&self, path: impl AsRef<Path>) -> Result<PlantInfo> {
        let blob = ImageBlob::from_path(path)?;
        self.identify_blob(blob).await
    }

    async fn run_pipeline(&self, blob: ImageBlob) -> Result<PlantInfo> {
        let (normalized, payload) = self.prepare(blob).await?;
        tracing::debug!(
            file_type = %payload.file_type,
            encoded_bytes = payload.encoded_len(),
            endpoint = %self.endpoint,
            "sending image to relay"
        );
        let info = self.identify(&payload).await?;
        Ok(info.with_image_url(normalized.to_data_url()))
    }

    /// Normalizes and encodes on the blocking pool; decoding and JPEG
    /// re-encoding are CPU-bound.
    async fn prepare(&self, blob: ImageBlob) -> Result<(ImageBlob, EncodedImage)> {
        let normalizer = Arc::clone(&self.normalizer);
        tokio::task::spawn_blocking(move || {
            let normalized = normalizer.normalize(blob)?;
            let payload = EncodedImage::encode(&normalized);
            Ok::<_, PlantIdError>((normalized, payload))
        })
        .await
        .map_err(|e| PlantIdError::conversion_with("image processing task failed", e))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_joins_endpoint() {
        let client = IdentificationClient::builder()
            .base_url("http://localhost:3000/")
            .build()
            .unwrap();
        assert_eq!(client.endpoint(), "http://localhost:3000/api/identifyPlant");
    }

    #[test]
    fn test_builder_rejects_non_http_url() {
        let err = IdentificationClient::builder()
            .base_url("ftp://example.com")
            .build()
            .unwrap_err();
        assert!(matches!(err, PlantIdError::Config(_)));
    }

    #[tokio::test]
    async fn test_unreachable_relay_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = IdentificationClient::builder()
            .base_url(format!("http://{addr}"))
            .build()
            .unwrap();
        let payload = EncodedImage::from_wire("image/png", "AQID");
        let err = client.request_raw(&payload).await.unwrap_err();
        assert!(matches!(err, PlantIdError::Transport(_)));
    }

    /// Decodes only once the test lets it, so it can tell whether the
    /// runtime thread stayed free while decoding waited.
    struct GatedDecoder(std::sync::Mutex<std::sync::mpsc::Receiver<()>>);

    impl crate::image::HeifDecoder for GatedDecoder {
        fn decode(&self, _data: &[u8]) -> Result<image::DynamicImage> {
            self.0
                .lock()
                .unwrap()
                .recv_timeout(std::time::Duration::from_secs(2))
                .map_err(|_| PlantIdError::conversion("decoder gate never opened"))?;
            Ok(image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
                8,
                8,
                image::Rgb([20, 120, 40]),
            )))
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_image_work_runs_off_the_runtime_thread() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (open_gate, gate) = std::sync::mpsc::channel();
        let client = IdentificationClient::builder()
            .base_url(format!("http://{addr}"))
            .normalizer(
                ImageNormalizer::new()
                    .with_decoder(Box::new(GatedDecoder(std::sync::Mutex::new(gate)))),
            )
            .build()
            .unwrap();

        let mut heic = b"\x00\x00\x00\x18ftypheic".to_vec();
        heic.extend_from_slice(&[0; 16]);
        let blob = ImageBlob::new(heic, "image/heic", "leaf.heic");

        let (result, _) = tokio::join!(client.identify_blob(blob), async move {
            open_gate.send(()).unwrap();
        });

        // Decoding finished, so the failure comes from the unreachable relay.
        assert!(matches!(result, Err(PlantIdError::Transport(_))));
    }

    #[tokio::test]
    async fn test_truncated_error_body_keeps_status() {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            while !request.ends_with(b"}") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            stream
                .write_all(b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 100\r\n\r\nshort")
                .unwrap();
        });

        let client = IdentificationClient::builder()
            .base_url(format!("http://{addr}"))
            .build()
            .unwrap();
        let payload = EncodedImage::from_wire("image/png", "AQID");
        let err = client.request_raw(&payload).await.unwrap_err();
        assert!(matches!(
            err,
            PlantIdError::Identification { status: 500, ref body } if body.is_empty()
        ));
    }

    #[tokio::test]
    async fn test_bad_image_fails_before_network() {
        let client = IdentificationClient::builder()
            .base_url("http://127.0.0.1:9")
            .build()
            .unwrap();
        let blob = ImageBlob::new(b"not an image at all".to_vec(), "image/png", "x.png");
        let err = client.identify_blob(blob).await.unwrap_err();
        assert!(matches!(err, PlantIdError::Conversion { .. }));
    }
}
