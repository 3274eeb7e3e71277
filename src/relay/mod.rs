//! HTTP relay between the client and the vision model.
//!
//! The relay holds the model credential so the client never sees it. It
//! validates the payload, sends the fixed identification prompt with the
//! image, and returns the model's raw text as `{"response": ...}`.

mod config;
mod identify;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{DefaultBodyLimit, MatchedPath};
use axum::http::Request;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::api::IDENTIFY_PATH;
use crate::error::{PlantIdError, Result};
use crate::image::EncodedImage;
use crate::model::{identify_prompt, VisionModel};

pub use config::{RelayConfig, DEFAULT_BIND, DEFAULT_MAX_PAYLOAD_BYTES};
pub use identify::{
    IdentifyRequest, IDENTIFY_FAILED, METHOD_NOT_ALLOWED, MISSING_FIELDS, PAYLOAD_TOO_LARGE,
};

/// Room for the JSON envelope and `fileType` on top of the image itself.
const BODY_SLACK_BYTES: usize = 64 * 1024;

/// Shared, immutable relay state.
pub struct RelayState {
    model: Arc<dyn VisionModel>,
    max_payload_bytes: usize,
    model_timeout: Option<Duration>,
}

/// Application state shared across all handlers.
pub type AppState = Arc<RelayState>;

impl std::fmt::Debug for RelayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayState")
            .field("model", &self.model.name())
            .field("max_payload_bytes", &self.max_payload_bytes)
            .field("model_timeout", &self.model_timeout)
            .finish()
    }
}

impl RelayState {
    /// State with default limits around `model`.
    pub fn new(model: Arc<dyn VisionModel>) -> Self {
        Self {
            model,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            model_timeout: None,
        }
    }

    /// State with the limits from `config`.
    pub fn from_config(model: Arc<dyn VisionModel>, config: &RelayConfig) -> Self {
        Self {
            model,
            max_payload_bytes: config.max_payload_bytes,
            model_timeout: config.model_timeout,
        }
    }

    /// Sets the `base64Image` cap.
    pub fn with_max_payload_bytes(mut self, bytes: usize) -> Self {
        self.max_payload_bytes = bytes;
        self
    }

    /// Bounds each model call.
    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = Some(timeout);
        self
    }

    /// Checks that the model is reachable and the credential is accepted.
    pub async fn check_model(&self) -> Result<()> {
        self.bounded(self.model.health_check()).await
    }

    /// Sends the identification prompt and `image` to the model once.
    async fn describe(&self, image: &EncodedImage) -> Result<String> {
        self.bounded(self.model.describe(identify_prompt(), image)).await
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        match self.model_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| PlantIdError::Timeout(limit))?,
            None => call.await,
        }
    }
}

/// Builds the relay router.
pub fn router(state: AppState) -> Router {
    let body_limit = state.max_payload_bytes.saturating_add(BODY_SLACK_BYTES);

    Router::new()
        .route(
            IDENTIFY_PATH,
            post(identify::identify_plant).fallback(identify::method_not_allowed),
        )
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    let matched_path = request
                        .extensions()
                        .get::<MatchedPath>()
                        .map(MatchedPath::as_str)
                        .unwrap_or(request.uri().path());

                    if matched_path == "/health" {
                        tracing::trace_span!("http_request")
                    } else {
                        tracing::info_span!(
                            "http_request",
                            method = %request.method(),
                            path = %matched_path,
                        )
                    }
                })
                .on_request(|_request: &Request<_>, _span: &Span| {})
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        if span.metadata().map(|m| m.level()) == Some(&tracing::Level::TRACE) {
                            return;
                        }
                        let status = response.status().as_u16();
                        if status >= 500 {
                            tracing::error!(
                                status,
                                latency_ms = %latency.as_millis(),
                                "request failed with server error"
                            );
                        } else {
                            tracing::info!(
                                status,
                                latency_ms = %latency.as_millis(),
                                "request completed"
                            );
                        }
                    },
                ),
        )
}

async fn health() -> &'static str {
    "ok"
}

/// Serves the relay on `listener` until the process exits.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    if let Err(e) = state.check_model().await {
        tracing::warn!(
            model = state.model.model_name(),
            upstream = e.is_upstream(),
            error = %e,
            "model health check failed; serving anyway"
        );
    }
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, model = state.model.model_name(), "relay listening");
    }
    axum::serve(listener, router(state)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ErrorResponse, IdentifyResponse};
    use crate::model::providers::FakeVisionModel;
    use axum::body::Body;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    const REPLY: &str = "Scientific Name: Monstera deliciosa\nCommon Name: Swiss cheese plant";

    fn app(model: Arc<FakeVisionModel>) -> Router {
        router(Arc::new(RelayState::new(model)))
    }

    fn post_json(body: impl Into<String>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(IDENTIFY_PATH)
            .header("content-type", "application/json")
            .body(Body::from(body.into()))
            .unwrap()
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_forwards_prompt_and_image() {
        let model = Arc::new(FakeVisionModel::with_reply(REPLY));
        let response = app(model.clone())
            .oneshot(post_json(
                r#"{"fileType":"image/png","base64Image":"data:image/png;base64,AQID"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: IdentifyResponse = body_json(response).await;
        assert_eq!(body.response, REPLY);

        let (prompt, image) = model.last_request().unwrap();
        assert_eq!(prompt, identify_prompt());
        assert_eq!(image.file_type, "image/png");
        assert_eq!(image.base64_image, "AQID");
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_get_is_405() {
        let model = Arc::new(FakeVisionModel::with_reply(REPLY));
        let request = Request::builder()
            .method("GET")
            .uri(IDENTIFY_PATH)
            .body(Body::empty())
            .unwrap();
        let response = app(model.clone()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let body: ErrorResponse = body_json(response).await;
        assert_eq!(body.error, "Method not allowed");
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_fields_are_400() {
        for body in [
            r#"{"fileType":"image/png"}"#,
            r#"{"base64Image":"AQID"}"#,
            r#"{"fileType":"","base64Image":"AQID"}"#,
            r#"{"fileType":"image/png","base64Image":"   "}"#,
            r#"{}"#,
            "not json",
        ] {
            let model = Arc::new(FakeVisionModel::with_reply(REPLY));
            let response = app(model.clone()).oneshot(post_json(body)).await.unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
            let error: ErrorResponse = body_json(response).await;
            assert_eq!(error.error, MISSING_FIELDS);
            assert_eq!(model.calls(), 0);
        }
    }

    #[tokio::test]
    async fn test_oversized_payload_is_413() {
        let model = Arc::new(FakeVisionModel::with_reply(REPLY));
        let state = RelayState::new(model.clone()).with_max_payload_bytes(8);
        let response = router(Arc::new(state))
            .oneshot(post_json(
                r#"{"fileType":"image/png","base64Image":"AAAAAAAAAAAAAAAA"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let error: ErrorResponse = body_json(response).await;
        assert_eq!(error.error, PAYLOAD_TOO_LARGE);
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_model_failure_is_generic_500() {
        let model = Arc::new(FakeVisionModel::failing("quota exceeded for key AIzaSecret"));
        let response = app(model)
            .oneshot(post_json(r#"{"fileType":"image/png","base64Image":"AQID"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let error: ErrorResponse = body_json(response).await;
        assert_eq!(error.error, "Failed to identify the plant.");
    }

    #[tokio::test]
    async fn test_model_timeout_is_500() {
        let model =
            Arc::new(FakeVisionModel::with_reply(REPLY).with_delay(Duration::from_millis(500)));
        let state = RelayState::new(model).with_model_timeout(Duration::from_millis(20));
        let response = router(Arc::new(state))
            .oneshot(post_json(r#"{"fileType":"image/png","base64Image":"AQID"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_check_model() {
        let healthy = RelayState::new(Arc::new(FakeVisionModel::with_reply(REPLY)));
        assert!(healthy.check_model().await.is_ok());

        let broken = RelayState::new(Arc::new(FakeVisionModel::failing("key revoked")));
        let err = broken.check_model().await.unwrap_err();
        assert!(err.is_upstream());

        let slow = RelayState::new(Arc::new(
            FakeVisionModel::with_reply(REPLY).with_delay(Duration::from_millis(500)),
        ))
        .with_model_timeout(Duration::from_millis(20));
        let image = EncodedImage::from_wire("image/png", "AQID");
        assert!(matches!(
            slow.describe(&image).await,
            Err(PlantIdError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_relay_still_serves_when_model_unhealthy() {
        let model = Arc::new(FakeVisionModel::failing("key revoked"));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, Arc::new(RelayState::new(model))));

        let body = reqwest::get(format!("http://{addr}/health"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_health() {
        let model = Arc::new(FakeVisionModel::with_reply(REPLY));
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app(model).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"ok");
    }
}
