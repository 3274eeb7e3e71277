//! `POST /api/identifyPlant`.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::api::{ErrorResponse, IdentifyResponse};
use crate::image::EncodedImage;

use super::AppState;

/// Body of a 405.
pub const METHOD_NOT_ALLOWED: &str = "Method not allowed";
/// Body of a 400.
pub const MISSING_FIELDS: &str = "Missing required fields: fileType or base64Image";
/// Body of a 413.
pub const PAYLOAD_TOO_LARGE: &str = "Image payload too large";
/// Body of a 500. The cause is logged, never returned.
pub const IDENTIFY_FAILED: &str = "Failed to identify the plant.";

/// Request body as it arrives. Both fields are optional here so a missing
/// field yields our 400 body rather than the extractor's.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyRequest {
    #[serde(default)]
    file_type: Option<String>,
    #[serde(default)]
    base64_image: Option<String>,
}

fn error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Forwards one image to the vision model and returns its raw text.
pub async fn identify_plant(
    State(state): State<AppState>,
    payload: Result<Json<IdentifyRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            tracing::warn!("request body over the size limit");
            return error(StatusCode::PAYLOAD_TOO_LARGE, PAYLOAD_TOO_LARGE);
        }
        Err(rejection) => {
            tracing::debug!(error = %rejection.body_text(), "rejected request body");
            return error(StatusCode::BAD_REQUEST, MISSING_FIELDS);
        }
    };

    let (Some(file_type), Some(base64_image)) = (
        non_empty(request.file_type),
        non_empty(request.base64_image),
    ) else {
        return error(StatusCode::BAD_REQUEST, MISSING_FIELDS);
    };

    let image = EncodedImage::from_wire(file_type, &base64_image);
    if image.encoded_len() > state.max_payload_bytes {
        tracing::warn!(
            encoded_bytes = image.encoded_len(),
            limit = state.max_payload_bytes,
            "image payload too large"
        );
        return error(StatusCode::PAYLOAD_TOO_LARGE, PAYLOAD_TOO_LARGE);
    }

    let hash = image.content_hash();
    let request_id = &hash[..12];
    tracing::info!(
        request_id,
        file_type = %image.file_type,
        encoded_bytes = image.encoded_len(),
        model = state.model.model_name(),
        "identifying plant"
    );

    match state.describe(&image).await {
        Ok(response) => {
            tracing::debug!(request_id, %response, "model response");
            Json(IdentifyResponse { response }).into_response()
        }
        Err(e) => {
            if e.is_upstream() {
                tracing::warn!(request_id, error = %e, "model rejected the request");
            } else {
                tracing::error!(request_id, error = %e, "model call failed");
            }
            error(StatusCode::INTERNAL_SERVER_ERROR, IDENTIFY_FAILED)
        }
    }
}

/// Any method other than POST on the identify route.
pub async fn method_not_allowed() -> Response {
    error(StatusCode::METHOD_NOT_ALLOWED, METHOD_NOT_ALLOWED)
}
