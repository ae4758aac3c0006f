//! HTTP request handlers.

use axum::{
    body::{Body, Bytes},
    extract::{rejection::JsonRejection, Extension, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::value::RawValue;
use std::time::Instant;

use super::server::{AppState, RequestId};
use super::types::{ExtractRequest, HealthResponse, UpstreamErrorBody};
use crate::config::{ApiKey, UpstreamConfig};
use crate::error::{Error, API_ERROR};

/// Header carrying the upstream key.
pub const UPSTREAM_KEY_HEADER: &str = "x-api-key";
/// Header carrying the upstream API version.
pub const UPSTREAM_VERSION_HEADER: &str = "anthropic-version";

/// Resolve and validate the key and payload of an extract request.
///
/// Checks run in a fixed order: effective key present, payload present, key
/// prefix. A configured server-side key always wins over the client's.
fn validate_request(
    request: ExtractRequest,
    upstream: &UpstreamConfig,
) -> Result<(ApiKey, Box<RawValue>), Error> {
    let api_key = upstream
        .api_key
        .clone()
        .or(request.api_key)
        .filter(|key| !key.is_empty())
        .ok_or(Error::MissingApiKey)?;

    let payload = request.payload.ok_or(Error::MissingPayload)?;

    if !api_key.expose_secret().starts_with(&upstream.key_prefix) {
        return Err(Error::InvalidApiKeyFormat);
    }

    Ok((api_key, payload))
}

/// Build the error for a non-success upstream answer.
///
/// Prefers the upstream's own `error.message` and `error.type`; any body that
/// does not parse falls back to a message built from the status code.
fn upstream_error(status: StatusCode, body: &[u8]) -> Error {
    let parsed: UpstreamErrorBody = serde_json::from_slice(body).unwrap_or_default();

    Error::Upstream {
        status,
        message: parsed
            .message()
            .map(str::to_string)
            .unwrap_or_else(|| format!("API request failed with status {}", status.as_u16())),
        kind: parsed.kind().unwrap_or(API_ERROR).to_string(),
    }
}

/// Handle POST /extract and POST /api/extract
pub async fn extract(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    body: Result<Json<ExtractRequest>, JsonRejection>,
) -> Response {
    let start = Instant::now();
    tracing::info!(request_id = %request_id.0, "Received extraction request");

    let result = match body {
        Ok(Json(request)) => relay(&state, request, start).await,
        Err(rejection) => Err(Error::InvalidBody {
            status: rejection.status(),
            message: rejection.body_text(),
        }),
    };

    let elapsed_ms = start.elapsed().as_millis() as u64;
    match result {
        Ok(response) => {
            tracing::info!(request_id = %request_id.0, elapsed_ms, "Extraction successful");
            response
        }
        Err(e) => {
            if e.is_server_error() {
                tracing::error!(
                    request_id = %request_id.0,
                    elapsed_ms,
                    error = %e,
                    "Server error"
                );
            } else {
                tracing::warn!(
                    request_id = %request_id.0,
                    elapsed_ms,
                    status = %e.status(),
                    error = %e,
                    "Extraction request failed"
                );
            }
            e.into_response()
        }
    }
}

/// Validate, forward to the upstream once, and translate the answer.
async fn relay(
    state: &AppState,
    request: ExtractRequest,
    start: Instant,
) -> Result<Response, Error> {
    let upstream = &state.config.upstream;
    let (api_key, payload) = validate_request(request, upstream)?;

    tracing::debug!(url = %upstream.url, bytes = payload.get().len(), "Calling upstream");

    let upstream_response = state
        .http_client
        .post(&upstream.url)
        .header(header::CONTENT_TYPE, "application/json")
        .header(UPSTREAM_KEY_HEADER, api_key.expose_secret())
        .header(UPSTREAM_VERSION_HEADER, upstream.api_version.as_str())
        .body(String::from(payload.get()))
        .send()
        .await?;

    let status = upstream_response.status();
    tracing::info!(
        status = %status,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Upstream responded"
    );

    let body = upstream_response.bytes().await?;

    if !status.is_success() {
        tracing::error!(
            status = %status,
            body = %String::from_utf8_lossy(&body),
            "Upstream returned error"
        );
        return Err(upstream_error(status, &body));
    }

    json_passthrough(body)
}

/// Relay a JSON body unchanged with status 200.
fn json_passthrough(body: Bytes) -> Result<Response, Error> {
    serde_json::from_slice::<&RawValue>(&body)?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .map_err(|e| Error::Internal(format!("Failed to build response: {}", e)))
}

/// Handle GET /health
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        message: "Server is running",
        timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    })
}

/// Fallback for unknown routes and methods.
pub async fn not_found() -> Error {
    Error::NotFound
}
