//! Error types for billrelay.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::proxy::types::{ErrorEnvelope, AVAILABLE_ENDPOINTS};

/// Result type alias for billrelay operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error `type` attached to client input errors.
pub const INVALID_REQUEST_ERROR: &str = "invalid_request_error";
/// Error `type` used when the upstream error body carries none.
pub const API_ERROR: &str = "api_error";
/// Error `type` attached to local failures.
pub const SERVER_ERROR: &str = "server_error";

/// Main error type for billrelay.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("API key is required")]
    MissingApiKey,

    #[error("Payload is required")]
    MissingPayload,

    #[error("Invalid API key format")]
    InvalidApiKeyFormat,

    /// The request body could not be read or decoded.
    #[error("{message}")]
    InvalidBody { status: StatusCode, message: String },

    /// The upstream answered with a non-success status.
    #[error("{message}")]
    Upstream {
        status: StatusCode,
        message: String,
        kind: String,
    },

    #[error("Upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Upstream returned a malformed body: {0}")]
    MalformedUpstream(#[from] serde_json::Error),

    #[error("Endpoint not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::MissingApiKey | Error::MissingPayload | Error::InvalidApiKeyFormat => {
                StatusCode::BAD_REQUEST
            }
            Error::InvalidBody { status, .. } => *status,
            Error::Upstream { status, .. } => *status,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::Transport(_) | Error::MalformedUpstream(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether the error is a local failure whose details stay in the logs.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::MalformedUpstream(_) | Error::Internal(_)
        )
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();

        let envelope = match &self {
            Error::Upstream { message, kind, .. } => {
                ErrorEnvelope::new(message.as_str(), Some(kind.as_str()))
            }
            Error::NotFound => {
                ErrorEnvelope::with_endpoints(self.to_string(), AVAILABLE_ENDPOINTS)
            }
            _ if self.is_server_error() => {
                ErrorEnvelope::new("Internal server error", Some(SERVER_ERROR))
            }
            _ => ErrorEnvelope::new(self.to_string(), Some(INVALID_REQUEST_ERROR)),
        };

        (status, axum::Json(envelope)).into_response()
    }
}
