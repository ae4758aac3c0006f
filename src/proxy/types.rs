//! Wire types for the relay endpoints.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;

use crate::config::ApiKey;

/// Endpoints advertised in 404 responses.
pub const AVAILABLE_ENDPOINTS: &[&str] = &["GET /health", "POST /extract", "POST /api/extract"];

/// Inbound request envelope for `POST /extract`.
///
/// `payload` is kept as unparsed JSON and forwarded byte-for-byte; the relay
/// never looks inside it. A JSON `null` payload deserializes to `None`.
#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    #[serde(rename = "apiKey", default, deserialize_with = "lenient_api_key")]
    pub api_key: Option<ApiKey>,
    #[serde(default)]
    pub payload: Option<Box<RawValue>>,
}

/// Only a JSON string is a client key; any other value counts as absent.
fn lenient_api_key<'de, D>(deserializer: D) -> Result<Option<ApiKey>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(key)) => Ok(Some(ApiKey::from(key))),
        _ => Ok(None),
    }
}

/// Error envelope returned on every non-success response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub message: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_endpoints: Option<Vec<String>>,
}

impl ErrorEnvelope {
    pub fn new(message: impl Into<String>, kind: Option<&str>) -> Self {
        Self {
            error: ErrorDetail {
                message: message.into(),
                kind: kind.map(str::to_string),
                available_endpoints: None,
            },
        }
    }

    pub fn with_endpoints(message: impl Into<String>, endpoints: &[&str]) -> Self {
        Self {
            error: ErrorDetail {
                message: message.into(),
                kind: None,
                available_endpoints: Some(endpoints.iter().map(|e| e.to_string()).collect()),
            },
        }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub timestamp: String,
}

/// Subset of an upstream error body the relay understands.
///
/// Fields are loosely typed so an unexpected shape degrades to the
/// synthesized message instead of failing the request.
#[derive(Debug, Default, Deserialize)]
pub struct UpstreamErrorBody {
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl UpstreamErrorBody {
    fn field(&self, name: &str) -> Option<&str> {
        self.error
            .as_ref()?
            .get(name)?
            .as_str()
            .filter(|value| !value.is_empty())
    }

    /// Upstream `error.message`, when present and non-empty.
    pub fn message(&self) -> Option<&str> {
        self.field("message")
    }

    /// Upstream `error.type`, when present and non-empty.
    pub fn kind(&self) -> Option<&str> {
        self.field("type")
    }
}
