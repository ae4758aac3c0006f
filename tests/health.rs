//! Integration tests for the router surface around the relay endpoint.
//!
//! Verifies that:
//! - GET /health returns 200 with status, message and timestamp, even when
//!   the upstream is unreachable
//! - Unknown routes and unsupported methods return 404 with the endpoint list
//! - Every response carries an x-request-id header
//! - CORS honors the configured origin allow-list

use axum::body::Body;
use http::{Method, Request, StatusCode};
use tower::ServiceExt;

use billrelay::config::Config;
use billrelay::proxy::{create_router, AppState, AVAILABLE_ENDPOINTS, REQUEST_ID_HEADER};

/// Build a relay app whose upstream points at a port nothing listens on.
fn setup_app(allowed_origins: &[&str]) -> axum::Router {
    let mut config = Config::default();
    config.upstream.url = "http://127.0.0.1:9/v1/messages".to_string();
    config.cors.allowed_origins = allowed_origins.iter().map(|o| o.to_string()).collect();

    create_router(AppState::new(config).expect("build app state"))
}

async fn parse_body(response: axum::response::Response) -> (StatusCode, serde_json::Value) {
    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), 1_048_576)
        .await
        .expect("read body");
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap_or_default();
    (status, json)
}

fn assert_endpoint_list(json: &serde_json::Value) {
    assert_eq!(json["error"]["message"], "Endpoint not found");
    let endpoints: Vec<&str> = json["error"]["availableEndpoints"]
        .as_array()
        .expect("availableEndpoints array")
        .iter()
        .map(|e| e.as_str().unwrap())
        .collect();
    assert_eq!(endpoints, AVAILABLE_ENDPOINTS);
}

// ============================================================================
// /health
// ============================================================================

#[tokio::test]
async fn test_health_ok_with_unreachable_upstream() {
    let app = setup_app(&[]);

    let request = Request::get("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    let (status, json) = parse_body(response).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["message"], "Server is running");

    let timestamp = json["timestamp"].as_str().expect("timestamp string");
    assert!(
        chrono::DateTime::parse_from_rfc3339(timestamp).is_ok(),
        "timestamp should be RFC 3339: {}",
        timestamp
    );
}

// ============================================================================
// 404 fallback
// ============================================================================

#[tokio::test]
async fn test_unknown_route_lists_endpoints() {
    let app = setup_app(&[]);

    let request = Request::get("/v1/unknown").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    let (status, json) = parse_body(response).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_endpoint_list(&json);
}

#[tokio::test]
async fn test_wrong_method_on_extract_is_not_found() {
    let app = setup_app(&[]);

    let request = Request::get("/extract").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    let (status, json) = parse_body(response).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_endpoint_list(&json);
}

#[tokio::test]
async fn test_wrong_method_on_health_is_not_found() {
    let app = setup_app(&[]);

    let request = Request::delete("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    let (status, json) = parse_body(response).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_endpoint_list(&json);
}

// ============================================================================
// Request ids
// ============================================================================

#[tokio::test]
async fn test_request_id_header_on_every_response() {
    for uri in ["/health", "/nowhere"] {
        let app = setup_app(&[]);
        let request = Request::get(uri).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        let id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .unwrap_or_else(|| panic!("missing request id on {}", uri));
        assert!(uuid::Uuid::parse_str(id.to_str().unwrap()).is_ok());
    }
}

// ============================================================================
// CORS
// ============================================================================

fn preflight(origin: &str) -> Request<Body> {
    Request::builder()
        .method(Method::OPTIONS)
        .uri("/extract")
        .header("origin", origin)
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_cors_any_origin_by_default() {
    let app = setup_app(&[]);

    let response = app
        .oneshot(preflight("https://anywhere.example"))
        .await
        .unwrap();

    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_cors_allow_list_accepts_listed_origin() {
    let app = setup_app(&["https://app.example.com", "https://admin.example.com"]);

    let response = app
        .oneshot(preflight("https://admin.example.com"))
        .await
        .unwrap();

    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "https://admin.example.com"
    );
    let methods = response
        .headers()
        .get("access-control-allow-methods")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(methods.contains("POST"));
}

#[tokio::test]
async fn test_cors_allow_list_omits_unlisted_origin() {
    let app = setup_app(&["https://app.example.com"]);

    let response = app
        .oneshot(preflight("https://evil.example.com"))
        .await
        .unwrap();

    assert!(response
        .headers()
        .get("access-control-allow-origin")
        .is_none());
}

#[tokio::test]
async fn test_cors_wildcard_entry_accepts_any_origin() {
    let app = setup_app(&["https://app.example.com", "*"]);

    let response = app
        .oneshot(preflight("https://anywhere.example"))
        .await
        .unwrap();

    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "*"
    );
}
