//! HTTP relay server module.
//!
//! Accepts extract requests, forwards their payload to the configured
//! upstream messages API, and relays the answer back to the caller.

mod handlers;
mod server;
pub mod types;

pub use handlers::{UPSTREAM_KEY_HEADER, UPSTREAM_VERSION_HEADER};
pub use server::{create_router, run_server, AppState, RequestId, REQUEST_ID_HEADER};
pub use types::{ErrorEnvelope, ExtractRequest, HealthResponse, AVAILABLE_ENDPOINTS};
