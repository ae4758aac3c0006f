//! billrelay - Minimal JSON relay in front of the Anthropic Messages API
//!
//! This library provides the core functionality for the relay, including
//! configuration, the error envelope, and the HTTP server.

pub mod config;
pub mod error;
pub mod proxy;

pub use config::Config;
pub use error::{Error, Result};
