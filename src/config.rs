//! Configuration parsing and validation for billrelay.
//!
//! A [`Config`] is built once at startup from an optional TOML file and the
//! process environment, then shared read-only with the request handlers.

use axum::http::HeaderValue;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::Path;

/// Environment variable that replaces the port of `server.listen`.
pub const PORT_ENV: &str = "PORT";
/// Environment variable holding the server-side upstream key.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
/// Environment variable holding the comma-separated CORS allow-list.
pub const ALLOWED_ORIGINS_ENV: &str = "ALLOWED_ORIGINS";

/// Root configuration structure.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub cors: CorsConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "0.0.0.0:3000")
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Maximum accepted request body in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_listen() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_body_limit() -> usize {
    50 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

/// Upstream messages API configuration.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Full URL of the messages endpoint
    pub url: String,
    /// Value sent in the `anthropic-version` header
    pub api_version: String,
    /// Server-side key; when set it is used instead of any client key
    pub api_key: Option<ApiKey>,
    /// Required key prefix; empty disables the format check
    pub key_prefix: String,
    /// Total timeout for one upstream call, in seconds
    pub timeout_secs: u64,
    /// Connect timeout for one upstream call, in seconds
    pub connect_timeout_secs: u64,
}

fn default_upstream_url() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

fn default_key_prefix() -> String {
    "sk-ant-".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
            api_version: default_api_version(),
            api_key: None,
            key_prefix: default_key_prefix(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins; empty accepts any origin
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    /// Whether every origin is accepted: an empty list, or one containing `*`.
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.is_empty() || self.allowed_origins.iter().any(|o| o == "*")
    }
}

/// API key wrapper that redacts in Debug/Display/Serialize and zeroizes on drop.
///
/// The raw value is only reachable through [`ApiKey::expose_secret`], so every
/// place a key leaves the process can be found with `grep expose_secret`.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Access the raw key value.
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.expose_secret().is_empty()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl Serialize for ApiKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> serde::Deserialize<'de> for ApiKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(|s| ApiKey(SecretString::from(s)))
    }
}

impl From<String> for ApiKey {
    fn from(s: String) -> Self {
        ApiKey(SecretString::from(s))
    }
}

impl From<&str> for ApiKey {
    fn from(s: &str) -> Self {
        ApiKey(SecretString::from(s))
    }
}

/// How the server-side upstream key was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum KeySource {
    /// Key came from an environment variable (holds var name)
    Environment(String),
    /// Key in the config file contained ${VAR} references expanded from environment
    EnvExpanded,
    /// Key was a literal string in the config file
    Literal,
    /// No server-side key; callers must send their own
    None,
}

impl std::fmt::Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::Environment(var) => write!(f, "environment ({})", var),
            KeySource::EnvExpanded => write!(f, "config (env-expanded)"),
            KeySource::Literal => write!(f, "config-literal"),
            KeySource::None => write!(f, "none (client-provided keys)"),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable '{var}' invalid for '{field}': {message}")]
    EnvVar {
        var: String,
        field: String,
        message: String,
    },
}

/// Raw upstream config deserialized directly from TOML.
/// `api_key` is `Option<String>` so it may contain `${VAR}` references not yet expanded.
#[derive(Deserialize)]
pub struct RawUpstreamConfig {
    #[serde(default = "default_upstream_url")]
    url: String,
    #[serde(default = "default_api_version")]
    api_version: String,
    api_key: Option<String>,
    #[serde(default = "default_key_prefix")]
    key_prefix: String,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    connect_timeout_secs: u64,
}

impl Default for RawUpstreamConfig {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
            api_version: default_api_version(),
            api_key: None,
            key_prefix: default_key_prefix(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// Raw configuration deserialized directly from TOML, before the environment is applied.
#[derive(Default, Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    upstream: RawUpstreamConfig,
    #[serde(default)]
    cors: CorsConfig,
}

impl RawConfig {
    /// Parse a raw configuration from a TOML string.
    pub fn parse_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Read and parse a raw configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::parse_str(&content)
    }
}

/// Expand all `${VAR}` references in a string using a custom lookup function.
///
/// Supports multiple `${VAR}` in one string. Fails on first missing variable,
/// unclosed `${`, or empty variable name.
fn expand_env_vars_with<F>(input: &str, field: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if !input.contains("${") {
        return Ok(input.to_string());
    }

    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let end = after.find('}').ok_or_else(|| ConfigError::EnvVar {
            var: "<unclosed>".to_string(),
            field: field.to_string(),
            message: "Unclosed '${' in config value".to_string(),
        })?;

        let var_name = &after[..end];
        if var_name.is_empty() {
            return Err(ConfigError::EnvVar {
                var: "".to_string(),
                field: field.to_string(),
                message: "Empty variable name in '${}' reference".to_string(),
            });
        }

        let value = lookup(var_name).ok_or_else(|| ConfigError::EnvVar {
            var: var_name.to_string(),
            field: field.to_string(),
            message: format!("Environment variable '{}' is not set", var_name),
        })?;

        result.push_str(&value);
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    Ok(result)
}

/// Replace the port of a `host:port` listen address.
fn with_port(listen: &str, port: u16) -> String {
    match listen.rsplit_once(':') {
        Some((host, _)) if !host.is_empty() => format!("{}:{}", host, port),
        _ => format!("0.0.0.0:{}", port),
    }
}

/// Split a comma-separated origin list, trimming entries and dropping blanks.
fn parse_origin_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    /// Convert raw config to final config, applying the environment through `lookup`.
    ///
    /// - `PORT` replaces the port of `server.listen`
    /// - `ANTHROPIC_API_KEY` (non-empty) becomes the server-side key, overriding the file
    /// - otherwise a file `api_key` is expanded (`${VAR}`) or taken literally
    /// - `ALLOWED_ORIGINS` replaces `cors.allowed_origins`
    pub fn from_raw_with<F>(raw: RawConfig, lookup: F) -> Result<(Self, KeySource), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut server = raw.server;
        if let Some(port) = lookup(PORT_ENV).filter(|p| !p.trim().is_empty()) {
            let port: u16 = port.trim().parse().map_err(|_| ConfigError::EnvVar {
                var: PORT_ENV.to_string(),
                field: "server.listen".to_string(),
                message: format!("'{}' is not a valid port", port),
            })?;
            server.listen = with_port(&server.listen, port);
        }

        let env_key = lookup(API_KEY_ENV).filter(|k| !k.is_empty());
        let (api_key, key_source) = match (env_key, raw.upstream.api_key) {
            (Some(key), _) => (
                Some(ApiKey::from(key)),
                KeySource::Environment(API_KEY_ENV.to_string()),
            ),
            (None, Some(raw_key)) if raw_key.contains("${") => {
                let expanded = expand_env_vars_with(&raw_key, "upstream.api_key", &lookup)?;
                (Some(ApiKey::from(expanded)), KeySource::EnvExpanded)
            }
            (None, Some(raw_key)) if !raw_key.is_empty() => {
                (Some(ApiKey::from(raw_key)), KeySource::Literal)
            }
            (None, _) => (None, KeySource::None),
        };

        let mut cors = raw.cors;
        if let Some(origins) = lookup(ALLOWED_ORIGINS_ENV) {
            cors.allowed_origins = parse_origin_list(&origins);
        }

        let config = Config {
            server,
            upstream: UpstreamConfig {
                url: raw.upstream.url,
                api_version: raw.upstream.api_version,
                api_key,
                key_prefix: raw.upstream.key_prefix,
                timeout_secs: raw.upstream.timeout_secs,
                connect_timeout_secs: raw.upstream.connect_timeout_secs,
            },
            cors,
        };
        config.validate()?;

        Ok((config, key_source))
    }

    /// Load configuration from an optional TOML file and the real process environment.
    pub fn load(path: Option<&Path>) -> Result<(Self, KeySource), ConfigError> {
        let raw = match path {
            Some(path) => RawConfig::from_file(path)?,
            None => RawConfig::default(),
        };

        Self::from_raw_with(raw, |name| std::env::var(name).ok())
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let url = self.upstream.url.trim();
        if url.is_empty() {
            return Err(ConfigError::Validation("Upstream URL is empty".to_string()));
        }
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(ConfigError::Validation(format!(
                "Upstream URL '{}' must start with http:// or https://",
                url
            )));
        }
        if !url.starts_with("https://") {
            tracing::warn!(url = %url, "Upstream URL is not HTTPS - keys will travel in clear text");
        }

        if self.server.body_limit_bytes == 0 {
            return Err(ConfigError::Validation(
                "server.body_limit_bytes must be greater than zero".to_string(),
            ));
        }

        if self.upstream.api_version.is_empty() {
            return Err(ConfigError::Validation(
                "upstream.api_version is empty".to_string(),
            ));
        }

        for origin in &self.cors.allowed_origins {
            if HeaderValue::from_str(origin).is_err() {
                return Err(ConfigError::Validation(format!(
                    "CORS origin '{}' is not a valid header value",
                    origin
                )));
            }
        }

        Ok(())
    }

    /// Whether a server-side key is configured.
    pub fn has_server_key(&self) -> bool {
        self.upstream.api_key.is_some()
    }
}
