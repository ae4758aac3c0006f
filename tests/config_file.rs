//! Integration tests for the config file pipeline.
//!
//! These tests exercise TOML file -> raw parse -> environment overlay -> final
//! Config with KeySource metadata. Environment lookups are injected as closures
//! so the tests never touch process-wide state.

use std::io::Write;

use billrelay::config::{Config, ConfigError, KeySource, RawConfig};

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("create temp config");
    file.write_all(content.as_bytes()).expect("write temp config");
    file
}

/// A ${VAR} reference in upstream.api_key is expanded from the environment.
#[test]
fn test_file_key_reference_resolved() {
    let file = write_config(
        r#"
[server]
listen = "127.0.0.1:19876"

[upstream]
api_key = "${BILLRELAY_TEST_KEY}"
"#,
    );

    let raw = RawConfig::from_file(file.path()).expect("read config");
    let lookup = |name: &str| match name {
        "BILLRELAY_TEST_KEY" => Some("sk-ant-resolved".to_string()),
        _ => None,
    };
    let (config, source) = Config::from_raw_with(raw, lookup).expect("build config");

    assert_eq!(config.server.listen, "127.0.0.1:19876");
    assert_eq!(
        config.upstream.api_key.as_ref().unwrap().expose_secret(),
        "sk-ant-resolved"
    );
    assert_eq!(source, KeySource::EnvExpanded);
}

/// A missing variable names both the variable and the config field.
#[test]
fn test_file_key_reference_missing_var_errors() {
    let file = write_config(
        r#"
[upstream]
api_key = "${BILLRELAY_TEST_MISSING}"
"#,
    );

    let raw = RawConfig::from_file(file.path()).expect("read config");
    let err = Config::from_raw_with(raw, |_| None)
        .unwrap_err()
        .to_string();

    assert!(err.contains("BILLRELAY_TEST_MISSING"), "{}", err);
    assert!(err.contains("upstream.api_key"), "{}", err);
}

/// Environment values win over everything the file says.
#[test]
fn test_environment_overrides_file() {
    let file = write_config(
        r#"
[server]
listen = "127.0.0.1:3000"

[upstream]
api_key = "sk-ant-file"

[cors]
allowed_origins = ["https://file.example.com"]
"#,
    );

    let raw = RawConfig::from_file(file.path()).expect("read config");
    let lookup = |name: &str| match name {
        "PORT" => Some("8443".to_string()),
        "ANTHROPIC_API_KEY" => Some("sk-ant-env".to_string()),
        "ALLOWED_ORIGINS" => Some("https://env.example.com".to_string()),
        _ => None,
    };
    let (config, source) = Config::from_raw_with(raw, lookup).expect("build config");

    assert_eq!(config.server.listen, "127.0.0.1:8443");
    assert_eq!(
        config.upstream.api_key.as_ref().unwrap().expose_secret(),
        "sk-ant-env"
    );
    assert_eq!(
        source,
        KeySource::Environment("ANTHROPIC_API_KEY".to_string())
    );
    assert_eq!(config.cors.allowed_origins, vec!["https://env.example.com"]);
}

/// Without any key source, callers must supply keys.
#[test]
fn test_file_without_key_uses_client_keys() {
    let file = write_config("[server]\nlisten = \"127.0.0.1:3001\"\n");

    let raw = RawConfig::from_file(file.path()).expect("read config");
    let (config, source) = Config::from_raw_with(raw, |_| None).expect("build config");

    assert!(!config.has_server_key());
    assert_eq!(source, KeySource::None);
    assert_eq!(source.to_string(), "none (client-provided keys)");
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("does-not-exist.toml");

    let result = RawConfig::from_file(&path);
    match result {
        Err(ConfigError::Io { path: reported, .. }) => {
            assert!(reported.contains("does-not-exist.toml"));
        }
        Err(other) => panic!("expected Io error, got {}", other),
        Ok(_) => panic!("expected Io error, got a config"),
    }
}

#[test]
fn test_invalid_toml_is_parse_error() {
    let file = write_config("[upstream\nurl = ");

    let result = RawConfig::from_file(file.path());
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}
