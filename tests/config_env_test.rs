//! Config environment variable tests
//!
//! These tests verify that Config::from_env() correctly reads and applies
//! environment variable overrides. Config::from_env() also loads a .env file
//! via dotenvy, so each test sets the variables it asserts on.
//!
//! Tests use #[serial] to prevent race conditions with shared env vars.

use cami_client::config::{Config, LogFormat, DEFAULT_API_BASE};
use serial_test::serial;
use std::env;

fn clear(vars: &[&str]) {
    for var in vars {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_config_defaults() {
    clear(&[
        "CAMI_API_BASE",
        "CAMI_AUTH_TOKEN",
        "MAX_ATTEMPTS",
        "RETRY_DELAY_MS",
        "REQUEST_TIMEOUT_MS",
    ]);

    let config = Config::from_env().unwrap();
    assert_eq!(config.api.base_url, DEFAULT_API_BASE);
    assert!(config.api.auth_token.is_none());
    assert_eq!(config.request.max_attempts, 3);
    assert_eq!(config.request.retry_delay_ms, 4000);
    assert_eq!(config.request.timeout_ms, 30000);
}

#[test]
#[serial]
fn test_config_custom_base_url_is_normalized() {
    env::set_var("CAMI_API_BASE", "http://localhost:8000/");

    let config = Config::from_env().unwrap();
    assert_eq!(config.api.base_url, "http://localhost:8000");

    clear(&["CAMI_API_BASE"]);
}

#[test]
#[serial]
fn test_config_rejects_non_http_base_url() {
    env::set_var("CAMI_API_BASE", "ftp://files.example.com");

    assert!(Config::from_env().is_err());

    clear(&["CAMI_API_BASE"]);
}

#[test]
#[serial]
fn test_config_retry_overrides() {
    env::set_var("MAX_ATTEMPTS", "5");
    env::set_var("RETRY_DELAY_MS", "250");
    env::set_var("REQUEST_TIMEOUT_MS", "1000");

    let config = Config::from_env().unwrap();
    assert_eq!(config.request.max_attempts, 5);
    assert_eq!(config.request.retry_delay_ms, 250);
    assert_eq!(config.request.timeout_ms, 1000);

    clear(&["MAX_ATTEMPTS", "RETRY_DELAY_MS", "REQUEST_TIMEOUT_MS"]);
}

#[test]
#[serial]
fn test_config_invalid_numbers_fall_back() {
    env::set_var("MAX_ATTEMPTS", "lots");

    let config = Config::from_env().unwrap();
    assert_eq!(config.request.max_attempts, 3);

    clear(&["MAX_ATTEMPTS"]);
}

#[test]
#[serial]
fn test_config_custom_database() {
    env::set_var("DATABASE_PATH", "/custom/cami.db");
    env::set_var("DATABASE_MAX_CONNECTIONS", "10");

    let config = Config::from_env().unwrap();
    assert_eq!(config.database.path.to_str().unwrap(), "/custom/cami.db");
    assert_eq!(config.database.max_connections, 10);

    clear(&["DATABASE_PATH", "DATABASE_MAX_CONNECTIONS"]);
}

#[test]
#[serial]
fn test_config_json_log_format() {
    env::set_var("LOG_FORMAT", "json");

    let config = Config::from_env().unwrap();
    assert_eq!(config.logging.format, LogFormat::Json);

    clear(&["LOG_FORMAT"]);
}

#[test]
#[serial]
fn test_config_auth_and_widget() {
    env::set_var("CAMI_AUTH_TOKEN", "eyJhbGciOiJIUzI1NiJ9.payload.sig");
    env::set_var("CAMI_WIDGET_KEY", "cami_live_abc");
    env::set_var("CAMI_WIDGET_BUSINESS_ID", "");

    let config = Config::from_env().unwrap();
    assert_eq!(
        config.api.auth_token.as_deref(),
        Some("eyJhbGciOiJIUzI1NiJ9.payload.sig")
    );
    assert_eq!(config.widget.api_key, "cami_live_abc");
    assert!(config.widget.business_id.is_none());

    clear(&["CAMI_AUTH_TOKEN", "CAMI_WIDGET_KEY", "CAMI_WIDGET_BUSINESS_ID"]);
}
