use std::time::Duration;

use serial_test::serial;
use task_relay::config::BASE_URL_ENV;
use task_relay::{AppError, ClientConfig};

fn sample_toml() -> &'static str {
    r#"
base_url = "http://127.0.0.1:11451/"
create_path = "/api/createTask"
watch_path = "api/watchTask"
poll_interval_ms = 250
dependency_field = "prev_task"
request_timeout_seconds = 5
user_agent = "task-relay-test"
"#
}

#[test]
fn parses_full_config() {
    let config = ClientConfig::from_toml_str(sample_toml()).expect("valid config");

    assert_eq!(config.base_url, "http://127.0.0.1:11451");
    assert_eq!(config.create_url(), "http://127.0.0.1:11451/api/createTask");
    assert_eq!(config.watch_url(), "http://127.0.0.1:11451/api/watchTask");
    assert_eq!(config.poll_interval(), Duration::from_millis(250));
    assert_eq!(config.dependency_field, "prev_task");
    assert_eq!(config.request_timeout(), Some(Duration::from_secs(5)));
    assert_eq!(config.user_agent.as_deref(), Some("task-relay-test"));
}

#[test]
fn minimal_config_uses_defaults() {
    let config =
        ClientConfig::from_toml_str(r#"base_url = "https://tasks.example""#).expect("valid config");

    assert_eq!(config.create_url(), "https://tasks.example/createTask");
    assert_eq!(config.watch_url(), "https://tasks.example/watchTask");
    assert_eq!(config.poll_interval(), Duration::from_millis(100));
    assert_eq!(config.dependency_field, "last_task_id");
    assert_eq!(config.request_timeout(), None);
    assert_eq!(config, ClientConfig::with_base_url("https://tasks.example").unwrap());
}

#[test]
fn rejects_non_http_base_url() {
    let err = ClientConfig::from_toml_str(r#"base_url = "ftp://tasks""#).unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn rejects_zero_poll_interval() {
    let raw = r#"
base_url = "http://localhost"
poll_interval_ms = 0
"#;
    let err = ClientConfig::from_toml_str(raw).unwrap_err();
    assert!(err.to_string().contains("poll_interval_ms"));
}

#[test]
fn rejects_empty_dependency_field() {
    let raw = r#"
base_url = "http://localhost"
dependency_field = ""
"#;
    assert!(ClientConfig::from_toml_str(raw).is_err());
}

#[test]
fn rejects_missing_base_url() {
    let err = ClientConfig::from_toml_str("poll_interval_ms = 100").unwrap_err();
    assert!(err.to_string().starts_with("config:"));
}

#[test]
fn loads_from_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, sample_toml()).expect("write config");

    let config = ClientConfig::load_from_path(&path).expect("load");
    assert_eq!(config.dependency_field, "prev_task");
}

#[test]
fn missing_file_is_config_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = ClientConfig::load_from_path(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
#[serial]
fn env_override_replaces_base_url() {
    std::env::set_var(BASE_URL_ENV, "http://override:8080/");
    let mut config = ClientConfig::with_base_url("http://configured").unwrap();
    let result = config.apply_env_overrides();
    std::env::remove_var(BASE_URL_ENV);

    result.expect("override applies");
    assert_eq!(config.base_url, "http://override:8080");
}

#[test]
#[serial]
fn invalid_env_override_is_rejected() {
    std::env::set_var(BASE_URL_ENV, "not-a-url");
    let mut config = ClientConfig::with_base_url("http://configured").unwrap();
    let result = config.apply_env_overrides();
    std::env::remove_var(BASE_URL_ENV);

    assert!(matches!(result, Err(AppError::Config(_))));
}

#[test]
#[serial]
fn absent_env_override_keeps_base_url() {
    std::env::remove_var(BASE_URL_ENV);
    let mut config = ClientConfig::with_base_url("http://configured").unwrap();
    config.apply_env_overrides().expect("no-op");
    assert_eq!(config.base_url, "http://configured");
}
