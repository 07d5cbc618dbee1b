//! Client configuration parsing and validation.

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::{AppError, Result};

/// Environment variable that overrides `base_url` from the config file.
pub const BASE_URL_ENV: &str = "TASK_RELAY_BASE_URL";

fn default_create_path() -> String {
    "/createTask".into()
}

fn default_watch_path() -> String {
    "/watchTask".into()
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_dependency_field() -> String {
    "last_task_id".into()
}

/// Client configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ClientConfig {
    /// Root URL of the task service, e.g. `http://127.0.0.1:11451`.
    pub base_url: String,
    /// Path of the task-creation endpoint.
    #[serde(default = "default_create_path")]
    pub create_path: String,
    /// Path of the task-status endpoint.
    #[serde(default = "default_watch_path")]
    pub watch_path: String,
    /// Fixed polling period.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Reserved form field carrying the prior task id on dependent launches.
    #[serde(default = "default_dependency_field")]
    pub dependency_field: String,
    /// Per-request timeout; 0 means no timeout.
    #[serde(default)]
    pub request_timeout_seconds: u64,
    /// Optional `User-Agent` header for outgoing requests.
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl ClientConfig {
    /// Build a configuration with defaults for everything except the base URL.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the URL fails validation.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let mut config = Self {
            base_url: base_url.into(),
            create_path: default_create_path(),
            watch_path: default_watch_path(),
            poll_interval_ms: default_poll_interval_ms(),
            dependency_field: default_dependency_field(),
            request_timeout_seconds: 0,
            user_agent: None,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Replace `base_url` with the value of [`BASE_URL_ENV`] when it is set.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the override is not a valid URL.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(url) = env::var(BASE_URL_ENV) {
            if !url.is_empty() {
                info!(base_url = %url, "base_url overridden from environment");
                self.set_base_url(url)?;
            }
        }
        Ok(())
    }

    /// Point the client at a different service root.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the URL is not http or https.
    pub fn set_base_url(&mut self, url: impl Into<String>) -> Result<()> {
        self.base_url = url.into();
        self.validate()
    }

    /// Fixed polling period.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Per-request timeout, if one is configured.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_seconds > 0).then(|| Duration::from_secs(self.request_timeout_seconds))
    }

    /// Absolute URL of the task-creation endpoint.
    #[must_use]
    pub fn create_url(&self) -> String {
        join_url(&self.base_url, &self.create_path)
    }

    /// Absolute URL of the task-status endpoint.
    #[must_use]
    pub fn watch_url(&self) -> String {
        join_url(&self.base_url, &self.watch_path)
    }

    fn validate(&mut self) -> Result<()> {
        let trimmed = self.base_url.trim().trim_end_matches('/').to_owned();
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(AppError::Config(format!(
                "base_url must start with http:// or https://, got {trimmed:?}"
            )));
        }
        self.base_url = trimmed;

        if self.poll_interval_ms == 0 {
            return Err(AppError::Config(
                "poll_interval_ms must be greater than zero".into(),
            ));
        }

        if self.create_path.is_empty() || self.watch_path.is_empty() {
            return Err(AppError::Config("endpoint paths must not be empty".into()));
        }

        if self.dependency_field.is_empty() {
            return Err(AppError::Config(
                "dependency_field must not be empty".into(),
            ));
        }

        Ok(())
    }
}

fn join_url(base: &str, path: &str) -> String {
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}
