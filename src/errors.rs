//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Network failure talking to the task service.
    Transport(String),
    /// Task service answered with a body that does not follow the protocol.
    Protocol(String),
    /// Task service rejected the request (non-OK response code).
    Server(String),
    /// Another task is already running in this session.
    Busy(String),
    /// Dependent launch attempted before any successful analysis task.
    MissingDependency(String),
    /// Polling was cancelled before the task reported completion.
    Cancelled(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Transport(msg) => write!(f, "transport: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
            Self::Server(msg) => write!(f, "server: {msg}"),
            Self::Busy(msg) => write!(f, "busy: {msg}"),
            Self::MissingDependency(msg) => write!(f, "missing dependency: {msg}"),
            Self::Cancelled(msg) => write!(f, "cancelled: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// Whether the error was caused by user action rather than the server or network.
    ///
    /// User-triggered conditions are rejected before any request is issued
    /// and should be surfaced to the operator directly.
    #[must_use]
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Self::Busy(_) | Self::MissingDependency(_))
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Protocol(format!("undecodable response: {err}"))
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(format!("invalid json: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
