//! Polled task status.

use serde::Deserialize;

use crate::models::task::{TaskId, API_CODE_OK};
use crate::{AppError, Result};

/// Snapshot of a task as reported by the watch endpoint.
///
/// `messages` is the full task log, re-sent in full on every poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskStatus {
    /// Identifier echoed back by the service.
    pub taskid: Option<TaskId>,
    /// Transient notices; only the newest one is meaningful.
    pub flash_messages: Vec<String>,
    /// Complete log of the task so far.
    pub messages: Vec<String>,
    /// Whether the task has finished.
    pub done: bool,
    /// Outcome of analysis tasks; absent for other task types.
    pub success: Option<bool>,
}

impl TaskStatus {
    /// Newest flash notice.
    #[must_use]
    pub fn latest_flash(&self) -> Option<&str> {
        self.flash_messages.last().map(String::as_str)
    }

    /// Full log joined with newlines.
    #[must_use]
    pub fn log_text(&self) -> String {
        self.messages.join("\n")
    }

    /// Whether the task finished without reporting a failure.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.done && self.success != Some(false)
    }
}

/// Raw body of the watch endpoint.
///
/// Error responses omit the status fields and carry `code` and `message`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WatchResponse {
    /// Service response code.
    #[serde(default)]
    pub code: Option<i64>,
    /// Human-readable error reason.
    #[serde(default)]
    pub message: Option<String>,
    /// Identifier echoed back by the service.
    #[serde(default)]
    pub taskid: Option<TaskId>,
    /// Whether the task has finished.
    #[serde(default)]
    pub done: Option<bool>,
    /// Full task log.
    #[serde(default)]
    pub messages: Option<Vec<String>>,
    /// Transient notices.
    #[serde(default)]
    pub flash_messages: Option<Vec<String>>,
    /// Outcome of analysis tasks.
    #[serde(default)]
    pub success: Option<bool>,
}

impl WatchResponse {
    /// Convert the raw body into a [`TaskStatus`].
    ///
    /// # Errors
    ///
    /// Returns `AppError::Server` if the service answered with a non-OK code
    /// and no status, or `AppError::Protocol` if the status fields are missing.
    pub fn into_status(self) -> Result<TaskStatus> {
        let Some(done) = self.done else {
            let reason = self.message.unwrap_or_else(|| "no status in response".into());
            return match self.code {
                Some(code) if code != API_CODE_OK => {
                    Err(AppError::Server(format!("code {code}: {reason}")))
                }
                _ => Err(AppError::Protocol(reason)),
            };
        };

        Ok(TaskStatus {
            taskid: self.taskid,
            flash_messages: self.flash_messages.unwrap_or_default(),
            messages: self.messages.unwrap_or_default(),
            done,
            success: self.success,
        })
    }
}
