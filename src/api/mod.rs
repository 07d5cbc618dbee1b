//! Transport-agnostic access to the remote task service.
//!
//! The [`TaskApi`] trait decouples the orchestrator (launcher, poller,
//! session) from the HTTP client so the orchestration logic can run
//! against an in-memory service in tests.

pub mod http;

use std::future::Future;
use std::pin::Pin;

use crate::models::status::WatchResponse;
use crate::models::task::{CreateTaskResponse, FormPayload, TaskId};
use crate::Result;

/// The two endpoints of the task service.
pub trait TaskApi: Send + Sync {
    /// Submit a new task.
    ///
    /// Exactly one request is issued per call. A body without `taskid` is
    /// returned as-is; interpreting it is the launcher's job.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`](crate::AppError::Transport) if the
    /// request fails, or [`AppError::Protocol`](crate::AppError::Protocol)
    /// if the body is not JSON.
    fn create_task<'a>(
        &'a self,
        payload: &'a FormPayload,
    ) -> Pin<Box<dyn Future<Output = Result<CreateTaskResponse>> + Send + 'a>>;

    /// Fetch the current status of a task.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`](crate::AppError::Transport) if the
    /// request fails, or [`AppError::Protocol`](crate::AppError::Protocol)
    /// if the body is not JSON.
    fn watch_task<'a>(
        &'a self,
        task_id: &'a TaskId,
    ) -> Pin<Box<dyn Future<Output = Result<WatchResponse>> + Send + 'a>>;
}
