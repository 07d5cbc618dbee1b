//! Task submission.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::api::TaskApi;
use crate::models::task::{FormPayload, TaskId};
use crate::{AppError, Result};

/// Submits task requests to the create endpoint.
///
/// A launcher never retries: a failed launch must be triggered again by
/// the caller.
pub struct TaskLauncher {
    api: Arc<dyn TaskApi>,
}

impl TaskLauncher {
    /// Create a launcher over the given task service.
    #[must_use]
    pub fn new(api: Arc<dyn TaskApi>) -> Self {
        Self { api }
    }

    /// Submit `payload` and return the identifier of the new task.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Transport` if the request fails, or
    /// `AppError::Protocol` if the response carries no task id.
    pub async fn launch(&self, payload: &FormPayload) -> Result<TaskId> {
        let task_type = payload.task_type().map(|t| t.as_str());

        let response = match self.api.create_task(payload).await {
            Ok(response) => response,
            Err(err) => {
                error!(?task_type, %err, "create-task request failed");
                return Err(err);
            }
        };

        let Some(task_id) = response.task_id().cloned() else {
            warn!(
                ?task_type,
                code = ?response.code,
                message = ?response.message,
                "create-task response carried no task id"
            );
            return Err(AppError::Protocol(format!(
                "no task id in create-task response: {}",
                response.message.as_deref().unwrap_or("unknown error")
            )));
        };

        info!(%task_id, ?task_type, "task created");
        Ok(task_id)
    }
}
