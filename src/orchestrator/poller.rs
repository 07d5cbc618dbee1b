//! Fixed-period status polling for a single task.
//!
//! A [`TaskPoller`] queries the watch endpoint once per period until the
//! task reports `done`, pushing every status into the shared
//! [`TaskView`]. The first poll fires one period after the poller is
//! spawned. Completion is delivered exactly once through the
//! [`PollHandle`]; cancellation goes through a [`CancellationToken`] and
//! guarantees no poll is issued once it is observed.
//!
//! A failed cycle (network error, unreadable body, service error) is
//! logged and the loop stays armed for the next tick. There is no backoff,
//! no cycle limit, and no overall timeout.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::api::TaskApi;
use crate::display::TaskView;
use crate::models::status::{TaskStatus, WatchResponse};
use crate::models::task::TaskId;
use crate::{AppError, Result};

/// Hook run on the final status, before it is handed to [`PollHandle::wait`].
///
/// Dropped without running if polling is cancelled.
pub type CompletionHook = Box<dyn FnOnce(&TaskStatus) + Send + 'static>;

/// Builder for a per-task polling loop.
///
/// Call [`spawn`](Self::spawn) to start the background loop.
pub struct TaskPoller {
    api: Arc<dyn TaskApi>,
    task_id: TaskId,
    period: Duration,
    view: Option<Arc<watch::Sender<TaskView>>>,
    on_done: Option<CompletionHook>,
    cancel: CancellationToken,
}

impl TaskPoller {
    /// Construct a poller (does not start polling yet).
    #[must_use]
    pub fn new(
        api: Arc<dyn TaskApi>,
        task_id: TaskId,
        period: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            api,
            task_id,
            period,
            view: None,
            on_done: None,
            cancel,
        }
    }

    /// Start polling `task_id` with a fresh cancellation token.
    #[must_use]
    pub fn watch(api: Arc<dyn TaskApi>, task_id: TaskId, period: Duration) -> PollHandle {
        Self::new(api, task_id, period, CancellationToken::new()).spawn()
    }

    /// Publish every polled status into `view`.
    #[must_use]
    pub fn with_view(mut self, view: Arc<watch::Sender<TaskView>>) -> Self {
        self.view = Some(view);
        self
    }

    /// Run `hook` on the final status.
    #[must_use]
    pub fn on_done(mut self, hook: CompletionHook) -> Self {
        self.on_done = Some(hook);
        self
    }

    /// Spawn the background polling task and return a handle to it.
    #[must_use]
    pub fn spawn(self) -> PollHandle {
        let (done_tx, done_rx) = oneshot::channel();
        let task_id = self.task_id.clone();
        let cancel = self.cancel.clone();
        let span = info_span!("task_poller", task_id = %self.task_id);

        let join_handle = tokio::spawn(
            async move {
                let Self {
                    api,
                    task_id,
                    period,
                    view,
                    on_done,
                    cancel,
                } = self;

                let Some(status) = Self::run(api.as_ref(), &task_id, period, view, &cancel).await
                else {
                    return;
                };

                if let Some(hook) = on_done {
                    hook(&status);
                }
                let _ = done_tx.send(status);
            }
            .instrument(span),
        );

        PollHandle {
            task_id,
            cancel,
            done_rx,
            join_handle,
        }
    }

    /// Core polling loop. Returns `None` if cancelled before completion.
    async fn run(
        api: &dyn TaskApi,
        task_id: &TaskId,
        period: Duration,
        view: Option<Arc<watch::Sender<TaskView>>>,
        cancel: &CancellationToken,
    ) -> Option<TaskStatus> {
        let mut ticker = interval_at(Instant::now() + period, period);
        // Cycles never overlap: a slow response delays the next tick.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycle: u64 = 0;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(%task_id, cycle, "poller cancelled");
                    return None;
                }
                _ = ticker.tick() => {}
            }
            cycle += 1;

            let response = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(%task_id, cycle, "poller cancelled mid-request");
                    return None;
                }
                response = api.watch_task(task_id) => response,
            };

            let status = match response.and_then(WatchResponse::into_status) {
                Ok(status) => status,
                Err(err) => {
                    warn!(%task_id, cycle, %err, "poll cycle failed");
                    continue;
                }
            };

            if let Some(ref view) = view {
                view.send_modify(|current| current.apply(&status));
            }

            if status.done {
                cancel.cancel();
                info!(%task_id, cycle, success = ?status.success, "task finished");
                return Some(status);
            }
        }
    }
}

/// Handle returned from [`TaskPoller::spawn`].
///
/// Dropping the handle detaches the loop; polling continues until the task
/// finishes or the token is cancelled.
pub struct PollHandle {
    task_id: TaskId,
    cancel: CancellationToken,
    done_rx: oneshot::Receiver<TaskStatus>,
    join_handle: JoinHandle<()>,
}

impl PollHandle {
    /// Task this handle polls.
    #[must_use]
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Stop polling. Calling this more than once has no further effect.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that stops the loop when cancelled.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether the background loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }

    /// Wait for the final status.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Cancelled` if polling stopped before the task
    /// reported completion.
    pub async fn wait(self) -> Result<TaskStatus> {
        self.done_rx.await.map_err(|_| {
            AppError::Cancelled(format!("polling of task {} stopped", self.task_id))
        })
    }
}
