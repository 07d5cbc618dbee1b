//! Session coordination: single-flight launches and dependency chaining.
//!
//! A [`TaskSession`] owns the state that must be shared by every launch in
//! one operator session:
//!
//! - the `running` flag, taken atomically through [`TaskSession::try_begin_task`]
//!   and released when the returned [`FlightPermit`] is dropped;
//! - the register holding the id of the most recent successful
//!   dependency-eligible task, which dependent launches send back to the
//!   service under the reserved dependency field;
//! - the display channel the active task's poller writes to.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use crate::api::http::HttpTaskApi;
use crate::api::TaskApi;
use crate::config::ClientConfig;
use crate::display::TaskView;
use crate::models::status::TaskStatus;
use crate::models::task::{FormPayload, TaskId, TaskType};
use crate::orchestrator::launcher::TaskLauncher;
use crate::orchestrator::poller::{PollHandle, TaskPoller};
use crate::{AppError, Result};

/// How a launch relates to the dependency register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Needs nothing but the single-flight guard.
    Independent {
        /// Record the task in the register when it finishes successfully.
        dependency_eligible: bool,
    },
    /// Needs a recorded predecessor; never updates the register itself.
    Dependent,
}

impl LaunchMode {
    /// Mode implied by a known task type.
    #[must_use]
    pub fn for_task_type(task_type: TaskType) -> Self {
        if task_type.is_dependent() {
            Self::Dependent
        } else {
            Self::Independent {
                dependency_eligible: true,
            }
        }
    }

    fn records_dependency(self) -> bool {
        matches!(
            self,
            Self::Independent {
                dependency_eligible: true
            }
        )
    }
}

/// Proof that the holder owns the session's single flight slot.
///
/// The slot is released when the permit is dropped, after which
/// [`released`](Self::released) is cancelled.
#[derive(Debug)]
pub struct FlightPermit {
    running: Arc<AtomicBool>,
    released: CancellationToken,
}

impl FlightPermit {
    /// Token cancelled once this permit has given the slot back.
    #[must_use]
    pub fn released(&self) -> CancellationToken {
        self.released.clone()
    }
}

impl Drop for FlightPermit {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.released.cancel();
    }
}

/// Poller currently bound to the session's flight slot.
struct ActivePoll {
    cancel: CancellationToken,
    released: CancellationToken,
}

/// A launched task being polled to completion.
pub struct TaskRun {
    mode: LaunchMode,
    handle: PollHandle,
}

impl TaskRun {
    /// Identifier assigned by the service.
    #[must_use]
    pub fn task_id(&self) -> &TaskId {
        self.handle.task_id()
    }

    /// Mode the task was launched with.
    #[must_use]
    pub fn mode(&self) -> LaunchMode {
        self.mode
    }

    /// Stop polling this task.
    pub fn cancel(&self) {
        self.handle.cancel();
    }

    /// Wait for the final status.
    ///
    /// By the time this resolves the session is no longer running and the
    /// dependency register reflects the outcome.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Cancelled` if polling was cancelled first.
    pub async fn wait(self) -> Result<TaskStatus> {
        self.handle.wait().await
    }
}

/// Per-operator orchestration state.
pub struct TaskSession {
    api: Arc<dyn TaskApi>,
    launcher: TaskLauncher,
    poll_interval: Duration,
    dependency_field: String,
    running: Arc<AtomicBool>,
    last_dependency: Arc<Mutex<Option<TaskId>>>,
    view: Arc<watch::Sender<TaskView>>,
    active: Mutex<Option<ActivePoll>>,
}

impl TaskSession {
    /// Create a session over an arbitrary task service.
    #[must_use]
    pub fn new(api: Arc<dyn TaskApi>, config: &ClientConfig) -> Self {
        let (view, _) = watch::channel(TaskView::default());
        Self {
            launcher: TaskLauncher::new(Arc::clone(&api)),
            api,
            poll_interval: config.poll_interval(),
            dependency_field: config.dependency_field.clone(),
            running: Arc::new(AtomicBool::new(false)),
            last_dependency: Arc::new(Mutex::new(None)),
            view: Arc::new(view),
            active: Mutex::new(None),
        }
    }

    /// Create a session talking HTTP to the configured service.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let api: Arc<dyn TaskApi> = Arc::new(HttpTaskApi::new(config)?);
        Ok(Self::new(api, config))
    }

    /// Take the single flight slot, or `None` if a task is already running.
    #[must_use]
    pub fn try_begin_task(&self) -> Option<FlightPermit> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| FlightPermit {
                running: Arc::clone(&self.running),
                released: CancellationToken::new(),
            })
    }

    /// Whether a task currently holds the flight slot.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Most recent successful dependency-eligible task.
    #[must_use]
    pub fn last_dependency(&self) -> Option<TaskId> {
        self.last_dependency
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Receiver that observes every display update.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TaskView> {
        self.view.subscribe()
    }

    /// Current display snapshot.
    #[must_use]
    pub fn view(&self) -> TaskView {
        self.view.borrow().clone()
    }

    /// Launch a task that needs no predecessor.
    ///
    /// # Errors
    ///
    /// See [`launch`](Self::launch).
    pub async fn launch_independent(
        &self,
        payload: FormPayload,
        dependency_eligible: bool,
    ) -> Result<TaskRun> {
        self.launch(payload, LaunchMode::Independent { dependency_eligible })
            .await
    }

    /// Launch a task chained onto the last successful analysis.
    ///
    /// # Errors
    ///
    /// See [`launch`](Self::launch).
    pub async fn launch_dependent(&self, payload: FormPayload) -> Result<TaskRun> {
        self.launch(payload, LaunchMode::Dependent).await
    }

    /// Launch a task whose mode follows from its `type` field.
    ///
    /// Unknown or missing types launch as independent, non-eligible tasks.
    ///
    /// # Errors
    ///
    /// See [`launch`](Self::launch).
    pub async fn submit(&self, payload: FormPayload) -> Result<TaskRun> {
        let mode = payload.task_type().map_or(
            LaunchMode::Independent {
                dependency_eligible: false,
            },
            LaunchMode::for_task_type,
        );
        self.launch(payload, mode).await
    }

    /// Launch a task and start polling it.
    ///
    /// Both precondition checks happen before any request is issued.
    ///
    /// # Errors
    ///
    /// - `AppError::MissingDependency` for a dependent launch with an empty
    ///   register; the flight slot is not touched.
    /// - `AppError::Busy` if another task is running.
    /// - `AppError::Transport` / `AppError::Protocol` if the create request
    ///   fails; the session stays not running.
    pub async fn launch(&self, mut payload: FormPayload, mode: LaunchMode) -> Result<TaskRun> {
        if mode == LaunchMode::Dependent {
            let Some(previous) = self.last_dependency() else {
                warn!("dependent launch rejected: no successful analysis recorded");
                return Err(AppError::MissingDependency(
                    "no successful analysis yet, run an analysis task first".into(),
                ));
            };
            payload.set(self.dependency_field.as_str(), previous.as_str());
        }

        let Some(permit) = self.try_begin_task() else {
            warn!(?mode, "launch rejected: a task is already running");
            return Err(AppError::Busy("a task is already running".into()));
        };

        let task_id = self
            .launcher
            .launch(&payload)
            .instrument(info_span!("launch_task", ?mode))
            .await?;

        self.view.send_replace(TaskView::for_task(task_id.clone()));

        let released = permit.released();
        let register = Arc::clone(&self.last_dependency);
        let recorded_id = task_id.clone();
        let hook = Box::new(move |status: &TaskStatus| {
            if mode.records_dependency() && status.succeeded() {
                info!(task_id = %recorded_id, "recorded as dependency for chained tasks");
                *register.lock().unwrap_or_else(PoisonError::into_inner) = Some(recorded_id);
            }
            drop(permit);
        });

        let cancel = CancellationToken::new();
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = Some(ActivePoll {
            cancel: cancel.clone(),
            released,
        });

        let handle = TaskPoller::new(Arc::clone(&self.api), task_id, self.poll_interval, cancel)
            .with_view(Arc::clone(&self.view))
            .on_done(hook)
            .spawn();

        Ok(TaskRun { mode, handle })
    }

    /// Cancel the active task's poller and wait until it has released the
    /// flight slot. A launch made after this returns is not rejected as
    /// busy on account of the cancelled task.
    ///
    /// Returns `false` if nothing was being polled.
    pub async fn cancel_active(&self) -> bool {
        let active = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(active) = active else {
            return false;
        };
        if active.cancel.is_cancelled() {
            return false;
        }

        active.cancel.cancel();
        active.released.cancelled().await;
        info!("active task polling cancelled");
        true
    }
}
