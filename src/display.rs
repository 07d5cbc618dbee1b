//! Display state for the active task.
//!
//! A [`TaskView`] mirrors what the operator sees: the newest flash notice
//! and the full task log. Every poll overwrites both fields; nothing is
//! appended. Views are published through a `tokio::sync::watch` channel
//! owned by the session.

use chrono::{DateTime, Utc};

use crate::models::status::TaskStatus;
use crate::models::task::TaskId;

/// Snapshot of the display area.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskView {
    /// Task the view currently reflects.
    pub task_id: Option<TaskId>,
    /// Newest flash notice; older notices are discarded.
    pub flash: String,
    /// Entire task log joined with newlines.
    pub log: String,
    /// Number of newline-separated lines in `log`. A multi-line entry
    /// counts once per line.
    pub line_count: usize,
    /// Poll responses applied to this view since the task started.
    pub polls: u64,
    /// Whether the view sits at the end of the log.
    pub at_bottom: bool,
    /// Whether the task has finished.
    pub done: bool,
    /// Time of the last applied poll.
    pub updated_at: Option<DateTime<Utc>>,
}

impl TaskView {
    /// Empty view bound to a freshly launched task.
    #[must_use]
    pub fn for_task(task_id: TaskId) -> Self {
        Self {
            task_id: Some(task_id),
            ..Self::default()
        }
    }

    /// Overwrite the view with a poll result and scroll to the end.
    pub fn apply(&mut self, status: &TaskStatus) {
        self.flash = status.latest_flash().unwrap_or_default().to_owned();
        self.log = status.log_text();
        self.line_count = if self.log.is_empty() {
            0
        } else {
            self.log.split('\n').count()
        };
        self.polls += 1;
        self.at_bottom = true;
        self.done = status.done;
        self.updated_at = Some(Utc::now());
    }

    /// Log lines added after the first `seen` lines.
    ///
    /// Used by terminal renderers that print incrementally and then store
    /// `line_count` as their new position. If the log shrank (a new task
    /// started), every line is returned.
    #[must_use]
    pub fn new_lines_since(&self, seen: usize) -> Vec<&str> {
        if self.log.is_empty() {
            return Vec::new();
        }
        let skip = if seen > self.line_count { 0 } else { seen };
        self.log.split('\n').skip(skip).collect()
    }
}
