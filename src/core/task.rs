//! Task identity, lifecycle status, work abstraction and caller handles.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::core::heap::Schedulable;
use crate::core::SchedulerError;

/// Unique, monotonically increasing task identifier.
pub type TaskId = u64;

/// Process-wide task id source.
static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_task_id() -> TaskId {
    NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed)
}

/// Status of a task in the scheduler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task is queued waiting for capacity.
    Pending,
    /// Task work is in flight.
    Running,
    /// Task work resolved successfully.
    Succeeded,
    /// Task work returned an error or panicked.
    Failed,
    /// Task was cancelled, cleared or expired before it started.
    Cancelled,
}

impl TaskStatus {
    /// Whether the status can never change again.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Whether `self -> next` is a legal lifecycle transition.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running | Self::Cancelled)
                | (Self::Running, Self::Succeeded | Self::Failed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Status shared between the scheduler (sole writer) and task handles.
#[derive(Debug, Clone)]
pub(crate) struct StatusCell(Arc<Mutex<TaskStatus>>);

impl StatusCell {
    pub(crate) fn new() -> Self {
        Self(Arc::new(Mutex::new(TaskStatus::Pending)))
    }

    pub(crate) fn get(&self) -> TaskStatus {
        *self.0.lock()
    }

    /// Apply a transition if the lifecycle allows it. Returns whether it was applied.
    pub(crate) fn transition(&self, next: TaskStatus) -> bool {
        let mut status = self.0.lock();
        if status.can_transition_to(next) {
            *status = next;
            true
        } else {
            let current = *status;
            tracing::error!(from = %current, to = %next, "rejected illegal task status transition");
            false
        }
    }
}

/// Public view of a task carried by lifecycle events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    /// Task identifier.
    pub id: TaskId,
    /// Priority supplied at submission (lower = more urgent).
    pub base_priority: f64,
    /// Submission timestamp in milliseconds since epoch.
    pub submitted_at_ms: u64,
    /// Status at the time the snapshot was taken.
    pub status: TaskStatus,
}

/// Unit of asynchronous work executed by the scheduler.
///
/// Any `FnOnce() -> impl Future<Output = anyhow::Result<T>>` closure is a job, so
/// most callers never implement this trait by hand.
///
/// # Example
///
/// ```rust,ignore
/// let handle = scheduler.submit(|| async { Ok(fetch_embedding().await?) }, Some(3.0))?;
/// ```
#[async_trait]
pub trait Job<T: Send + 'static>: Send + 'static {
    /// Run the work to completion.
    async fn run(self: Box<Self>) -> anyhow::Result<T>;
}

#[async_trait]
impl<T, F, Fut> Job<T> for F
where
    T: Send + 'static,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    async fn run(self: Box<Self>) -> anyhow::Result<T> {
        (*self)().await
    }
}

/// A task owned by the scheduler, queued in a tier heap or in flight.
pub(crate) struct QueuedTask<T: Send + 'static> {
    pub(crate) id: TaskId,
    pub(crate) base_priority: f64,
    pub(crate) submitted_at_ms: u64,
    pub(crate) status: StatusCell,
    pub(crate) job: Box<dyn Job<T>>,
    pub(crate) result_tx: oneshot::Sender<Result<T, SchedulerError>>,
}

impl<T: Send + 'static> QueuedTask<T> {
    pub(crate) fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            id: self.id,
            base_priority: self.base_priority,
            submitted_at_ms: self.submitted_at_ms,
            status: self.status.get(),
        }
    }
}

impl<T: Send + 'static> Schedulable for QueuedTask<T> {
    fn id(&self) -> TaskId {
        self.id
    }

    fn submitted_at_ms(&self) -> u64 {
        self.submitted_at_ms
    }
}

/// Cancellation entry point a handle uses to reach its scheduler.
pub(crate) trait CancelTask: Send + Sync {
    fn cancel_task(&self, id: TaskId) -> bool;
}

/// Caller-facing reference to a submitted task.
pub struct TaskHandle<T> {
    id: TaskId,
    status: StatusCell,
    canceller: Weak<dyn CancelTask>,
    result_rx: oneshot::Receiver<Result<T, SchedulerError>>,
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("status", &self.status.get())
            .finish_non_exhaustive()
    }
}

impl<T> TaskHandle<T> {
    pub(crate) fn new(
        id: TaskId,
        status: StatusCell,
        canceller: Weak<dyn CancelTask>,
        result_rx: oneshot::Receiver<Result<T, SchedulerError>>,
    ) -> Self {
        Self {
            id,
            status,
            canceller,
            result_rx,
        }
    }

    /// Task identifier.
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Current lifecycle status.
    pub fn status(&self) -> TaskStatus {
        self.status.get()
    }

    /// Cancel the task if it is still pending. Returns whether it was cancelled.
    pub fn cancel(&self) -> bool {
        self.canceller
            .upgrade()
            .is_some_and(|scheduler| scheduler.cancel_task(self.id))
    }

    /// Wait for the task to finish.
    ///
    /// Resolves to the work's output, [`SchedulerError::TaskExecution`] when the
    /// work failed, or [`SchedulerError::Cancelled`] when it never started.
    pub async fn result(self) -> Result<T, SchedulerError> {
        self.result_rx
            .await
            .unwrap_or(Err(SchedulerError::Disposed))
    }

    /// Wait for the task to finish, giving up after `timeout`.
    ///
    /// Timing out does not cancel the task.
    pub async fn result_timeout(self, timeout: Duration) -> Result<T, SchedulerError> {
        tokio::time::timeout(timeout, self.result())
            .await
            .map_err(|_| SchedulerError::Timeout)?
    }
}
