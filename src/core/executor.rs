//! Task execution: spawning work, capturing its outcome and releasing capacity.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures::FutureExt;

use crate::core::events::EventKind;
use crate::core::scheduler::SchedulerInner;
use crate::core::task::{Job, QueuedTask, TaskId, TaskSnapshot, TaskStatus};
use crate::core::SchedulerError;

/// Boxed unit future handed to a [`Spawn`] implementation.
pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Abstraction for spawning task execution and periodic sweeps on a runtime.
pub trait Spawn: Send + Sync + 'static {
    /// Run `fut` to completion in the background.
    fn spawn(&self, fut: BoxFuture);
}

/// Run a job, turning errors and panics into a failure description.
pub(crate) async fn run_job<T: Send + 'static>(job: Box<dyn Job<T>>) -> Result<T, String> {
    match AssertUnwindSafe(job.run()).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(format!("{err:#}")),
        Err(panic) => Err(format!("task panicked: {}", panic_message(panic.as_ref()))),
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

impl<T: Send + 'static> SchedulerInner<T> {
    /// Hand a task already marked Running to the runtime.
    pub(crate) fn launch(self: &Arc<Self>, tier: usize, task: QueuedTask<T>) {
        tracing::debug!(task_id = task.id, tier, "dispatching task");
        self.events
            .emit(&self.event(EventKind::Start, task.snapshot(), None));

        let inner = Arc::clone(self);
        self.spawner
            .spawn(Box::pin(async move { inner.execute(tier, task).await }));
    }

    async fn execute(self: Arc<Self>, tier: usize, task: QueuedTask<T>) {
        let QueuedTask {
            id,
            base_priority,
            submitted_at_ms,
            status,
            job,
            result_tx,
        } = task;

        let outcome = run_job(job).await;

        let next = if outcome.is_ok() {
            TaskStatus::Succeeded
        } else {
            TaskStatus::Failed
        };
        status.transition(next);
        self.release(tier, id);

        let snapshot = TaskSnapshot {
            id,
            base_priority,
            submitted_at_ms,
            status: status.get(),
        };
        match &outcome {
            Ok(_) => {
                tracing::info!(task_id = id, tier, "task succeeded");
                self.events
                    .emit(&self.event(EventKind::Success, snapshot.clone(), None));
            }
            Err(reason) => {
                tracing::warn!(task_id = id, tier, error = %reason, "task failed");
                self.events.emit(&self.event(
                    EventKind::Fail,
                    snapshot.clone(),
                    Some(reason.clone()),
                ));
            }
        }
        self.events
            .emit(&self.event(EventKind::Complete, snapshot, None));

        // Reuse the freed slot before the caller observes the result.
        self.dispatch();

        if result_tx
            .send(outcome.map_err(SchedulerError::TaskExecution))
            .is_err()
        {
            tracing::debug!(task_id = id, "task handle dropped before completion");
        }
    }

    /// Return a finished task's concurrency slot.
    fn release(&self, tier: usize, id: TaskId) {
        let mut state = self.state.lock();
        state.global_running = state.global_running.saturating_sub(1);
        if let Some(t) = state.tiers.get_mut(tier) {
            t.running = t.running.saturating_sub(1);
        }
        state.running_tasks.remove(&id);
    }
}
