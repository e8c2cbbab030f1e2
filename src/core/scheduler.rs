//! Tiered priority scheduler: admission, dispatch, cancellation and lifecycle.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};

use crate::builders::SchedulerBuilder;
use crate::config::SchedulerConfig;
use crate::core::decay::DecayModel;
use crate::core::events::{EventBus, EventKind, SubscriptionId, TaskEvent};
use crate::core::executor::Spawn;
use crate::core::policy::{ConcurrencyPolicy, SchedulerStateSnapshot, TierSnapshot};
use crate::core::task::{
    next_task_id, CancelTask, Job, QueuedTask, StatusCell, TaskHandle, TaskId, TaskSnapshot,
    TaskStatus,
};
use crate::core::tier::{ThresholdTable, Tier};
use crate::core::SchedulerError;
use crate::util::clock::Clock;

/// Mutable scheduler state. Only touched while holding `SchedulerInner::state`.
pub(crate) struct SchedulerState<T: Send + 'static> {
    pub(crate) tiers: Vec<Tier<QueuedTask<T>>>,
    pub(crate) global_running: usize,
    pub(crate) running_tasks: HashMap<TaskId, StatusCell>,
    pub(crate) paused: bool,
    pub(crate) disposed: bool,
}

impl<T: Send + 'static> SchedulerState<T> {
    fn snapshot(&self, global_max: usize) -> SchedulerStateSnapshot {
        let tiers: Vec<TierSnapshot> = self
            .tiers
            .iter()
            .map(|tier| TierSnapshot {
                label: tier.threshold.label.clone(),
                quota: tier.last_quota,
                running: tier.running,
                pending: tier.heap.len(),
            })
            .collect();
        SchedulerStateSnapshot {
            global_max,
            global_running: self.global_running,
            global_pending: tiers.iter().map(|t| t.pending).sum(),
            tiers,
        }
    }

    fn drain_pending(&mut self) -> Vec<QueuedTask<T>> {
        self.tiers
            .iter_mut()
            .flat_map(|tier| tier.heap.drain())
            .collect()
    }
}

/// Immutable settings resolved by the builder.
pub(crate) struct SchedulerSettings {
    pub(crate) max_concurrency: usize,
    pub(crate) table: ThresholdTable,
    pub(crate) decay: DecayModel,
    pub(crate) default_priority: f64,
    pub(crate) task_ttl_ms: u64,
    pub(crate) priority_check_interval: Duration,
    pub(crate) cleanup_interval: Duration,
    pub(crate) policy: Arc<dyn ConcurrencyPolicy>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) spawner: Arc<dyn Spawn>,
}

/// Shared core referenced by the scheduler, running tasks, sweeps and handles.
pub(crate) struct SchedulerInner<T: Send + 'static> {
    pub(crate) max_concurrency: usize,
    pub(crate) table: ThresholdTable,
    pub(crate) decay: DecayModel,
    pub(crate) default_priority: f64,
    pub(crate) task_ttl_ms: u64,
    pub(crate) priority_check_interval: Duration,
    pub(crate) cleanup_interval: Duration,
    pub(crate) policy: Arc<dyn ConcurrencyPolicy>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) spawner: Arc<dyn Spawn>,
    pub(crate) events: EventBus,
    pub(crate) state: Mutex<SchedulerState<T>>,
    pub(crate) shutdown_tx: watch::Sender<bool>,
}

impl<T: Send + 'static> SchedulerInner<T> {
    fn new(settings: SchedulerSettings) -> Self {
        let tiers = settings
            .table
            .thresholds()
            .iter()
            .cloned()
            .map(Tier::new)
            .collect();
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            max_concurrency: settings.max_concurrency,
            table: settings.table,
            decay: settings.decay,
            default_priority: settings.default_priority,
            task_ttl_ms: settings.task_ttl_ms,
            priority_check_interval: settings.priority_check_interval,
            cleanup_interval: settings.cleanup_interval,
            policy: settings.policy,
            clock: settings.clock,
            spawner: settings.spawner,
            events: EventBus::new(),
            state: Mutex::new(SchedulerState {
                tiers,
                global_running: 0,
                running_tasks: HashMap::new(),
                paused: false,
                disposed: false,
            }),
            shutdown_tx,
        }
    }

    pub(crate) fn event(
        &self,
        kind: EventKind,
        task: TaskSnapshot,
        error: Option<String>,
    ) -> TaskEvent {
        TaskEvent::new(kind, task, error, self.clock.now_ms())
    }

    /// Admission loop: start tasks while any tier has spare quota and pending work.
    pub(crate) fn dispatch(self: &Arc<Self>) {
        loop {
            let next = {
                let mut state = self.state.lock();
                self.next_admissible(&mut state)
            };
            match next {
                Some((tier, task)) => self.launch(tier, task),
                None => return,
            }
        }
    }

    /// Pop the next task allowed to run, marking it Running and charging its tier.
    fn next_admissible(&self, state: &mut SchedulerState<T>) -> Option<(usize, QueuedTask<T>)> {
        if state.paused || state.disposed || state.global_running >= self.max_concurrency {
            return None;
        }

        // Quotas are recomputed on every attempt; a dispatch shifts the inputs.
        let snapshot = state.snapshot(self.max_concurrency);
        for index in 0..state.tiers.len() {
            let quota = self.policy.quota(index, &snapshot);
            let tier = &mut state.tiers[index];
            tier.last_quota = quota;
            if tier.running >= quota {
                continue;
            }
            let Some(task) = tier.heap.pop() else {
                continue;
            };
            tier.running += 1;
            state.global_running += 1;
            task.status.transition(TaskStatus::Running);
            state.running_tasks.insert(task.id, task.status.clone());
            return Some((index, task));
        }
        None
    }

    /// Mark removed pending tasks Cancelled, notify subscribers and reject their handles.
    pub(crate) fn finish_cancelled(&self, mut tasks: Vec<QueuedTask<T>>) {
        tasks.sort_by_key(|t| (t.submitted_at_ms, t.id));
        for task in tasks {
            if !task.status.transition(TaskStatus::Cancelled) {
                continue;
            }
            self.events
                .emit(&self.event(EventKind::Cancel, task.snapshot(), None));
            // A dropped handle simply never observes the cancellation.
            let _ = task.result_tx.send(Err(SchedulerError::Cancelled));
        }
    }

    pub(crate) fn cancel(&self, id: TaskId) -> bool {
        let removed = {
            let mut state = self.state.lock();
            state
                .tiers
                .iter_mut()
                .find_map(|tier| tier.heap.remove(id))
        };
        match removed {
            Some(task) => {
                tracing::info!(task_id = id, "pending task cancelled");
                self.finish_cancelled(vec![task]);
                true
            }
            None => {
                tracing::debug!(task_id = id, "cancel ignored: task is not pending");
                false
            }
        }
    }

    pub(crate) fn dispose(&self) {
        let drained = {
            let mut state = self.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.drain_pending()
        };
        self.shutdown_tx.send_replace(true);
        tracing::info!(cancelled = drained.len(), "scheduler disposed");
        self.finish_cancelled(drained);
    }

    fn state_snapshot(&self) -> SchedulerStateSnapshot {
        let base = self.state.lock().snapshot(self.max_concurrency);
        let quotas: Vec<usize> = (0..base.tiers.len())
            .map(|index| self.policy.quota(index, &base))
            .collect();
        let mut snapshot = base;
        for (tier, quota) in snapshot.tiers.iter_mut().zip(quotas) {
            tier.quota = quota;
        }
        snapshot
    }
}

impl<T: Send + 'static> CancelTask for SchedulerInner<T> {
    fn cancel_task(&self, id: TaskId) -> bool {
        self.cancel(id)
    }
}

/// Concurrency-bounded scheduler with age-adjusted priority tiers.
///
/// Work is submitted with a base priority (lower is more urgent), placed in the
/// first tier whose threshold admits it, and dispatched under a global ceiling
/// and per-tier quotas. Waiting work decays toward more urgent tiers so it is
/// never starved indefinitely.
///
/// Dropping the scheduler disposes it. Running tasks finish in the background.
///
/// # Example
///
/// ```rust,ignore
/// use prometheus_tier_scheduler::{Scheduler, SchedulerConfig};
///
/// let scheduler: Scheduler<String> = Scheduler::new(SchedulerConfig::default())?;
/// let handle = scheduler.submit(|| async { Ok("done".to_string()) }, Some(0.0))?;
/// assert_eq!(handle.result().await?, "done");
/// ```
pub struct Scheduler<T: Send + 'static> {
    inner: Arc<SchedulerInner<T>>,
}

impl<T: Send + 'static> fmt::Debug for Scheduler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("state", &self.get_state())
            .field("paused", &self.is_paused())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl<T: Send + 'static> Scheduler<T> {
    /// Build a scheduler from configuration with default strategies, the system
    /// clock and the current tokio runtime.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        SchedulerBuilder::new().config(config).build()
    }

    /// Start a builder for custom strategies, clocks or spawners.
    pub fn builder() -> SchedulerBuilder<T> {
        SchedulerBuilder::new()
    }

    pub(crate) fn from_settings(settings: SchedulerSettings) -> Self {
        let inner = Arc::new(SchedulerInner::new(settings));
        inner.start_sweeps();
        tracing::info!(
            max_concurrency = inner.max_concurrency,
            tiers = inner.table.len(),
            "scheduler started"
        );
        Self { inner }
    }

    /// Submit work with an optional base priority (lower = more urgent).
    ///
    /// Without a priority the configured default is used. Fails with
    /// [`SchedulerError::Disposed`] after [`Scheduler::dispose`].
    pub fn submit<J>(&self, job: J, priority: Option<f64>) -> Result<TaskHandle<T>, SchedulerError>
    where
        J: Job<T>,
    {
        let base_priority = priority.unwrap_or(self.inner.default_priority);
        if !base_priority.is_finite() {
            return Err(SchedulerError::Configuration(format!(
                "task priority must be finite, got {base_priority}"
            )));
        }

        let now = self.inner.clock.now_ms();
        let (result_tx, result_rx) = oneshot::channel();
        let status = StatusCell::new();
        let task = QueuedTask {
            id: next_task_id(),
            base_priority,
            submitted_at_ms: now,
            status: status.clone(),
            job: Box::new(job),
            result_tx,
        };
        let id = task.id;

        if self.inner.state.lock().disposed {
            tracing::warn!("submit rejected: scheduler disposed");
            return Err(SchedulerError::Disposed);
        }

        // Enqueue is published before the task becomes visible to dispatch,
        // cancel or the sweeps, so it is always the task's first event.
        self.inner
            .events
            .emit(&self.inner.event(EventKind::Enqueue, task.snapshot(), None));

        let tier = self.inner.table.tier_for(base_priority);
        let effective = self
            .inner
            .decay
            .effective_priority(base_priority, now, now);
        let rejected = {
            let mut state = self.inner.state.lock();
            if state.disposed {
                Some(task)
            } else {
                state.tiers[tier].heap.push(task, effective);
                None
            }
        };
        if let Some(task) = rejected {
            // Disposed while Enqueue was being published.
            tracing::warn!(task_id = id, "submit raced with dispose; task cancelled");
            self.inner.finish_cancelled(vec![task]);
            return Err(SchedulerError::Disposed);
        }
        tracing::debug!(task_id = id, tier, base_priority, "task enqueued");

        let canceller: Weak<dyn CancelTask> = Arc::downgrade(&self.inner) as Weak<dyn CancelTask>;
        let handle = TaskHandle::new(id, status, canceller, result_rx);
        self.inner.dispatch();
        Ok(handle)
    }

    /// Stop dispatching new work. Running tasks continue.
    pub fn pause(&self) -> Result<(), SchedulerError> {
        let mut state = self.inner.state.lock();
        if state.disposed {
            return Err(SchedulerError::Disposed);
        }
        state.paused = true;
        tracing::info!("scheduler paused");
        Ok(())
    }

    /// Resume dispatching and immediately admit waiting work.
    pub fn resume(&self) -> Result<(), SchedulerError> {
        {
            let mut state = self.inner.state.lock();
            if state.disposed {
                return Err(SchedulerError::Disposed);
            }
            state.paused = false;
        }
        tracing::info!("scheduler resumed");
        self.inner.dispatch();
        Ok(())
    }

    /// Cancel a pending task. Returns false for running, finished or unknown ids.
    pub fn cancel(&self, id: TaskId) -> bool {
        self.inner.cancel(id)
    }

    /// Cancel every pending task. Running tasks are untouched.
    ///
    /// Returns the number of tasks cancelled.
    pub fn clear(&self) -> Result<usize, SchedulerError> {
        let drained = {
            let mut state = self.inner.state.lock();
            if state.disposed {
                return Err(SchedulerError::Disposed);
            }
            state.drain_pending()
        };
        let cleared = drained.len();
        tracing::info!(cleared, "pending tasks cleared");
        self.inner.finish_cancelled(drained);
        Ok(cleared)
    }

    /// Snapshot of global and per-tier counters with freshly computed quotas.
    pub fn get_state(&self) -> SchedulerStateSnapshot {
        self.inner.state_snapshot()
    }

    /// Cancel all pending work, stop periodic sweeps and reject further
    /// submissions. Safe to call repeatedly.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Whether dispatch is paused.
    pub fn is_paused(&self) -> bool {
        self.inner.state.lock().paused
    }

    /// Whether the scheduler has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.state.lock().disposed
    }

    /// Status of a pending or running task; `None` once it finished or if unknown.
    pub fn task_status(&self, id: TaskId) -> Option<TaskStatus> {
        let state = self.inner.state.lock();
        if let Some(status) = state.running_tasks.get(&id) {
            return Some(status.get());
        }
        state
            .tiers
            .iter()
            .any(|tier| tier.heap.contains(id))
            .then_some(TaskStatus::Pending)
    }

    /// Tier currently holding a pending task.
    pub fn tier_of(&self, id: TaskId) -> Option<usize> {
        self.inner
            .state
            .lock()
            .tiers
            .iter()
            .position(|tier| tier.heap.contains(id))
    }

    /// Ids of the tasks waiting in `tier`, in arbitrary order.
    pub fn pending_ids(&self, tier: usize) -> Vec<TaskId> {
        self.inner
            .state
            .lock()
            .tiers
            .get(tier)
            .map(|t| t.heap.ids())
            .unwrap_or_default()
    }

    /// Threshold table in effect.
    pub fn thresholds(&self) -> &ThresholdTable {
        &self.inner.table
    }

    /// Run one aging pass now. Returns the number of tasks that changed tier.
    pub fn run_aging_sweep(&self) -> usize {
        self.inner.run_aging_sweep()
    }

    /// Run one expiry pass now. Returns the number of tasks expired.
    pub fn run_expiry_sweep(&self) -> usize {
        self.inner.run_expiry_sweep()
    }

    /// Lifecycle event registry.
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Receive lifecycle events of one kind.
    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: Fn(&TaskEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(kind, callback)
    }

    /// Receive every lifecycle event.
    pub fn subscribe_all<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&TaskEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe_all(callback)
    }

    /// Remove a subscription. Returns whether it existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.events.unsubscribe(id)
    }
}

impl<T: Send + 'static> Drop for Scheduler<T> {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}
