//! Lifecycle event fan-out.
//!
//! The scheduler collects events while it holds its internal lock and publishes
//! them after releasing it, so subscribers may call back into the scheduler.

use std::collections::VecDeque;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::task::TaskSnapshot;

/// Lifecycle notification kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Task accepted and queued.
    Enqueue,
    /// Task dispatched to the executor.
    Start,
    /// Task work succeeded.
    Success,
    /// Task work failed.
    Fail,
    /// Task finished, successfully or not.
    Complete,
    /// Task cancelled, cleared or expired while pending.
    Cancel,
}

/// A lifecycle notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    /// Event identifier.
    pub event_id: Uuid,
    /// Event kind.
    pub kind: EventKind,
    /// Public view of the task.
    pub task: TaskSnapshot,
    /// Failure description, set only for [`EventKind::Fail`].
    pub error: Option<String>,
    /// Emission timestamp in milliseconds since epoch.
    pub emitted_at_ms: u64,
}

impl TaskEvent {
    /// Build an event with a fresh identifier.
    pub fn new(kind: EventKind, task: TaskSnapshot, error: Option<String>, emitted_at_ms: u64) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            kind,
            task,
            error,
            emitted_at_ms,
        }
    }
}

/// Identifier returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Arc<dyn Fn(&TaskEvent) + Send + Sync>;

struct Subscriber {
    id: SubscriptionId,
    kind: Option<EventKind>,
    callback: Callback,
}

/// Publish/subscribe registry for lifecycle events.
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    subscribers: RwLock<Vec<Subscriber>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, kind: Option<EventKind>, callback: Callback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push(Subscriber { id, kind, callback });
        id
    }

    /// Receive events of one kind.
    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: Fn(&TaskEvent) + Send + Sync + 'static,
    {
        self.register(Some(kind), Arc::new(callback))
    }

    /// Receive every event.
    pub fn subscribe_all<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&TaskEvent) + Send + Sync + 'static,
    {
        self.register(None, Arc::new(callback))
    }

    /// Remove a subscription. Returns whether it existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }

    /// Number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Deliver `event` to matching subscribers. A panicking subscriber is logged
    /// and skipped.
    pub fn emit(&self, event: &TaskEvent) {
        let targets: Vec<Callback> = self
            .subscribers
            .read()
            .iter()
            .filter(|s| s.kind.is_none_or(|k| k == event.kind))
            .map(|s| Arc::clone(&s.callback))
            .collect();

        for callback in targets {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                tracing::error!(
                    task_id = event.task.id,
                    kind = ?event.kind,
                    "event subscriber panicked"
                );
            }
        }
    }
}

/// Bounded in-memory event recorder for tests and diagnostics.
///
/// Clones share the same buffer.
#[derive(Clone)]
pub struct InMemoryEventLog {
    events: Arc<Mutex<VecDeque<TaskEvent>>>,
    max_events: usize,
}

impl InMemoryEventLog {
    /// Create a recorder keeping at most `max_events` events (oldest evicted first).
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(max_events.min(1024)))),
            max_events,
        }
    }

    /// Record an event.
    pub fn record(&self, event: &TaskEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event.clone());
    }

    /// Subscribe this recorder to every event on `bus`.
    pub fn attach(&self, bus: &EventBus) -> SubscriptionId {
        let log = self.clone();
        bus.subscribe_all(move |event| log.record(event))
    }

    /// Snapshot of recorded events, oldest first.
    pub fn events(&self) -> Vec<TaskEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Kinds recorded for one task, oldest first.
    pub fn kinds_for(&self, task_id: u64) -> Vec<EventKind> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.task.id == task_id)
            .map(|e| e.kind)
            .collect()
    }

    /// Number of recorded events of `kind`.
    pub fn count(&self, kind: EventKind) -> usize {
        self.events.lock().iter().filter(|e| e.kind == kind).count()
    }

    /// Total number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}
