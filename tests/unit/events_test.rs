//! Tests for the event bus and event log

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use prometheus_tier_scheduler::core::{EventBus, EventKind, InMemoryEventLog, TaskEvent, TaskSnapshot, TaskStatus};

fn event(kind: EventKind, id: u64) -> TaskEvent {
    TaskEvent::new(
        kind,
        TaskSnapshot {
            id,
            base_priority: 1.0,
            submitted_at_ms: 100,
            status: TaskStatus::Pending,
        },
        None,
        200,
    )
}

#[test]
fn test_subscribe_filters_by_kind() {
    let bus = EventBus::new();
    let starts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&starts);
    bus.subscribe(EventKind::Start, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    bus.emit(&event(EventKind::Enqueue, 1));
    bus.emit(&event(EventKind::Start, 1));
    bus.emit(&event(EventKind::Complete, 1));
    assert_eq!(starts.load(Ordering::SeqCst), 1);
}

#[test]
fn test_panicking_subscriber_does_not_block_others() {
    let bus = EventBus::new();
    let seen = Arc::new(AtomicUsize::new(0));
    bus.subscribe_all(|_| panic!("subscriber bug"));
    let counter = Arc::clone(&seen);
    bus.subscribe_all(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    bus.emit(&event(EventKind::Cancel, 3));
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[test]
fn test_event_log_is_bounded() {
    let bus = EventBus::new();
    let log = InMemoryEventLog::new(2);
    log.attach(&bus);
    for id in 1..=3 {
        bus.emit(&event(EventKind::Enqueue, id));
    }
    assert_eq!(log.len(), 2);
    let ids: Vec<_> = log.events().iter().map(|e| e.task.id).collect();
    assert_eq!(ids, vec![2, 3]);
}

#[test]
fn test_event_serializes_to_json() {
    let e = event(EventKind::Fail, 9);
    let json = serde_json::to_value(&e).unwrap();
    assert_eq!(json["kind"], "fail");
    assert_eq!(json["task"]["status"], "pending");
    assert_eq!(json["emitted_at_ms"], 200);
    assert!(json["event_id"].is_string());
}
