//! Tests for utility functions

use prometheus_tier_scheduler::util::{now_ms, Clock, ManualClock, SystemClock};

#[test]
fn test_now_ms_is_monotonic_enough() {
    let first = now_ms();
    let second = SystemClock.now_ms();
    assert!(second >= first);
}

#[test]
fn test_manual_clock_advance_and_set() {
    let clock = ManualClock::new(500);
    assert_eq!(clock.now_ms(), 500);
    clock.advance(250);
    assert_eq!(clock.now_ms(), 750);
    clock.set(42);
    assert_eq!(clock.now_ms(), 42);
}

#[test]
fn test_manual_clock_as_trait_object() {
    let clock = ManualClock::new(0);
    let shared: Box<dyn Clock> = Box::new(clock.clone());
    clock.advance(1_000);
    assert_eq!(shared.now_ms(), 1_000);
}
