//! Tests for builders

use std::sync::Arc;

use prometheus_tier_scheduler::builders::SchedulerBuilder;
use prometheus_tier_scheduler::config::SchedulerConfig;
use prometheus_tier_scheduler::core::{BoxFuture, Spawn};
use prometheus_tier_scheduler::runtime::TokioSpawner;
use prometheus_tier_scheduler::util::ManualClock;
use prometheus_tier_scheduler::{Scheduler, SchedulerError};
use std::sync::atomic::{AtomicUsize, Ordering};

#[tokio::test]
async fn test_builder_from_config() {
    let config = SchedulerConfig {
        max_concurrency: 3,
        thresholds: vec![(0.0, "a").into(), (5.0, "b").into(), (9.0, "c").into()],
        ..SchedulerConfig::default()
    };
    let scheduler: Scheduler<()> = SchedulerBuilder::new().config(config).build().unwrap();
    assert_eq!(scheduler.thresholds().len(), 3);
    let state = scheduler.get_state();
    assert_eq!(state.global_max, 3);
    let labels: Vec<_> = state.tiers.iter().map(|t| t.label.clone()).collect();
    assert_eq!(
        labels,
        vec![Some("a".to_string()), Some("b".to_string()), Some("c".to_string())]
    );
}

#[tokio::test]
async fn test_scheduler_new_uses_defaults() {
    let scheduler: Scheduler<()> = Scheduler::new(SchedulerConfig::default()).unwrap();
    assert_eq!(scheduler.thresholds().len(), 2);
    assert!(!scheduler.is_paused());
    assert!(!scheduler.is_disposed());
}

#[tokio::test]
async fn test_builder_rejects_invalid_values() {
    let result: Result<Scheduler<()>, _> = SchedulerBuilder::new().decay_interval_ms(0).build();
    assert!(matches!(result, Err(SchedulerError::Configuration(_))));

    let result: Result<Scheduler<()>, _> = SchedulerBuilder::new().thresholds(Vec::<f64>::new()).build();
    assert!(matches!(result, Err(SchedulerError::Configuration(_))));
}

/// Spawner that counts spawned futures before delegating to tokio.
struct CountingSpawner {
    inner: TokioSpawner,
    spawned: Arc<AtomicUsize>,
}

impl Spawn for CountingSpawner {
    fn spawn(&self, fut: BoxFuture) {
        self.spawned.fetch_add(1, Ordering::SeqCst);
        self.inner.spawn(fut);
    }
}

#[tokio::test]
async fn test_builder_uses_custom_spawner() {
    let spawned = Arc::new(AtomicUsize::new(0));
    let scheduler: Scheduler<u8> = SchedulerBuilder::new()
        .spawner(CountingSpawner {
            inner: TokioSpawner::current().unwrap(),
            spawned: Arc::clone(&spawned),
        })
        .build()
        .unwrap();
    // Aging and expiry loops.
    assert_eq!(spawned.load(Ordering::SeqCst), 2);

    let handle = scheduler.submit(|| async { Ok(1) }, Some(0.0)).unwrap();
    assert_eq!(handle.result().await, Ok(1));
    assert_eq!(spawned.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_builder_custom_decay_curve() {
    let clock = ManualClock::new(0);
    let scheduler: Scheduler<()> = SchedulerBuilder::new()
        .thresholds([0.0, 10.0])
        .decay_interval_ms(100)
        .priority_check_interval_ms(3_600_000)
        .decay_curve(|units: u64| if units >= 2 { 100.0 } else { 0.0 })
        .clock(clock.clone())
        .build()
        .unwrap();
    scheduler.pause().unwrap();

    let handle = scheduler.submit(|| async { Ok(()) }, Some(9.0)).unwrap();
    clock.advance(100);
    assert_eq!(scheduler.run_aging_sweep(), 0);
    clock.advance(100);
    assert_eq!(scheduler.run_aging_sweep(), 1);
    assert_eq!(scheduler.tier_of(handle.id()), Some(0));
}
