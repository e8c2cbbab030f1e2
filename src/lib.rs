//! # Prometheus Tier Scheduler
//!
//! An in-process, concurrency-bounded scheduler for bursts of async work.
//!
//! Work is submitted with a numeric base priority (lower is more urgent) and
//! placed into one of several priority tiers. A global ceiling bounds how many
//! tasks run at once, and a pluggable policy decides how much of that ceiling
//! each tier may use on every dispatch decision. While work waits, its
//! effective priority decays so low-priority work migrates toward more urgent
//! tiers and is never starved indefinitely.
//!
//! ## Key Features
//!
//! - **Tiered admission**: ascending thresholds partition priority space; each
//!   tier owns a min-heap ordered by (effective priority, submission time)
//! - **Aging**: a periodic sweep recomputes effective priorities and promotes
//!   tasks across tiers
//! - **Two-phase weighted allocation**: the default quota policy weights tiers by
//!   urgency and reserves 60% of the ceiling for tier 0 under unmet demand
//! - **Expiry**: pending tasks that wait past their TTL are cancelled
//! - **Lifecycle events**: enqueue, start, success, fail, complete and cancel
//!   notifications through a subscribe/unsubscribe bus
//! - **Pause, resume, clear, dispose**: running work is never preempted
//!
//! ## Example
//!
//! ```rust,ignore
//! use prometheus_tier_scheduler::{EventKind, Scheduler};
//!
//! let scheduler: Scheduler<String> = Scheduler::builder()
//!     .max_concurrency(4)
//!     .thresholds([(0.0, "interactive"), (10.0, "batch")])
//!     .task_ttl_ms(60_000)
//!     .build()?;
//!
//! scheduler.subscribe(EventKind::Fail, |event| {
//!     tracing::warn!(task = event.task.id, error = ?event.error, "inference failed");
//! });
//!
//! let urgent = scheduler.submit(|| async { Ok(run_inference("hello").await?) }, Some(0.0))?;
//! let batch = scheduler.submit(|| async { Ok(reindex_corpus().await?) }, Some(20.0))?;
//!
//! println!("{}", urgent.result().await?);
//! batch.cancel();
//! ```
//!
//! For complete examples, see `tests/scheduler_test.rs`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions, tiers and execution.
pub mod core;
/// Configuration models for the scheduler and its sweeps.
pub mod config;
/// Builders to construct schedulers from configuration.
pub mod builders;
/// Runtime adapters.
pub mod runtime;
/// Shared utilities.
pub mod util;

pub use crate::builders::SchedulerBuilder;
pub use crate::config::{SchedulerConfig, ThresholdConfig};
pub use crate::core::{
    ConcurrencyPolicy, DecayCurve, EventKind, InMemoryEventLog, Job, Scheduler, SchedulerError,
    SchedulerStateSnapshot, TaskEvent, TaskHandle, TaskId, TaskStatus, TierSnapshot,
    WeightedAllocation,
};
