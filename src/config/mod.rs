//! Configuration models for the scheduler, its tiers and its sweeps.

pub mod scheduler;

pub use scheduler::{SchedulerConfig, ThresholdConfig, ENV_PREFIX};
