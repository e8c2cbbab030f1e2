//! Builders to construct schedulers from configuration and injected strategies.

pub mod scheduler_builder;

pub use scheduler_builder::SchedulerBuilder;
