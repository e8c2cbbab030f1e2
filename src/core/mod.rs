//! Core scheduling abstractions: tiers, heaps, aging, allocation and execution.

pub mod decay;
pub mod error;
pub mod events;
pub mod executor;
pub mod heap;
pub mod policy;
pub mod scheduler;
mod sweep;
pub mod task;
pub mod tier;

pub use decay::{DecayCurve, DecayModel, LinearDecay};
pub use error::{AppResult, SchedulerError};
pub use events::{EventBus, EventKind, InMemoryEventLog, SubscriptionId, TaskEvent};
pub use executor::{BoxFuture, Spawn};
pub use heap::{PriorityHeap, Schedulable};
pub use policy::{ConcurrencyPolicy, SchedulerStateSnapshot, TierSnapshot, WeightedAllocation};
pub use scheduler::Scheduler;
pub use task::{Job, TaskHandle, TaskId, TaskSnapshot, TaskStatus};
pub use tier::{Threshold, ThresholdTable};
