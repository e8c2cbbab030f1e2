//! Error types for scheduler operations.

use thiserror::Error;

/// Errors produced by scheduler components.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// Invalid thresholds or options supplied at construction.
    #[error("invalid configuration: {0}")]
    Configuration(String),
    /// Task work returned an error or panicked.
    #[error("task execution failed: {0}")]
    TaskExecution(String),
    /// Operation attempted after the scheduler was disposed.
    #[error("scheduler has been disposed")]
    Disposed,
    /// Task was cancelled, cleared or expired before it started.
    #[error("task cancelled before execution")]
    Cancelled,
    /// Bounded wait on a task result elapsed.
    #[error("timed out waiting for task result")]
    Timeout,
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
