//! Tests for error types

use prometheus_tier_scheduler::core::{AppResult, SchedulerError};

#[test]
fn test_configuration_error() {
    let err = SchedulerError::Configuration("max_concurrency must be greater than 0".to_string());
    assert_eq!(
        format!("{}", err),
        "invalid configuration: max_concurrency must be greater than 0"
    );
}

#[test]
fn test_task_execution_error() {
    let err = SchedulerError::TaskExecution("connection reset".to_string());
    assert_eq!(format!("{}", err), "task execution failed: connection reset");
}

#[test]
fn test_disposed_error() {
    let err = SchedulerError::Disposed;
    assert_eq!(format!("{}", err), "scheduler has been disposed");
}

#[test]
fn test_cancelled_error() {
    let err = SchedulerError::Cancelled;
    assert_eq!(format!("{}", err), "task cancelled before execution");
}

#[test]
fn test_timeout_error() {
    let err = SchedulerError::Timeout;
    assert_eq!(format!("{}", err), "timed out waiting for task result");
}

#[test]
fn test_converts_into_anyhow() {
    fn submit_all() -> AppResult<()> {
        Err(SchedulerError::Disposed)?;
        Ok(())
    }
    let err = submit_all().unwrap_err();
    assert_eq!(err.downcast_ref::<SchedulerError>(), Some(&SchedulerError::Disposed));
}
