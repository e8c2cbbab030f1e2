//! Tokio runtime spawner implementation.

use tokio::runtime::Handle;

use crate::core::{BoxFuture, SchedulerError, Spawn};

/// Tokio-based spawner that executes tasks and sweeps on a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioSpawner {
    handle: Handle,
}

impl TokioSpawner {
    /// Create a spawner from a tokio runtime handle.
    pub const fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Spawner bound to the runtime the caller is running on.
    ///
    /// Fails with a configuration error outside a tokio runtime, since periodic
    /// sweeps and task execution need one.
    pub fn current() -> Result<Self, SchedulerError> {
        Handle::try_current().map(Self::new).map_err(|e| {
            SchedulerError::Configuration(format!("no tokio runtime available: {e}"))
        })
    }
}

impl Spawn for TokioSpawner {
    fn spawn(&self, fut: BoxFuture) {
        self.handle.spawn(fut);
    }
}
