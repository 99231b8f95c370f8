//! Tokio runtime implementation
//!
//! Runs tasks on Tokio's blocking thread pool.

use super::{JoinHandle, TaskSpawner};
use tokio::runtime::Handle;

/// Tokio-based spawner
///
/// Uses the runtime it was created with, or the ambient runtime at spawn
/// time. Outside any runtime, tasks run inline.
#[derive(Clone, Debug, Default)]
pub struct TokioSpawner {
    handle: Option<Handle>,
}

impl TokioSpawner {
    /// Spawner bound to whatever runtime is current when tasks are spawned
    pub fn new() -> Self {
        Self { handle: None }
    }

    /// Spawner bound to a specific runtime
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    fn runtime(&self) -> Option<Handle> {
        self.handle.clone().or_else(|| Handle::try_current().ok())
    }
}

impl TaskSpawner for TokioSpawner {
    fn spawn_blocking<F>(&self, task: F) -> JoinHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.spawn_blocking_with_result(task)
    }

    fn spawn_blocking_with_result<F, T>(&self, task: F) -> JoinHandle
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        match self.runtime() {
            Some(handle) => JoinHandle::new(handle.spawn_blocking(task)),
            None => {
                log::warn!("No Tokio runtime available, running task inline");
                JoinHandle::new(Some(task()))
            }
        }
    }

    fn runtime_name(&self) -> &'static str {
        "Tokio"
    }
}
