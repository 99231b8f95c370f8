//! Plain OS thread spawner

use super::{JoinHandle, TaskSpawner};

/// Runs every task on a new OS thread
///
/// Join handles downcast to `std::thread::JoinHandle<T>` (`<()>` for
/// `spawn_blocking`).
#[derive(Clone, Debug, Default, Copy)]
pub struct ThreadSpawner;

impl ThreadSpawner {
    pub fn new() -> Self {
        Self
    }
}

impl TaskSpawner for ThreadSpawner {
    fn spawn_blocking<F>(&self, task: F) -> JoinHandle
    where
        F: FnOnce() + Send + 'static,
    {
        JoinHandle::new(std::thread::spawn(task))
    }

    fn spawn_blocking_with_result<F, T>(&self, task: F) -> JoinHandle
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        JoinHandle::new(std::thread::spawn(task))
    }

    fn runtime_name(&self) -> &'static str {
        "Thread"
    }
}
