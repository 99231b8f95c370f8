//! Deterministic spawner for tests
//!
//! Either runs each task inline before `spawn_blocking` returns, or discards
//! it, and counts what it was handed either way.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{JoinHandle, TaskSpawner};

/// What a [`MockSpawner`] does with a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockSpawnBehavior {
    /// Discard the task unrun
    Drop,
    /// Run the task on the calling thread
    BlockSync,
}

/// Spawner whose scheduling is fully predictable
///
/// Clones share the task counter.
#[derive(Clone, Debug)]
pub struct MockSpawner {
    behavior: MockSpawnBehavior,
    spawned: Arc<AtomicUsize>,
}

impl Default for MockSpawner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSpawner {
    /// A spawner that discards every task
    pub fn new() -> Self {
        Self::with_behavior(MockSpawnBehavior::Drop)
    }

    pub fn with_behavior(behavior: MockSpawnBehavior) -> Self {
        Self {
            behavior,
            spawned: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A spawner that runs every task inline
    pub fn blocking() -> Self {
        Self::with_behavior(MockSpawnBehavior::BlockSync)
    }

    pub fn behavior(&self) -> MockSpawnBehavior {
        self.behavior
    }

    /// Tasks handed to this spawner, run or not
    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }

    /// Run or discard `task`, returning its output if it ran
    fn dispatch<T>(&self, task: impl FnOnce() -> T) -> Option<T> {
        self.spawned.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            MockSpawnBehavior::Drop => None,
            MockSpawnBehavior::BlockSync => Some(task()),
        }
    }
}

impl TaskSpawner for MockSpawner {
    fn spawn_blocking<F>(&self, task: F) -> JoinHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.dispatch(task);
        JoinHandle::new(())
    }

    /// The handle downcasts to `Option<T>`, `None` when the task was dropped
    fn spawn_blocking_with_result<F, T>(&self, task: F) -> JoinHandle
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        JoinHandle::new(self.dispatch(task))
    }

    fn runtime_name(&self) -> &'static str {
        "Mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn test_dropped_task_never_runs() {
        let spawner = MockSpawner::new();
        spawner.spawn_blocking(|| panic!("dropped task ran"));
        assert_eq!(spawner.spawned(), 1);
    }

    #[test]
    fn test_blocking_runs_before_return() {
        let spawner = MockSpawner::blocking();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);

        spawner.spawn_blocking(move || flag.store(true, Ordering::SeqCst));

        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_result_handles() {
        let blocking = MockSpawner::blocking();
        let handle = blocking.spawn_blocking_with_result(|| 42u32);
        assert_eq!(handle.downcast::<Option<u32>>(), Some(Some(42)));

        let dropping = MockSpawner::new();
        let handle = dropping.spawn_blocking_with_result(|| 42u32);
        assert_eq!(handle.downcast::<Option<u32>>(), Some(None));
    }

    #[test]
    fn test_clones_share_counter() {
        let spawner = MockSpawner::blocking();
        let clone = spawner.clone();
        clone.spawn_blocking(|| {});
        spawner.spawn_blocking(|| {});
        assert_eq!(spawner.spawned(), 2);
    }
}
