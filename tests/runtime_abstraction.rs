//! Integration tests for the task spawner abstraction

use archetype_texture::{MockSpawnBehavior, MockSpawner, TaskSpawner, ThreadSpawner};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn test_mock_spawner_integration() {
    let spawner = MockSpawner::blocking();

    let executed = Arc::new(AtomicBool::new(false));
    let executed_clone = Arc::clone(&executed);

    spawner.spawn_blocking(move || {
        executed_clone.store(true, Ordering::SeqCst);
    });

    // In blocking mode, should execute immediately
    assert!(executed.load(Ordering::SeqCst));
}

#[test]
fn test_dropping_spawner_never_runs_tasks() {
    let spawner = MockSpawner::with_behavior(MockSpawnBehavior::Drop);
    let executed = Arc::new(AtomicBool::new(false));
    let executed_clone = Arc::clone(&executed);

    let handle = spawner.spawn_blocking_with_result(move || {
        executed_clone.store(true, Ordering::SeqCst);
        1
    });

    assert!(!executed.load(Ordering::SeqCst));
    assert_eq!(handle.downcast::<Option<i32>>(), Some(None));
}

#[test]
fn test_spawner_trait_bound() {
    fn run_all<S: TaskSpawner>(spawner: &S, counter: &Arc<AtomicUsize>) -> Vec<archetype_texture::JoinHandle> {
        (0..4)
            .map(|_| {
                let counter = Arc::clone(counter);
                spawner.spawn_blocking(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect()
    }

    let counter = Arc::new(AtomicUsize::new(0));
    run_all(&MockSpawner::blocking(), &counter);
    assert_eq!(counter.load(Ordering::SeqCst), 4);

    for handle in run_all(&ThreadSpawner::new(), &counter) {
        handle
            .downcast::<std::thread::JoinHandle<()>>()
            .unwrap()
            .join()
            .unwrap();
    }
    assert_eq!(counter.load(Ordering::SeqCst), 8);
}

#[test]
fn test_thread_spawner_result() {
    let handle = ThreadSpawner::new().spawn_blocking_with_result(|| "done");
    let joined = handle
        .downcast::<std::thread::JoinHandle<&'static str>>()
        .unwrap()
        .join()
        .unwrap();
    assert_eq!(joined, "done");
}

#[cfg(feature = "runtime-tokio")]
mod tokio_spawner {
    use super::*;
    use archetype_texture::TokioSpawner;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_tokio_spawner_runs_on_blocking_pool() {
        let spawner = TokioSpawner::new();
        let handle = spawner.spawn_blocking_with_result(|| 21 * 2);

        let value = handle
            .downcast::<tokio::task::JoinHandle<i32>>()
            .unwrap()
            .await
            .unwrap();
        assert_eq!(value, 42);
        assert_eq!(spawner.runtime_name(), "Tokio");
    }

    #[test]
    fn test_tokio_spawner_without_runtime_runs_inline() {
        let spawner = TokioSpawner::new();
        let handle = spawner.spawn_blocking_with_result(|| 7);
        assert_eq!(handle.downcast::<Option<i32>>(), Some(Some(7)));
    }
}
