//! Background task abstraction for preloading
//!
//! Texture loads are blocking work (stream reads, decoding, uploads). A
//! [`TaskSpawner`] decides where that work runs: inline, on a plain thread,
//! or on Tokio's blocking pool.

pub mod mock;
pub mod thread;
#[cfg(feature = "runtime-tokio")]
pub mod tokio_impl;

use std::any::Any;
use std::fmt::Debug;

/// Type-erased handle to a spawned task
///
/// Each spawner documents the concrete type to [`downcast`](Self::downcast)
/// to: `std::thread::JoinHandle<T>` for [`ThreadSpawner`],
/// `tokio::task::JoinHandle<T>` for the Tokio spawner, `Option<T>` for
/// [`MockSpawner`].
#[derive(Debug)]
pub struct JoinHandle {
    inner: Box<dyn Any + Send>,
}

impl JoinHandle {
    pub fn new<T: Send + 'static>(handle: T) -> Self {
        Self {
            inner: Box::new(handle),
        }
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// Recover the concrete handle, or `None` on a type mismatch
    pub fn downcast<T: 'static>(self) -> Option<T> {
        self.inner.downcast::<T>().ok().map(|b| *b)
    }
}

/// Runs blocking work off the caller's thread
///
/// # Example
/// ```ignore
/// let spawner = ThreadSpawner::new();
/// spawner.spawn_blocking(move || {
///     let _ = cache.texture_with_file("hero.png");
/// });
/// ```
pub trait TaskSpawner: Send + Sync + Clone + Debug {
    fn spawn_blocking<F>(&self, task: F) -> JoinHandle
    where
        F: FnOnce() + Send + 'static;

    fn spawn_blocking_with_result<F, T>(&self, task: F) -> JoinHandle
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static;

    /// Name for log output
    fn runtime_name(&self) -> &'static str;
}

pub use mock::{MockSpawnBehavior, MockSpawner};
pub use thread::ThreadSpawner;

#[cfg(feature = "runtime-tokio")]
pub use tokio_impl::TokioSpawner;
