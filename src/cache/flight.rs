//! In-flight load slots
//!
//! The first caller for a key registers a [`Flight`] in the cache index and
//! runs the loader. Later callers for the same key find the flight and block
//! on it until the owner publishes the result.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use crate::error::Result;
use crate::gpu::GpuDevice;
use crate::texture::Texture;

pub(crate) type SharedResult<G> = Result<Arc<Texture<G>>>;

pub(crate) struct Flight<G: GpuDevice> {
    result: Mutex<Option<SharedResult<G>>>,
    cv: Condvar,
    owner: ThreadId,
}

impl<G: GpuDevice> Flight<G> {
    /// A pending flight owned by the calling thread
    pub(crate) fn new() -> Self {
        Self {
            result: Mutex::new(None),
            cv: Condvar::new(),
            owner: thread::current().id(),
        }
    }

    /// Whether the calling thread is the one running the loader
    pub(crate) fn is_owned_by_current_thread(&self) -> bool {
        self.owner == thread::current().id()
    }

    /// Publish the result and wake every waiter. Only the first call counts.
    pub(crate) fn complete(&self, result: SharedResult<G>) {
        let mut slot = self.result.lock();
        if slot.is_none() {
            *slot = Some(result);
            self.cv.notify_all();
        }
    }

    /// Block until the owner publishes
    pub(crate) fn wait(&self) -> SharedResult<G> {
        let mut slot = self.result.lock();
        loop {
            if let Some(result) = slot.as_ref() {
                return result.clone();
            }
            self.cv.wait(&mut slot);
        }
    }

    #[cfg(test)]
    pub(crate) fn is_complete(&self) -> bool {
        self.result.lock().is_some()
    }
}
