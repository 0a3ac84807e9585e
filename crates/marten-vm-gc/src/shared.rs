//! Shared heap handle for cooperative multi-thread embedding
//!
//! The heap itself is single-threaded (`&mut` discipline); hosts running
//! several cooperating logical threads share one heap behind a lock and
//! hand it off at transaction-break points. The lock is the serialization
//! discipline for the remembered set required by the concurrency model.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::heap::{GcConfig, Heap};

/// A heap shared between cooperating threads.
#[derive(Clone)]
pub struct SharedHeap {
    inner: Arc<Mutex<Heap>>,
}

impl SharedHeap {
    /// Wrap a fresh heap with default configuration.
    pub fn new() -> Self {
        Self::with_config(GcConfig::default())
    }

    /// Wrap a fresh heap with custom configuration.
    pub fn with_config(config: GcConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Heap::with_config(config))),
        }
    }

    /// Acquire the heap for one stretch between break points.
    ///
    /// Holding the guard across a logical transaction-break point defeats
    /// the cooperative hand-off; release it at every break.
    pub fn lock(&self) -> MutexGuard<'_, Heap> {
        self.inner.lock()
    }
}

impl Default for SharedHeap {
    fn default() -> Self {
        Self::new()
    }
}
