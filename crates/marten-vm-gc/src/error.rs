//! GC runtime errors

use thiserror::Error;

use crate::object::ObjectRef;

/// Errors surfaced by the GC runtime.
///
/// Out-of-memory is the only recoverable-in-principle condition the heap
/// reports through `Result`; contract violations (double reclaim, barrier
/// calls on freed storage) panic instead, because they mean memory safety
/// has already been compromised on the host side.
#[derive(Debug, Error)]
pub enum GcError {
    /// The nursery could not satisfy an allocation even after one forced
    /// minor collection. Fatal to the calling transaction.
    #[error(
        "out of memory: {requested} bytes requested, nursery holds {nursery_size} bytes \
         (after forced minor collection)"
    )]
    OutOfMemory {
        /// Bytes requested (after alignment)
        requested: usize,
        /// Configured nursery capacity
        nursery_size: usize,
    },

    /// An abort was requested for a transaction running in inevitable mode.
    #[error("cannot abort an inevitable transaction")]
    AbortInevitable,

    /// A transaction operation was issued with no transaction open.
    #[error("no transaction is active")]
    NoActiveTransaction,

    /// A transaction was started while another is still open.
    #[error("a transaction is already active")]
    TransactionActive,
}

/// Error raised by a host finalizer.
///
/// Captured per object; a failing finalizer never aborts the wave it runs
/// in (the remaining ready objects still drain).
#[derive(Debug, Error)]
#[error("finalizer for object {object:?} failed: {message}")]
pub struct FinalizerError {
    /// The object whose finalizer raised
    pub object: ObjectRef,
    /// Host-supplied description of the failure
    pub message: String,
}

impl FinalizerError {
    /// Wrap a host error message for `object`.
    pub fn new(object: ObjectRef, message: impl Into<String>) -> Self {
        Self {
            object,
            message: message.into(),
        }
    }
}
