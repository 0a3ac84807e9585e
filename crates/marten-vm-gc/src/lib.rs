//! # Marten VM Garbage Collector
//!
//! Generational garbage collector with incremental finalization.
//!
//! ## Design
//!
//! - **Nursery**: small bump-allocated young generation, collected on
//!   every minor cycle; survivors promote after a configurable number of
//!   collections
//! - **Mature generation**: scanned only through the remembered set, so
//!   minor pause time is bounded by nursery + remembered-set size
//! - **Finalization**: dependency-ordered, one wave per collection, with
//!   resurrection detection after every finalizer
//! - **Transactions**: abort discards uncommitted allocation and
//!   remembered-set effects since the last break point

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod barrier;
pub mod collect;
pub mod error;
pub mod finalize;
pub mod heap;
pub mod object;
pub mod roots;
pub mod shared;
mod txn;

pub use barrier::RememberedSet;
pub use collect::FinalizeDisposition;
pub use error::{FinalizerError, GcError};
pub use finalize::{FinalizerScheduler, WaveOutcome};
pub use heap::{GcConfig, GcStats, Heap, WORD_SIZE};
pub use object::{Generation, Header, LayoutDescriptor, ObjectRef};
pub use roots::{GlobalRoots, NoRoots, RootSource};
pub use shared::SharedHeap;
