//! # Marten VM Barrier Pass
//!
//! Static STM barrier insertion over routine control-flow graphs.
//!
//! The pass infers a [`Category`] for every pointer-valued definition via a
//! forward dataflow fixpoint, inserts STM read/write barriers at
//! dereference and mutation sites not provably safe, suppresses
//! instrumentation inside ignored regions, and removes plain generational
//! write barriers the STM write barrier subsumes. Categories exist only at
//! compile time; the instrumented graph carries no tags.

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod category;
pub mod dataflow;
pub mod error;
pub mod instrument;

pub use category::Category;
pub use dataflow::{Analysis, analyze};
pub use error::TransformError;
pub use instrument::{category_of, instrument};
