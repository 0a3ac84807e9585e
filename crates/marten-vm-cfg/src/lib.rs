//! # Marten VM CFG
//!
//! Control-flow-graph instruction set consumed by the Marten compiler
//! passes, most notably the STM barrier-insertion pass. The host front end
//! lowers each routine into this form; instrumented graphs are handed on to
//! the interpreter or JIT backend.

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod graph;
pub mod instruction;
pub mod operand;

pub use error::CfgError;
pub use graph::{Block, Cfg};
pub use instruction::{BreakKind, Instr};
pub use operand::{BlockId, ValueId};
