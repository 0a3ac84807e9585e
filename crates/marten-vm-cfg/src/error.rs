//! Graph validation errors

use thiserror::Error;

use crate::operand::{BlockId, ValueId};

/// Structural errors in a routine graph.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CfgError {
    /// A block id does not refer to an existing block
    #[error("unknown block {0}")]
    UnknownBlock(BlockId),

    /// An edge targets a block outside the graph
    #[error("edge from {from} targets unknown block {to}")]
    BadEdge {
        /// Source block
        from: BlockId,
        /// Missing target
        to: BlockId,
    },

    /// A phi node with no inputs
    #[error("phi defining {dest} in {block} has no inputs")]
    EmptyPhi {
        /// Containing block
        block: BlockId,
        /// Defined value
        dest: ValueId,
    },
}
