//! Static configuration errors raised while instrumenting a routine

use thiserror::Error;

use marten_vm_cfg::{BlockId, CfgError};

/// Errors that halt instrumentation of a routine. All of these are
/// compile-time conditions, never runtime faults.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransformError {
    /// The input graph is structurally malformed
    #[error(transparent)]
    Graph(#[from] CfgError),

    /// A transaction-break point (or external call) occurs inside an
    /// ignored region: the program is inconsistent
    #[error("transaction break inside an ignored region in {block}")]
    BreakInIgnoredRegion {
        /// Block containing the offending operation
        block: BlockId,
    },

    /// An ignored region opened while another was already active
    #[error("nested ignored region in {block}")]
    NestedIgnoredRegion {
        /// Block containing the second start marker
        block: BlockId,
    },

    /// An ignored-stop with no matching start, or region state that
    /// disagrees between predecessors of a merge point
    #[error("unbalanced ignored region at {block}")]
    UnbalancedIgnoredRegion {
        /// Block where the imbalance was detected
        block: BlockId,
    },

    /// The category dataflow did not stabilize within the iteration
    /// bound: the graph is malformed
    #[error("category dataflow failed to reach a fixpoint at {block}")]
    NoFixpoint {
        /// Block that kept changing
        block: BlockId,
    },
}
