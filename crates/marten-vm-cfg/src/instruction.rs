//! CFG instructions
//!
//! The instruction set the barrier-insertion pass consumes. It models only
//! what the pass needs to see: allocations, pointer flow, dereference and
//! mutation sites, escape points, transaction breaks, and the ignored-region
//! markers. Everything else a routine does is opaque to the pass.

use serde::{Deserialize, Serialize};

use crate::operand::ValueId;

/// Operations at which one logical thread's transaction may yield to
/// another's. No category fact computed before one of these survives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BreakKind {
    /// Commit the current transaction
    Commit,
    /// Commit unless running in atomic mode
    CommitIfNotAtomic,
    /// Start a transaction unless running in atomic mode
    StartIfNotAtomic,
    /// Enter a callback invoked from external code
    EnterCallbackCall,
    /// Leave a callback invoked from external code
    LeaveCallbackCall,
    /// Switch the transaction to inevitable mode
    BeginInevitable,
    /// Commit partially and let other threads run before resuming
    PartialCommitAndResume,
    /// Run a whole transaction on behalf of the scheduler
    PerformTransaction,
}

/// One instruction in a basic block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instr {
    /// Allocate a fresh mutable object: `dest` is thread-private until it
    /// escapes
    AllocGc {
        /// Defined value
        dest: ValueId,
        /// Whether the object carries a finalizer
        has_finalizer: bool,
    },
    /// Allocate an immortal (never moved, never collected) object
    AllocImmortal {
        /// Defined value
        dest: ValueId,
    },
    /// Load the null constant
    LoadNull {
        /// Defined value
        dest: ValueId,
    },
    /// Copy a pointer value
    Copy {
        /// Defined value
        dest: ValueId,
        /// Source value
        src: ValueId,
    },
    /// Pointer cast; preserves the operand's storage discipline
    CastPtr {
        /// Defined value
        dest: ValueId,
        /// Source value
        src: ValueId,
    },
    /// Pointer arithmetic; preserves the operand's storage discipline
    PtrOffset {
        /// Defined value
        dest: ValueId,
        /// Source value
        src: ValueId,
    },
    /// Merge of values flowing in from predecessor blocks
    Phi {
        /// Defined value
        dest: ValueId,
        /// Incoming values, one per predecessor edge
        srcs: Vec<ValueId>,
    },
    /// Pointer-field read through `obj` (a dereference site)
    GetField {
        /// Loaded value
        dest: ValueId,
        /// Object read through
        obj: ValueId,
        /// Field slot index
        slot: u32,
    },
    /// Pointer-field write through `obj` (a mutation site); `value` escapes
    SetField {
        /// Object written through
        obj: ValueId,
        /// Field slot index
        slot: u32,
        /// Value stored
        value: ValueId,
    },
    /// Call out of the transactional world. Arguments escape, the result
    /// is unknown, and the call doubles as a transaction break.
    CallExternal {
        /// Result value, if any
        dest: Option<ValueId>,
        /// Argument values
        args: Vec<ValueId>,
    },
    /// Return from the routine; the returned value escapes
    Return {
        /// Returned value, if any
        value: Option<ValueId>,
    },
    /// Explicit transaction-break operation
    TransactionBreak(BreakKind),
    /// Start of a region where no instrumentation may be inserted
    IgnoredStart,
    /// End of an ignored region
    IgnoredStop,
    /// Plain generational write barrier emitted by an earlier GC pass.
    /// Subsumed by the STM write barrier outside ignored regions.
    GcWriteBarrier {
        /// Object about to be written through
        obj: ValueId,
    },
    /// STM read barrier (inserted by the barrier pass)
    StmReadBarrier {
        /// Object about to be read through
        obj: ValueId,
    },
    /// STM write barrier; also performs the generational barrier's role
    StmWriteBarrier {
        /// Object about to be written through
        obj: ValueId,
    },
}

impl Instr {
    /// The value this instruction defines, if any.
    pub fn dest(&self) -> Option<ValueId> {
        match *self {
            Instr::AllocGc { dest, .. }
            | Instr::AllocImmortal { dest }
            | Instr::LoadNull { dest }
            | Instr::Copy { dest, .. }
            | Instr::CastPtr { dest, .. }
            | Instr::PtrOffset { dest, .. }
            | Instr::Phi { dest, .. }
            | Instr::GetField { dest, .. } => Some(dest),
            Instr::CallExternal { dest, .. } => dest,
            _ => None,
        }
    }

    /// Whether this instruction is a transaction-break point (explicit, or
    /// an external call, which brackets one).
    pub fn is_transaction_break(&self) -> bool {
        matches!(
            self,
            Instr::TransactionBreak(_) | Instr::CallExternal { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dest_of_defining_instrs() {
        let v = ValueId(3);
        assert_eq!(
            Instr::AllocGc {
                dest: v,
                has_finalizer: false
            }
            .dest(),
            Some(v)
        );
        assert_eq!(Instr::Return { value: Some(v) }.dest(), None);
        assert_eq!(
            Instr::CallExternal {
                dest: None,
                args: vec![v]
            }
            .dest(),
            None
        );
    }

    #[test]
    fn test_break_points() {
        assert!(Instr::TransactionBreak(BreakKind::Commit).is_transaction_break());
        assert!(
            Instr::CallExternal {
                dest: None,
                args: vec![]
            }
            .is_transaction_break()
        );
        assert!(!Instr::IgnoredStart.is_transaction_break());
    }

    #[test]
    fn test_instr_serde_round_trip() {
        let instr = Instr::SetField {
            obj: ValueId(1),
            slot: 2,
            value: ValueId(3),
        };
        let json = serde_json::to_string(&instr).unwrap();
        let back: Instr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, instr);
    }
}
