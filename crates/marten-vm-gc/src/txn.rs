//! Transaction effect log
//!
//! Aborting a transaction must discard its uncommitted remembered-set and
//! allocation effects since its last break point. The heap keeps a side log
//! of both while a transaction is open; a minor collection is an implicit
//! break point and truncates the log (the host reverts its own field stores
//! when it aborts).

use crate::error::GcError;
use crate::heap::Heap;
use crate::object::ObjectRef;

/// Effects recorded since the transaction's last break point.
#[derive(Debug, Default)]
pub(crate) struct TxnLog {
    /// Objects allocated since the last break point
    pub(crate) allocated: Vec<ObjectRef>,
    /// Remembered-set entries newly inserted since the last break point
    pub(crate) remset_added: Vec<ObjectRef>,
}

impl TxnLog {
    /// A break point happened: effects before it can no longer be undone.
    pub(crate) fn on_break(&mut self) {
        self.allocated.clear();
        self.remset_added.clear();
    }
}

impl Heap {
    /// Open a transaction. Effects are logged until commit, abort, or an
    /// implicit break point.
    pub fn begin_transaction(&mut self) -> Result<(), GcError> {
        if self.txn.is_some() {
            return Err(GcError::TransactionActive);
        }
        self.txn = Some(TxnLog::default());
        Ok(())
    }

    /// Commit: the logged effects become permanent.
    pub fn commit_transaction(&mut self) -> Result<(), GcError> {
        if self.txn.take().is_none() {
            return Err(GcError::NoActiveTransaction);
        }
        self.inevitable = false;
        Ok(())
    }

    /// Abort: discard remembered-set insertions and reclaim allocations
    /// made since the last break point. Illegal in inevitable mode.
    pub fn abort_transaction(&mut self) -> Result<(), GcError> {
        if self.inevitable {
            return Err(GcError::AbortInevitable);
        }
        let Some(log) = self.txn.take() else {
            return Err(GcError::NoActiveTransaction);
        };

        for entry in log.remset_added {
            self.remembered.remove(entry);
        }
        // Newest first, mirroring bump-allocation order.
        for obj in log.allocated.into_iter().rev() {
            if self.is_allocated(obj) {
                self.release_cell(obj);
            }
        }
        Ok(())
    }

    /// Switch the current transaction to inevitable mode: it can no longer
    /// abort, and the scheduler must not commit any other transaction
    /// concurrently. Fallback for operations that cannot be transactional
    /// (true external I/O).
    pub fn begin_inevitable(&mut self) -> Result<(), GcError> {
        if self.txn.is_none() {
            return Err(GcError::NoActiveTransaction);
        }
        self.inevitable = true;
        Ok(())
    }

    /// Whether a transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.txn.is_some()
    }

    /// Whether the current transaction is inevitable.
    pub fn is_inevitable(&self) -> bool {
        self.inevitable
    }
}

#[cfg(test)]
mod tests {
    use crate::heap::{GcConfig, Heap};
    use crate::roots::NoRoots;

    fn mature_object(heap: &mut Heap) -> crate::object::ObjectRef {
        let obj = heap.allocate(&NoRoots, 32, false).unwrap();
        heap.collect_minor(&[obj]);
        heap.collect_minor(&[obj]);
        obj
    }

    #[test]
    fn test_abort_discards_allocations() {
        let mut heap = Heap::new();
        heap.begin_transaction().unwrap();
        let a = heap.allocate(&NoRoots, 64, false).unwrap();
        let b = heap.allocate(&NoRoots, 64, false).unwrap();
        heap.abort_transaction().unwrap();

        assert!(!heap.is_allocated(a));
        assert!(!heap.is_allocated(b));
        assert_eq!(heap.nursery_used(), 0);
    }

    #[test]
    fn test_abort_discards_remembered_set_entries() {
        let mut heap = Heap::new();
        let mature = mature_object(&mut heap);

        heap.begin_transaction().unwrap();
        let young = heap.allocate(&NoRoots, 16, false).unwrap();
        heap.write_field(mature, 0, Some(young));
        assert!(heap.remembered_set().contains(mature));

        heap.abort_transaction().unwrap();
        assert!(!heap.remembered_set().contains(mature));
    }

    #[test]
    fn test_commit_keeps_effects() {
        let mut heap = Heap::new();
        let mature = mature_object(&mut heap);

        heap.begin_transaction().unwrap();
        let young = heap.allocate(&NoRoots, 16, false).unwrap();
        heap.write_field(mature, 0, Some(young));
        heap.commit_transaction().unwrap();

        assert!(heap.is_allocated(young));
        assert!(heap.remembered_set().contains(mature));
        assert!(!heap.in_transaction());
    }

    #[test]
    fn test_collection_is_an_implicit_break_point() {
        let mut heap = Heap::with_config(GcConfig {
            nursery_size: 4096,
            promote_after: 2,
        });
        heap.begin_transaction().unwrap();
        let survivor = heap.allocate(&NoRoots, 32, false).unwrap();
        heap.collect_minor(&[survivor]);

        // Allocations before the collection are no longer rolled back.
        heap.abort_transaction().unwrap();
        assert!(heap.is_allocated(survivor));
    }

    #[test]
    fn test_inevitable_transaction_cannot_abort() {
        let mut heap = Heap::new();
        heap.begin_transaction().unwrap();
        heap.begin_inevitable().unwrap();
        assert!(heap.is_inevitable());
        assert!(heap.abort_transaction().is_err());
        heap.commit_transaction().unwrap();
        assert!(!heap.is_inevitable());
    }

    #[test]
    fn test_nested_transaction_rejected() {
        let mut heap = Heap::new();
        heap.begin_transaction().unwrap();
        assert!(heap.begin_transaction().is_err());
    }
}
