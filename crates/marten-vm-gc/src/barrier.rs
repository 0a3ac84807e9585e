//! Remembered set for cross-generation references
//!
//! The write barrier (`Heap::before_write`) records every mature object
//! that may hold a pointer into the nursery. A minor collection scans
//! exactly these entries instead of the whole mature generation, which is
//! what bounds its pause time.

use rustc_hash::FxHashSet;

use crate::object::ObjectRef;

/// The set of mature objects known to (possibly) reference nursery objects.
///
/// Invariant: every nursery object reachable from a mature object is
/// reachable through at least one entry here. The set may over-approximate
/// (stale entries are pruned during collection); it must never
/// under-approximate.
#[derive(Debug, Default)]
pub struct RememberedSet {
    entries: FxHashSet<ObjectRef>,
}

impl RememberedSet {
    /// Create an empty remembered set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mature object. Returns true if the entry is new.
    pub(crate) fn insert(&mut self, obj: ObjectRef) -> bool {
        self.entries.insert(obj)
    }

    /// Drop an entry (collection-time pruning or transaction rollback).
    pub(crate) fn remove(&mut self, obj: ObjectRef) -> bool {
        self.entries.remove(&obj)
    }

    /// Whether `obj` is recorded.
    pub fn contains(&self, obj: ObjectRef) -> bool {
        self.entries.contains(&obj)
    }

    /// Iterate over recorded objects.
    pub fn iter(&self) -> impl Iterator<Item = ObjectRef> + '_ {
        self.entries.iter().copied()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
