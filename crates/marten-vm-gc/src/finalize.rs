//! Incremental finalization scheduling
//!
//! Unreachable objects with finalizers are not reclaimed immediately. They
//! enter the pending set, and after every minor collection the scheduler
//! releases one *wave*: exactly the pending objects that no other pending
//! object still references. Running a finalizer removes its object from the
//! pending set, which can make further objects ready on the next cycle, so
//! a chain of N dependent finalizers drains over N collections rather than
//! stalling one pause.
//!
//! The dependency graph is keyed by object handle, never by chasing native
//! references, so wave computation is decidable without a call stack.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::FinalizerError;
use crate::object::ObjectRef;

/// Tracks unreachable-but-not-yet-finalized objects and computes ready waves.
#[derive(Debug, Default)]
pub struct FinalizerScheduler {
    /// Dead objects whose finalizers have not run yet
    pending: FxHashSet<ObjectRef>,
    /// The wave computed by the last collection, not yet drained
    ready: Vec<ObjectRef>,
}

impl FinalizerScheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `obj` as dead-with-finalizer. Called once per object per
    /// collection cycle, when the mark phase proves it unreachable.
    pub(crate) fn schedule_dead(&mut self, obj: ObjectRef) {
        let inserted = self.pending.insert(obj);
        assert!(inserted, "object {obj:?} scheduled dead twice");
    }

    /// Whether `obj` is awaiting finalization.
    pub fn is_pending(&self, obj: ObjectRef) -> bool {
        self.pending.contains(&obj)
    }

    /// Objects awaiting finalization (any order).
    pub(crate) fn pending(&self) -> impl Iterator<Item = ObjectRef> + '_ {
        self.pending.iter().copied()
    }

    /// Number of objects awaiting finalization.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Remove `obj` from the pending set (drained into a wave, or
    /// resurrected by the host making it reachable again).
    pub(crate) fn unschedule(&mut self, obj: ObjectRef) -> bool {
        self.pending.remove(&obj)
    }

    /// Recompute the ready wave from the pending dependency subgraph.
    ///
    /// `referents` yields, for a pending object, every object its pointer
    /// fields currently reference. An object is ready iff no *other*
    /// pending object references it: within a linear chain this releases
    /// the sole referrer first; across independent chains the relative
    /// order is unspecified (handles sort it deterministically here).
    pub(crate) fn compute_wave<F>(&mut self, mut referents: F)
    where
        F: FnMut(ObjectRef, &mut dyn FnMut(ObjectRef)),
    {
        let mut incoming: FxHashMap<ObjectRef, usize> =
            self.pending.iter().map(|&p| (p, 0)).collect();

        for &referrer in &self.pending {
            referents(referrer, &mut |target| {
                if target != referrer {
                    if let Some(count) = incoming.get_mut(&target) {
                        *count += 1;
                    }
                }
            });
        }

        let mut wave: Vec<ObjectRef> = incoming
            .into_iter()
            .filter(|&(_, count)| count == 0)
            .map(|(obj, _)| obj)
            .collect();
        wave.sort_unstable();
        self.ready = wave;
    }

    /// Take the wave computed by the last collection.
    pub(crate) fn take_ready(&mut self) -> Vec<ObjectRef> {
        std::mem::take(&mut self.ready)
    }

    /// Peek at the wave without draining it.
    pub fn ready(&self) -> &[ObjectRef] {
        &self.ready
    }
}

/// Result of draining one finalization wave.
#[derive(Debug, Default)]
pub struct WaveOutcome {
    /// Objects whose finalizers ran and whose storage was reclaimed
    pub finalized: Vec<ObjectRef>,
    /// Objects whose finalizers made them reachable again; storage kept
    pub resurrected: Vec<ObjectRef>,
    /// Finalizer failures, reported after the wave completed
    pub errors: Vec<FinalizerError>,
}
