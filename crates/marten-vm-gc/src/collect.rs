//! Minor collection and finalization driving
//!
//! A minor collection scans the host roots plus the remembered set, marks
//! reachable nursery objects, reclaims the dead, promotes long-lived
//! survivors, and hands dead finalizable objects to the scheduler. The
//! mature generation is never walked as a whole: pause time is bounded by
//! the nursery and the remembered set, not total heap size.

use crate::error::FinalizerError;
use crate::finalize::WaveOutcome;
use crate::heap::Heap;
use crate::object::{Generation, ObjectRef, ObjectState};
use crate::roots::RootSource;

/// What happened to an object after its finalizer ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeDisposition {
    /// The object stayed unreachable; its storage was reclaimed
    Reclaimed,
    /// The finalizer made the object reachable again; it is live once more
    Resurrected,
}

impl Heap {
    /// Run one minor collection.
    ///
    /// This is an implicit transaction-break point: effects logged by an
    /// open transaction before this call can no longer be rolled back.
    pub fn collect_minor(&mut self, roots: &dyn RootSource) {
        if let Some(txn) = &mut self.txn {
            txn.on_break();
        }
        self.stats.collections += 1;

        #[cfg(feature = "gc_logging")]
        tracing::debug!(
            target: "marten::gc",
            nursery_used = self.nursery_used,
            remembered = self.remembered.len(),
            pending_finalizers = self.finalizers.pending_len(),
            "minor collection starting"
        );

        self.mark_reachable(roots);

        // Unreachable finalizable objects join the pending set; their
        // storage (and everything they reference) is retained until their
        // finalization wave completes.
        let newly_dead: Vec<ObjectRef> = self
            .objects
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| {
                let cell = slot.as_ref()?;
                let h = &cell.header;
                (h.generation == Generation::Nursery
                    && h.state == ObjectState::Live
                    && h.has_finalizer
                    && !h.marked)
                    .then_some(ObjectRef(idx as u32))
            })
            .collect();
        for obj in newly_dead {
            self.cell_mut(obj).header.state = ObjectState::PendingFinalize;
            self.finalizers.schedule_dead(obj);
        }
        self.mark_retained();

        self.sweep();
        self.prune_remembered_set();
        self.compute_finalizer_wave();

        self.stats.bytes_since_collect = 0;

        #[cfg(feature = "gc_logging")]
        tracing::debug!(
            target: "marten::gc",
            reclaimed = self.stats.last_reclaimed,
            promoted = self.stats.last_promoted,
            wave_ready = self.finalizers.ready().len(),
            "minor collection finished"
        );
    }

    /// Take the finalization wave computed by the last collection.
    ///
    /// The host must run each object's finalizer and then call
    /// [`Heap::finalization_done`] for it. [`Heap::run_finalizer_wave`]
    /// wraps this protocol.
    pub fn drain_ready(&mut self) -> Vec<ObjectRef> {
        let wave = self.finalizers.take_ready();
        for &obj in &wave {
            self.finalizers.unschedule(obj);
        }
        wave
    }

    /// Resolve a drained object after its finalizer ran: re-runs
    /// reachability, and either reclaims the object or detects that the
    /// finalizer resurrected it.
    pub fn finalization_done(
        &mut self,
        obj: ObjectRef,
        roots: &dyn RootSource,
    ) -> FinalizeDisposition {
        assert_eq!(
            self.cell(obj).header.state,
            ObjectState::PendingFinalize,
            "finalization_done on an object that was not drained: {obj:?}"
        );

        self.mark_reachable(roots);
        self.mark_retained();

        if self.cell(obj).header.marked {
            let cell = self.cell_mut(obj);
            cell.header.state = ObjectState::Live;
            cell.header.survivals = 0;
            FinalizeDisposition::Resurrected
        } else {
            self.release_cell(obj);
            FinalizeDisposition::Reclaimed
        }
    }

    /// Drain the current wave, running `finalize` on each ready object.
    ///
    /// A failing finalizer does not abort the wave: its error is captured
    /// and the remaining ready objects still drain. Reachability is
    /// re-checked after every finalizer, so a finalizer that stores its
    /// object into a live slot prevents reclamation.
    pub fn run_finalizer_wave<F>(&mut self, roots: &dyn RootSource, mut finalize: F) -> WaveOutcome
    where
        F: FnMut(&mut Heap, ObjectRef) -> Result<(), FinalizerError>,
    {
        let wave = self.drain_ready();
        let mut outcome = WaveOutcome::default();

        for obj in wave {
            if let Err(err) = finalize(self, obj) {
                outcome.errors.push(err);
            }
            match self.finalization_done(obj, roots) {
                FinalizeDisposition::Reclaimed => outcome.finalized.push(obj),
                FinalizeDisposition::Resurrected => outcome.resurrected.push(obj),
            }
        }

        self.stats.last_wave_drained = outcome.finalized.len();

        #[cfg(feature = "gc_logging")]
        tracing::debug!(
            target: "marten::gc",
            finalized = outcome.finalized.len(),
            resurrected = outcome.resurrected.len(),
            errors = outcome.errors.len(),
            "finalizer wave drained"
        );

        outcome
    }

    /// Mark every nursery object reachable from the host roots or the
    /// remembered set. Mature objects are consulted only when they sit in
    /// the remembered set.
    fn mark_reachable(&mut self, roots: &dyn RootSource) {
        for slot in self.objects.iter_mut().flatten() {
            slot.header.marked = false;
        }

        let mut seeds = Vec::new();
        roots.enumerate(&mut |obj| seeds.push(obj));

        let mut worklist = Vec::new();
        for obj in seeds {
            if self.try_mark(obj) {
                worklist.push(obj);
            }
        }

        let remembered: Vec<ObjectRef> = self.remembered.iter().collect();
        for mature in remembered {
            let targets: Vec<ObjectRef> = self.cell(mature).fields.iter().flatten().copied().collect();
            for target in targets {
                if self.try_mark(target) {
                    worklist.push(target);
                }
            }
        }

        self.mark_transitive(worklist);
    }

    /// Mark everything reachable from pending-finalizable objects so their
    /// referents stay allocated until the finalizers have run.
    fn mark_retained(&mut self) {
        let pending: Vec<ObjectRef> = self.finalizers.pending().collect();
        let mut worklist = Vec::new();
        for obj in pending {
            if self.try_mark(obj) {
                worklist.push(obj);
            }
        }
        self.mark_transitive(worklist);
    }

    fn mark_transitive(&mut self, mut worklist: Vec<ObjectRef>) {
        while let Some(obj) = worklist.pop() {
            let targets: Vec<ObjectRef> =
                self.cell(obj).fields.iter().flatten().copied().collect();
            for target in targets {
                if self.try_mark(target) {
                    worklist.push(target);
                }
            }
        }
    }

    /// Mark a nursery object; returns true if it was newly marked.
    /// Mature objects are not marked (they are not collected here).
    fn try_mark(&mut self, obj: ObjectRef) -> bool {
        let cell = self.cell_mut(obj);
        if cell.header.generation != Generation::Nursery || cell.header.marked {
            return false;
        }
        cell.header.marked = true;
        true
    }

    /// Reclaim unmarked nursery objects, age the survivors, and promote
    /// those past the survival threshold.
    fn sweep(&mut self) {
        let promote_after = self.config.promote_after;
        let mut to_reclaim = Vec::new();
        let mut to_promote = Vec::new();

        for (idx, slot) in self.objects.iter_mut().enumerate() {
            let Some(cell) = slot else { continue };
            if cell.header.generation != Generation::Nursery {
                continue;
            }
            match cell.header.state {
                ObjectState::Live if !cell.header.marked => {
                    to_reclaim.push(ObjectRef(idx as u32));
                }
                ObjectState::Live => {
                    cell.header.survivals += 1;
                    if cell.header.survivals >= promote_after {
                        to_promote.push(ObjectRef(idx as u32));
                    }
                }
                // Dead but awaiting finalization: storage retained, no aging
                ObjectState::PendingFinalize => {}
            }
        }

        self.stats.last_reclaimed = to_reclaim.len();
        for obj in to_reclaim {
            self.release_cell(obj);
        }

        self.stats.last_promoted = to_promote.len();
        for obj in to_promote {
            self.promote(obj);
        }
    }

    /// Re-tag a survivor into the mature generation and record the
    /// remembered-set entries for the mature→nursery edges this reverses.
    fn promote(&mut self, obj: ObjectRef) {
        let size = {
            let cell = self.cell_mut(obj);
            cell.header.generation = Generation::Mature;
            cell.size
        };
        self.nursery_used -= size;
        self.stats.total_promoted += 1;

        let holds_nursery_ptr = self
            .cell(obj)
            .fields
            .iter()
            .flatten()
            .any(|&t| self.generation_of(t) == Generation::Nursery);
        if holds_nursery_ptr {
            self.remembered.insert(obj);
        }
    }

    /// Drop remembered-set entries whose object no longer references the
    /// nursery. The set may over-approximate between collections but stays
    /// minimal after each one.
    fn prune_remembered_set(&mut self) {
        let stale: Vec<ObjectRef> = self
            .remembered
            .iter()
            .filter(|&entry| {
                !self
                    .cell(entry)
                    .fields
                    .iter()
                    .flatten()
                    .any(|&t| self.generation_of(t) == Generation::Nursery)
            })
            .collect();
        for entry in stale {
            self.remembered.remove(entry);
        }
    }

    fn compute_finalizer_wave(&mut self) {
        let objects = &self.objects;
        self.finalizers.compute_wave(|obj, visit| {
            if let Some(cell) = objects.get(obj.0 as usize).and_then(|s| s.as_ref()) {
                for &target in cell.fields.iter().flatten() {
                    visit(target);
                }
            }
        });
    }
}
