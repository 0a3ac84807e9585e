//! Heap context: nursery bump allocation and pointer-field access
//!
//! The `Heap` is an explicit context object owned by the runtime; every
//! allocation, barrier, and collection call goes through it. There is no
//! ambient singleton, so a process can run any number of independent heaps
//! (the test suite relies on this).

use crate::barrier::RememberedSet;
use crate::error::GcError;
use crate::finalize::FinalizerScheduler;
use crate::object::{Generation, LayoutDescriptor, ObjectCell, ObjectRef, ObjectState};
use crate::roots::RootSource;
use crate::txn::TxnLog;

/// Pointer-slot granularity, in bytes.
pub const WORD_SIZE: usize = 8;

/// GC configuration
#[derive(Debug, Clone)]
pub struct GcConfig {
    /// Nursery capacity in bytes (default: 256KB)
    pub nursery_size: usize,
    /// Number of minor collections an object survives before promotion
    /// to the mature generation (default: 2)
    pub promote_after: u32,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            nursery_size: 256 * 1024, // 256KB
            promote_after: 2,
        }
    }
}

/// Diagnostic counters, read-only for the host.
#[derive(Debug, Default, Clone)]
pub struct GcStats {
    /// Minor collections run
    pub collections: u64,
    /// Bytes allocated since the last collection
    pub bytes_since_collect: usize,
    /// Objects promoted to the mature generation, in total
    pub total_promoted: u64,
    /// Objects promoted by the last collection
    pub last_promoted: usize,
    /// Nursery objects reclaimed by the last collection
    pub last_reclaimed: usize,
    /// Finalizers drained in the last wave
    pub last_wave_drained: usize,
}

/// The two-generation heap.
///
/// Exclusively owns nursery storage; the collector (`collect_minor`) is the
/// only writer of generation tags and mark bits, and the write barrier
/// (`before_write`) is the only writer of remembered-set entries.
pub struct Heap {
    pub(crate) config: GcConfig,
    /// Object table; `None` marks reclaimed slots
    pub(crate) objects: Vec<Option<ObjectCell>>,
    /// Reclaimed slot indices available for reuse
    pub(crate) free_slots: Vec<u32>,
    /// Bytes currently held by nursery objects (the bump pointer)
    pub(crate) nursery_used: usize,
    pub(crate) remembered: RememberedSet,
    pub(crate) finalizers: FinalizerScheduler,
    /// Open transaction log, if any
    pub(crate) txn: Option<TxnLog>,
    /// Set while the current transaction runs in inevitable mode
    pub(crate) inevitable: bool,
    pub(crate) stats: GcStats,
}

impl Heap {
    /// Create a heap with default configuration.
    pub fn new() -> Self {
        Self::with_config(GcConfig::default())
    }

    /// Create a heap with custom configuration.
    pub fn with_config(config: GcConfig) -> Self {
        Self {
            config,
            objects: Vec::new(),
            free_slots: Vec::new(),
            nursery_used: 0,
            remembered: RememberedSet::new(),
            finalizers: FinalizerScheduler::new(),
            txn: None,
            inevitable: false,
            stats: GcStats::default(),
        }
    }

    /// Allocate zeroed storage in the nursery, treating every word as a
    /// pointer slot.
    ///
    /// If the nursery cannot satisfy the request, one minor collection is
    /// forced and the allocation retried exactly once; failure after the
    /// retry is [`GcError::OutOfMemory`], fatal to the calling transaction.
    pub fn allocate(
        &mut self,
        roots: &dyn RootSource,
        size: usize,
        has_finalizer: bool,
    ) -> Result<ObjectRef, GcError> {
        self.allocate_with_layout(roots, LayoutDescriptor::all_pointers(size, has_finalizer))
    }

    /// Allocate with an explicit host layout descriptor.
    pub fn allocate_with_layout(
        &mut self,
        roots: &dyn RootSource,
        layout: LayoutDescriptor,
    ) -> Result<ObjectRef, GcError> {
        let aligned = align_word(layout.size);

        if self.nursery_used + aligned > self.config.nursery_size {
            self.collect_minor(roots);
            if self.nursery_used + aligned > self.config.nursery_size {
                return Err(GcError::OutOfMemory {
                    requested: aligned,
                    nursery_size: self.config.nursery_size,
                });
            }
        }

        let cell = ObjectCell::new(LayoutDescriptor {
            size: aligned,
            ..layout
        });
        let obj = self.install_cell(cell);
        self.nursery_used += aligned;
        self.stats.bytes_since_collect += aligned;

        if let Some(txn) = &mut self.txn {
            txn.allocated.push(obj);
        }
        Ok(obj)
    }

    /// Write barrier: must be called before storing a pointer into any
    /// *existing* object's field (constructor-time initialization of a
    /// freshly allocated object is exempt).
    ///
    /// Records `container` in the remembered set when a mature object is
    /// about to reference a nursery object. Idempotent; redundant calls are
    /// harmless. Correctness depends on never omitting a required call.
    pub fn before_write(
        &mut self,
        container: ObjectRef,
        field_slot: usize,
        new_value: Option<ObjectRef>,
    ) {
        let container_gen = {
            let cell = self.cell(container);
            assert!(
                field_slot < cell.fields.len(),
                "field slot {field_slot} out of range for object {container:?}"
            );
            cell.header.generation
        };

        let Some(value) = new_value else { return };
        let value_gen = self.cell(value).header.generation;

        if container_gen == Generation::Mature && value_gen == Generation::Nursery {
            let inserted = self.remembered.insert(container);
            if inserted {
                if let Some(txn) = &mut self.txn {
                    txn.remset_added.push(container);
                }
            }
        }
    }

    /// Barrier-then-store helper: runs [`Heap::before_write`] and performs
    /// the field store.
    pub fn write_field(&mut self, container: ObjectRef, slot: usize, value: Option<ObjectRef>) {
        self.before_write(container, slot, value);
        self.cell_mut(container).fields[slot] = value;
    }

    /// Read a pointer field.
    pub fn read_field(&self, container: ObjectRef, slot: usize) -> Option<ObjectRef> {
        let cell = self.cell(container);
        assert!(
            slot < cell.fields.len(),
            "field slot {slot} out of range for object {container:?}"
        );
        cell.fields[slot]
    }

    /// Generation the object currently belongs to.
    pub fn generation_of(&self, obj: ObjectRef) -> Generation {
        self.cell(obj).header.generation
    }

    /// Whether `obj` still occupies storage (live or awaiting finalization).
    pub fn is_allocated(&self, obj: ObjectRef) -> bool {
        self.objects
            .get(obj.0 as usize)
            .is_some_and(|slot| slot.is_some())
    }

    /// Whether `obj` is unreachable and awaiting finalization.
    pub fn is_pending_finalize(&self, obj: ObjectRef) -> bool {
        self.is_allocated(obj) && self.cell(obj).header.state == ObjectState::PendingFinalize
    }

    /// Diagnostic counters.
    pub fn stats(&self) -> &GcStats {
        &self.stats
    }

    /// The remembered set (debug/verification use).
    pub fn remembered_set(&self) -> &RememberedSet {
        &self.remembered
    }

    /// The finalizer scheduler (debug/verification use).
    pub fn finalizer_scheduler(&self) -> &FinalizerScheduler {
        &self.finalizers
    }

    /// Bytes currently held by nursery objects.
    pub fn nursery_used(&self) -> usize {
        self.nursery_used
    }

    /// Heap configuration.
    pub fn config(&self) -> &GcConfig {
        &self.config
    }

    fn install_cell(&mut self, cell: ObjectCell) -> ObjectRef {
        if let Some(idx) = self.free_slots.pop() {
            debug_assert!(self.objects[idx as usize].is_none());
            self.objects[idx as usize] = Some(cell);
            ObjectRef(idx)
        } else {
            let idx = u32::try_from(self.objects.len()).expect("object table overflow");
            self.objects.push(Some(cell));
            ObjectRef(idx)
        }
    }

    pub(crate) fn cell(&self, obj: ObjectRef) -> &ObjectCell {
        self.objects
            .get(obj.0 as usize)
            .and_then(|slot| slot.as_ref())
            .unwrap_or_else(|| panic!("access to freed or unknown object {obj:?}"))
    }

    pub(crate) fn cell_mut(&mut self, obj: ObjectRef) -> &mut ObjectCell {
        self.objects
            .get_mut(obj.0 as usize)
            .and_then(|slot| slot.as_mut())
            .unwrap_or_else(|| panic!("access to freed or unknown object {obj:?}"))
    }

    /// Return a nursery object's storage to the bump region. Reclaim is
    /// atomic from the caller's perspective: the slot either holds the
    /// object or is free.
    pub(crate) fn release_cell(&mut self, obj: ObjectRef) {
        let slot = self
            .objects
            .get_mut(obj.0 as usize)
            .unwrap_or_else(|| panic!("release of unknown object {obj:?}"));
        let cell = slot.take().unwrap_or_else(|| {
            panic!("double reclaim of object {obj:?}");
        });
        assert_eq!(
            cell.header.generation,
            Generation::Nursery,
            "minor collection released a mature object {obj:?}"
        );
        self.nursery_used -= cell.size;
        self.free_slots.push(obj.0);
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

/// Round up to pointer-slot granularity.
pub(crate) fn align_word(size: usize) -> usize {
    (size + (WORD_SIZE - 1)) & !(WORD_SIZE - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roots::NoRoots;

    #[test]
    fn test_allocate_and_read_zeroed() {
        let mut heap = Heap::new();
        let obj = heap.allocate(&NoRoots, 32, false).unwrap();
        assert_eq!(heap.generation_of(obj), Generation::Nursery);
        for slot in 0..4 {
            assert_eq!(heap.read_field(obj, slot), None);
        }
        assert_eq!(heap.nursery_used(), 32);
    }

    #[test]
    fn test_allocation_is_aligned() {
        let mut heap = Heap::new();
        heap.allocate(&NoRoots, 13, false).unwrap();
        assert_eq!(heap.nursery_used(), 16);
        assert_eq!(heap.stats().bytes_since_collect, 16);
    }

    #[test]
    fn test_fitting_allocation_does_not_collect() {
        let mut heap = Heap::with_config(GcConfig {
            nursery_size: 1024,
            ..GcConfig::default()
        });
        heap.allocate(&NoRoots, 512, false).unwrap();
        heap.allocate(&NoRoots, 512, false).unwrap();
        assert_eq!(heap.stats().collections, 0);
    }

    #[test]
    fn test_oversized_allocation_collects_once_then_fails() {
        let mut heap = Heap::with_config(GcConfig {
            nursery_size: 128,
            ..GcConfig::default()
        });
        let err = heap.allocate(&NoRoots, 4096, false).unwrap_err();
        assert!(matches!(
            err,
            GcError::OutOfMemory {
                requested: 4096,
                nursery_size: 128,
            }
        ));
        // Exactly one forced collection, no automatic second retry.
        assert_eq!(heap.stats().collections, 1);
    }

    #[test]
    fn test_write_and_read_field() {
        let mut heap = Heap::new();
        let a = heap.allocate(&NoRoots, 16, false).unwrap();
        let b = heap.allocate(&NoRoots, 16, false).unwrap();
        heap.write_field(a, 0, Some(b));
        assert_eq!(heap.read_field(a, 0), Some(b));
        heap.write_field(a, 0, None);
        assert_eq!(heap.read_field(a, 0), None);
    }

    #[test]
    fn test_nursery_to_nursery_write_not_remembered() {
        let mut heap = Heap::new();
        let a = heap.allocate(&NoRoots, 16, false).unwrap();
        let b = heap.allocate(&NoRoots, 16, false).unwrap();
        heap.write_field(a, 0, Some(b));
        assert!(heap.remembered_set().is_empty());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_slot_out_of_range_is_fatal() {
        let mut heap = Heap::new();
        let a = heap.allocate(&NoRoots, 8, false).unwrap();
        heap.write_field(a, 5, None);
    }

    #[test]
    #[should_panic(expected = "freed or unknown object")]
    fn test_barrier_on_freed_storage_is_fatal() {
        let mut heap = Heap::new();
        let a = heap.allocate(&NoRoots, 16, false).unwrap();
        let b = heap.allocate(&NoRoots, 16, false).unwrap();
        heap.collect_minor(&NoRoots); // both unreachable, both reclaimed
        heap.before_write(a, 0, Some(b));
    }
}
