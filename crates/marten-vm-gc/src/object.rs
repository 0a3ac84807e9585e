//! Object headers, handles, and layout descriptors

/// Stable handle to a heap object.
///
/// Handles index the heap's object table and never change while the object
/// is alive, even across promotion. All host-facing APIs speak in handles;
/// raw pointers never cross the crate boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef(pub(crate) u32);

impl ObjectRef {
    /// Raw index of this handle (debug/diagnostic use).
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Which generation an object currently belongs to.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    /// Young generation: bump-allocated, collected on every minor cycle
    Nursery = 0,
    /// Old generation: scanned only through the remembered set
    Mature = 1,
}

/// Object lifecycle state, tracked in the header.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectState {
    /// Reachable (or not yet proven unreachable)
    Live = 0,
    /// Unreachable but holding a finalizer that has not run yet.
    /// Storage is retained until its finalization wave completes.
    PendingFinalize = 1,
}

/// Per-object header: generation tag, finalizer flag, mark bit, survival count.
///
/// The collector is the only writer of the generation tag and mark bit.
#[derive(Debug, Clone)]
pub struct Header {
    /// Current generation
    pub(crate) generation: Generation,
    /// Whether the host registered a finalizer for this object
    pub(crate) has_finalizer: bool,
    /// Mark bit, only meaningful during a collection
    pub(crate) marked: bool,
    /// Number of minor collections survived while in the nursery
    pub(crate) survivals: u32,
    /// Lifecycle state
    pub(crate) state: ObjectState,
}

impl Header {
    pub(crate) fn new(has_finalizer: bool) -> Self {
        Self {
            generation: Generation::Nursery,
            has_finalizer,
            marked: false,
            survivals: 0,
            state: ObjectState::Live,
        }
    }

    /// Generation this object currently belongs to.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Whether a finalizer is registered for this object.
    pub fn has_finalizer(&self) -> bool {
        self.has_finalizer
    }
}

/// Host-supplied layout descriptor for an allocation.
///
/// The host's object model knows, per type, how large the object is, how
/// many pointer-valued slots it carries, and whether it has a finalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutDescriptor {
    /// Object size in bytes (counted against the nursery region)
    pub size: usize,
    /// Number of pointer-valued field slots
    pub ptr_slots: usize,
    /// Whether the object must be finalized before reclaim
    pub has_finalizer: bool,
}

impl LayoutDescriptor {
    /// Layout where every word-sized slot is a pointer slot.
    pub fn all_pointers(size: usize, has_finalizer: bool) -> Self {
        Self {
            size,
            ptr_slots: size / crate::heap::WORD_SIZE,
            has_finalizer,
        }
    }
}

/// One object in the heap's table: header plus pointer-field storage.
///
/// Non-pointer payload is accounted for by `size` only; the collector never
/// inspects it, so it is not materialized here.
#[derive(Debug)]
pub(crate) struct ObjectCell {
    pub(crate) header: Header,
    pub(crate) size: usize,
    pub(crate) fields: Vec<Option<ObjectRef>>,
}

impl ObjectCell {
    pub(crate) fn new(layout: LayoutDescriptor) -> Self {
        Self {
            header: Header::new(layout.has_finalizer),
            size: layout.size,
            // Zeroed storage: every pointer slot starts null
            fields: vec![None; layout.ptr_slots],
        }
    }
}
