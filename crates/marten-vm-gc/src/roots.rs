//! Root enumeration interface supplied by the host

use crate::object::ObjectRef;

/// Host callback yielding every live pointer-valued slot at a collection
/// point (stack, registers, globals).
///
/// The collector calls `enumerate` at the start of every minor collection
/// and during resurrection re-checks; the host must report every root each
/// time, in any order, duplicates allowed.
pub trait RootSource {
    /// Visit every root handle.
    fn enumerate(&self, visit: &mut dyn FnMut(ObjectRef));
}

impl RootSource for [ObjectRef] {
    fn enumerate(&self, visit: &mut dyn FnMut(ObjectRef)) {
        for &root in self {
            visit(root);
        }
    }
}

impl RootSource for Vec<ObjectRef> {
    fn enumerate(&self, visit: &mut dyn FnMut(ObjectRef)) {
        self.as_slice().enumerate(visit);
    }
}

impl<const N: usize> RootSource for [ObjectRef; N] {
    fn enumerate(&self, visit: &mut dyn FnMut(ObjectRef)) {
        self.as_slice().enumerate(visit);
    }
}

/// The empty root set. Collecting against this reclaims everything not
/// anchored by the remembered set or a pending finalizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRoots;

impl RootSource for NoRoots {
    fn enumerate(&self, _visit: &mut dyn FnMut(ObjectRef)) {}
}

/// A mutable global table the host can grow from finalizers.
///
/// Used by runtimes whose finalizers may resurrect objects by storing them
/// into a global slot; also convenient in tests.
#[derive(Debug, Default)]
pub struct GlobalRoots {
    slots: std::cell::RefCell<Vec<ObjectRef>>,
}

impl GlobalRoots {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a root slot.
    pub fn push(&self, obj: ObjectRef) {
        self.slots.borrow_mut().push(obj);
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.slots.borrow().is_empty()
    }
}

impl RootSource for GlobalRoots {
    fn enumerate(&self, visit: &mut dyn FnMut(ObjectRef)) {
        for &root in self.slots.borrow().iter() {
            visit(root);
        }
    }
}
