//! The category lattice
//!
//! What is statically known about a pointer's storage discipline at one
//! program point. Categories exist only inside the pass's analysis state;
//! nothing is tagged at run time.

/// Static classification of a pointer value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Never moves, never collected; barriers always elidable
    Immortal,
    /// The null constant
    Null,
    /// Provably thread-private since its most recent allocation;
    /// no barrier needed for reads
    Local,
    /// Nothing is known; must be instrumented
    Unknown,
}

impl Category {
    /// Least upper bound at a merge point: agreeing inputs keep their
    /// category, any disagreement widens to `Unknown`.
    pub fn lub(self, other: Category) -> Category {
        if self == other {
            self
        } else {
            Category::Unknown
        }
    }

    /// Whether a read through a value of this category needs no barrier.
    pub fn read_barrier_free(self) -> bool {
        matches!(self, Category::Immortal | Category::Null | Category::Local)
    }

    /// Whether a write through a value of this category needs no barrier.
    pub fn write_barrier_free(self) -> bool {
        matches!(self, Category::Immortal | Category::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lub_agreement_keeps_category() {
        assert_eq!(Category::Local.lub(Category::Local), Category::Local);
        assert_eq!(Category::Null.lub(Category::Null), Category::Null);
    }

    #[test]
    fn test_lub_disagreement_widens() {
        assert_eq!(Category::Immortal.lub(Category::Local), Category::Unknown);
        assert_eq!(Category::Null.lub(Category::Local), Category::Unknown);
        assert_eq!(Category::Unknown.lub(Category::Immortal), Category::Unknown);
    }

    #[test]
    fn test_barrier_elision() {
        assert!(Category::Local.read_barrier_free());
        assert!(!Category::Local.write_barrier_free());
        assert!(Category::Immortal.write_barrier_free());
        assert!(!Category::Unknown.read_barrier_free());
    }
}
