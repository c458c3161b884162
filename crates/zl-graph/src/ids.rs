use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Opaque per-transform / per-behavior payload: the embedding program's
/// actual implementation (a node's transform, a selector's decision
/// function, a segmenter's body). Carried through registration, cloning,
/// and serialization bookkeeping, but never invoked by this crate (§3 "an
/// opaque registry pointer"; §9 "Dynamic dispatch").
pub type OpaqueBehavior = Arc<dyn Any + Send + Sync>;

/// Identity of a registered [`crate::Node`]. New ids are allocated as
/// `end_of_standard + len(vector)` (§4.D) — stable for the lifetime of the
/// owning manager, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Identity of a registered [`crate::Graph`]. Same allocation discipline as
/// [`NodeId`], in a separate id space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "graph#{}", self.0)
    }
}

/// A bitfield of elementary stream types an input accepts or an output
/// produces. Two masks are *compatible* when they share any set bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct TypeMask(pub u32);

impl TypeMask {
    pub const NONE: TypeMask = TypeMask(0);
    /// Every elementary type bit set; accepts any input (`ZL_Type_any`).
    pub const ANY: TypeMask = TypeMask(u32::MAX);

    pub fn overlaps(&self, other: &TypeMask) -> bool {
        self.0 & other.0 != 0
    }

    pub fn union(&self, other: &TypeMask) -> TypeMask {
        TypeMask(self.0 | other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_requires_a_shared_bit() {
        let numeric = TypeMask(0b0001);
        let string = TypeMask(0b0010);
        let numeric_or_string = TypeMask(0b0011);
        assert!(!numeric.overlaps(&string));
        assert!(numeric.overlaps(&numeric_or_string));
    }
}
