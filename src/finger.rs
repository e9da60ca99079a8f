//! Fingers: cheap cursors into a `BlockTree`.
//!
//! A finger pins a position as `(block, offset)` and caches the equivalent
//! global rank. It is a value type with no backing borrow; navigation
//! (next/prev/seek) lives on the tree, which owns the structure the finger
//! points into. Fingers are ephemeral: any structural mutation of the tree
//! invalidates every outstanding finger, and callers are expected to
//! recompute rather than hold them across a mutation.

use crate::block::{BlockIdx, NONE};

/// A position in a `BlockTree`: the block holding the slot, the offset of
/// the slot within the block, and the cached global rank.
///
/// Invariant: `index` always equals the sum of `left_size`/`size`
/// contributions along the root-to-block path plus `offset`.
#[derive(Clone, Copy, Debug)]
pub struct Finger {
    /// Arena index of the block, `NONE` when the finger is invalid.
    pub block: BlockIdx,
    /// Slot offset within the block.
    pub offset: usize,
    /// Global rank of the slot.
    pub index: usize,
    /// Whether a comparator search matched exactly.
    pub found: bool,
}

impl Finger {
    /// An invalid finger carrying only a rank (e.g. one past either end).
    pub fn invalid(index: usize) -> Finger {
        return Finger {
            block: NONE,
            offset: 0,
            index,
            found: false,
        };
    }

    /// A valid finger at a concrete slot.
    pub(crate) fn at(block: BlockIdx, offset: usize, index: usize, found: bool) -> Finger {
        return Finger {
            block,
            offset,
            index,
            found,
        };
    }

    /// Whether the finger points at a live slot.
    #[inline(always)]
    pub fn is_valid(&self) -> bool {
        return self.block != NONE;
    }
}

// Ordering and distance are defined purely by rank.

impl PartialEq for Finger {
    fn eq(&self, other: &Finger) -> bool {
        return self.index == other.index;
    }
}

impl Eq for Finger {}

impl PartialOrd for Finger {
    fn partial_cmp(&self, other: &Finger) -> Option<std::cmp::Ordering> {
        return Some(self.cmp(other));
    }
}

impl Ord for Finger {
    fn cmp(&self, other: &Finger) -> std::cmp::Ordering {
        return self.index.cmp(&other.index);
    }
}

impl std::ops::Sub for Finger {
    type Output = isize;

    /// Rank distance between two fingers.
    fn sub(self, rhs: Finger) -> isize {
        return self.index as isize - rhs.index as isize;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_ordering() {
        let a = Finger::at(0, 3, 7, false);
        let b = Finger::at(9, 0, 12, true);
        assert!(a < b);
        assert_eq!(b - a, 5);
        assert_eq!(a - b, -5);
    }

    #[test]
    fn invalid_carries_rank() {
        let f = Finger::invalid(42);
        assert!(!f.is_valid());
        assert_eq!(f.index, 42);
    }
}
