//! Array-backed tree blocks.
//!
//! Each block owns a contiguous run of up to `MAX_SIZE` items plus the
//! red-black structure fields: child and parent links into the arena, a
//! color bit, and `left_size`, the total item count of the left subtree.
//! `left_size` is the augmentation that buys O(log n) rank queries; every
//! structural mutation in `tree.rs` restores it before returning.

use std::cmp::Ordering;

/// Maximum number of items a block holds before it spills or splits.
pub const MAX_SIZE: usize = 64;

/// Below this many remaining candidates, block-local search goes linear.
pub const BINARY_SEARCH_THRESHOLD: usize = 3;

/// Index into the block arena.
pub type BlockIdx = u32;

/// Sentinel value for no parent / no child / invalid finger.
pub const NONE: u32 = u32::MAX;

/// A tree node holding a run of items.
#[derive(Clone, Debug)]
pub(crate) struct Block<T> {
    /// Items stored in this block, in sequence order. Never holds stale
    /// slots: shrinking operations truncate, they do not leave residue.
    pub items: Vec<T>,
    /// Left child (arena index, `NONE` for none).
    pub left: BlockIdx,
    /// Right child.
    pub right: BlockIdx,
    /// Parent back-reference (`NONE` at the root).
    pub parent: BlockIdx,
    /// Color of the link from the parent.
    pub red: bool,
    /// Total item count of the left subtree.
    pub left_size: usize,
}

impl<T> Block<T> {
    pub fn new() -> Block<T> {
        return Block {
            items: Vec::with_capacity(MAX_SIZE),
            left: NONE,
            right: NONE,
            parent: NONE,
            red: true,
            left_size: 0,
        };
    }

    #[inline(always)]
    pub fn size(&self) -> usize {
        return self.items.len();
    }

    #[inline(always)]
    pub fn is_full(&self) -> bool {
        return self.items.len() >= MAX_SIZE;
    }

    /// Leftmost offset whose item is not less than the probe target, i.e.
    /// `probe(item) != Greater` where `probe(item)` orders the target
    /// against `item`. Binary search with a linear tail for short tails.
    pub fn lower_bound<F: Fn(&T) -> Ordering>(&self, probe: &F) -> usize {
        let mut lo = 0usize;
        let mut hi = self.items.len();
        while hi - lo > BINARY_SEARCH_THRESHOLD {
            let mid = (lo + hi) / 2;
            if probe(&self.items[mid]) == Ordering::Greater {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        while lo < hi && probe(&self.items[lo]) == Ordering::Greater {
            lo += 1;
        }
        return lo;
    }

    /// Leftmost offset whose item is strictly greater than the probe
    /// target. Equal items stay to the left, which is what keeps inserts
    /// of equal keys stable.
    pub fn upper_bound<F: Fn(&T) -> Ordering>(&self, probe: &F) -> usize {
        let mut lo = 0usize;
        let mut hi = self.items.len();
        while hi - lo > BINARY_SEARCH_THRESHOLD {
            let mid = (lo + hi) / 2;
            if probe(&self.items[mid]) == Ordering::Less {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        while lo < hi && probe(&self.items[lo]) != Ordering::Less {
            lo += 1;
        }
        return lo;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe_for(x: i32) -> impl Fn(&i32) -> Ordering {
        return move |item: &i32| x.cmp(item);
    }

    #[test]
    fn lower_bound_finds_leftmost_equal() {
        let mut b: Block<i32> = Block::new();
        b.items = vec![1, 3, 3, 3, 5, 9];
        assert_eq!(b.lower_bound(&probe_for(3)), 1);
        assert_eq!(b.lower_bound(&probe_for(0)), 0);
        assert_eq!(b.lower_bound(&probe_for(4)), 4);
        assert_eq!(b.lower_bound(&probe_for(10)), 6);
    }

    #[test]
    fn upper_bound_skips_equals() {
        let mut b: Block<i32> = Block::new();
        b.items = vec![1, 3, 3, 3, 5, 9];
        assert_eq!(b.upper_bound(&probe_for(3)), 4);
        assert_eq!(b.upper_bound(&probe_for(0)), 0);
        assert_eq!(b.upper_bound(&probe_for(9)), 6);
    }

    #[test]
    fn bounds_agree_on_tiny_blocks() {
        // Exercises the linear tail below BINARY_SEARCH_THRESHOLD.
        let mut b: Block<i32> = Block::new();
        b.items = vec![2, 4];
        assert_eq!(b.lower_bound(&probe_for(3)), 1);
        assert_eq!(b.upper_bound(&probe_for(3)), 1);
        assert_eq!(b.lower_bound(&probe_for(4)), 1);
        assert_eq!(b.upper_bound(&probe_for(4)), 2);
    }
}
