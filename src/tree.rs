//! Order-statistics red-black tree with array-backed blocks.
//!
//! The sequence is a left-leaning red-black tree whose every node is a
//! `Block` holding up to `MAX_SIZE` items, so the per-item overhead is
//! amortized the way a B-tree amortizes it. The tree is augmented with
//! `left_size` (item count of the left subtree) which makes rank queries
//! (`find_index`) and ranked mutation O(log n).
//!
//! Structure:
//! - All blocks live in a `Vec` arena addressed by `BlockIdx` (no raw
//!   pointers); parent links are back-references into the same arena.
//! - Inserting into a full block spills one slot into the in-order
//!   successor, allocating a fresh block only when the successor is
//!   missing or full. Blocks that fall under half occupancy merge with a
//!   neighbor when the combined run fits.
//! - A block that empties is deleted with the standard left-leaning
//!   red-black deletion (`move_red_left`/`move_red_right`, rotations,
//!   color flips); every rotation carries the `left_size` bookkeeping.
//!
//! Operations:
//! - find_index: O(log n) rank descent, returns a `Finger`
//! - find / find_by: O(log n) comparator descent, leftmost equal wins
//! - find_upper: O(log n) insertion rank after equal items
//! - bounded_search: rank-space binary search confined to a window,
//!   probing items by rank and skipping items the probe declines
//! - insert/remove/move/sort: ranked mutation with block split/merge

use std::cmp::Ordering;

use crate::block::{Block, BlockIdx, MAX_SIZE, NONE};
use crate::error::SeqError;
use crate::finger::Finger;

/// Receives a callback whenever an item comes to rest in a different
/// block, so owners can re-point the item's home. Within-block shifts do
/// not fire it: a home is a block, not an offset.
pub trait RelocateHook<T> {
    fn relocated(&mut self, item: &T, block: BlockIdx);
}

/// Hook for callers that don't track item homes.
pub struct NoHook;

impl<T> RelocateHook<T> for NoHook {
    fn relocated(&mut self, _item: &T, _block: BlockIdx) {}
}

/// Adapter turning a closure into a hook.
pub struct FnHook<F>(pub F);

impl<T, F: FnMut(&T, BlockIdx)> RelocateHook<T> for FnHook<F> {
    fn relocated(&mut self, item: &T, block: BlockIdx) {
        (self.0)(item, block);
    }
}

/// An indexable sequence stored as a red-black tree of blocks.
#[derive(Debug)]
pub struct BlockTree<T> {
    /// Block arena.
    blocks: Vec<Block<T>>,
    /// Free list of reclaimed arena slots.
    free: Vec<BlockIdx>,
    /// Root block (`NONE` when empty).
    root: BlockIdx,
    /// Total number of items.
    len: usize,
}

impl<T> BlockTree<T> {
    pub fn new() -> BlockTree<T> {
        return BlockTree {
            blocks: Vec::new(),
            free: Vec::new(),
            root: NONE,
            len: 0,
        };
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        return self.len;
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        return self.len == 0;
    }

    // ------------------------------------------------------------------
    // Arena plumbing
    // ------------------------------------------------------------------

    fn alloc_block(&mut self) -> BlockIdx {
        if let Some(idx) = self.free.pop() {
            self.blocks[idx as usize] = Block::new();
            return idx;
        }
        let idx = self.blocks.len() as BlockIdx;
        self.blocks.push(Block::new());
        return idx;
    }

    fn free_block(&mut self, idx: BlockIdx) {
        debug_assert!(self.blocks[idx as usize].items.is_empty());
        self.free.push(idx);
    }

    #[inline(always)]
    fn left_of(&self, idx: BlockIdx) -> BlockIdx {
        if idx == NONE {
            return NONE;
        }
        return self.blocks[idx as usize].left;
    }

    #[inline(always)]
    fn right_of(&self, idx: BlockIdx) -> BlockIdx {
        if idx == NONE {
            return NONE;
        }
        return self.blocks[idx as usize].right;
    }

    #[inline(always)]
    fn is_red(&self, idx: BlockIdx) -> bool {
        return idx != NONE && self.blocks[idx as usize].red;
    }

    fn set_left(&mut self, h: BlockIdx, child: BlockIdx) {
        self.blocks[h as usize].left = child;
        if child != NONE {
            self.blocks[child as usize].parent = h;
        }
    }

    fn set_right(&mut self, h: BlockIdx, child: BlockIdx) {
        self.blocks[h as usize].right = child;
        if child != NONE {
            self.blocks[child as usize].parent = h;
        }
    }

    fn leftmost(&self, mut n: BlockIdx) -> BlockIdx {
        while self.blocks[n as usize].left != NONE {
            n = self.blocks[n as usize].left;
        }
        return n;
    }

    fn rightmost(&self, mut n: BlockIdx) -> BlockIdx {
        while self.blocks[n as usize].right != NONE {
            n = self.blocks[n as usize].right;
        }
        return n;
    }

    /// In-order successor block, `NONE` past the last block.
    pub(crate) fn successor_block(&self, b: BlockIdx) -> BlockIdx {
        let right = self.blocks[b as usize].right;
        if right != NONE {
            return self.leftmost(right);
        }
        let mut cur = b;
        let mut p = self.blocks[b as usize].parent;
        while p != NONE && self.blocks[p as usize].right == cur {
            cur = p;
            p = self.blocks[p as usize].parent;
        }
        return p;
    }

    /// In-order predecessor block, `NONE` before the first block.
    pub(crate) fn predecessor_block(&self, b: BlockIdx) -> BlockIdx {
        let left = self.blocks[b as usize].left;
        if left != NONE {
            return self.rightmost(left);
        }
        let mut cur = b;
        let mut p = self.blocks[b as usize].parent;
        while p != NONE && self.blocks[p as usize].left == cur {
            cur = p;
            p = self.blocks[p as usize].parent;
        }
        return p;
    }

    /// Bump `left_size` by `delta` on every ancestor whose left subtree
    /// contains `from`. This is the augmentation discipline: every item
    /// count change in a block must be propagated to the root.
    fn propagate_size(&mut self, from: BlockIdx, delta: isize) {
        let mut child = from;
        let mut p = self.blocks[from as usize].parent;
        while p != NONE {
            if self.blocks[p as usize].left == child {
                let ls = self.blocks[p as usize].left_size as isize + delta;
                debug_assert!(ls >= 0, "left_size underflow");
                self.blocks[p as usize].left_size = ls as usize;
            }
            child = p;
            p = self.blocks[p as usize].parent;
        }
    }

    /// Global rank of the first item in `block`.
    pub(crate) fn block_start(&self, block: BlockIdx) -> usize {
        let mut acc = self.blocks[block as usize].left_size;
        let mut child = block;
        let mut p = self.blocks[block as usize].parent;
        while p != NONE {
            if self.blocks[p as usize].right == child {
                acc += self.blocks[p as usize].left_size + self.blocks[p as usize].size();
            }
            child = p;
            p = self.blocks[p as usize].parent;
        }
        return acc;
    }

    // ------------------------------------------------------------------
    // Red-black rotations and fixup
    // ------------------------------------------------------------------

    /// Rotate `h`'s right child up. Fixes parent links, the parent's child
    /// pointer (or the root), colors, and `left_size`.
    fn rotate_left(&mut self, h: BlockIdx) -> BlockIdx {
        let x = self.blocks[h as usize].right;
        debug_assert!(x != NONE, "rotate_left without right child");
        let xl = self.blocks[x as usize].left;
        self.blocks[h as usize].right = xl;
        if xl != NONE {
            self.blocks[xl as usize].parent = h;
        }
        let p = self.blocks[h as usize].parent;
        self.blocks[x as usize].parent = p;
        if p == NONE {
            self.root = x;
        } else if self.blocks[p as usize].left == h {
            self.blocks[p as usize].left = x;
        } else {
            self.blocks[p as usize].right = x;
        }
        self.blocks[x as usize].left = h;
        self.blocks[h as usize].parent = x;
        let h_red = self.blocks[h as usize].red;
        self.blocks[x as usize].red = h_red;
        self.blocks[h as usize].red = true;
        let h_total = self.blocks[h as usize].left_size + self.blocks[h as usize].size();
        self.blocks[x as usize].left_size += h_total;
        return x;
    }

    /// Rotate `h`'s left child up. Mirror of `rotate_left`.
    fn rotate_right(&mut self, h: BlockIdx) -> BlockIdx {
        let x = self.blocks[h as usize].left;
        debug_assert!(x != NONE, "rotate_right without left child");
        let xr = self.blocks[x as usize].right;
        self.blocks[h as usize].left = xr;
        if xr != NONE {
            self.blocks[xr as usize].parent = h;
        }
        let p = self.blocks[h as usize].parent;
        self.blocks[x as usize].parent = p;
        if p == NONE {
            self.root = x;
        } else if self.blocks[p as usize].left == h {
            self.blocks[p as usize].left = x;
        } else {
            self.blocks[p as usize].right = x;
        }
        self.blocks[x as usize].right = h;
        self.blocks[h as usize].parent = x;
        let h_red = self.blocks[h as usize].red;
        self.blocks[x as usize].red = h_red;
        self.blocks[h as usize].red = true;
        let x_total = self.blocks[x as usize].left_size + self.blocks[x as usize].size();
        self.blocks[h as usize].left_size -= x_total;
        return x;
    }

    fn flip_colors(&mut self, h: BlockIdx) {
        self.blocks[h as usize].red = !self.blocks[h as usize].red;
        let l = self.blocks[h as usize].left;
        if l != NONE {
            self.blocks[l as usize].red = !self.blocks[l as usize].red;
        }
        let r = self.blocks[h as usize].right;
        if r != NONE {
            self.blocks[r as usize].red = !self.blocks[r as usize].red;
        }
    }

    /// Re-establish the left-leaning invariants at `h` on the way back up.
    fn fixup(&mut self, mut h: BlockIdx) -> BlockIdx {
        if self.is_red(self.right_of(h)) && !self.is_red(self.left_of(h)) {
            h = self.rotate_left(h);
        }
        if self.is_red(self.left_of(h)) && self.is_red(self.left_of(self.left_of(h))) {
            h = self.rotate_right(h);
        }
        if self.is_red(self.left_of(h)) && self.is_red(self.right_of(h)) {
            self.flip_colors(h);
        }
        return h;
    }

    fn move_red_left(&mut self, mut h: BlockIdx) -> BlockIdx {
        self.flip_colors(h);
        let r = self.blocks[h as usize].right;
        if r != NONE && self.is_red(self.blocks[r as usize].left) {
            self.rotate_right(r);
            h = self.rotate_left(h);
            self.flip_colors(h);
        }
        return h;
    }

    fn move_red_right(&mut self, mut h: BlockIdx) -> BlockIdx {
        self.flip_colors(h);
        if self.is_red(self.left_of(self.left_of(h))) {
            h = self.rotate_right(h);
            self.flip_colors(h);
        }
        return h;
    }

    // ------------------------------------------------------------------
    // Rank and comparator search
    // ------------------------------------------------------------------

    /// Locate a rank. With `exists` the rank must name an occupied slot
    /// (`index < len`); without it the returned finger is an insertion
    /// point, which may sit one past the last slot of a block.
    pub fn find_index(&self, index: usize, exists: bool) -> Finger {
        if index >= self.len + if exists { 0 } else { 1 } {
            return Finger::invalid(index);
        }
        let mut node = self.root;
        let mut remaining = index;
        while node != NONE {
            let b = &self.blocks[node as usize];
            if remaining < b.left_size {
                node = b.left;
            } else if remaining < b.left_size + b.size()
                || (!exists && remaining == b.left_size + b.size())
            {
                return Finger::at(node, remaining - b.left_size, index, exists);
            } else {
                remaining -= b.left_size + b.size();
                node = b.right;
            }
        }
        return Finger::invalid(index);
    }

    /// Comparator descent. `probe(item)` orders the target against `item`
    /// (`Less` = target sorts before `item`). Returns the leftmost slot
    /// the target could occupy; `found` is set on an exact match. Ties
    /// resolve to the leftmost equal item, keeping lookups stable.
    pub fn find_by<F: Fn(&T) -> Ordering>(&self, probe: &F) -> Finger {
        let mut node = self.root;
        let mut base = 0usize;
        let mut candidate: Option<(BlockIdx, usize)> = None;
        while node != NONE {
            let b = &self.blocks[node as usize];
            if probe(&b.items[0]) != Ordering::Greater {
                candidate = Some((node, base + b.left_size));
                node = b.left;
            } else if probe(&b.items[b.size() - 1]) == Ordering::Greater {
                base += b.left_size + b.size();
                node = b.right;
            } else {
                let off = b.lower_bound(probe);
                let found = probe(&b.items[off]) == Ordering::Equal;
                return Finger::at(node, off, base + b.left_size + off, found);
            }
        }
        return match candidate {
            Some((blk, idx)) => {
                let found = probe(&self.blocks[blk as usize].items[0]) == Ordering::Equal;
                Finger::at(blk, 0, idx, found)
            }
            // Greater than everything: an insertion point past the end.
            None => Finger::invalid(self.len),
        };
    }

    /// `find_by` with an explicit comparator and target.
    pub fn find<C>(&self, x: &T, cmp: &C) -> Finger
    where
        C: Fn(&T, &T) -> Ordering + ?Sized,
    {
        return self.find_by(&|item: &T| cmp(x, item));
    }

    /// Rank of the leftmost exact match, if any.
    pub fn index_of<C>(&self, x: &T, cmp: &C) -> Option<usize>
    where
        C: Fn(&T, &T) -> Ordering + ?Sized,
    {
        let f = self.find(x, cmp);
        if f.found {
            return Some(f.index);
        }
        return None;
    }

    /// Insertion rank after all items equal to the probe target, so that
    /// equal items keep their relative insertion order.
    pub fn find_upper<F: Fn(&T) -> Ordering>(&self, probe: &F) -> usize {
        let mut node = self.root;
        let mut base = 0usize;
        let mut candidate = self.len;
        while node != NONE {
            let b = &self.blocks[node as usize];
            if probe(&b.items[0]) == Ordering::Less {
                candidate = base + b.left_size;
                node = b.left;
            } else if probe(&b.items[b.size() - 1]) != Ordering::Less {
                base += b.left_size + b.size();
                node = b.right;
            } else {
                return base + b.left_size + b.upper_bound(probe);
            }
        }
        return candidate;
    }

    /// Binary search over the rank window `[low, high)`, probing items by
    /// rank. The probe may decline an item (return `None`) when its order
    /// cannot be trusted; the search then scans outward inside the live
    /// window for the nearest answering item. Returns the smallest
    /// insertion rank in `[low, high]` that is consistent with every
    /// probed item, placing the target after equal items.
    ///
    /// This is the whole-tree fallback for restoring live order: since
    /// only out-of-place items decline, the answering items are sorted
    /// and the search is exact with respect to them.
    pub fn bounded_search<F: Fn(&T) -> Option<Ordering>>(
        &self,
        probe: &F,
        low: usize,
        high: usize,
    ) -> usize {
        debug_assert!(low <= high && high <= self.len);
        let mut lo = low;
        let mut hi = high;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let mut picked: Option<(usize, Ordering)> = None;
            let mut d = 0usize;
            loop {
                let fwd_in = mid + d < hi;
                let bwd_in = d > 0 && mid >= lo + d;
                if !fwd_in && !bwd_in {
                    break;
                }
                if fwd_in {
                    if let Some(ord) = self.probe_rank(probe, mid + d) {
                        picked = Some((mid + d, ord));
                        break;
                    }
                }
                if bwd_in {
                    if let Some(ord) = self.probe_rank(probe, mid - d) {
                        picked = Some((mid - d, ord));
                        break;
                    }
                }
                d += 1;
            }
            match picked {
                // No answering item left in the window: any rank in it
                // preserves order relative to the answering items.
                None => break,
                Some((i, Ordering::Less)) => hi = i,
                Some((i, _)) => lo = i + 1,
            }
        }
        return lo;
    }

    fn probe_rank<F: Fn(&T) -> Option<Ordering>>(&self, probe: &F, rank: usize) -> Option<Ordering> {
        let f = self.find_index(rank, true);
        debug_assert!(f.is_valid());
        return probe(&self.blocks[f.block as usize].items[f.offset]);
    }

    // ------------------------------------------------------------------
    // Indexed access
    // ------------------------------------------------------------------

    pub fn get(&self, index: usize) -> Option<&T> {
        let f = self.find_index(index, true);
        if !f.is_valid() {
            return None;
        }
        return Some(&self.blocks[f.block as usize].items[f.offset]);
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        let f = self.find_index(index, true);
        if !f.is_valid() {
            return None;
        }
        return Some(&mut self.blocks[f.block as usize].items[f.offset]);
    }

    /// Read through a finger. A finger that no longer points at a live
    /// slot is a contract violation surfaced as `StaleFinger`.
    pub fn item(&self, f: &Finger) -> Result<&T, SeqError> {
        if !f.is_valid() {
            return Err(SeqError::StaleFinger);
        }
        return self.blocks[f.block as usize]
            .items
            .get(f.offset)
            .ok_or(SeqError::StaleFinger);
    }

    /// Replace the item a finger points at, returning the old value.
    pub fn set_item(&mut self, f: &Finger, value: T) -> Result<T, SeqError> {
        if !f.is_valid() {
            return Err(SeqError::StaleFinger);
        }
        let slot = self.blocks[f.block as usize]
            .items
            .get_mut(f.offset)
            .ok_or(SeqError::StaleFinger)?;
        return Ok(std::mem::replace(slot, value));
    }

    // ------------------------------------------------------------------
    // Finger navigation
    // ------------------------------------------------------------------

    /// Finger for a known (block, offset) slot; recomputes the rank.
    pub fn finger_for(&self, block: BlockIdx, offset: usize) -> Finger {
        return Finger::at(block, offset, self.block_start(block) + offset, true);
    }

    /// Finger for an item known to live in `block`, scanning the block
    /// for its offset.
    pub fn finger_of(&self, item: &T, block: BlockIdx) -> Option<Finger>
    where
        T: PartialEq,
    {
        let b = self.blocks.get(block as usize)?;
        let offset = b.items.iter().position(|it| it == item)?;
        return Some(Finger::at(block, offset, self.block_start(block) + offset, true));
    }

    /// Step to the next slot, crossing block boundaries through the
    /// successor chain. Runs off the end into an invalid finger.
    pub fn next_finger(&self, f: Finger) -> Finger {
        if !f.is_valid() {
            return Finger::invalid(f.index);
        }
        if f.offset + 1 < self.blocks[f.block as usize].size() {
            return Finger::at(f.block, f.offset + 1, f.index + 1, false);
        }
        let succ = self.successor_block(f.block);
        if succ == NONE {
            return Finger::invalid(f.index + 1);
        }
        return Finger::at(succ, 0, f.index + 1, false);
    }

    /// Step to the previous slot. Runs off the front into an invalid
    /// finger.
    pub fn prev_finger(&self, f: Finger) -> Finger {
        if !f.is_valid() || f.index == 0 {
            return Finger::invalid(0);
        }
        if f.offset > 0 {
            return Finger::at(f.block, f.offset - 1, f.index - 1, false);
        }
        let pred = self.predecessor_block(f.block);
        if pred == NONE {
            return Finger::invalid(0);
        }
        let last = self.blocks[pred as usize].size() - 1;
        return Finger::at(pred, last, f.index - 1, false);
    }

    /// Repeated `next_finger`/`prev_finger`; stops early with an invalid
    /// finger if it runs off either end, so callers must check validity.
    pub fn seek(&self, mut f: Finger, delta: isize) -> Finger {
        if delta >= 0 {
            for _ in 0..delta {
                if !f.is_valid() {
                    break;
                }
                f = self.next_finger(f);
            }
        } else {
            for _ in 0..(-delta) {
                if !f.is_valid() {
                    break;
                }
                f = self.prev_finger(f);
            }
        }
        return f;
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    pub fn insert_at(&mut self, index: usize, item: T) -> Result<(), SeqError> {
        return self.insert_at_with(index, item, &mut NoHook);
    }

    pub fn insert_at_with<H: RelocateHook<T>>(
        &mut self,
        index: usize,
        item: T,
        hook: &mut H,
    ) -> Result<(), SeqError> {
        if index > self.len {
            return Err(SeqError::IndexOutOfRange { index, len: self.len });
        }
        if self.root == NONE {
            let b = self.alloc_block();
            self.blocks[b as usize].red = false;
            self.root = b;
            hook.relocated(&item, b);
            self.blocks[b as usize].items.push(item);
            self.len = 1;
            return Ok(());
        }
        let f = self.find_index(index, false);
        debug_assert!(f.is_valid());
        self.insert_at_finger(f.block, f.offset, item, hook);
        return Ok(());
    }

    /// Append; the only insert that cannot fail.
    pub fn push_back_with<H: RelocateHook<T>>(&mut self, item: T, hook: &mut H) {
        if self.root == NONE {
            let b = self.alloc_block();
            self.blocks[b as usize].red = false;
            self.root = b;
            hook.relocated(&item, b);
            self.blocks[b as usize].items.push(item);
            self.len = 1;
            return;
        }
        let f = self.find_index(self.len, false);
        debug_assert!(f.is_valid());
        self.insert_at_finger(f.block, f.offset, item, hook);
    }

    fn insert_at_finger<H: RelocateHook<T>>(
        &mut self,
        block: BlockIdx,
        offset: usize,
        item: T,
        hook: &mut H,
    ) {
        if !self.blocks[block as usize].is_full() {
            hook.relocated(&item, block);
            self.blocks[block as usize].items.insert(offset, item);
            self.propagate_size(block, 1);
            self.len += 1;
            return;
        }
        // Block at capacity: spill one slot into the successor, creating
        // a fresh block when the successor is missing or also full.
        let mut succ = self.successor_block(block);
        if succ == NONE || self.blocks[succ as usize].is_full() {
            succ = self.insert_block_after(block);
            tracing::trace!(block, succ, "block split");
        }
        if offset == MAX_SIZE {
            hook.relocated(&item, succ);
            self.blocks[succ as usize].items.insert(0, item);
            self.propagate_size(succ, 1);
        } else {
            let moved = match self.blocks[block as usize].items.pop() {
                Some(it) => it,
                None => unreachable!("full block has a last item"),
            };
            hook.relocated(&moved, succ);
            self.blocks[succ as usize].items.insert(0, moved);
            self.propagate_size(succ, 1);
            self.propagate_size(block, -1);
            hook.relocated(&item, block);
            self.blocks[block as usize].items.insert(offset, item);
            self.propagate_size(block, 1);
        }
        self.len += 1;
    }

    /// Insert a fresh empty block as the in-order successor of `node`,
    /// then restore the red-black invariants bottom-up along the
    /// insertion path. The fresh block holds no items, so `left_size`
    /// values are untouched by the insertion itself.
    fn insert_block_after(&mut self, node: BlockIdx) -> BlockIdx {
        let fresh = self.alloc_block();
        let right = self.blocks[node as usize].right;
        if right == NONE {
            self.set_right(node, fresh);
        } else {
            let m = self.leftmost(right);
            self.set_left(m, fresh);
        }
        let mut cur = self.blocks[fresh as usize].parent;
        while cur != NONE {
            let r = self.fixup(cur);
            cur = self.blocks[r as usize].parent;
        }
        self.blocks[self.root as usize].red = false;
        return fresh;
    }

    pub fn remove_at(&mut self, index: usize) -> Result<T, SeqError> {
        return self.remove_at_with(index, &mut NoHook);
    }

    pub fn remove_at_with<H: RelocateHook<T>>(
        &mut self,
        index: usize,
        hook: &mut H,
    ) -> Result<T, SeqError> {
        if index >= self.len {
            return Err(SeqError::IndexOutOfRange { index, len: self.len });
        }
        let f = self.find_index(index, true);
        debug_assert!(f.is_valid());
        let block = f.block;
        let item = self.blocks[block as usize].items.remove(f.offset);
        self.propagate_size(block, -1);
        self.len -= 1;
        if self.blocks[block as usize].items.is_empty() {
            tracing::trace!(block, "deleting emptied block");
            self.remove_block(block);
        } else if self.blocks[block as usize].size() < MAX_SIZE / 2 {
            self.rebalance_block(block, hook);
        }
        return Ok(item);
    }

    /// Merge an under-occupied block with a neighbor when the combined
    /// run fits in one block. When neither neighbor can absorb it, both
    /// are more than half full and occupancy is acceptable as is.
    fn rebalance_block<H: RelocateHook<T>>(&mut self, block: BlockIdx, hook: &mut H) {
        let succ = self.successor_block(block);
        if succ != NONE
            && self.blocks[block as usize].size() + self.blocks[succ as usize].size() <= MAX_SIZE
        {
            let moved = std::mem::take(&mut self.blocks[succ as usize].items);
            let n = moved.len() as isize;
            self.propagate_size(succ, -n);
            for it in &moved {
                hook.relocated(it, block);
            }
            self.blocks[block as usize].items.extend(moved);
            self.propagate_size(block, n);
            tracing::trace!(block, succ, "merged successor block");
            self.remove_block(succ);
            return;
        }
        let pred = self.predecessor_block(block);
        if pred != NONE
            && self.blocks[block as usize].size() + self.blocks[pred as usize].size() <= MAX_SIZE
        {
            let moved = std::mem::take(&mut self.blocks[block as usize].items);
            let n = moved.len() as isize;
            self.propagate_size(block, -n);
            for it in &moved {
                hook.relocated(it, pred);
            }
            self.blocks[pred as usize].items.extend(moved);
            self.propagate_size(pred, n);
            tracing::trace!(block, pred, "merged block into predecessor");
            self.remove_block(block);
        }
    }

    // ------------------------------------------------------------------
    // Empty-block deletion (left-leaning red-black delete)
    // ------------------------------------------------------------------

    /// Remove an emptied block from the red-black structure. The block
    /// carries no items, so the deletion itself moves no `left_size`
    /// weight; only the successor splice does, and `detach_min` accounts
    /// for it level by level.
    fn remove_block(&mut self, target: BlockIdx) {
        debug_assert!(self.blocks[target as usize].items.is_empty());
        let root = self.root;
        debug_assert!(root != NONE);
        if target == root
            && self.blocks[root as usize].left == NONE
            && self.blocks[root as usize].right == NONE
        {
            self.free_block(root);
            self.root = NONE;
            return;
        }
        if !self.is_red(self.left_of(root)) && !self.is_red(self.right_of(root)) {
            self.blocks[root as usize].red = true;
        }
        let new_root = self.delete_rec(self.root, target);
        self.root = new_root;
        debug_assert!(new_root != NONE);
        self.blocks[new_root as usize].parent = NONE;
        self.blocks[new_root as usize].red = false;
    }

    /// Whether `target` sits in the left subtree of `h`. Climbs the
    /// parent chain, so it stays correct across the rotations the delete
    /// performs on the way down.
    fn in_left_subtree(&self, h: BlockIdx, target: BlockIdx) -> bool {
        let mut cur = target;
        loop {
            let p = self.blocks[cur as usize].parent;
            debug_assert!(p != NONE, "target not inside subtree");
            if p == h {
                return self.blocks[h as usize].left == cur;
            }
            cur = p;
        }
    }

    fn delete_rec(&mut self, mut h: BlockIdx, target: BlockIdx) -> BlockIdx {
        if h != target && self.in_left_subtree(h, target) {
            if !self.is_red(self.left_of(h)) && !self.is_red(self.left_of(self.left_of(h))) {
                h = self.move_red_left(h);
            }
            let child = self.blocks[h as usize].left;
            let nl = self.delete_rec(child, target);
            self.set_left(h, nl);
        } else {
            if self.is_red(self.left_of(h)) {
                h = self.rotate_right(h);
            }
            if h == target && self.blocks[h as usize].right == NONE {
                debug_assert!(self.blocks[h as usize].left == NONE);
                self.free_block(h);
                return NONE;
            }
            if !self.is_red(self.right_of(h)) && !self.is_red(self.left_of(self.right_of(h))) {
                h = self.move_red_right(h);
            }
            if h == target {
                // Splice the in-order successor block into target's slot:
                // it inherits the color, children and left subtree weight.
                let right = self.blocks[h as usize].right;
                debug_assert!(right != NONE);
                let (nr, succ) = self.detach_min(right);
                let (hl, h_red, h_ls) = {
                    let hb = &self.blocks[h as usize];
                    (hb.left, hb.red, hb.left_size)
                };
                self.blocks[succ as usize].red = h_red;
                self.blocks[succ as usize].left_size = h_ls;
                self.blocks[succ as usize].left = NONE;
                self.blocks[succ as usize].right = NONE;
                if hl != NONE {
                    self.set_left(succ, hl);
                }
                if nr != NONE {
                    self.set_right(succ, nr);
                }
                self.free_block(h);
                h = succ;
            } else {
                let child = self.blocks[h as usize].right;
                let nr = self.delete_rec(child, target);
                self.set_right(h, nr);
            }
        }
        return self.fixup(h);
    }

    /// Detach the leftmost block of the subtree rooted at `h`, returning
    /// `(new_subtree_root, detached_block)`. Each level the minimum left
    /// behind loses its item count from `left_size`.
    fn detach_min(&mut self, mut h: BlockIdx) -> (BlockIdx, BlockIdx) {
        if self.blocks[h as usize].left == NONE {
            debug_assert!(self.blocks[h as usize].right == NONE);
            return (NONE, h);
        }
        if !self.is_red(self.left_of(h)) && !self.is_red(self.left_of(self.left_of(h))) {
            h = self.move_red_left(h);
        }
        let child = self.blocks[h as usize].left;
        let (nl, min) = self.detach_min(child);
        self.blocks[h as usize].left = NONE;
        if nl != NONE {
            self.set_left(h, nl);
        }
        self.blocks[h as usize].left_size -= self.blocks[min as usize].size();
        h = self.fixup(h);
        return (h, min);
    }

    // ------------------------------------------------------------------
    // Move, sort, iterate
    // ------------------------------------------------------------------

    pub fn move_item(&mut self, old: usize, new: usize) -> Result<(), SeqError> {
        return self.move_item_with(old, new, &mut NoHook);
    }

    /// Relocate the item at rank `old` so it ends up at rank `new`. When
    /// both ranks land in the same block this is a plain in-block shift:
    /// no structural change, no `left_size` traffic, no rebalancing.
    pub fn move_item_with<H: RelocateHook<T>>(
        &mut self,
        old: usize,
        new: usize,
        hook: &mut H,
    ) -> Result<(), SeqError> {
        if old >= self.len {
            return Err(SeqError::IndexOutOfRange { index: old, len: self.len });
        }
        if new >= self.len {
            return Err(SeqError::IndexOutOfRange { index: new, len: self.len });
        }
        if old == new {
            return Ok(());
        }
        let of = self.find_index(old, true);
        let nf = self.find_index(new, true);
        if of.block == nf.block {
            let items = &mut self.blocks[of.block as usize].items;
            if old < new {
                items[of.offset..=nf.offset].rotate_left(1);
            } else {
                items[nf.offset..=of.offset].rotate_right(1);
            }
            return Ok(());
        }
        let item = self.remove_at_with(old, hook)?;
        self.insert_at_with(new, item, hook)?;
        return Ok(());
    }

    pub fn sort<C>(&mut self, cmp: &C)
    where
        C: Fn(&T, &T) -> Ordering + ?Sized,
    {
        self.sort_with(cmp, &mut NoHook);
    }

    /// Full stable re-sort: collect every item in order, sort, rebuild.
    /// Used for initial construction and comparator replacement only;
    /// live updates go through the incremental restore path instead.
    pub fn sort_with<C, H>(&mut self, cmp: &C, hook: &mut H)
    where
        C: Fn(&T, &T) -> Ordering + ?Sized,
        H: RelocateHook<T>,
    {
        let mut items = self.take_all();
        items.sort_by(|a, b| cmp(a, b));
        self.rebuild(items, hook);
    }

    /// Drain every item in sequence order and reset the arena.
    pub(crate) fn take_all(&mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len);
        let mut b = if self.root == NONE {
            NONE
        } else {
            self.leftmost(self.root)
        };
        while b != NONE {
            out.append(&mut self.blocks[b as usize].items);
            b = self.successor_block(b);
        }
        self.blocks.clear();
        self.free.clear();
        self.root = NONE;
        self.len = 0;
        return out;
    }

    /// Rebuild by sequential appends; keeps the append path as the single
    /// source of structural truth.
    pub(crate) fn rebuild<H: RelocateHook<T>>(&mut self, items: Vec<T>, hook: &mut H) {
        for item in items {
            self.push_back_with(item, hook);
        }
    }

    pub fn iter(&self) -> TreeIter<'_, T> {
        let block = if self.root == NONE {
            NONE
        } else {
            self.leftmost(self.root)
        };
        return TreeIter {
            tree: self,
            block,
            offset: 0,
        };
    }

    // ------------------------------------------------------------------
    // Verification (test harness aid, not production behavior)
    // ------------------------------------------------------------------

    /// Full-structure invariant check: red-black balance, left-leaning
    /// links, `left_size` correctness, block occupancy, parent links,
    /// and (when a comparator is supplied) sortedness.
    pub fn verify<C>(&self, cmp: Option<&C>) -> bool
    where
        C: Fn(&T, &T) -> Ordering + ?Sized,
    {
        if self.root == NONE {
            return self.len == 0;
        }
        if self.blocks[self.root as usize].red {
            return false;
        }
        if self.blocks[self.root as usize].parent != NONE {
            return false;
        }
        let Some((_black, count)) = self.verify_node(self.root) else {
            return false;
        };
        if count != self.len {
            return false;
        }
        if let Some(cmp) = cmp {
            let mut prev: Option<&T> = None;
            for item in self.iter() {
                if let Some(p) = prev {
                    if cmp(p, item) == Ordering::Greater {
                        return false;
                    }
                }
                prev = Some(item);
            }
        }
        return true;
    }

    /// Returns `(black_height, item_count)` of the subtree, or `None` on
    /// any violated invariant.
    fn verify_node(&self, node: BlockIdx) -> Option<(usize, usize)> {
        let b = &self.blocks[node as usize];
        if b.items.is_empty() || b.items.len() > MAX_SIZE {
            return None;
        }
        // Left-leaning: a right child link is never red.
        if self.is_red(b.right) {
            return None;
        }
        // No two consecutive red links.
        if b.red && self.is_red(b.left) {
            return None;
        }
        let (lb, lc) = match b.left {
            NONE => (0, 0),
            l => {
                if self.blocks[l as usize].parent != node {
                    return None;
                }
                self.verify_node(l)?
            }
        };
        let (rb, rc) = match b.right {
            NONE => (0, 0),
            r => {
                if self.blocks[r as usize].parent != node {
                    return None;
                }
                self.verify_node(r)?
            }
        };
        if lb != rb {
            return None;
        }
        if b.left_size != lc {
            return None;
        }
        let black = lb + if b.red { 0 } else { 1 };
        return Some((black, lc + b.size() + rc));
    }
}

impl<T> Default for BlockTree<T> {
    fn default() -> Self {
        return Self::new();
    }
}

/// In-order iterator over the tree's items.
pub struct TreeIter<'a, T> {
    tree: &'a BlockTree<T>,
    block: BlockIdx,
    offset: usize,
}

impl<'a, T> Iterator for TreeIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.block == NONE {
            return None;
        }
        let b = &self.tree.blocks[self.block as usize];
        let item = &b.items[self.offset];
        self.offset += 1;
        if self.offset >= b.size() {
            self.block = self.tree.successor_block(self.block);
            self.offset = 0;
        }
        return Some(item);
    }
}
