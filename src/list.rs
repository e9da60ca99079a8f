//! Live sequence: a continuously re-orderable view over owned items.
//!
//! `LiveList` keeps its visible items sorted by a caller-supplied
//! comparator and optionally filtered by a predicate. Items whose sort
//! key or filter verdict may have changed are *marked dirty* (directly,
//! or from another thread through a [`DirtyNotifier`]); the next
//! [`drain_and_restore`](LiveList::drain_and_restore) moves each dirty
//! item back to where it belongs and reports every move as an
//! old-index/new-index pair, so observers can mirror the reshuffle
//! without diffing the whole sequence.
//!
//! Layout: items live in a generation-checked slot arena and the two
//! trees store only [`ElemId`]s. The visible tree is comparator-ordered;
//! the hidden tree keeps filtered-out items in arrival order so they can
//! come back when the predicate changes its mind. Each element records
//! the block it currently lives in (its *home*); the tree's relocation
//! hook keeps that record current, which makes id-to-index lookups
//! O(log n + block size) with no per-offset bookkeeping.
//!
//! Dirtiness is a property of an item's *position*, never of its value:
//! comparisons always read the live item, and a dirty mark only means
//! "this item may be parked in the wrong slot". The restore pass finds
//! each dirty item's true slot by binary-searching the rank space while
//! skipping other still-dirty items, which stay reliable brackets
//! because everything clean is sorted.

use std::cmp::Ordering;
use std::sync::{Arc, Mutex, Weak};

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::block::BlockIdx;
use crate::error::SeqError;
use crate::tree::{BlockTree, FnHook};

/// Handle to an element of a [`LiveList`]. Stays cheap to copy and
/// detects reuse: the generation is checked on every dereference, so a
/// handle to a removed element errors instead of aliasing its successor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ElemId {
    idx: u32,
    r#gen: u32,
}

/// Which aspect of an element's placement went stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirtyKind {
    /// The sort key may have changed.
    Sort,
    /// The filter verdict may have changed.
    Filter,
    /// The grouping key may have changed.
    Group,
}

/// One repositioning performed by a restore pass. Indices are relative
/// to the sequence as it stood immediately before this move, so a
/// mirror applying the events in order stays in sync.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MoveEvent {
    pub old_index: usize,
    pub new_index: usize,
}

/// Everything a restore pass did, for observers that track more than
/// moves.
#[derive(Clone, Debug, Default)]
pub struct DrainReport {
    /// Repositionings of visible items, in the order performed.
    pub moves: Vec<MoveEvent>,
    /// Visible indices at which previously filtered-out items reappeared.
    pub inserted: Vec<usize>,
    /// Visible indices (pre-removal) of items the filter newly excluded.
    pub removed: Vec<usize>,
    /// Elements whose grouping key changed; the owner re-buckets them.
    pub regrouped: Vec<ElemId>,
}

/// Cross-thread handle for marking elements dirty. Marks land in an
/// inbox and take effect at the start of the next restore pass. The
/// handle holds no strong reference: marking after the list is gone is
/// a quiet no-op.
#[derive(Clone)]
pub struct DirtyNotifier {
    inbox: Weak<Mutex<SmallVec<[(ElemId, DirtyKind); 16]>>>,
}

impl DirtyNotifier {
    /// Queue a dirty mark. Returns false when the list no longer exists.
    pub fn mark(&self, id: ElemId, kind: DirtyKind) -> bool {
        let Some(inbox) = self.inbox.upgrade() else {
            return false;
        };
        let Ok(mut queue) = inbox.lock() else {
            return false;
        };
        queue.push((id, kind));
        return true;
    }
}

struct Element<T> {
    item: T,
    /// Block (in the visible or hidden tree, per `excluded`) currently
    /// holding this element's id.
    home: BlockIdx,
    excluded: bool,
    sort_dirty: bool,
    filter_dirty: bool,
    group_dirty: bool,
}

impl<T> Element<T> {
    fn is_dirty(&self) -> bool {
        return self.sort_dirty || self.filter_dirty || self.group_dirty;
    }
}

struct Slot<T> {
    r#gen: u32,
    entry: Option<Element<T>>,
}

/// Re-points an element's home whenever the tree copies its id into a
/// different block.
fn relocate_hook<T>(slots: &mut [Slot<T>]) -> FnHook<impl FnMut(&ElemId, BlockIdx) + '_> {
    return FnHook(move |id: &ElemId, block: BlockIdx| {
        if let Some(el) = slots[id.idx as usize].entry.as_mut() {
            el.home = block;
        }
    });
}

fn item_of<'a, T>(slots: &'a [Slot<T>], id: ElemId) -> &'a T {
    match slots[id.idx as usize].entry.as_ref() {
        Some(el) => return &el.item,
        None => unreachable!("tree references a freed slot"),
    }
}

/// A sorted, filterable, observable sequence with incremental restore.
pub struct LiveList<T> {
    /// Visible items, comparator-ordered (except items marked dirty).
    tree: BlockTree<ElemId>,
    /// Filtered-out items, in arrival order.
    hidden: BlockTree<ElemId>,
    slots: Vec<Slot<T>>,
    slot_free: Vec<u32>,
    /// `None` leaves the sequence in insertion order; `add` appends and
    /// restore passes move nothing.
    comparator: Option<Box<dyn Fn(&T, &T) -> Ordering>>,
    filter: Option<Box<dyn Fn(&T) -> bool>>,
    /// Elements with at least one dirty bit set, in marking order.
    worklist: SmallVec<[ElemId; 16]>,
    /// Marks queued from other threads, pumped at the start of a drain.
    inbox: Arc<Mutex<SmallVec<[(ElemId, DirtyKind); 16]>>>,
}

impl<T> LiveList<T> {
    pub fn new<C>(comparator: C) -> LiveList<T>
    where
        C: Fn(&T, &T) -> Ordering + 'static,
    {
        let mut list = Self::unsorted();
        list.comparator = Some(Box::new(comparator));
        return list;
    }

    /// A list with no comparator: items keep insertion order until a
    /// comparator is set.
    pub fn unsorted() -> LiveList<T> {
        return LiveList {
            tree: BlockTree::new(),
            hidden: BlockTree::new(),
            slots: Vec::new(),
            slot_free: Vec::new(),
            comparator: None,
            filter: None,
            worklist: SmallVec::new(),
            inbox: Arc::new(Mutex::new(SmallVec::new())),
        };
    }

    /// Number of visible items.
    #[inline(always)]
    pub fn len(&self) -> usize {
        return self.tree.len();
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        return self.tree.is_empty();
    }

    /// Number of filtered-out items.
    #[inline(always)]
    pub fn hidden_len(&self) -> usize {
        return self.hidden.len();
    }

    /// Visible plus filtered-out items.
    #[inline(always)]
    pub fn total_len(&self) -> usize {
        return self.tree.len() + self.hidden.len();
    }

    /// Whether any dirty marks await the next restore pass.
    pub fn is_dirty(&self) -> bool {
        if !self.worklist.is_empty() {
            return true;
        }
        if let Ok(queue) = self.inbox.lock() {
            return !queue.is_empty();
        }
        return false;
    }

    pub fn notifier(&self) -> DirtyNotifier {
        return DirtyNotifier {
            inbox: Arc::downgrade(&self.inbox),
        };
    }

    // ------------------------------------------------------------------
    // Slot arena
    // ------------------------------------------------------------------

    fn alloc_slot(&mut self, item: T, excluded: bool) -> ElemId {
        let element = Element {
            item,
            home: crate::block::NONE,
            excluded,
            sort_dirty: false,
            filter_dirty: false,
            group_dirty: false,
        };
        if let Some(idx) = self.slot_free.pop() {
            let slot = &mut self.slots[idx as usize];
            slot.entry = Some(element);
            return ElemId { idx, r#gen: slot.r#gen };
        }
        let idx = self.slots.len() as u32;
        self.slots.push(Slot {
            r#gen: 0,
            entry: Some(element),
        });
        return ElemId { idx, r#gen: 0 };
    }

    fn free_slot(&mut self, id: ElemId) -> Option<Element<T>> {
        let slot = &mut self.slots[id.idx as usize];
        let entry = slot.entry.take();
        if entry.is_some() {
            slot.r#gen = slot.r#gen.wrapping_add(1);
            self.slot_free.push(id.idx);
        }
        return entry;
    }

    fn element(&self, id: ElemId) -> Result<&Element<T>, SeqError> {
        let slot = self.slots.get(id.idx as usize).ok_or(SeqError::Detached)?;
        if slot.r#gen != id.r#gen {
            return Err(SeqError::Detached);
        }
        return slot.entry.as_ref().ok_or(SeqError::Detached);
    }

    fn element_mut(&mut self, id: ElemId) -> Result<&mut Element<T>, SeqError> {
        let slot = self.slots.get_mut(id.idx as usize).ok_or(SeqError::Detached)?;
        if slot.r#gen != id.r#gen {
            return Err(SeqError::Detached);
        }
        return slot.entry.as_mut().ok_or(SeqError::Detached);
    }

    // ------------------------------------------------------------------
    // Access
    // ------------------------------------------------------------------

    pub fn get(&self, index: usize) -> Option<&T> {
        let id = self.tree.get(index)?;
        return Some(item_of(&self.slots, *id));
    }

    /// Id of the visible item at `index`.
    pub fn id_at(&self, index: usize) -> Option<ElemId> {
        return self.tree.get(index).copied();
    }

    pub fn item(&self, id: ElemId) -> Result<&T, SeqError> {
        return Ok(&self.element(id)?.item);
    }

    /// Mutable access to an item. Changing anything the comparator or
    /// filter reads must be followed by `mark_dirty`; the list never
    /// inspects items on its own.
    pub fn item_mut(&mut self, id: ElemId) -> Result<&mut T, SeqError> {
        return Ok(&mut self.element_mut(id)?.item);
    }

    /// Whether `id` still names a live element.
    pub fn contains(&self, id: ElemId) -> bool {
        return self.element(id).is_ok();
    }

    /// Index of the leftmost visible item equal to `value` under the
    /// comparator. Always `None` on an unsorted list.
    pub fn index_of(&self, value: &T) -> Option<usize> {
        let cmp = self.comparator.as_deref()?;
        let slots = &self.slots;
        let probe = |id: &ElemId| cmp(value, item_of(slots, *id));
        let f = self.tree.find_by(&probe);
        if f.found {
            return Some(f.index);
        }
        return None;
    }

    /// Visible index of an element, `Ok(None)` while it is filtered out.
    pub fn index_of_id(&self, id: ElemId) -> Result<Option<usize>, SeqError> {
        let el = self.element(id)?;
        if el.excluded {
            return Ok(None);
        }
        match self.tree.finger_of(&id, el.home) {
            Some(f) => return Ok(Some(f.index)),
            None => return Err(SeqError::Detached),
        }
    }

    /// Iterate the visible items in order.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        return self.tree.iter().map(move |id| item_of(&self.slots, *id));
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Add an item at its comparator position (after any equal items).
    /// An item the filter rejects goes straight to the hidden tree.
    pub fn add(&mut self, item: T) -> ElemId {
        let included = match &self.filter {
            Some(f) => f(&item),
            None => true,
        };
        let id = self.alloc_slot(item, !included);
        if !included {
            let Self { hidden, slots, .. } = &mut *self;
            let mut hook = relocate_hook(slots);
            hidden.push_back_with(id, &mut hook);
            return id;
        }
        let pos = self.search_position(id);
        let Self { tree, slots, .. } = &mut *self;
        let mut hook = relocate_hook(slots);
        match tree.insert_at_with(pos, id, &mut hook) {
            Ok(()) => {}
            Err(_) => unreachable!("search position within bounds"),
        }
        return id;
    }

    /// Insert at an explicit visible index, overriding the comparator.
    /// The item is not marked dirty: a caller placing items by hand gets
    /// exactly what it asked for until something marks the item.
    pub fn insert(&mut self, index: usize, item: T) -> Result<ElemId, SeqError> {
        if index > self.tree.len() {
            return Err(SeqError::IndexOutOfRange {
                index,
                len: self.tree.len(),
            });
        }
        let id = self.alloc_slot(item, false);
        let Self { tree, slots, .. } = &mut *self;
        let mut hook = relocate_hook(slots);
        tree.insert_at_with(index, id, &mut hook)?;
        return Ok(id);
    }

    /// Remove the visible item at `index`, returning it. Outstanding ids
    /// for the element turn stale.
    pub fn remove(&mut self, index: usize) -> Result<T, SeqError> {
        let removed = {
            let Self { tree, slots, .. } = &mut *self;
            let mut hook = relocate_hook(slots);
            tree.remove_at_with(index, &mut hook)?
        };
        match self.free_slot(removed) {
            Some(el) => return Ok(el.item),
            None => unreachable!("visible tree references a freed slot"),
        }
    }

    /// Remove an element by id wherever it lives, visible or hidden.
    pub fn remove_id(&mut self, id: ElemId) -> Result<T, SeqError> {
        let el = self.element(id)?;
        let excluded = el.excluded;
        let home = el.home;
        let index = {
            let side = if excluded { &self.hidden } else { &self.tree };
            side.finger_of(&id, home).ok_or(SeqError::Detached)?.index
        };
        {
            let Self { tree, hidden, slots, .. } = &mut *self;
            let side = if excluded { hidden } else { tree };
            let mut hook = relocate_hook(slots);
            side.remove_at_with(index, &mut hook)?;
        }
        match self.free_slot(id) {
            Some(el) => return Ok(el.item),
            None => unreachable!("id was checked live"),
        }
    }

    /// Replace the visible item at `index`. The element is marked sort-
    /// and filter-dirty; the next restore pass re-shapes it.
    pub fn set(&mut self, index: usize, value: T) -> Result<T, SeqError> {
        let id = self.id_at(index).ok_or(SeqError::IndexOutOfRange {
            index,
            len: self.tree.len(),
        })?;
        let old = std::mem::replace(&mut self.element_mut(id)?.item, value);
        self.mark_dirty(id, DirtyKind::Sort)?;
        self.mark_dirty(id, DirtyKind::Filter)?;
        return Ok(old);
    }

    /// Reposition a visible item by hand, as an observable collection
    /// move: the item ends up at exactly `new`.
    pub fn move_item(&mut self, old: usize, new: usize) -> Result<(), SeqError> {
        let Self { tree, slots, .. } = &mut *self;
        let mut hook = relocate_hook(slots);
        return tree.move_item_with(old, new, &mut hook);
    }

    // ------------------------------------------------------------------
    // Dirtiness and restore
    // ------------------------------------------------------------------

    /// Mark an element dirty. Idempotent: an element joins the worklist
    /// once no matter how many marks it accumulates.
    pub fn mark_dirty(&mut self, id: ElemId, kind: DirtyKind) -> Result<(), SeqError> {
        let el = self.element_mut(id)?;
        let enlisted = el.is_dirty();
        match kind {
            DirtyKind::Sort => el.sort_dirty = true,
            DirtyKind::Filter => el.filter_dirty = true,
            DirtyKind::Group => el.group_dirty = true,
        }
        if !enlisted {
            self.worklist.push(id);
        }
        return Ok(());
    }

    /// Restore live order, returning just the moves.
    pub fn drain_and_restore(&mut self) -> Vec<MoveEvent> {
        return self.drain_and_restore_report().moves;
    }

    /// Restore live order: pump cross-thread marks, re-run the filter
    /// over filter-dirty elements, re-place sort-dirty elements one by
    /// one, and hand group-dirty elements back to the owner.
    ///
    /// Each sort-dirty element is re-placed by a rank-space binary
    /// search that skips elements still marked dirty (including the
    /// element itself); since every clean element is in sorted position,
    /// the search is exact. The element's dirty bit drops only after its
    /// search, then the move is performed and reported against the
    /// pre-move arrangement.
    pub fn drain_and_restore_report(&mut self) -> DrainReport {
        self.pump_inbox();
        let mut report = DrainReport::default();
        if self.worklist.is_empty() {
            return report;
        }
        let work: SmallVec<[ElemId; 16]> = std::mem::take(&mut self.worklist);
        tracing::debug!(pending = work.len(), "restoring live order");

        // Filter pass first: membership changes settle before any
        // re-sorting, so the sort pass works on the final population.
        for &id in &work {
            let Ok(el) = self.element(id) else { continue };
            if !el.filter_dirty {
                continue;
            }
            let included = match &self.filter {
                Some(f) => f(&el.item),
                None => true,
            };
            if el.excluded == !included {
                // Verdict unchanged.
                self.clear_filter_bit(id);
                continue;
            }
            if included {
                let at = self.readmit(id);
                report.inserted.push(at);
            } else {
                let at = self.banish(id);
                report.removed.push(at);
            }
        }

        // Sort pass: one exact re-placement per dirty element.
        for &id in &work {
            let Ok(el) = self.element(id) else { continue };
            if !el.sort_dirty {
                continue;
            }
            if el.excluded || self.comparator.is_none() {
                // Hidden or unsorted items have no sort position to
                // restore.
                self.clear_sort_bit(id);
                continue;
            }
            let home = el.home;
            let old = match self.tree.finger_of(&id, home) {
                Some(f) => f.index,
                None => unreachable!("visible element home out of date"),
            };
            let pos = self.search_position(id);
            self.clear_sort_bit(id);
            // `pos` counts the element's own slot when it precedes the
            // target rank; removing first shifts the target down one.
            let new = if pos > old { pos - 1 } else { pos };
            if new != old {
                let Self { tree, slots, .. } = &mut *self;
                let mut hook = relocate_hook(slots);
                let moved = tree.move_item_with(old, new, &mut hook);
                debug_assert!(moved.is_ok());
                report.moves.push(MoveEvent {
                    old_index: old,
                    new_index: new,
                });
            }
        }

        // Group pass: nothing structural, the owner re-buckets.
        for &id in &work {
            if let Ok(el) = self.element_mut(id) {
                if el.group_dirty {
                    el.group_dirty = false;
                    report.regrouped.push(id);
                }
            }
        }

        tracing::debug!(
            moves = report.moves.len(),
            inserted = report.inserted.len(),
            removed = report.removed.len(),
            regrouped = report.regrouped.len(),
            "live order restored"
        );
        return report;
    }

    fn pump_inbox(&mut self) {
        let queued: SmallVec<[(ElemId, DirtyKind); 16]> = {
            let Ok(mut queue) = self.inbox.lock() else { return };
            std::mem::take(&mut *queue)
        };
        for (id, kind) in queued {
            // Marks for since-removed elements are dropped here.
            let _ = self.mark_dirty(id, kind);
        }
    }

    fn clear_sort_bit(&mut self, id: ElemId) {
        if let Ok(el) = self.element_mut(id) {
            el.sort_dirty = false;
        }
    }

    fn clear_filter_bit(&mut self, id: ElemId) {
        if let Ok(el) = self.element_mut(id) {
            el.filter_dirty = false;
        }
    }

    /// Comparator position for `id`'s item among the visible elements,
    /// after equal items, skipping every sort-dirty element. The element
    /// itself is either still marked dirty or not in the visible tree,
    /// so it never brackets its own search.
    fn search_position(&self, id: ElemId) -> usize {
        let Some(cmp) = self.comparator.as_deref() else {
            // Unsorted lists append.
            return self.tree.len();
        };
        let slots = &self.slots;
        let target = item_of(slots, id);
        let probe = |other: &ElemId| {
            let el = match slots[other.idx as usize].entry.as_ref() {
                Some(el) => el,
                None => unreachable!("tree references a freed slot"),
            };
            if el.sort_dirty {
                return None;
            }
            return Some(cmp(target, &el.item));
        };
        return self.tree.bounded_search(&probe, 0, self.tree.len());
    }

    /// Move a newly included element from the hidden tree to its
    /// comparator position in the visible tree. Returns the insertion
    /// index.
    fn readmit(&mut self, id: ElemId) -> usize {
        let home = match self.element(id) {
            Ok(el) => el.home,
            Err(_) => unreachable!("readmit of a dead element"),
        };
        let hidden_index = match self.hidden.finger_of(&id, home) {
            Some(f) => f.index,
            None => unreachable!("hidden element home out of date"),
        };
        {
            let Self { hidden, slots, .. } = &mut *self;
            let mut hook = relocate_hook(slots);
            let removed = hidden.remove_at_with(hidden_index, &mut hook);
            debug_assert!(removed.is_ok());
        }
        let pos = self.search_position(id);
        {
            let Self { tree, slots, .. } = &mut *self;
            let mut hook = relocate_hook(slots);
            let inserted = tree.insert_at_with(pos, id, &mut hook);
            debug_assert!(inserted.is_ok());
        }
        if let Ok(el) = self.element_mut(id) {
            el.excluded = false;
            el.filter_dirty = false;
            // Just placed at its comparator position.
            el.sort_dirty = false;
        }
        return pos;
    }

    /// Move a newly excluded element from the visible tree to the back
    /// of the hidden tree. Returns its old visible index.
    fn banish(&mut self, id: ElemId) -> usize {
        let home = match self.element(id) {
            Ok(el) => el.home,
            Err(_) => unreachable!("banish of a dead element"),
        };
        let old = match self.tree.finger_of(&id, home) {
            Some(f) => f.index,
            None => unreachable!("visible element home out of date"),
        };
        {
            let Self { tree, hidden, slots, .. } = &mut *self;
            let mut hook = relocate_hook(slots);
            let removed = tree.remove_at_with(old, &mut hook);
            debug_assert!(removed.is_ok());
            hidden.push_back_with(id, &mut hook);
        }
        if let Ok(el) = self.element_mut(id) {
            el.excluded = true;
            el.filter_dirty = false;
            // A hidden element keeps no sort position.
            el.sort_dirty = false;
        }
        return old;
    }

    // ------------------------------------------------------------------
    // Shaping configuration
    // ------------------------------------------------------------------

    /// Replace the comparator and re-sort the visible items (stable, so
    /// equal items keep their current relative order). `None` drops the
    /// comparator; items stay where they are.
    pub fn set_comparator<C>(&mut self, comparator: Option<C>)
    where
        C: Fn(&T, &T) -> Ordering + 'static,
    {
        let Some(comparator) = comparator else {
            self.comparator = None;
            return;
        };
        self.comparator = Some(Box::new(comparator));
        let mut ids = self.tree.take_all();
        {
            let slots = &self.slots;
            let cmp = match self.comparator.as_deref() {
                Some(c) => c,
                None => unreachable!("comparator was just set"),
            };
            ids.sort_by(|a, b| cmp(item_of(slots, *a), item_of(slots, *b)));
        }
        let Self { tree, slots, .. } = &mut *self;
        let mut hook = relocate_hook(slots);
        tree.rebuild(ids, &mut hook);
    }

    /// Replace the filter and immediately re-shape every element,
    /// returning the resulting report. Pending dirty marks are drained
    /// in the same pass.
    pub fn set_filter<F>(&mut self, filter: Option<F>) -> DrainReport
    where
        F: Fn(&T) -> bool + 'static,
    {
        self.filter = match filter {
            Some(f) => Some(Box::new(f)),
            None => None,
        };
        let ids: Vec<ElemId> = (0..self.slots.len() as u32)
            .filter_map(|idx| {
                let slot = &self.slots[idx as usize];
                slot.entry.as_ref()?;
                return Some(ElemId { idx, r#gen: slot.r#gen });
            })
            .collect();
        for id in ids {
            let _ = self.mark_dirty(id, DirtyKind::Filter);
        }
        return self.drain_and_restore_report();
    }

    // ------------------------------------------------------------------
    // Verification (test harness aid, not production behavior)
    // ------------------------------------------------------------------

    /// Cross-check every internal invariant: both trees, every home
    /// record, slot/tree membership agreement, and sortedness when no
    /// dirty marks are pending.
    pub fn verify(&self) -> bool {
        type NoCmp = fn(&ElemId, &ElemId) -> Ordering;
        if !self.tree.verify(None::<&NoCmp>) || !self.hidden.verify(None::<&NoCmp>) {
            return false;
        }
        let mut seen: FxHashSet<ElemId> = FxHashSet::default();
        for &id in self.tree.iter() {
            let Ok(el) = self.element(id) else { return false };
            if el.excluded {
                return false;
            }
            if self.tree.finger_of(&id, el.home).is_none() {
                return false;
            }
            if !seen.insert(id) {
                return false;
            }
        }
        for &id in self.hidden.iter() {
            let Ok(el) = self.element(id) else { return false };
            if !el.excluded {
                return false;
            }
            if self.hidden.finger_of(&id, el.home).is_none() {
                return false;
            }
            if !seen.insert(id) {
                return false;
            }
        }
        let live = self.slots.iter().filter(|s| s.entry.is_some()).count();
        if live != seen.len() {
            return false;
        }
        if !self.is_dirty() {
            if let Some(cmp) = self.comparator.as_deref() {
                let slots = &self.slots;
                let by_item =
                    |a: &ElemId, b: &ElemId| cmp(item_of(slots, *a), item_of(slots, *b));
                if !self.tree.verify(Some(&by_item)) {
                    return false;
                }
            }
        }
        return true;
    }
}
