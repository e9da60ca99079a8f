//! Fuzzing-style model test for the block tree.
//!
//! A `BlockTree<i32>` is driven through random edit scripts alongside a
//! plain `Vec<i32>` reference model. After every operation the tree must
//! match the model element-for-element and pass the full structural
//! `verify` (red-black balance, left-leaning links, left_size, parent
//! pointers, block occupancy).
//!
//! Scripts are biased long enough to force repeated block splits and
//! merges: with 64-item blocks anything past a few hundred operations
//! exercises multi-level rebalancing.

use std::cmp::Ordering;

use proptest::prelude::*;
use proptest::test_runner::Config;

use liveseq::BlockTree;

// =============================================================================
// Edit Scripts
// =============================================================================

/// One scripted edit. Positions are fractions of the current length so
/// scripts stay valid regardless of how earlier edits changed the size.
#[derive(Clone, Debug)]
enum Edit {
    Insert(f64, i32),
    Remove(f64),
    Move(f64, f64),
    Set(f64, i32),
}

fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        4 => (0.0..=1.0f64, any::<i32>()).prop_map(|(p, v)| Edit::Insert(p, v)),
        2 => (0.0..=1.0f64).prop_map(Edit::Remove),
        2 => (0.0..=1.0f64, 0.0..=1.0f64).prop_map(|(a, b)| Edit::Move(a, b)),
        1 => (0.0..=1.0f64, any::<i32>()).prop_map(|(p, v)| Edit::Set(p, v)),
    ]
}

fn slot(ratio: f64, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    return ((len as f64) * ratio) as usize % len;
}

fn tree_contents(tree: &BlockTree<i32>) -> Vec<i32> {
    return tree.iter().copied().collect();
}

fn no_cmp() -> Option<&'static fn(&i32, &i32) -> Ordering> {
    return None;
}

// =============================================================================
// Proptest Tests
// =============================================================================

proptest! {
    #![proptest_config(Config {
        cases: 64,
        max_shrink_iters: 2000,
        ..Config::default()
    })]

    /// Random edit script against a Vec model, verifying after each step.
    #[test]
    fn fuzz_tree_matches_vec_model(edits in prop::collection::vec(edit(), 1..600)) {
        let mut tree: BlockTree<i32> = BlockTree::new();
        let mut model: Vec<i32> = Vec::new();

        for e in edits {
            match e {
                Edit::Insert(p, v) => {
                    let at = slot(p, model.len() + 1);
                    tree.insert_at(at, v).unwrap();
                    model.insert(at, v);
                }
                Edit::Remove(p) => {
                    if model.is_empty() {
                        continue;
                    }
                    let at = slot(p, model.len());
                    let got = tree.remove_at(at).unwrap();
                    let want = model.remove(at);
                    prop_assert_eq!(got, want);
                }
                Edit::Move(a, b) => {
                    if model.is_empty() {
                        continue;
                    }
                    let from = slot(a, model.len());
                    let to = slot(b, model.len());
                    tree.move_item(from, to).unwrap();
                    let v = model.remove(from);
                    model.insert(to, v);
                }
                Edit::Set(p, v) => {
                    if model.is_empty() {
                        continue;
                    }
                    let at = slot(p, model.len());
                    let f = tree.find_index(at, true);
                    tree.set_item(&f, v).unwrap();
                    model[at] = v;
                }
            }
            prop_assert!(tree.verify(no_cmp()));
            prop_assert_eq!(tree.len(), model.len());
        }
        prop_assert_eq!(tree_contents(&tree), model);
    }

    /// Comparator insertion keeps the tree sorted, with ties after their
    /// earlier equals, and `find` locates the leftmost equal.
    #[test]
    fn fuzz_sorted_insertion(values in prop::collection::vec(-50i32..=50, 1..500)) {
        let cmp = |a: &i32, b: &i32| a.cmp(b);
        let mut tree: BlockTree<i32> = BlockTree::new();
        let mut model: Vec<i32> = Vec::new();

        for v in &values {
            let at = tree.find_upper(&|item: &i32| v.cmp(item));
            tree.insert_at(at, *v).unwrap();
            model.push(*v);
        }
        model.sort();

        prop_assert!(tree.verify(Some(&cmp)));
        prop_assert_eq!(tree_contents(&tree), model.clone());

        for v in values {
            let f = tree.find(&v, &cmp);
            prop_assert!(f.found);
            // Leftmost equal: nothing equal sits to its left.
            prop_assert_eq!(f.index, model.partition_point(|x| *x < v));
        }
    }

    /// `bounded_search` with declined ranks: the answer must be
    /// order-consistent with every answering item in the window.
    #[test]
    fn fuzz_bounded_search_consistency(
        values in prop::collection::vec(-100i32..=100, 1..300),
        dirty_mask in prop::collection::vec(any::<bool>(), 300),
        target in -100i32..=100,
    ) {
        let mut sorted = values.clone();
        sorted.sort();
        let mut tree: BlockTree<i32> = BlockTree::new();
        for (i, v) in sorted.iter().enumerate() {
            tree.insert_at(i, *v).unwrap();
        }

        let dirty = |rank: usize| dirty_mask[rank % dirty_mask.len()];
        let probe = |item: &i32| {
            // Duplicates make an exact rank ambiguous, so decline
            // whenever any rank holding this value is dirty.
            let lo = sorted.partition_point(|x| x < item);
            let hi = sorted.partition_point(|x| x <= item);
            if (lo..hi).any(dirty) {
                return None;
            }
            return Some(target.cmp(item));
        };

        let pos = tree.bounded_search(&probe, 0, sorted.len());
        prop_assert!(pos <= sorted.len());
        for (rank, v) in sorted.iter().enumerate() {
            let lo = sorted.partition_point(|x| x < v);
            let hi = sorted.partition_point(|x| x <= v);
            if (lo..hi).any(dirty) {
                continue;
            }
            if rank < pos {
                // Everything answering before the slot is <= target.
                prop_assert!(*v <= target);
            } else {
                prop_assert!(*v > target);
            }
        }
    }

    /// Fingers walked forward from zero enumerate exactly the sequence.
    #[test]
    fn fuzz_finger_walk(values in prop::collection::vec(any::<i32>(), 1..400)) {
        let mut tree: BlockTree<i32> = BlockTree::new();
        for (i, v) in values.iter().enumerate() {
            tree.insert_at(i, *v).unwrap();
        }
        let mut f = tree.find_index(0, true);
        for (i, v) in values.iter().enumerate() {
            prop_assert!(f.is_valid());
            prop_assert_eq!(f.index, i);
            prop_assert_eq!(tree.item(&f).unwrap(), v);
            f = tree.next_finger(f);
        }
        prop_assert!(!f.is_valid());
    }
}
