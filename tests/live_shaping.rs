//! End-to-end tests for the live sequence: sorting, filtering, dirty
//! marking, and incremental restore working together, plus a fuzzing
//! pass that checks the reported move events actually let an observer
//! mirror the sequence.

use proptest::prelude::*;
use proptest::test_runner::Config;

use liveseq::{DirtyKind, LiveList, MoveEvent};

// =============================================================================
// Helpers
// =============================================================================

fn contents(list: &LiveList<i32>) -> Vec<i32> {
    return list.iter().copied().collect();
}

fn ascending() -> LiveList<i32> {
    return LiveList::new(|a: &i32, b: &i32| a.cmp(b));
}

/// Replay move events against a mirror the way an observer would.
fn apply_moves(mirror: &mut Vec<i32>, moves: &[MoveEvent]) {
    for m in moves {
        let v = mirror.remove(m.old_index);
        mirror.insert(m.new_index, v);
    }
}

// =============================================================================
// Scenario Tests
// =============================================================================

#[test]
fn one_mutation_one_move() {
    let mut list = ascending();
    for x in [5, 3, 8, 1, 9] {
        list.add(x);
    }
    assert_eq!(contents(&list), vec![1, 3, 5, 8, 9]);

    let id = list.id_at(2).unwrap();
    *list.item_mut(id).unwrap() = 0;
    list.mark_dirty(id, DirtyKind::Sort).unwrap();

    let moves = list.drain_and_restore();
    assert_eq!(
        moves,
        vec![MoveEvent {
            old_index: 2,
            new_index: 0
        }]
    );
    assert_eq!(contents(&list), vec![0, 1, 3, 8, 9]);
    assert!(list.verify());
}

#[test]
fn filter_sort_and_group_in_one_pass() {
    let mut list = ascending();
    list.set_filter(Some(|x: &i32| *x < 100));
    let ids: Vec<_> = [10, 20, 30, 40, 50].iter().map(|&x| list.add(x)).collect();
    assert_eq!(contents(&list), vec![10, 20, 30, 40, 50]);

    // One element leaves, one re-sorts, one regroups.
    *list.item_mut(ids[1]).unwrap() = 200;
    list.mark_dirty(ids[1], DirtyKind::Filter).unwrap();
    *list.item_mut(ids[4]).unwrap() = 15;
    list.mark_dirty(ids[4], DirtyKind::Sort).unwrap();
    list.mark_dirty(ids[2], DirtyKind::Group).unwrap();

    let report = list.drain_and_restore_report();
    assert_eq!(report.removed, vec![1]);
    assert_eq!(
        report.moves,
        vec![MoveEvent {
            old_index: 3,
            new_index: 1
        }]
    );
    assert_eq!(report.regrouped, vec![ids[2]]);
    assert!(report.inserted.is_empty());
    assert_eq!(contents(&list), vec![10, 15, 30, 40]);
    assert_eq!(list.hidden_len(), 1);
    assert!(list.verify());

    // The excluded element comes back once its value passes again.
    *list.item_mut(ids[1]).unwrap() = 25;
    list.mark_dirty(ids[1], DirtyKind::Filter).unwrap();
    let report = list.drain_and_restore_report();
    assert_eq!(report.inserted, vec![2]);
    assert_eq!(contents(&list), vec![10, 15, 25, 30, 40]);
    assert!(list.verify());
}

#[test]
fn sustained_churn_stays_consistent() {
    let mut list = ascending();
    let mut ids = Vec::new();
    // Interleave adds and removals across many blocks.
    for i in 0..1000i32 {
        ids.push(list.add((i * 37) % 500));
        if i % 3 == 2 {
            let victim = ids.swap_remove((i as usize * 7) % ids.len());
            list.remove_id(victim).unwrap();
        }
    }
    assert!(list.verify());

    // Mutate a spread of survivors and restore in one pass.
    for (k, &id) in ids.iter().enumerate() {
        if k % 5 == 0 {
            *list.item_mut(id).unwrap() = ((k as i32) * 13) % 500 - 250;
            list.mark_dirty(id, DirtyKind::Sort).unwrap();
        }
    }
    list.drain_and_restore();
    assert!(list.verify());

    let got = contents(&list);
    let mut want = got.clone();
    want.sort();
    assert_eq!(got, want);
}

#[test]
fn notifier_feeds_restores_across_threads() {
    let mut list = ascending();
    let ids: Vec<_> = (0..100).map(|i| list.add(i)).collect();
    let notifier = list.notifier();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let notifier = notifier.clone();
            let marked: Vec<_> = ids.iter().copied().skip(t).step_by(4).collect();
            return std::thread::spawn(move || {
                for id in marked {
                    assert!(notifier.mark(id, DirtyKind::Sort));
                }
            });
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    // No values changed, so the order settles back to where it started.
    // Which moves get reported depends on mark arrival order, but a
    // mirror replaying them must land on the same (unchanged) sequence.
    assert!(list.is_dirty());
    let mut mirror = contents(&list);
    let moves = list.drain_and_restore();
    apply_moves(&mut mirror, &moves);
    assert_eq!(contents(&list), (0..100).collect::<Vec<_>>());
    assert_eq!(mirror, contents(&list));
    assert!(!list.is_dirty());
    assert!(list.verify());
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

    /// Mutate a random subset of a random list, drain, and require that
    /// (a) the result is sorted, (b) replaying the reported moves on a
    /// pre-drain mirror reproduces the result exactly.
    #[test]
    fn fuzz_moves_mirror_the_restore(
        initial in prop::collection::vec(-1000i32..=1000, 1..300),
        updates in prop::collection::vec((0usize..300, -1000i32..=1000), 0..40),
    ) {
        let mut list = ascending();
        let mut ids = Vec::new();
        for &x in &initial {
            ids.push(list.add(x));
        }

        for (slot, value) in updates {
            let id = ids[slot % ids.len()];
            *list.item_mut(id).unwrap() = value;
            list.mark_dirty(id, DirtyKind::Sort).unwrap();
        }

        let mut mirror = contents(&list);
        let moves = list.drain_and_restore();
        apply_moves(&mut mirror, &moves);

        let got = contents(&list);
        let mut want = got.clone();
        want.sort();
        prop_assert_eq!(&got, &want);
        prop_assert_eq!(&got, &mirror);
        prop_assert!(list.verify());
    }

    /// Filter flips plus sort marks: membership and order both settle,
    /// and the multiset of items is preserved across the whole run.
    #[test]
    fn fuzz_filter_churn_preserves_items(
        initial in prop::collection::vec(-100i32..=100, 1..200),
        flips in prop::collection::vec((0usize..200, -100i32..=100), 0..30),
        threshold in -50i32..=50,
    ) {
        let mut list = ascending();
        let mut ids = Vec::new();
        for &x in &initial {
            ids.push(list.add(x));
        }
        list.set_filter(Some(move |x: &i32| *x <= threshold));
        prop_assert!(list.verify());

        let mut expected: Vec<i32> = initial.clone();
        for (slot, value) in flips {
            let at = slot % ids.len();
            let id = ids[at];
            *list.item_mut(id).unwrap() = value;
            expected[at] = value;
            list.mark_dirty(id, DirtyKind::Sort).unwrap();
            list.mark_dirty(id, DirtyKind::Filter).unwrap();
        }
        list.drain_and_restore();
        prop_assert!(list.verify());

        let mut visible: Vec<i32> = expected
            .iter()
            .copied()
            .filter(|x| *x <= threshold)
            .collect();
        visible.sort();
        prop_assert_eq!(contents(&list), visible);
        prop_assert_eq!(list.total_len(), expected.len());
    }
}
