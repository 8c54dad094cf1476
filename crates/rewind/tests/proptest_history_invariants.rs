//! Property tests: arbitrary mutation scripts recorded one transaction
//! per step must walk cleanly back to the initial state and forward to
//! the final state, with the position/queue invariants holding at every
//! step.

use proptest::prelude::*;

use rewind::StateTrackingManager;
use rewind_model::{Model, RecordSnapshot, Store, set};

#[derive(Debug, Clone)]
enum Op {
    /// Append 1..=3 new records.
    Add(u8),
    /// Insert one new record somewhere.
    Insert(u8),
    /// Move an existing root somewhere else.
    Move(u8, u8),
    /// Remove an existing root.
    Remove(u8),
    /// Set a field on an existing root.
    Update(u8, i64),
    /// Clear the store.
    RemoveAll,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u8..=3).prop_map(Op::Add),
        any::<u8>().prop_map(Op::Insert),
        (any::<u8>(), any::<u8>()).prop_map(|(f, t)| Op::Move(f, t)),
        any::<u8>().prop_map(Op::Remove),
        (any::<u8>(), -100i64..100).prop_map(|(i, v)| Op::Update(i, v)),
        Just(Op::RemoveAll),
    ]
}

/// Apply one op to the store. Ops that would touch nothing (e.g. a remove
/// on an empty store) are skipped; the recording machinery then drops the
/// empty transaction.
fn apply(store: &Store, op: &Op) {
    let roots = store.root_ids();
    match op {
        Op::Add(n) => {
            store.add((0..*n).map(|_| Model::new()).collect(), false);
        }
        Op::Insert(at) => {
            let index = if roots.is_empty() {
                0
            } else {
                *at as usize % (roots.len() + 1)
            };
            store.insert(index, vec![Model::new().into()], false).unwrap();
        }
        Op::Move(from, to) => {
            if roots.len() < 2 {
                return;
            }
            let from = *from as usize % roots.len();
            let to = *to as usize % roots.len();
            if from == to {
                return;
            }
            store.insert(to, vec![roots[from].into()], false).unwrap();
        }
        Op::Remove(at) => {
            if roots.is_empty() {
                return;
            }
            let index = *at as usize % roots.len();
            store.remove(&[roots[index]], false);
        }
        Op::Update(at, value) => {
            if roots.is_empty() {
                return;
            }
            let index = *at as usize % roots.len();
            store.update(roots[index], vec![set("v", *value)]).unwrap();
        }
        Op::RemoveAll => {
            store.remove_all(false);
        }
    }
}

fn check_invariants(manager: &StateTrackingManager) {
    let (position, len) = (manager.position(), manager.len());
    assert!(position <= len, "position {} exceeds queue length {}", position, len);
    assert_eq!(manager.can_undo(), position > 0);
    assert_eq!(manager.can_redo(), position < len);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn recorded_scripts_walk_back_and_forth(ops in prop::collection::vec(op_strategy(), 1..24)) {
        let manager = StateTrackingManager::new();
        let store = Store::new();
        store.add(vec![Model::with_fields([("v", 0i64)]), Model::new()], false);
        manager.add_store(&store);

        // snapshots[k] = store contents once k transactions are committed.
        let mut snapshots: Vec<Vec<RecordSnapshot>> = vec![store.contents()];
        for op in &ops {
            manager.start_transaction(None);
            apply(&store, op);
            manager.stop_transaction(None);
            check_invariants(&manager);
            if manager.len() == snapshots.len() {
                snapshots.push(store.contents());
            }
        }
        prop_assert_eq!(manager.len() + 1, snapshots.len());
        prop_assert_eq!(manager.position(), manager.len());

        // Walk back one step at a time, matching every recorded snapshot.
        for k in (0..manager.len()).rev() {
            manager.undo(1);
            check_invariants(&manager);
            prop_assert_eq!(manager.position(), k);
            prop_assert_eq!(&store.contents(), &snapshots[k]);
        }

        // And forward again.
        for k in 0..manager.len() {
            manager.redo(1);
            check_invariants(&manager);
            prop_assert_eq!(manager.position(), k + 1);
            prop_assert_eq!(&store.contents(), &snapshots[k + 1]);
        }

        // A full round trip in bulk is equivalent.
        manager.undo_all();
        prop_assert_eq!(&store.contents(), &snapshots[0]);
        manager.redo_all();
        prop_assert_eq!(&store.contents(), snapshots.last().unwrap());
    }

    #[test]
    fn auto_recorded_bursts_commit_once(values in prop::collection::vec(-50i64..50, 1..8)) {
        use rewind::{Duration, Instant};

        let manager = StateTrackingManager::new();
        let store = Store::new();
        let id = store.add(vec![Model::with_fields([("v", 0i64)])], false)[0];
        manager.add_store(&store);
        manager.set_auto_record(true);

        let before = store.contents();
        let mut distinct = false;
        let mut last = 0i64;
        for value in &values {
            store.update(id, vec![set("v", *value)]).unwrap();
            distinct |= *value != last;
            last = *value;
        }
        if !distinct {
            // Every write was a no-op; nothing to commit.
            prop_assert!(manager.is_ready());
            return Ok(());
        }
        prop_assert!(manager.is_recording());
        prop_assert!(manager.tick_at(Instant::now() + Duration::from_secs(5)));
        prop_assert_eq!(manager.len(), 1);

        manager.undo(1);
        prop_assert_eq!(&store.contents(), &before);
        manager.redo(1);
        prop_assert_eq!(store.field(id, "v").unwrap().as_integer(), Some(last));
    }
}
