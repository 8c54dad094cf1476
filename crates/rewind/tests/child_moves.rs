//! Batch child-move scenarios: reorders within one parent, moves between
//! parents, and mixed batches, recorded through the manager and walked
//! back and forth. These pin the bucketed re-insert order used when
//! reversing a child insert.

use rewind::StateTrackingManager;
use rewind_model::{Model, ModelId, Store, StoreEntry};

struct Board {
    manager: StateTrackingManager,
    store: Store,
}

impl Board {
    fn new() -> Self {
        let manager = StateTrackingManager::new();
        let store = Store::new();
        manager.add_store(&store);
        Self { manager, store }
    }

    fn column(&self, children: usize) -> (ModelId, Vec<ModelId>) {
        let parent = self.store.add(vec![Model::new()], false)[0];
        let kids = self
            .store
            .insert_children(
                parent,
                0,
                (0..children)
                    .map(|_| Model::new().into())
                    .collect::<Vec<StoreEntry>>(),
            )
            .unwrap();
        (parent, kids)
    }

    fn record(&self, f: impl FnOnce(&Store)) {
        self.manager.start_transaction(None);
        f(&self.store);
        self.manager.stop_transaction(None);
    }
}

#[test]
fn reorder_to_front_round_trip() {
    let board = Board::new();
    let (parent, kids) = board.column(4);
    let (a, b, c, d) = (kids[0], kids[1], kids[2], kids[3]);

    board.record(|store| {
        store
            .insert_children(parent, 0, vec![c.into(), d.into()])
            .unwrap();
    });
    assert_eq!(board.store.children_of(parent), vec![c, d, a, b]);

    board.manager.undo(1);
    assert_eq!(board.store.children_of(parent), vec![a, b, c, d]);

    board.manager.redo(1);
    assert_eq!(board.store.children_of(parent), vec![c, d, a, b]);
}

#[test]
fn reorder_to_back_round_trip() {
    let board = Board::new();
    let (parent, kids) = board.column(4);
    let (a, b, c, d) = (kids[0], kids[1], kids[2], kids[3]);

    board.record(|store| {
        store
            .insert_children(parent, 4, vec![a.into(), b.into()])
            .unwrap();
    });
    assert_eq!(board.store.children_of(parent), vec![c, d, a, b]);

    board.manager.undo(1);
    assert_eq!(board.store.children_of(parent), vec![a, b, c, d]);

    board.manager.redo(1);
    assert_eq!(board.store.children_of(parent), vec![c, d, a, b]);
}

#[test]
fn interleaved_reorder_round_trip() {
    let board = Board::new();
    let (parent, kids) = board.column(5);
    let (a, b, c, d, e) = (kids[0], kids[1], kids[2], kids[3], kids[4]);

    // Move b and d together into the middle.
    board.record(|store| {
        store
            .insert_children(parent, 2, vec![b.into(), d.into()])
            .unwrap();
    });
    assert_eq!(board.store.children_of(parent), vec![a, c, b, d, e]);

    board.manager.undo(1);
    assert_eq!(board.store.children_of(parent), vec![a, b, c, d, e]);

    board.manager.redo(1);
    assert_eq!(board.store.children_of(parent), vec![a, c, b, d, e]);
}

#[test]
fn batch_move_from_two_parents_round_trip() {
    let board = Board::new();
    let (p, p_kids) = board.column(3);
    let (q, q_kids) = board.column(3);
    let (r, r_kids) = board.column(1);

    // One gesture gathers cards from two other columns into r.
    board.record(|store| {
        store
            .insert_children(
                r,
                0,
                vec![p_kids[2].into(), q_kids[0].into(), q_kids[2].into()],
            )
            .unwrap();
    });
    assert_eq!(
        board.store.children_of(r),
        vec![p_kids[2], q_kids[0], q_kids[2], r_kids[0]]
    );
    assert_eq!(board.store.children_of(p), vec![p_kids[0], p_kids[1]]);
    assert_eq!(board.store.children_of(q), vec![q_kids[1]]);

    board.manager.undo(1);
    assert_eq!(board.store.children_of(p), p_kids);
    assert_eq!(board.store.children_of(q), q_kids);
    assert_eq!(board.store.children_of(r), r_kids);

    board.manager.redo(1);
    assert_eq!(
        board.store.children_of(r),
        vec![p_kids[2], q_kids[0], q_kids[2], r_kids[0]]
    );
    assert_eq!(board.store.children_of(p), vec![p_kids[0], p_kids[1]]);
    assert_eq!(board.store.children_of(q), vec![q_kids[1]]);
}

#[test]
fn mixed_batch_new_and_cross_parent() {
    let board = Board::new();
    let (p, p_kids) = board.column(2);
    let (q, q_kids) = board.column(2);
    let fresh = Model::new();
    let fresh_id = fresh.id();

    // One insert mixes a brand-new child with a move from p into q.
    board.record(|store| {
        store
            .insert_children(q, 0, vec![fresh.into(), p_kids[0].into()])
            .unwrap();
    });
    assert_eq!(
        board.store.children_of(q),
        vec![fresh_id, p_kids[0], q_kids[0], q_kids[1]]
    );
    assert_eq!(board.store.children_of(p), vec![p_kids[1]]);

    board.manager.undo(1);
    assert_eq!(board.store.children_of(q), q_kids);
    assert_eq!(board.store.children_of(p), p_kids);
    assert!(!board.store.contains(fresh_id));

    board.manager.redo(1);
    assert_eq!(
        board.store.children_of(q),
        vec![fresh_id, p_kids[0], q_kids[0], q_kids[1]]
    );
    assert_eq!(board.store.children_of(p), vec![p_kids[1]]);
}

#[test]
fn move_between_root_list_and_parent_round_trip() {
    let board = Board::new();
    let (p, p_kids) = board.column(1);
    let card = board.store.add(vec![Model::new()], false)[0];
    let roots_before = board.store.root_ids();

    board.record(|store| {
        store.insert_children(p, 1, vec![card.into()]).unwrap();
    });
    assert_eq!(board.store.children_of(p), vec![p_kids[0], card]);
    assert_eq!(board.store.root_ids(), vec![p]);

    board.manager.undo(1);
    assert_eq!(board.store.root_ids(), roots_before);
    assert!(board.store.children_of(p).len() == 1);

    board.manager.redo(1);
    assert_eq!(board.store.children_of(p), vec![p_kids[0], card]);
}

#[test]
fn repeated_undo_redo_cycles_stay_stable() {
    let board = Board::new();
    let (p, _) = board.column(3);
    let (q, q_kids) = board.column(2);

    board.record(|store| {
        store
            .insert_children(p, 0, vec![q_kids[0].into(), q_kids[1].into()])
            .unwrap();
    });
    let moved = board.store.contents();

    for _ in 0..3 {
        board.manager.undo(1);
        board.manager.redo(1);
    }
    assert_eq!(board.store.contents(), moved);
    assert!(board.store.children_of(q).is_empty());
}
