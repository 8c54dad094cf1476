#![forbid(unsafe_code)]

//! Reversible actions.
//!
//! An action captures one primitive mutation with enough context to both
//! reverse and re-apply it. Actions replay through the ordinary [`Store`]
//! API; the hooks this fires are ignored while the manager is restoring,
//! and deliberately re-recorded while a stash is being re-applied.
//!
//! # Invariants
//!
//! - `undo()` is the exact inverse of `redo()` against the store state
//!   the transaction machinery presents it with.
//! - Replay never fails: it only re-applies previously successful
//!   mutations. A store that no longer matches recorded history is a
//!   development-time integrity bug, checked with `debug_assert!`.
//!
//! Actions are built by the manager through [`ActionFactories`]; hosts
//! replace individual factory entries to substitute custom action types.

use std::fmt;
use std::mem;

use rewind_model::{ChildMove, FieldPatch, ModelId, ModelResult, Store, StoreEntry, Subtree};

/// A reversible command over an observed store.
pub trait StmAction {
    /// Reverse the captured mutation.
    fn undo(&mut self);

    /// Re-apply the captured mutation.
    fn redo(&mut self);

    /// Short action kind tag for debugging.
    fn kind(&self) -> &'static str {
        "action"
    }
}

impl fmt::Debug for dyn StmAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.kind()).finish()
    }
}

/// Replay results are structurally valid by construction; anything else
/// is a corrupted-history bug.
fn expect_ok<T>(result: ModelResult<T>) -> Option<T> {
    debug_assert!(
        result.is_ok(),
        "history replay applied to an inconsistent store: {:?}",
        result.as_ref().err()
    );
    result.ok()
}

// ============================================================================
// Hook payloads
// ============================================================================

/// Captured context of an `on_model_update` hook.
#[derive(Debug)]
pub struct UpdatePayload {
    pub store: Store,
    pub record: ModelId,
    pub new_values: FieldPatch,
    pub old_values: FieldPatch,
}

/// Captured context of an `on_model_insert_child` hook.
#[derive(Debug)]
pub struct InsertChildPayload {
    pub store: Store,
    pub parent: ModelId,
    pub index: usize,
    pub children: Vec<ModelId>,
    pub moves: Vec<ChildMove>,
}

/// Captured context of an `on_model_remove_child` hook.
#[derive(Debug)]
pub struct RemoveChildPayload {
    pub store: Store,
    pub parent: ModelId,
    pub removed: Vec<Subtree>,
    pub prev_indices: Vec<usize>,
}

/// Captured context of an `on_store_add` hook.
#[derive(Debug)]
pub struct AddPayload {
    pub store: Store,
    pub records: Vec<ModelId>,
    pub silent: bool,
}

/// Captured context of an `on_store_insert` hook.
#[derive(Debug)]
pub struct InsertPayload {
    pub store: Store,
    pub index: usize,
    pub records: Vec<ModelId>,
    pub prev_indices: Vec<Option<usize>>,
    pub silent: bool,
}

/// Captured context of an `on_store_remove` hook.
#[derive(Debug)]
pub struct RemovePayload {
    pub store: Store,
    pub removed: Vec<Subtree>,
    pub prev_indices: Vec<usize>,
    pub silent: bool,
}

/// Captured context of an `on_store_remove_all` hook.
#[derive(Debug)]
pub struct RemoveAllPayload {
    pub store: Store,
    pub removed: Vec<Subtree>,
    pub silent: bool,
}

// ============================================================================
// Built-in actions
// ============================================================================

/// Field update on one record.
pub struct UpdateAction {
    store: Store,
    record: ModelId,
    new_values: FieldPatch,
    old_values: FieldPatch,
}

impl UpdateAction {
    #[must_use]
    pub fn new(payload: UpdatePayload) -> Self {
        Self {
            store: payload.store,
            record: payload.record,
            new_values: payload.new_values,
            old_values: payload.old_values,
        }
    }
}

impl StmAction for UpdateAction {
    fn undo(&mut self) {
        expect_ok(self.store.update(self.record, self.old_values.clone()));
    }

    fn redo(&mut self) {
        expect_ok(self.store.update(self.record, self.new_values.clone()));
    }

    fn kind(&self) -> &'static str {
        "update"
    }
}

/// Children inserted under a parent (new records or moves).
pub struct InsertChildAction {
    store: Store,
    parent: ModelId,
    index: usize,
    children: Vec<ModelId>,
    moves: Vec<ChildMove>,
    /// Sibling that followed the batch right after insertion; redo
    /// re-inserts before it when it is still in place.
    sibling: Option<ModelId>,
    /// Snapshots of newly added children, captured when undo detaches
    /// them, so redo can restore them.
    detached: Vec<Subtree>,
}

impl InsertChildAction {
    #[must_use]
    pub fn new(payload: InsertChildPayload) -> Self {
        let sibling = payload
            .store
            .children_of(payload.parent)
            .get(payload.index + payload.children.len())
            .copied();
        Self {
            store: payload.store,
            parent: payload.parent,
            index: payload.index,
            children: payload.children,
            moves: payload.moves,
            sibling,
            detached: Vec::new(),
        }
    }

    fn take_detached(&mut self, id: ModelId) -> Option<Subtree> {
        let pos = self.detached.iter().position(|s| s.root_id() == id)?;
        Some(self.detached.remove(pos))
    }
}

impl StmAction for InsertChildAction {
    fn undo(&mut self) {
        // Grouping pass: newly added children are simply detached; moved
        // children are bucketed by where they came from.
        let mut same_parent: Vec<(usize, ModelId)> = Vec::new();
        let mut cross: Vec<(ChildMove, ModelId)> = Vec::new();
        for (id, mv) in self.children.iter().zip(self.moves.iter()) {
            match (mv.parent, mv.index) {
                (None, None) => {
                    if let Some(mut subs) =
                        expect_ok(self.store.remove_children(self.parent, &[*id]))
                    {
                        self.detached.append(&mut subs);
                    }
                }
                (Some(p), Some(prev)) if p == self.parent => same_parent.push((prev, *id)),
                _ => cross.push((*mv, *id)),
            }
        }

        // Same-parent reorders split on their undo direction: a child
        // whose previous index lies past its current one moves right.
        let siblings = self.store.children_of(self.parent);
        let mut move_right: Vec<(usize, ModelId)> = Vec::new();
        let mut move_left: Vec<(usize, ModelId)> = Vec::new();
        for (prev, id) in same_parent {
            let current = siblings.iter().position(|c| *c == id);
            if current.is_some_and(|c| prev > c) {
                move_right.push((prev, id));
            } else {
                move_left.push((prev, id));
            }
        }

        move_right.sort_by(|a, b| b.0.cmp(&a.0));
        for (prev, id) in move_right {
            expect_ok(self.store.insert_children(self.parent, prev, vec![id.into()]));
        }

        move_left.sort_by_key(|(prev, _)| *prev);
        for (prev, id) in move_left {
            expect_ok(self.store.insert_children(self.parent, prev, vec![id.into()]));
        }

        cross.sort_by_key(|(mv, _)| mv.index.unwrap_or(0));
        for (mv, id) in cross {
            match (mv.parent, mv.index) {
                (Some(p), Some(prev)) => {
                    expect_ok(self.store.insert_children(p, prev, vec![id.into()]));
                }
                (None, Some(prev)) => {
                    // Came from the root list: detach from the parent,
                    // then restore the root position.
                    if let Some(subs) =
                        expect_ok(self.store.remove_children(self.parent, &[id]))
                    {
                        let entries = subs.into_iter().map(StoreEntry::from).collect();
                        expect_ok(self.store.insert(prev, entries, false));
                    }
                }
                _ => {}
            }
        }
    }

    fn redo(&mut self) {
        // The insertion index counts siblings as they will stand once the
        // moved children are detached, so batch members are skipped when
        // locating the recorded sibling.
        let index = self
            .sibling
            .and_then(|s| {
                self.store
                    .children_of(self.parent)
                    .iter()
                    .filter(|c| !self.children.contains(c))
                    .position(|c| *c == s)
            })
            .unwrap_or_else(|| {
                self.index
                    .min(self.store.children_of(self.parent).len())
            });
        let entries: Vec<StoreEntry> = self
            .children
            .clone()
            .into_iter()
            .map(|id| {
                if self.store.contains(id) {
                    StoreEntry::Existing(id)
                } else if let Some(subtree) = self.take_detached(id) {
                    StoreEntry::Tree(subtree)
                } else {
                    StoreEntry::Existing(id)
                }
            })
            .collect();
        expect_ok(self.store.insert_children(self.parent, index, entries));
    }

    fn kind(&self) -> &'static str {
        "insert-child"
    }
}

/// Children removed from a parent.
pub struct RemoveChildAction {
    store: Store,
    parent: ModelId,
    /// Removed child ids with their previous indices, ascending.
    children: Vec<(usize, ModelId)>,
    subtrees: Vec<Subtree>,
}

impl RemoveChildAction {
    #[must_use]
    pub fn new(payload: RemoveChildPayload) -> Self {
        let children = payload
            .prev_indices
            .iter()
            .zip(payload.removed.iter())
            .map(|(i, s)| (*i, s.root_id()))
            .collect();
        Self {
            store: payload.store,
            parent: payload.parent,
            children,
            subtrees: payload.removed,
        }
    }
}

impl StmAction for RemoveChildAction {
    fn undo(&mut self) {
        let mut subtrees = mem::take(&mut self.subtrees);
        let mut pairs: Vec<(usize, Subtree)> = self
            .children
            .iter()
            .filter_map(|(prev, id)| {
                let pos = subtrees.iter().position(|s| s.root_id() == *id)?;
                Some((*prev, subtrees.remove(pos)))
            })
            .collect();
        pairs.sort_by_key(|(prev, _)| *prev);
        for (prev, subtree) in pairs {
            expect_ok(
                self.store
                    .insert_children(self.parent, prev, vec![subtree.into()]),
            );
        }
    }

    fn redo(&mut self) {
        let ids: Vec<ModelId> = self.children.iter().map(|(_, id)| *id).collect();
        if let Some(removed) = expect_ok(self.store.remove_children(self.parent, &ids)) {
            self.subtrees = removed;
        }
    }

    fn kind(&self) -> &'static str {
        "remove-child"
    }
}

/// Records appended to the root list.
pub struct AddAction {
    store: Store,
    records: Vec<ModelId>,
    silent: bool,
    subtrees: Vec<Subtree>,
}

impl AddAction {
    #[must_use]
    pub fn new(payload: AddPayload) -> Self {
        Self {
            store: payload.store,
            records: payload.records,
            silent: payload.silent,
            subtrees: Vec::new(),
        }
    }
}

impl StmAction for AddAction {
    fn undo(&mut self) {
        self.subtrees = self.store.remove(&self.records, self.silent);
    }

    fn redo(&mut self) {
        self.store
            .add_trees(mem::take(&mut self.subtrees), self.silent);
    }

    fn kind(&self) -> &'static str {
        "add"
    }
}

/// Records inserted into the root list at an index.
pub struct InsertAction {
    store: Store,
    index: usize,
    records: Vec<ModelId>,
    prev_indices: Vec<Option<usize>>,
    silent: bool,
    /// Snapshots of records that were new to the store, captured on undo.
    detached: Vec<Subtree>,
}

impl InsertAction {
    #[must_use]
    pub fn new(payload: InsertPayload) -> Self {
        Self {
            store: payload.store,
            index: payload.index,
            records: payload.records,
            prev_indices: payload.prev_indices,
            silent: payload.silent,
            detached: Vec::new(),
        }
    }
}

impl StmAction for InsertAction {
    fn undo(&mut self) {
        // Detach the whole batch first, then restore moved records at
        // their previous indices in ascending order; records that were
        // new stay out (their snapshots are kept for redo).
        let mut removed = self.store.remove(&self.records, self.silent);
        let mut moved: Vec<(usize, ModelId)> = self
            .records
            .iter()
            .zip(self.prev_indices.iter())
            .filter_map(|(id, prev)| prev.map(|p| (p, *id)))
            .collect();
        moved.sort_by_key(|(prev, _)| *prev);
        for (prev, id) in moved {
            if let Some(pos) = removed.iter().position(|s| s.root_id() == id) {
                let subtree = removed.remove(pos);
                expect_ok(self.store.insert(prev, vec![subtree.into()], self.silent));
            }
        }
        self.detached = removed;
    }

    fn redo(&mut self) {
        let mut detached = mem::take(&mut self.detached);
        let entries: Vec<StoreEntry> = self
            .records
            .clone()
            .into_iter()
            .map(|id| {
                if self.store.contains(id) {
                    StoreEntry::Existing(id)
                } else if let Some(pos) = detached.iter().position(|s| s.root_id() == id) {
                    StoreEntry::Tree(detached.remove(pos))
                } else {
                    StoreEntry::Existing(id)
                }
            })
            .collect();
        expect_ok(self.store.insert(self.index, entries, self.silent));
    }

    fn kind(&self) -> &'static str {
        "insert"
    }
}

/// Root records removed from the store.
pub struct RemoveAction {
    store: Store,
    /// Removed ids with their previous root indices, ascending.
    records: Vec<(usize, ModelId)>,
    silent: bool,
    subtrees: Vec<Subtree>,
}

impl RemoveAction {
    #[must_use]
    pub fn new(payload: RemovePayload) -> Self {
        let records = payload
            .prev_indices
            .iter()
            .zip(payload.removed.iter())
            .map(|(i, s)| (*i, s.root_id()))
            .collect();
        Self {
            store: payload.store,
            records,
            silent: payload.silent,
            subtrees: payload.removed,
        }
    }
}

impl StmAction for RemoveAction {
    fn undo(&mut self) {
        let mut subtrees = mem::take(&mut self.subtrees);
        let mut pairs: Vec<(usize, Subtree)> = self
            .records
            .iter()
            .filter_map(|(prev, id)| {
                let pos = subtrees.iter().position(|s| s.root_id() == *id)?;
                Some((*prev, subtrees.remove(pos)))
            })
            .collect();
        pairs.sort_by_key(|(prev, _)| *prev);
        for (prev, subtree) in pairs {
            expect_ok(self.store.insert(prev, vec![subtree.into()], self.silent));
        }
    }

    fn redo(&mut self) {
        let ids: Vec<ModelId> = self.records.iter().map(|(_, id)| *id).collect();
        self.subtrees = self.store.remove(&ids, self.silent);
    }

    fn kind(&self) -> &'static str {
        "remove"
    }
}

/// The store cleared in one step.
pub struct RemoveAllAction {
    store: Store,
    subtrees: Vec<Subtree>,
    silent: bool,
}

impl RemoveAllAction {
    #[must_use]
    pub fn new(payload: RemoveAllPayload) -> Self {
        Self {
            store: payload.store,
            subtrees: payload.removed,
            silent: payload.silent,
        }
    }
}

impl StmAction for RemoveAllAction {
    fn undo(&mut self) {
        self.store
            .add_trees(mem::take(&mut self.subtrees), self.silent);
    }

    fn redo(&mut self) {
        self.subtrees = self.store.remove_all(self.silent);
    }

    fn kind(&self) -> &'static str {
        "remove-all"
    }
}

// ============================================================================
// Factories
// ============================================================================

/// Constructor for one action kind, replaceable by the host.
pub type ActionFactory<P> = Box<dyn Fn(P) -> Box<dyn StmAction>>;

/// The set of action constructors the manager uses while recording.
///
/// Defaults build the built-in actions; hosts swap individual entries to
/// record custom action types for specific hooks.
pub struct ActionFactories {
    pub update: ActionFactory<UpdatePayload>,
    pub insert_child: ActionFactory<InsertChildPayload>,
    pub remove_child: ActionFactory<RemoveChildPayload>,
    pub add: ActionFactory<AddPayload>,
    pub insert: ActionFactory<InsertPayload>,
    pub remove: ActionFactory<RemovePayload>,
    pub remove_all: ActionFactory<RemoveAllPayload>,
}

impl Default for ActionFactories {
    fn default() -> Self {
        Self {
            update: Box::new(|p| Box::new(UpdateAction::new(p))),
            insert_child: Box::new(|p| Box::new(InsertChildAction::new(p))),
            remove_child: Box::new(|p| Box::new(RemoveChildAction::new(p))),
            add: Box::new(|p| Box::new(AddAction::new(p))),
            insert: Box::new(|p| Box::new(InsertAction::new(p))),
            remove: Box::new(|p| Box::new(RemoveAction::new(p))),
            remove_all: Box::new(|p| Box::new(RemoveAllAction::new(p))),
        }
    }
}

impl fmt::Debug for ActionFactories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionFactories").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewind_model::{Model, set};

    fn flat_store(n: usize) -> (Store, Vec<ModelId>) {
        let store = Store::new();
        let ids = store.add((0..n).map(|_| Model::new()).collect(), false);
        (store, ids)
    }

    #[test]
    fn test_update_action_round_trip() {
        let store = Store::new();
        let id = store.add(vec![Model::with_fields([("x", 1i64)])], false)[0];
        store.update(id, vec![set("x", 2i64)]).unwrap();
        let mut action = UpdateAction::new(UpdatePayload {
            store: store.clone(),
            record: id,
            new_values: vec![set("x", 2i64)],
            old_values: vec![set("x", 1i64)],
        });
        action.undo();
        assert_eq!(store.field(id, "x").unwrap().as_integer(), Some(1));
        action.redo();
        assert_eq!(store.field(id, "x").unwrap().as_integer(), Some(2));
    }

    #[test]
    fn test_add_action_round_trip() {
        let (store, ids) = flat_store(2);
        let before = store.contents();
        let added = store.add(vec![Model::new()], false);
        let mut action = AddAction::new(AddPayload {
            store: store.clone(),
            records: added.clone(),
            silent: false,
        });
        action.undo();
        assert_eq!(store.contents(), before);
        action.redo();
        assert_eq!(store.root_ids(), vec![ids[0], ids[1], added[0]]);
    }

    #[test]
    fn test_insert_action_undo_restores_moved_batch() {
        // [a, b, c, d] -> move c and d to the front -> [c, d, a, b]
        let (store, ids) = flat_store(4);
        let (a, b, c, d) = (ids[0], ids[1], ids[2], ids[3]);
        store
            .insert(0, vec![c.into(), d.into()], false)
            .unwrap();
        assert_eq!(store.root_ids(), vec![c, d, a, b]);
        let mut action = InsertAction::new(InsertPayload {
            store: store.clone(),
            index: 0,
            records: vec![c, d],
            prev_indices: vec![Some(2), Some(3)],
            silent: false,
        });
        action.undo();
        assert_eq!(store.root_ids(), vec![a, b, c, d]);
        action.redo();
        assert_eq!(store.root_ids(), vec![c, d, a, b]);
    }

    #[test]
    fn test_insert_action_undo_removes_new_records() {
        let (store, ids) = flat_store(2);
        let fresh = Model::new();
        let fresh_id = fresh.id();
        store.insert(1, vec![fresh.into()], false).unwrap();
        let mut action = InsertAction::new(InsertPayload {
            store: store.clone(),
            index: 1,
            records: vec![fresh_id],
            prev_indices: vec![None],
            silent: false,
        });
        action.undo();
        assert_eq!(store.root_ids(), ids);
        assert!(!store.contains(fresh_id));
        action.redo();
        assert_eq!(store.root_ids(), vec![ids[0], fresh_id, ids[1]]);
    }

    #[test]
    fn test_remove_action_round_trip() {
        let (store, ids) = flat_store(4);
        let removed = store.remove(&[ids[1], ids[3]], false);
        let mut action = RemoveAction::new(RemovePayload {
            store: store.clone(),
            removed,
            prev_indices: vec![1, 3],
            silent: false,
        });
        action.undo();
        assert_eq!(store.root_ids(), ids);
        action.redo();
        assert_eq!(store.root_ids(), vec![ids[0], ids[2]]);
    }

    #[test]
    fn test_remove_all_action_round_trip() {
        let (store, ids) = flat_store(3);
        let before = store.contents();
        let removed = store.remove_all(false);
        let mut action = RemoveAllAction::new(RemoveAllPayload {
            store: store.clone(),
            removed,
            silent: false,
        });
        action.undo();
        assert_eq!(store.contents(), before);
        assert_eq!(store.root_ids(), ids);
        action.redo();
        assert!(store.is_empty());
    }

    #[test]
    fn test_insert_child_action_new_children() {
        let (store, ids) = flat_store(1);
        let parent = ids[0];
        let kids: Vec<StoreEntry> = (0..3).map(|_| Model::new().into()).collect();
        let kid_ids = store.insert_children(parent, 0, kids).unwrap();
        let mut action = InsertChildAction::new(InsertChildPayload {
            store: store.clone(),
            parent,
            index: 0,
            children: kid_ids.clone(),
            moves: vec![ChildMove::added(); 3],
        });
        action.undo();
        assert!(store.children_of(parent).is_empty());
        assert_eq!(store.record_count(), 1);
        action.redo();
        assert_eq!(store.children_of(parent), kid_ids);
    }

    #[test]
    fn test_insert_child_action_reorder_from_right() {
        // children [a, b, c, d]: move c and d to the front.
        let (store, ids) = flat_store(1);
        let parent = ids[0];
        let kids = store
            .insert_children(parent, 0, (0..4).map(|_| Model::new().into()).collect())
            .unwrap();
        let (a, b, c, d) = (kids[0], kids[1], kids[2], kids[3]);
        store.insert_children(parent, 0, vec![c.into(), d.into()]).unwrap();
        assert_eq!(store.children_of(parent), vec![c, d, a, b]);
        let mut action = InsertChildAction::new(InsertChildPayload {
            store: store.clone(),
            parent,
            index: 0,
            children: vec![c, d],
            moves: vec![
                ChildMove { parent: Some(parent), index: Some(2) },
                ChildMove { parent: Some(parent), index: Some(3) },
            ],
        });
        action.undo();
        assert_eq!(store.children_of(parent), vec![a, b, c, d]);
        action.redo();
        assert_eq!(store.children_of(parent), vec![c, d, a, b]);
    }

    #[test]
    fn test_insert_child_action_reorder_from_left() {
        // children [a, b, c, d]: move a and b to the end.
        let (store, ids) = flat_store(1);
        let parent = ids[0];
        let kids = store
            .insert_children(parent, 0, (0..4).map(|_| Model::new().into()).collect())
            .unwrap();
        let (a, b, c, d) = (kids[0], kids[1], kids[2], kids[3]);
        store.insert_children(parent, 4, vec![a.into(), b.into()]).unwrap();
        assert_eq!(store.children_of(parent), vec![c, d, a, b]);
        let mut action = InsertChildAction::new(InsertChildPayload {
            store: store.clone(),
            parent,
            // Effective index after detaching a and b.
            index: 2,
            children: vec![a, b],
            moves: vec![
                ChildMove { parent: Some(parent), index: Some(0) },
                ChildMove { parent: Some(parent), index: Some(1) },
            ],
        });
        action.undo();
        assert_eq!(store.children_of(parent), vec![a, b, c, d]);
        action.redo();
        assert_eq!(store.children_of(parent), vec![c, d, a, b]);
    }

    #[test]
    fn test_insert_child_action_cross_parent_batch() {
        // Children under p and q move into r in one batch.
        let (store, ids) = flat_store(3);
        let (p, q, r) = (ids[0], ids[1], ids[2]);
        let p_kids = store
            .insert_children(p, 0, (0..2).map(|_| Model::new().into()).collect())
            .unwrap();
        let q_kids = store
            .insert_children(q, 0, (0..2).map(|_| Model::new().into()).collect())
            .unwrap();
        store
            .insert_children(r, 0, vec![p_kids[1].into(), q_kids[0].into()])
            .unwrap();
        let mut action = InsertChildAction::new(InsertChildPayload {
            store: store.clone(),
            parent: r,
            index: 0,
            children: vec![p_kids[1], q_kids[0]],
            moves: vec![
                ChildMove { parent: Some(p), index: Some(1) },
                ChildMove { parent: Some(q), index: Some(0) },
            ],
        });
        action.undo();
        assert_eq!(store.children_of(p), p_kids);
        assert_eq!(store.children_of(q), q_kids);
        assert!(store.children_of(r).is_empty());
        action.redo();
        assert_eq!(store.children_of(r), vec![p_kids[1], q_kids[0]]);
        assert_eq!(store.children_of(p), vec![p_kids[0]]);
        assert_eq!(store.children_of(q), vec![q_kids[1]]);
    }

    #[test]
    fn test_insert_child_action_from_root_list() {
        let (store, ids) = flat_store(3);
        let (p, x, y) = (ids[0], ids[1], ids[2]);
        store.insert_children(p, 0, vec![x.into()]).unwrap();
        let mut action = InsertChildAction::new(InsertChildPayload {
            store: store.clone(),
            parent: p,
            index: 0,
            children: vec![x],
            moves: vec![ChildMove { parent: None, index: Some(1) }],
        });
        action.undo();
        assert_eq!(store.root_ids(), vec![p, x, y]);
        assert!(store.children_of(p).is_empty());
        action.redo();
        assert_eq!(store.root_ids(), vec![p, y]);
        assert_eq!(store.children_of(p), vec![x]);
    }

    #[test]
    fn test_remove_child_action_round_trip() {
        let (store, ids) = flat_store(1);
        let parent = ids[0];
        let kids = store
            .insert_children(parent, 0, (0..3).map(|_| Model::new().into()).collect())
            .unwrap();
        let removed = store
            .remove_children(parent, &[kids[0], kids[2]])
            .unwrap();
        let mut action = RemoveChildAction::new(RemoveChildPayload {
            store: store.clone(),
            parent,
            removed,
            prev_indices: vec![0, 2],
        });
        action.undo();
        assert_eq!(store.children_of(parent), kids);
        action.redo();
        assert_eq!(store.children_of(parent), vec![kids[1]]);
    }
}
