#![forbid(unsafe_code)]

//! Observable record store.
//!
//! A [`Store`] owns a collection of [`Model`] records: an ordered root
//! list (the flat collection) in which any record may additionally carry
//! an ordered child list (the tree). All mutations go through the store so
//! the attached manager sees each change via [`MutationHooks`].
//!
//! # Hook ordering
//!
//! Every mutation updates the store's own state first, releases the
//! interior borrow, and only then fires the matching hook. A hook handler
//! may therefore re-enter the store (the manager does exactly that when
//! replaying history while the machine is restoring).
//!
//! # Sharing
//!
//! `Store` is a cheap clone handle over shared interior state. The
//! subsystem is single-threaded by design; handles must stay on one
//! thread.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use tracing::trace;

use crate::error::{ModelError, ModelResult};
use crate::field::{FieldPatch, FieldValue};
use crate::observe::{ChildMove, MutationHooks, StoreObserver};
use crate::record::{Model, ModelId, Subtree};

/// One entry in an insert batch: a brand-new record, a previously detached
/// subtree being restored, or an existing record being moved.
#[derive(Debug)]
pub enum StoreEntry {
    New(Model),
    Tree(Subtree),
    Existing(ModelId),
}

impl From<Model> for StoreEntry {
    fn from(model: Model) -> Self {
        StoreEntry::New(model)
    }
}

impl From<Subtree> for StoreEntry {
    fn from(subtree: Subtree) -> Self {
        StoreEntry::Tree(subtree)
    }
}

impl From<ModelId> for StoreEntry {
    fn from(id: ModelId) -> Self {
        StoreEntry::Existing(id)
    }
}

/// Deep snapshot of one record and its descendants, for state comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSnapshot {
    pub id: ModelId,
    /// Fields sorted by key so snapshots compare deterministically.
    pub fields: Vec<(String, FieldValue)>,
    pub children: Vec<RecordSnapshot>,
}

struct StoreInner {
    roots: Vec<ModelId>,
    records: AHashMap<ModelId, Model>,
    hooks: Option<Weak<dyn MutationHooks>>,
    observer: Option<Rc<dyn StoreObserver>>,
}

/// An observable collection of records.
#[derive(Clone)]
pub struct Store {
    inner: Rc<RefCell<StoreInner>>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Store")
            .field("roots", &inner.roots.len())
            .field("records", &inner.records.len())
            .field("attached", &inner.hooks.is_some())
            .finish()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(StoreInner {
                roots: Vec::new(),
                records: AHashMap::new(),
                hooks: None,
                observer: None,
            })),
        }
    }

    /// Whether two handles point at the same store.
    #[must_use]
    pub fn ptr_eq(&self, other: &Store) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ========================================================================
    // Attachment
    // ========================================================================

    /// Point this store at a manager. Called by the manager on attach; at
    /// most one manager may own a store at a time.
    pub fn bind(&self, hooks: Weak<dyn MutationHooks>) {
        self.inner.borrow_mut().hooks = Some(hooks);
    }

    /// Drop the manager back-reference. Called by the manager on detach.
    pub fn unbind(&self) {
        self.inner.borrow_mut().hooks = None;
    }

    /// Whether a manager is currently attached.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.inner
            .borrow()
            .hooks
            .as_ref()
            .is_some_and(|w| w.strong_count() > 0)
    }

    /// Register the collection-side lifecycle observer.
    pub fn set_observer(&self, observer: Rc<dyn StoreObserver>) {
        self.inner.borrow_mut().observer = Some(observer);
    }

    /// Remove the lifecycle observer.
    pub fn clear_observer(&self) {
        self.inner.borrow_mut().observer = None;
    }

    /// Invoke `f` on the registered observer, if any. The interior borrow
    /// is released before the call.
    pub fn notify_observer(&self, f: impl FnOnce(&dyn StoreObserver)) {
        let observer = self.inner.borrow().observer.clone();
        if let Some(observer) = observer {
            f(observer.as_ref());
        }
    }

    fn hooks(&self) -> Option<Rc<dyn MutationHooks>> {
        let inner = self.inner.borrow();
        inner.hooks.as_ref().and_then(Weak::upgrade)
    }

    // ========================================================================
    // Read API
    // ========================================================================

    /// Number of root records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().roots.len()
    }

    /// Whether the store has no root records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().roots.is_empty()
    }

    /// Total number of records, including tree descendants.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.inner.borrow().records.len()
    }

    /// The root ids, in order.
    #[must_use]
    pub fn root_ids(&self) -> Vec<ModelId> {
        self.inner.borrow().roots.clone()
    }

    /// The root index of a record, if it is a root.
    #[must_use]
    pub fn index_of(&self, id: ModelId) -> Option<usize> {
        self.inner.borrow().roots.iter().position(|r| *r == id)
    }

    /// Whether the record is in this store (root or descendant).
    #[must_use]
    pub fn contains(&self, id: ModelId) -> bool {
        self.inner.borrow().records.contains_key(&id)
    }

    /// Clone a record out of the store.
    #[must_use]
    pub fn get(&self, id: ModelId) -> Option<Model> {
        self.inner.borrow().records.get(&id).cloned()
    }

    /// The ordered child ids of a record.
    #[must_use]
    pub fn children_of(&self, id: ModelId) -> Vec<ModelId> {
        self.inner
            .borrow()
            .records
            .get(&id)
            .map(|m| m.children().to_vec())
            .unwrap_or_default()
    }

    /// The parent of a record, if it has one.
    #[must_use]
    pub fn parent_of(&self, id: ModelId) -> Option<ModelId> {
        self.inner.borrow().records.get(&id).and_then(Model::parent)
    }

    /// Clone one field value off a record.
    #[must_use]
    pub fn field(&self, id: ModelId, key: &str) -> Option<FieldValue> {
        self.inner
            .borrow()
            .records
            .get(&id)
            .and_then(|m| m.field(key).cloned())
    }

    /// Deep snapshot of the whole store, in root order.
    #[must_use]
    pub fn contents(&self) -> Vec<RecordSnapshot> {
        let inner = self.inner.borrow();
        inner.roots.iter().map(|id| inner.snapshot(*id)).collect()
    }

    // ========================================================================
    // Flat mutations
    // ========================================================================

    /// Append new records to the root list.
    pub fn add(&self, records: Vec<Model>, silent: bool) -> Vec<ModelId> {
        let ids = {
            let mut inner = self.inner.borrow_mut();
            let mut ids = Vec::with_capacity(records.len());
            for model in records {
                let id = model.id();
                debug_assert!(
                    !inner.records.contains_key(&id),
                    "record added twice to the same store"
                );
                if inner.records.contains_key(&id) {
                    continue;
                }
                inner.roots.push(id);
                inner.records.insert(id, model);
                ids.push(id);
            }
            ids
        };
        if ids.is_empty() {
            return ids;
        }
        trace!(target: "rewind::model", count = ids.len(), silent, "store add");
        if let Some(hooks) = self.hooks() {
            hooks.on_store_add(self, ids.clone(), silent);
        }
        ids
    }

    /// Re-add previously detached subtrees at the end of the root list.
    /// Equivalent to [`insert`](Store::insert) at `len`.
    pub fn add_trees(&self, subtrees: Vec<Subtree>, silent: bool) -> Vec<ModelId> {
        let index = self.len();
        let entries = subtrees.into_iter().map(StoreEntry::from).collect();
        // Index is in range, entries are fresh: cannot fail.
        self.insert(index, entries, silent)
            .unwrap_or_default()
    }

    /// Insert records into the root list at `index`.
    ///
    /// `Existing` entries must name current roots; they are detached first
    /// and the batch is then inserted at `index` interpreted against the
    /// post-detach list (clamped to the valid range). Previous root
    /// indices for moved records are captured against the pre-detach list.
    pub fn insert(
        &self,
        index: usize,
        entries: Vec<StoreEntry>,
        silent: bool,
    ) -> ModelResult<Vec<ModelId>> {
        let (ids, prev_indices, index) = {
            let mut inner = self.inner.borrow_mut();

            // Validate before mutating anything.
            for entry in &entries {
                if let StoreEntry::Existing(id) = entry {
                    if !inner.records.contains_key(id) {
                        return Err(ModelError::UnknownRecord(*id));
                    }
                    if !inner.roots.contains(id) {
                        return Err(ModelError::NotARoot(*id));
                    }
                }
            }

            // Previous indices against the untouched root list.
            let prev_indices: Vec<Option<usize>> = entries
                .iter()
                .map(|entry| match entry {
                    StoreEntry::Existing(id) => inner.roots.iter().position(|r| r == id),
                    _ => None,
                })
                .collect();

            for entry in &entries {
                if let StoreEntry::Existing(id) = entry {
                    inner.detach_root(*id);
                }
            }

            let index = index.min(inner.roots.len());
            let mut ids = Vec::with_capacity(entries.len());
            for (offset, entry) in entries.into_iter().enumerate() {
                let id = match entry {
                    StoreEntry::New(model) => {
                        let id = model.id();
                        inner.records.insert(id, model);
                        id
                    }
                    StoreEntry::Tree(subtree) => {
                        let id = subtree.root_id();
                        inner.attach_subtree(subtree);
                        id
                    }
                    StoreEntry::Existing(id) => id,
                };
                if let Some(model) = inner.records.get_mut(&id) {
                    model.set_parent(None);
                }
                inner.roots.insert(index + offset, id);
                ids.push(id);
            }
            (ids, prev_indices, index)
        };
        if ids.is_empty() {
            return Ok(ids);
        }
        trace!(target: "rewind::model", index, count = ids.len(), silent, "store insert");
        if let Some(hooks) = self.hooks() {
            hooks.on_store_insert(self, index, ids.clone(), prev_indices, silent);
        }
        Ok(ids)
    }

    /// Remove root records (with their subtrees). Ids that are not current
    /// roots are ignored. Returns the detached snapshots in ascending
    /// previous-index order.
    pub fn remove(&self, ids: &[ModelId], silent: bool) -> Vec<Subtree> {
        let (removed, prev_indices) = {
            let mut inner = self.inner.borrow_mut();
            // Original positions before any of the batch is detached.
            let mut targets: Vec<(usize, ModelId)> = ids
                .iter()
                .filter_map(|id| {
                    inner.roots.iter().position(|r| r == id).map(|i| (i, *id))
                })
                .collect();
            targets.sort_by_key(|(i, _)| *i);
            targets.dedup_by_key(|(i, _)| *i);

            // Detach right-to-left so earlier indices stay valid.
            let mut removed = Vec::with_capacity(targets.len());
            for (_, id) in targets.iter().rev() {
                inner.detach_root(*id);
                removed.push(inner.take_subtree(*id));
            }
            removed.reverse();
            let prev_indices: Vec<usize> = targets.iter().map(|(i, _)| *i).collect();
            (removed, prev_indices)
        };
        if removed.is_empty() {
            return removed;
        }
        trace!(target: "rewind::model", count = removed.len(), silent, "store remove");
        if let Some(hooks) = self.hooks() {
            hooks.on_store_remove(self, removed.clone(), prev_indices, silent);
        }
        removed
    }

    /// Clear the store, returning the full prior contents in root order.
    pub fn remove_all(&self, silent: bool) -> Vec<Subtree> {
        let removed = {
            let mut inner = self.inner.borrow_mut();
            let roots = std::mem::take(&mut inner.roots);
            roots
                .into_iter()
                .map(|id| inner.take_subtree(id))
                .collect::<Vec<_>>()
        };
        if removed.is_empty() {
            return removed;
        }
        trace!(target: "rewind::model", count = removed.len(), silent, "store remove all");
        if let Some(hooks) = self.hooks() {
            hooks.on_store_remove_all(self, removed.clone(), silent);
        }
        removed
    }

    /// Apply a field patch to one record (root or descendant). Entries
    /// whose new value equals the current value are dropped; if nothing
    /// actually changes, no hook fires.
    pub fn update(&self, id: ModelId, patch: FieldPatch) -> ModelResult<()> {
        let (new_changed, old) = {
            let mut inner = self.inner.borrow_mut();
            let Some(model) = inner.records.get_mut(&id) else {
                return Err(ModelError::UnknownRecord(id));
            };
            let old = model.apply_patch(&patch);
            if old.is_empty() {
                return Ok(());
            }
            let new_changed: FieldPatch = old
                .iter()
                .map(|(key, _)| (key.clone(), model.field(key).cloned()))
                .collect();
            (new_changed, old)
        };
        trace!(target: "rewind::model", record = id.raw(), fields = old.len(), "model update");
        if let Some(hooks) = self.hooks() {
            hooks.on_model_update(self, id, new_changed, old);
        }
        Ok(())
    }

    // ========================================================================
    // Tree mutations
    // ========================================================================

    /// Insert children under `parent` at `index`.
    ///
    /// `Existing` entries are moves: the record is detached from its
    /// current location (another parent, the same parent, or the root
    /// list) with its previous position captured as [`ChildMove`] context.
    /// `index` is interpreted against the post-detach child list and
    /// clamped.
    pub fn insert_children(
        &self,
        parent: ModelId,
        index: usize,
        entries: Vec<StoreEntry>,
    ) -> ModelResult<Vec<ModelId>> {
        let (ids, moves, index) = {
            let mut inner = self.inner.borrow_mut();
            if !inner.records.contains_key(&parent) {
                return Err(ModelError::UnknownRecord(parent));
            }
            for entry in &entries {
                if let StoreEntry::Existing(id) = entry {
                    if !inner.records.contains_key(id) {
                        return Err(ModelError::UnknownRecord(*id));
                    }
                    if *id == parent || inner.is_ancestor(*id, parent) {
                        return Err(ModelError::WouldCycle {
                            child: *id,
                            parent,
                        });
                    }
                }
            }

            // Previous positions against the untouched structure.
            let moves: Vec<ChildMove> = entries
                .iter()
                .map(|entry| match entry {
                    StoreEntry::Existing(id) => {
                        match inner.records.get(id).and_then(Model::parent) {
                            Some(p) => ChildMove {
                                parent: Some(p),
                                index: inner
                                    .records
                                    .get(&p)
                                    .and_then(|m| m.children().iter().position(|c| c == id)),
                            },
                            None => ChildMove {
                                parent: None,
                                index: inner.roots.iter().position(|r| r == id),
                            },
                        }
                    }
                    _ => ChildMove::added(),
                })
                .collect();

            for entry in &entries {
                if let StoreEntry::Existing(id) = entry {
                    inner.detach_record(*id);
                }
            }

            let child_len = inner
                .records
                .get(&parent)
                .map(|m| m.children().len())
                .unwrap_or(0);
            let index = index.min(child_len);

            let mut ids = Vec::with_capacity(entries.len());
            for (offset, entry) in entries.into_iter().enumerate() {
                let id = match entry {
                    StoreEntry::New(model) => {
                        let id = model.id();
                        inner.records.insert(id, model);
                        id
                    }
                    StoreEntry::Tree(subtree) => {
                        let id = subtree.root_id();
                        inner.attach_subtree(subtree);
                        id
                    }
                    StoreEntry::Existing(id) => id,
                };
                if let Some(model) = inner.records.get_mut(&id) {
                    model.set_parent(Some(parent));
                }
                if let Some(parent_model) = inner.records.get_mut(&parent) {
                    parent_model.children_mut().insert(index + offset, id);
                }
                ids.push(id);
            }
            (ids, moves, index)
        };
        if ids.is_empty() {
            return Ok(ids);
        }
        trace!(
            target: "rewind::model",
            parent = parent.raw(),
            index,
            count = ids.len(),
            "insert children"
        );
        if let Some(hooks) = self.hooks() {
            hooks.on_model_insert_child(self, parent, index, ids.clone(), moves);
        }
        Ok(ids)
    }

    /// Remove children (with their subtrees) from `parent`. Ids that are
    /// not current children of `parent` are ignored. Returns the detached
    /// snapshots in ascending previous-index order.
    pub fn remove_children(
        &self,
        parent: ModelId,
        ids: &[ModelId],
    ) -> ModelResult<Vec<Subtree>> {
        let (removed, prev_indices) = {
            let mut inner = self.inner.borrow_mut();
            if !inner.records.contains_key(&parent) {
                return Err(ModelError::UnknownRecord(parent));
            }
            let children = inner
                .records
                .get(&parent)
                .map(|m| m.children().to_vec())
                .unwrap_or_default();
            let mut targets: Vec<(usize, ModelId)> = ids
                .iter()
                .filter_map(|id| {
                    children.iter().position(|c| c == id).map(|i| (i, *id))
                })
                .collect();
            targets.sort_by_key(|(i, _)| *i);
            targets.dedup_by_key(|(i, _)| *i);

            let mut removed = Vec::with_capacity(targets.len());
            for (_, id) in targets.iter().rev() {
                inner.detach_record(*id);
                removed.push(inner.take_subtree(*id));
            }
            removed.reverse();
            let prev_indices: Vec<usize> = targets.iter().map(|(i, _)| *i).collect();
            (removed, prev_indices)
        };
        if removed.is_empty() {
            return Ok(removed);
        }
        trace!(
            target: "rewind::model",
            parent = parent.raw(),
            count = removed.len(),
            "remove children"
        );
        if let Some(hooks) = self.hooks() {
            hooks.on_model_remove_child(self, parent, removed.clone(), prev_indices);
        }
        Ok(removed)
    }
}

impl StoreInner {
    /// Whether `a` is an ancestor of `b`.
    fn is_ancestor(&self, a: ModelId, b: ModelId) -> bool {
        let mut cursor = self.records.get(&b).and_then(Model::parent);
        while let Some(p) = cursor {
            if p == a {
                return true;
            }
            cursor = self.records.get(&p).and_then(Model::parent);
        }
        false
    }

    /// Unlink a root from the root list.
    fn detach_root(&mut self, id: ModelId) {
        if let Some(pos) = self.roots.iter().position(|r| *r == id) {
            self.roots.remove(pos);
        }
    }

    /// Unlink a record from wherever it currently hangs (root list or its
    /// parent's child list). The record stays in the map.
    fn detach_record(&mut self, id: ModelId) {
        match self.records.get(&id).and_then(Model::parent) {
            Some(parent) => {
                if let Some(parent_model) = self.records.get_mut(&parent) {
                    parent_model.children_mut().retain(|c| *c != id);
                }
                if let Some(model) = self.records.get_mut(&id) {
                    model.set_parent(None);
                }
            }
            None => self.detach_root(id),
        }
    }

    /// Pull an already-unlinked record and its descendants out of the map,
    /// depth-first with the root first.
    fn take_subtree(&mut self, id: ModelId) -> Subtree {
        let mut records = Vec::new();
        self.collect_subtree(id, &mut records);
        Subtree { records }
    }

    fn collect_subtree(&mut self, id: ModelId, out: &mut Vec<Model>) {
        if let Some(model) = self.records.remove(&id) {
            let children = model.children().to_vec();
            out.push(model);
            for child in children {
                self.collect_subtree(child, out);
            }
        }
    }

    /// Put a detached subtree's records back into the map. The caller
    /// links the root into the root list or a parent's child list.
    fn attach_subtree(&mut self, subtree: Subtree) {
        for model in subtree.records {
            debug_assert!(
                !self.records.contains_key(&model.id()),
                "subtree record already present on re-attach"
            );
            self.records.insert(model.id(), model);
        }
    }

    fn snapshot(&self, id: ModelId) -> RecordSnapshot {
        let model = &self.records[&id];
        let mut fields: Vec<(String, FieldValue)> = model
            .fields()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        RecordSnapshot {
            id,
            fields,
            children: model
                .children()
                .iter()
                .map(|c| self.snapshot(*c))
                .collect(),
        }
    }
}
