#![forbid(unsafe_code)]

//! Records and detached record snapshots.
//!
//! A [`Model`] is one mutable record: an id, a field map, and (when it
//! lives in a tree) a parent link plus an ordered child list. Records are
//! owned by a [`Store`](crate::Store); hosts hold [`ModelId`]s and go
//! through the store for every mutation so that the attached manager sees
//! each change.

use std::collections::hash_map;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
#[cfg(feature = "state-persistence")]
use serde::{Deserialize, Serialize};

use crate::field::{FieldPatch, FieldValue};

static NEXT_MODEL_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a record.
///
/// Ids are minted from a process-wide counter and never reused, so a
/// detached record keeps its identity across undo/redo round trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "state-persistence", derive(Serialize, Deserialize))]
pub struct ModelId(u64);

impl ModelId {
    /// Mint a fresh id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_MODEL_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// One mutable record.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "state-persistence", derive(Serialize, Deserialize))]
pub struct Model {
    id: ModelId,
    fields: AHashMap<String, FieldValue>,
    parent: Option<ModelId>,
    children: Vec<ModelId>,
}

impl Model {
    /// Create an empty record with a fresh id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: ModelId::next(),
            fields: AHashMap::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    /// Create a record with initial field values.
    #[must_use]
    pub fn with_fields<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let mut model = Self::new();
        for (k, v) in fields {
            model.fields.insert(k.into(), v.into());
        }
        model
    }

    /// The record's id.
    #[must_use]
    pub fn id(&self) -> ModelId {
        self.id
    }

    /// Look up a field value.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Iterate over all fields, in map order.
    pub fn fields(&self) -> hash_map::Iter<'_, String, FieldValue> {
        self.fields.iter()
    }

    /// The parent record, if this record is a child in a tree.
    #[must_use]
    pub fn parent(&self) -> Option<ModelId> {
        self.parent
    }

    /// The ordered child ids.
    #[must_use]
    pub fn children(&self) -> &[ModelId] {
        &self.children
    }

    /// Apply a field patch, returning the inverse patch (only entries that
    /// actually changed; a no-op write produces no inverse entry).
    pub(crate) fn apply_patch(&mut self, patch: &FieldPatch) -> FieldPatch {
        let mut inverse = FieldPatch::new();
        for (key, value) in patch {
            let old = self.fields.get(key).cloned();
            if old == *value {
                continue;
            }
            inverse.push((key.clone(), old));
            match value {
                Some(v) => {
                    self.fields.insert(key.clone(), v.clone());
                }
                None => {
                    self.fields.remove(key);
                }
            }
        }
        inverse
    }

    pub(crate) fn set_parent(&mut self, parent: Option<ModelId>) {
        self.parent = parent;
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<ModelId> {
        &mut self.children
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

/// A detached subtree snapshot.
///
/// Produced when records leave a store (remove, remove-all, child
/// removal). `records[0]` is the detached root; the rest are its
/// descendants in depth-first order. Re-attaching a subtree restores every
/// record, including parent links and child order.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "state-persistence", derive(Serialize, Deserialize))]
pub struct Subtree {
    pub records: Vec<Model>,
}

impl Subtree {
    /// The id of the subtree's root record.
    #[must_use]
    pub fn root_id(&self) -> ModelId {
        self.records[0].id
    }
}
