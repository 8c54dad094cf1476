#![forbid(unsafe_code)]

//! The collection/manager protocol.
//!
//! Two contracts meet here:
//!
//! - [`MutationHooks`] is the inbound channel: a [`Store`] calls the
//!   matching hook on its attached manager after every mutation, supplying
//!   enough captured context to build a reversible action. Hooks fire
//!   synchronously, after the store's own state is already updated and its
//!   interior borrow released, and they never fail.
//! - [`StoreObserver`] is the outbound channel: the manager calls back into
//!   each attached collection around recording/restoring boundaries. Every
//!   method defaults to a no-op so collections implement only what they
//!   care about.

use crate::field::FieldPatch;
use crate::record::{ModelId, Subtree};
use crate::store::Store;

/// Where a child record lived before an `insert_children` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildMove {
    /// Previous parent; `None` if the record came from the root list or is
    /// new to the store.
    pub parent: Option<ModelId>,
    /// Previous index under that parent (or in the root list); `None` if
    /// the record is new to the store.
    pub index: Option<usize>,
}

impl ChildMove {
    /// Context for a record that did not exist in the store before.
    #[must_use]
    pub const fn added() -> Self {
        Self { parent: None, index: None }
    }

    /// Whether this record was new to the store.
    #[must_use]
    pub const fn is_added(&self) -> bool {
        self.index.is_none()
    }
}

/// Inbound mutation hooks, implemented by the manager.
///
/// A store holds a weak reference to its manager and invokes these after
/// each mutation. The manager's current state decides whether the call is
/// recorded or ignored; the store neither knows nor cares.
pub trait MutationHooks {
    /// Field values changed on one record. `new` and `old` carry only the
    /// entries that actually changed.
    fn on_model_update(&self, store: &Store, record: ModelId, new: FieldPatch, old: FieldPatch);

    /// Children were inserted under `parent` at `index`. `moves` is
    /// parallel to `children` and records where each child came from.
    fn on_model_insert_child(
        &self,
        store: &Store,
        parent: ModelId,
        index: usize,
        children: Vec<ModelId>,
        moves: Vec<ChildMove>,
    );

    /// Children were removed from `parent`. `removed` carries the detached
    /// subtree snapshots; `prev_indices` is parallel and records each
    /// child's index under `parent` before the removal.
    fn on_model_remove_child(
        &self,
        store: &Store,
        parent: ModelId,
        removed: Vec<Subtree>,
        prev_indices: Vec<usize>,
    );

    /// Records were appended to the store's root list.
    fn on_store_add(&self, store: &Store, records: Vec<ModelId>, silent: bool);

    /// Records were inserted into the root list at `index`. `prev_indices`
    /// is parallel to `records`; `None` marks a record new to the store,
    /// `Some` the root index it was moved from.
    fn on_store_insert(
        &self,
        store: &Store,
        index: usize,
        records: Vec<ModelId>,
        prev_indices: Vec<Option<usize>>,
        silent: bool,
    );

    /// Root records were removed. `prev_indices` is parallel to `removed`
    /// and records each root's index before any of the batch was removed.
    fn on_store_remove(
        &self,
        store: &Store,
        removed: Vec<Subtree>,
        prev_indices: Vec<usize>,
        silent: bool,
    );

    /// The store was cleared. `removed` snapshots the full prior contents
    /// in root order.
    fn on_store_remove_all(&self, store: &Store, removed: Vec<Subtree>, silent: bool);
}

/// Why a recording stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingStopReason {
    /// Committed normally (explicit stop or debounce close).
    Stop,
    /// Rejected or stashed; data changes were rolled back.
    Rejected,
    /// The manager was disabled mid-recording.
    Disabled,
}

/// Which direction a restore replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreCause {
    Undo,
    Redo,
}

/// Outbound callbacks a collection may implement to follow the manager's
/// lifecycle. All methods default to no-ops.
pub trait StoreObserver {
    fn on_recording_start(&self) {}
    fn on_recording_stop(&self, _reason: RecordingStopReason) {}
    fn on_restoring_start(&self) {}
    fn on_restoring_stop(&self, _cause: RestoreCause) {}
    /// The history queue was reset. The flags mirror the reset options:
    /// `undo` drops the done head, `redo` drops the redoable tail.
    fn on_queue_reset(&self, _undo: bool, _redo: bool) {}
    /// Fired when the manager enters (`true`) or leaves (`false`) a steady
    /// state.
    fn on_ready(&self, _ready: bool) {}
}
