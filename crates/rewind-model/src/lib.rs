#![forbid(unsafe_code)]

//! Observable record collections for the Rewind state tracking manager.
//!
//! This crate is the collection side of the undo/redo protocol: mutable
//! record stores (flat root lists, optionally with parent/child trees)
//! that report every mutation to an attached manager through the
//! [`MutationHooks`] contract, and receive lifecycle callbacks through
//! [`StoreObserver`].
//!
//! The crate knows nothing about transactions or history; it only
//! captures enough context per mutation (previous indices, previous
//! parents, detached snapshots) for the manager to build reversible
//! actions.
//!
//! # Features
//!
//! - `state-persistence`: serde derives on [`FieldValue`], [`Model`] and
//!   [`Subtree`] so hosts can persist record data across sessions. The
//!   manager's history itself is never persisted.

pub mod error;
pub mod field;
pub mod observe;
pub mod record;
pub mod store;

pub use error::{ModelError, ModelResult};
pub use field::{FieldPatch, FieldValue, set, unset};
pub use observe::{ChildMove, MutationHooks, RecordingStopReason, RestoreCause, StoreObserver};
pub use record::{Model, ModelId, Subtree};
pub use store::{RecordSnapshot, Store, StoreEntry};
