#![forbid(unsafe_code)]

//! Transactional undo/redo for observable record collections.
//!
//! Rewind watches mutations on [`rewind_model`] stores, batches them into
//! atomic [`Transaction`]s, and replays them in strict order to move an
//! application's data back and forth through its mutation history.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                   StateTrackingManager                       │
//! │                                                              │
//! │  state machine          queue of transactions                │
//! │  Disabled / Ready /     [t0, t1 | t2, t3]                    │
//! │  AutoReady / Recording /         ^ position                  │
//! │  AutoRecording / Restoring                                   │
//! └───────▲──────────────────────────────────────┬───────────────┘
//!         │ mutation hooks                       │ notifications
//!         │ (records -> actions)                 ▼
//! ┌───────┴──────────────┐            ┌─────────────────────────┐
//! │ Store / Store / ...  │            │ listeners + observers   │
//! └──────────────────────┘            └─────────────────────────┘
//! ```
//!
//! A mutation on an attached store calls the matching manager hook; the
//! current state decides whether it is recorded into the open
//! transaction, opens one automatically (auto-record with a debounced
//! close), or is ignored (idle, disabled, or replaying). Undo and redo
//! replay whole transactions atomically: actions run in reverse
//! insertion order on undo and forward order on redo, and the hooks the
//! replay itself fires are never re-logged.
//!
//! # Quick start
//!
//! ```
//! use rewind::StateTrackingManager;
//! use rewind_model::{Model, Store, set};
//!
//! let manager = StateTrackingManager::new();
//! let store = Store::new();
//! let id = store.add(vec![Model::with_fields([("title", "draft")])], false)[0];
//! manager.add_store(&store);
//!
//! manager.start_transaction(Some("rename".into()));
//! store.update(id, vec![set("title", "final")]).unwrap();
//! manager.stop_transaction(None);
//!
//! assert!(manager.can_undo());
//! manager.undo(1);
//! assert_eq!(store.field(id, "title").unwrap().as_text(), Some("draft"));
//! manager.redo(1);
//! assert_eq!(store.field(id, "title").unwrap().as_text(), Some("final"));
//! ```
//!
//! # History is linear
//!
//! Committing a transaction truncates everything at or after the current
//! position. There is no branching and nothing is persisted; the queue
//! lives and dies with the manager.
//!
//! # Error model
//!
//! Calling an operation the current state forbids (undo while disabled,
//! nested `start_transaction`, …) is a programmer error and panics with
//! an [`IllegalCall`] message. Check `can_undo`/`can_redo`/`is_ready`
//! first. Mutation hooks and replay never fail.

pub mod action;
pub mod error;
pub mod event;
pub mod manager;
pub mod state;
pub mod transaction;

pub use action::{
    ActionFactories, ActionFactory, AddAction, AddPayload, InsertAction, InsertChildAction,
    InsertChildPayload, InsertPayload, RemoveAction, RemoveAllAction, RemoveAllPayload,
    RemoveChildAction, RemoveChildPayload, RemovePayload, StmAction, UpdateAction, UpdatePayload,
};
pub use error::IllegalCall;
pub use event::{ListenerId, ResetOptions, StashKey, StmEvent, TransactionSummary};
pub use manager::{StateTrackingManager, StmConfig, TitleFn};
pub use state::StateId;
pub use transaction::Transaction;

// The model crate is part of the public contract; re-export it whole.
pub use rewind_model as model;

// The debounce API is expressed in these types; re-export them so hosts
// (and wasm builds, where they diverge from std) name the same clock.
pub use web_time::{Duration, Instant};
