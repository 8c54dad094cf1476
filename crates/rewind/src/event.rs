#![forbid(unsafe_code)]

//! Manager notifications.
//!
//! The manager fans events out on two channels: the typed listener list
//! carrying [`StmEvent`] (this module), and the per-collection
//! [`StoreObserver`](rewind_model::StoreObserver) callbacks. Events fire
//! only after the manager's observable fields (state, position, queue)
//! are consistent, and never while an interior borrow is held, so a
//! listener may re-enter the public API.

use rewind_model::{RecordingStopReason, RestoreCause};

/// Cheap description of a committed or replayed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionSummary {
    pub title: Option<String>,
    /// Number of actions in the transaction.
    pub actions: usize,
}

/// Which ends of the queue a reset drops.
///
/// `undo` drops the done head (indices before the position); `redo`
/// drops the redoable tail. The default drops both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetOptions {
    pub undo: bool,
    pub redo: bool,
}

impl Default for ResetOptions {
    fn default() -> Self {
        Self { undo: true, redo: true }
    }
}

/// Key handed out by `stash()`, redeemable once via `apply_stash()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StashKey(pub(crate) u64);

impl StashKey {
    /// Get the raw key value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Handle for removing a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(pub(crate) u64);

/// A manager lifecycle notification.
#[derive(Debug, Clone, PartialEq)]
pub enum StmEvent {
    /// A transaction opened (explicitly or by the first auto-recorded
    /// mutation).
    RecordingStart { title: Option<String> },
    /// A transaction closed. `committed` is false when the transaction
    /// was empty, rejected, stashed, or discarded by disable.
    RecordingStop {
        title: Option<String>,
        reason: RecordingStopReason,
        committed: bool,
    },
    /// An undo/redo replay is about to run.
    RestoringStart,
    /// An undo/redo replay finished. `transactions` summarizes the
    /// replayed transactions in replay order.
    RestoringStop {
        cause: RestoreCause,
        transactions: Vec<TransactionSummary>,
    },
    /// The queue was trimmed without replaying anything.
    QueueReset { undo: bool, redo: bool },
    /// The machine entered (`true`) or left (`false`) a steady state.
    Ready { ready: bool },
}
