#![forbid(unsafe_code)]

//! The manager's finite state machine.
//!
//! Six named behaviors cover the manager's life: `Disabled`, `Ready`,
//! `AutoReady` (idle with auto-record armed), `Recording`,
//! `AutoRecording` (recording with a debounced stop), and `Restoring`
//! (replaying history). States are a closed enum dispatched by `match`;
//! there are no state objects and no registry.
//!
//! # Transition protocol
//!
//! Each operation resolves to a [`Transition`]: an optional next state,
//! an optional field patch, and an optional [`Continuation`]. The manager
//! applies the patch, commits the state, and only then interprets the
//! continuation (opening/committing transactions, replaying, notifying),
//! so observers always see already-consistent fields.
//!
//! Operations not listed for a state are illegal and abort; checking
//! `can_undo`/`can_redo`/`is_ready` first is the caller's job.

use rewind_model::RestoreCause;

use crate::error::illegal;

/// Identifier of one machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateId {
    Disabled,
    Ready,
    AutoReady,
    Recording,
    AutoRecording,
    Restoring,
}

impl StateId {
    /// Stable state name for diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            StateId::Disabled => "Disabled",
            StateId::Ready => "Ready",
            StateId::AutoReady => "AutoReady",
            StateId::Recording => "Recording",
            StateId::AutoRecording => "AutoRecording",
            StateId::Restoring => "Restoring",
        }
    }

    /// Steady states accept new work (start, undo, redo).
    #[must_use]
    pub const fn is_steady(self) -> bool {
        matches!(self, StateId::Ready | StateId::AutoReady)
    }

    /// Whether a transaction is currently open.
    #[must_use]
    pub const fn is_recording(self) -> bool {
        matches!(self, StateId::Recording | StateId::AutoRecording)
    }

    /// The steady state matching the auto-record flag.
    #[must_use]
    pub(crate) const fn steady(auto_record: bool) -> StateId {
        if auto_record {
            StateId::AutoReady
        } else {
            StateId::Ready
        }
    }

    /// The recording state matching the auto-record flag.
    #[must_use]
    pub(crate) const fn recording(auto_record: bool) -> StateId {
        if auto_record {
            StateId::AutoRecording
        } else {
            StateId::Recording
        }
    }

    /// Whether undo is available at the given queue position.
    #[must_use]
    pub(crate) fn can_undo(self, position: usize) -> bool {
        self.is_steady() && position > 0
    }

    /// Whether redo is available at the given queue position.
    #[must_use]
    pub(crate) fn can_redo(self, position: usize, len: usize) -> bool {
        self.is_steady() && position < len
    }
}

/// Manager field changes a transition applies before anything else runs.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Patch {
    pub auto_record: Option<bool>,
}

/// Deferred work a transition schedules after its fields are committed.
#[derive(Debug)]
pub(crate) enum Continuation {
    /// Open a fresh transaction (arming the debounce when auto).
    OpenTransaction { title: Option<String> },
    /// Commit the open transaction into the queue.
    CommitTransaction { title: Option<String> },
    /// Undo and discard the open transaction.
    RejectTransaction,
    /// Discard the open transaction without undoing (disable path).
    DiscardTransaction,
    /// Replay history and settle back into a steady state.
    Replay { cause: RestoreCause, steps: usize },
}

/// Result of dispatching one operation against the current state.
#[derive(Debug)]
pub(crate) struct Transition {
    pub next: Option<StateId>,
    pub patch: Option<Patch>,
    pub continuation: Option<Continuation>,
}

impl Transition {
    fn to(next: StateId) -> Self {
        Self { next: Some(next), patch: None, continuation: None }
    }

    fn stay() -> Self {
        Self { next: None, patch: None, continuation: None }
    }

    fn run(mut self, continuation: Continuation) -> Self {
        self.continuation = Some(continuation);
        self
    }

    fn merge(mut self, patch: Patch) -> Self {
        self.patch = Some(patch);
        self
    }
}

/// `start_transaction` — legal only while idle.
pub(crate) fn on_start_transaction(state: StateId, title: Option<String>) -> Transition {
    match state {
        StateId::Ready => Transition::to(StateId::Recording)
            .run(Continuation::OpenTransaction { title }),
        StateId::AutoReady => Transition::to(StateId::AutoRecording)
            .run(Continuation::OpenTransaction { title }),
        _ => illegal("start_transaction", state.name()),
    }
}

/// `stop_transaction` — legal only while recording.
pub(crate) fn on_stop_transaction(state: StateId, title: Option<String>) -> Transition {
    match state {
        StateId::Recording => Transition::to(StateId::Ready)
            .run(Continuation::CommitTransaction { title }),
        StateId::AutoRecording => Transition::to(StateId::AutoReady)
            .run(Continuation::CommitTransaction { title }),
        _ => illegal("stop_transaction", state.name()),
    }
}

/// `reject_transaction` — legal only while recording.
pub(crate) fn on_reject_transaction(state: StateId) -> Transition {
    match state {
        StateId::Recording => Transition::to(StateId::Ready).run(Continuation::RejectTransaction),
        StateId::AutoRecording => {
            Transition::to(StateId::AutoReady).run(Continuation::RejectTransaction)
        }
        _ => illegal("reject_transaction", state.name()),
    }
}

/// `undo`/`redo` — legal only from a steady state. Calls made while
/// recording are deferred by the manager before reaching this table.
pub(crate) fn on_restore(state: StateId, cause: RestoreCause, steps: usize) -> Transition {
    let op = match cause {
        RestoreCause::Undo => "undo",
        RestoreCause::Redo => "redo",
    };
    match state {
        StateId::Ready | StateId::AutoReady => {
            Transition::to(StateId::Restoring).run(Continuation::Replay { cause, steps })
        }
        _ => illegal(op, state.name()),
    }
}

/// `disable` — legal from every state but `Restoring`. Recording states
/// discard their open transaction.
pub(crate) fn on_disable(state: StateId) -> Transition {
    match state {
        StateId::Disabled => Transition::stay(),
        StateId::Ready | StateId::AutoReady => Transition::to(StateId::Disabled),
        StateId::Recording | StateId::AutoRecording => {
            Transition::to(StateId::Disabled).run(Continuation::DiscardTransaction)
        }
        StateId::Restoring => illegal("disable", state.name()),
    }
}

/// `enable` — a no-op unless disabled.
pub(crate) fn on_enable(state: StateId, auto_record: bool) -> Transition {
    match state {
        StateId::Disabled => Transition::to(StateId::steady(auto_record)),
        _ => Transition::stay(),
    }
}

/// `auto_record` setter. Flipping the flag while idle or recording moves
/// between the manual and auto flavors of the same behavior; while
/// disabled only the flag is patched.
pub(crate) fn on_set_auto_record(state: StateId, value: bool) -> Transition {
    let patch = Patch { auto_record: Some(value) };
    match state {
        StateId::Ready | StateId::AutoReady => {
            Transition::to(StateId::steady(value)).merge(patch)
        }
        StateId::Recording | StateId::AutoRecording => {
            Transition::to(StateId::recording(value)).merge(patch)
        }
        StateId::Disabled => Transition::stay().merge(patch),
        StateId::Restoring => illegal("set_auto_record", state.name()),
    }
}
