#![forbid(unsafe_code)]

//! The state tracking manager.
//!
//! [`StateTrackingManager`] owns the transaction queue, the position
//! cursor, the open transaction (if any), the attached stores, and the
//! auto-record debounce deadline. It implements the inbound
//! [`MutationHooks`] contract, drives every state transition through the
//! table in [`state`](crate::state), and fans notifications out to
//! listeners and attached collections.
//!
//! # Queue model
//!
//! ```text
//! queue:    [t0, t1, t2, t3, t4]
//!                       ^ position = 2
//! done (undoable):  t0, t1
//! redoable:         t2, t3, t4
//! ```
//!
//! Committing a new transaction truncates the tail at the position and
//! appends — history is strictly linear.
//!
//! # Re-entrancy
//!
//! Notifications and replay run with no interior borrow held, so
//! listeners and replayed mutations may re-enter the public API (subject
//! to the state table: mutation hooks are ignored while restoring).
//! Replaceable hosts' callbacks (action factories, the transaction title
//! function) are the one exception: they are invoked from inside the
//! hook path and must not call back into the manager.
//!
//! # Concurrency
//!
//! Single-threaded by design. The debounce deadline is the only deferred
//! work and is checked cooperatively: hooks flush an expired deadline
//! before recording, and hosts pump [`tick`](StateTrackingManager::tick)
//! (or [`tick_at`](StateTrackingManager::tick_at)) from their scheduler.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use tracing::{debug, trace, warn};
use web_time::{Duration, Instant};

use rewind_model::{
    ChildMove, FieldPatch, ModelId, MutationHooks, RecordingStopReason, RestoreCause, Store,
    Subtree,
};

use crate::action::{
    ActionFactories, AddPayload, InsertChildPayload, InsertPayload, RemoveAllPayload,
    RemoveChildPayload, RemovePayload, StmAction, UpdatePayload,
};
use crate::error::illegal;
use crate::event::{ListenerId, ResetOptions, StashKey, StmEvent, TransactionSummary};
use crate::state::{self, Continuation, StateId, Transition};
use crate::transaction::Transaction;

/// Host callback deriving a title for an untitled transaction at commit
/// time.
pub type TitleFn = Box<dyn Fn(&Transaction) -> String>;

/// Listener callback for [`StmEvent`] notifications.
pub type ListenerFn = dyn Fn(&StateTrackingManager, &StmEvent);

const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_millis(100);

/// Manager configuration, builder style.
pub struct StmConfig {
    pub(crate) disabled: bool,
    pub(crate) auto_record: bool,
    pub(crate) stop_timeout: Duration,
    pub(crate) transaction_title: Option<TitleFn>,
    pub(crate) factories: ActionFactories,
}

impl Default for StmConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            auto_record: false,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            transaction_title: None,
            factories: ActionFactories::default(),
        }
    }
}

impl fmt::Debug for StmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StmConfig")
            .field("disabled", &self.disabled)
            .field("auto_record", &self.auto_record)
            .field("stop_timeout", &self.stop_timeout)
            .field("has_title_fn", &self.transaction_title.is_some())
            .finish()
    }
}

impl StmConfig {
    /// Default configuration: enabled, manual recording, 100 ms debounce.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start in the `Disabled` state.
    #[must_use]
    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Start with auto-record armed (`AutoReady`).
    #[must_use]
    pub fn with_auto_record(mut self, auto_record: bool) -> Self {
        self.auto_record = auto_record;
        self
    }

    /// Quiet period after which an auto-recorded transaction commits.
    #[must_use]
    pub fn with_auto_record_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Derive titles for untitled transactions at commit time.
    #[must_use]
    pub fn with_transaction_title(mut self, f: impl Fn(&Transaction) -> String + 'static) -> Self {
        self.transaction_title = Some(Box::new(f));
        self
    }

    /// Replace the action constructors used while recording.
    #[must_use]
    pub fn with_factories(mut self, factories: ActionFactories) -> Self {
        self.factories = factories;
        self
    }
}

struct Inner {
    state: StateId,
    auto_record: bool,
    queue: Vec<Transaction>,
    position: usize,
    current: Option<Transaction>,
    stores: Vec<Store>,
    stash: AHashMap<u64, Transaction>,
    next_stash: u64,
    applying_stash: bool,
    deferred: VecDeque<(RestoreCause, usize)>,
    listeners: Vec<(u64, Rc<ListenerFn>)>,
    next_listener: u64,
    deadline: Option<Instant>,
    config: StmConfig,
}

struct StmCore {
    weak: Weak<StmCore>,
    inner: RefCell<Inner>,
}

/// Transactional undo/redo manager over observed stores.
///
/// Cheap clone handle; all clones share one manager. Single-threaded.
#[derive(Clone)]
pub struct StateTrackingManager {
    core: Rc<StmCore>,
}

impl fmt::Debug for StateTrackingManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.core.inner.borrow();
        f.debug_struct("StateTrackingManager")
            .field("state", &inner.state.name())
            .field("position", &inner.position)
            .field("queue", &inner.queue.len())
            .field("recording", &inner.current.is_some())
            .finish()
    }
}

impl Default for StateTrackingManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTrackingManager {
    /// Create a manager with the default configuration (enabled, manual
    /// recording).
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(StmConfig::default())
    }

    /// Create a manager from a configuration.
    #[must_use]
    pub fn with_config(config: StmConfig) -> Self {
        let state = if config.disabled {
            StateId::Disabled
        } else {
            StateId::steady(config.auto_record)
        };
        let auto_record = config.auto_record;
        let core = Rc::new_cyclic(|weak| StmCore {
            weak: weak.clone(),
            inner: RefCell::new(Inner {
                state,
                auto_record,
                queue: Vec::new(),
                position: 0,
                current: None,
                stores: Vec::new(),
                stash: AHashMap::new(),
                next_stash: 1,
                applying_stash: false,
                deferred: VecDeque::new(),
                listeners: Vec::new(),
                next_listener: 1,
                deadline: None,
                config,
            }),
        });
        Self { core }
    }

    // ========================================================================
    // Attachment and listeners
    // ========================================================================

    /// Attach a store: the store's mutation hooks start feeding this
    /// manager. At most one manager may own a store; preventing double
    /// attachment is the caller's responsibility.
    pub fn add_store(&self, store: &Store) {
        debug_assert!(
            !store.is_bound(),
            "store is already attached to a manager; double attachment double-records"
        );
        let weak: Weak<dyn MutationHooks> = self.core.weak.clone();
        store.bind(weak);
        self.core.inner.borrow_mut().stores.push(store.clone());
        debug!(target: "rewind::stm", "store attached");
    }

    /// Detach a store, dropping its back-reference.
    pub fn remove_store(&self, store: &Store) {
        store.unbind();
        self.core
            .inner
            .borrow_mut()
            .stores
            .retain(|s| !s.ptr_eq(store));
        debug!(target: "rewind::stm", "store detached");
    }

    /// Register a notification listener.
    pub fn add_listener(
        &self,
        listener: impl Fn(&StateTrackingManager, &StmEvent) + 'static,
    ) -> ListenerId {
        let listener: Rc<ListenerFn> = Rc::new(listener);
        let mut inner = self.core.inner.borrow_mut();
        let id = inner.next_listener;
        inner.next_listener += 1;
        inner.listeners.push((id, listener));
        ListenerId(id)
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut inner = self.core.inner.borrow_mut();
        let before = inner.listeners.len();
        inner.listeners.retain(|(lid, _)| *lid != id.0);
        inner.listeners.len() != before
    }

    // ========================================================================
    // Read API
    // ========================================================================

    /// Current state.
    fn state(&self) -> StateId {
        self.core.inner.borrow().state
    }

    /// Whether the machine is idle and accepting work.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state().is_steady()
    }

    /// Whether a transaction is open.
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.state().is_recording()
    }

    /// Whether an undo/redo replay is in progress.
    #[must_use]
    pub fn is_restoring(&self) -> bool {
        self.state() == StateId::Restoring
    }

    /// Whether the manager is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.state() == StateId::Disabled
    }

    /// Whether a stashed transaction is being re-applied right now.
    #[must_use]
    pub fn is_applying_stash(&self) -> bool {
        self.core.inner.borrow().applying_stash
    }

    /// Whether the auto-record flag is set.
    #[must_use]
    pub fn auto_record(&self) -> bool {
        self.core.inner.borrow().auto_record
    }

    /// Whether an undo step is available.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        let inner = self.core.inner.borrow();
        inner.state.can_undo(inner.position)
    }

    /// Whether a redo step is available.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        let inner = self.core.inner.borrow();
        inner.state.can_redo(inner.position, inner.queue.len())
    }

    /// The queue cursor: transactions before it are done, at or after it
    /// redoable.
    #[must_use]
    pub fn position(&self) -> usize {
        self.core.inner.borrow().position
    }

    /// Number of transactions in the queue.
    #[must_use]
    pub fn len(&self) -> usize {
        self.core.inner.borrow().queue.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.core.inner.borrow().queue.is_empty()
    }

    /// Titles of the queued transactions, in queue order.
    #[must_use]
    pub fn queue_titles(&self) -> Vec<Option<String>> {
        self.core
            .inner
            .borrow()
            .queue
            .iter()
            .map(|t| t.title().map(String::from))
            .collect()
    }

    /// Summary of the open transaction, if any.
    #[must_use]
    pub fn transaction(&self) -> Option<TransactionSummary> {
        self.core
            .inner
            .borrow()
            .current
            .as_ref()
            .map(Transaction::summary)
    }

    /// The pending auto-record commit deadline, if one is armed.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.core.inner.borrow().deadline
    }

    // ========================================================================
    // Enable / disable / auto-record
    // ========================================================================

    /// Leave the `Disabled` state. No-op when already enabled.
    pub fn enable(&self) {
        let auto_record = self.auto_record();
        let transition = state::on_enable(self.state(), auto_record);
        let changed = transition.next.is_some();
        self.apply(transition);
        if changed {
            self.emit(StmEvent::Ready { ready: true });
            self.drain_deferred();
        }
    }

    /// Enter the `Disabled` state, discarding any open transaction
    /// (without rolling its data changes back) and dropping deferred
    /// undo/redo requests. No-op when already disabled; illegal while
    /// restoring.
    pub fn disable(&self) {
        let transition = state::on_disable(self.state());
        if transition.next.is_none() {
            return;
        }
        let discards = transition.continuation.is_some();
        self.apply(transition);
        if !discards {
            self.emit(StmEvent::Ready { ready: false });
        }
        let mut inner = self.core.inner.borrow_mut();
        if !inner.deferred.is_empty() {
            warn!(
                target: "rewind::stm",
                dropped = inner.deferred.len(),
                "disable dropped deferred undo/redo requests"
            );
            inner.deferred.clear();
        }
    }

    /// Flip the auto-record flag. While idle this moves between `Ready`
    /// and `AutoReady`; while recording, between `Recording` and
    /// `AutoRecording` (arming or cancelling the debounce); while
    /// disabled only the flag changes.
    pub fn set_auto_record(&self, value: bool) {
        if self.auto_record() == value {
            return;
        }
        let transition = state::on_set_auto_record(self.state(), value);
        self.apply(transition);
        let mut inner = self.core.inner.borrow_mut();
        match inner.state {
            StateId::AutoRecording => {
                inner.deadline = Some(Instant::now() + inner.config.stop_timeout);
            }
            StateId::Recording => inner.deadline = None,
            _ => {}
        }
    }

    // ========================================================================
    // Recording
    // ========================================================================

    /// Open a transaction. Illegal unless idle.
    pub fn start_transaction(&self, title: Option<String>) {
        let transition = state::on_start_transaction(self.state(), title);
        self.apply(transition);
    }

    /// Commit the open transaction. An empty transaction commits nothing
    /// and leaves history untouched. Illegal unless recording.
    pub fn stop_transaction(&self, title: Option<String>) {
        let transition = state::on_stop_transaction(self.state(), title);
        self.apply(transition);
    }

    /// Roll back and discard the open transaction. The queue is never
    /// touched. Illegal unless recording.
    pub fn reject_transaction(&self) {
        let transition = state::on_reject_transaction(self.state());
        self.apply(transition);
    }

    /// Detach the open transaction: its data changes are rolled back and
    /// the transaction is kept under the returned key for later
    /// [`apply_stash`](StateTrackingManager::apply_stash). Illegal unless
    /// recording.
    pub fn stash(&self) -> StashKey {
        let state = self.state();
        if !state.is_recording() {
            illegal("stash", state.name());
        }
        let (mut transaction, steady) = {
            let mut inner = self.core.inner.borrow_mut();
            inner.deadline = None;
            inner.state = StateId::Restoring;
            (
                inner.current.take().unwrap_or_else(|| Transaction::new(None)),
                StateId::steady(inner.auto_record),
            )
        };
        transaction.undo();
        let (key, title) = {
            let mut inner = self.core.inner.borrow_mut();
            inner.state = steady;
            let key = inner.next_stash;
            inner.next_stash += 1;
            let title = transaction.title().map(String::from);
            inner.stash.insert(key, transaction);
            (StashKey(key), title)
        };
        debug!(target: "rewind::stm", key = key.raw(), "transaction stashed");
        self.emit(StmEvent::RecordingStop {
            title,
            reason: RecordingStopReason::Rejected,
            committed: false,
        });
        self.emit(StmEvent::Ready { ready: true });
        self.drain_deferred();
        key
    }

    /// Start a fresh recording titled like the stashed transaction and
    /// re-apply its actions, re-recording them as new actions of the new
    /// (still open) transaction. Illegal unless idle; an unknown key is a
    /// programmer error.
    pub fn apply_stash(&self, key: StashKey) {
        let state = self.state();
        if !state.is_steady() {
            illegal("apply_stash", state.name());
        }
        let Some(stashed) = self.core.inner.borrow_mut().stash.remove(&key.0) else {
            panic!("apply_stash: unknown stash key {}", key.raw());
        };
        let title = stashed.title().map(String::from);
        self.start_transaction(title);
        self.core.inner.borrow_mut().applying_stash = true;
        for mut action in stashed.into_actions() {
            action.redo();
        }
        self.core.inner.borrow_mut().applying_stash = false;
        debug!(target: "rewind::stm", key = key.raw(), "stash re-applied");
    }

    // ========================================================================
    // Undo / redo
    // ========================================================================

    /// Undo up to `steps` transactions (clamped at the queue head). Calls
    /// made while recording are deferred until the machine is next ready;
    /// calls while disabled or restoring are illegal.
    pub fn undo(&self, steps: usize) {
        self.restore(RestoreCause::Undo, steps);
    }

    /// Redo up to `steps` transactions (clamped at the queue tail).
    /// Deferral and legality as for [`undo`](StateTrackingManager::undo).
    pub fn redo(&self, steps: usize) {
        self.restore(RestoreCause::Redo, steps);
    }

    /// Undo everything undoable.
    pub fn undo_all(&self) {
        self.undo(self.len());
    }

    /// Redo everything redoable.
    pub fn redo_all(&self) {
        self.redo(self.len());
    }

    fn restore(&self, cause: RestoreCause, steps: usize) {
        let state = self.state();
        if state.is_recording() {
            self.core.inner.borrow_mut().deferred.push_back((cause, steps));
            debug!(
                target: "rewind::stm",
                cause = ?cause,
                steps,
                "restore deferred until the machine is ready"
            );
            return;
        }
        let transition = state::on_restore(state, cause, steps);
        self.apply(transition);
    }

    // ========================================================================
    // Debounce
    // ========================================================================

    /// Commit the open auto-recorded transaction if its quiet-period
    /// deadline has passed at `now`. Returns whether a commit happened.
    pub fn tick_at(&self, now: Instant) -> bool {
        let due = {
            let inner = self.core.inner.borrow();
            inner.state == StateId::AutoRecording
                && inner.deadline.is_some_and(|deadline| now >= deadline)
        };
        if !due {
            return false;
        }
        debug!(target: "rewind::stm", "auto-record debounce fired");
        let transition = state::on_stop_transaction(StateId::AutoRecording, None);
        self.apply(transition);
        true
    }

    /// [`tick_at`](StateTrackingManager::tick_at) with the current time.
    pub fn tick(&self) -> bool {
        self.tick_at(Instant::now())
    }

    // ========================================================================
    // Queue reset
    // ========================================================================

    /// Trim history without replaying anything. Legal from every state
    /// but `Restoring`.
    pub fn reset_queue(&self, options: ResetOptions) {
        let state = self.state();
        if state == StateId::Restoring {
            illegal("reset_queue", state.name());
        }
        {
            let mut inner = self.core.inner.borrow_mut();
            match (options.undo, options.redo) {
                (true, true) => {
                    inner.queue.clear();
                    inner.position = 0;
                }
                (true, false) => {
                    let position = inner.position;
                    inner.queue.drain(..position);
                    inner.position = 0;
                }
                (false, true) => {
                    let position = inner.position;
                    inner.queue.truncate(position);
                }
                (false, false) => {}
            }
            debug!(
                target: "rewind::stm",
                undo = options.undo,
                redo = options.redo,
                queue = inner.queue.len(),
                position = inner.position,
                "queue reset"
            );
        }
        self.emit(StmEvent::QueueReset {
            undo: options.undo,
            redo: options.redo,
        });
    }

    /// Drop the done head of the queue.
    pub fn reset_undo_queue(&self) {
        self.reset_queue(ResetOptions { undo: true, redo: false });
    }

    /// Drop the redoable tail of the queue.
    pub fn reset_redo_queue(&self) {
        self.reset_queue(ResetOptions { undo: false, redo: true });
    }

    // ========================================================================
    // Transition plumbing
    // ========================================================================

    /// Commit a transition: patch fields, switch state, then interpret
    /// the continuation against the already-consistent fields.
    fn apply(&self, transition: Transition) {
        let Transition { next, patch, continuation } = transition;
        {
            let mut inner = self.core.inner.borrow_mut();
            if let Some(patch) = patch {
                if let Some(value) = patch.auto_record {
                    inner.auto_record = value;
                }
            }
            if let Some(next) = next {
                if next != inner.state {
                    debug!(
                        target: "rewind::stm",
                        from = inner.state.name(),
                        to = next.name(),
                        "state transition"
                    );
                    inner.state = next;
                }
            }
        }
        if let Some(continuation) = continuation {
            self.continue_with(continuation);
        }
    }

    fn continue_with(&self, continuation: Continuation) {
        match continuation {
            Continuation::OpenTransaction { title } => self.open_transaction(title),
            Continuation::CommitTransaction { title } => self.commit_current(title),
            Continuation::RejectTransaction => self.reject_current(),
            Continuation::DiscardTransaction => self.discard_current(),
            Continuation::Replay { cause, steps } => self.run_replay(cause, steps),
        }
    }

    fn open_transaction(&self, title: Option<String>) {
        {
            let mut inner = self.core.inner.borrow_mut();
            inner.current = Some(Transaction::new(title.clone()));
            if inner.state == StateId::AutoRecording {
                inner.deadline = Some(Instant::now() + inner.config.stop_timeout);
            }
        }
        self.emit(StmEvent::RecordingStart { title });
        self.emit(StmEvent::Ready { ready: false });
    }

    /// Commit path shared by explicit stop and the debounce close. The
    /// state is already back in its steady flavor.
    fn commit_current(&self, title_override: Option<String>) {
        let event = {
            let mut inner = self.core.inner.borrow_mut();
            inner.deadline = None;
            let Some(mut transaction) = inner.current.take() else {
                return;
            };
            if let Some(title) = title_override {
                transaction.set_title(Some(title));
            }
            if transaction.title().is_none() && !transaction.is_empty() {
                if let Some(title_fn) = &inner.config.transaction_title {
                    let title = title_fn(&transaction);
                    transaction.set_title(Some(title));
                }
            }
            let committed = !transaction.is_empty();
            let title = transaction.title().map(String::from);
            if committed {
                let position = inner.position;
                inner.queue.truncate(position);
                inner.queue.push(transaction);
                inner.position = inner.queue.len();
                debug!(
                    target: "rewind::stm",
                    title = title.as_deref().unwrap_or(""),
                    position = inner.position,
                    queue = inner.queue.len(),
                    "transaction committed"
                );
            } else {
                trace!(target: "rewind::stm", "empty transaction dropped");
            }
            StmEvent::RecordingStop {
                title,
                reason: RecordingStopReason::Stop,
                committed,
            }
        };
        self.emit(event);
        self.emit(StmEvent::Ready { ready: true });
        self.drain_deferred();
    }

    /// Roll back and drop the open transaction. The state is already back
    /// in its steady flavor; the rollback itself runs under `Restoring`
    /// so its hooks record nothing.
    fn reject_current(&self) {
        let (transaction, steady) = {
            let mut inner = self.core.inner.borrow_mut();
            inner.deadline = None;
            let steady = inner.state;
            inner.state = StateId::Restoring;
            (inner.current.take(), steady)
        };
        let title = transaction.as_ref().and_then(|t| t.title().map(String::from));
        if let Some(mut transaction) = transaction {
            if !transaction.is_empty() {
                transaction.undo();
            }
        }
        self.core.inner.borrow_mut().state = steady;
        debug!(target: "rewind::stm", "transaction rejected");
        self.emit(StmEvent::RecordingStop {
            title,
            reason: RecordingStopReason::Rejected,
            committed: false,
        });
        self.emit(StmEvent::Ready { ready: true });
        self.drain_deferred();
    }

    /// Drop the open transaction without rolling back (disable path).
    fn discard_current(&self) {
        let title = {
            let mut inner = self.core.inner.borrow_mut();
            inner.deadline = None;
            inner
                .current
                .take()
                .and_then(|t| t.title().map(String::from))
        };
        debug!(target: "rewind::stm", "open transaction discarded by disable");
        self.emit(StmEvent::RecordingStop {
            title,
            reason: RecordingStopReason::Disabled,
            committed: false,
        });
        self.emit(StmEvent::Ready { ready: false });
    }

    /// Replay continuation: the state is already `Restoring`.
    fn run_replay(&self, cause: RestoreCause, steps: usize) {
        self.emit(StmEvent::RestoringStart);
        self.emit(StmEvent::Ready { ready: false });
        let transactions = self.replay(cause, steps);
        {
            let mut inner = self.core.inner.borrow_mut();
            inner.state = StateId::steady(inner.auto_record);
        }
        debug!(
            target: "rewind::stm",
            cause = ?cause,
            replayed = transactions.len(),
            position = self.position(),
            "restore finished"
        );
        self.emit(StmEvent::RestoringStop { cause, transactions });
        self.emit(StmEvent::Ready { ready: true });
        self.drain_deferred();
    }

    /// Walk the queue, replaying whole transactions. Each transaction is
    /// taken out of the queue while it runs so its store mutations (and
    /// the ignored hooks they fire) never alias the manager's interior
    /// borrow.
    fn replay(&self, cause: RestoreCause, steps: usize) -> Vec<TransactionSummary> {
        let (mut index, target) = {
            let inner = self.core.inner.borrow();
            let target = match cause {
                RestoreCause::Undo => inner.position.saturating_sub(steps),
                RestoreCause::Redo => inner.queue.len().min(inner.position + steps),
            };
            (inner.position, target)
        };
        let mut transactions = Vec::new();
        match cause {
            RestoreCause::Undo => {
                while index > target {
                    index -= 1;
                    let mut transaction = {
                        let mut inner = self.core.inner.borrow_mut();
                        mem::replace(&mut inner.queue[index], Transaction::new(None))
                    };
                    trace!(
                        target: "rewind::stm",
                        index,
                        actions = transaction.len(),
                        "undoing transaction"
                    );
                    transaction.undo();
                    transactions.push(transaction.summary());
                    let mut inner = self.core.inner.borrow_mut();
                    inner.queue[index] = transaction;
                    inner.position = index;
                }
            }
            RestoreCause::Redo => {
                while index < target {
                    let mut transaction = {
                        let mut inner = self.core.inner.borrow_mut();
                        mem::replace(&mut inner.queue[index], Transaction::new(None))
                    };
                    trace!(
                        target: "rewind::stm",
                        index,
                        actions = transaction.len(),
                        "redoing transaction"
                    );
                    transaction.redo();
                    transactions.push(transaction.summary());
                    let mut inner = self.core.inner.borrow_mut();
                    inner.queue[index] = transaction;
                    inner.position = index + 1;
                    index += 1;
                }
            }
        }
        transactions
    }

    /// Run queued undo/redo requests now that the machine is steady.
    fn drain_deferred(&self) {
        loop {
            let next = {
                let mut inner = self.core.inner.borrow_mut();
                if !inner.state.is_steady() {
                    return;
                }
                inner.deferred.pop_front()
            };
            match next {
                Some((cause, steps)) => self.restore(cause, steps),
                None => return,
            }
        }
    }

    // ========================================================================
    // Notification fan-out
    // ========================================================================

    /// Fire one event on both channels: the listener list, then each
    /// attached store's observer. No interior borrow is held during the
    /// calls.
    fn emit(&self, event: StmEvent) {
        let (listeners, stores) = {
            let inner = self.core.inner.borrow();
            (
                inner
                    .listeners
                    .iter()
                    .map(|(_, listener)| listener.clone())
                    .collect::<Vec<_>>(),
                inner.stores.clone(),
            )
        };
        trace!(target: "rewind::stm", event = ?event, "notify");
        for listener in &listeners {
            listener(self, &event);
        }
        for store in &stores {
            store.notify_observer(|observer| match &event {
                StmEvent::RecordingStart { .. } => observer.on_recording_start(),
                StmEvent::RecordingStop { reason, .. } => observer.on_recording_stop(*reason),
                StmEvent::RestoringStart => observer.on_restoring_start(),
                StmEvent::RestoringStop { cause, .. } => observer.on_restoring_stop(*cause),
                StmEvent::QueueReset { undo, redo } => observer.on_queue_reset(*undo, *redo),
                StmEvent::Ready { ready } => observer.on_ready(*ready),
            });
        }
    }
}

// ============================================================================
// Inbound hook dispatch
// ============================================================================

impl StmCore {
    /// Shared recording path: flush an expired debounce, then let the
    /// current state decide whether the mutation is recorded, opens an
    /// auto transaction, or is ignored.
    fn record_with(&self, build: impl FnOnce(&ActionFactories) -> Box<dyn StmAction>) {
        self.flush_expired();
        let auto_opened = {
            let mut inner = self.inner.borrow_mut();
            match inner.state {
                StateId::Recording | StateId::AutoRecording => {
                    let action = build(&inner.config.factories);
                    if let Some(transaction) = inner.current.as_mut() {
                        transaction.push(action);
                    }
                    if inner.state == StateId::AutoRecording {
                        inner.deadline = Some(Instant::now() + inner.config.stop_timeout);
                    }
                    false
                }
                StateId::AutoReady => {
                    inner.state = StateId::AutoRecording;
                    let mut transaction = Transaction::new(None);
                    transaction.push(build(&inner.config.factories));
                    inner.current = Some(transaction);
                    inner.deadline = Some(Instant::now() + inner.config.stop_timeout);
                    debug!(target: "rewind::stm", "auto recording started");
                    true
                }
                // Idle, disabled, or restoring: the mutation is not logged.
                _ => false,
            }
        };
        if auto_opened {
            if let Some(core) = self.weak.upgrade() {
                let manager = StateTrackingManager { core };
                manager.emit(StmEvent::RecordingStart { title: None });
                manager.emit(StmEvent::Ready { ready: false });
            }
        }
    }

    /// A debounce deadline that expired before this mutation closes the
    /// old transaction first, so the mutation joins a new one.
    fn flush_expired(&self) {
        let due = {
            let inner = self.inner.borrow();
            inner.state == StateId::AutoRecording
                && inner.deadline.is_some_and(|deadline| Instant::now() >= deadline)
        };
        if !due {
            return;
        }
        if let Some(core) = self.weak.upgrade() {
            let manager = StateTrackingManager { core };
            debug!(target: "rewind::stm", "auto-record debounce expired before next mutation");
            let transition = state::on_stop_transaction(StateId::AutoRecording, None);
            manager.apply(transition);
        }
    }
}

impl MutationHooks for StmCore {
    fn on_model_update(&self, store: &Store, record: ModelId, new: FieldPatch, old: FieldPatch) {
        let store = store.clone();
        self.record_with(move |factories| {
            (factories.update)(UpdatePayload {
                store,
                record,
                new_values: new,
                old_values: old,
            })
        });
    }

    fn on_model_insert_child(
        &self,
        store: &Store,
        parent: ModelId,
        index: usize,
        children: Vec<ModelId>,
        moves: Vec<ChildMove>,
    ) {
        let store = store.clone();
        self.record_with(move |factories| {
            (factories.insert_child)(InsertChildPayload {
                store,
                parent,
                index,
                children,
                moves,
            })
        });
    }

    fn on_model_remove_child(
        &self,
        store: &Store,
        parent: ModelId,
        removed: Vec<Subtree>,
        prev_indices: Vec<usize>,
    ) {
        let store = store.clone();
        self.record_with(move |factories| {
            (factories.remove_child)(RemoveChildPayload {
                store,
                parent,
                removed,
                prev_indices,
            })
        });
    }

    fn on_store_add(&self, store: &Store, records: Vec<ModelId>, silent: bool) {
        let store = store.clone();
        self.record_with(move |factories| {
            (factories.add)(AddPayload { store, records, silent })
        });
    }

    fn on_store_insert(
        &self,
        store: &Store,
        index: usize,
        records: Vec<ModelId>,
        prev_indices: Vec<Option<usize>>,
        silent: bool,
    ) {
        let store = store.clone();
        self.record_with(move |factories| {
            (factories.insert)(InsertPayload {
                store,
                index,
                records,
                prev_indices,
                silent,
            })
        });
    }

    fn on_store_remove(
        &self,
        store: &Store,
        removed: Vec<Subtree>,
        prev_indices: Vec<usize>,
        silent: bool,
    ) {
        let store = store.clone();
        self.record_with(move |factories| {
            (factories.remove)(RemovePayload {
                store,
                removed,
                prev_indices,
                silent,
            })
        });
    }

    fn on_store_remove_all(&self, store: &Store, removed: Vec<Subtree>, silent: bool) {
        let store = store.clone();
        self.record_with(move |factories| {
            (factories.remove_all)(RemoveAllPayload { store, removed, silent })
        });
    }
}
