#![forbid(unsafe_code)]

//! Transactions: ordered action logs.
//!
//! One transaction is one undo/redo step. Actions are appended in the
//! order their hooks fired; `undo` replays them in reverse insertion
//! order and `redo` in forward order, because later actions may depend on
//! state produced by earlier ones (insert then update, for instance).

use std::fmt;

use crate::action::StmAction;
use crate::event::TransactionSummary;

/// An ordered log of reversible actions with an optional title.
pub struct Transaction {
    title: Option<String>,
    actions: Vec<Box<dyn StmAction>>,
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("title", &self.title)
            .field("actions", &self.actions.len())
            .finish()
    }
}

impl Transaction {
    /// Create an empty transaction.
    #[must_use]
    pub fn new(title: Option<String>) -> Self {
        Self {
            title,
            actions: Vec::new(),
        }
    }

    /// The transaction title, if any.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Set or replace the title.
    pub fn set_title(&mut self, title: Option<String>) {
        self.title = title;
    }

    /// Number of recorded actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Append an action. Only the manager calls this, while recording.
    pub fn push(&mut self, action: Box<dyn StmAction>) {
        self.actions.push(action);
    }

    /// Reverse every action, newest first.
    pub fn undo(&mut self) {
        for action in self.actions.iter_mut().rev() {
            action.undo();
        }
    }

    /// Re-apply every action, oldest first.
    pub fn redo(&mut self) {
        for action in self.actions.iter_mut() {
            action.redo();
        }
    }

    /// Consume the transaction, yielding its actions in insertion order.
    pub(crate) fn into_actions(self) -> Vec<Box<dyn StmAction>> {
        self.actions
    }

    pub(crate) fn summary(&self) -> TransactionSummary {
        TransactionSummary {
            title: self.title.clone(),
            actions: self.actions.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Test action that logs its invocations into a shared trace.
    struct TraceAction {
        tag: &'static str,
        trace: Rc<RefCell<Vec<String>>>,
    }

    impl StmAction for TraceAction {
        fn undo(&mut self) {
            self.trace.borrow_mut().push(format!("undo {}", self.tag));
        }

        fn redo(&mut self) {
            self.trace.borrow_mut().push(format!("redo {}", self.tag));
        }

        fn kind(&self) -> &'static str {
            "trace"
        }
    }

    #[test]
    fn test_undo_runs_in_reverse_order() {
        let trace = Rc::new(RefCell::new(Vec::new()));
        let mut t = Transaction::new(Some("move card".into()));
        for tag in ["a", "b", "c"] {
            t.push(Box::new(TraceAction { tag, trace: trace.clone() }));
        }
        t.undo();
        assert_eq!(*trace.borrow(), vec!["undo c", "undo b", "undo a"]);
        trace.borrow_mut().clear();
        t.redo();
        assert_eq!(*trace.borrow(), vec!["redo a", "redo b", "redo c"]);
    }

    #[test]
    fn test_title_and_summary() {
        let mut t = Transaction::new(None);
        assert!(t.is_empty());
        t.set_title(Some("rename".into()));
        assert_eq!(t.title(), Some("rename"));
        assert_eq!(
            t.summary(),
            TransactionSummary { title: Some("rename".into()), actions: 0 }
        );
    }
}
