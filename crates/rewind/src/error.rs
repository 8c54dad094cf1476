#![forbid(unsafe_code)]

//! Manager-layer errors.
//!
//! There is no recoverable error category here: mutation hooks never
//! fail, and replay only ever re-applies previously successful
//! mutations. What remains are programmer errors — calling an operation
//! the current state forbids — and those are fatal by design. The typed
//! value below exists so the panic message is structured and greppable.

use std::fmt;

/// A call that is not legal in the manager's current state.
///
/// Used as the payload of the panic raised on misuse; callers are
/// expected to consult `can_undo`/`can_redo`/`is_ready` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IllegalCall {
    /// Name of the offending operation.
    pub op: &'static str,
    /// Name of the state the machine was in.
    pub state: &'static str,
}

impl fmt::Display for IllegalCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal call to {} in state {}", self.op, self.state)
    }
}

impl std::error::Error for IllegalCall {}

/// Abort on an illegal call. Never returns.
pub(crate) fn illegal(op: &'static str, state: &'static str) -> ! {
    panic!("{}", IllegalCall { op, state })
}
