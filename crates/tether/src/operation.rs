//! Single-use receive registrations.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::error::{CallbackError, WaitError};
use crate::host::Host;
use crate::message::{Message, TypeKey};

/// Tracing target for pending-operation events.
const OPERATION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::operation");

pub(crate) type Callback = Box<dyn FnOnce(Message) -> Result<(), CallbackError>>;

/// Shared state between a caller's handle and the dispatcher's table entry.
pub(crate) struct OperationState {
    key: TypeKey,
    callback: RefCell<Option<Callback>>,
    completed: Cell<bool>,
}

impl OperationState {
    pub(crate) fn new(key: TypeKey, callback: Callback) -> Self {
        Self {
            key,
            callback: RefCell::new(Some(callback)),
            completed: Cell::new(false),
        }
    }

    pub(crate) const fn key(&self) -> &TypeKey {
        &self.key
    }

    pub(crate) fn is_completed(&self) -> bool {
        self.completed.get()
    }

    /// Runs the callback with `message`, then marks the operation completed.
    ///
    /// The flag is set whether or not the callback succeeds. The dispatcher
    /// removes the operation from its table before calling this, so the
    /// callback runs at most once.
    pub(crate) fn complete(&self, message: Message) -> Result<(), CallbackError> {
        let callback = self.callback.borrow_mut().take();
        let outcome = match callback {
            Some(callback) => callback(message),
            None => Ok(()),
        };
        self.completed.set(true);
        outcome
    }
}

/// Handle returned for every receive registration.
///
/// The registration fires at most once. Use [`PendingOperation::wait`] to block
/// the script until it has.
pub struct PendingOperation {
    state: Rc<OperationState>,
    host: Rc<dyn Host>,
}

impl PendingOperation {
    pub(crate) const fn new(state: Rc<OperationState>, host: Rc<dyn Host>) -> Self {
        Self { state, host }
    }

    /// Key this operation was registered under.
    #[must_use]
    pub fn key(&self) -> &TypeKey {
        self.state.key()
    }

    /// Whether the callback has already run.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state.is_completed()
    }

    /// Blocks until the callback has run, pumping the host event loop.
    ///
    /// Completion is re-checked after every pump step, since a step may
    /// deliver messages and complete this operation re-entrantly. There is no
    /// timeout: if no matching message ever arrives, or the operation was
    /// superseded by a later registration under the same key, this keeps
    /// pumping for as long as the host keeps returning.
    ///
    /// # Errors
    ///
    /// Returns [`WaitError::Pump`] when a pump step fails.
    pub fn wait(&self) -> Result<(), WaitError> {
        let mut steps: u64 = 0;
        while !self.state.is_completed() {
            self.host
                .pump()
                .map_err(|source| WaitError::Pump { steps, source })?;
            steps += 1;
            trace!(
                target: OPERATION_TARGET,
                key = %self.state.key(),
                steps,
                "pumped host event loop"
            );
        }
        debug!(
            target: OPERATION_TARGET,
            key = %self.state.key(),
            steps,
            "receive operation completed"
        );
        Ok(())
    }
}

impl fmt::Debug for PendingOperation {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("PendingOperation")
            .field("key", self.state.key())
            .field("completed", &self.state.is_completed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use rstest::rstest;

    use super::*;

    fn recording_state(seen: &Rc<RefCell<Vec<String>>>) -> OperationState {
        let sink = Rc::clone(seen);
        OperationState::new(
            TypeKey::from("ping"),
            Box::new(move |message: Message| {
                sink.borrow_mut().push(message.kind().to_owned());
                Ok(())
            }),
        )
    }

    #[rstest]
    fn complete_runs_callback_then_sets_flag() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let state = recording_state(&seen);
        assert!(!state.is_completed());

        state.complete(Message::new("ping")).expect("callback succeeds");

        assert!(state.is_completed());
        assert_eq!(*seen.borrow(), vec![String::from("ping")]);
    }

    #[rstest]
    fn callback_never_runs_twice() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let state = recording_state(&seen);

        state.complete(Message::new("ping")).expect("first completion");
        state.complete(Message::new("ping")).expect("second completion");

        assert_eq!(seen.borrow().len(), 1);
    }

    #[rstest]
    fn failing_callback_still_marks_completion() {
        let state = OperationState::new(
            TypeKey::Wildcard,
            Box::new(|_message: Message| Err(CallbackError::new("boom"))),
        );

        let error = state
            .complete(Message::new("anything"))
            .expect_err("callback error propagates");

        assert_eq!(error.message(), "boom");
        assert!(state.is_completed());
    }
}
