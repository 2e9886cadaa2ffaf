//! Inbound queue and type-keyed matching of pending receive operations.
//!
//! The dispatcher owns two structures: a backlog of decoded messages in
//! arrival order and a table of pending operations keyed by message type plus
//! a single wildcard slot. Every inbound delivery and every registration runs
//! a drain pass that hands queued messages to matching operations.
//!
//! # Drain passes
//!
//! A pass snapshots the whole backlog and walks it front to back. Each message
//! goes to the operation registered for its exact type, else to the wildcard
//! operation, else it is deferred. A claimed operation leaves the table before
//! its callback runs, so it can fire only once and the callback may register a
//! replacement under the same key.
//!
//! Callbacks may re-enter the dispatcher (register, or pump the host through a
//! nested wait). A re-entrant pass starts from the backlog as it stands at
//! that moment: messages the outer pass already deferred, then the messages it
//! has not examined yet, then anything that arrived since. Arrival order is
//! therefore never violated, and a handler registered mid-pass is offered
//! earlier deferred messages before later ones.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};

use tracing::{debug, trace, warn};

use crate::error::{CallbackError, DispatchError};
use crate::host::{Host, InboundHook};
use crate::message::{Message, TypeKey};
use crate::operation::{OperationState, PendingOperation};

/// Tracing target for dispatch events.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Routes inbound messages to single-use receive registrations.
///
/// Cloning is cheap and yields another handle to the same queue and table.
/// Callbacks that need to register follow-up operations should capture a
/// [`WeakDispatcher`] to avoid keeping the dispatcher alive through its own
/// table.
#[derive(Clone)]
pub struct Dispatcher {
    state: Rc<DispatcherState>,
}

impl Dispatcher {
    /// Builds a dispatcher and installs its inbound hook with the host.
    #[must_use]
    pub fn new(host: Rc<dyn Host>) -> Self {
        let state = Rc::new(DispatcherState {
            host: Rc::clone(&host),
            backlog: RefCell::new(Backlog::default()),
            operations: RefCell::new(OperationTable::default()),
        });
        host.set_incoming_handler(InboundHook::new(Rc::downgrade(&state)));
        Self { state }
    }

    /// Registers `callback` for the next message whose type matches `key`.
    ///
    /// Any operation already pending under the same key is discarded without
    /// notice and its callback never runs. The backlog is drained immediately,
    /// so a message that arrived before the registration is handled before
    /// this returns.
    ///
    /// # Errors
    ///
    /// Registration itself cannot fail. The error is a
    /// [`DispatchError::Callback`] from any callback run by the drain.
    pub fn register_callback<K, F>(
        &self,
        key: K,
        callback: F,
    ) -> Result<PendingOperation, DispatchError>
    where
        K: Into<TypeKey>,
        F: FnOnce(Message) -> Result<(), CallbackError> + 'static,
    {
        let operation = Rc::new(OperationState::new(key.into(), Box::new(callback)));
        let superseded = self
            .state
            .operations
            .borrow_mut()
            .insert(Rc::clone(&operation));
        if superseded.is_some() {
            debug!(
                target: DISPATCH_TARGET,
                key = %operation.key(),
                "superseded pending receive operation"
            );
        }
        drop(superseded);

        self.state.drain()?;
        Ok(PendingOperation::new(operation, Rc::clone(&self.state.host)))
    }

    /// Registers a wildcard callback for the next unclaimed message.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::register_callback`].
    pub fn recv<F>(&self, callback: F) -> Result<PendingOperation, DispatchError>
    where
        F: FnOnce(Message) -> Result<(), CallbackError> + 'static,
    {
        self.register_callback(TypeKey::Wildcard, callback)
    }

    /// Registers a callback for the next message of type `kind`.
    ///
    /// Passing `"*"` is equivalent to [`Dispatcher::recv`].
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::register_callback`].
    pub fn recv_type<F>(
        &self,
        kind: impl Into<String>,
        callback: F,
    ) -> Result<PendingOperation, DispatchError>
    where
        F: FnOnce(Message) -> Result<(), CallbackError> + 'static,
    {
        self.register_callback(TypeKey::new(kind), callback)
    }

    /// Decodes and enqueues a raw inbound message, then drains.
    ///
    /// Equivalent to calling [`InboundHook::deliver`] on the installed hook.
    ///
    /// # Errors
    ///
    /// See [`InboundHook::deliver`].
    pub fn deliver(&self, raw: &str) -> Result<(), DispatchError> {
        self.state.deliver(raw)
    }

    /// Returns a fresh inbound hook bound to this dispatcher.
    #[must_use]
    pub fn inbound_hook(&self) -> InboundHook {
        InboundHook::new(Rc::downgrade(&self.state))
    }

    /// Number of messages waiting for a matching registration.
    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.state.backlog.borrow().len()
    }

    /// Types of the waiting messages, in arrival order.
    #[must_use]
    pub fn queued_types(&self) -> Vec<String> {
        self.state
            .backlog
            .borrow()
            .iter()
            .map(|message| message.kind().to_owned())
            .collect()
    }

    /// Whether an operation is pending under `key`.
    #[must_use]
    pub fn has_pending(&self, key: &TypeKey) -> bool {
        self.state.operations.borrow().contains(key)
    }

    /// Number of pending operations, wildcard included.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.state.operations.borrow().len()
    }

    /// Creates a non-owning handle to this dispatcher.
    #[must_use]
    pub fn downgrade(&self) -> WeakDispatcher {
        WeakDispatcher {
            state: Rc::downgrade(&self.state),
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Dispatcher")
            .field("queued", &self.queued_len())
            .field("pending", &self.pending_len())
            .finish()
    }
}

/// Non-owning handle to a [`Dispatcher`].
#[derive(Clone)]
pub struct WeakDispatcher {
    state: Weak<DispatcherState>,
}

impl WeakDispatcher {
    /// Recovers the dispatcher if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Dispatcher> {
        self.state.upgrade().map(|state| Dispatcher { state })
    }
}

impl fmt::Debug for WeakDispatcher {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("WeakDispatcher")
            .field("alive", &(self.state.strong_count() > 0))
            .finish()
    }
}

/// Queue and table shared between dispatcher handles and the inbound hook.
///
/// No `RefCell` borrow is ever held across a callback or host call.
pub(crate) struct DispatcherState {
    host: Rc<dyn Host>,
    backlog: RefCell<Backlog>,
    operations: RefCell<OperationTable>,
}

impl DispatcherState {
    pub(crate) fn deliver(&self, raw: &str) -> Result<(), DispatchError> {
        let message = Message::decode(raw)?;
        let kind = message.kind().to_owned();
        let queued = {
            let mut backlog = self.backlog.borrow_mut();
            backlog.arrived.push_back(message);
            backlog.len()
        };
        debug!(
            target: DISPATCH_TARGET,
            kind = %kind,
            queued,
            "enqueued inbound message"
        );
        self.drain()
    }

    fn drain(&self) -> Result<(), DispatchError> {
        let snapshot = self.backlog.borrow_mut().begin_pass();
        if snapshot == 0 {
            return Ok(());
        }
        trace!(target: DISPATCH_TARGET, snapshot, "starting drain pass");

        loop {
            let next = self.backlog.borrow_mut().in_flight.pop_front();
            let Some(message) = next else {
                break;
            };

            let claimed = self.operations.borrow_mut().claim(message.kind());
            match claimed {
                Some(operation) => Self::dispatch(&operation, message)?,
                None => {
                    trace!(
                        target: DISPATCH_TARGET,
                        kind = message.kind(),
                        "no receive operation pending, deferring"
                    );
                    self.backlog.borrow_mut().deferred.push_back(message);
                }
            }
        }
        Ok(())
    }

    fn dispatch(operation: &OperationState, message: Message) -> Result<(), DispatchError> {
        let kind = message.kind().to_owned();
        debug!(
            target: DISPATCH_TARGET,
            kind = %kind,
            key = %operation.key(),
            "dispatching message"
        );
        operation.complete(message).map_err(|source| {
            warn!(
                target: DISPATCH_TARGET,
                kind = %kind,
                key = %operation.key(),
                error = %source,
                "receive callback failed, aborting drain pass"
            );
            DispatchError::callback(operation.key().as_str(), &kind, source)
        })
    }
}

/// Messages awaiting dispatch, split by drain progress.
///
/// The logical queue is `deferred ++ in_flight ++ arrived`.
#[derive(Default)]
struct Backlog {
    /// Examined by the running pass and left unmatched.
    deferred: VecDeque<Message>,
    /// Snapshot of the running pass not yet examined.
    in_flight: VecDeque<Message>,
    /// Delivered since the running pass started.
    arrived: VecDeque<Message>,
}

impl Backlog {
    /// Folds the whole backlog into a new snapshot and returns its length.
    fn begin_pass(&mut self) -> usize {
        let mut snapshot = mem::take(&mut self.deferred);
        snapshot.append(&mut self.in_flight);
        snapshot.append(&mut self.arrived);
        self.in_flight = snapshot;
        self.in_flight.len()
    }

    fn len(&self) -> usize {
        self.deferred.len() + self.in_flight.len() + self.arrived.len()
    }

    fn iter(&self) -> impl Iterator<Item = &Message> {
        self.deferred
            .iter()
            .chain(self.in_flight.iter())
            .chain(self.arrived.iter())
    }
}

/// Pending operations: one per exact type plus one wildcard slot.
#[derive(Default)]
struct OperationTable {
    exact: HashMap<String, Rc<OperationState>>,
    wildcard: Option<Rc<OperationState>>,
}

impl OperationTable {
    /// Stores `operation`, returning the one it supersedes.
    fn insert(&mut self, operation: Rc<OperationState>) -> Option<Rc<OperationState>> {
        let key = operation.key().clone();
        match key {
            TypeKey::Exact(kind) => self.exact.insert(kind, operation),
            TypeKey::Wildcard => self.wildcard.replace(operation),
        }
    }

    /// Removes and returns the operation that should handle `kind`.
    fn claim(&mut self, kind: &str) -> Option<Rc<OperationState>> {
        self.exact.remove(kind).or_else(|| self.wildcard.take())
    }

    fn contains(&self, key: &TypeKey) -> bool {
        match key {
            TypeKey::Exact(kind) => self.exact.contains_key(kind),
            TypeKey::Wildcard => self.wildcard.is_some(),
        }
    }

    fn len(&self) -> usize {
        self.exact.len() + usize::from(self.wildcard.is_some())
    }
}
