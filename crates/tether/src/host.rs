//! Collaborator seam between the dispatcher and the embedding host.

use std::fmt;
use std::rc::Weak;

use crate::dispatcher::DispatcherState;
use crate::error::{DispatchError, HostError};

/// Behaviour required from the process embedding a script context.
///
/// Methods take `&self` because the host is shared between the dispatcher,
/// the session facade, and every pending operation, and it is re-entered from
/// inside [`Host::pump`]. Implementations use interior mutability.
pub trait Host {
    /// Delivers a serialised outbound envelope with an optional raw buffer.
    ///
    /// Delivery is fire-and-forget: `Ok` only means the host accepted it.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] when the host refuses the envelope.
    fn send(&self, envelope: &str, data: Option<&[u8]>) -> Result<(), HostError>;

    /// Installs the hook the host calls once per inbound message.
    ///
    /// A later call replaces the previous hook.
    fn set_incoming_handler(&self, hook: InboundHook);

    /// Advances the host event loop by one unit of work.
    ///
    /// A step may deliver any number of inbound messages (including none),
    /// fire timers, or do nothing observable.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] when the event loop cannot make progress, or
    /// when a delivery made during the step fails.
    fn pump(&self) -> Result<(), HostError>;
}

impl fmt::Debug for dyn Host {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("Host")
    }
}

/// Entry point handed to the host for inbound deliveries.
///
/// The hook holds a weak reference: it never keeps a dispatcher alive, and
/// delivering after the dispatcher is gone reports
/// [`DispatchError::Detached`].
#[derive(Clone)]
pub struct InboundHook {
    state: Weak<DispatcherState>,
}

impl InboundHook {
    pub(crate) const fn new(state: Weak<DispatcherState>) -> Self {
        Self { state }
    }

    /// Decodes `raw`, appends it to the dispatcher queue, and drains.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Decode`] for malformed input (nothing is
    /// enqueued), [`DispatchError::Detached`] when the dispatcher has been
    /// dropped, and [`DispatchError::Callback`] when a callback run by the
    /// drain fails.
    pub fn deliver(&self, raw: &str) -> Result<(), DispatchError> {
        let state = self.state.upgrade().ok_or(DispatchError::Detached)?;
        state.deliver(raw)
    }

    /// Whether the dispatcher behind this hook is still alive.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.state.strong_count() > 0
    }
}

impl fmt::Debug for InboundHook {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("InboundHook")
            .field("attached", &self.is_attached())
            .finish()
    }
}
