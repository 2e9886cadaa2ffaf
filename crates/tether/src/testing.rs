//! Scripted in-memory host for exercising dispatchers without a real event
//! loop.
//!
//! [`ScriptedHost`] records every outbound envelope and holds a FIFO of raw
//! inbound messages. Each [`Host::pump`] step delivers exactly one scheduled
//! message through the installed hook. Pumping with nothing scheduled fails,
//! which turns a wait that could never complete into an error.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use serde_json::Value;

use crate::error::{DispatchError, HostError};
use crate::host::{Host, InboundHook};

/// Envelope captured by [`ScriptedHost::send`](Host::send).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEnvelope {
    /// Serialised envelope text.
    pub envelope: String,
    /// Raw side-channel buffer, if any.
    pub data: Option<Vec<u8>>,
}

/// Host double that delivers scripted inbound messages one pump step at a
/// time.
#[derive(Debug, Default)]
pub struct ScriptedHost {
    hook: RefCell<Option<InboundHook>>,
    scheduled: RefCell<VecDeque<String>>,
    sent: RefCell<Vec<SentEnvelope>>,
    pump_steps: Cell<u64>,
}

impl ScriptedHost {
    /// Builds an empty host ready to be shared with a dispatcher.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Queues `raw` for delivery on a later pump step.
    pub fn schedule(&self, raw: impl Into<String>) {
        self.scheduled.borrow_mut().push_back(raw.into());
    }

    /// Delivers `raw` immediately through the installed hook.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Detached`] when no hook is installed, and
    /// otherwise whatever the hook reports.
    pub fn deliver(&self, raw: &str) -> Result<(), DispatchError> {
        let hook = self.hook.borrow().clone();
        match hook {
            Some(hook) => hook.deliver(raw),
            None => Err(DispatchError::Detached),
        }
    }

    /// Envelopes sent so far, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<SentEnvelope> {
        self.sent.borrow().clone()
    }

    /// Sent envelopes parsed back into JSON; unparsable text becomes a string.
    #[must_use]
    pub fn sent_values(&self) -> Vec<Value> {
        self.sent
            .borrow()
            .iter()
            .map(|sent| {
                serde_json::from_str(&sent.envelope)
                    .unwrap_or_else(|_| Value::String(sent.envelope.clone()))
            })
            .collect()
    }

    /// Pump steps taken so far, including failed ones.
    #[must_use]
    pub fn pump_steps(&self) -> u64 {
        self.pump_steps.get()
    }

    /// Messages still waiting for a pump step.
    #[must_use]
    pub fn scheduled_len(&self) -> usize {
        self.scheduled.borrow().len()
    }

    /// Whether a dispatcher hook is installed and still alive.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.hook
            .borrow()
            .as_ref()
            .is_some_and(InboundHook::is_attached)
    }
}

impl Host for ScriptedHost {
    fn send(&self, envelope: &str, data: Option<&[u8]>) -> Result<(), HostError> {
        self.sent.borrow_mut().push(SentEnvelope {
            envelope: envelope.to_owned(),
            data: data.map(<[u8]>::to_vec),
        });
        Ok(())
    }

    fn set_incoming_handler(&self, hook: InboundHook) {
        *self.hook.borrow_mut() = Some(hook);
    }

    fn pump(&self) -> Result<(), HostError> {
        self.pump_steps.set(self.pump_steps.get() + 1);
        let next = self.scheduled.borrow_mut().pop_front();
        let Some(raw) = next else {
            return Err(HostError::new("no scheduled events left to pump"));
        };
        let hook = self.hook.borrow().clone();
        let Some(hook) = hook else {
            return Err(HostError::new("no inbound handler installed"));
        };
        hook.deliver(&raw).map_err(HostError::from)
    }
}
