//! Per-context facade over the dispatcher and the host collaborators.
//!
//! A [`Session`] is what a script context is handed at start-up. It is built
//! explicitly by the embedder and torn down with the context; nothing here is
//! process-global.

use std::fmt::Display;
use std::rc::Rc;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::dispatcher::Dispatcher;
use crate::error::{CallbackError, DispatchError, HostError};
use crate::host::Host;
use crate::memory::{self, Memory, MemoryError, NativePointer, PointerParseError};
use crate::message::{Message, Outbound};
use crate::operation::PendingOperation;

/// Tracing target for outbound session traffic.
const SESSION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::session");

/// Errors raised by outbound session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The payload could not be represented as JSON.
    #[error("failed to encode outbound payload: {0}")]
    Encode(#[from] serde_json::Error),
    /// The host rejected the envelope.
    #[error("host rejected outbound envelope: {0}")]
    Host(#[from] HostError),
}

/// Script-facing bundle of dispatch, messaging, logging, and memory staging.
#[derive(Debug)]
pub struct Session {
    host: Rc<dyn Host>,
    memory: Rc<dyn Memory>,
    dispatcher: Dispatcher,
}

impl Session {
    /// Builds a session and attaches a fresh dispatcher to `host`.
    #[must_use]
    pub fn new(host: Rc<dyn Host>, memory: Rc<dyn Memory>) -> Self {
        let dispatcher = Dispatcher::new(Rc::clone(&host));
        Self {
            host,
            memory,
            dispatcher,
        }
    }

    /// Dispatcher owned by this session.
    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Receives the next message no exact registration claims.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::register_callback`].
    pub fn recv<F>(&self, callback: F) -> Result<PendingOperation, DispatchError>
    where
        F: FnOnce(Message) -> Result<(), CallbackError> + 'static,
    {
        self.dispatcher.recv(callback)
    }

    /// Receives the next message of type `kind`.
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
        self.dispatcher.recv_type(kind, callback)
    }

    /// Sends `{"type":"send","payload":payload}` with an optional raw buffer.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Encode`] for payloads that are not valid JSON
    /// values and [`SessionError::Host`] when the host refuses the envelope.
    pub fn send<T>(&self, payload: &T, data: Option<&[u8]>) -> Result<(), SessionError>
    where
        T: Serialize + ?Sized,
    {
        let value = serde_json::to_value(payload)?;
        let envelope = Outbound::Send(&value).encode()?;
        debug!(
            target: SESSION_TARGET,
            bytes = envelope.len(),
            data_bytes = data.map_or(0, <[u8]>::len),
            "sending message"
        );
        self.host.send(&envelope, data)?;
        Ok(())
    }

    /// Forwards `parts`, joined by single spaces, as a `log` envelope.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Host`] when the host refuses the envelope.
    pub fn log<I>(&self, parts: I) -> Result<(), SessionError>
    where
        I: IntoIterator,
        I::Item: Display,
    {
        let line = parts
            .into_iter()
            .map(|part| part.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        let envelope = Outbound::Log(&line).encode()?;
        self.host.send(&envelope, None)?;
        Ok(())
    }

    /// Copies `size` bytes at `source` into a freshly allocated region.
    ///
    /// # Errors
    ///
    /// Propagates [`MemoryError`] from the host memory facility.
    pub fn duplicate(
        &self,
        source: NativePointer,
        size: usize,
    ) -> Result<NativePointer, MemoryError> {
        memory::duplicate(self.memory.as_ref(), source, size)
    }

    /// Parses a native address from decimal or `0x`-prefixed hex text.
    ///
    /// # Errors
    ///
    /// Returns [`PointerParseError`] for text that is not an address.
    pub fn ptr(text: &str) -> Result<NativePointer, PointerParseError> {
        text.parse()
    }
}
