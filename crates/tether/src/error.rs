//! Error types surfaced by the dispatcher, pending operations, and hosts.

use std::error::Error;

use thiserror::Error;

/// Errors raised while delivering a message or registering a callback.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The raw inbound text was not a JSON object with a string `type`.
    #[error("failed to decode inbound message: {0}")]
    Decode(#[source] serde_json::Error),

    /// The inbound hook outlived the dispatcher it feeds.
    #[error("inbound hook is no longer attached to a dispatcher")]
    Detached,

    /// A receive callback failed while handling a message.
    #[error("callback registered for '{key}' failed on '{kind}' message: {source}")]
    Callback {
        /// Registration key that selected the callback.
        key: String,
        /// Type of the message being handled.
        kind: String,
        /// Failure reported by the callback.
        #[source]
        source: CallbackError,
    },
}

impl DispatchError {
    pub(crate) fn callback(key: &str, kind: &str, source: CallbackError) -> Self {
        Self::Callback {
            key: key.to_owned(),
            kind: kind.to_owned(),
            source,
        }
    }
}

/// Failure reported by a receive callback.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct CallbackError {
    message: String,
    #[source]
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl CallbackError {
    /// Builds an error without an underlying source.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Builds an error that wraps an underlying source.
    #[must_use]
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Human-friendly description without the optional source.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

impl From<DispatchError> for CallbackError {
    fn from(error: DispatchError) -> Self {
        Self::with_source("nested dispatch failed", error)
    }
}

/// Errors reported by [`crate::Host`] implementations.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HostError {
    message: String,
    #[source]
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl HostError {
    /// Builds an error without an underlying source.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Builds an error that wraps an underlying source.
    #[must_use]
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Human-friendly description without the optional source.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

impl From<DispatchError> for HostError {
    fn from(error: DispatchError) -> Self {
        Self::with_source("inbound delivery failed", error)
    }
}

/// Errors returned by [`crate::PendingOperation::wait`].
#[derive(Debug, Error)]
pub enum WaitError {
    /// The host failed to advance its event loop.
    #[error("event pump failed after {steps} step(s): {source}")]
    Pump {
        /// Pump steps completed before the failure.
        steps: u64,
        /// Failure reported by the host.
        #[source]
        source: HostError,
    },
}
