//! Message model shared by the dispatcher and the session facade.
//!
//! Inbound messages are JSON objects carrying a string `type` discriminator
//! plus arbitrary payload fields. Outbound envelopes use the same
//! `{"type": ..., "payload": ...}` shape.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DispatchError;

/// Reserved registration key matching any type without an exact registration.
pub const WILDCARD: &str = "*";

/// A decoded inbound message.
///
/// The `type` field is lifted into [`Message::kind`]; every other field stays
/// in the payload map untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    kind: String,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl Message {
    /// Builds a message with the given type and no payload fields.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: Map::new(),
        }
    }

    /// Adds a payload field, replacing any previous value under that name.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Decodes a raw inbound envelope.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Decode`] when the text is not a JSON object
    /// with a string `type` field.
    pub fn decode(raw: &str) -> Result<Self, DispatchError> {
        serde_json::from_str(raw).map_err(DispatchError::Decode)
    }

    /// The message type used for dispatch.
    #[must_use]
    pub fn kind(&self) -> &str {
        self.kind.as_str()
    }

    /// Looks up a payload field by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Shorthand for the conventional `payload` field.
    #[must_use]
    pub fn payload(&self) -> Option<&Value> {
        self.get("payload")
    }

    /// All payload fields except `type`.
    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Reassembles the message as a JSON object, `type` included.
    #[must_use]
    pub fn into_value(self) -> Value {
        let mut object = self.fields;
        object.insert(String::from("type"), Value::String(self.kind));
        Value::Object(object)
    }
}

/// Key under which a receive registration waits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKey {
    /// Matches messages whose `type` equals the string exactly.
    Exact(String),
    /// Matches any message that no exact registration claims.
    Wildcard,
}

impl TypeKey {
    /// Builds an exact key, or the wildcard for `"*"`.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        if key == WILDCARD {
            Self::Wildcard
        } else {
            Self::Exact(key)
        }
    }

    /// Textual form of the key as registered by scripts.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Exact(key) => key.as_str(),
            Self::Wildcard => WILDCARD,
        }
    }

    /// Whether this is the wildcard key.
    #[must_use]
    pub const fn is_wildcard(&self) -> bool {
        matches!(self, Self::Wildcard)
    }
}

impl From<&str> for TypeKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for TypeKey {
    fn from(key: String) -> Self {
        Self::new(key)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Envelope written to the host through [`crate::Host::send`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Outbound<'a> {
    /// A script-level message carrying an arbitrary JSON payload.
    Send(&'a Value),
    /// A log line forwarded to the host.
    Log(&'a str),
}

impl Outbound<'_> {
    /// Serialises the envelope to its wire text.
    ///
    /// # Errors
    ///
    /// Propagates `serde_json` failures, which only occur for payloads that
    /// cannot be represented as JSON.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
