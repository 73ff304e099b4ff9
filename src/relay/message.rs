//! Relay Message
//!
//! One decoded unit of relay traffic. The relay does not define a schema:
//! any well-formed JSON value (object, array, primitive) is accepted and
//! forwarded verbatim. Payloads are re-encoded on the way out, so recipients
//! see a value-identical (not necessarily byte-identical) message.

use serde_json::Value;
use thiserror::Error;

/// A well-formed message accepted for relaying.
///
/// Exists only for the duration of one broadcast pass; nothing is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayMessage(Value);

impl RelayMessage {
    /// Parse a raw text frame into a relay message.
    ///
    /// Accepts any JSON value. Malformed input is a [`DecodeError`] and the
    /// frame is dropped by the caller; it never tears down the connection.
    pub fn parse(raw: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(raw)?;
        Ok(Self(value))
    }

    /// Serialize for delivery to a recipient.
    pub fn to_text(&self) -> String {
        // A Value always serializes; this cannot fail.
        self.0.to_string()
    }

    /// The decoded payload.
    pub fn value(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for RelayMessage {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Inbound frame was not valid JSON
#[derive(Debug, Error)]
#[error("invalid message frame: {0}")]
pub struct DecodeError(#[from] serde_json::Error);
