//! Message trait and serialization helpers.
//!
//! Every payload that travels through the pipeline implements [`Message`].
//! Messages are immutable business records; the type tag returned by
//! [`Message::message_type`] drives topic naming and consumer routing.
//!
//! # Serialization
//!
//! Messages are serialized with `bincode` on the wire. The trait provides
//! default implementations that work for any type implementing `Serialize`
//! and `DeserializeOwned`.
//!
//! # Example
//!
//! ```
//! use fleetline_core::message::Message;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Clone, Debug, Serialize, Deserialize)]
//! struct CarRegistered {
//!     vin: String,
//! }
//!
//! impl Message for CarRegistered {
//!     fn message_type() -> &'static str {
//!         "CarRegistered"
//!     }
//! }
//! ```

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

/// Error types for message serialization.
#[derive(Error, Debug)]
pub enum MessageError {
    /// Failed to serialize a message to bytes.
    #[error("Failed to serialize message: {0}")]
    SerializationError(String),

    /// Failed to deserialize a message from bytes.
    #[error("Failed to deserialize message: {0}")]
    DeserializationError(String),

    /// A wire message carried a type tag no consumer is registered for.
    #[error("Unknown message type: {0}")]
    UnknownMessageType(String),
}

/// A typed business record carried through the pipeline inside an envelope.
///
/// Messages are facts handed over by the HTTP boundary and consumed
/// asynchronously. They must be `Send + Sync + 'static` so they can cross
/// task boundaries in the async runtime.
///
/// # Type Tag
///
/// [`Message::message_type`] must return a stable identifier. It is used for:
/// - routing a wire message to the registered consumer
/// - deriving the broker topic name (see [`crate::bus::topic_for`])
/// - tagging the consume span (`messaging.message_type`)
pub trait Message: Send + Sync + 'static {
    /// Returns the stable type tag for this message type.
    fn message_type() -> &'static str;

    /// Serialize this message to bincode bytes.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::SerializationError`] if the message cannot be
    /// serialized, which is rare with bincode.
    fn to_bytes(&self) -> Result<Vec<u8>, MessageError>
    where
        Self: Serialize,
    {
        bincode::serialize(self).map_err(|e| MessageError::SerializationError(e.to_string()))
    }

    /// Deserialize a message from bincode bytes.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::DeserializationError`] if the bytes are
    /// corrupted or encode a different message type.
    fn from_bytes(bytes: &[u8]) -> Result<Self, MessageError>
    where
        Self: DeserializeOwned + Sized,
    {
        bincode::deserialize(bytes).map_err(|e| MessageError::DeserializationError(e.to_string()))
    }
}
