//! Message envelope and identity metadata.
//!
//! An [`Envelope`] pairs an immutable payload with the identity metadata the
//! pipeline needs for correlation: a mandatory message id, an optional
//! correlation id, and an optional conversation id. The envelope is created
//! once by the publisher and carried unchanged through the transport.
//!
//! # Identity Invariants
//!
//! - `message_id` is always present, unique per publish, and immutable.
//! - `correlation_id`, when present, is stable across all redeliveries of
//!   the same logical message. The transport must not mutate it on retry.
//! - `conversation_id` groups a causal chain of messages and is purely
//!   informational to the pipeline.
//!
//! # Wire Format
//!
//! The broker moves [`TransportMessage`] values: the type tag, the three
//! identifiers as typed fields, and the bincode-encoded payload. The
//! consumer runtime decodes the payload bytes back into a typed envelope
//! before dispatching. Identifiers survive the round-trip bit-for-bit.

use crate::message::{Message, MessageError};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt;
use uuid::Uuid;

/// Globally unique message identifier, assigned once at publish.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Generate a fresh message id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier shared by all messages belonging to one logical business
/// transaction. Stable across redeliveries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate a fresh correlation id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier grouping a causal chain of messages. Informational only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(Uuid);

impl ConversationId {
    /// Generate a fresh conversation id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An immutable payload plus identity metadata.
///
/// Produced by the publisher, carried unchanged through the transport,
/// consumed by the pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope<M> {
    /// Unique per publish, always present.
    pub message_id: MessageId,

    /// Stable correlation identity; absent when the publisher had none to
    /// offer, in which case the pipeline anchors on `message_id`.
    pub correlation_id: Option<CorrelationId>,

    /// Causal-chain grouping, informational only.
    pub conversation_id: Option<ConversationId>,

    /// The typed business record.
    pub payload: M,
}

impl<M: Message> Envelope<M> {
    /// Wrap a payload with a freshly generated message id and no
    /// correlation metadata.
    #[must_use]
    pub fn new(payload: M) -> Self {
        Self {
            message_id: MessageId::generate(),
            correlation_id: None,
            conversation_id: None,
            payload,
        }
    }

    /// Attach a correlation id.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Attach a conversation id.
    #[must_use]
    pub fn with_conversation_id(mut self, conversation_id: ConversationId) -> Self {
        self.conversation_id = Some(conversation_id);
        self
    }

    /// Encode this envelope into its wire form.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::SerializationError`] if the payload cannot
    /// be serialized.
    pub fn to_transport(&self) -> Result<TransportMessage, MessageError>
    where
        M: Serialize,
    {
        Ok(TransportMessage {
            message_type: M::message_type().to_string(),
            message_id: self.message_id,
            correlation_id: self.correlation_id,
            conversation_id: self.conversation_id,
            payload: self.payload.to_bytes()?,
        })
    }

    /// Decode a wire message back into a typed envelope.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::UnknownMessageType`] if the wire type tag
    /// does not match `M`, or [`MessageError::DeserializationError`] if the
    /// payload bytes cannot be decoded.
    pub fn from_transport(transport: &TransportMessage) -> Result<Self, MessageError>
    where
        M: DeserializeOwned,
    {
        if transport.message_type != M::message_type() {
            return Err(MessageError::UnknownMessageType(
                transport.message_type.clone(),
            ));
        }

        Ok(Self {
            message_id: transport.message_id,
            correlation_id: transport.correlation_id,
            conversation_id: transport.conversation_id,
            payload: M::from_bytes(&transport.payload)?,
        })
    }
}

/// The wire form of an envelope, as the broker moves it.
///
/// The three identifiers are typed fields rather than free-form metadata so
/// the consume pipeline can recover them without parsing. The payload stays
/// opaque until the runtime routes the message to its typed consumer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransportMessage {
    /// The payload's stable type tag (e.g., "CarRegistered").
    pub message_type: String,

    /// Unique per publish.
    pub message_id: MessageId,

    /// Stable across redeliveries, when present.
    pub correlation_id: Option<CorrelationId>,

    /// Causal-chain grouping, when present.
    pub conversation_id: Option<ConversationId>,

    /// The bincode-encoded payload.
    pub payload: Vec<u8>,
}

impl TransportMessage {
    /// Serialize the whole wire message to bincode bytes.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::SerializationError`] on encoder failure.
    pub fn to_bytes(&self) -> Result<Vec<u8>, MessageError> {
        bincode::serialize(self).map_err(|e| MessageError::SerializationError(e.to_string()))
    }

    /// Deserialize a wire message from bincode bytes.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::DeserializationError`] if the bytes are not
    /// a valid wire message.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MessageError> {
        bincode::deserialize(bytes).map_err(|e| MessageError::DeserializationError(e.to_string()))
    }

    /// The identifier the tracing filter anchors on: the correlation id
    /// when present, the message id otherwise.
    #[must_use]
    pub fn anchor_uuid(&self) -> Uuid {
        self.correlation_id
            .map_or_else(|| self.message_id.as_uuid(), |c| c.as_uuid())
    }
}

impl fmt::Display for TransportMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TransportMessage {{ type: {}, message_id: {}, size: {} bytes }}",
            self.message_type,
            self.message_id,
            self.payload.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
    struct TestPayload {
        name: String,
    }

    impl Message for TestPayload {
        fn message_type() -> &'static str {
            "TestPayload"
        }
    }

    #[test]
    #[allow(clippy::expect_used)]
    fn envelope_transport_roundtrip_preserves_identifiers() {
        let envelope = Envelope::new(TestPayload {
            name: "alpha".to_string(),
        })
        .with_correlation_id(CorrelationId::generate())
        .with_conversation_id(ConversationId::generate());

        let transport = envelope.to_transport().expect("encode should succeed");
        let decoded: Envelope<TestPayload> =
            Envelope::from_transport(&transport).expect("decode should succeed");

        assert_eq!(envelope, decoded);
    }

    #[test]
    #[allow(clippy::expect_used)]
    fn wire_roundtrip_preserves_everything() {
        let envelope = Envelope::new(TestPayload {
            name: "beta".to_string(),
        });

        let transport = envelope.to_transport().expect("encode should succeed");
        let bytes = transport.to_bytes().expect("serialize should succeed");
        let decoded = TransportMessage::from_bytes(&bytes).expect("deserialize should succeed");

        assert_eq!(transport, decoded);
    }

    #[test]
    #[allow(clippy::expect_used)]
    fn decoding_wrong_type_tag_is_rejected() {
        let envelope = Envelope::new(TestPayload {
            name: "gamma".to_string(),
        });
        let mut transport = envelope.to_transport().expect("encode should succeed");
        transport.message_type = "SomethingElse".to_string();

        let result: Result<Envelope<TestPayload>, _> = Envelope::from_transport(&transport);
        assert!(matches!(
            result,
            Err(MessageError::UnknownMessageType(tag)) if tag == "SomethingElse"
        ));
    }

    #[test]
    #[allow(clippy::expect_used)]
    fn anchor_prefers_correlation_id() {
        let correlation = CorrelationId::generate();
        let envelope = Envelope::new(TestPayload {
            name: "delta".to_string(),
        })
        .with_correlation_id(correlation);
        let transport = envelope.to_transport().expect("encode should succeed");

        assert_eq!(transport.anchor_uuid(), correlation.as_uuid());
    }

    #[test]
    #[allow(clippy::expect_used)]
    fn anchor_falls_back_to_message_id() {
        let envelope = Envelope::new(TestPayload {
            name: "epsilon".to_string(),
        });
        let transport = envelope.to_transport().expect("encode should succeed");

        assert_eq!(transport.anchor_uuid(), envelope.message_id.as_uuid());
    }
}
