//! Publish acknowledgment responses.
//!
//! Handlers that publish a message reply with a [`PublishAck`] once the
//! message is accepted onto the transport. The ack confirms acceptance
//! only; consumption happens asynchronously.

use fleetline_core::MessageId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JSON body confirming a message was accepted for publication.
///
/// The `id` is the domain identifier the client should use for follow-up
/// (the registered car's ID, the scheduled maintenance's ID), and
/// `message_id` is the envelope identity assigned on publish.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishAck {
    /// Human-readable confirmation.
    pub message: String,
    /// Domain identifier the request created or referenced.
    pub id: Uuid,
    /// Envelope identity the published message carries.
    pub message_id: Uuid,
}

impl PublishAck {
    /// Build an ack for an accepted publication.
    #[must_use]
    pub fn accepted(message: impl Into<String>, id: Uuid, message_id: MessageId) -> Self {
        Self {
            message: message.into(),
            id,
            message_id: message_id.as_uuid(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_stable_field_names() {
        let id = Uuid::new_v4();
        let message_id = MessageId::generate();
        let ack = PublishAck::accepted("Car registration submitted", id, message_id);

        let json = serde_json::to_value(&ack).unwrap();
        assert_eq!(json["message"], "Car registration submitted");
        assert_eq!(json["id"], id.to_string());
        assert_eq!(json["message_id"], message_id.as_uuid().to_string());
    }
}
