//! Message bus abstraction.
//!
//! The bus is the pipeline's view of the broker: publish a wire message to
//! a topic, subscribe to topics and receive a stream of wire messages.
//! Delivery is at least once with no ordering guarantee between distinct
//! correlation groups; consumers must be idempotent.
//!
//! # Implementations
//!
//! - `InMemoryMessageBus` in `fleetline-testing` for tests
//! - `RedpandaMessageBus` in `fleetline-redpanda` for production
//!
//! # Dyn Compatibility
//!
//! The trait uses explicit `Pin<Box<dyn Future>>` returns instead of
//! `async fn` so it can be used as a trait object (`Arc<dyn MessageBus>`)
//! shared between the HTTP publisher and the consumer runtime.

use crate::envelope::TransportMessage;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during message bus operations.
#[derive(Error, Debug, Clone)]
pub enum MessageBusError {
    /// Failed to connect to the broker.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to publish a message to a topic.
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed.
        topic: String,
        /// The reason for failure.
        reason: String,
    },

    /// Failed to subscribe to topics.
    #[error("Subscription failed for topics {topics:?}: {reason}")]
    SubscriptionFailed {
        /// The topics that failed to subscribe.
        topics: Vec<String>,
        /// The reason for failure.
        reason: String,
    },

    /// A delivered payload could not be decoded into a wire message.
    #[error("Decode failed: {0}")]
    DecodeFailed(String),

    /// Network or transport error.
    #[error("Transport error: {0}")]
    TransportError(String),
}

/// Stream of wire messages from a subscription.
///
/// Each item is a `Result`: decode and transport failures surface in-band
/// so the consumer runtime can log them and keep processing.
pub type MessageStream =
    Pin<Box<dyn Stream<Item = Result<TransportMessage, MessageBusError>> + Send>>;

/// Trait for message bus implementations.
///
/// # Delivery Semantics
///
/// - **At-least-once**: a message may be delivered more than once.
/// - **No cross-group ordering**: only messages within one correlation
///   group may share a partition; nothing is guaranteed between groups.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`: the same bus instance is shared
/// by HTTP handlers publishing and the runtime consuming.
pub trait MessageBus: Send + Sync {
    /// Publish a wire message to a topic.
    ///
    /// # Errors
    ///
    /// Returns [`MessageBusError::PublishFailed`] if the publish fails.
    fn publish(
        &self,
        topic: &str,
        message: &TransportMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), MessageBusError>> + Send + '_>>;

    /// Subscribe to one or more topics and receive a stream of messages.
    ///
    /// # Errors
    ///
    /// Returns [`MessageBusError::SubscriptionFailed`] if subscription
    /// fails.
    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<MessageStream, MessageBusError>> + Send + '_>>;
}

/// Derive the broker topic for a message type tag.
///
/// Type tags are PascalCase; topics are the kebab-case expansion
/// (`CarRegistered` → `car-registered`), matching the transport's
/// type-based routing convention.
#[must_use]
pub fn topic_for(message_type: &str) -> String {
    let mut topic = String::with_capacity(message_type.len() + 4);
    for (i, ch) in message_type.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                topic.push('-');
            }
            topic.push(ch.to_ascii_lowercase());
        } else {
            topic.push(ch);
        }
    }
    topic
}
