//! Dispatch registry: type tag → consumer, with the filter in between.
//!
//! Each payload type is bound to exactly one consumer. The registry keeps a
//! boxed dispatcher per type tag; dispatching a wire message decodes it into
//! the typed envelope and runs the filter-then-consumer sequence for that
//! type. Messages with an unregistered tag are logged and skipped so an
//! unroutable message cannot enter a redelivery loop.

use async_trait::async_trait;
use fleetline_core::consumer::{ConsumeReport, Consumer};
use fleetline_core::envelope::{Envelope, TransportMessage};
use fleetline_core::error::ConsumeError;
use fleetline_core::filter::CorrelationTracingFilter;
use fleetline_core::message::Message;
use fleetline_core::topic_for;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// A type-erased dispatcher for one message type.
///
/// Implementations decode the wire message and run the filter-wrapped
/// consumer; the registry stores them behind a common interface so the
/// runtime loop stays generic.
#[async_trait]
trait Dispatch: Send + Sync {
    /// One full delivery attempt: decode, filter, consume.
    async fn dispatch(&self, transport: &TransportMessage) -> Result<ConsumeReport, ConsumeError>;
}

/// Glues one consumer behind the correlation tracing filter.
struct ConsumerDispatch<C: Consumer> {
    consumer: Arc<C>,
    filter: CorrelationTracingFilter,
}

#[async_trait]
impl<C: Consumer> Dispatch for ConsumerDispatch<C> {
    async fn dispatch(&self, transport: &TransportMessage) -> Result<ConsumeReport, ConsumeError> {
        let envelope: Envelope<C::Message> = Envelope::from_transport(transport)?;
        let consumer = Arc::clone(&self.consumer);
        self.filter
            .intercept(&envelope, |trace| {
                let envelope = &envelope;
                async move { consumer.consume(envelope, &trace).await }
            })
            .await
    }
}

/// Routes wire messages to their registered consumers.
///
/// Built once during wiring, then shared read-only by every delivery task;
/// the map is never mutated after startup, so no lock is needed.
#[derive(Default)]
pub struct DispatchRegistry {
    dispatchers: HashMap<&'static str, Arc<dyn Dispatch>>,
}

impl DispatchRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a consumer to its message type.
    ///
    /// Later registrations for the same type replace earlier ones; each
    /// type routes to exactly one consumer.
    #[must_use]
    pub fn register<C: Consumer>(mut self, consumer: C) -> Self {
        self.dispatchers.insert(
            C::Message::message_type(),
            Arc::new(ConsumerDispatch {
                consumer: Arc::new(consumer),
                filter: CorrelationTracingFilter::new(),
            }),
        );
        self
    }

    /// The broker topics covering every registered message type.
    #[must_use]
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.dispatchers.keys().map(|tag| topic_for(tag)).collect();
        topics.sort();
        topics
    }

    /// Route one wire message to its consumer.
    ///
    /// Returns `Ok(None)` for an unregistered type tag: the message is
    /// logged and skipped rather than failed, since redelivery cannot make
    /// it routable.
    ///
    /// # Errors
    ///
    /// Propagates the [`ConsumeError`] from decode or the consumer,
    /// unchanged.
    pub async fn dispatch(
        &self,
        transport: &TransportMessage,
    ) -> Result<Option<ConsumeReport>, ConsumeError> {
        match self.dispatchers.get(transport.message_type.as_str()) {
            Some(dispatcher) => dispatcher.dispatch(transport).await.map(Some),
            None => {
                warn!(
                    message_type = %transport.message_type,
                    message_id = %transport.message_id,
                    "No consumer registered for message type, skipping"
                );
                Ok(None)
            }
        }
    }
}
