//! Redpanda message bus implementation for Fleetline.
//!
//! A production [`MessageBus`] over the Kafka protocol via `rdkafka`. Works
//! against Redpanda, Apache Kafka, or any Kafka-compatible broker.
//!
//! # Delivery Semantics
//!
//! **At-least-once delivery** with manual offset commits:
//! - Offsets are committed AFTER successful delivery to the subscriber's
//!   channel; a crash before commit means redelivery.
//! - Consumers must be idempotent.
//! - The partition key is the message's correlation anchor, so every
//!   redelivery and every message of one correlation group lands on the
//!   same partition. No ordering is guaranteed between distinct groups.
//!
//! # Example
//!
//! ```no_run
//! use fleetline_redpanda::RedpandaMessageBus;
//! use fleetline_core::MessageBus;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let bus = RedpandaMessageBus::builder()
//!     .brokers("localhost:9092")
//!     .consumer_group("fleetline-pipeline")
//!     .producer_acks("all")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use fleetline_core::bus::{MessageBus, MessageBusError, MessageStream};
use fleetline_core::envelope::TransportMessage;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Kafka-compatible message bus.
///
/// One instance serves both sides: HTTP handlers publish through it and
/// the consumer runtime subscribes through it. The producer is created at
/// build time; each subscription creates its own `StreamConsumer` owned by
/// a forwarding task.
pub struct RedpandaMessageBus {
    producer: FutureProducer,
    brokers: String,
    timeout: Duration,
    consumer_group: Option<String>,
    buffer_size: usize,
    auto_offset_reset: String,
}

impl RedpandaMessageBus {
    /// Create a bus with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MessageBusError::ConnectionFailed`] if the producer
    /// cannot be created.
    pub fn new(brokers: &str) -> Result<Self, MessageBusError> {
        Self::builder().brokers(brokers).build()
    }

    /// Create a builder for configuring the bus.
    #[must_use]
    pub fn builder() -> RedpandaMessageBusBuilder {
        RedpandaMessageBusBuilder::default()
    }

    /// The configured broker addresses.
    #[must_use]
    pub fn brokers(&self) -> &str {
        &self.brokers
    }
}

/// Builder for configuring a [`RedpandaMessageBus`].
#[derive(Default)]
pub struct RedpandaMessageBusBuilder {
    brokers: Option<String>,
    producer_acks: Option<String>,
    compression: Option<String>,
    timeout: Option<Duration>,
    consumer_group: Option<String>,
    buffer_size: Option<usize>,
    auto_offset_reset: Option<String>,
}

impl RedpandaMessageBusBuilder {
    /// Comma-separated broker addresses (e.g., "localhost:9092").
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Producer acknowledgment mode: "0", "1", or "all". Default: "1".
    #[must_use]
    pub fn producer_acks(mut self, acks: impl Into<String>) -> Self {
        self.producer_acks = Some(acks.into());
        self
    }

    /// Compression codec: "none", "gzip", "snappy", "lz4", "zstd".
    /// Default: "none".
    #[must_use]
    pub fn compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }

    /// Producer send timeout. Default: 5 seconds.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Consumer group id for subscriptions.
    ///
    /// If not set, a group is generated from the sorted topic list.
    /// Setting it explicitly lets multiple instances of the service share
    /// the workload.
    #[must_use]
    pub fn consumer_group(mut self, consumer_group: impl Into<String>) -> Self {
        self.consumer_group = Some(consumer_group.into());
        self
    }

    /// Message buffer capacity between the Kafka consumer and the
    /// subscriber. Default: 1000.
    ///
    /// # Panics
    ///
    /// Panics if `buffer_size` is 0.
    #[must_use]
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        assert!(buffer_size > 0, "buffer_size must be greater than 0");
        self.buffer_size = Some(buffer_size);
        self
    }

    /// Where new consumer groups start reading: "earliest", "latest", or
    /// "error". Default: "latest".
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Build the [`RedpandaMessageBus`].
    ///
    /// # Errors
    ///
    /// Returns [`MessageBusError::ConnectionFailed`] if brokers are not
    /// set or the producer cannot be created.
    pub fn build(self) -> Result<RedpandaMessageBus, MessageBusError> {
        let brokers = self.brokers.ok_or_else(|| {
            MessageBusError::ConnectionFailed("Brokers not configured".to_string())
        })?;

        let mut producer_config = ClientConfig::new();
        producer_config
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", self.producer_acks.as_deref().unwrap_or("1"))
            .set(
                "compression.type",
                self.compression.as_deref().unwrap_or("none"),
            );

        let producer: FutureProducer = producer_config.create().map_err(|e| {
            MessageBusError::ConnectionFailed(format!("Failed to create producer: {e}"))
        })?;

        tracing::info!(
            brokers = %brokers,
            acks = self.producer_acks.as_deref().unwrap_or("1"),
            compression = self.compression.as_deref().unwrap_or("none"),
            buffer_size = self.buffer_size.unwrap_or(1000),
            auto_offset_reset = self.auto_offset_reset.as_deref().unwrap_or("latest"),
            "RedpandaMessageBus created successfully"
        );

        Ok(RedpandaMessageBus {
            producer,
            brokers,
            timeout: self.timeout.unwrap_or(Duration::from_secs(5)),
            consumer_group: self.consumer_group,
            buffer_size: self.buffer_size.unwrap_or(1000),
            auto_offset_reset: self
                .auto_offset_reset
                .unwrap_or_else(|| "latest".to_string()),
        })
    }
}

impl MessageBus for RedpandaMessageBus {
    fn publish(
        &self,
        topic: &str,
        message: &TransportMessage,
    ) -> Pin<Box<dyn Future<Output = Result<(), MessageBusError>> + Send + '_>> {
        let topic = topic.to_string();
        let message = message.clone();
        let timeout = self.timeout;

        Box::pin(async move {
            let payload =
                message
                    .to_bytes()
                    .map_err(|e| MessageBusError::PublishFailed {
                        topic: topic.clone(),
                        reason: format!("Failed to serialize message: {e}"),
                    })?;

            // Partition by the correlation anchor: one correlation group,
            // one partition. The anchor is stable across redeliveries.
            let key = message.anchor_uuid().as_bytes().to_vec();

            let record = FutureRecord::to(&topic).payload(&payload).key(&key);

            let send_result = self.producer.send(record, Timeout::After(timeout)).await;

            match send_result {
                Ok((partition, offset)) => {
                    tracing::debug!(
                        topic = %topic,
                        partition = partition,
                        offset = offset,
                        message_type = %message.message_type,
                        message_id = %message.message_id,
                        "Message published successfully"
                    );
                    Ok(())
                }
                Err((kafka_error, _)) => {
                    tracing::error!(
                        topic = %topic,
                        error = %kafka_error,
                        "Failed to publish message"
                    );
                    Err(MessageBusError::PublishFailed {
                        topic,
                        reason: kafka_error.to_string(),
                    })
                }
            }
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<MessageStream, MessageBusError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(|s| (*s).to_string()).collect();
        let brokers = self.brokers.clone();
        let consumer_group = self.consumer_group.clone();
        let buffer_size = self.buffer_size;
        let auto_offset_reset = self.auto_offset_reset.clone();

        Box::pin(async move {
            let consumer_group_id = if let Some(group) = consumer_group {
                group
            } else {
                let mut sorted_topics = topics.clone();
                sorted_topics.sort();
                format!("fleetline-{}", sorted_topics.join("-"))
            };

            // Manual commit for at-least-once delivery.
            let consumer: StreamConsumer = ClientConfig::new()
                .set("bootstrap.servers", &brokers)
                .set("group.id", &consumer_group_id)
                .set("enable.auto.commit", "false")
                .set("auto.offset.reset", &auto_offset_reset)
                .set("session.timeout.ms", "6000")
                .set("enable.partition.eof", "false")
                .create()
                .map_err(|e| MessageBusError::SubscriptionFailed {
                    topics: topics.clone(),
                    reason: format!("Failed to create consumer: {e}"),
                })?;

            let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
            consumer
                .subscribe(&topic_refs)
                .map_err(|e| MessageBusError::SubscriptionFailed {
                    topics: topics.clone(),
                    reason: format!("Failed to subscribe to topics: {e}"),
                })?;

            tracing::info!(
                topics = ?topics,
                consumer_group = %consumer_group_id,
                buffer_size = buffer_size,
                auto_offset_reset = %auto_offset_reset,
                manual_commit = true,
                "Subscribed to topics"
            );

            let (tx, rx) = tokio::sync::mpsc::channel(buffer_size);

            // The forwarding task owns the Kafka consumer and commits each
            // offset only after the message reached the channel.
            tokio::spawn(async move {
                use futures::StreamExt;
                use rdkafka::consumer::CommitMode;

                let mut stream = consumer.stream();

                while let Some(delivery) = stream.next().await {
                    match delivery {
                        Ok(borrowed) => {
                            let decoded = match borrowed.payload() {
                                Some(payload) => TransportMessage::from_bytes(payload)
                                    .map_err(|e| {
                                        MessageBusError::DecodeFailed(format!(
                                            "Failed to decode wire message: {e}"
                                        ))
                                    }),
                                None => Err(MessageBusError::DecodeFailed(
                                    "Message has no payload".to_string(),
                                )),
                            };

                            if let Ok(message) = &decoded {
                                tracing::trace!(
                                    topic = borrowed.topic(),
                                    partition = borrowed.partition(),
                                    offset = borrowed.offset(),
                                    message_type = %message.message_type,
                                    "Received message"
                                );
                            }

                            // Commit only AFTER successful delivery to the
                            // channel; a crash before commit redelivers.
                            if tx.send(decoded).await.is_err() {
                                tracing::debug!(
                                    "Channel receiver dropped, exiting consumer task"
                                );
                                break;
                            }

                            if let Err(e) = consumer.commit_message(&borrowed, CommitMode::Async)
                            {
                                tracing::warn!(
                                    topic = borrowed.topic(),
                                    partition = borrowed.partition(),
                                    offset = borrowed.offset(),
                                    error = %e,
                                    "Failed to commit offset (message may be redelivered)"
                                );
                            }
                        }
                        Err(e) => {
                            let err = MessageBusError::TransportError(format!(
                                "Failed to receive message: {e}"
                            ));
                            if tx.send(Err(err)).await.is_err() {
                                break;
                            }
                        }
                    }
                }

                tracing::debug!("Consumer task exiting");
            });

            let stream = async_stream::stream! {
                let mut rx = rx;
                while let Some(result) = rx.recv().await {
                    yield result;
                }
            };

            Ok(Box::pin(stream) as MessageStream)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redpanda_message_bus_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<RedpandaMessageBus>();
        assert_sync::<RedpandaMessageBus>();
    }

    #[test]
    fn builder_requires_brokers() {
        let result = RedpandaMessageBus::builder().build();
        assert!(matches!(
            result,
            Err(MessageBusError::ConnectionFailed(_))
        ));
    }
}
