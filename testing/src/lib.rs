//! # Fleetline Testing
//!
//! Testing utilities and mock transports for the Fleetline pipeline.
//!
//! This crate provides:
//! - An in-memory [`MessageBus`](fleetline_core::MessageBus) with a
//!   published-message log for assertions
//! - A fixed clock for deterministic time-dependent validation
//!
//! ## Example
//!
//! ```
//! use fleetline_testing::mocks::InMemoryMessageBus;
//! use fleetline_core::{Envelope, Message, MessageBus, topic_for};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Clone, Debug, Serialize, Deserialize)]
//! struct Ping;
//!
//! impl Message for Ping {
//!     fn message_type() -> &'static str { "Ping" }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bus = InMemoryMessageBus::new();
//! let transport = Envelope::new(Ping).to_transport()?;
//! bus.publish(&topic_for(Ping::message_type()), &transport).await?;
//! assert_eq!(bus.published().len(), 1);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Mock implementations for testing.
pub mod mocks {
    use chrono::{DateTime, Utc};
    use fleetline_core::bus::{MessageBus, MessageBusError, MessageStream};
    use fleetline_core::clock::Clock;
    use fleetline_core::envelope::TransportMessage;
    use std::collections::HashMap;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::{Arc, Mutex};
    use tokio::sync::broadcast;

    /// Channel capacity per topic. Tests never buffer anywhere near this.
    const TOPIC_CAPACITY: usize = 256;

    /// In-memory message bus for tests.
    ///
    /// Fan-out per topic over `tokio::sync::broadcast`; every subscriber
    /// sees every message published after it subscribed, matching the
    /// consumer-group-per-runtime shape of the production transport
    /// closely enough for pipeline tests.
    ///
    /// Every publish is also appended to an inspection log so tests can
    /// assert on what crossed the boundary without subscribing.
    pub struct InMemoryMessageBus {
        topics: Mutex<HashMap<String, broadcast::Sender<TransportMessage>>>,
        published: Mutex<Vec<(String, TransportMessage)>>,
    }

    impl InMemoryMessageBus {
        /// Create an empty bus.
        #[must_use]
        pub fn new() -> Self {
            Self {
                topics: Mutex::new(HashMap::new()),
                published: Mutex::new(Vec::new()),
            }
        }

        /// Everything published so far, as `(topic, message)` pairs in
        /// publish order.
        ///
        /// # Panics
        ///
        /// Panics if the inspection log's lock was poisoned, which only
        /// happens after another test thread panicked mid-publish.
        #[must_use]
        #[allow(clippy::unwrap_used)]
        pub fn published(&self) -> Vec<(String, TransportMessage)> {
            self.published.lock().unwrap().clone()
        }

        fn sender_for(&self, topic: &str) -> broadcast::Sender<TransportMessage> {
            #[allow(clippy::unwrap_used)] // Lock poisoning means a test already failed
            let mut topics = self.topics.lock().unwrap();
            topics
                .entry(topic.to_string())
                .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
                .clone()
        }
    }

    impl Default for InMemoryMessageBus {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MessageBus for InMemoryMessageBus {
        fn publish(
            &self,
            topic: &str,
            message: &TransportMessage,
        ) -> Pin<Box<dyn Future<Output = Result<(), MessageBusError>> + Send + '_>> {
            let topic = topic.to_string();
            let message = message.clone();

            Box::pin(async move {
                #[allow(clippy::unwrap_used)] // Lock poisoning means a test already failed
                self.published
                    .lock()
                    .unwrap()
                    .push((topic.clone(), message.clone()));

                // A send error only means nobody is subscribed yet; the
                // production transport accepts those publishes too.
                let _ = self.sender_for(&topic).send(message);
                Ok(())
            })
        }

        fn subscribe(
            &self,
            topics: &[&str],
        ) -> Pin<Box<dyn Future<Output = Result<MessageStream, MessageBusError>> + Send + '_>>
        {
            let receivers: Vec<broadcast::Receiver<TransportMessage>> = topics
                .iter()
                .map(|topic| self.sender_for(topic).subscribe())
                .collect();

            Box::pin(async move {
                let (tx, mut rx) = tokio::sync::mpsc::channel(TOPIC_CAPACITY);

                for mut receiver in receivers {
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        loop {
                            match receiver.recv().await {
                                Ok(message) => {
                                    if tx.send(Ok(message)).await.is_err() {
                                        break;
                                    }
                                }
                                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                    let report = MessageBusError::TransportError(format!(
                                        "subscriber lagged, {skipped} messages dropped"
                                    ));
                                    if tx.send(Err(report)).await.is_err() {
                                        break;
                                    }
                                }
                                Err(broadcast::error::RecvError::Closed) => break,
                            }
                        }
                    });
                }
                drop(tx);

                let stream = async_stream::stream! {
                    while let Some(item) = rx.recv().await {
                        yield item;
                    }
                };

                Ok(Box::pin(stream) as MessageStream)
            })
        }
    }

    /// Shared handle alias used throughout the tests.
    pub type SharedBus = Arc<InMemoryMessageBus>;

    /// Fixed clock for deterministic tests.
    ///
    /// Always returns the same time, making date validation reproducible.
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time.
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-06-01 00:00:00 UTC).
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse, which should
    /// never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-06-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, InMemoryMessageBus, test_clock};
