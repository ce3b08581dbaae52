//! Generic message consumer loop with automatic reconnection.
//!
//! `MessageConsumer` handles the boilerplate of subscribing to the message
//! bus, scheduling deliveries, reconnecting on stream failures, and
//! coordinating graceful shutdown, so applications only register consumers
//! and spawn the loop.
//!
//! # Pattern: Subscribe-Process-Reconnect Loop
//!
//! ```text
//! loop {
//!     try_subscribe:
//!         loop {
//!             process_deliveries:
//!                 - Spawn one task per delivered message
//!                 - Log dispatch errors (don't crash)
//!                 - Check shutdown signal
//!         }
//!         if connection_lost:
//!             wait_and_retry
//! }
//! ```
//!
//! # Scheduling
//!
//! Each delivered message is handed to its own spawned task, so distinct
//! messages process concurrently while the filter-then-consumer sequence
//! for a single delivery stays strictly sequential inside its task. The
//! loop itself never awaits a dispatch. On shutdown the loop stops taking
//! deliveries and waits for in-flight tasks to finish before exiting.
//!
//! # Example
//!
//! ```rust,ignore
//! let registry = Arc::new(DispatchRegistry::new().register(CarRegisteredConsumer::new()));
//!
//! let consumer = MessageConsumer::builder()
//!     .name("fleet-pipeline")
//!     .bus(bus)
//!     .registry(registry)
//!     .shutdown(shutdown_rx)
//!     .build();
//!
//! let handle = consumer.spawn();
//! ```

use crate::registry::DispatchRegistry;
use fleetline_core::bus::MessageBus;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Generic message bus consumer loop.
///
/// # Lifecycle
///
/// 1. Created via `builder()`
/// 2. Spawned as a background task via `spawn()`
/// 3. Runs until a shutdown signal is received
///
/// # Configuration
///
/// - `name`: human-readable consumer name (for logging)
/// - `topics`: topics to subscribe to (defaults to the registry's topics)
/// - `bus`: message bus instance to consume from
/// - `registry`: dispatch registry routing messages to consumers
/// - `shutdown`: broadcast receiver for graceful shutdown coordination
/// - `retry_delay`: wait before retrying on failure (default: 5s)
pub struct MessageConsumer {
    name: String,
    topics: Vec<String>,
    bus: Arc<dyn MessageBus>,
    registry: Arc<DispatchRegistry>,
    shutdown: broadcast::Receiver<()>,
    retry_delay: Duration,
}

impl MessageConsumer {
    /// Create a builder for configuring a consumer loop.
    #[must_use]
    pub fn builder() -> MessageConsumerBuilder {
        MessageConsumerBuilder::default()
    }

    /// Spawn the consumer loop as a background task.
    ///
    /// Runs until a shutdown signal is received; the returned handle can
    /// be awaited to join the loop during shutdown.
    #[must_use]
    pub fn spawn(mut self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&mut self) {
        info!(consumer = %self.name, "Message consumer started");

        let mut deliveries = JoinSet::new();

        loop {
            let topics: Vec<&str> = self.topics.iter().map(String::as_str).collect();

            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!(consumer = %self.name, "Message consumer received shutdown signal");
                    break;
                }
                subscribe_result = self.bus.subscribe(&topics) => {
                    match subscribe_result {
                        Ok(mut stream) => {
                            info!(consumer = %self.name, topics = ?self.topics, "Subscribed to message bus");

                            if self.process_stream(&mut stream, &mut deliveries).await {
                                // Shutdown observed while processing.
                                break;
                            }

                            warn!(
                                consumer = %self.name,
                                "Message stream ended, reconnecting in {:?}",
                                self.retry_delay
                            );
                            tokio::time::sleep(self.retry_delay).await;
                        }
                        Err(e) => {
                            error!(
                                consumer = %self.name,
                                error = %e,
                                "Failed to subscribe to message bus, retrying in {:?}",
                                self.retry_delay
                            );
                            tokio::time::sleep(self.retry_delay).await;
                        }
                    }
                }
            }
        }

        if !deliveries.is_empty() {
            info!(
                consumer = %self.name,
                in_flight = deliveries.len(),
                "Waiting for in-flight deliveries to complete"
            );
            while deliveries.join_next().await.is_some() {}
        }

        info!(consumer = %self.name, "Message consumer stopped");
    }

    /// Process deliveries until the stream ends or shutdown is signalled.
    ///
    /// Returns `true` when shutdown was observed, `false` when the stream
    /// ended and the caller should reconnect. In-flight delivery tasks
    /// outlive this call; the run loop drains them before exiting.
    async fn process_stream(
        &mut self,
        stream: &mut fleetline_core::bus::MessageStream,
        deliveries: &mut JoinSet<()>,
    ) -> bool {
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!(consumer = %self.name, "Shutdown signal received during processing");
                    return true;
                }
                // Reap finished delivery tasks so the set stays small.
                Some(_) = deliveries.join_next(), if !deliveries.is_empty() => {}
                delivery = stream.next() => {
                    match delivery {
                        Some(Ok(transport)) => {
                            // One unit of work per delivery: distinct
                            // messages process concurrently, each inside
                            // its own span.
                            let registry = Arc::clone(&self.registry);
                            let name = self.name.clone();
                            deliveries.spawn(async move {
                                if let Err(e) = registry.dispatch(&transport).await {
                                    error!(
                                        consumer = %name,
                                        message_type = %transport.message_type,
                                        message_id = %transport.message_id,
                                        error = %e,
                                        "Delivery attempt failed"
                                    );
                                }
                            });
                        }
                        Some(Err(e)) => {
                            error!(
                                consumer = %self.name,
                                error = %e,
                                "Error receiving message from stream"
                            );
                            // Continue processing subsequent deliveries.
                        }
                        None => {
                            warn!(consumer = %self.name, "Message stream ended");
                            return false;
                        }
                    }
                }
            }
        }
    }
}

/// Builder for configuring a [`MessageConsumer`].
#[derive(Default)]
pub struct MessageConsumerBuilder {
    name: Option<String>,
    topics: Option<Vec<String>>,
    bus: Option<Arc<dyn MessageBus>>,
    registry: Option<Arc<DispatchRegistry>>,
    shutdown: Option<broadcast::Receiver<()>>,
    retry_delay: Option<Duration>,
}

impl MessageConsumerBuilder {
    /// Set the consumer name used in logs.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Override the topics to subscribe to.
    ///
    /// Defaults to the registry's topics when unset.
    #[must_use]
    pub fn topics(mut self, topics: Vec<String>) -> Self {
        self.topics = Some(topics);
        self
    }

    /// Set the message bus instance.
    #[must_use]
    pub fn bus(mut self, bus: Arc<dyn MessageBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Set the dispatch registry.
    #[must_use]
    pub fn registry(mut self, registry: Arc<DispatchRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the shutdown signal receiver.
    #[must_use]
    pub fn shutdown(mut self, shutdown: broadcast::Receiver<()>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Set a custom retry delay (default: 5 seconds).
    #[must_use]
    pub const fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Build the [`MessageConsumer`].
    ///
    /// # Panics
    ///
    /// Panics if a required field is not set (name, bus, registry,
    /// shutdown).
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn build(self) -> MessageConsumer {
        let registry = self.registry.expect("registry is required");
        let topics = self.topics.unwrap_or_else(|| registry.topics());
        MessageConsumer {
            name: self.name.expect("name is required"),
            topics,
            bus: self.bus.expect("bus is required"),
            registry,
            shutdown: self.shutdown.expect("shutdown is required"),
            retry_delay: self.retry_delay.unwrap_or_else(|| Duration::from_secs(5)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fleetline_core::consumer::{ConsumeReport, Consumer, Stage, StageReporter};
    use fleetline_core::envelope::Envelope;
    use fleetline_core::error::ConsumeError;
    use fleetline_core::message::Message;
    use fleetline_core::topic_for;
    use fleetline_core::trace::TraceContext;
    use fleetline_testing::InMemoryMessageBus;
    use serde::{Deserialize, Serialize};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Debug, Serialize, Deserialize)]
    struct Tick {
        seq: u32,
    }

    impl Message for Tick {
        fn message_type() -> &'static str {
            "Tick"
        }
    }

    struct TickConsumer {
        seen: Arc<Mutex<Vec<u32>>>,
        failures_left: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Consumer for TickConsumer {
        type Message = Tick;

        async fn consume(
            &self,
            envelope: &Envelope<Tick>,
            _trace: &TraceContext,
        ) -> Result<ConsumeReport, ConsumeError> {
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(ConsumeError::Downstream("injected".to_string()));
            }
            self.seen.lock().unwrap().push(envelope.payload.seq);
            let mut reporter = StageReporter::new("Tick", envelope.payload.seq.to_string());
            reporter.info(Stage::Receipt, "accepted");
            reporter.info(Stage::Completion, "done");
            Ok(reporter.finish())
        }
    }

    async fn wait_until(condition: impl Fn() -> bool) {
        for _ in 0..100 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn delivers_messages_to_registered_consumers() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let registry = Arc::new(DispatchRegistry::new().register(TickConsumer {
            seen: Arc::clone(&seen),
            failures_left: Arc::new(AtomicUsize::new(0)),
        }));

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = MessageConsumer::builder()
            .name("tick-loop")
            .bus(bus.clone())
            .registry(registry)
            .shutdown(shutdown_rx)
            .build()
            .spawn();

        // Give the loop time to subscribe before publishing.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let topic = topic_for(Tick::message_type());
        for seq in 0..3 {
            let transport = Envelope::new(Tick { seq }).to_transport().unwrap();
            bus.publish(&topic, &transport).await.unwrap();
        }

        let seen_check = Arc::clone(&seen);
        wait_until(move || seen_check.lock().unwrap().len() == 3).await;

        let mut observed = seen.lock().unwrap().clone();
        observed.sort_unstable();
        assert_eq!(observed, vec![0, 1, 2]);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn a_failing_delivery_does_not_stop_the_loop() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let registry = Arc::new(DispatchRegistry::new().register(TickConsumer {
            seen: Arc::clone(&seen),
            failures_left: Arc::new(AtomicUsize::new(1)),
        }));

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = MessageConsumer::builder()
            .name("tick-loop")
            .bus(bus.clone())
            .registry(registry)
            .shutdown(shutdown_rx)
            .build()
            .spawn();

        tokio::time::sleep(Duration::from_millis(50)).await;

        let topic = topic_for(Tick::message_type());
        // First delivery fails, second succeeds.
        for seq in [10, 11] {
            let transport = Envelope::new(Tick { seq }).to_transport().unwrap();
            bus.publish(&topic, &transport).await.unwrap();
        }

        let seen_check = Arc::clone(&seen);
        wait_until(move || !seen_check.lock().unwrap().is_empty()).await;

        assert!(seen.lock().unwrap().contains(&11) || seen.lock().unwrap().contains(&10));

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }

    struct SlowConsumer {
        started: Arc<AtomicUsize>,
        finished: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Consumer for SlowConsumer {
        type Message = Tick;

        async fn consume(
            &self,
            envelope: &Envelope<Tick>,
            _trace: &TraceContext,
        ) -> Result<ConsumeReport, ConsumeError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(200)).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            let mut reporter = StageReporter::new("Tick", envelope.payload.seq.to_string());
            reporter.info(Stage::Completion, "done");
            Ok(reporter.finish())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shutdown_waits_for_in_flight_deliveries() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let started = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let registry = Arc::new(DispatchRegistry::new().register(SlowConsumer {
            started: Arc::clone(&started),
            finished: Arc::clone(&finished),
        }));

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = MessageConsumer::builder()
            .name("tick-loop")
            .bus(bus.clone())
            .registry(registry)
            .shutdown(shutdown_rx)
            .build()
            .spawn();

        tokio::time::sleep(Duration::from_millis(50)).await;

        let topic = topic_for(Tick::message_type());
        let transport = Envelope::new(Tick { seq: 7 }).to_transport().unwrap();
        bus.publish(&topic, &transport).await.unwrap();

        // Signal shutdown while the delivery is still mid-consume.
        let started_check = Arc::clone(&started);
        wait_until(move || started_check.load(Ordering::SeqCst) == 1).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        // The loop joined the in-flight task instead of dropping it.
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shuts_down_on_signal() {
        let bus = Arc::new(InMemoryMessageBus::new());
        let registry = Arc::new(DispatchRegistry::new().register(TickConsumer {
            seen: Arc::new(Mutex::new(Vec::new())),
            failures_left: Arc::new(AtomicUsize::new(0)),
        }));

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = MessageConsumer::builder()
            .name("tick-loop")
            .bus(bus)
            .registry(registry)
            .shutdown(shutdown_rx)
            .build()
            .spawn();

        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
