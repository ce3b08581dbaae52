//! # Fleetline Runtime
//!
//! The consumer runtime: a dispatch registry binding message types to their
//! consumers (with the correlation tracing filter in between) and a
//! subscribe/process/reconnect loop that schedules one task per delivered
//! message.
//!
//! ## Wiring
//!
//! ```rust,ignore
//! let registry = Arc::new(
//!     DispatchRegistry::new()
//!         .register(CarRegisteredConsumer::new(clock.clone()))
//!         .register(CarMaintenanceScheduledConsumer::new(clock)),
//! );
//!
//! let handle = MessageConsumer::builder()
//!     .name("fleet-pipeline")
//!     .bus(bus)
//!     .registry(registry)
//!     .shutdown(shutdown_rx)
//!     .build()
//!     .spawn();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod consumer;
pub mod registry;

pub use consumer::{MessageConsumer, MessageConsumerBuilder};
pub use registry::DispatchRegistry;
