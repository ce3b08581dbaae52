//! # Fleetline Core
//!
//! Envelope model, correlation tracing filter, and consumer contract for
//! the Fleetline messaging pipeline.
//!
//! # Architecture
//!
//! ```text
//! HTTP request
//!      │
//!      ▼
//! ┌──────────────┐     ┌───────────────┐
//! │  Publisher   │────▶│   Transport   │  at-least-once, no cross-group
//! └──────────────┘     └───────┬───────┘  ordering
//!                              │
//!                              ▼
//!              ┌───────────────────────────────┐
//!              │  CorrelationTracingFilter     │  derive trace identity,
//!              │  (span per delivery attempt)  │  open consumer span
//!              └───────────────┬───────────────┘
//!                              │
//!                              ▼
//!              ┌───────────────────────────────┐
//!              │  Consumer (per message type)  │  receipt → validation →
//!              │                               │  processing → completion
//!              └───────────────────────────────┘
//! ```
//!
//! The crate holds no locks and performs no cross-message synchronization;
//! isolation between deliveries comes from the runtime giving each its own
//! task and its own span.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bus;
pub mod clock;
pub mod consumer;
pub mod envelope;
pub mod error;
pub mod filter;
pub mod message;
pub mod trace;

pub use bus::{MessageBus, MessageBusError, MessageStream, topic_for};
pub use clock::{Clock, SystemClock};
pub use consumer::{ConsumeReport, Consumer, Severity, Stage, StageRecord, StageReporter};
pub use envelope::{ConversationId, CorrelationId, Envelope, MessageId, TransportMessage};
pub use error::ConsumeError;
pub use filter::CorrelationTracingFilter;
pub use message::{Message, MessageError};
pub use trace::{SpanId, TraceContext, TraceId, resolve_anchor};
