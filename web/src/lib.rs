//! # Fleetline Web
//!
//! Axum integration for HTTP boundaries that publish onto the message
//! pipeline:
//!
//! - [`error`]: `AppError` with `IntoResponse`, mapping bus failures to
//!   HTTP statuses.
//! - [`middleware`]: correlation ID layer that tags every request with a
//!   correlation identity and echoes it back to the client.
//! - [`extractors`]: `RequestCorrelationId` for adopting the request's
//!   correlation identity onto published envelopes.
//! - [`ack`]: `PublishAck`, the acceptance response body for publish
//!   endpoints.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod ack;
pub mod error;
pub mod extractors;
pub mod middleware;

pub use ack::PublishAck;
pub use error::AppError;
pub use extractors::RequestCorrelationId;
pub use middleware::{CORRELATION_ID_HEADER, CorrelationLayer, correlation_layer};
