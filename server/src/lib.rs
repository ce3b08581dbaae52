//! # Fleetline Server
//!
//! The application crate: fleet message types, their staged consumers, the
//! HTTP publish boundary, and environment configuration. The binary in
//! `main.rs` wires these onto the Redpanda bus and the consumer runtime.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod consumers;
pub mod messages;
pub mod routes;

pub use config::Config;
pub use routes::{AppState, build_router};
