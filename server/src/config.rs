//! Configuration management for the Fleetline server.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::messages::{CarMaintenanceScheduled, CarRegistered};
use fleetline_core::{Message, topic_for};
use serde::{Deserialize, Serialize};
use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Redpanda/Kafka configuration
    pub redpanda: RedpandaConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
}

/// Redpanda/Kafka configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedpandaConfig {
    /// Broker addresses (comma-separated)
    pub brokers: String,
    /// Consumer group for the fleet pipeline
    pub consumer_group: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                log_level: "info".to_string(),
                shutdown_timeout: 30,
            },
            redpanda: RedpandaConfig {
                brokers: "localhost:9092".to_string(),
                consumer_group: "fleetline-pipeline".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or(defaults.server.host),
                port: env::var("PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.server.port),
                log_level: env::var("RUST_LOG").unwrap_or(defaults.server.log_level),
                shutdown_timeout: env::var("SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.server.shutdown_timeout),
            },
            redpanda: RedpandaConfig {
                brokers: env::var("REDPANDA_BROKERS").unwrap_or(defaults.redpanda.brokers),
                consumer_group: env::var("CONSUMER_GROUP")
                    .unwrap_or(defaults.redpanda.consumer_group),
            },
        }
    }

    /// The topics the pipeline consumes, derived from the message types.
    #[must_use]
    pub fn all_topics() -> Vec<String> {
        vec![
            topic_for(CarRegistered::message_type()),
            topic_for(CarMaintenanceScheduled::message_type()),
        ]
    }
}
