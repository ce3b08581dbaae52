//! Fleetline server binary.
//!
//! Boots the publish boundary and the consume pipeline against Redpanda:
//! one Axum server publishing fleet messages, one consumer runtime walking
//! them through the staged consumers.

use fleetline_core::{MessageBus, SystemClock};
use fleetline_redpanda::RedpandaMessageBus;
use fleetline_runtime::{DispatchRegistry, MessageConsumer};
use fleetline_server::consumers::{CarMaintenanceScheduledConsumer, CarRegisteredConsumer};
use fleetline_server::{AppState, Config, build_router};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleetline=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Fleetline server");

    let config = Config::from_env();
    info!(
        brokers = %config.redpanda.brokers,
        consumer_group = %config.redpanda.consumer_group,
        "Configuration loaded"
    );

    let bus: Arc<dyn MessageBus> = Arc::new(
        RedpandaMessageBus::builder()
            .brokers(&config.redpanda.brokers)
            .consumer_group(&config.redpanda.consumer_group)
            .build()?,
    );
    info!("Message bus connected");

    let clock = Arc::new(SystemClock);
    let registry = Arc::new(
        DispatchRegistry::new()
            .register(CarRegisteredConsumer::new())
            .register(CarMaintenanceScheduledConsumer::new(clock)),
    );

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let consumer_handle = MessageConsumer::builder()
        .name("fleet-pipeline")
        .topics(Config::all_topics())
        .bus(Arc::clone(&bus))
        .registry(registry)
        .shutdown(shutdown_rx)
        .build()
        .spawn();
    info!(topics = ?Config::all_topics(), "Consumer runtime started");

    let app = build_router(AppState::new(bus));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped, draining consumer runtime");
    let _ = shutdown_tx.send(());
    if tokio::time::timeout(
        Duration::from_secs(config.server.shutdown_timeout),
        consumer_handle,
    )
    .await
    .is_err()
    {
        warn!("Consumer runtime did not stop within the shutdown timeout");
    }

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_err() {
            warn!("Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(_) => {
                warn!("Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        () = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }
}
