//! HTTP publish boundary.
//!
//! Two endpoints accept fleet facts as JSON, wrap them in envelopes
//! carrying the request's correlation identity, and publish them onto the
//! bus. The response acknowledges acceptance onto the transport only;
//! consumption happens asynchronously in the pipeline.

use crate::messages::{CarMaintenanceScheduled, CarRegistered};
use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use fleetline_core::{Clock, Envelope, Message, MessageBus, SystemClock, topic_for};
use fleetline_web::{AppError, PublishAck, RequestCorrelationId, correlation_layer};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

/// Shared state for the publish handlers.
#[derive(Clone)]
pub struct AppState {
    bus: Arc<dyn MessageBus>,
    clock: Arc<dyn Clock>,
}

impl AppState {
    /// Build state around a bus, stamping registrations with the system
    /// clock.
    #[must_use]
    pub fn new(bus: Arc<dyn MessageBus>) -> Self {
        Self {
            bus,
            clock: Arc::new(SystemClock),
        }
    }

    /// Build state with an explicit clock, for deterministic tests.
    #[must_use]
    pub fn with_clock(bus: Arc<dyn MessageBus>, clock: Arc<dyn Clock>) -> Self {
        Self { bus, clock }
    }
}

/// Request body for `POST /cars/register`.
///
/// Clients that already track the car may supply its identity and
/// registration timestamp; both are assigned by the server when absent.
#[derive(Debug, Deserialize)]
pub struct RegisterCarRequest {
    /// Identity of the car; assigned when absent.
    pub car_id: Option<Uuid>,
    /// Manufacturer name.
    pub make: String,
    /// Model name.
    pub model: String,
    /// Model year.
    pub year: i32,
    /// Vehicle identification number.
    pub vin: String,
    /// When the registration was accepted; stamped when absent.
    pub registered_at: Option<DateTime<Utc>>,
}

/// Request body for `POST /cars/maintenance`.
///
/// Clients that already track the appointment may supply its identity;
/// it is assigned by the server when absent.
#[derive(Debug, Deserialize)]
pub struct ScheduleMaintenanceRequest {
    /// Identity of the appointment; assigned when absent.
    pub maintenance_id: Option<Uuid>,
    /// The car being serviced.
    pub car_id: Uuid,
    /// Kind of service.
    pub service_type: String,
    /// When the service is due.
    pub scheduled_date: DateTime<Utc>,
    /// Free-form description of the work.
    pub description: String,
    /// Estimated cost.
    pub estimated_cost: f64,
}

/// Build the application router.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/cars/register", post(register_car))
        .route("/cars/maintenance", post(schedule_maintenance))
        .layer(correlation_layer())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

/// Accept a car registration and publish it onto the pipeline.
async fn register_car(
    State(state): State<AppState>,
    correlation: RequestCorrelationId,
    Json(request): Json<RegisterCarRequest>,
) -> Result<Json<PublishAck>, AppError> {
    let payload = CarRegistered {
        car_id: request.car_id.unwrap_or_else(Uuid::new_v4),
        make: request.make,
        model: request.model,
        year: request.year,
        vin: request.vin,
        registered_at: request.registered_at.unwrap_or_else(|| state.clock.now()),
    };
    let car_id = payload.car_id;

    let envelope = Envelope::new(payload).with_correlation_id(correlation.0);
    let message_id = envelope.message_id;
    publish(&state, &envelope).await?;

    tracing::info!(
        car_id = %car_id,
        message_id = %message_id,
        correlation_id = %correlation.0,
        "Car registration published"
    );

    Ok(Json(PublishAck::accepted(
        "Car registration submitted",
        car_id,
        message_id,
    )))
}

/// Accept a maintenance schedule and publish it onto the pipeline.
async fn schedule_maintenance(
    State(state): State<AppState>,
    correlation: RequestCorrelationId,
    Json(request): Json<ScheduleMaintenanceRequest>,
) -> Result<Json<PublishAck>, AppError> {
    let payload = CarMaintenanceScheduled {
        maintenance_id: request.maintenance_id.unwrap_or_else(Uuid::new_v4),
        car_id: request.car_id,
        service_type: request.service_type,
        scheduled_date: request.scheduled_date,
        description: request.description,
        estimated_cost: request.estimated_cost,
    };
    let maintenance_id = payload.maintenance_id;

    let envelope = Envelope::new(payload).with_correlation_id(correlation.0);
    let message_id = envelope.message_id;
    publish(&state, &envelope).await?;

    tracing::info!(
        maintenance_id = %maintenance_id,
        message_id = %message_id,
        correlation_id = %correlation.0,
        "Maintenance schedule published"
    );

    Ok(Json(PublishAck::accepted(
        "Maintenance scheduling submitted",
        maintenance_id,
        message_id,
    )))
}

/// Encode an envelope and publish it to its type's topic.
async fn publish<M>(state: &AppState, envelope: &Envelope<M>) -> Result<(), AppError>
where
    M: Message + serde::Serialize,
{
    let transport = envelope
        .to_transport()
        .map_err(|e| AppError::internal("Failed to encode message").with_source(e.into()))?;
    let topic = topic_for(M::message_type());
    state.bus.publish(&topic, &transport).await?;
    Ok(())
}
