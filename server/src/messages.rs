//! Fleet message payloads.
//!
//! Two business records travel the pipeline: a car entering the fleet and
//! a maintenance appointment for a car already in it. Both are immutable
//! facts; consumers report on them, they never mutate them.

use chrono::{DateTime, Utc};
use fleetline_core::Message;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A car has been registered into the fleet.
///
/// The VIN is expected to be exactly 17 characters; shorter or longer
/// values are audited by the consumer but never rejected.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CarRegistered {
    /// Identity of the registered car.
    pub car_id: Uuid,
    /// Manufacturer name.
    pub make: String,
    /// Model name.
    pub model: String,
    /// Model year.
    pub year: i32,
    /// Vehicle identification number.
    pub vin: String,
    /// When the registration was accepted.
    pub registered_at: DateTime<Utc>,
}

impl Message for CarRegistered {
    fn message_type() -> &'static str {
        "CarRegistered"
    }
}

/// A maintenance appointment has been scheduled for a fleet car.
///
/// The scheduled date is expected not to be in the past; past dates are
/// audited by the consumer but never rejected.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CarMaintenanceScheduled {
    /// Identity of the appointment.
    pub maintenance_id: Uuid,
    /// The car being serviced.
    pub car_id: Uuid,
    /// Kind of service (oil change, tire rotation, ...).
    pub service_type: String,
    /// When the service is due.
    pub scheduled_date: DateTime<Utc>,
    /// Free-form description of the work.
    pub description: String,
    /// Estimated cost in the fleet's base currency.
    pub estimated_cost: f64,
}

impl Message for CarMaintenanceScheduled {
    fn message_type() -> &'static str {
        "CarMaintenanceScheduled"
    }
}
