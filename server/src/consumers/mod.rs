//! Staged consumers for the fleet message types.
//!
//! One consumer per message type, each walking the receipt, validation,
//! processing, completion sequence. Validation failures of the anticipated
//! kind (VIN length, past dates) are audited as warnings and never abort
//! processing.

mod car_maintenance_scheduled;
mod car_registered;

pub use car_maintenance_scheduled::CarMaintenanceScheduledConsumer;
pub use car_registered::CarRegisteredConsumer;
