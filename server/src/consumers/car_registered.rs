//! Consumer for [`CarRegistered`] messages.

use crate::messages::CarRegistered;
use async_trait::async_trait;
use fleetline_core::{
    ConsumeError, ConsumeReport, Consumer, Envelope, Message, Stage, StageReporter, TraceContext,
};

/// Expected length of a vehicle identification number.
const VIN_LENGTH: usize = 17;

/// Walks a car registration through the staged contract.
///
/// The VIN length check is soft: a malformed VIN produces a warning stage
/// record and processing continues. Registrations are never bounced for
/// data-quality issues; they are audited.
#[derive(Clone, Copy, Debug, Default)]
pub struct CarRegisteredConsumer;

impl CarRegisteredConsumer {
    /// Create the consumer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Consumer for CarRegisteredConsumer {
    type Message = CarRegistered;

    async fn consume(
        &self,
        envelope: &Envelope<CarRegistered>,
        _trace: &TraceContext,
    ) -> Result<ConsumeReport, ConsumeError> {
        let car = &envelope.payload;
        let mut reporter =
            StageReporter::new(CarRegistered::message_type(), car.car_id.to_string());

        reporter.info(
            Stage::Receipt,
            format!("Received registration for car {}", car.car_id),
        );

        let vin_length = car.vin.chars().count();
        if vin_length == VIN_LENGTH {
            reporter.info(Stage::Validation, format!("VIN {} validated", car.vin));
        } else {
            reporter.warning(
                Stage::Validation,
                format!(
                    "VIN '{}' has length {vin_length}, expected {VIN_LENGTH}",
                    car.vin
                ),
            );
        }

        reporter.info(
            Stage::Processing,
            format!(
                "Registered {} {} {} (VIN {}) at {}",
                car.year, car.make, car.model, car.vin, car.registered_at
            ),
        );

        reporter.info(
            Stage::Completion,
            format!("Registration of car {} complete", car.car_id),
        );

        Ok(reporter.finish())
    }
}
