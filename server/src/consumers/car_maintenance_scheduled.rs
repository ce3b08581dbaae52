//! Consumer for [`CarMaintenanceScheduled`] messages.

use crate::messages::CarMaintenanceScheduled;
use async_trait::async_trait;
use fleetline_core::{
    Clock, ConsumeError, ConsumeReport, Consumer, Envelope, Message, Stage, StageReporter,
    TraceContext,
};
use std::sync::Arc;

/// Walks a maintenance appointment through the staged contract.
///
/// The past-date check is soft: an appointment scheduled in the past
/// produces a warning stage record and processing continues. The clock is
/// injected so the check is deterministic under test.
pub struct CarMaintenanceScheduledConsumer {
    clock: Arc<dyn Clock>,
}

impl CarMaintenanceScheduledConsumer {
    /// Create the consumer with the clock used for the past-date check.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl Consumer for CarMaintenanceScheduledConsumer {
    type Message = CarMaintenanceScheduled;

    async fn consume(
        &self,
        envelope: &Envelope<CarMaintenanceScheduled>,
        _trace: &TraceContext,
    ) -> Result<ConsumeReport, ConsumeError> {
        let appointment = &envelope.payload;
        let mut reporter = StageReporter::new(
            CarMaintenanceScheduled::message_type(),
            appointment.maintenance_id.to_string(),
        );

        reporter.info(
            Stage::Receipt,
            format!(
                "Received maintenance schedule {} for car {}",
                appointment.maintenance_id, appointment.car_id
            ),
        );

        let now = self.clock.now();
        if appointment.scheduled_date < now {
            reporter.warning(
                Stage::Validation,
                format!(
                    "Scheduled date {} is in the past (now {now})",
                    appointment.scheduled_date
                ),
            );
        } else {
            reporter.info(
                Stage::Validation,
                format!("Scheduled date {} validated", appointment.scheduled_date),
            );
        }

        reporter.info(
            Stage::Processing,
            format!(
                "Scheduled {} for car {} on {}: {} (estimated cost {:.2})",
                appointment.service_type,
                appointment.car_id,
                appointment.scheduled_date,
                appointment.description,
                appointment.estimated_cost
            ),
        );

        reporter.info(
            Stage::Completion,
            format!(
                "Maintenance schedule {} complete",
                appointment.maintenance_id
            ),
        );

        Ok(reporter.finish())
    }
}
