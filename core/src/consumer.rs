//! Consumer contract and staged outcome reporting.
//!
//! A consumer is the per-message-type handler at the end of the pipeline.
//! Its contract is staged: receipt, validation, processing, completion.
//! Each stage's outcome is reported as a structured log event and collected
//! into a [`ConsumeReport`] that lives only for the duration of one
//! `consume` call.
//!
//! # Error Policy
//!
//! Validation failures of the anticipated, non-critical kind are **soft**:
//! the consumer records a warning stage outcome and continues processing
//! ("audit, don't block"). Only conditions the consumer cannot continue
//! past propagate as [`ConsumeError`], which triggers the transport's
//! redelivery policy.
//!
//! # Idempotence
//!
//! The transport redelivers on failure, so `consume` must be safe to invoke
//! more than once for the same envelope. It may assume a stage executes
//! exactly once per invocation, never exactly once system-wide.

use crate::envelope::Envelope;
use crate::error::ConsumeError;
use crate::message::Message;
use crate::trace::TraceContext;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::fmt;
use tracing::{info, warn};

/// The four stages of one consume invocation, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// The message has been accepted for processing.
    Receipt,
    /// Type-specific structural checks against the payload.
    Validation,
    /// The business action.
    Processing,
    /// Successful completion with the primary identifiers.
    Completion,
}

impl Stage {
    /// Stable name used as the `step` field of stage log events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Receipt => "receipt",
            Self::Validation => "validation",
            Self::Processing => "processing",
            Self::Completion => "completion",
        }
    }

    /// One-based position within the staged sequence.
    #[must_use]
    pub const fn ordinal(self) -> usize {
        match self {
            Self::Receipt => 1,
            Self::Validation => 2,
            Self::Processing => 3,
            Self::Completion => 4,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a stage outcome is classified.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    /// The stage proceeded normally.
    Info,
    /// A soft validation issue: detected, audited, not blocking.
    Warning,
}

/// One stage outcome within a consume invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageRecord {
    /// Which stage produced this record.
    pub stage: Stage,
    /// Info or warning.
    pub severity: Severity,
    /// Human-readable context, including enriched payload fields.
    pub detail: String,
}

/// The structured outcome of one consume invocation.
///
/// Exists only for the duration of the call; nothing is persisted. Tests
/// assert on the stage sequence without needing a tracing backend.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConsumeReport {
    records: Vec<StageRecord>,
}

impl ConsumeReport {
    /// The stage records in the order they were emitted.
    #[must_use]
    pub fn records(&self) -> &[StageRecord] {
        &self.records
    }

    /// The ordered stage names, for sequence assertions.
    #[must_use]
    pub fn stages(&self) -> Vec<Stage> {
        self.records.iter().map(|r| r.stage).collect()
    }

    /// The warning records only.
    #[must_use]
    pub fn warnings(&self) -> Vec<&StageRecord> {
        self.records
            .iter()
            .filter(|r| r.severity == Severity::Warning)
            .collect()
    }

    /// True when the completion stage was reached.
    #[must_use]
    pub fn completed(&self) -> bool {
        self.records
            .iter()
            .any(|r| r.stage == Stage::Completion)
    }
}

/// Emits stage outcomes as structured log events and collects them into a
/// [`ConsumeReport`].
///
/// Every event carries `step`, `step_index`, `message_type`, and the
/// payload's primary identifier; the detail string carries the enriched
/// payload fields.
#[derive(Debug)]
pub struct StageReporter {
    message_type: &'static str,
    primary_id: String,
    report: ConsumeReport,
}

impl StageReporter {
    /// Start reporting for one consume invocation.
    #[must_use]
    pub fn new(message_type: &'static str, primary_id: impl Into<String>) -> Self {
        Self {
            message_type,
            primary_id: primary_id.into(),
            report: ConsumeReport::default(),
        }
    }

    /// Record a normal stage outcome.
    pub fn info(&mut self, stage: Stage, detail: impl Into<String>) {
        let detail = detail.into();
        info!(
            step = stage.as_str(),
            step_index = stage.ordinal(),
            message_type = self.message_type,
            primary_id = %self.primary_id,
            "{detail}"
        );
        self.report.records.push(StageRecord {
            stage,
            severity: Severity::Info,
            detail,
        });
    }

    /// Record a soft validation issue. Processing continues.
    pub fn warning(&mut self, stage: Stage, detail: impl Into<String>) {
        let detail = detail.into();
        warn!(
            step = stage.as_str(),
            step_index = stage.ordinal(),
            message_type = self.message_type,
            primary_id = %self.primary_id,
            "{detail}"
        );
        self.report.records.push(StageRecord {
            stage,
            severity: Severity::Warning,
            detail,
        });
    }

    /// Finish the invocation and hand back the collected report.
    #[must_use]
    pub fn finish(self) -> ConsumeReport {
        self.report
    }
}

/// Per message-type handler at the end of the consume pipeline.
///
/// One implementation per payload type, registered with the runtime's
/// dispatch registry and wrapped by the correlation tracing filter. The
/// derived [`TraceContext`] is passed explicitly so implementations stay
/// testable without a tracing backend.
#[async_trait]
pub trait Consumer: Send + Sync + 'static {
    /// The payload type this consumer handles.
    type Message: Message + DeserializeOwned;

    /// Process one delivery attempt.
    ///
    /// Implementations walk the staged contract: receipt, validation
    /// (soft failures become warnings), processing, completion.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumeError`] only for conditions the consumer cannot
    /// continue past; the transport redelivers on error.
    async fn consume(
        &self,
        envelope: &Envelope<Self::Message>,
        trace: &TraceContext,
    ) -> Result<ConsumeReport, ConsumeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_are_ordered_one_through_four() {
        assert_eq!(Stage::Receipt.ordinal(), 1);
        assert_eq!(Stage::Validation.ordinal(), 2);
        assert_eq!(Stage::Processing.ordinal(), 3);
        assert_eq!(Stage::Completion.ordinal(), 4);
    }

    #[test]
    fn reporter_collects_records_in_emission_order() {
        let mut reporter = StageReporter::new("TestMessage", "id-1");
        reporter.info(Stage::Receipt, "accepted");
        reporter.warning(Stage::Validation, "vin length is 15, expected 17");
        reporter.info(Stage::Processing, "reported");
        reporter.info(Stage::Completion, "done");

        let report = reporter.finish();
        assert_eq!(
            report.stages(),
            vec![
                Stage::Receipt,
                Stage::Validation,
                Stage::Processing,
                Stage::Completion
            ]
        );
        assert_eq!(report.warnings().len(), 1);
        assert!(report.completed());
    }

    #[test]
    fn report_without_completion_stage_is_incomplete() {
        let mut reporter = StageReporter::new("TestMessage", "id-2");
        reporter.info(Stage::Receipt, "accepted");

        let report = reporter.finish();
        assert!(!report.completed());
        assert!(report.warnings().is_empty());
    }
}
