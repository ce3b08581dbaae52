//! Fatal consume-side error taxonomy.
//!
//! Soft validation issues are not errors: consumers record them as warning
//! stage outcomes and continue. [`ConsumeError`] covers only the conditions
//! a consumer cannot reasonably continue past. Any `ConsumeError` escaping
//! `consume` signals the transport's redelivery policy.

use crate::message::MessageError;
use thiserror::Error;

/// A fatal failure during message consumption.
///
/// The tracing filter records these on the consume span and re-propagates
/// them unchanged; the runtime treats them as a failed delivery attempt.
#[derive(Error, Debug)]
pub enum ConsumeError {
    /// The wire payload could not be decoded into the typed message.
    #[error("Failed to decode message payload: {0}")]
    Decode(#[from] MessageError),

    /// A field required at the type level was absent or unusable.
    #[error("Required field '{field}' is missing or unusable: {reason}")]
    MissingField {
        /// The field that failed.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// An external collaborator call failed during the processing stage.
    #[error("Downstream call failed: {0}")]
    Downstream(String),
}
