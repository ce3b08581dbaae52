//! Deterministic trace context derivation.
//!
//! The observability backend groups spans by trace identity. For messages
//! delivered over a broker there is no in-band trace header, so the pipeline
//! derives the trace identity from the message's correlation identity
//! instead: every delivery attempt of messages sharing a `correlation_id`
//! lands in the same trace, while each attempt gets a fresh span identity.
//!
//! # Derivation
//!
//! The anchor is resolved through a total fallback chain:
//!
//! ```text
//! anchor = correlation_id ?? message_id ?? random
//! ```
//!
//! The trace id is the anchor UUID's sixteen bytes verbatim, rendered as 32
//! lowercase hex characters. The derivation is a pure function of the
//! anchor's canonical form: identical anchors yield identical trace ids
//! across processes and restarts. Span ids are eight random bytes, never
//! reused across retries.

use crate::envelope::{CorrelationId, MessageId};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Fixed-width trace identity: 16 bytes, 32 hex chars.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TraceId([u8; 16]);

impl TraceId {
    /// Derive a trace id deterministically from an anchor UUID.
    ///
    /// The anchor's sixteen canonical bytes become the trace id directly,
    /// so the mapping is pure, total, and collision-resistant to the same
    /// degree the anchor ids are.
    #[must_use]
    pub const fn from_anchor(anchor: Uuid) -> Self {
        Self(*anchor.as_bytes())
    }

    /// The raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Fixed-width span identity: 8 bytes, 16 hex chars, fresh per attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpanId([u8; 8]);

impl SpanId {
    /// Generate a fresh, non-zero span id.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes: [u8; 8] = rand::random();
        // The all-zero span id is reserved as invalid in trace backends.
        if bytes == [0u8; 8] {
            bytes[7] = 1;
        }
        Self(bytes)
    }

    /// The raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// The trace context for one delivery attempt.
///
/// Created by the tracing filter before the consumer runs and discarded when
/// the attempt's span closes. Passed to the consumer as an explicit
/// parameter; the pipeline does not rely on ambient thread-local state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TraceContext {
    /// Shared by every attempt of the same correlation identity.
    pub trace_id: TraceId,

    /// Unique to this attempt.
    pub span_id: SpanId,

    /// Always true: consume spans are recorded unconditionally.
    pub sampled: bool,
}

impl TraceContext {
    /// Derive a context for one delivery attempt.
    ///
    /// The fallback chain is total: an envelope with no identifiers of any
    /// kind still yields a usable (random) anchor rather than failing.
    #[must_use]
    pub fn derive(
        correlation_id: Option<CorrelationId>,
        message_id: Option<MessageId>,
    ) -> Self {
        let anchor = resolve_anchor(correlation_id, message_id);
        Self {
            trace_id: TraceId::from_anchor(anchor),
            span_id: SpanId::generate(),
            sampled: true,
        }
    }
}

/// Resolve the correlation anchor: `correlation_id ?? message_id ?? random`.
///
/// Pure except for the terminal random fallback, which only fires when both
/// identifiers are absent.
#[must_use]
pub fn resolve_anchor(
    correlation_id: Option<CorrelationId>,
    message_id: Option<MessageId>,
) -> Uuid {
    correlation_id
        .map(|c| c.as_uuid())
        .or_else(|| message_id.map(|m| m.as_uuid()))
        .unwrap_or_else(Uuid::new_v4)
}
