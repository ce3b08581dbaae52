//! Clock abstraction for time-dependent validation.
//!
//! Consumers that inspect dates (e.g., "is this scheduled date already in
//! the past?") take a [`Clock`] instead of calling `Utc::now()` directly,
//! so tests can pin time.

use chrono::{DateTime, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
