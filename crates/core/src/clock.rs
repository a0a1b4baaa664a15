//! Time source.
//!
//! Availability is a time-relative fact: a booking occupies its spot while
//! `reserved_at <= now < reserved_at + hours`. Everything that needs "now"
//! asks a [`Clock`] so tests can pin or advance time.

use chrono::{DateTime, Utc};

/// Source of the current instant.
pub trait Clock: Send + Sync {
    /// The current time in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
