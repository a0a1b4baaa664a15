//! Storage seam for bookings and spot blocks.
//!
//! The booking coordinator only talks to these traits, so the locking and
//! re-check protocol can be exercised against an in-memory ledger in tests
//! and against `PostgreSQL` ([`super::PgLedger`]) in production.
//!
//! A [`LedgerTx`] is one store transaction. Dropping it without calling
//! [`LedgerTx::commit`] discards every write made through it.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use parkspot_core::{BookingId, BookingStatus, SpotNumber, UserId};

use super::RepositoryError;
use crate::models::{BlockedSpot, Booking, NewBooking, SpotSnapshot};

/// Which bookings an admin listing returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    Active,
    Cancelled,
    All,
}

impl StatusFilter {
    /// Whether a booking with `status` passes this filter.
    #[must_use]
    pub fn matches(self, status: BookingStatus) -> bool {
        match self {
            Self::Active => status == BookingStatus::Active,
            Self::Cancelled => status == BookingStatus::Cancelled,
            Self::All => true,
        }
    }

    /// The single status to filter on, or `None` for every booking.
    #[must_use]
    pub const fn status(self) -> Option<BookingStatus> {
        match self {
            Self::Active => Some(BookingStatus::Active),
            Self::Cancelled => Some(BookingStatus::Cancelled),
            Self::All => None,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "cancelled" => Ok(Self::Cancelled),
            "all" => Ok(Self::All),
            other => Err(format!(
                "invalid status filter '{other}' (expected active, cancelled or all)"
            )),
        }
    }
}

/// Read access and transaction factory for the booking store.
#[async_trait]
pub trait SpotLedger: Send + Sync {
    /// Open a transaction.
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, RepositoryError>;

    /// One snapshot per spot, ascending by spot number, holding the active
    /// bookings that have not ended at `as_of`.
    async fn snapshot_all(&self, as_of: DateTime<Utc>)
    -> Result<Vec<SpotSnapshot>, RepositoryError>;

    /// Bookings passing `filter`, newest first.
    async fn list_bookings(&self, filter: StatusFilter) -> Result<Vec<Booking>, RepositoryError>;

    /// Spots whose block flag is currently set, ascending.
    async fn blocked_spots(&self) -> Result<Vec<BlockedSpot>, RepositoryError>;
}

/// One store transaction.
#[async_trait]
pub trait LedgerTx: Send {
    /// Take the per-spot lock, held until the transaction ends.
    ///
    /// Two transactions that lock the same spot run their critical sections
    /// one after the other.
    async fn lock_spot(&mut self, spot: SpotNumber) -> Result<(), RepositoryError>;

    /// Read the spot's block row and its active, unexpired bookings.
    async fn spot_snapshot(
        &mut self,
        spot: SpotNumber,
        as_of: DateTime<Utc>,
    ) -> Result<SpotSnapshot, RepositoryError>;

    /// Insert an active booking starting at `reserved_at`.
    ///
    /// Returns `RepositoryError::Conflict` if the store rejects it as
    /// overlapping another active booking for the same spot.
    async fn insert_booking(
        &mut self,
        user: UserId,
        booking: &NewBooking,
        reserved_at: DateTime<Utc>,
    ) -> Result<Booking, RepositoryError>;

    /// Flip an active booking to cancelled.
    ///
    /// Returns `RepositoryError::NotFound` if no active booking has `id`.
    async fn cancel_booking(&mut self, id: BookingId) -> Result<Booking, RepositoryError>;

    /// Create the spot's block row as blocked, or invert the existing flag.
    async fn toggle_block(
        &mut self,
        spot: SpotNumber,
        now: DateTime<Utc>,
    ) -> Result<BlockedSpot, RepositoryError>;

    /// Make every write in this transaction durable.
    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_filter_parse() {
        assert_eq!("active".parse(), Ok(StatusFilter::Active));
        assert_eq!("cancelled".parse(), Ok(StatusFilter::Cancelled));
        assert_eq!("all".parse(), Ok(StatusFilter::All));
        assert!("expired".parse::<StatusFilter>().is_err());
        assert_eq!(StatusFilter::default(), StatusFilter::Active);
    }

    #[test]
    fn test_status_filter_matches() {
        assert!(StatusFilter::Active.matches(BookingStatus::Active));
        assert!(!StatusFilter::Active.matches(BookingStatus::Cancelled));
        assert!(StatusFilter::Cancelled.matches(BookingStatus::Cancelled));
        assert!(StatusFilter::All.matches(BookingStatus::Cancelled));
        assert_eq!(StatusFilter::All.status(), None);
    }
}
