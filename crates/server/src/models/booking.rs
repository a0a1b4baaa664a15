//! Booking domain types.
//!
//! These are validated domain objects; the row types that `sqlx` decodes
//! into live next to the queries in [`crate::db::bookings`].

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use parkspot_core::{BookingId, BookingStatus, SpotNumber, UserId};

/// A stored reservation of one spot for a whole number of hours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: BookingId,
    pub user_id: UserId,
    pub parking_spot: SpotNumber,
    pub car_number: String,
    pub reserved_at: DateTime<Utc>,
    pub hours: i32,
    pub status: BookingStatus,
    /// `reserved_at + hours`, the exclusive end of the occupancy window.
    #[serde(rename = "endTime")]
    pub ends_at: DateTime<Utc>,
}

impl Booking {
    /// Whether this booking holds its spot at `as_of`.
    ///
    /// Cancelled bookings never do. Active ones do while
    /// `reserved_at <= as_of < ends_at`; a booking stamped in the future
    /// (clock skew between replicas) is treated as already holding the spot.
    #[must_use]
    pub fn occupies(&self, as_of: DateTime<Utc>) -> bool {
        self.status == BookingStatus::Active && self.ends_at > as_of
    }
}

/// A validated reservation request, ready to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub spot: SpotNumber,
    pub car_number: String,
    pub hours: i32,
}

impl NewBooking {
    /// End of the occupancy window for a booking starting at `reserved_at`.
    #[must_use]
    pub fn ends_at(&self, reserved_at: DateTime<Utc>) -> DateTime<Utc> {
        reserved_at + Duration::hours(i64::from(self.hours))
    }
}

/// The admin block flag for one spot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedSpot {
    pub spot_number: SpotNumber,
    pub is_blocked: bool,
    pub blocked_at: DateTime<Utc>,
}

/// Everything availability depends on for a single spot.
///
/// `bookings` holds the active bookings that have not ended at the instant
/// the snapshot was taken; stores may include more (evaluation filters
/// again), never fewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotSnapshot {
    pub spot: SpotNumber,
    pub blocked: Option<BlockedSpot>,
    pub bookings: Vec<Booking>,
}

impl SpotSnapshot {
    /// A spot with no block row and no bookings.
    #[must_use]
    pub const fn empty(spot: SpotNumber) -> Self {
        Self {
            spot,
            blocked: None,
            bookings: Vec::new(),
        }
    }

    /// The active booking holding the spot at `as_of`, ignoring the block
    /// flag. When several overlap, the one that ends last.
    #[must_use]
    pub fn occupant(&self, as_of: DateTime<Utc>) -> Option<&Booking> {
        self.bookings
            .iter()
            .filter(|b| b.parking_spot == self.spot && b.occupies(as_of))
            .max_by_key(|b| b.ends_at)
    }

    /// Whether the spot's block flag is currently set.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.blocked.is_some_and(|b| b.is_blocked)
    }
}
