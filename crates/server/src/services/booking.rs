//! Booking transaction coordinator.
//!
//! Every decision is made inside one ledger transaction that first takes
//! the spot's lock, then re-reads and evaluates the spot at the clock's
//! "now". Whoever commits first for a spot wins; the loser sees the
//! winner's row in its re-check and gets [`BookingError::Conflict`].

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::instrument;

use parkspot_core::{BookingId, Clock, SpotNumber, UserId};

use crate::db::{RepositoryError, SpotLedger};
use crate::models::{BlockedSpot, Booking, NewBooking};
use crate::services::availability::{Availability, evaluate};

/// Longest bookable duration (30 days).
pub const MAX_HOURS: i64 = 720;

/// Longest accepted car registration, after trimming.
pub const MAX_CAR_NUMBER_LENGTH: usize = 16;

/// Why a spot could not be booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    Blocked,
    OccupiedUntil(DateTime<Utc>),
    /// The store rejected the insert as overlapping another booking.
    Overlap,
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blocked => f.write_str("is blocked"),
            Self::OccupiedUntil(until) => write!(f, "is occupied until {}", until.to_rfc3339()),
            Self::Overlap => f.write_str("was just booked by someone else"),
        }
    }
}

/// Errors from booking operations.
#[derive(Debug, Error)]
pub enum BookingError {
    /// The request was malformed; nothing was read or written.
    #[error("{0}")]
    Validation(String),

    /// The spot is not available.
    #[error("parking spot {spot} {reason}")]
    Conflict {
        spot: SpotNumber,
        reason: ConflictReason,
    },

    /// No active booking with the given ID.
    #[error("booking not found")]
    NotFound,

    /// The store failed.
    #[error(transparent)]
    Store(#[from] RepositoryError),
}

/// Check a reservation request and normalise it.
///
/// # Errors
///
/// Returns `BookingError::Validation` if the spot is outside `1..=16`,
/// `hours` is outside `1..=720`, or the trimmed car number is empty or
/// longer than 16 characters.
pub fn validate_request(
    parking_spot: i64,
    car_number: &str,
    hours: i64,
) -> Result<NewBooking, BookingError> {
    let spot =
        SpotNumber::new(parking_spot).map_err(|e| BookingError::Validation(e.to_string()))?;

    let car_number = car_number.trim();
    if car_number.is_empty() {
        return Err(BookingError::Validation(
            "car number is required".to_string(),
        ));
    }
    if car_number.chars().count() > MAX_CAR_NUMBER_LENGTH {
        return Err(BookingError::Validation(format!(
            "car number must be at most {MAX_CAR_NUMBER_LENGTH} characters"
        )));
    }

    let hours = i32::try_from(hours)
        .ok()
        .filter(|h| (1..=MAX_HOURS).contains(&i64::from(*h)))
        .ok_or_else(|| {
            BookingError::Validation(format!("hours must be between 1 and {MAX_HOURS}"))
        })?;

    Ok(NewBooking {
        spot,
        car_number: car_number.to_string(),
        hours,
    })
}

/// Reserves, cancels and blocks spots against a [`SpotLedger`].
pub struct BookingService<'a> {
    ledger: &'a dyn SpotLedger,
    clock: &'a dyn Clock,
}

impl<'a> BookingService<'a> {
    #[must_use]
    pub const fn new(ledger: &'a dyn SpotLedger, clock: &'a dyn Clock) -> Self {
        Self { ledger, clock }
    }

    /// Book `spot` for `hours` starting now.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::Validation` for a malformed request (before
    /// touching the store), `BookingError::Conflict` if the spot is blocked
    /// or occupied, and `BookingError::Store` if the store fails.
    #[instrument(skip(self, car_number))]
    pub async fn reserve(
        &self,
        user: UserId,
        parking_spot: i64,
        car_number: &str,
        hours: i64,
    ) -> Result<Booking, BookingError> {
        let request = validate_request(parking_spot, car_number, hours)?;
        let spot = request.spot;

        let mut tx = self.ledger.begin().await?;
        tx.lock_spot(spot).await?;

        let now = self.clock.now();
        let snapshot = tx.spot_snapshot(spot, now).await?;
        match evaluate(&snapshot, now) {
            Availability::Free => {}
            Availability::Blocked => {
                return Err(BookingError::Conflict {
                    spot,
                    reason: ConflictReason::Blocked,
                });
            }
            Availability::Occupied { until, .. } => {
                return Err(BookingError::Conflict {
                    spot,
                    reason: ConflictReason::OccupiedUntil(until),
                });
            }
        }

        let booking = tx
            .insert_booking(user, &request, now)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => BookingError::Conflict {
                    spot,
                    reason: ConflictReason::Overlap,
                },
                other => BookingError::Store(other),
            })?;
        tx.commit().await?;

        tracing::info!(
            booking_id = %booking.id,
            spot = %spot,
            hours = booking.hours,
            "Booking created"
        );
        Ok(booking)
    }

    /// Cancel an active booking.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::NotFound` if the booking does not exist or is
    /// already cancelled, and `BookingError::Store` if the store fails.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: BookingId) -> Result<Booking, BookingError> {
        let mut tx = self.ledger.begin().await?;
        let booking = tx.cancel_booking(id).await.map_err(|e| match e {
            RepositoryError::NotFound => BookingError::NotFound,
            other => BookingError::Store(other),
        })?;
        tx.commit().await?;

        tracing::info!(booking_id = %booking.id, spot = %booking.parking_spot, "Booking cancelled");
        Ok(booking)
    }

    /// Block an unblocked spot or unblock a blocked one.
    ///
    /// The first toggle of a spot blocks it. Takes the same spot lock as
    /// [`Self::reserve`], so a reservation in flight either commits before
    /// the block or sees it.
    ///
    /// # Errors
    ///
    /// Returns `BookingError::Store` if the store fails.
    #[instrument(skip(self))]
    pub async fn toggle_block(&self, spot: SpotNumber) -> Result<BlockedSpot, BookingError> {
        let mut tx = self.ledger.begin().await?;
        tx.lock_spot(spot).await?;
        let block = tx.toggle_block(spot, self.clock.now()).await?;
        tx.commit().await?;

        tracing::info!(spot = %spot, is_blocked = block.is_blocked, "Spot block toggled");
        Ok(block)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_trims_car_number() {
        let req = validate_request(5, "  KA01AB1234 ", 2).unwrap();
        assert_eq!(req.spot.get(), 5);
        assert_eq!(req.car_number, "KA01AB1234");
        assert_eq!(req.hours, 2);
    }

    #[test]
    fn test_validate_spot_range() {
        assert!(matches!(
            validate_request(0, "KA01", 1),
            Err(BookingError::Validation(_))
        ));
        assert!(matches!(
            validate_request(17, "KA01", 1),
            Err(BookingError::Validation(_))
        ));
        assert!(validate_request(16, "KA01", 1).is_ok());
    }

    #[test]
    fn test_validate_hours_range() {
        assert!(validate_request(1, "KA01", 0).is_err());
        assert!(validate_request(1, "KA01", -4).is_err());
        assert!(validate_request(1, "KA01", MAX_HOURS + 1).is_err());
        assert!(validate_request(1, "KA01", i64::MAX).is_err());
        assert_eq!(validate_request(1, "KA01", MAX_HOURS).unwrap().hours, 720);
    }

    #[test]
    fn test_validate_car_number() {
        let err = validate_request(1, "   ", 1).unwrap_err();
        assert_eq!(err.to_string(), "car number is required");
        assert!(validate_request(1, &"X".repeat(17), 1).is_err());
        assert!(validate_request(1, &"X".repeat(16), 1).is_ok());
    }

    #[test]
    fn test_conflict_messages() {
        let spot = SpotNumber::new(3).unwrap();
        let err = BookingError::Conflict {
            spot,
            reason: ConflictReason::Blocked,
        };
        assert_eq!(err.to_string(), "parking spot 3 is blocked");

        let until = DateTime::parse_from_rfc3339("2026-03-02T11:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let err = BookingError::Conflict {
            spot,
            reason: ConflictReason::OccupiedUntil(until),
        };
        assert_eq!(
            err.to_string(),
            "parking spot 3 is occupied until 2026-03-02T11:00:00+00:00"
        );
    }
}
