//! Spot availability.
//!
//! Pure evaluation over a [`SpotSnapshot`]: no I/O, no clock. The caller
//! decides which instant to evaluate at and where the snapshot came from
//! (inside a locked transaction for reservations, from the pool for
//! read-only listings).

use chrono::{DateTime, Utc};

use parkspot_core::BookingId;

use crate::models::SpotSnapshot;

/// Whether a spot can be booked right now, and if not, why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Free,
    /// An admin has blocked the spot.
    Blocked,
    /// An active booking holds the spot until `until` (exclusive).
    Occupied {
        booking_id: BookingId,
        until: DateTime<Utc>,
    },
}

impl Availability {
    #[must_use]
    pub const fn is_available(self) -> bool {
        matches!(self, Self::Free)
    }
}

/// Decide whether the snapshot's spot is free at `as_of`.
///
/// A set block flag wins over everything. Otherwise the spot is occupied by
/// the active booking with the latest end among those whose window has not
/// closed at `as_of`; cancelled and ended bookings are ignored.
#[must_use]
pub fn evaluate(snapshot: &SpotSnapshot, as_of: DateTime<Utc>) -> Availability {
    if snapshot.is_blocked() {
        return Availability::Blocked;
    }

    snapshot
        .occupant(as_of)
        .map_or(Availability::Free, |b| Availability::Occupied {
            booking_id: b.id,
            until: b.ends_at,
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};

    use parkspot_core::{BookingStatus, SpotNumber, UserId};

    use super::*;
    use crate::models::{BlockedSpot, Booking};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn spot(n: i32) -> SpotNumber {
        SpotNumber::new(n).unwrap()
    }

    fn booking(id: i32, at: DateTime<Utc>, hours: i32, status: BookingStatus) -> Booking {
        Booking {
            id: BookingId::new(id),
            user_id: UserId::new(1),
            parking_spot: spot(5),
            car_number: "KA01AB1234".to_string(),
            reserved_at: at,
            hours,
            status,
            ends_at: at + Duration::hours(i64::from(hours)),
        }
    }

    fn block(is_blocked: bool) -> BlockedSpot {
        BlockedSpot {
            spot_number: spot(5),
            is_blocked,
            blocked_at: t0(),
        }
    }

    #[test]
    fn test_empty_spot_is_free() {
        let snap = SpotSnapshot::empty(spot(5));
        assert_eq!(evaluate(&snap, t0()), Availability::Free);
        assert!(evaluate(&snap, t0()).is_available());
    }

    #[test]
    fn test_active_booking_occupies_until_end() {
        let mut snap = SpotSnapshot::empty(spot(5));
        snap.bookings.push(booking(7, t0(), 2, BookingStatus::Active));

        let at_start = evaluate(&snap, t0());
        assert_eq!(
            at_start,
            Availability::Occupied {
                booking_id: BookingId::new(7),
                until: t0() + Duration::hours(2),
            }
        );
        assert!(!evaluate(&snap, t0() + Duration::minutes(119)).is_available());
        // The window is half-open: the end instant is free again.
        assert!(evaluate(&snap, t0() + Duration::hours(2)).is_available());
    }

    #[test]
    fn test_cancelled_booking_never_counts() {
        let mut snap = SpotSnapshot::empty(spot(5));
        snap.bookings
            .push(booking(7, t0(), 4, BookingStatus::Cancelled));
        assert!(evaluate(&snap, t0() + Duration::hours(1)).is_available());
    }

    #[test]
    fn test_block_wins_over_bookings() {
        let mut snap = SpotSnapshot::empty(spot(5));
        snap.blocked = Some(block(true));
        assert_eq!(evaluate(&snap, t0()), Availability::Blocked);

        snap.bookings.push(booking(7, t0(), 2, BookingStatus::Active));
        assert_eq!(evaluate(&snap, t0()), Availability::Blocked);
    }

    #[test]
    fn test_unblocked_row_falls_back_to_bookings() {
        let mut snap = SpotSnapshot::empty(spot(5));
        snap.blocked = Some(block(false));
        assert!(evaluate(&snap, t0()).is_available());

        snap.bookings.push(booking(7, t0(), 2, BookingStatus::Active));
        assert_eq!(
            evaluate(&snap, t0()),
            Availability::Occupied {
                booking_id: BookingId::new(7),
                until: t0() + Duration::hours(2),
            }
        );
    }

    #[test]
    fn test_reports_latest_end() {
        let mut snap = SpotSnapshot::empty(spot(5));
        snap.bookings.push(booking(1, t0(), 1, BookingStatus::Active));
        snap.bookings
            .push(booking(2, t0() - Duration::hours(1), 5, BookingStatus::Active));

        assert_eq!(
            evaluate(&snap, t0()),
            Availability::Occupied {
                booking_id: BookingId::new(2),
                until: t0() + Duration::hours(4),
            }
        );
    }
}
