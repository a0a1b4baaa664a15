//! Booking coordinator scenarios against the in-memory ledger.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use parkspot_core::{BookingId, BookingStatus, Clock, SpotNumber, UserId};
use parkspot_integration_tests::{ManualClock, MemoryLedger};
use parkspot_server::db::{SpotLedger, StatusFilter};
use parkspot_server::services::{
    Availability, BookingError, BookingService, ConflictReason, evaluate,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

fn fixture() -> (Arc<MemoryLedger>, Arc<ManualClock>) {
    (
        Arc::new(MemoryLedger::new()),
        Arc::new(ManualClock::new(t0())),
    )
}

fn spot(n: i32) -> SpotNumber {
    SpotNumber::new(n).unwrap()
}

#[tokio::test]
async fn test_spot_frees_up_when_booking_ends() {
    let (ledger, clock) = fixture();
    let service = BookingService::new(ledger.as_ref(), clock.as_ref());

    let first = service
        .reserve(UserId::new(1), 5, "AB-123", 2)
        .await
        .unwrap();
    assert_eq!(first.reserved_at, t0());
    assert_eq!(first.ends_at, t0() + Duration::hours(2));
    assert_eq!(first.status, BookingStatus::Active);

    clock.set(t0() + Duration::hours(1));
    let err = service
        .reserve(UserId::new(2), 5, "CD-456", 1)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BookingError::Conflict {
            reason: ConflictReason::OccupiedUntil(until),
            ..
        } if until == t0() + Duration::hours(2)
    ));

    clock.set(t0() + Duration::hours(3));
    let second = service
        .reserve(UserId::new(2), 5, "CD-456", 1)
        .await
        .unwrap();
    assert_eq!(second.reserved_at, t0() + Duration::hours(3));
    assert_ne!(second.id, first.id);
}

#[tokio::test]
async fn test_booking_ends_exactly_at_end_time() {
    let (ledger, clock) = fixture();
    let service = BookingService::new(ledger.as_ref(), clock.as_ref());
    service
        .reserve(UserId::new(1), 9, "AB-123", 1)
        .await
        .unwrap();

    clock.set(t0() + Duration::hours(1));
    assert!(
        service
            .reserve(UserId::new(2), 9, "CD-456", 1)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_end_time_is_start_plus_hours_on_every_spot() {
    let (ledger, clock) = fixture();
    let service = BookingService::new(ledger.as_ref(), clock.as_ref());

    for (hours, n) in (1_i64..).zip(1..=16) {
        let booking = service
            .reserve(UserId::new(1), n, "AB-123", hours)
            .await
            .unwrap();
        assert_eq!(booking.parking_spot, spot(i32::try_from(n).unwrap()));
        assert_eq!(booking.ends_at, booking.reserved_at + Duration::hours(hours));
    }
    assert_eq!(ledger.bookings().len(), 16);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reservations_have_one_winner() {
    let (ledger, clock) = fixture();

    let handles: Vec<_> = (1..=8)
        .map(|user| {
            let ledger = Arc::clone(&ledger);
            let clock = Arc::clone(&clock);
            tokio::spawn(async move {
                BookingService::new(ledger.as_ref(), clock.as_ref())
                    .reserve(UserId::new(user), 7, "RACE-1", 2)
                    .await
            })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(BookingError::Conflict { spot: s, .. }) => assert_eq!(s, spot(7)),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(ledger.bookings().len(), 1);
}

#[tokio::test]
async fn test_store_overlap_is_reported_as_conflict() {
    let (ledger, clock) = fixture();
    let service = BookingService::new(ledger.as_ref(), clock.as_ref());
    service
        .reserve(UserId::new(1), 3, "AB-123", 4)
        .await
        .unwrap();

    ledger.set_blind_snapshots(true);
    let err = service
        .reserve(UserId::new(2), 3, "CD-456", 1)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BookingError::Conflict {
            reason: ConflictReason::Overlap,
            ..
        }
    ));
    assert_eq!(
        err.to_string(),
        "parking spot 3 was just booked by someone else"
    );
    assert_eq!(ledger.bookings().len(), 1);
}

#[tokio::test]
async fn test_blocked_spot_rejects_then_accepts_after_unblock() {
    let (ledger, clock) = fixture();
    let service = BookingService::new(ledger.as_ref(), clock.as_ref());

    let block = service.toggle_block(spot(12)).await.unwrap();
    assert!(block.is_blocked);
    assert_eq!(block.blocked_at, t0());

    let err = service
        .reserve(UserId::new(1), 12, "AB-123", 1)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BookingError::Conflict {
            reason: ConflictReason::Blocked,
            ..
        }
    ));
    assert_eq!(err.to_string(), "parking spot 12 is blocked");

    let blocked = ledger.blocked_spots().await.unwrap();
    assert_eq!(blocked.len(), 1);
    assert_eq!(blocked[0].spot_number, spot(12));

    clock.advance(Duration::minutes(5));
    let unblock = service.toggle_block(spot(12)).await.unwrap();
    assert!(!unblock.is_blocked);
    assert_eq!(unblock.blocked_at, t0() + Duration::minutes(5));
    assert!(ledger.blocked_spots().await.unwrap().is_empty());

    assert!(
        service
            .reserve(UserId::new(1), 12, "AB-123", 1)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_blocking_keeps_existing_booking() {
    let (ledger, clock) = fixture();
    let service = BookingService::new(ledger.as_ref(), clock.as_ref());
    let booking = service
        .reserve(UserId::new(1), 4, "AB-123", 2)
        .await
        .unwrap();

    service.toggle_block(spot(4)).await.unwrap();

    let snapshots = ledger.snapshot_all(clock.now()).await.unwrap();
    let four = &snapshots[3];
    assert_eq!(four.spot, spot(4));
    assert_eq!(evaluate(four, clock.now()), Availability::Blocked);
    assert_eq!(four.occupant(clock.now()).map(|b| b.id), Some(booking.id));
}

#[tokio::test]
async fn test_cancel_frees_spot_and_is_not_repeatable() {
    let (ledger, clock) = fixture();
    let service = BookingService::new(ledger.as_ref(), clock.as_ref());
    let booking = service
        .reserve(UserId::new(1), 8, "AB-123", 6)
        .await
        .unwrap();

    let cancelled = service.cancel(booking.id).await.unwrap();
    assert_eq!(cancelled.id, booking.id);
    assert_eq!(cancelled.status, BookingStatus::Cancelled);

    assert!(matches!(
        service.cancel(booking.id).await,
        Err(BookingError::NotFound)
    ));

    assert!(
        service
            .reserve(UserId::new(2), 8, "CD-456", 1)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_cancel_unknown_booking() {
    let (ledger, clock) = fixture();
    let service = BookingService::new(ledger.as_ref(), clock.as_ref());

    assert!(matches!(
        service.cancel(BookingId::new(4242)).await,
        Err(BookingError::NotFound)
    ));
}

#[tokio::test]
async fn test_expired_bookings_leave_snapshots() {
    let (ledger, clock) = fixture();
    let service = BookingService::new(ledger.as_ref(), clock.as_ref());
    service
        .reserve(UserId::new(1), 1, "AB-123", 1)
        .await
        .unwrap();
    service
        .reserve(UserId::new(1), 2, "AB-123", 3)
        .await
        .unwrap();

    clock.advance(Duration::hours(2));
    let now = clock.now();
    let occupied: Vec<SpotNumber> = ledger
        .snapshot_all(now)
        .await
        .unwrap()
        .iter()
        .filter(|s| s.occupant(now).is_some())
        .map(|s| s.spot)
        .collect();

    assert_eq!(occupied, vec![spot(2)]);
}

#[tokio::test]
async fn test_status_filters() {
    let (ledger, clock) = fixture();
    let service = BookingService::new(ledger.as_ref(), clock.as_ref());
    let kept = service
        .reserve(UserId::new(1), 1, "AB-123", 1)
        .await
        .unwrap();
    clock.advance(Duration::minutes(1));
    let dropped = service
        .reserve(UserId::new(1), 2, "AB-123", 1)
        .await
        .unwrap();
    service.cancel(dropped.id).await.unwrap();

    let ids = |bookings: Vec<parkspot_server::models::Booking>| -> Vec<BookingId> {
        bookings.into_iter().map(|b| b.id).collect()
    };

    assert_eq!(
        ids(ledger.list_bookings(StatusFilter::Active).await.unwrap()),
        vec![kept.id]
    );
    assert_eq!(
        ids(ledger.list_bookings(StatusFilter::Cancelled).await.unwrap()),
        vec![dropped.id]
    );
    assert_eq!(
        ids(ledger.list_bookings(StatusFilter::All).await.unwrap()),
        vec![dropped.id, kept.id]
    );
}

#[tokio::test]
async fn test_invalid_requests_touch_nothing() {
    let (ledger, clock) = fixture();
    let service = BookingService::new(ledger.as_ref(), clock.as_ref());

    for (spot, car, hours) in [
        (0, "AB-123", 1),
        (17, "AB-123", 1),
        (5, "   ", 1),
        (5, "AB-123", 0),
        (5, "AB-123", 721),
    ] {
        assert!(matches!(
            service.reserve(UserId::new(1), spot, car, hours).await,
            Err(BookingError::Validation(_))
        ));
    }
    assert!(ledger.bookings().is_empty());
}
