//! `PostgreSQL` implementation of the booking ledger.
//!
//! Reservations of one spot are serialised with a transaction-scoped
//! advisory lock keyed on the spot number, so the availability re-check and
//! the insert run at read-committed isolation without racing. The
//! `booking_no_overlap` exclusion constraint backs this up at the store
//! level; a violation surfaces as `RepositoryError::Conflict`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use parkspot_core::{BookingId, BookingStatus, SpotNumber, UserId};

use super::RepositoryError;
use super::ledger::{LedgerTx, SpotLedger, StatusFilter};
use crate::models::{BlockedSpot, Booking, NewBooking, SpotSnapshot};

/// First key of the two-key advisory lock space used for spot locks.
const SPOT_LOCK_NAMESPACE: i32 = 0x5041_524B;

/// SQLSTATE for `exclusion_violation`.
const EXCLUSION_VIOLATION: &str = "23P01";

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: BookingId,
    user_id: UserId,
    parking_spot: i32,
    car_number: String,
    reserved_at: DateTime<Utc>,
    hours: i32,
    status: BookingStatus,
    ends_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = RepositoryError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let parking_spot = SpotNumber::new(row.parking_spot).map_err(|e| {
            RepositoryError::DataCorruption(format!("booking {}: {e}", row.id))
        })?;
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            parking_spot,
            car_number: row.car_number,
            reserved_at: row.reserved_at,
            hours: row.hours,
            status: row.status,
            ends_at: row.ends_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BlockedSpotRow {
    spot_number: i32,
    is_blocked: bool,
    blocked_at: DateTime<Utc>,
}

impl TryFrom<BlockedSpotRow> for BlockedSpot {
    type Error = RepositoryError;

    fn try_from(row: BlockedSpotRow) -> Result<Self, Self::Error> {
        let spot_number = SpotNumber::new(row.spot_number)
            .map_err(|e| RepositoryError::DataCorruption(format!("blocked spot: {e}")))?;
        Ok(Self {
            spot_number,
            is_blocked: row.is_blocked,
            blocked_at: row.blocked_at,
        })
    }
}

fn into_bookings(rows: Vec<BookingRow>) -> Result<Vec<Booking>, RepositoryError> {
    rows.into_iter().map(Booking::try_from).collect()
}

/// Booking ledger backed by the `parking` schema.
#[derive(Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    /// Create a ledger over a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SpotLedger for PgLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, RepositoryError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLedgerTx { tx }))
    }

    async fn snapshot_all(
        &self,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<SpotSnapshot>, RepositoryError> {
        let bookings = sqlx::query_as::<_, BookingRow>(
            r"
            SELECT id, user_id, parking_spot, car_number, reserved_at, hours, status, ends_at
            FROM parking.booking
            WHERE status = 'active' AND ends_at > $1
            ORDER BY parking_spot, reserved_at
            ",
        )
        .bind(as_of)
        .fetch_all(&self.pool)
        .await?;

        let blocks = sqlx::query_as::<_, BlockedSpotRow>(
            r"
            SELECT spot_number, is_blocked, blocked_at
            FROM parking.blocked_spot
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut snapshots: Vec<SpotSnapshot> = SpotNumber::all().map(SpotSnapshot::empty).collect();
        for booking in into_bookings(bookings)? {
            if let Some(snapshot) = snapshots.iter_mut().find(|s| s.spot == booking.parking_spot) {
                snapshot.bookings.push(booking);
            }
        }
        for row in blocks {
            let block = BlockedSpot::try_from(row)?;
            if let Some(snapshot) = snapshots.iter_mut().find(|s| s.spot == block.spot_number) {
                snapshot.blocked = Some(block);
            }
        }

        Ok(snapshots)
    }

    async fn list_bookings(&self, filter: StatusFilter) -> Result<Vec<Booking>, RepositoryError> {
        let rows = sqlx::query_as::<_, BookingRow>(
            r"
            SELECT id, user_id, parking_spot, car_number, reserved_at, hours, status, ends_at
            FROM parking.booking
            WHERE $1::parking.booking_status IS NULL OR status = $1
            ORDER BY reserved_at DESC, id DESC
            ",
        )
        .bind(filter.status())
        .fetch_all(&self.pool)
        .await?;

        into_bookings(rows)
    }

    async fn blocked_spots(&self) -> Result<Vec<BlockedSpot>, RepositoryError> {
        let rows = sqlx::query_as::<_, BlockedSpotRow>(
            r"
            SELECT spot_number, is_blocked, blocked_at
            FROM parking.blocked_spot
            WHERE is_blocked
            ORDER BY spot_number
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(BlockedSpot::try_from).collect()
    }
}

/// An open `PostgreSQL` transaction; rolls back on drop unless committed.
struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn lock_spot(&mut self, spot: SpotNumber) -> Result<(), RepositoryError> {
        sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
            .bind(SPOT_LOCK_NAMESPACE)
            .bind(spot)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn spot_snapshot(
        &mut self,
        spot: SpotNumber,
        as_of: DateTime<Utc>,
    ) -> Result<SpotSnapshot, RepositoryError> {
        let blocked = sqlx::query_as::<_, BlockedSpotRow>(
            r"
            SELECT spot_number, is_blocked, blocked_at
            FROM parking.blocked_spot
            WHERE spot_number = $1
            ",
        )
        .bind(spot)
        .fetch_optional(&mut *self.tx)
        .await?
        .map(BlockedSpot::try_from)
        .transpose()?;

        let rows = sqlx::query_as::<_, BookingRow>(
            r"
            SELECT id, user_id, parking_spot, car_number, reserved_at, hours, status, ends_at
            FROM parking.booking
            WHERE parking_spot = $1 AND status = 'active' AND ends_at > $2
            ORDER BY reserved_at
            ",
        )
        .bind(spot)
        .bind(as_of)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(SpotSnapshot {
            spot,
            blocked,
            bookings: into_bookings(rows)?,
        })
    }

    async fn insert_booking(
        &mut self,
        user: UserId,
        booking: &NewBooking,
        reserved_at: DateTime<Utc>,
    ) -> Result<Booking, RepositoryError> {
        let row = sqlx::query_as::<_, BookingRow>(
            r"
            INSERT INTO parking.booking
                (user_id, parking_spot, car_number, reserved_at, hours, ends_at, status)
            VALUES ($1, $2, $3, $4, $5, $6, 'active')
            RETURNING id, user_id, parking_spot, car_number, reserved_at, hours, status, ends_at
            ",
        )
        .bind(user)
        .bind(booking.spot)
        .bind(&booking.car_number)
        .bind(reserved_at)
        .bind(booking.hours)
        .bind(booking.ends_at(reserved_at))
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.code().as_deref() == Some(EXCLUSION_VIOLATION)
            {
                return RepositoryError::Conflict(format!(
                    "parking spot {} already has an overlapping booking",
                    booking.spot
                ));
            }
            RepositoryError::Database(e)
        })?;

        Booking::try_from(row)
    }

    async fn cancel_booking(&mut self, id: BookingId) -> Result<Booking, RepositoryError> {
        let row = sqlx::query_as::<_, BookingRow>(
            r"
            UPDATE parking.booking
            SET status = 'cancelled'
            WHERE id = $1 AND status = 'active'
            RETURNING id, user_id, parking_spot, car_number, reserved_at, hours, status, ends_at
            ",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Booking::try_from(row)
    }

    async fn toggle_block(
        &mut self,
        spot: SpotNumber,
        now: DateTime<Utc>,
    ) -> Result<BlockedSpot, RepositoryError> {
        let row = sqlx::query_as::<_, BlockedSpotRow>(
            r"
            INSERT INTO parking.blocked_spot (spot_number, is_blocked, blocked_at)
            VALUES ($1, TRUE, $2)
            ON CONFLICT (spot_number) DO UPDATE
            SET is_blocked = NOT parking.blocked_spot.is_blocked,
                blocked_at = EXCLUDED.blocked_at
            RETURNING spot_number, is_blocked, blocked_at
            ",
        )
        .bind(spot)
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await?;

        BlockedSpot::try_from(row)
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }
}
