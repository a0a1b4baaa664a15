//! Test support for Parkspot.
//!
//! Provides an in-memory [`SpotLedger`] with the same locking and overlap
//! guarantees as the `PostgreSQL` ledger, a hand-driven [`Clock`], and
//! helpers for building an [`AppState`] that never touches a database.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use parkspot_core::{AccountType, BookingId, BookingStatus, Clock, SpotNumber, UserId};
use parkspot_server::config::{ParkingConfig, TokenConfig};
use parkspot_server::db::{LedgerTx, RepositoryError, SpotLedger, StatusFilter};
use parkspot_server::models::{BlockedSpot, Booking, NewBooking, SpotSnapshot};
use parkspot_server::services::auth::TokenError;
use parkspot_server::state::AppState;

/// Signing key used by [`test_config`].
pub const TEST_TOKEN_SECRET: &str = "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%";

// =============================================================================
// Clock
// =============================================================================

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    #[must_use]
    pub const fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Jump to `instant`.
    pub fn set(&self, instant: DateTime<Utc>) {
        *lock(&self.now) = instant;
    }

    /// Move forward by `by`.
    pub fn advance(&self, by: Duration) {
        *lock(&self.now) += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}

// =============================================================================
// In-memory ledger
// =============================================================================

#[derive(Debug, Clone)]
struct Tables {
    bookings: Vec<Booking>,
    blocks: BTreeMap<SpotNumber, BlockedSpot>,
    next_booking_id: i32,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            bookings: Vec::new(),
            blocks: BTreeMap::new(),
            next_booking_id: 1,
        }
    }
}

impl Tables {
    fn overlapping(&self, candidate: &Booking) -> bool {
        self.bookings.iter().any(|b| {
            b.parking_spot == candidate.parking_spot
                && b.status == BookingStatus::Active
                && b.reserved_at < candidate.ends_at
                && candidate.reserved_at < b.ends_at
        })
    }

    fn snapshot(&self, spot: SpotNumber, as_of: DateTime<Utc>) -> SpotSnapshot {
        SpotSnapshot {
            spot,
            blocked: self.blocks.get(&spot).copied(),
            bookings: self
                .bookings
                .iter()
                .filter(|b| b.parking_spot == spot && b.occupies(as_of))
                .cloned()
                .collect(),
        }
    }
}

/// Writes made inside one transaction, applied on commit.
#[derive(Debug, Default)]
struct Pending {
    inserted: Vec<Booking>,
    cancelled: Vec<BookingId>,
    blocks: BTreeMap<SpotNumber, BlockedSpot>,
}

impl Pending {
    fn apply(&self, tables: &mut Tables) -> Result<(), RepositoryError> {
        for id in &self.cancelled {
            if let Some(b) = tables.bookings.iter_mut().find(|b| b.id == *id) {
                b.status = BookingStatus::Cancelled;
            }
        }
        for booking in &self.inserted {
            if tables.overlapping(booking) {
                return Err(RepositoryError::Conflict(
                    "booking overlaps an active booking".to_string(),
                ));
            }
            tables.bookings.push(booking.clone());
        }
        tables.blocks.extend(self.blocks.iter().map(|(k, v)| (*k, *v)));
        Ok(())
    }
}

/// A [`SpotLedger`] kept in process memory.
///
/// Each spot has its own async mutex, held from [`LedgerTx::lock_spot`]
/// until the transaction commits or is dropped. Inserts are checked for
/// overlap against committed data, mirroring the exclusion constraint.
#[derive(Debug)]
pub struct MemoryLedger {
    tables: Arc<Mutex<Tables>>,
    spot_locks: Arc<BTreeMap<SpotNumber, Arc<AsyncMutex<()>>>>,
    blind_snapshots: Arc<AtomicBool>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: Arc::default(),
            spot_locks: Arc::new(
                SpotNumber::all()
                    .map(|spot| (spot, Arc::new(AsyncMutex::new(()))))
                    .collect(),
            ),
            blind_snapshots: Arc::default(),
        }
    }

    /// When set, transactional snapshots report no bookings, so only the
    /// insert-time overlap check stands between two reservations.
    pub fn set_blind_snapshots(&self, blind: bool) {
        self.blind_snapshots.store(blind, Ordering::SeqCst);
    }

    /// Every committed booking, in insertion order.
    #[must_use]
    pub fn bookings(&self) -> Vec<Booking> {
        lock(&self.tables).bookings.clone()
    }
}

#[async_trait]
impl SpotLedger for MemoryLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, RepositoryError> {
        Ok(Box::new(MemoryTx {
            tables: Arc::clone(&self.tables),
            spot_locks: Arc::clone(&self.spot_locks),
            blind: self.blind_snapshots.load(Ordering::SeqCst),
            held: BTreeSet::new(),
            guards: Vec::new(),
            pending: Pending::default(),
        }))
    }

    async fn snapshot_all(
        &self,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<SpotSnapshot>, RepositoryError> {
        let tables = lock(&self.tables);
        Ok(SpotNumber::all()
            .map(|spot| tables.snapshot(spot, as_of))
            .collect())
    }

    async fn list_bookings(&self, filter: StatusFilter) -> Result<Vec<Booking>, RepositoryError> {
        let mut bookings: Vec<Booking> = lock(&self.tables)
            .bookings
            .iter()
            .filter(|b| filter.matches(b.status))
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.reserved_at.cmp(&a.reserved_at).then(b.id.cmp(&a.id)));
        Ok(bookings)
    }

    async fn blocked_spots(&self) -> Result<Vec<BlockedSpot>, RepositoryError> {
        Ok(lock(&self.tables)
            .blocks
            .values()
            .filter(|b| b.is_blocked)
            .copied()
            .collect())
    }
}

struct MemoryTx {
    tables: Arc<Mutex<Tables>>,
    spot_locks: Arc<BTreeMap<SpotNumber, Arc<AsyncMutex<()>>>>,
    blind: bool,
    held: BTreeSet<SpotNumber>,
    guards: Vec<OwnedMutexGuard<()>>,
    pending: Pending,
}

impl MemoryTx {
    /// Committed data with this transaction's own writes applied.
    fn view(&self) -> Result<Tables, RepositoryError> {
        let mut tables = lock(&self.tables).clone();
        self.pending.apply(&mut tables)?;
        Ok(tables)
    }
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn lock_spot(&mut self, spot: SpotNumber) -> Result<(), RepositoryError> {
        if !self.held.insert(spot) {
            return Ok(());
        }
        let mutex = self
            .spot_locks
            .get(&spot)
            .ok_or_else(|| RepositoryError::DataCorruption(format!("no lock for spot {spot}")))?;
        self.guards.push(Arc::clone(mutex).lock_owned().await);
        Ok(())
    }

    async fn spot_snapshot(
        &mut self,
        spot: SpotNumber,
        as_of: DateTime<Utc>,
    ) -> Result<SpotSnapshot, RepositoryError> {
        // Give racing transactions a chance to interleave.
        tokio::task::yield_now().await;

        let mut snapshot = self.view()?.snapshot(spot, as_of);
        if self.blind {
            snapshot.bookings.clear();
        }
        Ok(snapshot)
    }

    async fn insert_booking(
        &mut self,
        user: UserId,
        booking: &NewBooking,
        reserved_at: DateTime<Utc>,
    ) -> Result<Booking, RepositoryError> {
        let id = {
            let mut tables = lock(&self.tables);
            let id = tables.next_booking_id;
            tables.next_booking_id += 1;
            BookingId::new(id)
        };

        let inserted = Booking {
            id,
            user_id: user,
            parking_spot: booking.spot,
            car_number: booking.car_number.clone(),
            reserved_at,
            hours: booking.hours,
            status: BookingStatus::Active,
            ends_at: booking.ends_at(reserved_at),
        };

        if self.view()?.overlapping(&inserted) {
            return Err(RepositoryError::Conflict(
                "booking overlaps an active booking".to_string(),
            ));
        }
        self.pending.inserted.push(inserted.clone());
        Ok(inserted)
    }

    async fn cancel_booking(&mut self, id: BookingId) -> Result<Booking, RepositoryError> {
        let mut booking = self
            .view()?
            .bookings
            .into_iter()
            .find(|b| b.id == id && b.status == BookingStatus::Active)
            .ok_or(RepositoryError::NotFound)?;

        booking.status = BookingStatus::Cancelled;
        self.pending.cancelled.push(id);
        Ok(booking)
    }

    async fn toggle_block(
        &mut self,
        spot: SpotNumber,
        now: DateTime<Utc>,
    ) -> Result<BlockedSpot, RepositoryError> {
        let is_blocked = self
            .view()?
            .blocks
            .get(&spot)
            .is_none_or(|b| !b.is_blocked);

        let block = BlockedSpot {
            spot_number: spot,
            is_blocked,
            blocked_at: now,
        };
        self.pending.blocks.insert(spot, block);
        Ok(block)
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let mut tables = lock(&self.tables);
        let mut staged = tables.clone();
        self.pending.apply(&mut staged)?;
        *tables = staged;
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Application fixtures
// =============================================================================

/// Server configuration for in-process tests.
#[must_use]
pub fn test_config() -> ParkingConfig {
    ParkingConfig {
        database_url: SecretString::from("postgres://parkspot@localhost/parkspot_test"),
        db_max_connections: 1,
        host: [127, 0, 0, 1].into(),
        port: 0,
        token: TokenConfig {
            secret: SecretString::from(TEST_TOKEN_SECRET),
            ttl: Duration::hours(24),
        },
        cors_origins: vec!["http://localhost".to_string()],
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// Application state over `ledger` and `clock`.
///
/// The `PostgreSQL` pool is lazy and never connects, so only routes that go
/// through the ledger (or fail before reaching the database) are usable.
/// Must be called from within a Tokio runtime.
#[must_use]
pub fn test_state(ledger: Arc<MemoryLedger>, clock: Arc<ManualClock>) -> AppState {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect_lazy_with(PgConnectOptions::new());
    AppState::with_parts(test_config(), pool, ledger, clock)
}

/// A bearer token for `user` valid at the state's current time.
///
/// # Errors
///
/// Returns `TokenError` if signing fails.
pub fn bearer_token(
    state: &AppState,
    user: i32,
    account_type: AccountType,
) -> Result<String, TokenError> {
    let token = state
        .token_keys()
        .issue(UserId::new(user), account_type, state.clock().now())?;
    Ok(format!("Bearer {token}"))
}
