//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use parkspot_core::{Clock, SystemClock};

use crate::config::ParkingConfig;
use crate::db::{PgLedger, SpotLedger};
use crate::services::TokenKeys;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the database pool, booking ledger and signing keys.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ParkingConfig,
    pool: PgPool,
    ledger: Arc<dyn SpotLedger>,
    clock: Arc<dyn Clock>,
    token_keys: TokenKeys,
}

impl AppState {
    /// Create application state backed by `PostgreSQL` and the system clock.
    #[must_use]
    pub fn new(config: ParkingConfig, pool: PgPool) -> Self {
        let ledger = Arc::new(PgLedger::new(pool.clone()));
        Self::with_parts(config, pool, ledger, Arc::new(SystemClock))
    }

    /// Create application state with an explicit ledger and clock.
    #[must_use]
    pub fn with_parts(
        config: ParkingConfig,
        pool: PgPool,
        ledger: Arc<dyn SpotLedger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let token_keys = TokenKeys::from_config(&config.token);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                ledger,
                clock,
                token_keys,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ParkingConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get the booking ledger.
    #[must_use]
    pub fn ledger(&self) -> &dyn SpotLedger {
        self.inner.ledger.as_ref()
    }

    /// Get the time source.
    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        self.inner.clock.as_ref()
    }

    /// Get the bearer token keys.
    #[must_use]
    pub fn token_keys(&self) -> &TokenKeys {
        &self.inner.token_keys
    }
}
