//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! parkspot migrate
//! ```
//!
//! Migrations live in `crates/server/migrations/` and are embedded at
//! compile time.

use super::{CliError, connect};

/// Apply all pending migrations.
///
/// # Errors
///
/// Returns `CliError` if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CliError> {
    let pool = connect().await?;

    tracing::info!("Running parking migrations...");
    sqlx::migrate!("../server/migrations").run(&pool).await?;

    tracing::info!("Parking migrations complete!");
    Ok(())
}
