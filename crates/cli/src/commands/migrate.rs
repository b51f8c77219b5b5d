//! Database migration command.
//!
//! ```bash
//! tw-cli migrate
//! ```
//!
//! Reads `TABLEWISE_DATABASE_URL` (or `DATABASE_URL`) and applies
//! `crates/admin/migrations/`.

use super::{DatabaseError, connect};

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error(transparent)]
    Connect(#[from] DatabaseError),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run all pending migrations.
pub async fn run() -> Result<(), MigrationError> {
    let pool = connect().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../admin/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
