//! Schema migrations
//!
//! The SQL files live in the workspace-level `migrations/` directory and
//! are embedded at compile time.

use sqlx::PgPool;
use tracing::info;

use crate::error::DatabaseError;

/// Applies all pending migrations
///
/// # Errors
///
/// Returns `DatabaseError::MigrationFailed` if a migration cannot be applied
pub async fn run_migrations(pool: &PgPool) -> Result<(), DatabaseError> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    info!("database migrations applied");
    Ok(())
}
