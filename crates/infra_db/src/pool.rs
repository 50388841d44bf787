//! Tracker database pool
//!
//! Every merge holds the series row lock for the length of one transaction.
//! Sessions are therefore opened with a `lock_timeout`, so a writer stuck
//! behind another writer of the same claim fails instead of holding a pool
//! connection until the request deadline. An
//! `idle_in_transaction_session_timeout` releases locks left by a request
//! that was dropped mid-transaction.

use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::info;

use crate::error::DatabaseError;

/// Type alias for the PostgreSQL connection pool
pub type DatabasePool = PgPool;

/// Name the tracker reports in `pg_stat_activity`
const APPLICATION_NAME: &str = "prior-auth-rules";

/// Settings of the tracker's connection pool
///
/// # Example
///
/// ```rust
/// use infra_db::DatabaseConfig;
/// use std::time::Duration;
///
/// let config = DatabaseConfig::new("postgres://localhost/prior_auth")
///     .max_connections(20)
///     .lock_timeout(Duration::from_secs(2));
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Wait for a free pool connection
    pub acquire_timeout: Duration,
    /// Wait for another writer's series row lock
    pub lock_timeout: Duration,
    pub idle_in_transaction_timeout: Duration,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(10),
            lock_timeout: Duration::from_secs(5),
            idle_in_transaction_timeout: Duration::from_secs(60),
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Session parameters set on every pooled connection
    pub fn session_options(&self) -> Vec<(&'static str, String)> {
        vec![
            ("lock_timeout", format!("{}ms", self.lock_timeout.as_millis())),
            (
                "idle_in_transaction_session_timeout",
                format!("{}ms", self.idle_in_transaction_timeout.as_millis()),
            ),
        ]
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::new("postgres://localhost/prior_auth")
    }
}

/// Creates the tracker's connection pool
///
/// # Errors
///
/// Returns `DatabaseError::ConnectionFailed` if the URL is invalid or the
/// database cannot be reached
pub async fn create_pool(config: DatabaseConfig) -> Result<DatabasePool, DatabaseError> {
    let options = PgConnectOptions::from_str(&config.url)
        .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?
        .application_name(APPLICATION_NAME)
        .options(config.session_options());

    info!(
        max_connections = config.max_connections,
        lock_timeout_ms = config.lock_timeout.as_millis() as u64,
        "Creating tracker database pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(options)
        .await
        .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

    Ok(pool)
}
