//! Infrastructure Database Layer
//!
//! PostgreSQL persistence for the prior-authorization service, built on
//! SQLx. It provides the durable `SubmissionTracker` adapter, used when
//! submission series must survive a restart or be shared between
//! instances.
//!
//! # Architecture
//!
//! The crate follows the repository pattern: `repositories` owns the SQL
//! and row types, `adapters` implements the domain port on top of them.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresSubmissionTracker};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/prior_auth")).await?;
//! run_migrations(&pool).await?;
//! let tracker = PostgresSubmissionTracker::new(pool);
//! ```

pub mod adapters;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repositories;

pub use adapters::PostgresSubmissionTracker;
pub use error::DatabaseError;
pub use migrations::run_migrations;
pub use pool::{create_pool, DatabaseConfig, DatabasePool};
pub use repositories::SubmissionRepository;
