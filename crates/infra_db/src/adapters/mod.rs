//! Domain Adapters
//!
//! PostgreSQL implementations of domain ports.
//!
//! # Usage
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresSubmissionTracker;
//!
//! let tracker = PostgresSubmissionTracker::new(pool);
//! let view = tracker.view(&claim_id).await?;
//! ```

pub mod submissions;

pub use submissions::PostgresSubmissionTracker;
