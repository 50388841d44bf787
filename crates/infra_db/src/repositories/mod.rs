//! Repository implementations
//!
//! Repositories hold the SQL and the row types; the adapters in
//! [`crate::adapters`] translate rows into domain values.

pub mod submissions;

pub use submissions::{PartRow, SeriesRow, SubmissionRepository};
