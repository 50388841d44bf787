//! Submission tracker adapters shipped with the domain crate
//!
//! The PostgreSQL adapter lives in `infra_db`.

pub mod memory;

pub use memory::InMemorySubmissionTracker;
