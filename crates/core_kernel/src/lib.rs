//! Core Kernel - Foundational types shared by the prior-authorization crates
//!
//! This crate provides the building blocks used across the workspace:
//! - Strongly-typed identifiers
//! - Port infrastructure for swappable storage adapters
//! - An injectable random source
//! - Common error types

pub mod identifiers;
pub mod error;
pub mod ports;
pub mod random;

pub use identifiers::{ClaimId, DecisionId, SubmissionId};
pub use error::CoreError;
pub use ports::{
    PortError, DomainPort, AdapterHealth, HealthCheckResult, HealthCheckable,
};
pub use random::{RandomSource, StdRandom};
