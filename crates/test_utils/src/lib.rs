//! Test Utilities Crate
//!
//! Shared test infrastructure for the prior-authorization workspace.
//!
//! # Modules
//!
//! - `fixtures`: Ready-made request bundles, codes and claim ids
//! - `builders`: `BundleBuilder` and `ClaimBuilder`
//! - `database`: PostgreSQL testcontainer management
//! - `assertions`: Assertion helpers for decisions and port results
//! - `generators`: Property-based claim and series generators

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
