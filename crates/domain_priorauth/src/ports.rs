//! Prior-Authorization Domain Ports
//!
//! The `SubmissionTracker` port stores the parts of differential submission
//! series. Two adapters implement it:
//!
//! - **In-memory adapter** ([`crate::adapters::InMemorySubmissionTracker`]),
//!   the default for a single process
//! - **PostgreSQL adapter** (`infra_db::PostgresSubmissionTracker`), for
//!   state that outlives the process
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_priorauth::{DecisionEngine, SubmissionTracker};
//! use std::sync::Arc;
//!
//! let tracker: Arc<dyn SubmissionTracker> = match config.tracker_backend {
//!     TrackerBackend::Memory => Arc::new(InMemorySubmissionTracker::new()),
//!     TrackerBackend::Postgres => Arc::new(PostgresSubmissionTracker::new(pool)),
//! };
//! let engine = DecisionEngine::new(rules, tracker, EngineConfig::default())?;
//! ```
//!
//! # Exclusion
//!
//! Operations on the same claim id are serialized by the adapter; different
//! claim ids proceed concurrently. Each operation is all-or-nothing: a
//! failed or abandoned merge leaves the stored series untouched.

use async_trait::async_trait;

use core_kernel::{ClaimId, DomainPort, HealthCheckable, PortError};

use crate::claim::Claim;
use crate::series::{MergedClaimView, SeriesState};

/// Entity name used in `PortError::NotFound`
pub const SERIES_ENTITY: &str = "SubmissionSeries";

/// Store of differential submission series
#[async_trait]
pub trait SubmissionTracker: DomainPort + HealthCheckable {
    /// Records a part and returns the merged view of the series
    ///
    /// The first part for a claim id creates the series.
    ///
    /// # Errors
    ///
    /// `PortError::Validation` for sequence number 0 or a claim id that
    /// differs from `claim_id`.
    async fn record_and_merge(
        &self,
        claim_id: &ClaimId,
        sequence: u32,
        claim: Claim,
    ) -> Result<MergedClaimView, PortError>;

    /// Returns the current merged view
    ///
    /// # Returns
    ///
    /// The view, or `PortError::NotFound` for an unknown claim
    async fn view(&self, claim_id: &ClaimId) -> Result<MergedClaimView, PortError>;

    /// Returns whether the series can be evaluated
    ///
    /// # Returns
    ///
    /// Completeness, or `PortError::NotFound` for an unknown claim
    async fn is_complete(&self, claim_id: &ClaimId) -> Result<bool, PortError> {
        self.view(claim_id).await.map(|view| view.complete)
    }

    /// Records an evaluation outcome computed from `expected_version`
    ///
    /// # Errors
    ///
    /// `PortError::Conflict` when the series changed since that version,
    /// `PortError::NotFound` when it was purged.
    async fn record_outcome(
        &self,
        claim_id: &ClaimId,
        expected_version: u64,
        state: SeriesState,
    ) -> Result<(), PortError>;

    /// Removes all state for a claim
    ///
    /// # Errors
    ///
    /// `PortError::NotFound` for an unknown claim
    async fn purge(&self, claim_id: &ClaimId) -> Result<(), PortError>;
}

/// `PortError::NotFound` for a claim with no tracked series
pub fn series_not_found(claim_id: &ClaimId) -> PortError {
    PortError::not_found(SERIES_ENTITY, claim_id)
}
