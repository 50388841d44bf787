//! Decision Engine
//!
//! Turns a submitted bundle and its caller-supplied sequence number into a
//! disposition.
//!
//! # Per-claim state machine
//!
//! ```text
//!            non-differential                  complete
//!   New ─────────────────────────► Evaluated ◄──────────── Accumulating
//!    │                                 │                    ▲    │
//!    └──────── differential ───────────┼────────────────────┘    │ incomplete
//!                                      │                         ▼
//!                              cancellation                   Pending
//!                                      ▼
//!                                  Cancelled
//! ```
//!
//! 1. Extract the claim. Extraction failures are returned as errors, never
//!    as dispositions.
//! 2. A cancellation purges the series from any state and yields
//!    `Cancelled`.
//! 3. Otherwise the part is merged by the tracker. An incomplete series
//!    yields `Pending`.
//! 4. A series already evaluated and unchanged by this part yields its
//!    recorded disposition.
//! 5. Otherwise the merged claim is matched and the outcome is recorded
//!    against the series version it was computed from. If a newer part
//!    slipped in, the freshest view is re-evaluated.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use core_kernel::{ClaimId, DecisionId};

use crate::bundle::Bundle;
use crate::disposition::{Disposition, ReviewAction};
use crate::error::PriorAuthError;
use crate::extractor::extract;
use crate::ports::SubmissionTracker;
use crate::rules::{RulesError, RulesTable};
use crate::series::{MergedClaimView, SeriesState};

/// Default number of re-evaluations after an outcome conflict
pub const DEFAULT_MAX_MERGE_RETRIES: u32 = 3;

/// Engine tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// How often an evaluation is retried after losing a race to a newer part
    pub max_merge_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_merge_retries: DEFAULT_MAX_MERGE_RETRIES,
        }
    }
}

/// The outcome of one submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispositionDecision {
    pub decision_id: DecisionId,
    pub claim_id: ClaimId,
    /// Sequence number the caller submitted
    pub sequence: u32,
    pub disposition: Disposition,
    /// `None` for `Unknown`
    pub review_action: Option<ReviewAction>,
    pub decided_at: DateTime<Utc>,
}

impl DispositionDecision {
    fn new(claim_id: ClaimId, sequence: u32, disposition: Disposition) -> Self {
        Self {
            decision_id: DecisionId::new_v7(),
            claim_id,
            sequence,
            disposition,
            review_action: disposition.review_action(),
            decided_at: Utc::now(),
        }
    }
}

/// Decides dispositions over a rules table and a submission tracker
pub struct DecisionEngine {
    rules: Arc<RulesTable>,
    tracker: Arc<dyn SubmissionTracker>,
    config: EngineConfig,
}

impl std::fmt::Debug for DecisionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionEngine")
            .field("rules", &self.rules)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DecisionEngine {
    /// Creates an engine
    ///
    /// # Errors
    ///
    /// Returns `PriorAuthError::RulesLoad` if the rules table has not been
    /// populated.
    pub fn new(
        rules: Arc<RulesTable>,
        tracker: Arc<dyn SubmissionTracker>,
        config: EngineConfig,
    ) -> Result<Self, PriorAuthError> {
        if !rules.is_populated() {
            return Err(RulesError::NotPopulated.into());
        }
        Ok(Self {
            rules,
            tracker,
            config,
        })
    }

    pub fn rules(&self) -> &RulesTable {
        &self.rules
    }

    pub fn tracker(&self) -> &Arc<dyn SubmissionTracker> {
        &self.tracker
    }

    /// Decides a submission and returns only the disposition
    pub async fn compute_disposition(
        &self,
        bundle: &Bundle,
        sequence: u32,
    ) -> Result<Disposition, PriorAuthError> {
        self.process_submission(bundle, sequence)
            .await
            .map(|decision| decision.disposition)
    }

    /// Decides a submission
    ///
    /// # Errors
    ///
    /// - `MalformedInput` if the bundle cannot be extracted or `sequence` is 0
    /// - `ConcurrentMergeConflict` if re-evaluation kept losing races
    /// - `Tracker` if the tracker failed
    #[instrument(skip(self, bundle), fields(claim_id))]
    pub async fn process_submission(
        &self,
        bundle: &Bundle,
        sequence: u32,
    ) -> Result<DispositionDecision, PriorAuthError> {
        if sequence == 0 {
            return Err(PriorAuthError::malformed("sequence number must be at least 1"));
        }

        let claim = extract(bundle)?;
        let claim_id = claim.id.clone();
        tracing::Span::current().record("claim_id", tracing::field::display(&claim_id));

        let disposition = if claim.cancelled {
            self.cancel(&claim_id).await?
        } else {
            let view = self.tracker.record_and_merge(&claim_id, sequence, claim).await?;
            self.decide(&claim_id, view).await?
        };

        let decision = DispositionDecision::new(claim_id, sequence, disposition);
        info!(
            claim_id = %decision.claim_id,
            sequence,
            disposition = %decision.disposition,
            review_action = decision.review_action.map(|a| a.code()),
            "Disposition decided"
        );
        Ok(decision)
    }

    /// Returns whether a claim's series is complete
    pub async fn is_complete(&self, claim_id: &ClaimId) -> Result<bool, PriorAuthError> {
        Ok(self.tracker.is_complete(claim_id).await?)
    }

    /// Drops all tracked state for a claim
    pub async fn purge(&self, claim_id: &ClaimId) -> Result<(), PriorAuthError> {
        self.tracker.purge(claim_id).await?;
        info!(claim_id = %claim_id, "Submission series purged");
        Ok(())
    }

    async fn cancel(&self, claim_id: &ClaimId) -> Result<Disposition, PriorAuthError> {
        match self.tracker.purge(claim_id).await {
            Ok(()) => debug!(claim_id = %claim_id, "Cancelled tracked claim"),
            Err(e) if e.is_not_found() => {
                debug!(claim_id = %claim_id, "Cancellation for a claim with no tracked state")
            }
            Err(e) => return Err(e.into()),
        }
        Ok(Disposition::Cancelled)
    }

    async fn decide(
        &self,
        claim_id: &ClaimId,
        mut view: MergedClaimView,
    ) -> Result<Disposition, PriorAuthError> {
        let mut conflicts = 0;
        loop {
            if !view.complete {
                debug!(claim_id = %claim_id, received = ?view.received, declared = ?view.declared_parts, "Series incomplete");
                return Ok(Disposition::Pending);
            }

            // Evaluated is reset to Accumulating by every change, so this
            // outcome belongs to the current merged claim.
            if let SeriesState::Evaluated(disposition) = view.state {
                debug!(claim_id = %claim_id, version = view.version, "Series unchanged since evaluation");
                return Ok(disposition);
            }

            let disposition = self.rules.matches(&view.claim);
            let outcome = self
                .tracker
                .record_outcome(claim_id, view.version, SeriesState::Evaluated(disposition))
                .await;

            match outcome {
                Ok(()) => return Ok(disposition),
                Err(e) if e.is_not_found() => {
                    debug!(claim_id = %claim_id, "Series purged during evaluation");
                    return Ok(disposition);
                }
                Err(e) if e.is_conflict() => {
                    conflicts += 1;
                    if conflicts > self.config.max_merge_retries {
                        return Err(PriorAuthError::ConcurrentMergeConflict {
                            claim_id: claim_id.to_string(),
                            attempts: conflicts,
                        });
                    }
                    warn!(claim_id = %claim_id, attempt = conflicts, "Outcome raced a newer part, re-evaluating");

                    view = match self.tracker.view(claim_id).await {
                        Ok(fresh) => fresh,
                        Err(e) if e.is_not_found() => return Ok(disposition),
                        Err(e) => return Err(e.into()),
                    };
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemorySubmissionTracker;
    use crate::rules::JsonRuleSource;
    use core_kernel::StdRandom;

    #[test]
    fn test_engine_refuses_unpopulated_rules() {
        let rules = Arc::new(RulesTable::new(
            JsonRuleSource::embedded_default(),
            Arc::new(StdRandom::seeded(7)),
        ));
        let tracker = Arc::new(InMemorySubmissionTracker::new());

        let result = DecisionEngine::new(rules, tracker, EngineConfig::default());
        assert!(matches!(
            result,
            Err(PriorAuthError::RulesLoad(RulesError::NotPopulated))
        ));
    }

    #[test]
    fn test_decision_carries_review_action() {
        let decision = DispositionDecision::new(ClaimId::new("PA-1").unwrap(), 1, Disposition::Denied);
        assert_eq!(decision.review_action, Some(ReviewAction::Denied));

        let unknown = DispositionDecision::new(ClaimId::new("PA-1").unwrap(), 1, Disposition::Unknown);
        assert!(unknown.review_action.is_none());
    }
}
