//! In-memory submission tracker
//!
//! Each claim id owns a slot guarded by its own async mutex, so merges for
//! one claim are serialized while other claims proceed. The map lock is
//! only held long enough to find or create a slot.
//!
//! Purging removes the slot from the map and marks it retired. A task that
//! was already waiting on a retired slot looks the claim up again and works
//! against a fresh slot, so a merge racing a purge never writes into a
//! detached series.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

use core_kernel::{
    AdapterHealth, ClaimId, DomainPort, HealthCheckResult, HealthCheckable, PortError,
};

use crate::claim::Claim;
use crate::ports::{series_not_found, SubmissionTracker};
use crate::series::{MergedClaimView, SeriesState, SubmissionSeries};

#[derive(Debug, Default)]
struct Slot {
    series: Option<SubmissionSeries>,
    retired: bool,
}

type SlotGuard = OwnedMutexGuard<Slot>;

/// Process-local `SubmissionTracker`
#[derive(Debug, Default)]
pub struct InMemorySubmissionTracker {
    slots: RwLock<HashMap<ClaimId, Arc<Mutex<Slot>>>>,
}

impl InMemorySubmissionTracker {
    /// Creates an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of claims with tracked state
    pub async fn len(&self) -> usize {
        let slots: Vec<_> = self.slots.read().await.values().cloned().collect();
        let mut count = 0;
        for slot in slots {
            if slot.lock().await.series.is_some() {
                count += 1;
            }
        }
        count
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Locks the live slot of a claim, creating it when `create` is set
    async fn lock_slot(&self, claim_id: &ClaimId, create: bool) -> Option<SlotGuard> {
        loop {
            let existing = self.slots.read().await.get(claim_id).cloned();
            let slot = match existing {
                Some(slot) => slot,
                None if create => self
                    .slots
                    .write()
                    .await
                    .entry(claim_id.clone())
                    .or_default()
                    .clone(),
                None => return None,
            };

            let guard = slot.lock_owned().await;
            if !guard.retired {
                return Some(guard);
            }
            debug!(claim_id = %claim_id, "Slot retired while waiting, retrying");
        }
    }

    /// Retires a slot that never received a series and drops it from the map
    async fn discard_empty_slot(&self, claim_id: &ClaimId, slot: &mut SlotGuard) {
        slot.retired = true;
        let mut slots = self.slots.write().await;
        let live = slots
            .get(claim_id)
            .is_some_and(|entry| Arc::ptr_eq(entry, OwnedMutexGuard::mutex(slot)));
        if live {
            slots.remove(claim_id);
        }
    }
}

impl DomainPort for InMemorySubmissionTracker {}

#[async_trait]
impl HealthCheckable for InMemorySubmissionTracker {
    async fn health_check(&self) -> HealthCheckResult {
        let start = Instant::now();
        let tracked = self.slots.read().await.len();
        HealthCheckResult {
            adapter_id: "in-memory-submission-tracker".to_string(),
            status: AdapterHealth::Healthy,
            latency_ms: start.elapsed().as_millis() as u64,
            message: Some(format!("{} claim slots", tracked)),
            checked_at: Utc::now(),
        }
    }
}

#[async_trait]
impl SubmissionTracker for InMemorySubmissionTracker {
    async fn record_and_merge(
        &self,
        claim_id: &ClaimId,
        sequence: u32,
        claim: Claim,
    ) -> Result<MergedClaimView, PortError> {
        if &claim.id != claim_id {
            return Err(PortError::validation(format!(
                "part for claim {} submitted under {}",
                claim.id, claim_id
            )));
        }

        let mut slot = self
            .lock_slot(claim_id, true)
            .await
            .ok_or_else(|| PortError::internal("claim slot could not be created"))?;

        // Work on a copy so a rejected part leaves the stored series as it was
        let (series, changed) = match slot.series.clone() {
            Some(mut series) => {
                let changed = series.record(sequence, claim)?;
                (series, changed)
            }
            None => match SubmissionSeries::start(sequence, claim) {
                Ok(series) => (series, true),
                Err(e) => {
                    self.discard_empty_slot(claim_id, &mut slot).await;
                    return Err(e);
                }
            },
        };

        let view = series.view(changed);
        slot.series = Some(series);

        debug!(
            claim_id = %claim_id,
            sequence,
            version = view.version,
            changed,
            complete = view.complete,
            "Recorded submission part"
        );
        Ok(view)
    }

    async fn view(&self, claim_id: &ClaimId) -> Result<MergedClaimView, PortError> {
        let slot = self
            .lock_slot(claim_id, false)
            .await
            .ok_or_else(|| series_not_found(claim_id))?;

        slot.series
            .as_ref()
            .map(|series| series.view(false))
            .ok_or_else(|| series_not_found(claim_id))
    }

    async fn record_outcome(
        &self,
        claim_id: &ClaimId,
        expected_version: u64,
        state: SeriesState,
    ) -> Result<(), PortError> {
        let mut slot = self
            .lock_slot(claim_id, false)
            .await
            .ok_or_else(|| series_not_found(claim_id))?;

        slot.series
            .as_mut()
            .ok_or_else(|| series_not_found(claim_id))?
            .record_outcome(expected_version, state)
    }

    async fn purge(&self, claim_id: &ClaimId) -> Result<(), PortError> {
        let removed = self.slots.write().await.remove(claim_id);
        let slot = removed.ok_or_else(|| series_not_found(claim_id))?;

        let mut guard = slot.lock().await;
        guard.retired = true;
        match guard.series.take() {
            Some(series) => {
                debug!(claim_id = %claim_id, parts = series.parts().len(), "Purged submission series");
                Ok(())
            }
            None => Err(series_not_found(claim_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::ClaimItem;
    use crate::disposition::Disposition;

    fn id(value: &str) -> ClaimId {
        ClaimId::new(value).unwrap()
    }

    fn part(claim: &str, item_sequence: u32, declared: Option<u32>) -> Claim {
        Claim::new(id(claim))
            .with_item(ClaimItem::new(item_sequence, "A1"))
            .differential_part(declared)
    }

    #[tokio::test]
    async fn test_first_part_creates_series() {
        let tracker = InMemorySubmissionTracker::new();
        let view = tracker
            .record_and_merge(&id("PA-1"), 1, part("PA-1", 1, Some(2)))
            .await
            .unwrap();

        assert!(view.changed);
        assert!(!view.complete);
        assert_eq!(view.version, 1);
        assert_eq!(tracker.len().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_claim_is_not_found() {
        let tracker = InMemorySubmissionTracker::new();
        assert!(tracker.is_complete(&id("PA-404")).await.unwrap_err().is_not_found());
        assert!(tracker.purge(&id("PA-404")).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_rejected_part_leaves_no_series() {
        let tracker = InMemorySubmissionTracker::new();
        let result = tracker
            .record_and_merge(&id("PA-1"), 0, part("PA-1", 1, None))
            .await;

        assert!(result.is_err());
        assert!(tracker.view(&id("PA-1")).await.unwrap_err().is_not_found());
        assert!(tracker.is_empty().await);
        assert_eq!(tracker.slots.read().await.len(), 0);

        let view = tracker
            .record_and_merge(&id("PA-1"), 1, part("PA-1", 1, None))
            .await
            .unwrap();
        assert_eq!(view.version, 1);
    }

    #[tokio::test]
    async fn test_mismatched_claim_id_rejected() {
        let tracker = InMemorySubmissionTracker::new();
        let result = tracker
            .record_and_merge(&id("PA-1"), 1, part("PA-2", 1, None))
            .await;
        assert!(matches!(result, Err(PortError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_purge_then_resubmit_starts_fresh() {
        let tracker = InMemorySubmissionTracker::new();
        tracker
            .record_and_merge(&id("PA-1"), 1, part("PA-1", 1, Some(2)))
            .await
            .unwrap();
        tracker.purge(&id("PA-1")).await.unwrap();

        let view = tracker
            .record_and_merge(&id("PA-1"), 2, part("PA-1", 2, None))
            .await
            .unwrap();
        assert_eq!(view.received, vec![2]);
        assert_eq!(view.version, 1);
    }

    #[tokio::test]
    async fn test_outcome_conflict_after_newer_part() {
        let tracker = InMemorySubmissionTracker::new();
        let first = tracker
            .record_and_merge(&id("PA-1"), 1, part("PA-1", 1, Some(1)))
            .await
            .unwrap();
        tracker
            .record_and_merge(&id("PA-1"), 2, part("PA-1", 2, None))
            .await
            .unwrap();

        let stale = tracker
            .record_outcome(&id("PA-1"), first.version, SeriesState::Evaluated(Disposition::Granted))
            .await;
        assert!(stale.unwrap_err().is_conflict());

        let fresh = tracker.view(&id("PA-1")).await.unwrap();
        tracker
            .record_outcome(&id("PA-1"), fresh.version, SeriesState::Evaluated(Disposition::Granted))
            .await
            .unwrap();
        assert_eq!(
            tracker.view(&id("PA-1")).await.unwrap().state,
            SeriesState::Evaluated(Disposition::Granted)
        );
    }

    #[tokio::test]
    async fn test_concurrent_parts_all_recorded() {
        let tracker = Arc::new(InMemorySubmissionTracker::new());
        let mut handles = Vec::new();
        for sequence in 1..=16u32 {
            let tracker = tracker.clone();
            handles.push(tokio::spawn(async move {
                let declared = (sequence == 1).then_some(16);
                tracker
                    .record_and_merge(&id("PA-C"), sequence, part("PA-C", sequence, declared))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let view = tracker.view(&id("PA-C")).await.unwrap();
        assert!(view.complete);
        assert_eq!(view.received, (1..=16).collect::<Vec<_>>());
        assert_eq!(view.version, 16);
    }
}
