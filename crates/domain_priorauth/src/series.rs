//! Submission series
//!
//! A claim may arrive as several differential parts, each tagged with a
//! caller-supplied sequence number. `SubmissionSeries` holds the parts of
//! one claim and the merged view the rules are matched against. It is the
//! unit both tracker adapters store; all merge and completeness logic lives
//! here so the adapters only provide exclusion and persistence.
//!
//! # Completeness
//!
//! - A non-differential part is complete on its own. The highest-numbered
//!   complete part is the base of the series: parts numbered below it are
//!   dropped whenever they arrive, and only the base and the differential
//!   parts after it are merged.
//! - A differential series is complete once its part count N is declared
//!   (the lowest-numbered declaring part wins) and parts `1..=N` have all
//!   been received.
//!
//! # Versions
//!
//! Every change to the parts bumps `version`. Outcomes are recorded
//! against the version they were computed from, so an evaluation that
//! raced with a newer part is detected instead of silently stored.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use core_kernel::{ClaimId, PortError};

use crate::claim::Claim;
use crate::disposition::Disposition;

/// Evaluation state of a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "disposition", rename_all = "snake_case")]
pub enum SeriesState {
    /// Parts are being collected, or new data arrived since the last evaluation
    Accumulating,
    /// The current merged claim was evaluated to this disposition
    Evaluated(Disposition),
}

impl SeriesState {
    /// The recorded disposition, if evaluated
    pub fn disposition(&self) -> Option<Disposition> {
        match self {
            SeriesState::Accumulating => None,
            SeriesState::Evaluated(disposition) => Some(*disposition),
        }
    }

    /// Storage label of the state
    pub fn label(&self) -> &'static str {
        match self {
            SeriesState::Accumulating => "accumulating",
            SeriesState::Evaluated(_) => "evaluated",
        }
    }
}

/// Snapshot of a series returned by the tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedClaimView {
    /// Union of all parts in sequence-number order
    pub claim: Claim,
    /// Series version the view was taken at
    pub version: u64,
    /// Sequence numbers received so far, ascending
    pub received: Vec<u32>,
    /// Declared part count, if any part declared one
    pub declared_parts: Option<u32>,
    pub complete: bool,
    pub state: SeriesState,
    /// True if the operation that produced this view changed the series
    pub changed: bool,
}

/// The parts of one claim and their merged form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionSeries {
    claim_id: ClaimId,
    parts: BTreeMap<u32, Claim>,
    merged: Claim,
    state: SeriesState,
    version: u64,
}

/// Drops every part numbered below the highest complete part
fn rebase(parts: &mut BTreeMap<u32, Claim>) {
    let base = parts
        .iter()
        .rev()
        .find(|(_, part)| !part.differential)
        .map(|(sequence, _)| *sequence);
    if let Some(base) = base {
        *parts = parts.split_off(&base);
    }
}

fn check_sequence(sequence: u32) -> Result<(), PortError> {
    if sequence == 0 {
        return Err(PortError::validation("sequence number must be at least 1"));
    }
    Ok(())
}

impl SubmissionSeries {
    /// Starts a series from its first recorded part
    pub fn start(sequence: u32, part: Claim) -> Result<Self, PortError> {
        check_sequence(sequence)?;
        Ok(Self {
            claim_id: part.id.clone(),
            merged: part.clone(),
            parts: BTreeMap::from([(sequence, part)]),
            state: SeriesState::Accumulating,
            version: 1,
        })
    }

    /// Rebuilds a series from stored parts
    ///
    /// # Errors
    ///
    /// Returns `PortError::Transformation` when there are no parts or a
    /// part belongs to another claim.
    pub fn restore(
        claim_id: ClaimId,
        parts: BTreeMap<u32, Claim>,
        state: SeriesState,
        version: u64,
    ) -> Result<Self, PortError> {
        if let Some(foreign) = parts.values().find(|p| p.id != claim_id) {
            return Err(PortError::Transformation {
                message: format!("stored part of {} found under {}", foreign.id, claim_id),
            });
        }
        let mut parts = parts;
        rebase(&mut parts);
        let merged = Claim::merge_all(parts.values()).ok_or_else(|| PortError::Transformation {
            message: format!("series {} has no stored parts", claim_id),
        })?;
        Ok(Self {
            claim_id,
            parts,
            merged,
            state,
            version,
        })
    }

    pub fn claim_id(&self) -> &ClaimId {
        &self.claim_id
    }

    pub fn parts(&self) -> &BTreeMap<u32, Claim> {
        &self.parts
    }

    pub fn state(&self) -> SeriesState {
        self.state
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// The union of all parts
    pub fn merged(&self) -> &Claim {
        &self.merged
    }

    /// Records a part; returns whether the series changed
    ///
    /// A repeated sequence number augments the stored part rather than
    /// replacing it. A part numbered below the series base is ignored, so
    /// the merged claim does not depend on arrival order. Any change moves
    /// the series back to `Accumulating`.
    ///
    /// # Errors
    ///
    /// Returns `PortError::Validation` for sequence number 0 or a part of
    /// a different claim.
    pub fn record(&mut self, sequence: u32, part: Claim) -> Result<bool, PortError> {
        check_sequence(sequence)?;
        if part.id != self.claim_id {
            return Err(PortError::validation(format!(
                "part for claim {} recorded into series {}",
                part.id, self.claim_id
            )));
        }

        let mut next_parts = self.parts.clone();
        match next_parts.get_mut(&sequence) {
            Some(existing) => {
                existing.absorb(&part);
                existing.differential &= part.differential;
            }
            None => {
                next_parts.insert(sequence, part);
            }
        }
        rebase(&mut next_parts);

        if next_parts == self.parts {
            return Ok(false);
        }

        self.merged = Claim::merge_all(next_parts.values()).unwrap_or_else(|| self.merged.clone());
        self.parts = next_parts;
        self.state = SeriesState::Accumulating;
        self.version += 1;
        Ok(true)
    }

    /// Declared part count; the lowest-numbered declaring part wins
    pub fn declared_parts(&self) -> Option<u32> {
        self.parts.values().find_map(|p| p.declared_parts)
    }

    /// Returns true if the merged claim can be evaluated
    pub fn is_complete(&self) -> bool {
        if self.parts.values().any(|p| !p.differential) {
            return true;
        }
        match self.declared_parts() {
            Some(count) => (1..=count).all(|sequence| self.parts.contains_key(&sequence)),
            None => false,
        }
    }

    /// Stores an outcome computed from `expected_version`
    ///
    /// # Errors
    ///
    /// Returns `PortError::Conflict` if the series moved on since.
    pub fn record_outcome(&mut self, expected_version: u64, state: SeriesState) -> Result<(), PortError> {
        if self.version != expected_version {
            return Err(PortError::conflict(format!(
                "series {} is at version {}, outcome was computed at {}",
                self.claim_id, self.version, expected_version
            )));
        }
        self.state = state;
        Ok(())
    }

    /// Snapshot of the series
    pub fn view(&self, changed: bool) -> MergedClaimView {
        MergedClaimView {
            claim: self.merged.clone(),
            version: self.version,
            received: self.parts.keys().copied().collect(),
            declared_parts: self.declared_parts(),
            complete: self.is_complete(),
            state: self.state,
            changed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::ClaimItem;

    fn id() -> ClaimId {
        ClaimId::new("PA-5").unwrap()
    }

    fn part(item_sequence: u32, code: &str, declared: Option<u32>) -> Claim {
        Claim::new(id())
            .with_item(ClaimItem::new(item_sequence, code))
            .differential_part(declared)
    }

    #[test]
    fn test_complete_claim_is_complete_alone() {
        let series = SubmissionSeries::start(1, Claim::new(id()).with_item(ClaimItem::new(1, "A1"))).unwrap();
        assert!(series.is_complete());
        assert_eq!(series.version(), 1);
    }

    #[test]
    fn test_differential_needs_declared_count() {
        let mut series = SubmissionSeries::start(1, part(1, "A1", None)).unwrap();
        assert!(!series.is_complete());

        series.record(2, part(2, "A2", None)).unwrap();
        assert!(!series.is_complete());
        assert!(series.view(false).declared_parts.is_none());
    }

    #[test]
    fn test_out_of_order_parts_complete_when_all_arrive() {
        let mut series = SubmissionSeries::start(3, part(3, "A3", None)).unwrap();
        series.record(1, part(1, "A1", Some(3))).unwrap();
        assert!(!series.is_complete());

        series.record(2, part(2, "A2", None)).unwrap();
        assert!(series.is_complete());
        assert_eq!(series.view(true).received, vec![1, 2, 3]);
        assert_eq!(series.merged().items.len(), 3);
    }

    #[test]
    fn test_lowest_declaring_part_wins() {
        let mut series = SubmissionSeries::start(2, part(2, "A2", Some(5))).unwrap();
        series.record(1, part(1, "A1", Some(2))).unwrap();
        assert_eq!(series.declared_parts(), Some(2));
        assert!(series.is_complete());
    }

    #[test]
    fn test_identical_resend_changes_nothing() {
        let mut series = SubmissionSeries::start(1, part(1, "A1", Some(1))).unwrap();
        series.record_outcome(1, SeriesState::Evaluated(Disposition::Granted)).unwrap();

        let changed = series.record(1, part(1, "A1", Some(1))).unwrap();

        assert!(!changed);
        assert_eq!(series.version(), 1);
        assert_eq!(series.state(), SeriesState::Evaluated(Disposition::Granted));
    }

    #[test]
    fn test_resent_sequence_augments() {
        let mut series = SubmissionSeries::start(1, part(1, "A1", Some(1))).unwrap();
        let changed = series.record(1, part(2, "A2", None)).unwrap();

        assert!(changed);
        assert_eq!(series.version(), 2);
        assert_eq!(series.parts()[&1].items.len(), 2);
        assert_eq!(series.declared_parts(), Some(1));
    }

    #[test]
    fn test_complete_part_restarts_series() {
        let mut series = SubmissionSeries::start(1, part(1, "A1", Some(3))).unwrap();
        series.record(2, part(2, "A2", None)).unwrap();

        let complete = Claim::new(id()).with_item(ClaimItem::new(1, "B1"));
        series.record(3, complete).unwrap();

        assert_eq!(series.view(true).received, vec![3]);
        assert!(series.is_complete());
        assert_eq!(series.merged().items[&1].code, "B1");
    }

    #[test]
    fn test_complete_part_merge_ignores_arrival_order() {
        let fragment = || part(1, "X9", Some(2));
        let complete = || Claim::new(id()).with_item(ClaimItem::new(1, "A1"));

        let mut fragment_first = SubmissionSeries::start(1, fragment()).unwrap();
        assert!(fragment_first.record(2, complete()).unwrap());

        let mut complete_first = SubmissionSeries::start(2, complete()).unwrap();
        assert!(!complete_first.record(1, fragment()).unwrap());

        for series in [&fragment_first, &complete_first] {
            assert_eq!(series.view(false).received, vec![2]);
            assert_eq!(series.merged().items[&1].code, "A1");
            assert!(series.is_complete());
        }
        assert_eq!(complete_first.version(), 1);
    }

    #[test]
    fn test_later_differential_parts_extend_complete_base() {
        let mut series = SubmissionSeries::start(3, part(2, "A3", None)).unwrap();
        series.record(2, Claim::new(id()).with_item(ClaimItem::new(1, "A1"))).unwrap();
        series.record(1, part(1, "X9", Some(3))).unwrap();

        assert_eq!(series.view(false).received, vec![2, 3]);
        assert_eq!(series.merged().items.len(), 2);
        assert_eq!(series.merged().items[&1].code, "A1");
        assert!(!series.merged().differential);
    }

    #[test]
    fn test_stale_complete_part_is_ignored() {
        let mut series = SubmissionSeries::start(4, Claim::new(id()).with_item(ClaimItem::new(1, "B1"))).unwrap();
        let changed = series
            .record(2, Claim::new(id()).with_item(ClaimItem::new(1, "A1")))
            .unwrap();

        assert!(!changed);
        assert_eq!(series.merged().items[&1].code, "B1");
    }

    #[test]
    fn test_sequence_zero_rejected() {
        assert!(SubmissionSeries::start(0, part(1, "A1", None)).is_err());

        let mut series = SubmissionSeries::start(1, part(1, "A1", None)).unwrap();
        assert!(series.record(0, part(2, "A2", None)).is_err());
        assert_eq!(series.version(), 1);
    }

    #[test]
    fn test_foreign_claim_rejected() {
        let mut series = SubmissionSeries::start(1, part(1, "A1", None)).unwrap();
        let other = Claim::new(ClaimId::new("PA-6").unwrap())
            .with_item(ClaimItem::new(1, "A1"))
            .differential_part(None);
        assert!(series.record(2, other).is_err());
    }

    #[test]
    fn test_stale_outcome_conflicts() {
        let mut series = SubmissionSeries::start(1, part(1, "A1", Some(2))).unwrap();
        series.record(2, part(2, "A2", None)).unwrap();

        let result = series.record_outcome(1, SeriesState::Evaluated(Disposition::Granted));
        assert!(result.unwrap_err().is_conflict());
        assert_eq!(series.state(), SeriesState::Accumulating);
    }

    #[test]
    fn test_restore_round_trip() {
        let mut series = SubmissionSeries::start(1, part(1, "A1", Some(2))).unwrap();
        series.record(2, part(2, "A2", None)).unwrap();

        let restored = SubmissionSeries::restore(
            id(),
            series.parts().clone(),
            series.state(),
            series.version(),
        )
        .unwrap();
        assert_eq!(restored, series);
    }

    #[test]
    fn test_restore_requires_parts() {
        let result = SubmissionSeries::restore(id(), BTreeMap::new(), SeriesState::Accumulating, 1);
        assert!(result.is_err());
    }
}
