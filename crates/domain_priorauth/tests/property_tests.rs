//! Property tests for claim merging and rule matching

use std::sync::Arc;

use proptest::prelude::*;

use core_kernel::{ClaimId, StdRandom};
use domain_priorauth::{Claim, Disposition, JsonRuleSource, RulesTable, SeriesState, SubmissionSeries};
use test_utils::{claim_id_strategy, claim_strategy, split_claim_strategy, split_into_parts};

fn rules() -> RulesTable {
    RulesTable::populated(JsonRuleSource::embedded_default(), Arc::new(StdRandom::seeded(7))).unwrap()
}

fn claim_id() -> ClaimId {
    ClaimId::new("PA-PROP").unwrap()
}

/// A complete claim and its differential parts in a random arrival order
fn shuffled_split_strategy() -> impl Strategy<Value = (Claim, Vec<(u32, Claim)>)> {
    split_claim_strategy(claim_id()).prop_flat_map(|(whole, part_count)| {
        let parts = split_into_parts(&whole, part_count);
        (Just(whole), Just(parts).prop_shuffle())
    })
}

/// A complete claim sent after one or more differential fragments numbered
/// below it, in a random arrival order
fn stale_fragments_strategy() -> impl Strategy<Value = (Claim, Vec<(u32, Claim)>)> {
    (claim_strategy(claim_id()), prop::collection::vec(claim_strategy(claim_id()), 1..4)).prop_flat_map(
        |(whole, fragments)| {
            let base = fragments.len() as u32 + 1;
            let mut arrivals: Vec<(u32, Claim)> = fragments
                .into_iter()
                .enumerate()
                .map(|(index, fragment)| (index as u32 + 1, fragment.differential_part(Some(base))))
                .collect();
            arrivals.push((base, whole.clone()));
            (Just(whole), Just(arrivals).prop_shuffle())
        },
    )
}

fn record_all(arrivals: Vec<(u32, Claim)>) -> SubmissionSeries {
    let mut arrivals = arrivals.into_iter();
    let (first_sequence, first_part) = arrivals.next().unwrap();
    let mut series = SubmissionSeries::start(first_sequence, first_part).unwrap();
    for (sequence, part) in arrivals {
        series.record(sequence, part).unwrap();
    }
    series
}

proptest! {
    #[test]
    fn differential_series_decides_like_whole_claim((whole, arrivals) in shuffled_split_strategy()) {
        let table = rules();
        let series = record_all(arrivals);

        prop_assert!(series.is_complete());
        prop_assert_eq!(&series.merged().items, &whole.items);
        prop_assert_eq!(table.matches(series.merged()), table.matches(&whole));
    }

    #[test]
    fn fragments_below_complete_part_never_reach_merge((whole, arrivals) in stale_fragments_strategy()) {
        let table = rules();
        let base = arrivals.len() as u32;
        let series = record_all(arrivals);

        prop_assert!(series.is_complete());
        prop_assert_eq!(series.view(false).received, vec![base]);
        prop_assert_eq!(&series.merged().items, &whole.items);
        prop_assert_eq!(table.matches(series.merged()), table.matches(&whole));
    }

    #[test]
    fn matching_is_deterministic(
        claim in claim_id_strategy().prop_flat_map(claim_strategy),
    ) {
        let table = rules();

        let first = table.matches(&claim);
        prop_assert_eq!(table.matches(&claim), first);
        prop_assert_eq!(table.matches(&claim.clone()), first);
    }

    #[test]
    fn resending_a_part_never_changes_evaluated_series(
        (whole, part_count) in split_claim_strategy(claim_id()),
    ) {
        let parts = split_into_parts(&whole, part_count);
        let mut series = record_all(parts.clone());
        let version = series.version();
        series.record_outcome(version, SeriesState::Evaluated(Disposition::Granted)).unwrap();

        for (sequence, part) in parts {
            prop_assert!(!series.record(sequence, part).unwrap());
        }
        prop_assert_eq!(series.version(), version);
        prop_assert_eq!(series.state(), SeriesState::Evaluated(Disposition::Granted));
    }
}
