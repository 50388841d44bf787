//! Property-Based Test Generators
//!
//! Proptest strategies for claims and differential submission series.

use proptest::prelude::*;

use core_kernel::ClaimId;
use domain_priorauth::{Claim, ClaimItem};
use rust_decimal::Decimal;

/// Strategy for claim ids of the form `PA-<n>`
pub fn claim_id_strategy() -> impl Strategy<Value = ClaimId> {
    (1u32..1_000_000).prop_map(|n| ClaimId::new(format!("PA-{}", n)).expect("non-empty id"))
}

/// Strategy for item codes, weighted towards codes the default rules know
pub fn item_code_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => prop::sample::select(vec!["A1", "A2", "A3"]).prop_map(str::to_string),
        1 => Just("X9".to_string()),
        1 => Just("Q7".to_string()),
    ]
}

/// Strategy for item quantities; `None` means no quantity was sent
pub fn quantity_strategy() -> impl Strategy<Value = Option<Decimal>> {
    prop::option::of((1u32..300).prop_map(Decimal::from))
}

/// Strategy for the diagnosis pointers of one item
pub fn diagnosis_pointers_strategy() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(1u32..4, 0..3)
}

/// Strategy for a complete claim with 1 to 8 items numbered from 1
///
/// Every claim carries diagnoses 1 to 3; items point at some of them.
pub fn claim_strategy(id: ClaimId) -> impl Strategy<Value = Claim> {
    let item = (item_code_strategy(), quantity_strategy(), diagnosis_pointers_strategy());
    prop::collection::vec(item, 1..8).prop_map(move |items| {
        let claim = Claim::new(id.clone())
            .with_diagnosis(1, "E11.9")
            .with_diagnosis(2, "I10")
            .with_diagnosis(3, "M54.5");
        items
            .into_iter()
            .enumerate()
            .fold(claim, |claim, (index, (code, quantity, pointers))| {
                let item = ClaimItem::new(index as u32 + 1, code);
                let item = match quantity {
                    Some(quantity) => item.with_quantity(quantity),
                    None => item,
                };
                claim.with_item(pointers.into_iter().fold(item, ClaimItem::with_diagnosis))
            })
    })
}

/// Splits a complete claim into differential parts
///
/// Items are dealt round-robin over `part_count` parts, so every part
/// carries at least one item when `part_count <= items`. Part 1 declares
/// the count and carries the claim-level diagnoses.
pub fn split_into_parts(whole: &Claim, part_count: u32) -> Vec<(u32, Claim)> {
    (1..=part_count)
        .map(|part| {
            let mut claim = Claim::new(whole.id.clone()).differential_part((part == 1).then_some(part_count));
            if part == 1 {
                claim.diagnoses = whole.diagnoses.clone();
                claim.patient = whole.patient.clone();
                claim.provider = whole.provider.clone();
            }
            let claim = whole
                .items()
                .enumerate()
                .filter(|(index, _)| *index as u32 % part_count + 1 == part)
                .fold(claim, |claim, (_, item)| claim.with_item(item.clone()));
            (part, claim)
        })
        .collect()
}

/// Strategy for a complete claim with a part count that fits its items
pub fn split_claim_strategy(id: ClaimId) -> impl Strategy<Value = (Claim, u32)> {
    claim_strategy(id).prop_flat_map(|claim| {
        let max_parts = claim.items.len() as u32;
        (Just(claim), 1..=max_parts)
    })
}
