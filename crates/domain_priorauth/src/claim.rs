//! Normalized claim record
//!
//! A `Claim` is what the extractor produces from one submitted document and
//! what the rules table matches against. Items and diagnoses are keyed by
//! their sequence number so that the parts of a differential series can be
//! folded together.
//!
//! # Merge semantics
//!
//! Folding a later part into an earlier one *augments*: a value already
//! present is never replaced, absent values are filled in, and item
//! diagnosis pointers are unioned.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::ClaimId;

/// A requested service line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimItem {
    /// Item sequence within the claim
    pub sequence: u32,
    /// Procedure or service code
    pub code: String,
    /// Code system of `code`
    pub system: Option<String>,
    /// Requested quantity
    pub quantity: Option<Decimal>,
    /// Pointers into the claim-level diagnosis list
    pub diagnosis_sequences: BTreeSet<u32>,
}

impl ClaimItem {
    /// Creates an item with only a code
    pub fn new(sequence: u32, code: impl Into<String>) -> Self {
        Self {
            sequence,
            code: code.into(),
            system: None,
            quantity: None,
            diagnosis_sequences: BTreeSet::new(),
        }
    }

    /// Sets the requested quantity
    pub fn with_quantity(mut self, quantity: Decimal) -> Self {
        self.quantity = Some(quantity);
        self
    }

    /// Adds a diagnosis pointer
    pub fn with_diagnosis(mut self, diagnosis_sequence: u32) -> Self {
        self.diagnosis_sequences.insert(diagnosis_sequence);
        self
    }

    fn absorb(&mut self, later: &ClaimItem) {
        if self.system.is_none() {
            self.system = later.system.clone();
        }
        if self.quantity.is_none() {
            self.quantity = later.quantity;
        }
        self.diagnosis_sequences
            .extend(later.diagnosis_sequences.iter().copied());
    }
}

/// A normalized prior-authorization claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// Identifier shared by every part of a submission series
    pub id: ClaimId,
    /// True if this submission carries only a subset of the full claim
    pub differential: bool,
    /// True if the submitter asked to cancel the claim
    pub cancelled: bool,
    /// Number of parts the series consists of, when declared
    pub declared_parts: Option<u32>,
    /// Patient reference
    pub patient: Option<String>,
    /// Requesting provider reference
    pub provider: Option<String>,
    /// Claim-level diagnosis codes by sequence
    pub diagnoses: BTreeMap<u32, String>,
    /// Requested items by sequence
    pub items: BTreeMap<u32, ClaimItem>,
}

impl Claim {
    /// Creates an empty, complete (non-differential) claim
    pub fn new(id: ClaimId) -> Self {
        Self {
            id,
            differential: false,
            cancelled: false,
            declared_parts: None,
            patient: None,
            provider: None,
            diagnoses: BTreeMap::new(),
            items: BTreeMap::new(),
        }
    }

    /// Adds an item, keyed by its sequence
    pub fn with_item(mut self, item: ClaimItem) -> Self {
        self.items.insert(item.sequence, item);
        self
    }

    /// Adds a claim-level diagnosis
    pub fn with_diagnosis(mut self, sequence: u32, code: impl Into<String>) -> Self {
        self.diagnoses.insert(sequence, code.into());
        self
    }

    /// Marks the claim as one part of a differential series
    pub fn differential_part(mut self, declared_parts: Option<u32>) -> Self {
        self.differential = true;
        self.declared_parts = declared_parts;
        self
    }

    /// Iterates over the items in sequence order
    pub fn items(&self) -> impl Iterator<Item = &ClaimItem> {
        self.items.values()
    }

    /// Diagnosis codes an item points at, resolved against this claim
    ///
    /// Pointers without a matching claim-level diagnosis are skipped.
    pub fn item_diagnosis_codes<'a>(&'a self, item: &'a ClaimItem) -> impl Iterator<Item = &'a str> {
        item.diagnosis_sequences
            .iter()
            .filter_map(|seq| self.diagnoses.get(seq).map(String::as_str))
    }

    /// Every claim-level diagnosis code
    pub fn all_diagnosis_codes(&self) -> BTreeSet<&str> {
        self.diagnoses.values().map(String::as_str).collect()
    }

    /// Folds a later part of the same series into this one
    ///
    /// Earlier values win; absent values are filled from `later`.
    pub fn absorb(&mut self, later: &Claim) {
        if self.patient.is_none() {
            self.patient = later.patient.clone();
        }
        if self.provider.is_none() {
            self.provider = later.provider.clone();
        }
        if self.declared_parts.is_none() {
            self.declared_parts = later.declared_parts;
        }
        self.cancelled |= later.cancelled;

        for (sequence, code) in &later.diagnoses {
            self.diagnoses.entry(*sequence).or_insert_with(|| code.clone());
        }

        for (sequence, item) in &later.items {
            match self.items.get_mut(sequence) {
                Some(existing) => existing.absorb(item),
                None => {
                    self.items.insert(*sequence, item.clone());
                }
            }
        }
    }

    /// Folds parts given in sequence order into one merged claim
    ///
    /// Returns `None` for an empty iterator. The merged claim is
    /// differential only if every part was.
    pub fn merge_all<'a>(parts: impl IntoIterator<Item = &'a Claim>) -> Option<Claim> {
        let mut parts = parts.into_iter();
        let mut merged = parts.next()?.clone();
        for part in parts {
            merged.absorb(part);
            merged.differential &= part.differential;
        }
        Some(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn claim_id() -> ClaimId {
        ClaimId::new("PA-100").unwrap()
    }

    #[test]
    fn test_absorb_keeps_earlier_values() {
        let mut first = Claim::new(claim_id())
            .with_item(ClaimItem::new(1, "A1").with_quantity(dec!(2)))
            .with_diagnosis(1, "E11.9");
        let later = Claim::new(claim_id())
            .with_item(ClaimItem::new(1, "B7").with_quantity(dec!(9)).with_diagnosis(1))
            .with_diagnosis(1, "Z00.0")
            .with_diagnosis(2, "I10");

        first.absorb(&later);

        let item = &first.items[&1];
        assert_eq!(item.code, "A1");
        assert_eq!(item.quantity, Some(dec!(2)));
        assert!(item.diagnosis_sequences.contains(&1));
        assert_eq!(first.diagnoses[&1], "E11.9");
        assert_eq!(first.diagnoses[&2], "I10");
    }

    #[test]
    fn test_absorb_fills_missing_quantity() {
        let mut first = Claim::new(claim_id()).with_item(ClaimItem::new(1, "A1"));
        let later = Claim::new(claim_id()).with_item(ClaimItem::new(1, "A1").with_quantity(dec!(4)));

        first.absorb(&later);

        assert_eq!(first.items[&1].quantity, Some(dec!(4)));
    }

    #[test]
    fn test_merge_all_unions_items() {
        let part1 = Claim::new(claim_id())
            .with_item(ClaimItem::new(1, "A1"))
            .differential_part(Some(2));
        let part2 = Claim::new(claim_id())
            .with_item(ClaimItem::new(2, "A2"))
            .differential_part(None);

        let merged = Claim::merge_all([&part1, &part2]).unwrap();

        assert_eq!(merged.items.len(), 2);
        assert_eq!(merged.declared_parts, Some(2));
        assert!(merged.differential);
    }

    #[test]
    fn test_merge_all_empty() {
        assert!(Claim::merge_all(std::iter::empty()).is_none());
    }

    #[test]
    fn test_item_diagnosis_codes_resolve_pointers() {
        let claim = Claim::new(claim_id())
            .with_diagnosis(1, "E11.9")
            .with_item(ClaimItem::new(1, "A1").with_diagnosis(1).with_diagnosis(5));

        let item = &claim.items[&1];
        let codes: Vec<_> = claim.item_diagnosis_codes(item).collect();
        assert_eq!(codes, vec!["E11.9"]);
    }
}
