//! Test Data Builders
//!
//! Builders for request bundles and normalized claims. Tests set only the
//! fields they care about; everything else defaults to a valid,
//! non-differential claim with id `PA-1001`.

use rust_decimal::Decimal;
use serde_json::{json, Value};

use core_kernel::ClaimId;
use domain_priorauth::{
    Bundle, Claim, ClaimItem, PART_COUNT_EXTENSION_URL, SECURITY_SUBSETTED, SECURITY_SYSTEM_URL,
};

use crate::fixtures::{IdFixtures, CPT_SYSTEM, ICD10_SYSTEM};

#[derive(Debug, Clone)]
struct TestItem {
    sequence: u32,
    code: String,
    quantity: Option<u32>,
    diagnosis_sequences: Vec<u32>,
}

/// Builder for FHIR request bundles
#[derive(Debug, Clone)]
pub struct BundleBuilder {
    claim_id: String,
    status: Option<String>,
    differential: bool,
    declared_parts: Option<u32>,
    diagnoses: Vec<(u32, String)>,
    items: Vec<TestItem>,
}

impl Default for BundleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BundleBuilder {
    /// Creates a builder for an active, complete claim without items
    pub fn new() -> Self {
        Self {
            claim_id: IdFixtures::claim_id().to_string(),
            status: Some("active".to_string()),
            differential: false,
            declared_parts: None,
            diagnoses: Vec::new(),
            items: Vec::new(),
        }
    }

    pub fn with_claim_id(mut self, claim_id: impl Into<String>) -> Self {
        self.claim_id = claim_id.into();
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Marks the bundle as a cancellation
    pub fn cancelled(self) -> Self {
        self.with_status("cancelled")
    }

    /// Marks the bundle as a differential part, optionally declaring the part count
    pub fn differential(mut self, declared_parts: Option<u32>) -> Self {
        self.differential = true;
        self.declared_parts = declared_parts;
        self
    }

    pub fn with_diagnosis(mut self, sequence: u32, code: impl Into<String>) -> Self {
        self.diagnoses.push((sequence, code.into()));
        self
    }

    /// Adds an item with no quantity
    pub fn with_item(self, sequence: u32, code: impl Into<String>) -> Self {
        self.with_item_detail(sequence, code, None, Vec::new())
    }

    /// Adds an item with a quantity
    pub fn with_item_quantity(self, sequence: u32, code: impl Into<String>, quantity: u32) -> Self {
        self.with_item_detail(sequence, code, Some(quantity), Vec::new())
    }

    /// Adds an item with every field set explicitly
    pub fn with_item_detail(
        mut self,
        sequence: u32,
        code: impl Into<String>,
        quantity: Option<u32>,
        diagnosis_sequences: Vec<u32>,
    ) -> Self {
        self.items.push(TestItem {
            sequence,
            code: code.into(),
            quantity,
            diagnosis_sequences,
        });
        self
    }

    /// Builds the request body as JSON
    pub fn build_json(&self) -> Value {
        let items: Vec<Value> = self
            .items
            .iter()
            .map(|item| {
                let mut value = json!({
                    "sequence": item.sequence,
                    "productOrService": { "coding": [{ "system": CPT_SYSTEM, "code": item.code }] }
                });
                if let Some(quantity) = item.quantity {
                    value["quantity"] = json!({ "value": quantity });
                }
                if !item.diagnosis_sequences.is_empty() {
                    value["diagnosisSequence"] = json!(item.diagnosis_sequences);
                }
                value
            })
            .collect();

        let diagnoses: Vec<Value> = self
            .diagnoses
            .iter()
            .map(|(sequence, code)| {
                json!({
                    "sequence": sequence,
                    "diagnosisCodeableConcept": { "coding": [{ "system": ICD10_SYSTEM, "code": code }] }
                })
            })
            .collect();

        let mut claim = json!({
            "resourceType": "Claim",
            "id": self.claim_id,
            "patient": { "reference": "Patient/pat-1" },
            "diagnosis": diagnoses,
            "item": items
        });
        if let Some(status) = &self.status {
            claim["status"] = json!(status);
        }
        if let Some(count) = self.declared_parts {
            claim["extension"] = json!([{ "url": PART_COUNT_EXTENSION_URL, "valuePositiveInt": count }]);
        }

        let mut bundle = json!({
            "resourceType": "Bundle",
            "entry": [{ "fullUrl": format!("urn:uuid:{}", self.claim_id), "resource": claim }]
        });
        if self.differential {
            bundle["meta"] = json!({
                "security": [{ "system": SECURITY_SYSTEM_URL, "code": SECURITY_SUBSETTED }]
            });
        }
        bundle
    }

    /// Builds the typed bundle
    pub fn build(&self) -> Bundle {
        serde_json::from_value(self.build_json()).expect("builder produces a decodable bundle")
    }
}

/// Builder for normalized claims, for tests that bypass extraction
#[derive(Debug, Clone)]
pub struct ClaimBuilder {
    claim: Claim,
}

impl Default for ClaimBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaimBuilder {
    pub fn new() -> Self {
        Self::for_claim(IdFixtures::claim_id())
    }

    pub fn for_claim(id: ClaimId) -> Self {
        Self { claim: Claim::new(id) }
    }

    pub fn with_item(mut self, sequence: u32, code: &str) -> Self {
        self.claim = self.claim.with_item(ClaimItem::new(sequence, code));
        self
    }

    pub fn with_item_quantity(mut self, sequence: u32, code: &str, quantity: u32) -> Self {
        let item = ClaimItem::new(sequence, code).with_quantity(Decimal::from(quantity));
        self.claim = self.claim.with_item(item);
        self
    }

    pub fn with_diagnosis(mut self, sequence: u32, code: &str) -> Self {
        self.claim = self.claim.with_diagnosis(sequence, code);
        self
    }

    pub fn differential(mut self, declared_parts: Option<u32>) -> Self {
        self.claim = self.claim.differential_part(declared_parts);
        self
    }

    pub fn build(self) -> Claim {
        self.claim
    }
}
