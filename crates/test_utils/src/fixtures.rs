//! Pre-built Test Fixtures
//!
//! Consistent request data for the prior-authorization test suites. Codes
//! match the embedded default rules table: `A1`..`A3` are approvable,
//! `X9` is excluded and an `A1` quantity above 100 is pended.

use core_kernel::ClaimId;
use serde_json::{json, Value};

use domain_priorauth::{PART_COUNT_EXTENSION_URL, SECURITY_SUBSETTED, SECURITY_SYSTEM_URL};

/// Code system used for item codes in fixtures
pub const CPT_SYSTEM: &str = "http://www.ama-assn.org/go/cpt";

/// Code system used for diagnosis codes in fixtures
pub const ICD10_SYSTEM: &str = "http://hl7.org/fhir/sid/icd-10";

/// Fixture for procedure and diagnosis codes
pub struct CodeFixtures;

impl CodeFixtures {
    /// Codes the default rules grant
    pub fn approvable() -> [&'static str; 3] {
        ["A1", "A2", "A3"]
    }

    /// Code the default rules deny
    pub fn excluded() -> &'static str {
        "X9"
    }

    /// Code no default rule mentions
    pub fn unlisted() -> &'static str {
        "Q7"
    }

    /// Quantity of `A1` that triggers pending review
    pub fn high_quantity() -> u32 {
        150
    }

    pub fn diagnosis() -> &'static str {
        "E11.9"
    }
}

/// Fixture for claim identifiers
pub struct IdFixtures;

impl IdFixtures {
    /// The claim id used by single-claim tests
    pub fn claim_id() -> ClaimId {
        Self::claim_id_from("PA-1001")
    }

    /// A second claim id for isolation tests
    pub fn other_claim_id() -> ClaimId {
        Self::claim_id_from("PA-2002")
    }

    /// Builds a claim id, panicking on empty input
    pub fn claim_id_from(value: &str) -> ClaimId {
        ClaimId::new(value).expect("fixture claim id must not be empty")
    }
}

/// Fixture for raw request bundles, as clients send them
pub struct BundleFixtures;

impl BundleFixtures {
    /// A complete claim with one approvable item
    pub fn granted(claim_id: &str) -> Value {
        json!({
            "resourceType": "Bundle",
            "type": "collection",
            "entry": [{
                "fullUrl": format!("urn:uuid:{}", claim_id),
                "resource": {
                    "resourceType": "Claim",
                    "id": claim_id,
                    "status": "active",
                    "patient": { "reference": "Patient/pat-1" },
                    "diagnosis": [{
                        "sequence": 1,
                        "diagnosisCodeableConcept": {
                            "coding": [{ "system": ICD10_SYSTEM, "code": CodeFixtures::diagnosis() }]
                        }
                    }],
                    "item": [{
                        "sequence": 1,
                        "productOrService": { "coding": [{ "system": CPT_SYSTEM, "code": "A1" }] },
                        "quantity": { "value": 1 },
                        "diagnosisSequence": [1]
                    }]
                }
            }]
        })
    }

    /// A complete claim whose only item is excluded
    pub fn denied(claim_id: &str) -> Value {
        let mut bundle = Self::granted(claim_id);
        bundle["entry"][0]["resource"]["item"][0]["productOrService"]["coding"][0]["code"] =
            json!(CodeFixtures::excluded());
        bundle
    }

    /// First of a two-part differential series
    pub fn first_of_two(claim_id: &str) -> Value {
        let mut bundle = Self::granted(claim_id);
        bundle["meta"] = json!({
            "security": [{ "system": SECURITY_SYSTEM_URL, "code": SECURITY_SUBSETTED }]
        });
        bundle["entry"][0]["resource"]["extension"] =
            json!([{ "url": PART_COUNT_EXTENSION_URL, "valuePositiveInt": 2 }]);
        bundle
    }

    /// Second of a two-part differential series, carrying item 2
    pub fn second_of_two(claim_id: &str, code: &str) -> Value {
        json!({
            "resourceType": "Bundle",
            "meta": { "security": [{ "system": SECURITY_SYSTEM_URL, "code": SECURITY_SUBSETTED }] },
            "entry": [{
                "resource": {
                    "resourceType": "Claim",
                    "id": claim_id,
                    "item": [{
                        "sequence": 2,
                        "productOrService": { "coding": [{ "system": CPT_SYSTEM, "code": code }] }
                    }]
                }
            }]
        })
    }

    /// A cancellation request
    pub fn cancellation(claim_id: &str) -> Value {
        json!({
            "resourceType": "Bundle",
            "entry": [{
                "resource": { "resourceType": "Claim", "id": claim_id, "status": "cancelled" }
            }]
        })
    }

    /// A bundle without any claim resource
    pub fn without_claim() -> Value {
        json!({
            "resourceType": "Bundle",
            "entry": [{ "resource": { "resourceType": "Patient", "id": "pat-1" } }]
        })
    }
}
