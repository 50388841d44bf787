//! Claim extractor
//!
//! Turns an inbound [`Bundle`] into a normalized [`Claim`]. Extraction is a
//! pure transformation: it either yields a claim or reports why the
//! document is malformed.

use std::collections::BTreeMap;

use tracing::debug;

use core_kernel::ClaimId;

use crate::bundle::{
    Bundle, ClaimResource, Coding, Resource, PART_COUNT_EXTENSION_URL, SECURITY_SUBSETTED,
    SECURITY_SYSTEM_URL,
};
use crate::claim::{Claim, ClaimItem};
use crate::error::PriorAuthError;

/// Claim status value that signals cancellation
const STATUS_CANCELLED: &str = "cancelled";

/// Returns the claim resource held by the first entry of a bundle
pub fn claim_resource(bundle: &Bundle) -> Result<&ClaimResource, PriorAuthError> {
    let entry = bundle
        .entry
        .first()
        .ok_or_else(|| PriorAuthError::malformed("bundle has no entries"))?;

    match entry.resource.as_ref() {
        Some(Resource::Claim(claim)) => Ok(claim),
        Some(Resource::Other) => Err(PriorAuthError::malformed(
            "first bundle entry is not a Claim resource",
        )),
        None => Err(PriorAuthError::malformed("first bundle entry has no resource")),
    }
}

/// Determines whether a bundle is a differential (subsetted) submission
///
/// Every security label is inspected; the marker may sit at any position.
pub fn is_differential(bundle: &Bundle) -> bool {
    bundle.security().iter().any(is_subsetted_marker)
}

fn is_subsetted_marker(coding: &Coding) -> bool {
    coding.is(SECURITY_SYSTEM_URL, SECURITY_SUBSETTED)
}

/// Extracts the normalized claim from a request bundle
///
/// # Errors
///
/// Returns `PriorAuthError::MalformedInput` when the first entry is not a
/// claim, the claim has no id, an item lacks a procedure code, a diagnosis
/// lacks a code, sequences repeat, or a complete claim has no items.
pub fn extract(bundle: &Bundle) -> Result<Claim, PriorAuthError> {
    let resource = claim_resource(bundle)?;

    let id = resource
        .id
        .as_deref()
        .and_then(ClaimId::new)
        .ok_or_else(|| PriorAuthError::malformed("claim has no id"))?;

    let differential = is_differential(bundle);
    let cancelled = resource
        .status
        .as_deref()
        .map(|s| s.eq_ignore_ascii_case(STATUS_CANCELLED))
        .unwrap_or(false);

    let declared_parts = resource
        .extension
        .iter()
        .find(|e| e.url == PART_COUNT_EXTENSION_URL)
        .map(|e| {
            e.value_positive_int
                .filter(|n| *n > 0)
                .ok_or_else(|| PriorAuthError::malformed("part count extension needs a positive value"))
        })
        .transpose()?;

    let mut diagnoses = BTreeMap::new();
    for diagnosis in &resource.diagnosis {
        let code = diagnosis
            .diagnosis_codeable_concept
            .as_ref()
            .and_then(|c| c.first_code())
            .ok_or_else(|| {
                PriorAuthError::malformed(format!("diagnosis {} has no code", diagnosis.sequence))
            })?;
        if diagnoses.insert(diagnosis.sequence, code.to_string()).is_some() {
            return Err(PriorAuthError::malformed(format!(
                "diagnosis sequence {} appears more than once",
                diagnosis.sequence
            )));
        }
    }

    let mut items = BTreeMap::new();
    for component in &resource.item {
        let concept = component.product_or_service.as_ref();
        let code = concept.and_then(|c| c.first_code()).ok_or_else(|| {
            PriorAuthError::malformed(format!("item {} has no productOrService code", component.sequence))
        })?;

        let item = ClaimItem {
            sequence: component.sequence,
            code: code.to_string(),
            system: concept.and_then(|c| c.first_system()).map(str::to_string),
            quantity: component.quantity.as_ref().and_then(|q| q.value),
            diagnosis_sequences: component.diagnosis_sequence.iter().copied().collect(),
        };
        if items.insert(component.sequence, item).is_some() {
            return Err(PriorAuthError::malformed(format!(
                "item sequence {} appears more than once",
                component.sequence
            )));
        }
    }

    if items.is_empty() && !differential && !cancelled {
        return Err(PriorAuthError::malformed("complete claim has no items"));
    }

    debug!(
        claim_id = %id,
        differential,
        cancelled,
        items = items.len(),
        "Extracted claim"
    );

    Ok(Claim {
        id,
        differential,
        cancelled,
        declared_parts,
        patient: resource.patient.as_ref().and_then(|r| r.reference.clone()),
        provider: resource.provider.as_ref().and_then(|r| r.reference.clone()),
        diagnoses,
        items,
    })
}
