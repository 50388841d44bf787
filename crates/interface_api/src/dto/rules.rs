//! Rules endpoint DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use domain_priorauth::{Disposition, DispositionDecision, ReviewAction};

/// Query parameters of `POST /Rules`
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitParams {
    /// Sequence number of the part within its series
    #[validate(range(min = 1, message = "seq must be a positive sequence number"))]
    pub seq: i64,
}

impl SubmitParams {
    /// The validated sequence number
    pub fn sequence(&self) -> Option<u32> {
        u32::try_from(self.seq).ok().filter(|seq| *seq >= 1)
    }
}

/// The disposition of one submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispositionResponse {
    pub claim_id: String,
    pub sequence: u32,
    pub disposition: Disposition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_action: Option<ReviewAction>,
    pub decided_at: DateTime<Utc>,
    /// `{baseUrl}/Rules/{claimId}` when a base URL is configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl DispositionResponse {
    pub fn from_decision(decision: DispositionDecision, base_url: Option<&str>) -> Self {
        let link = base_url.map(|base| format!("{}/Rules/{}", base, decision.claim_id));
        Self {
            claim_id: decision.claim_id.to_string(),
            sequence: decision.sequence,
            disposition: decision.disposition,
            review_action: decision.review_action,
            decided_at: decision.decided_at,
            link,
        }
    }
}

/// Completeness of a tracked series
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesStatusResponse {
    pub claim_id: String,
    pub complete: bool,
}
