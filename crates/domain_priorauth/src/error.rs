//! Prior-authorization domain errors

use thiserror::Error;

use core_kernel::PortError;

use crate::rules::RulesError;

/// Errors that can occur while deciding a disposition
#[derive(Debug, Error)]
pub enum PriorAuthError {
    /// The submitted document cannot be turned into a claim
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// An operation referenced a claim with no tracked submission state
    #[error("Unknown claim: {0}")]
    UnknownClaim(String),

    /// The rules table could not be populated
    #[error("Rules could not be loaded: {0}")]
    RulesLoad(#[from] RulesError),

    /// Outcome recording kept losing races against newer parts
    #[error("Concurrent merge conflict on claim {claim_id} after {attempts} attempts")]
    ConcurrentMergeConflict { claim_id: String, attempts: u32 },

    /// The submission tracker failed
    #[error("Submission tracker error: {0}")]
    Tracker(PortError),
}

impl PriorAuthError {
    /// Creates a malformed input error
    pub fn malformed(message: impl Into<String>) -> Self {
        PriorAuthError::MalformedInput(message.into())
    }

    /// Returns true if the caller is to blame for this error
    pub fn is_client_error(&self) -> bool {
        matches!(self, PriorAuthError::MalformedInput(_) | PriorAuthError::UnknownClaim(_))
    }
}

impl From<PortError> for PriorAuthError {
    fn from(error: PortError) -> Self {
        match error {
            PortError::NotFound { id, .. } => PriorAuthError::UnknownClaim(id),
            PortError::Validation { message } => PriorAuthError::MalformedInput(message),
            other => PriorAuthError::Tracker(other),
        }
    }
}
