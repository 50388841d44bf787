//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use domain_priorauth::PriorAuthError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Severity of an `OperationOutcome` issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Error,
    Fatal,
}

/// One issue of an `OperationOutcome`
#[derive(Debug, Serialize)]
pub struct OutcomeIssue {
    pub severity: IssueSeverity,
    /// FHIR issue type code, e.g. `invalid` or `not-found`
    pub code: &'static str,
    pub diagnostics: String,
}

/// Error response body, shaped as a FHIR `OperationOutcome`
#[derive(Debug, Serialize)]
pub struct OperationOutcome {
    #[serde(rename = "resourceType")]
    pub resource_type: &'static str,
    pub issue: Vec<OutcomeIssue>,
}

impl OperationOutcome {
    pub fn single(severity: IssueSeverity, code: &'static str, diagnostics: String) -> Self {
        Self {
            resource_type: "OperationOutcome",
            issue: vec![OutcomeIssue {
                severity,
                code,
                diagnostics,
            }],
        }
    }
}

impl ApiError {
    /// HTTP status and FHIR issue type of the error
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not-found"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "invalid"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            ApiError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "transient"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "exception"),
            ApiError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "value"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = match self {
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Conflict(msg)
            | ApiError::Unavailable(msg)
            | ApiError::Internal(msg)
            | ApiError::Validation(msg) => msg,
        };

        let severity = if status.is_server_error() {
            error!(status = status.as_u16(), %message, "request failed");
            IssueSeverity::Fatal
        } else {
            IssueSeverity::Error
        };

        (status, Json(OperationOutcome::single(severity, code, message))).into_response()
    }
}

impl From<PriorAuthError> for ApiError {
    fn from(err: PriorAuthError) -> Self {
        match err {
            PriorAuthError::MalformedInput(msg) => ApiError::BadRequest(msg),
            PriorAuthError::UnknownClaim(id) => ApiError::NotFound(format!("no submission series for {}", id)),
            PriorAuthError::ConcurrentMergeConflict { .. } => ApiError::Conflict(err.to_string()),
            PriorAuthError::Tracker(ref port) if port.is_transient() => ApiError::Unavailable(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::PortError;

    #[test]
    fn test_malformed_is_bad_request() {
        let response = ApiError::from(PriorAuthError::malformed("no claim")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_unknown_claim_is_not_found() {
        let error = ApiError::from(PriorAuthError::UnknownClaim("PA-1".to_string()));
        assert!(matches!(error, ApiError::NotFound(_)));
    }

    #[test]
    fn test_transient_tracker_failure_is_unavailable() {
        let error = ApiError::from(PriorAuthError::from(PortError::connection("pool exhausted")));
        assert_eq!(error.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_body_is_operation_outcome() {
        let outcome = OperationOutcome::single(IssueSeverity::Error, "invalid", "no claim".to_string());
        let body = serde_json::to_value(outcome).unwrap();

        assert_eq!(body["resourceType"], "OperationOutcome");
        assert_eq!(body["issue"][0]["severity"], "error");
        assert_eq!(body["issue"][0]["code"], "invalid");
        assert_eq!(body["issue"][0]["diagnostics"], "no claim");
    }

    #[test]
    fn test_validation_is_value_issue() {
        let (status, code) = ApiError::Validation("seq".to_string()).status_and_code();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(code, "value");
    }

    #[test]
    fn test_merge_conflict_is_conflict() {
        let error = ApiError::from(PriorAuthError::ConcurrentMergeConflict {
            claim_id: "PA-1".to_string(),
            attempts: 3,
        });
        assert_eq!(error.into_response().status(), StatusCode::CONFLICT);
    }
}
