//! Rules endpoint handlers

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::debug;
use validator::Validate;

use core_kernel::ClaimId;
use domain_priorauth::Bundle;

use crate::dto::rules::{DispositionResponse, SeriesStatusResponse, SubmitParams};
use crate::{error::ApiError, AppState};

fn claim_id(raw: &str) -> Result<ClaimId, ApiError> {
    ClaimId::new(raw).ok_or_else(|| ApiError::BadRequest("claim id must not be empty".to_string()))
}

/// Decides the disposition of one submitted part
pub async fn submit(
    State(state): State<AppState>,
    params: Result<Query<SubmitParams>, QueryRejection>,
    payload: Result<Json<Bundle>, JsonRejection>,
) -> Result<Json<DispositionResponse>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    params
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    let sequence = params
        .sequence()
        .ok_or_else(|| ApiError::Validation("seq is out of range".to_string()))?;

    let Json(bundle) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let decision = state.engine.process_submission(&bundle, sequence).await?;
    Ok(Json(DispositionResponse::from_decision(
        decision,
        state.properties.base_url(),
    )))
}

/// Liveness check of the rules endpoint
pub async fn ping() -> StatusCode {
    debug!("rules endpoint pinged");
    StatusCode::CREATED
}

/// Reports whether a claim's series is complete
pub async fn series_status(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<SeriesStatusResponse>, ApiError> {
    let id = claim_id(&raw_id)?;
    let complete = state.engine.is_complete(&id).await?;
    Ok(Json(SeriesStatusResponse {
        claim_id: id.to_string(),
        complete,
    }))
}

/// Drops a claim's series
pub async fn purge(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = claim_id(&raw_id)?;
    state.engine.purge(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
