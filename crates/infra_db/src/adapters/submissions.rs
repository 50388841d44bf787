//! PostgreSQL Submission Tracker
//!
//! Implements `SubmissionTracker` on the `submission_series` and
//! `submission_parts` tables. Each operation runs in a single transaction
//! holding the series row lock, so writers of one claim are serialized by
//! PostgreSQL while other claims proceed in parallel. Merge and
//! completeness logic is delegated to `SubmissionSeries`; this adapter only
//! loads, locks and persists.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresSubmissionTracker;
//! use domain_priorauth::SubmissionTracker;
//! use std::sync::Arc;
//!
//! let tracker: Arc<dyn SubmissionTracker> = Arc::new(PostgresSubmissionTracker::new(pool));
//! let view = tracker.record_and_merge(&claim_id, 1, claim).await?;
//! ```

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::{debug, instrument, warn};

use core_kernel::{
    AdapterHealth, ClaimId, DomainPort, HealthCheckResult, HealthCheckable, PortError, SubmissionId,
};
use domain_priorauth::{
    series_not_found, Claim, Disposition, MergedClaimView, SeriesState, SubmissionSeries,
    SubmissionTracker,
};

use crate::error::DatabaseError;
use crate::repositories::submissions::{NewPart, PartRow, RowLock, SeriesRow, SubmissionRepository};

const ADAPTER_ID: &str = "postgres-submission-tracker";

/// Attempts to create-and-lock a series row that a concurrent purge keeps deleting
const MAX_LOCK_ATTEMPTS: u32 = 3;

/// PostgreSQL-backed implementation of `SubmissionTracker`
///
/// # Error Handling
///
/// Database errors are translated through `From<DatabaseError> for PortError`.
/// Rows that cannot be decoded back into a series surface as
/// `PortError::Transformation`.
#[derive(Debug, Clone)]
pub struct PostgresSubmissionTracker {
    repository: SubmissionRepository,
}

impl PostgresSubmissionTracker {
    /// Creates a new tracker on the given pool
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: SubmissionRepository::new(pool),
        }
    }

    pub fn repository(&self) -> &SubmissionRepository {
        &self.repository
    }
}

fn to_db_sequence(sequence: u32) -> Result<i32, PortError> {
    i32::try_from(sequence)
        .map_err(|_| PortError::validation(format!("sequence number {} is out of range", sequence)))
}

fn to_db_version(version: u64) -> Result<i64, PortError> {
    i64::try_from(version).map_err(|_| PortError::Transformation {
        message: format!("series version {} does not fit the version column", version),
    })
}

fn series_state(row: &SeriesRow) -> Result<SeriesState, PortError> {
    match (row.state.as_str(), row.disposition.as_deref()) {
        ("accumulating", _) => Ok(SeriesState::Accumulating),
        ("evaluated", Some(disposition)) => disposition
            .parse::<Disposition>()
            .map(SeriesState::Evaluated)
            .map_err(|message| PortError::Transformation { message }),
        (state, _) => Err(PortError::Transformation {
            message: format!("series {} has unreadable state '{}'", row.claim_id, state),
        }),
    }
}

fn decode_parts(rows: Vec<PartRow>) -> Result<BTreeMap<u32, Claim>, PortError> {
    rows.into_iter()
        .map(|row| {
            let sequence = u32::try_from(row.sequence_number).map_err(|_| PortError::Transformation {
                message: format!("stored sequence number {} is negative", row.sequence_number),
            })?;
            let claim: Claim = serde_json::from_value(row.claim).map_err(DatabaseError::from)?;
            Ok((sequence, claim))
        })
        .collect()
}

fn restore(claim_id: &ClaimId, row: &SeriesRow, parts: Vec<PartRow>) -> Result<SubmissionSeries, PortError> {
    let version = u64::try_from(row.version).map_err(|_| PortError::Transformation {
        message: format!("series {} has negative version {}", claim_id, row.version),
    })?;
    SubmissionSeries::restore(claim_id.clone(), decode_parts(parts)?, series_state(row)?, version)
}

impl DomainPort for PostgresSubmissionTracker {}

#[async_trait]
impl HealthCheckable for PostgresSubmissionTracker {
    /// Checks database connectivity with `SELECT 1`
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();

        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(self.repository.pool())
            .await;

        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(_) => HealthCheckResult {
                adapter_id: ADAPTER_ID.to_string(),
                status: AdapterHealth::Healthy,
                latency_ms,
                message: None,
                checked_at: Utc::now(),
            },
            Err(e) => HealthCheckResult {
                adapter_id: ADAPTER_ID.to_string(),
                status: AdapterHealth::Unhealthy,
                latency_ms,
                message: Some(format!("Database error: {}", e)),
                checked_at: Utc::now(),
            },
        }
    }
}

#[async_trait]
impl SubmissionTracker for PostgresSubmissionTracker {
    #[instrument(skip(self, claim), fields(claim_id = %claim_id, sequence))]
    async fn record_and_merge(
        &self,
        claim_id: &ClaimId,
        sequence: u32,
        claim: Claim,
    ) -> Result<MergedClaimView, PortError> {
        if claim.id != *claim_id {
            return Err(PortError::validation(format!(
                "part for claim {} submitted under {}",
                claim.id, claim_id
            )));
        }
        let db_sequence = to_db_sequence(sequence)?;

        let mut tx = self.repository.begin().await?;

        let mut row = None;
        for attempt in 1..=MAX_LOCK_ATTEMPTS {
            SubmissionRepository::ensure_series(&mut *tx, claim_id.as_str()).await?;
            row = SubmissionRepository::lock_series(&mut *tx, claim_id.as_str(), RowLock::Update).await?;
            if row.is_some() {
                break;
            }
            warn!(attempt, "series row removed before it could be locked");
        }
        let row = row.ok_or_else(|| {
            PortError::conflict(format!("series {} was purged while recording a part", claim_id))
        })?;

        let parts = SubmissionRepository::load_parts(&mut *tx, claim_id.as_str()).await?;
        let (series, changed) = if parts.is_empty() {
            (SubmissionSeries::start(sequence, claim)?, true)
        } else {
            let mut series = restore(claim_id, &row, parts)?;
            let changed = series.record(sequence, claim)?;
            (series, changed)
        };

        if changed {
            let stored = series.parts().get(&sequence).ok_or_else(|| PortError::Internal {
                message: format!("part {} missing after merge", sequence),
                source: None,
            })?;
            let submission_id = SubmissionId::new_v7();
            SubmissionRepository::upsert_part(
                &mut *tx,
                NewPart {
                    claim_id: claim_id.as_str(),
                    sequence_number: db_sequence,
                    submission_id,
                    claim: serde_json::to_value(stored).map_err(DatabaseError::from)?,
                },
            )
            .await?;
            debug!(%submission_id, "part stored");

            let keep = series
                .parts()
                .keys()
                .map(|s| to_db_sequence(*s))
                .collect::<Result<Vec<_>, _>>()?;
            let removed = SubmissionRepository::delete_parts_except(&mut *tx, claim_id.as_str(), &keep).await?;
            if removed > 0 {
                debug!(removed, "parts below the complete base dropped");
            }

            let state = series.state();
            SubmissionRepository::update_series(
                &mut *tx,
                claim_id.as_str(),
                state.label(),
                state.disposition().map(|d| d.to_string()).as_deref(),
                to_db_version(series.version())?,
            )
            .await?;
        }

        tx.commit().await.map_err(DatabaseError::from)?;

        debug!(changed, version = series.version(), "part recorded");
        Ok(series.view(changed))
    }

    #[instrument(skip(self), fields(claim_id = %claim_id))]
    async fn view(&self, claim_id: &ClaimId) -> Result<MergedClaimView, PortError> {
        let mut tx = self.repository.begin().await?;

        let row = SubmissionRepository::lock_series(&mut *tx, claim_id.as_str(), RowLock::Share)
            .await?
            .ok_or_else(|| series_not_found(claim_id))?;
        let parts = SubmissionRepository::load_parts(&mut *tx, claim_id.as_str()).await?;
        if parts.is_empty() {
            return Err(series_not_found(claim_id));
        }
        let series = restore(claim_id, &row, parts)?;

        tx.commit().await.map_err(DatabaseError::from)?;
        Ok(series.view(false))
    }

    #[instrument(skip(self, state), fields(claim_id = %claim_id, expected_version))]
    async fn record_outcome(
        &self,
        claim_id: &ClaimId,
        expected_version: u64,
        state: SeriesState,
    ) -> Result<(), PortError> {
        let expected = to_db_version(expected_version)?;
        let mut tx = self.repository.begin().await?;

        let row = SubmissionRepository::lock_series(&mut *tx, claim_id.as_str(), RowLock::Update)
            .await?
            .ok_or_else(|| series_not_found(claim_id))?;

        if row.version != expected {
            return Err(PortError::conflict(format!(
                "series {} is at version {}, outcome was computed at {}",
                claim_id, row.version, expected_version
            )));
        }

        SubmissionRepository::update_series(
            &mut *tx,
            claim_id.as_str(),
            state.label(),
            state.disposition().map(|d| d.to_string()).as_deref(),
            row.version,
        )
        .await?;

        tx.commit().await.map_err(DatabaseError::from)?;
        debug!(state = state.label(), "outcome recorded");
        Ok(())
    }

    #[instrument(skip(self), fields(claim_id = %claim_id))]
    async fn purge(&self, claim_id: &ClaimId) -> Result<(), PortError> {
        if self.repository.delete_series(claim_id.as_str()).await? {
            Ok(())
        } else {
            Err(series_not_found(claim_id))
        }
    }
}
