//! Submission tracker repository
//!
//! SQL access to the `submission_series` and `submission_parts` tables.
//! Every statement runs on a caller-supplied connection so the adapter can
//! group a whole merge into one transaction. Series rows are the unit of
//! locking: `lock_series` takes `FOR UPDATE` and serializes all writers of
//! one claim id.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use core_kernel::SubmissionId;

use crate::error::DatabaseError;

/// A row of `submission_series`
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SeriesRow {
    pub claim_id: String,
    pub state: String,
    pub disposition: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row of `submission_parts`
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct PartRow {
    pub claim_id: String,
    pub sequence_number: i32,
    pub submission_id: Uuid,
    /// The normalized claim of this part
    pub claim: Value,
    pub received_at: DateTime<Utc>,
}

/// A part to write
#[derive(Debug, Clone)]
pub struct NewPart<'a> {
    pub claim_id: &'a str,
    pub sequence_number: i32,
    /// Identifies this write of the part; replaced on every upsert
    pub submission_id: SubmissionId,
    pub claim: Value,
}

/// Row lock taken by `lock_series`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLock {
    /// Exclusive; for writers
    Update,
    /// Shared; for consistent reads
    Share,
}

impl RowLock {
    fn clause(&self) -> &'static str {
        match self {
            RowLock::Update => "FOR UPDATE",
            RowLock::Share => "FOR SHARE",
        }
    }
}

/// Repository for submission series and their parts
#[derive(Debug, Clone)]
pub struct SubmissionRepository {
    pool: PgPool,
}

impl SubmissionRepository {
    /// Creates a new SubmissionRepository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Starts a transaction on the repository's pool
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, DatabaseError> {
        Ok(self.pool.begin().await?)
    }

    /// Inserts an empty series row unless one exists
    pub async fn ensure_series(conn: &mut PgConnection, claim_id: &str) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO submission_series (claim_id, state, version)
            VALUES ($1, 'accumulating', 0)
            ON CONFLICT (claim_id) DO NOTHING
            "#,
        )
        .bind(claim_id)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Reads and locks a series row
    ///
    /// # Returns
    ///
    /// The row, or `None` if the series does not exist (or was deleted
    /// while waiting for the lock)
    pub async fn lock_series(
        conn: &mut PgConnection,
        claim_id: &str,
        lock: RowLock,
    ) -> Result<Option<SeriesRow>, DatabaseError> {
        let sql = format!(
            r#"
            SELECT claim_id, state, disposition, version, created_at, updated_at
            FROM submission_series
            WHERE claim_id = $1
            {}
            "#,
            lock.clause()
        );

        let row = sqlx::query_as::<_, SeriesRow>(&sql)
            .bind(claim_id)
            .fetch_optional(conn)
            .await?;
        Ok(row)
    }

    /// Loads all parts of a series in sequence order
    pub async fn load_parts(conn: &mut PgConnection, claim_id: &str) -> Result<Vec<PartRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, PartRow>(
            r#"
            SELECT claim_id, sequence_number, submission_id, claim, received_at
            FROM submission_parts
            WHERE claim_id = $1
            ORDER BY sequence_number
            "#,
        )
        .bind(claim_id)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    /// Inserts a part or replaces the stored claim of an existing one
    pub async fn upsert_part(conn: &mut PgConnection, part: NewPart<'_>) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO submission_parts (claim_id, sequence_number, submission_id, claim, received_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (claim_id, sequence_number) DO UPDATE
            SET claim = EXCLUDED.claim, submission_id = EXCLUDED.submission_id
            "#,
        )
        .bind(part.claim_id)
        .bind(part.sequence_number)
        .bind(Uuid::from(part.submission_id))
        .bind(part.claim)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Deletes the parts whose sequence number is not in `keep`
    pub async fn delete_parts_except(
        conn: &mut PgConnection,
        claim_id: &str,
        keep: &[i32],
    ) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            r#"
            DELETE FROM submission_parts
            WHERE claim_id = $1 AND NOT (sequence_number = ANY($2))
            "#,
        )
        .bind(claim_id)
        .bind(keep)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Writes the evaluation state and version of a series
    pub async fn update_series(
        conn: &mut PgConnection,
        claim_id: &str,
        state: &str,
        disposition: Option<&str>,
        version: i64,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE submission_series
            SET state = $2, disposition = $3, version = $4, updated_at = NOW()
            WHERE claim_id = $1
            "#,
        )
        .bind(claim_id)
        .bind(state)
        .bind(disposition)
        .bind(version)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("SubmissionSeries", claim_id));
        }
        Ok(())
    }

    /// Deletes a series and, by cascade, its parts
    ///
    /// # Returns
    ///
    /// True if a series was deleted
    pub async fn delete_series(&self, claim_id: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM submission_series WHERE claim_id = $1")
            .bind(claim_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
