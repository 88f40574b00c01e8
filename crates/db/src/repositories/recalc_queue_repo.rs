//! Repository for the `recalc_queue` table.
//!
//! Entries are claimed with `FOR UPDATE SKIP LOCKED` (claim-before-work)
//! so two workers never process the same entry. Terminal states are
//! completed/failed; failed entries are left visible for operators and
//! never retried automatically.

use sqlx::PgPool;
use velo_core::types::{DbId, SeasonYear};

use crate::models::recalc::{QueueStatusCounts, RecalcQueueEntry};
use crate::models::status::RecalcStatus;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "\
    id, competitor_ids, years, status_id, claimed_at, \
    rows_affected, execution_time_ms, error_message, created_at";

/// Provides enqueue/claim/terminal operations for recalculation work.
pub struct RecalcQueueRepo;

impl RecalcQueueRepo {
    /// Enqueue a pending entry naming the identities and years whose
    /// aggregates an identity mutation invalidated.
    pub async fn enqueue(
        pool: &PgPool,
        competitor_ids: &[DbId],
        years: &[SeasonYear],
    ) -> Result<RecalcQueueEntry, sqlx::Error> {
        let query = format!(
            "INSERT INTO recalc_queue (competitor_ids, years, status_id) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RecalcQueueEntry>(&query)
            .bind(competitor_ids)
            .bind(years)
            .bind(RecalcStatus::Pending.id())
            .fetch_one(pool)
            .await
    }

    /// Atomically claim up to `max_jobs` pending entries for processing.
    ///
    /// Uses `FOR UPDATE SKIP LOCKED` so concurrent claimers never
    /// receive overlapping entries.
    pub async fn claim_next(
        pool: &PgPool,
        max_jobs: i64,
    ) -> Result<Vec<RecalcQueueEntry>, sqlx::Error> {
        let query = format!(
            "UPDATE recalc_queue SET \
                status_id  = $1, \
                claimed_at = NOW() \
             WHERE id IN ( \
                 SELECT id FROM recalc_queue \
                 WHERE status_id = $2 \
                 ORDER BY created_at ASC \
                 LIMIT $3 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RecalcQueueEntry>(&query)
            .bind(RecalcStatus::Processing.id())
            .bind(RecalcStatus::Pending.id())
            .bind(max_jobs)
            .fetch_all(pool)
            .await
    }

    /// Mark a claimed entry completed with its row count and duration.
    pub async fn mark_completed(
        pool: &PgPool,
        entry_id: DbId,
        rows_affected: i64,
        execution_time_ms: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE recalc_queue SET \
                status_id         = $2, \
                rows_affected     = $3, \
                execution_time_ms = $4, \
                error_message     = NULL \
             WHERE id = $1",
        )
        .bind(entry_id)
        .bind(RecalcStatus::Completed.id())
        .bind(rows_affected)
        .bind(execution_time_ms)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark a claimed entry failed with its error text.
    pub async fn mark_failed(
        pool: &PgPool,
        entry_id: DbId,
        error_message: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE recalc_queue SET \
                status_id     = $2, \
                error_message = $3 \
             WHERE id = $1",
        )
        .bind(entry_id)
        .bind(RecalcStatus::Failed.id())
        .bind(error_message)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Per-status entry counts for operator inspection.
    pub async fn status_counts(pool: &PgPool) -> Result<QueueStatusCounts, sqlx::Error> {
        let rows: Vec<(i16, i64)> = sqlx::query_as(
            "SELECT status_id, COUNT(*) FROM recalc_queue GROUP BY status_id",
        )
        .fetch_all(pool)
        .await?;

        let mut counts = QueueStatusCounts::default();
        for (status_id, count) in rows {
            match status_id {
                s if s == RecalcStatus::Pending.id() => counts.pending = count,
                s if s == RecalcStatus::Processing.id() => counts.processing = count,
                s if s == RecalcStatus::Completed.id() => counts.completed = count,
                s if s == RecalcStatus::Failed.id() => counts.failed = count,
                _ => {}
            }
        }
        Ok(counts)
    }

    /// List failed entries, newest first, for operator inspection.
    pub async fn list_failed(
        pool: &PgPool,
        limit: i64,
    ) -> Result<Vec<RecalcQueueEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM recalc_queue \
             WHERE status_id = $1 \
             ORDER BY created_at DESC \
             LIMIT $2"
        );
        sqlx::query_as::<_, RecalcQueueEntry>(&query)
            .bind(RecalcStatus::Failed.id())
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
