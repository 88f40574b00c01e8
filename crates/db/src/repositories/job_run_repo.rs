//! Repository for the `job_runs` ledger table.
//!
//! Single-flight execution per `(job_name, run_key)` is enforced with
//! row-level compare-and-swap on `status_id`, not a distributed lock,
//! so it is correct only for processes sharing this database.

use sqlx::PgPool;
use velo_core::types::DbId;

use crate::models::job_run::{JobRun, StartOutcome};
use crate::models::status::JobRunStatus;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "\
    id, job_name, run_key, status_id, started_at, finished_at, \
    heartbeat_at, rows_affected, log, timeout_detected";

/// Provides the start/heartbeat/finish lifecycle for ledger rows.
pub struct JobRunRepo;

impl JobRunRepo {
    /// Try to take the `(job_name, run_key)` slot.
    ///
    /// A fresh slot is inserted as `started`. An existing slot is reset
    /// in place: only from `failed`, or from `success` when `force` is
    /// set. A `started` row always wins against the caller regardless
    /// of `force`: that run is still in flight.
    pub async fn start(
        pool: &PgPool,
        job_name: &str,
        run_key: &str,
        force: bool,
    ) -> Result<StartOutcome, sqlx::Error> {
        // Fast path: no row exists yet for this slot.
        let insert_query = format!(
            "INSERT INTO job_runs (job_name, run_key, status_id) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (job_name, run_key) DO NOTHING \
             RETURNING {COLUMNS}"
        );
        if let Some(run) = sqlx::query_as::<_, JobRun>(&insert_query)
            .bind(job_name)
            .bind(run_key)
            .bind(JobRunStatus::Started.id())
            .fetch_optional(pool)
            .await?
        {
            return Ok(StartOutcome::Started(run));
        }

        // Slot exists: compare-and-swap it back to `started`, but only
        // from a state the caller is allowed to reset.
        let reset_query = format!(
            "UPDATE job_runs SET \
                status_id        = $3, \
                started_at       = NOW(), \
                finished_at      = NULL, \
                heartbeat_at     = NULL, \
                rows_affected    = NULL, \
                log              = NULL, \
                timeout_detected = FALSE \
             WHERE job_name = $1 AND run_key = $2 \
               AND (status_id = $4 OR (status_id = $5 AND $6)) \
             RETURNING {COLUMNS}"
        );
        if let Some(run) = sqlx::query_as::<_, JobRun>(&reset_query)
            .bind(job_name)
            .bind(run_key)
            .bind(JobRunStatus::Started.id())
            .bind(JobRunStatus::Failed.id())
            .bind(JobRunStatus::Success.id())
            .bind(force)
            .fetch_optional(pool)
            .await?
        {
            return Ok(StartOutcome::Started(run));
        }

        // The CAS lost. Report why, based on the current row state.
        match Self::find_by_key(pool, job_name, run_key).await? {
            Some(run) if run.status_id == JobRunStatus::Success.id() => {
                Ok(StartOutcome::AlreadyDone)
            }
            // `started`, or a concurrent starter won the reset race.
            _ => Ok(StartOutcome::AlreadyRunning),
        }
    }

    /// Record a liveness signal for a running job.
    pub async fn heartbeat(pool: &PgPool, run_id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE job_runs SET heartbeat_at = NOW() WHERE id = $1")
            .bind(run_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Close a run with a terminal status, row count, and log text.
    pub async fn finish(
        pool: &PgPool,
        run_id: DbId,
        status: JobRunStatus,
        rows_affected: Option<i64>,
        log: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE job_runs SET \
                status_id     = $2, \
                finished_at   = NOW(), \
                rows_affected = $3, \
                log           = $4 \
             WHERE id = $1",
        )
        .bind(run_id)
        .bind(status.id())
        .bind(rows_affected)
        .bind(log)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Find the ledger row for a `(job_name, run_key)` slot.
    pub async fn find_by_key(
        pool: &PgPool,
        job_name: &str,
        run_key: &str,
    ) -> Result<Option<JobRun>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM job_runs \
             WHERE job_name = $1 AND run_key = $2"
        );
        sqlx::query_as::<_, JobRun>(&query)
            .bind(job_name)
            .bind(run_key)
            .fetch_optional(pool)
            .await
    }

    /// Fail one stalled `started` run for `job_name`, if any.
    ///
    /// A run is stalled when its last heartbeat (or its start, if it
    /// never sent one) is older than `timeout_secs`. Idempotent: once
    /// failed the row is no longer `started` and will not match again.
    pub async fn check_timeout(
        pool: &PgPool,
        job_name: &str,
        timeout_secs: i64,
    ) -> Result<Option<JobRun>, sqlx::Error> {
        let query = format!(
            "UPDATE job_runs SET \
                status_id        = $3, \
                finished_at      = NOW(), \
                timeout_detected = TRUE, \
                log              = 'Timed out: no heartbeat for ' || $2::text || ' seconds' \
             WHERE id = ( \
                 SELECT id FROM job_runs \
                 WHERE job_name = $1 \
                   AND status_id = $4 \
                   AND COALESCE(heartbeat_at, started_at) < NOW() - make_interval(secs => $2) \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobRun>(&query)
            .bind(job_name)
            .bind(timeout_secs as f64)
            .bind(JobRunStatus::Failed.id())
            .bind(JobRunStatus::Started.id())
            .fetch_optional(pool)
            .await
    }

    /// Fail every stalled `started` run regardless of job name.
    ///
    /// Used by the periodic sweep; returns the runs it reclaimed.
    pub async fn fail_all_stalled(
        pool: &PgPool,
        timeout_secs: i64,
    ) -> Result<Vec<JobRun>, sqlx::Error> {
        let query = format!(
            "UPDATE job_runs SET \
                status_id        = $2, \
                finished_at      = NOW(), \
                timeout_detected = TRUE, \
                log              = 'Timed out: no heartbeat for ' || $1::text || ' seconds' \
             WHERE id IN ( \
                 SELECT id FROM job_runs \
                 WHERE status_id = $3 \
                   AND COALESCE(heartbeat_at, started_at) < NOW() - make_interval(secs => $1) \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobRun>(&query)
            .bind(timeout_secs as f64)
            .bind(JobRunStatus::Failed.id())
            .bind(JobRunStatus::Started.id())
            .fetch_all(pool)
            .await
    }
}
