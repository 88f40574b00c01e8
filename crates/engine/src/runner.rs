//! Single-flight job execution against the ledger.
//!
//! [`JobRunner::run`] wraps a unit of aggregation work with the
//! start/heartbeat/finish lifecycle. The ledger's terminal write happens
//! even when the work errors: the run is marked failed with the error
//! text first, and only then is the error handed back to the invoking
//! scheduler. A run is left `started` only by a crash, which the stall
//! detector reclaims.

use std::future::Future;

use sqlx::PgPool;
use velo_core::types::DbId;
use velo_db::models::job_run::StartOutcome;
use velo_db::models::status::JobRunStatus;
use velo_db::repositories::JobRunRepo;

use crate::error::EngineResult;

/// Why a run was skipped instead of executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another execution holds the slot. Not fatal; try later.
    AlreadyRunning,
    /// The slot already succeeded and `force` was not set.
    AlreadyDone,
}

/// Result of [`JobRunner::run`].
#[derive(Debug)]
pub enum RunOutcome<T> {
    /// The work ran to completion and the ledger row is `success`.
    Completed { value: T, rows_affected: i64 },
    /// Single-flight rejection; nothing was executed.
    Skipped(SkipReason),
}

/// What a unit of work reports back on success.
#[derive(Debug)]
pub struct WorkReport<T> {
    pub value: T,
    pub rows_affected: i64,
}

/// Handle passed into the wrapped work for liveness signalling.
///
/// Long aggregation loops must call [`RunContext::heartbeat`] at a
/// bounded cadence (e.g. once per processed entry) so the stall
/// detector can tell "slow" from "dead".
#[derive(Clone)]
pub struct RunContext {
    pool: PgPool,
    run_id: DbId,
}

impl RunContext {
    pub fn run_id(&self) -> DbId {
        self.run_id
    }

    /// Update the run's `heartbeat_at` to now.
    pub async fn heartbeat(&self) -> EngineResult<()> {
        JobRunRepo::heartbeat(&self.pool, self.run_id).await?;
        Ok(())
    }
}

/// Wraps aggregation work with ledger lifecycle calls.
pub struct JobRunner {
    pool: PgPool,
}

impl JobRunner {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Execute `work` under the `(job_name, run_key)` slot.
    ///
    /// Returns `Skipped` when the slot is held (`AlreadyRunning`) or
    /// completed without `force` (`AlreadyDone`). When the work errors,
    /// the ledger row is closed as `failed` with the error text before
    /// the error is propagated.
    pub async fn run<F, Fut, T>(
        &self,
        job_name: &str,
        run_key: &str,
        force: bool,
        work: F,
    ) -> EngineResult<RunOutcome<T>>
    where
        F: FnOnce(RunContext) -> Fut,
        Fut: Future<Output = EngineResult<WorkReport<T>>>,
    {
        let run = match JobRunRepo::start(&self.pool, job_name, run_key, force).await? {
            StartOutcome::Started(run) => run,
            StartOutcome::AlreadyRunning => {
                tracing::debug!(job_name, run_key, "Run skipped: already running");
                return Ok(RunOutcome::Skipped(SkipReason::AlreadyRunning));
            }
            StartOutcome::AlreadyDone => {
                tracing::debug!(job_name, run_key, "Run skipped: already done");
                return Ok(RunOutcome::Skipped(SkipReason::AlreadyDone));
            }
        };

        tracing::info!(job_name, run_key, run_id = run.id, "Run started");
        let ctx = RunContext {
            pool: self.pool.clone(),
            run_id: run.id,
        };

        match work(ctx).await {
            Ok(report) => {
                JobRunRepo::finish(
                    &self.pool,
                    run.id,
                    JobRunStatus::Success,
                    Some(report.rows_affected),
                    None,
                )
                .await?;
                tracing::info!(
                    job_name,
                    run_key,
                    run_id = run.id,
                    rows_affected = report.rows_affected,
                    "Run succeeded"
                );
                Ok(RunOutcome::Completed {
                    value: report.value,
                    rows_affected: report.rows_affected,
                })
            }
            Err(err) => {
                // The ledger write must not be skipped on failure.
                JobRunRepo::finish(
                    &self.pool,
                    run.id,
                    JobRunStatus::Failed,
                    None,
                    Some(&err.to_string()),
                )
                .await?;
                tracing::error!(
                    job_name,
                    run_key,
                    run_id = run.id,
                    error = %err,
                    "Run failed"
                );
                Err(err)
            }
        }
    }
}
