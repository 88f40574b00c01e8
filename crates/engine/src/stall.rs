//! Stall detection for runs whose process died without finishing.
//!
//! A `started` run whose heartbeat has gone silent longer than the
//! timeout is marked failed with `timeout_detected = true`, which
//! unblocks a subsequent forced rerun. The sweep is idempotent: a run
//! it fails is no longer `started` and will not be found again.

use std::time::Duration;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use velo_db::models::job_run::JobRun;
use velo_db::repositories::JobRunRepo;

use crate::error::EngineResult;

/// Default stall timeout: one hour.
pub const DEFAULT_TIMEOUT_SECS: i64 = 3600;

/// Default interval between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Finds and fails stalled job runs.
pub struct StallDetector {
    pool: PgPool,
    timeout_secs: i64,
}

impl StallDetector {
    pub fn new(pool: PgPool, timeout_secs: i64) -> Self {
        Self { pool, timeout_secs }
    }

    /// Fail one stalled run for `job_name`, returning it if found.
    pub async fn check(&self, job_name: &str) -> EngineResult<Option<JobRun>> {
        let reclaimed =
            JobRunRepo::check_timeout(&self.pool, job_name, self.timeout_secs).await?;
        if let Some(run) = &reclaimed {
            tracing::warn!(
                job_name,
                run_key = %run.run_key,
                run_id = run.id,
                timeout_secs = self.timeout_secs,
                "Stalled run marked failed"
            );
        }
        Ok(reclaimed)
    }

    /// Fail every stalled run across all job names.
    pub async fn sweep(&self) -> EngineResult<Vec<JobRun>> {
        let reclaimed = JobRunRepo::fail_all_stalled(&self.pool, self.timeout_secs).await?;
        for run in &reclaimed {
            tracing::warn!(
                job_name = %run.job_name,
                run_key = %run.run_key,
                run_id = run.id,
                timeout_secs = self.timeout_secs,
                "Stalled run marked failed"
            );
        }
        Ok(reclaimed)
    }
}

/// Run the periodic stall sweep until `cancel` is triggered.
pub async fn run(pool: PgPool, timeout_secs: i64, interval: Duration, cancel: CancellationToken) {
    let detector = StallDetector::new(pool, timeout_secs);

    tracing::info!(
        timeout_secs,
        interval_secs = interval.as_secs(),
        "Stall sweep started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Stall sweep stopping");
                break;
            }
            _ = ticker.tick() => {
                match detector.sweep().await {
                    Ok(reclaimed) => {
                        if reclaimed.is_empty() {
                            tracing::debug!("Stall sweep: nothing stalled");
                        } else {
                            tracing::info!(count = reclaimed.len(), "Stall sweep: reclaimed runs");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Stall sweep failed");
                    }
                }
            }
        }
    }
}
