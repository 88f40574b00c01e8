//! Background worker: recalculation queue drain + stall sweep.
//!
//! Multiple worker processes may run against the same database; all
//! coordination happens through row-level compare-and-swap on the job
//! ledger and the recalc queue.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use velo_engine::{
    IdentityResolver, JobRunner, RecalcProcessor, RunOutcome, SqlStatProvider, WorkReport,
};

/// Job name under which queue drains are recorded in the ledger.
const DRAIN_JOB_NAME: &str = "recalc-drain";

/// Fixed run key for the drain slot. Force-starting reopens a finished
/// drain for the next tick while a `started` row still wins, so exactly
/// one drain runs at a time across all worker processes.
const DRAIN_RUN_KEY: &str = "queue";

/// Default seconds between drain attempts.
const DEFAULT_RECALC_INTERVAL_SECS: u64 = 30;

/// Default maximum entries claimed per drain.
const DEFAULT_RECALC_BATCH_SIZE: i64 = 10;


#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "velo_worker=debug,velo_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL")?;
    let pool = velo_db::connect(&database_url).await?;
    velo_db::health_check(&pool).await?;
    tracing::info!("Worker connected to database");

    let recalc_interval = Duration::from_secs(env_or(
        "RECALC_INTERVAL_SECS",
        DEFAULT_RECALC_INTERVAL_SECS,
    ));
    let batch_size: i64 = env_or("RECALC_BATCH_SIZE", DEFAULT_RECALC_BATCH_SIZE);
    let stall_timeout_secs: i64 =
        env_or("STALL_TIMEOUT_SECS", velo_engine::stall::DEFAULT_TIMEOUT_SECS);
    let sweep_interval = Duration::from_secs(env_or(
        "STALL_SWEEP_INTERVAL_SECS",
        velo_engine::stall::DEFAULT_SWEEP_INTERVAL.as_secs(),
    ));

    let cancel = CancellationToken::new();

    let sweep_handle = tokio::spawn(velo_engine::stall::run(
        pool.clone(),
        stall_timeout_secs,
        sweep_interval,
        cancel.child_token(),
    ));
    let drain_handle = tokio::spawn(drain_loop(
        pool.clone(),
        batch_size,
        recalc_interval,
        cancel.child_token(),
    ));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    cancel.cancel();

    let _ = drain_handle.await;
    let _ = sweep_handle.await;
    tracing::info!("Worker stopped");
    Ok(())
}

/// Periodically drain the recalculation queue under the job runner.
async fn drain_loop(
    pool: sqlx::PgPool,
    batch_size: i64,
    interval: Duration,
    cancel: CancellationToken,
) {
    let resolver = Arc::new(IdentityResolver::new(pool.clone()));
    let provider = SqlStatProvider::new(pool.clone());
    let processor = RecalcProcessor::new(pool.clone(), resolver, provider);
    let runner = JobRunner::new(pool);

    tracing::info!(
        batch_size,
        interval_secs = interval.as_secs(),
        "Recalc drain started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Recalc drain stopping");
                break;
            }
            _ = ticker.tick() => {
                let outcome = runner
                    .run(DRAIN_JOB_NAME, DRAIN_RUN_KEY, true, |ctx| {
                        let processor = &processor;
                        async move {
                            let summary = processor.process_batch(&ctx, batch_size).await?;
                            let rows = summary.rows_affected;
                            Ok(WorkReport { value: summary, rows_affected: rows })
                        }
                    })
                    .await;

                match outcome {
                    Ok(RunOutcome::Completed { value, .. }) => {
                        if !value.is_empty() {
                            tracing::info!(
                                claimed = value.claimed,
                                completed = value.completed,
                                failed = value.failed,
                                rows_affected = value.rows_affected,
                                "Drain pass finished"
                            );
                        }
                    }
                    Ok(RunOutcome::Skipped(reason)) => {
                        tracing::debug!(?reason, "Drain pass skipped");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Drain pass failed");
                    }
                }
            }
        }
    }
}

/// Read an env var with a typed default.
fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
