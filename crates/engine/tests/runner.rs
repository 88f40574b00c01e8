//! Integration tests for the single-flight job runner.

use assert_matches::assert_matches;
use sqlx::PgPool;
use velo_core::error::CoreError;
use velo_db::models::status::JobRunStatus;
use velo_db::repositories::JobRunRepo;
use velo_engine::{EngineError, JobRunner, RunOutcome, SkipReason, WorkReport};

#[sqlx::test(migrations = "../db/migrations")]
async fn successful_work_closes_the_ledger_row(pool: PgPool) {
    let runner = JobRunner::new(pool.clone());

    let outcome = runner
        .run("yearly-stats", "2025", false, |ctx| async move {
            ctx.heartbeat().await?;
            Ok(WorkReport {
                value: "done",
                rows_affected: 12,
            })
        })
        .await
        .unwrap();

    let (value, rows) = assert_matches!(
        outcome,
        RunOutcome::Completed { value, rows_affected } => (value, rows_affected)
    );
    assert_eq!(value, "done");
    assert_eq!(rows, 12);

    let run = JobRunRepo::find_by_key(&pool, "yearly-stats", "2025")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(run.status_id, JobRunStatus::Success.id());
    assert_eq!(run.rows_affected, Some(12));
    assert!(run.finished_at.is_some());
    assert!(run.heartbeat_at.is_some());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn failing_work_is_recorded_then_propagated(pool: PgPool) {
    let runner = JobRunner::new(pool.clone());

    let err = runner
        .run("yearly-stats", "2025", false, |_ctx| async move {
            Err::<WorkReport<()>, _>(EngineError::Core(CoreError::Computation(
                "division by zero points".to_string(),
            )))
        })
        .await
        .unwrap_err();
    assert_matches!(err, EngineError::Core(CoreError::Computation(_)));

    // The ledger write was not skipped on failure.
    let run = JobRunRepo::find_by_key(&pool, "yearly-stats", "2025")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(run.status_id, JobRunStatus::Failed.id());
    assert!(run.log.unwrap().contains("division by zero points"));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn in_flight_slot_is_skipped_not_executed(pool: PgPool) {
    // Another process holds the slot.
    JobRunRepo::start(&pool, "yearly-stats", "2025", false)
        .await
        .unwrap();

    let runner = JobRunner::new(pool);
    let outcome = runner
        .run("yearly-stats", "2025", true, |_ctx| async move {
            // Reaching this would fail the test via the outer unwrap.
            Err::<WorkReport<()>, EngineError>(EngineError::Core(CoreError::Computation(
                "work must not run when the slot is held".to_string(),
            )))
        })
        .await
        .unwrap();
    assert_matches!(outcome, RunOutcome::Skipped(SkipReason::AlreadyRunning));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn completed_slot_skips_without_force_and_reruns_with_it(pool: PgPool) {
    let runner = JobRunner::new(pool);

    let work = |rows: i64| {
        move |_ctx| async move {
            Ok(WorkReport {
                value: (),
                rows_affected: rows,
            })
        }
    };

    runner.run("yearly-stats", "2025", false, work(1)).await.unwrap();

    let skipped = runner
        .run("yearly-stats", "2025", false, work(2))
        .await
        .unwrap();
    assert_matches!(skipped, RunOutcome::Skipped(SkipReason::AlreadyDone));

    let rerun = runner.run("yearly-stats", "2025", true, work(3)).await.unwrap();
    let rows = assert_matches!(rerun, RunOutcome::Completed { rows_affected, .. } => rows_affected);
    assert_eq!(rows, 3);
}
