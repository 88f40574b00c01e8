//! Integration tests for the job ledger state machine.

use assert_matches::assert_matches;
use sqlx::PgPool;
use velo_db::models::job_run::StartOutcome;
use velo_db::models::status::JobRunStatus;
use velo_db::repositories::JobRunRepo;

#[sqlx::test]
async fn start_takes_a_fresh_slot(pool: PgPool) {
    let outcome = JobRunRepo::start(&pool, "yearly-stats", "2025", false)
        .await
        .unwrap();
    let run = assert_matches!(outcome, StartOutcome::Started(run) => run);
    assert_eq!(run.job_name, "yearly-stats");
    assert_eq!(run.run_key, "2025");
    assert_eq!(run.status_id, JobRunStatus::Started.id());
    assert!(run.finished_at.is_none());
}

#[sqlx::test]
async fn started_slot_rejects_a_second_start_even_with_force(pool: PgPool) {
    JobRunRepo::start(&pool, "yearly-stats", "2025", false)
        .await
        .unwrap();

    let second = JobRunRepo::start(&pool, "yearly-stats", "2025", false)
        .await
        .unwrap();
    assert_matches!(second, StartOutcome::AlreadyRunning);

    let forced = JobRunRepo::start(&pool, "yearly-stats", "2025", true)
        .await
        .unwrap();
    assert_matches!(forced, StartOutcome::AlreadyRunning);
}

#[sqlx::test]
async fn succeeded_slot_requires_force_to_rerun(pool: PgPool) {
    let outcome = JobRunRepo::start(&pool, "yearly-stats", "2025", false)
        .await
        .unwrap();
    let run = assert_matches!(outcome, StartOutcome::Started(run) => run);
    JobRunRepo::finish(&pool, run.id, JobRunStatus::Success, Some(12), None)
        .await
        .unwrap();

    let unforced = JobRunRepo::start(&pool, "yearly-stats", "2025", false)
        .await
        .unwrap();
    assert_matches!(unforced, StartOutcome::AlreadyDone);

    let forced = JobRunRepo::start(&pool, "yearly-stats", "2025", true)
        .await
        .unwrap();
    let rerun = assert_matches!(forced, StartOutcome::Started(run) => run);
    // Same ledger row, reset in place.
    assert_eq!(rerun.id, run.id);
    assert_eq!(rerun.status_id, JobRunStatus::Started.id());
    assert!(rerun.finished_at.is_none());
    assert!(rerun.rows_affected.is_none());
    assert!(!rerun.timeout_detected);

    let count: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM job_runs WHERE job_name = 'yearly-stats' AND run_key = '2025'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(count.0, 1);
}

#[sqlx::test]
async fn failed_slot_restarts_without_force(pool: PgPool) {
    let outcome = JobRunRepo::start(&pool, "yearly-stats", "2025", false)
        .await
        .unwrap();
    let run = assert_matches!(outcome, StartOutcome::Started(run) => run);
    JobRunRepo::finish(
        &pool,
        run.id,
        JobRunStatus::Failed,
        None,
        Some("source table vanished"),
    )
    .await
    .unwrap();

    let retried = JobRunRepo::start(&pool, "yearly-stats", "2025", false)
        .await
        .unwrap();
    let rerun = assert_matches!(retried, StartOutcome::Started(run) => run);
    assert_eq!(rerun.id, run.id);
    assert!(rerun.log.is_none());
}

#[sqlx::test]
async fn heartbeat_updates_the_liveness_stamp(pool: PgPool) {
    let outcome = JobRunRepo::start(&pool, "yearly-stats", "2025", false)
        .await
        .unwrap();
    let run = assert_matches!(outcome, StartOutcome::Started(run) => run);
    assert!(run.heartbeat_at.is_none());

    JobRunRepo::heartbeat(&pool, run.id).await.unwrap();

    let refreshed = JobRunRepo::find_by_key(&pool, "yearly-stats", "2025")
        .await
        .unwrap()
        .unwrap();
    assert!(refreshed.heartbeat_at.is_some());
}

#[sqlx::test]
async fn stalled_run_is_failed_once_and_can_be_force_restarted(pool: PgPool) {
    let outcome = JobRunRepo::start(&pool, "yearly-stats", "2025", false)
        .await
        .unwrap();
    let run = assert_matches!(outcome, StartOutcome::Started(run) => run);

    // Backdate the run so it looks dead.
    sqlx::query(
        "UPDATE job_runs SET started_at = NOW() - INTERVAL '2 hours', \
         heartbeat_at = NOW() - INTERVAL '2 hours' WHERE id = $1",
    )
    .bind(run.id)
    .execute(&pool)
    .await
    .unwrap();

    let reclaimed = JobRunRepo::check_timeout(&pool, "yearly-stats", 3600)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reclaimed.id, run.id);
    assert_eq!(reclaimed.status_id, JobRunStatus::Failed.id());
    assert!(reclaimed.timeout_detected);
    assert!(reclaimed.log.unwrap().contains("Timed out"));

    // Idempotent: the row is no longer `started`.
    assert_matches!(
        JobRunRepo::check_timeout(&pool, "yearly-stats", 3600)
            .await
            .unwrap(),
        None
    );

    let restarted = JobRunRepo::start(&pool, "yearly-stats", "2025", true)
        .await
        .unwrap();
    assert_matches!(restarted, StartOutcome::Started(_));
}

#[sqlx::test]
async fn a_live_heartbeat_protects_a_slow_run(pool: PgPool) {
    let outcome = JobRunRepo::start(&pool, "yearly-stats", "2025", false)
        .await
        .unwrap();
    let run = assert_matches!(outcome, StartOutcome::Started(run) => run);

    // Started long ago, but heartbeating recently: slow, not dead.
    sqlx::query(
        "UPDATE job_runs SET started_at = NOW() - INTERVAL '2 hours', \
         heartbeat_at = NOW() WHERE id = $1",
    )
    .bind(run.id)
    .execute(&pool)
    .await
    .unwrap();

    assert_matches!(
        JobRunRepo::check_timeout(&pool, "yearly-stats", 3600)
            .await
            .unwrap(),
        None
    );
}

#[sqlx::test]
async fn sweep_reclaims_stalls_across_job_names(pool: PgPool) {
    for (name, key) in [("yearly-stats", "2024"), ("club-stats", "2024")] {
        let outcome = JobRunRepo::start(&pool, name, key, false).await.unwrap();
        let run = assert_matches!(outcome, StartOutcome::Started(run) => run);
        sqlx::query("UPDATE job_runs SET started_at = NOW() - INTERVAL '2 hours' WHERE id = $1")
            .bind(run.id)
            .execute(&pool)
            .await
            .unwrap();
    }
    // One healthy run that must survive the sweep.
    JobRunRepo::start(&pool, "event-stats", "2024", false)
        .await
        .unwrap();

    let reclaimed = JobRunRepo::fail_all_stalled(&pool, 3600).await.unwrap();
    assert_eq!(reclaimed.len(), 2);
    assert!(reclaimed.iter().all(|r| r.timeout_detected));

    let healthy = JobRunRepo::find_by_key(&pool, "event-stats", "2024")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(healthy.status_id, JobRunStatus::Started.id());
}
