//! Integration tests for the recalculation queue.

use sqlx::PgPool;
use velo_db::models::status::RecalcStatus;
use velo_db::repositories::RecalcQueueRepo;

#[sqlx::test]
async fn enqueue_creates_a_pending_entry(pool: PgPool) {
    let entry = RecalcQueueRepo::enqueue(&pool, &[42, 7], &[2023, 2024])
        .await
        .unwrap();
    assert_eq!(entry.competitor_ids, vec![42, 7]);
    assert_eq!(entry.years, vec![2023, 2024]);
    assert_eq!(entry.status_id, RecalcStatus::Pending.id());
    assert!(entry.claimed_at.is_none());
}

#[sqlx::test]
async fn claim_transitions_to_processing_and_never_hands_out_twice(pool: PgPool) {
    RecalcQueueRepo::enqueue(&pool, &[42], &[2024]).await.unwrap();
    RecalcQueueRepo::enqueue(&pool, &[43], &[2024]).await.unwrap();

    let first = RecalcQueueRepo::claim_next(&pool, 10).await.unwrap();
    assert_eq!(first.len(), 2);
    assert!(first
        .iter()
        .all(|e| e.status_id == RecalcStatus::Processing.id() && e.claimed_at.is_some()));

    // Everything is claimed; a second claimer gets nothing.
    let second = RecalcQueueRepo::claim_next(&pool, 10).await.unwrap();
    assert!(second.is_empty());
}

#[sqlx::test]
async fn claim_respects_the_batch_limit_and_fifo_order(pool: PgPool) {
    let a = RecalcQueueRepo::enqueue(&pool, &[1], &[2024]).await.unwrap();
    let b = RecalcQueueRepo::enqueue(&pool, &[2], &[2024]).await.unwrap();

    let claimed = RecalcQueueRepo::claim_next(&pool, 1).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, a.id);

    let rest = RecalcQueueRepo::claim_next(&pool, 1).await.unwrap();
    assert_eq!(rest[0].id, b.id);
}

#[sqlx::test]
async fn terminal_marks_record_outcome_details(pool: PgPool) {
    let entry = RecalcQueueRepo::enqueue(&pool, &[42], &[2024]).await.unwrap();
    RecalcQueueRepo::claim_next(&pool, 1).await.unwrap();

    RecalcQueueRepo::mark_completed(&pool, entry.id, 4, 250)
        .await
        .unwrap();

    let counts = RecalcQueueRepo::status_counts(&pool).await.unwrap();
    assert_eq!(counts.completed, 1);
    assert_eq!(counts.pending, 0);

    let row: (i16, Option<i64>, Option<i64>) = sqlx::query_as(
        "SELECT status_id, rows_affected, execution_time_ms FROM recalc_queue WHERE id = $1",
    )
    .bind(entry.id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(row.0, RecalcStatus::Completed.id());
    assert_eq!(row.1, Some(4));
    assert_eq!(row.2, Some(250));
}

#[sqlx::test]
async fn failed_entries_stay_visible_for_operators(pool: PgPool) {
    let entry = RecalcQueueRepo::enqueue(&pool, &[42], &[2024]).await.unwrap();
    RecalcQueueRepo::claim_next(&pool, 1).await.unwrap();
    RecalcQueueRepo::mark_failed(&pool, entry.id, "provider blew up")
        .await
        .unwrap();

    let counts = RecalcQueueRepo::status_counts(&pool).await.unwrap();
    assert_eq!(counts.failed, 1);

    let failed = RecalcQueueRepo::list_failed(&pool, 10).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].error_message.as_deref(), Some("provider blew up"));

    // Not auto-retried: a fresh claim finds nothing.
    assert!(RecalcQueueRepo::claim_next(&pool, 10).await.unwrap().is_empty());
}
