//! Repository for the `snapshots` table.
//!
//! Snapshot rows are immutable: insert and read only.

use sqlx::PgPool;
use velo_core::types::{DbId, Timestamp};

use crate::models::snapshot::Snapshot;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "\
    id, fingerprint, source_max_updated_at, description, created_by, created_at";

/// Provides insert and lookup operations for dataset snapshots.
pub struct SnapshotRepo;

impl SnapshotRepo {
    /// Persist a new snapshot row.
    pub async fn insert(
        pool: &PgPool,
        fingerprint: &str,
        source_max_updated_at: Option<Timestamp>,
        description: &str,
        created_by: &str,
    ) -> Result<Snapshot, sqlx::Error> {
        let query = format!(
            "INSERT INTO snapshots \
                 (fingerprint, source_max_updated_at, description, created_by) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Snapshot>(&query)
            .bind(fingerprint)
            .bind(source_max_updated_at)
            .bind(description)
            .bind(created_by)
            .fetch_one(pool)
            .await
    }

    /// The most recently created snapshot, if any.
    pub async fn latest(pool: &PgPool) -> Result<Option<Snapshot>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM snapshots \
             ORDER BY created_at DESC, id DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, Snapshot>(&query)
            .fetch_optional(pool)
            .await
    }

    /// Find a snapshot by its primary key.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<Snapshot>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM snapshots WHERE id = $1");
        sqlx::query_as::<_, Snapshot>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Watermark: the maximum last-modified timestamp across the
    /// aggregate and source tables.
    pub async fn source_watermark(pool: &PgPool) -> Result<Option<Timestamp>, sqlx::Error> {
        let row: (Option<Timestamp>,) = sqlx::query_as(
            "SELECT GREATEST( \
                 (SELECT MAX(updated_at) FROM season_stats), \
                 (SELECT MAX(updated_at) FROM race_results))",
        )
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }
}
