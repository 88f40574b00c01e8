//! Snapshot creation and fingerprinting.
//!
//! A snapshot pins the aggregate dataset at a point in time: a
//! deterministic content hash plus the source-data watermark. Exports
//! embed the snapshot id and fingerprint in their manifest; re-fetching
//! and re-fingerprinting the same data later proves reproducibility.

use sqlx::PgPool;
use velo_core::fingerprint;
use velo_db::models::snapshot::Snapshot;
use velo_db::repositories::{SeasonStatRepo, SnapshotRepo};

use crate::error::EngineResult;

/// Creates and reuses dataset snapshots.
pub struct SnapshotService {
    pool: PgPool,
}

impl SnapshotService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a snapshot of the current aggregate dataset.
    ///
    /// Reads the aggregate table in stable `(competitor_id, year)`
    /// order, canonicalizes the rows, and combines the structural
    /// checksum with the source watermark into the fingerprint.
    pub async fn create_snapshot(
        &self,
        description: &str,
        created_by: &str,
    ) -> EngineResult<Snapshot> {
        let watermark = SnapshotRepo::source_watermark(&self.pool).await?;

        let rows = SeasonStatRepo::all_ordered(&self.pool).await?;
        let data = serde_json::Value::Array(
            rows.iter().map(|r| r.fingerprint_value()).collect(),
        );

        let print = match &watermark {
            Some(mark) => fingerprint::fingerprint_with_watermark(&data, mark),
            None => fingerprint::fingerprint(&data),
        };

        let snapshot =
            SnapshotRepo::insert(&self.pool, &print, watermark, description, created_by)
                .await?;
        tracing::info!(
            snapshot_id = snapshot.id,
            fingerprint = %snapshot.fingerprint,
            rows = rows.len(),
            "Snapshot created"
        );
        Ok(snapshot)
    }

    /// Return the latest snapshot if younger than `max_age_minutes`,
    /// otherwise create a new one.
    ///
    /// Keeps repeated export requests from churning out near-identical
    /// snapshots.
    pub async fn get_or_create(
        &self,
        max_age_minutes: i64,
        created_by: &str,
    ) -> EngineResult<Snapshot> {
        if let Some(latest) = SnapshotRepo::latest(&self.pool).await? {
            let age = chrono::Utc::now() - latest.created_at;
            if age < chrono::Duration::minutes(max_age_minutes) {
                tracing::debug!(snapshot_id = latest.id, "Reusing recent snapshot");
                return Ok(latest);
            }
        }
        self.create_snapshot("auto", created_by).await
    }
}
