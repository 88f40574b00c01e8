//! Recalculation queue entity models.

use serde::Serialize;
use sqlx::FromRow;
use velo_core::types::{DbId, SeasonYear, Timestamp};

use super::status::StatusId;

/// A row from the `recalc_queue` table: the identities and years whose
/// aggregates a merge or unmerge invalidated.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RecalcQueueEntry {
    pub id: DbId,
    pub competitor_ids: Vec<DbId>,
    pub years: Vec<SeasonYear>,
    pub status_id: StatusId,
    pub claimed_at: Option<Timestamp>,
    pub rows_affected: Option<i64>,
    pub execution_time_ms: Option<i64>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
}

/// Per-status entry counts for the operator-facing queue status query.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStatusCounts {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
}
