//! Job ledger entity models.

use serde::Serialize;
use sqlx::FromRow;
use velo_core::types::{DbId, Timestamp};

use super::status::StatusId;

/// A row from the `job_runs` ledger. At most one row exists per
/// `(job_name, run_key)`; reruns reset the row in place.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobRun {
    pub id: DbId,
    pub job_name: String,
    pub run_key: String,
    pub status_id: StatusId,
    pub started_at: Timestamp,
    pub finished_at: Option<Timestamp>,
    pub heartbeat_at: Option<Timestamp>,
    pub rows_affected: Option<i64>,
    pub log: Option<String>,
    pub timeout_detected: bool,
}

/// Result of attempting to start a run for a `(job_name, run_key)` slot.
#[derive(Debug)]
pub enum StartOutcome {
    /// The slot was free (or resettable) and now holds a fresh run.
    Started(JobRun),
    /// Another execution holds the slot; back off and try later.
    AlreadyRunning,
    /// The slot completed successfully and `force` was not set.
    AlreadyDone,
}
