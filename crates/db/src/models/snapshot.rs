//! Snapshot entity model.

use serde::Serialize;
use sqlx::FromRow;
use velo_core::types::{DbId, Timestamp};

/// A row from the `snapshots` table. Immutable once created; exports
/// reference it as their reproducibility anchor.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Snapshot {
    pub id: DbId,
    pub fingerprint: String,
    /// Watermark: maximum last-modified timestamp across the aggregate
    /// and source tables at snapshot time.
    pub source_max_updated_at: Option<Timestamp>,
    pub description: String,
    pub created_by: String,
    pub created_at: Timestamp,
}
