//! Canonical identity mapping entity and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use velo_core::types::{DbId, Timestamp};

/// Only approved mappings are modeled; the column exists so a future
/// review workflow is a predicate change, not a schema change.
pub const STATUS_APPROVED: &str = "approved";

/// A row from the `canonical_mappings` table: one merged-away duplicate
/// pointing at its canonical identity.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CanonicalMapping {
    pub id: DbId,
    pub merged_id: DbId,
    pub canonical_id: DbId,
    pub reason: String,
    pub confidence: i16,
    pub status: String,
    pub merged_by: String,
    pub merged_at: Timestamp,
}

/// DTO for creating a mapping. Request-shape validation (self-merge,
/// confidence bounds) happens in the resolver before this reaches the
/// repository; chain checks run inside the write transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMapping {
    pub merged_id: DbId,
    pub canonical_id: DbId,
    pub reason: String,
    pub confidence: i16,
    pub merged_by: String,
}

/// Result of attempting to write a mapping.
#[derive(Debug)]
pub enum MergeWriteOutcome {
    /// The mapping and its audit entry were committed.
    Applied(CanonicalMapping),
    /// The proposed canonical identity is itself merged away; the
    /// write would form a chain.
    CanonicalMergedAway,
    /// The merged identity is a canonical target of other mappings;
    /// the write would form a chain.
    MergedIsCanonicalTarget,
}
