//! Identity audit trail entity models.
//!
//! Audit entries are append-only and immutable once created (no
//! `updated_at`, no update or delete repository methods).

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use velo_core::types::{DbId, Timestamp};

/// Audit actions recorded for identity mutations.
pub mod actions {
    pub const MERGE: &str = "merge";
    pub const UNMERGE: &str = "unmerge";
}

/// A single identity audit entry.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct IdentityAuditEntry {
    pub id: DbId,
    pub competitor_id: DbId,
    pub action: String,
    pub details: Option<serde_json::Value>,
    pub actor: String,
    pub created_at: Timestamp,
}

/// DTO for appending a new audit entry.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAuditEntry {
    pub competitor_id: DbId,
    pub action: String,
    pub details: Option<serde_json::Value>,
    pub actor: String,
}
