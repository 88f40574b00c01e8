//! Repository for the `identity_audit` table.
//!
//! Append-only: there are deliberately no update or delete methods.

use sqlx::{PgPool, Postgres, Transaction};
use velo_core::types::DbId;

use crate::models::audit::{IdentityAuditEntry, NewAuditEntry};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, competitor_id, action, details, actor, created_at";

/// Provides append and query operations for the identity audit trail.
pub struct AuditRepo;

impl AuditRepo {
    /// Append an audit entry using the pool directly.
    pub async fn append(
        pool: &PgPool,
        input: &NewAuditEntry,
    ) -> Result<IdentityAuditEntry, sqlx::Error> {
        let query = insert_query();
        sqlx::query_as::<_, IdentityAuditEntry>(&query)
            .bind(input.competitor_id)
            .bind(&input.action)
            .bind(&input.details)
            .bind(&input.actor)
            .fetch_one(pool)
            .await
    }

    /// Append an audit entry inside an existing transaction, so the
    /// caller's mapping write and the audit write commit together.
    pub async fn append_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        input: &NewAuditEntry,
    ) -> Result<IdentityAuditEntry, sqlx::Error> {
        let query = insert_query();
        sqlx::query_as::<_, IdentityAuditEntry>(&query)
            .bind(input.competitor_id)
            .bind(&input.action)
            .bind(&input.details)
            .bind(&input.actor)
            .fetch_one(&mut **tx)
            .await
    }

    /// List audit entries for one competitor, newest first.
    pub async fn list_for_competitor(
        pool: &PgPool,
        competitor_id: DbId,
        limit: i64,
    ) -> Result<Vec<IdentityAuditEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM identity_audit \
             WHERE competitor_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2"
        );
        sqlx::query_as::<_, IdentityAuditEntry>(&query)
            .bind(competitor_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Total number of audit entries.
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM identity_audit")
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }
}

fn insert_query() -> String {
    format!(
        "INSERT INTO identity_audit (competitor_id, action, details, actor) \
         VALUES ($1, $2, $3, $4) \
         RETURNING {COLUMNS}"
    )
}
