//! Repository for the `canonical_mappings` table.
//!
//! Mapping mutations are atomic with their audit entries: the mapping
//! write and the audit append share one transaction, so a partial
//! application (mapping without audit, or vice versa) is never
//! observable.

use sqlx::{PgExecutor, PgPool};
use velo_core::types::DbId;

use crate::models::audit::{actions, NewAuditEntry};
use crate::models::identity::{
    CanonicalMapping, MergeWriteOutcome, NewMapping, STATUS_APPROVED,
};
use crate::repositories::AuditRepo;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "\
    id, merged_id, canonical_id, reason, confidence, status, \
    merged_by, merged_at";

/// Advisory lock key serializing mapping writes. Concurrent merges
/// must not each pass the chain checks against a map state the other
/// is about to change.
const MAPPING_WRITE_LOCK_KEY: i64 = 0x76656c_6f5f6964;

/// Provides operations over the canonical identity map.
pub struct IdentityRepo;

impl IdentityRepo {
    /// Find the approved mapping for a merged-away identity, if any.
    pub async fn find_by_merged_id(
        pool: &PgPool,
        merged_id: DbId,
    ) -> Result<Option<CanonicalMapping>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM canonical_mappings \
             WHERE merged_id = $1 AND status = $2"
        );
        sqlx::query_as::<_, CanonicalMapping>(&query)
            .bind(merged_id)
            .bind(STATUS_APPROVED)
            .fetch_optional(pool)
            .await
    }

    /// True when `id` appears as the merged side of an approved mapping.
    pub async fn is_merged_away<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS( \
                 SELECT 1 FROM canonical_mappings \
                 WHERE merged_id = $1 AND status = $2)",
        )
        .bind(id)
        .bind(STATUS_APPROVED)
        .fetch_one(executor)
        .await?;
        Ok(exists.0)
    }

    /// True when `id` appears as the canonical side of an approved mapping.
    pub async fn is_canonical_target<'e>(
        executor: impl PgExecutor<'e>,
        id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS( \
                 SELECT 1 FROM canonical_mappings \
                 WHERE canonical_id = $1 AND status = $2)",
        )
        .bind(id)
        .bind(STATUS_APPROVED)
        .fetch_one(executor)
        .await?;
        Ok(exists.0)
    }

    /// All identities merged into `canonical_id`.
    pub async fn merged_ids_for(
        pool: &PgPool,
        canonical_id: DbId,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        let rows: Vec<(DbId,)> = sqlx::query_as(
            "SELECT merged_id FROM canonical_mappings \
             WHERE canonical_id = $1 AND status = $2 \
             ORDER BY merged_id",
        )
        .bind(canonical_id)
        .bind(STATUS_APPROVED)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    /// List the full mappings pointing at `canonical_id`.
    pub async fn list_for(
        pool: &PgPool,
        canonical_id: DbId,
    ) -> Result<Vec<CanonicalMapping>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM canonical_mappings \
             WHERE canonical_id = $1 AND status = $2 \
             ORDER BY merged_id"
        );
        sqlx::query_as::<_, CanonicalMapping>(&query)
            .bind(canonical_id)
            .bind(STATUS_APPROVED)
            .fetch_all(pool)
            .await
    }

    /// Upsert a mapping and append its audit entry in one transaction.
    ///
    /// Self-merge and confidence validation happen in the resolver
    /// before this is called. The chain checks run here, inside the
    /// same transaction as the write and under an advisory lock that
    /// serializes mapping writes, so two concurrent merges cannot both
    /// pass checks against a map state the other is changing.
    pub async fn upsert_with_audit(
        pool: &PgPool,
        input: &NewMapping,
    ) -> Result<MergeWriteOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(MAPPING_WRITE_LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        if Self::is_merged_away(&mut *tx, input.canonical_id).await? {
            tx.rollback().await?;
            return Ok(MergeWriteOutcome::CanonicalMergedAway);
        }
        if Self::is_canonical_target(&mut *tx, input.merged_id).await? {
            tx.rollback().await?;
            return Ok(MergeWriteOutcome::MergedIsCanonicalTarget);
        }

        let query = format!(
            "INSERT INTO canonical_mappings \
                 (merged_id, canonical_id, reason, confidence, status, merged_by) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (merged_id) DO UPDATE SET \
                 canonical_id = EXCLUDED.canonical_id, \
                 reason       = EXCLUDED.reason, \
                 confidence   = EXCLUDED.confidence, \
                 merged_by    = EXCLUDED.merged_by, \
                 merged_at    = NOW() \
             RETURNING {COLUMNS}"
        );
        let mapping = sqlx::query_as::<_, CanonicalMapping>(&query)
            .bind(input.merged_id)
            .bind(input.canonical_id)
            .bind(&input.reason)
            .bind(input.confidence)
            .bind(STATUS_APPROVED)
            .bind(&input.merged_by)
            .fetch_one(&mut *tx)
            .await?;

        let audit = NewAuditEntry {
            competitor_id: input.merged_id,
            action: actions::MERGE.to_string(),
            details: Some(serde_json::json!({
                "canonical_id": input.canonical_id,
                "reason": input.reason,
                "confidence": input.confidence,
            })),
            actor: input.merged_by.clone(),
        };
        AuditRepo::append_in_tx(&mut tx, &audit).await?;

        tx.commit().await?;
        Ok(MergeWriteOutcome::Applied(mapping))
    }

    /// Delete the mapping for `merged_id` and append an unmerge audit
    /// entry in one transaction.
    ///
    /// Returns `false` without writing anything when no mapping existed.
    pub async fn delete_with_audit(
        pool: &PgPool,
        merged_id: DbId,
        actor: &str,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "DELETE FROM canonical_mappings \
             WHERE merged_id = $1 AND status = $2 \
             RETURNING {COLUMNS}"
        );
        let removed = sqlx::query_as::<_, CanonicalMapping>(&query)
            .bind(merged_id)
            .bind(STATUS_APPROVED)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(mapping) = removed else {
            tx.rollback().await?;
            return Ok(false);
        };

        let audit = NewAuditEntry {
            competitor_id: merged_id,
            action: actions::UNMERGE.to_string(),
            details: Some(serde_json::json!({
                "canonical_id": mapping.canonical_id,
                "reason": mapping.reason,
            })),
            actor: actor.to_string(),
        };
        AuditRepo::append_in_tx(&mut tx, &audit).await?;

        tx.commit().await?;
        Ok(true)
    }
}
