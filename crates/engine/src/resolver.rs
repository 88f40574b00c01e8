//! Cached canonical-identity resolution.
//!
//! Every aggregation query routes competitor lookups through a resolver,
//! so resolution sits on the hot path and is cached per instance. The
//! cache entry for a competitor is invalidated inside every mapping
//! mutation: a stale entry after a merge would silently split one
//! competitor's history across two aggregate rows.
//!
//! The cache is owned by the resolver instance, not a process-wide
//! singleton, so tests stay isolated and each worker task can hold its
//! own resolver.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::RwLock;
use velo_core::error::CoreError;
use velo_core::identity::{self, MergeReason};
use velo_core::types::DbId;
use velo_db::models::identity::{CanonicalMapping, MergeWriteOutcome, NewMapping};
use velo_db::repositories::IdentityRepo;

use crate::error::EngineResult;

/// Cache hit/miss counters, for tuning only, never correctness.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Resolves competitor identities to their canonical identity.
pub struct IdentityResolver {
    pool: PgPool,
    /// `competitor_id -> canonical_id`; an entry exists for every id
    /// looked up at least once, including identities mapped to
    /// themselves.
    cache: RwLock<HashMap<DbId, DbId>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl IdentityResolver {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            cache: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Resolve an identity to its canonical identity.
    ///
    /// Returns the mapped canonical identity when an approved mapping
    /// exists, otherwise the input unchanged.
    pub async fn resolve(&self, competitor_id: DbId) -> EngineResult<DbId> {
        if let Some(canonical) = self.cache.read().await.get(&competitor_id) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(*canonical);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let canonical = IdentityRepo::find_by_merged_id(&self.pool, competitor_id)
            .await?
            .map(|m| m.canonical_id)
            .unwrap_or(competitor_id);

        self.cache.write().await.insert(competitor_id, canonical);
        Ok(canonical)
    }

    /// True iff `competitor_id` has been merged into another identity.
    pub async fn is_merged(&self, competitor_id: DbId) -> EngineResult<bool> {
        Ok(self.resolve(competitor_id).await? != competitor_id)
    }

    /// Merge `merged_id` into `canonical_id`.
    ///
    /// Rejects self-merges (`InvalidOperation`) and any merge that
    /// would create a mapping chain (`AlreadyMerged`): the canonical
    /// side must resolve to itself, and the merged side must not be a
    /// canonical target of other mappings. The chain checks run inside
    /// the repository's write transaction, so concurrent merges cannot
    /// race past them. On success the mapping upsert and its audit
    /// entry commit atomically and the cache entry for `merged_id` is
    /// invalidated.
    pub async fn merge(
        &self,
        canonical_id: DbId,
        merged_id: DbId,
        reason: MergeReason,
        confidence: i16,
        actor: &str,
    ) -> EngineResult<CanonicalMapping> {
        identity::validate_merge_pair(canonical_id, merged_id)?;
        identity::validate_confidence(confidence)?;

        let outcome = IdentityRepo::upsert_with_audit(
            &self.pool,
            &NewMapping {
                merged_id,
                canonical_id,
                reason: reason.as_str().to_string(),
                confidence,
                merged_by: actor.to_string(),
            },
        )
        .await?;

        let mapping = match outcome {
            MergeWriteOutcome::Applied(mapping) => mapping,
            MergeWriteOutcome::CanonicalMergedAway => {
                return Err(CoreError::AlreadyMerged(format!(
                    "Competitor {canonical_id} is itself merged into another identity \
                     and cannot be a canonical target"
                ))
                .into());
            }
            MergeWriteOutcome::MergedIsCanonicalTarget => {
                return Err(CoreError::AlreadyMerged(format!(
                    "Competitor {merged_id} is a canonical target of other mappings; \
                     unmerge those first"
                ))
                .into());
            }
        };

        self.invalidate(merged_id).await;
        tracing::info!(
            merged_id,
            canonical_id,
            reason = reason.as_str(),
            confidence,
            actor,
            "Identity merged"
        );
        Ok(mapping)
    }

    /// Remove the mapping for `merged_id`.
    ///
    /// Returns `false` with no error when no approved mapping existed.
    /// The delete and its audit entry commit atomically.
    pub async fn unmerge(&self, merged_id: DbId, actor: &str) -> EngineResult<bool> {
        let found = IdentityRepo::delete_with_audit(&self.pool, merged_id, actor).await?;
        if found {
            self.invalidate(merged_id).await;
            tracing::info!(merged_id, actor, "Identity unmerged");
        }
        Ok(found)
    }

    /// Drop the cache entry for one identity.
    pub async fn invalidate(&self, competitor_id: DbId) {
        self.cache.write().await.remove(&competitor_id);
    }

    /// Hit/miss counters and current cache size.
    pub async fn cache_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.cache.read().await.len(),
        }
    }
}
