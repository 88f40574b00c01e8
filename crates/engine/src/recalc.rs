//! Recalculation queue draining.
//!
//! Merges are retroactive: a competitor merged today may own results
//! going back years. Each queue entry names exactly the identities and
//! years a mutation invalidated; the processor recomputes only those
//! cells, upserting on the natural key so reruns are idempotent.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use sqlx::PgPool;
use velo_core::batch::BatchSummary;
use velo_db::models::recalc::RecalcQueueEntry;
use velo_db::repositories::{RecalcQueueRepo, SeasonStatRepo};

use crate::error::EngineResult;
use crate::resolver::IdentityResolver;
use crate::runner::RunContext;
use crate::stats::StatProvider;

/// Outcome of recomputing one claimed queue entry.
struct EntryResult {
    rows_affected: i64,
    execution_time_ms: i64,
}

/// Claims and drains recalculation queue entries.
pub struct RecalcProcessor<P: StatProvider> {
    pool: PgPool,
    resolver: Arc<IdentityResolver>,
    provider: P,
}

impl<P: StatProvider> RecalcProcessor<P> {
    pub fn new(pool: PgPool, resolver: Arc<IdentityResolver>, provider: P) -> Self {
        Self {
            pool,
            resolver,
            provider,
        }
    }

    /// Claim up to `max_jobs` pending entries and process each.
    ///
    /// One entry's failure is recorded on that entry and never aborts
    /// its siblings. Heartbeats between entries keep the owning ledger
    /// row alive during long batches.
    pub async fn process_batch(
        &self,
        ctx: &RunContext,
        max_jobs: i64,
    ) -> EngineResult<BatchSummary> {
        let entries = RecalcQueueRepo::claim_next(&self.pool, max_jobs).await?;
        let mut summary = BatchSummary::new(entries.len());

        for entry in &entries {
            match self.process_entry(entry).await {
                Ok(result) => {
                    RecalcQueueRepo::mark_completed(
                        &self.pool,
                        entry.id,
                        result.rows_affected,
                        result.execution_time_ms,
                    )
                    .await?;
                    summary.record_success(result.rows_affected);
                    tracing::info!(
                        entry_id = entry.id,
                        rows_affected = result.rows_affected,
                        execution_time_ms = result.execution_time_ms,
                        "Recalc entry completed"
                    );
                }
                Err(err) => {
                    RecalcQueueRepo::mark_failed(&self.pool, entry.id, &err.to_string())
                        .await?;
                    summary.record_failure();
                    tracing::error!(
                        entry_id = entry.id,
                        error = %err,
                        "Recalc entry failed"
                    );
                }
            }
            ctx.heartbeat().await?;
        }

        Ok(summary)
    }

    /// Recompute the entry's `(identity, year)` cross-product.
    ///
    /// Identities are resolved first and the resolved pairs
    /// deduplicated, so merging 42 into 7 with both listed recomputes
    /// competitor 7 once per year. Rows previously owned by a
    /// merged-away identity are deleted for the affected years.
    async fn process_entry(&self, entry: &RecalcQueueEntry) -> EngineResult<EntryResult> {
        let started = Instant::now();
        let mut rows_affected: i64 = 0;

        let mut cells: BTreeSet<(i64, i32)> = BTreeSet::new();
        for &competitor_id in &entry.competitor_ids {
            let canonical = self.resolver.resolve(competitor_id).await?;
            if canonical != competitor_id {
                rows_affected += SeasonStatRepo::delete_for_years(
                    &self.pool,
                    competitor_id,
                    &entry.years,
                )
                .await? as i64;
            }
            for &year in &entry.years {
                cells.insert((canonical, year));
            }
        }

        for (competitor_id, year) in cells {
            match self.provider.compute(competitor_id, year).await? {
                Some(input) => {
                    SeasonStatRepo::upsert(&self.pool, &input).await?;
                    rows_affected += 1;
                }
                None => {
                    // No results for this season; clear any stale cell.
                    rows_affected += SeasonStatRepo::delete_for_years(
                        &self.pool,
                        competitor_id,
                        &[year],
                    )
                    .await? as i64;
                }
            }
        }

        Ok(EntryResult {
            rows_affected,
            execution_time_ms: started.elapsed().as_millis() as i64,
        })
    }
}
