//! Stat provider seam and the built-in SQL implementation.
//!
//! The aggregation formula is an opaque callback from the pipeline's
//! point of view: `(competitor_id, year)` in, an optional stat row out.
//! Richer formula providers (churn heuristics, cohort bucketing) plug
//! in behind the same trait.

use async_trait::async_trait;
use sqlx::PgPool;
use velo_core::error::CoreError;
use velo_core::types::{DbId, SeasonYear};
use velo_db::models::stats::SeasonStatInput;
use velo_db::repositories::IdentityRepo;

/// Computes one `(competitor_id, year)` aggregate cell.
///
/// `competitor_id` is always a canonical identity: callers resolve
/// before invoking the provider. Returns `None` when the competitor has
/// no results for that season.
#[async_trait]
pub trait StatProvider: Send + Sync {
    async fn compute(
        &self,
        competitor_id: DbId,
        year: SeasonYear,
    ) -> Result<Option<SeasonStatInput>, CoreError>;
}

/// Built-in provider aggregating `race_results` in SQL.
///
/// Results recorded under identities merged into the canonical one are
/// counted toward the canonical identity, so a merge retroactively
/// reassigns history.
pub struct SqlStatProvider {
    pool: PgPool,
}

/// Raw aggregate row shape returned by the provider query.
#[derive(sqlx::FromRow)]
struct AggregateRow {
    starts: i64,
    finishes: i64,
    wins: i64,
    podiums: i64,
    points: f64,
    best_rank: Option<i32>,
}

impl SqlStatProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatProvider for SqlStatProvider {
    async fn compute(
        &self,
        competitor_id: DbId,
        year: SeasonYear,
    ) -> Result<Option<SeasonStatInput>, CoreError> {
        // Everything merged into this canonical identity counts too.
        let mut ids = IdentityRepo::merged_ids_for(&self.pool, competitor_id)
            .await
            .map_err(|e| CoreError::Computation(e.to_string()))?;
        ids.push(competitor_id);

        let row: AggregateRow = sqlx::query_as(
            "SELECT \
                COUNT(*) FILTER (WHERE status <> 'dns')            AS starts, \
                COUNT(*) FILTER (WHERE status = 'finished')        AS finishes, \
                COUNT(*) FILTER (WHERE rank = 1)                   AS wins, \
                COUNT(*) FILTER (WHERE rank <= 3)                  AS podiums, \
                COALESCE(SUM(points), 0)                           AS points, \
                MIN(rank)                                          AS best_rank \
             FROM race_results \
             WHERE competitor_id = ANY($1) AND year = $2",
        )
        .bind(&ids)
        .bind(year)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CoreError::Computation(e.to_string()))?;

        if row.starts == 0 {
            return Ok(None);
        }

        Ok(Some(SeasonStatInput {
            competitor_id,
            year,
            starts: row.starts as i32,
            finishes: row.finishes as i32,
            wins: row.wins as i32,
            podiums: row.podiums as i32,
            points: row.points,
            best_rank: row.best_rank,
        }))
    }
}
