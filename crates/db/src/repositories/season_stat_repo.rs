//! Repository for the `season_stats` aggregate table.
//!
//! The table is mutated only via upsert on the natural key
//! `(competitor_id, year)`, so recomputing a cell is idempotent and
//! concurrent writers resolve by last-write-wins.

use sqlx::PgPool;
use velo_core::types::{DbId, SeasonYear, Timestamp};

use crate::models::stats::{SeasonStatInput, SeasonStatRow};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "\
    id, competitor_id, year, starts, finishes, wins, podiums, \
    points, best_rank, updated_at";

/// Provides upsert and query operations for per-season aggregates.
pub struct SeasonStatRepo;

impl SeasonStatRepo {
    /// Upsert one `(competitor_id, year)` cell.
    pub async fn upsert(
        pool: &PgPool,
        input: &SeasonStatInput,
    ) -> Result<SeasonStatRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO season_stats \
                 (competitor_id, year, starts, finishes, wins, podiums, points, best_rank) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (competitor_id, year) DO UPDATE SET \
                 starts     = EXCLUDED.starts, \
                 finishes   = EXCLUDED.finishes, \
                 wins       = EXCLUDED.wins, \
                 podiums    = EXCLUDED.podiums, \
                 points     = EXCLUDED.points, \
                 best_rank  = EXCLUDED.best_rank, \
                 updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SeasonStatRow>(&query)
            .bind(input.competitor_id)
            .bind(input.year)
            .bind(input.starts)
            .bind(input.finishes)
            .bind(input.wins)
            .bind(input.podiums)
            .bind(input.points)
            .bind(input.best_rank)
            .fetch_one(pool)
            .await
    }

    /// Find the aggregate cell for one competitor season.
    pub async fn find(
        pool: &PgPool,
        competitor_id: DbId,
        year: SeasonYear,
    ) -> Result<Option<SeasonStatRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM season_stats \
             WHERE competitor_id = $1 AND year = $2"
        );
        sqlx::query_as::<_, SeasonStatRow>(&query)
            .bind(competitor_id)
            .bind(year)
            .fetch_optional(pool)
            .await
    }

    /// All aggregate rows in stable `(competitor_id, year)` order.
    ///
    /// The stable ordering is what makes the snapshot fingerprint
    /// deterministic across reads.
    pub async fn all_ordered(pool: &PgPool) -> Result<Vec<SeasonStatRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM season_stats \
             ORDER BY competitor_id ASC, year ASC"
        );
        sqlx::query_as::<_, SeasonStatRow>(&query)
            .fetch_all(pool)
            .await
    }

    /// Delete a competitor's aggregate rows for the given years.
    ///
    /// Used after a merge so a merged-away identity's seasons do not
    /// linger alongside the canonical identity's recomputed rows.
    pub async fn delete_for_years(
        pool: &PgPool,
        competitor_id: DbId,
        years: &[SeasonYear],
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM season_stats \
             WHERE competitor_id = $1 AND year = ANY($2)",
        )
        .bind(competitor_id)
        .bind(years)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Maximum `updated_at` across the aggregate table, if any rows exist.
    pub async fn max_updated_at(pool: &PgPool) -> Result<Option<Timestamp>, sqlx::Error> {
        let row: (Option<Timestamp>,) =
            sqlx::query_as("SELECT MAX(updated_at) FROM season_stats")
                .fetch_one(pool)
                .await?;
        Ok(row.0)
    }
}
