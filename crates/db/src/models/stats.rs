//! Season aggregate and race result entity models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use velo_core::types::{DbId, SeasonYear, Timestamp};

/// A row from the `season_stats` aggregate table, keyed by the natural
/// key `(competitor_id, year)`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SeasonStatRow {
    pub id: DbId,
    pub competitor_id: DbId,
    pub year: SeasonYear,
    pub starts: i32,
    pub finishes: i32,
    pub wins: i32,
    pub podiums: i32,
    pub points: f64,
    pub best_rank: Option<i32>,
    pub updated_at: Timestamp,
}

impl SeasonStatRow {
    /// The fingerprint-relevant content of this row (identity, season,
    /// and the derived figures, not the surrogate id or timestamp).
    pub fn fingerprint_value(&self) -> serde_json::Value {
        serde_json::json!({
            "competitor_id": self.competitor_id,
            "year": self.year,
            "starts": self.starts,
            "finishes": self.finishes,
            "wins": self.wins,
            "podiums": self.podiums,
            "points": self.points,
            "best_rank": self.best_rank,
        })
    }
}

/// Computed values for one `(competitor_id, year)` cell, produced by a
/// stat provider and persisted via upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonStatInput {
    pub competitor_id: DbId,
    pub year: SeasonYear,
    pub starts: i32,
    pub finishes: i32,
    pub wins: i32,
    pub podiums: i32,
    pub points: f64,
    pub best_rank: Option<i32>,
}
