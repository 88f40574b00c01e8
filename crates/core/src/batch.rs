//! Batch result aggregation for queue-draining loops.
//!
//! Instead of letting per-entry failures escape a loop, workers record
//! each entry's `(result, error)` outcome here and report a single
//! summary at the end of the batch.

use serde::Serialize;

/// Counts produced by one pass over a batch of recalculation entries.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    /// Entries claimed at the start of the pass.
    pub claimed: usize,
    /// Entries that reached the completed state.
    pub completed: usize,
    /// Entries that reached the failed state.
    pub failed: usize,
    /// Aggregate rows upserted across all completed entries.
    pub rows_affected: i64,
}

impl BatchSummary {
    pub fn new(claimed: usize) -> Self {
        Self {
            claimed,
            ..Self::default()
        }
    }

    /// Record a completed entry and the rows it touched.
    pub fn record_success(&mut self, rows: i64) {
        self.completed += 1;
        self.rows_affected += rows;
    }

    /// Record a failed entry. The batch keeps going.
    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    /// True when the claim returned nothing to do.
    pub fn is_empty(&self) -> bool {
        self.claimed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_mixed_outcomes() {
        let mut summary = BatchSummary::new(3);
        summary.record_success(4);
        summary.record_success(2);
        summary.record_failure();

        assert_eq!(summary.claimed, 3);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.rows_affected, 6);
        assert!(!summary.is_empty());
    }

    #[test]
    fn empty_claim_is_empty() {
        assert!(BatchSummary::new(0).is_empty());
    }
}
