//! Canonical-identity merge constants and validation.
//!
//! Merge reasons, confidence bounds, and pre-write request checks. No
//! database access, pure domain logic consumed by the resolver.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Merge reason constants
// ---------------------------------------------------------------------------

pub const REASON_SAME_LICENSE: &str = "same-license";
pub const REASON_SAME_EXTERNAL_ID: &str = "same-external-id";
pub const REASON_NAME_BIRTH_YEAR: &str = "name-birth-year";
pub const REASON_MANUAL: &str = "manual";
pub const VALID_REASONS: &[&str] = &[
    REASON_SAME_LICENSE,
    REASON_SAME_EXTERNAL_ID,
    REASON_NAME_BIRTH_YEAR,
    REASON_MANUAL,
];

// ---------------------------------------------------------------------------
// Confidence bounds
// ---------------------------------------------------------------------------

pub const MIN_CONFIDENCE: i16 = 0;
pub const MAX_CONFIDENCE: i16 = 100;

// ---------------------------------------------------------------------------
// Merge reason enum
// ---------------------------------------------------------------------------

/// Why two competitor records were judged to be the same person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeReason {
    SameLicense,
    SameExternalId,
    NameBirthYear,
    Manual,
}

impl MergeReason {
    /// The string stored in `canonical_mappings.reason`.
    pub fn as_str(self) -> &'static str {
        match self {
            MergeReason::SameLicense => REASON_SAME_LICENSE,
            MergeReason::SameExternalId => REASON_SAME_EXTERNAL_ID,
            MergeReason::NameBirthYear => REASON_NAME_BIRTH_YEAR,
            MergeReason::Manual => REASON_MANUAL,
        }
    }

    /// Parse a stored reason string back into the enum.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            REASON_SAME_LICENSE => Ok(MergeReason::SameLicense),
            REASON_SAME_EXTERNAL_ID => Ok(MergeReason::SameExternalId),
            REASON_NAME_BIRTH_YEAR => Ok(MergeReason::NameBirthYear),
            REASON_MANUAL => Ok(MergeReason::Manual),
            other => Err(CoreError::Validation(format!(
                "Invalid merge reason '{other}'. Must be one of: {}",
                VALID_REASONS.join(", ")
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

/// Validate that `confidence` is within `[MIN_CONFIDENCE, MAX_CONFIDENCE]`.
pub fn validate_confidence(confidence: i16) -> Result<(), CoreError> {
    if !(MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&confidence) {
        return Err(CoreError::Validation(format!(
            "Confidence must be between {MIN_CONFIDENCE} and {MAX_CONFIDENCE}, got {confidence}"
        )));
    }
    Ok(())
}

/// Reject a self-merge before any write happens.
pub fn validate_merge_pair(canonical_id: DbId, merged_id: DbId) -> Result<(), CoreError> {
    if canonical_id == merged_id {
        return Err(CoreError::InvalidOperation(format!(
            "Cannot merge competitor {merged_id} into itself"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_round_trips_through_string_form() {
        for reason in [
            MergeReason::SameLicense,
            MergeReason::SameExternalId,
            MergeReason::NameBirthYear,
            MergeReason::Manual,
        ] {
            assert_eq!(MergeReason::parse(reason.as_str()).unwrap(), reason);
        }
    }

    #[test]
    fn unknown_reason_is_rejected() {
        assert!(MergeReason::parse("same-club").is_err());
        assert!(MergeReason::parse("").is_err());
    }

    #[test]
    fn confidence_accepts_boundaries() {
        assert!(validate_confidence(0).is_ok());
        assert!(validate_confidence(95).is_ok());
        assert!(validate_confidence(100).is_ok());
    }

    #[test]
    fn confidence_rejects_out_of_range() {
        assert!(validate_confidence(-1).is_err());
        assert!(validate_confidence(101).is_err());
    }

    #[test]
    fn self_merge_is_rejected() {
        assert!(validate_merge_pair(7, 7).is_err());
        assert!(validate_merge_pair(7, 42).is_ok());
    }
}
