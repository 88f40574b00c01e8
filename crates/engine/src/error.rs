//! Engine-level error type.

use velo_core::error::CoreError;

/// Error type for engine services.
///
/// Wraps [`CoreError`] for domain errors and `sqlx::Error` for
/// persistence failures.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A domain-level error from `velo-core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Convenience type alias for engine return values.
pub type EngineResult<T> = Result<T, EngineError>;
