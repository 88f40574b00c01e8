//! Domain error taxonomy shared by the persistence and engine layers.

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Malformed request, rejected before any write (e.g. a self-merge).
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A merge that would create a mapping chain.
    #[error("Already merged: {0}")]
    AlreadyMerged(String),

    /// A failure inside aggregation work; recorded on the owning
    /// run/queue entry, never silently swallowed.
    #[error("Computation failed: {0}")]
    Computation(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}
