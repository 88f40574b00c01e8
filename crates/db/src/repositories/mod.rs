//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod audit_repo;
pub mod identity_repo;
pub mod job_run_repo;
pub mod recalc_queue_repo;
pub mod season_stat_repo;
pub mod snapshot_repo;

pub use audit_repo::AuditRepo;
pub use identity_repo::IdentityRepo;
pub use job_run_repo::JobRunRepo;
pub use recalc_queue_repo::RecalcQueueRepo;
pub use season_stat_repo::SeasonStatRepo;
pub use snapshot_repo::SnapshotRepo;
