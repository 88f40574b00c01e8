//! Orchestration layer for the Velostats aggregation pipeline.
//!
//! Wires the domain logic in `velo-core` and the persistence layer in
//! `velo-db` into the services the worker runs: cached identity
//! resolution, single-flight job execution, stall recovery, queue
//! draining, and snapshot fingerprinting.

pub mod error;
pub mod recalc;
pub mod resolver;
pub mod runner;
pub mod snapshot;
pub mod stall;
pub mod stats;

pub use error::{EngineError, EngineResult};
pub use recalc::RecalcProcessor;
pub use resolver::IdentityResolver;
pub use runner::{JobRunner, RunContext, RunOutcome, SkipReason, WorkReport};
pub use snapshot::SnapshotService;
pub use stall::StallDetector;
pub use stats::{SqlStatProvider, StatProvider};
