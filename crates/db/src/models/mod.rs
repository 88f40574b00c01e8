//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts where one is needed

pub mod audit;
pub mod identity;
pub mod job_run;
pub mod recalc;
pub mod snapshot;
pub mod stats;
pub mod status;
