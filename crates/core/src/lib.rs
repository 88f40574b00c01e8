//! Pure domain logic for the Velostats aggregation pipeline.
//!
//! This crate has zero internal dependencies so it can be used by the
//! persistence layer, the engine, and any future CLI tooling alike.
//! Nothing in here touches the database.

pub mod batch;
pub mod error;
pub mod fingerprint;
pub mod hashing;
pub mod identity;
pub mod types;
