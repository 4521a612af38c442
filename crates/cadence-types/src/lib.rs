//! Shared domain types for Cadence.
//!
//! This crate contains the core domain types used across the Cadence runtime:
//! memory entries and queries, skill metadata and results, runtime
//! configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod memory;
pub mod skill;
