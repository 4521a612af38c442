//! Infrastructure layer for Cadence.
//!
//! Contains implementations of the ports defined in `cadence-core`: the
//! JSON-file memory persistence, the `config.toml` loader, data directory
//! resolution, and the built-in skills registered by the binary.

pub mod config;
pub mod filesystem;
pub mod persistence;
pub mod skills;
