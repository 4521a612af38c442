//! Business logic for Cadence.
//!
//! This crate owns the two tightly coupled subsystems of the runtime: the
//! memory store (indexed, self-pruning long-term state) and the skill
//! manager (dependency-ordered lifecycle, bounded-concurrency execution,
//! queued/background modes, and the recurring scheduler). It defines the
//! `MemoryPersistence` port that `cadence-infra` implements and never
//! touches the filesystem itself.

pub mod memory;
pub mod skill;
