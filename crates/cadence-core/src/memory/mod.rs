//! Long-term memory for skills.
//!
//! `MemoryStore` keeps the live entry set in memory, maintains the tag and
//! keyword indexes synchronously with every mutation, runs the periodic
//! eviction pass, and persists through a `MemoryPersistence` port.

pub mod box_persistence;
pub mod eviction;
pub mod index;
pub mod persistence;
pub mod store;

pub use box_persistence::BoxMemoryPersistence;
pub use persistence::{InMemoryPersistence, MemoryPersistence};
pub use store::MemoryStore;
