//! Durable storage adapters for the memory store.

pub mod json_file;

pub use json_file::JsonFilePersistence;
