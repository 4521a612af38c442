//! Data directory layout for Cadence.
//!
//! ```text
//! {data_dir}/
//!   config.toml
//!   memory/
//!     index.json        entries plus tag and keyword indexes
//!     stats.json        usage statistics
//! ```

use std::path::{Path, PathBuf};

use cadence_types::config::RuntimeConfig;

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `CADENCE_DATA_DIR` environment variable
/// 2. `~/.cadence` in the user's home directory
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CADENCE_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".cadence");
    }

    // Last resort: current directory
    PathBuf::from(".cadence")
}

/// Directory holding the memory artifacts.
///
/// `data_dir` in the configuration file relocates the storage while the
/// configuration itself stays where it was found.
pub fn memory_dir(data_dir: &Path, config: &RuntimeConfig) -> PathBuf {
    config
        .data_dir
        .as_deref()
        .unwrap_or(data_dir)
        .join("memory")
}
