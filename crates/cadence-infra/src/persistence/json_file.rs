//! JSON-file implementation of `MemoryPersistence`.
//!
//! Two artifacts live in the memory directory: `index.json` (entries plus
//! both indexes) and `stats.json` (usage statistics). Writes go to a
//! sibling temp file that is then renamed over the target, so a crash
//! mid-write leaves the previous artifact intact.
//!
//! An artifact that exists but cannot be decoded is moved aside with a
//! `.corrupt` suffix and reported as absent, so the store starts empty
//! instead of failing on every restart. Any other I/O failure is returned.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use cadence_core::memory::MemoryPersistence;
use cadence_types::error::StoreError;
use cadence_types::memory::{MemorySnapshot, UsageStats};

/// File name of the index artifact.
pub const INDEX_FILE: &str = "index.json";
/// File name of the usage-statistics artifact.
pub const STATS_FILE: &str = "stats.json";

/// Memory persistence backed by JSON files in a directory.
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    dir: PathBuf,
}

impl JsonFilePersistence {
    /// Create an adapter rooted at `dir`. The directory is created on the
    /// first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    pub fn stats_path(&self) -> PathBuf {
        self.dir.join(STATS_FILE)
    }

    async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>, StoreError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::Io(err)),
        };

        match serde_json::from_slice::<T>(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                let aside = corrupt_path(path);
                tracing::warn!(
                    path = %path.display(),
                    moved_to = %aside.display(),
                    error = %err,
                    "memory artifact is unreadable, starting without it"
                );
                if let Err(rename_err) = tokio::fs::rename(path, &aside).await {
                    tracing::warn!(
                        path = %path.display(),
                        error = %rename_err,
                        "failed to move unreadable artifact aside"
                    );
                }
                Ok(None)
            }
        }
    }

    async fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(value)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

impl MemoryPersistence for JsonFilePersistence {
    async fn load_snapshot(&self) -> Result<Option<MemorySnapshot>, StoreError> {
        self.read_json(&self.index_path()).await
    }

    async fn save_snapshot(&self, snapshot: &MemorySnapshot) -> Result<(), StoreError> {
        self.write_json(&self.index_path(), snapshot).await
    }

    async fn load_stats(&self) -> Result<Option<UsageStats>, StoreError> {
        self.read_json(&self.stats_path()).await
    }

    async fn save_stats(&self, stats: &UsageStats) -> Result<(), StoreError> {
        self.write_json(&self.stats_path(), stats).await
    }
}

fn corrupt_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".corrupt");
    path.with_file_name(name)
}
