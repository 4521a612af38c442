//! MemoryPersistence trait definition.
//!
//! The durable layout is two artifacts: the index artifact (entries plus
//! both derived indexes) and the usage-statistics artifact. Implementations
//! live in cadence-infra (e.g., `JsonFilePersistence`); an in-process
//! implementation is provided here for tests and ephemeral runtimes.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use cadence_types::error::StoreError;
use cadence_types::memory::{MemorySnapshot, UsageStats};

/// Port for the memory store's durable storage.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait MemoryPersistence: Send + Sync {
    /// Load the index artifact.
    ///
    /// Returns `Ok(None)` when no artifact exists or when it could not be
    /// decoded; the store then starts empty. Errors are reserved for
    /// failures that make the storage location itself unusable.
    fn load_snapshot(
        &self,
    ) -> impl std::future::Future<Output = Result<Option<MemorySnapshot>, StoreError>> + Send;

    /// Replace the index artifact.
    fn save_snapshot(
        &self,
        snapshot: &MemorySnapshot,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Load the usage-statistics artifact (`None` if absent or unreadable).
    fn load_stats(
        &self,
    ) -> impl std::future::Future<Output = Result<Option<UsageStats>, StoreError>> + Send;

    /// Replace the usage-statistics artifact.
    fn save_stats(
        &self,
        stats: &UsageStats,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}

impl<T: MemoryPersistence> MemoryPersistence for std::sync::Arc<T> {
    fn load_snapshot(
        &self,
    ) -> impl std::future::Future<Output = Result<Option<MemorySnapshot>, StoreError>> + Send {
        (**self).load_snapshot()
    }

    fn save_snapshot(
        &self,
        snapshot: &MemorySnapshot,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send {
        (**self).save_snapshot(snapshot)
    }

    fn load_stats(
        &self,
    ) -> impl std::future::Future<Output = Result<Option<UsageStats>, StoreError>> + Send {
        (**self).load_stats()
    }

    fn save_stats(
        &self,
        stats: &UsageStats,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send {
        (**self).save_stats(stats)
    }
}

/// Persistence that keeps the artifacts in process memory.
///
/// Useful for tests and for runtimes that accept losing memory on exit.
/// Writes can be made to fail on demand to exercise I/O error handling.
#[derive(Debug, Default)]
pub struct InMemoryPersistence {
    snapshot: Mutex<Option<MemorySnapshot>>,
    stats: Mutex<Option<UsageStats>>,
    fail_writes: AtomicBool,
    snapshot_writes: AtomicUsize,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the artifacts, as if a previous process had written them.
    pub fn with_state(snapshot: Option<MemorySnapshot>, stats: Option<UsageStats>) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            stats: Mutex::new(stats),
            ..Self::default()
        }
    }

    /// Make every subsequent save fail with an I/O error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful index artifact writes.
    pub fn snapshot_writes(&self) -> usize {
        self.snapshot_writes.load(Ordering::SeqCst)
    }

    /// The last index artifact written.
    pub fn snapshot(&self) -> Option<MemorySnapshot> {
        lock(&self.snapshot).clone()
    }

    /// The last statistics artifact written.
    pub fn stats(&self) -> Option<UsageStats> {
        lock(&self.stats).clone()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other(
                "in-memory persistence configured to fail",
            )));
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryPersistence for InMemoryPersistence {
    async fn load_snapshot(&self) -> Result<Option<MemorySnapshot>, StoreError> {
        Ok(lock(&self.snapshot).clone())
    }

    async fn save_snapshot(&self, snapshot: &MemorySnapshot) -> Result<(), StoreError> {
        self.check_writable()?;
        *lock(&self.snapshot) = Some(snapshot.clone());
        self.snapshot_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load_stats(&self) -> Result<Option<UsageStats>, StoreError> {
        Ok(lock(&self.stats).clone())
    }

    async fn save_stats(&self, stats: &UsageStats) -> Result<(), StoreError> {
        self.check_writable()?;
        *lock(&self.stats) = Some(stats.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_roundtrip() {
        let persistence = InMemoryPersistence::new();
        assert!(persistence.load_snapshot().await.unwrap().is_none());

        let snapshot = MemorySnapshot {
            version: 1,
            ..MemorySnapshot::default()
        };
        persistence.save_snapshot(&snapshot).await.unwrap();
        assert_eq!(persistence.snapshot_writes(), 1);
        assert_eq!(persistence.load_snapshot().await.unwrap().unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_fail_writes() {
        let persistence = InMemoryPersistence::new();
        persistence.set_fail_writes(true);
        let err = persistence
            .save_stats(&UsageStats::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
        assert!(persistence.stats().is_none());
    }
}
