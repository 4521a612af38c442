//! BoxMemoryPersistence -- object-safe dynamic dispatch wrapper for MemoryPersistence.
//!
//! Same blanket-impl pattern as `BoxSkill`:
//! 1. Define an object-safe `MemoryPersistenceDyn` trait with boxed futures
//! 2. Blanket-impl `MemoryPersistenceDyn` for all `T: MemoryPersistence`
//! 3. `BoxMemoryPersistence` wraps `Box<dyn MemoryPersistenceDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use cadence_types::error::StoreError;
use cadence_types::memory::{MemorySnapshot, UsageStats};

use super::persistence::MemoryPersistence;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe version of [`MemoryPersistence`] with boxed futures.
pub trait MemoryPersistenceDyn: Send + Sync {
    fn load_snapshot_boxed(&self) -> BoxFuture<'_, Result<Option<MemorySnapshot>, StoreError>>;

    fn save_snapshot_boxed<'a>(
        &'a self,
        snapshot: &'a MemorySnapshot,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    fn load_stats_boxed(&self) -> BoxFuture<'_, Result<Option<UsageStats>, StoreError>>;

    fn save_stats_boxed<'a>(&'a self, stats: &'a UsageStats)
    -> BoxFuture<'a, Result<(), StoreError>>;
}

impl<T: MemoryPersistence> MemoryPersistenceDyn for T {
    fn load_snapshot_boxed(&self) -> BoxFuture<'_, Result<Option<MemorySnapshot>, StoreError>> {
        Box::pin(self.load_snapshot())
    }

    fn save_snapshot_boxed<'a>(
        &'a self,
        snapshot: &'a MemorySnapshot,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(self.save_snapshot(snapshot))
    }

    fn load_stats_boxed(&self) -> BoxFuture<'_, Result<Option<UsageStats>, StoreError>> {
        Box::pin(self.load_stats())
    }

    fn save_stats_boxed<'a>(
        &'a self,
        stats: &'a UsageStats,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(self.save_stats(stats))
    }
}

/// Type-erased persistence backend, selected at runtime (file, in-memory).
pub struct BoxMemoryPersistence {
    inner: Box<dyn MemoryPersistenceDyn + Send + Sync>,
}

impl BoxMemoryPersistence {
    pub fn new<T: MemoryPersistence + 'static>(persistence: T) -> Self {
        Self {
            inner: Box::new(persistence),
        }
    }

    pub async fn load_snapshot(&self) -> Result<Option<MemorySnapshot>, StoreError> {
        self.inner.load_snapshot_boxed().await
    }

    pub async fn save_snapshot(&self, snapshot: &MemorySnapshot) -> Result<(), StoreError> {
        self.inner.save_snapshot_boxed(snapshot).await
    }

    pub async fn load_stats(&self) -> Result<Option<UsageStats>, StoreError> {
        self.inner.load_stats_boxed().await
    }

    pub async fn save_stats(&self, stats: &UsageStats) -> Result<(), StoreError> {
        self.inner.save_stats_boxed(stats).await
    }
}

impl std::fmt::Debug for BoxMemoryPersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxMemoryPersistence").finish_non_exhaustive()
    }
}
