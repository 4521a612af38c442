//! The memory store.
//!
//! Owns the live entry set and both derived indexes behind a single lock
//! that is never held across an `.await`, so every mutation runs to
//! completion atomically. Persistence happens after the lock is released:
//! a flush snapshots the state under the lock, then writes it through the
//! `MemoryPersistence` port. Flushes are serialized and tagged with a
//! generation number so an older snapshot never overwrites a newer one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use cadence_types::config::MemoryConfig;
use cadence_types::error::StoreError;
use cadence_types::memory::{
    CleanupReport, MemoryEntry, MemoryQuery, MemorySnapshot, MemoryUpdate, NewMemory,
    SNAPSHOT_VERSION, SortBy, UsageStats, clamp_importance,
};

use super::box_persistence::BoxMemoryPersistence;
use super::eviction::{EvictionPolicy, plan_eviction};
use super::index::MemoryIndexes;

struct StoreState {
    entries: HashMap<String, MemoryEntry>,
    indexes: MemoryIndexes,
    stats: UsageStats,
    /// Bumped on every change, including access bumps.
    generation: u64,
    /// Mutating calls since the last successful flush.
    unflushed: u32,
}

impl StoreState {
    fn mutated(&mut self) {
        self.generation += 1;
        self.unflushed = self.unflushed.saturating_add(1);
    }

    fn remove(&mut self, id: &str) -> Option<MemoryEntry> {
        let entry = self.entries.remove(id)?;
        self.indexes.remove(&entry);
        Some(entry)
    }

    fn snapshot(&self, now: DateTime<Utc>) -> MemorySnapshot {
        let mut entries: Vec<MemoryEntry> = self.entries.values().cloned().collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        MemorySnapshot {
            version: SNAPSHOT_VERSION,
            entries,
            tag_index: self.indexes.tags.to_sorted(),
            keyword_index: self.indexes.keywords.to_sorted(),
            saved_at: Some(now),
        }
    }
}

/// Durable, indexed, self-pruning key/value store of [`MemoryEntry`] values.
///
/// Construct with [`MemoryStore::open`] and share as `Arc<MemoryStore>`.
pub struct MemoryStore {
    config: MemoryConfig,
    state: Mutex<StoreState>,
    persistence: BoxMemoryPersistence,
    /// Generation last written to durable storage.
    flush_lock: tokio::sync::Mutex<u64>,
    sequence: AtomicU64,
    cancel: CancellationToken,
    cleanup_task: Mutex<Option<JoinHandle<()>>>,
}

impl MemoryStore {
    /// Load persisted state and build the in-memory entry set and indexes.
    ///
    /// An absent or undecodable artifact yields an empty store. Only a
    /// storage location that cannot be read at all is an error.
    pub async fn open(
        config: MemoryConfig,
        persistence: BoxMemoryPersistence,
    ) -> Result<Arc<Self>, StoreError> {
        let snapshot = persistence.load_snapshot().await?;
        let mut stats = persistence.load_stats().await?.unwrap_or_default();

        let entries: HashMap<String, MemoryEntry> = match snapshot {
            Some(snapshot) => {
                if snapshot.version != SNAPSHOT_VERSION {
                    tracing::warn!(
                        version = snapshot.version,
                        expected = SNAPSHOT_VERSION,
                        "memory index artifact has an unexpected version, loading anyway"
                    );
                }
                snapshot
                    .entries
                    .into_iter()
                    .map(|mut entry| {
                        entry.importance = clamp_importance(i32::from(entry.importance));
                        (entry.id.clone(), entry)
                    })
                    .collect()
            }
            None => {
                tracing::info!("no memory index artifact found, starting empty");
                HashMap::new()
            }
        };

        let indexes = MemoryIndexes::rebuild(config.keyword_tokens, entries.values());
        stats.total_entries = stats.total_entries.max(entries.len() as u64);

        tracing::info!(
            entries = entries.len(),
            tags = indexes.tags.tag_count(),
            keywords = indexes.keywords.keyword_count(),
            "memory store loaded"
        );

        Ok(Arc::new(Self {
            config,
            state: Mutex::new(StoreState {
                entries,
                indexes,
                stats,
                generation: 0,
                unflushed: 0,
            }),
            persistence,
            flush_lock: tokio::sync::Mutex::new(0),
            sequence: AtomicU64::new(0),
            cancel: CancellationToken::new(),
            cleanup_task: Mutex::new(None),
        }))
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // -----------------------------------------------------------------------
    // CRUD
    // -----------------------------------------------------------------------

    /// Create an entry and return its id.
    pub async fn store(&self, memory: NewMemory) -> String {
        let now = Utc::now();
        let id = {
            let mut state = self.lock();
            let mut id = self.generate_id(&memory.content, now);
            while state.entries.contains_key(&id) {
                id = self.generate_id(&memory.content, now);
            }

            let entry = MemoryEntry {
                id: id.clone(),
                content: memory.content,
                tags: normalize_tags(memory.tags),
                importance: clamp_importance(memory.importance),
                created_at: now,
                updated_at: now,
                last_accessed: now,
                access_count: 0,
                source: memory.source,
                metadata: memory.metadata,
            };

            state.indexes.add(&entry);
            state.entries.insert(id.clone(), entry);
            state.stats.total_entries += 1;
            state.mutated();
            id
        };

        tracing::debug!(memory_id = %id, "memory stored");
        self.maybe_flush().await;
        id
    }

    /// Fetch a single entry, counting it as an access.
    pub fn get(&self, id: &str) -> Option<MemoryEntry> {
        let now = Utc::now();
        let mut state = self.lock();
        let entry = state.entries.get_mut(id)?;
        entry.touch(now);
        let found = entry.clone();
        state.stats.total_accesses += 1;
        state.generation += 1;
        Some(found)
    }

    /// Whether an entry with `id` is live. Does not count as an access.
    pub fn contains(&self, id: &str) -> bool {
        self.lock().entries.contains_key(id)
    }

    /// Filter, sort, and return the top `query.limit` entries.
    ///
    /// Returned entries have their access statistics bumped, since usage
    /// drives eviction.
    pub fn query(&self, query: &MemoryQuery) -> Vec<MemoryEntry> {
        let now = Utc::now();
        let keywords: Vec<String> = query
            .keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        let mut state = self.lock();
        let mut matches: Vec<&MemoryEntry> = state
            .entries
            .values()
            .filter(|entry| matches_query(entry, query, &keywords))
            .collect();

        sort_entries(&mut matches, query.sort_by);
        let ids: Vec<String> = matches
            .into_iter()
            .take(query.limit)
            .map(|entry| entry.id.clone())
            .collect();

        let mut results = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(entry) = state.entries.get_mut(id) {
                entry.touch(now);
                results.push(entry.clone());
            }
        }
        if !results.is_empty() {
            state.stats.total_accesses += results.len() as u64;
            state.generation += 1;
        }
        results
    }

    /// Apply a partial update. Returns `false` if `id` is not live.
    pub async fn update(&self, id: &str, update: MemoryUpdate) -> bool {
        let now = Utc::now();
        {
            let mut state = self.lock();
            let Some(previous) = state.entries.get(id).cloned() else {
                return false;
            };

            let mut entry = previous.clone();
            if let Some(content) = update.content {
                entry.content = content;
            }
            if let Some(tags) = update.tags {
                entry.tags = normalize_tags(tags);
            }
            if let Some(importance) = update.importance {
                entry.importance = clamp_importance(importance);
            }
            entry.updated_at = now;

            state.indexes.remove(&previous);
            state.indexes.add(&entry);
            state.entries.insert(id.to_string(), entry);
            state.mutated();
        }

        tracing::debug!(memory_id = %id, "memory updated");
        self.maybe_flush().await;
        true
    }

    /// Remove an entry. Returns `false` if it was not live.
    pub async fn delete(&self, id: &str) -> bool {
        let removed = {
            let mut state = self.lock();
            let removed = state.remove(id).is_some();
            if removed {
                state.mutated();
            }
            removed
        };

        if removed {
            tracing::debug!(memory_id = %id, "memory deleted");
            self.maybe_flush().await;
        }
        removed
    }

    // -----------------------------------------------------------------------
    // Index lookups and statistics
    // -----------------------------------------------------------------------

    pub fn ids_for_tag(&self, tag: &str) -> Vec<String> {
        self.lock().indexes.tags.ids(tag)
    }

    pub fn ids_for_keyword(&self, keyword: &str) -> Vec<String> {
        self.lock().indexes.keywords.ids(keyword)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> UsageStats {
        self.lock().stats.clone()
    }

    // -----------------------------------------------------------------------
    // Eviction
    // -----------------------------------------------------------------------

    /// Run one eviction pass now.
    pub async fn cleanup(&self) -> CleanupReport {
        self.cleanup_at(Utc::now()).await
    }

    /// Run one eviction pass as if the current time were `now`.
    pub async fn cleanup_at(&self, now: DateTime<Utc>) -> CleanupReport {
        let policy = EvictionPolicy::from(&self.config);
        let report = {
            let mut state = self.lock();
            let plan = plan_eviction(state.entries.values(), &policy, now);
            for id in plan.ids() {
                state.remove(id);
            }

            let report = CleanupReport {
                stale_deleted: plan.stale.len(),
                cap_deleted: plan.over_cap.len(),
                remaining: state.entries.len(),
                ran_at: now,
            };
            state.stats.last_cleanup = Some(now);
            state.stats.cleanup_count += 1;
            state.stats.last_cleanup_deleted = report.total_deleted() as u64;
            state.mutated();
            report
        };

        tracing::info!(
            stale_deleted = report.stale_deleted,
            cap_deleted = report.cap_deleted,
            remaining = report.remaining,
            "memory cleanup pass complete"
        );

        if let Err(err) = self.flush().await {
            tracing::warn!(error = %err, "failed to persist memory after cleanup");
        }
        report
    }

    /// Start the periodic eviction loop.
    ///
    /// The first pass is delayed by whatever remains of the interval since
    /// the last persisted cleanup, so restarts do not re-run a redundant pass.
    pub fn spawn_cleanup_loop(self: &Arc<Self>) {
        let interval = self.config.cleanup_interval();
        let first_delay = first_cleanup_delay(self.stats().last_cleanup, interval, Utc::now());
        let store: Weak<MemoryStore> = Arc::downgrade(self);
        let cancel = self.cancel.clone();

        tracing::info!(
            first_in_secs = first_delay.as_secs(),
            interval_secs = interval.as_secs(),
            "memory cleanup loop started"
        );

        let handle = tokio::spawn(async move {
            let mut delay = first_delay;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
                let Some(store) = store.upgrade() else {
                    break;
                };
                store.cleanup().await;
                delay = interval;
            }
            tracing::debug!("memory cleanup loop stopped");
        });

        let previous = self
            .cleanup_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Persist the current state if anything changed since the last flush.
    pub async fn flush(&self) -> Result<(), StoreError> {
        let mut persisted = self.flush_lock.lock().await;
        let (snapshot, stats, generation) = {
            let state = self.lock();
            if state.generation == *persisted {
                return Ok(());
            }
            (state.snapshot(Utc::now()), state.stats.clone(), state.generation)
        };

        self.persistence.save_snapshot(&snapshot).await?;
        self.persistence.save_stats(&stats).await?;
        *persisted = generation;

        let mut state = self.lock();
        if state.generation == generation {
            state.unflushed = 0;
        }
        tracing::trace!(generation, entries = snapshot.entries.len(), "memory flushed");
        Ok(())
    }

    async fn maybe_flush(&self) {
        let due = self.lock().unflushed >= self.config.flush_every.max(1);
        if !due {
            return;
        }
        if let Err(err) = self.flush().await {
            tracing::warn!(
                error = %err,
                "memory flush failed, in-memory state remains authoritative"
            );
        }
    }

    /// Stop the cleanup loop and persist outstanding changes.
    pub async fn shutdown(&self) -> Result<(), StoreError> {
        self.cancel.cancel();
        let handle = self
            .cleanup_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.flush().await
    }

    fn generate_id(&self, content: &str, now: DateTime<Utc>) -> String {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        hasher.update(now.timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
        hasher.update(sequence.to_le_bytes());
        hasher.finalize()[..8]
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.len())
            .field("config", &self.config)
            .finish()
    }
}

fn normalize_tags(tags: Vec<String>) -> std::collections::BTreeSet<String> {
    tags.into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}

fn matches_query(entry: &MemoryEntry, query: &MemoryQuery, keywords: &[String]) -> bool {
    if let Some(floor) = query.min_importance {
        if entry.importance < floor {
            return false;
        }
    }
    if !query.tags.is_empty() && !query.tags.iter().any(|tag| entry.has_tag(tag)) {
        return false;
    }
    if let Some(range) = &query.date_range {
        if !range.contains(entry.created_at) {
            return false;
        }
    }
    if !keywords.is_empty() {
        let content = entry.content.to_lowercase();
        if !keywords.iter().any(|keyword| content.contains(keyword.as_str())) {
            return false;
        }
    }
    true
}

fn sort_entries(entries: &mut [&MemoryEntry], sort_by: SortBy) {
    match sort_by {
        SortBy::Recency => entries.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        }),
        SortBy::Importance => entries.sort_by(|a, b| {
            b.importance
                .cmp(&a.importance)
                .then(b.created_at.cmp(&a.created_at))
                .then_with(|| a.id.cmp(&b.id))
        }),
        SortBy::AccessCount => entries.sort_by(|a, b| {
            b.access_count
                .cmp(&a.access_count)
                .then(b.created_at.cmp(&a.created_at))
                .then_with(|| a.id.cmp(&b.id))
        }),
        SortBy::Relevance => entries.sort_by(|a, b| {
            (b.importance, b.access_count, b.created_at)
                .cmp(&(a.importance, a.access_count, a.created_at))
                .then_with(|| a.id.cmp(&b.id))
        }),
    }
}

fn first_cleanup_delay(
    last_cleanup: Option<DateTime<Utc>>,
    interval: Duration,
    now: DateTime<Utc>,
) -> Duration {
    match last_cleanup {
        Some(last) => {
            let elapsed = (now - last).to_std().unwrap_or_default();
            interval.saturating_sub(elapsed)
        }
        None => Duration::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::memory::persistence::InMemoryPersistence;

    async fn open_store(config: MemoryConfig) -> (Arc<MemoryStore>, Arc<InMemoryPersistence>) {
        let persistence = Arc::new(InMemoryPersistence::new());
        let store = MemoryStore::open(config, BoxMemoryPersistence::new(persistence.clone()))
            .await
            .unwrap();
        (store, persistence)
    }

    #[tokio::test]
    async fn test_store_then_query_by_tag_and_keyword() {
        let (store, _) = open_store(MemoryConfig::default()).await;
        let id = store
            .store(NewMemory::new("The deploy finished at noon").tag("ops"))
            .await;

        let by_tag = store.query(&MemoryQuery::new().tag("ops"));
        assert_eq!(by_tag.len(), 1);
        assert_eq!(by_tag[0].id, id);

        let by_keyword = store.query(&MemoryQuery::new().keyword("DEPLOY"));
        assert_eq!(by_keyword[0].id, id);

        assert!(store.query(&MemoryQuery::new().keyword("rollback")).is_empty());
    }

    #[tokio::test]
    async fn test_ids_are_unique_for_identical_content() {
        let (store, _) = open_store(MemoryConfig::default()).await;
        let a = store.store(NewMemory::new("same")).await;
        let b = store.store(NewMemory::new("same")).await;
        assert_ne!(a, b);
        assert_eq!(a.len(), 16);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_importance_is_clamped_on_store_and_update() {
        let (store, _) = open_store(MemoryConfig::default()).await;
        let id = store.store(NewMemory::new("x").importance(99)).await;
        assert_eq!(store.get(&id).unwrap().importance, 10);

        for (input, expected) in [(-5, 1), (0, 1), (4, 4), (11, 10)] {
            let update = MemoryUpdate {
                importance: Some(input),
                ..MemoryUpdate::default()
            };
            assert!(store.update(&id, update).await);
            assert_eq!(store.get(&id).unwrap().importance, expected);
        }
    }

    #[tokio::test]
    async fn test_update_reindexes_tags_and_content() {
        let (store, _) = open_store(MemoryConfig::default()).await;
        let id = store
            .store(NewMemory::new("apples are red").tag("fruit"))
            .await;

        let updated = store
            .update(
                &id,
                MemoryUpdate {
                    content: Some("bananas are yellow".to_string()),
                    tags: Some(vec!["snack".to_string()]),
                    importance: None,
                },
            )
            .await;
        assert!(updated);

        assert!(store.ids_for_tag("fruit").is_empty());
        assert_eq!(store.ids_for_tag("snack"), vec![id.clone()]);
        assert!(store.ids_for_keyword("apples").is_empty());
        assert_eq!(store.ids_for_keyword("bananas"), vec![id.clone()]);

        let entry = store.get(&id).unwrap();
        assert!(entry.updated_at >= entry.created_at);
        assert_eq!(entry.importance, 5);
    }

    #[tokio::test]
    async fn test_update_missing_returns_false() {
        let (store, _) = open_store(MemoryConfig::default()).await;
        assert!(!store.update("nope", MemoryUpdate::default()).await);
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let (store, _) = open_store(MemoryConfig::default()).await;
        let id = store.store(NewMemory::new("ephemeral").tag("t")).await;
        assert!(store.delete(&id).await);
        assert!(!store.contains(&id));
        assert!(!store.delete(&id).await);
        assert!(!store.contains(&id));
        assert!(store.ids_for_tag("t").is_empty());
        assert!(store.ids_for_keyword("ephemeral").is_empty());
    }

    #[tokio::test]
    async fn test_query_bumps_access_of_returned_entries_only() {
        let (store, _) = open_store(MemoryConfig::default()).await;
        let high = store.store(NewMemory::new("note high").importance(9)).await;
        let low = store.store(NewMemory::new("note low").importance(2)).await;

        let results = store.query(&MemoryQuery::new().keyword("note").limit(1));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, high);
        assert_eq!(results[0].access_count, 1);

        // get() itself counts as an access.
        assert_eq!(store.get(&low).unwrap().access_count, 1);
        assert_eq!(store.stats().total_accesses, 2);
    }

    #[tokio::test]
    async fn test_query_filters_compose() {
        let (store, _) = open_store(MemoryConfig::default()).await;
        store
            .store(NewMemory::new("server restarted").tag("ops").importance(3))
            .await;
        let wanted = store
            .store(NewMemory::new("server upgraded").tag("ops").importance(8))
            .await;
        store
            .store(NewMemory::new("server upgraded").tag("dev").importance(9))
            .await;

        let results = store.query(
            &MemoryQuery::new()
                .tag("ops")
                .keyword("upgraded")
                .min_importance(5),
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, wanted);

        let now = Utc::now();
        let future = store.query(
            &MemoryQuery::new().between(now + ChronoDuration::hours(1), now + ChronoDuration::hours(2)),
        );
        assert!(future.is_empty());
    }

    #[tokio::test]
    async fn test_sort_orders() {
        let (store, _) = open_store(MemoryConfig::default()).await;
        let first = store.store(NewMemory::new("a").importance(9)).await;
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let second = store.store(NewMemory::new("b").importance(1)).await;

        let recency = store.query(&MemoryQuery::new().sort_by(SortBy::Recency));
        assert_eq!(recency[0].id, second);

        let importance = store.query(&MemoryQuery::new().sort_by(SortBy::Importance));
        assert_eq!(importance[0].id, first);

        // Bump `second` so it leads on access count.
        store.get(&second);
        store.get(&second);
        let accessed = store.query(&MemoryQuery::new().sort_by(SortBy::AccessCount));
        assert_eq!(accessed[0].id, second);

        let relevance = store.query(&MemoryQuery::new());
        assert_eq!(relevance[0].id, first);
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_low_value_stale_entries() {
        let (store, persistence) = open_store(MemoryConfig::default()).await;
        let low = store.store(NewMemory::new("low").importance(1)).await;
        let mid = store.store(NewMemory::new("mid").importance(5)).await;
        let high = store.store(NewMemory::new("high").importance(9)).await;

        let report = store.cleanup_at(Utc::now() + ChronoDuration::days(8)).await;
        assert_eq!(report.stale_deleted, 1);
        assert_eq!(report.cap_deleted, 0);
        assert!(!store.contains(&low));
        assert!(store.contains(&mid));
        assert!(store.contains(&high));

        let stats = persistence.stats().unwrap();
        assert_eq!(stats.cleanup_count, 1);
        assert_eq!(stats.last_cleanup_deleted, 1);
        assert!(stats.last_cleanup.is_some());
    }

    #[tokio::test]
    async fn test_cleanup_enforces_cap() {
        let config = MemoryConfig {
            max_entries: 2,
            ..MemoryConfig::default()
        };
        let (store, _) = open_store(config).await;
        let a = store.store(NewMemory::new("a").importance(3)).await;
        let b = store.store(NewMemory::new("b").importance(8)).await;
        let c = store.store(NewMemory::new("c").importance(6)).await;

        let report = store.cleanup().await;
        assert_eq!(report.cap_deleted, 1);
        assert_eq!(report.remaining, 2);
        assert!(!store.contains(&a));
        assert!(store.contains(&b) && store.contains(&c));
    }

    #[tokio::test]
    async fn test_flush_writes_after_each_mutation() {
        let (store, persistence) = open_store(MemoryConfig::default()).await;
        let id = store.store(NewMemory::new("persist me").tag("p")).await;
        assert_eq!(persistence.snapshot_writes(), 1);

        let snapshot = persistence.snapshot().unwrap();
        assert_eq!(snapshot.entries.len(), 1);
        assert_eq!(snapshot.tag_index["p"], vec![id.clone()]);
        assert_eq!(snapshot.keyword_index["persist"], vec![id]);

        // Nothing changed: flush is a no-op.
        store.flush().await.unwrap();
        assert_eq!(persistence.snapshot_writes(), 1);
    }

    #[tokio::test]
    async fn test_flush_every_batches_writes() {
        let config = MemoryConfig {
            flush_every: 3,
            ..MemoryConfig::default()
        };
        let (store, persistence) = open_store(config).await;
        store.store(NewMemory::new("one")).await;
        store.store(NewMemory::new("two")).await;
        assert_eq!(persistence.snapshot_writes(), 0);
        store.store(NewMemory::new("three")).await;
        assert_eq!(persistence.snapshot_writes(), 1);
    }

    #[tokio::test]
    async fn test_write_failures_keep_serving_from_memory() {
        let (store, persistence) = open_store(MemoryConfig::default()).await;
        persistence.set_fail_writes(true);
        let id = store.store(NewMemory::new("still here")).await;
        assert!(store.contains(&id));
        assert!(store.flush().await.is_err());

        persistence.set_fail_writes(false);
        store.flush().await.unwrap();
        assert_eq!(persistence.snapshot().unwrap().entries.len(), 1);
    }

    #[tokio::test]
    async fn test_reopen_rebuilds_indexes() {
        let persistence = Arc::new(InMemoryPersistence::new());
        let id = {
            let store = MemoryStore::open(
                MemoryConfig::default(),
                BoxMemoryPersistence::new(persistence.clone()),
            )
            .await
            .unwrap();
            let id = store
                .store(NewMemory::new("remember the milk").tag("todo"))
                .await;
            store.shutdown().await.unwrap();
            id
        };

        let reopened = MemoryStore::open(
            MemoryConfig::default(),
            BoxMemoryPersistence::new(persistence.clone()),
        )
        .await
        .unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.ids_for_tag("todo"), vec![id.clone()]);
        assert_eq!(reopened.ids_for_keyword("milk"), vec![id]);
        assert_eq!(reopened.stats().total_entries, 1);
    }

    #[test]
    fn test_first_cleanup_delay() {
        let now = Utc::now();
        let day = Duration::from_secs(24 * 3600);
        assert_eq!(first_cleanup_delay(None, day, now), Duration::ZERO);
        let delay = first_cleanup_delay(Some(now - ChronoDuration::hours(20)), day, now);
        assert_eq!(delay, Duration::from_secs(4 * 3600));
        let overdue = first_cleanup_delay(Some(now - ChronoDuration::hours(30)), day, now);
        assert_eq!(overdue, Duration::ZERO);
    }
}
