//! Memory types for Cadence.
//!
//! These types model the long-term state that skills read and write:
//! individual entries, the query and update requests that address them,
//! and the bookkeeping the store persists alongside them.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lowest importance an entry can carry.
pub const MIN_IMPORTANCE: u8 = 1;

/// Highest importance an entry can carry.
pub const MAX_IMPORTANCE: u8 = 10;

/// Default number of results returned by a query.
pub const DEFAULT_QUERY_LIMIT: usize = 10;

/// Clamp a caller-supplied importance into `[MIN_IMPORTANCE, MAX_IMPORTANCE]`.
pub fn clamp_importance(importance: i32) -> u8 {
    importance.clamp(MIN_IMPORTANCE as i32, MAX_IMPORTANCE as i32) as u8
}

/// A single persisted unit of long-term state.
///
/// Owned exclusively by the memory store. Callers receive clones and go
/// through the store API to change persisted state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    pub content: String,
    pub tags: BTreeSet<String>,
    /// Always within `[1, 10]`.
    pub importance: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    /// Incremented on every successful read.
    pub access_count: u64,
    /// Free-text provenance label (skill name, "cli", "system", ...).
    pub source: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl MemoryEntry {
    /// Eviction value: `importance + access_count * access_weight`.
    pub fn value(&self, access_weight: f64) -> f64 {
        f64::from(self.importance) + self.access_count as f64 * access_weight
    }

    /// Record a successful read.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.access_count += 1;
        self.last_accessed = now;
    }

    /// Whether this entry carries `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// Input for creating a new memory entry.
///
/// ```
/// use cadence_types::memory::NewMemory;
///
/// let memory = NewMemory::new("User prefers dark mode")
///     .tag("preference")
///     .importance(7)
///     .source("cli");
/// assert_eq!(memory.importance, 7);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMemory {
    pub content: String,
    pub tags: Vec<String>,
    /// Clamped into `[1, 10]` when stored.
    pub importance: i32,
    pub source: String,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl NewMemory {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tags: Vec::new(),
            importance: 5,
            source: "unknown".to_string(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn importance(mut self, importance: i32) -> Self {
        self.importance = importance;
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Partial update of an existing entry. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryUpdate {
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub importance: Option<i32>,
}

impl MemoryUpdate {
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.tags.is_none() && self.importance.is_none()
    }
}

/// Inclusive creation-time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

/// Result ordering for memory queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    /// Newest first.
    Recency,
    /// Highest importance first.
    Importance,
    /// Most accessed first.
    AccessCount,
    /// `(importance, access_count, created_at)` descending.
    #[default]
    Relevance,
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortBy::Recency => write!(f, "recency"),
            SortBy::Importance => write!(f, "importance"),
            SortBy::AccessCount => write!(f, "access_count"),
            SortBy::Relevance => write!(f, "relevance"),
        }
    }
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "recency" | "recent" => Ok(SortBy::Recency),
            "importance" => Ok(SortBy::Importance),
            "access_count" | "access-count" | "accesses" => Ok(SortBy::AccessCount),
            "relevance" => Ok(SortBy::Relevance),
            other => Err(format!("invalid sort order: '{other}'")),
        }
    }
}

/// Filter and ordering for `MemoryStore::query`.
///
/// Every populated filter must pass for an entry to be returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryQuery {
    /// Any keyword present in the content (case-insensitive substring).
    pub keywords: Vec<String>,
    /// Entry must carry at least one of these tags.
    pub tags: Vec<String>,
    pub date_range: Option<DateRange>,
    /// Importance floor (inclusive).
    pub min_importance: Option<u8>,
    pub limit: usize,
    pub sort_by: SortBy,
}

impl Default for MemoryQuery {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            tags: Vec::new(),
            date_range: None,
            min_importance: None,
            limit: DEFAULT_QUERY_LIMIT,
            sort_by: SortBy::default(),
        }
    }
}

impl MemoryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keywords.push(keyword.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn between(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.date_range = Some(DateRange::new(start, end));
        self
    }

    pub fn min_importance(mut self, importance: u8) -> Self {
        self.min_importance = Some(importance);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn sort_by(mut self, sort_by: SortBy) -> Self {
        self.sort_by = sort_by;
        self
    }
}

/// Usage statistics persisted next to the index artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    /// Entries ever created by this store.
    pub total_entries: u64,
    /// Successful reads across all entries.
    pub total_accesses: u64,
    pub last_cleanup: Option<DateTime<Utc>>,
    pub cleanup_count: u64,
    /// Entries removed by the most recent eviction pass.
    #[serde(default)]
    pub last_cleanup_deleted: u64,
}

/// Outcome of one eviction pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanupReport {
    /// Low-value entries older than the retention window.
    pub stale_deleted: usize,
    /// Lowest-ranked entries removed to respect the size cap.
    pub cap_deleted: usize,
    pub remaining: usize,
    pub ran_at: DateTime<Utc>,
}

impl CleanupReport {
    pub fn total_deleted(&self) -> usize {
        self.stale_deleted + self.cap_deleted
    }
}

/// Current artifact format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// The serialized index artifact: the full entry set plus both derived
/// indexes. Indexes are rebuilt from `entries` on load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub version: u32,
    pub entries: Vec<MemoryEntry>,
    #[serde(default)]
    pub tag_index: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub keyword_index: BTreeMap<String, Vec<String>>,
    pub saved_at: Option<DateTime<Utc>>,
}
