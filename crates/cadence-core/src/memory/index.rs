//! Derived lookup structures over the live entry set.
//!
//! Both indexes are rebuildable from the entries alone and are never the
//! source of truth. The store keeps them in step with every mutation.

use std::collections::{BTreeMap, HashMap, HashSet};

use cadence_types::memory::MemoryEntry;

/// Split `content` into lowercase alphanumeric tokens, keeping the first
/// `limit` distinct ones in order of appearance.
pub fn tokenize(content: &str, limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tokens = Vec::new();
    for raw in content.split(|c: char| !c.is_alphanumeric()) {
        if tokens.len() >= limit {
            break;
        }
        if raw.is_empty() {
            continue;
        }
        let token = raw.to_lowercase();
        if seen.insert(token.clone()) {
            tokens.push(token);
        }
    }
    tokens
}

/// Tag -> ids inverted index.
#[derive(Debug, Default, Clone)]
pub struct TagIndex {
    map: HashMap<String, HashSet<String>>,
}

impl TagIndex {
    pub fn insert<'a>(&mut self, id: &str, tags: impl IntoIterator<Item = &'a String>) {
        for tag in tags {
            self.map
                .entry(tag.clone())
                .or_default()
                .insert(id.to_string());
        }
    }

    pub fn remove<'a>(&mut self, id: &str, tags: impl IntoIterator<Item = &'a String>) {
        for tag in tags {
            if let Some(ids) = self.map.get_mut(tag) {
                ids.remove(id);
                if ids.is_empty() {
                    self.map.remove(tag);
                }
            }
        }
    }

    pub fn ids(&self, tag: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .map
            .get(tag)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    pub fn tag_count(&self) -> usize {
        self.map.len()
    }

    pub fn to_sorted(&self) -> BTreeMap<String, Vec<String>> {
        self.map
            .iter()
            .map(|(tag, ids)| {
                let mut ids: Vec<String> = ids.iter().cloned().collect();
                ids.sort();
                (tag.clone(), ids)
            })
            .collect()
    }
}

/// Keyword -> ids cache built from the leading tokens of each entry.
#[derive(Debug, Clone)]
pub struct KeywordIndex {
    map: HashMap<String, Vec<String>>,
    token_limit: usize,
}

impl KeywordIndex {
    pub fn new(token_limit: usize) -> Self {
        Self {
            map: HashMap::new(),
            token_limit,
        }
    }

    pub fn insert(&mut self, id: &str, content: &str) {
        for token in tokenize(content, self.token_limit) {
            let ids = self.map.entry(token).or_default();
            if !ids.iter().any(|existing| existing == id) {
                ids.push(id.to_string());
            }
        }
    }

    pub fn remove(&mut self, id: &str, content: &str) {
        for token in tokenize(content, self.token_limit) {
            if let Some(ids) = self.map.get_mut(&token) {
                ids.retain(|existing| existing != id);
                if ids.is_empty() {
                    self.map.remove(&token);
                }
            }
        }
    }

    pub fn ids(&self, keyword: &str) -> Vec<String> {
        self.map
            .get(&keyword.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    pub fn keyword_count(&self) -> usize {
        self.map.len()
    }

    pub fn to_sorted(&self) -> BTreeMap<String, Vec<String>> {
        self.map
            .iter()
            .map(|(word, ids)| (word.clone(), ids.clone()))
            .collect()
    }
}

/// Both indexes, maintained together.
#[derive(Debug, Clone)]
pub struct MemoryIndexes {
    pub tags: TagIndex,
    pub keywords: KeywordIndex,
}

impl MemoryIndexes {
    pub fn new(keyword_tokens: usize) -> Self {
        Self {
            tags: TagIndex::default(),
            keywords: KeywordIndex::new(keyword_tokens),
        }
    }

    /// Rebuild from scratch over `entries`.
    pub fn rebuild<'a>(
        keyword_tokens: usize,
        entries: impl IntoIterator<Item = &'a MemoryEntry>,
    ) -> Self {
        let mut indexes = Self::new(keyword_tokens);
        for entry in entries {
            indexes.add(entry);
        }
        indexes
    }

    pub fn add(&mut self, entry: &MemoryEntry) {
        self.tags.insert(&entry.id, &entry.tags);
        self.keywords.insert(&entry.id, &entry.content);
    }

    pub fn remove(&mut self, entry: &MemoryEntry) {
        self.tags.remove(&entry.id, &entry.tags);
        self.keywords.remove(&entry.id, &entry.content);
    }
}
