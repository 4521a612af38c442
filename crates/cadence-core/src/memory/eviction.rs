//! Eviction planning.
//!
//! A pass runs in two steps:
//! 1. Low-value, stale entries: `value < min_value` and older than the
//!    retention window.
//! 2. Size cap: if the survivors still exceed `max_entries`, the lowest
//!    ranked by `(importance, access_count, created_at)` ascending go.
//!
//! The cap always wins over the value threshold. Planning is pure; the
//! store applies the plan.

use chrono::{DateTime, Utc};

use cadence_types::config::MemoryConfig;
use cadence_types::memory::MemoryEntry;

/// Thresholds for one eviction pass.
#[derive(Debug, Clone, PartialEq)]
pub struct EvictionPolicy {
    pub min_value: f64,
    pub access_weight: f64,
    pub retention: chrono::Duration,
    pub max_entries: usize,
}

impl From<&MemoryConfig> for EvictionPolicy {
    fn from(config: &MemoryConfig) -> Self {
        Self {
            min_value: config.min_value,
            access_weight: config.access_weight,
            retention: config.retention(),
            max_entries: config.max_entries,
        }
    }
}

/// Ids selected for deletion, grouped by the step that selected them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionPlan {
    pub stale: Vec<String>,
    pub over_cap: Vec<String>,
}

impl EvictionPlan {
    pub fn is_empty(&self) -> bool {
        self.stale.is_empty() && self.over_cap.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.stale.iter().chain(self.over_cap.iter())
    }
}

/// Decide which entries a pass at `now` removes.
pub fn plan_eviction<'a>(
    entries: impl IntoIterator<Item = &'a MemoryEntry>,
    policy: &EvictionPolicy,
    now: DateTime<Utc>,
) -> EvictionPlan {
    let cutoff = now - policy.retention;
    let mut plan = EvictionPlan::default();
    let mut survivors: Vec<&MemoryEntry> = Vec::new();

    for entry in entries {
        if entry.value(policy.access_weight) < policy.min_value && entry.created_at < cutoff {
            plan.stale.push(entry.id.clone());
        } else {
            survivors.push(entry);
        }
    }
    plan.stale.sort();

    if survivors.len() > policy.max_entries {
        survivors.sort_by(|a, b| {
            a.importance
                .cmp(&b.importance)
                .then(a.access_count.cmp(&b.access_count))
                .then(a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        let excess = survivors.len() - policy.max_entries;
        plan.over_cap = survivors[..excess].iter().map(|e| e.id.clone()).collect();
    }

    plan
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn entry(id: &str, importance: u8, access_count: u64, age_days: i64) -> MemoryEntry {
        let created = Utc::now() - Duration::days(age_days);
        MemoryEntry {
            id: id.to_string(),
            content: format!("entry {id}"),
            tags: Default::default(),
            importance,
            created_at: created,
            updated_at: created,
            last_accessed: created,
            access_count,
            source: "test".to_string(),
            metadata: Default::default(),
        }
    }

    fn policy(max_entries: usize) -> EvictionPolicy {
        EvictionPolicy {
            min_value: 2.0,
            access_weight: 0.1,
            retention: Duration::days(7),
            max_entries,
        }
    }

    #[test]
    fn test_only_low_value_stale_entries_are_removed() {
        let entries = vec![entry("low", 1, 0, 10), entry("mid", 5, 0, 10), entry("high", 9, 0, 10)];
        let plan = plan_eviction(&entries, &policy(100), Utc::now());
        assert_eq!(plan.stale, vec!["low".to_string()]);
        assert!(plan.over_cap.is_empty());
    }

    #[test]
    fn test_recent_low_value_entries_survive() {
        let entries = vec![entry("fresh", 1, 0, 1)];
        let plan = plan_eviction(&entries, &policy(100), Utc::now());
        assert!(plan.is_empty());
    }

    #[test]
    fn test_accesses_raise_value_above_threshold() {
        // 1 + 10 * 0.1 = 2.0, not below the threshold.
        let entries = vec![entry("used", 1, 10, 30), entry("unused", 1, 9, 30)];
        let plan = plan_eviction(&entries, &policy(100), Utc::now());
        assert_eq!(plan.stale, vec!["unused".to_string()]);
    }

    #[test]
    fn test_cap_removes_lowest_ranked() {
        let entries = vec![
            entry("a", 5, 3, 1),
            entry("b", 3, 0, 1),
            entry("c", 3, 1, 1),
            entry("d", 9, 0, 1),
        ];
        let plan = plan_eviction(&entries, &policy(2), Utc::now());
        assert!(plan.stale.is_empty());
        assert_eq!(plan.over_cap, vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_cap_breaks_ties_by_age() {
        let entries = vec![entry("newer", 4, 0, 1), entry("older", 4, 0, 3)];
        let plan = plan_eviction(&entries, &policy(1), Utc::now());
        assert_eq!(plan.over_cap, vec!["older".to_string()]);
    }

    #[test]
    fn test_cap_applies_after_stale_removal() {
        let entries = vec![
            entry("stale", 1, 0, 30),
            entry("keep1", 6, 0, 1),
            entry("keep2", 7, 0, 1),
        ];
        let plan = plan_eviction(&entries, &policy(2), Utc::now());
        assert_eq!(plan.stale, vec!["stale".to_string()]);
        assert!(plan.over_cap.is_empty());
        assert_eq!(plan.ids().count(), 1);
    }
}
