//! Recurring-skill bookkeeping.
//!
//! The table records each scheduled skill's interval and next due time.
//! The manager's scheduler loop wakes once per tick, takes the due entries,
//! runs them, and reports back with [`SchedulerTable::record`]. Due times
//! use `tokio::time::Instant` so paused-clock tests drive the loop exactly.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;

use cadence_types::skill::{ScheduleInfo, SkillResult};

/// One recurring skill.
#[derive(Debug, Clone)]
pub struct ScheduledSkill {
    pub skill: String,
    pub interval: Duration,
    pub next_run: Instant,
    pub enabled: bool,
    pub max_runs: Option<u32>,
    pub runs: u32,
    pub params: serde_json::Map<String, serde_json::Value>,
    pub last_result: Option<SkillResult>,
}

impl ScheduledSkill {
    pub fn new(
        skill: impl Into<String>,
        interval: Duration,
        max_runs: Option<u32>,
        start_now: bool,
        params: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        let now = Instant::now();
        Self {
            skill: skill.into(),
            interval,
            next_run: if start_now { now } else { now + interval },
            enabled: max_runs != Some(0),
            max_runs,
            runs: 0,
            params,
            last_result: None,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.enabled && self.next_run <= now
    }

    pub fn exhausted(&self) -> bool {
        self.max_runs.is_some_and(|max| self.runs >= max)
    }

    pub fn info(&self) -> ScheduleInfo {
        let now = Instant::now();
        let until = self.next_run.saturating_duration_since(now);
        let next_run_at = Utc::now()
            + chrono::Duration::from_std(until).unwrap_or_else(|_| chrono::Duration::zero());
        ScheduleInfo {
            skill: self.skill.clone(),
            interval_secs: self.interval.as_secs(),
            next_run_at,
            enabled: self.enabled,
            max_runs: self.max_runs,
            runs: self.runs,
            params: self.params.clone(),
            last_result: self.last_result.clone(),
        }
    }
}

/// Skill name -> schedule. At most one schedule per skill.
#[derive(Debug, Default)]
pub struct SchedulerTable {
    entries: BTreeMap<String, ScheduledSkill>,
}

impl SchedulerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the schedule for `scheduled.skill`.
    pub fn insert(&mut self, scheduled: ScheduledSkill) -> Option<ScheduledSkill> {
        self.entries.insert(scheduled.skill.clone(), scheduled)
    }

    pub fn remove(&mut self, skill: &str) -> Option<ScheduledSkill> {
        self.entries.remove(skill)
    }

    pub fn get(&self, skill: &str) -> Option<&ScheduledSkill> {
        self.entries.get(skill)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of schedules that can still fire.
    pub fn enabled_count(&self) -> usize {
        self.entries.values().filter(|e| e.enabled).count()
    }

    /// Entries due at `now`, with the params each run should receive.
    pub fn due(&self, now: Instant) -> Vec<(String, serde_json::Map<String, serde_json::Value>)> {
        self.entries
            .values()
            .filter(|entry| entry.is_due(now))
            .map(|entry| (entry.skill.clone(), entry.params.clone()))
            .collect()
    }

    /// Record a completed run and advance the next due time.
    ///
    /// A run that overshot by more than one interval is rescheduled from
    /// `now` rather than fired repeatedly to catch up.
    pub fn record(&mut self, skill: &str, result: SkillResult, now: Instant) {
        let Some(entry) = self.entries.get_mut(skill) else {
            return;
        };
        entry.runs = entry.runs.saturating_add(1);
        entry.last_result = Some(result);

        let next = entry.next_run + entry.interval;
        entry.next_run = if next <= now { now + entry.interval } else { next };

        if entry.exhausted() {
            entry.enabled = false;
            tracing::info!(skill = %skill, runs = entry.runs, "schedule reached max runs, disabled");
        }
    }

    pub fn infos(&self) -> Vec<ScheduleInfo> {
        self.entries.values().map(ScheduledSkill::info).collect()
    }
}

#[cfg(test)]
mod tests {
    use cadence_types::skill::ExecutionMode;
    use uuid::Uuid;

    use super::*;

    fn ok(skill: &str) -> SkillResult {
        SkillResult::success(
            Uuid::new_v4(),
            skill,
            ExecutionMode::Scheduled,
            serde_json::json!("pong"),
            0,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_now_is_immediately_due() {
        let mut table = SchedulerTable::new();
        table.insert(ScheduledSkill::new("ping", Duration::from_secs(10), None, true, Default::default()));
        table.insert(ScheduledSkill::new("later", Duration::from_secs(10), None, false, Default::default()));

        let due = table.due(Instant::now());
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].0, "ping");
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_advances_and_disables_after_max_runs() {
        let mut table = SchedulerTable::new();
        table.insert(ScheduledSkill::new("ping", Duration::from_secs(10), Some(2), true, Default::default()));

        let now = Instant::now();
        table.record("ping", ok("ping"), now);
        let entry = table.get("ping").unwrap();
        assert_eq!(entry.runs, 1);
        assert!(entry.enabled);
        assert!(!entry.is_due(now));
        assert!(entry.is_due(now + Duration::from_secs(10)));

        table.record("ping", ok("ping"), now + Duration::from_secs(10));
        let entry = table.get("ping").unwrap();
        assert_eq!(entry.runs, 2);
        assert!(!entry.enabled);
        assert!(table.due(now + Duration::from_secs(100)).is_empty());
        assert_eq!(table.enabled_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overshoot_reschedules_from_now() {
        let mut table = SchedulerTable::new();
        table.insert(ScheduledSkill::new("ping", Duration::from_secs(10), None, true, Default::default()));

        let late = Instant::now() + Duration::from_secs(35);
        table.record("ping", ok("ping"), late);
        assert_eq!(table.get("ping").unwrap().next_run, late + Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_max_runs_never_fires() {
        let mut table = SchedulerTable::new();
        table.insert(ScheduledSkill::new("ping", Duration::from_secs(1), Some(0), true, Default::default()));
        assert!(table.due(Instant::now()).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_info_reports_state() {
        let mut table = SchedulerTable::new();
        let mut params = serde_json::Map::new();
        params.insert("input".into(), serde_json::json!("hi"));
        table.insert(ScheduledSkill::new("echo", Duration::from_secs(60), Some(3), false, params));

        let infos = table.infos();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].interval_secs, 60);
        assert_eq!(infos[0].max_runs, Some(3));
        assert!(infos[0].next_run_at > Utc::now());
        assert_eq!(infos[0].params["input"], "hi");
    }
}
