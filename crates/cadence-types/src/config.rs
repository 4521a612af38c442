//! Runtime configuration types for Cadence.
//!
//! `RuntimeConfig` represents the top-level `config.toml`. Every section has
//! documented defaults, and unknown keys are rejected at parse time.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration for the Cadence runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Overrides the resolved data directory.
    pub data_dir: Option<PathBuf>,
    pub log: LogConfig,
    pub memory: MemoryConfig,
    pub manager: ManagerConfig,
    pub scheduler: SchedulerConfig,
    /// Per-skill options keyed by skill name.
    pub skills: BTreeMap<String, SkillSettings>,
    /// Recurring skills armed when the runtime starts.
    pub schedules: Vec<ScheduleConfig>,
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
    /// Bridge spans to OpenTelemetry (stdout exporter).
    pub otel: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            otel: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Memory store
// ---------------------------------------------------------------------------

/// Tuning for the memory store and its eviction pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryConfig {
    /// Hard ceiling on live entries, enforced by the eviction pass.
    pub max_entries: usize,
    /// Low-value entries older than this are evictable.
    pub retention_days: u32,
    /// Entries whose value falls below this are low-value.
    pub min_value: f64,
    /// Weight of one access in the value score.
    pub access_weight: f64,
    pub cleanup_interval_hours: u32,
    /// How many leading content tokens feed the keyword index.
    pub keyword_tokens: usize,
    /// Persist after every N mutating calls.
    pub flush_every: u32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            retention_days: 7,
            min_value: 2.0,
            access_weight: 0.1,
            cleanup_interval_hours: 24,
            keyword_tokens: 50,
            flush_every: 1,
        }
    }
}

impl MemoryConfig {
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.retention_days))
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.cleanup_interval_hours.max(1)) * 3600)
    }
}

// ---------------------------------------------------------------------------
// Skill manager and scheduler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManagerConfig {
    /// Gate size when no skill declares a concurrency hint.
    pub default_max_concurrent: usize,
    /// Capacity of the FIFO used by queued executions.
    pub queue_capacity: usize,
    /// How long shutdown waits for background tasks before cancelling.
    pub shutdown_grace_secs: u64,
    /// Write an audit memory entry after each execution.
    pub audit_executions: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            default_max_concurrent: 5,
            queue_capacity: 1024,
            shutdown_grace_secs: 10,
            audit_executions: true,
        }
    }
}

impl ManagerConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Scheduler wake-up period. Fire times jitter by up to one tick.
    pub tick_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_secs: 60,
        }
    }
}

impl SchedulerConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs.max(1))
    }
}

/// Options recognized for every skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SkillSettings {
    pub enabled: bool,
    /// Overrides the skill's declared timeout (advisory).
    pub timeout_secs: Option<u64>,
    /// Overrides the skill's declared concurrency hint.
    pub max_concurrent: Option<usize>,
}

impl Default for SkillSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: None,
            max_concurrent: None,
        }
    }
}

/// A recurring skill declared in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleConfig {
    pub skill: String,
    pub interval_secs: u64,
    #[serde(default)]
    pub max_runs: Option<u32>,
    #[serde(default = "default_start_now")]
    pub start_now: bool,
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

fn default_start_now() -> bool {
    true
}

impl ScheduleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_config_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.memory.max_entries, 10_000);
        assert_eq!(config.memory.retention_days, 7);
        assert_eq!(config.memory.min_value, 2.0);
        assert_eq!(config.memory.access_weight, 0.1);
        assert_eq!(config.scheduler.tick_secs, 60);
        assert_eq!(config.manager.default_max_concurrent, 5);
        assert!(config.skills.is_empty());
        assert!(config.schedules.is_empty());
    }

    #[test]
    fn test_parse_partial_toml_uses_defaults() {
        let toml_str = r#"
[memory]
max_entries = 50

[skills.ping]
max_concurrent = 2

[[schedules]]
skill = "ping"
interval_secs = 10
max_runs = 3
params = { input = "hello" }
"#;
        let config: RuntimeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.memory.max_entries, 50);
        assert_eq!(config.memory.retention_days, 7);
        let ping = &config.skills["ping"];
        assert!(ping.enabled);
        assert_eq!(ping.max_concurrent, Some(2));
        assert_eq!(config.schedules.len(), 1);
        assert!(config.schedules[0].start_now);
        assert_eq!(config.schedules[0].params["input"], "hello");
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let toml_str = r#"
[skills.ping]
max_concurent = 2
"#;
        assert!(toml::from_str::<RuntimeConfig>(toml_str).is_err());

        let toml_str = r#"
[memory]
retention_weeks = 1
"#;
        assert!(toml::from_str::<RuntimeConfig>(toml_str).is_err());
    }

    #[test]
    fn test_log_format_parse() {
        let config: RuntimeConfig = toml::from_str("[log]\nformat = \"json\"\n").unwrap();
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_duration_helpers() {
        let memory = MemoryConfig::default();
        assert_eq!(memory.cleanup_interval(), Duration::from_secs(24 * 3600));
        assert_eq!(memory.retention(), chrono::Duration::days(7));
        let scheduler = SchedulerConfig {
            enabled: true,
            tick_secs: 0,
        };
        assert_eq!(scheduler.tick(), Duration::from_secs(1));
    }
}
