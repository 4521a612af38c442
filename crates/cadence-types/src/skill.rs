//! Skill system domain types.
//!
//! Defines the static description of a skill, its lifecycle states, the
//! execution modes a caller can request, and the result and statistics
//! objects the manager hands back.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Lifecycle and modes
// ---------------------------------------------------------------------------

/// Lifecycle state of a managed skill.
///
/// `Inactive -> Loading -> Active` on success, `Inactive -> Loading -> Error`
/// when init fails, `Active -> Disabled` on cleanup. Only `Active` skills
/// are executable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillState {
    Inactive,
    Loading,
    Active,
    Error,
    Disabled,
}

impl fmt::Display for SkillState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkillState::Inactive => write!(f, "inactive"),
            SkillState::Loading => write!(f, "loading"),
            SkillState::Active => write!(f, "active"),
            SkillState::Error => write!(f, "error"),
            SkillState::Disabled => write!(f, "disabled"),
        }
    }
}

/// How an invocation runs relative to its caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Caller awaits the result.
    #[default]
    Immediate,
    /// Appended to the FIFO queue; caller gets an acknowledgement.
    Queued,
    /// Fire-and-forget task; caller gets an acknowledgement.
    Background,
    /// Driven by the scheduler loop.
    Scheduled,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Immediate => write!(f, "immediate"),
            ExecutionMode::Queued => write!(f, "queued"),
            ExecutionMode::Background => write!(f, "background"),
            ExecutionMode::Scheduled => write!(f, "scheduled"),
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "immediate" => Ok(ExecutionMode::Immediate),
            "queued" => Ok(ExecutionMode::Queued),
            "background" => Ok(ExecutionMode::Background),
            "scheduled" | "continuous" => Ok(ExecutionMode::Scheduled),
            other => Err(format!("invalid execution mode: '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Optional capabilities
// ---------------------------------------------------------------------------

/// Extra operations a skill may support beyond `execute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtraOperationKind {
    ImageAnalysis,
    CodeGeneration,
    Summarization,
    Translation,
}

impl fmt::Display for ExtraOperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtraOperationKind::ImageAnalysis => write!(f, "image_analysis"),
            ExtraOperationKind::CodeGeneration => write!(f, "code_generation"),
            ExtraOperationKind::Summarization => write!(f, "summarization"),
            ExtraOperationKind::Translation => write!(f, "translation"),
        }
    }
}

/// A request for one of the optional operations, with its arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum ExtraOperation {
    ImageAnalysis {
        image_url: String,
        #[serde(default)]
        prompt: Option<String>,
    },
    CodeGeneration {
        prompt: String,
        #[serde(default)]
        language: Option<String>,
    },
    Summarization {
        text: String,
        #[serde(default)]
        max_sentences: Option<u32>,
    },
    Translation {
        text: String,
        target_language: String,
    },
}

impl ExtraOperation {
    pub fn kind(&self) -> ExtraOperationKind {
        match self {
            ExtraOperation::ImageAnalysis { .. } => ExtraOperationKind::ImageAnalysis,
            ExtraOperation::CodeGeneration { .. } => ExtraOperationKind::CodeGeneration,
            ExtraOperation::Summarization { .. } => ExtraOperationKind::Summarization,
            ExtraOperation::Translation { .. } => ExtraOperationKind::Translation,
        }
    }
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Static description of a skill type. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillMetadata {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    /// Names of skills that must be initialized first.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Advisory; the manager does not enforce it.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Hint used to size the manager's concurrency gate.
    #[serde(default)]
    pub max_concurrent: Option<usize>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub extra_operations: Vec<ExtraOperationKind>,
}

impl SkillMetadata {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: String::new(),
            dependencies: Vec::new(),
            timeout_secs: None,
            max_concurrent: None,
            tags: Vec::new(),
            extra_operations: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn depends_on(mut self, dependency: impl Into<String>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = Some(max);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn supports(mut self, operation: ExtraOperationKind) -> Self {
        if !self.extra_operations.contains(&operation) {
            self.extra_operations.push(operation);
        }
        self
    }

    pub fn has_operation(&self, operation: ExtraOperationKind) -> bool {
        self.extra_operations.contains(&operation)
    }
}

/// Metadata plus the current lifecycle state, as returned by `list_skills`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillInfo {
    pub metadata: SkillMetadata,
    pub state: SkillState,
    /// Reason for an `Inactive`/`Error` state, if any.
    pub last_error: Option<String>,
}

// ---------------------------------------------------------------------------
// Invocation identity and results
// ---------------------------------------------------------------------------

/// Who asked for an execution and through which surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: String,
    pub platform: String,
}

impl Caller {
    pub fn new(user_id: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            platform: platform.into(),
        }
    }

    /// Identity used for scheduler-originated executions.
    pub fn system() -> Self {
        Self::new("system", "scheduler")
    }
}

/// Outcome of a single execution request.
///
/// Every request produces one of these; failures carry a human-readable
/// reason in `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillResult {
    pub request_id: Uuid,
    pub skill: String,
    pub mode: ExecutionMode,
    pub success: bool,
    pub output: Option<serde_json::Value>,
    pub error: Option<String>,
    pub execution_time_ms: u64,
    pub completed_at: DateTime<Utc>,
}

impl SkillResult {
    pub fn success(
        request_id: Uuid,
        skill: impl Into<String>,
        mode: ExecutionMode,
        output: serde_json::Value,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            request_id,
            skill: skill.into(),
            mode,
            success: true,
            output: Some(output),
            error: None,
            execution_time_ms,
            completed_at: Utc::now(),
        }
    }

    pub fn failure(
        request_id: Uuid,
        skill: impl Into<String>,
        mode: ExecutionMode,
        error: impl Into<String>,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            request_id,
            skill: skill.into(),
            mode,
            success: false,
            output: None,
            error: Some(error.into()),
            execution_time_ms,
            completed_at: Utc::now(),
        }
    }

    /// Acknowledgement for `Queued` and `Background` requests.
    pub fn accepted(request_id: Uuid, skill: impl Into<String>, mode: ExecutionMode) -> Self {
        let status = match mode {
            ExecutionMode::Queued => "queued",
            _ => "started",
        };
        Self::success(
            request_id,
            skill,
            mode,
            serde_json::json!({ "status": status, "request_id": request_id }),
            0,
        )
    }
}

// ---------------------------------------------------------------------------
// Scheduling and statistics snapshots
// ---------------------------------------------------------------------------

/// Inspection view of a recurring skill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleInfo {
    pub skill: String,
    pub interval_secs: u64,
    pub next_run_at: DateTime<Utc>,
    pub enabled: bool,
    pub max_runs: Option<u32>,
    pub runs: u32,
    pub params: serde_json::Map<String, serde_json::Value>,
    pub last_result: Option<SkillResult>,
}

/// Running counters exposed by `SkillManager::stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerStats {
    /// Executions that entered the envelope.
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Requests refused before execution (unknown, inactive, queue full).
    pub rejected: u64,
    pub queued: u64,
    pub background_spawned: u64,
    pub background_active: usize,
    pub scheduled_runs: u64,
    pub queue_depth: usize,
    pub active_executions: usize,
    pub peak_concurrency: usize,
    pub gate_capacity: usize,
    pub active_skills: usize,
    pub scheduled_skills: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_mode_roundtrip() {
        for mode in [
            ExecutionMode::Immediate,
            ExecutionMode::Queued,
            ExecutionMode::Background,
            ExecutionMode::Scheduled,
        ] {
            let parsed: ExecutionMode = mode.to_string().parse().unwrap();
            assert_eq!(parsed, mode);
        }
        assert_eq!(
            "continuous".parse::<ExecutionMode>().unwrap(),
            ExecutionMode::Scheduled
        );
    }

    #[test]
    fn test_skill_state_serde() {
        let json = serde_json::to_string(&SkillState::Disabled).unwrap();
        assert_eq!(json, "\"disabled\"");
    }

    #[test]
    fn test_metadata_builder() {
        let meta = SkillMetadata::new("recall", "1.0.0")
            .depends_on("note")
            .max_concurrent(4)
            .supports(ExtraOperationKind::Summarization)
            .supports(ExtraOperationKind::Summarization);
        assert_eq!(meta.dependencies, vec!["note".to_string()]);
        assert_eq!(meta.max_concurrent, Some(4));
        assert_eq!(meta.extra_operations.len(), 1);
        assert!(meta.has_operation(ExtraOperationKind::Summarization));
        assert!(!meta.has_operation(ExtraOperationKind::Translation));
    }

    #[test]
    fn test_extra_operation_kind_and_tagging() {
        let op = ExtraOperation::Translation {
            text: "hola".to_string(),
            target_language: "en".to_string(),
        };
        assert_eq!(op.kind(), ExtraOperationKind::Translation);
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["operation"], "translation");
    }

    #[test]
    fn test_result_constructors() {
        let id = Uuid::new_v4();
        let ok = SkillResult::success(id, "echo", ExecutionMode::Immediate, "hi".into(), 3);
        assert!(ok.success && ok.error.is_none());

        let err = SkillResult::failure(id, "echo", ExecutionMode::Immediate, "boom", 1);
        assert!(!err.success);
        assert_eq!(err.error.as_deref(), Some("boom"));

        let ack = SkillResult::accepted(id, "echo", ExecutionMode::Queued);
        assert_eq!(ack.output.unwrap()["status"], "queued");
    }
}
