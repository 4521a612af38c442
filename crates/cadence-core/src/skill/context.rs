//! Per-invocation context handed to a skill.

use std::sync::Arc;

use uuid::Uuid;

use cadence_types::error::SkillError;
use cadence_types::skill::{Caller, ExecutionMode};

use crate::memory::MemoryStore;

/// Everything a skill sees about one request.
///
/// The manager attaches the shared memory store before execution; contexts
/// built outside the manager have none and `memory()` returns an error.
#[derive(Debug, Clone)]
pub struct SkillContext {
    pub request_id: Uuid,
    pub caller: Caller,
    pub input: String,
    pub params: serde_json::Map<String, serde_json::Value>,
    pub mode: ExecutionMode,
    memory: Option<Arc<MemoryStore>>,
}

impl SkillContext {
    pub fn new(caller: Caller, input: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            caller,
            input: input.into(),
            params: serde_json::Map::new(),
            mode: ExecutionMode::Immediate,
            memory: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn with_params(mut self, params: serde_json::Map<String, serde_json::Value>) -> Self {
        self.params.extend(params);
        self
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_str())
    }

    /// The shared memory store, when running under a manager.
    pub fn memory(&self) -> Result<&Arc<MemoryStore>, SkillError> {
        self.memory
            .as_ref()
            .ok_or_else(|| SkillError::execution("memory store is not available in this context"))
    }

    pub(crate) fn attach(&mut self, memory: Arc<MemoryStore>, mode: ExecutionMode) {
        self.memory = Some(memory);
        self.mode = mode;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_context_has_no_memory() {
        let ctx = SkillContext::new(Caller::new("u1", "cli"), "hello")
            .with_param("limit", serde_json::json!(3));
        assert!(ctx.memory().is_err());
        assert_eq!(ctx.mode, ExecutionMode::Immediate);
        assert_eq!(ctx.params["limit"], 3);
        assert!(ctx.param_str("limit").is_none());
    }

    #[test]
    fn test_request_ids_are_unique() {
        let a = SkillContext::new(Caller::system(), "");
        let b = SkillContext::new(Caller::system(), "");
        assert_ne!(a.request_id, b.request_id);
    }
}
