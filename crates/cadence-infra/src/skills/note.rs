//! `note`: stores its input as a memory entry.
//!
//! Params: `tags` (array of strings or a comma-separated string) and
//! `importance` (integer, clamped to 1..=10 by the store).

use cadence_core::skill::{Skill, SkillContext};
use cadence_types::error::SkillError;
use cadence_types::memory::NewMemory;
use cadence_types::skill::SkillMetadata;

pub const NAME: &str = "note";

/// Tag carried by every note, used by `recall` to skip audit entries.
pub const NOTE_TAG: &str = "user_note";

pub struct NoteSkill {
    metadata: SkillMetadata,
}

impl NoteSkill {
    pub fn new() -> Self {
        Self {
            metadata: SkillMetadata::new(NAME, env!("CARGO_PKG_VERSION"))
                .description("Remember the input as a long-term memory")
                .tag("memory"),
        }
    }
}

impl Default for NoteSkill {
    fn default() -> Self {
        Self::new()
    }
}

impl Skill for NoteSkill {
    fn metadata(&self) -> &SkillMetadata {
        &self.metadata
    }

    async fn execute(&self, ctx: &SkillContext) -> Result<serde_json::Value, SkillError> {
        let content = ctx.input.trim();
        if content.is_empty() {
            return Err(SkillError::execution("nothing to note: input is empty"));
        }

        let mut memory = NewMemory::new(content)
            .tag(NOTE_TAG)
            .tags(param_tags(&ctx.params))
            .source(format!("{NAME}:{}", ctx.caller.platform))
            .metadata("user_id", serde_json::json!(ctx.caller.user_id));
        if let Some(importance) = ctx.params.get("importance").and_then(|v| v.as_i64()) {
            memory = memory.importance(importance.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32);
        }

        let id = ctx.memory()?.store(memory).await;
        tracing::debug!(memory_id = %id, "note stored");
        Ok(serde_json::json!({ "id": id }))
    }
}

fn param_tags(params: &serde_json::Map<String, serde_json::Value>) -> Vec<String> {
    match params.get("tags") {
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::to_string)
            .collect(),
        Some(serde_json::Value::String(joined)) => joined
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use cadence_types::skill::Caller;

    use super::*;

    #[test]
    fn test_param_tags_accepts_both_shapes() {
        let mut params = serde_json::Map::new();
        params.insert("tags".into(), serde_json::json!(["a", "b", 3]));
        assert_eq!(param_tags(&params), vec!["a", "b"]);

        params.insert("tags".into(), serde_json::json!("x, y,,"));
        assert_eq!(param_tags(&params), vec!["x", "y"]);
    }

    #[tokio::test]
    async fn test_note_requires_memory_and_input() {
        let skill = NoteSkill::new();
        let empty = skill
            .execute(&SkillContext::new(Caller::system(), "   "))
            .await
            .unwrap_err();
        assert!(empty.to_string().contains("empty"));

        let detached = skill
            .execute(&SkillContext::new(Caller::system(), "buy milk"))
            .await
            .unwrap_err();
        assert!(detached.to_string().contains("memory store"));
    }
}
