//! `echo`: returns its input. Also implements the summarization extra
//! operation by keeping the leading sentences of the text.

use cadence_core::skill::{Skill, SkillContext};
use cadence_types::error::SkillError;
use cadence_types::skill::{ExtraOperation, ExtraOperationKind, SkillMetadata};

pub const NAME: &str = "echo";

const DEFAULT_SUMMARY_SENTENCES: u32 = 2;

pub struct EchoSkill {
    metadata: SkillMetadata,
}

impl EchoSkill {
    pub fn new() -> Self {
        Self {
            metadata: SkillMetadata::new(NAME, env!("CARGO_PKG_VERSION"))
                .description("Return the input unchanged")
                .supports(ExtraOperationKind::Summarization),
        }
    }
}

impl Default for EchoSkill {
    fn default() -> Self {
        Self::new()
    }
}

impl Skill for EchoSkill {
    fn metadata(&self) -> &SkillMetadata {
        &self.metadata
    }

    async fn execute(&self, ctx: &SkillContext) -> Result<serde_json::Value, SkillError> {
        Ok(serde_json::Value::String(ctx.input.clone()))
    }

    async fn extra(
        &self,
        operation: ExtraOperation,
        _ctx: &SkillContext,
    ) -> Result<serde_json::Value, SkillError> {
        match operation {
            ExtraOperation::Summarization {
                text,
                max_sentences,
            } => {
                let keep = max_sentences.unwrap_or(DEFAULT_SUMMARY_SENTENCES).max(1) as usize;
                Ok(serde_json::Value::String(leading_sentences(&text, keep)))
            }
            other => Err(SkillError::UnsupportedOperation {
                skill: NAME.to_string(),
                operation: other.kind().to_string(),
            }),
        }
    }
}

fn leading_sentences(text: &str, keep: usize) -> String {
    let mut out = String::new();
    let mut count = 0;
    for (i, c) in text.char_indices() {
        if matches!(c, '.' | '!' | '?') {
            count += 1;
            if count == keep {
                out.push_str(&text[..i + c.len_utf8()]);
                return out.trim().to_string();
            }
        }
    }
    text.trim().to_string()
}
