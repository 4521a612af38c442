//! `recall`: searches notes by the words of its input.
//!
//! Params: `limit` (default 5) and `sort_by` (`relevance`, `recency`,
//! `importance`, or `access_count`).

use cadence_core::skill::{Skill, SkillContext};
use cadence_types::error::SkillError;
use cadence_types::memory::{MemoryQuery, SortBy};
use cadence_types::skill::SkillMetadata;

use super::note::{self, NOTE_TAG};

pub const NAME: &str = "recall";

const DEFAULT_LIMIT: usize = 5;
/// Words shorter than this are not used as search keywords.
const MIN_KEYWORD_LEN: usize = 3;

pub struct RecallSkill {
    metadata: SkillMetadata,
}

impl RecallSkill {
    pub fn new() -> Self {
        Self {
            metadata: SkillMetadata::new(NAME, env!("CARGO_PKG_VERSION"))
                .description("Find notes matching the words of the input")
                .depends_on(note::NAME)
                .max_concurrent(4)
                .tag("memory"),
        }
    }
}

impl Default for RecallSkill {
    fn default() -> Self {
        Self::new()
    }
}

impl Skill for RecallSkill {
    fn metadata(&self) -> &SkillMetadata {
        &self.metadata
    }

    async fn execute(&self, ctx: &SkillContext) -> Result<serde_json::Value, SkillError> {
        let limit = ctx
            .params
            .get("limit")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_LIMIT);
        let sort_by = match ctx.param_str("sort_by") {
            Some(raw) => raw
                .parse::<SortBy>()
                .map_err(SkillError::execution)?,
            None => SortBy::Relevance,
        };

        let mut query = MemoryQuery::new().tag(NOTE_TAG).limit(limit).sort_by(sort_by);
        for word in keywords(&ctx.input) {
            query = query.keyword(word);
        }

        let found = ctx.memory()?.query(&query);
        let items: Vec<serde_json::Value> = found
            .iter()
            .map(|entry| {
                serde_json::json!({
                    "id": entry.id,
                    "content": entry.content,
                    "importance": entry.importance,
                    "created_at": entry.created_at,
                })
            })
            .collect();
        Ok(serde_json::json!({ "count": items.len(), "memories": items }))
    }
}

fn keywords(input: &str) -> Vec<String> {
    input
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= MIN_KEYWORD_LEN)
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_skip_short_words() {
        assert_eq!(keywords("Did I buy the milk?"), vec!["did", "buy", "the", "milk"]);
        assert!(keywords("a b c").is_empty());
    }

    #[test]
    fn test_recall_depends_on_note() {
        assert_eq!(RecallSkill::new().metadata().dependencies, vec!["note".to_string()]);
    }
}
