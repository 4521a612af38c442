//! `ping`: liveness check, the usual target of a recurring schedule.

use chrono::Utc;

use cadence_core::skill::{Skill, SkillContext};
use cadence_types::error::SkillError;
use cadence_types::skill::SkillMetadata;

pub const NAME: &str = "ping";

pub struct PingSkill {
    metadata: SkillMetadata,
}

impl PingSkill {
    pub fn new() -> Self {
        Self {
            metadata: SkillMetadata::new(NAME, env!("CARGO_PKG_VERSION"))
                .description("Reply with pong and the current time")
                .timeout_secs(5)
                .tag("diagnostics"),
        }
    }
}

impl Default for PingSkill {
    fn default() -> Self {
        Self::new()
    }
}

impl Skill for PingSkill {
    fn metadata(&self) -> &SkillMetadata {
        &self.metadata
    }

    async fn execute(&self, ctx: &SkillContext) -> Result<serde_json::Value, SkillError> {
        Ok(serde_json::json!({
            "reply": "pong",
            "at": Utc::now(),
            "caller": ctx.caller.user_id,
        }))
    }
}
