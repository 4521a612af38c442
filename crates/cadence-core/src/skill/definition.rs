//! The skill capability trait.
//!
//! Every skill implements the same closed interface: describe itself,
//! validate its configuration, initialize, execute, and clean up. Optional
//! operations are advertised in metadata and dispatched through `extra`.

use std::future::Future;

use cadence_types::error::SkillError;
use cadence_types::skill::{ExtraOperation, SkillMetadata};

use super::context::SkillContext;

/// A named, independently configured unit of executable logic.
///
/// Uses RPITIT for async methods; wrap in [`BoxSkill`](super::BoxSkill)
/// for dynamic dispatch. Methods take `&self` because a skill may run
/// several executions concurrently; use interior mutability for state.
pub trait Skill: Send + Sync {
    /// Static description of this skill.
    fn metadata(&self) -> &SkillMetadata;

    /// Check the configuration the skill was constructed with.
    ///
    /// Returns the reason on failure. An invalid skill is left `Inactive`.
    fn validate_config(&self) -> Result<(), String> {
        Ok(())
    }

    /// One-time setup, run in dependency order at manager startup.
    fn init(&self) -> impl Future<Output = Result<(), SkillError>> + Send {
        async { Ok(()) }
    }

    /// Run the skill for one invocation.
    fn execute(
        &self,
        ctx: &SkillContext,
    ) -> impl Future<Output = Result<serde_json::Value, SkillError>> + Send;

    /// Run an optional operation listed in `metadata().extra_operations`.
    fn extra(
        &self,
        operation: ExtraOperation,
        ctx: &SkillContext,
    ) -> impl Future<Output = Result<serde_json::Value, SkillError>> + Send {
        let _ = ctx;
        let skill = self.metadata().name.clone();
        let operation = operation.kind().to_string();
        async move { Err(SkillError::UnsupportedOperation { skill, operation }) }
    }

    /// Release resources at shutdown.
    fn cleanup(&self) -> impl Future<Output = Result<(), SkillError>> + Send {
        async { Ok(()) }
    }
}
