//! BoxSkill -- object-safe dynamic dispatch wrapper for Skill.
//!
//! 1. Define an object-safe `SkillDyn` trait with boxed futures
//! 2. Blanket-impl `SkillDyn` for all `T: Skill`
//! 3. `BoxSkill` wraps `Box<dyn SkillDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use cadence_types::error::SkillError;
use cadence_types::skill::{ExtraOperation, SkillMetadata};

use super::context::SkillContext;
use super::definition::Skill;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe version of [`Skill`] with boxed futures.
///
/// This trait exists solely to enable dynamic dispatch (`dyn SkillDyn`).
pub trait SkillDyn: Send + Sync {
    fn metadata_dyn(&self) -> &SkillMetadata;

    fn validate_config_dyn(&self) -> Result<(), String>;

    fn init_boxed(&self) -> BoxFuture<'_, Result<(), SkillError>>;

    fn execute_boxed<'a>(
        &'a self,
        ctx: &'a SkillContext,
    ) -> BoxFuture<'a, Result<serde_json::Value, SkillError>>;

    fn extra_boxed<'a>(
        &'a self,
        operation: ExtraOperation,
        ctx: &'a SkillContext,
    ) -> BoxFuture<'a, Result<serde_json::Value, SkillError>>;

    fn cleanup_boxed(&self) -> BoxFuture<'_, Result<(), SkillError>>;
}

impl<T: Skill> SkillDyn for T {
    fn metadata_dyn(&self) -> &SkillMetadata {
        self.metadata()
    }

    fn validate_config_dyn(&self) -> Result<(), String> {
        self.validate_config()
    }

    fn init_boxed(&self) -> BoxFuture<'_, Result<(), SkillError>> {
        Box::pin(self.init())
    }

    fn execute_boxed<'a>(
        &'a self,
        ctx: &'a SkillContext,
    ) -> BoxFuture<'a, Result<serde_json::Value, SkillError>> {
        Box::pin(self.execute(ctx))
    }

    fn extra_boxed<'a>(
        &'a self,
        operation: ExtraOperation,
        ctx: &'a SkillContext,
    ) -> BoxFuture<'a, Result<serde_json::Value, SkillError>> {
        Box::pin(self.extra(operation, ctx))
    }

    fn cleanup_boxed(&self) -> BoxFuture<'_, Result<(), SkillError>> {
        Box::pin(self.cleanup())
    }
}

/// Type-erased skill, as produced by registry constructors.
pub struct BoxSkill {
    inner: Box<dyn SkillDyn + Send + Sync>,
}

impl BoxSkill {
    pub fn new<T: Skill + 'static>(skill: T) -> Self {
        Self {
            inner: Box::new(skill),
        }
    }

    pub fn metadata(&self) -> &SkillMetadata {
        self.inner.metadata_dyn()
    }

    pub fn validate_config(&self) -> Result<(), String> {
        self.inner.validate_config_dyn()
    }

    pub async fn init(&self) -> Result<(), SkillError> {
        self.inner.init_boxed().await
    }

    pub async fn execute(&self, ctx: &SkillContext) -> Result<serde_json::Value, SkillError> {
        self.inner.execute_boxed(ctx).await
    }

    pub async fn extra(
        &self,
        operation: ExtraOperation,
        ctx: &SkillContext,
    ) -> Result<serde_json::Value, SkillError> {
        self.inner.extra_boxed(operation, ctx).await
    }

    pub async fn cleanup(&self) -> Result<(), SkillError> {
        self.inner.cleanup_boxed().await
    }
}

impl std::fmt::Debug for BoxSkill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxSkill")
            .field("name", &self.metadata().name)
            .finish()
    }
}
