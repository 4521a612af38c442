//! Application state wiring the runtime together.
//!
//! AppState owns the memory store and the skill manager, pinned to the
//! JSON-file persistence and the built-in skill set.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use cadence_core::memory::{BoxMemoryPersistence, MemoryStore};
use cadence_core::skill::{SkillManager, SkillRegistry};
use cadence_infra::filesystem::memory_dir;
use cadence_infra::persistence::JsonFilePersistence;
use cadence_infra::skills::register_builtin_skills;
use cadence_types::config::RuntimeConfig;

/// Shared application state used by every CLI command.
#[derive(Clone)]
pub struct AppState {
    pub data_dir: PathBuf,
    pub config: RuntimeConfig,
    pub store: Arc<MemoryStore>,
    pub manager: SkillManager,
}

impl AppState {
    /// Open the memory store and start the skill manager.
    pub async fn init(data_dir: PathBuf, config: RuntimeConfig) -> anyhow::Result<Self> {
        let memory_dir = memory_dir(&data_dir, &config);
        tokio::fs::create_dir_all(&memory_dir)
            .await
            .with_context(|| format!("failed to create {}", memory_dir.display()))?;

        let persistence = JsonFilePersistence::new(&memory_dir);
        let store = MemoryStore::open(config.memory.clone(), BoxMemoryPersistence::new(persistence))
            .await
            .context("failed to open memory store")?;

        let mut registry = SkillRegistry::new();
        register_builtin_skills(&mut registry)?;

        let manager = SkillManager::start(&registry, &config, Arc::clone(&store))
            .await
            .context("failed to start skill manager")?;

        tracing::debug!(
            data_dir = %data_dir.display(),
            skills = registry.len(),
            memories = store.len(),
            "application state initialized"
        );

        Ok(Self {
            data_dir,
            config,
            store,
            manager,
        })
    }

    /// Stop the manager (which flushes the store) and the store's loops.
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.manager.shutdown().await?;
        self.store.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use cadence_core::skill::SkillContext;
    use cadence_types::memory::MemoryQuery;
    use cadence_types::skill::{Caller, ExecutionMode, SkillState};

    #[tokio::test]
    async fn test_init_runs_builtin_skills_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::init(dir.path().to_path_buf(), RuntimeConfig::default())
            .await
            .unwrap();
        assert_eq!(state.manager.skill_state("ping"), Some(SkillState::Active));

        let ctx = SkillContext::new(Caller::new("tester", "cli"), "buy more coffee beans");
        let result = state.manager.execute("note", ctx, ExecutionMode::Immediate).await;
        assert!(result.success, "{:?}", result.error);
        state.shutdown().await.unwrap();

        assert!(dir.path().join("memory").join("index.json").exists());

        let reopened = AppState::init(dir.path().to_path_buf(), RuntimeConfig::default())
            .await
            .unwrap();
        let found = reopened.store.query(&MemoryQuery::new().keyword("coffee"));
        assert_eq!(found.len(), 1);
        reopened.shutdown().await.unwrap();
    }
}
