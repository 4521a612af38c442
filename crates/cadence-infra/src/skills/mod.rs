//! Built-in skills shipped with the `cadence` binary.
//!
//! These are thin by intent: they exercise the manager, the execution
//! modes, and the memory wiring end to end.

pub mod echo;
pub mod note;
pub mod ping;
pub mod recall;

use cadence_core::skill::{BoxSkill, Skill, SkillRegistry};
use cadence_types::error::RegistryError;

pub use echo::EchoSkill;
pub use note::NoteSkill;
pub use ping::PingSkill;
pub use recall::RecallSkill;

/// Register every built-in skill with `registry`.
pub fn register_builtin_skills(registry: &mut SkillRegistry) -> Result<(), RegistryError> {
    registry.register(ping::NAME, |_| BoxSkill::new(PingSkill::new()), vec![])?;
    registry.register(echo::NAME, |_| BoxSkill::new(EchoSkill::new()), vec![])?;
    registry.register(note::NAME, |_| BoxSkill::new(NoteSkill::new()), vec![])?;
    let recall_deps = RecallSkill::new().metadata().dependencies.clone();
    registry.register(recall::NAME, |_| BoxSkill::new(RecallSkill::new()), recall_deps)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cadence_core::memory::{BoxMemoryPersistence, InMemoryPersistence, MemoryStore};
    use cadence_core::skill::{SkillContext, SkillManager};
    use cadence_types::config::{MemoryConfig, RuntimeConfig};
    use cadence_types::skill::{Caller, ExecutionMode, ExtraOperation, SkillState};

    use super::*;

    async fn manager() -> SkillManager {
        let mut registry = SkillRegistry::new();
        register_builtin_skills(&mut registry).unwrap();
        let store = MemoryStore::open(
            MemoryConfig::default(),
            BoxMemoryPersistence::new(InMemoryPersistence::new()),
        )
        .await
        .unwrap();
        SkillManager::start(&registry, &RuntimeConfig::default(), Arc::clone(&store))
            .await
            .unwrap()
    }

    #[test]
    fn test_builtins_register_once() {
        let mut registry = SkillRegistry::new();
        register_builtin_skills(&mut registry).unwrap();
        assert_eq!(registry.len(), 4);
        assert!(register_builtin_skills(&mut registry).is_err());

        let order = registry.resolve_order(registry.names()).unwrap();
        let note = order.iter().position(|n| n == "note").unwrap();
        let recall = order.iter().position(|n| n == "recall").unwrap();
        assert!(note < recall);
    }

    #[test]
    fn test_registered_dependencies_match_metadata() {
        let mut registry = SkillRegistry::new();
        register_builtin_skills(&mut registry).unwrap();
        for name in registry.names() {
            let skill = registry.construct(name, &Default::default()).unwrap();
            assert_eq!(
                registry.dependencies(name).unwrap(),
                skill.metadata().dependencies.as_slice(),
                "{name}"
            );
        }
        assert_eq!(registry.dependencies("recall").unwrap(), ["note".to_string()]);
    }

    #[tokio::test]
    async fn test_note_then_recall_through_manager() {
        let manager = manager().await;
        assert_eq!(manager.skill_state("recall"), Some(SkillState::Active));
        assert_eq!(manager.stats().gate_capacity, 4);

        let caller = Caller::new("alice", "cli");
        let noted = manager
            .execute(
                "note",
                SkillContext::new(caller.clone(), "Dentist appointment on Tuesday")
                    .with_param("tags", serde_json::json!("health")),
                ExecutionMode::Immediate,
            )
            .await;
        assert!(noted.success, "{:?}", noted.error);

        let recalled = manager
            .execute(
                "recall",
                SkillContext::new(caller, "when is the dentist?"),
                ExecutionMode::Immediate,
            )
            .await;
        let output = recalled.output.unwrap();
        assert_eq!(output["count"], 1);
        assert_eq!(output["memories"][0]["content"], "Dentist appointment on Tuesday");

        let entry_id = noted.output.unwrap()["id"].as_str().unwrap().to_string();
        assert!(manager.memory().get(&entry_id).unwrap().has_tag("health"));
        manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_echo_summarizes_but_ping_does_not() {
        let manager = manager().await;
        let op = ExtraOperation::Summarization {
            text: "First. Second. Third.".to_string(),
            max_sentences: Some(1),
        };
        let summary = manager
            .execute_extra("echo", op.clone(), SkillContext::new(Caller::system(), ""))
            .await;
        assert_eq!(summary.output, Some(serde_json::json!("First.")));

        let refused = manager
            .execute_extra("ping", op, SkillContext::new(Caller::system(), ""))
            .await;
        assert!(!refused.success);
    }
}
