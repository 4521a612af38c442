//! Skill system business logic.
//!
//! The `Skill` capability trait and its type-erased wrapper, the per-call
//! context, the static registry with dependency ordering, and the manager
//! that owns lifecycle, the concurrency gate, queued and background
//! execution, and the recurring scheduler.

pub mod box_skill;
pub mod context;
pub mod definition;
pub mod manager;
pub mod registry;
pub mod scheduler;
pub mod tasks;

pub use box_skill::BoxSkill;
pub use context::SkillContext;
pub use definition::Skill;
pub use manager::SkillManager;
pub use registry::SkillRegistry;
