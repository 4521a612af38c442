//! Skill type registry and dependency ordering.
//!
//! The registry maps names to constructors plus their declared
//! dependencies. `resolve_order` produces an initialization order in which
//! every dependency precedes its dependents, using a depth-first walk with
//! an in-progress set for cycle detection.

use std::collections::{HashMap, HashSet};

use cadence_types::config::SkillSettings;
use cadence_types::error::RegistryError;

use super::box_skill::BoxSkill;

/// Builds a skill instance from its settings.
pub type SkillConstructor = Box<dyn Fn(&SkillSettings) -> BoxSkill + Send + Sync>;

struct Registration {
    constructor: SkillConstructor,
    dependencies: Vec<String>,
}

/// Name -> constructor table. Read-only once the manager has started.
#[derive(Default)]
pub struct SkillRegistry {
    entries: HashMap<String, Registration>,
    order: Vec<String>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a skill type. Names are unique.
    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        constructor: F,
        dependencies: Vec<String>,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&SkillSettings) -> BoxSkill + Send + Sync + 'static,
    {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(RegistryError::DuplicateSkill(name));
        }
        tracing::debug!(skill = %name, ?dependencies, "registered skill type");
        self.entries.insert(
            name.clone(),
            Registration {
                constructor: Box::new(constructor),
                dependencies,
            },
        );
        self.order.push(name);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn dependencies(&self, name: &str) -> Option<&[String]> {
        self.entries.get(name).map(|r| r.dependencies.as_slice())
    }

    /// Construct an instance of `name` with `settings`.
    pub fn construct(&self, name: &str, settings: &SkillSettings) -> Result<BoxSkill, RegistryError> {
        let registration = self
            .entries
            .get(name)
            .ok_or_else(|| RegistryError::UnknownSkill(name.to_string()))?;
        Ok((registration.constructor)(settings))
    }

    /// Order `names` so that each appears after all of its registered
    /// dependencies that are also in `names`.
    ///
    /// Dependencies that are not registered are skipped. The output is a
    /// permutation of the input and is deterministic for a given input.
    pub fn resolve_order(&self, names: &[String]) -> Result<Vec<String>, RegistryError> {
        for name in names {
            if !self.entries.contains_key(name) {
                return Err(RegistryError::UnknownSkill(name.clone()));
            }
        }

        let requested: HashSet<&str> = names.iter().map(String::as_str).collect();
        let mut visiting = HashSet::new();
        let mut visited = HashSet::new();
        let mut ordered = Vec::with_capacity(names.len());

        for name in names {
            self.visit(name, &mut visiting, &mut visited, &mut ordered)?;
        }

        ordered.retain(|name| requested.contains(name.as_str()));
        Ok(ordered)
    }

    fn visit(
        &self,
        name: &str,
        visiting: &mut HashSet<String>,
        visited: &mut HashSet<String>,
        ordered: &mut Vec<String>,
    ) -> Result<(), RegistryError> {
        if visited.contains(name) {
            return Ok(());
        }
        if !visiting.insert(name.to_string()) {
            return Err(RegistryError::CircularDependency(name.to_string()));
        }

        if let Some(registration) = self.entries.get(name) {
            for dep in &registration.dependencies {
                if !self.entries.contains_key(dep) {
                    tracing::warn!(skill = %name, dependency = %dep, "dependency not registered, skipping");
                    continue;
                }
                self.visit(dep, visiting, visited, ordered)?;
            }
        }

        visiting.remove(name);
        visited.insert(name.to_string());
        ordered.push(name.to_string());
        Ok(())
    }
}

impl std::fmt::Debug for SkillRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillRegistry")
            .field("skills", &self.order)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use cadence_types::error::SkillError;
    use cadence_types::skill::SkillMetadata;

    use super::*;
    use crate::skill::{Skill, SkillContext};

    struct Noop {
        metadata: SkillMetadata,
    }

    impl Skill for Noop {
        fn metadata(&self) -> &SkillMetadata {
            &self.metadata
        }

        async fn execute(&self, _ctx: &SkillContext) -> Result<serde_json::Value, SkillError> {
            Ok(serde_json::Value::Null)
        }
    }

    fn registry(edges: &[(&str, &[&str])]) -> SkillRegistry {
        let mut registry = SkillRegistry::new();
        for (name, deps) in edges {
            let owned = name.to_string();
            registry
                .register(
                    *name,
                    move |_settings| {
                        BoxSkill::new(Noop {
                            metadata: SkillMetadata::new(owned.clone(), "0.1.0"),
                        })
                    },
                    deps.iter().map(|d| d.to_string()).collect(),
                )
                .unwrap();
        }
        registry
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn position(order: &[String], name: &str) -> usize {
        order.iter().position(|n| n == name).unwrap()
    }

    #[test]
    fn test_chain_orders_dependencies_first() {
        let reg = registry(&[("a", &["b"]), ("b", &["c"]), ("c", &[])]);
        let order = reg.resolve_order(&names(&["a", "b", "c"])).unwrap();
        assert_eq!(order, names(&["c", "b", "a"]));
    }

    #[test]
    fn test_fan_out() {
        let reg = registry(&[("app", &["db", "cache", "log"]), ("db", &[]), ("cache", &[]), ("log", &[])]);
        let order = reg.resolve_order(&names(&["app", "db", "cache", "log"])).unwrap();
        assert_eq!(order.len(), 4);
        assert_eq!(order.last().unwrap(), "app");
    }

    #[test]
    fn test_diamond() {
        let reg = registry(&[("top", &["left", "right"]), ("left", &["base"]), ("right", &["base"]), ("base", &[])]);
        let order = reg
            .resolve_order(&names(&["top", "left", "right", "base"]))
            .unwrap();
        assert_eq!(order.len(), 4);
        assert!(position(&order, "base") < position(&order, "left"));
        assert!(position(&order, "base") < position(&order, "right"));
        assert!(position(&order, "left") < position(&order, "top"));
        assert!(position(&order, "right") < position(&order, "top"));
    }

    #[test]
    fn test_cycle_is_reported() {
        let reg = registry(&[("a", &["b"]), ("b", &["a"])]);
        let err = reg.resolve_order(&names(&["a", "b"])).unwrap_err();
        assert!(matches!(err, RegistryError::CircularDependency(_)));
        assert!(err.to_string().contains("circular dependency"));
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let reg = registry(&[("loop", &["loop"])]);
        assert_eq!(
            reg.resolve_order(&names(&["loop"])).unwrap_err(),
            RegistryError::CircularDependency("loop".to_string())
        );
    }

    #[test]
    fn test_unregistered_dependency_is_skipped() {
        let reg = registry(&[("a", &["ghost"])]);
        assert_eq!(reg.resolve_order(&names(&["a"])).unwrap(), names(&["a"]));
    }

    #[test]
    fn test_unknown_input_name_is_rejected() {
        let reg = registry(&[("a", &[])]);
        assert_eq!(
            reg.resolve_order(&names(&["a", "nope"])).unwrap_err(),
            RegistryError::UnknownSkill("nope".to_string())
        );
    }

    #[test]
    fn test_output_limited_to_requested_names() {
        let reg = registry(&[("a", &["b"]), ("b", &[])]);
        assert_eq!(reg.resolve_order(&names(&["a"])).unwrap(), names(&["a"]));
    }

    #[test]
    fn test_order_is_deterministic() {
        let reg = registry(&[("x", &["y", "z"]), ("y", &[]), ("z", &["y"])]);
        let input = names(&["x", "y", "z"]);
        let first = reg.resolve_order(&input).unwrap();
        for _ in 0..10 {
            assert_eq!(reg.resolve_order(&input).unwrap(), first);
        }
        assert_eq!(first, names(&["y", "z", "x"]));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut reg = registry(&[("a", &[])]);
        let err = reg
            .register(
                "a",
                |_s| {
                    BoxSkill::new(Noop {
                        metadata: SkillMetadata::new("a", "0.2.0"),
                    })
                },
                vec![],
            )
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateSkill("a".to_string()));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_construct_uses_constructor() {
        let reg = registry(&[("a", &[])]);
        let skill = reg.construct("a", &SkillSettings::default()).unwrap();
        assert_eq!(skill.metadata().name, "a");
        assert!(reg.construct("b", &SkillSettings::default()).is_err());
    }

    // -----------------------------------------------------------------------
    // Properties over random graphs
    // -----------------------------------------------------------------------

    use proptest::prelude::*;

    /// Node `i` may only depend on nodes `j < i`, so every graph is acyclic.
    fn acyclic_graph() -> impl Strategy<Value = Vec<Vec<usize>>> {
        (1usize..12).prop_flat_map(|n| {
            proptest::collection::vec(proptest::collection::vec(0..n, 0..4), n).prop_map(|raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(i, deps)| {
                        let mut deps: Vec<usize> = deps.into_iter().filter(|&j| j < i).collect();
                        deps.sort_unstable();
                        deps.dedup();
                        deps
                    })
                    .collect()
            })
        })
    }

    fn node(i: usize) -> String {
        format!("s{i}")
    }

    fn build(graph: &[Vec<usize>], order: &[usize]) -> SkillRegistry {
        let mut registry = SkillRegistry::new();
        for &i in order {
            let name = node(i);
            let owned = name.clone();
            registry
                .register(
                    name,
                    move |_settings| {
                        BoxSkill::new(Noop {
                            metadata: SkillMetadata::new(owned.clone(), "0.1.0"),
                        })
                    },
                    graph[i].iter().map(|&j| node(j)).collect(),
                )
                .unwrap();
        }
        registry
    }

    proptest! {
        #[test]
        fn test_acyclic_graphs_resolve_to_valid_permutations(
            (graph, order) in acyclic_graph().prop_flat_map(|graph| {
                let order = Just((0..graph.len()).collect::<Vec<_>>()).prop_shuffle();
                (Just(graph), order)
            })
        ) {
            let registry = build(&graph, &order);
            let input: Vec<String> = order.iter().map(|&i| node(i)).collect();
            let resolved = registry.resolve_order(&input).unwrap();

            let mut sorted_input = input.clone();
            sorted_input.sort();
            let mut sorted_out = resolved.clone();
            sorted_out.sort();
            prop_assert_eq!(sorted_out, sorted_input);

            for (i, deps) in graph.iter().enumerate() {
                for &j in deps {
                    prop_assert!(position(&resolved, &node(j)) < position(&resolved, &node(i)));
                }
            }
        }

        #[test]
        fn test_graphs_with_a_back_edge_never_resolve(graph in acyclic_graph()) {
            let Some(i) = graph.iter().position(|deps| !deps.is_empty()) else {
                return Ok(());
            };
            let mut cyclic = graph.clone();
            let j = graph[i][0];
            cyclic[j].push(i);

            let order: Vec<usize> = (0..cyclic.len()).collect();
            let registry = build(&cyclic, &order);
            let input: Vec<String> = order.iter().map(|&k| node(k)).collect();
            let is_cycle = matches!(
                registry.resolve_order(&input),
                Err(RegistryError::CircularDependency(_))
            );
            prop_assert!(is_cycle);
        }
    }
}
