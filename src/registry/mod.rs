//! Component Registry: factories, metadata snapshots and dependency resolution.
//!
//! The registry maps component names to constructors. When a factory is
//! registered it is invoked once against a placeholder context so its
//! [`ComponentMetadata`] can be inspected without binding to real paths;
//! every resolution operation works on those snapshots alone.
//!
//! Resolution is deterministic: start nodes and neighbors are visited in
//! ascending name order, and levels list their names sorted.
//!
//! # Example
//!
//! ```rust,no_run
//! use crew_installer::registry::ComponentRegistry;
//!
//! # fn example() -> anyhow::Result<()> {
//! let registry = ComponentRegistry::with_builtins()?;
//! let order = registry.resolve_dependencies(&["commands"])?;
//! assert_eq!(order, ["core", "commands"]);
//! # Ok(())
//! # }
//! ```

mod graph;

pub use graph::ComponentGraph;

use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use strsim::levenshtein;
use tracing::debug;

use crate::component::{
    Component, ComponentContext, ComponentFactory, ComponentMetadata, builtin_factories,
};
use crate::core::InstallerError;

/// A name only counts as a suggestion when it is at most this far away,
/// as a percentage of the requested name's length.
const SIMILARITY_THRESHOLD_PERCENT: usize = 50;

#[derive(Default, Clone)]
pub struct ComponentRegistry {
    factories: BTreeMap<String, ComponentFactory>,
    snapshots: BTreeMap<String, ComponentMetadata>,
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry").field("components", &self.snapshots).finish()
    }
}

impl ComponentRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in components.
    pub fn with_builtins() -> Result<Self> {
        let mut registry = Self::new();
        registry.discover_components()?;
        Ok(registry)
    }

    /// Registers every built-in component; returns how many were added.
    pub fn discover_components(&mut self) -> Result<usize> {
        let factories = builtin_factories();
        let count = factories.len();
        for (name, factory) in factories {
            self.register_factory(name, factory)?;
        }
        debug!(count, "Registered built-in components");
        Ok(count)
    }

    /// Stores `factory` under `name`, snapshotting its metadata.
    ///
    /// The snapshot's `name` must match the registration name so that the
    /// graph and the instances agree.
    pub fn register_factory(&mut self, name: &str, factory: ComponentFactory) -> Result<()> {
        if self.factories.contains_key(name) {
            return Err(InstallerError::DuplicateComponent {
                name: name.to_string(),
            }
            .into());
        }

        let snapshot = factory(&ComponentContext::placeholder()).metadata().clone();
        if snapshot.name != name {
            return Err(InstallerError::Other {
                message: format!(
                    "Factory registered as '{name}' builds component '{}'",
                    snapshot.name
                ),
            }
            .into());
        }

        debug!(component = name, version = %snapshot.version, "Registered component");
        self.factories.insert(name.to_string(), factory);
        self.snapshots.insert(name.to_string(), snapshot);
        Ok(())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.snapshots.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.snapshots.contains_key(name)
    }

    pub fn metadata(&self, name: &str) -> Option<&ComponentMetadata> {
        self.snapshots.get(name)
    }

    pub fn all_metadata(&self) -> impl Iterator<Item = &ComponentMetadata> {
        self.snapshots.values()
    }

    fn not_found(&self, name: &str) -> InstallerError {
        InstallerError::ComponentNotFound {
            name: name.to_string(),
            suggestion: self.suggest(name),
        }
    }

    /// Closest registered name within the similarity threshold.
    fn suggest(&self, name: &str) -> Option<String> {
        let max_distance = (name.len() * SIMILARITY_THRESHOLD_PERCENT / 100).max(1);
        let mut candidates: Vec<(usize, &String)> = self
            .snapshots
            .keys()
            .map(|candidate| (levenshtein(name, candidate), candidate))
            .filter(|(distance, _)| *distance <= max_distance)
            .collect();
        candidates.sort();
        candidates.first().map(|(_, candidate)| (*candidate).clone())
    }

    /// Graph of `requested` and everything it transitively depends on.
    ///
    /// Unknown requested names fail with [`InstallerError::ComponentNotFound`];
    /// unknown names reached through a dependency fail with
    /// [`InstallerError::MissingDependency`].
    fn closure_graph<S: AsRef<str>>(&self, requested: &[S]) -> Result<ComponentGraph, InstallerError> {
        let mut graph = ComponentGraph::new();
        let mut seen = BTreeSet::new();
        let mut stack = Vec::new();

        for name in requested {
            let name = name.as_ref();
            if !self.contains(name) {
                return Err(self.not_found(name));
            }
            stack.push(name.to_string());
        }

        while let Some(name) = stack.pop() {
            if !seen.insert(name.clone()) {
                continue;
            }
            graph.ensure_node(&name);
            let Some(metadata) = self.snapshots.get(&name) else {
                return Err(self.not_found(&name));
            };
            for dependency in &metadata.dependencies {
                if !self.contains(dependency) {
                    return Err(InstallerError::MissingDependency {
                        name: name.clone(),
                        dependency: dependency.clone(),
                    });
                }
                graph.add_dependency(&name, dependency);
                stack.push(dependency.clone());
            }
        }
        Ok(graph)
    }

    /// Every requested component plus its transitive dependencies, each
    /// exactly once, dependencies first.
    pub fn resolve_dependencies<S: AsRef<str>>(&self, requested: &[S]) -> Result<Vec<String>> {
        let order = self.closure_graph(requested)?.topological_order()?;
        debug!(?order, "Resolved installation order");
        Ok(order)
    }

    /// The resolved order split into levels that may run concurrently.
    pub fn installation_order<S: AsRef<str>>(&self, requested: &[S]) -> Result<Vec<Vec<String>>> {
        Ok(self.closure_graph(requested)?.levels()?)
    }

    /// Conflicts among `selected`, one human-readable line per pair.
    ///
    /// A pair is reported once even when both sides declare it.
    pub fn conflicts<S: AsRef<str>>(&self, selected: &[S]) -> Vec<String> {
        let selected: BTreeSet<&str> = selected.iter().map(AsRef::as_ref).collect();
        let mut pairs = BTreeSet::new();

        for &name in &selected {
            let Some(metadata) = self.snapshots.get(name) else {
                continue;
            };
            for other in &metadata.conflicts {
                if other != name && selected.contains(other.as_str()) {
                    let pair = if name < other.as_str() {
                        (name.to_string(), other.clone())
                    } else {
                        (other.clone(), name.to_string())
                    };
                    pairs.insert(pair);
                }
            }
        }

        pairs.into_iter().map(|(a, b)| format!("'{a}' conflicts with '{b}'")).collect()
    }

    /// Every declared dependency of `selected` is registered.
    pub fn validate_dependencies<S: AsRef<str>>(&self, selected: &[S]) -> Result<()> {
        for name in selected {
            let name = name.as_ref();
            let metadata = self.snapshots.get(name).ok_or_else(|| self.not_found(name))?;
            if let Some(dependency) = metadata.dependencies.iter().find(|d| !self.contains(d)) {
                return Err(InstallerError::MissingDependency {
                    name: name.to_string(),
                    dependency: dependency.clone(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Resolves `names` and constructs each component in dependency order.
    ///
    /// The instances share `ctx`; the whole resolved set is marked as
    /// planned so dependencies installed in the same run satisfy each
    /// other's prerequisite checks.
    pub fn create_component_instances<S: AsRef<str>>(
        &self,
        names: &[S],
        ctx: &ComponentContext,
    ) -> Result<Vec<(String, Arc<dyn Component>)>> {
        let order = self.resolve_dependencies(names)?;
        let ctx = ctx.clone().with_planned(order.iter().cloned());
        order
            .into_iter()
            .map(|name| {
                let factory = self.factories.get(&name).ok_or_else(|| self.not_found(&name))?;
                let instance = factory(&ctx);
                Ok((name, instance))
            })
            .collect()
    }

    /// Constructs `name` alone, without resolving or planning dependencies.
    pub fn create(&self, name: &str, ctx: &ComponentContext) -> Result<Arc<dyn Component>> {
        let factory = self.factories.get(name).ok_or_else(|| self.not_found(name))?;
        Ok(factory(ctx))
    }

    /// Graph of every registered component.
    fn full_graph(&self) -> ComponentGraph {
        let mut graph = ComponentGraph::new();
        for (name, metadata) in &self.snapshots {
            graph.ensure_node(name);
            for dependency in &metadata.dependencies {
                graph.add_dependency(name, dependency);
            }
        }
        graph
    }

    /// Registered components that depend on `name`, directly or transitively.
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        self.full_graph().transitive_dependents(name)
    }

    /// Dependency tree of `name` for display.
    pub fn tree_string(&self, name: &str) -> Result<String> {
        let graph = self.closure_graph(&[name])?;
        Ok(graph.to_tree_string(name))
    }
}
