//! Dependency graph over component names.
//!
//! Edges point from a component to each of its dependencies. Every traversal
//! visits names in ascending order, so identical inputs always produce
//! identical orders.

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::core::InstallerError;

/// Color states for cycle detection using DFS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Not visited yet.
    White,
    /// On the current DFS path.
    Gray,
    /// Fully explored.
    Black,
}

#[derive(Debug, Default)]
pub struct ComponentGraph {
    graph: DiGraph<String, ()>,
    node_map: BTreeMap<String, NodeIndex>,
}

impl ComponentGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `name` if missing and returns its index.
    pub fn ensure_node(&mut self, name: &str) -> NodeIndex {
        if let Some(&index) = self.node_map.get(name) {
            return index;
        }
        let index = self.graph.add_node(name.to_string());
        self.node_map.insert(name.to_string(), index);
        index
    }

    /// `from` depends on `to`: `to` must be installed first.
    pub fn add_dependency(&mut self, from: &str, to: &str) {
        let from_idx = self.ensure_node(from);
        let to_idx = self.ensure_node(to);
        if !self.graph.contains_edge(from_idx, to_idx) {
            self.graph.add_edge(from_idx, to_idx, ());
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.node_map.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    fn sorted_neighbors(&self, node: NodeIndex, direction: Direction) -> Vec<NodeIndex> {
        let mut neighbors: Vec<NodeIndex> =
            self.graph.neighbors_directed(node, direction).collect();
        neighbors.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));
        neighbors.dedup();
        neighbors
    }

    /// Direct dependencies of `name`, sorted.
    pub fn dependencies_of(&self, name: &str) -> Vec<String> {
        self.node_map
            .get(name)
            .map(|&idx| {
                self.sorted_neighbors(idx, Direction::Outgoing)
                    .into_iter()
                    .map(|n| self.graph[n].clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every component that depends on `name`, directly or transitively, sorted.
    pub fn transitive_dependents(&self, name: &str) -> Vec<String> {
        let Some(&start) = self.node_map.get(name) else {
            return Vec::new();
        };

        let mut seen = BTreeSet::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            for dependent in self.graph.neighbors_directed(current, Direction::Incoming) {
                if seen.insert(self.graph[dependent].clone()) {
                    stack.push(dependent);
                }
            }
        }
        seen.into_iter().collect()
    }

    /// Fails with the offending cycle, rendered `a → b → a`.
    pub fn detect_cycles(&self) -> Result<(), InstallerError> {
        let mut colors: HashMap<NodeIndex, Color> =
            self.node_map.values().map(|&idx| (idx, Color::White)).collect();
        let mut path: Vec<NodeIndex> = Vec::new();

        for &node in self.node_map.values() {
            if colors.get(&node) == Some(&Color::White)
                && let Some(cycle) = self.dfs_visit(node, &mut colors, &mut path)
            {
                let chain = cycle.iter().map(|&idx| self.graph[idx].as_str()).collect::<Vec<_>>().join(" → ");
                return Err(InstallerError::CircularDependency {
                    chain,
                });
            }
        }
        Ok(())
    }

    fn dfs_visit(
        &self,
        node: NodeIndex,
        colors: &mut HashMap<NodeIndex, Color>,
        path: &mut Vec<NodeIndex>,
    ) -> Option<Vec<NodeIndex>> {
        colors.insert(node, Color::Gray);
        path.push(node);

        for neighbor in self.sorted_neighbors(node, Direction::Outgoing) {
            match colors.get(&neighbor) {
                Some(Color::Gray) => {
                    let start = path.iter().position(|&n| n == neighbor).unwrap_or(0);
                    let mut cycle = path[start..].to_vec();
                    cycle.push(neighbor);
                    return Some(cycle);
                }
                Some(Color::White) => {
                    if let Some(cycle) = self.dfs_visit(neighbor, colors, path) {
                        return Some(cycle);
                    }
                }
                _ => {}
            }
        }

        path.pop();
        colors.insert(node, Color::Black);
        None
    }

    /// Dependencies strictly before dependents.
    ///
    /// Post-order DFS, starting from names in ascending order and visiting
    /// dependencies in ascending order. Fails on a cycle without returning
    /// any partial order.
    pub fn topological_order(&self) -> Result<Vec<String>, InstallerError> {
        self.detect_cycles()?;

        let mut visited = BTreeSet::new();
        let mut order = Vec::with_capacity(self.len());
        for &node in self.node_map.values() {
            self.post_order(node, &mut visited, &mut order);
        }
        Ok(order)
    }

    fn post_order(&self, node: NodeIndex, visited: &mut BTreeSet<NodeIndex>, order: &mut Vec<String>) {
        if !visited.insert(node) {
            return;
        }
        for dependency in self.sorted_neighbors(node, Direction::Outgoing) {
            self.post_order(dependency, visited, order);
        }
        order.push(self.graph[node].clone());
    }

    /// Partitions the topological order into levels: level `k` holds every
    /// component whose dependencies all sit in levels below `k`. Names within
    /// a level are sorted.
    pub fn levels(&self) -> Result<Vec<Vec<String>>, InstallerError> {
        let order = self.topological_order()?;
        let mut level_of: HashMap<&str, usize> = HashMap::new();
        let mut levels: Vec<Vec<String>> = Vec::new();

        for name in &order {
            let level = self
                .dependencies_of(name)
                .iter()
                .filter_map(|dep| level_of.get(dep.as_str()))
                .map(|l| l + 1)
                .max()
                .unwrap_or(0);
            level_of.insert(name, level);
            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(name.clone());
        }

        for level in &mut levels {
            level.sort();
        }
        Ok(levels)
    }

    /// Dependency tree of `root` with box-drawing connectors.
    pub fn to_tree_string(&self, root: &str) -> String {
        let mut result = format!("{root}\n");
        let mut visited = BTreeSet::new();
        visited.insert(root.to_string());
        let deps = self.dependencies_of(root);
        for (i, dep) in deps.iter().enumerate() {
            self.build_tree_string(dep, &mut result, "", i == deps.len() - 1, &mut visited);
        }
        result
    }

    fn build_tree_string(
        &self,
        name: &str,
        result: &mut String,
        prefix: &str,
        is_last: bool,
        visited: &mut BTreeSet<String>,
    ) {
        let connector = if is_last { "└── " } else { "├── " };
        result.push_str(&format!("{prefix}{connector}{name}\n"));

        let child_prefix = if is_last { format!("{prefix}    ") } else { format!("{prefix}│   ") };
        if !visited.insert(name.to_string()) {
            result.push_str(&format!("{child_prefix}└── (circular reference)\n"));
            return;
        }

        let deps = self.dependencies_of(name);
        for (i, dep) in deps.iter().enumerate() {
            self.build_tree_string(dep, result, &child_prefix, i == deps.len() - 1, visited);
        }
        visited.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &str)]) -> ComponentGraph {
        let mut graph = ComponentGraph::new();
        for (from, to) in edges {
            graph.add_dependency(from, to);
        }
        graph
    }

    #[test]
    fn test_chain_order() {
        let graph = graph(&[("a", "b"), ("b", "c")]);
        assert_eq!(graph.topological_order().unwrap(), ["c", "b", "a"]);
    }

    #[test]
    fn test_diamond_order_is_deterministic() {
        let graph = graph(&[("top", "left"), ("top", "right"), ("left", "base"), ("right", "base")]);
        assert_eq!(graph.topological_order().unwrap(), ["base", "left", "right", "top"]);
        assert_eq!(
            graph.levels().unwrap(),
            vec![vec!["base".to_string()], vec!["left".into(), "right".into()], vec!["top".into()]]
        );
    }

    #[test]
    fn test_cycle_is_named() {
        let graph = graph(&[("a", "b"), ("b", "c"), ("c", "a")]);
        let err = graph.topological_order().unwrap_err();
        let InstallerError::CircularDependency { chain } = &err else {
            panic!("expected a circular dependency, got {err:?}");
        };
        assert_eq!(chain, "a → b → c → a");
        assert!(graph.levels().is_err());
    }

    #[test]
    fn test_self_dependency() {
        let graph = graph(&[("a", "a")]);
        assert!(graph.detect_cycles().is_err());
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let graph = graph(&[("a", "b"), ("a", "b")]);
        assert_eq!(graph.dependencies_of("a"), ["b"]);
    }

    #[test]
    fn test_transitive_dependents() {
        let graph = graph(&[("commands", "core"), ("extras", "commands"), ("hooks", "core")]);
        assert_eq!(graph.transitive_dependents("core"), ["commands", "extras", "hooks"]);
        assert!(graph.transitive_dependents("extras").is_empty());
    }

    #[test]
    fn test_tree_string() {
        let graph = graph(&[("app", "lib"), ("app", "util"), ("lib", "util")]);
        assert_eq!(graph.to_tree_string("app"), "app\n├── lib\n│   └── util\n└── util\n");
    }
}
