//! In-memory dependency index for task stores.
//!
//! Design:
//! - Forward edges: task -> tasks it depends on
//! - Reverse edges: task -> tasks that depend on it (dependents)
//! - Invariant: edges and reverse_edges must be kept in sync
//!
//! This is a derived index. The dependency list on each `Task` stays the
//! source of truth and the index is rebuilt from it on every save.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use crate::domain::TaskId;

/// Dependency graph with forward and reverse adjacency.
///
/// - `edges`: TaskId -> Set of TaskIds it depends on
/// - `reverse_edges`: TaskId -> Set of TaskIds depending on it
#[derive(Debug, Default)]
pub struct DependencyGraph {
    edges: HashMap<TaskId, HashSet<TaskId>>,

    /// Enables O(1) lookup: "who depends on this task?"
    reverse_edges: HashMap<TaskId, HashSet<TaskId>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    /// On the current DFS path.
    Gray,
    /// Fully explored, no cycle through it.
    Black,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency: `task` depends on `depends_on`.
    ///
    /// Example: add_dependency(b, a) means "B waits for A"
    /// - edges: B -> {A}
    /// - reverse_edges: A -> {B}
    pub fn add_dependency(&mut self, task: TaskId, depends_on: TaskId) {
        self.edges.entry(task).or_default().insert(depends_on);
        self.reverse_edges
            .entry(depends_on)
            .or_default()
            .insert(task);
    }

    /// Remove a dependency: `task` no longer depends on `depends_on`.
    pub fn remove_dependency(&mut self, task: TaskId, depends_on: TaskId) {
        if let Entry::Occupied(mut e) = self.edges.entry(task) {
            e.get_mut().remove(&depends_on);
            if e.get().is_empty() {
                e.remove_entry();
            }
        }
        if let Entry::Occupied(mut e) = self.reverse_edges.entry(depends_on) {
            e.get_mut().remove(&task);
            if e.get().is_empty() {
                e.remove_entry();
            }
        }
    }

    /// Replace all outgoing edges of `task`.
    pub fn set_dependencies(&mut self, task: TaskId, dependencies: &[TaskId]) {
        for old in self.dependencies_of(task) {
            self.remove_dependency(task, old);
        }
        for &dep in dependencies {
            self.add_dependency(task, dep);
        }
    }

    /// Drop the outgoing edges of `task`.
    ///
    /// Incoming edges stay: other tasks still list this ID until they are
    /// updated themselves.
    pub fn remove_task(&mut self, task: TaskId) {
        self.set_dependencies(task, &[]);
    }

    /// Tasks that list `task` as a dependency.
    pub fn dependents_of(&self, task: TaskId) -> Vec<TaskId> {
        self.reverse_edges
            .get(&task)
            .map(|waiting| waiting.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn dependencies_of(&self, task: TaskId) -> Vec<TaskId> {
        self.edges
            .get(&task)
            .map(|deps| deps.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Find a cycle anywhere in the graph.
    ///
    /// Returns the cycle as a closed path (`[a, b, a]`), or `None` for a DAG.
    /// Three-color DFS: O(V + E).
    pub fn detect_cycle(&self) -> Option<Vec<TaskId>> {
        let mut color: HashMap<TaskId, Color> = HashMap::new();
        let mut path: Vec<TaskId> = Vec::new();

        for &start in self.edges.keys() {
            if color.contains_key(&start) {
                continue;
            }
            if let Some(cycle) = self.dfs_cycle(start, &mut color, &mut path) {
                return Some(cycle);
            }
        }
        None
    }

    fn dfs_cycle(
        &self,
        start: TaskId,
        color: &mut HashMap<TaskId, Color>,
        path: &mut Vec<TaskId>,
    ) -> Option<Vec<TaskId>> {
        // iterative: (node, its dependencies, next index)
        let mut stack: Vec<(TaskId, Vec<TaskId>, usize)> = Vec::new();
        color.insert(start, Color::Gray);
        path.push(start);
        stack.push((start, self.dependencies_of(start), 0));

        while let Some((node, deps, next)) = stack.last_mut() {
            let Some(&dep) = deps.get(*next) else {
                color.insert(*node, Color::Black);
                path.pop();
                stack.pop();
                continue;
            };
            *next += 1;

            match color.get(&dep) {
                Some(Color::Gray) => {
                    let from = path.iter().position(|&n| n == dep).unwrap_or(0);
                    let mut cycle = path[from..].to_vec();
                    cycle.push(dep);
                    return Some(cycle);
                }
                Some(Color::Black) => {}
                None => {
                    color.insert(dep, Color::Gray);
                    path.push(dep);
                    let deps = self.dependencies_of(dep);
                    stack.push((dep, deps, 0));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn ids<const N: usize>() -> [TaskId; N] {
        std::array::from_fn(|_| TaskId::from_ulid(Ulid::new()))
    }

    fn assert_closed_cycle(cycle: &[TaskId]) {
        assert!(cycle.len() >= 2, "cycle too short: {cycle:?}");
        assert_eq!(cycle.first(), cycle.last());
    }

    #[test]
    fn new_graph_is_empty() {
        let [a] = ids();
        let graph = DependencyGraph::new();
        assert!(graph.dependencies_of(a).is_empty());
        assert!(graph.detect_cycle().is_none());
    }

    #[test]
    fn add_dependency_creates_both_edges() {
        let [a, b] = ids();
        let mut graph = DependencyGraph::new();

        graph.add_dependency(b, a); // B depends on A

        assert!(graph.dependencies_of(a).is_empty());
        assert_eq!(graph.dependencies_of(b), vec![a]);
        assert_eq!(graph.dependents_of(a), vec![b]);
    }

    #[test]
    fn remove_dependency_removes_both_edges() {
        let [a, b] = ids();
        let mut graph = DependencyGraph::new();

        graph.add_dependency(b, a);
        graph.remove_dependency(b, a);

        assert!(graph.dependencies_of(b).is_empty());
        assert!(graph.dependents_of(a).is_empty());
    }

    #[test]
    fn set_dependencies_replaces_outgoing_edges() {
        let [a, b, c] = ids();
        let mut graph = DependencyGraph::new();

        graph.set_dependencies(c, &[a, b]);
        graph.set_dependencies(c, &[b]);

        assert_eq!(graph.dependencies_of(c), vec![b]);
        assert!(graph.dependents_of(a).is_empty());
        assert_eq!(graph.dependents_of(b), vec![c]);
    }

    #[test]
    fn remove_task_keeps_incoming_edges() {
        let [a, b, c] = ids();
        let mut graph = DependencyGraph::new();
        graph.add_dependency(b, a);
        graph.add_dependency(c, b);

        graph.remove_task(b);

        assert!(graph.dependencies_of(b).is_empty());
        assert!(graph.dependents_of(a).is_empty());
        assert_eq!(graph.dependents_of(b), vec![c]);
    }

    #[test]
    fn detect_simple_cycle() {
        let [a, b] = ids();
        let mut graph = DependencyGraph::new();

        graph.add_dependency(a, b);
        graph.add_dependency(b, a);

        let cycle = graph.detect_cycle().expect("cycle");
        assert_closed_cycle(&cycle);
        assert_eq!(cycle.len(), 3);
    }

    #[test]
    fn detect_self_dependency() {
        let [a] = ids();
        let mut graph = DependencyGraph::new();

        graph.add_dependency(a, a);

        assert_eq!(graph.detect_cycle(), Some(vec![a, a]));
    }

    #[test]
    fn detect_longer_cycle() {
        let [a, b, c, d] = ids();
        let mut graph = DependencyGraph::new();

        // B -> C -> D -> B, with A hanging off B
        graph.add_dependency(b, a);
        graph.add_dependency(c, b);
        graph.add_dependency(d, c);
        graph.add_dependency(b, d);

        let cycle = graph.detect_cycle().expect("cycle");
        assert_closed_cycle(&cycle);
        assert!(!cycle.contains(&a));
        assert_eq!(cycle.len(), 4);
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let [a, b, c] = ids();
        let mut graph = DependencyGraph::new();

        graph.add_dependency(b, a);
        graph.add_dependency(c, b);
        graph.add_dependency(c, a); // shortcut edge

        assert!(graph.detect_cycle().is_none());
    }

    #[test]
    fn dag_with_cross_edges_is_not_a_cycle() {
        let [a, b, c, d, e] = ids();
        let mut graph = DependencyGraph::new();

        //     A
        //    / \
        //   B   C
        //   |\ /|
        //   | X |
        //   |/ \|
        //   D   E
        graph.add_dependency(b, a);
        graph.add_dependency(c, a);
        graph.add_dependency(d, b);
        graph.add_dependency(e, b);
        graph.add_dependency(d, c);
        graph.add_dependency(e, c);

        assert!(graph.detect_cycle().is_none());
    }
}
