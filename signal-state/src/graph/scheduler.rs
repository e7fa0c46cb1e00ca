//! Update Scheduler
//!
//! The scheduler determines the order in which dependents of a changed node
//! should be refreshed. It ensures that dependencies are always processed
//! before their dependents.
//!
//! # Algorithm
//!
//! 1. When a source node changes, walk its dependents breadth-first and
//!    collect every node reachable from it.
//! 2. Sort the collected nodes topologically (dependencies before dependents)
//!    using Kahn's algorithm restricted to the collected set.
//! 3. The runtime marks derived nodes dirty and runs effect nodes in that
//!    order. Derived nodes are lazy and recompute on their next read.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;

use super::node::{Node, NodeId, NodeKind};

/// The update scheduler owns the dependency graph.
pub struct UpdateScheduler {
    /// All nodes in the graph, indexed by ID. Order is not meaningful;
    /// propagation order comes from the edge sets.
    nodes: IndexMap<NodeId, Node>,
}

impl UpdateScheduler {
    /// Create a new empty scheduler.
    pub fn new() -> Self {
        Self {
            nodes: IndexMap::new(),
        }
    }

    /// Add a node to the graph. Adding an id twice keeps the existing edges.
    pub fn add_node(&mut self, id: NodeId, kind: NodeKind) {
        self.nodes.entry(id).or_insert_with(|| Node::new(id, kind));
    }

    /// Remove a node from the graph, along with every edge touching it.
    pub fn remove_node(&mut self, node_id: NodeId) {
        let Some(node) = self.nodes.swap_remove(&node_id) else {
            return;
        };

        for dep_id in node.dependencies() {
            if let Some(dep) = self.nodes.get_mut(dep_id) {
                dep.remove_dependent(node_id);
            }
        }

        for dependent_id in node.dependents() {
            if let Some(dependent) = self.nodes.get_mut(dependent_id) {
                dependent.remove_dependency(node_id);
            }
        }
    }

    pub fn contains(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    pub fn get_node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Add a dependency edge: `dependent` reads from `dependency`.
    ///
    /// Both ends must already be in the graph; returns whether a new edge
    /// was recorded.
    pub fn add_edge(&mut self, dependency: NodeId, dependent: NodeId) -> bool {
        if dependency == dependent
            || !self.nodes.contains_key(&dependency)
            || !self.nodes.contains_key(&dependent)
        {
            return false;
        }

        let added = self
            .nodes
            .get_mut(&dependent)
            .map(|node| node.add_dependency(dependency))
            .unwrap_or(false);
        if let Some(dep_node) = self.nodes.get_mut(&dependency) {
            dep_node.add_dependent(dependent);
        }
        added
    }

    /// Remove every incoming edge of `node_id`.
    ///
    /// Called before a computation re-runs so that it only stays subscribed
    /// to what the new run actually reads.
    pub fn clear_dependencies(&mut self, node_id: NodeId) {
        let Some(node) = self.nodes.get_mut(&node_id) else {
            return;
        };

        for dep_id in node.take_dependencies() {
            if let Some(dep) = self.nodes.get_mut(&dep_id) {
                dep.remove_dependent(node_id);
            }
        }
    }

    /// Collect every node downstream of `source_id`, in topological order.
    ///
    /// The source itself is not included.
    pub fn affected(&self, source_id: NodeId) -> Vec<NodeId> {
        let mut collected = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();

        if let Some(source) = self.nodes.get(&source_id) {
            queue.extend(source.dependents().iter().copied());
        }
        visited.insert(source_id);

        while let Some(node_id) = queue.pop_front() {
            if !visited.insert(node_id) {
                continue;
            }
            if let Some(node) = self.nodes.get(&node_id) {
                collected.push(node_id);
                queue.extend(node.dependents().iter().copied());
            }
        }

        self.topological_sort(collected)
    }

    /// Sort the given nodes so that dependencies come before dependents.
    fn topological_sort(&self, nodes: Vec<NodeId>) -> Vec<NodeId> {
        let node_set: HashSet<_> = nodes.iter().copied().collect();
        let mut in_degree: HashMap<NodeId, usize> = HashMap::new();
        let mut result = Vec::with_capacity(nodes.len());
        let mut queue = VecDeque::new();

        // In-degrees only count edges within the collected set
        for &node_id in &nodes {
            if let Some(node) = self.nodes.get(&node_id) {
                let degree = node
                    .dependencies()
                    .iter()
                    .filter(|d| node_set.contains(d))
                    .count();
                in_degree.insert(node_id, degree);
                if degree == 0 {
                    queue.push_back(node_id);
                }
            }
        }

        // Kahn's algorithm
        while let Some(node_id) = queue.pop_front() {
            result.push(node_id);

            if let Some(node) = self.nodes.get(&node_id) {
                for dependent_id in node.dependents() {
                    if let Some(degree) = in_degree.get_mut(dependent_id) {
                        *degree = degree.saturating_sub(1);
                        if *degree == 0 {
                            queue.push_back(*dependent_id);
                        }
                    }
                }
            }
        }

        result
    }

    /// Get the total number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl Default for UpdateScheduler {
    fn default() -> Self {
        Self::new()
    }
}
