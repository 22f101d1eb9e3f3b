//! Dependency graph for tasks
//!
//! Built from a project's task `depends_on` lists, with cycle detection,
//! blocked/ready queries and critical-path computation.
//! Uses petgraph for graph operations.
//!
//! Edge direction is `task -> dependency`, so following edges forward walks
//! toward the work that must finish first. Every node in the project is a
//! vertex, but only tasks have outgoing edges; dependencies on non-task nodes
//! are inert for cycle and blocking purposes.

use petgraph::algo::{has_path_connecting, is_cyclic_directed, tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;
use thiserror::Error;

use super::node::TaskStatus;
use super::project::Project;

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("Dependency cycle detected: {}", .0.join(" -> "))]
    CycleDetected(Vec<String>),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Self-dependency not allowed: {0}")]
    SelfDependency(String),

    #[error("Only tasks can have dependencies: {0}")]
    NotATask(String),
}

/// A dependency graph over one project's nodes
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// The underlying directed graph
    graph: DiGraph<String, ()>,

    /// Map from node ID to node index
    node_map: HashMap<String, NodeIndex>,

    /// Status of every task; non-task nodes are absent
    task_status: HashMap<String, TaskStatus>,
}

impl DependencyGraph {
    /// Creates an empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the graph from a project's nodes
    pub fn from_project(project: &Project) -> Self {
        let mut graph = Self::new();

        // Sorted insertion keeps node indices (and therefore tie-breaks) stable
        let mut nodes: Vec<_> = project.nodes.values().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));

        // First pass: add all nodes
        for node in &nodes {
            let idx = graph.graph.add_node(node.id.clone());
            graph.node_map.insert(node.id.clone(), idx);
            if let Some(task) = node.as_task() {
                graph.task_status.insert(node.id.clone(), task.status);
            }
        }

        // Second pass: add edges that point at existing nodes
        for node in &nodes {
            let Some(task) = node.as_task() else {
                continue;
            };
            let from = graph.node_map[&node.id];
            for dep_id in &task.depends_on {
                match graph.node_map.get(dep_id) {
                    Some(&to) => {
                        graph.graph.update_edge(from, to, ());
                    }
                    None => {
                        tracing::debug!(task = %node.id, dependency = %dep_id, "ignoring dangling dependency");
                    }
                }
            }
        }

        graph
    }

    /// Returns true if adding the edge `node_id -> new_dependency_id` would close a cycle.
    ///
    /// That is the case exactly when `node_id` is already reachable from
    /// `new_dependency_id`. A self-reference always counts as a cycle.
    pub fn would_create_cycle(&self, node_id: &str, new_dependency_id: &str) -> bool {
        if node_id == new_dependency_id {
            return true;
        }

        match (self.node_map.get(node_id), self.node_map.get(new_dependency_id)) {
            (Some(&node_idx), Some(&dep_idx)) => {
                has_path_connecting(&self.graph, dep_idx, node_idx, None)
            }
            _ => false,
        }
    }

    fn is_incomplete_task(&self, id: &str) -> bool {
        self.task_status
            .get(id)
            .is_some_and(|status| !status.is_complete())
    }

    /// Returns the incomplete task dependencies of a node
    fn incomplete_task_dependencies(&self, idx: NodeIndex) -> impl Iterator<Item = &String> {
        self.graph
            .neighbors_directed(idx, Direction::Outgoing)
            .map(|dep| &self.graph[dep])
            .filter(|dep_id| self.is_incomplete_task(dep_id))
    }

    /// Returns incomplete tasks gated by at least one incomplete task dependency, sorted by ID
    pub fn blocked_tasks(&self) -> Vec<String> {
        let mut blocked: Vec<_> = self
            .task_status
            .iter()
            .filter(|(_, status)| !status.is_complete())
            .filter(|(id, _)| {
                self.incomplete_task_dependencies(self.node_map[*id])
                    .next()
                    .is_some()
            })
            .map(|(id, _)| id.clone())
            .collect();
        blocked.sort();
        blocked
    }

    /// Returns incomplete tasks whose task dependencies are all complete, sorted by ID
    pub fn ready_tasks(&self) -> Vec<String> {
        let mut ready: Vec<_> = self
            .task_status
            .iter()
            .filter(|(_, status)| !status.is_complete())
            .filter(|(id, _)| {
                self.incomplete_task_dependencies(self.node_map[*id])
                    .next()
                    .is_none()
            })
            .map(|(id, _)| id.clone())
            .collect();
        ready.sort();
        ready
    }

    /// Returns the incomplete task dependencies of a task, sorted by ID
    pub fn blockers(&self, task_id: &str) -> Vec<String> {
        let Some(&idx) = self.node_map.get(task_id) else {
            return Vec::new();
        };
        let mut blockers: Vec<_> = self.incomplete_task_dependencies(idx).cloned().collect();
        blockers.sort();
        blockers
    }

    fn neighbors_sorted(&self, id: &str, direction: Direction) -> Vec<String> {
        let Some(&idx) = self.node_map.get(id) else {
            return Vec::new();
        };
        let mut ids: Vec<_> = self
            .graph
            .neighbors_directed(idx, direction)
            .map(|n| self.graph[n].clone())
            .collect();
        ids.sort();
        ids
    }

    /// Returns the direct dependencies of a node
    pub fn dependencies(&self, id: &str) -> Vec<String> {
        self.neighbors_sorted(id, Direction::Outgoing)
    }

    /// Returns the direct dependents of a node (tasks that depend on it)
    pub fn dependents(&self, id: &str) -> Vec<String> {
        self.neighbors_sorted(id, Direction::Incoming)
    }

    /// Returns all nodes in dependency order (dependencies before dependents)
    pub fn topological_order(&self) -> Result<Vec<String>, GraphError> {
        match toposort(&self.graph, None) {
            Ok(order) => Ok(order
                .into_iter()
                .rev()
                .map(|idx| self.graph[idx].clone())
                .collect()),
            Err(_) => Err(GraphError::CycleDetected(find_cycle(&self.graph))),
        }
    }

    /// Returns the longest chain of incomplete tasks linked by dependencies.
    ///
    /// The chain starts at the task nothing incomplete depends on and ends at
    /// the task with no incomplete dependencies. Ties are broken by ID.
    pub fn critical_path(&self) -> Result<Vec<String>, GraphError> {
        // Any cycle is fatal, even one that runs through completed tasks
        if is_cyclic_directed(&self.graph) {
            return Err(GraphError::CycleDetected(find_cycle(&self.graph)));
        }

        let mut sub: DiGraph<String, ()> = DiGraph::new();
        let mut sub_map: HashMap<NodeIndex, NodeIndex> = HashMap::new();

        for idx in self.graph.node_indices() {
            if self.is_incomplete_task(&self.graph[idx]) {
                sub_map.insert(idx, sub.add_node(self.graph[idx].clone()));
            }
        }
        for edge in self.graph.edge_references() {
            if let (Some(&from), Some(&to)) = (sub_map.get(&edge.source()), sub_map.get(&edge.target())) {
                sub.add_edge(from, to, ());
            }
        }

        let order = toposort(&sub, None).map_err(|_| GraphError::CycleDetected(find_cycle(&sub)))?;

        // Dependencies come after dependents in `order`; walk it backwards so
        // every dependency's chain length is known before its dependents.
        let mut length: HashMap<NodeIndex, usize> = HashMap::new();
        let mut next: HashMap<NodeIndex, NodeIndex> = HashMap::new();

        for &idx in order.iter().rev() {
            let best = sub
                .neighbors(idx)
                .max_by(|a, b| length[a].cmp(&length[b]).then_with(|| sub[*b].cmp(&sub[*a])));
            match best {
                Some(dep) => {
                    length.insert(idx, length[&dep] + 1);
                    next.insert(idx, dep);
                }
                None => {
                    length.insert(idx, 1);
                }
            }
        }

        let start = sub
            .node_indices()
            .max_by(|a, b| length[a].cmp(&length[b]).then_with(|| sub[*b].cmp(&sub[*a])));

        let mut path = Vec::new();
        let mut current = start;
        while let Some(idx) = current {
            path.push(sub[idx].clone());
            current = next.get(&idx).copied();
        }

        Ok(path)
    }

    /// Returns the number of nodes in the graph
    pub fn len(&self) -> usize {
        self.node_map.len()
    }

    /// Returns true if the graph is empty
    pub fn is_empty(&self) -> bool {
        self.node_map.is_empty()
    }
}

/// Names the members of one cycle, sorted by ID
fn find_cycle(graph: &DiGraph<String, ()>) -> Vec<String> {
    let cyclic = tarjan_scc(graph).into_iter().find(|scc| {
        scc.len() > 1 || graph.find_edge(scc[0], scc[0]).is_some()
    });

    let mut ids: Vec<_> = cyclic
        .unwrap_or_default()
        .into_iter()
        .map(|idx| graph[idx].clone())
        .collect();
    ids.sort();
    ids
}
