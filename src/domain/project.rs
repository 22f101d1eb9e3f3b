//! Project model
//!
//! A project owns its node map and metadata explicitly; there is no
//! process-wide store. It is constructed by a load or initialize, mutated by
//! explicit calls, and dropped when the caller is done.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use super::graph::{DependencyGraph, GraphError};
use super::node::{now_millis, Node, NodeType};

/// Canvas position of a node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Project-level metadata, persisted as `project.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMetadata {
    #[serde(default = "now_millis")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "now_millis")]
    pub modified_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_order: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_positions: Option<BTreeMap<String, Position>>,
}

impl Default for ProjectMetadata {
    fn default() -> Self {
        let now = now_millis();
        Self {
            created_at: now,
            modified_at: now,
            description: None,
            node_order: None,
            node_positions: None,
        }
    }
}

/// A loaded project
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub id: String,
    pub name: String,
    /// Storage root; empty for projects not backed by a directory
    pub path: PathBuf,
    pub nodes: HashMap<String, Node>,
    pub metadata: ProjectMetadata,
}

impl Project {
    /// Creates an empty project
    pub fn new(id: impl Into<String>, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            path: path.into(),
            nodes: HashMap::new(),
            metadata: ProjectMetadata::default(),
        }
    }

    /// Returns true if the project has a storage root
    pub fn is_file_backed(&self) -> bool {
        !self.path.as_os_str().is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Inserts or replaces a node, returning the previous one
    pub fn insert_node(&mut self, node: Node) -> Option<Node> {
        self.touch();
        self.nodes.insert(node.id.clone(), node)
    }

    pub fn remove_node(&mut self, id: &str) -> Option<Node> {
        let removed = self.nodes.remove(id);
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    /// Nodes of one type, sorted by title
    pub fn nodes_of_type(&self, node_type: NodeType) -> Vec<&Node> {
        let mut nodes: Vec<_> = self
            .nodes
            .values()
            .filter(|n| n.node_type() == node_type)
            .collect();
        nodes.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
        nodes
    }

    /// Bumps the metadata modified timestamp
    pub fn touch(&mut self) {
        self.metadata.modified_at = now_millis();
    }

    /// Builds the dependency graph for this project
    pub fn dependency_graph(&self) -> DependencyGraph {
        DependencyGraph::from_project(self)
    }

    /// Adds `dependency` to the `depends_on` list of `task`, refusing edges that close a cycle
    pub fn add_dependency(&mut self, task: &str, dependency: &str) -> Result<(), GraphError> {
        if task == dependency {
            return Err(GraphError::SelfDependency(task.to_string()));
        }
        if !self.nodes.contains_key(dependency) {
            return Err(GraphError::NodeNotFound(dependency.to_string()));
        }

        let graph = self.dependency_graph();
        if graph.would_create_cycle(task, dependency) {
            return Err(GraphError::CycleDetected(vec![
                task.to_string(),
                dependency.to_string(),
            ]));
        }

        let node = self
            .get_mut(task)
            .ok_or_else(|| GraphError::NodeNotFound(task.to_string()))?;
        let task_fields = node
            .as_task_mut()
            .ok_or_else(|| GraphError::NotATask(task.to_string()))?;

        if !task_fields.depends_on.iter().any(|d| d == dependency) {
            task_fields.depends_on.push(dependency.to_string());
            node.touch();
            self.touch();
        }

        Ok(())
    }
}
