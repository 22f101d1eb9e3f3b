//! Project and node commands (init, new, check, depend)

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;

use super::app::Session;
use crate::domain::{generate_id, GraphError, Node, NodeType, Project};
use crate::exchange::node_to_json;
use crate::storage::Config;

pub fn init(session: &Session) -> Result<()> {
    let project = session
        .store
        .initialize(&session.root)
        .with_context(|| format!("Failed to initialize project at {}", session.root.display()))?;
    Config::write_default_project_config(&session.root)?;

    session.output.success(&format!(
        "Initialized hwtrack project '{}' at {}",
        project.name,
        session.root.display()
    ));
    Ok(())
}

pub fn create(
    session: &Session,
    node_type: NodeType,
    title: &str,
    parent: Option<String>,
    tags: Vec<String>,
) -> Result<()> {
    let title = title.trim();
    if title.is_empty() {
        bail!("Title cannot be empty");
    }

    let mut project = session.load()?.project;
    let id = generate_id(title, Utc::now());
    if project.get(&id).is_some() {
        bail!("Node {} already exists", id);
    }

    let mut node = Node::new(id, node_type, title);
    node.tags = tags;

    if let Some(parent_id) = parent {
        let parent_node = project
            .get(&parent_id)
            .ok_or_else(|| anyhow!("Parent not found: {}", parent_id))?;
        if !parent_node.node_type().is_container() {
            bail!(
                "Parent {} is a {}; only subsystems, assemblies and modules contain nodes",
                parent_id,
                parent_node.node_type()
            );
        }
        if !node.set_parent(Some(parent_id)) {
            bail!("Subsystems are top-level and cannot have a parent");
        }
    }

    let path = session.store.save_node(&session.root, &node)?;
    project.insert_node(node.clone());
    session.store.save_metadata(&project)?;

    if session.output.is_json() {
        session.output.data(&node_to_json(&node));
    } else {
        session.output.success(&format!(
            "Created {} {} ({})",
            node.node_type(),
            node.id,
            path.display()
        ));
    }
    Ok(())
}

/// Describes references that point at missing or wrongly-typed nodes
fn reference_problems(project: &Project) -> Vec<String> {
    let mut nodes: Vec<_> = project.nodes.values().collect();
    nodes.sort_by(|a, b| a.id.cmp(&b.id));

    let mut problems = Vec::new();
    for node in nodes {
        if let Some(task) = node.as_task() {
            for dep in &task.depends_on {
                if project.get(dep).is_none() {
                    problems.push(format!("{}: depends on missing node '{}'", node.id, dep));
                }
            }
            for blocked in &task.blocks {
                if project.get(blocked).is_none() {
                    problems.push(format!("{}: blocks missing node '{}'", node.id, blocked));
                }
            }
        }

        if let Some(parent) = node.parent() {
            match project.get(parent) {
                None => problems.push(format!("{}: parent '{}' does not exist", node.id, parent)),
                Some(p) if !p.node_type().is_container() => problems.push(format!(
                    "{}: parent '{}' is a {}, not a container",
                    node.id,
                    parent,
                    p.node_type()
                )),
                Some(_) => {}
            }
        }
    }
    problems
}

pub fn check(session: &Session) -> Result<()> {
    let loaded = session.load()?;
    let project = &loaded.project;

    let cycle = match project.dependency_graph().topological_order() {
        Ok(_) => None,
        Err(GraphError::CycleDetected(ids)) => Some(ids),
        Err(e) => return Err(e.into()),
    };
    let references = reference_problems(project);
    let problem_count =
        loaded.parse_errors.len() + references.len() + usize::from(cycle.is_some());

    if session.output.is_json() {
        session.output.data(&serde_json::json!({
            "ok": problem_count == 0,
            "nodes": project.nodes.len(),
            "parseErrors": loaded.parse_errors,
            "cycle": cycle,
            "references": references,
        }));
    } else {
        println!("Checked {} nodes.", project.nodes.len());
        if let Some(ids) = &cycle {
            println!("Dependency cycle among: {}", ids.join(", "));
        }
        for problem in &references {
            println!("{}", problem);
        }
    }

    if problem_count > 0 {
        bail!("{} problem(s) found", problem_count);
    }
    if !session.output.is_json() {
        println!("No problems found.");
    }
    Ok(())
}

pub fn depend(session: &Session, task: &str, dependency: &str) -> Result<()> {
    let loaded = session.load()?;
    let mut project = loaded.project;
    project
        .add_dependency(task, dependency)
        .with_context(|| format!("Cannot make {} depend on {}", task, dependency))?;

    let node = project
        .get(task)
        .ok_or_else(|| anyhow!("Node not found: {}", task))?;
    let loaded_from = loaded.misplaced.get(task).map(PathBuf::as_path);
    session
        .store
        .save_node_from(&session.root, node, loaded_from)?;
    session.store.save_metadata(&project)?;

    session
        .output
        .success(&format!("{} now depends on {}", task, dependency));
    Ok(())
}
