//! Dependency queries (blocked, ready, critical-path)

use anyhow::Result;

use super::app::Session;
use crate::domain::Project;

fn title<'a>(project: &'a Project, id: &str) -> &'a str {
    project.get(id).map(|n| n.title.as_str()).unwrap_or("")
}

/// Show blocked tasks
pub fn blocked(session: &Session) -> Result<()> {
    let project = session.load()?.project;
    let graph = project.dependency_graph();

    let blocked: Vec<(String, Vec<String>)> = graph
        .blocked_tasks()
        .into_iter()
        .map(|id| {
            let blockers = graph.blockers(&id);
            (id, blockers)
        })
        .collect();
    tracing::debug!(count = blocked.len(), "Computed blocked tasks");

    if session.output.is_json() {
        let items: Vec<_> = blocked
            .iter()
            .map(|(id, blockers)| {
                serde_json::json!({
                    "id": id,
                    "title": title(&project, id),
                    "blockedBy": blockers,
                })
            })
            .collect();
        session.output.data(&items);
    } else if blocked.is_empty() {
        println!("No blocked tasks.");
    } else {
        println!("Blocked tasks ({}):", blocked.len());
        println!("{:<28} {:<30} BLOCKED BY", "ID", "TITLE");
        println!("{}", "-".repeat(80));
        for (id, blockers) in &blocked {
            println!("{:<28} {:<30} {}", id, title(&project, id), blockers.join(", "));
        }
    }

    Ok(())
}

/// Show tasks ready to work on
pub fn ready(session: &Session) -> Result<()> {
    let project = session.load()?.project;
    let ready = project.dependency_graph().ready_tasks();

    if session.output.is_json() {
        let items: Vec<_> = ready
            .iter()
            .filter_map(|id| project.get(id))
            .map(|node| {
                serde_json::json!({
                    "id": node.id,
                    "title": node.title,
                    "priority": node.as_task().map(|t| t.priority.as_str()),
                })
            })
            .collect();
        session.output.data(&items);
    } else if ready.is_empty() {
        println!("No tasks ready to work on.");
    } else {
        println!("Ready tasks ({}):", ready.len());
        println!("{:<28} TITLE", "ID");
        println!("{}", "-".repeat(60));
        for id in &ready {
            println!("{:<28} {}", id, title(&project, id));
        }
    }

    Ok(())
}

/// Show the critical path
pub fn critical_path(session: &Session) -> Result<()> {
    let project = session.load()?.project;
    let path = project.dependency_graph().critical_path()?;

    if session.output.is_json() {
        let tasks: Vec<_> = path
            .iter()
            .filter_map(|id| project.get(id))
            .map(|node| {
                serde_json::json!({
                    "id": node.id,
                    "title": node.title,
                    "status": node.status_str(),
                })
            })
            .collect();
        session.output.data(&serde_json::json!({
            "length": path.len(),
            "tasks": tasks,
        }));
    } else if path.is_empty() {
        println!("No incomplete tasks.");
    } else {
        println!("Critical path ({} tasks):", path.len());
        for (i, id) in path.iter().enumerate() {
            println!("{:>3}. {:<28} {}", i + 1, id, title(&project, id));
        }
    }

    Ok(())
}
