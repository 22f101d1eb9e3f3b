//! Property-based tests for dependency analysis.
//!
//! Projects are generated as random task DAGs: task `tNN` may only depend on
//! tasks with a lower number, so the generated graph is acyclic by
//! construction and a reference answer can be computed by index order.

use hwtrack::domain::{GraphError, Node, NodeType, Project, TaskStatus};
use proptest::prelude::*;

fn task_id(i: usize) -> String {
    format!("t{:02}", i)
}

/// Statuses plus, for each task, the lower-numbered tasks it depends on
fn arb_dag() -> impl Strategy<Value = Vec<(TaskStatus, Vec<usize>)>> {
    prop::collection::vec(
        (
            prop::sample::select(TaskStatus::all().to_vec()),
            prop::collection::vec(any::<prop::sample::Index>(), 0..4),
        ),
        1..20,
    )
    .prop_map(|tasks| {
        tasks
            .into_iter()
            .enumerate()
            .map(|(i, (status, picks))| {
                let mut deps: Vec<usize> = if i == 0 {
                    Vec::new()
                } else {
                    picks.iter().map(|p| p.index(i)).collect()
                };
                deps.sort_unstable();
                deps.dedup();
                (status, deps)
            })
            .collect()
    })
}

fn build(tasks: &[(TaskStatus, Vec<usize>)]) -> Project {
    let mut project = Project::new("p", "Props", "");
    for (i, (status, deps)) in tasks.iter().enumerate() {
        let mut node = Node::new(task_id(i), NodeType::Task, format!("Task {}", i));
        if let Some(task) = node.as_task_mut() {
            task.status = *status;
            task.depends_on = deps.iter().map(|&d| task_id(d)).collect();
        }
        project.insert_node(node);
    }
    project
}

fn reachable(tasks: &[(TaskStatus, Vec<usize>)], from: usize, to: usize) -> bool {
    let mut stack = vec![from];
    let mut seen = vec![false; tasks.len()];
    while let Some(i) = stack.pop() {
        if i == to {
            return true;
        }
        if std::mem::replace(&mut seen[i], true) {
            continue;
        }
        stack.extend(tasks[i].1.iter().copied());
    }
    false
}

/// Length of the longest chain of incomplete tasks
fn longest_chain(tasks: &[(TaskStatus, Vec<usize>)]) -> usize {
    let mut length = vec![0usize; tasks.len()];
    for (i, (status, deps)) in tasks.iter().enumerate() {
        if status.is_complete() {
            continue;
        }
        length[i] = 1 + deps.iter().map(|&d| length[d]).max().unwrap_or(0);
    }
    length.into_iter().max().unwrap_or(0)
}

proptest! {
    /// Dependencies always precede their dependents in topological order.
    #[test]
    fn prop_topological_order_respects_edges(tasks in arb_dag()) {
        let order = build(&tasks).dependency_graph().topological_order().unwrap();
        let position = |id: &str| order.iter().position(|o| o == id).unwrap();
        for (i, (_, deps)) in tasks.iter().enumerate() {
            for &d in deps {
                prop_assert!(position(&task_id(d)) < position(&task_id(i)));
            }
        }
    }

    /// The critical path is a real chain of incomplete tasks of maximal length.
    #[test]
    fn prop_critical_path_is_longest_chain(tasks in arb_dag()) {
        let project = build(&tasks);
        let graph = project.dependency_graph();
        let path = graph.critical_path().unwrap();

        prop_assert_eq!(path.len(), longest_chain(&tasks));
        for id in &path {
            let status = project.get(id).and_then(|n| n.as_task()).map(|t| t.status).unwrap();
            prop_assert!(!status.is_complete());
        }
        for pair in path.windows(2) {
            prop_assert!(graph.dependencies(&pair[0]).contains(&pair[1]));
        }
    }

    /// Ready and blocked split the incomplete tasks with no overlap.
    #[test]
    fn prop_ready_and_blocked_partition_incomplete(tasks in arb_dag()) {
        let graph = build(&tasks).dependency_graph();
        let mut all = graph.ready_tasks();
        let blocked = graph.blocked_tasks();
        for id in &blocked {
            prop_assert!(!all.contains(id));
        }
        all.extend(blocked);
        all.sort();

        let incomplete: Vec<String> = tasks
            .iter()
            .enumerate()
            .filter(|(_, (status, _))| !status.is_complete())
            .map(|(i, _)| task_id(i))
            .collect();
        prop_assert_eq!(all, incomplete);
    }

    /// A new edge closes a cycle exactly when the reverse path already exists.
    #[test]
    fn prop_would_create_cycle_matches_reachability(
        tasks in arb_dag(),
        a in any::<prop::sample::Index>(),
        b in any::<prop::sample::Index>(),
    ) {
        let (a, b) = (a.index(tasks.len()), b.index(tasks.len()));
        let graph = build(&tasks).dependency_graph();
        let expected = a == b || reachable(&tasks, b, a);
        prop_assert_eq!(graph.would_create_cycle(&task_id(a), &task_id(b)), expected);
    }

    /// No sequence of accepted `add_dependency` calls can introduce a cycle.
    #[test]
    fn prop_add_dependency_keeps_graph_acyclic(
        tasks in arb_dag(),
        edges in prop::collection::vec((any::<prop::sample::Index>(), any::<prop::sample::Index>()), 0..30),
    ) {
        let mut project = build(&tasks);
        for (a, b) in edges {
            let (a, b) = (task_id(a.index(tasks.len())), task_id(b.index(tasks.len())));
            let closes_cycle = project.dependency_graph().would_create_cycle(&a, &b);
            match project.add_dependency(&a, &b) {
                Ok(()) => prop_assert!(!closes_cycle),
                Err(GraphError::SelfDependency(_)) => prop_assert_eq!(&a, &b),
                Err(GraphError::CycleDetected(_)) => prop_assert!(closes_cycle),
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }
        }
        prop_assert!(project.dependency_graph().topological_order().is_ok());
    }
}
