//! Dependency-DAG scheduling
//!
//! Priority-aware topological sort over hard `requires` edges. A cycle
//! doesn't silently drop work: the valid prefix of the order is returned
//! together with diagnostics naming the implicated tasks and edges.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::TaskId;

use super::{ScheduledTask, Scope, TaskSnapshot};

/// Diagnostics for a `requires` cycle detected during scheduling
#[derive(Debug, Clone, Serialize)]
pub struct CycleInfo {
    /// Tasks that could not be ordered
    pub nodes: Vec<TaskId>,
    /// `requires` edges among the unresolved tasks
    pub edges: Vec<(TaskId, TaskId)>,
    /// Human-readable description
    pub message: String,
}

/// Topologically order the scoped tasks by their `requires` edges.
///
/// Only edges with both endpoints in scope constrain the order; among
/// unconstrained choices the minimum of `(priority, depth, path, id)`
/// runs first. Returns the (possibly partial) order plus cycle
/// diagnostics when the graph isn't a DAG.
pub fn requires_dag_order(
    snapshot: &TaskSnapshot,
    scope: Scope,
    pending_only: bool,
) -> (Vec<ScheduledTask>, Option<CycleInfo>) {
    let candidates = snapshot.in_scope(scope, pending_only);
    let in_scope: HashSet<TaskId> = candidates.iter().map(|t| t.id).collect();
    debug!(candidates = candidates.len(), ?scope, "requires_dag_order: scheduling");

    // from requires to: `to` must be emitted before `from`
    let mut in_degree: HashMap<TaskId, usize> = candidates.iter().map(|t| (t.id, 0)).collect();
    let mut dependents: HashMap<TaskId, Vec<TaskId>> = HashMap::new();
    for &(from, to) in snapshot.requires_edges() {
        if in_scope.contains(&from) && in_scope.contains(&to) {
            if let Some(degree) = in_degree.get_mut(&from) {
                *degree += 1;
            }
            dependents.entry(to).or_default().push(from);
        }
    }

    // Min-heap keyed (priority, depth, path, id)
    type HeapKey = (i64, u32, Vec<TaskId>, TaskId);
    let heap_key = |id: TaskId| -> HeapKey {
        let task = snapshot.get(id).expect("scoped task present in snapshot");
        (task.priority, task.depth, task.path.clone(), id)
    };

    let mut heap: BinaryHeap<Reverse<HeapKey>> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(&id, _)| Reverse(heap_key(id)))
        .collect();

    let mut order = Vec::with_capacity(candidates.len());
    let mut emitted: HashSet<TaskId> = HashSet::new();

    while let Some(Reverse((_, _, _, id))) = heap.pop() {
        let task = snapshot.get(id).expect("scoped task present in snapshot");
        order.push(ScheduledTask::from_task(task));
        emitted.insert(id);

        if let Some(waiters) = dependents.get(&id) {
            for &waiter in waiters {
                let degree = in_degree.get_mut(&waiter).expect("waiter is in scope");
                *degree -= 1;
                if *degree == 0 {
                    heap.push(Reverse(heap_key(waiter)));
                }
            }
        }
    }

    if order.len() == candidates.len() {
        return (order, None);
    }

    // Heap drained before every task was ordered: the residual set holds
    // at least one cycle. Report it instead of dropping the tasks.
    let mut nodes: Vec<TaskId> = in_scope.iter().filter(|id| !emitted.contains(id)).copied().collect();
    nodes.sort();
    let residual: HashSet<TaskId> = nodes.iter().copied().collect();
    let edges: Vec<(TaskId, TaskId)> = snapshot
        .requires_edges()
        .iter()
        .filter(|(from, to)| residual.contains(from) && residual.contains(to))
        .copied()
        .collect();

    let names: Vec<String> = nodes
        .iter()
        .filter_map(|id| snapshot.get(*id))
        .map(|t| format!("{} ({})", t.name, t.id))
        .collect();
    let message = format!("requires cycle among {} task(s): {}", nodes.len(), names.join(", "));
    warn!(%message, "requires_dag_order: cycle detected");

    (
        order,
        Some(CycleInfo {
            nodes,
            edges,
            message,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Link, Task, TaskType};

    fn siblings(n: u64) -> Vec<Task> {
        let root = Task::new_root(TaskId(1), "root");
        let mut tasks = vec![root.clone()];
        for i in 0..n {
            tasks.push(Task::new_child(
                TaskId(10 + i),
                &root,
                format!("task {}", i),
                TaskType::Atomic,
                100,
            ));
        }
        tasks
    }

    fn ids(order: &[ScheduledTask]) -> Vec<u64> {
        order.iter().map(|t| t.id.0).collect()
    }

    #[test]
    fn test_chain_orders_dependencies_first() {
        // A(10) requires B(11), B requires C(12)
        let tasks = siblings(3);
        let links = [
            Link::requires(TaskId(10), TaskId(11)),
            Link::requires(TaskId(11), TaskId(12)),
        ];
        let snapshot = TaskSnapshot::new(tasks, &links);

        let (order, cycle) = requires_dag_order(&snapshot, Scope::Subtree(TaskId(1)), true);
        assert!(cycle.is_none());

        let pos = |id: u64| ids(&order).iter().position(|&x| x == id).unwrap();
        assert!(pos(12) < pos(11));
        assert!(pos(11) < pos(10));
    }

    #[test]
    fn test_priority_breaks_ties_among_free_tasks() {
        let root = Task::new_root(TaskId(1), "root");
        let a = Task::new_child(TaskId(2), &root, "a", TaskType::Atomic, 300);
        let b = Task::new_child(TaskId(3), &root, "b", TaskType::Atomic, 100);
        let snapshot = TaskSnapshot::new(vec![root, a, b], &[]);

        let (order, _) = requires_dag_order(&snapshot, Scope::All, true);
        // Root (priority 100, depth 0) first, then b before a
        assert_eq!(ids(&order), vec![1, 3, 2]);
    }

    #[test]
    fn test_cycle_reported_with_partial_order() {
        // A -> B -> C -> A, plus one free task D
        let tasks = siblings(4);
        let links = [
            Link::requires(TaskId(10), TaskId(11)),
            Link::requires(TaskId(11), TaskId(12)),
            Link::requires(TaskId(12), TaskId(10)),
        ];
        let snapshot = TaskSnapshot::new(tasks, &links);

        let (order, cycle) = requires_dag_order(&snapshot, Scope::Subtree(TaskId(1)), true);
        let cycle = cycle.expect("cycle must be reported");

        assert_eq!(cycle.nodes, vec![TaskId(10), TaskId(11), TaskId(12)]);
        assert_eq!(cycle.edges.len(), 3);
        assert!(cycle.message.contains("cycle"));
        // Partial order holds root and the free task, strictly fewer than scope size
        assert!(order.len() < 5);
        assert!(ids(&order).contains(&13));
    }

    #[test]
    fn test_out_of_scope_edges_ignored() {
        // Edge into another subtree must not constrain this scope
        let root_a = Task::new_root(TaskId(1), "a");
        let leaf_a = Task::new_child(TaskId(2), &root_a, "a leaf", TaskType::Atomic, 100);
        let root_b = Task::new_root(TaskId(3), "b");
        let links = [Link::requires(TaskId(2), TaskId(3))];
        let snapshot = TaskSnapshot::new(vec![root_a, leaf_a, root_b], &links);

        let (order, cycle) = requires_dag_order(&snapshot, Scope::Subtree(TaskId(1)), true);
        assert!(cycle.is_none());
        assert_eq!(order.len(), 2);
    }

    #[test]
    fn test_empty_scope() {
        let snapshot = TaskSnapshot::new(vec![], &[]);
        let (order, cycle) = requires_dag_order(&snapshot, Scope::All, true);
        assert!(order.is_empty());
        assert!(cycle.is_none());
    }
}
