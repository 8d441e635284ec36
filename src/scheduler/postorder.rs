//! Postorder (children-before-parents) scheduling
//!
//! Used when parents can only finalize after their children are done and
//! assembled. Every emitted record carries its direct children's ids as
//! `dependencies` so a downstream executor knows what must already be
//! complete.

use std::collections::HashMap;

use tracing::debug;

use crate::domain::{Task, TaskId};

use super::{ScheduledTask, Scope, TaskSnapshot};

/// Produce an order where every task appears strictly after all of its
/// descendants.
///
/// Roots are processed in `(priority, id)` order, and each task's
/// children are visited in `(priority, id)` order before the task
/// itself. The status filter applies to emission only, so a completed
/// parent's pending children still schedule correctly.
pub fn postorder(snapshot: &TaskSnapshot, scope: Scope, pending_only: bool) -> Vec<ScheduledTask> {
    // Traverse the full scoped tree; filter statuses at emission time
    let scoped = snapshot.in_scope(scope, false);
    let scoped_all: Vec<&Task> = snapshot
        .tasks()
        .iter()
        .filter(|t| match scope {
            Scope::All => true,
            Scope::Subtree(root) => t.path.contains(&root),
        })
        .collect();
    debug!(scoped = scoped_all.len(), eligible = scoped.len(), ?scope, "postorder: scheduling");

    let mut children: HashMap<TaskId, Vec<&Task>> = HashMap::new();
    for task in &scoped_all {
        if let Some(parent) = task.parent_id {
            children.entry(parent).or_default().push(task);
        }
    }
    for group in children.values_mut() {
        group.sort_by_key(|t| (t.priority, t.id));
    }

    // Roots of the traversal: subtree scope starts at its root task;
    // otherwise any task whose parent lies outside the snapshot.
    let mut roots: Vec<&Task> = match scope {
        Scope::Subtree(id) => snapshot.get(id).into_iter().collect(),
        Scope::All => scoped_all
            .iter()
            .filter(|t| t.parent_id.is_none_or(|p| snapshot.get(p).is_none()))
            .copied()
            .collect(),
    };
    roots.sort_by_key(|t| (t.priority, t.id));

    let mut order = Vec::new();
    for root in roots {
        visit(root, &children, pending_only, &mut order);
    }
    order
}

fn visit(task: &Task, children: &HashMap<TaskId, Vec<&Task>>, pending_only: bool, order: &mut Vec<ScheduledTask>) {
    let kids = children.get(&task.id);
    if let Some(kids) = kids {
        for child in kids {
            visit(child, children, pending_only, order);
        }
    }

    let eligible = if pending_only {
        task.status == crate::domain::TaskStatus::Pending
    } else {
        task.status.is_retryable()
    };
    if eligible {
        let mut entry = ScheduledTask::from_task(task);
        entry.dependencies = kids.map(|k| k.iter().map(|c| c.id).collect()).unwrap_or_default();
        order.push(entry);
    }
}
