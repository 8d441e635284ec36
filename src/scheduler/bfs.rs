//! BFS (priority + hierarchy) scheduling
//!
//! Approximates "plan the big picture before its details": independent
//! subtrees are ordered by their root's priority, and within a subtree
//! shallower tasks run first.

use std::collections::BTreeMap;

use tracing::debug;

use crate::domain::TaskId;

use super::{ScheduledTask, Scope, TaskSnapshot};

/// Produce a deterministic breadth-first order.
///
/// Tasks are grouped by root ancestor; groups are ordered by the root's
/// own priority (then root id). Within a group the sort key is
/// `(depth, priority, path, id)`.
pub fn bfs_order(snapshot: &TaskSnapshot, scope: Scope, pending_only: bool) -> Vec<ScheduledTask> {
    let candidates = snapshot.in_scope(scope, pending_only);
    debug!(candidates = candidates.len(), ?scope, "bfs_order: scheduling");

    // Group by root ancestor, keyed by (root priority, root id) so group
    // iteration order is the final inter-group order.
    let mut groups: BTreeMap<(i64, TaskId), Vec<&crate::domain::Task>> = BTreeMap::new();
    for task in candidates {
        let key = (snapshot.root_priority(task), task.root_id());
        groups.entry(key).or_default().push(task);
    }

    let mut order = Vec::new();
    for (_, mut group) in groups {
        group.sort_by(|a, b| {
            (a.depth, a.priority, &a.path, a.id).cmp(&(b.depth, b.priority, &b.path, b.id))
        });
        order.extend(group.iter().map(|t| ScheduledTask::from_task(t)));
    }
    order
}
