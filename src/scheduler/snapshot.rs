//! Immutable snapshot of the task set for scheduling
//!
//! Schedulers never touch the repository: they work on a bulk-read
//! snapshot with the hierarchy (depth, materialized path) already on each
//! node, so ordering is a pure sort with no per-task lookups.

use std::collections::HashMap;

use crate::domain::{Link, LinkKind, Task, TaskId, TaskStatus};
use crate::repo::{RepoResult, TaskRepository};

use super::Scope;

/// A point-in-time view of tasks and their hard dependency edges
#[derive(Debug, Clone, Default)]
pub struct TaskSnapshot {
    tasks: Vec<Task>,
    index: HashMap<TaskId, usize>,
    requires: Vec<(TaskId, TaskId)>,
}

impl TaskSnapshot {
    /// Build a snapshot from task and link listings.
    ///
    /// Only `Requires` links are retained; soft edges never constrain
    /// scheduling.
    pub fn new(tasks: Vec<Task>, links: &[Link]) -> Self {
        let index = tasks.iter().enumerate().map(|(i, t)| (t.id, i)).collect();
        let requires = links
            .iter()
            .filter(|l| l.kind == LinkKind::Requires)
            .map(|l| (l.from, l.to))
            .collect();
        Self { tasks, index, requires }
    }

    /// Bulk-read the whole store into a snapshot
    pub async fn load(repo: &dyn TaskRepository) -> RepoResult<Self> {
        let tasks = repo.list_tasks().await?;
        let links = repo.list_links().await?;
        Ok(Self::new(tasks, &links))
    }

    /// Look up a task by id
    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.index.get(&id).map(|&i| &self.tasks[i])
    }

    /// All tasks in the snapshot
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Hard `requires` edges as (from, to) pairs
    pub fn requires_edges(&self) -> &[(TaskId, TaskId)] {
        &self.requires
    }

    /// Tasks inside `scope` that pass the status filter.
    ///
    /// `pending_only = true` keeps pending tasks; `false` also admits
    /// failed (retryable) ones. An unknown subtree scope matches nothing.
    pub fn in_scope(&self, scope: Scope, pending_only: bool) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| match scope {
                Scope::All => true,
                Scope::Subtree(root) => t.path.contains(&root),
            })
            .filter(|t| {
                if pending_only {
                    t.status == TaskStatus::Pending
                } else {
                    t.status.is_retryable()
                }
            })
            .collect()
    }

    /// Priority of a task's root ancestor, falling back to the task's
    /// own priority when the root isn't in the snapshot
    pub fn root_priority(&self, task: &Task) -> i64 {
        self.get(task.root_id()).map(|r| r.priority).unwrap_or(task.priority)
    }
}
