//! Scheduling strategies
//!
//! Three interchangeable, side-effect-free orderings over a snapshot of
//! the task set:
//!
//! - [`bfs_order`] - big-picture first: root groups by root priority,
//!   shallower tasks before deeper ones
//! - [`requires_dag_order`] - topological order over hard `requires`
//!   edges, with cycle diagnostics instead of dropped work
//! - [`postorder`] - children strictly before parents, for
//!   assemble-bottom-up execution
//!
//! All three are pure functions: they never mutate the repository, never
//! perform I/O, and never fail. A scope that matches nothing yields an
//! empty order.

mod bfs;
mod dag;
mod postorder;
mod snapshot;

use serde::Serialize;

pub use bfs::bfs_order;
pub use dag::{CycleInfo, requires_dag_order};
pub use postorder::postorder;
pub use snapshot::TaskSnapshot;

use crate::domain::{Task, TaskId, TaskType};

/// Which tasks a scheduling call considers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Every task in the snapshot
    All,
    /// Only the subtree rooted at this task (self included)
    Subtree(TaskId),
}

/// One entry in a schedule
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledTask {
    pub id: TaskId,
    pub name: String,
    pub priority: i64,
    pub depth: u32,
    pub task_type: TaskType,
    /// Direct children that must be complete before this task can
    /// finalize. Only populated by the postorder strategy.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<TaskId>,
}

impl ScheduledTask {
    fn from_task(task: &Task) -> Self {
        Self {
            id: task.id,
            name: task.name.clone(),
            priority: task.priority,
            depth: task.depth,
            task_type: task.task_type,
            dependencies: Vec::new(),
        }
    }
}
