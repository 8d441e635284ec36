//! Task domain type
//!
//! A Task is one node in a plan tree. Roots are top-level goals,
//! composites are decomposable intermediates, atomics are directly
//! executable leaves.

use serde::{Deserialize, Serialize};

use super::now_ms;

/// Default priority assigned to tasks when the planner doesn't set one.
/// Lower values schedule earlier.
pub const DEFAULT_PRIORITY: i64 = 100;

/// Unique task identifier, assigned at creation, immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Task status in the execution workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started yet, eligible for scheduling
    #[default]
    Pending,
    /// Currently executing
    Running,
    /// Finished successfully (output persisted)
    Done,
    /// Execution exhausted retries or was aborted
    Failed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "running" | "in_progress" => Ok(Self::Running),
            "done" | "completed" => Ok(Self::Done),
            "failed" | "error" => Ok(Self::Failed),
            _ => Err(format!("Unknown task status: {}", s)),
        }
    }
}

impl TaskStatus {
    /// Pending and failed tasks can be (re)scheduled
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }

    /// Done and failed are terminal for a single run
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Task kind, fixed at creation.
///
/// The only legal mutation is the atomic → composite promotion performed
/// when a generically-typed leaf turns out to need decomposition; see
/// [`Task::promote_to_composite`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Top-level goal, depth 0, no parent
    Root,
    /// Decomposable intermediate node; output is assembled from children
    Composite,
    /// Directly executable leaf, terminal in the decomposition graph
    Atomic,
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Root => write!(f, "root"),
            Self::Composite => write!(f, "composite"),
            Self::Atomic => write!(f, "atomic"),
        }
    }
}

/// A Task is one node in the plan tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: TaskId,

    /// Display name
    pub name: String,

    /// Current execution status
    pub status: TaskStatus,

    /// Scheduling priority, lower = earlier
    pub priority: i64,

    /// Task kind (root / composite / atomic)
    pub task_type: TaskType,

    /// Owning task, None for roots
    pub parent_id: Option<TaskId>,

    /// Tree depth, root = 0, always parent.depth + 1
    pub depth: u32,

    /// Materialized ancestor path of ids from the root down to this task,
    /// self included. Kept in sync with parent_id on every reparent.
    pub path: Vec<TaskId>,

    /// Dependency/tool references consumed during execution
    #[serde(default)]
    pub context_refs: Vec<String>,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl Task {
    /// Create a root task (depth 0, no parent)
    pub fn new_root(id: TaskId, name: impl Into<String>) -> Self {
        let now = now_ms();
        Self {
            id,
            name: name.into(),
            status: TaskStatus::Pending,
            priority: DEFAULT_PRIORITY,
            task_type: TaskType::Root,
            parent_id: None,
            depth: 0,
            path: vec![id],
            context_refs: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a child of an existing task, inheriting depth/path
    pub fn new_child(id: TaskId, parent: &Task, name: impl Into<String>, task_type: TaskType, priority: i64) -> Self {
        let now = now_ms();
        let mut path = parent.path.clone();
        path.push(id);
        Self {
            id,
            name: name.into(),
            status: TaskStatus::Pending,
            priority,
            task_type,
            parent_id: Some(parent.id),
            depth: parent.depth + 1,
            path,
            context_refs: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Update the status
    pub fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
        self.updated_at = now_ms();
    }

    /// Promote an atomic task to composite.
    ///
    /// This is the single sanctioned type transition: it happens when a
    /// leaf that was classified atomic is decomposed anyway (forced or
    /// re-evaluated). Any other transition is rejected.
    pub fn promote_to_composite(&mut self) -> bool {
        if self.task_type == TaskType::Atomic {
            self.task_type = TaskType::Composite;
            self.updated_at = now_ms();
            true
        } else {
            false
        }
    }

    /// The root ancestor id (first element of the materialized path)
    pub fn root_id(&self) -> TaskId {
        self.path.first().copied().unwrap_or(self.id)
    }

    /// Whether `other` lies in this task's subtree (self included)
    pub fn contains(&self, other: &Task) -> bool {
        other.path.contains(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_root() {
        let task = Task::new_root(TaskId(1), "Build the thing");
        assert_eq!(task.depth, 0);
        assert_eq!(task.parent_id, None);
        assert_eq!(task.path, vec![TaskId(1)]);
        assert_eq!(task.priority, DEFAULT_PRIORITY);
        assert_eq!(task.task_type, TaskType::Root);
        assert_eq!(task.root_id(), TaskId(1));
    }

    #[test]
    fn test_new_child_inherits_path() {
        let root = Task::new_root(TaskId(1), "root");
        let child = Task::new_child(TaskId(2), &root, "child", TaskType::Composite, 110);
        let grandchild = Task::new_child(TaskId(3), &child, "leaf", TaskType::Atomic, 120);

        assert_eq!(child.depth, 1);
        assert_eq!(grandchild.depth, 2);
        assert_eq!(grandchild.path, vec![TaskId(1), TaskId(2), TaskId(3)]);
        assert_eq!(grandchild.root_id(), TaskId(1));
        assert!(root.contains(&grandchild));
        assert!(child.contains(&grandchild));
        assert!(!grandchild.contains(&child));
    }

    #[test]
    fn test_promote_to_composite() {
        let root = Task::new_root(TaskId(1), "root");
        let mut leaf = Task::new_child(TaskId(2), &root, "leaf", TaskType::Atomic, 100);

        assert!(leaf.promote_to_composite());
        assert_eq!(leaf.task_type, TaskType::Composite);

        // Already composite, no-op
        assert!(!leaf.promote_to_composite());

        let mut r = Task::new_root(TaskId(3), "another root");
        assert!(!r.promote_to_composite());
        assert_eq!(r.task_type, TaskType::Root);
    }

    #[test]
    fn test_status_parse_aliases() {
        assert_eq!("in_progress".parse::<TaskStatus>().unwrap(), TaskStatus::Running);
        assert_eq!("completed".parse::<TaskStatus>().unwrap(), TaskStatus::Done);
        assert_eq!("error".parse::<TaskStatus>().unwrap(), TaskStatus::Failed);
        assert!("bogus".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_status_retryable() {
        assert!(TaskStatus::Pending.is_retryable());
        assert!(TaskStatus::Failed.is_retryable());
        assert!(!TaskStatus::Running.is_retryable());
        assert!(!TaskStatus::Done.is_retryable());
    }

    #[test]
    fn test_task_serde_roundtrip() {
        let root = Task::new_root(TaskId(7), "root");
        let json = serde_json::to_string(&root).unwrap();
        let back: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, root.id);
        assert_eq!(back.path, root.path);
        assert_eq!(back.status, TaskStatus::Pending);
    }
}
