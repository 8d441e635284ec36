//! Task repository abstraction
//!
//! The planning core never talks to a database directly: it goes through
//! the [`TaskRepository`] trait, so the persistence layer (SQLite, HTTP,
//! whatever) stays an external collaborator. [`MemoryRepo`] is the
//! in-process reference implementation used by the CLI and tests.

mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Link, Task, TaskId, TaskStatus, TaskType};

pub use memory::MemoryRepo;

/// Repository errors
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("task {0} not found")]
    NotFound(TaskId),

    #[error("invalid operation: {0}")]
    Invalid(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Result alias for repository operations
pub type RepoResult<T> = Result<T, RepoError>;

/// Fields needed to create a task; id, depth and path are assigned by
/// the repository.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub name: String,
    pub priority: i64,
    pub parent_id: Option<TaskId>,
    pub task_type: TaskType,
    pub context_refs: Vec<String>,
}

impl NewTask {
    /// A new root task draft with default priority
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: crate::domain::DEFAULT_PRIORITY,
            parent_id: None,
            task_type: TaskType::Root,
            context_refs: Vec::new(),
        }
    }

    /// A new child task draft
    pub fn child(name: impl Into<String>, parent_id: TaskId, task_type: TaskType, priority: i64) -> Self {
        Self {
            name: name.into(),
            priority,
            parent_id: Some(parent_id),
            task_type,
            context_refs: Vec::new(),
        }
    }
}

/// One audit-log entry recorded against a task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub task_id: TaskId,
    pub step_type: String,
    pub content: String,
    pub metadata: serde_json::Value,
    pub created_at: i64,
}

/// Persistent store of tasks, links, I/O blobs and audit logs.
///
/// Implementations must serialize conflicting writes themselves; the
/// planning core takes no client-side locks.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Fetch one task, None if absent
    async fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>>;

    /// Create a task; the repository assigns id, depth and path
    async fn create_task(&self, draft: NewTask) -> RepoResult<Task>;

    /// Update a task's status
    async fn update_status(&self, id: TaskId, status: TaskStatus) -> RepoResult<()>;

    /// Update a task's type (used for the atomic → composite promotion)
    async fn update_type(&self, id: TaskId, task_type: TaskType) -> RepoResult<()>;

    /// Direct children, ordered by (priority, id)
    async fn get_children(&self, id: TaskId) -> RepoResult<Vec<Task>>;

    /// All tasks strictly below `id`, breadth-first
    async fn get_descendants(&self, id: TaskId) -> RepoResult<Vec<Task>>;

    /// Parent task, None for roots
    async fn get_parent(&self, id: TaskId) -> RepoResult<Option<Task>>;

    /// Every task in the store
    async fn list_tasks(&self) -> RepoResult<Vec<Task>>;

    /// Outgoing dependency links of one task, hard edges first, then by
    /// target priority and id
    async fn list_dependencies(&self, id: TaskId) -> RepoResult<Vec<Link>>;

    /// Every link in the store
    async fn list_links(&self) -> RepoResult<Vec<Link>>;

    /// Add a dependency link (both endpoints must exist)
    async fn add_link(&self, link: Link) -> RepoResult<()>;

    /// Write (or overwrite) the task's input prompt
    async fn upsert_input(&self, id: TaskId, text: &str) -> RepoResult<()>;

    /// Read the task's input prompt
    async fn get_input(&self, id: TaskId) -> RepoResult<Option<String>>;

    /// Write (or overwrite) the task's output blob
    async fn upsert_output(&self, id: TaskId, text: &str) -> RepoResult<()>;

    /// Read the task's output blob
    async fn get_output(&self, id: TaskId) -> RepoResult<Option<String>>;

    /// Append an audit-log entry, returning its id
    async fn append_log(
        &self,
        task_id: TaskId,
        step_type: &str,
        content: &str,
        metadata: serde_json::Value,
    ) -> RepoResult<Uuid>;

    /// Reparent a task, recomputing depth/path for its whole subtree
    async fn move_task(&self, id: TaskId, new_parent: Option<TaskId>) -> RepoResult<()>;

    /// Delete a task and all its descendants; returns how many were removed
    async fn delete_subtree(&self, id: TaskId) -> RepoResult<usize>;
}
