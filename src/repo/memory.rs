//! In-memory task repository
//!
//! Reference implementation of [`TaskRepository`] backed by maps behind a
//! tokio RwLock. Used by the CLI pipeline and all tests; a production
//! deployment would wire in a database-backed implementation instead.

use std::collections::{BTreeMap, HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{Link, Task, TaskId, TaskStatus, TaskType, now_ms};

use super::{LogEntry, NewTask, RepoError, RepoResult, TaskRepository};

#[derive(Default)]
struct Inner {
    next_id: u64,
    tasks: BTreeMap<u64, Task>,
    links: Vec<Link>,
    inputs: HashMap<u64, String>,
    outputs: HashMap<u64, String>,
    logs: Vec<LogEntry>,
}

/// In-memory [`TaskRepository`]
#[derive(Default)]
pub struct MemoryRepo {
    inner: RwLock<Inner>,
}

impl MemoryRepo {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of audit-log entries recorded so far
    pub async fn log_count(&self) -> usize {
        self.inner.read().await.logs.len()
    }

    /// Audit-log entries for one task
    pub async fn logs_for(&self, id: TaskId) -> Vec<LogEntry> {
        self.inner
            .read()
            .await
            .logs
            .iter()
            .filter(|l| l.task_id == id)
            .cloned()
            .collect()
    }
}

impl Inner {
    fn children_of(&self, id: TaskId) -> Vec<Task> {
        let mut children: Vec<Task> = self
            .tasks
            .values()
            .filter(|t| t.parent_id == Some(id))
            .cloned()
            .collect();
        children.sort_by_key(|t| (t.priority, t.id));
        children
    }

    /// Recompute depth/path for every task below `id` after a reparent
    fn refresh_subtree(&mut self, id: TaskId) {
        let Some(parent) = self.tasks.get(&id.0).cloned() else {
            return;
        };
        let child_ids: Vec<TaskId> = self
            .tasks
            .values()
            .filter(|t| t.parent_id == Some(id))
            .map(|t| t.id)
            .collect();
        for child_id in child_ids {
            if let Some(child) = self.tasks.get_mut(&child_id.0) {
                child.depth = parent.depth + 1;
                child.path = parent.path.clone();
                child.path.push(child_id);
                child.updated_at = now_ms();
            }
            self.refresh_subtree(child_id);
        }
    }
}

#[async_trait]
impl TaskRepository for MemoryRepo {
    async fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        Ok(self.inner.read().await.tasks.get(&id.0).cloned())
    }

    async fn create_task(&self, draft: NewTask) -> RepoResult<Task> {
        let mut inner = self.inner.write().await;
        inner.next_id += 1;
        let id = TaskId(inner.next_id);

        let mut task = match draft.parent_id {
            Some(parent_id) => {
                let parent = inner
                    .tasks
                    .get(&parent_id.0)
                    .cloned()
                    .ok_or(RepoError::NotFound(parent_id))?;
                Task::new_child(id, &parent, draft.name, draft.task_type, draft.priority)
            }
            None => {
                let mut root = Task::new_root(id, draft.name);
                root.priority = draft.priority;
                root.task_type = draft.task_type;
                root
            }
        };
        task.context_refs = draft.context_refs;

        debug!(id = %task.id, name = %task.name, task_type = %task.task_type, "MemoryRepo: created task");
        inner.tasks.insert(id.0, task.clone());
        Ok(task)
    }

    async fn update_status(&self, id: TaskId, status: TaskStatus) -> RepoResult<()> {
        let mut inner = self.inner.write().await;
        let task = inner.tasks.get_mut(&id.0).ok_or(RepoError::NotFound(id))?;
        task.set_status(status);
        Ok(())
    }

    async fn update_type(&self, id: TaskId, task_type: TaskType) -> RepoResult<()> {
        let mut inner = self.inner.write().await;
        let task = inner.tasks.get_mut(&id.0).ok_or(RepoError::NotFound(id))?;
        if task.task_type == TaskType::Atomic && task_type == TaskType::Composite {
            task.promote_to_composite();
            Ok(())
        } else if task.task_type == task_type {
            Ok(())
        } else {
            Err(RepoError::Invalid(format!(
                "illegal type transition {} -> {} for task {}",
                task.task_type, task_type, id
            )))
        }
    }

    async fn get_children(&self, id: TaskId) -> RepoResult<Vec<Task>> {
        Ok(self.inner.read().await.children_of(id))
    }

    async fn get_descendants(&self, id: TaskId) -> RepoResult<Vec<Task>> {
        let inner = self.inner.read().await;
        let mut result = Vec::new();
        let mut queue: VecDeque<TaskId> = VecDeque::from([id]);
        while let Some(cur) = queue.pop_front() {
            for child in inner.children_of(cur) {
                queue.push_back(child.id);
                result.push(child);
            }
        }
        Ok(result)
    }

    async fn get_parent(&self, id: TaskId) -> RepoResult<Option<Task>> {
        let inner = self.inner.read().await;
        let task = inner.tasks.get(&id.0).ok_or(RepoError::NotFound(id))?;
        Ok(task.parent_id.and_then(|pid| inner.tasks.get(&pid.0).cloned()))
    }

    async fn list_tasks(&self) -> RepoResult<Vec<Task>> {
        Ok(self.inner.read().await.tasks.values().cloned().collect())
    }

    async fn list_dependencies(&self, id: TaskId) -> RepoResult<Vec<Link>> {
        let inner = self.inner.read().await;
        let mut deps: Vec<Link> = inner.links.iter().filter(|l| l.from == id).copied().collect();
        deps.sort_by_key(|l| {
            let target_priority = inner.tasks.get(&l.to.0).map(|t| t.priority).unwrap_or(i64::MAX);
            (l.kind, target_priority, l.to)
        });
        Ok(deps)
    }

    async fn list_links(&self) -> RepoResult<Vec<Link>> {
        Ok(self.inner.read().await.links.clone())
    }

    async fn add_link(&self, link: Link) -> RepoResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.tasks.contains_key(&link.from.0) {
            return Err(RepoError::NotFound(link.from));
        }
        if !inner.tasks.contains_key(&link.to.0) {
            return Err(RepoError::NotFound(link.to));
        }
        if !inner.links.contains(&link) {
            inner.links.push(link);
        }
        Ok(())
    }

    async fn upsert_input(&self, id: TaskId, text: &str) -> RepoResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.tasks.contains_key(&id.0) {
            return Err(RepoError::NotFound(id));
        }
        inner.inputs.insert(id.0, text.to_string());
        Ok(())
    }

    async fn get_input(&self, id: TaskId) -> RepoResult<Option<String>> {
        Ok(self.inner.read().await.inputs.get(&id.0).cloned())
    }

    async fn upsert_output(&self, id: TaskId, text: &str) -> RepoResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.tasks.contains_key(&id.0) {
            return Err(RepoError::NotFound(id));
        }
        inner.outputs.insert(id.0, text.to_string());
        Ok(())
    }

    async fn get_output(&self, id: TaskId) -> RepoResult<Option<String>> {
        Ok(self.inner.read().await.outputs.get(&id.0).cloned())
    }

    async fn append_log(
        &self,
        task_id: TaskId,
        step_type: &str,
        content: &str,
        metadata: serde_json::Value,
    ) -> RepoResult<Uuid> {
        let mut inner = self.inner.write().await;
        let entry = LogEntry {
            id: Uuid::now_v7(),
            task_id,
            step_type: step_type.to_string(),
            content: content.to_string(),
            metadata,
            created_at: now_ms(),
        };
        let id = entry.id;
        inner.logs.push(entry);
        Ok(id)
    }

    async fn move_task(&self, id: TaskId, new_parent: Option<TaskId>) -> RepoResult<()> {
        let mut inner = self.inner.write().await;

        let (new_depth, new_path) = match new_parent {
            Some(pid) => {
                let parent = inner.tasks.get(&pid.0).ok_or(RepoError::NotFound(pid))?;
                if parent.path.contains(&id) {
                    return Err(RepoError::Invalid(format!(
                        "cannot move task {} under its own descendant {}",
                        id, pid
                    )));
                }
                let mut path = parent.path.clone();
                path.push(id);
                (parent.depth + 1, path)
            }
            None => (0, vec![id]),
        };

        let task = inner.tasks.get_mut(&id.0).ok_or(RepoError::NotFound(id))?;
        task.parent_id = new_parent;
        task.depth = new_depth;
        task.path = new_path;
        task.updated_at = now_ms();

        inner.refresh_subtree(id);
        Ok(())
    }

    async fn delete_subtree(&self, id: TaskId) -> RepoResult<usize> {
        let mut inner = self.inner.write().await;
        if !inner.tasks.contains_key(&id.0) {
            return Err(RepoError::NotFound(id));
        }

        let doomed: Vec<u64> = inner
            .tasks
            .values()
            .filter(|t| t.path.contains(&id))
            .map(|t| t.id.0)
            .collect();

        for tid in &doomed {
            inner.tasks.remove(tid);
            inner.inputs.remove(tid);
            inner.outputs.remove(tid);
        }
        inner
            .links
            .retain(|l| !doomed.contains(&l.from.0) && !doomed.contains(&l.to.0));

        debug!(%id, removed = doomed.len(), "MemoryRepo: deleted subtree");
        Ok(doomed.len())
    }
}
