//! Atomic task execution
//!
//! [`AtomicExecutor`] is the seam between the orchestrator and whatever
//! actually performs a leaf task. [`LlmExecutor`] is the production
//! implementation: one chat call per task, output persisted, then the
//! upstream assembly walk. Retries live in the orchestrator, not here.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::assembly::Assembler;
use crate::domain::{TaskId, TaskStatus, TaskType};
use crate::error::PlanError;
use crate::llm::ChatClient;
use crate::repo::TaskRepository;

const EXECUTOR_SYSTEM_PROMPT: &str = "You are an execution agent completing one well-scoped task. \
     Produce the task's deliverable directly, with no preamble and no \
     questions back to the user.";

/// Executes one atomic task to completion.
///
/// A successful call has persisted the task's output and marked it done.
/// An error leaves the task's prior output untouched so the caller can
/// retry.
#[async_trait]
pub trait AtomicExecutor: Send + Sync {
    async fn execute(&self, id: TaskId) -> Result<String, PlanError>;
}

/// LLM-backed executor: stored input prompt in, output blob out
pub struct LlmExecutor {
    repo: Arc<dyn TaskRepository>,
    chat: Arc<dyn ChatClient>,
    assembler: Assembler,
}

impl LlmExecutor {
    pub fn new(repo: Arc<dyn TaskRepository>, chat: Arc<dyn ChatClient>) -> Self {
        let assembler = Assembler::new(repo.clone(), chat.clone());
        Self { repo, chat, assembler }
    }
}

#[async_trait]
impl AtomicExecutor for LlmExecutor {
    async fn execute(&self, id: TaskId) -> Result<String, PlanError> {
        let task = self.repo.get_task(id).await?.ok_or(PlanError::NotFound(id))?;
        if task.task_type != TaskType::Atomic {
            return Err(PlanError::NotEligible {
                id,
                reason: format!("{} tasks are assembled from children, not executed", task.task_type),
            });
        }

        self.repo.update_status(id, TaskStatus::Running).await?;

        let prompt = match self.repo.get_input(id).await? {
            Some(input) if !input.trim().is_empty() => format!("Task: {}\n\n{}", task.name, input),
            _ => format!("Task: {}", task.name),
        };

        debug!(task_id = %id, prompt_len = prompt.len(), "LlmExecutor: executing");
        let output = self.chat.chat(EXECUTOR_SYSTEM_PROMPT, &prompt).await?;

        self.repo.upsert_output(id, &output).await?;
        self.repo.update_status(id, TaskStatus::Done).await?;

        let metadata = serde_json::json!({ "output_len": output.len() });
        if let Err(e) = self.repo.append_log(id, "execution", &prompt, metadata).await {
            warn!(task_id = %id, error = %e, "LlmExecutor: audit log write failed");
        }

        // Completion may ripple upward; an assembly hiccup never fails
        // the task that triggered it.
        match self.assembler.propagate_completion(id).await {
            Ok(assemblies) if !assemblies.is_empty() => {
                info!(task_id = %id, assembled = assemblies.len(), "LlmExecutor: completion propagated");
            }
            Ok(_) => {}
            Err(e) => warn!(task_id = %id, error = %e, "LlmExecutor: completion propagation failed"),
        }

        Ok(output)
    }
}
