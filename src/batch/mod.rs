//! Batch orchestration
//!
//! Runs every runnable atomic task under a subtree with bounded
//! concurrency, soft rate limiting via start staggering, and per-task
//! retry with capped exponential backoff. Individual failures never
//! abort the batch; the summary reports them instead. After the batch
//! settles the true root is assembled once more, which is safe because
//! assembly is idempotent.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::assembly::{Assembler, AssemblyStrategy};
use crate::config::BatchConfig;
use crate::domain::{Task, TaskId, TaskStatus, TaskType};
use crate::error::PlanError;
use crate::executor::AtomicExecutor;
use crate::repo::TaskRepository;

/// Per-task outcome within a batch
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub name: String,
    pub succeeded: bool,
    /// Attempts consumed, including the successful one
    pub attempts: u32,
    pub error: Option<String>,
}

/// Caller-visible contract for "did the batch work"
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub executed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<TaskResult>,
    /// Finalize assembly failure, logged rather than raised
    pub finalize_error: Option<String>,
}

/// Concurrency-first executor over a task subtree
pub struct BatchExecutor {
    repo: Arc<dyn TaskRepository>,
    executor: Arc<dyn AtomicExecutor>,
    assembler: Assembler,
    config: BatchConfig,
}

impl BatchExecutor {
    pub fn new(
        repo: Arc<dyn TaskRepository>,
        executor: Arc<dyn AtomicExecutor>,
        assembler: Assembler,
        config: BatchConfig,
    ) -> Self {
        Self {
            repo,
            executor,
            assembler,
            config,
        }
    }

    /// Execute every runnable atomic task under `parent_id`.
    ///
    /// The parent must be a root or composite task. Atomics are
    /// collected breadth-first and launched with start times staggered
    /// by `60 / rate_limit_per_minute` seconds per index, capped to
    /// `concurrency` in flight. The call returns only after every
    /// launched task has settled.
    pub async fn run(&self, parent_id: TaskId) -> Result<BatchSummary, PlanError> {
        let parent = self.repo.get_task(parent_id).await?.ok_or(PlanError::NotFound(parent_id))?;
        if parent.task_type == TaskType::Atomic {
            return Err(PlanError::InvalidParent {
                id: parent_id,
                reason: format!("batch parent must be root or composite, got {}", parent.task_type),
            });
        }

        let eligible: Vec<Task> = self
            .repo
            .get_descendants(parent_id)
            .await?
            .into_iter()
            .filter(|t| t.task_type == TaskType::Atomic && self.is_runnable(t.status))
            .collect();

        info!(parent_id = %parent_id, eligible = eligible.len(), concurrency = self.config.concurrency,
            "BatchExecutor: starting batch");

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let rate_limit = self.config.rate_limit_per_minute;

        let launches = eligible.iter().enumerate().map(|(index, task)| {
            let semaphore = semaphore.clone();
            async move {
                tokio::time::sleep(stagger_delay(rate_limit, index)).await;
                let Ok(_permit) = semaphore.acquire().await else {
                    // Only reachable if the semaphore were closed, which
                    // this orchestrator never does.
                    return TaskResult {
                        task_id: task.id,
                        name: task.name.clone(),
                        succeeded: false,
                        attempts: 0,
                        error: Some("executor pool unavailable".to_string()),
                    };
                };
                self.execute_with_retries(task).await
            }
        });
        let results = futures::future::join_all(launches).await;

        let mut summary = BatchSummary {
            executed: results.len(),
            succeeded: results.iter().filter(|r| r.succeeded).count(),
            failed: results.iter().filter(|r| !r.succeeded).count(),
            results,
            finalize_error: None,
        };

        if self.config.finalize {
            summary.finalize_error = self.finalize(&parent).await;
        }

        info!(parent_id = %parent_id, executed = summary.executed, succeeded = summary.succeeded,
            failed = summary.failed, "BatchExecutor: batch finished");
        Ok(summary)
    }

    fn is_runnable(&self, status: TaskStatus) -> bool {
        match status {
            TaskStatus::Pending | TaskStatus::Running => true,
            TaskStatus::Failed => self.config.retry_failed,
            TaskStatus::Done => false,
        }
    }

    async fn execute_with_retries(&self, task: &Task) -> TaskResult {
        let mut attempt = 0u32;
        loop {
            match self.executor.execute(task.id).await {
                Ok(_) => {
                    return TaskResult {
                        task_id: task.id,
                        name: task.name.clone(),
                        succeeded: true,
                        attempts: attempt + 1,
                        error: None,
                    };
                }
                Err(e) if attempt < self.config.max_retries => {
                    let delay = backoff_delay(attempt, self.config.backoff_cap_secs);
                    warn!(task_id = %task.id, attempt, error = %e, ?delay, "BatchExecutor: retrying task");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if let Err(repo_err) = self.repo.update_status(task.id, TaskStatus::Failed).await {
                        warn!(task_id = %task.id, error = %repo_err, "BatchExecutor: failed-status write failed");
                    }
                    warn!(task_id = %task.id, attempts = attempt + 1, error = %e, "BatchExecutor: task exhausted retries");
                    return TaskResult {
                        task_id: task.id,
                        name: task.name.clone(),
                        succeeded: false,
                        attempts: attempt + 1,
                        error: Some(e.to_string()),
                    };
                }
            }
        }
    }

    /// Assemble the true root after the batch settles. Safe to repeat:
    /// auto-assembly may already have produced the same output.
    async fn finalize(&self, parent: &Task) -> Option<String> {
        let root_id = parent.root_id();
        debug!(root_id = %root_id, "BatchExecutor: finalizing root");
        match self.assembler.assemble(root_id, AssemblyStrategy::Llm).await {
            Ok(assembly) => {
                info!(root_id = %root_id, ready = assembly.ready, fallback_used = assembly.fallback_used,
                    "BatchExecutor: root finalized");
                None
            }
            Err(e) => {
                warn!(root_id = %root_id, error = %e, "BatchExecutor: finalize failed");
                Some(e.to_string())
            }
        }
    }
}

/// Start delay for the `index`-th launch under a soft rate limit.
///
/// Computed in u64 milliseconds with saturating arithmetic so large
/// batches cannot wrap the delay back toward zero. A zero rate limit
/// disables staggering.
fn stagger_delay(rate_limit_per_minute: u32, index: usize) -> Duration {
    if rate_limit_per_minute == 0 {
        return Duration::ZERO;
    }
    let interval_ms = 60_000 / u64::from(rate_limit_per_minute);
    Duration::from_millis(interval_ms.saturating_mul(index as u64))
}

/// Retry delay: exponential base with jitter, capped.
///
/// The delay never exceeds the cap and the base doubles per attempt, so
/// the expected delay is non-decreasing until the cap is hit.
fn backoff_delay(attempt: u32, cap_secs: u64) -> Duration {
    let base = 2f64.powi(attempt.min(16) as i32);
    let jitter = rand::random::<f64>() * 0.5;
    Duration::from_secs_f64((base + jitter).min(cap_secs as f64))
}
