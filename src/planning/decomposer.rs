//! Recursive task decomposition
//!
//! The decomposer turns one root or composite task into child tasks by
//! asking the planning service for a plan, then persisting the children
//! with stepped priorities. Depth and child-count limits come from the
//! heuristics so decomposition always terminates.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::complexity::{Complexity, Heuristics};
use crate::domain::{Task, TaskId, TaskStatus, TaskType};
use crate::error::PlanError;
use crate::llm::{PlanRequest, PlanningService};
use crate::repo::{NewTask, TaskRepository};

use super::quality::evaluate_quality;
use super::slugify;

/// Options for one decomposition call
#[derive(Debug, Clone, Default)]
pub struct DecomposeOptions {
    /// Override the configured max-subtasks bound
    pub max_subtasks: Option<usize>,
    /// Bypass the eligibility checks (atomic tasks get re-evaluated and,
    /// if decomposed, promoted to composite). The depth ceiling still
    /// holds.
    pub force: bool,
}

/// One child created by a decomposition
#[derive(Debug, Clone)]
pub struct CreatedSubtask {
    pub id: TaskId,
    pub name: String,
    pub task_type: TaskType,
    pub priority: i64,
}

/// Result of decomposing a single task
#[derive(Debug, Clone)]
pub struct Decomposition {
    /// The task that was decomposed
    pub task_id: TaskId,
    /// Its depth at decomposition time
    pub depth: u32,
    /// Children created, in plan order
    pub subtasks: Vec<CreatedSubtask>,
    /// Whether the parent was promoted from atomic to composite
    pub promoted: bool,
}

/// Result of a recursive (fixed-point) decomposition pass
#[derive(Debug, Clone, Default)]
pub struct RecursiveDecomposition {
    /// Rounds executed before reaching the fixed point
    pub rounds: u32,
    /// Every individual decomposition performed, in execution order
    pub decompositions: Vec<Decomposition>,
    /// Tasks skipped because the planner failed on them
    pub failures: usize,
}

impl RecursiveDecomposition {
    /// Total number of subtasks created across all rounds
    pub fn total_subtasks(&self) -> usize {
        self.decompositions.iter().map(|d| d.subtasks.len()).sum()
    }
}

/// Options for quality-gated decomposition
#[derive(Debug, Clone)]
pub struct EvaluationOptions {
    /// Maximum attempts before keeping the last one regardless of score
    pub max_iterations: u32,
    /// Minimum quality score to accept an attempt
    pub quality_threshold: f64,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            quality_threshold: 0.7,
        }
    }
}

/// Result of a quality-gated decomposition
#[derive(Debug, Clone)]
pub struct EvaluatedDecomposition {
    pub decomposition: Decomposition,
    /// Score of the accepted (or final) attempt
    pub quality_score: f64,
    /// Outstanding issues on the accepted attempt, empty when clean
    pub issues: Vec<String>,
    /// Attempts consumed
    pub iterations: u32,
}

/// LLM-driven task decomposer
pub struct Decomposer {
    repo: Arc<dyn TaskRepository>,
    planner: Arc<dyn PlanningService>,
    heuristics: Heuristics,
}

impl Decomposer {
    pub fn new(repo: Arc<dyn TaskRepository>, planner: Arc<dyn PlanningService>, heuristics: Heuristics) -> Self {
        Self { repo, planner, heuristics }
    }

    /// Decompose one task into children.
    ///
    /// Root tasks are split into high-level phases (children are
    /// composite); composite tasks into concrete steps (children are
    /// atomic once the next level would hit the depth ceiling). Atomic
    /// tasks are rejected unless `force` is set, in which case the
    /// complexity evaluator gets a second look and the task is promoted
    /// to composite when it decomposes after all.
    pub async fn decompose_task(&self, id: TaskId, options: &DecomposeOptions) -> Result<Decomposition, PlanError> {
        let task = self.repo.get_task(id).await?.ok_or(PlanError::NotFound(id))?;
        let children = self.repo.get_children(id).await?;
        let pending_children = children.iter().filter(|c| c.status == TaskStatus::Pending).count();

        // The depth ceiling holds even under force
        let max_depth = self.heuristics.config().max_decomposition_depth;
        if task.depth >= max_depth.saturating_sub(1) {
            return Err(PlanError::NotEligible {
                id,
                reason: format!("depth {} is at the decomposition ceiling ({})", task.depth, max_depth),
            });
        }

        let mut promote = false;
        if task.task_type == TaskType::Atomic {
            if !options.force {
                return Err(PlanError::NotEligible {
                    id,
                    reason: "task is atomic".to_string(),
                });
            }
            // Forced: re-evaluate with the stored input as description
            let description = self.repo.get_input(id).await?.unwrap_or_default();
            let complexity = self.heuristics.evaluate_complexity(&task.name, &description);
            if complexity == Complexity::Low {
                return Err(PlanError::NotEligible {
                    id,
                    reason: "task is atomic even after re-evaluation".to_string(),
                });
            }
            promote = true;
        } else if !options.force
            && let Some(reason) = self.heuristics.decompose_ineligibility(&task, pending_children)
        {
            return Err(PlanError::NotEligible { id, reason });
        }

        let max_subtasks = options.max_subtasks.unwrap_or(self.heuristics.config().max_subtasks);
        let prompt = self.build_goal(&task).await?;
        let request = PlanRequest {
            goal: prompt.clone(),
            title: format!("decompose-{}", slugify(&task.name)),
            sections: max_subtasks,
        };

        debug!(task_id = %id, task_type = %task.task_type, depth = task.depth, "Decomposer: requesting plan");
        let proposal = self.planner.propose_plan(&request).await?;

        let subtasks = self.create_children(&task, proposal.tasks, max_subtasks).await?;

        if promote {
            self.repo.update_type(id, TaskType::Composite).await?;
        }

        let metadata = serde_json::json!({
            "subtasks": subtasks.len(),
            "forced": options.force,
            "promoted": promote,
        });
        if let Err(e) = self.repo.append_log(id, "decomposition", &prompt, metadata).await {
            warn!(task_id = %id, error = %e, "Decomposer: audit log write failed");
        }

        info!(task_id = %id, created = subtasks.len(), promoted = promote, "Decomposer: task decomposed");
        Ok(Decomposition {
            task_id: id,
            depth: task.depth,
            subtasks,
            promoted: promote,
        })
    }

    /// Decompose a whole subtree to a fixed point.
    ///
    /// Each round re-fetches the subtree and decomposes every eligible
    /// task not yet processed; the pass stops when a round makes no
    /// progress or after `max_rounds`. Planner failures on individual
    /// tasks are recorded and skipped rather than aborting the pass.
    pub async fn recursive_decompose(&self, root_id: TaskId, max_rounds: u32) -> Result<RecursiveDecomposition, PlanError> {
        let root = self.repo.get_task(root_id).await?.ok_or(PlanError::NotFound(root_id))?;

        let mut result = RecursiveDecomposition::default();
        let mut processed: std::collections::HashSet<TaskId> = std::collections::HashSet::new();

        for round in 0..max_rounds {
            let mut subtree = vec![root.clone()];
            subtree.extend(self.repo.get_descendants(root_id).await?);

            let mut progressed = 0usize;
            for task in &subtree {
                if processed.contains(&task.id) {
                    continue;
                }
                let current = match self.repo.get_task(task.id).await? {
                    Some(t) => t,
                    None => continue,
                };
                let children = self.repo.get_children(current.id).await?;
                let pending = children.iter().filter(|c| c.status == TaskStatus::Pending).count();
                if !self.heuristics.should_decompose(&current, pending) {
                    processed.insert(current.id);
                    continue;
                }

                match self.decompose_task(current.id, &DecomposeOptions::default()).await {
                    Ok(decomposition) => {
                        progressed += 1;
                        processed.insert(current.id);
                        result.decompositions.push(decomposition);
                    }
                    Err(e) if e.is_precondition() => {
                        processed.insert(current.id);
                    }
                    Err(e) => {
                        warn!(task_id = %current.id, error = %e, "recursive_decompose: skipping task after planner failure");
                        processed.insert(current.id);
                        result.failures += 1;
                    }
                }
            }

            result.rounds = round + 1;
            if progressed == 0 {
                break;
            }
        }

        info!(
            root_id = %root_id,
            rounds = result.rounds,
            decomposed = result.decompositions.len(),
            subtasks = result.total_subtasks(),
            failures = result.failures,
            "recursive_decompose: finished"
        );
        Ok(result)
    }

    /// Quality-gated decomposition: score each attempt and retry below
    /// the threshold.
    ///
    /// A rejected attempt's children are deleted before the retry, so
    /// each attempt starts from a clean slate. The last attempt is kept
    /// even when it misses the threshold; its issues are returned so the
    /// caller can surface them.
    pub async fn decompose_with_evaluation(
        &self,
        id: TaskId,
        options: &DecomposeOptions,
        evaluation: &EvaluationOptions,
    ) -> Result<EvaluatedDecomposition, PlanError> {
        let max_subtasks = options.max_subtasks.unwrap_or(self.heuristics.config().max_subtasks);
        let max_iterations = evaluation.max_iterations.max(1);

        let mut attempt = 1;
        loop {
            // After the first attempt the task has children again, so the
            // pending-children check must be bypassed on retries.
            let attempt_options = DecomposeOptions {
                max_subtasks: options.max_subtasks,
                force: options.force || attempt > 1,
            };
            let decomposition = self.decompose_task(id, &attempt_options).await?;
            let report = evaluate_quality(&decomposition.subtasks, max_subtasks);

            debug!(task_id = %id, attempt, score = report.score, "decompose_with_evaluation: attempt scored");

            if report.score >= evaluation.quality_threshold || attempt >= max_iterations {
                if !report.issues.is_empty() {
                    warn!(task_id = %id, score = report.score, issues = ?report.issues,
                        "decompose_with_evaluation: keeping imperfect decomposition");
                }
                return Ok(EvaluatedDecomposition {
                    decomposition,
                    quality_score: report.score,
                    issues: report.issues,
                    iterations: attempt,
                });
            }

            // Below threshold with attempts left: discard and retry
            for subtask in &decomposition.subtasks {
                self.repo.delete_subtree(subtask.id).await?;
            }
            attempt += 1;
        }
    }

    /// Build the planning goal for a task, folding in its stored input
    /// prompt when present.
    async fn build_goal(&self, task: &Task) -> Result<String, PlanError> {
        let framing = match task.task_type {
            TaskType::Root => format!(
                "Decompose this top-level goal into high-level functional modules or phases.\n\nGoal: {}",
                task.name
            ),
            _ => format!(
                "Decompose this task into concrete, independently executable implementation steps.\n\nTask: {}",
                task.name
            ),
        };
        let input = self.repo.get_input(task.id).await?;
        Ok(match input {
            Some(text) if !text.trim().is_empty() => format!("{}\n\nContext:\n{}", framing, text),
            _ => framing,
        })
    }

    /// Persist the planned children under `parent` with stepped
    /// priorities, returning them in plan order.
    async fn create_children(
        &self,
        parent: &Task,
        planned: Vec<crate::llm::PlannedTask>,
        max_subtasks: usize,
    ) -> Result<Vec<CreatedSubtask>, PlanError> {
        let config = self.heuristics.config();
        let child_depth = parent.depth + 1;
        // Children of a root are the plan's composite phases; below that,
        // anything at the depth ceiling becomes an executable leaf.
        let child_type = if parent.task_type == TaskType::Root {
            TaskType::Composite
        } else if child_depth >= config.max_decomposition_depth.saturating_sub(1) {
            TaskType::Atomic
        } else {
            TaskType::Composite
        };

        let mut subtasks = Vec::new();
        for (index, planned_task) in planned.into_iter().take(max_subtasks).enumerate() {
            let priority = planned_task
                .priority
                .unwrap_or(config.base_priority + index as i64 * config.priority_step);
            let draft = NewTask::child(planned_task.name.trim(), parent.id, child_type, priority);
            let created = self.repo.create_task(draft).await?;
            if let Some(prompt) = planned_task.prompt.as_deref().filter(|p| !p.trim().is_empty()) {
                self.repo.upsert_input(created.id, prompt).await?;
            }
            subtasks.push(CreatedSubtask {
                id: created.id,
                name: created.name,
                task_type: created.task_type,
                priority: created.priority,
            });
        }
        Ok(subtasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, PlanProposal, PlannedTask};
    use crate::repo::MemoryRepo;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Planner stub that pops one canned reply per call
    struct StubPlanner {
        replies: Mutex<Vec<Result<Vec<PlannedTask>, String>>>,
    }

    impl StubPlanner {
        fn new(replies: Vec<Result<Vec<PlannedTask>, String>>) -> Self {
            Self {
                replies: Mutex::new(replies),
            }
        }

        fn with_tasks(names: &[&str]) -> Self {
            let tasks = names
                .iter()
                .map(|n| PlannedTask {
                    name: n.to_string(),
                    prompt: Some(format!("Do: {}", n)),
                    priority: None,
                })
                .collect();
            Self::new(vec![Ok(tasks)])
        }
    }

    #[async_trait]
    impl PlanningService for StubPlanner {
        async fn propose_plan(&self, _request: &PlanRequest) -> Result<PlanProposal, LlmError> {
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                return Err(LlmError::InvalidResponse("stub exhausted".to_string()));
            }
            match replies.remove(0) {
                Ok(tasks) => Ok(PlanProposal {
                    title: "stub".to_string(),
                    tasks,
                }),
                Err(msg) => Err(LlmError::InvalidResponse(msg)),
            }
        }
    }

    fn decomposer(repo: Arc<MemoryRepo>, planner: StubPlanner) -> Decomposer {
        Decomposer::new(repo, Arc::new(planner), Heuristics::default())
    }

    #[tokio::test]
    async fn test_decompose_root_creates_composite_children() {
        let repo = Arc::new(MemoryRepo::new());
        let root = repo.create_task(NewTask::root("Build the service")).await.unwrap();
        let d = decomposer(
            repo.clone(),
            StubPlanner::with_tasks(&["Design the data model", "Implement the API", "Wire up deployment"]),
        );

        let result = d.decompose_task(root.id, &DecomposeOptions::default()).await.unwrap();
        assert_eq!(result.subtasks.len(), 3);
        assert!(!result.promoted);
        assert!(result.subtasks.iter().all(|s| s.task_type == TaskType::Composite));
        // Stepped priorities in plan order
        assert_eq!(result.subtasks[0].priority, 100);
        assert_eq!(result.subtasks[1].priority, 110);
        assert_eq!(result.subtasks[2].priority, 120);

        // Prompts were persisted as child inputs
        let input = repo.get_input(result.subtasks[0].id).await.unwrap();
        assert_eq!(input.as_deref(), Some("Do: Design the data model"));
    }

    #[tokio::test]
    async fn test_decompose_composite_at_ceiling_creates_atomic_children() {
        let repo = Arc::new(MemoryRepo::new());
        let root = repo.create_task(NewTask::root("root")).await.unwrap();
        let mid = repo
            .create_task(NewTask::child("Implement the API", root.id, TaskType::Composite, 100))
            .await
            .unwrap();
        let d = decomposer(repo.clone(), StubPlanner::with_tasks(&["Write the handler", "Write the tests"]));

        let result = d.decompose_task(mid.id, &DecomposeOptions::default()).await.unwrap();
        // Children land at depth 2, the ceiling with the default limit of 3
        assert!(result.subtasks.iter().all(|s| s.task_type == TaskType::Atomic));
    }

    #[tokio::test]
    async fn test_atomic_rejected_without_force() {
        let repo = Arc::new(MemoryRepo::new());
        let root = repo.create_task(NewTask::root("root")).await.unwrap();
        let leaf = repo
            .create_task(NewTask::child("tiny chore", root.id, TaskType::Atomic, 100))
            .await
            .unwrap();
        let d = decomposer(repo.clone(), StubPlanner::with_tasks(&["a", "b"]));

        let err = d.decompose_task(leaf.id, &DecomposeOptions::default()).await.unwrap_err();
        assert!(matches!(err, PlanError::NotEligible { .. }));
        assert!(err.is_precondition());
    }

    #[tokio::test]
    async fn test_forced_atomic_promoted_when_complex() {
        let repo = Arc::new(MemoryRepo::new());
        let root = repo.create_task(NewTask::root("root")).await.unwrap();
        let leaf = repo
            .create_task(NewTask::child(
                "Redesign the platform architecture",
                root.id,
                TaskType::Atomic,
                100,
            ))
            .await
            .unwrap();
        let d = decomposer(repo.clone(), StubPlanner::with_tasks(&["Survey the modules", "Plan the migration"]));

        let result = d
            .decompose_task(
                leaf.id,
                &DecomposeOptions {
                    force: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(result.promoted);
        let reloaded = repo.get_task(leaf.id).await.unwrap().unwrap();
        assert_eq!(reloaded.task_type, TaskType::Composite);
    }

    #[tokio::test]
    async fn test_forced_atomic_still_rejected_when_simple() {
        let repo = Arc::new(MemoryRepo::new());
        let root = repo.create_task(NewTask::root("root")).await.unwrap();
        let leaf = repo
            .create_task(NewTask::child("tiny chore", root.id, TaskType::Atomic, 100))
            .await
            .unwrap();
        let d = decomposer(repo.clone(), StubPlanner::with_tasks(&["a", "b"]));

        let err = d
            .decompose_task(
                leaf.id,
                &DecomposeOptions {
                    force: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::NotEligible { .. }));
    }

    #[tokio::test]
    async fn test_depth_ceiling_holds_under_force() {
        let repo = Arc::new(MemoryRepo::new());
        let root = repo.create_task(NewTask::root("root")).await.unwrap();
        let mid = repo
            .create_task(NewTask::child("mid", root.id, TaskType::Composite, 100))
            .await
            .unwrap();
        let deep = repo
            .create_task(NewTask::child("deep composite work", mid.id, TaskType::Composite, 100))
            .await
            .unwrap();
        let d = decomposer(repo.clone(), StubPlanner::with_tasks(&["a", "b"]));

        let err = d
            .decompose_task(
                deep.id,
                &DecomposeOptions {
                    force: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::NotEligible { .. }));
    }

    #[tokio::test]
    async fn test_missing_task_is_not_found() {
        let repo = Arc::new(MemoryRepo::new());
        let d = decomposer(repo, StubPlanner::with_tasks(&["a", "b"]));
        let err = d.decompose_task(TaskId(99), &DecomposeOptions::default()).await.unwrap_err();
        assert!(matches!(err, PlanError::NotFound(TaskId(99))));
    }

    #[tokio::test]
    async fn test_planner_priority_override_wins() {
        let repo = Arc::new(MemoryRepo::new());
        let root = repo.create_task(NewTask::root("root goal")).await.unwrap();
        let planner = StubPlanner::new(vec![Ok(vec![
            PlannedTask {
                name: "urgent phase".to_string(),
                prompt: None,
                priority: Some(5),
            },
            PlannedTask {
                name: "later phase".to_string(),
                prompt: None,
                priority: None,
            },
        ])]);
        let d = decomposer(repo, planner);

        let result = d.decompose_task(root.id, &DecomposeOptions::default()).await.unwrap();
        assert_eq!(result.subtasks[0].priority, 5);
        assert_eq!(result.subtasks[1].priority, 110);
    }

    #[tokio::test]
    async fn test_max_subtasks_truncates_plan() {
        let repo = Arc::new(MemoryRepo::new());
        let root = repo.create_task(NewTask::root("root goal")).await.unwrap();
        let d = decomposer(
            repo,
            StubPlanner::with_tasks(&["first phase", "second phase", "third phase", "fourth phase"]),
        );

        let result = d
            .decompose_task(
                root.id,
                &DecomposeOptions {
                    max_subtasks: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(result.subtasks.len(), 2);
    }

    #[tokio::test]
    async fn test_recursive_decompose_reaches_fixed_point() {
        let repo = Arc::new(MemoryRepo::new());
        let root = repo.create_task(NewTask::root("Build the pipeline")).await.unwrap();
        // Round 1 splits the root, round 2 splits both phases, then no
        // eligible tasks remain.
        let planner = StubPlanner::new(vec![
            Ok(vec![
                PlannedTask {
                    name: "Ingest stage".to_string(),
                    prompt: None,
                    priority: None,
                },
                PlannedTask {
                    name: "Transform stage".to_string(),
                    prompt: None,
                    priority: None,
                },
            ]),
            Ok(vec![
                PlannedTask {
                    name: "Read the source".to_string(),
                    prompt: None,
                    priority: None,
                },
                PlannedTask {
                    name: "Validate records".to_string(),
                    prompt: None,
                    priority: None,
                },
            ]),
            Ok(vec![
                PlannedTask {
                    name: "Map the fields".to_string(),
                    prompt: None,
                    priority: None,
                },
                PlannedTask {
                    name: "Emit the output".to_string(),
                    prompt: None,
                    priority: None,
                },
            ]),
        ]);
        let d = decomposer(repo.clone(), planner);

        let result = d.recursive_decompose(root.id, 10).await.unwrap();
        assert_eq!(result.decompositions.len(), 3);
        assert_eq!(result.total_subtasks(), 6);
        assert_eq!(result.failures, 0);
        assert!(result.rounds <= 3);

        // Full tree: root, 2 composites, 4 atomic leaves
        let descendants = repo.get_descendants(root.id).await.unwrap();
        assert_eq!(descendants.len(), 6);
        let leaves = descendants.iter().filter(|t| t.task_type == TaskType::Atomic).count();
        assert_eq!(leaves, 4);
    }

    #[tokio::test]
    async fn test_recursive_decompose_survives_planner_failure() {
        let repo = Arc::new(MemoryRepo::new());
        let root = repo.create_task(NewTask::root("Build the pipeline")).await.unwrap();
        let planner = StubPlanner::new(vec![Err("model returned prose".to_string())]);
        let d = decomposer(repo, planner);

        let result = d.recursive_decompose(root.id, 5).await.unwrap();
        assert_eq!(result.decompositions.len(), 0);
        assert_eq!(result.failures, 1);
    }

    #[tokio::test]
    async fn test_evaluation_accepts_clean_first_attempt() {
        let repo = Arc::new(MemoryRepo::new());
        let root = repo.create_task(NewTask::root("root goal")).await.unwrap();
        let d = decomposer(
            repo,
            StubPlanner::with_tasks(&["Design the schema", "Implement endpoints", "Write tests"]),
        );

        let result = d
            .decompose_with_evaluation(root.id, &DecomposeOptions::default(), &EvaluationOptions::default())
            .await
            .unwrap();
        assert_eq!(result.iterations, 1);
        assert_eq!(result.quality_score, 1.0);
        assert!(result.issues.is_empty());
    }

    #[tokio::test]
    async fn test_evaluation_retries_and_keeps_better_attempt() {
        let repo = Arc::new(MemoryRepo::new());
        let root = repo.create_task(NewTask::root("root goal")).await.unwrap();
        // First attempt is all generic names, second is clean
        let planner = StubPlanner::new(vec![
            Ok(vec![
                PlannedTask {
                    name: "step 1".to_string(),
                    prompt: None,
                    priority: None,
                },
                PlannedTask {
                    name: "step 2".to_string(),
                    prompt: None,
                    priority: None,
                },
                PlannedTask {
                    name: "misc".to_string(),
                    prompt: None,
                    priority: None,
                },
            ]),
            Ok(vec![
                PlannedTask {
                    name: "Design the schema".to_string(),
                    prompt: None,
                    priority: None,
                },
                PlannedTask {
                    name: "Implement endpoints".to_string(),
                    prompt: None,
                    priority: None,
                },
            ]),
        ]);
        let d = decomposer(repo.clone(), planner);

        let result = d
            .decompose_with_evaluation(root.id, &DecomposeOptions::default(), &EvaluationOptions::default())
            .await
            .unwrap();
        assert_eq!(result.iterations, 2);
        assert_eq!(result.quality_score, 1.0);

        // Rejected attempt's children were deleted
        let children = repo.get_children(root.id).await.unwrap();
        assert_eq!(children.len(), 2);
        assert!(children.iter().all(|c| !c.name.starts_with("step")));
    }

    #[tokio::test]
    async fn test_evaluation_keeps_last_attempt_below_threshold() {
        let repo = Arc::new(MemoryRepo::new());
        let root = repo.create_task(NewTask::root("root goal")).await.unwrap();
        let bad = || {
            Ok(vec![
                PlannedTask {
                    name: "step 1".to_string(),
                    prompt: None,
                    priority: None,
                },
                PlannedTask {
                    name: "step 2".to_string(),
                    prompt: None,
                    priority: None,
                },
            ])
        };
        let planner = StubPlanner::new(vec![bad(), bad()]);
        let d = decomposer(repo.clone(), planner);

        let result = d
            .decompose_with_evaluation(
                root.id,
                &DecomposeOptions::default(),
                &EvaluationOptions {
                    max_iterations: 2,
                    quality_threshold: 0.9,
                },
            )
            .await
            .unwrap();
        assert_eq!(result.iterations, 2);
        assert!(result.quality_score < 0.9);
        assert!(!result.issues.is_empty());

        // The final attempt is persisted
        let children = repo.get_children(root.id).await.unwrap();
        assert_eq!(children.len(), 2);
    }
}
