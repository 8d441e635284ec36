//! Output assembly
//!
//! A parent task has no output of its own: it is synthesized from the
//! outputs of its children, either by an LLM merge or by deterministic
//! concatenation. Assembly is deliberately unbreakable: an LLM failure
//! downgrades to concatenation, and a parent whose children have no
//! outputs yet gets a fixed "not ready" placeholder instead of an error.
//!
//! Assembly is idempotent (last write wins on the output), so the
//! completion walk can re-trigger it freely when sibling tasks finish
//! close together.

use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::{Task, TaskId, TaskStatus, TaskType};
use crate::error::PlanError;
use crate::llm::ChatClient;
use crate::repo::TaskRepository;

/// Placeholder returned when no child has produced output yet
pub const NOT_READY_MESSAGE: &str =
    "Assembly is not ready: no child outputs are available yet. Re-run after children complete.";

/// How to merge child outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyStrategy {
    /// Ask the model to synthesize a coherent deliverable
    Llm,
    /// Deterministic ordered concatenation
    Concat,
}

impl std::fmt::Display for AssemblyStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Llm => write!(f, "llm"),
            Self::Concat => write!(f, "concat"),
        }
    }
}

impl FromStr for AssemblyStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "llm" => Ok(Self::Llm),
            "concat" => Ok(Self::Concat),
            _ => Err(format!("Unknown assembly strategy: {}", s)),
        }
    }
}

/// Which tier of the tree is being assembled.
///
/// Composite parents aggregate their atomic children; the root
/// aggregates its composite children into the final deliverable. The
/// two differ only in prompt framing and fallback separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyLevel {
    Composite,
    Root,
}

impl AssemblyLevel {
    /// Level at which a task is assembled, None for atomic leaves
    pub fn for_task(task: &Task) -> Option<Self> {
        match task.task_type {
            TaskType::Root => Some(Self::Root),
            TaskType::Composite => Some(Self::Composite),
            TaskType::Atomic => None,
        }
    }

    /// The child kind whose outputs feed this level
    pub fn child_type(self) -> TaskType {
        match self {
            Self::Composite => TaskType::Atomic,
            Self::Root => TaskType::Composite,
        }
    }

    /// Separator for the concatenation fallback
    fn separator(self) -> &'static str {
        match self {
            Self::Composite => "\n\n",
            Self::Root => "\n\n---\n\n",
        }
    }

    fn framing(self) -> &'static str {
        match self {
            Self::Composite => {
                "You are an engineering lead merging the results of completed subtasks \
                 into one coherent deliverable. Deduplicate overlapping content and \
                 resolve contradictions; keep every substantive detail."
            }
            Self::Root => {
                "You are a senior delivery expert synthesizing module-level results \
                 into the final deliverable for the overall goal. Produce a polished, \
                 well-structured document; deduplicate and resolve contradictions."
            }
        }
    }
}

/// One child section feeding an assembly
#[derive(Debug, Clone)]
struct Section {
    id: TaskId,
    name: String,
    content: String,
}

/// Outcome of one assembly call
#[derive(Debug, Clone)]
pub struct Assembly {
    pub task_id: TaskId,
    /// Assembled content, or the not-ready placeholder
    pub output: String,
    /// Children whose outputs contributed
    pub children: Vec<TaskId>,
    pub strategy: AssemblyStrategy,
    /// True when the concatenation fallback (or the placeholder) was used
    /// in place of the requested strategy
    pub fallback_used: bool,
    /// False when no child output existed; the placeholder output is not
    /// persisted in that case
    pub ready: bool,
}

/// Synthesizes parent outputs from child outputs
pub struct Assembler {
    repo: Arc<dyn TaskRepository>,
    chat: Arc<dyn ChatClient>,
}

impl Assembler {
    pub fn new(repo: Arc<dyn TaskRepository>, chat: Arc<dyn ChatClient>) -> Self {
        Self { repo, chat }
    }

    /// Assemble one root or composite task from its children's outputs.
    ///
    /// Children without output are silently excluded. When at least one
    /// section exists the result is persisted as the task's output and
    /// the task is marked done; otherwise the not-ready placeholder is
    /// returned without touching the task.
    pub async fn assemble(&self, id: TaskId, strategy: AssemblyStrategy) -> Result<Assembly, PlanError> {
        let task = self.repo.get_task(id).await?.ok_or(PlanError::NotFound(id))?;
        let Some(level) = AssemblyLevel::for_task(&task) else {
            return Err(PlanError::NotEligible {
                id,
                reason: "atomic tasks are executed, not assembled".to_string(),
            });
        };

        let sections = self.collect_sections(id, level).await?;
        if sections.is_empty() {
            debug!(task_id = %id, "Assembler: no child outputs yet");
            return Ok(Assembly {
                task_id: id,
                output: NOT_READY_MESSAGE.to_string(),
                children: Vec::new(),
                strategy,
                fallback_used: true,
                ready: false,
            });
        }

        let prompt = build_prompt(&task, &sections);
        let (output, fallback_used) = match strategy {
            AssemblyStrategy::Concat => (concat(level, &sections), false),
            AssemblyStrategy::Llm => match self.chat.chat(level.framing(), &prompt).await {
                Ok(reply) if !reply.trim().is_empty() => (reply, false),
                Ok(_) => {
                    warn!(task_id = %id, "Assembler: empty model reply, falling back to concatenation");
                    (concat(level, &sections), true)
                }
                Err(e) => {
                    warn!(task_id = %id, error = %e, "Assembler: model call failed, falling back to concatenation");
                    (concat(level, &sections), true)
                }
            },
        };

        self.repo.upsert_output(id, &output).await?;
        self.repo.update_status(id, TaskStatus::Done).await?;

        let children: Vec<TaskId> = sections.iter().map(|s| s.id).collect();
        let metadata = serde_json::json!({
            "children": children,
            "strategy": strategy.to_string(),
            "fallback_used": fallback_used,
        });
        if let Err(e) = self.repo.append_log(id, "assembly", &prompt, metadata).await {
            warn!(task_id = %id, error = %e, "Assembler: audit log write failed");
        }

        info!(task_id = %id, ?level, %strategy, fallback_used, sections = children.len(), "Assembler: task assembled");
        Ok(Assembly {
            task_id: id,
            output,
            children,
            strategy,
            fallback_used,
            ready: true,
        })
    }

    /// Walk the ancestor chain of a finished atomic task, assembling each
    /// ancestor whose relevant children are all done.
    ///
    /// Per-ancestor assembly failures are logged and skipped; the walk
    /// always continues and stops at the root. Returns the assemblies
    /// performed, bottom-up.
    pub async fn propagate_completion(&self, atomic_id: TaskId) -> Result<Vec<Assembly>, PlanError> {
        let task = self.repo.get_task(atomic_id).await?.ok_or(PlanError::NotFound(atomic_id))?;

        let mut performed = Vec::new();
        let mut cursor = task.parent_id;
        while let Some(parent_id) = cursor {
            let Some(parent) = self.repo.get_task(parent_id).await? else {
                break;
            };
            let Some(level) = AssemblyLevel::for_task(&parent) else {
                break;
            };

            let children = self.repo.get_children(parent_id).await?;
            let relevant: Vec<&Task> = children.iter().filter(|c| c.task_type == level.child_type()).collect();
            let all_done = !relevant.is_empty() && relevant.iter().all(|c| c.status == TaskStatus::Done);

            if all_done {
                match self.assemble(parent_id, AssemblyStrategy::Llm).await {
                    Ok(assembly) => performed.push(assembly),
                    Err(e) => {
                        warn!(parent_id = %parent_id, error = %e, "propagate_completion: assembly failed, continuing walk");
                    }
                }
            } else {
                debug!(parent_id = %parent_id, "propagate_completion: siblings still outstanding");
            }

            if parent.task_type == TaskType::Root {
                break;
            }
            cursor = parent.parent_id;
        }
        Ok(performed)
    }

    async fn collect_sections(&self, id: TaskId, level: AssemblyLevel) -> Result<Vec<Section>, PlanError> {
        let children = self.repo.get_children(id).await?;
        let mut sections = Vec::new();
        for child in children.iter().filter(|c| c.task_type == level.child_type()) {
            if let Some(output) = self.repo.get_output(child.id).await?
                && !output.trim().is_empty()
            {
                sections.push(Section {
                    id: child.id,
                    name: child.name.clone(),
                    content: output,
                });
            }
        }
        Ok(sections)
    }
}

fn build_prompt(task: &Task, sections: &[Section]) -> String {
    let mut prompt = format!("Target task: {}\n", task.name);
    for section in sections {
        prompt.push_str(&format!("\n## {}\n{}\n", section.name, section.content));
    }
    prompt.push_str("\nMerge the sections above into one coherent result for the target task.");
    prompt
}

fn concat(level: AssemblyLevel, sections: &[Section]) -> String {
    sections
        .iter()
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join(level.separator())
}
