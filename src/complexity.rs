//! Task complexity classification
//!
//! Keyword-bucket scoring over a task's name and description, used to
//! pick the task type at creation time and to decide decomposition
//! eligibility. Deliberately cheap and deterministic: no LLM call is
//! involved in classification.

use tracing::debug;

use crate::config::HeuristicsConfig;
use crate::domain::{Task, TaskType};

/// Textual complexity bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Complexity evaluator configured with keyword buckets and depth limits
#[derive(Debug, Clone)]
pub struct Heuristics {
    config: HeuristicsConfig,
}

impl Heuristics {
    /// Create an evaluator from configuration
    pub fn new(config: HeuristicsConfig) -> Self {
        Self { config }
    }

    /// The configured heuristics
    pub fn config(&self) -> &HeuristicsConfig {
        &self.config
    }

    /// Classify the complexity of a task's combined name + description.
    ///
    /// High: at least two high-bucket hits, or one hit on long text.
    /// Low: at least two low-bucket hits, or short text with no
    /// high/medium signal. Everything else is Medium.
    pub fn evaluate_complexity(&self, name: &str, description: &str) -> Complexity {
        let text = format!("{} {}", name, description).to_lowercase();
        let len = text.trim().len();

        let hits = |bucket: &[String]| bucket.iter().filter(|kw| text.contains(kw.as_str())).count();
        let high = hits(&self.config.high_keywords);
        let medium = hits(&self.config.medium_keywords);
        let low = hits(&self.config.low_keywords);

        let complexity = if high >= 2 || (high >= 1 && len > 100) {
            Complexity::High
        } else if low >= 2 || (len < 50 && high == 0 && medium == 0) {
            Complexity::Low
        } else {
            Complexity::Medium
        };

        debug!(%complexity, high, medium, low, len, "evaluate_complexity");
        complexity
    }

    /// Determine a new task's type from its depth and complexity.
    ///
    /// An explicit type always wins. Otherwise depth couples with
    /// complexity so decomposition naturally terminates: depth 0 maps
    /// complexity straight to a type, depth 1 is always composite, and
    /// anything deeper is atomic.
    pub fn determine_task_type(&self, depth: u32, explicit: Option<TaskType>, complexity: Complexity) -> TaskType {
        if let Some(task_type) = explicit {
            return task_type;
        }
        match depth {
            0 => match complexity {
                Complexity::High => TaskType::Root,
                Complexity::Medium => TaskType::Composite,
                Complexity::Low => TaskType::Atomic,
            },
            1 => TaskType::Composite,
            _ => TaskType::Atomic,
        }
    }

    /// Whether a task is eligible for decomposition.
    ///
    /// `pending_children` is how many of the task's children are still
    /// pending; a task that already has enough of them is not
    /// re-decomposed.
    pub fn should_decompose(&self, task: &Task, pending_children: usize) -> bool {
        if task.depth >= self.config.max_decomposition_depth.saturating_sub(1) {
            return false;
        }
        if task.task_type == TaskType::Atomic {
            return false;
        }
        if pending_children >= self.config.min_atomic_tasks {
            return false;
        }
        matches!(task.task_type, TaskType::Root | TaskType::Composite)
    }

    /// Reason a task is not eligible for decomposition, None if eligible
    pub fn decompose_ineligibility(&self, task: &Task, pending_children: usize) -> Option<String> {
        if task.depth >= self.config.max_decomposition_depth.saturating_sub(1) {
            return Some(format!(
                "depth {} is at the decomposition ceiling ({})",
                task.depth, self.config.max_decomposition_depth
            ));
        }
        if task.task_type == TaskType::Atomic {
            return Some("task is atomic".to_string());
        }
        if pending_children >= self.config.min_atomic_tasks {
            return Some(format!("task already has {} pending children", pending_children));
        }
        None
    }
}

impl Default for Heuristics {
    fn default() -> Self {
        Self::new(HeuristicsConfig::default())
    }
}
