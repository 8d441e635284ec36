//! Decomposition quality scoring
//!
//! A cheap structural check on a proposed set of subtasks. No model call
//! is involved: the score only looks at count, name quality and
//! duplication, and is used by the evaluated decomposition loop to decide
//! whether an attempt is worth keeping.

use super::decomposer::CreatedSubtask;

/// Names too vague to act on
const GENERIC_NAMES: &[&str] = &["task", "subtask", "step", "todo", "item", "misc", "other", "work"];

/// Structural quality verdict for one decomposition attempt
#[derive(Debug, Clone)]
pub struct QualityReport {
    /// Score in [0.0, 1.0]; 1.0 is a clean decomposition
    pub score: f64,
    /// Human-readable deductions, empty when the score is 1.0
    pub issues: Vec<String>,
}

impl QualityReport {
    /// Whether the score clears the given threshold
    pub fn passes(&self, threshold: f64) -> bool {
        self.score >= threshold
    }
}

/// Score a decomposition attempt.
///
/// Starts at 1.0 and deducts for structural problems: too few or too
/// many subtasks, duplicated names, and generic one-word names. The
/// result is clamped to [0.0, 1.0].
pub fn evaluate_quality(subtasks: &[CreatedSubtask], max_subtasks: usize) -> QualityReport {
    let mut score = 1.0;
    let mut issues = Vec::new();

    if subtasks.len() < 2 {
        score -= 0.3;
        issues.push(format!("only {} subtask(s); a decomposition needs at least 2", subtasks.len()));
    } else if subtasks.len() > max_subtasks {
        score -= 0.2;
        issues.push(format!("{} subtasks exceeds the limit of {}", subtasks.len(), max_subtasks));
    }

    let mut seen = std::collections::HashSet::new();
    let mut duplicates = 0;
    for subtask in subtasks {
        let key = subtask.name.trim().to_lowercase();
        if !seen.insert(key) {
            duplicates += 1;
        }
    }
    if duplicates > 0 {
        score -= 0.25;
        issues.push(format!("{} duplicate subtask name(s)", duplicates));
    }

    let generic = subtasks.iter().filter(|s| is_generic_name(&s.name)).count();
    if generic > 0 {
        // Per-name deduction, capped so one bad name doesn't sink a plan
        score -= (0.15 * generic as f64).min(0.4);
        issues.push(format!("{} generic or too-short subtask name(s)", generic));
    }

    QualityReport {
        score: score.clamp(0.0, 1.0),
        issues,
    }
}

fn is_generic_name(name: &str) -> bool {
    let trimmed = name.trim().to_lowercase();
    if trimmed.len() < 4 {
        return true;
    }
    GENERIC_NAMES.contains(&trimmed.as_str())
        || GENERIC_NAMES
            .iter()
            .any(|g| trimmed.strip_prefix(g).is_some_and(|rest| rest.trim().parse::<u32>().is_ok()))
}
