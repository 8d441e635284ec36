//! Crate-level error types
//!
//! Every public planning entry point returns a typed error instead of
//! panicking: not-found and not-eligible are normal outcomes a caller is
//! expected to branch on, not system faults.

use thiserror::Error;

use crate::domain::TaskId;
use crate::llm::LlmError;
use crate::repo::RepoError;

/// Errors surfaced by the planning core (decomposer, assembler, batch)
#[derive(Debug, Error)]
pub enum PlanError {
    /// Referenced task does not exist
    #[error("task {0} not found")]
    NotFound(TaskId),

    /// Task exists but the operation's preconditions don't hold
    /// (e.g. decomposing an atomic task without force)
    #[error("task {id} not eligible: {reason}")]
    NotEligible { id: TaskId, reason: String },

    /// Parent of a batch run must be a root or composite task
    #[error("invalid parent {id}: {reason}")]
    InvalidParent { id: TaskId, reason: String },

    /// Planning service or chat client failed or returned garbage
    #[error("planning failed: {0}")]
    Planning(#[from] LlmError),

    /// Repository failure
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl PlanError {
    /// Whether this is an expected no-op outcome rather than a fault
    pub fn is_precondition(&self) -> bool {
        matches!(self, PlanError::NotFound(_) | PlanError::NotEligible { .. })
    }
}
