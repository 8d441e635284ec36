//! Planning service - structured plan proposals from an LLM
//!
//! [`ChatPlanner`] asks the chat client for a strict JSON array of
//! subtasks and parses it defensively: code fences are tolerated,
//! anything else malformed is an [`LlmError::InvalidResponse`] that the
//! decomposer treats as a soft failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::{ChatClient, LlmError};

/// Request for a plan proposal
#[derive(Debug, Clone)]
pub struct PlanRequest {
    /// The goal or prompt to plan against
    pub goal: String,
    /// Title of the resulting plan
    pub title: String,
    /// Maximum number of tasks to propose
    pub sections: usize,
}

/// One proposed task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedTask {
    /// Short task name
    pub name: String,
    /// Execution prompt for the task, if the planner provided one
    #[serde(default)]
    pub prompt: Option<String>,
    /// Priority override; lower runs earlier
    #[serde(default)]
    pub priority: Option<i64>,
}

/// A full plan proposal
#[derive(Debug, Clone)]
pub struct PlanProposal {
    pub title: String,
    pub tasks: Vec<PlannedTask>,
}

/// Produces structured plan proposals
#[async_trait]
pub trait PlanningService: Send + Sync {
    /// Propose up to `sections` tasks for the goal.
    ///
    /// An empty or malformed model reply is an error; callers decide
    /// whether that is fatal.
    async fn propose_plan(&self, request: &PlanRequest) -> Result<PlanProposal, LlmError>;
}

const PLANNER_SYSTEM_PROMPT: &str = "You are a planning assistant that breaks goals into tasks. \
     Respond with ONLY a JSON array, no prose. Each element is an object \
     with fields: \"name\" (short task name), \"prompt\" (instructions for \
     executing the task), and optionally \"priority\" (integer, lower runs \
     earlier). Order tasks by execution order.";

/// [`PlanningService`] implemented over a [`ChatClient`]
pub struct ChatPlanner {
    chat: Arc<dyn ChatClient>,
}

impl ChatPlanner {
    /// Create a planner over the given chat client
    pub fn new(chat: Arc<dyn ChatClient>) -> Self {
        Self { chat }
    }

    fn build_prompt(&self, request: &PlanRequest) -> String {
        format!(
            "Break the following goal into at most {} tasks.\n\nGoal:\n{}",
            request.sections, request.goal
        )
    }

    /// Parse the model reply into planned tasks.
    ///
    /// Tolerates a markdown code fence around the JSON. Anything that
    /// doesn't parse as a task array is [`LlmError::Json`]; an array
    /// that parses but is unusable (empty, unnamed tasks) is
    /// [`LlmError::InvalidResponse`].
    fn parse_reply(reply: &str) -> Result<Vec<PlannedTask>, LlmError> {
        let trimmed = reply.trim();
        let body = strip_code_fence(trimmed);

        let tasks: Vec<PlannedTask> = serde_json::from_str(body)?;

        if tasks.is_empty() {
            return Err(LlmError::InvalidResponse("planner proposed zero tasks".to_string()));
        }
        if tasks.iter().any(|t| t.name.trim().is_empty()) {
            return Err(LlmError::InvalidResponse("planner proposed an unnamed task".to_string()));
        }
        Ok(tasks)
    }
}

/// Strip a surrounding markdown code fence, if present
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Skip the language tag on the opening fence line
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    rest.rsplit_once("```").map(|(body, _)| body).unwrap_or(rest).trim()
}

#[async_trait]
impl PlanningService for ChatPlanner {
    async fn propose_plan(&self, request: &PlanRequest) -> Result<PlanProposal, LlmError> {
        debug!(title = %request.title, sections = request.sections, "ChatPlanner::propose_plan: called");

        let prompt = self.build_prompt(request);
        let reply = self.chat.chat(PLANNER_SYSTEM_PROMPT, &prompt).await?;
        let mut tasks = Self::parse_reply(&reply)?;
        tasks.truncate(request.sections);

        info!(title = %request.title, proposed = tasks.len(), "ChatPlanner: plan proposed");
        Ok(PlanProposal {
            title: request.title.clone(),
            tasks,
        })
    }
}
