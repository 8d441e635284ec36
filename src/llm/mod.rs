//! LLM client module for PlanForge
//!
//! The planning core treats the model as a black box behind two small
//! traits: [`ChatClient`] for single-shot completions, and
//! [`PlanningService`] for structured plan proposals. Callers that need
//! resilience wrap their own retry loops; the client itself only retries
//! transparently-transient transport errors.

mod anthropic;
mod error;
mod planner;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

pub use anthropic::AnthropicClient;
pub use error::LlmError;
pub use planner::{ChatPlanner, PlanProposal, PlanRequest, PlannedTask, PlanningService};

use crate::config::LlmConfig;

/// Single-shot chat completion: one prompt in, one text reply out
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send one prompt and return the model's text reply
    async fn chat(&self, system_prompt: &str, prompt: &str) -> Result<String, LlmError>;
}

/// Create the default chat client from configuration
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, LlmError> {
    debug!(model = %config.model, "create_client: called");
    Ok(Arc::new(AnthropicClient::from_config(config)?))
}
