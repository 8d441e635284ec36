//! PlanForge configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main PlanForge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Decomposition/complexity heuristics
    pub heuristics: HeuristicsConfig,

    /// Batch execution limits
    pub batch: BatchConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.llm.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }
        if self.heuristics.max_decomposition_depth == 0 {
            return Err(eyre::eyre!("max-decomposition-depth must be at least 1"));
        }
        if self.batch.concurrency == 0 {
            return Err(eyre::eyre!("batch concurrency must be at least 1"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .planforge.yml
        let local_config = PathBuf::from(".planforge.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/planforge/planforge.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("planforge").join("planforge.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 8192,
            timeout_ms: 300_000,
        }
    }
}

/// Decomposition and complexity-classification heuristics.
///
/// These were tunable globals in earlier iterations; they are now an
/// immutable struct threaded through the evaluator and decomposer so
/// tests can run with different limits without touching shared state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicsConfig {
    /// Maximum decomposition depth; a task at depth
    /// `max_decomposition_depth - 1` or deeper is never decomposed
    #[serde(rename = "max-decomposition-depth")]
    pub max_decomposition_depth: u32,

    /// A task with at least this many pending children is not
    /// re-decomposed
    #[serde(rename = "min-atomic-tasks")]
    pub min_atomic_tasks: usize,

    /// Upper bound on children created per decomposition
    #[serde(rename = "max-subtasks")]
    pub max_subtasks: usize,

    /// Priority assigned to the first child of a decomposition
    #[serde(rename = "base-priority")]
    pub base_priority: i64,

    /// Priority increment between consecutive children
    #[serde(rename = "priority-step")]
    pub priority_step: i64,

    /// Keywords signalling system/architecture-scale work
    #[serde(rename = "high-keywords")]
    pub high_keywords: Vec<String>,

    /// Keywords signalling module/feature-scale work
    #[serde(rename = "medium-keywords")]
    pub medium_keywords: Vec<String>,

    /// Keywords signalling small fix/test/doc work
    #[serde(rename = "low-keywords")]
    pub low_keywords: Vec<String>,
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        let words = |list: &[&str]| list.iter().map(|s| s.to_string()).collect();
        Self {
            max_decomposition_depth: 3,
            min_atomic_tasks: 2,
            max_subtasks: 8,
            base_priority: 100,
            priority_step: 10,
            high_keywords: words(&[
                "system",
                "architecture",
                "platform",
                "framework",
                "infrastructure",
                "pipeline",
                "migration",
                "end-to-end",
                "redesign",
                "integration",
            ]),
            medium_keywords: words(&[
                "module",
                "feature",
                "service",
                "endpoint",
                "component",
                "workflow",
                "implement",
                "refactor",
            ]),
            low_keywords: words(&[
                "fix", "typo", "test", "doc", "docs", "rename", "comment", "tweak", "format", "lint",
            ]),
        }
    }
}

/// Batch execution limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum concurrent atomic executions
    pub concurrency: usize,

    /// Soft per-minute launch cap, approximated by start staggering
    #[serde(rename = "rate-limit-per-minute")]
    pub rate_limit_per_minute: u32,

    /// Retries per atomic task after the first attempt
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Also pick up previously failed atomics
    #[serde(rename = "retry-failed")]
    pub retry_failed: bool,

    /// Run root assembly after the batch settles
    pub finalize: bool,

    /// Cap on any single retry backoff, in seconds
    #[serde(rename = "backoff-cap-secs")]
    pub backoff_cap_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            rate_limit_per_minute: 12,
            max_retries: 2,
            retry_failed: true,
            finalize: true,
            backoff_cap_secs: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.heuristics.max_decomposition_depth, 3);
        assert_eq!(config.heuristics.max_subtasks, 8);
        assert_eq!(config.batch.concurrency, 4);
        assert_eq!(config.batch.backoff_cap_secs, 20);
        assert_eq!(config.llm.api_key_env, "ANTHROPIC_API_KEY");
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
llm:
  model: claude-opus-4
  api-key-env: MY_API_KEY
  max-tokens: 4096

heuristics:
  max-decomposition-depth: 4
  max-subtasks: 5

batch:
  concurrency: 8
  rate-limit-per-minute: 30
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.llm.model, "claude-opus-4");
        assert_eq!(config.llm.api_key_env, "MY_API_KEY");
        assert_eq!(config.heuristics.max_decomposition_depth, 4);
        assert_eq!(config.heuristics.max_subtasks, 5);
        assert_eq!(config.batch.concurrency, 8);
        assert_eq!(config.batch.rate_limit_per_minute, 30);
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("planforge.yml");
        std::fs::write(&path, "llm:\n  model: claude-haiku-4\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.llm.model, "claude-haiku-4");

        let missing = dir.path().join("absent.yml");
        assert!(Config::load(Some(&missing)).is_err());
    }

    #[test]
    #[serial_test::serial]
    fn test_validate_requires_api_key() {
        let mut config = Config::default();
        config.llm.api_key_env = "PLANFORGE_TEST_KEY".to_string();

        unsafe { std::env::remove_var("PLANFORGE_TEST_KEY") };
        assert!(config.validate().is_err());

        unsafe { std::env::set_var("PLANFORGE_TEST_KEY", "k") };
        assert!(config.validate().is_ok());
        unsafe { std::env::remove_var("PLANFORGE_TEST_KEY") };
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut config = Config::default();
        config.llm.api_key_env = "PATH".to_string();
        config.batch.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
batch:
  concurrency: 2
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.batch.concurrency, 2);
        // Defaults for unspecified
        assert_eq!(config.batch.max_retries, 2);
        assert_eq!(config.heuristics.max_decomposition_depth, 3);
        assert!(!config.heuristics.high_keywords.is_empty());
    }
}
