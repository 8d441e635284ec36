//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::{Link, Task};

/// PlanForge - hierarchical LLM task planning and execution
#[derive(Parser)]
#[command(
    name = "pf",
    about = "Plan, decompose, schedule and execute hierarchical task trees",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Decompose a goal into a task tree without executing it
    Plan {
        /// The goal to plan
        goal: String,

        /// Maximum decomposition rounds
        #[arg(long)]
        max_depth: Option<u32>,

        /// Write the resulting task tree to a JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print an execution order for a previously saved task tree
    Schedule {
        /// Task tree file produced by `pf plan --output`
        #[arg(short, long)]
        input: PathBuf,

        /// Ordering strategy
        #[arg(short, long, default_value = "bfs")]
        strategy: ScheduleStrategy,

        /// Restrict to the subtree rooted at this task id
        #[arg(long)]
        subtree: Option<u64>,

        /// Include failed (retryable) tasks, not only pending ones
        #[arg(long)]
        include_failed: bool,
    },

    /// Plan a goal, execute every atomic task and assemble the result
    Run {
        /// The goal to plan and execute
        goal: String,

        /// Maximum concurrent executions
        #[arg(long)]
        concurrency: Option<usize>,

        /// Maximum decomposition rounds
        #[arg(long)]
        max_depth: Option<u32>,

        /// Stop after planning and print the execution order instead
        #[arg(long)]
        dry_run: bool,
    },

    /// Classify a task description's complexity
    Classify {
        /// Task name
        name: String,

        /// Optional longer description
        #[arg(short, long, default_value = "")]
        description: String,
    },
}

/// Scheduling strategy selector
#[derive(Clone, Copy, Debug, Default)]
pub enum ScheduleStrategy {
    #[default]
    Bfs,
    Dag,
    Postorder,
}

impl std::str::FromStr for ScheduleStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bfs" => Ok(Self::Bfs),
            "dag" | "requires" => Ok(Self::Dag),
            "postorder" | "bottom-up" => Ok(Self::Postorder),
            _ => Err(format!("Unknown strategy: {}. Use: bfs, dag, or postorder", s)),
        }
    }
}

/// On-disk task tree, as written by `pf plan --output`
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct PlanFile {
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub links: Vec<Link>,
}
