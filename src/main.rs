//! PlanForge CLI entry point
//!
//! Thin glue over the library: each subcommand wires a repository, the
//! LLM clients and the planning components together for one invocation.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use eyre::{Context, Result};
use tracing::info;

use planforge::assembly::Assembler;
use planforge::batch::BatchExecutor;
use planforge::cli::{Cli, Command, PlanFile, ScheduleStrategy};
use planforge::complexity::Heuristics;
use planforge::config::Config;
use planforge::domain::{Task, TaskId};
use planforge::executor::LlmExecutor;
use planforge::llm::{ChatClient, ChatPlanner, create_client};
use planforge::planning::Decomposer;
use planforge::repo::{MemoryRepo, NewTask, TaskRepository};
use planforge::scheduler::{Scope, TaskSnapshot, bfs_order, postorder, requires_dag_order};

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(model = %config.llm.model, "PlanForge loaded config");

    match cli.command {
        Command::Plan { goal, max_depth, output } => cmd_plan(&config, &goal, max_depth, output).await,
        Command::Schedule {
            input,
            strategy,
            subtree,
            include_failed,
        } => cmd_schedule(&input, strategy, subtree, include_failed),
        Command::Run {
            goal,
            concurrency,
            max_depth,
            dry_run,
        } => cmd_run(&config, &goal, concurrency, max_depth, dry_run).await,
        Command::Classify { name, description } => cmd_classify(&config, &name, &description),
    }
}

/// Plan a goal into a task tree held in an in-process repository
async fn plan_tree(config: &Config, goal: &str, max_depth: Option<u32>) -> Result<(Arc<MemoryRepo>, Arc<dyn ChatClient>, Task)> {
    let chat = create_client(&config.llm)?;
    let planner = Arc::new(ChatPlanner::new(chat.clone()));
    let repo = Arc::new(MemoryRepo::new());
    let heuristics = Heuristics::new(config.heuristics.clone());
    let decomposer = Decomposer::new(repo.clone(), planner, heuristics);

    let root = repo.create_task(NewTask::root(goal)).await?;
    let rounds = max_depth.unwrap_or(config.heuristics.max_decomposition_depth);
    let result = decomposer.recursive_decompose(root.id, rounds).await?;
    info!(
        root_id = %root.id,
        rounds = result.rounds,
        subtasks = result.total_subtasks(),
        failures = result.failures,
        "plan complete"
    );
    Ok((repo, chat, root))
}

async fn cmd_plan(config: &Config, goal: &str, max_depth: Option<u32>, output: Option<PathBuf>) -> Result<()> {
    let (repo, _chat, root) = plan_tree(config, goal, max_depth).await?;

    print_tree(&repo, root.id).await?;

    if let Some(path) = output {
        let file = PlanFile {
            tasks: repo.list_tasks().await?,
            links: repo.list_links().await?,
        };
        fs::write(&path, serde_json::to_string_pretty(&file)?).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("\nPlan written to {}", path.display());
    }
    Ok(())
}

fn cmd_schedule(input: &PathBuf, strategy: ScheduleStrategy, subtree: Option<u64>, include_failed: bool) -> Result<()> {
    let raw = fs::read_to_string(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let file: PlanFile = serde_json::from_str(&raw).context("Failed to parse task tree file")?;

    let snapshot = TaskSnapshot::new(file.tasks, &file.links);
    let scope = subtree.map(TaskId).map(Scope::Subtree).unwrap_or(Scope::All);
    let pending_only = !include_failed;

    let order = match strategy {
        ScheduleStrategy::Bfs => bfs_order(&snapshot, scope, pending_only),
        ScheduleStrategy::Postorder => postorder(&snapshot, scope, pending_only),
        ScheduleStrategy::Dag => {
            let (order, cycle) = requires_dag_order(&snapshot, scope, pending_only);
            if let Some(cycle) = cycle {
                eprintln!("warning: {}", cycle.message);
            }
            order
        }
    };

    println!("{}", serde_json::to_string_pretty(&order)?);
    Ok(())
}

async fn cmd_run(config: &Config, goal: &str, concurrency: Option<usize>, max_depth: Option<u32>, dry_run: bool) -> Result<()> {
    let (repo, chat, root) = plan_tree(config, goal, max_depth).await?;

    if dry_run {
        let snapshot = TaskSnapshot::load(repo.as_ref()).await?;
        let order = postorder(&snapshot, Scope::Subtree(root.id), true);
        println!("{}", serde_json::to_string_pretty(&order)?);
        return Ok(());
    }

    let mut batch_config = config.batch.clone();
    if let Some(concurrency) = concurrency {
        batch_config.concurrency = concurrency;
    }

    let executor = Arc::new(LlmExecutor::new(repo.clone(), chat.clone()));
    let assembler = Assembler::new(repo.clone(), chat);
    let batch = BatchExecutor::new(repo.clone(), executor, assembler, batch_config);

    let summary = batch.run(root.id).await?;
    println!(
        "executed: {}  succeeded: {}  failed: {}",
        summary.executed, summary.succeeded, summary.failed
    );
    for result in summary.results.iter().filter(|r| !r.succeeded) {
        println!(
            "  failed: {} ({}) after {} attempt(s): {}",
            result.name,
            result.task_id,
            result.attempts,
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    if let Some(error) = &summary.finalize_error {
        println!("finalize failed: {}", error);
    }

    if let Some(output) = repo.get_output(root.id).await? {
        println!("\n{}", output);
    }
    Ok(())
}

fn cmd_classify(config: &Config, name: &str, description: &str) -> Result<()> {
    let heuristics = Heuristics::new(config.heuristics.clone());
    let complexity = heuristics.evaluate_complexity(name, description);
    let task_type = heuristics.determine_task_type(0, None, complexity);
    println!("complexity: {}", complexity);
    println!("type at depth 0: {}", task_type);
    Ok(())
}

/// Print the task tree indented by depth
async fn print_tree(repo: &MemoryRepo, root_id: TaskId) -> Result<()> {
    let root = repo.get_task(root_id).await?;
    let mut tasks = root.into_iter().collect::<Vec<_>>();
    tasks.extend(repo.get_descendants(root_id).await?);
    tasks.sort_by(|a, b| a.path.cmp(&b.path));

    for task in &tasks {
        let indent = "  ".repeat(task.depth as usize);
        println!(
            "{}{} [{}] {} (priority {}, {})",
            indent, task.id, task.task_type, task.name, task.priority, task.status
        );
    }
    Ok(())
}
