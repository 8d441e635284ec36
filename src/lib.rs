//! PlanForge - hierarchical LLM task planning and execution
//!
//! The core pipeline: a goal becomes a root task, the decomposer expands
//! it into a tree of composite and atomic tasks, the scheduler produces
//! deterministic execution orders over that tree, the batch orchestrator
//! runs the atomic leaves concurrently against an LLM, and the assembler
//! folds child outputs upward until the root carries the final
//! deliverable.
//!
//! Persistence sits behind the [`repo::TaskRepository`] trait; the model
//! sits behind [`llm::ChatClient`] and [`llm::PlanningService`]. Both are
//! injectable, so the whole pipeline runs against in-process fakes in
//! tests.

pub mod assembly;
pub mod batch;
pub mod cli;
pub mod complexity;
pub mod config;
pub mod domain;
pub mod error;
pub mod executor;
pub mod llm;
pub mod planning;
pub mod repo;
pub mod scheduler;

pub use error::PlanError;
