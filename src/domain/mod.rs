//! Domain types for PlanForge
//!
//! Core domain types: Task, TaskStatus, TaskType, Link.
//! A plan is a tree of tasks (root → composite → atomic) plus a set of
//! dependency links between tasks. Hierarchy position is materialized on
//! each task as `depth` and `path` so scheduling never has to walk parent
//! pointers at query time.

mod link;
mod task;

pub use link::{Link, LinkKind};
pub use task::{DEFAULT_PRIORITY, Task, TaskId, TaskStatus, TaskType};

/// Current Unix timestamp in milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
