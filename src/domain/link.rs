//! Dependency links between tasks
//!
//! A `Requires` link is a hard precedence edge consumed by DAG
//! scheduling. `Refers` links are soft context hints and never constrain
//! execution order.

use serde::{Deserialize, Serialize};

use super::TaskId;

/// Kind of dependency edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    /// Hard precedence: the target must complete before the source runs
    Requires,
    /// Soft context hint, no ordering constraint
    Refers,
}

impl std::fmt::Display for LinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Requires => write!(f, "requires"),
            Self::Refers => write!(f, "refers"),
        }
    }
}

/// A directed dependency edge between two tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    /// The dependent task
    pub from: TaskId,
    /// The task depended upon
    pub to: TaskId,
    /// Edge kind
    pub kind: LinkKind,
}

impl Link {
    /// Create a hard precedence edge: `from` requires `to`
    pub fn requires(from: TaskId, to: TaskId) -> Self {
        Self {
            from,
            to,
            kind: LinkKind::Requires,
        }
    }

    /// Create a soft context edge: `from` refers to `to`
    pub fn refers(from: TaskId, to: TaskId) -> Self {
        Self {
            from,
            to,
            kind: LinkKind::Refers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_constructors() {
        let hard = Link::requires(TaskId(2), TaskId(1));
        assert_eq!(hard.kind, LinkKind::Requires);
        assert_eq!(hard.from, TaskId(2));
        assert_eq!(hard.to, TaskId(1));

        let soft = Link::refers(TaskId(3), TaskId(1));
        assert_eq!(soft.kind, LinkKind::Refers);
    }

    #[test]
    fn test_kind_ordering_requires_first() {
        // Dependency listings sort hard edges before soft ones
        assert!(LinkKind::Requires < LinkKind::Refers);
    }
}
