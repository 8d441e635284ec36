//! Plan decomposition
//!
//! LLM-driven expansion of root/composite tasks into child tasks,
//! bounded by depth and complexity heuristics, plus a quality-gated
//! variant that scores each attempt and retries below-threshold ones.

mod decomposer;
mod quality;

pub use decomposer::{
    CreatedSubtask, DecomposeOptions, Decomposer, Decomposition, EvaluatedDecomposition, EvaluationOptions,
    RecursiveDecomposition,
};
pub use quality::{QualityReport, evaluate_quality};

/// Slugify a string for use in plan titles
pub(crate) fn slugify(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
        .chars()
        .take(50)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("OAuth Endpoints"), "oauth-endpoints");
        assert_eq!(slugify("Build the API!"), "build-the-api");
    }
}
