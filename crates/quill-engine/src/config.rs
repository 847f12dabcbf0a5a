//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the merged artifact is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMode {
    /// Fixed rubric metrics, one call.
    #[default]
    Rubric,
    /// Task-specific metrics from a Standards call, one call per metric.
    Standards,
}

/// Verification settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Metric source.
    pub mode: VerificationMode,
    /// Record unparseable verdicts as failures instead of passes.
    pub strict: bool,
}

/// Tunables for one engine instance. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of retry rounds after the first.
    pub max_rounds: u32,
    /// Planner attempts before `PlanningError`.
    pub planner_attempts: u32,
    /// Attempts per merger call before `MergeError`.
    pub merger_attempts: u32,
    /// Attempts per verifier call before the lenient default applies.
    pub verifier_attempts: u32,
    /// Timeout for every model call.
    pub call_timeout_secs: u64,
    /// Upper bound on concurrently running subtasks.
    pub max_concurrent_subtasks: usize,
    /// Snippets fetched per subtask.
    pub retrieval_k: usize,
    /// Word ceiling used when the instructions state none.
    pub default_word_ceiling: usize,
    /// Sampling temperature for every call.
    pub temperature: f32,
    /// Verification settings.
    pub verification: VerificationConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_rounds: 2,
            planner_attempts: 3,
            merger_attempts: 3,
            verifier_attempts: 3,
            call_timeout_secs: 120,
            max_concurrent_subtasks: 8,
            retrieval_k: 3,
            default_word_ceiling: 2500,
            temperature: 0.0,
            verification: VerificationConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Per-call timeout as a `Duration`.
    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_rounds, 2);
        assert_eq!(config.planner_attempts, 3);
        assert_eq!(config.retrieval_k, 3);
        assert_eq!(config.default_word_ceiling, 2500);
        assert_eq!(config.verification.mode, VerificationMode::Rubric);
        assert!(!config.verification.strict);
        assert_eq!(config.call_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_partial_toml() {
        let config: EngineConfig = toml::from_str(
            r#"
max_rounds = 4

[verification]
mode = "standards"
strict = true
"#,
        )
        .unwrap();
        assert_eq!(config.max_rounds, 4);
        assert_eq!(config.merger_attempts, 3);
        assert_eq!(config.verification.mode, VerificationMode::Standards);
        assert!(config.verification.strict);
    }
}
