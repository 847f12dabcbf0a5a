//! Task state shared across the stages of a run.

use quill_retrieval::RetrievalIndex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

/// One independently executable unit of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Subtask {
    /// Unique, non-empty name; also the section key in the merge.
    #[serde(rename = "subtask_name")]
    pub name: String,
    /// Sequential instructions.
    #[serde(rename = "subtask_steps")]
    pub steps: Vec<String>,
    /// Retrieval query, used verbatim.
    pub semantic_query: String,
}

/// Ordered list of subtasks. Order is the merge order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubtaskPlan {
    /// Subtasks in plan order.
    #[serde(rename = "task_execution_plan")]
    pub subtasks: Vec<Subtask>,
}

impl SubtaskPlan {
    /// Number of subtasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subtasks.len()
    }

    /// Whether the plan has no subtasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subtasks.is_empty()
    }

    /// Subtask names in plan order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.subtasks.iter().map(|s| s.name.as_str())
    }
}

/// Verdict for one metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricResult {
    /// Metric name.
    pub metric: String,
    /// Whether the artifact passes.
    pub passed: bool,
    /// Short justification.
    pub comment: String,
}

/// All verdicts of one verification pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Verdicts in metric order.
    pub metrics: Vec<MetricResult>,
}

impl VerificationReport {
    /// Whether every metric passed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.metrics.iter().all(|m| m.passed)
    }

    /// Failed metrics in order.
    pub fn failed(&self) -> impl Iterator<Item = &MetricResult> {
        self.metrics.iter().filter(|m| !m.passed)
    }
}

/// Stages of the round loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    /// Produce a plan.
    Planning,
    /// Run every subtask.
    Executing,
    /// Combine subtask outputs.
    Merging,
    /// Check the merged artifact.
    Verifying,
    /// Stop and report.
    Done,
}

/// Mutable state of one end-to-end run. Never persisted.
#[derive(Debug, Clone)]
pub struct TaskRun {
    /// Original task; feedback notes are appended on retry.
    pub task_description: String,
    /// Instructional text visible to every stage.
    pub instructional_content: String,
    /// Index over supplementary material, if any.
    pub retrieval: Option<Arc<RetrievalIndex>>,
    /// Plan of the current round.
    pub plan: SubtaskPlan,
    /// Subtask name to output for the current round.
    pub partial_results: HashMap<String, String>,
    /// Merged artifact of the current round.
    pub merged_result: String,
    /// Report of the current round.
    pub verification_report: VerificationReport,
    /// Unsuccessful rounds so far.
    pub retry_count: u32,
}

impl TaskRun {
    /// Starts a run with no plan and no results.
    #[must_use]
    pub fn new(
        task_description: impl Into<String>,
        instructional_content: impl Into<String>,
        retrieval: Option<Arc<RetrievalIndex>>,
    ) -> Self {
        Self {
            task_description: task_description.into(),
            instructional_content: instructional_content.into(),
            retrieval,
            plan: SubtaskPlan::default(),
            partial_results: HashMap::new(),
            merged_result: String::new(),
            verification_report: VerificationReport::default(),
            retry_count: 0,
        }
    }

    /// True iff a retrieval index is available to executors.
    #[must_use]
    pub fn has_retrieval(&self) -> bool {
        self.retrieval.is_some()
    }

    /// Appends a note listing the failed metrics to the task description and
    /// counts the retry.
    pub fn apply_feedback(&mut self) {
        let mut note = format!(
            "\n\nFEEDBACK FROM ATTEMPT {}: the previous output failed these checks:",
            self.retry_count + 1
        );
        for metric in self.verification_report.failed() {
            let _ = write!(note, "\n- {}: {}", metric.metric, metric.comment);
        }
        note.push_str("\nAddress every point above in the new attempt.");

        self.task_description.push_str(&note);
        self.retry_count += 1;
    }
}

/// Final result of `Engine::process_task`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutcome {
    /// Merged artifact of the last round.
    pub merged_result: String,
    /// Report of the last round.
    pub verification_report: VerificationReport,
    /// Rounds run.
    pub rounds: u32,
    /// Unsuccessful rounds.
    pub retry_count: u32,
    /// Whether the last report passed every metric.
    pub fully_verified: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(name: &str, passed: bool, comment: &str) -> MetricResult {
        MetricResult { metric: name.to_string(), passed, comment: comment.to_string() }
    }

    #[test]
    fn test_plan_decodes_wire_names() {
        let plan: SubtaskPlan = serde_json::from_str(
            r#"{"task_execution_plan": [
                {"subtask_name": "intro", "subtask_steps": ["a", "b"], "semantic_query": "q"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.subtasks[0].name, "intro");
        assert_eq!(plan.names().collect::<Vec<_>>(), vec!["intro"]);
    }

    #[test]
    fn test_plan_rejects_unknown_fields() {
        let result: Result<SubtaskPlan, _> = serde_json::from_str(
            r#"{"task_execution_plan": [
                {"subtask_name": "x", "subtask_steps": [], "semantic_query": "q", "extra": 1}
            ]}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_report_pass_and_failures() {
        let report = VerificationReport {
            metrics: vec![metric("a", true, "ok"), metric("b", false, "too short")],
        };
        assert!(!report.all_passed());
        assert_eq!(report.failed().count(), 1);
        assert!(VerificationReport::default().all_passed());
    }

    #[test]
    fn test_apply_feedback_appends_failed_comments() {
        let mut run = TaskRun::new("Write an essay.", "", None);
        run.verification_report = VerificationReport {
            metrics: vec![metric("clarity", true, "fine"), metric("coverage", false, "misses topic X")],
        };

        run.apply_feedback();

        assert_eq!(run.retry_count, 1);
        assert!(run.task_description.starts_with("Write an essay."));
        assert!(run.task_description.contains("coverage: misses topic X"));
        assert!(!run.task_description.contains("clarity: fine"));
        assert!(!run.has_retrieval());
    }
}
