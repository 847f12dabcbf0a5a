//! Verification of the merged artifact.

use crate::completion::{with_attempts, Completer, OutputSchema};
use crate::config::{VerificationConfig, VerificationMode};
use crate::prompts;
use crate::task::{MetricResult, VerificationReport};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

/// Metrics used in rubric mode and as the standards fallback.
pub const RUBRIC_METRICS: [(&str, &str); 4] = [
    ("content_coverage", "Covers the main topics the task asks for"),
    ("structural_clarity", "Has a clear organization and is understandable"),
    ("length_reasonableness", "Has a reasonable length for the task and stated limits"),
    ("topical_relevance", "Stays on topic"),
];

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RubricResponse {
    metrics: Vec<RubricVerdict>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RubricVerdict {
    metric: String,
    passed: bool,
    comment: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StandardsResponse {
    metrics: Vec<MetricDefinition>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MetricDefinition {
    name: String,
    description: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MetricVerdict {
    passed: bool,
    comment: String,
}

fn rubric_schema() -> OutputSchema {
    OutputSchema {
        name: "verification_report",
        schema: json!({
            "type": "object",
            "properties": {
                "metrics": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "metric": { "type": "string" },
                            "passed": { "type": "boolean" },
                            "comment": { "type": "string" }
                        },
                        "required": ["metric", "passed", "comment"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["metrics"],
            "additionalProperties": false
        }),
    }
}

fn standards_schema() -> OutputSchema {
    OutputSchema {
        name: "metric_list",
        schema: json!({
            "type": "object",
            "properties": {
                "metrics": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string" },
                            "description": { "type": "string" }
                        },
                        "required": ["name", "description"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["metrics"],
            "additionalProperties": false
        }),
    }
}

fn verdict_schema() -> OutputSchema {
    OutputSchema {
        name: "metric_verdict",
        schema: json!({
            "type": "object",
            "properties": {
                "passed": { "type": "boolean" },
                "comment": { "type": "string" }
            },
            "required": ["passed", "comment"],
            "additionalProperties": false
        }),
    }
}

fn rubric_metrics() -> Vec<(String, String)> {
    RUBRIC_METRICS.iter().map(|(n, d)| ((*n).to_string(), (*d).to_string())).collect()
}

/// Checks merged artifacts against a metric list.
#[derive(Clone)]
pub struct Verifier {
    completer: Completer,
    attempts: u32,
    config: VerificationConfig,
}

impl Verifier {
    /// Creates a verifier.
    #[must_use]
    pub fn new(completer: Completer, attempts: u32, config: VerificationConfig) -> Self {
        Self { completer, attempts, config }
    }

    /// Produces a report for `merged_result`. Never fails: verdicts that
    /// cannot be obtained fall back to pass (or fail when strict).
    pub async fn verify(
        &self,
        task_description: &str,
        instructional_content: &str,
        merged_result: &str,
    ) -> VerificationReport {
        let report = match self.config.mode {
            VerificationMode::Rubric => {
                self.verify_rubric(task_description, instructional_content, merged_result).await
            }
            VerificationMode::Standards => {
                self.verify_standards(task_description, instructional_content, merged_result).await
            }
        };

        info!(
            metrics = report.metrics.len(),
            failed = report.failed().count(),
            "Verification complete"
        );
        report
    }

    async fn verify_rubric(&self, task: &str, instructions: &str, output: &str) -> VerificationReport {
        let metrics = rubric_metrics();
        let system = prompts::VERIFIER.system_prompt();
        let user = prompts::rubric_user(task, instructions, output, &metrics);
        let schema = rubric_schema();
        let (completer, system, user, schema) = (&self.completer, &system, &user, &schema);

        let response = with_attempts("verification", self.attempts, |_| async move {
            completer.complete_json::<RubricResponse>(system, user, schema).await
        })
        .await;

        match response {
            Ok(response) => VerificationReport {
                metrics: metrics
                    .iter()
                    .map(|(name, description)| {
                        // Only an explicit failure fails a metric.
                        match response.metrics.iter().find(|v| v.metric == *name) {
                            Some(v) => MetricResult {
                                metric: name.clone(),
                                passed: v.passed,
                                comment: v.comment.clone(),
                            },
                            None => MetricResult {
                                metric: name.clone(),
                                passed: true,
                                comment: format!("Meets basic requirements: {}", description.to_lowercase()),
                            },
                        }
                    })
                    .collect(),
            },
            Err(e) => {
                warn!(error = %e, strict = self.config.strict, "Rubric verification unavailable");
                VerificationReport {
                    metrics: metrics.iter().map(|(name, _)| self.unavailable(name, &e.to_string())).collect(),
                }
            }
        }
    }

    async fn verify_standards(&self, task: &str, instructions: &str, output: &str) -> VerificationReport {
        let metrics = self.generate_metrics(task, instructions).await;
        let system = prompts::VERIFIER.system_prompt();
        let schema = verdict_schema();

        let verdicts = futures::future::join_all(metrics.iter().map(|(name, description)| {
            let user = prompts::metric_user(task, instructions, output, name, description);
            let (completer, system, schema) = (&self.completer, &system, &schema);
            async move {
                let user = &user;
                let verdict = with_attempts("verification", self.attempts, |_| async move {
                    completer.complete_json::<MetricVerdict>(system, user, schema).await
                })
                .await;
                match verdict {
                    Ok(v) => MetricResult { metric: name.clone(), passed: v.passed, comment: v.comment },
                    Err(e) => {
                        warn!(metric = %name, error = %e, "Metric verdict unavailable");
                        self.unavailable(name, &e.to_string())
                    }
                }
            }
        }))
        .await;

        VerificationReport { metrics: verdicts }
    }

    /// Asks the standards agent for a checklist, falling back to the rubric.
    async fn generate_metrics(&self, task: &str, instructions: &str) -> Vec<(String, String)> {
        let system = prompts::STANDARDS.system_prompt();
        let user = prompts::standards_user(task, instructions);
        let schema = standards_schema();
        let (completer, system, user, schema) = (&self.completer, &system, &user, &schema);

        let response = with_attempts("standards", self.attempts, |_| async move {
            completer.complete_json::<StandardsResponse>(system, user, schema).await
        })
        .await;

        match response {
            Ok(r) => {
                let metrics: Vec<(String, String)> = r
                    .metrics
                    .into_iter()
                    .filter(|m| !m.name.trim().is_empty())
                    .map(|m| (m.name, m.description))
                    .collect();
                if metrics.is_empty() {
                    warn!("Standards agent returned no metrics, using rubric");
                    rubric_metrics()
                } else {
                    metrics
                }
            }
            Err(e) => {
                warn!(error = %e, "Standards agent failed, using rubric");
                rubric_metrics()
            }
        }
    }

    fn unavailable(&self, metric: &str, reason: &str) -> MetricResult {
        let outcome = if self.config.strict { "recorded as failed" } else { "defaulting to pass" };
        MetricResult {
            metric: metric.to_string(),
            passed: !self.config.strict,
            comment: format!("Verification failed ({reason}); {outcome}"),
        }
    }
}
