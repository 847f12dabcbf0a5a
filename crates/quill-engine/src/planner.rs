//! Task planning.

use crate::completion::{with_attempts, Completer, OutputSchema};
use crate::error::{CompletionError, PlanningError};
use crate::prompts;
use crate::task::SubtaskPlan;
use serde_json::json;
use std::collections::HashSet;
use tracing::{info, warn};

fn plan_schema() -> OutputSchema {
    OutputSchema {
        name: "task_execution_plan",
        schema: json!({
            "type": "object",
            "properties": {
                "task_execution_plan": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "subtask_name": { "type": "string" },
                            "subtask_steps": { "type": "array", "items": { "type": "string" } },
                            "semantic_query": { "type": "string" }
                        },
                        "required": ["subtask_name", "subtask_steps", "semantic_query"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["task_execution_plan"],
            "additionalProperties": false
        }),
    }
}

/// Produces subtask plans.
#[derive(Clone)]
pub struct Planner {
    completer: Completer,
    attempts: u32,
}

impl Planner {
    /// Creates a planner that tries up to `attempts` times.
    #[must_use]
    pub fn new(completer: Completer, attempts: u32) -> Self {
        Self { completer, attempts }
    }

    /// Asks the model for a plan, retrying failed calls, undecodable responses
    /// and plans that break the naming policy.
    ///
    /// # Errors
    /// Returns `PlanningError` once every attempt has failed.
    pub async fn plan(
        &self,
        task_description: &str,
        instructional_content: &str,
    ) -> Result<SubtaskPlan, PlanningError> {
        let system = prompts::PLANNER.system_prompt();
        let user = prompts::planner_user(task_description, instructional_content);
        let schema = plan_schema();
        let (completer, system, user, schema) = (&self.completer, &system, &user, &schema);

        let plan = with_attempts("planning", self.attempts, |_| async move {
            let plan: SubtaskPlan = completer.complete_json(system, user, schema).await?;
            validate(&plan).map_err(CompletionError::Schema)?;
            Ok(plan)
        })
        .await
        .map_err(|last| PlanningError { attempts: self.attempts.max(1), last })?;

        for (from, to) in cross_references(&plan) {
            warn!(subtask = %from, referenced = %to, "Subtask steps mention another subtask; plan accepted");
        }
        info!(subtasks = plan.len(), names = ?plan.names().collect::<Vec<_>>(), "Plan ready");
        Ok(plan)
    }
}

/// At least one subtask; names non-empty and unique.
///
/// # Errors
/// Returns a description of the first violation.
pub fn validate(plan: &SubtaskPlan) -> Result<(), String> {
    if plan.is_empty() {
        return Err("plan has no subtasks".to_string());
    }
    let mut seen = HashSet::new();
    for name in plan.names() {
        if name.trim().is_empty() {
            return Err("subtask with empty name".to_string());
        }
        if !seen.insert(name) {
            return Err(format!("duplicate subtask name '{name}'"));
        }
    }
    Ok(())
}

/// Pairs `(subtask, other)` where a step of `subtask` mentions `other` by name.
///
/// Matching is case-insensitive on whole words, so `intro` does not match
/// `introduction`.
#[must_use]
pub fn cross_references(plan: &SubtaskPlan) -> Vec<(String, String)> {
    let mut found = Vec::new();
    for subtask in &plan.subtasks {
        let words: HashSet<String> = subtask
            .steps
            .iter()
            .flat_map(|step| step.split(|c: char| !c.is_alphanumeric() && c != '_'))
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();

        for other in plan.subtasks.iter().filter(|o| o.name != subtask.name) {
            if words.contains(&other.name.to_lowercase()) {
                found.push((subtask.name.clone(), other.name.clone()));
            }
        }
    }
    found
}
