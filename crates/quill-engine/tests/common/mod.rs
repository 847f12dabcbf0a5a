//! Scripted model for engine tests.
//!
//! Routes each call on the agent named in the system prompt and records
//! every user prompt it receives.

#![allow(dead_code)]

use async_trait::async_trait;
use quill_abstraction::{ChatMessage, Model, ModelError, ModelParameters, ModelResponse};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Agent {
    Planner,
    Executor,
    Merger,
    Standards,
    Verifier,
}

impl Agent {
    fn from_system_prompt(system: &str) -> Option<Self> {
        [
            ("Task Planner Agent", Self::Planner),
            ("Task Executor Agent", Self::Executor),
            ("Merger Agent", Self::Merger),
            ("Standards Agent", Self::Standards),
            ("Verification Agent", Self::Verifier),
        ]
        .into_iter()
        .find(|(name, _)| system.starts_with(&format!("You are: {name}.")))
        .map(|(_, agent)| agent)
    }
}

#[derive(Default)]
pub struct ScriptedModel {
    plans: Mutex<VecDeque<String>>,
    default_plan: String,
    merges: Mutex<VecDeque<String>>,
    verdicts: Mutex<VecDeque<String>>,
    standards: Mutex<VecDeque<String>>,
    delays_ms: HashMap<String, u64>,
    failing_subtasks: HashSet<String>,
    fail_merger: bool,
    calls: Mutex<Vec<(Agent, String)>>,
}

impl ScriptedModel {
    /// Every planner call returns `plan` unless other plans are queued first.
    pub fn new(plan: String) -> Self {
        Self { default_plan: plan, ..Self::default() }
    }

    pub fn with_plans(self, plans: Vec<String>) -> Self {
        *self.plans.lock().unwrap() = plans.into();
        self
    }

    pub fn with_merges(self, merges: Vec<String>) -> Self {
        *self.merges.lock().unwrap() = merges.into();
        self
    }

    pub fn with_verdicts(self, verdicts: Vec<String>) -> Self {
        *self.verdicts.lock().unwrap() = verdicts.into();
        self
    }

    pub fn with_standards(self, standards: Vec<String>) -> Self {
        *self.standards.lock().unwrap() = standards.into();
        self
    }

    pub fn with_delay(mut self, subtask: &str, ms: u64) -> Self {
        self.delays_ms.insert(subtask.to_string(), ms);
        self
    }

    pub fn with_failing_subtask(mut self, subtask: &str) -> Self {
        self.failing_subtasks.insert(subtask.to_string());
        self
    }

    pub fn with_failing_merger(mut self) -> Self {
        self.fail_merger = true;
        self
    }

    /// User prompts sent to `agent`, in call order.
    pub fn prompts(&self, agent: Agent) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(a, _)| *a == agent)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn count(&self, agent: Agent) -> usize {
        self.prompts(agent).len()
    }

    fn pop(queue: &Mutex<VecDeque<String>>) -> Option<String> {
        queue.lock().unwrap().pop_front()
    }
}

#[async_trait]
impl Model for ScriptedModel {
    async fn generate_chat_completion(
        &self,
        messages: &[ChatMessage],
        _parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        let system = &messages[0].content;
        let user = messages[1].content.clone();
        let agent = Agent::from_system_prompt(system)
            .ok_or_else(|| ModelError::Other(format!("unknown agent: {system}")))?;
        self.calls.lock().unwrap().push((agent, user.clone()));

        let content = match agent {
            Agent::Planner => Self::pop(&self.plans).unwrap_or_else(|| self.default_plan.clone()),
            Agent::Executor => {
                let name = user
                    .lines()
                    .next()
                    .and_then(|l| l.strip_prefix("Subtask: "))
                    .unwrap_or_default()
                    .to_string();
                if let Some(ms) = self.delays_ms.get(&name) {
                    tokio::time::sleep(Duration::from_millis(*ms)).await;
                }
                if self.failing_subtasks.contains(&name) {
                    return Err(ModelError::RequestError(format!("{name} exploded")));
                }
                format!("{name} stub")
            }
            Agent::Merger => {
                if self.fail_merger {
                    return Err(ModelError::RequestError("merger offline".to_string()));
                }
                Self::pop(&self.merges).unwrap_or_else(|| "Merged essay.".to_string())
            }
            Agent::Standards => Self::pop(&self.standards)
                .ok_or_else(|| ModelError::ModelResponseError("no standards scripted".to_string()))?,
            Agent::Verifier => {
                Self::pop(&self.verdicts).unwrap_or_else(|| r#"{"metrics": []}"#.to_string())
            }
        };

        Ok(ModelResponse { content, model_id: Some("scripted".to_string()), usage: None })
    }

    fn model_id(&self) -> &str {
        "scripted"
    }
}

/// A plan JSON with one subtask per name; each query is the name itself.
pub fn plan_json(names: &[&str]) -> String {
    plan_json_with_queries(&names.iter().map(|n| (*n, *n)).collect::<Vec<_>>())
}

/// A plan JSON from `(name, semantic_query)` pairs.
pub fn plan_json_with_queries(subtasks: &[(&str, &str)]) -> String {
    let entries: Vec<serde_json::Value> = subtasks
        .iter()
        .map(|(name, query)| {
            serde_json::json!({
                "subtask_name": name,
                "subtask_steps": [format!("Research {name}"), format!("Write {name}")],
                "semantic_query": query,
            })
        })
        .collect();
    serde_json::json!({ "task_execution_plan": entries }).to_string()
}

/// A rubric verdict failing `metric` with `comment`.
pub fn failing_verdict(metric: &str, comment: &str) -> String {
    serde_json::json!({
        "metrics": [{ "metric": metric, "passed": false, "comment": comment }]
    })
    .to_string()
}

/// `n` words of filler.
pub fn words(n: usize) -> String {
    vec!["word"; n].join(" ")
}
