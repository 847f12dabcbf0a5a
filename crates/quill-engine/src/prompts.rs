//! Agent definitions and prompt builders.

use crate::task::{MetricResult, Subtask};
use std::fmt::Write as _;

/// Identity of an LLM-facing component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentDefinition {
    /// Display name; the system prompt opens with it.
    pub name: &'static str,
    /// What the agent is responsible for.
    pub role: &'static str,
    /// How it carries the role out.
    pub function: &'static str,
}

impl AgentDefinition {
    /// Renders the system prompt for this agent.
    #[must_use]
    pub fn system_prompt(&self) -> String {
        format!(
            "You are: {}.\nYour role: {}\nYour function: {}\n",
            self.name, self.role, self.function
        )
    }
}

pub const PLANNER: AgentDefinition = AgentDefinition {
    name: "Task Planner Agent",
    role: "Divide the given task into subtasks that can be completed independently of each other \
           and in parallel. Within each subtask, write steps that build on one another in sequence \
           to reach the best result for that subtask. The subtask outputs are combined to form the \
           final output.",
    function: "Read the task and the instructional content, then return only the task execution \
               plan. Each entry has a short unique `subtask_name`, ordered `subtask_steps`, and a \
               `semantic_query` of keywords, synonyms and related terms used to search the \
               supplementary documents.\n\
               Subtasks run IN PARALLEL. A bad split is [do research, write outline, write draft], \
               because each depends on the previous one. A good split divides the deliverable \
               itself (for an essay: introduction, each argument, conclusion), with research, \
               outlining, drafting and review as steps inside each subtask.\n\
               Subtasks must not refer to each other's output. Split the task into several subtasks.",
};

pub const EXECUTOR: AgentDefinition = AgentDefinition {
    name: "Task Executor Agent",
    role: "Execute one subtask using the task description, the instructional content and any \
           supplied reference context.",
    function: "Follow the numbered steps in order, draw on the provided material, and produce a \
               well-formed section that satisfies the task requirements. Return only the section \
               text. Unless the subtask asks for one, do NOT write a conclusion.",
};

pub const MERGER: AgentDefinition = AgentDefinition {
    name: "Merger Agent",
    role: "Editor who synthesizes section outputs into one coherent artifact that strictly \
           respects word count and formatting requirements.",
    function: "1. FOLLOW LENGTH REQUIREMENTS: stay within the word limit.\n\
               2. PRESERVE KEY CONTENT: keep the core arguments and evidence of each section.\n\
               3. INTEGRATE EFFICIENTLY: remove redundancy between sections.\n\
               4. MAINTAIN FLOW: add brief transitions.\n\
               5. ENSURE COVERAGE: represent every section proportionally.\n\
               Return only the merged text without section markers.",
};

pub const STANDARDS: AgentDefinition = AgentDefinition {
    name: "Standards Agent",
    role: "Review the task and instructional content and produce a checklist of verification \
           metrics.",
    function: "Return a list of metrics, each with a concise snake_case `name` and a one-sentence \
               `description` of what it measures. Cover accuracy, completeness, adherence to the \
               instructions, overall quality, and anything specific to this task. Exclude visual \
               or graphical concerns.",
};

pub const VERIFIER: AgentDefinition = AgentDefinition {
    name: "Verification Agent",
    role: "Review the output for basic requirements and overall quality. Be generous and avoid \
           strict academic criteria.",
    function: "Judge each metric you are given. Default to passing unless there is a major issue. \
               Citations are not required. Give a brief comment for every verdict, and for a \
               failure say concretely what must change.",
};

/// User prompt for the planner.
#[must_use]
pub fn planner_user(task_description: &str, instructional_content: &str) -> String {
    format!(
        "Below is the overall task and the instructional guidelines.\n\n\
         Task:\n{task_description}\n\n\
         Instructional content:\n{}\n\n\
         Now create the task execution plan.",
        or_none(instructional_content)
    )
}

/// User prompt for one executor. The first line is always `Subtask: <name>`.
#[must_use]
pub fn executor_user(
    subtask: &Subtask,
    task_description: &str,
    instructional_content: &str,
    context: Option<&str>,
    target_words: usize,
) -> String {
    let mut prompt = format!("Subtask: {}\nOverall task: {task_description}\n\n", subtask.name);

    prompt.push_str("Steps for this subtask:\n");
    for (i, step) in subtask.steps.iter().enumerate() {
        let _ = writeln!(prompt, "{}. {step}", i + 1);
    }

    let _ = write!(
        prompt,
        "\nTarget length: about {target_words} words.\n\n\
         Instructional guidelines:\n{}\n",
        or_none(instructional_content)
    );

    if let Some(context) = context.filter(|c| !c.is_empty()) {
        let _ = write!(prompt, "\nRelevant context from supplementary documents:\n{context}\n");
    }
    prompt
}

/// User prompt for the merger.
#[must_use]
pub fn merger_user(
    task_description: &str,
    instructional_content: &str,
    sections: &str,
    word_ceiling: usize,
) -> String {
    format!(
        "Merge the sections below into one coherent result.\n\n\
         CRITICAL REQUIREMENTS:\n\
         1. WORD LIMIT: {word_ceiling} words. This is strict.\n\
         2. PRESERVE CORE CONTENT from every section.\n\
         3. MAINTAIN BALANCE between sections.\n\
         4. REMOVE REDUNDANCY.\n\
         5. ADD TRANSITIONS between sections.\n\n\
         Original task:\n{task_description}\n\n\
         Instructional guidelines:\n{}\n\n\
         Sections to merge:\n{sections}",
        or_none(instructional_content)
    )
}

/// Note appended to the merger prompt after an overshoot.
#[must_use]
pub fn overshoot_note(actual_words: usize, word_ceiling: usize) -> String {
    format!(
        "\n\nWARNING: Your previous response was too long ({actual_words} words). \
         Produce a new version that is STRICTLY under {word_ceiling} words while keeping \
         the most important content."
    )
}

/// User prompt for the standards call.
#[must_use]
pub fn standards_user(task_description: &str, instructional_content: &str) -> String {
    format!(
        "Task:\n{task_description}\n\n\
         Instructional content:\n{}\n\n\
         Produce the list of verification metrics for this task.",
        or_none(instructional_content)
    )
}

/// User prompt for a rubric verification over several metrics.
#[must_use]
pub fn rubric_user(
    task_description: &str,
    instructional_content: &str,
    output: &str,
    metrics: &[(String, String)],
) -> String {
    let mut listed = String::new();
    for (name, description) in metrics {
        let _ = writeln!(listed, "- {name}: {description}");
    }
    format!(
        "Be generous. Minor issues must not cause a failure.\n\n\
         Original task:\n{task_description}\n\n\
         Instructional content:\n{}\n\n\
         Output to review:\n{output}\n\n\
         Metrics:\n{listed}\n\
         Return one verdict per metric, using the metric names exactly.",
        or_none(instructional_content)
    )
}

/// User prompt for judging one metric.
#[must_use]
pub fn metric_user(
    task_description: &str,
    instructional_content: &str,
    output: &str,
    metric: &str,
    description: &str,
) -> String {
    format!(
        "Original task:\n{task_description}\n\n\
         Instructional content:\n{}\n\n\
         Output to review:\n{output}\n\n\
         Metric `{metric}`: {description}\n\
         Does the output pass this metric?",
        or_none(instructional_content)
    )
}

/// Renders failed metrics as bullet lines, for logs.
#[must_use]
pub fn describe_failures<'a>(failed: impl Iterator<Item = &'a MetricResult>) -> String {
    failed.map(|m| format!("{}: {}", m.metric, m.comment)).collect::<Vec<_>>().join("; ")
}

fn or_none(text: &str) -> &str {
    if text.trim().is_empty() { "(none provided)" } else { text }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_names_agent() {
        let prompt = PLANNER.system_prompt();
        assert!(prompt.starts_with("You are: Task Planner Agent.\n"));
        assert!(prompt.contains("Your role: "));
        assert!(prompt.contains("Your function: "));
    }

    #[test]
    fn test_executor_prompt_layout() {
        let subtask = Subtask {
            name: "intro".to_string(),
            steps: vec!["Define the topic".to_string(), "State the thesis".to_string()],
            semantic_query: "topic thesis".to_string(),
        };
        let prompt = executor_user(&subtask, "Write an essay", "", Some("[1] snippet"), 300);

        assert!(prompt.starts_with("Subtask: intro\n"));
        assert!(prompt.contains("1. Define the topic\n2. State the thesis\n"));
        assert!(prompt.contains("about 300 words"));
        assert!(prompt.contains("(none provided)"));
        assert!(prompt.contains("[1] snippet"));

        let without = executor_user(&subtask, "Write an essay", "Rules", None, 300);
        assert!(!without.contains("supplementary documents"));
    }

    #[test]
    fn test_overshoot_note() {
        let note = overshoot_note(600, 500);
        assert!(note.contains("too long (600 words)"));
        assert!(note.contains("under 500 words"));
    }
}
