//! Merging subtask outputs under a word ceiling.

use crate::completion::{with_attempts, Completer};
use crate::error::MergeError;
use crate::executor::degraded_marker;
use crate::prompts;
use crate::task::SubtaskPlan;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::ops::RangeInclusive;
use tracing::{info, warn};

/// Bare "N words" mentions outside this range are treated as noise.
pub const CEILING_RANGE: RangeInclusive<usize> = 500..=10_000;

/// Allowed overshoot before the merge is re-issued.
pub const OVERSHOOT_FACTOR: f64 = 1.1;

// Explicit limits, tried in order; any positive value is accepted.
static LIMIT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"between\s+[\d,]+\s+(?:and|to|-)\s+([\d,]+)\s+words?",
        r"word\s+(?:count|limit)\s*(?:of|is|:)?\s*([\d,]+)",
        r"(?:limit|maximum|max|not\s+exceed|no\s+more\s+than|up\s+to)\s+(?:of\s+)?([\d,]+)\s+words?",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("word limit pattern should be valid"))
    .collect()
});

static BARE_COUNT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([\d,]+)\s*-?\s*words?\b").expect("word count pattern should be valid"));

fn captured_numbers<'a>(re: &'a Regex, text: &'a str) -> impl Iterator<Item = usize> + 'a {
    re.captures_iter(text)
        .filter_map(|c| c.get(1))
        .filter_map(|m| m.as_str().replace(',', "").parse::<usize>().ok())
}

/// Finds the word ceiling stated in `instructional_content`, or `default`.
///
/// An explicit limit ("word limit: 300", "no more than 400 words") wins at
/// any positive size. A bare "N words" only counts inside `CEILING_RANGE`.
#[must_use]
pub fn extract_word_ceiling(instructional_content: &str, default: usize) -> usize {
    let text = instructional_content.to_lowercase();
    LIMIT_PATTERNS
        .iter()
        .flat_map(|re| captured_numbers(re, &text).collect::<Vec<_>>())
        .find(|n| *n > 0)
        .or_else(|| captured_numbers(&BARE_COUNT_PATTERN, &text).find(|n| CEILING_RANGE.contains(n)))
        .unwrap_or(default)
}

/// Whitespace-separated word count.
#[must_use]
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Concatenates outputs in plan order between section markers. Every plan
/// entry gets a section; a missing output is recorded as degraded.
#[must_use]
pub fn build_sections(plan: &SubtaskPlan, partial_results: &HashMap<String, String>) -> String {
    plan.names()
        .map(|name| {
            let body = partial_results.get(name).cloned().unwrap_or_else(|| degraded_marker(name));
            format!("=== BEGIN SECTION: {name} ===\n{body}\n=== END SECTION: {name} ===\n")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Combines subtask outputs into one artifact.
#[derive(Clone)]
pub struct Merger {
    completer: Completer,
    attempts: u32,
    default_ceiling: usize,
}

impl Merger {
    /// Creates a merger. `attempts` bounds retries of each call.
    #[must_use]
    pub fn new(completer: Completer, attempts: u32, default_ceiling: usize) -> Self {
        Self { completer, attempts, default_ceiling }
    }

    /// Merges `partial_results` in plan order.
    ///
    /// If the first result exceeds the ceiling by more than 10%, the call is
    /// re-issued once with an overshoot warning and the second result is
    /// accepted as is.
    ///
    /// # Errors
    /// Returns `MergeError` when a call fails on every attempt.
    pub async fn merge(
        &self,
        plan: &SubtaskPlan,
        partial_results: &HashMap<String, String>,
        instructional_content: &str,
        task_description: &str,
    ) -> Result<String, MergeError> {
        let ceiling = extract_word_ceiling(instructional_content, self.default_ceiling);
        let sections = build_sections(plan, partial_results);
        let system = prompts::MERGER.system_prompt();
        let mut user = prompts::merger_user(task_description, instructional_content, &sections, ceiling);

        let merged = self.call(&system, &user).await?;
        let words = word_count(&merged);
        if (words as f64) <= ceiling as f64 * OVERSHOOT_FACTOR {
            info!(words, ceiling, "Merge complete");
            return Ok(merged);
        }

        warn!(words, ceiling, "Merged result over budget, re-merging once");
        user.push_str(&prompts::overshoot_note(words, ceiling));
        let merged = self.call(&system, &user).await?;
        info!(words = word_count(&merged), ceiling, "Re-merge complete");
        Ok(merged)
    }

    async fn call(&self, system: &str, user: &str) -> Result<String, MergeError> {
        let completer = &self.completer;
        with_attempts("merging", self.attempts, |_| async move {
            completer.complete(system, user, None).await
        })
        .await
        .map_err(|last| MergeError { attempts: self.attempts.max(1), last })
    }
}
