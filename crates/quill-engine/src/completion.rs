//! Model calls with timeouts, strict JSON decoding and bounded retry.

use crate::error::CompletionError;
use quill_abstraction::{ChatMessage, Model, ModelParameters, ResponseFormat};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// A named JSON schema for structured responses.
#[derive(Debug, Clone)]
pub struct OutputSchema {
    /// Schema name reported to the provider.
    pub name: &'static str,
    /// Schema document.
    pub schema: serde_json::Value,
}

/// Issues chat completions for the engine's agents.
#[derive(Clone)]
pub struct Completer {
    model: Arc<dyn Model>,
    timeout: Duration,
    temperature: f32,
}

impl Completer {
    /// Creates a completer around `model`.
    #[must_use]
    pub fn new(model: Arc<dyn Model>, timeout: Duration, temperature: f32) -> Self {
        Self { model, timeout, temperature }
    }

    /// Sends a system and a user message and returns the trimmed response.
    ///
    /// With a schema, the provider is asked for JSON matching it; the text is
    /// returned undecoded.
    ///
    /// # Errors
    /// `Model` for provider failures, `Timeout` when the call exceeds the limit.
    pub async fn complete(
        &self,
        system: &str,
        user: &str,
        schema: Option<&OutputSchema>,
    ) -> Result<String, CompletionError> {
        let messages = [ChatMessage::system(system), ChatMessage::user(user)];
        let parameters = ModelParameters {
            temperature: Some(self.temperature),
            top_p: None,
            max_tokens: None,
            stop_sequences: None,
            response_format: schema.map(|s| ResponseFormat::JsonSchema {
                name: s.name.to_string(),
                schema: s.schema.clone(),
            }),
        };

        debug!(
            model_id = %self.model.model_id(),
            system_len = system.len(),
            user_len = user.len(),
            structured = schema.is_some(),
            "Issuing completion"
        );

        let call = self.model.generate_chat_completion(&messages, Some(parameters));
        let response = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| CompletionError::Timeout(self.timeout))??;
        Ok(response.content.trim().to_string())
    }

    /// Like `complete` with a schema, then decodes the response strictly.
    ///
    /// # Errors
    /// As `complete`, plus `Schema` when the response does not decode into `T`.
    pub async fn complete_json<T: DeserializeOwned>(
        &self,
        system: &str,
        user: &str,
        schema: &OutputSchema,
    ) -> Result<T, CompletionError> {
        let raw = self.complete(system, user, Some(schema)).await?;
        decode_strict(&raw)
    }
}

/// Decodes JSON, unwrapping a single fenced ```json block and nothing else.
///
/// # Errors
/// Returns `CompletionError::Schema` when the text is not valid for `T`.
pub fn decode_strict<T: DeserializeOwned>(raw: &str) -> Result<T, CompletionError> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .and_then(|rest| rest.strip_suffix("```"))
        .map_or(trimmed, str::trim);
    serde_json::from_str(body).map_err(|e| CompletionError::Schema(e.to_string()))
}

/// Runs `op` up to `attempts` times (at least once) until it succeeds.
///
/// # Errors
/// Returns the error of the final attempt.
pub async fn with_attempts<T, F, Fut>(
    stage: &'static str,
    attempts: u32,
    mut op: F,
) -> Result<T, CompletionError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, CompletionError>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                warn!(stage, attempt, max_attempts = attempts, error = %e, "Attempt failed, retrying");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
