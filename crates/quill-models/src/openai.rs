//! OpenAI model implementation.
//!
//! This module provides an implementation of the `Model` trait for OpenAI's
//! chat completions API and compatible servers.

use async_trait::async_trait;
use quill_abstraction::{
    ChatMessage, Model, ModelError, ModelParameters, ModelResponse, ModelUsage, ResponseFormat,
};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{debug, error};

/// Default endpoint for the hosted OpenAI API.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI model implementation.
#[derive(Debug, Clone)]
pub struct OpenAIModel {
    /// The model ID (e.g., "gpt-4o-mini").
    model_id: String,
    /// The API key for authentication.
    api_key: String,
    /// The base URL for the OpenAI API.
    base_url: String,
    /// HTTP client for making requests.
    client: Client,
}

impl OpenAIModel {
    /// Creates a new `OpenAIModel`, reading the key from `OPENAI_API_KEY`.
    ///
    /// # Errors
    /// Returns a `ModelError` if the API key is not found in environment variables.
    pub fn new(model_id: String) -> Result<Self, ModelError> {
        let api_key = env::var("OPENAI_API_KEY").map_err(|_| {
            ModelError::UnsupportedModelProvider(
                "OPENAI_API_KEY environment variable not set".to_string(),
            )
        })?;

        Ok(Self::with_api_key(model_id, api_key))
    }

    /// Creates a new `OpenAIModel` with a custom API key.
    #[must_use]
    pub fn with_api_key(model_id: String, api_key: String) -> Self {
        Self { model_id, api_key, base_url: DEFAULT_BASE_URL.to_string(), client: Client::new() }
    }

    /// Points the client at an OpenAI-compatible server.
    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Converts our ChatMessage role to OpenAI API role format.
    fn role_to_openai(role: &str) -> String {
        match role {
            "assistant" | "system" | "user" => role.to_string(),
            "model" => "assistant".to_string(),
            _ => role.to_string(),
        }
    }

    /// Converts a `ResponseFormat` into the request's `response_format` field.
    ///
    /// # Errors
    /// Returns `ModelError::SerializationError` when the schema is not a JSON object.
    pub fn convert_response_format(
        &self,
        format: &Option<ResponseFormat>,
    ) -> Result<Option<OpenAIResponseFormat>, ModelError> {
        match format {
            None | Some(ResponseFormat::Text) => Ok(None),
            Some(ResponseFormat::Json) => Ok(Some(OpenAIResponseFormat::JsonObject)),
            Some(ResponseFormat::JsonSchema { name, schema }) => {
                if !schema.is_object() {
                    return Err(ModelError::SerializationError(format!(
                        "Invalid JSON schema for '{}': expected an object, got {}",
                        name, schema
                    )));
                }
                Ok(Some(OpenAIResponseFormat::JsonSchema {
                    json_schema: OpenAIJsonSchema {
                        name: name.clone(),
                        schema: schema.clone(),
                        strict: true,
                    },
                }))
            }
        }
    }

    fn map_error_status(status: StatusCode, error_text: String) -> ModelError {
        let lowered = error_text.to_lowercase();
        let is_quota_error = lowered.contains("quota") || lowered.contains("rate limit");

        if status == StatusCode::PAYMENT_REQUIRED
            || status == StatusCode::TOO_MANY_REQUESTS
            || is_quota_error
        {
            return ModelError::QuotaExceeded {
                provider: "openai".to_string(),
                message: Some(error_text),
            };
        }

        ModelError::ModelResponseError(format!("API error ({}): {}", status, error_text))
    }
}

#[async_trait]
impl Model for OpenAIModel {
    async fn generate_chat_completion(
        &self,
        messages: &[ChatMessage],
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        debug!(
            model_id = %self.model_id,
            message_count = messages.len(),
            parameters = ?parameters,
            "OpenAIModel generating chat completion"
        );

        let url = format!("{}/chat/completions", self.base_url);

        let openai_messages: Vec<OpenAIMessage> = messages
            .iter()
            .map(|msg| OpenAIMessage {
                role: Self::role_to_openai(&msg.role),
                content: Some(msg.content.clone()),
            })
            .collect();

        let mut request_body = OpenAIRequest {
            model: self.model_id.clone(),
            messages: openai_messages,
            temperature: None,
            top_p: None,
            max_tokens: None,
            stop: None,
            response_format: None,
        };

        if let Some(params) = parameters {
            request_body.response_format = self.convert_response_format(&params.response_format)?;
            request_body.temperature = params.temperature;
            request_body.top_p = params.top_p;
            request_body.max_tokens = params.max_tokens;
            request_body.stop = params.stop_sequences;
        }

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to send request to OpenAI API");
                ModelError::RequestError(format!("Network error: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, error = %error_text, "OpenAI API returned error status");
            return Err(Self::map_error_status(status, error_text));
        }

        let openai_response: OpenAIResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse OpenAI API response");
            ModelError::SerializationError(format!("Failed to parse response: {}", e))
        })?;

        let content = openai_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                error!("No content in OpenAI API response");
                ModelError::ModelResponseError("No content in API response".to_string())
            })?;

        let usage = openai_response.usage.map(|u| ModelUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ModelResponse { content, model_id: Some(self.model_id.clone()), usage })
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// OpenAI API request/response structures

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<OpenAIResponseFormat>,
}

/// The `response_format` field of a chat completions request.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpenAIResponseFormat {
    /// `{"type": "json_object"}`
    JsonObject,
    /// `{"type": "json_schema", "json_schema": {...}}`
    JsonSchema {
        /// The named schema, sent in strict mode.
        json_schema: OpenAIJsonSchema,
    },
}

/// A named schema in strict mode.
#[derive(Debug, Clone, Serialize)]
pub struct OpenAIJsonSchema {
    name: String,
    schema: serde_json::Value,
    strict: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
#[allow(clippy::struct_field_names)] // Matches API naming
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
