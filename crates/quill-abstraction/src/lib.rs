//! Model abstraction layer for Quill.
//!
//! This module defines the core traits and types for interacting with
//! language models and embedding services.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Represents an error that can occur when interacting with a model or embedding service.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelError {
    /// An error occurred during the API request (e.g., network issues, invalid request).
    #[error("Request Error: {0}")]
    RequestError(String),

    /// The model returned an error (e.g., invalid input, rate limiting).
    #[error("Model Response Error: {0}")]
    ModelResponseError(String),

    /// An error occurred during serialization or deserialization.
    #[error("Serialization Error: {0}")]
    SerializationError(String),

    /// The model provider is not supported or configured.
    #[error("Unsupported Model Provider: {0}")]
    UnsupportedModelProvider(String),

    /// Provider quota exceeded or rate limit hit.
    #[error("Provider '{provider}' quota exceeded{}", .message.as_ref().map(|m| format!(": {}", m)).unwrap_or_default())]
    QuotaExceeded {
        /// The provider name (e.g., "openai").
        provider: String,
        /// Optional error message from the provider.
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Other unexpected errors.
    #[error("Other Model Error: {0}")]
    Other(String),
}

/// Represents a message in a conversation with a chat model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message sender (e.g., "user", "assistant", "system").
    pub role: String,
    /// The content of the message.
    pub content: String,
}

impl ChatMessage {
    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

/// Output format the model is asked to produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResponseFormat {
    /// Free-form text.
    Text,
    /// Any syntactically valid JSON object.
    Json,
    /// JSON conforming to the given schema.
    JsonSchema {
        /// Schema name reported to the provider.
        name: String,
        /// The JSON schema document.
        schema: serde_json::Value,
    },
}

/// Parameters for controlling the model's generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelParameters {
    /// What sampling temperature to use, between 0 and 2.
    /// Higher values mean the model will take more risks.
    pub temperature: Option<f32>,

    /// An alternative to sampling with temperature, called nucleus sampling,
    /// where the model considers the results of the tokens with `top_p` probability mass.
    pub top_p: Option<f32>,

    /// The maximum number of tokens to generate in the chat completion.
    pub max_tokens: Option<u32>,

    /// Up to 4 sequences where the API will stop generating further tokens.
    pub stop_sequences: Option<Vec<String>>,

    /// Constrains the shape of the response.
    pub response_format: Option<ResponseFormat>,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            temperature: Some(0.7),
            top_p: Some(1.0),
            max_tokens: None,
            stop_sequences: None,
            response_format: None,
        }
    }
}

/// The response from a text generation or chat completion model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    /// The generated content.
    pub content: String,

    /// Optional: The ID of the model used to generate the response.
    pub model_id: Option<String>,

    /// Optional: Usage statistics for the request.
    pub usage: Option<ModelUsage>,
}

/// Usage statistics for a model request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelUsage {
    /// Number of tokens in the prompt.
    pub prompt_tokens: u32,

    /// Number of tokens in the completion.
    pub completion_tokens: u32,

    /// Total number of tokens used.
    pub total_tokens: u32,
}

/// A trait for interacting with different AI models.
///
/// All models must be `Send + Sync` to allow concurrent use across tasks.
#[async_trait]
pub trait Model: Send + Sync {
    /// Generates a text completion based on the given prompt.
    ///
    /// # Errors
    /// Returns a `ModelError` if generation fails.
    async fn generate_text(
        &self,
        prompt: &str,
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        self.generate_chat_completion(&[ChatMessage::user(prompt)], parameters).await
    }

    /// Generates a chat completion based on the given conversation history.
    ///
    /// # Errors
    /// Returns a `ModelError` if generation fails.
    async fn generate_chat_completion(
        &self,
        messages: &[ChatMessage],
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError>;

    /// Returns the ID of the model.
    fn model_id(&self) -> &str;
}

/// A trait for services that turn text into dense vectors.
///
/// Vectors from one embedder are comparable with each other by cosine
/// similarity; vectors from different embedders are not.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError>;

    /// Embeds a batch of texts, returning one vector per input in order.
    /// The default implementation calls `embed` per item.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// Dimensionality of the output vectors.
    fn dimension(&self) -> usize;

    /// Model identifier (e.g. "text-embedding-3-small").
    fn model_id(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_error_display() {
        let err = ModelError::QuotaExceeded {
            provider: "openai".to_string(),
            message: Some("insufficient_quota".to_string()),
        };
        assert_eq!(err.to_string(), "Provider 'openai' quota exceeded: insufficient_quota");

        let bare = ModelError::QuotaExceeded { provider: "openai".to_string(), message: None };
        assert_eq!(bare.to_string(), "Provider 'openai' quota exceeded");
    }

    #[test]
    fn test_chat_message_constructors() {
        assert_eq!(ChatMessage::system("be brief").role, "system");
        assert_eq!(ChatMessage::user("hi").content, "hi");
    }

    #[test]
    fn test_default_parameters_have_no_response_format() {
        let params = ModelParameters::default();
        assert!(params.response_format.is_none());
        assert_eq!(params.temperature, Some(0.7));
    }

    struct Doubler;

    #[async_trait]
    impl Embedder for Doubler {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
            Ok(vec![text.len() as f32 * 2.0])
        }

        fn dimension(&self) -> usize {
            1
        }

        fn model_id(&self) -> &str {
            "doubler"
        }
    }

    #[tokio::test]
    async fn test_embed_batch_default_preserves_order() {
        let vectors = Doubler.embed_batch(&["a".to_string(), "abc".to_string()]).await.unwrap();
        assert_eq!(vectors, vec![vec![2.0], vec![6.0]]);
    }
}
