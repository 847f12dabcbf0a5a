//! Model implementations for Quill.
//!
//! This crate provides concrete implementations of the `Model` and
//! `Embedder` traits.
//!
//! # Supported Providers
//!
//! - **Mock**: Testing and offline development
//! - **OpenAI**: OpenAI's GPT and embedding models, or any OpenAI-compatible
//!   server reachable through a custom base URL

pub mod embeddings;
pub mod factory;
pub mod openai;

use async_trait::async_trait;
use quill_abstraction::{ChatMessage, Model, ModelError, ModelParameters, ModelResponse, ModelUsage};
use tracing::debug;

pub use embeddings::{MockEmbedder, OpenAIEmbedder};
pub use factory::{EmbedderFactory, ModelConfig, ModelFactory, ModelType};
pub use openai::OpenAIModel;

/// A mock implementation of the `Model` trait for testing and demonstration.
///
/// Echoes the last message back, so pipelines can be exercised without a
/// network connection.
#[derive(Debug, Default)]
pub struct MockModel {
    id: String,
}

impl MockModel {
    /// Creates a new `MockModel` with the given ID.
    #[must_use]
    pub const fn new(id: String) -> Self {
        Self { id }
    }
}

#[async_trait]
impl Model for MockModel {
    async fn generate_chat_completion(
        &self,
        messages: &[ChatMessage],
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        debug!(
            model_id = %self.id,
            message_count = messages.len(),
            parameters = ?parameters,
            "MockModel generating chat completion"
        );

        let last = messages.last().map(|m| m.content.as_str()).unwrap_or_default();
        let response_content = format!("Mock response from {}: {last}", self.id);

        let prompt_tokens = messages.iter().map(|m| count_tokens(&m.content)).sum::<u32>();
        let completion_tokens = count_tokens(&response_content);

        Ok(ModelResponse {
            content: response_content,
            model_id: Some(self.id.clone()),
            usage: Some(ModelUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            }),
        })
    }

    fn model_id(&self) -> &str {
        &self.id
    }
}

/// Count tokens in a string (simplified: word count).
fn count_tokens(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_model_echoes_last_message() {
        let model = MockModel::new("mock-1".to_string());
        let messages = vec![ChatMessage::system("ignored"), ChatMessage::user("hello there")];
        let response = model.generate_chat_completion(&messages, None).await.unwrap();

        assert!(response.content.ends_with("hello there"));
        assert_eq!(response.model_id.as_deref(), Some("mock-1"));
        let usage = response.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 3);
        assert_eq!(usage.total_tokens, usage.prompt_tokens + usage.completion_tokens);
    }

    #[tokio::test]
    async fn test_mock_model_generate_text_uses_chat_path() {
        let model = MockModel::new("mock-2".to_string());
        let response = model.generate_text("ping", None).await.unwrap();
        assert_eq!(response.content, "Mock response from mock-2: ping");
    }
}
