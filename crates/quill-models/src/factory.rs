//! Model factory for creating model and embedder instances from configuration.
//!
//! API keys fall back to `OPENAI_API_KEY` when not configured explicitly.

use crate::{MockEmbedder, MockModel, OpenAIEmbedder, OpenAIModel};
use quill_abstraction::{Embedder, Model, ModelError};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Model type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    /// Mock model for testing.
    Mock,
    /// OpenAI or an OpenAI-compatible server.
    OpenAI,
}

impl FromStr for ModelType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "openai" | "openai-compatible" | "universal" => Ok(Self::OpenAI),
            other => Err(ModelError::UnsupportedModelProvider(other.to_string())),
        }
    }
}

/// Model configuration.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// The type of model to create.
    pub model_type: ModelType,
    /// The model ID (e.g., "gpt-4o-mini", "text-embedding-3-small").
    pub model_id: String,
    /// Optional API key (if not provided, will be loaded from environment).
    pub api_key: Option<String>,
    /// Optional base URL for OpenAI-compatible servers.
    pub base_url: Option<String>,
    /// Optional vector dimension, used only for embedders.
    pub dimension: Option<usize>,
}

impl ModelConfig {
    /// Creates a new `ModelConfig` with the given type and model ID.
    #[must_use]
    pub const fn new(model_type: ModelType, model_id: String) -> Self {
        Self { model_type, model_id, api_key: None, base_url: None, dimension: None }
    }

    /// Sets the API key for this configuration.
    #[must_use]
    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.api_key = Some(api_key);
        self
    }

    /// Sets the base URL for this configuration.
    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Sets the embedding dimension for this configuration.
    #[must_use]
    pub const fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }
}

/// Factory for creating model instances.
pub struct ModelFactory;

impl ModelFactory {
    /// Creates a chat model instance from the given configuration.
    ///
    /// # Errors
    /// Returns a `ModelError` if model creation fails (e.g., missing API key).
    pub fn create(config: ModelConfig) -> Result<Arc<dyn Model>, ModelError> {
        debug!(
            model_type = ?config.model_type,
            model_id = %config.model_id,
            "Creating model instance"
        );

        match config.model_type {
            ModelType::Mock => Ok(Arc::new(MockModel::new(config.model_id))),
            ModelType::OpenAI => {
                let mut model = if let Some(api_key) = config.api_key {
                    OpenAIModel::with_api_key(config.model_id, api_key)
                } else {
                    OpenAIModel::new(config.model_id)?
                };
                if let Some(base_url) = config.base_url {
                    model = model.with_base_url(base_url);
                }
                Ok(Arc::new(model))
            }
        }
    }
}

/// Factory for creating embedder instances.
pub struct EmbedderFactory;

impl EmbedderFactory {
    /// Creates an embedder from the given configuration.
    ///
    /// # Errors
    /// Returns a `ModelError` if creation fails (e.g., missing API key).
    pub fn create(config: ModelConfig) -> Result<Arc<dyn Embedder>, ModelError> {
        debug!(
            model_type = ?config.model_type,
            model_id = %config.model_id,
            "Creating embedder instance"
        );

        match config.model_type {
            ModelType::Mock => {
                let mut embedder = MockEmbedder::new(config.model_id);
                if let Some(dimension) = config.dimension {
                    embedder = embedder.with_dimension(dimension);
                }
                Ok(Arc::new(embedder))
            }
            ModelType::OpenAI => {
                let mut embedder = if let Some(api_key) = config.api_key {
                    OpenAIEmbedder::with_api_key(config.model_id, api_key)
                } else {
                    OpenAIEmbedder::new(config.model_id)?
                };
                if let Some(base_url) = config.base_url {
                    embedder = embedder.with_base_url(base_url);
                }
                if let Some(dimension) = config.dimension {
                    embedder = embedder.with_dimension(dimension);
                }
                Ok(Arc::new(embedder))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_type_from_str() {
        assert_eq!(ModelType::from_str("mock").unwrap(), ModelType::Mock);
        assert_eq!(ModelType::from_str("OpenAI").unwrap(), ModelType::OpenAI);
        assert_eq!(ModelType::from_str("universal").unwrap(), ModelType::OpenAI);
        assert!(ModelType::from_str("gemini").is_err());
    }

    #[test]
    fn test_create_mock_model() {
        let model = ModelFactory::create(ModelConfig::new(ModelType::Mock, "m".to_string())).unwrap();
        assert_eq!(model.model_id(), "m");
    }

    #[test]
    fn test_create_openai_model_with_key() {
        let config = ModelConfig::new(ModelType::OpenAI, "gpt-4o-mini".to_string())
            .with_api_key("k".to_string())
            .with_base_url("http://localhost:1234/v1".to_string());
        let model = ModelFactory::create(config).unwrap();
        assert_eq!(model.model_id(), "gpt-4o-mini");
    }

    #[test]
    fn test_create_mock_embedder_with_dimension() {
        let config = ModelConfig::new(ModelType::Mock, "e".to_string()).with_dimension(32);
        let embedder = EmbedderFactory::create(config).unwrap();
        assert_eq!(embedder.dimension(), 32);
        assert_eq!(embedder.model_id(), "e");
    }
}
