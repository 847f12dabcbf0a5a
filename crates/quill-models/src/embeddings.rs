//! Embedding backends.
//!
//! `OpenAIEmbedder` talks to the `/embeddings` endpoint of OpenAI or any
//! compatible server. `MockEmbedder` produces deterministic vectors by
//! hashing tokens into a fixed number of buckets, so lexically similar
//! texts have high cosine similarity without a network round-trip.

use async_trait::async_trait;
use quill_abstraction::{Embedder, ModelError};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::env;
use tracing::{debug, error};

use crate::openai::DEFAULT_BASE_URL;

/// Default dimension of `text-embedding-3-small`.
pub const DEFAULT_OPENAI_DIMENSION: usize = 1536;

/// Default dimension of the mock embedder.
pub const DEFAULT_MOCK_DIMENSION: usize = 256;

/// Embedder backed by an OpenAI-compatible `/embeddings` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAIEmbedder {
    model_id: String,
    api_key: String,
    base_url: String,
    dimension: usize,
    client: Client,
}

impl OpenAIEmbedder {
    /// Creates a new embedder, reading the key from `OPENAI_API_KEY`.
    ///
    /// # Errors
    /// Returns a `ModelError` if the API key is not set.
    pub fn new(model_id: String) -> Result<Self, ModelError> {
        let api_key = env::var("OPENAI_API_KEY").map_err(|_| {
            ModelError::UnsupportedModelProvider(
                "OPENAI_API_KEY environment variable not set".to_string(),
            )
        })?;
        Ok(Self::with_api_key(model_id, api_key))
    }

    /// Creates a new embedder with an explicit API key.
    #[must_use]
    pub fn with_api_key(model_id: String, api_key: String) -> Self {
        Self {
            model_id,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            dimension: DEFAULT_OPENAI_DIMENSION,
            client: Client::new(),
        }
    }

    /// Points the client at an OpenAI-compatible server.
    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Overrides the reported vector dimension (for models other than
    /// `text-embedding-3-small`).
    #[must_use]
    pub const fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    async fn request(&self, input: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        let url = format!("{}/embeddings", self.base_url);
        let body = EmbeddingRequest { model: &self.model_id, input };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to send request to embeddings API");
                ModelError::RequestError(format!("Network error: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, error = %error_text, "Embeddings API returned error status");
            if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::PAYMENT_REQUIRED {
                return Err(ModelError::QuotaExceeded {
                    provider: "openai".to_string(),
                    message: Some(error_text),
                });
            }
            return Err(ModelError::ModelResponseError(format!(
                "API error ({}): {}",
                status, error_text
            )));
        }

        let mut parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            ModelError::SerializationError(format!("Failed to parse embeddings response: {}", e))
        })?;

        if parsed.data.len() != input.len() {
            return Err(ModelError::ModelResponseError(format!(
                "Expected {} embeddings, got {}",
                input.len(),
                parsed.data.len()
            )));
        }

        // The API may return items out of order; `index` is authoritative.
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        let mut vectors = self.request(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ModelError::ModelResponseError("Empty embeddings response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(model_id = %self.model_id, batch = texts.len(), "Embedding batch");
        self.request(texts).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// Deterministic offline embedder.
///
/// Each lowercase alphanumeric token is hashed with SHA-256 into one of
/// `dimension` buckets with a sign bit; the summed vector is L2-normalized.
/// Text without tokens maps to the zero vector.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    id: String,
    dimension: usize,
}

impl MockEmbedder {
    /// Creates a mock embedder with the default dimension.
    #[must_use]
    pub fn new(id: String) -> Self {
        Self { id, dimension: DEFAULT_MOCK_DIMENSION }
    }

    /// Overrides the vector dimension. Zero is clamped to one.
    #[must_use]
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension.max(1);
        self
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        let tokens = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase);

        for token in tokens {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket_bytes = [0_u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        Ok(self.vectorize(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_mock_embedder_is_deterministic() {
        let embedder = MockEmbedder::new("mock".to_string());
        let a = embedder.embed("The warranty period is two years").await.unwrap();
        let b = embedder.embed("The warranty period is two years").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), DEFAULT_MOCK_DIMENSION);
        assert!((cosine(&a, &b) - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_mock_embedder_case_and_punctuation_insensitive() {
        let embedder = MockEmbedder::new("mock".to_string());
        let a = embedder.embed("Hello, World!").await.unwrap();
        let b = embedder.embed("hello world").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_mock_embedder_empty_text_is_zero_vector() {
        let embedder = MockEmbedder::new("mock".to_string()).with_dimension(8);
        let v = embedder.embed("  ... ").await.unwrap();
        assert_eq!(v, vec![0.0; 8]);
    }

    #[tokio::test]
    async fn test_mock_embedder_overlap_scores_higher() {
        let embedder = MockEmbedder::new("mock".to_string());
        let query = embedder.embed("solar panel efficiency").await.unwrap();
        let close = embedder.embed("solar panel efficiency in winter").await.unwrap();
        let far = embedder.embed("medieval castle architecture").await.unwrap();
        assert!(cosine(&query, &close) > cosine(&query, &far));
    }
}
