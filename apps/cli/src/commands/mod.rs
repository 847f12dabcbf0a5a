//! CLI command implementations.

pub mod index;
pub mod plan;
pub mod run;
pub mod types;

use crate::config::CliConfig;
use anyhow::Context;
use quill_engine::Engine;
use quill_models::{EmbedderFactory, ModelFactory};
use quill_retrieval::RetrievalService;
use std::sync::Arc;

/// Builds the retrieval service from the `[embedding]` and `[retrieval]` sections.
pub fn retrieval_service(config: &CliConfig) -> anyhow::Result<Arc<RetrievalService>> {
    let embedder = EmbedderFactory::create(config.embedding_config()?)
        .context("Failed to create embedder")?;
    Ok(Arc::new(RetrievalService::new(embedder, config.retrieval.clone())))
}

/// Builds an engine with retrieval enabled.
pub fn engine(config: &CliConfig) -> anyhow::Result<Engine> {
    let model = ModelFactory::create(config.model_config()?).context("Failed to create model")?;
    Ok(Engine::new(model, config.engine.clone()).with_retrieval(retrieval_service(config)?))
}
