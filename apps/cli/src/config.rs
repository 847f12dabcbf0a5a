//! CLI configuration file support.
//!
//! Configuration precedence (highest first):
//! 1. CLI arguments (handled by clap)
//! 2. `QUILL_*` environment variables
//! 3. An explicit `--config` file
//! 4. Local config file (./.quillrc)
//! 5. Global config file (~/.quill/config.toml)
//! 6. Defaults

use quill_engine::EngineConfig;
use quill_models::{ModelConfig, ModelType};
use quill_retrieval::RetrievalConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Provider settings for a chat model or an embedder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider type (`openai`, `mock`).
    pub model_type: Option<String>,
    /// Model identifier.
    pub model_id: Option<String>,
    /// Base URL of an OpenAI-compatible server.
    pub base_url: Option<String>,
    /// API key; `OPENAI_API_KEY` is used when unset.
    pub api_key: Option<String>,
    /// Embedding dimension. Ignored for chat models.
    pub dimension: Option<usize>,
}

/// CLI configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Log level or `EnvFilter` directive.
    pub log_level: Option<String>,
    /// Chat model.
    pub model: ProviderConfig,
    /// Embedding model for supplementary documents.
    pub embedding: ProviderConfig,
    /// Engine tunables.
    pub engine: EngineConfig,
    /// Index and cache tunables.
    pub retrieval: RetrievalConfig,
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum CliConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read configuration file: {0}")]
    ReadError(String),

    /// Failed to parse configuration file.
    #[error("Failed to parse configuration file: {0}")]
    ParseError(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Result type for configuration operations.
pub type CliConfigResult<T> = std::result::Result<T, CliConfigError>;

impl CliConfig {
    /// Load configuration from a single TOML file.
    pub fn load_from_file(path: &Path) -> CliConfigResult<Self> {
        let table = read_table(path)?;
        toml::Value::Table(table)
            .try_into()
            .map_err(|e| CliConfigError::ParseError(format!("{}: {}", path.display(), e)))
    }

    /// Get default global configuration file path.
    pub fn default_global_path() -> PathBuf {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".quill")
            .join("config.toml")
    }

    /// Get default local configuration file path.
    pub fn default_local_path() -> PathBuf {
        PathBuf::from(".quillrc")
    }

    /// Discover and load configuration files, then apply `QUILL_*` variables.
    ///
    /// Missing global and local files are skipped; an explicit file must
    /// exist. Later files override earlier ones key by key, so a local
    /// `[engine]` table only replaces the keys it names.
    pub fn discover_and_load(explicit: Option<&Path>) -> CliConfigResult<Self> {
        let mut merged = toml::Table::new();
        for path in [Self::default_global_path(), Self::default_local_path()] {
            if path.is_file() {
                merge_tables(&mut merged, read_table(&path)?);
            }
        }
        if let Some(path) = explicit {
            merge_tables(&mut merged, read_table(path)?);
        }

        let mut config: Self = toml::Value::Table(merged)
            .try_into()
            .map_err(|e| CliConfigError::ParseError(e.to_string()))?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applies `QUILL_*` overrides read through `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> CliConfigResult<()> {
        let set = |slot: &mut Option<String>, key: &str| {
            if let Some(value) = var(key).filter(|v| !v.is_empty()) {
                *slot = Some(value);
            }
        };

        set(&mut self.log_level, "QUILL_LOG_LEVEL");
        set(&mut self.model.model_type, "QUILL_MODEL_TYPE");
        set(&mut self.model.model_id, "QUILL_MODEL_ID");
        set(&mut self.model.base_url, "QUILL_BASE_URL");
        set(&mut self.model.api_key, "QUILL_API_KEY");
        set(&mut self.embedding.model_type, "QUILL_EMBEDDING_TYPE");
        set(&mut self.embedding.model_id, "QUILL_EMBEDDING_MODEL_ID");
        set(&mut self.embedding.base_url, "QUILL_EMBEDDING_BASE_URL");

        if let Some(dir) = var("QUILL_CACHE_DIR").filter(|v| !v.is_empty()) {
            self.retrieval.cache_dir = PathBuf::from(dir);
        }
        if let Some(rounds) = var("QUILL_MAX_ROUNDS") {
            self.engine.max_rounds = rounds
                .parse()
                .map_err(|_| CliConfigError::InvalidValue(format!("QUILL_MAX_ROUNDS={rounds}")))?;
        }
        Ok(())
    }

    /// Chat model settings for the factory.
    pub fn model_config(&self) -> CliConfigResult<ModelConfig> {
        provider_config(&self.model, None, DEFAULT_CHAT_MODEL)
    }

    /// Embedder settings for the factory. Connection settings fall back to
    /// the chat model's when the embedding section leaves them unset.
    pub fn embedding_config(&self) -> CliConfigResult<ModelConfig> {
        provider_config(&self.embedding, Some(&self.model), DEFAULT_EMBEDDING_MODEL)
    }
}

fn provider_config(
    provider: &ProviderConfig,
    fallback: Option<&ProviderConfig>,
    default_model: &str,
) -> CliConfigResult<ModelConfig> {
    let inherit = |field: fn(&ProviderConfig) -> &Option<String>| {
        field(provider).clone().or_else(|| fallback.and_then(|f| field(f).clone()))
    };

    let model_type = inherit(|p| &p.model_type).unwrap_or_else(|| "openai".to_string());
    let model_type = ModelType::from_str(&model_type)
        .map_err(|e| CliConfigError::InvalidValue(e.to_string()))?;
    let model_id = provider.model_id.clone().unwrap_or_else(|| default_model.to_string());

    let mut config = ModelConfig::new(model_type, model_id);
    if let Some(api_key) = inherit(|p| &p.api_key) {
        config = config.with_api_key(api_key);
    }
    if let Some(base_url) = inherit(|p| &p.base_url) {
        config = config.with_base_url(base_url);
    }
    if let Some(dimension) = provider.dimension {
        config = config.with_dimension(dimension);
    }
    Ok(config)
}

fn read_table(path: &Path) -> CliConfigResult<toml::Table> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| CliConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| CliConfigError::ParseError(format!("{}: {}", path.display(), e)))
}

/// Recursively overlays `overlay` onto `base`.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
