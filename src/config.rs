/// Configuration system for ragabond
///
/// Supports loading from multiple sources with priority:
/// CLI args > Environment variables > Config file > Defaults
use crate::error::{ConfigError, RagError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Embedding providers understood by [`crate::embedding::create_provider`]
pub const EMBEDDING_PROVIDERS: [&str; 3] = ["fastembed", "ollama", "hash"];

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Where named indexes live on disk
    #[serde(default)]
    pub index: IndexConfig,

    /// Embedding model configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Generative language model configuration
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Text chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Query-time retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

/// Index storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Directory holding one subdirectory per named index
    #[serde(default = "default_index_root")]
    pub root: PathBuf,
}

/// Embedding model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider: "fastembed" (local), "ollama" (HTTP) or "hash" (offline, deterministic)
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// Model name; unset means the provider's default (see [`default_embedding_model`])
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,

    /// Base URL of the Ollama server used when provider = "ollama"
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Vector size produced by the "hash" provider
    #[serde(default = "default_hash_dimension")]
    pub hash_dimension: usize,

    /// Timeout in seconds for a single embedding request
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

/// Generative model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Ollama model used to answer questions
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Base URL of the Ollama server
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Timeout in seconds for a whole generation request
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters shared between consecutive chunks
    #[serde(default = "default_chunk_overlap")]
    pub overlap: usize,
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of chunks retrieved per question
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Length of the source excerpts returned with an answer
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

fn default_index_root() -> PathBuf {
    crate::paths::PlatformPaths::default_index_root()
}

fn default_embedding_provider() -> String {
    "fastembed".to_string()
}

/// Embedding model used by `provider` when none is configured
pub fn default_embedding_model(provider: &str) -> &'static str {
    match provider {
        "ollama" => "nomic-embed-text",
        "hash" => "hash",
        _ => "all-MiniLM-L6-v2",
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_hash_dimension() -> usize {
    384
}

fn default_embedding_timeout() -> u64 {
    30
}

fn default_llm_model() -> String {
    "llama3.1".to_string()
}

fn default_generation_timeout() -> u64 {
    300
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_top_k() -> usize {
    4
}

fn default_preview_chars() -> usize {
    200
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            root: default_index_root(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model_name: None,
            ollama_url: default_ollama_url(),
            hash_dimension: default_hash_dimension(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl EmbeddingConfig {
    /// The configured model name, or the default of the configured provider
    pub fn resolved_model_name(&self) -> &str {
        self.model_name
            .as_deref()
            .unwrap_or_else(|| default_embedding_model(&self.provider))
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            ollama_url: default_ollama_url(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_chunk_overlap(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            preview_chars: default_preview_chars(),
        }
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> RagError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.into(),
    }
    .into()
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self, RagError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(format!("Invalid TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default location or create default
    pub fn load_or_default() -> Result<Self, RagError> {
        let config_path = crate::paths::PlatformPaths::default_config_path();

        if config_path.exists() {
            tracing::info!("Loading config from: {}", config_path.display());
            Self::from_file(&config_path)
        } else {
            tracing::info!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), RagError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::SaveFailed(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), RagError> {
        if !EMBEDDING_PROVIDERS.contains(&self.embedding.provider.as_str()) {
            return Err(invalid(
                "embedding.provider",
                format!(
                    "must be one of {:?}, got '{}'",
                    EMBEDDING_PROVIDERS, self.embedding.provider
                ),
            ));
        }

        if let Some(model) = &self.embedding.model_name
            && model.trim().is_empty()
        {
            return Err(invalid("embedding.model_name", "must not be empty"));
        }

        if self.embedding.hash_dimension == 0 {
            return Err(invalid("embedding.hash_dimension", "must be greater than 0"));
        }

        if self.embedding.timeout_secs == 0 {
            return Err(invalid("embedding.timeout_secs", "must be greater than 0"));
        }

        if self.generation.model.trim().is_empty() {
            return Err(invalid("generation.model", "must not be empty"));
        }

        if self.generation.timeout_secs == 0 {
            return Err(invalid("generation.timeout_secs", "must be greater than 0"));
        }

        for (key, value) in [
            ("embedding.ollama_url", &self.embedding.ollama_url),
            ("generation.ollama_url", &self.generation.ollama_url),
        ] {
            url::Url::parse(value).map_err(|e| invalid(key, format!("'{}': {}", value, e)))?;
        }

        if self.chunking.chunk_size == 0 {
            return Err(invalid("chunking.chunk_size", "must be greater than 0"));
        }

        if self.chunking.overlap >= self.chunking.chunk_size {
            return Err(invalid(
                "chunking.overlap",
                format!(
                    "must be smaller than chunking.chunk_size ({}), got {}",
                    self.chunking.chunk_size, self.chunking.overlap
                ),
            ));
        }

        if self.retrieval.top_k == 0 {
            return Err(invalid("retrieval.top_k", "must be greater than 0"));
        }

        if self.retrieval.preview_chars == 0 {
            return Err(invalid("retrieval.preview_chars", "must be greater than 0"));
        }

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup (the process environment in production)
    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(root) = lookup("RAGABOND_INDEX_ROOT") {
            self.index.root = PathBuf::from(root);
        }

        if let Some(provider) = lookup("RAGABOND_EMBEDDING_PROVIDER") {
            self.embedding.provider = provider;
        }

        if let Some(model) = lookup("RAGABOND_EMBEDDING_MODEL") {
            self.embedding.model_name = Some(model);
        }

        // One Ollama server usually serves both embeddings and generation
        if let Some(url) = lookup("RAGABOND_OLLAMA_URL") {
            self.embedding.ollama_url = url.clone();
            self.generation.ollama_url = url;
        }

        if let Some(model) = lookup("RAGABOND_LLM_MODEL") {
            self.generation.model = model;
        }

        if let Some(top_k) = lookup("RAGABOND_TOP_K")
            && let Ok(k) = top_k.parse()
        {
            self.retrieval.top_k = k;
        }
    }

    /// Create a new Config with defaults and environment overrides
    pub fn new() -> Result<Self, RagError> {
        let mut config = Self::load_or_default()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}
