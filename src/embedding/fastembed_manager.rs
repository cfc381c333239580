use super::EmbeddingProvider;
use crate::error::EmbeddingError;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Mutex;

/// FastEmbed-based local embedding provider (all-MiniLM-L6-v2 by default)
pub struct FastEmbedManager {
    // fastembed's embed() needs &mut self
    model: Mutex<TextEmbedding>,
    dimension: usize,
    model_name: String,
}

impl FastEmbedManager {
    /// Create a new FastEmbedManager with the default model (all-MiniLM-L6-v2)
    pub fn new() -> Result<Self, EmbeddingError> {
        Self::with_model(EmbeddingModel::AllMiniLML6V2, "all-MiniLM-L6-v2")
    }

    /// Create a manager from a configured model name
    pub fn from_model_name(name: &str) -> Result<Self, EmbeddingError> {
        let model = Self::parse_model_name(name).ok_or_else(|| {
            EmbeddingError::InitializationFailed(format!("Unsupported fastembed model: {}", name))
        })?;
        Self::with_model(model, name)
    }

    /// Map a user-facing model name onto a fastembed model
    fn parse_model_name(name: &str) -> Option<EmbeddingModel> {
        let normalized = name.trim().to_lowercase();
        let short = normalized.rsplit('/').next().unwrap_or(&normalized);

        match short {
            "all-minilm-l6-v2" => Some(EmbeddingModel::AllMiniLML6V2),
            "all-minilm-l12-v2" => Some(EmbeddingModel::AllMiniLML12V2),
            "bge-small-en-v1.5" => Some(EmbeddingModel::BGESmallENV15),
            "bge-base-en-v1.5" => Some(EmbeddingModel::BGEBaseENV15),
            "nomic-embed-text" | "nomic-embed-text-v1.5" => Some(EmbeddingModel::NomicEmbedTextV15),
            _ => None,
        }
    }

    fn dimension_for(model: &EmbeddingModel) -> usize {
        match model {
            EmbeddingModel::AllMiniLML6V2 => 384,
            EmbeddingModel::AllMiniLML12V2 => 384,
            EmbeddingModel::BGESmallENV15 => 384,
            EmbeddingModel::BGEBaseENV15 => 768,
            EmbeddingModel::NomicEmbedTextV15 => 768,
            _ => 384,
        }
    }

    /// Create a new FastEmbedManager with a specific model
    pub fn with_model(model: EmbeddingModel, model_name: &str) -> Result<Self, EmbeddingError> {
        tracing::info!("Initializing FastEmbed model: {:?}", model);

        let dimension = Self::dimension_for(&model);

        let mut options = InitOptions::default();
        options.model_name = model;
        options.show_download_progress = true;
        options.cache_dir = crate::paths::PlatformPaths::default_model_cache_dir();

        let embedding_model = TextEmbedding::try_new(options)
            .map_err(|e| EmbeddingError::InitializationFailed(format!("{:#}", e)))?;

        Ok(Self {
            model: Mutex::new(embedding_model),
            dimension,
            model_name: model_name.to_string(),
        })
    }
}

impl EmbeddingProvider for FastEmbedManager {
    fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        tracing::debug!("Generating embeddings for {} texts", texts.len());

        let mut model = self
            .model
            .lock()
            .map_err(|e| EmbeddingError::LockPoisoned(e.to_string()))?;

        model
            .embed(texts, None)
            .map_err(|e| EmbeddingError::GenerationFailed(format!("{:#}", e)))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn provider(&self) -> &str {
        "fastembed"
    }
}
