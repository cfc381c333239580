#[cfg(test)]
pub(crate) mod failing;
mod fastembed_manager;
mod hash_embedder;
mod ollama;

pub use fastembed_manager::FastEmbedManager;
pub use hash_embedder::HashEmbedder;
pub use ollama::OllamaEmbedder;

use crate::config::EmbeddingConfig;
use crate::error::EmbeddingError;
use std::sync::Arc;

/// Trait for embedding generation
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for a batch of text
    fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Get the dimension of the embeddings
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Name of the provider, as written in `embedding.provider`
    fn provider(&self) -> &str;

    /// Embed a single text segment
    fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let embedding = self
            .embed_batch(vec![text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::GenerationFailed("No embedding generated".into()))?;

        if embedding.len() != self.dimension() {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension(),
                actual: embedding.len(),
            });
        }

        Ok(embedding)
    }
}

/// Build the embedding provider selected by the configuration
pub fn create_provider(
    config: &EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    let model = config.resolved_model_name();
    tracing::info!(
        "Using '{}' embedding provider with model '{}'",
        config.provider,
        model
    );

    match config.provider.as_str() {
        "fastembed" => Ok(Arc::new(FastEmbedManager::from_model_name(model)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        "hash" => Ok(Arc::new(HashEmbedder::with_dimension(config.hash_dimension))),
        other => Err(EmbeddingError::UnknownProvider(other.to_string())),
    }
}
