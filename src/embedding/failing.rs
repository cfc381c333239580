//! Test double whose embeddings fail on demand

use super::{EmbeddingProvider, HashEmbedder};
use crate::error::EmbeddingError;

/// Hash embeddings that fail for any text containing `marker`
pub(crate) struct FailingEmbedder {
    inner: HashEmbedder,
    marker: String,
}

impl FailingEmbedder {
    pub(crate) fn new(dimension: usize, marker: &str) -> Self {
        Self {
            inner: HashEmbedder::with_dimension(dimension),
            marker: marker.to_string(),
        }
    }
}

impl EmbeddingProvider for FailingEmbedder {
    fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.iter().any(|t| t.contains(&self.marker)) {
            return Err(EmbeddingError::GenerationFailed(format!(
                "text contains {:?}",
                self.marker
            )));
        }
        self.inner.embed_batch(texts)
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn provider(&self) -> &str {
        self.inner.provider()
    }
}
