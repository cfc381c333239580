use super::EmbeddingProvider;
use crate::config::EmbeddingConfig;
use crate::error::EmbeddingError;
use crate::ollama_api::{ApiError, OllamaApi};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

const EMBED_PATH: &str = "/api/embed";
const DIMENSION_SAMPLE: &str = "dimension sample";
const MAX_BATCH: usize = 64;

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embedding provider backed by an Ollama server (`nomic-embed-text` and friends)
pub struct OllamaEmbedder {
    api: OllamaApi,
    model: String,
    dimension: usize,
}

impl OllamaEmbedder {
    /// Connect to the configured server and learn the model's vector size
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let api = OllamaApi::new(
            &config.ollama_url,
            Duration::from_secs(config.timeout_secs),
        )
        .map_err(|e| EmbeddingError::InitializationFailed(e.to_string()))?;

        let mut embedder = Self {
            api,
            model: config.resolved_model_name().to_string(),
            dimension: 0,
        };

        let sample = embedder
            .request(&[DIMENSION_SAMPLE.to_string()])
            .map_err(|e| EmbeddingError::InitializationFailed(e.to_string()))?;
        embedder.dimension = sample.first().map(Vec::len).unwrap_or_default();

        if embedder.dimension == 0 {
            return Err(EmbeddingError::InitializationFailed(format!(
                "Ollama model '{}' returned an empty embedding",
                embedder.model
            )));
        }

        info!(
            "Ollama embedding model '{}' at {} produces {} dimensions",
            embedder.model,
            embedder.api.base_url(),
            embedder.dimension
        );

        Ok(embedder)
    }

    fn request_failed(&self, err: ApiError) -> EmbeddingError {
        EmbeddingError::RequestFailed {
            url: format!("{}{}", self.api.base_url().as_str().trim_end_matches('/'), EMBED_PATH),
            reason: err.to_string(),
        }
    }

    fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let body = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        let response_text = self
            .api
            .post_json(EMBED_PATH, &body)
            .map_err(|e| self.request_failed(e))?;

        let response: EmbedResponse = serde_json::from_str(&response_text).map_err(|e| {
            EmbeddingError::GenerationFailed(format!("Failed to parse embedding response: {}", e))
        })?;

        if response.embeddings.len() != texts.len() {
            return Err(EmbeddingError::GenerationFailed(format!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.embeddings.len()
            )));
        }

        Ok(response.embeddings)
    }
}

impl EmbeddingProvider for OllamaEmbedder {
    fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        debug!("Requesting {} embeddings from Ollama", texts.len());

        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH) {
            for embedding in self.request(batch)? {
                if embedding.len() != self.dimension {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected: self.dimension,
                        actual: embedding.len(),
                    });
                }
                embeddings.push(embedding);
            }
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider(&self) -> &str {
        "ollama"
    }
}
