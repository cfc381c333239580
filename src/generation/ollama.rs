use super::LanguageModel;
use crate::config::GenerationConfig;
use crate::error::GenerationError;
use crate::ollama_api::{ApiError, OllamaApi};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const GENERATE_PATH: &str = "/api/generate";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// One line of the streamed `/api/generate` response
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Language model served by Ollama (`llama3.1` by default)
pub struct OllamaModel {
    api: OllamaApi,
    model: String,
}

impl OllamaModel {
    pub fn new(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let api = OllamaApi::new(&config.ollama_url, Duration::from_secs(config.timeout_secs))
            .map_err(|e| GenerationError::RequestFailed {
                url: config.ollama_url.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            api,
            model: config.model.clone(),
        })
    }

    fn map_api_error(&self, err: ApiError) -> GenerationError {
        match err {
            ApiError::ClientStatus(status) => GenerationError::ClientStatus(status),
            other => GenerationError::RequestFailed {
                url: format!(
                    "{}{}",
                    self.api.base_url().as_str().trim_end_matches('/'),
                    GENERATE_PATH
                ),
                reason: other.to_string(),
            },
        }
    }
}

/// Fold one streamed line into the answer, returning whether more lines are expected
fn apply_chunk(
    line: &str,
    answer: &mut String,
    on_token: &mut dyn FnMut(&str),
) -> Result<bool, GenerationError> {
    let chunk: GenerateChunk = serde_json::from_str(line)
        .map_err(|e| GenerationError::MalformedResponse(format!("{}: {}", e, line)))?;

    if let Some(error) = chunk.error {
        return Err(GenerationError::ModelError(error));
    }

    if !chunk.response.is_empty() {
        on_token(&chunk.response);
        answer.push_str(&chunk.response);
    }

    Ok(!chunk.done)
}

impl LanguageModel for OllamaModel {
    fn generate(
        &self,
        prompt: &str,
        on_token: &mut dyn FnMut(&str),
    ) -> Result<String, GenerationError> {
        debug!(
            "Generating with '{}' (prompt length: {})",
            self.model,
            prompt.len()
        );

        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: true,
        };

        let mut answer = String::new();
        let mut stream_error = None;
        let mut finished = false;

        self.api
            .post_json_lines(GENERATE_PATH, &body, |line| {
                match apply_chunk(line, &mut answer, on_token) {
                    Ok(more) => {
                        finished = !more;
                        more
                    }
                    Err(e) => {
                        stream_error = Some(e);
                        false
                    }
                }
            })
            .map_err(|e| self.map_api_error(e))?;

        if let Some(e) = stream_error {
            return Err(e);
        }

        if !finished {
            return Err(GenerationError::MalformedResponse(
                "stream ended before the model reported completion".to_string(),
            ));
        }

        Ok(answer)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
