//! Minimal blocking HTTP client for a local Ollama server.
//!
//! Shared by [`crate::embedding::OllamaEmbedder`] and [`crate::generation::OllamaModel`].

use serde::Serialize;
use std::io::{BufRead, BufReader};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};
use url::Url;

const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Failure talking to the Ollama server
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid URL: {0}")]
    Url(String),

    #[error("failed to serialize request: {0}")]
    Serialize(String),

    #[error("client error: HTTP {0}")]
    ClientStatus(u16),

    #[error("{0}")]
    Transport(String),
}

#[derive(Debug, Clone)]
pub struct OllamaApi {
    base_url: Url,
    agent: ureq::Agent,
    retry_attempts: u32,
}

impl OllamaApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url).map_err(|e| ApiError::Url(format!("{}: {}", base_url, e)))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();

        Ok(Self {
            base_url,
            agent,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        })
    }

    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::Url(format!("{}{}: {}", self.base_url, path, e)))
    }

    /// POST a JSON body and return the whole response body
    pub fn post_json<T: Serialize>(&self, path: &str, body: &T) -> Result<String, ApiError> {
        let url = self.endpoint(path)?;
        let request_json =
            serde_json::to_string(body).map_err(|e| ApiError::Serialize(e.to_string()))?;

        self.with_retry(|| {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    /// POST a JSON body and feed each line of a newline-delimited JSON response
    /// to `on_line` as it arrives. `on_line` returns `false` to stop reading.
    ///
    /// Only connecting is retried; once lines have been delivered a failure is final.
    pub fn post_json_lines<T, F>(&self, path: &str, body: &T, mut on_line: F) -> Result<(), ApiError>
    where
        T: Serialize,
        F: FnMut(&str) -> bool,
    {
        let url = self.endpoint(path)?;
        let request_json =
            serde_json::to_string(body).map_err(|e| ApiError::Serialize(e.to_string()))?;

        let mut response = self.with_retry(|| {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&request_json)
        })?;

        let reader = BufReader::new(response.body_mut().as_reader());
        for line in reader.lines() {
            let line = line.map_err(|e| ApiError::Transport(format!("stream read failed: {}", e)))?;
            if line.trim().is_empty() {
                continue;
            }
            if !on_line(&line) {
                break;
            }
        }

        Ok(())
    }

    fn with_retry<R, F>(&self, mut request_fn: F) -> Result<R, ApiError>
    where
        F: FnMut() -> Result<R, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(response) => return Ok(response),
                Err(err) => {
                    let should_retry = match &err {
                        ureq::Error::StatusCode(status) if *status >= 500 => {
                            warn!(
                                "Server error (status {}), attempt {}/{}",
                                status, attempt, self.retry_attempts
                            );
                            true
                        }
                        ureq::Error::StatusCode(status) => {
                            warn!("Client error (status {}), not retrying", status);
                            return Err(ApiError::ClientStatus(*status));
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                err, attempt, self.retry_attempts
                            );
                            true
                        }
                        _ => false,
                    };

                    if !should_retry {
                        return Err(ApiError::Transport(format!("non-retryable error: {}", err)));
                    }

                    last_error = Some(ApiError::Transport(err.to_string()));

                    if attempt < self.retry_attempts {
                        let delay =
                            Duration::from_millis(EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 500);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All retry attempts failed for request to {}", self.base_url);
        Err(last_error.unwrap_or_else(|| ApiError::Transport("request failed after retries".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_join() {
        let api = OllamaApi::new("http://localhost:11434", Duration::from_secs(1)).unwrap();
        assert_eq!(
            api.endpoint("/api/embed").unwrap().as_str(),
            "http://localhost:11434/api/embed"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let result = OllamaApi::new("not a url", Duration::from_secs(1));
        assert!(matches!(result, Err(ApiError::Url(_))));
    }

    #[test]
    fn test_unreachable_server_is_transport_error() {
        // Port 9 (discard) is essentially never listening on localhost
        let api = OllamaApi::new("http://127.0.0.1:9", Duration::from_millis(500))
            .unwrap()
            .with_retry_attempts(1);
        let result = api.post_json("/api/embed", &serde_json::json!({"model": "m"}));
        assert!(matches!(result, Err(ApiError::Transport(_))));
    }
}
