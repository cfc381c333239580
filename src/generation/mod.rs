//! Generative language models used to answer questions over retrieved context.

mod ollama;
mod scripted;

pub use ollama::OllamaModel;
pub use scripted::ScriptedModel;

use crate::error::GenerationError;

/// A text completion model
///
/// Calls are blocking; async callers run them on a blocking thread.
pub trait LanguageModel: Send + Sync {
    /// Complete `prompt`, passing each generated fragment to `on_token` as it
    /// arrives, and return the full completion.
    fn generate(
        &self,
        prompt: &str,
        on_token: &mut dyn FnMut(&str),
    ) -> Result<String, GenerationError>;

    /// Get the model name
    fn model_name(&self) -> &str;
}
