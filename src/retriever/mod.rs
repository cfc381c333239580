//! Retrieval-augmented question answering over a loaded index
//!
//! A [`ConversationalRetriever`] answers one question at a time: it either
//! runs a locally handled task, or retrieves the closest chunks, asks the
//! language model, and cites the chunks as sources. Conversation memory is
//! cleared after every question, so answers never depend on earlier ones.

mod tasks;

pub use tasks::TaskHandler;

use crate::config::RetrievalConfig;
use crate::error::{GenerationError, RagError};
use crate::generation::LanguageModel;
use crate::index::VectorIndex;
use crate::types::SourceExcerpt;
use crate::vector_db::SearchHit;
use std::sync::Arc;

/// Callback receiving generated text as it streams in
pub type TokenCallback = Box<dyn FnMut(&str) + Send>;

const CONTEXT_INSTRUCTIONS: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

/// Wrap the user's question in the answering instructions
pub fn question_template(query: &str) -> String {
    format!(
        "Answer the following question:\n\n{}\n\nProvide a direct and accurate response based on the information available.",
        query
    )
}

/// One question/answer exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub question: String,
    pub answer: String,
}

/// Short-lived memory of the turns within a single question
#[derive(Debug, Default)]
pub struct ConversationSession {
    turns: Vec<Turn>,
}

impl ConversationSession {
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn push(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.turns.push(Turn {
            question: question.into(),
            answer: answer.into(),
        });
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Render prior turns for inclusion in a prompt
    fn history_text(&self) -> String {
        self.turns
            .iter()
            .map(|t| format!("Human: {}\nAssistant: {}\n", t.question, t.answer))
            .collect()
    }
}

/// Whether the retriever is currently answering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrieverState {
    Idle,
    Answering,
}

/// Answer plus the retrieved chunks it was based on
#[derive(Debug, Clone)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<SourceExcerpt>,
}

/// Answers questions from a [`VectorIndex`] with a [`LanguageModel`]
pub struct ConversationalRetriever {
    model: Arc<dyn LanguageModel>,
    tasks: TaskHandler,
    top_k: usize,
    preview_chars: usize,
    session: ConversationSession,
    state: RetrieverState,
}

impl ConversationalRetriever {
    pub fn new(model: Arc<dyn LanguageModel>, config: &RetrievalConfig) -> Self {
        Self {
            model,
            tasks: TaskHandler::default(),
            top_k: config.top_k,
            preview_chars: config.preview_chars,
            session: ConversationSession::default(),
            state: RetrieverState::Idle,
        }
    }

    /// Override the number of retrieved chunks
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Use a custom task handler (e.g. rooted at another directory)
    pub fn with_task_handler(mut self, tasks: TaskHandler) -> Self {
        self.tasks = tasks;
        self
    }

    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    pub fn state(&self) -> RetrieverState {
        self.state
    }

    /// Answer `query` from `index`
    pub async fn ask(&mut self, index: &VectorIndex, query: &str) -> Answer {
        self.ask_streaming(index, query, None).await
    }

    /// Answer `query` from `index`, streaming model output to `on_token`
    ///
    /// Never fails: errors become the answer text. Memory is empty and the
    /// state is back to idle when this returns.
    pub async fn ask_streaming(
        &mut self,
        index: &VectorIndex,
        query: &str,
        on_token: Option<TokenCallback>,
    ) -> Answer {
        self.state = RetrieverState::Answering;

        let answer = if let Some(result) = self.tasks.handle(query) {
            tracing::info!("Answered '{}' with a local task", query);
            Answer {
                answer: result,
                sources: Vec::new(),
            }
        } else {
            match self.answer_from_index(index, query, on_token).await {
                Ok(answer) => {
                    self.session.push(query, answer.answer.clone());
                    answer
                }
                Err(e) => {
                    tracing::warn!("Query against '{}' failed: {}", index.name(), e);
                    Answer {
                        answer: format!("Error querying chain: {}", e),
                        sources: Vec::new(),
                    }
                }
            }
        };

        self.session.clear();
        self.state = RetrieverState::Idle;
        answer
    }

    async fn answer_from_index(
        &self,
        index: &VectorIndex,
        query: &str,
        on_token: Option<TokenCallback>,
    ) -> Result<Answer, RagError> {
        let hits = index.search(query, self.top_k).await?;
        tracing::debug!("Retrieved {} chunks from '{}'", hits.len(), index.name());

        let prompt = self.compose_prompt(&hits, query);

        let model = self.model.clone();
        let answer = tokio::task::spawn_blocking(move || {
            let mut on_token: TokenCallback = match on_token {
                Some(callback) => callback,
                None => Box::new(|_: &str| {}),
            };
            model.generate(&prompt, &mut *on_token)
        })
        .await
        .map_err(|e| GenerationError::TaskFailed(e.to_string()))??;

        Ok(Answer {
            answer: answer.trim().to_string(),
            sources: hits.iter().map(|hit| self.excerpt(hit)).collect(),
        })
    }

    fn compose_prompt(&self, hits: &[SearchHit], query: &str) -> String {
        let mut prompt = String::new();

        if !self.session.is_empty() {
            prompt.push_str("Chat history:\n");
            prompt.push_str(&self.session.history_text());
            prompt.push('\n');
        }

        prompt.push_str(CONTEXT_INSTRUCTIONS);
        prompt.push_str("\n\n");
        for hit in hits {
            prompt.push_str(&hit.content);
            prompt.push_str("\n\n");
        }

        prompt.push_str("Question: ");
        prompt.push_str(&question_template(query));
        prompt.push_str("\nHelpful Answer:");
        prompt
    }

    fn excerpt(&self, hit: &SearchHit) -> SourceExcerpt {
        SourceExcerpt {
            excerpt: hit.content.chars().take(self.preview_chars).collect(),
            source: hit.source.clone(),
            score: hit.score,
        }
    }
}
