//! Core library client for ragabond
//!
//! This module provides the main client interface for using ragabond
//! as a library in your own Rust applications.

mod guards;

use guards::{BuildGuard, BuildRegistry, IndexLocks};

use crate::config::Config;
use crate::embedding::{self, EmbeddingProvider};
use crate::error::{RagError, ValidationError};
use crate::generation::{LanguageModel, OllamaModel};
use crate::index::{IndexManager, ProgressState, VectorIndex};
use crate::indexer::TextChunker;
use crate::retriever::{ConversationalRetriever, TaskHandler, TokenCallback};
use crate::types::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// Main client for building and querying named indexes
///
/// Owns the configuration, the embedding provider and the language model, and
/// can be cloned cheaply to share between tasks. It is used directly as a
/// library or wrapped by the MCP server and the command line.
///
/// # Example
///
/// ```no_run
/// use ragabond::{AskRequest, CreateIndexRequest, RagClient};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = RagClient::new().await?;
///
///     client
///         .create_index(
///             CreateIndexRequest {
///                 name: "docs".to_string(),
///                 file_paths: vec!["notes.txt".to_string()],
///             },
///             None,
///         )
///         .await?;
///
///     let response = client
///         .ask(AskRequest {
///             index: "docs".to_string(),
///             query: "What is the capital of France?".to_string(),
///             top_k: None,
///         })
///         .await?;
///     println!("{}", response.answer);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct RagClient {
    pub(crate) config: Arc<Config>,
    pub(crate) manager: IndexManager,
    pub(crate) model: Arc<dyn LanguageModel>,
    // Names with a build in flight
    builds: BuildRegistry,
    // Queries hold the read half, delete takes the write half
    index_locks: IndexLocks,
}

impl RagClient {
    /// Create a new client from the default configuration file and environment
    pub async fn new() -> Result<Self, RagError> {
        let config = Config::new()?;
        Self::with_config(config).await
    }

    /// Create a new client with custom configuration
    ///
    /// Initializes the configured embedding provider (downloading the model on
    /// first use for fastembed) and the Ollama language model client.
    pub async fn with_config(config: Config) -> Result<Self, RagError> {
        config.validate()?;

        tracing::info!("Initializing RAG client with configuration");
        tracing::debug!("Index root: {}", config.index.root.display());
        tracing::debug!(
            "Embedding: {} / {}",
            config.embedding.provider,
            config.embedding.resolved_model_name()
        );
        tracing::debug!("Language model: {}", config.generation.model);

        let embedding_config = config.embedding.clone();
        let embedder = tokio::task::spawn_blocking(move || {
            embedding::create_provider(&embedding_config)
        })
        .await
        .map_err(|e| RagError::other(format!("Embedding initialization task failed: {}", e)))??;

        let model: Arc<dyn LanguageModel> = Arc::new(OllamaModel::new(&config.generation)?);

        Self::with_components(config, embedder, model)
    }

    /// Create a client from already constructed collaborators
    pub fn with_components(
        config: Config,
        embedder: Arc<dyn EmbeddingProvider>,
        model: Arc<dyn LanguageModel>,
    ) -> Result<Self, RagError> {
        let chunker = TextChunker::from_config(&config.chunking)?;
        let manager = IndexManager::new(config.index.root.clone(), embedder, chunker);

        Ok(Self {
            config: Arc::new(config),
            manager,
            model,
            builds: BuildRegistry::default(),
            index_locks: IndexLocks::default(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn index_root(&self) -> &Path {
        self.manager.root()
    }

    pub fn index_manager(&self) -> &IndexManager {
        &self.manager
    }

    fn reserve_build(&self, name: &str) -> Result<BuildGuard, RagError> {
        IndexManager::validate_name(name)?;
        self.builds.reserve(name)
    }

    /// Build a new index, publishing progress on `progress` after every chunk
    pub async fn create_index(
        &self,
        request: CreateIndexRequest,
        progress: Option<UnboundedSender<ProgressState>>,
    ) -> Result<CreateIndexResponse, RagError> {
        request.validate()?;
        let _guard = self.reserve_build(&request.name)?;
        self.run_build(request, progress).await
    }

    async fn run_build(
        &self,
        request: CreateIndexRequest,
        progress: Option<UnboundedSender<ProgressState>>,
    ) -> Result<CreateIndexResponse, RagError> {
        let file_paths: Vec<PathBuf> = request.file_paths.iter().map(PathBuf::from).collect();
        self.manager
            .create(&request.name, &file_paths, progress)
            .await
    }

    /// Start building an index in the background
    ///
    /// Returns the task computing the result and a stream of progress events
    /// that ends when the build finishes. A second build of the same name is
    /// rejected as soon as this returns.
    pub fn spawn_create(
        &self,
        request: CreateIndexRequest,
    ) -> (
        JoinHandle<Result<CreateIndexResponse, RagError>>,
        UnboundedReceiver<ProgressState>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();

        let reserved = request
            .validate()
            .and_then(|()| self.reserve_build(&request.name));

        let client = self.clone();
        let handle = tokio::spawn(async move {
            let _guard = reserved?;
            client.run_build(request, Some(tx)).await
        });

        (handle, rx)
    }

    /// List existing indexes
    pub fn list_indexes(&self) -> Result<ListIndexesResponse, RagError> {
        Ok(ListIndexesResponse {
            root: self.manager.root().display().to_string(),
            indexes: self.manager.list()?,
        })
    }

    /// Files an index was built from, in the original order
    pub fn manifest(&self, name: &str) -> Result<Vec<PathBuf>, RagError> {
        self.manager.manifest(name)
    }

    /// Manifest and build metadata of an index
    pub fn index_info(&self, name: &str) -> Result<IndexInfo, RagError> {
        self.manager.info(name)
    }

    /// Delete an index, waiting for in-flight queries on it to finish
    pub async fn delete_index(&self, name: &str) -> Result<DeleteIndexResponse, RagError> {
        IndexManager::validate_name(name)?;

        // Holding the build reservation keeps a build of the same name from
        // starting until the directory is gone
        let _reservation = self.builds.reserve(name).map_err(|_| {
            ValidationError::InvalidValue(
                "name".to_string(),
                format!("index '{}' is still being built", name),
            )
        })?;

        let lock = self.index_locks.for_name(name);
        let _exclusive = lock.write().await;

        self.manager.delete(name).await?;
        self.index_locks.remove(name);

        Ok(DeleteIndexResponse {
            name: name.to_string(),
            deleted: true,
        })
    }

    /// Open an index for repeated searches
    pub async fn open_index(&self, name: &str) -> Result<VectorIndex, RagError> {
        self.manager.load(name).await
    }

    /// Create a retriever using this client's language model and settings
    pub fn retriever(&self) -> ConversationalRetriever {
        ConversationalRetriever::new(self.model.clone(), &self.config.retrieval)
    }

    /// Answer a question from an index
    pub async fn ask(&self, request: AskRequest) -> Result<AskResponse, RagError> {
        self.ask_streaming(request, None).await
    }

    /// Answer a question from an index, streaming model output to `on_token`
    ///
    /// Validation failures and unknown indexes are returned as errors; failures
    /// while retrieving or generating come back as the answer text.
    pub async fn ask_streaming(
        &self,
        request: AskRequest,
        on_token: Option<TokenCallback>,
    ) -> Result<AskResponse, RagError> {
        request.validate()?;

        let start = Instant::now();

        let lock = self.index_locks.for_name(&request.index);
        let _shared = lock.read().await;

        let index = self.manager.load(&request.index).await?;

        let mut retriever = self.retriever();
        if let Some(top_k) = request.top_k {
            retriever = retriever.with_top_k(top_k);
        }
        if let Ok(cwd) = std::env::current_dir() {
            retriever = retriever.with_task_handler(TaskHandler::new(cwd));
        }

        let answer = retriever
            .ask_streaming(&index, &request.query, on_token)
            .await;

        Ok(AskResponse {
            answer: answer.answer,
            sources: answer.sources,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}
