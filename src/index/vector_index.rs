use super::manifest;
use super::progress::ProgressReporter;
use crate::embedding::EmbeddingProvider;
use crate::error::{IndexError, RagError, VectorDbError};
use crate::indexer::Chunk;
use crate::vector_db::{LanceStore, SearchHit, VectorRecord, VectorStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Records buffered before each write to the store
const WRITE_BATCH: usize = 32;

/// Outcome of [`VectorIndex::build`]
#[derive(Debug, Default)]
pub struct BuildStats {
    /// Chunks embedded and stored
    pub stored: usize,
    /// Chunks skipped because their embedding failed
    pub errors: Vec<String>,
}

/// Handle to a persisted collection of embedded chunks
///
/// Holds the store connection for as long as the handle lives; dropping it
/// releases the underlying files.
pub struct VectorIndex {
    name: String,
    dir: PathBuf,
    store: LanceStore,
    embedder: Arc<dyn EmbeddingProvider>,
}

fn store_error(dir: &Path, err: anyhow::Error) -> RagError {
    VectorDbError::OpenFailed {
        path: dir.display().to_string(),
        reason: format!("{:#}", err),
    }
    .into()
}

impl VectorIndex {
    /// Embed `chunks` one at a time and append them to the collection at `dir`
    ///
    /// A chunk whose embedding fails is recorded in [`BuildStats::errors`] and
    /// skipped. Progress is reported after every chunk.
    pub async fn build(
        dir: &Path,
        chunks: &[Chunk],
        embedder: Arc<dyn EmbeddingProvider>,
        reporter: &mut ProgressReporter,
    ) -> Result<BuildStats, RagError> {
        let store = LanceStore::open(dir).await.map_err(|e| store_error(dir, e))?;
        store
            .initialize(embedder.dimension())
            .await
            .map_err(|e| VectorDbError::CreateFailed {
                path: dir.display().to_string(),
                reason: format!("{:#}", e),
            })?;

        let mut stats = BuildStats::default();
        let mut pending = Vec::with_capacity(WRITE_BATCH);

        for chunk in chunks {
            let provider = embedder.clone();
            let text = chunk.content.clone();
            let embedded = tokio::task::spawn_blocking(move || provider.embed_one(&text)).await;

            match embedded {
                Ok(Ok(vector)) => pending.push(VectorRecord {
                    seq: chunk.index as u32,
                    source: chunk.source_tag(),
                    content: chunk.content.clone(),
                    vector,
                }),
                Ok(Err(e)) => {
                    tracing::warn!("Skipping chunk {}: {}", chunk.source_tag(), e);
                    stats
                        .errors
                        .push(format!("Chunk {}: {}", chunk.source_tag(), e));
                }
                Err(e) => {
                    stats
                        .errors
                        .push(format!("Embedding task for chunk {} panicked: {}", chunk.source_tag(), e));
                }
            }

            if pending.len() >= WRITE_BATCH {
                stats.stored += Self::flush(&store, &mut pending).await?;
            }

            reporter.chunk_done();
        }

        stats.stored += Self::flush(&store, &mut pending).await?;

        tracing::info!(
            "Stored {} of {} chunks in {}",
            stats.stored,
            chunks.len(),
            dir.display()
        );

        Ok(stats)
    }

    async fn flush(store: &LanceStore, pending: &mut Vec<VectorRecord>) -> Result<usize, RagError> {
        let records = std::mem::take(pending);
        store
            .append(records)
            .await
            .map_err(|e| VectorDbError::StoreFailed(format!("{:#}", e)).into())
    }

    /// Attach to the collection at `dir`
    ///
    /// Fails with `ModelMismatch` when the recorded build metadata names a
    /// different embedding provider, model or dimension than `embedder`.
    pub async fn open(
        name: &str,
        dir: &Path,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, RagError> {
        if !dir.is_dir() {
            return Err(IndexError::NotFound(name.to_string()).into());
        }

        match manifest::read_metadata(dir)? {
            Some(meta)
                if (!meta.embedding_provider.is_empty()
                    && meta.embedding_provider != embedder.provider())
                    || meta.embedding_model != embedder.model_name()
                    || meta.dimension != embedder.dimension() =>
            {
                let built_with = if meta.embedding_provider.is_empty() {
                    meta.embedding_model
                } else {
                    format!("{}/{}", meta.embedding_provider, meta.embedding_model)
                };
                return Err(IndexError::ModelMismatch {
                    name: name.to_string(),
                    built_with,
                    built_dimension: meta.dimension,
                    configured: format!("{}/{}", embedder.provider(), embedder.model_name()),
                    configured_dimension: embedder.dimension(),
                }
                .into());
            }
            Some(_) => {}
            None => tracing::warn!(
                "Index '{}' has no {}; cannot verify its embedding model",
                name,
                manifest::METADATA_FILE
            ),
        }

        let store = LanceStore::open(dir).await.map_err(|e| store_error(dir, e))?;

        Ok(Self {
            name: name.to_string(),
            dir: dir.to_path_buf(),
            store,
            embedder,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Number of stored chunks
    pub async fn len(&self) -> Result<usize, RagError> {
        self.store
            .count()
            .await
            .map_err(|e| VectorDbError::SearchFailed(format!("{:#}", e)).into())
    }

    pub async fn is_empty(&self) -> Result<bool, RagError> {
        Ok(self.len().await? == 0)
    }

    /// Embed `query` and return at most `k` nearest chunks, best first
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>, RagError> {
        if k == 0 {
            return Err(VectorDbError::InvalidSearchParams("k must be at least 1".into()).into());
        }

        let provider = self.embedder.clone();
        let text = query.to_string();
        let vector = tokio::task::spawn_blocking(move || provider.embed_one(&text))
            .await
            .map_err(|e| RagError::other(format!("Embedding task panicked: {}", e)))??;

        if vector.len() != self.embedder.dimension() {
            return Err(VectorDbError::InvalidSearchParams(format!(
                "query vector has {} dimensions, index expects {}",
                vector.len(),
                self.embedder.dimension()
            ))
            .into());
        }

        self.store
            .search(vector, k)
            .await
            .map_err(|e| VectorDbError::SearchFailed(format!("{:#}", e)).into())
    }

    /// Recursively remove the index directory
    pub async fn delete(name: &str, dir: &Path) -> Result<(), RagError> {
        if !dir.is_dir() {
            return Err(IndexError::NotFound(name.to_string()).into());
        }

        tokio::fs::remove_dir_all(dir).await?;
        tracing::info!("Deleted index '{}' at {}", name, dir.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::embedding::failing::FailingEmbedder;
    use crate::indexer::TextChunker;
    use crate::types::IndexMetadata;
    use tempfile::TempDir;

    fn embedder() -> Arc<dyn EmbeddingProvider> {
        Arc::new(HashEmbedder::with_dimension(64))
    }

    async fn build_from(dir: &Path, text: &str) -> BuildStats {
        let chunks = TextChunker::new(60, 10).unwrap().split(text);
        let mut reporter = ProgressReporter::new(chunks.len(), None);
        let stats = VectorIndex::build(dir, &chunks, embedder(), &mut reporter)
            .await
            .unwrap();
        assert_eq!(reporter.processed(), chunks.len());
        stats
    }

    #[tokio::test]
    async fn test_build_open_search() {
        let dir = TempDir::new().unwrap();
        let text = "Paris is the capital of France. Berlin is the capital of Germany. \
                    Rome is the capital of Italy. Madrid is the capital of Spain.";
        let stats = build_from(dir.path(), text).await;
        assert!(stats.stored > 1);
        assert!(stats.errors.is_empty());

        let index = VectorIndex::open("caps", dir.path(), embedder()).await.unwrap();
        assert_eq!(index.len().await.unwrap(), stats.stored);

        let hits = index.search("capital of Germany", 2).await.unwrap();
        assert!(hits.len() <= 2);
        assert!(hits.iter().all(|h| h.score > 0.0 && h.score <= 1.0));
    }

    #[tokio::test]
    async fn test_exact_chunk_text_is_top_hit() {
        let dir = TempDir::new().unwrap();
        let text = "Alpha beta gamma delta.\n\nEpsilon zeta eta theta.\n\nIota kappa lambda mu.";
        let chunks = TextChunker::new(30, 5).unwrap().split(text);
        let mut reporter = ProgressReporter::new(chunks.len(), None);
        VectorIndex::build(dir.path(), &chunks, embedder(), &mut reporter)
            .await
            .unwrap();

        let index = VectorIndex::open("greek", dir.path(), embedder()).await.unwrap();
        for chunk in &chunks {
            let hits = index.search(&chunk.content, 3).await.unwrap();
            assert_eq!(hits[0].content, chunk.content);
        }
    }

    #[tokio::test]
    async fn test_open_missing_directory() {
        let dir = TempDir::new().unwrap();
        let result = VectorIndex::open("gone", &dir.path().join("gone"), embedder()).await;
        assert!(matches!(
            result,
            Err(RagError::Index(IndexError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_open_rejects_model_mismatch() {
        let dir = TempDir::new().unwrap();
        build_from(dir.path(), "Some text to index.").await;
        manifest::write_metadata(
            dir.path(),
            &IndexMetadata {
                embedding_provider: "ollama".to_string(),
                embedding_model: "nomic-embed-text".to_string(),
                dimension: 768,
                chunk_size: 60,
                overlap: 10,
                chunk_count: 1,
                created_at: "2026-10-18T00:00:00+00:00".to_string(),
            },
        )
        .unwrap();

        let result = VectorIndex::open("docs", dir.path(), embedder()).await;
        assert!(matches!(
            result,
            Err(RagError::Index(IndexError::ModelMismatch { .. }))
        ));
    }

    #[tokio::test]
    async fn test_build_skips_chunks_whose_embedding_fails() {
        let dir = TempDir::new().unwrap();
        let chunks: Vec<Chunk> = ["alpha text", "poisoned text", "gamma text"]
            .iter()
            .enumerate()
            .map(|(index, content)| Chunk {
                index,
                content: content.to_string(),
            })
            .collect();
        let failing: Arc<dyn EmbeddingProvider> = Arc::new(FailingEmbedder::new(64, "poisoned"));
        let mut reporter = ProgressReporter::new(chunks.len(), None);

        let stats = VectorIndex::build(dir.path(), &chunks, failing.clone(), &mut reporter)
            .await
            .unwrap();

        assert_eq!(reporter.processed(), 3);
        assert_eq!(stats.stored, 2);
        assert_eq!(stats.errors.len(), 1);
        assert!(stats.errors[0].starts_with("Chunk 1-pl: "));

        let index = VectorIndex::open("docs", dir.path(), embedder()).await.unwrap();
        assert_eq!(index.len().await.unwrap(), 2);
        let hits = index.search("text", 4).await.unwrap();
        let mut seqs: Vec<u32> = hits.iter().map(|h| h.seq).collect();
        seqs.sort();
        assert_eq!(seqs, vec![0, 2]);
    }

    #[tokio::test]
    async fn test_open_rejects_other_provider() {
        let dir = TempDir::new().unwrap();
        build_from(dir.path(), "Some text to index.").await;
        let mut meta = IndexMetadata {
            embedding_provider: "ollama".to_string(),
            embedding_model: "hash".to_string(),
            dimension: 64,
            chunk_size: 60,
            overlap: 10,
            chunk_count: 1,
            created_at: "2026-10-18T00:00:00+00:00".to_string(),
        };
        manifest::write_metadata(dir.path(), &meta).unwrap();

        match VectorIndex::open("docs", dir.path(), embedder()).await {
            Err(RagError::Index(IndexError::ModelMismatch {
                built_with,
                configured,
                ..
            })) => {
                assert_eq!(built_with, "ollama/hash");
                assert_eq!(configured, "hash/hash");
            }
            other => panic!("expected ModelMismatch, got {:?}", other.err()),
        }

        meta.embedding_provider = "hash".to_string();
        manifest::write_metadata(dir.path(), &meta).unwrap();
        assert!(VectorIndex::open("docs", dir.path(), embedder()).await.is_ok());
    }

    #[tokio::test]
    async fn test_open_metadata_without_provider() {
        let dir = TempDir::new().unwrap();
        build_from(dir.path(), "Some text to index.").await;
        std::fs::write(
            dir.path().join(manifest::METADATA_FILE),
            r#"{"embedding_model":"hash","dimension":64,"chunk_size":60,"overlap":10,"chunk_count":1,"created_at":"2026-10-18T00:00:00+00:00"}"#,
        )
        .unwrap();

        let meta = manifest::read_metadata(dir.path()).unwrap().unwrap();
        assert!(meta.embedding_provider.is_empty());
        assert!(VectorIndex::open("docs", dir.path(), embedder()).await.is_ok());
    }

    #[tokio::test]
    async fn test_search_rejects_zero_k() {
        let dir = TempDir::new().unwrap();
        build_from(dir.path(), "Some text to index.").await;

        let index = VectorIndex::open("docs", dir.path(), embedder()).await.unwrap();
        let err = index.search("text", 0).await.unwrap_err();
        assert!(matches!(
            err,
            RagError::VectorDb(VectorDbError::InvalidSearchParams(_))
        ));
        assert!(err.is_user_error());
    }

    #[tokio::test]
    async fn test_delete() {
        let dir = TempDir::new().unwrap();
        let index_dir = dir.path().join("docs");
        std::fs::create_dir(&index_dir).unwrap();
        build_from(&index_dir, "Delete me.").await;

        VectorIndex::delete("docs", &index_dir).await.unwrap();
        assert!(!index_dir.exists());

        let again = VectorIndex::delete("docs", &index_dir).await;
        assert!(matches!(again, Err(RagError::Index(IndexError::NotFound(_)))));
    }

    #[tokio::test]
    async fn test_build_empty_chunk_list() {
        let dir = TempDir::new().unwrap();
        let stats = build_from(dir.path(), "").await;
        assert_eq!(stats.stored, 0);

        let index = VectorIndex::open("empty", dir.path(), embedder()).await.unwrap();
        assert!(index.is_empty().await.unwrap());
        assert!(index.search("anything", 4).await.unwrap().is_empty());
    }
}
