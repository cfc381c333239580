//! Named index lifecycle: create, list, load, delete and provenance
//!
//! Every index lives in its own directory below the index root, named after
//! the index. The directory holds the LanceDB files, the `file_paths.json`
//! manifest and the `index_meta.json` build metadata.

pub mod manifest;
mod progress;
mod vector_index;

pub use progress::{ProgressReporter, ProgressState};
pub use vector_index::{BuildStats, VectorIndex};

use crate::embedding::EmbeddingProvider;
use crate::error::{IndexError, RagError, ValidationError};
use crate::indexer::{DocumentLoader, TextChunker};
use crate::types::{CreateIndexResponse, IndexInfo, IndexMetadata};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;

/// Owns the set of named indexes below one root directory
#[derive(Clone)]
pub struct IndexManager {
    root: PathBuf,
    embedder: Arc<dyn EmbeddingProvider>,
    chunker: TextChunker,
}

impl IndexManager {
    pub fn new(root: impl Into<PathBuf>, embedder: Arc<dyn EmbeddingProvider>, chunker: TextChunker) -> Self {
        Self {
            root: root.into(),
            embedder,
            chunker,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Check that `name` is non-empty and usable as a single directory name
    pub fn validate_name(name: &str) -> Result<(), IndexError> {
        let reason = if name.trim().is_empty() {
            Some("name must not be empty")
        } else if name == "." || name == ".." {
            Some("name must not be '.' or '..'")
        } else if name.contains(['/', '\\']) {
            Some("name must not contain path separators")
        } else if name.contains('\0') {
            Some("name must not contain NUL")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(IndexError::InvalidName(format!("{:?}: {}", name, reason))),
            None => Ok(()),
        }
    }

    /// Directory of the index called `name`
    pub fn index_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        Self::validate_name(name).is_ok() && self.index_dir(name).is_dir()
    }

    /// Names of the existing indexes, sorted
    ///
    /// Creates the index root if it does not exist yet.
    pub fn list(&self) -> Result<Vec<String>, RagError> {
        std::fs::create_dir_all(&self.root)?;

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();

        Ok(names)
    }

    /// Build a new index from `file_paths`
    ///
    /// Loads and chunks the documents, embeds and stores every chunk while
    /// publishing progress on `progress`, then writes the manifest and metadata.
    pub async fn create(
        &self,
        name: &str,
        file_paths: &[PathBuf],
        progress: Option<UnboundedSender<ProgressState>>,
    ) -> Result<CreateIndexResponse, RagError> {
        let start = Instant::now();

        Self::validate_name(name)?;
        if file_paths.is_empty() {
            return Err(ValidationError::Empty("file_paths".to_string()).into());
        }

        std::fs::create_dir_all(&self.root)?;
        let dir = self.index_dir(name);
        // create_dir (not create_dir_all) so an existing index is never reused
        match std::fs::create_dir(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(IndexError::AlreadyExists(name.to_string()).into());
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            "Creating index '{}' from {} paths at {}",
            name,
            file_paths.len(),
            dir.display()
        );

        let paths = file_paths.to_vec();
        let chunker = self.chunker;
        let (documents, chunks) = tokio::task::spawn_blocking(move || {
            let documents = DocumentLoader::load_many(&paths);
            let chunks = chunker.split(&documents.text);
            (documents, chunks)
        })
        .await
        .map_err(|e| RagError::other(format!("Document loading task failed: {}", e)))?;

        tracing::info!("Split documents into {} chunks", chunks.len());

        let mut reporter = ProgressReporter::new(chunks.len(), progress);
        let stats = VectorIndex::build(&dir, &chunks, self.embedder.clone(), &mut reporter).await?;

        manifest::write_manifest(&dir, file_paths)?;
        manifest::write_metadata(
            &dir,
            &IndexMetadata {
                embedding_provider: self.embedder.provider().to_string(),
                embedding_model: self.embedder.model_name().to_string(),
                dimension: self.embedder.dimension(),
                chunk_size: self.chunker.chunk_size(),
                overlap: self.chunker.overlap(),
                chunk_count: stats.stored,
                created_at: chrono::Utc::now().to_rfc3339(),
            },
        )?;

        let mut errors = documents.errors;
        errors.extend(stats.errors);

        let response = CreateIndexResponse {
            name: name.to_string(),
            files_indexed: documents.loaded.len(),
            chunks_created: stats.stored,
            duration_ms: start.elapsed().as_millis() as u64,
            errors,
        };

        tracing::info!(
            "Created index '{}': {} files, {} chunks in {} ms ({} errors)",
            name,
            response.files_indexed,
            response.chunks_created,
            response.duration_ms,
            response.errors.len()
        );

        Ok(response)
    }

    /// Open the index called `name`
    pub async fn load(&self, name: &str) -> Result<VectorIndex, RagError> {
        Self::validate_name(name)?;
        VectorIndex::open(name, &self.index_dir(name), self.embedder.clone()).await
    }

    /// Remove the index called `name` with all its files
    pub async fn delete(&self, name: &str) -> Result<(), RagError> {
        Self::validate_name(name)?;
        VectorIndex::delete(name, &self.index_dir(name)).await
    }

    /// Files the index was built from, in the order given at creation
    pub fn manifest(&self, name: &str) -> Result<Vec<PathBuf>, RagError> {
        Self::validate_name(name)?;
        let dir = self.index_dir(name);
        if !dir.is_dir() {
            return Err(IndexError::NotFound(name.to_string()).into());
        }
        manifest::read_manifest(&dir)
    }

    /// Manifest and build metadata of the index called `name`
    pub fn info(&self, name: &str) -> Result<IndexInfo, RagError> {
        let file_paths = self.manifest(name)?;
        let dir = self.index_dir(name);

        Ok(IndexInfo {
            name: name.to_string(),
            path: dir.display().to_string(),
            file_paths: file_paths
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
            metadata: manifest::read_metadata(&dir)?,
        })
    }
}
