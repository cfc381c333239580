use crate::error::{RagError, ValidationError};
use crate::index::IndexManager;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Longest accepted question
const MAX_QUERY_CHARS: usize = 10_000;

/// Largest accepted `top_k`
const MAX_TOP_K: usize = 100;

/// Request to build a new named index
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateIndexRequest {
    /// Unique name of the new index
    pub name: String,
    /// Files (PDF, TXT, CSV, JSON) or directories to index, in order
    pub file_paths: Vec<String>,
}

impl CreateIndexRequest {
    pub fn validate(&self) -> Result<(), RagError> {
        IndexManager::validate_name(&self.name)?;
        if self.file_paths.is_empty() {
            return Err(ValidationError::Empty("file_paths".to_string()).into());
        }
        if let Some(blank) = self.file_paths.iter().find(|p| p.trim().is_empty()) {
            return Err(ValidationError::InvalidValue(
                "file_paths".to_string(),
                format!("blank path {:?}", blank),
            )
            .into());
        }
        Ok(())
    }
}

/// Response from building an index
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateIndexResponse {
    /// Name of the index that was built
    pub name: String,
    /// Number of files that contributed text
    pub files_indexed: usize,
    /// Number of chunks embedded and stored
    pub chunks_created: usize,
    /// Time taken in milliseconds
    pub duration_ms: u64,
    /// Any errors encountered (non-fatal)
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Request to list existing indexes
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListIndexesRequest {}

/// Existing indexes under the index root
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListIndexesResponse {
    /// Directory holding the indexes
    pub root: String,
    /// Index names
    pub indexes: Vec<String>,
}

/// Request naming a single index
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IndexNameRequest {
    /// Name of the index
    pub name: String,
}

impl IndexNameRequest {
    pub fn validate(&self) -> Result<(), RagError> {
        IndexManager::validate_name(&self.name)?;
        Ok(())
    }
}

/// Build-time facts recorded next to an index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IndexMetadata {
    /// Embedding provider the vectors were produced with; empty in older indexes
    #[serde(default)]
    pub embedding_provider: String,
    /// Embedding model the vectors were produced with
    pub embedding_model: String,
    /// Vector length
    pub dimension: usize,
    /// Maximum characters per chunk
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks
    pub overlap: usize,
    /// Number of stored chunks
    pub chunk_count: usize,
    /// RFC 3339 build timestamp
    pub created_at: String,
}

/// Provenance of an index
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IndexInfo {
    pub name: String,
    /// Directory holding the index
    pub path: String,
    /// Files used to build the index, in the order given
    pub file_paths: Vec<String>,
    /// Build metadata; absent for indexes built without it
    pub metadata: Option<IndexMetadata>,
}

/// Response from deleting an index
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeleteIndexResponse {
    pub name: String,
    /// Whether the index directory was removed
    pub deleted: bool,
}

/// Request to answer a question from an index
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AskRequest {
    /// Index to answer from
    pub index: String,
    /// The question
    pub query: String,
    /// Number of chunks to retrieve (defaults to the configured value)
    #[serde(default)]
    pub top_k: Option<usize>,
}

impl AskRequest {
    pub fn validate(&self) -> Result<(), RagError> {
        IndexManager::validate_name(&self.index)?;
        if self.query.trim().is_empty() {
            return Err(ValidationError::Empty("query".to_string()).into());
        }
        if self.query.chars().count() > MAX_QUERY_CHARS {
            return Err(ValidationError::InvalidValue(
                "query".to_string(),
                format!("longer than {} characters", MAX_QUERY_CHARS),
            )
            .into());
        }
        if let Some(k) = self.top_k
            && !(1..=MAX_TOP_K).contains(&k)
        {
            return Err(ValidationError::InvalidValue(
                "top_k".to_string(),
                format!("must be between 1 and {}, got {}", MAX_TOP_K, k),
            )
            .into());
        }
        Ok(())
    }
}

/// A retrieved chunk cited in an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SourceExcerpt {
    /// Beginning of the chunk text
    pub excerpt: String,
    /// Positional tag of the chunk ("{index}-pl")
    pub source: String,
    /// Similarity score (0.0 to 1.0)
    pub score: f32,
}

/// Answer to a question
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AskResponse {
    /// Answer text, or a readable error message
    pub answer: String,
    /// Retrieved chunks in rank order (empty for locally handled tasks)
    pub sources: Vec<SourceExcerpt>,
    /// Time taken in milliseconds
    pub duration_ms: u64,
}
