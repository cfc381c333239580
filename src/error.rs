/// Centralized error types for ragabond using thiserror
///
/// Provides domain-specific error types for better error handling and user-facing messages.
use thiserror::Error;

/// Main error type for the RAG system
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Vector database error: {0}")]
    VectorDb(#[from] VectorDbError),

    #[error("Chunking error: {0}")]
    Chunking(#[from] ChunkingError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors related to the lifecycle of named indexes
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Invalid index name: {0}")]
    InvalidName(String),

    #[error("Index '{0}' already exists")]
    AlreadyExists(String),

    #[error("Index '{0}' not found")]
    NotFound(String),

    #[error("No record of files found for index '{0}'")]
    ManifestNotFound(String),

    #[error(
        "Index '{name}' was built with embedding model '{built_with}' ({built_dimension} dims), \
         but '{configured}' ({configured_dimension} dims) is configured"
    )]
    ModelMismatch {
        name: String,
        built_with: String,
        built_dimension: usize,
        configured: String,
        configured_dimension: usize,
    },

    #[error("Index '{name}' is corrupted: {reason}")]
    Corrupted { name: String, reason: String },
}

/// Errors related to turning a file into plain text
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to read file '{file}': {reason}")]
    ReadFailed { file: String, reason: String },

    #[error("Failed to extract text from PDF '{file}': {reason}")]
    PdfExtraction { file: String, reason: String },

    #[error("Failed to parse CSV '{file}': {reason}")]
    Csv { file: String, reason: String },

    #[error("Failed to parse JSON '{file}': {reason}")]
    Json { file: String, reason: String },
}

/// Errors related to embedding generation
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Failed to initialize embedding model: {0}")]
    InitializationFailed(String),

    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),

    #[error("Embedding request to {url} failed: {reason}")]
    RequestFailed { url: String, reason: String },

    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Unknown embedding provider: {0}")]
    UnknownProvider(String),

    #[error("Model lock was poisoned: {0}")]
    LockPoisoned(String),
}

/// Errors related to the generative language model
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Generation request to {url} failed: {reason}")]
    RequestFailed { url: String, reason: String },

    #[error("Client error from language model: HTTP {0}")]
    ClientStatus(u16),

    #[error("Malformed response from language model: {0}")]
    MalformedResponse(String),

    #[error("Language model returned an error: {0}")]
    ModelError(String),

    #[error("Generation task failed: {0}")]
    TaskFailed(String),
}

/// Errors related to vector database operations
#[derive(Error, Debug)]
pub enum VectorDbError {
    #[error("Failed to open vector store at '{path}': {reason}")]
    OpenFailed { path: String, reason: String },

    #[error("Failed to create collection at '{path}': {reason}")]
    CreateFailed { path: String, reason: String },

    #[error("Failed to store record: {0}")]
    StoreFailed(String),

    #[error("Failed to search records: {0}")]
    SearchFailed(String),

    #[error("Invalid search parameters: {0}")]
    InvalidSearchParams(String),
}

/// Errors related to text chunking
#[derive(Error, Debug)]
pub enum ChunkingError {
    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(String),
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {0}")]
    LoadFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
}

/// Errors related to input validation
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("Empty {0}")]
    Empty(String),
}

// Conversion from anyhow::Error to RagError
impl From<anyhow::Error> for RagError {
    fn from(err: anyhow::Error) -> Self {
        RagError::Other(format!("{:#}", err))
    }
}

impl RagError {
    /// Create a new error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        RagError::Other(msg.into())
    }

    /// Convert to a user-facing error string suitable for MCP and CLI output
    pub fn to_user_string(&self) -> String {
        format!("{}", self)
    }

    /// Check if this is a user error (bad name, missing index, bad input) vs system error
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            RagError::Validation(_)
                | RagError::Index(
                    IndexError::InvalidName(_)
                        | IndexError::AlreadyExists(_)
                        | IndexError::NotFound(_)
                        | IndexError::ManifestNotFound(_)
                )
                | RagError::VectorDb(VectorDbError::InvalidSearchParams(_))
                | RagError::Config(ConfigError::InvalidValue { .. })
        )
    }

    /// Check if the error means the requested index does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RagError::Index(IndexError::NotFound(_) | IndexError::ManifestNotFound(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RagError::Index(IndexError::AlreadyExists("docs".to_string()));
        assert_eq!(err.to_string(), "Index error: Index 'docs' already exists");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let rag_err: RagError = io_err.into();
        assert!(matches!(rag_err, RagError::Io(_)));
    }

    #[test]
    fn test_error_from_anyhow() {
        let anyhow_err = anyhow::anyhow!("test error");
        let rag_err: RagError = anyhow_err.into();
        assert!(matches!(rag_err, RagError::Other(_)));
    }

    #[test]
    fn test_is_user_error() {
        let user_err = RagError::Index(IndexError::InvalidName(String::new()));
        assert!(user_err.is_user_error());

        let system_err = RagError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "test"));
        assert!(!system_err.is_user_error());
    }

    #[test]
    fn test_is_not_found() {
        assert!(RagError::Index(IndexError::NotFound("x".into())).is_not_found());
        assert!(RagError::Index(IndexError::ManifestNotFound("x".into())).is_not_found());
        assert!(!RagError::Index(IndexError::AlreadyExists("x".into())).is_not_found());
    }

    #[test]
    fn test_model_mismatch_display() {
        let err = IndexError::ModelMismatch {
            name: "docs".to_string(),
            built_with: "nomic-embed-text".to_string(),
            built_dimension: 768,
            configured: "all-MiniLM-L6-v2".to_string(),
            configured_dimension: 384,
        };
        assert_eq!(
            err.to_string(),
            "Index 'docs' was built with embedding model 'nomic-embed-text' (768 dims), \
             but 'all-MiniLM-L6-v2' (384 dims) is configured"
        );
    }

    #[test]
    fn test_load_error_unsupported() {
        let err = LoadError::UnsupportedFormat("notes.docx".to_string());
        assert_eq!(err.to_string(), "Unsupported file format: notes.docx");
    }

    #[test]
    fn test_embedding_error_dimension_mismatch() {
        let err = EmbeddingError::DimensionMismatch {
            expected: 384,
            actual: 512,
        };
        assert_eq!(
            err.to_string(),
            "Invalid embedding dimension: expected 384, got 512"
        );
    }

    #[test]
    fn test_config_error_invalid_value() {
        let err = ConfigError::InvalidValue {
            key: "chunking.overlap".to_string(),
            reason: "must be smaller than chunking.chunk_size".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid configuration value for 'chunking.overlap': must be smaller than chunking.chunk_size"
        );
    }

    #[test]
    fn test_rag_error_other() {
        let err = RagError::other("custom error message");
        assert_eq!(err.to_string(), "custom error message");
    }

    #[test]
    fn test_error_chain() {
        let gen_err = GenerationError::ModelError("model 'llama3.1' not found".to_string());
        let rag_err: RagError = gen_err.into();
        assert!(matches!(rag_err, RagError::Generation(_)));
        assert_eq!(
            rag_err.to_string(),
            "Generation error: Language model returned an error: model 'llama3.1' not found"
        );
    }
}
