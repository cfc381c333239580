// LanceDB is the embedded vector database backing every index
pub mod lance_store;
pub use lance_store::LanceStore;

use anyhow::Result;
use std::cmp::Ordering;

/// One stored chunk: its embedding, text and positional metadata
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    /// Insertion sequence number, unique within a collection
    pub seq: u32,
    /// Positional source tag ("{index}-pl")
    pub source: String,
    /// Chunk text
    pub content: String,
    /// Embedding of `content`
    pub vector: Vec<f32>,
}

/// A record returned by similarity search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub seq: u32,
    pub source: String,
    pub content: String,
    /// Similarity in (0, 1], higher is closer
    pub score: f32,
}

/// Trait for the persistent collection behind a single index
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection for vectors of `dimension` if it does not exist
    async fn initialize(&self, dimension: usize) -> Result<()>;

    /// Append records, returning how many were written
    async fn append(&self, records: Vec<VectorRecord>) -> Result<usize>;

    /// Return at most `limit` records nearest to `query_vector`, best first,
    /// ties in insertion order
    async fn search(&self, query_vector: Vec<f32>, limit: usize) -> Result<Vec<SearchHit>>;

    /// Number of stored records
    async fn count(&self) -> Result<usize>;
}

/// Convert a vector distance into a similarity score
pub fn distance_to_score(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

/// Order hits by descending score then ascending sequence number, keeping the best `limit`
pub fn rank_hits(mut hits: Vec<SearchHit>, limit: usize) -> Vec<SearchHit> {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.seq.cmp(&b.seq))
    });
    hits.truncate(limit);
    hits
}
