//! LanceDB-backed storage for one index
//!
//! Each index directory holds its own embedded LanceDB database with a single
//! `chunks` table.

use super::{SearchHit, VectorRecord, VectorStore, distance_to_score, rank_hits};
use anyhow::{Context, Result, bail};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
    UInt32Array, types::Float32Type,
};
use arrow_schema::{DataType, Field, Schema};
use futures::stream::TryStreamExt;
use lancedb::Table;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const TABLE_NAME: &str = "chunks";

/// Extra candidates fetched so records tied at the cut-off can be ordered by sequence
///
/// When every extra candidate still ties with the cut-off, a second query
/// collects all records within the cut-off distance.
const TIE_OVERFETCH: usize = 8;

/// LanceDB vector store (embedded, no server required)
pub struct LanceStore {
    connection: Connection,
    db_path: PathBuf,
}

impl LanceStore {
    /// Open (or create) the database at `db_path`
    pub async fn open(db_path: &Path) -> Result<Self> {
        tracing::debug!("Connecting to LanceDB at: {}", db_path.display());

        let uri = db_path
            .to_str()
            .with_context(|| format!("Non UTF-8 index path: {}", db_path.display()))?;

        let connection = lancedb::connect(uri)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        Ok(Self {
            connection,
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Whether the chunks table has been created
    pub async fn has_table(&self) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .context("Failed to list tables")?;
        Ok(table_names.iter().any(|name| name == TABLE_NAME))
    }

    fn create_schema(dimension: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimension as i32,
                ),
                false,
            ),
            Field::new("seq", DataType::UInt32, false),
            Field::new("source", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
        ]))
    }

    async fn get_table(&self) -> Result<Table> {
        self.connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .context("Failed to open table")
    }

    fn create_record_batch(records: Vec<VectorRecord>) -> Result<RecordBatch> {
        let dimension = records
            .first()
            .map(|r| r.vector.len())
            .context("Cannot build a batch from zero records")?;

        if let Some(bad) = records.iter().find(|r| r.vector.len() != dimension) {
            bail!(
                "Record {} has {} dimensions, expected {}",
                bad.seq,
                bad.vector.len(),
                dimension
            );
        }

        let seq_array = UInt32Array::from(records.iter().map(|r| r.seq).collect::<Vec<_>>());
        let source_array =
            StringArray::from(records.iter().map(|r| r.source.as_str()).collect::<Vec<_>>());
        let content_array =
            StringArray::from(records.iter().map(|r| r.content.as_str()).collect::<Vec<_>>());

        let vector_array = FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
            records
                .into_iter()
                .map(|r| Some(r.vector.into_iter().map(Some))),
            dimension as i32,
        );

        RecordBatch::try_new(
            Self::create_schema(dimension),
            vec![
                Arc::new(vector_array),
                Arc::new(seq_array),
                Arc::new(source_array),
                Arc::new(content_array),
            ],
        )
        .context("Failed to create RecordBatch")
    }

    /// Nearest records as `(distance, hit)` pairs, optionally capped at `max_distance` (inclusive)
    async fn nearest(
        table: &Table,
        query_vector: &[f32],
        limit: usize,
        max_distance: Option<f32>,
    ) -> Result<Vec<(f32, SearchHit)>> {
        let mut query = table
            .vector_search(query_vector.to_vec())
            .context("Failed to create vector search")?
            .limit(limit);
        if let Some(max) = max_distance {
            // Upper bound is exclusive
            query = query.distance_range(None, Some(max.next_up()));
        }

        let stream = query.execute().await.context("Failed to execute search")?;
        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .context("Failed to collect search results")?;

        let mut hits = Vec::new();
        for batch in &batches {
            hits.extend(Self::hits_from_batch(batch)?);
        }
        hits.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(hits)
    }

    fn hits_from_batch(batch: &RecordBatch) -> Result<Vec<(f32, SearchHit)>> {
        let distance_array = batch
            .column_by_name("_distance")
            .context("Missing _distance column")?
            .as_any()
            .downcast_ref::<Float32Array>()
            .context("Invalid _distance type")?;

        let seq_array = batch
            .column_by_name("seq")
            .context("Missing seq column")?
            .as_any()
            .downcast_ref::<UInt32Array>()
            .context("Invalid seq type")?;

        let source_array = batch
            .column_by_name("source")
            .context("Missing source column")?
            .as_any()
            .downcast_ref::<StringArray>()
            .context("Invalid source type")?;

        let content_array = batch
            .column_by_name("content")
            .context("Missing content column")?
            .as_any()
            .downcast_ref::<StringArray>()
            .context("Invalid content type")?;

        Ok((0..batch.num_rows())
            .filter(|&i| !distance_array.is_null(i))
            .map(|i| {
                let distance = distance_array.value(i);
                let hit = SearchHit {
                    seq: seq_array.value(i),
                    source: source_array.value(i).to_string(),
                    content: content_array.value(i).to_string(),
                    score: distance_to_score(distance),
                };
                (distance, hit)
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl VectorStore for LanceStore {
    async fn initialize(&self, dimension: usize) -> Result<()> {
        if self.has_table().await? {
            tracing::debug!("Table '{}' already exists", TABLE_NAME);
            return Ok(());
        }

        tracing::info!(
            "Creating LanceDB table with dimension {} at {}",
            dimension,
            self.db_path.display()
        );

        let schema = Self::create_schema(dimension);
        let empty_batch = RecordBatch::new_empty(schema.clone());
        let batches = RecordBatchIterator::new(vec![empty_batch].into_iter().map(Ok), schema);

        self.connection
            .create_table(TABLE_NAME, Box::new(batches))
            .execute()
            .await
            .context("Failed to create table")?;

        Ok(())
    }

    async fn append(&self, records: Vec<VectorRecord>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let batch = Self::create_record_batch(records)?;
        let count = batch.num_rows();
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![batch].into_iter().map(Ok), schema);

        self.get_table()
            .await?
            .add(Box::new(batches))
            .execute()
            .await
            .context("Failed to add records to table")?;

        tracing::debug!("Stored {} records in {}", count, self.db_path.display());
        Ok(count)
    }

    async fn search(&self, query_vector: Vec<f32>, limit: usize) -> Result<Vec<SearchHit>> {
        if limit == 0 || !self.has_table().await? {
            return Ok(Vec::new());
        }

        let table = self.get_table().await?;
        let rows = table.count_rows(None).await.context("Failed to count rows")?;
        if rows == 0 {
            return Ok(Vec::new());
        }

        let fetch = limit + TIE_OVERFETCH;
        let mut hits = Self::nearest(&table, &query_vector, fetch, None).await?;

        if hits.len() == fetch && rows > fetch {
            let cutoff = hits[limit - 1].0;
            if hits[fetch - 1].0 <= cutoff {
                tracing::debug!(
                    "More than {} records tie at distance {}, fetching all of them",
                    TIE_OVERFETCH,
                    cutoff
                );
                hits = Self::nearest(&table, &query_vector, rows, Some(cutoff)).await?;
            }
        }

        Ok(rank_hits(hits.into_iter().map(|(_, hit)| hit).collect(), limit))
    }

    async fn count(&self) -> Result<usize> {
        if !self.has_table().await? {
            return Ok(0);
        }

        self.get_table()
            .await?
            .count_rows(None)
            .await
            .context("Failed to count rows")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(seq: u32, content: &str, vector: Vec<f32>) -> VectorRecord {
        VectorRecord {
            seq,
            source: format!("{}-pl", seq),
            content: content.to_string(),
            vector,
        }
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = LanceStore::open(dir.path()).await.unwrap();
        assert!(!store.has_table().await.unwrap());

        store.initialize(3).await.unwrap();
        store.initialize(3).await.unwrap();
        assert!(store.has_table().await.unwrap());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_append_and_count() {
        let dir = TempDir::new().unwrap();
        let store = LanceStore::open(dir.path()).await.unwrap();
        store.initialize(3).await.unwrap();

        let written = store
            .append(vec![
                record(0, "alpha", vec![1.0, 0.0, 0.0]),
                record(1, "beta", vec![0.0, 1.0, 0.0]),
            ])
            .await
            .unwrap();
        assert_eq!(written, 2);
        assert_eq!(store.append(vec![]).await.unwrap(), 0);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_search_nearest_first() {
        let dir = TempDir::new().unwrap();
        let store = LanceStore::open(dir.path()).await.unwrap();
        store.initialize(3).await.unwrap();
        store
            .append(vec![
                record(0, "alpha", vec![1.0, 0.0, 0.0]),
                record(1, "beta", vec![0.0, 1.0, 0.0]),
                record(2, "gamma", vec![0.0, 0.0, 1.0]),
            ])
            .await
            .unwrap();

        let hits = store.search(vec![0.0, 1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].content, "beta");
        assert_eq!(hits[0].source, "1-pl");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_search_ties_follow_insertion_order() {
        let dir = TempDir::new().unwrap();
        let store = LanceStore::open(dir.path()).await.unwrap();
        store.initialize(2).await.unwrap();
        store
            .append(vec![
                record(0, "first", vec![1.0, 1.0]),
                record(1, "second", vec![1.0, 1.0]),
                record(2, "third", vec![1.0, 1.0]),
            ])
            .await
            .unwrap();

        let hits = store.search(vec![1.0, 1.0], 2).await.unwrap();
        let seqs: Vec<u32> = hits.iter().map(|h| h.seq).collect();
        assert_eq!(seqs, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_search_ties_beyond_overfetch_follow_insertion_order() {
        let dir = TempDir::new().unwrap();
        let store = LanceStore::open(dir.path()).await.unwrap();
        store.initialize(2).await.unwrap();

        // Written in reverse so the lowest sequence numbers are stored last
        let total = (TIE_OVERFETCH + 6) as u32;
        let records = (0..total)
            .rev()
            .map(|seq| record(seq, "same", vec![1.0, 1.0]))
            .collect();
        store.append(records).await.unwrap();
        store
            .append(vec![record(total, "far", vec![-5.0, 3.0])])
            .await
            .unwrap();

        let hits = store.search(vec![1.0, 1.0], 3).await.unwrap();
        let seqs: Vec<u32> = hits.iter().map(|h| h.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_search_closer_record_beats_ties() {
        let dir = TempDir::new().unwrap();
        let store = LanceStore::open(dir.path()).await.unwrap();
        store.initialize(2).await.unwrap();

        let mut records: Vec<VectorRecord> = (0..20)
            .map(|seq| record(seq, "tied", vec![0.0, 1.0]))
            .collect();
        records.push(record(20, "exact", vec![1.0, 0.0]));
        store.append(records).await.unwrap();

        let hits = store.search(vec![1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].seq, 20);
        assert_eq!(hits[1].seq, 0);
    }

    #[tokio::test]
    async fn test_search_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = LanceStore::open(dir.path()).await.unwrap();
        assert!(store.search(vec![1.0], 4).await.unwrap().is_empty());

        store.initialize(1).await.unwrap();
        assert!(store.search(vec![1.0], 4).await.unwrap().is_empty());
    }

    #[test]
    fn test_record_batch_rejects_mixed_dimensions() {
        let result = LanceStore::create_record_batch(vec![
            record(0, "a", vec![1.0, 0.0]),
            record(1, "b", vec![1.0]),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_record_batch_columns() {
        let batch = LanceStore::create_record_batch(vec![record(7, "text", vec![0.5, 0.5])]).unwrap();
        assert_eq!(batch.num_rows(), 1);
        assert_eq!(batch.num_columns(), 4);
        assert!(batch.column_by_name("seq").is_some());
    }
}
