// LanceDB vector store backend
// One embedded database per user, holding a single `chunks` table


use ::lancedb::query::{ExecutableQuery, QueryBase};
use ::lancedb::{Connection, Table};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::database::vector_store::{StoreSnapshot, StoredChunk, VectorStoreBackend};
use crate::embeddings::chunking::ChunkMetadata;
use crate::{RagError, Result};

const TABLE_NAME: &str = "chunks";
const LANCE_DIR: &str = "lance";

fn db_error(context: &str, err: impl std::fmt::Display) -> RagError {
    RagError::Database(format!("{context}: {err}"))
}

/// Vector store backend on an embedded LanceDB table.
///
/// The table is created on the first append, once the embedding dimension is
/// known. Rows carry a monotonically increasing `seq` so scans can be
/// returned in insertion order.
#[derive(Debug, Clone)]
pub struct LanceBackend {
    dir: PathBuf,
}

impl LanceBackend {
    #[inline]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn db_path(&self) -> PathBuf {
        self.dir.join(LANCE_DIR)
    }

    async fn connect(&self) -> Result<Connection> {
        let db_path = self.db_path();
        tokio::fs::create_dir_all(&db_path).await?;

        let uri = db_path.to_string_lossy().into_owned();
        debug!("Connecting to LanceDB at {}", uri);
        ::lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| db_error("Failed to connect to LanceDB", e))
    }

    async fn open_table(conn: &Connection) -> Result<Option<Table>> {
        let table_names = conn
            .table_names()
            .execute()
            .await
            .map_err(|e| db_error("Failed to list tables", e))?;

        if !table_names.iter().any(|name| name == TABLE_NAME) {
            return Ok(None);
        }

        conn.open_table(TABLE_NAME)
            .execute()
            .await
            .map(Some)
            .map_err(|e| db_error("Failed to open table", e))
    }

    fn create_schema(vector_dim: usize) -> Result<Arc<Schema>> {
        let dim = i32::try_from(vector_dim)
            .map_err(|_| RagError::InvalidInput(format!("vector dimension {vector_dim} too large")))?;

        Ok(Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, false)), dim),
                false,
            ),
            Field::new("seq", DataType::UInt64, false),
            Field::new("text", DataType::Utf8, false),
            Field::new("source", DataType::Utf8, false),
            Field::new("user_id", DataType::Utf8, false),
            Field::new("chunk_index", DataType::UInt64, false),
            Field::new("created_at", DataType::Utf8, false),
            Field::new("extra", DataType::Utf8, false),
        ])))
    }

    /// Read the vector dimension from the table schema
    fn schema_dimension(schema: &Schema) -> Option<usize> {
        schema.fields().iter().find_map(|field| {
            if field.name() != "vector" {
                return None;
            }
            match field.data_type() {
                DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
                _ => None,
            }
        })
    }

    async fn table_dimension(table: &Table) -> Result<usize> {
        let schema = table
            .schema()
            .await
            .map_err(|e| db_error("Failed to get table schema", e))?;
        Self::schema_dimension(&schema).ok_or_else(|| {
            RagError::Database("Could not find vector column or determine dimension".to_string())
        })
    }

    fn create_record_batch(
        records: &[StoredChunk],
        vector_dim: usize,
        first_seq: u64,
    ) -> Result<RecordBatch> {
        let len = records.len();
        let mut flat_values = Vec::with_capacity(len * vector_dim);
        let mut extras = Vec::with_capacity(len);
        for record in records {
            flat_values.extend_from_slice(&record.embedding);
            extras.push(
                serde_json::to_string(&record.metadata.extra)
                    .map_err(|e| db_error("Failed to encode chunk metadata", e))?,
            );
        }

        let schema = Self::create_schema(vector_dim)?;
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let dim = i32::try_from(vector_dim)
            .map_err(|_| RagError::InvalidInput(format!("vector dimension {vector_dim} too large")))?;
        let vector_array =
            FixedSizeListArray::try_new(field, dim, Arc::new(Float32Array::from(flat_values)), None)
                .map_err(|e| db_error("Failed to create vector array", e))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.id.as_str()))),
            Arc::new(vector_array),
            Arc::new(UInt64Array::from_iter_values(first_seq..first_seq + len as u64)),
            Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.document.as_str()))),
            Arc::new(StringArray::from_iter_values(
                records.iter().map(|r| r.metadata.source.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                records.iter().map(|r| r.metadata.user_id.as_str()),
            )),
            Arc::new(UInt64Array::from_iter_values(
                records.iter().map(|r| r.metadata.chunk_index as u64),
            )),
            Arc::new(StringArray::from_iter_values(
                records.iter().map(|r| r.metadata.timestamp.to_rfc3339()),
            )),
            Arc::new(StringArray::from_iter_values(extras)),
        ];

        RecordBatch::try_new(schema, arrays).map_err(|e| db_error("Failed to create record batch", e))
    }

    fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
        batch
            .column_by_name(name)
            .ok_or_else(|| RagError::Database(format!("Missing {name} column")))?
            .as_any()
            .downcast_ref::<T>()
            .ok_or_else(|| RagError::Database(format!("Invalid {name} column type")))
    }

    fn parse_batch(batch: &RecordBatch) -> Result<Vec<(u64, StoredChunk)>> {
        let ids = Self::column::<StringArray>(batch, "id")?;
        let vectors = Self::column::<FixedSizeListArray>(batch, "vector")?;
        let seqs = Self::column::<UInt64Array>(batch, "seq")?;
        let texts = Self::column::<StringArray>(batch, "text")?;
        let sources = Self::column::<StringArray>(batch, "source")?;
        let user_ids = Self::column::<StringArray>(batch, "user_id")?;
        let chunk_indices = Self::column::<UInt64Array>(batch, "chunk_index")?;
        let created_ats = Self::column::<StringArray>(batch, "created_at")?;
        let extras = Self::column::<StringArray>(batch, "extra")?;

        let mut rows = Vec::with_capacity(batch.num_rows());
        for row in 0..batch.num_rows() {
            let vector = vectors.value(row);
            let embedding = vector
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| RagError::Database("Invalid vector item type".to_string()))?
                .values()
                .to_vec();

            let timestamp = DateTime::parse_from_rfc3339(created_ats.value(row))
                .map_err(|e| db_error("Invalid created_at value", e))?
                .with_timezone(&Utc);
            let extra: BTreeMap<String, String> = serde_json::from_str(extras.value(row))
                .map_err(|e| db_error("Invalid extra metadata", e))?;
            let chunk_index = usize::try_from(chunk_indices.value(row))
                .map_err(|e| db_error("Invalid chunk_index value", e))?;

            rows.push((
                seqs.value(row),
                StoredChunk {
                    id: ids.value(row).to_string(),
                    embedding,
                    document: texts.value(row).to_string(),
                    metadata: ChunkMetadata {
                        source: sources.value(row).to_string(),
                        user_id: user_ids.value(row).to_string(),
                        chunk_index,
                        timestamp,
                        extra,
                    },
                },
            ));
        }
        Ok(rows)
    }
}

#[async_trait]
impl VectorStoreBackend for LanceBackend {
    async fn exists(&self) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.db_path()).await?)
    }

    async fn create(&self) -> Result<()> {
        self.connect().await?;
        info!("Initialized LanceDB store at {}", self.db_path().display());
        Ok(())
    }

    async fn load(&self) -> Result<StoreSnapshot> {
        if !self.exists().await? {
            return Ok(StoreSnapshot::default());
        }
        let conn = self.connect().await?;
        let Some(table) = Self::open_table(&conn).await? else {
            return Ok(StoreSnapshot::default());
        };

        let mut snapshot = StoreSnapshot {
            dimension: Some(Self::table_dimension(&table).await?),
            ..StoreSnapshot::default()
        };

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| db_error("Failed to count rows", e))?;
        if count == 0 {
            return Ok(snapshot);
        }

        let mut stream = table
            .query()
            .limit(count)
            .execute()
            .await
            .map_err(|e| db_error("Failed to scan table", e))?;

        let mut rows = Vec::with_capacity(count);
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| db_error("Failed to read result stream", e))?
        {
            rows.extend(Self::parse_batch(&batch)?);
        }
        rows.sort_by_key(|(seq, _)| *seq);

        for (_, record) in rows {
            snapshot.push(record);
        }
        debug!("Loaded {} rows from {}", snapshot.len(), self.db_path().display());
        Ok(snapshot)
    }

    async fn dimension(&self) -> Result<Option<usize>> {
        if !self.exists().await? {
            return Ok(None);
        }
        let conn = self.connect().await?;
        match Self::open_table(&conn).await? {
            Some(table) => Ok(Some(Self::table_dimension(&table).await?)),
            None => Ok(None),
        }
    }

    async fn append(&self, records: &[StoredChunk]) -> Result<()> {
        let Some(first) = records.first() else {
            return Ok(());
        };

        let conn = self.connect().await?;
        let (table, vector_dim, next_seq) = match Self::open_table(&conn).await? {
            Some(table) => {
                let dim = Self::table_dimension(&table).await?;
                let count = table
                    .count_rows(None)
                    .await
                    .map_err(|e| db_error("Failed to count rows", e))?;
                (table, dim, count as u64)
            }
            None => {
                let dim = first.embedding.len();
                let table = conn
                    .create_empty_table(TABLE_NAME, Self::create_schema(dim)?)
                    .execute()
                    .await
                    .map_err(|e| db_error("Failed to create table", e))?;
                info!("Created {} table with {} dimensions", TABLE_NAME, dim);
                (table, dim, 0)
            }
        };

        if let Some(bad) = records.iter().find(|r| r.embedding.len() != vector_dim) {
            return Err(RagError::DimensionMismatch {
                expected: vector_dim,
                actual: bad.embedding.len(),
            });
        }

        let record_batch = Self::create_record_batch(records, vector_dim, next_seq)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| db_error("Failed to insert rows", e))?;

        debug!("Appended {} rows to {}", records.len(), self.db_path().display());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
