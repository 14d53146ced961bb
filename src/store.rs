//! SQLite-backed persistent vector store.
//!
//! A store lives inside a persistence *directory* and is either empty or
//! fully built — the whole build runs in one transaction, so a failed build
//! leaves nothing behind for `search` to see. The embedding model identifier
//! and dimensionality are persisted as metadata and re-checked on load;
//! querying a store with a different model is rejected rather than silently
//! producing garbage distances.
//!
//! Existence signal for the caller's caching policy: directory present and
//! non-empty. There is no content-hash invalidation — reusing a location for
//! a different document set serves stale chunks (see the staleness note on
//! [`VectorStore::exists`]).

use std::path::{Path, PathBuf};
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::info;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::{BrdError, Result};
use crate::models::{Chunk, EmbeddedChunk, ScoredChunk};

const STORE_FILE: &str = "store.sqlite";

/// Persistent index of `(chunk, vector)` pairs for one embedding model.
#[derive(Debug)]
pub struct VectorStore {
    pool: SqlitePool,
    model: String,
    dims: usize,
    location: PathBuf,
}

impl VectorStore {
    /// Whether a store already exists at `location`.
    ///
    /// "Exists" means the directory is present and non-empty — the sole
    /// signal the caching policy consumes. Callers are responsible for
    /// using distinct locations per distinct document set; nothing here
    /// detects that the same location was reused with different content.
    pub fn exists(location: &Path) -> bool {
        match std::fs::read_dir(location) {
            Ok(mut entries) => entries.next().is_some(),
            Err(_) => false,
        }
    }

    /// Build a store from embedded chunks, all-or-nothing.
    ///
    /// Every vector is validated against `dims` before anything touches
    /// disk; the inserts then run in a single transaction.
    pub async fn build(
        location: &Path,
        model: &str,
        dims: usize,
        embedded: &[EmbeddedChunk],
    ) -> Result<Self> {
        for ec in embedded {
            if ec.vector.len() != dims {
                return Err(BrdError::Config(format!(
                    "embedding dimension mismatch: chunk {}:{} has {} dims, store expects {}",
                    ec.chunk.document_id,
                    ec.chunk.sequence_index,
                    ec.vector.len(),
                    dims
                )));
            }
        }

        std::fs::create_dir_all(location)?;
        let pool = connect(&location.join(STORE_FILE)).await?;

        let mut tx = pool.begin().await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS store_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                pos INTEGER PRIMARY KEY AUTOINCREMENT,
                document_id TEXT NOT NULL,
                sequence_index INTEGER NOT NULL,
                text TEXT NOT NULL,
                span_start INTEGER NOT NULL,
                span_end INTEGER NOT NULL,
                embedding BLOB NOT NULL
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;

        for (key, value) in [("embedding_model", model.to_string()), ("dims", dims.to_string())] {
            sqlx::query("INSERT OR REPLACE INTO store_meta (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }

        for ec in embedded {
            sqlx::query(
                r#"
                INSERT INTO chunks (document_id, sequence_index, text, span_start, span_end, embedding)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&ec.chunk.document_id)
            .bind(ec.chunk.sequence_index as i64)
            .bind(&ec.chunk.text)
            .bind(ec.chunk.char_span.0 as i64)
            .bind(ec.chunk.char_span.1 as i64)
            .bind(vec_to_blob(&ec.vector))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(chunks = embedded.len(), model, "vector store built");

        Ok(Self {
            pool,
            model: model.to_string(),
            dims,
            location: location.to_path_buf(),
        })
    }

    /// Load a persisted store, failing fast when the recorded embedding
    /// model differs from the configured one.
    pub async fn load(location: &Path, configured_model: &str) -> Result<Self> {
        if !Self::exists(location) {
            return Err(BrdError::StoreNotFound(location.to_path_buf()));
        }

        let pool = connect(&location.join(STORE_FILE)).await?;
        let model = read_meta(&pool, "embedding_model").await?;
        let dims: usize = read_meta(&pool, "dims")
            .await?
            .parse()
            .map_err(|_| BrdError::Config("corrupt store metadata: dims".to_string()))?;

        if model != configured_model {
            return Err(BrdError::EmbeddingModelMismatch {
                stored: model,
                configured: configured_model.to_string(),
            });
        }

        info!(model = %model, dims, location = %location.display(), "vector store loaded");
        Ok(Self {
            pool,
            model,
            dims,
            location: location.to_path_buf(),
        })
    }

    /// Rank all indexed chunks by cosine similarity to `query_vector`,
    /// descending, truncated to `k`. Equal scores keep insertion order.
    pub async fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if query_vector.len() != self.dims {
            return Err(BrdError::Config(format!(
                "query vector has {} dims, store expects {}",
                query_vector.len(),
                self.dims
            )));
        }

        let mut scored: Vec<ScoredChunk> = self
            .all_chunks()
            .await?
            .into_iter()
            .map(|ec| {
                let score = cosine_similarity(query_vector, &ec.vector);
                ScoredChunk {
                    chunk: ec.chunk,
                    score,
                }
            })
            .collect();

        // Stable sort keeps insertion order for exactly-equal scores.
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    /// All embedded chunks in insertion order.
    pub async fn all_chunks(&self) -> Result<Vec<EmbeddedChunk>> {
        let rows = sqlx::query(
            "SELECT document_id, sequence_index, text, span_start, span_end, embedding \
             FROM chunks ORDER BY pos",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let span_start: i64 = row.get("span_start");
                let span_end: i64 = row.get("span_end");
                let sequence_index: i64 = row.get("sequence_index");
                let blob: Vec<u8> = row.get("embedding");
                EmbeddedChunk {
                    chunk: Chunk {
                        document_id: row.get("document_id"),
                        sequence_index: sequence_index as usize,
                        text: row.get("text"),
                        char_span: (span_start as usize, span_end as usize),
                    },
                    vector: blob_to_vec(&blob),
                }
            })
            .collect())
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

async fn connect(db_path: &Path) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
        .map_err(BrdError::Store)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

async fn read_meta(pool: &SqlitePool, key: &str) -> Result<String> {
    sqlx::query_scalar("SELECT value FROM store_meta WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| BrdError::Config(format!("corrupt store metadata: missing {}", key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn chunk(doc: &str, index: usize, text: &str) -> Chunk {
        Chunk {
            document_id: doc.to_string(),
            sequence_index: index,
            text: text.to_string(),
            char_span: (index * 10, index * 10 + text.chars().count()),
        }
    }

    fn embedded(doc: &str, index: usize, text: &str, vector: Vec<f32>) -> EmbeddedChunk {
        EmbeddedChunk {
            chunk: chunk(doc, index, text),
            vector,
        }
    }

    #[tokio::test]
    async fn test_build_load_search_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let location = tmp.path().join("store");

        let chunks = vec![
            embedded("d1", 0, "alpha", vec![1.0, 0.0]),
            embedded("d1", 1, "beta", vec![0.0, 1.0]),
            embedded("d1", 2, "gamma", vec![0.7, 0.7]),
        ];
        let store = VectorStore::build(&location, "test-model", 2, &chunks)
            .await
            .unwrap();
        store.close().await;

        assert!(VectorStore::exists(&location));

        let store = VectorStore::load(&location, "test-model").await.unwrap();
        let results = store.search(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.text, "alpha");
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert_eq!(results[1].chunk.text, "gamma");
    }

    #[tokio::test]
    async fn test_load_missing_store_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = VectorStore::load(&tmp.path().join("nope"), "m").await.unwrap_err();
        assert!(matches!(err, BrdError::StoreNotFound(_)));
    }

    #[tokio::test]
    async fn test_model_mismatch_rejected_on_load() {
        let tmp = TempDir::new().unwrap();
        let location = tmp.path().join("store");
        let chunks = vec![embedded("d1", 0, "alpha", vec![1.0, 0.0])];
        VectorStore::build(&location, "model-a", 2, &chunks)
            .await
            .unwrap()
            .close()
            .await;

        let err = VectorStore::load(&location, "model-b").await.unwrap_err();
        assert!(matches!(err, BrdError::EmbeddingModelMismatch { .. }));
    }

    #[tokio::test]
    async fn test_build_rejects_wrong_dimension_before_writing() {
        let tmp = TempDir::new().unwrap();
        let location = tmp.path().join("store");
        let chunks = vec![
            embedded("d1", 0, "alpha", vec![1.0, 0.0]),
            embedded("d1", 1, "beta", vec![1.0, 0.0, 0.0]),
        ];
        let err = VectorStore::build(&location, "m", 2, &chunks).await.unwrap_err();
        assert!(matches!(err, BrdError::Config(_)));
        // Nothing persisted: the dimension check runs before any write.
        assert!(!VectorStore::exists(&location));
    }

    #[tokio::test]
    async fn test_query_dimension_checked() {
        let tmp = TempDir::new().unwrap();
        let location = tmp.path().join("store");
        let chunks = vec![embedded("d1", 0, "alpha", vec![1.0, 0.0])];
        let store = VectorStore::build(&location, "m", 2, &chunks).await.unwrap();
        assert!(store.search(&[1.0, 0.0, 0.0], 1).await.is_err());
    }

    #[tokio::test]
    async fn test_all_chunks_keeps_insertion_order() {
        let tmp = TempDir::new().unwrap();
        let location = tmp.path().join("store");
        let chunks: Vec<EmbeddedChunk> = (0..5)
            .map(|i| embedded("d1", i, &format!("chunk {}", i), vec![i as f32, 1.0]))
            .collect();
        let store = VectorStore::build(&location, "m", 2, &chunks).await.unwrap();
        let all = store.all_chunks().await.unwrap();
        let order: Vec<usize> = all.iter().map(|ec| ec.chunk.sequence_index).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }
}
