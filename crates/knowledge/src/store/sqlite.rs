//! SQLite-backed vector store.
//!
//! Each collection is one database file, `<persist_dir>/<collection>.sqlite3`,
//! in WAL mode so a serving process can read while an ingestion run writes.

use async_trait::async_trait;
use docvec_core::config::DistanceMetric;
use docvec_core::{AppError, AppResult};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{bytes_to_embedding, embedding_to_bytes, score, VectorStore};
use crate::types::{EmbeddingRecord, RecordMetadata, SimilarityResult, StoreStats};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS store_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS records (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    text TEXT NOT NULL,
    embedding BLOB NOT NULL,
    metadata TEXT NOT NULL
);
"#;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// How the store file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Ingestion: creates the directory and file as needed.
    ReadWrite,
    /// Serving: the directory must exist; a missing file becomes an empty collection.
    ReadOnly,
}

/// Brute-force vector store persisted in SQLite.
#[derive(Debug, Clone)]
pub struct SqliteVectorStore {
    conn: Arc<Mutex<Option<Connection>>>,
    path: PathBuf,
    collection: String,
    metric: DistanceMetric,
    mode: OpenMode,
}

fn unavailable(context: &str) -> impl Fn(rusqlite::Error) -> AppError + '_ {
    move |e| AppError::StoreUnavailable(format!("{}: {}", context, e))
}

impl SqliteVectorStore {
    /// Location of a collection's database file.
    pub fn collection_path(persist_dir: &Path, collection: &str) -> PathBuf {
        persist_dir.join(format!("{}.sqlite3", collection))
    }

    /// Open (or create) the collection under `persist_dir`.
    ///
    /// An existing collection keeps the metric it was created with; a
    /// different `metric` is logged and ignored.
    pub fn open(
        persist_dir: &Path,
        collection: &str,
        metric: DistanceMetric,
        mode: OpenMode,
    ) -> AppResult<Self> {
        match mode {
            OpenMode::ReadWrite => std::fs::create_dir_all(persist_dir).map_err(|e| {
                AppError::StoreUnavailable(format!(
                    "Failed to create store directory {}: {}",
                    persist_dir.display(),
                    e
                ))
            })?,
            OpenMode::ReadOnly => {
                if !persist_dir.is_dir() {
                    return Err(AppError::StoreUnavailable(format!(
                        "Store directory {} does not exist",
                        persist_dir.display()
                    )));
                }
            }
        }

        let path = Self::collection_path(persist_dir, collection);

        let conn = match mode {
            OpenMode::ReadWrite => open_writable(&path, metric)?,
            OpenMode::ReadOnly => {
                if !path.exists() {
                    tracing::info!("Initialising empty collection at {:?}", path);
                    drop(open_writable(&path, metric)?);
                }
                let conn = Connection::open_with_flags(
                    &path,
                    OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
                )
                .map_err(unavailable("Failed to open vector store"))?;
                conn.busy_timeout(BUSY_TIMEOUT)
                    .map_err(unavailable("Failed to configure vector store"))?;
                conn
            }
        };

        let stored = read_meta(&conn, "metric")?;
        let metric = match stored.as_deref().and_then(DistanceMetric::parse) {
            Some(stored) if stored != metric => {
                tracing::warn!(
                    "Collection '{}' was created with metric {}, ignoring configured {}",
                    collection,
                    stored.as_str(),
                    metric.as_str()
                );
                stored
            }
            Some(stored) => stored,
            None => metric,
        };

        tracing::debug!("Opened vector store at {:?} ({:?})", path, mode);

        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            path,
            collection: collection.to_string(),
            metric,
            mode,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&mut Connection) -> AppResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| AppError::StoreUnavailable("Store lock poisoned".to_string()))?;
            let conn = guard
                .as_mut()
                .ok_or_else(|| AppError::StoreUnavailable("Store is closed".to_string()))?;
            f(conn)
        })
        .await
        .map_err(|e| AppError::StoreUnavailable(format!("Store task failed: {}", e)))?
    }
}

fn open_writable(path: &Path, metric: DistanceMetric) -> AppResult<Connection> {
    let conn = Connection::open(path).map_err(unavailable("Failed to open vector store"))?;

    conn.busy_timeout(BUSY_TIMEOUT)
        .map_err(unavailable("Failed to configure vector store"))?;
    conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get::<_, String>(0))
        .map_err(unavailable("Failed to enable WAL"))?;
    conn.execute_batch(SCHEMA)
        .map_err(unavailable("Failed to create tables"))?;
    conn.execute(
        "INSERT OR IGNORE INTO store_meta (key, value) VALUES ('metric', ?1)",
        params![metric.as_str()],
    )
    .map_err(unavailable("Failed to write store metadata"))?;

    Ok(conn)
}

fn read_meta(conn: &Connection, key: &str) -> AppResult<Option<String>> {
    conn.query_row(
        "SELECT value FROM store_meta WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
    .map_err(unavailable("Failed to read store metadata"))
}

fn rank_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}

fn read_dimensions(conn: &Connection) -> AppResult<Option<usize>> {
    match read_meta(conn, "dimensions")? {
        Some(value) => value.parse().map(Some).map_err(|_| {
            AppError::StoreUnavailable(format!("Corrupted store metadata: dimensions={}", value))
        }),
        None => Ok(None),
    }
}

fn count_records(conn: &Connection) -> AppResult<u64> {
    conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get::<_, i64>(0))
        .map(|n| n as u64)
        .map_err(unavailable("Failed to count records"))
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn upsert(&self, records: Vec<EmbeddingRecord>) -> AppResult<usize> {
        if self.mode == OpenMode::ReadOnly {
            return Err(AppError::StoreUnavailable(
                "Vector store is open read-only".to_string(),
            ));
        }
        if records.is_empty() {
            return Ok(0);
        }

        self.with_conn(move |conn| {
            let tx = conn
                .transaction()
                .map_err(unavailable("Failed to begin transaction"))?;

            let dimensions = match read_dimensions(&tx)? {
                Some(dimensions) => dimensions,
                None => {
                    let dimensions = records[0].vector.len();
                    tx.execute(
                        "INSERT INTO store_meta (key, value) VALUES ('dimensions', ?1)",
                        params![dimensions.to_string()],
                    )
                    .map_err(unavailable("Failed to write store metadata"))?;
                    dimensions
                }
            };

            let mut inserted = 0;
            {
                let mut stmt = tx
                    .prepare(
                        "INSERT OR IGNORE INTO records (id, text, embedding, metadata)
                         VALUES (?1, ?2, ?3, ?4)",
                    )
                    .map_err(unavailable("Failed to prepare insert"))?;

                for record in &records {
                    if record.vector.len() != dimensions {
                        return Err(AppError::InvalidArgument(format!(
                            "Record {} has {} dimensions, store expects {}",
                            record.id,
                            record.vector.len(),
                            dimensions
                        )));
                    }

                    let metadata = serde_json::to_string(&record.metadata)?;
                    inserted += stmt
                        .execute(params![
                            record.id,
                            record.text,
                            embedding_to_bytes(&record.vector),
                            metadata,
                        ])
                        .map_err(unavailable("Failed to insert record"))?;
                }
            }

            tx.commit().map_err(unavailable("Failed to commit"))?;
            Ok(inserted)
        })
        .await
    }

    async fn query(&self, vector: Vec<f32>, k: usize) -> AppResult<Vec<SimilarityResult>> {
        let metric = self.metric;

        self.with_conn(move |conn| {
            let dimensions = match read_dimensions(conn)? {
                Some(dimensions) => dimensions,
                None => return Ok(Vec::new()),
            };
            if vector.len() != dimensions {
                return Err(AppError::InvalidArgument(format!(
                    "Query vector has {} dimensions, store expects {}",
                    vector.len(),
                    dimensions
                )));
            }
            if k == 0 {
                return Ok(Vec::new());
            }

            let mut stmt = conn
                .prepare("SELECT text, embedding, metadata FROM records ORDER BY seq")
                .map_err(unavailable("Failed to prepare query"))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Vec<u8>>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })
                .map_err(unavailable("Failed to query records"))?;

            let mut results = Vec::new();
            for row in rows {
                let (text, embedding, metadata) = row.map_err(unavailable("Failed to read record"))?;
                let embedding = bytes_to_embedding(&embedding)?;
                let metadata: RecordMetadata = serde_json::from_str(&metadata).map_err(|e| {
                    AppError::StoreUnavailable(format!("Corrupted record metadata: {}", e))
                })?;

                results.push(SimilarityResult {
                    score: score(metric, &vector, &embedding),
                    text,
                    metadata,
                });
            }

            // Stable sort keeps insertion order among equal scores; NaN ranks last
            results.sort_by(|a, b| rank_key(b.score).total_cmp(&rank_key(a.score)));
            results.truncate(k);

            tracing::debug!("Retrieved {} records (requested top-{})", results.len(), k);

            Ok(results)
        })
        .await
    }

    async fn count(&self) -> AppResult<u64> {
        self.with_conn(|conn| count_records(conn)).await
    }

    async fn stats(&self) -> AppResult<StoreStats> {
        let collection = self.collection.clone();
        let path = self.path.clone();
        let metric = self.metric;

        self.with_conn(move |conn| {
            Ok(StoreStats {
                collection,
                path,
                records: count_records(conn)?,
                dimensions: read_dimensions(conn)?,
                metric,
            })
        })
        .await
    }

    async fn close(&self) -> AppResult<()> {
        let conn = Arc::clone(&self.conn);
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| AppError::StoreUnavailable("Store lock poisoned".to_string()))?;

            if let Some(conn) = guard.take() {
                conn.close().map_err(|(_, e)| {
                    AppError::StoreUnavailable(format!("Failed to close vector store: {}", e))
                })?;
                tracing::debug!("Closed vector store at {:?}", path);
            }
            Ok(())
        })
        .await
        .map_err(|e| AppError::StoreUnavailable(format!("Store task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(id: &str, text: &str, vector: Vec<f32>) -> EmbeddingRecord {
        EmbeddingRecord {
            id: id.to_string(),
            text: text.to_string(),
            vector,
            metadata: RecordMetadata {
                source: format!("/docs/{}.txt", id),
                filename: format!("{}.txt", id),
                chunk_index: 0,
                total_chunks: 1,
                ingested_at: "2024-01-01T00:00:00Z".to_string(),
            },
        }
    }

    fn open_rw(dir: &Path) -> SqliteVectorStore {
        SqliteVectorStore::open(dir, "test", DistanceMetric::Cosine, OpenMode::ReadWrite).unwrap()
    }

    #[tokio::test]
    async fn test_nan_scores_rank_last() {
        let temp = TempDir::new().unwrap();
        let store = open_rw(temp.path());

        store
            .upsert(vec![
                record("nan", "broken", vec![f32::NAN, 0.0, 0.0]),
                record("far", "far", vec![0.0, 1.0, 0.0]),
                record("near", "near", vec![1.0, 0.1, 0.0]),
            ])
            .await
            .unwrap();

        let results = store.query(vec![1.0, 0.0, 0.0], 3).await.unwrap();
        let texts: Vec<_> = results.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["near", "far", "broken"]);
        assert!(results[2].score.is_nan());
    }

    #[tokio::test]
    async fn test_upsert_and_query() {
        let temp = TempDir::new().unwrap();
        let store = open_rw(temp.path());

        let inserted = store
            .upsert(vec![
                record("a", "alpha", vec![1.0, 0.0, 0.0]),
                record("b", "beta", vec![0.0, 1.0, 0.0]),
                record("c", "gamma", vec![0.7, 0.7, 0.0]),
            ])
            .await
            .unwrap();
        assert_eq!(inserted, 3);

        let results = store.query(vec![1.0, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, "alpha");
        assert_eq!(results[1].text, "gamma");
        assert!(results[0].score >= results[1].score);
        assert_eq!(results[0].metadata.filename, "a.txt");
    }

    #[tokio::test]
    async fn test_repeated_ids_ignored() {
        let temp = TempDir::new().unwrap();
        let store = open_rw(temp.path());

        store.upsert(vec![record("a", "alpha", vec![1.0, 0.0])]).await.unwrap();
        let inserted = store
            .upsert(vec![
                record("a", "alpha again", vec![1.0, 0.0]),
                record("b", "beta", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        assert_eq!(inserted, 1);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_ties_in_insertion_order() {
        let temp = TempDir::new().unwrap();
        let store = open_rw(temp.path());

        store
            .upsert(vec![
                record("z", "first", vec![1.0, 0.0]),
                record("a", "second", vec![2.0, 0.0]),
                record("m", "third", vec![3.0, 0.0]),
            ])
            .await
            .unwrap();

        let results = store.query(vec![1.0, 0.0], 3).await.unwrap();
        let texts: Vec<_> = results.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let temp = TempDir::new().unwrap();
        let store = open_rw(temp.path());

        store.upsert(vec![record("a", "alpha", vec![1.0, 0.0])]).await.unwrap();

        let write = store.upsert(vec![record("b", "beta", vec![1.0, 0.0, 0.0])]).await;
        assert!(matches!(write, Err(AppError::InvalidArgument(_))));

        let query = store.query(vec![1.0, 0.0, 0.0], 1).await;
        assert!(matches!(query, Err(AppError::InvalidArgument(_))));

        // The rejected batch left nothing behind
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_store_and_zero_k() {
        let temp = TempDir::new().unwrap();
        let store = open_rw(temp.path());

        assert!(store.query(vec![1.0, 0.0], 5).await.unwrap().is_empty());

        store.upsert(vec![record("a", "alpha", vec![1.0, 0.0])]).await.unwrap();
        assert!(store.query(vec![1.0, 0.0], 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_l2_metric() {
        let temp = TempDir::new().unwrap();
        let store =
            SqliteVectorStore::open(temp.path(), "l2", DistanceMetric::L2, OpenMode::ReadWrite)
                .unwrap();

        store
            .upsert(vec![
                record("far", "far", vec![3.0, 4.0]),
                record("near", "near", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let results = store.query(vec![0.0, 0.0], 2).await.unwrap();
        assert_eq!(results[0].text, "near");
        assert!((results[0].score - 0.5).abs() < 1e-6);
        assert!((results[1].score - 1.0 / 6.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_persists_across_reopen_read_only() {
        let temp = TempDir::new().unwrap();
        {
            let store = open_rw(temp.path());
            store.upsert(vec![record("a", "alpha", vec![1.0, 0.0])]).await.unwrap();
            store.close().await.unwrap();
        }

        let store =
            SqliteVectorStore::open(temp.path(), "test", DistanceMetric::L2, OpenMode::ReadOnly)
                .unwrap();
        // Metric recorded at creation wins
        assert_eq!(store.metric(), DistanceMetric::Cosine);
        assert_eq!(store.count().await.unwrap(), 1);

        let write = store.upsert(vec![record("b", "beta", vec![0.0, 1.0])]).await;
        assert!(matches!(write, Err(AppError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn test_read_only_initialises_missing_collection() {
        let temp = TempDir::new().unwrap();
        let store = SqliteVectorStore::open(
            temp.path(),
            "fresh",
            DistanceMetric::Cosine,
            OpenMode::ReadOnly,
        )
        .unwrap();

        assert!(store.path().exists());
        assert!(store.query(vec![1.0], 2).await.unwrap().is_empty());
    }

    #[test]
    fn test_read_only_missing_directory() {
        let result = SqliteVectorStore::open(
            Path::new("/nonexistent/docvec-store"),
            "test",
            DistanceMetric::Cosine,
            OpenMode::ReadOnly,
        );
        assert!(matches!(result, Err(AppError::StoreUnavailable(_))));
    }

    #[test]
    fn test_corrupted_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            SqliteVectorStore::collection_path(temp.path(), "broken"),
            b"this is definitely not a sqlite database, just some bytes padded out to look big enough",
        )
        .unwrap();

        let result = SqliteVectorStore::open(
            temp.path(),
            "broken",
            DistanceMetric::Cosine,
            OpenMode::ReadOnly,
        );
        assert!(matches!(result, Err(AppError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn test_closed_store_unavailable() {
        let temp = TempDir::new().unwrap();
        let store = open_rw(temp.path());

        store.close().await.unwrap();
        store.close().await.unwrap();
        assert!(matches!(store.count().await, Err(AppError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn test_stats() {
        let temp = TempDir::new().unwrap();
        let store = open_rw(temp.path());

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.records, 0);
        assert_eq!(stats.dimensions, None);

        store.upsert(vec![record("a", "alpha", vec![1.0, 0.0])]).await.unwrap();
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.records, 1);
        assert_eq!(stats.dimensions, Some(2));
        assert_eq!(stats.collection, "test");
    }
}
