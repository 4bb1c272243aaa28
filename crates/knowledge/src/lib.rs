//! Document ingestion and similarity search.
//!
//! Loader → chunker → embedder → vector store for ingestion, and
//! embedder → vector store for retrieval. The embedder and store sit behind
//! the [`EmbeddingProvider`] and [`VectorStore`] traits.

pub mod chunker;
pub mod components;
pub mod embeddings;
pub mod ingest;
pub mod loader;
pub mod progress;
pub mod retrieval;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

pub use chunker::{Chunker, RecursiveChunker};
pub use components::Components;
pub use embeddings::{create_provider, EmbeddingProvider};
pub use ingest::ingest_directory;
pub use loader::{DocumentLoader, LoadEvent};
pub use progress::{ProgressEvent, ProgressPhase, ProgressReporter};
pub use retrieval::{RetrievalTool, SimilarityQuery, DEFAULT_K};
pub use store::{OpenMode, SqliteVectorStore, VectorStore};
pub use types::{
    Chunk, Document, EmbeddingRecord, IngestStats, RecordMetadata, SimilarityResult, StoreStats,
};

use docvec_core::{AppConfig, AppResult};

/// Statistics for the configured collection.
///
/// Opens the store read-only, so a missing collection reads as empty.
pub async fn collection_stats(config: &AppConfig) -> AppResult<StoreStats> {
    let store = SqliteVectorStore::open(
        config.require_persist_dir()?,
        &config.collection,
        config.store.metric,
        OpenMode::ReadOnly,
    )?;

    let stats = store.stats().await?;
    store.close().await?;

    tracing::info!(
        "Collection '{}': {} records",
        stats.collection,
        stats.records
    );

    Ok(stats)
}
