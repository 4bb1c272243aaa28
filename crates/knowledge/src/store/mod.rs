//! Vector store abstraction.
//!
//! The store persists embedding records and answers exact nearest-neighbour
//! queries by scanning every record.

pub mod sqlite;

pub use sqlite::{OpenMode, SqliteVectorStore};

use async_trait::async_trait;
use docvec_core::config::DistanceMetric;
use docvec_core::{AppError, AppResult};

use crate::types::{EmbeddingRecord, SimilarityResult, StoreStats};

/// Trait for vector store backends.
///
/// Implementations must keep vector dimensionality constant for the life of
/// a collection and return query results by non-increasing score, ties in
/// insertion order.
#[async_trait]
pub trait VectorStore: Send + Sync + std::fmt::Debug {
    /// Add records in one transaction; ids already present are ignored.
    ///
    /// Returns the number of records actually inserted.
    async fn upsert(&self, records: Vec<EmbeddingRecord>) -> AppResult<usize>;

    /// Return up to `k` records most similar to `vector`.
    async fn query(&self, vector: Vec<f32>, k: usize) -> AppResult<Vec<SimilarityResult>>;

    /// Number of stored records.
    async fn count(&self) -> AppResult<u64>;

    async fn stats(&self) -> AppResult<StoreStats>;

    /// Release the underlying handle. Later calls fail with `StoreUnavailable`.
    async fn close(&self) -> AppResult<()>;
}

/// Similarity score under `metric`; higher is more similar.
pub fn score(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        DistanceMetric::Cosine => cosine_similarity(a, b),
        DistanceMetric::L2 => 1.0 / (1.0 + l2_distance(a, b)),
    }
}

/// Calculate cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Encode a vector as little-endian f32 bytes.
pub(crate) fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

pub(crate) fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::StoreUnavailable(
            "Corrupted record: invalid embedding length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
