//! The similarity search operation exposed to RPC clients.

use docvec_core::{AppError, AppResult};
use std::sync::Arc;

use crate::embeddings::EmbeddingProvider;
use crate::store::VectorStore;
use crate::types::SimilarityResult;

/// Results returned when the caller does not pass `k`.
pub const DEFAULT_K: usize = 2;

/// Validated arguments of `get_similar_chunks`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimilarityQuery {
    pub query: String,
    pub k: usize,
}

impl SimilarityQuery {
    pub fn new(query: impl Into<String>, k: usize) -> AppResult<Self> {
        let query = query.into();
        if query.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "query must be a non-empty string".to_string(),
            ));
        }
        if k == 0 {
            return Err(AppError::InvalidArgument(
                "k must be a positive integer".to_string(),
            ));
        }
        Ok(Self { query, k })
    }

    /// Validate a query whose `k` came from a client; `None` means [`DEFAULT_K`].
    pub fn from_parts(query: impl Into<String>, k: Option<i64>) -> AppResult<Self> {
        let k = match k {
            None => DEFAULT_K,
            Some(k) => positive_k(k)?,
        };
        Self::new(query, k)
    }
}

fn positive_k(k: i64) -> AppResult<usize> {
    if k <= 0 {
        return Err(AppError::InvalidArgument(format!(
            "k must be a positive integer, got {}",
            k
        )));
    }

    usize::try_from(k)
        .map_err(|_| AppError::InvalidArgument(format!("k is too large: {}", k)))
}

/// Embeds a query and ranks stored chunks against it.
#[derive(Debug, Clone)]
pub struct RetrievalTool {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
}

impl RetrievalTool {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Return up to `k` chunks most similar to `query`, best first.
    pub async fn get_similar_chunks(&self, query: &str, k: usize) -> AppResult<Vec<SimilarityResult>> {
        let request = SimilarityQuery::new(query, k)?;
        self.search(&request).await
    }

    #[tracing::instrument(skip(self, request), fields(k = request.k, query_len = request.query.len()))]
    pub async fn search(&self, request: &SimilarityQuery) -> AppResult<Vec<SimilarityResult>> {
        let vector = self.embedder.embed_query(&request.query).await?;
        let results = self.store.query(vector, request.k).await?;

        tracing::debug!("Returning {} results", results.len());
        Ok(results)
    }
}
