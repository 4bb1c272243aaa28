//! Wiring of loader, chunker, embedder and store from configuration.

use docvec_core::{AppConfig, AppResult};
use std::sync::Arc;

use crate::chunker::{Chunker, RecursiveChunker};
use crate::embeddings::{create_provider, EmbeddingProvider};
use crate::loader::DocumentLoader;
use crate::retrieval::RetrievalTool;
use crate::store::{OpenMode, SqliteVectorStore, VectorStore};

/// The pipeline's collaborators, built once at startup and passed explicitly.
#[derive(Debug, Clone)]
pub struct Components {
    pub loader: DocumentLoader,
    pub chunker: Arc<dyn Chunker>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub store: Arc<dyn VectorStore>,
}

impl Components {
    /// Assemble components from explicit parts.
    pub fn new(
        loader: DocumentLoader,
        chunker: Arc<dyn Chunker>,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            loader,
            chunker,
            embedder,
            store,
        }
    }

    /// Components for an ingestion run; the store is opened read-write.
    pub fn for_ingest(config: &AppConfig) -> AppResult<Self> {
        config.validate_for_ingest()?;
        Self::build(config, OpenMode::ReadWrite)
    }

    /// Components for the server; the store is opened read-only.
    pub fn for_serve(config: &AppConfig) -> AppResult<Self> {
        config.validate_for_serve()?;
        Self::build(config, OpenMode::ReadOnly)
    }

    fn build(config: &AppConfig, mode: OpenMode) -> AppResult<Self> {
        let chunker = RecursiveChunker::from_config(&config.chunking)?;
        let embedder = create_provider(&config.embedding, config.api_key.as_deref())?;
        let store = SqliteVectorStore::open(
            config.require_persist_dir()?,
            &config.collection,
            config.store.metric,
            mode,
        )?;

        tracing::debug!(
            "Built components: provider={}, model={}, dimensions={}, store={:?}",
            embedder.provider_name(),
            embedder.model_name(),
            embedder.dimensions(),
            store.path()
        );

        Ok(Self::new(
            DocumentLoader::new(config.ingest.clone()),
            Arc::new(chunker),
            embedder,
            Arc::new(store),
        ))
    }

    pub fn retrieval_tool(&self) -> RetrievalTool {
        RetrievalTool::new(Arc::clone(&self.embedder), Arc::clone(&self.store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docvec_core::AppError;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn hash_config(persist_dir: Option<PathBuf>) -> AppConfig {
        let mut config = AppConfig::default();
        config.embedding.provider = "hash".to_string();
        config.persist_dir = persist_dir;
        config
    }

    #[test]
    fn test_for_serve_needs_persist_dir() {
        let err = Components::for_serve(&hash_config(None)).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains("CHROMA_PERSIST_DIRECTORY"));
    }

    #[test]
    fn test_for_ingest_needs_input_dir() {
        let temp = TempDir::new().unwrap();
        let err = Components::for_ingest(&hash_config(Some(temp.path().to_path_buf())))
            .unwrap_err();
        assert!(err.to_string().contains("INPUT_DIR"));
    }

    #[test]
    fn test_google_needs_api_key() {
        let temp = TempDir::new().unwrap();
        let mut config = hash_config(Some(temp.path().to_path_buf()));
        config.embedding.provider = "google".to_string();

        let err = Components::for_serve(&config).unwrap_err();
        assert!(err.to_string().contains("GOOGLE_API_KEY"));
    }

    #[tokio::test]
    async fn test_for_serve_opens_empty_collection() {
        let temp = TempDir::new().unwrap();
        let components = Components::for_serve(&hash_config(Some(temp.path().to_path_buf())))
            .unwrap();

        assert_eq!(components.store.count().await.unwrap(), 0);
        assert!(temp.path().join("langchain.sqlite3").exists());
    }
}
