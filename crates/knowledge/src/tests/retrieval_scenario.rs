//! End-to-end ingestion followed by retrieval through the serving components.

use crate::components::Components;
use crate::ingest::ingest_directory;
use crate::progress::ProgressReporter;
use docvec_core::{AppConfig, AppError};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

#[cfg(test)]
mod tests {
    use super::*;

    const OWNERSHIP: &str = "Rust ownership guarantees memory safety without garbage collection.";
    const TOKIO: &str = " Tokio provides asynchronous networking primitives for servers.";
    const CHROMA: &str = " Chroma persists embeddings inside local directories.";

    fn config(input_dir: &Path, persist_dir: &Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.input_dir = Some(input_dir.to_path_buf());
        config.persist_dir = Some(persist_dir.to_path_buf());
        config.embedding.provider = "hash".to_string();
        config.chunking.chunk_size = 150;
        config.chunking.chunk_overlap = 30;
        config
    }

    /// Ingest one three-sentence document and return (input, store) dirs.
    async fn ingest_fixture() -> (TempDir, TempDir, AppConfig) {
        let input = TempDir::new().unwrap();
        let persist = TempDir::new().unwrap();
        fs::write(
            input.path().join("rust.txt"),
            format!("{}{}{}", OWNERSHIP, TOKIO, CHROMA),
        )
        .unwrap();

        let config = config(input.path(), persist.path());
        let components = Components::for_ingest(&config).unwrap();
        let stats = ingest_directory(&components, input.path(), &ProgressReporter::noop())
            .await
            .unwrap();
        components.store.close().await.unwrap();

        assert_eq!(stats.successful, 1);
        assert_eq!(stats.chunks, 2);

        (input, persist, config)
    }

    #[tokio::test]
    async fn test_query_returns_matching_chunk() {
        let (_input, _persist, config) = ingest_fixture().await;

        let components = Components::for_serve(&config).unwrap();
        let tool = components.retrieval_tool();

        let results = tool.get_similar_chunks(OWNERSHIP, 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].text.contains(OWNERSHIP));
        assert_eq!(results[0].metadata.filename, "rust.txt");
        assert_eq!(results[0].metadata.chunk_index, 0);
        assert_eq!(results[0].metadata.total_chunks, 2);
        assert!(results[0].metadata.source.ends_with("rust.txt"));
    }

    #[tokio::test]
    async fn test_results_ordered_and_bounded() {
        let (_input, _persist, config) = ingest_fixture().await;

        let components = Components::for_serve(&config).unwrap();
        let tool = components.retrieval_tool();

        let results = tool.get_similar_chunks("local embeddings directories", 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].score >= results[1].score);
        assert!(results[0].text.contains("Chroma"));
    }

    #[tokio::test]
    async fn test_invalid_arguments_rejected() {
        let (_input, _persist, config) = ingest_fixture().await;

        let tool = Components::for_serve(&config).unwrap().retrieval_tool();

        assert!(matches!(
            tool.get_similar_chunks("memory", 0).await,
            Err(AppError::InvalidArgument(_))
        ));
        assert!(matches!(
            tool.get_similar_chunks("  ", 2).await,
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_store_returns_nothing() {
        let input = TempDir::new().unwrap();
        let persist = TempDir::new().unwrap();

        let components = Components::for_serve(&config(input.path(), persist.path())).unwrap();
        let results = components
            .retrieval_tool()
            .get_similar_chunks("anything at all", 2)
            .await
            .unwrap();

        assert!(results.is_empty());
    }
}
