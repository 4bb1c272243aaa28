//! Offline ingestion: load, chunk, embed, store.

use docvec_core::{AppError, AppResult};
use std::path::Path;
use std::time::Instant;
use uuid::Uuid;

use crate::components::Components;
use crate::loader::LoadEvent;
use crate::progress::ProgressReporter;
use crate::types::{Document, EmbeddingRecord, IngestStats, RecordMetadata};

/// Ingest every recognised document under `input_dir`.
///
/// Failures on individual files are logged and counted. An unreadable
/// `input_dir` or an unavailable store aborts the run.
pub async fn ingest_directory(
    components: &Components,
    input_dir: &Path,
    progress: &ProgressReporter,
) -> AppResult<IngestStats> {
    let start = Instant::now();
    let mut stats = IngestStats::default();

    tracing::info!("Starting ingestion from {:?}", input_dir);

    for event in components.loader.load(input_dir)? {
        stats.total_files += 1;

        match event {
            Ok(LoadEvent::Skipped { path, reason }) => {
                stats.skipped += 1;
                tracing::info!("Skipped {:?}: {}", path, reason);
            }
            Ok(LoadEvent::Loaded(document)) => {
                let source_path = document.source.display().to_string();
                progress.discover(stats.total_files as u64, &source_path);
                stats.bytes += document.metadata.size_bytes;

                if document.text.trim().is_empty() {
                    stats.failed += 1;
                    tracing::warn!("No content extracted from {}", source_path);
                    continue;
                }

                match ingest_document(components, &document, progress).await {
                    Ok(written) => {
                        stats.successful += 1;
                        stats.chunks += written as u32;
                        progress.store(written as u64, stats.chunks as u64);
                    }
                    Err(e @ AppError::StoreUnavailable(_)) => {
                        stats.failed += 1;
                        tracing::error!(
                            "Store unavailable while ingesting {}, aborting after {} of {} files: {}",
                            source_path,
                            stats.successful,
                            stats.total_files,
                            e
                        );
                        return Err(e);
                    }
                    Err(e) => {
                        stats.failed += 1;
                        tracing::warn!("Failed to ingest {}: {}", source_path, e);
                    }
                }
            }
            Err(e) => {
                stats.failed += 1;
                tracing::warn!("Failed to load file: {}", e);
            }
        }
    }

    stats.duration_secs = start.elapsed().as_secs_f64();

    let summary = format!(
        "{} files: {} ingested, {} failed, {} skipped; {} chunks in {:.2}s",
        stats.total_files,
        stats.successful,
        stats.failed,
        stats.skipped,
        stats.chunks,
        stats.duration_secs
    );
    tracing::info!("Ingestion completed: {}", summary);
    progress.complete(stats.successful as u64, stats.total_files as u64, &summary);

    Ok(stats)
}

/// Chunk, embed and store one document; returns the number of records written.
async fn ingest_document(
    components: &Components,
    document: &Document,
    progress: &ProgressReporter,
) -> AppResult<usize> {
    let chunks = components.chunker.split(&document.text);
    if chunks.is_empty() {
        tracing::debug!("No text in {:?}", document.source);
        return Ok(0);
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = components.embedder.embed_batch(&texts).await?;
    if vectors.len() != chunks.len() {
        return Err(AppError::permanent(format!(
            "Embedder returned {} vectors for {} chunks",
            vectors.len(),
            chunks.len()
        )));
    }
    progress.embed(
        chunks.len() as u64,
        &document.metadata.filename,
        components.embedder.model_name(),
    );

    let source = document.source.display().to_string();
    let ingested_at = document.metadata.ingested_at.to_rfc3339();
    let total_chunks = chunks.len();

    let records = chunks
        .into_iter()
        .zip(vectors)
        .map(|(chunk, vector)| EmbeddingRecord {
            id: Uuid::new_v4().to_string(),
            text: chunk.text,
            vector,
            metadata: RecordMetadata {
                source: source.clone(),
                filename: document.metadata.filename.clone(),
                chunk_index: chunk.index,
                total_chunks,
                ingested_at: ingested_at.clone(),
            },
        })
        .collect();

    components.store.upsert(records).await
}
