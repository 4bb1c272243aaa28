//! Shared data types for ingestion and retrieval.

use chrono::{DateTime, Utc};
use docvec_core::config::{DistanceMetric, ExtractorKind};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A loaded source file and its extracted text.
#[derive(Debug, Clone)]
pub struct Document {
    /// Full path of the source file
    pub source: PathBuf,

    /// Extracted text
    pub text: String,

    pub metadata: DocumentMetadata,
}

/// Source metadata captured at load time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// File name without directories
    pub filename: String,

    /// When the file was read
    pub ingested_at: DateTime<Utc>,

    /// Extractor that produced the text
    pub extractor: ExtractorKind,

    /// Size of the file on disk
    pub size_bytes: u64,
}

/// A segment of a document's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Ordinal within the document, starting at 0
    pub index: usize,

    /// Chunk text, including the overlap with the previous chunk
    pub text: String,

    /// Byte offset of the chunk start in the source text
    pub start: usize,

    /// Byte offset one past the chunk end in the source text
    pub end: usize,

    /// Leading bytes shared with the previous chunk
    pub overlap: usize,
}

impl Chunk {
    /// The part of the chunk not already covered by the previous one.
    pub fn fresh_text(&self) -> &str {
        &self.text[self.overlap..]
    }
}

/// Metadata stored with every embedding record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Full path of the source file
    pub source: String,

    pub filename: String,

    pub chunk_index: usize,

    pub total_chunks: usize,

    /// RFC 3339 timestamp
    pub ingested_at: String,
}

/// A chunk with its vector, ready to be stored.
#[derive(Debug, Clone)]
pub struct EmbeddingRecord {
    pub id: String,
    pub text: String,
    pub vector: Vec<f32>,
    pub metadata: RecordMetadata,
}

/// One ranked retrieval hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub text: String,

    /// Higher is more similar
    pub score: f32,

    pub metadata: RecordMetadata,
}

/// Summary of an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestStats {
    /// Files considered (loaded, skipped or failed)
    pub total_files: u32,

    /// Files whose chunks were all stored
    pub successful: u32,

    /// Files that errored at any stage
    pub failed: u32,

    /// Files skipped by extension policy or binary detection
    pub skipped: u32,

    /// Records written to the store
    pub chunks: u32,

    /// Bytes of source files read
    pub bytes: u64,

    pub duration_secs: f64,
}

/// Vector store statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub collection: String,

    pub path: PathBuf,

    pub records: u64,

    /// `None` until the first record is written
    pub dimensions: Option<usize>,

    pub metric: DistanceMetric,
}
