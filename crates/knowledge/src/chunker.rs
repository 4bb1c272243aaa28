//! Text chunking with configurable size and overlap.
//!
//! Sizes are measured in characters. Within each window the chunker prefers
//! to break after a paragraph break, then a line break, then a sentence end,
//! then a space, but never before the middle of the window. If none of those
//! occurs it cuts at the hard limit.

use docvec_core::config::ChunkingConfig;
use docvec_core::{AppError, AppResult};

use crate::types::Chunk;

/// Break points in priority order.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Splits raw text into ordered, overlapping chunks.
pub trait Chunker: Send + Sync + std::fmt::Debug {
    fn split(&self, text: &str) -> Vec<Chunk>;
}

/// Separator-aware character chunker.
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a chunker; `chunk_overlap` must be smaller than `chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> AppResult<Self> {
        if chunk_size == 0 {
            return Err(AppError::Config(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(AppError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> AppResult<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Pick the end of the chunk starting at char `start`.
    ///
    /// `offsets` maps char positions to byte offsets (with a trailing entry
    /// for the text length). The result is in `(lower, hard_end]`.
    fn find_break(
        &self,
        text: &str,
        offsets: &[usize],
        start: usize,
        lower: usize,
        hard_end: usize,
    ) -> usize {
        let window = &text[offsets[start]..offsets[hard_end]];

        for separator in SEPARATORS {
            if let Some(pos) = window.rfind(separator) {
                let break_byte = offsets[start] + pos + separator.len();
                if break_byte > offsets[lower] {
                    return offsets.binary_search(&break_byte).unwrap_or_else(|i| i);
                }
            }
        }

        hard_end
    }

    /// Move `from` forward to the start of the next word inside `[from, end)`.
    fn snap_to_word(text: &str, offsets: &[usize], from: usize, end: usize) -> usize {
        let at_word_start = from == 0
            || text[..offsets[from]]
                .chars()
                .next_back()
                .map(char::is_whitespace)
                .unwrap_or(true);
        if at_word_start {
            return from;
        }

        text[offsets[from]..offsets[end]]
            .chars()
            .position(char::is_whitespace)
            .map(|i| from + i + 1)
            .unwrap_or(from)
    }
}

impl Chunker for RecursiveChunker {
    fn split(&self, text: &str) -> Vec<Chunk> {
        let offsets: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let n = offsets.len() - 1;

        if n == 0 {
            return vec![];
        }

        if n <= self.chunk_size {
            return vec![Chunk {
                index: 0,
                text: text.to_string(),
                start: 0,
                end: text.len(),
                overlap: 0,
            }];
        }

        let mut chunks = Vec::new();
        let mut start = 0;
        let mut prev_end = 0;

        loop {
            let hard_end = (start + self.chunk_size).min(n);
            let end = if hard_end == n {
                n
            } else {
                let lower = (start + self.chunk_size / 2).max(prev_end);
                self.find_break(text, &offsets, start, lower, hard_end)
            };

            let (start_byte, end_byte) = (offsets[start], offsets[end]);
            chunks.push(Chunk {
                index: chunks.len(),
                text: text[start_byte..end_byte].to_string(),
                start: start_byte,
                end: end_byte,
                overlap: offsets[prev_end.max(start)] - start_byte,
            });

            if end == n {
                break;
            }

            let next = end.saturating_sub(self.chunk_overlap).max(start + 1);
            start = Self::snap_to_word(text, &offsets, next, end);
            prev_end = end;
        }

        tracing::debug!(
            "Chunked text into {} chunks (size: {}, overlap: {})",
            chunks.len(),
            self.chunk_size,
            self.chunk_overlap
        );

        chunks
    }
}

/// Rebuild the source text from its chunks by dropping each chunk's overlap.
pub fn reconstruct(chunks: &[Chunk]) -> String {
    chunks.iter().map(Chunk::fresh_text).collect()
}
