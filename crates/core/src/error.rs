//! Error types for docvec.
//!
//! A single error enum covers the whole taxonomy: configuration, per-file I/O,
//! the embedding service, the vector store, caller input validation and
//! serialization.

use std::path::PathBuf;
use thiserror::Error;

/// Whether a failed embedding call is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingFailure {
    /// Network failure, timeout, rate limiting or a server-side error.
    Transient,
    /// Bad key, exhausted quota, rejected request or malformed response.
    Permanent,
}

impl std::fmt::Display for EmbeddingFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transient => f.write_str("transient"),
            Self::Permanent => f.write_str("permanent"),
        }
    }
}

/// Unified error type for docvec.
///
/// All fallible functions return `Result<T, AppError>`. Library code never
/// panics on bad input; errors are represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or invalid configuration. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem errors, tagged with the path that failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Embedding service failures.
    #[error("Embedding service error ({kind}): {message}")]
    Embedding {
        kind: EmbeddingFailure,
        message: String,
    },

    /// The vector store could not be opened, read or written.
    #[error("Vector store unavailable: {0}")]
    StoreUnavailable(String),

    /// Caller-supplied arguments failed validation.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Build an I/O error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.into(),
            source,
        }
    }

    /// Build a transient embedding error.
    pub fn transient(message: impl Into<String>) -> Self {
        AppError::Embedding {
            kind: EmbeddingFailure::Transient,
            message: message.into(),
        }
    }

    /// Build a permanent embedding error.
    pub fn permanent(message: impl Into<String>) -> Self {
        AppError::Embedding {
            kind: EmbeddingFailure::Permanent,
            message: message.into(),
        }
    }

    /// True for embedding errors that a retry may fix.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::Embedding {
                kind: EmbeddingFailure::Transient,
                ..
            }
        )
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
