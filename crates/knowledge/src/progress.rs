//! Progress reporting for ingestion runs.

use std::fmt;
use std::sync::Arc;

/// Stage of an ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    /// A document was loaded and is about to be chunked
    Discover,
    /// A document's chunks were embedded
    Embed,
    /// A document's records were written
    Store,
    /// The run finished
    Complete,
}

impl ProgressPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressPhase::Discover => "discover",
            ProgressPhase::Embed => "embed",
            ProgressPhase::Store => "store",
            ProgressPhase::Complete => "complete",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub phase: ProgressPhase,

    /// Files seen, chunks embedded or records written, depending on phase
    pub current: u64,

    /// Only known for `Complete`
    pub total: Option<u64>,

    pub message: String,
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.total {
            Some(total) => write!(f, "[{}] {}/{}", self.phase.as_str(), self.current, total)?,
            None => write!(f, "[{}] {}", self.phase.as_str(), self.current)?,
        }
        write!(f, " - {}", self.message)
    }
}

pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Forwards ingestion events to an optional callback.
#[derive(Clone, Default)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
}

impl ProgressReporter {
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    /// A reporter that drops every event.
    pub fn noop() -> Self {
        Self::default()
    }

    fn emit(&self, phase: ProgressPhase, current: u64, total: Option<u64>, message: String) {
        let Some(callback) = &self.callback else {
            return;
        };

        tracing::trace!(phase = phase.as_str(), current, ?total, detail = %message, "Progress");
        callback(ProgressEvent {
            phase,
            current,
            total,
            message,
        });
    }

    pub fn discover(&self, current: u64, path: &str) {
        self.emit(ProgressPhase::Discover, current, None, path.to_string());
    }

    pub fn embed(&self, chunks: u64, file: &str, model: &str) {
        self.emit(
            ProgressPhase::Embed,
            chunks,
            None,
            format!("{} (model={})", file, model),
        );
    }

    /// `total` is the running record count for the run.
    pub fn store(&self, inserted: u64, total: u64) {
        self.emit(
            ProgressPhase::Store,
            inserted,
            None,
            format!("{} records written so far", total),
        );
    }

    pub fn complete(&self, successful: u64, total: u64, summary: &str) {
        self.emit(ProgressPhase::Complete, successful, Some(total), summary.to_string());
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("enabled", &self.callback.is_some())
            .finish()
    }
}
