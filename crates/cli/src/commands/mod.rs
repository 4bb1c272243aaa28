//! Command handlers for the docvec CLI.

pub mod ingest;
pub mod serve;
pub mod stats;

pub use ingest::IngestCommand;
pub use serve::ServeCommand;
pub use stats::StatsCommand;
