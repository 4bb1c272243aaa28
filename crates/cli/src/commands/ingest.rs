//! Ingest command handler.

use clap::Args;
use docvec_core::{config::AppConfig, AppResult};
use docvec_knowledge::{ingest_directory, Components, ProgressEvent, ProgressReporter};
use std::sync::Arc;

/// Load, chunk, embed and store every document under the input directory
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Output the run summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Suppress per-file progress lines
    #[arg(short, long)]
    pub quiet: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command");

        let components = Components::for_ingest(config)?;
        let input_dir = config.require_input_dir()?;

        let progress = if self.quiet {
            ProgressReporter::noop()
        } else {
            ProgressReporter::new(Arc::new(|event: ProgressEvent| {
                eprintln!("{}", event);
            }))
        };

        let result = ingest_directory(&components, input_dir, &progress).await;
        components.store.close().await?;
        let stats = result?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            println!(
                "Ingested {}/{} files ({} failed, {} skipped): {} chunks, {} bytes in {:.2}s",
                stats.successful,
                stats.total_files,
                stats.failed,
                stats.skipped,
                stats.chunks,
                stats.bytes,
                stats.duration_secs
            );
        }

        Ok(())
    }
}
