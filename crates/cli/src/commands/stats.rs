//! Stats command handler.

use clap::Args;
use docvec_core::{config::AppConfig, AppResult};

/// Show record count and settings of the configured collection
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let stats = docvec_knowledge::collection_stats(config).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            println!("Collection: {}", stats.collection);
            println!("Path:       {}", stats.path.display());
            println!("Records:    {}", stats.records);
            match stats.dimensions {
                Some(dimensions) => println!("Dimensions: {}", dimensions),
                None => println!("Dimensions: (empty)"),
            }
            println!("Metric:     {}", stats.metric.as_str());
        }

        Ok(())
    }
}
