//! Serve command handler.

use clap::Args;
use docvec_core::{config::AppConfig, AppResult};
use docvec_knowledge::Components;
use docvec_server::McpServer;

/// Serve similarity search to an MCP client over stdin/stdout
#[derive(Args, Debug)]
pub struct ServeCommand {}

impl ServeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing serve command");

        let components = Components::for_serve(config)?;
        tracing::info!(
            "Collection '{}' in {:?} ({} records)",
            config.collection,
            config.persist_dir,
            components.store.count().await?
        );

        McpServer::from_components(&components).run_stdio().await
    }
}
