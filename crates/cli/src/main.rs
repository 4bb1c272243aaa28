//! docvec CLI
//!
//! Ingests a directory of documents into a local vector store and serves
//! similarity search over it to MCP clients.

mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use commands::{IngestCommand, ServeCommand, StatsCommand};
use docvec_core::config::{AppConfig, ConfigOverrides, LogFormat};
use docvec_core::logging;
use std::path::PathBuf;
use tracing::Instrument;

/// docvec - document similarity search for MCP clients
#[derive(Parser, Debug)]
#[command(name = "docvec")]
#[command(about = "Document ingestion and similarity search over MCP", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true, env = "DOCVEC_CONFIG")]
    config: Option<PathBuf>,

    /// Directory to ingest documents from (overrides INPUT_DIR)
    #[arg(long, global = true)]
    input_dir: Option<PathBuf>,

    /// Vector store directory (overrides CHROMA_PERSIST_DIRECTORY)
    #[arg(long, global = true)]
    persist_dir: Option<PathBuf>,

    /// Collection name inside the store directory
    #[arg(long, global = true)]
    collection: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format (text, json)
    #[arg(long, global = true, value_parser = parse_log_format)]
    log_format: Option<LogFormat>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest documents into the vector store
    Ingest(IngestCommand),

    /// Serve get_similar_chunks over stdio
    Serve(ServeCommand),

    /// Show collection statistics
    Stats(StatsCommand),
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    match value.to_ascii_lowercase().as_str() {
        "text" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        other => Err(format!("unknown log format '{}' (expected text or json)", other)),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())
        .context("Failed to load configuration")?
        .with_overrides(ConfigOverrides {
            input_dir: cli.input_dir,
            persist_dir: cli.persist_dir,
            collection: cli.collection,
            log_level: cli.log_level,
            log_format: cli.log_format,
            verbose: cli.verbose,
            no_color: cli.no_color,
        });

    // Logs go to stderr; stdout carries protocol messages when serving
    logging::init_logging(config.log_level.as_deref(), config.log_format, config.no_color)
        .context("Failed to initialise logging")?;

    tracing::info!("docvec {} starting", env!("CARGO_PKG_VERSION"));
    tracing::debug!("Collection: {}", config.collection);
    tracing::debug!("Persist directory: {:?}", config.persist_dir);
    tracing::debug!(
        "Embedding: {} ({}, {} dimensions)",
        config.embedding.provider,
        config.embedding.model,
        config.embedding.dimensions
    );

    let command_name = match &cli.command {
        Commands::Ingest(_) => "ingest",
        Commands::Serve(_) => "serve",
        Commands::Stats(_) => "stats",
    };
    let span = tracing::info_span!("command", name = command_name);

    let result = async {
        match cli.command {
            Commands::Ingest(cmd) => cmd.execute(&config).await,
            Commands::Serve(cmd) => cmd.execute(&config).await,
            Commands::Stats(cmd) => cmd.execute(&config).await,
        }
    }
    .instrument(span)
    .await;

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    Ok(result?)
}
