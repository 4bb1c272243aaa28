//! Configuration management for docvec.
//!
//! Configuration is layered, later sources winning:
//! - Built-in defaults
//! - An optional YAML config file (`--config` / `DOCVEC_CONFIG`)
//! - A `.env` file in the working directory (never overrides real variables)
//! - Environment variables
//! - Command-line flags
//!
//! The three variables the pipeline cannot run without are `INPUT_DIR`,
//! `CHROMA_PERSIST_DIRECTORY` and `GOOGLE_API_KEY`. They are only checked
//! when the command that needs them runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Ingestion source directory.
pub const INPUT_DIR_VAR: &str = "INPUT_DIR";
/// Vector store directory.
pub const PERSIST_DIR_VAR: &str = "CHROMA_PERSIST_DIRECTORY";
/// Credential for the Google embedding service.
pub const API_KEY_VAR: &str = "GOOGLE_API_KEY";
/// Optional YAML config file path.
pub const CONFIG_FILE_VAR: &str = "DOCVEC_CONFIG";

const COLLECTION_VAR: &str = "DOCVEC_COLLECTION";
const PROVIDER_VAR: &str = "DOCVEC_EMBEDDING_PROVIDER";
const MODEL_VAR: &str = "DOCVEC_EMBEDDING_MODEL";

/// Embedding providers the factory knows how to build.
pub const KNOWN_PROVIDERS: [&str; 2] = ["google", "hash"];

/// How files with a given extension are turned into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorKind {
    /// Read as UTF-8 text
    Text,
    /// Strip markdown formatting
    Markdown,
    /// Strip HTML tags
    Html,
    /// Never load
    Skip,
}

/// Distance metric used by the vector store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    L2,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::L2 => "l2",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cosine" => Some(Self::Cosine),
            "l2" => Some(Self::L2),
            _ => None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Chunker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,

    /// Characters shared between consecutive chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Embedding service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider name: "google" or "hash"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Maximum texts per embedding request
    pub batch_size: usize,

    /// Attempts per request, including the first one
    pub max_attempts: u32,

    /// Backoff before the first retry; doubles on every further retry
    pub initial_backoff_ms: u64,

    /// Base URL of the embedding API
    pub endpoint: String,

    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "google".to_string(),
            model: "models/text-embedding-004".to_string(),
            dimensions: 768,
            batch_size: 100,
            max_attempts: 3,
            initial_backoff_ms: 500,
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub metric: DistanceMetric,
}

/// Document loader settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Extractor per lowercase file extension (without the dot)
    pub extensions: BTreeMap<String, ExtractorKind>,

    /// Load files and directories whose name starts with '.'
    pub include_hidden: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        let extensions = [
            ("txt", ExtractorKind::Text),
            ("md", ExtractorKind::Markdown),
            ("markdown", ExtractorKind::Markdown),
            ("html", ExtractorKind::Html),
            ("htm", ExtractorKind::Html),
            ("pdf", ExtractorKind::Skip),
            ("docx", ExtractorKind::Skip),
            ("doc", ExtractorKind::Skip),
        ]
        .into_iter()
        .map(|(ext, kind)| (ext.to_string(), kind))
        .collect();

        Self {
            extensions,
            include_hidden: false,
        }
    }
}

impl IngestConfig {
    /// Extractor for an extension, `None` when the extension is not configured.
    pub fn extractor_for(&self, extension: &str) -> Option<ExtractorKind> {
        self.extensions.get(&extension.to_lowercase()).copied()
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    collection: Option<String>,
    chunking: Option<ChunkingConfig>,
    embedding: Option<EmbeddingConfig>,
    store: Option<StoreConfig>,
    ingest: Option<IngestConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct LoggingConfig {
    level: Option<String>,
    format: Option<LogFormat>,
    color: Option<bool>,
}

/// Command-line overrides applied on top of the loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub input_dir: Option<PathBuf>,
    pub persist_dir: Option<PathBuf>,
    pub collection: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub verbose: bool,
    pub no_color: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    /// Directory to ingest documents from
    pub input_dir: Option<PathBuf>,

    /// Directory holding the vector store
    pub persist_dir: Option<PathBuf>,

    /// Google API key
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Collection (store file) name inside the persist directory
    pub collection: String,

    pub chunking: ChunkingConfig,

    pub embedding: EmbeddingConfig,

    pub store: StoreConfig,

    pub ingest: IngestConfig,

    /// Config file that was merged, if any
    pub config_file: Option<PathBuf>,

    /// Log filter override
    pub log_level: Option<String>,

    pub log_format: LogFormat,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            input_dir: None,
            persist_dir: None,
            api_key: None,
            collection: "langchain".to_string(),
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            store: StoreConfig::default(),
            ingest: IngestConfig::default(),
            config_file: None,
            log_level: None,
            log_format: LogFormat::default(),
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from `.env`, the environment and an optional YAML file.
    ///
    /// `config_file` takes precedence over `DOCVEC_CONFIG`.
    ///
    /// # Example
    /// ```no_run
    /// use docvec_core::config::AppConfig;
    ///
    /// let config = AppConfig::load(None).expect("Failed to load config");
    /// println!("Collection: {}", config.collection);
    /// ```
    pub fn load(config_file: Option<&Path>) -> AppResult<Self> {
        match dotenvy::dotenv() {
            Ok(_) => {}
            Err(e) if e.not_found() => {}
            Err(e) => return Err(AppError::Config(format!("Failed to read .env file: {}", e))),
        }

        Self::load_with(config_file, |key| std::env::var(key).ok())
    }

    /// Load configuration using `lookup` to resolve environment variables.
    pub fn load_with<F>(config_file: Option<&Path>, lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config = Self::default();

        let config_path = config_file
            .map(Path::to_path_buf)
            .or_else(|| var(CONFIG_FILE_VAR).map(PathBuf::from));

        if let Some(path) = config_path {
            config = config.merge_yaml(&path)?;
        }

        // Environment variables override YAML config
        if let Some(dir) = var(INPUT_DIR_VAR) {
            config.input_dir = Some(PathBuf::from(dir));
        }

        if let Some(dir) = var(PERSIST_DIR_VAR) {
            config.persist_dir = Some(PathBuf::from(dir));
        }

        config.api_key = var(API_KEY_VAR);

        if let Some(collection) = var(COLLECTION_VAR) {
            config.collection = collection;
        }

        if let Some(provider) = var(PROVIDER_VAR) {
            config.embedding.provider = provider;
        }

        if let Some(model) = var(MODEL_VAR) {
            config.embedding.model = model;
        }

        if let Some(level) = var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if lookup("NO_COLOR").is_some() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();
        result.config_file = Some(path.to_path_buf());

        if let Some(collection) = file.collection {
            result.collection = collection;
        }
        if let Some(chunking) = file.chunking {
            result.chunking = chunking;
        }
        if let Some(embedding) = file.embedding {
            result.embedding = embedding;
        }
        if let Some(store) = file.store {
            result.store = store;
        }
        if let Some(ingest) = file.ingest {
            // Extensions from the file extend the defaults rather than replace them
            result.ingest.include_hidden = ingest.include_hidden;
            for (ext, kind) in ingest.extensions {
                result.ingest.extensions.insert(ext.to_lowercase(), kind);
            }
        }
        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(format) = logging.format {
                result.log_format = format;
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(dir) = overrides.input_dir {
            self.input_dir = Some(dir);
        }

        if let Some(dir) = overrides.persist_dir {
            self.persist_dir = Some(dir);
        }

        if let Some(collection) = overrides.collection {
            self.collection = collection;
        }

        if let Some(level) = overrides.log_level {
            self.log_level = Some(level);
        }

        if let Some(format) = overrides.log_format {
            self.log_format = format;
        }

        if overrides.verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if overrides.no_color {
            self.no_color = true;
        }

        self
    }

    /// The ingestion source directory, or a `Config` error naming `INPUT_DIR`.
    pub fn require_input_dir(&self) -> AppResult<&Path> {
        self.input_dir
            .as_deref()
            .ok_or_else(|| missing_var(INPUT_DIR_VAR, "the directory of documents to ingest"))
    }

    /// The store directory, or a `Config` error naming `CHROMA_PERSIST_DIRECTORY`.
    pub fn require_persist_dir(&self) -> AppResult<&Path> {
        self.persist_dir
            .as_deref()
            .ok_or_else(|| missing_var(PERSIST_DIR_VAR, "the vector store directory"))
    }

    /// The embedding API key, or a `Config` error naming `GOOGLE_API_KEY`.
    pub fn require_api_key(&self) -> AppResult<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| missing_var(API_KEY_VAR, "the Google embedding API key"))
    }

    /// Whether the configured embedder calls the Google API.
    pub fn uses_remote_embedder(&self) -> bool {
        self.embedding.provider == "google"
    }

    /// Validate settings that do not depend on the command being run.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.embedding.provider.as_str();
        if !KNOWN_PROVIDERS.contains(&provider) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if self.chunking.chunk_size == 0 {
            return Err(AppError::Config(
                "chunking.chunk_size must be greater than zero".to_string(),
            ));
        }

        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(AppError::Config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "embedding.dimensions must be greater than zero".to_string(),
            ));
        }

        if self.embedding.batch_size == 0 {
            return Err(AppError::Config(
                "embedding.batch_size must be greater than zero".to_string(),
            ));
        }

        if self.embedding.max_attempts == 0 {
            return Err(AppError::Config(
                "embedding.max_attempts must be at least 1".to_string(),
            ));
        }

        if self.collection.trim().is_empty()
            || self.collection.contains(['/', '\\'])
            || self.collection.starts_with('.')
        {
            return Err(AppError::Config(format!(
                "Invalid collection name: {:?}",
                self.collection
            )));
        }

        Ok(())
    }

    /// Pre-flight checks for `docvec ingest`.
    pub fn validate_for_ingest(&self) -> AppResult<()> {
        self.validate()?;
        self.require_input_dir()?;
        self.require_persist_dir()?;
        if self.uses_remote_embedder() {
            self.require_api_key()?;
        }
        Ok(())
    }

    /// Pre-flight checks for `docvec serve`.
    pub fn validate_for_serve(&self) -> AppResult<()> {
        self.validate()?;
        self.require_persist_dir()?;
        if self.uses_remote_embedder() {
            self.require_api_key()?;
        }
        Ok(())
    }
}

fn missing_var(var: &str, what: &str) -> AppError {
    AppError::Config(format!(
        "{} environment variable is not set ({} is required)",
        var, what
    ))
}
