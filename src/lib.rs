//! Fotoladu ingest: a resumable mirror of the Maa-amet aerial-photo archive
//!
//! This crate queries the archive's search, bounding-box and nearest-frame
//! endpoints, decodes the embedded-script result format, downloads image
//! variants into a local folder tree and records every frame in SQLite.

pub mod archive;
pub mod catalog;
pub mod config;
pub mod ingest;
pub mod storage;

use thiserror::Error;

/// Main error type for ingestion operations
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Unexpected HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ingestion interrupted")]
    Interrupted,
}

impl IngestError {
    /// Classifies a reqwest failure for the given URL
    pub fn from_reqwest(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else if let Some(status) = source.status() {
            Self::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            Self::Http {
                url: url.to_string(),
                source,
            }
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

// Re-export commonly used types
pub use archive::{BBoxQuery, NearestQuery, PaginationMeta, ParsedEntry, QuerySpec};
pub use config::Config;
pub use ingest::{CancelFlag, IngestReport, Ingestor};
pub use storage::{MetadataStore, SqliteStore};
