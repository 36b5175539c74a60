//! Storage module for persisting the frame catalog
//!
//! This module handles all database operations, including:
//! - SQLite database bootstrap and schema management
//! - Transactional per-page commits of image and location rows
//! - Ingestion run tracking
//! - Read queries backing the catalog and statistics

mod schema;
mod sqlite;
mod traits;

pub use schema::{initialize_schema, SCHEMA_SQL};
pub use sqlite::SqliteStore;
pub use traits::{MetadataStore, StorageError, StorageResult};

use serde::Serialize;

/// Represents an image row, joined with its location when one exists
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRecord {
    pub id: i64,
    pub external_id: i64,
    /// Local path of the primary variant, as recorded at ingestion
    pub path: String,
    pub year: Option<String>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub top_folder: Option<String>,
    pub sub_folder: Option<String>,
    pub filename: Option<String>,
    pub flight: Option<String>,
    pub photo_number: Option<String>,
    pub map_sheet: Option<String>,
    pub photo_type: Option<String>,
    pub source: Option<String>,
    pub ingested_at: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub confidence: Option<f64>,
}

/// Represents an ingestion run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub mode: RunMode,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub pages: u64,
    pub entries: u64,
}

/// Rows actually inserted by one committed batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub images_inserted: u64,
    pub locations_inserted: u64,
}

/// Status of an ingestion run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Which entry point started a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Search,
    Directory,
    BBox,
}

impl RunMode {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Directory => "directory",
            Self::BBox => "bbox",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "search" => Some(Self::Search),
            "directory" => Some(Self::Directory),
            "bbox" => Some(Self::BBox),
            _ => None,
        }
    }
}
