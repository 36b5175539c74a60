use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Remote archive service configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Root URL of the archive service
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Timeout for search, bounding-box and nearest-frame queries (seconds)
    #[serde(rename = "metadata-timeout-secs")]
    pub metadata_timeout_secs: u64,

    /// Timeout for image downloads (seconds)
    #[serde(rename = "download-timeout-secs")]
    pub download_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://fotoladu.maaamet.ee".to_string(),
            user_agent: format!("fotoladu-ingest/{}", env!("CARGO_PKG_VERSION")),
            metadata_timeout_secs: 30,
            download_timeout_secs: 60,
        }
    }
}

/// Local storage configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Root of the downloaded image tree
    #[serde(rename = "download-root")]
    pub download_root: String,

    /// Root of the tone-corrected image tree (read-only for this crate)
    #[serde(rename = "corrected-root")]
    pub corrected_root: String,

    /// Image variant recorded in the database
    #[serde(rename = "primary-variant")]
    pub primary_variant: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: "db/fotoladu.sqlite.db".to_string(),
            download_root: "data/raw".to_string(),
            corrected_root: "data/corrected".to_string(),
            primary_variant: "reduced".to_string(),
        }
    }
}

/// Page budgets for the paginated ingestion modes
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum result pages for free-form searches
    #[serde(rename = "search-max-pages")]
    pub search_max_pages: u32,

    /// Maximum result pages for directory sweeps
    #[serde(rename = "directory-max-pages")]
    pub directory_max_pages: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            search_max_pages: 20,
            directory_max_pages: 50,
        }
    }
}
