//! HTTP access to the archive service
//!
//! Every request is a plain GET awaited to completion. There are no retries:
//! a failed request aborts the ingestion that issued it.

use crate::archive::entry::ArchivePath;
use crate::archive::query::{BBoxQuery, NearestQuery, QuerySpec};
use crate::config::ServiceConfig;
use crate::{IngestError, Result};
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Paginated search endpoint, answering with an HTML fragment
pub const SEARCH_PATH: &str = "otsing_arhiiv.php";

/// Bounding-box endpoint, answering with GeoJSON
pub const BBOX_PATH: &str = "paring_db_arhiiv.php";

/// Nearest-frame endpoint, answering with JSON
pub const NEAREST_PATH: &str = "paring_closest_arhiiv.php";

/// Path segments under which image variants are served
const IMAGE_PREFIX: [&str; 3] = ["data", "archive", "arhiiv"];

/// Builds an HTTP client with the configured user agent
///
/// Per-request timeouts are applied by [`ArchiveClient`], since metadata
/// queries and image downloads use different budgets.
///
/// # Arguments
///
/// * `config` - The service configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &ServiceConfig) -> std::result::Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Typed wrapper around the archive's endpoints
#[derive(Debug, Clone)]
pub struct ArchiveClient {
    http: Client,
    base_url: Url,
    metadata_timeout: Duration,
    download_timeout: Duration,
}

impl ArchiveClient {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let mut raw = config.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }

        let http = build_http_client(config)
            .map_err(|e| IngestError::from_reqwest(&config.base_url, e))?;

        Ok(Self {
            http,
            base_url: Url::parse(&raw)?,
            metadata_timeout: Duration::from_secs(config.metadata_timeout_secs),
            download_timeout: Duration::from_secs(config.download_timeout_secs),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves an endpoint path against the base URL
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Remote location of one variant of a frame
    ///
    /// Components are percent-encoded individually, so a filename can never
    /// introduce extra path segments.
    pub fn image_url(&self, path: &ArchivePath, variant: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| IngestError::UrlParse(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(IMAGE_PREFIX)
            .extend([
                path.top_folder.as_str(),
                path.sub_folder.as_str(),
                variant,
                path.filename.as_str(),
            ]);
        Ok(url)
    }

    /// Fetches one page of search results as text
    pub async fn search(&self, spec: &QuerySpec) -> Result<String> {
        let url = self.endpoint(SEARCH_PATH)?;
        tracing::debug!("Searching at offset {} ({} per page)", spec.offset(), spec.page_size());
        self.get_text(url, &spec.to_query_pairs()).await
    }

    /// Fetches the raw GeoJSON for a bounding box
    pub async fn bbox(&self, query: &BBoxQuery) -> Result<String> {
        let url = self.endpoint(BBOX_PATH)?;
        self.get_text(url, &query.to_query_pairs()).await
    }

    /// Fetches the nearest-frame JSON unchanged
    pub async fn nearest(&self, query: &NearestQuery) -> Result<serde_json::Value> {
        let url = self.endpoint(NEAREST_PATH)?;
        let body = self.get_text(url, &query.to_query_pairs()).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Downloads a binary resource in full
    pub async fn download(&self, url: &Url) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(url.clone())
            .timeout(self.download_timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| IngestError::from_reqwest(url.as_str(), e))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| IngestError::from_reqwest(url.as_str(), e))?;

        Ok(bytes.to_vec())
    }

    async fn get_text(&self, url: Url, query: &[(&'static str, String)]) -> Result<String> {
        let response = self
            .http
            .get(url.clone())
            .query(query)
            .timeout(self.metadata_timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| IngestError::from_reqwest(url.as_str(), e))?;

        response
            .text()
            .await
            .map_err(|e| IngestError::from_reqwest(url.as_str(), e))
    }
}
