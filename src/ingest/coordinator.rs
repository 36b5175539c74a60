//! Ingestion coordinator - ties queries, downloads and persistence together
//!
//! This module contains the ingestion loop, including:
//! - Walking the result pages of a search
//! - Materializing the image files of every entry
//! - Committing each page as one transaction
//! - Recording every run and honoring cancellation

use crate::archive::{
    parse_feature_collection, parse_search_entries, parse_search_page, ArchiveClient, ArchivePath,
    BBoxQuery, NearestQuery, ParsedEntry, QuerySpec,
};
use crate::config::{validate, Config, LimitsConfig};
use crate::ingest::cancel::CancelFlag;
use crate::ingest::fetcher::ImageFetcher;
use crate::ingest::walker::PagePlan;
use crate::storage::{MetadataStore, RunMode, RunStatus, SqliteStore};
use crate::{IngestError, Result};
use std::fmt;
use std::path::{Path, PathBuf};

/// Counters accumulated over one ingestion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub pages_fetched: u64,
    /// Entries processed, skipped ones included
    pub entries_seen: u64,
    /// Entries dropped for lacking an id or a usable archive path
    pub entries_skipped: u64,
    pub files_downloaded: u64,
    pub images_inserted: u64,
    pub locations_inserted: u64,
}

impl IngestReport {
    pub fn merge(&mut self, other: &IngestReport) {
        self.pages_fetched += other.pages_fetched;
        self.entries_seen += other.entries_seen;
        self.entries_skipped += other.entries_skipped;
        self.files_downloaded += other.files_downloaded;
        self.images_inserted += other.images_inserted;
        self.locations_inserted += other.locations_inserted;
    }
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pages, {} entries ({} skipped), {} files downloaded, {} new images, {} new locations",
            self.pages_fetched,
            self.entries_seen,
            self.entries_skipped,
            self.files_downloaded,
            self.images_inserted,
            self.locations_inserted
        )
    }
}

/// Main ingestion coordinator
///
/// Holds everything one ingestion needs: the archive client, the image
/// fetcher, the metadata store and the cancellation flag. Requests are issued
/// one at a time.
pub struct Ingestor<S: MetadataStore = SqliteStore> {
    client: ArchiveClient,
    fetcher: ImageFetcher,
    store: S,
    limits: LimitsConfig,
    config_hash: String,
    cancel: CancelFlag,
}

impl Ingestor<SqliteStore> {
    /// Creates an ingestor backed by the configured SQLite database
    ///
    /// # Arguments
    ///
    /// * `config` - The loaded configuration
    /// * `config_hash` - Hash of the configuration file, stamped on every run
    /// * `cancel` - Flag checked between entries
    ///
    /// # Returns
    ///
    /// * `Ok(Ingestor)` - Database opened and client built
    /// * `Err(IngestError)` - Invalid configuration or failed to initialize
    pub fn from_config(config: &Config, config_hash: &str, cancel: CancelFlag) -> Result<Self> {
        // Checked before the database file is touched
        validate(config)?;
        let store = SqliteStore::open(Path::new(&config.storage.database_path))?;
        Self::with_store(config, store, config_hash, cancel)
    }
}

impl<S: MetadataStore> Ingestor<S> {
    /// Creates an ingestor over an already opened store
    pub fn with_store(
        config: &Config,
        store: S,
        config_hash: &str,
        cancel: CancelFlag,
    ) -> Result<Self> {
        validate(config)?;
        let client = ArchiveClient::new(&config.service)?;
        let fetcher = ImageFetcher::new(
            client.clone(),
            &config.storage.download_root,
            &config.storage.primary_variant,
        );

        Ok(Self {
            client,
            fetcher,
            store,
            limits: config.limits.clone(),
            config_hash: config_hash.to_string(),
            cancel,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Ingests every page of a search, up to `max_pages`
    ///
    /// `None` uses the configured search budget.
    pub async fn ingest_search(
        &mut self,
        spec: &QuerySpec,
        max_pages: Option<u32>,
    ) -> Result<IngestReport> {
        let max_pages = max_pages.unwrap_or(self.limits.search_max_pages);
        let run_id = self.store.start_run(RunMode::Search, &self.config_hash)?;
        tracing::info!("Starting search run {}", run_id);

        let mut report = IngestReport::default();
        let result = self.walk_search(spec, max_pages, &mut report).await;
        self.finish(run_id, report, result)
    }

    /// Ingests every frame of one archive directory
    ///
    /// `None` uses the configured directory budget.
    pub async fn ingest_directory(
        &mut self,
        directory: &str,
        max_pages: Option<u32>,
    ) -> Result<IngestReport> {
        let max_pages = max_pages.unwrap_or(self.limits.directory_max_pages);
        let run_id = self
            .store
            .start_run(RunMode::Directory, &self.config_hash)?;
        tracing::info!("Starting directory run {} for {}", run_id, directory);

        let spec = QuerySpec::for_directory(directory);
        let mut report = IngestReport::default();
        let result = self.walk_search(&spec, max_pages, &mut report).await;
        self.finish(run_id, report, result)
    }

    /// Ingests the frames inside a bounding box as a single batch
    pub async fn ingest_bbox(&mut self, query: &BBoxQuery) -> Result<IngestReport> {
        let run_id = self.store.start_run(RunMode::BBox, &self.config_hash)?;
        tracing::info!("Starting bounding-box run {}", run_id);

        let mut report = IngestReport::default();
        let result = self.fetch_bbox(query, &mut report).await;
        self.finish(run_id, report, result)
    }

    /// Returns the nearest-frame JSON as the service sent it; nothing is stored
    pub async fn nearest(&self, query: &NearestQuery) -> Result<serde_json::Value> {
        self.client.nearest(query).await
    }

    /// Re-runs a directory ingestion for every folder under the download root
    ///
    /// Each folder gets its own run row. The first failure stops the sweep.
    pub async fn sweep_existing_directories(
        &mut self,
        max_pages: Option<u32>,
    ) -> Result<IngestReport> {
        let folders = list_folders(self.fetcher.root())?;
        let total = folders.len();
        tracing::info!(
            "Found {} folders in {}",
            total,
            self.fetcher.root().display()
        );

        let mut report = IngestReport::default();
        for (i, folder) in folders.iter().enumerate() {
            self.check_cancelled()?;
            tracing::info!("[{}/{}] Processing folder {}", i + 1, total, folder);
            let folder_report = self.ingest_directory(folder, max_pages).await?;
            report.merge(&folder_report);
        }

        Ok(report)
    }

    async fn walk_search(
        &mut self,
        spec: &QuerySpec,
        max_pages: u32,
        report: &mut IngestReport,
    ) -> Result<()> {
        self.check_cancelled()?;

        let first = parse_search_page(&self.client.search(spec).await?);
        report.pages_fetched += 1;

        let plan = PagePlan::from_first_page(&first.meta, first.entries.len(), max_pages);
        tracing::info!(
            "Search reports {} frames; fetching {} of {} pages ({} per page)",
            first.meta.total,
            plan.pages_to_fetch,
            plan.total_pages,
            plan.page_size
        );

        self.ingest_page(first.entries, report).await?;

        for offset in plan.offsets() {
            self.check_cancelled()?;

            let html = self.client.search(&spec.at_offset(offset)).await?;
            let entries = parse_search_entries(&html);
            report.pages_fetched += 1;
            tracing::info!("Page at offset {}: {} entries", offset, entries.len());

            self.ingest_page(entries, report).await?;
        }

        Ok(())
    }

    async fn fetch_bbox(&mut self, query: &BBoxQuery, report: &mut IngestReport) -> Result<()> {
        self.check_cancelled()?;

        let payload = self.client.bbox(query).await?;
        let entries = parse_feature_collection(&payload)?;
        report.pages_fetched += 1;
        tracing::info!("Bounding box returned {} frames", entries.len());

        self.ingest_page(entries, report).await
    }

    /// Materializes a page's entries, then commits them in one batch
    ///
    /// A download failure aborts before anything is written. On cancellation
    /// the entries already materialized are committed first.
    async fn ingest_page(
        &mut self,
        entries: Vec<ParsedEntry>,
        report: &mut IngestReport,
    ) -> Result<()> {
        let mut batch: Vec<(ParsedEntry, PathBuf)> = Vec::with_capacity(entries.len());
        let mut interrupted = false;

        for entry in entries {
            if self.cancel.is_cancelled() {
                interrupted = true;
                break;
            }

            report.entries_seen += 1;
            let Some(path) = usable_path(&entry) else {
                report.entries_skipped += 1;
                continue;
            };

            let materialized = self.fetcher.materialize(&path).await?;
            report.files_downloaded += u64::from(materialized.downloaded);
            batch.push((entry, materialized.primary));
        }

        if !batch.is_empty() {
            let outcome = self.store.commit_batch(&batch)?;
            report.images_inserted += outcome.images_inserted;
            report.locations_inserted += outcome.locations_inserted;
            tracing::debug!("Committed batch of {} entries", batch.len());
        }

        if interrupted {
            tracing::info!(
                "Interrupted. Committed {} entries before stopping",
                batch.len()
            );
            return Err(IngestError::Interrupted);
        }

        Ok(())
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(IngestError::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Stamps the run's final status and passes the outcome through
    fn finish(
        &mut self,
        run_id: i64,
        report: IngestReport,
        result: Result<()>,
    ) -> Result<IngestReport> {
        let status = match &result {
            Ok(()) => RunStatus::Completed,
            Err(IngestError::Interrupted) => RunStatus::Interrupted,
            Err(_) => RunStatus::Failed,
        };

        match &result {
            Ok(()) => tracing::info!("Run {} completed: {}", run_id, report),
            Err(e) => tracing::warn!("Run {} {}: {} ({})", run_id, status.to_db_string(), e, report),
        }

        let recorded = self.store.finish_run(
            run_id,
            status,
            report.pages_fetched,
            report.entries_seen,
        );

        match (result, recorded) {
            (Ok(()), Ok(())) => Ok(report),
            (Ok(()), Err(e)) => Err(e.into()),
            (Err(e), recorded) => {
                if let Err(record_err) = recorded {
                    tracing::error!("Failed to record end of run {}: {}", run_id, record_err);
                }
                Err(e)
            }
        }
    }
}

/// The archive path of an entry, or `None` (with a warning) if it cannot be stored
fn usable_path(entry: &ParsedEntry) -> Option<ArchivePath> {
    let Some(external_id) = entry.external_id else {
        tracing::warn!(
            "Skipping entry without id (file {:?})",
            entry.filename.as_deref().unwrap_or("?")
        );
        return None;
    };

    let path = entry.archive_path();
    if path.is_none() {
        tracing::warn!(
            "Skipping entry {}: missing or unsafe archive path ({:?}/{:?}/{:?})",
            external_id,
            entry.top_folder,
            entry.sub_folder,
            entry.filename
        );
    }
    path
}

/// Names of the directories directly under `root`, sorted
fn list_folders(root: &Path) -> Result<Vec<String>> {
    let read_dir = match std::fs::read_dir(root) {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("Download root {} does not exist", root.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut folders = Vec::new();
    for dir_entry in read_dir {
        let dir_entry = dir_entry?;
        if !dir_entry.file_type()?.is_dir() {
            continue;
        }
        match dir_entry.file_name().into_string() {
            Ok(name) => folders.push(name),
            Err(name) => tracing::warn!("Skipping non UTF-8 folder name {:?}", name),
        }
    }

    folders.sort();
    Ok(folders)
}
