//! Storage traits and error types
//!
//! This module defines the trait interface for metadata stores and
//! associated error types.

use crate::archive::ParsedEntry;
use crate::storage::{BatchOutcome, ImageRecord, RunMode, RunRecord, RunStatus};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Entry without external id cannot be stored")]
    MissingExternalId,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for metadata store implementations
///
/// Writes happen only through [`MetadataStore::commit_batch`], which must be
/// all-or-nothing: either every row of the batch is durable or none is.
pub trait MetadataStore {
    // ===== Ingestion =====

    /// Persists one page worth of materialized entries in a single transaction
    ///
    /// # Arguments
    ///
    /// * `batch` - Entries paired with the local path of their primary variant
    ///
    /// # Returns
    ///
    /// How many image and location rows were actually inserted. Rows whose
    /// key already exists are ignored and not counted.
    fn commit_batch(&mut self, batch: &[(ParsedEntry, PathBuf)]) -> StorageResult<BatchOutcome>;

    // ===== Run Management =====

    /// Records the start of an ingestion run and returns its id
    fn start_run(&mut self, mode: RunMode, config_hash: &str) -> StorageResult<i64>;

    /// Stamps the final status and counters on a run
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        pages: u64,
        entries: u64,
    ) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn latest_run(&self) -> StorageResult<Option<RunRecord>>;

    // ===== Catalog =====

    /// Picks up to `n` image rows uniformly at random
    fn random_images(&self, n: u32) -> StorageResult<Vec<ImageRecord>>;

    /// Looks up an image row by the service's id
    fn get_image_by_external_id(&self, external_id: i64) -> StorageResult<Option<ImageRecord>>;

    // ===== Statistics =====

    fn count_images(&self) -> StorageResult<u64>;

    fn count_locations(&self) -> StorageResult<u64>;

    /// Images that have no location row
    fn count_images_without_location(&self) -> StorageResult<u64>;

    /// Location rows whose image row is missing; always 0 in a consistent store
    fn count_orphan_locations(&self) -> StorageResult<u64>;

    /// Number of distinct top-level archive folders seen
    fn count_top_folders(&self) -> StorageResult<u64>;
}
