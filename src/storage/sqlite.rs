//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the MetadataStore
//! trait. Every operation opens its own connection and releases it on return,
//! so the store itself holds no handle between batches.

use crate::archive::ParsedEntry;
use crate::storage::schema::{initialize_schema, schema_present};
use crate::storage::traits::{MetadataStore, StorageError, StorageResult};
use crate::storage::{BatchOutcome, ImageRecord, RunMode, RunRecord, RunStatus};
use crate::Result;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::time::Duration;

const INSERT_IMAGE: &str = "INSERT OR IGNORE INTO image (
        external_id, path, year, width, height, top_folder, sub_folder, filename,
        flight, photo_number, map_sheet, photo_type, source, ingested_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)";

const SELECT_IMAGE_ID: &str = "SELECT id FROM image WHERE external_id = ?1";

const INSERT_LOCATION: &str = "INSERT OR IGNORE INTO location (image_id, latitude, longitude, confidence)
     VALUES (?1, ?2, ?3, ?4)";

const SELECT_IMAGE: &str = "SELECT i.id, i.external_id, i.path, i.year, i.width, i.height,
            i.top_folder, i.sub_folder, i.filename, i.flight, i.photo_number, i.map_sheet,
            i.photo_type, i.source, i.ingested_at, l.latitude, l.longitude, l.confidence
     FROM image i LEFT JOIN location l ON l.image_id = i.id";

const SELECT_RUN: &str = "SELECT id, mode, started_at, finished_at, config_hash, status, pages, entries
     FROM ingest_runs";

/// SQLite metadata store
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    /// Opens the database at `path`, creating the schema if needed
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - The database exists and carries the schema
    /// * `Err(IngestError)` - Failed to create or open the database
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let store = Self {
            path: path.to_path_buf(),
        };

        let conn = store.connect()?;
        if !schema_present(&conn)? {
            tracing::info!("Initializing database schema at {}", path.display());
            initialize_schema(&conn)?;
        }

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens a scoped connection with the store's pragmas applied
    pub fn connect(&self) -> StorageResult<Connection> {
        let conn = Connection::open(&self.path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;
        conn.busy_timeout(Duration::from_secs(5))?;

        Ok(conn)
    }

    fn count(&self, sql: &str) -> StorageResult<u64> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn image_from_row(row: &Row<'_>) -> rusqlite::Result<ImageRecord> {
    Ok(ImageRecord {
        id: row.get(0)?,
        external_id: row.get(1)?,
        path: row.get(2)?,
        year: row.get(3)?,
        width: row.get(4)?,
        height: row.get(5)?,
        top_folder: row.get(6)?,
        sub_folder: row.get(7)?,
        filename: row.get(8)?,
        flight: row.get(9)?,
        photo_number: row.get(10)?,
        map_sheet: row.get(11)?,
        photo_type: row.get(12)?,
        source: row.get(13)?,
        ingested_at: row.get(14)?,
        latitude: row.get(15)?,
        longitude: row.get(16)?,
        confidence: row.get(17)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        mode: RunMode::from_db_string(&row.get::<_, String>(1)?).unwrap_or(RunMode::Search),
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        config_hash: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(RunStatus::Running),
        pages: row.get::<_, i64>(6)? as u64,
        entries: row.get::<_, i64>(7)? as u64,
    })
}

impl MetadataStore for SqliteStore {
    // ===== Ingestion =====

    fn commit_batch(&mut self, batch: &[(ParsedEntry, PathBuf)]) -> StorageResult<BatchOutcome> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        let mut outcome = BatchOutcome::default();

        {
            let mut insert_image = tx.prepare_cached(INSERT_IMAGE)?;
            let mut select_id = tx.prepare_cached(SELECT_IMAGE_ID)?;
            let mut insert_location = tx.prepare_cached(INSERT_LOCATION)?;

            for (entry, path) in batch {
                let external_id = entry.external_id.ok_or(StorageError::MissingExternalId)?;
                let path = path.to_string_lossy().into_owned();

                let inserted = insert_image.execute(params![
                    external_id,
                    path,
                    entry.year,
                    entry.width,
                    entry.height,
                    entry.top_folder,
                    entry.sub_folder,
                    entry.filename,
                    entry.flight,
                    entry.photo_number,
                    entry.map_sheet,
                    entry.photo_type,
                    entry.source,
                    now,
                ])?;
                outcome.images_inserted += inserted as u64;

                // Runs even when the image already existed, so a location
                // missing from an earlier partial write is filled in
                let image_id: Option<i64> = select_id
                    .query_row(params![external_id], |row| row.get(0))
                    .optional()?;

                if let Some(image_id) = image_id {
                    let inserted = insert_location.execute(params![
                        image_id,
                        entry.latitude,
                        entry.longitude,
                        entry.accuracy,
                    ])?;
                    outcome.locations_inserted += inserted as u64;
                }
            }
        }

        tx.commit()?;
        Ok(outcome)
    }

    // ===== Run Management =====

    fn start_run(&mut self, mode: RunMode, config_hash: &str) -> StorageResult<i64> {
        let conn = self.connect()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO ingest_runs (mode, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                mode.to_db_string(),
                now,
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        pages: u64,
        entries: u64,
    ) -> StorageResult<()> {
        let conn = self.connect()?;
        let now = Utc::now().to_rfc3339();
        let updated = conn.execute(
            "UPDATE ingest_runs SET status = ?1, finished_at = ?2, pages = ?3, entries = ?4
             WHERE id = ?5",
            params![status.to_db_string(), now, pages as i64, entries as i64, run_id],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let conn = self.connect()?;
        conn.query_row(
            &format!("{} WHERE id = ?1", SELECT_RUN),
            params![run_id],
            run_from_row,
        )
        .optional()?
        .ok_or(StorageError::RunNotFound(run_id))
    }

    fn latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let conn = self.connect()?;
        let run = conn
            .query_row(
                &format!("{} ORDER BY id DESC LIMIT 1", SELECT_RUN),
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    // ===== Catalog =====

    fn random_images(&self, n: u32) -> StorageResult<Vec<ImageRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!("{} ORDER BY RANDOM() LIMIT ?1", SELECT_IMAGE))?;

        let images = stmt
            .query_map(params![n.max(1)], image_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(images)
    }

    fn get_image_by_external_id(&self, external_id: i64) -> StorageResult<Option<ImageRecord>> {
        let conn = self.connect()?;
        let image = conn
            .query_row(
                &format!("{} WHERE i.external_id = ?1", SELECT_IMAGE),
                params![external_id],
                image_from_row,
            )
            .optional()?;
        Ok(image)
    }

    // ===== Statistics =====

    fn count_images(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM image")
    }

    fn count_locations(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM location")
    }

    fn count_images_without_location(&self) -> StorageResult<u64> {
        self.count(
            "SELECT COUNT(*) FROM image i LEFT JOIN location l ON l.image_id = i.id
             WHERE l.id IS NULL",
        )
    }

    fn count_orphan_locations(&self) -> StorageResult<u64> {
        self.count(
            "SELECT COUNT(*) FROM location l LEFT JOIN image i ON i.id = l.image_id
             WHERE i.id IS NULL",
        )
    }

    fn count_top_folders(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(DISTINCT top_folder) FROM image")
    }
}
