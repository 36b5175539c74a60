//! Database schema definitions
//!
//! This module contains the SQL schema for the frame catalog.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per archive frame, keyed by the service's own id
CREATE TABLE IF NOT EXISTS image (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id INTEGER NOT NULL UNIQUE,
    path TEXT NOT NULL,
    year TEXT,
    width REAL,
    height REAL,
    top_folder TEXT,
    sub_folder TEXT,
    filename TEXT,
    flight TEXT,
    photo_number TEXT,
    map_sheet TEXT,
    photo_type TEXT,
    source TEXT,
    ingested_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_image_year ON image(year);
CREATE INDEX IF NOT EXISTS idx_image_folders ON image(top_folder, sub_folder);

-- At most one georeference per frame
CREATE TABLE IF NOT EXISTS location (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    image_id INTEGER NOT NULL UNIQUE REFERENCES image(id),
    latitude REAL,
    longitude REAL,
    confidence REAL
);

CREATE INDEX IF NOT EXISTS idx_location_coords ON location(latitude, longitude);

-- Track ingestion runs
CREATE TABLE IF NOT EXISTS ingest_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mode TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    pages INTEGER NOT NULL DEFAULT 0,
    entries INTEGER NOT NULL DEFAULT 0
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

/// Whether the catalog tables are present on this connection
pub fn schema_present(conn: &rusqlite::Connection) -> Result<bool, rusqlite::Error> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'image'",
        [],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(!schema_present(&conn).unwrap());

        initialize_schema(&conn).unwrap();
        assert!(initialize_schema(&conn).is_ok());
        assert!(schema_present(&conn).unwrap());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["image", "location", "ingest_runs"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_external_id_is_unique() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let insert = "INSERT OR IGNORE INTO image (external_id, path, ingested_at) VALUES (7, 'a', 'now')";
        assert_eq!(conn.execute(insert, []).unwrap(), 1);
        assert_eq!(conn.execute(insert, []).unwrap(), 0);
    }

    #[test]
    fn test_location_requires_image() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        initialize_schema(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO location (image_id, latitude, longitude) VALUES (42, 58.0, 26.0)",
            [],
        );
        assert!(result.is_err());
    }
}
