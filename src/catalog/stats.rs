//! Statistics over the frame catalog
//!
//! This module provides functionality for extracting and displaying
//! catalog statistics from the storage layer.

use crate::storage::{MetadataStore, RunRecord};
use crate::Result;

/// Catalog statistics summary
#[derive(Debug, Clone)]
pub struct CatalogStatistics {
    /// Total number of image rows
    pub images: u64,

    /// Total number of location rows
    pub locations: u64,

    /// Images with no location row
    pub images_without_location: u64,

    /// Location rows pointing at a missing image
    pub orphan_locations: u64,

    /// Distinct top-level archive folders
    pub top_folders: u64,

    /// Most recent ingestion run, if any
    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `store` - The metadata store to query
///
/// # Returns
///
/// * `Ok(CatalogStatistics)` - Successfully loaded statistics
/// * `Err(IngestError)` - Failed to query statistics
pub fn load_statistics(store: &dyn MetadataStore) -> Result<CatalogStatistics> {
    Ok(CatalogStatistics {
        images: store.count_images()?,
        locations: store.count_locations()?,
        images_without_location: store.count_images_without_location()?,
        orphan_locations: store.count_orphan_locations()?,
        top_folders: store.count_top_folders()?,
        latest_run: store.latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CatalogStatistics) {
    println!("=== Catalog Statistics ===\n");

    println!("Overview:");
    println!("  Images: {}", stats.images);
    println!("  Locations: {}", stats.locations);
    println!("  Top-level folders: {}", stats.top_folders);
    println!();

    let located = stats.images.saturating_sub(stats.images_without_location);
    let coverage = if stats.images > 0 {
        (located as f64 / stats.images as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "With location row: {:.1}% ({} / {} images)",
        coverage, located, stats.images
    );

    if stats.orphan_locations > 0 {
        println!(
            "WARNING: {} location rows reference missing images",
            stats.orphan_locations
        );
    }
    println!();

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run:");
            println!("  Id: {}", run.id);
            println!("  Mode: {}", run.mode.to_db_string());
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            println!("  Pages: {}, entries: {}", run.pages, run.entries);
        }
        None => println!("No ingestion runs recorded"),
    }
}
