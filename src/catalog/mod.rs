//! Read path over the ingested catalog
//!
//! This module handles:
//! - Random record selection with public URLs attached
//! - Catalog statistics

pub mod stats;
mod urls;

pub use stats::{load_statistics, print_statistics, CatalogStatistics};
pub use urls::{ImageUrls, UrlLayout};

use crate::storage::{ImageRecord, MetadataStore};
use crate::Result;
use serde::Serialize;

/// An image row together with the URLs of its renditions
#[derive(Debug, Clone, Serialize)]
pub struct CatalogImage {
    #[serde(flatten)]
    pub image: ImageRecord,
    #[serde(flatten)]
    pub urls: ImageUrls,
}

/// Picks `n` random images and attaches their URLs
///
/// Counts below 1 are treated as 1. Fewer records are returned when the
/// catalog is smaller than `n`.
///
/// # Arguments
///
/// * `store` - The metadata store to sample
/// * `layout` - Where renditions live and how they are served
/// * `n` - Requested number of records
pub fn random_images(
    store: &dyn MetadataStore,
    layout: &UrlLayout,
    n: i64,
) -> Result<Vec<CatalogImage>> {
    let n = u32::try_from(n.max(1)).unwrap_or(u32::MAX);

    Ok(store
        .random_images(n)?
        .into_iter()
        .map(|image| {
            let urls = layout.urls_for(&image.path);
            CatalogImage { image, urls }
        })
        .collect())
}
