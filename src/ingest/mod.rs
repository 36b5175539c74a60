//! Ingestion pipeline
//!
//! This module contains the ingestion logic, including:
//! - Page planning for paginated searches
//! - Idempotent image downloads into the local archive tree
//! - Per-page transactional commits and run tracking
//! - Cooperative cancellation

mod cancel;
mod coordinator;
mod fetcher;
mod walker;

pub use cancel::CancelFlag;
pub use coordinator::{IngestReport, Ingestor};
pub use fetcher::{ImageFetcher, Materialized, THUMBNAIL_VARIANT};
pub use walker::PagePlan;
