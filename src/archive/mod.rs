//! Remote archive access
//!
//! This module covers everything that talks about the archive service's wire
//! formats:
//! - Query construction for the search, bounding-box and nearest endpoints
//! - Decoding of the embedded-script search results and GeoJSON payloads
//! - The HTTP client that issues the requests

mod client;
mod entry;
pub mod literal;
mod parser;
mod query;

pub use client::{build_http_client, ArchiveClient, BBOX_PATH, NEAREST_PATH, SEARCH_PATH};
pub use entry::{ArchivePath, EntryField, PaginationMeta, ParsedEntry};
pub use parser::{
    parse_feature_collection, parse_pagination, parse_search_entries, parse_search_page,
    SearchPage, ENTRY_FUNCTION,
};
pub use query::{
    BBoxQuery, NearestQuery, QuerySpec, DEFAULT_PAGE_SIZE, DEFAULT_SURVEY_EPOCH, MAX_PAGE_SIZE,
};
