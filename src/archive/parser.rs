//! Response decoding for the archive endpoints
//!
//! The search endpoint answers with an HTML fragment in which every frame is
//! rendered as a `kuvapiltfuncarhiiv(...)` call, and the pagination counters
//! are scattered through free text and script variables. The bounding-box
//! endpoint answers with a GeoJSON feature collection whose properties already
//! carry the field names.

use crate::archive::entry::{EntryField, PaginationMeta, ParsedEntry};
use crate::archive::literal::parse_argument_list;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

/// Name of the script function wrapping each frame in a search response
pub const ENTRY_FUNCTION: &str = "kuvapiltfuncarhiiv";

static ENTRY_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"kuvapiltfuncarhiiv\s*\(").expect("entry call pattern"));

static TOTAL_FOUND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Leitud fotosid:\s*(\d+(?:\s\d{3})*)").expect("total pattern")
});

static PAGE_COUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"var\s+lk_nr\s*=\s*(\d+)").expect("page count pattern"));

static ROWS_PER_PAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"var\s+ridu\s*=\s*(\d+)").expect("rows pattern"));

static ROW_LIMIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"var\s+limit\s*=\s*(\d+)").expect("limit pattern"));

/// Entries and pagination counters decoded from one search response
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub entries: Vec<ParsedEntry>,
    pub meta: PaginationMeta,
}

/// Decodes both the entries and the pagination counters of a search response
pub fn parse_search_page(html: &str) -> SearchPage {
    SearchPage {
        entries: parse_search_entries(html),
        meta: parse_pagination(html),
    }
}

/// Extracts every frame rendered as a `kuvapiltfuncarhiiv(...)` call
///
/// Calls whose argument count differs from the 15-field schema are zipped
/// against it anyway (missing trailing fields stay unset) and logged. Calls
/// whose argument list is not a plain literal list are skipped and logged.
///
/// # Example
///
/// ```
/// use fotoladu_ingest::archive::parse_search_entries;
///
/// let html = "<a onclick=\"kuvapiltfuncarhiiv(7, '1963')\">";
/// let entries = parse_search_entries(html);
/// assert_eq!(entries[0].external_id, Some(7));
/// assert_eq!(entries[0].year.as_deref(), Some("1963"));
/// ```
pub fn parse_search_entries(html: &str) -> Vec<ParsedEntry> {
    let mut entries = Vec::new();
    let mut resume_at = 0;

    for call in ENTRY_CALL.find_iter(html) {
        // A string argument may itself contain the function name
        if call.start() < resume_at {
            continue;
        }

        match parse_argument_list(&html[call.end()..]) {
            Ok((values, consumed)) => {
                resume_at = call.end() + consumed;

                if values.len() != EntryField::POSITIONAL.len() {
                    tracing::warn!(
                        "{} call at byte {} has {} arguments, expected {}; zipping leniently",
                        ENTRY_FUNCTION,
                        call.start(),
                        values.len(),
                        EntryField::POSITIONAL.len()
                    );
                }

                entries.push(ParsedEntry::from_positional(values));
            }
            Err(e) => {
                tracing::warn!(
                    "Skipping {} call at byte {}: {}",
                    ENTRY_FUNCTION,
                    call.start(),
                    e
                );
            }
        }
    }

    entries
}

/// Extracts the four pagination counters; each defaults to 0 when absent
pub fn parse_pagination(html: &str) -> PaginationMeta {
    PaginationMeta {
        total: capture_count(&TOTAL_FOUND, html),
        pages: capture_count(&PAGE_COUNT, html),
        rows: capture_count(&ROWS_PER_PAGE, html),
        limit: capture_count(&ROW_LIMIT, html),
    }
}

/// Reads the first capture group as an integer, dropping thousands separators
fn capture_count(pattern: &Regex, html: &str) -> u64 {
    let Some(raw) = pattern.captures(html).and_then(|c| c.get(1)) else {
        return 0;
    };

    let digits: String = raw
        .as_str()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    digits.parse().unwrap_or_else(|e| {
        tracing::warn!("Ignoring unreadable pagination counter {:?}: {}", digits, e);
        0
    })
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Decodes a bounding-box GeoJSON payload into entries
///
/// Each feature's property bag is read by field name. Features without
/// properties are skipped.
pub fn parse_feature_collection(payload: &str) -> Result<Vec<ParsedEntry>, serde_json::Error> {
    let collection: FeatureCollection = serde_json::from_str(payload)?;

    Ok(collection
        .features
        .iter()
        .filter_map(|feature| feature.properties.as_ref())
        .map(ParsedEntry::from_properties)
        .collect())
}
