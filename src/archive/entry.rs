//! Archive frame records and their positional schema

use crate::archive::literal::Literal;

/// One field of an archive frame, in the order the service emits them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryField {
    ExternalId,
    Year,
    Latitude,
    Longitude,
    Accuracy,
    Width,
    Height,
    TopFolder,
    SubFolder,
    Filename,
    Flight,
    PhotoNumber,
    MapSheet,
    PhotoType,
    Source,
}

impl EntryField {
    /// Positional order of the `kuvapiltfuncarhiiv` arguments. Do not reorder.
    pub const POSITIONAL: [EntryField; 15] = [
        Self::ExternalId,
        Self::Year,
        Self::Latitude,
        Self::Longitude,
        Self::Accuracy,
        Self::Width,
        Self::Height,
        Self::TopFolder,
        Self::SubFolder,
        Self::Filename,
        Self::Flight,
        Self::PhotoNumber,
        Self::MapSheet,
        Self::PhotoType,
        Self::Source,
    ];

    /// Name of the field in the bounding-box feature properties
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::ExternalId => "id",
            Self::Year => "aasta",
            Self::Latitude => "B",
            Self::Longitude => "L",
            Self::Accuracy => "tapsus",
            Self::Width => "w",
            Self::Height => "h",
            Self::TopFolder => "peakaust",
            Self::SubFolder => "kaust",
            Self::Filename => "fail",
            Self::Flight => "lend",
            Self::PhotoNumber => "fotonr",
            Self::MapSheet => "kaardileht",
            Self::PhotoType => "tyyp",
            Self::Source => "allikas",
        }
    }
}

/// One archive frame as decoded from a response
///
/// Every field is optional: the service omits trailing arguments on some
/// responses and feature properties may be null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedEntry {
    /// The service's own numeric id for the frame
    pub external_id: Option<i64>,
    pub year: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Positional accuracy / confidence of the coordinates
    pub accuracy: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub top_folder: Option<String>,
    pub sub_folder: Option<String>,
    pub filename: Option<String>,
    pub flight: Option<String>,
    pub photo_number: Option<String>,
    pub map_sheet: Option<String>,
    pub photo_type: Option<String>,
    pub source: Option<String>,
}

impl ParsedEntry {
    /// Zips positional values against [`EntryField::POSITIONAL`]
    ///
    /// Missing trailing values leave their fields unset and surplus values are
    /// dropped; callers decide whether to report the mismatch.
    pub fn from_positional(values: Vec<Literal>) -> Self {
        let mut entry = Self::default();
        for (field, value) in EntryField::POSITIONAL.into_iter().zip(values) {
            entry.set(field, value);
        }
        entry
    }

    /// Builds an entry from a named property bag (GeoJSON feature properties)
    pub fn from_properties(properties: &serde_json::Map<String, serde_json::Value>) -> Self {
        let mut entry = Self::default();
        for field in EntryField::POSITIONAL {
            if let Some(value) = properties.get(field.wire_name()) {
                entry.set(field, Literal::from(value));
            }
        }
        entry
    }

    /// Stores a decoded value, coercing it to the field's type
    pub fn set(&mut self, field: EntryField, value: Literal) {
        if value.is_empty() {
            return;
        }

        let accepted = match field {
            EntryField::ExternalId => set_opt(&mut self.external_id, value.as_i64()),
            EntryField::Latitude => set_opt(&mut self.latitude, value.as_f64()),
            EntryField::Longitude => set_opt(&mut self.longitude, value.as_f64()),
            EntryField::Accuracy => set_opt(&mut self.accuracy, value.as_f64()),
            EntryField::Width => set_opt(&mut self.width, value.as_f64()),
            EntryField::Height => set_opt(&mut self.height, value.as_f64()),
            EntryField::Year => set_opt(&mut self.year, value.into_text()),
            EntryField::TopFolder => set_opt(&mut self.top_folder, value.into_text()),
            EntryField::SubFolder => set_opt(&mut self.sub_folder, value.into_text()),
            EntryField::Filename => set_opt(&mut self.filename, value.into_text()),
            EntryField::Flight => set_opt(&mut self.flight, value.into_text()),
            EntryField::PhotoNumber => set_opt(&mut self.photo_number, value.into_text()),
            EntryField::MapSheet => set_opt(&mut self.map_sheet, value.into_text()),
            EntryField::PhotoType => set_opt(&mut self.photo_type, value.into_text()),
            EntryField::Source => set_opt(&mut self.source, value.into_text()),
        };

        if !accepted {
            tracing::debug!("Dropping non-numeric value for field {:?}", field);
        }
    }

    /// Where the frame lives in the remote archive, if the path is usable
    ///
    /// Returns `None` when a component is missing or would escape the
    /// download root (empty, `.`, `..`, or containing a separator).
    pub fn archive_path(&self) -> Option<ArchivePath> {
        let top_folder = safe_component(self.top_folder.as_deref()?)?;
        let sub_folder = safe_component(self.sub_folder.as_deref()?)?;
        let filename = safe_component(self.filename.as_deref()?)?;

        Some(ArchivePath {
            top_folder,
            sub_folder,
            filename,
        })
    }
}

fn set_opt<T>(slot: &mut Option<T>, value: Option<T>) -> bool {
    let accepted = value.is_some();
    *slot = value;
    accepted
}

fn safe_component(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let unsafe_name = trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed.contains(['/', '\\', '\0']);

    if unsafe_name {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Two-level folder namespace plus filename identifying a frame's files
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArchivePath {
    pub top_folder: String,
    pub sub_folder: String,
    pub filename: String,
}

/// Pagination counters scraped from a search response
///
/// The service does not always emit all four; absent counters are 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaginationMeta {
    /// Total number of matching frames ("Leitud fotosid")
    pub total: u64,
    /// Page count reported by the service (`lk_nr`)
    pub pages: u64,
    /// Rows per request (`ridu`)
    pub rows: u64,
    /// Per-row limit (`limit`)
    pub limit: u64,
}
