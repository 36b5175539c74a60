//! Query descriptions for the archive endpoints

/// Hard maximum page size enforced by the search endpoint
pub const MAX_PAGE_SIZE: u32 = 60;

/// Page size used when the caller does not ask for one
pub const DEFAULT_PAGE_SIZE: u32 = 30;

/// Viewport the search page is rendered for; the service expects both values
const VIEWPORT_WIDTH: f64 = 611.4;
const VIEWPORT_HEIGHT: f64 = 739.2;

/// Survey epoch passed to the nearest-frame endpoint
pub const DEFAULT_SURVEY_EPOCH: &str = "1963";

/// Search criteria for the paginated search endpoint
///
/// The page size is clamped to [`MAX_PAGE_SIZE`] on construction; the
/// service would cap it anyway.
///
/// # Example
///
/// ```
/// use fotoladu_ingest::archive::QuerySpec;
///
/// let spec = QuerySpec::new().with_photo_number(532).with_page_size(500);
/// assert_eq!(spec.page_size(), 60);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    photo_number: Option<u64>,
    year: Option<String>,
    map_sheet: Option<String>,
    flight: Option<String>,
    photo_type: Option<String>,
    source: Option<String>,
    directory: Option<String>,
    page_size: u32,
    offset: u64,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            photo_number: None,
            year: None,
            map_sheet: None,
            flight: None,
            photo_type: None,
            source: None,
            directory: None,
            page_size: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Search for every frame stored under an archive directory, at the maximum page size
    pub fn for_directory(directory: impl Into<String>) -> Self {
        Self::new().with_directory(directory).with_page_size(MAX_PAGE_SIZE)
    }

    pub fn with_photo_number(mut self, photo_number: u64) -> Self {
        self.photo_number = Some(photo_number);
        self
    }

    pub fn with_year(mut self, year: impl Into<String>) -> Self {
        self.year = Some(year.into());
        self
    }

    pub fn with_map_sheet(mut self, map_sheet: impl Into<String>) -> Self {
        self.map_sheet = Some(map_sheet.into());
        self
    }

    pub fn with_flight(mut self, flight: impl Into<String>) -> Self {
        self.flight = Some(flight.into());
        self
    }

    pub fn with_photo_type(mut self, photo_type: impl Into<String>) -> Self {
        self.photo_type = Some(photo_type.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_directory(mut self, directory: impl Into<String>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.min(MAX_PAGE_SIZE);
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// The same criteria positioned at another result offset
    pub fn at_offset(&self, offset: u64) -> Self {
        self.clone().with_offset(offset)
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Query-string pairs in wire names; unset criteria are omitted
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(11);

        if let Some(n) = self.photo_number {
            pairs.push(("foto_nr", n.to_string()));
        }

        let optional = [
            ("aasta", &self.year),
            ("kaardileht", &self.map_sheet),
            ("lennu_nr", &self.flight),
            ("foto_tyyp", &self.photo_type),
            ("allikas", &self.source),
            ("sailiku_nr", &self.directory),
        ];
        for (key, value) in optional {
            if let Some(v) = value {
                pairs.push((key, v.clone()));
            }
        }

        pairs.push(("w", VIEWPORT_WIDTH.to_string()));
        pairs.push(("h", VIEWPORT_HEIGHT.to_string()));
        pairs.push(("start", self.offset.to_string()));
        pairs.push(("lkcount", self.page_size.to_string()));
        pairs
    }
}

/// Bounding-box query for the GeoJSON endpoint
///
/// `a_*` is the south-west corner and `u_*` the north-east corner.
#[derive(Debug, Clone, PartialEq)]
pub struct BBoxQuery {
    pub year: Option<String>,
    pub a_lat: f64,
    pub a_lng: f64,
    pub u_lat: f64,
    pub u_lng: f64,
    /// Map zoom level the service clusters for
    pub zoom: u8,
    pub archive: String,
}

impl BBoxQuery {
    pub fn new(a_lat: f64, a_lng: f64, u_lat: f64, u_lng: f64) -> Self {
        Self {
            year: None,
            a_lat,
            a_lng,
            u_lat,
            u_lng,
            zoom: 9,
            archive: "arhiiv".to_string(),
        }
    }

    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(7);
        if let Some(year) = &self.year {
            pairs.push(("aasta", year.clone()));
        }
        pairs.push(("a_lat", self.a_lat.to_string()));
        pairs.push(("a_lng", self.a_lng.to_string()));
        pairs.push(("u_lat", self.u_lat.to_string()));
        pairs.push(("u_lng", self.u_lng.to_string()));
        pairs.push(("m", self.zoom.to_string()));
        pairs.push(("arhiiv", self.archive.clone()));
        pairs
    }
}

/// Nearest-frame lookup around a point
#[derive(Debug, Clone, PartialEq)]
pub struct NearestQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub year: Option<String>,
    pub epoch: String,
}

impl NearestQuery {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            year: None,
            epoch: DEFAULT_SURVEY_EPOCH.to_string(),
        }
    }

    /// The endpoint keys on the year, so an unset year is sent empty
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("B", self.latitude.to_string()),
            ("L", self.longitude.to_string()),
            ("leier", self.epoch.clone()),
            ("aasta", self.year.clone().unwrap_or_default()),
        ]
    }
}
