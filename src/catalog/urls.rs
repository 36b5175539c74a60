//! Public URLs for stored frames
//!
//! A stored path points at the primary variant under the download root. The
//! same relative path is looked up under the corrected root, and the variant
//! folder is swapped for the thumbnail one, to offer every rendition that is
//! actually on disk.

use crate::config::StorageConfig;
use crate::ingest::THUMBNAIL_VARIANT;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};

/// Components of a stored path below the download root: top, sub, variant, file
const RELATIVE_DEPTH: usize = 4;

/// URL set attached to a catalog record; absent renditions are empty strings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageUrls {
    /// Preferred rendition: corrected, then raw, then thumbnail
    pub url: String,
    pub url_corrected: String,
    pub url_raw: String,
    pub url_thumb: String,
}

/// Where renditions live on disk and under which public prefix they are served
#[derive(Debug, Clone)]
pub struct UrlLayout {
    pub raw_root: PathBuf,
    pub corrected_root: PathBuf,
    pub url_prefix: String,
}

impl UrlLayout {
    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            raw_root: PathBuf::from(&config.download_root),
            corrected_root: PathBuf::from(&config.corrected_root),
            url_prefix: "/data".to_string(),
        }
    }

    /// Builds the URL set for a stored primary path
    pub fn urls_for(&self, stored_path: &str) -> ImageUrls {
        let relative = self.relative_parts(Path::new(stored_path));

        let url_raw = self.url("raw", &relative);

        let url_corrected = if self.corrected_root.join(join_parts(&relative)).exists() {
            self.url("corrected", &relative)
        } else {
            String::new()
        };

        let url_thumb = match thumbnail_parts(&relative) {
            Some(thumb) if self.raw_root.join(join_parts(&thumb)).exists() => {
                self.url("raw", &thumb)
            }
            _ => String::new(),
        };

        let url = [&url_corrected, &url_raw, &url_thumb]
            .into_iter()
            .find(|candidate| !candidate.is_empty())
            .cloned()
            .unwrap_or_default();

        ImageUrls {
            url,
            url_corrected,
            url_raw,
            url_thumb,
        }
    }

    /// Path components below the download root
    ///
    /// Paths recorded from another working directory do not share the root
    /// prefix; for those the trailing top/sub/variant/file components are used.
    fn relative_parts(&self, stored: &Path) -> Vec<String> {
        let source = stored.strip_prefix(&self.raw_root).unwrap_or(stored);
        let parts: Vec<String> = source
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        if source == stored && parts.len() > RELATIVE_DEPTH {
            parts[parts.len() - RELATIVE_DEPTH..].to_vec()
        } else {
            parts
        }
    }

    fn url(&self, tree: &str, parts: &[String]) -> String {
        format!("{}/{}/{}", self.url_prefix, tree, parts.join("/"))
    }
}

fn join_parts(parts: &[String]) -> PathBuf {
    parts.iter().collect()
}

/// The same path with its variant folder replaced by the thumbnail folder
fn thumbnail_parts(parts: &[String]) -> Option<Vec<String>> {
    if parts.len() < 2 {
        return None;
    }
    let mut thumb = parts.to_vec();
    let variant = thumb.len() - 2;
    thumb[variant] = THUMBNAIL_VARIANT.to_string();
    Some(thumb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const REL: &str = "ka/1985_K150/reduced/670.jpg";

    fn layout(dir: &TempDir) -> UrlLayout {
        UrlLayout {
            raw_root: dir.path().join("raw"),
            corrected_root: dir.path().join("corrected"),
            url_prefix: "/data".to_string(),
        }
    }

    fn touch(path: PathBuf) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"jpg").unwrap();
    }

    #[test]
    fn test_raw_only() {
        let dir = TempDir::new().unwrap();
        let layout = layout(&dir);
        let stored = layout.raw_root.join(REL);
        touch(stored.clone());

        let urls = layout.urls_for(&stored.to_string_lossy());
        assert_eq!(urls.url_raw, "/data/raw/ka/1985_K150/reduced/670.jpg");
        assert_eq!(urls.url, urls.url_raw);
        assert_eq!(urls.url_corrected, "");
        assert_eq!(urls.url_thumb, "");
    }

    #[test]
    fn test_corrected_and_thumb_present() {
        let dir = TempDir::new().unwrap();
        let layout = layout(&dir);
        let stored = layout.raw_root.join(REL);
        touch(stored.clone());
        touch(layout.corrected_root.join(REL));
        touch(layout.raw_root.join("ka/1985_K150/thumbs/670.jpg"));

        let urls = layout.urls_for(&stored.to_string_lossy());
        assert_eq!(urls.url_corrected, "/data/corrected/ka/1985_K150/reduced/670.jpg");
        assert_eq!(urls.url_thumb, "/data/raw/ka/1985_K150/thumbs/670.jpg");
        assert_eq!(urls.url, urls.url_corrected);
    }

    #[test]
    fn test_foreign_prefix_keeps_trailing_components() {
        let dir = TempDir::new().unwrap();
        let layout = layout(&dir);

        let urls = layout.urls_for("/srv/old/data/raw/ka/1985_K150/reduced/670.jpg");
        assert_eq!(urls.url_raw, "/data/raw/ka/1985_K150/reduced/670.jpg");
    }

    #[test]
    fn test_thumbnail_parts() {
        let parts: Vec<String> = REL.split('/').map(String::from).collect();
        assert_eq!(
            thumbnail_parts(&parts).unwrap().join("/"),
            "ka/1985_K150/thumbs/670.jpg"
        );
        assert_eq!(thumbnail_parts(&["x.jpg".to_string()]), None);
    }
}
