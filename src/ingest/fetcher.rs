//! Image materialization into the local archive tree
//!
//! Files live at `<root>/<top-folder>/<sub-folder>/<variant>/<filename>`.
//! A file that already exists is never fetched again, so a rerun over the
//! same results costs no image traffic.

use crate::archive::{ArchiveClient, ArchivePath};
use crate::Result;
use std::path::{Path, PathBuf};

/// Variant fetched alongside the primary one for every frame
pub const THUMBNAIL_VARIANT: &str = "thumbs";

/// Result of materializing one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Materialized {
    /// Local path of the primary variant; the one recorded in the database
    pub primary: PathBuf,
    /// Files written by this call (0 when everything was already present)
    pub downloaded: u32,
}

/// Downloads the primary and thumbnail variants of frames on demand
#[derive(Debug, Clone)]
pub struct ImageFetcher {
    client: ArchiveClient,
    root: PathBuf,
    primary_variant: String,
}

impl ImageFetcher {
    pub fn new(client: ArchiveClient, root: impl Into<PathBuf>, primary_variant: &str) -> Self {
        Self {
            client,
            root: root.into(),
            primary_variant: primary_variant.to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local destination of one variant of a frame
    pub fn destination(&self, path: &ArchivePath, variant: &str) -> PathBuf {
        self.root
            .join(&path.top_folder)
            .join(&path.sub_folder)
            .join(variant)
            .join(&path.filename)
    }

    /// Ensures both variants of a frame exist locally
    ///
    /// The thumbnail is skipped when the primary variant is itself the
    /// thumbnail. Any download failure is returned as is; nothing is retried.
    pub async fn materialize(&self, path: &ArchivePath) -> Result<Materialized> {
        let mut downloaded = 0;

        let (primary, fetched) = self.ensure_variant(path, &self.primary_variant).await?;
        downloaded += u32::from(fetched);

        if self.primary_variant != THUMBNAIL_VARIANT {
            let (_, fetched) = self.ensure_variant(path, THUMBNAIL_VARIANT).await?;
            downloaded += u32::from(fetched);
        }

        Ok(Materialized {
            primary,
            downloaded,
        })
    }

    /// Returns the local path and whether a download was needed
    async fn ensure_variant(&self, path: &ArchivePath, variant: &str) -> Result<(PathBuf, bool)> {
        let dest = self.destination(path, variant);

        if tokio::fs::try_exists(&dest).await? {
            tracing::debug!("Skipping download, {} exists", dest.display());
            return Ok((dest, false));
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let url = self.client.image_url(path, variant)?;
        tracing::debug!("Downloading {} -> {}", url, dest.display());
        let bytes = self.client.download(&url).await?;

        // Written beside the target and renamed, so a crash never leaves a
        // truncated file under the final name
        let partial = partial_path(&dest);
        tokio::fs::write(&partial, &bytes).await?;
        tokio::fs::rename(&partial, &dest).await?;

        Ok((dest, true))
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}
