//! Retrieves the dataset archive and unpacks it into the data directory.

mod archive;
mod kaggle;

pub use archive::{extract_archive, is_csv, ExtractReport};
pub use kaggle::{default_credentials_file, CredentialSource, KaggleClient, KaggleCredentials};

use crate::error::EtlError;
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

/// A dataset identifier of the form `owner/slug`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetId {
    pub owner: String,
    pub slug: String,
}

impl DatasetId {
    /// Both parts must be non-empty and free of further slashes.
    pub fn parse(s: &str) -> Option<Self> {
        let (owner, slug) = s.trim().split_once('/')?;
        if owner.is_empty() || slug.is_empty() || slug.contains('/') {
            return None;
        }
        Some(Self {
            owner: owner.to_string(),
            slug: slug.to_string(),
        })
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.slug)
    }
}

/// Somewhere a dataset archive can be obtained from.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// Human-readable name for logs.
    fn describe(&self) -> String;

    /// Write the archive for `dataset` to `dest`. Returns the bytes written.
    async fn fetch_archive(&self, dataset: &DatasetId, dest: &Path) -> Result<u64, EtlError>;
}

/// Copies a pre-downloaded archive from the local filesystem.
pub struct LocalArchiveSource {
    path: PathBuf,
}

impl LocalArchiveSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ArchiveSource for LocalArchiveSource {
    fn describe(&self) -> String {
        format!("local archive {}", self.path.display())
    }

    async fn fetch_archive(&self, _dataset: &DatasetId, dest: &Path) -> Result<u64, EtlError> {
        tokio::fs::copy(&self.path, dest).await.map_err(|e| {
            EtlError::download(format!("cannot copy {}: {}", self.path.display(), e))
        })
    }
}

/// Result of a fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchOutcome {
    pub archive_path: PathBuf,
    /// False when the archive was already present.
    pub downloaded: bool,
    pub extraction: ExtractReport,
}

pub struct DatasetFetcher {
    source: Box<dyn ArchiveSource>,
    dataset: DatasetId,
    data_dir: PathBuf,
}

impl DatasetFetcher {
    pub fn new(source: Box<dyn ArchiveSource>, dataset: DatasetId, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            source,
            dataset,
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// `<data_dir>/<slug>.zip`
    pub fn archive_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.zip", self.dataset.slug))
    }

    /// Make sure the archive exists locally and is extracted.
    ///
    /// Nothing is downloaded when the archive is already present.
    pub async fn fetch(&self) -> Result<FetchOutcome, EtlError> {
        tokio::fs::create_dir_all(&self.data_dir).await.map_err(|e| {
            EtlError::download(format!(
                "cannot create data directory {}: {}",
                self.data_dir.display(),
                e
            ))
        })?;

        let archive_path = self.archive_path();
        let downloaded = if tokio::fs::try_exists(&archive_path).await.unwrap_or(false) {
            info!(
                "Archive {} already present, skipping download",
                archive_path.display()
            );
            false
        } else {
            self.download(&archive_path).await?;
            true
        };

        let extraction = extract_archive(&archive_path, &self.data_dir)?;
        Ok(FetchOutcome {
            archive_path,
            downloaded,
            extraction,
        })
    }

    async fn download(&self, archive_path: &Path) -> Result<(), EtlError> {
        let part_path = archive_path.with_extension("zip.part");
        info!(
            "Fetching {} from {}",
            self.dataset,
            self.source.describe()
        );

        if let Err(err) = self.source.fetch_archive(&self.dataset, &part_path).await {
            let _ = tokio::fs::remove_file(&part_path).await;
            return Err(err);
        }

        tokio::fs::rename(&part_path, archive_path).await.map_err(|e| {
            EtlError::download(format!(
                "cannot move {} into place: {}",
                part_path.display(),
                e
            ))
        })?;
        let size = tokio::fs::metadata(archive_path)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        info!("Saved {} ({} bytes)", archive_path.display(), size);
        Ok(())
    }
}
