//! HTTP client for the Kaggle dataset download API.

use super::{ArchiveSource, DatasetId};
use crate::error::EtlError;
use crate::progress::bytes_bar;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::StatusCode;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Kaggle API credentials.
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct KaggleCredentials {
    pub username: String,
    pub key: String,
}

impl fmt::Debug for KaggleCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KaggleCredentials")
            .field("username", &self.username)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Where credentials may come from, resolved only when a download happens.
#[derive(Clone, Debug, Default)]
pub struct CredentialSource {
    pub username: Option<String>,
    pub key: Option<String>,
    pub credentials_file: Option<PathBuf>,
}

impl CredentialSource {
    /// Explicit username and key win, then the credentials file.
    pub fn resolve(&self) -> Result<KaggleCredentials, EtlError> {
        if let (Some(username), Some(key)) = (&self.username, &self.key) {
            if !username.is_empty() && !key.is_empty() {
                return Ok(KaggleCredentials {
                    username: username.clone(),
                    key: key.clone(),
                });
            }
        }

        let Some(path) = &self.credentials_file else {
            return Err(EtlError::authentication(
                "no Kaggle credentials found, set KAGGLE_USERNAME and KAGGLE_KEY",
            ));
        };
        if !path.is_file() {
            return Err(EtlError::authentication(format!(
                "no Kaggle credentials found, set KAGGLE_USERNAME and KAGGLE_KEY or create {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            EtlError::authentication(format!("cannot read {}: {}", path.display(), e))
        })?;
        let credentials: KaggleCredentials = serde_json::from_str(&content).map_err(|e| {
            EtlError::authentication(format!("malformed credentials file {}: {}", path.display(), e))
        })?;
        debug!("Using Kaggle credentials from {}", path.display());
        Ok(credentials)
    }
}

/// The default credentials file, `~/.kaggle/kaggle.json`.
pub fn default_credentials_file() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".kaggle").join("kaggle.json"))
}

/// Downloads dataset archives from Kaggle.
pub struct KaggleClient {
    client: reqwest::Client,
    base_url: String,
    credentials: CredentialSource,
    show_progress: bool,
}

impl KaggleClient {
    pub fn new(
        base_url: &str,
        timeout_sec: u64,
        credentials: CredentialSource,
        show_progress: bool,
    ) -> Result<Self, EtlError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_sec))
            .build()
            .map_err(|e| EtlError::download(format!("failed to create HTTP client: {}", e)))?;

        // Ensure base_url doesn't have trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            credentials,
            show_progress,
        })
    }

    pub fn download_url(&self, dataset: &DatasetId) -> String {
        format!(
            "{}/datasets/download/{}/{}",
            self.base_url, dataset.owner, dataset.slug
        )
    }
}

#[async_trait]
impl ArchiveSource for KaggleClient {
    fn describe(&self) -> String {
        format!("Kaggle API at {}", self.base_url)
    }

    async fn fetch_archive(&self, dataset: &DatasetId, dest: &Path) -> Result<u64, EtlError> {
        let credentials = self.credentials.resolve()?;
        let url = self.download_url(dataset);
        info!("Downloading dataset {} from {}", dataset, url);

        let response = self
            .client
            .get(&url)
            .basic_auth(&credentials.username, Some(&credentials.key))
            .send()
            .await
            .map_err(|e| EtlError::download(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(EtlError::authentication(format!(
                "Kaggle rejected credentials for user '{}': status {}",
                credentials.username, status
            )));
        }
        if !status.is_success() {
            return Err(EtlError::download(format!(
                "download of {} failed with status: {}",
                dataset, status
            )));
        }

        let bar = bytes_bar(
            response.content_length().unwrap_or(0),
            self.show_progress,
            dataset.to_string(),
        );
        let mut file = File::create(dest)
            .await
            .map_err(|e| EtlError::download(format!("cannot create {}: {}", dest.display(), e)))?;

        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| EtlError::download(format!("failed to read response body: {}", e)))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| EtlError::download(format!("failed to write {}: {}", dest.display(), e)))?;
            written += chunk.len() as u64;
            bar.inc(chunk.len() as u64);
        }
        file.flush()
            .await
            .map_err(|e| EtlError::download(format!("failed to flush {}: {}", dest.display(), e)))?;
        bar.finish_and_clear();

        Ok(written)
    }
}
