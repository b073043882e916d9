use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Top level (can override CLI)
    pub log_file: Option<String>,
    pub dry_run: Option<bool>,
    pub progress: Option<bool>,

    // Sections
    pub dataset: Option<DatasetConfig>,
    pub database: Option<DatabaseConfig>,
    pub loader: Option<LoaderConfig>,
    pub columns: Option<ColumnsConfig>,
    pub cleaning: Option<CleaningConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct DatasetConfig {
    /// `owner/slug`
    pub id: Option<String>,
    pub api_base_url: Option<String>,
    pub credentials_file: Option<String>,
    pub data_dir: Option<String>,
    /// Read only this file instead of every extracted CSV.
    pub csv_file: Option<String>,
    /// Copy the archive from here instead of downloading it.
    pub local_archive: Option<String>,
    pub download_timeout_sec: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub connection_string: Option<String>,
    pub database_name: Option<String>,
    pub playlists_collection: Option<String>,
    pub tracks_collection: Option<String>,
    pub batch_size: Option<usize>,
    /// "replace" or "append"
    pub write_policy: Option<String>,
    pub chunk_transactions: Option<bool>,
    pub create_indexes: Option<bool>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct LoaderConfig {
    /// "fail" or "skip"
    pub on_bad_rows: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ColumnsConfig {
    pub owner: Option<String>,
    pub playlist_name: Option<String>,
    pub artist: Option<String>,
    pub title: Option<String>,
    pub playlist_id: Option<String>,
    pub track_id: Option<String>,
    pub album: Option<String>,
    pub added_at: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct CleaningConfig {
    /// "natural_key" or "full_row"
    pub dedup: Option<String>,
    /// column = default text for null cells
    pub impute: Option<BTreeMap<String, String>>,
    /// column = [min, max], merged over the default ranges
    pub ranges: Option<BTreeMap<String, [f64; 2]>>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
