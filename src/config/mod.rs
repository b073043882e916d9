mod file_config;

pub use file_config::{
    CleaningConfig, ColumnsConfig, DatabaseConfig, DatasetConfig, FileConfig, LoaderConfig,
};

use crate::cleaning::{default_ranges, CleaningRules, ValueRange};
use crate::fetcher::{default_credentials_file, CredentialSource, DatasetId};
use crate::mapping::{ColumnMap, DedupMode};
use crate::store::WritePolicy;
use crate::table::BadRowPolicy;
use anyhow::{anyhow, bail, Result};
use std::path::PathBuf;

pub const DEFAULT_DATASET: &str = "andrewmvd/spotify-playlists";
pub const DEFAULT_API_BASE_URL: &str = "https://www.kaggle.com/api/v1";
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_DATABASE_NAME: &str = "spotify_music_db";
pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_LOG_FILE: &str = "etl_spotify.log";
pub const DEFAULT_DOWNLOAD_TIMEOUT_SEC: u64 = 3600;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub dataset: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub local_archive: Option<PathBuf>,
    pub csv_file: Option<String>,
    pub kaggle_username: Option<String>,
    pub kaggle_key: Option<String>,
    pub credentials_file: Option<PathBuf>,
    pub connection_string: Option<String>,
    pub database_name: Option<String>,
    pub batch_size: Option<usize>,
    pub write_policy: Option<String>,
    pub on_bad_rows: Option<String>,
    pub log_file: Option<String>,
    pub dry_run: bool,
    pub progress: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub dataset: DatasetSettings,
    pub database: DatabaseSettings,
    pub on_bad_rows: BadRowPolicy,
    pub columns: ColumnMap,
    pub cleaning: CleaningRules,
    /// `None` disables the log file.
    pub log_file: Option<PathBuf>,
    pub dry_run: bool,
    pub progress: bool,
}

#[derive(Debug, Clone)]
pub struct DatasetSettings {
    pub id: DatasetId,
    pub api_base_url: String,
    pub credentials: CredentialSource,
    pub data_dir: PathBuf,
    pub csv_file: Option<String>,
    pub local_archive: Option<PathBuf>,
    pub download_timeout_sec: u64,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    /// Required unless running dry.
    pub connection_string: Option<String>,
    pub database_name: String,
    pub playlists_collection: String,
    pub tracks_collection: String,
    pub batch_size: usize,
    pub write_policy: WritePolicy,
    pub chunk_transactions: bool,
    pub create_indexes: bool,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present, except for the
    /// `--dry-run` and `--no-progress` switches, which always apply.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();
        let dataset_file = file.dataset.unwrap_or_default();
        let database_file = file.database.unwrap_or_default();
        let loader_file = file.loader.unwrap_or_default();
        let columns_file = file.columns.unwrap_or_default();
        let cleaning_file = file.cleaning.unwrap_or_default();

        // The CLI flags only ever switch these away from their defaults,
        // so a flag that was passed wins over the file
        let dry_run = cli.dry_run || file.dry_run.unwrap_or(false);
        let progress = cli.progress && file.progress.unwrap_or(true);

        // An empty value turns the file layer off
        let log_file = file
            .log_file
            .or_else(|| cli.log_file.clone())
            .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string());
        let log_file = (!log_file.trim().is_empty()).then(|| PathBuf::from(log_file));

        let dataset = resolve_dataset(cli, dataset_file)?;
        let database = resolve_database(cli, database_file, dry_run)?;

        let on_bad_rows = match loader_file.on_bad_rows.or_else(|| cli.on_bad_rows.clone()) {
            Some(s) => BadRowPolicy::parse(&s)
                .ok_or_else(|| anyhow!("on_bad_rows must be 'fail' or 'skip', got '{}'", s))?,
            None => BadRowPolicy::default(),
        };

        let columns = resolve_columns(columns_file);
        let cleaning = resolve_cleaning(&columns, cleaning_file)?;

        Ok(Self {
            dataset,
            database,
            on_bad_rows,
            columns,
            cleaning,
            log_file,
            dry_run,
            progress,
        })
    }
}

fn resolve_dataset(cli: &CliConfig, file: DatasetConfig) -> Result<DatasetSettings> {
    let raw_id = file
        .id
        .or_else(|| cli.dataset.clone())
        .unwrap_or_else(|| DEFAULT_DATASET.to_string());
    let id = DatasetId::parse(&raw_id)
        .ok_or_else(|| anyhow!("Dataset id must look like 'owner/slug', got '{}'", raw_id))?;

    let credentials_file = file
        .credentials_file
        .map(PathBuf::from)
        .or_else(|| cli.credentials_file.clone())
        .or_else(default_credentials_file);

    Ok(DatasetSettings {
        id,
        api_base_url: file
            .api_base_url
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
        credentials: CredentialSource {
            username: cli.kaggle_username.clone(),
            key: cli.kaggle_key.clone(),
            credentials_file,
        },
        data_dir: file
            .data_dir
            .map(PathBuf::from)
            .or_else(|| cli.data_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
        csv_file: file.csv_file.or_else(|| cli.csv_file.clone()),
        local_archive: file
            .local_archive
            .map(PathBuf::from)
            .or_else(|| cli.local_archive.clone()),
        download_timeout_sec: file
            .download_timeout_sec
            .unwrap_or(DEFAULT_DOWNLOAD_TIMEOUT_SEC),
    })
}

fn resolve_database(cli: &CliConfig, file: DatabaseConfig, dry_run: bool) -> Result<DatabaseSettings> {
    let connection_string = file
        .connection_string
        .or_else(|| cli.connection_string.clone())
        .filter(|s| !s.trim().is_empty());
    if connection_string.is_none() && !dry_run {
        bail!(
            "connection_string must be specified via MONGODB_CONNECTION_STRING, \
             --connection-string or in config file (or use --dry-run)"
        );
    }

    let batch_size = file
        .batch_size
        .or(cli.batch_size)
        .unwrap_or(DEFAULT_BATCH_SIZE);
    if batch_size == 0 {
        bail!("batch_size must be at least 1");
    }

    let write_policy = match file.write_policy.or_else(|| cli.write_policy.clone()) {
        Some(s) => WritePolicy::parse(&s)
            .ok_or_else(|| anyhow!("write_policy must be 'replace' or 'append', got '{}'", s))?,
        None => WritePolicy::default(),
    };

    let playlists_collection = file
        .playlists_collection
        .unwrap_or_else(|| "playlists".to_string());
    let tracks_collection = file
        .tracks_collection
        .unwrap_or_else(|| "tracks".to_string());
    if playlists_collection == tracks_collection {
        bail!(
            "playlists_collection and tracks_collection must differ, both are '{}'",
            tracks_collection
        );
    }

    Ok(DatabaseSettings {
        connection_string,
        database_name: file
            .database_name
            .or_else(|| cli.database_name.clone())
            .unwrap_or_else(|| DEFAULT_DATABASE_NAME.to_string()),
        playlists_collection,
        tracks_collection,
        batch_size,
        write_policy,
        chunk_transactions: file.chunk_transactions.unwrap_or(false),
        create_indexes: file.create_indexes.unwrap_or(true),
    })
}

fn resolve_columns(file: ColumnsConfig) -> ColumnMap {
    let defaults = ColumnMap::default();
    ColumnMap {
        owner: file.owner.unwrap_or(defaults.owner),
        playlist_name: file.playlist_name.unwrap_or(defaults.playlist_name),
        artist: file.artist.unwrap_or(defaults.artist),
        title: file.title.unwrap_or(defaults.title),
        playlist_id: file.playlist_id.unwrap_or(defaults.playlist_id),
        track_id: file.track_id.unwrap_or(defaults.track_id),
        album: file.album.unwrap_or(defaults.album),
        added_at: file.added_at.unwrap_or(defaults.added_at),
    }
}

fn resolve_cleaning(columns: &ColumnMap, file: CleaningConfig) -> Result<CleaningRules> {
    let dedup = match file.dedup {
        Some(s) => DedupMode::parse(&s)
            .ok_or_else(|| anyhow!("dedup must be 'natural_key' or 'full_row', got '{}'", s))?,
        None => DedupMode::default(),
    };

    let mut ranges = default_ranges();
    for (column, [min, max]) in file.ranges.unwrap_or_default() {
        if min > max {
            bail!("Range for '{}' has min {} greater than max {}", column, min, max);
        }
        ranges.insert(column, ValueRange::new(min, max));
    }

    Ok(columns.cleaning_rules(dedup, file.impute.unwrap_or_default(), ranges))
}
