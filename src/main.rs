use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use spotify_playlists_etl::config::{AppConfig, CliConfig, FileConfig, DEFAULT_DATA_DIR};
use spotify_playlists_etl::fetcher::{ArchiveSource, DatasetFetcher, KaggleClient, LocalArchiveSource};
use spotify_playlists_etl::logging::init_logging;
use spotify_playlists_etl::table::{csv_files_in, inspect_csv, InspectOptions};
use spotify_playlists_etl::{
    DocumentStore, MemoryDocumentStore, MongoDocumentStore, Pipeline, PipelineSettings,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

const DEFAULT_CONFIG_FILE: &str = "etl.toml";

/// Load the Kaggle Spotify playlists dataset into MongoDB.
#[derive(Parser, Debug)]
#[clap(version)]
struct CliArgs {
    /// Path to a TOML config file. Defaults to ./etl.toml when present.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Kaggle dataset identifier, owner/slug.
    #[clap(long)]
    pub dataset: Option<String>,

    /// Directory the archive is downloaded and extracted into.
    #[clap(long)]
    pub data_dir: Option<PathBuf>,

    /// Use a pre-downloaded archive instead of the Kaggle API.
    #[clap(long)]
    pub local_archive: Option<PathBuf>,

    /// Only load this CSV file from the data directory.
    #[clap(long)]
    pub csv_file: Option<String>,

    #[clap(long, env = "KAGGLE_USERNAME")]
    pub kaggle_username: Option<String>,

    #[clap(long, env = "KAGGLE_KEY", hide_env_values = true)]
    pub kaggle_key: Option<String>,

    /// Kaggle credentials file. Defaults to ~/.kaggle/kaggle.json.
    #[clap(long)]
    pub credentials_file: Option<PathBuf>,

    /// MongoDB connection string.
    #[clap(long, env = "MONGODB_CONNECTION_STRING", hide_env_values = true)]
    pub connection_string: Option<String>,

    #[clap(long)]
    pub database_name: Option<String>,

    /// Documents per bulk insert.
    #[clap(long)]
    pub batch_size: Option<usize>,

    /// "replace" drops the collections first, "append" keeps them.
    #[clap(long)]
    pub write_policy: Option<String>,

    /// "fail" aborts on malformed CSV rows, "skip" drops them.
    #[clap(long)]
    pub on_bad_rows: Option<String>,

    /// Log file path. Empty disables file logging.
    #[clap(long)]
    pub log_file: Option<String>,

    /// Run every stage but write to an in-memory store.
    #[clap(long)]
    pub dry_run: bool,

    /// Hide progress bars.
    #[clap(long)]
    pub no_progress: bool,

    #[clap(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report the structure and malformed rows of CSV files without loading anything.
    Inspect {
        /// Files to inspect. Defaults to every CSV in the data directory.
        paths: Vec<PathBuf>,

        /// Also print the raw text of this line and its neighbours.
        #[clap(long)]
        line: Option<u64>,

        /// Malformed rows listed per file, the rest are only counted.
        #[clap(long, default_value_t = 20)]
        max_bad_rows: usize,
    },
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            dataset: self.dataset.clone(),
            data_dir: self.data_dir.clone(),
            local_archive: self.local_archive.clone(),
            csv_file: self.csv_file.clone(),
            kaggle_username: self.kaggle_username.clone(),
            kaggle_key: self.kaggle_key.clone(),
            credentials_file: self.credentials_file.clone(),
            connection_string: self.connection_string.clone(),
            database_name: self.database_name.clone(),
            batch_size: self.batch_size,
            write_policy: self.write_policy.clone(),
            on_bad_rows: self.on_bad_rows.clone(),
            log_file: self.log_file.clone(),
            dry_run: self.dry_run,
            progress: !self.no_progress,
        }
    }
}

fn load_file_config(explicit: Option<&PathBuf>) -> Result<Option<FileConfig>> {
    match explicit {
        Some(path) => FileConfig::load(path).map(Some),
        None => {
            let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if default_path.is_file() {
                FileConfig::load(&default_path).map(Some)
            } else {
                Ok(None)
            }
        }
    }
}

fn build_source(config: &AppConfig) -> Result<Box<dyn ArchiveSource>> {
    let dataset = &config.dataset;
    if let Some(path) = &dataset.local_archive {
        info!("Using local archive {:?}", path);
        return Ok(Box::new(LocalArchiveSource::new(path)));
    }
    let client = KaggleClient::new(
        &dataset.api_base_url,
        dataset.download_timeout_sec,
        dataset.credentials.clone(),
        config.progress,
    )?;
    Ok(Box::new(client))
}

async fn build_store(config: &AppConfig) -> Result<Arc<dyn DocumentStore>> {
    if config.dry_run {
        warn!("Dry run: documents are written to memory and discarded");
        return Ok(Arc::new(MemoryDocumentStore::new()));
    }
    let database = &config.database;
    let connection_string = database
        .connection_string
        .as_deref()
        .context("connection_string is required unless running dry")?;
    let store = MongoDocumentStore::new(
        connection_string,
        &database.database_name,
        database.chunk_transactions,
    )
    .await?;
    Ok(Arc::new(store))
}

/// Print a report per CSV file. `Ok(false)` when no file could be inspected.
fn inspect(
    cli_args: &CliArgs,
    file_config: Option<FileConfig>,
    paths: &[PathBuf],
    options: &InspectOptions,
) -> Result<bool> {
    let paths = if paths.is_empty() {
        let data_dir = file_config
            .and_then(|f| f.dataset)
            .and_then(|d| d.data_dir)
            .map(PathBuf::from)
            .or_else(|| cli_args.data_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let found = csv_files_in(&data_dir)?;
        if found.is_empty() {
            warn!("No CSV files found in {:?}", data_dir);
        }
        found
    } else {
        paths.to_vec()
    };

    let mut inspected = 0;
    for path in &paths {
        match inspect_csv(path, options) {
            Ok(report) => {
                println!("{}", report);
                inspected += 1;
            }
            Err(err) => error!("Cannot inspect {:?}: {}", path, err),
        }
    }
    Ok(inspected > 0)
}

/// `Ok(false)` when the pipeline failed, which it has already logged.
async fn run(cli_args: CliArgs) -> Result<bool> {
    let file_config = load_file_config(cli_args.config.as_ref())?;

    if let Some(Command::Inspect {
        paths,
        line,
        max_bad_rows,
    }) = &cli_args.command
    {
        init_logging(None)?;
        let options = InspectOptions {
            max_bad_lines: *max_bad_rows,
            context_line: *line,
            ..Default::default()
        };
        return inspect(&cli_args, file_config, paths, &options);
    }
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)
        .context("Invalid configuration")?;

    init_logging(config.log_file.as_deref())?;

    info!(
        "Starting ETL of {} into database '{}'",
        config.dataset.id, config.database.database_name
    );
    if let Some(log_file) = &config.log_file {
        info!("Logging to {:?}", log_file);
    }

    let fetcher = DatasetFetcher::new(
        build_source(&config)?,
        config.dataset.id.clone(),
        &config.dataset.data_dir,
    );
    let store = build_store(&config).await?;
    let pipeline = Pipeline::new(fetcher, store, PipelineSettings::from_config(&config));

    Ok(pipeline.run().await.result.is_ok())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            eprintln!("Failed to load .env file: {}", err);
            return ExitCode::FAILURE;
        }
    }
    let cli_args = CliArgs::parse();

    match run(cli_args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            // Logging may not be up yet when configuration fails
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
