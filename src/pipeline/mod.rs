//! Runs fetch, load, clean, map and write in sequence.

mod state;

pub use state::PipelineState;

use crate::batch::{BatchLoader, LoadReport};
use crate::cleaning::{clean, CleaningReport, CleaningRules};
use crate::config::AppConfig;
use crate::error::EtlError;
use crate::fetcher::{DatasetFetcher, FetchOutcome};
use crate::mapping::{map_records, ColumnMap, MappedRecords};
use crate::store::{playlist_indexes, track_indexes, DocumentStore, WritePolicy};
use crate::table::{load_tables, BadRowPolicy, LoadStats, Table};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Everything the stages after fetching need.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Read only this file, relative to the data directory.
    pub csv_file: Option<String>,
    pub on_bad_rows: BadRowPolicy,
    pub columns: ColumnMap,
    pub cleaning: CleaningRules,
    pub playlists_collection: String,
    pub tracks_collection: String,
    pub batch_size: usize,
    pub write_policy: WritePolicy,
    pub create_indexes: bool,
    pub progress: bool,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            csv_file: config.dataset.csv_file.clone(),
            on_bad_rows: config.on_bad_rows,
            columns: config.columns.clone(),
            cleaning: config.cleaning.clone(),
            playlists_collection: config.database.playlists_collection.clone(),
            tracks_collection: config.database.tracks_collection.clone(),
            batch_size: config.database.batch_size,
            write_policy: config.database.write_policy,
            create_indexes: config.database.create_indexes,
            progress: config.progress,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSummary {
    pub collection: String,
    /// Written by this run.
    pub inserted: u64,
    /// In the collection after this run.
    pub total: u64,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub downloaded: bool,
    pub load: LoadStats,
    pub cleaning: CleaningReport,
    pub playlists: CollectionSummary,
    pub tracks: CollectionSummary,
    pub elapsed: Duration,
}

/// A finished run: the states it went through and how it ended.
#[derive(Debug)]
pub struct PipelineRun {
    /// Every state entered, starting with `Idle`.
    pub history: Vec<PipelineState>,
    pub result: Result<RunSummary, EtlError>,
}

impl PipelineRun {
    pub fn final_state(&self) -> PipelineState {
        self.history.last().copied().unwrap_or(PipelineState::Idle)
    }
}

pub struct Pipeline {
    fetcher: DatasetFetcher,
    store: Arc<dyn DocumentStore>,
    settings: PipelineSettings,
    state: PipelineState,
    history: Vec<PipelineState>,
}

impl Pipeline {
    pub fn new(fetcher: DatasetFetcher, store: Arc<dyn DocumentStore>, settings: PipelineSettings) -> Self {
        Self {
            fetcher,
            store,
            settings,
            state: PipelineState::Idle,
            history: vec![PipelineState::Idle],
        }
    }

    /// Run every stage once. Consuming the pipeline keeps a run from
    /// re-entering states it already left.
    pub async fn run(mut self) -> PipelineRun {
        let started = Instant::now();
        let result = match self.run_stages(started).await {
            Ok(summary) => {
                self.enter(PipelineState::Done);
                info!(
                    "ETL finished in {:.1?}: '{}' +{} ({} total), '{}' +{} ({} total)",
                    summary.elapsed,
                    summary.playlists.collection,
                    summary.playlists.inserted,
                    summary.playlists.total,
                    summary.tracks.collection,
                    summary.tracks.inserted,
                    summary.tracks.total
                );
                Ok(summary)
            }
            Err(err) => {
                let failed_in = self.state;
                self.enter(PipelineState::Failed);
                error!(
                    "ETL failed in {} stage ({}): {}",
                    failed_in,
                    err.kind(),
                    err
                );
                Err(err)
            }
        };
        PipelineRun {
            history: self.history,
            result,
        }
    }

    async fn run_stages(&mut self, started: Instant) -> Result<RunSummary, EtlError> {
        self.enter(PipelineState::Fetching);
        let outcome = self.fetcher.fetch().await?;

        self.enter(PipelineState::Loading);
        let files = self.select_files(&outcome)?;
        let (table, load) = load_tables(&files, self.settings.on_bad_rows)?;

        self.enter(PipelineState::Cleaning);
        let (table, cleaning) = clean(table, &self.settings.cleaning);

        self.enter(PipelineState::Mapping);
        let records = self.map(&table)?;
        drop(table);

        self.enter(PipelineState::Writing);
        let (playlists, tracks) = self.write(&records).await?;

        Ok(RunSummary {
            downloaded: outcome.downloaded,
            load,
            cleaning,
            playlists,
            tracks,
            elapsed: started.elapsed(),
        })
    }

    fn enter(&mut self, target: PipelineState) {
        if !self.state.can_transition_to(target) {
            warn!("Ignoring transition from {} to {}", self.state, target);
            return;
        }
        info!("Pipeline state: {} -> {}", self.state, target);
        self.state = target;
        self.history.push(target);
    }

    fn select_files(&self, outcome: &FetchOutcome) -> Result<Vec<PathBuf>, EtlError> {
        if let Some(name) = &self.settings.csv_file {
            return Ok(vec![self.fetcher.data_dir().join(name)]);
        }
        if outcome.extraction.csv_files.is_empty() {
            return Err(EtlError::parse(format!(
                "no CSV files found in {}",
                outcome.archive_path.display()
            )));
        }
        Ok(outcome.extraction.csv_files.clone())
    }

    fn map(&self, table: &Table) -> Result<MappedRecords, EtlError> {
        map_records(table, &self.settings.columns)
    }

    async fn write(
        &self,
        records: &MappedRecords,
    ) -> Result<(CollectionSummary, CollectionSummary), EtlError> {
        let store = self.store.as_ref();
        let playlists_name = self.settings.playlists_collection.as_str();
        let tracks_name = self.settings.tracks_collection.as_str();

        store
            .check_connection()
            .await
            .map_err(|e| EtlError::database(format!("{:#}", e)))?;

        for name in [playlists_name, tracks_name] {
            store
                .prepare_collection(name, self.settings.write_policy)
                .await
                .map_err(|e| EtlError::database(format!("{:#}", e)))?;
        }

        let loader = BatchLoader::new(store, self.settings.batch_size)
            .with_progress(self.settings.progress);
        let playlists = loader.load(playlists_name, &records.playlists).await?;
        let tracks = loader.load(tracks_name, &records.tracks).await?;

        if self.settings.create_indexes {
            store
                .ensure_indexes(playlists_name, &playlist_indexes())
                .await
                .map_err(|e| EtlError::database(format!("{:#}", e)))?;
            store
                .ensure_indexes(tracks_name, &track_indexes())
                .await
                .map_err(|e| EtlError::database(format!("{:#}", e)))?;
        }

        Ok((self.summarize(playlists).await?, self.summarize(tracks).await?))
    }

    async fn summarize(&self, report: LoadReport) -> Result<CollectionSummary, EtlError> {
        let total = self
            .store
            .count_documents(&report.collection)
            .await
            .map_err(|e| EtlError::database(format!("{:#}", e)))?;
        Ok(CollectionSummary {
            collection: report.collection,
            inserted: report.inserted,
            total,
        })
    }
}
