//! Common test infrastructure
//!
//! Builds pipelines over a temporary data directory, a local archive and an
//! in-memory document store, so no test touches the network or a database.

mod fixtures;

pub use fixtures::{generate_kaggle_csv, write_archive, CSV_ENTRY, KAGGLE_HEADER};

use spotify_playlists_etl::cleaning::default_ranges;
use spotify_playlists_etl::fetcher::{DatasetFetcher, DatasetId, LocalArchiveSource};
use spotify_playlists_etl::mapping::{ColumnMap, DedupMode};
use spotify_playlists_etl::store::WritePolicy;
use spotify_playlists_etl::table::BadRowPolicy;
use spotify_playlists_etl::{DocumentStore, Pipeline, PipelineSettings};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// A scratch workspace holding one exported archive.
pub struct TestWorkspace {
    pub dir: TempDir,
    pub archive: PathBuf,
}

impl TestWorkspace {
    /// Workspace whose archive holds a single CSV entry.
    pub fn with_csv(csv: &str) -> Self {
        Self::with_entries(&[(CSV_ENTRY, csv)])
    }

    pub fn with_entries(entries: &[(&str, &str)]) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let archive = dir.path().join("export.zip");
        write_archive(&archive, entries).expect("Failed to write archive");
        Self { dir, archive }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    pub fn fetcher(&self) -> DatasetFetcher {
        DatasetFetcher::new(
            Box::new(LocalArchiveSource::new(&self.archive)),
            DatasetId::parse("andrewmvd/spotify-playlists").expect("valid dataset id"),
            self.data_dir(),
        )
    }

    pub fn pipeline(&self, store: Arc<dyn DocumentStore>, settings: PipelineSettings) -> Pipeline {
        Pipeline::new(self.fetcher(), store, settings)
    }
}

/// Settings matching the defaults, with a configurable batch size.
pub fn settings(batch_size: usize) -> PipelineSettings {
    let columns = ColumnMap::default();
    let cleaning = columns.cleaning_rules(DedupMode::NaturalKey, BTreeMap::new(), default_ranges());
    PipelineSettings {
        csv_file: None,
        on_bad_rows: BadRowPolicy::Fail,
        columns,
        cleaning,
        playlists_collection: "playlists".to_string(),
        tracks_collection: "tracks".to_string(),
        batch_size,
        write_policy: WritePolicy::Replace,
        create_indexes: true,
        progress: false,
    }
}
