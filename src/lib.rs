//! Spotify Playlists ETL Library
//!
//! This library exposes the pipeline stages for the `spotify-etl` binary and
//! for testing.

pub mod batch;
pub mod cleaning;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod logging;
pub mod mapping;
pub mod pipeline;
pub mod progress;
pub mod store;
pub mod table;

// Re-export commonly used types for convenience
pub use error::{EtlError, Stage};
pub use pipeline::{Pipeline, PipelineRun, PipelineSettings, PipelineState, RunSummary};
pub use store::{DocumentStore, MemoryDocumentStore, MongoDocumentStore};
