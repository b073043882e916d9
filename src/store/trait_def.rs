//! DocumentStore trait definition.
//!
//! Abstracts the destination database so the batch loader can write to
//! MongoDB in production and to memory in tests and dry runs.

use anyhow::Result;
use async_trait::async_trait;
use mongodb::bson::Document;
use serde::Deserialize;

/// Whether a run keeps or replaces what earlier runs wrote.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WritePolicy {
    /// Drop the collection before writing, re-runs converge to the same state.
    #[default]
    Replace,
    /// Add to whatever the collection already holds.
    Append,
}

impl WritePolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "replace" => Some(WritePolicy::Replace),
            "append" => Some(WritePolicy::Append),
            _ => None,
        }
    }
}

/// An index over one or more fields, ascending.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexSpec {
    pub fields: Vec<&'static str>,
    pub unique: bool,
}

impl IndexSpec {
    pub fn unique(fields: &[&'static str]) -> Self {
        Self {
            fields: fields.to_vec(),
            unique: true,
        }
    }

    pub fn plain(field: &'static str) -> Self {
        Self {
            fields: vec![field],
            unique: false,
        }
    }
}

/// Indexes for the playlists collection.
pub fn playlist_indexes() -> Vec<IndexSpec> {
    vec![IndexSpec::unique(&["playlist_id"]), IndexSpec::plain("name")]
}

/// Indexes for the tracks collection.
pub fn track_indexes() -> Vec<IndexSpec> {
    vec![
        IndexSpec::unique(&["playlist_id", "track_id"]),
        IndexSpec::plain("artist"),
        IndexSpec::plain("title"),
    ]
}

/// Trait for destination document stores.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Verify the store is reachable.
    async fn check_connection(&self) -> Result<()>;

    /// Get a collection ready for this run according to `policy`.
    async fn prepare_collection(&self, collection: &str, policy: WritePolicy) -> Result<()>;

    /// Insert one chunk of documents in a single bulk operation.
    ///
    /// Either the whole chunk is inserted or an error is returned.
    /// Returns the number of documents inserted.
    async fn insert_chunk(&self, collection: &str, documents: Vec<Document>) -> Result<u64>;

    /// Create the given indexes on a collection.
    async fn ensure_indexes(&self, collection: &str, indexes: &[IndexSpec]) -> Result<()>;

    /// Number of documents currently in a collection.
    async fn count_documents(&self, collection: &str) -> Result<u64>;
}
