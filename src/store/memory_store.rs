//! In-memory document store.
//!
//! Backs `--dry-run` and the tests. Failures can be scripted per insert call
//! to exercise the loader's error path.

use super::trait_def::{DocumentStore, IndexSpec, WritePolicy};
use anyhow::{bail, Result};
use async_trait::async_trait;
use mongodb::bson::Document;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Default)]
struct MemoryState {
    collections: HashMap<String, Vec<Document>>,
    indexes: HashMap<String, Vec<IndexSpec>>,
    /// Sizes of every successful insert call, per collection.
    chunk_sizes: HashMap<String, Vec<usize>>,
    insert_calls: HashMap<String, usize>,
}

struct ScriptedFailure {
    collection: String,
    /// 1-based insert call.
    call: usize,
    /// Documents of the call written before the failure hits.
    after_documents: usize,
}

/// A store keeping collections in memory.
#[derive(Default)]
pub struct MemoryDocumentStore {
    state: Mutex<MemoryState>,
    fail_on: Option<ScriptedFailure>,
    unreachable: bool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `call`-th insert into `collection` fail.
    pub fn failing_on(collection: &str, call: usize) -> Self {
        Self::failing_mid_chunk(collection, call, 0)
    }

    /// Like [`failing_on`](Self::failing_on), but the failure hits after
    /// `after_documents` documents of that call were written. They are
    /// removed again before the error is returned, as the MongoDB store does.
    pub fn failing_mid_chunk(collection: &str, call: usize, after_documents: usize) -> Self {
        Self {
            fail_on: Some(ScriptedFailure {
                collection: collection.to_string(),
                call,
                after_documents,
            }),
            ..Default::default()
        }
    }

    /// A store whose connection check always fails.
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Default::default()
        }
    }

    /// Copy of the documents in a collection.
    pub async fn documents(&self, collection: &str) -> Vec<Document> {
        let state = self.state.lock().await;
        state.collections.get(collection).cloned().unwrap_or_default()
    }

    /// Sizes of the successful insert calls into a collection, in order.
    pub async fn chunk_sizes(&self, collection: &str) -> Vec<usize> {
        let state = self.state.lock().await;
        state.chunk_sizes.get(collection).cloned().unwrap_or_default()
    }

    /// Number of insert calls attempted on a collection, failed ones included.
    pub async fn insert_calls(&self, collection: &str) -> usize {
        let state = self.state.lock().await;
        state.insert_calls.get(collection).copied().unwrap_or(0)
    }

    pub async fn indexes(&self, collection: &str) -> Vec<IndexSpec> {
        let state = self.state.lock().await;
        state.indexes.get(collection).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn check_connection(&self) -> Result<()> {
        if self.unreachable {
            bail!("memory store configured as unreachable");
        }
        Ok(())
    }

    async fn prepare_collection(&self, collection: &str, policy: WritePolicy) -> Result<()> {
        let mut state = self.state.lock().await;
        if policy == WritePolicy::Replace {
            state.collections.remove(collection);
            state.indexes.remove(collection);
        }
        state.collections.entry(collection.to_string()).or_default();
        Ok(())
    }

    async fn insert_chunk(&self, collection: &str, documents: Vec<Document>) -> Result<u64> {
        let mut state = self.state.lock().await;
        let call = {
            let calls = state.insert_calls.entry(collection.to_string()).or_insert(0);
            *calls += 1;
            *calls
        };

        let count = documents.len();
        let docs = state.collections.entry(collection.to_string()).or_default();

        if let Some(failure) = &self.fail_on {
            if failure.collection == collection && failure.call == call {
                let before = docs.len();
                let written = failure.after_documents.min(count);
                docs.extend(documents.into_iter().take(written));
                docs.truncate(before);
                bail!(
                    "simulated failure on insert call {} after {} documents",
                    call,
                    written
                );
            }
        }

        docs.extend(documents);
        state
            .chunk_sizes
            .entry(collection.to_string())
            .or_default()
            .push(count);
        Ok(count as u64)
    }

    async fn ensure_indexes(&self, collection: &str, indexes: &[IndexSpec]) -> Result<()> {
        let mut state = self.state.lock().await;
        state
            .indexes
            .insert(collection.to_string(), indexes.to_vec());
        Ok(())
    }

    async fn count_documents(&self, collection: &str) -> Result<u64> {
        let state = self.state.lock().await;
        Ok(state
            .collections
            .get(collection)
            .map(|docs| docs.len() as u64)
            .unwrap_or(0))
    }
}
