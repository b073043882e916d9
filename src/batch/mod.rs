//! Chunked writes of documents into a [`DocumentStore`].

use crate::error::EtlError;
use crate::progress::items_bar;
use crate::store::DocumentStore;
use mongodb::bson::{self, Document};
use serde::Serialize;
use tracing::{error, info};

/// Outcome of loading one collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadReport {
    pub collection: String,
    pub inserted: u64,
    pub chunks: usize,
}

/// Writes documents in fixed-size chunks, one bulk insert per chunk.
///
/// There is no transaction across chunks: when chunk N fails, chunks
/// 1..N-1 stay committed and the load stops. Chunk N itself leaves nothing
/// behind, see [`DocumentStore::insert_chunk`].
pub struct BatchLoader<'a> {
    store: &'a dyn DocumentStore,
    batch_size: usize,
    show_progress: bool,
}

impl<'a> BatchLoader<'a> {
    /// `batch_size` below 1 is treated as 1.
    pub fn new(store: &'a dyn DocumentStore, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of chunk writes needed for `documents` documents.
    pub fn chunk_count(&self, documents: usize) -> usize {
        documents.div_ceil(self.batch_size)
    }

    pub async fn load<T: Serialize + Sync>(
        &self,
        collection: &str,
        documents: &[T],
    ) -> Result<LoadReport, EtlError> {
        let total_chunks = self.chunk_count(documents.len());
        info!(
            "Loading {} documents into '{}' in {} chunks of up to {}",
            documents.len(),
            collection,
            total_chunks,
            self.batch_size
        );

        let bar = items_bar(
            documents.len() as u64,
            self.show_progress,
            format!("Loading {}", collection),
        );
        let mut inserted: u64 = 0;

        for (i, chunk) in documents.chunks(self.batch_size).enumerate() {
            let chunk_index = i + 1;
            let write_error = |cause: String| EtlError::Write {
                collection: collection.to_string(),
                chunk_index,
                cause,
            };

            let docs = to_documents(chunk).map_err(|e| write_error(e.to_string()))?;
            let count = match self.store.insert_chunk(collection, docs).await {
                Ok(count) => count,
                Err(err) => {
                    bar.abandon();
                    error!(
                        "Chunk {}/{} into '{}' failed after {} documents were committed",
                        chunk_index, total_chunks, collection, inserted
                    );
                    return Err(write_error(format!("{:#}", err)));
                }
            };

            inserted += count;
            bar.inc(count);
            info!(
                "Chunk {}/{} into '{}': {} documents, {} inserted so far",
                chunk_index, total_chunks, collection, count, inserted
            );
        }

        bar.finish_and_clear();
        info!("Loaded {} documents into '{}'", inserted, collection);
        Ok(LoadReport {
            collection: collection.to_string(),
            inserted,
            chunks: total_chunks,
        })
    }
}

fn to_documents<T: Serialize>(items: &[T]) -> Result<Vec<Document>, bson::ser::Error> {
    items.iter().map(bson::to_document).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryDocumentStore;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Item {
        n: u32,
    }

    fn items(count: u32) -> Vec<Item> {
        (0..count).map(|n| Item { n }).collect()
    }

    #[tokio::test]
    async fn test_250_documents_in_chunks_of_100() {
        let store = MemoryDocumentStore::new();
        let loader = BatchLoader::new(&store, 100);

        let report = loader.load("tracks", &items(250)).await.unwrap();

        assert_eq!(report.inserted, 250);
        assert_eq!(report.chunks, 3);
        assert_eq!(store.chunk_sizes("tracks").await, vec![100, 100, 50]);
        assert_eq!(store.count_documents("tracks").await.unwrap(), 250);
    }

    #[tokio::test]
    async fn test_inserted_count_matches_input() {
        for (count, batch_size) in [(1, 1), (7, 3), (10, 10), (11, 10), (999, 1000)] {
            let store = MemoryDocumentStore::new();
            let report = BatchLoader::new(&store, batch_size)
                .load("c", &items(count))
                .await
                .unwrap();
            assert_eq!(report.inserted, count as u64);
            assert_eq!(store.insert_calls("c").await, report.chunks);
        }
    }

    #[tokio::test]
    async fn test_failure_on_chunk_two_keeps_chunk_one() {
        let store = MemoryDocumentStore::failing_on("tracks", 2);
        let loader = BatchLoader::new(&store, 100);

        let err = loader.load("tracks", &items(250)).await.unwrap_err();

        assert_eq!(err.kind(), "WriteError");
        assert_eq!(err.chunk_index(), Some(2));
        match &err {
            EtlError::Write { collection, .. } => assert_eq!(collection, "tracks"),
            other => panic!("unexpected error: {:?}", other),
        }
        // Chunk 1 stays committed, chunk 3 is never attempted
        assert_eq!(store.count_documents("tracks").await.unwrap(), 100);
        assert_eq!(store.insert_calls("tracks").await, 2);
    }

    #[tokio::test]
    async fn test_empty_input_issues_no_writes() {
        let store = MemoryDocumentStore::new();
        let report = BatchLoader::new(&store, 100)
            .load::<Item>("tracks", &[])
            .await
            .unwrap();
        assert_eq!(report.inserted, 0);
        assert_eq!(report.chunks, 0);
        assert_eq!(store.insert_calls("tracks").await, 0);
    }

    #[test]
    fn test_zero_batch_size_is_clamped() {
        let store = MemoryDocumentStore::new();
        let loader = BatchLoader::new(&store, 0);
        assert_eq!(loader.batch_size(), 1);
        assert_eq!(loader.chunk_count(3), 3);
    }
}
