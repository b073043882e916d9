//! MongoDB-backed document store.

use super::trait_def::{DocumentStore, IndexSpec, WritePolicy};
use anyhow::{Context, Result};
use async_trait::async_trait;
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};
use tracing::{debug, error, info, warn};

const APP_NAME: &str = "spotify-etl";

pub struct MongoDocumentStore {
    client: Client,
    database: Database,
    /// Wrap every chunk in a session transaction (needs a replica set).
    chunk_transactions: bool,
}

impl MongoDocumentStore {
    /// Create a store for `database_name`.
    ///
    /// The driver connects lazily, use [`DocumentStore::check_connection`]
    /// to find out whether the server is reachable.
    pub async fn new(
        connection_string: &str,
        database_name: &str,
        chunk_transactions: bool,
    ) -> Result<Self> {
        let mut options = ClientOptions::parse(connection_string)
            .await
            .context("Invalid MongoDB connection string")?;
        options.app_name = Some(APP_NAME.to_string());
        let client = Client::with_options(options).context("Failed to create MongoDB client")?;
        let database = client.database(database_name);
        Ok(Self {
            client,
            database,
            chunk_transactions,
        })
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection::<Document>(name)
    }

    async fn insert_in_transaction(
        &self,
        collection: &Collection<Document>,
        documents: Vec<Document>,
    ) -> Result<u64> {
        let mut session = self
            .client
            .start_session()
            .await
            .context("Failed to start session")?;
        session
            .start_transaction()
            .await
            .context("Failed to start transaction")?;

        match collection.insert_many(documents).session(&mut session).await {
            Ok(result) => {
                session
                    .commit_transaction()
                    .await
                    .context("Failed to commit chunk transaction")?;
                Ok(result.inserted_ids.len() as u64)
            }
            Err(err) => {
                if let Err(abort_err) = session.abort_transaction().await {
                    warn!("Failed to abort chunk transaction: {}", abort_err);
                }
                Err(err).context("Bulk insert failed, chunk transaction aborted")
            }
        }
    }

    /// Ordered insert without a transaction. On failure the documents this
    /// call already committed are deleted again by their generated `_id`.
    async fn insert_with_rollback(
        &self,
        collection: &Collection<Document>,
        mut documents: Vec<Document>,
    ) -> Result<u64> {
        let ids = assign_ids(&mut documents);
        let err = match collection.insert_many(documents).ordered(true).await {
            Ok(result) => return Ok(result.inserted_ids.len() as u64),
            Err(err) => err,
        };

        if ids.is_empty() {
            return Err(err).context("Bulk insert failed");
        }
        let filter = doc! { "_id": { "$in": ids } };
        match collection.delete_many(filter).await {
            Ok(deleted) => {
                if deleted.deleted_count > 0 {
                    warn!(
                        "Removed {} documents of the failed chunk from '{}'",
                        deleted.deleted_count,
                        collection.name()
                    );
                }
                Err(err).context("Bulk insert failed, partial chunk removed")
            }
            Err(cleanup_err) => {
                error!(
                    "Failed to remove partial chunk from '{}': {}",
                    collection.name(),
                    cleanup_err
                );
                Err(err).context(format!(
                    "Bulk insert failed and the partial chunk could not be removed: {}",
                    cleanup_err
                ))
            }
        }
    }
}

/// Give every document without an `_id` a fresh ObjectId.
///
/// Returns only the generated ids, so a rollback never touches documents
/// that carried their own `_id` and may collide with existing ones.
fn assign_ids(documents: &mut [Document]) -> Vec<Bson> {
    let mut generated = Vec::with_capacity(documents.len());
    for document in documents.iter_mut() {
        if !document.contains_key("_id") {
            let id = Bson::ObjectId(ObjectId::new());
            document.insert("_id", id.clone());
            generated.push(id);
        }
    }
    generated
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn check_connection(&self) -> Result<()> {
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .context("MongoDB ping failed")?;
        info!("Connected to MongoDB database '{}'", self.database.name());
        Ok(())
    }

    async fn prepare_collection(&self, collection: &str, policy: WritePolicy) -> Result<()> {
        match policy {
            WritePolicy::Replace => {
                info!("Dropping collection '{}' before load", collection);
                self.collection(collection)
                    .drop()
                    .await
                    .with_context(|| format!("Failed to drop collection '{}'", collection))
            }
            WritePolicy::Append => {
                debug!("Appending to collection '{}'", collection);
                Ok(())
            }
        }
    }

    async fn insert_chunk(&self, collection: &str, documents: Vec<Document>) -> Result<u64> {
        let coll = self.collection(collection);
        if self.chunk_transactions {
            return self.insert_in_transaction(&coll, documents).await;
        }
        self.insert_with_rollback(&coll, documents)
            .await
            .with_context(|| format!("Insert into '{}' failed", collection))
    }

    async fn ensure_indexes(&self, collection: &str, indexes: &[IndexSpec]) -> Result<()> {
        if indexes.is_empty() {
            return Ok(());
        }

        let models: Vec<IndexModel> = indexes
            .iter()
            .map(|spec| {
                let mut keys = Document::new();
                for field in &spec.fields {
                    keys.insert(*field, 1);
                }
                IndexModel::builder()
                    .keys(keys)
                    .options(IndexOptions::builder().unique(spec.unique).build())
                    .build()
            })
            .collect();

        self.collection(collection)
            .create_indexes(models)
            .await
            .with_context(|| format!("Failed to create indexes on '{}'", collection))?;
        info!("Created {} indexes on '{}'", indexes.len(), collection);
        Ok(())
    }

    async fn count_documents(&self, collection: &str) -> Result<u64> {
        self.collection(collection)
            .count_documents(doc! {})
            .await
            .with_context(|| format!("Failed to count documents in '{}'", collection))
    }
}
