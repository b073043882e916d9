mod memory_store;
mod mongo_store;
mod trait_def;

pub use memory_store::MemoryDocumentStore;
pub use mongo_store::MongoDocumentStore;
pub use trait_def::{playlist_indexes, track_indexes, DocumentStore, IndexSpec, WritePolicy};
