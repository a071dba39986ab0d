//! Document store facade for BookCourier.
//!
//! Every resource lives in its own collection of schemaless JSON documents.
//! Handlers talk to a [`DocumentStore`] trait object so the same code runs
//! against MongoDB in production and against [`MemoryStore`] in tests.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub mod filter;
pub mod memory;
pub mod mongo;

pub use filter::{Clause, Direction, Filter, Sort};
pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// A stored document. Identifiers are exposed under `_id` as hex strings.
pub type Document = serde_json::Map<String, Value>;

/// Name of the identifier field on every document.
pub const ID_FIELD: &str = "_id";

/// URI scheme selecting the in-process store.
pub const MEMORY_URI: &str = "memory://";

/// Errors raised by document store backends
#[derive(Error, Debug)]
pub enum DbError {
    #[error(transparent)]
    Mongo(#[from] mongodb::error::Error),

    #[error("unsupported database uri '{0}'; expected mongodb://, mongodb+srv:// or memory://")]
    UnsupportedUri(String),

    #[error("invalid document: {0}")]
    InvalidDocument(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Result of inserting one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOutcome {
    pub acknowledged: bool,
    pub inserted_id: String,
}

/// Result of a single-document update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutcome {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
}

/// Result of a single-document delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

/// One bucket of a group-by-field count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupCount {
    #[serde(rename = "_id")]
    pub key: Value,
    pub count: u64,
}

/// Operations the HTTP layer needs from a document database.
///
/// Identifiers are 24-digit hex ObjectIds. Any malformed identifier simply
/// matches nothing; it is never an error.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Round-trip to the backend to prove it is reachable.
    async fn ping(&self) -> DbResult<()>;

    /// All documents matching `filter`, optionally sorted.
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        sort: Option<&Sort>,
    ) -> DbResult<Vec<Document>>;

    /// First document matching `filter` in natural order.
    async fn find_one(&self, collection: &str, filter: &Filter) -> DbResult<Option<Document>>;

    async fn find_by_id(&self, collection: &str, id: &str) -> DbResult<Option<Document>>;

    /// Insert `document`, assigning it a fresh identifier. Any `_id` already
    /// present is replaced.
    async fn insert_one(&self, collection: &str, document: Document) -> DbResult<InsertOutcome>;

    /// Merge `changes` into the document with identifier `id`.
    async fn update_by_id(
        &self,
        collection: &str,
        id: &str,
        changes: Document,
    ) -> DbResult<UpdateOutcome>;

    async fn delete_by_id(&self, collection: &str, id: &str) -> DbResult<DeleteOutcome>;

    /// Cheap cardinality estimate for a whole collection.
    async fn estimated_count(&self, collection: &str) -> DbResult<u64>;

    /// Count documents grouped by the value of `field`. Missing values group
    /// under `null`. Bucket order is unspecified.
    async fn count_by(&self, collection: &str, field: &str) -> DbResult<Vec<GroupCount>>;
}

/// Open the store named by `uri` and verify it answers a ping.
pub async fn connect(uri: &str, database: &str) -> DbResult<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = if uri.starts_with(MEMORY_URI) {
        Arc::new(MemoryStore::new())
    } else if uri.starts_with("mongodb://") || uri.starts_with("mongodb+srv://") {
        Arc::new(MongoStore::connect(uri, database).await?)
    } else {
        return Err(DbError::UnsupportedUri(uri.to_string()));
    };

    store.ping().await?;
    tracing::info!(
        target: "bookcourier-db",
        backend = store.backend(),
        database,
        "document store connected"
    );

    Ok(store)
}
