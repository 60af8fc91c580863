//! Document store abstraction.
//!
//! Repositories only ever talk to a [`DocumentStore`]. The production
//! implementation is [`MongoStore`]; [`MemoryStore`] keeps everything in
//! process so repositories can be exercised without a live cluster.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use mongodb::bson::{Bson, Document};
use thiserror::Error;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("mongodb driver error: {0}")]
    Driver(#[from] mongodb::error::Error),

    #[error("document store is unavailable")]
    Unavailable,

    #[error("duplicate key {0}")]
    DuplicateKey(Bson),

    #[error("unsupported operator `{0}`")]
    UnsupportedOperator(String),

    #[error("store returned a key that is not an ObjectId: {0}")]
    UnexpectedKey(Bson),
}

/// Options for a `find` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindSpec {
    pub sort: Option<Document>,
    pub limit: Option<i64>,
    pub projection: Option<Document>,
}

impl FindSpec {
    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn projection(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertOutcome {
    pub acknowledged: bool,
    pub inserted_id: Bson,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub matched_count: u64,
    pub modified_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub deleted_count: u64,
}

/// The five driver calls the repositories are built on.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindSpec,
    ) -> StoreResult<Vec<Document>>;

    async fn find_one(&self, collection: &str, filter: Document) -> StoreResult<Option<Document>>;

    async fn insert_one(&self, collection: &str, document: Document) -> StoreResult<InsertOutcome>;

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> StoreResult<UpdateOutcome>;

    async fn delete_one(&self, collection: &str, filter: Document) -> StoreResult<DeleteOutcome>;
}
