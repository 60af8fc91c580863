//! Movie and comment repositories.
//!
//! Each operation maps to one document-store call (plus a re-read after
//! updates) and reports failure as a [`RepoError`]. Repositories hold nothing
//! but the injected store handle, so clones are cheap and may be used from
//! any number of tasks at once.

pub mod comments;
pub mod movies;

use mongodb::bson::{Bson, Document, oid::ObjectId};
use std::sync::Arc;

use crate::config::CollectionNames;
use crate::error::{EntityKind, RepoError, RepoResult, WriteAction};
use crate::store::{DocumentStore, InsertOutcome, StoreError};

pub use comments::CommentRepository;
pub use movies::MovieRepository;

/// Whether `identifier` has the shape of a document key (24 hex digits).
pub fn is_key_shaped(identifier: &str) -> bool {
    ObjectId::parse_str(identifier).is_ok()
}

/// Parses a document key, rejecting anything that is not 24 hex digits.
pub fn parse_key(identifier: &str) -> RepoResult<ObjectId> {
    ObjectId::parse_str(identifier)
        .map_err(|_| RepoError::MalformedIdentifier(identifier.to_string()))
}

/// Value for a masked `$set`: the caller's field as given, null when absent.
fn field_or_null(fields: &Document, name: &str) -> Bson {
    fields.get(name).cloned().unwrap_or(Bson::Null)
}

fn expect_one(entity: EntityKind, action: WriteAction, count: u64) -> RepoResult<()> {
    if count == 1 {
        return Ok(());
    }
    tracing::warn!("Expected 1 {} to be {}, got {}", entity.singular(), action, count);
    Err(RepoError::Cardinality {
        entity,
        action,
        count,
    })
}

fn inserted_key(outcome: InsertOutcome) -> RepoResult<ObjectId> {
    if !outcome.acknowledged {
        tracing::warn!("Insert was not acknowledged by the document store");
        return Err(RepoError::WriteNotAcknowledged);
    }
    match outcome.inserted_id {
        Bson::ObjectId(id) => Ok(id),
        other => Err(store_failure("insert", StoreError::UnexpectedKey(other))),
    }
}

fn store_failure(operation: &str, err: StoreError) -> RepoError {
    tracing::error!("Document store call `{}` failed: {}", operation, err);
    RepoError::Store(err)
}

/// Both repositories over one shared store.
#[derive(Clone)]
pub struct Mflix {
    pub movies: MovieRepository,
    pub comments: CommentRepository,
}

impl Mflix {
    pub fn new(store: Arc<dyn DocumentStore>, collections: &CollectionNames) -> Self {
        let movies = MovieRepository::new(store.clone(), collections.movies.clone());
        let comments =
            CommentRepository::new(store, collections.comments.clone(), movies.clone());
        Self { movies, comments }
    }
}
