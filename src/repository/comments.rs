use mongodb::bson::{DateTime, Document, doc, oid::ObjectId};
use std::sync::Arc;

use super::{
    MovieRepository, expect_one, field_or_null, inserted_key, parse_key, store_failure,
};
use crate::error::{EntityKind, RepoError, RepoResult, WriteAction};
use crate::models::Comment;
use crate::response::{Created, Deleted};
use crate::store::{DocumentStore, FindSpec};

/// Comments, each tied to a movie through `movie_id`.
///
/// The movie is only checked when a comment is created; deleting a movie
/// leaves its comments in place.
#[derive(Clone)]
pub struct CommentRepository {
    store: Arc<dyn DocumentStore>,
    collection: String,
    movies: MovieRepository,
}

impl CommentRepository {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        collection: impl Into<String>,
        movies: MovieRepository,
    ) -> Self {
        Self {
            store,
            collection: collection.into(),
            movies,
        }
    }

    /// Every comment on the movie, in the store's natural order.
    pub async fn list_comments_for_movie(&self, movie_id: &str) -> RepoResult<Vec<Comment>> {
        let key = parse_key(movie_id)?;
        self.list_where(doc! { "movie_id": key }).await
    }

    /// Comments on the movie posted strictly after `since`.
    pub async fn list_comments_for_movie_since(
        &self,
        movie_id: &str,
        since: DateTime,
    ) -> RepoResult<Vec<Comment>> {
        let key = parse_key(movie_id)?;
        self.list_where(doc! { "movie_id": key, "date": { "$gt": since } })
            .await
    }

    pub async fn comment_by_id(&self, id: &str) -> RepoResult<Comment> {
        let key = parse_key(id)?;
        self.find_by_key(key).await
    }

    /// Inserts `fields` as a comment on `movie_id`. The stored `movie_id` and
    /// `date` are always ours, whatever the caller sent.
    pub async fn create_comment(&self, movie_id: &str, fields: Document) -> RepoResult<Created> {
        let movie_key = parse_key(movie_id)?;
        if self.movies.find_by_key(movie_key).await?.is_none() {
            tracing::warn!("Refused comment on missing movie {}", movie_key);
            return Err(RepoError::not_found(movie_id));
        }

        let document = Comment::compose(fields, movie_key, DateTime::now());
        let outcome = self
            .store
            .insert_one(&self.collection, document)
            .await
            .map_err(|err| store_failure("insert_one", err))?;
        let id = inserted_key(outcome)?;

        tracing::info!("Created comment {} on movie {}", id, movie_key);
        Ok(Created {
            new_object_id: id,
            message: format!("Comment created! ID: {}", id),
        })
    }

    /// Overwrites `text` with the value in `fields`, null when absent.
    pub async fn update_comment_by_id(&self, id: &str, fields: &Document) -> RepoResult<Comment> {
        let key = parse_key(id)?;
        let update = doc! { "$set": { "text": field_or_null(fields, "text") } };

        let outcome = self
            .store
            .update_one(&self.collection, doc! { "_id": key }, update)
            .await
            .map_err(|err| store_failure("update_one", err))?;
        expect_one(EntityKind::Comment, WriteAction::Updated, outcome.modified_count)?;

        tracing::info!("Updated comment {}", key);
        self.find_by_key(key).await
    }

    pub async fn delete_comment_by_id(&self, id: &str) -> RepoResult<Deleted> {
        let key = parse_key(id)?;
        let outcome = self
            .store
            .delete_one(&self.collection, doc! { "_id": key })
            .await
            .map_err(|err| store_failure("delete_one", err))?;
        expect_one(EntityKind::Comment, WriteAction::Deleted, outcome.deleted_count)?;

        tracing::info!("Deleted comment {}", key);
        Ok(Deleted {
            message: format!("Deleted {} comment.", outcome.deleted_count),
        })
    }

    async fn list_where(&self, filter: Document) -> RepoResult<Vec<Comment>> {
        let documents = self
            .store
            .find(&self.collection, filter, FindSpec::default())
            .await
            .map_err(|err| store_failure("find", err))?;

        tracing::debug!("Listed {} comments", documents.len());
        Ok(documents.into_iter().map(Comment::from).collect())
    }

    async fn find_by_key(&self, key: ObjectId) -> RepoResult<Comment> {
        let document = self
            .store
            .find_one(&self.collection, doc! { "_id": key })
            .await
            .map_err(|err| store_failure("find_one", err))?;

        document.map(Comment::from).ok_or_else(|| {
            tracing::debug!("No comment found with id {}", key);
            RepoError::CommentNotFound { id: key }
        })
    }
}
