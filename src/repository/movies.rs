use mongodb::bson::{Bson, Document, doc, oid::ObjectId};
use std::sync::Arc;

use super::{expect_one, field_or_null, inserted_key, parse_key, store_failure};
use crate::error::{EntityKind, RepoError, RepoResult, WriteAction};
use crate::models::Movie;
use crate::response::{Created, Deleted};
use crate::store::{DocumentStore, FindSpec};

const LIST_LIMIT: i64 = 10;
const TITLE_REQUIRED: &str = "Movies must have a title.";

#[derive(Clone)]
pub struct MovieRepository {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

impl MovieRepository {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    /// The ten longest movies, projected to `_id` and `title`.
    pub async fn list_movies(&self) -> RepoResult<Vec<Movie>> {
        let options = FindSpec::default()
            .sort(doc! { "runtime": -1 })
            .limit(LIST_LIMIT)
            .projection(doc! { "title": 1 });

        let documents = self
            .store
            .find(&self.collection, doc! {}, options)
            .await
            .map_err(|err| store_failure("find", err))?;

        tracing::debug!("Listed {} movies", documents.len());
        Ok(documents.into_iter().map(Movie::from).collect())
    }

    pub async fn movie_by_id(&self, id: &str) -> RepoResult<Option<Movie>> {
        let key = parse_key(id)?;
        self.find_by_key(key).await
    }

    /// First movie whose title matches exactly.
    pub async fn movie_by_title(&self, title: &str) -> RepoResult<Option<Movie>> {
        let document = self
            .store
            .find_one(&self.collection, doc! { "title": title })
            .await
            .map_err(|err| store_failure("find_one", err))?;
        Ok(document.map(Movie::from))
    }

    /// Looks a movie up by key when `identifier` is shaped like one, by
    /// title otherwise.
    pub async fn resolve_movie(&self, identifier: &str) -> RepoResult<Movie> {
        let movie = match ObjectId::parse_str(identifier) {
            Ok(key) => self.find_by_key(key).await?,
            Err(_) => self.movie_by_title(identifier).await?,
        };

        movie.ok_or_else(|| {
            tracing::debug!("No movie found for identifier {}", identifier);
            RepoError::not_found(identifier)
        })
    }

    pub async fn create_movie(&self, mut fields: Document) -> RepoResult<Created> {
        if !has_title(&fields) {
            tracing::warn!("Rejected movie without a title");
            return Err(RepoError::Validation(TITLE_REQUIRED));
        }
        // Keys are always assigned by the store.
        fields.remove("_id");

        let outcome = self
            .store
            .insert_one(&self.collection, fields)
            .await
            .map_err(|err| store_failure("insert_one", err))?;
        let id = inserted_key(outcome)?;

        tracing::info!("Created movie {}", id);
        Ok(Created {
            new_object_id: id,
            message: format!("Item created! ID: {}", id),
        })
    }

    /// Overwrites `title` and `plot` with the values in `fields`, null when
    /// absent. Every other input field is ignored.
    pub async fn update_movie_by_id(&self, id: &str, fields: &Document) -> RepoResult<Movie> {
        let key = parse_key(id)?;
        let update = doc! {
            "$set": {
                "title": field_or_null(fields, "title"),
                "plot": field_or_null(fields, "plot"),
            }
        };

        let outcome = self
            .store
            .update_one(&self.collection, doc! { "_id": key }, update)
            .await
            .map_err(|err| store_failure("update_one", err))?;
        expect_one(EntityKind::Movie, WriteAction::Updated, outcome.modified_count)?;

        tracing::info!("Updated movie {}", key);
        self.find_by_key(key)
            .await?
            .ok_or_else(|| RepoError::not_found(id))
    }

    pub async fn delete_movie_by_id(&self, id: &str) -> RepoResult<Deleted> {
        let key = parse_key(id)?;
        let outcome = self
            .store
            .delete_one(&self.collection, doc! { "_id": key })
            .await
            .map_err(|err| store_failure("delete_one", err))?;
        expect_one(EntityKind::Movie, WriteAction::Deleted, outcome.deleted_count)?;

        tracing::info!("Deleted movie {}", key);
        Ok(Deleted {
            message: format!("Deleted {} movie.", outcome.deleted_count),
        })
    }

    pub(crate) async fn find_by_key(&self, key: ObjectId) -> RepoResult<Option<Movie>> {
        let document = self
            .store
            .find_one(&self.collection, doc! { "_id": key })
            .await
            .map_err(|err| store_failure("find_one", err))?;
        Ok(document.map(Movie::from))
    }
}

fn has_title(fields: &Document) -> bool {
    matches!(fields.get("title"), Some(Bson::String(title)) if !title.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreError};

    const MOVIES: &str = "movies";

    fn repository() -> (Arc<MemoryStore>, MovieRepository) {
        let store = Arc::new(MemoryStore::new());
        let repo = MovieRepository::new(store.clone(), MOVIES);
        (store, repo)
    }

    async fn insert(store: &MemoryStore, document: Document) -> ObjectId {
        store
            .insert_one(MOVIES, document)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
    }

    #[tokio::test]
    async fn test_list_returns_ten_longest_titles() {
        let (store, repo) = repository();
        let runtimes = [90, 150, 45, 200, 101, 88, 130, 175, 60, 95, 110, 140, 200, 72, 99];
        for (n, runtime) in runtimes.iter().enumerate() {
            insert(
                &store,
                doc! { "title": format!("Movie {}", n), "plot": "...", "runtime": *runtime },
            )
            .await;
        }

        let movies = repo.list_movies().await.unwrap();
        assert_eq!(movies.len(), 10);
        for movie in &movies {
            let keys: Vec<&str> = movie.document().keys().map(String::as_str).collect();
            assert_eq!(keys, vec!["_id", "title"]);
        }

        // Runtime is projected away, so check order against the stored documents.
        let mut listed_runtimes = Vec::new();
        for movie in &movies {
            let stored = repo.find_by_key(movie.id().unwrap()).await.unwrap().unwrap();
            listed_runtimes.push(stored.runtime().unwrap());
        }
        assert_eq!(listed_runtimes[0], 200.0);
        assert!(listed_runtimes.windows(2).all(|pair| pair[0] >= pair[1]));
        assert_eq!(listed_runtimes[9], 95.0);
    }

    #[tokio::test]
    async fn test_list_on_empty_store() {
        let (_store, repo) = repository();
        assert!(repo.list_movies().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let (_store, repo) = repository();
        let created = repo
            .create_movie(doc! { "title": "Test Film" })
            .await
            .unwrap();
        let id = created.new_object_id.to_hex();
        assert_eq!(created.message, format!("Item created! ID: {}", id));

        let movie = repo.movie_by_id(&id).await.unwrap().unwrap();
        assert_eq!(movie.title(), Some("Test Film"));
    }

    #[tokio::test]
    async fn test_create_keeps_every_field() {
        let (_store, repo) = repository();
        let created = repo
            .create_movie(doc! { "title": "Heat", "runtime": 170, "cast": ["Al Pacino"] })
            .await
            .unwrap();

        let movie = repo
            .find_by_key(created.new_object_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(movie.runtime(), Some(170.0));
        assert_eq!(
            movie.document().get_array("cast").unwrap(),
            &vec![Bson::from("Al Pacino")]
        );
    }

    #[tokio::test]
    async fn test_create_without_title_never_writes() {
        let (store, repo) = repository();
        let cases = [
            doc! {},
            doc! { "plot": "No title here" },
            doc! { "title": "" },
            doc! { "title": Bson::Null },
            doc! { "title": 42 },
        ];

        for fields in cases {
            let err = repo.create_movie(fields).await.unwrap_err();
            assert_eq!(err.to_string(), "Movies must have a title.");
            assert!(matches!(err, RepoError::Validation(_)));
        }
        assert_eq!(store.count(MOVIES).await, 0);
    }

    #[tokio::test]
    async fn test_create_validates_before_store_access() {
        let (store, repo) = repository();
        store.set_available(false);

        let err = repo.create_movie(doc! { "plot": "x" }).await.unwrap_err();
        assert!(matches!(err, RepoError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_ignores_caller_key() {
        let (_store, repo) = repository();
        let supplied = ObjectId::new();
        let created = repo
            .create_movie(doc! { "_id": supplied, "title": "Heat" })
            .await
            .unwrap();
        assert_ne!(created.new_object_id, supplied);
    }

    #[tokio::test]
    async fn test_create_unacknowledged() {
        let (store, repo) = repository();
        store.set_acknowledge_writes(false);

        let err = repo.create_movie(doc! { "title": "Heat" }).await.unwrap_err();
        assert!(matches!(err, RepoError::WriteNotAcknowledged));
        assert_eq!(err.to_string(), "Something went wrong. Please try again.");
    }

    #[tokio::test]
    async fn test_movie_by_id_missing_and_malformed() {
        let (_store, repo) = repository();
        assert!(repo
            .movie_by_id(&ObjectId::new().to_hex())
            .await
            .unwrap()
            .is_none());

        let err = repo.movie_by_id("Heat").await.unwrap_err();
        assert!(matches!(err, RepoError::MalformedIdentifier(ref id) if id == "Heat"));
    }

    #[tokio::test]
    async fn test_movie_by_title_is_exact() {
        let (store, repo) = repository();
        insert(&store, doc! { "title": "Alien" }).await;
        insert(&store, doc! { "title": "Aliens" }).await;

        let movie = repo.movie_by_title("Aliens").await.unwrap().unwrap();
        assert_eq!(movie.title(), Some("Aliens"));
        assert!(repo.movie_by_title("alien").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resolve_by_key_and_by_title() {
        let (store, repo) = repository();
        let id = insert(&store, doc! { "title": "The Godfather" }).await;

        let by_key = repo.resolve_movie(&id.to_hex()).await.unwrap();
        assert_eq!(by_key.title(), Some("The Godfather"));

        let by_title = repo.resolve_movie("The Godfather").await.unwrap();
        assert_eq!(by_title.id(), Some(id));
    }

    #[tokio::test]
    async fn test_resolve_unknown_key_shaped_identifier() {
        let (store, repo) = repository();
        let unknown = ObjectId::new().to_hex();
        // A title that happens to look like a key is never consulted.
        insert(&store, doc! { "title": unknown.clone() }).await;

        let err = repo.resolve_movie(&unknown).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("No item found with identifier {}.", unknown)
        );
    }

    #[tokio::test]
    async fn test_resolve_unknown_title_echoes_identifier() {
        let (_store, repo) = repository();
        let err = repo.resolve_movie("Jaws: The Revenge 2").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "No item found with identifier Jaws: The Revenge 2."
        );
    }

    #[tokio::test]
    async fn test_update_masks_fields() {
        let (store, repo) = repository();
        let id = insert(
            &store,
            doc! { "title": "Heat", "plot": "Crime", "runtime": 170, "year": 1995 },
        )
        .await;
        let before = repo.find_by_key(id).await.unwrap().unwrap();

        let updated = repo
            .update_movie_by_id(
                &id.to_hex(),
                &doc! { "title": "Heat (1995)", "plot": "LA crime", "runtime": 1, "year": 2000 },
            )
            .await
            .unwrap();

        assert_eq!(updated.title(), Some("Heat (1995)"));
        assert_eq!(updated.plot(), Some("LA crime"));
        for (field, value) in before.document() {
            if field != "title" && field != "plot" {
                assert_eq!(updated.document().get(field), Some(value), "field {}", field);
            }
        }
        assert_eq!(updated.document().len(), before.document().len());
    }

    #[tokio::test]
    async fn test_update_sets_absent_fields_to_null() {
        let (store, repo) = repository();
        let id = insert(&store, doc! { "title": "Heat", "plot": "Crime" }).await;

        let updated = repo
            .update_movie_by_id(&id.to_hex(), &doc! { "title": "Heat" })
            .await
            .unwrap();
        assert_eq!(updated.title(), Some("Heat"));
        assert_eq!(updated.document().get("plot"), Some(&Bson::Null));
    }

    #[tokio::test]
    async fn test_update_missing_movie_reports_count() {
        let (_store, repo) = repository();
        let err = repo
            .update_movie_by_id(&ObjectId::new().to_hex(), &doc! { "title": "Heat" })
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Something went wrong. 0 movies were updated. Please try again."
        );
    }

    #[tokio::test]
    async fn test_update_with_identical_values_modifies_nothing() {
        let (store, repo) = repository();
        let id = insert(&store, doc! { "title": "Heat", "plot": "Crime" }).await;

        let err = repo
            .update_movie_by_id(&id.to_hex(), &doc! { "title": "Heat", "plot": "Crime" })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RepoError::Cardinality {
                entity: EntityKind::Movie,
                action: WriteAction::Updated,
                count: 0,
            }
        ));
    }

    #[tokio::test]
    async fn test_delete_then_get_is_empty() {
        let (store, repo) = repository();
        let id = insert(&store, doc! { "title": "Heat" }).await.to_hex();

        let deleted = repo.delete_movie_by_id(&id).await.unwrap();
        assert_eq!(deleted.message, "Deleted 1 movie.");
        assert!(repo.movie_by_id(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_second_delete_reports_zero() {
        let (store, repo) = repository();
        let id = insert(&store, doc! { "title": "Heat" }).await.to_hex();

        repo.delete_movie_by_id(&id).await.unwrap();
        let err = repo.delete_movie_by_id(&id).await.unwrap_err();
        assert!(matches!(err, RepoError::Cardinality { count: 0, .. }));
        assert_eq!(
            err.to_string(),
            "Something went wrong. 0 movies were deleted. Please try again."
        );
    }

    #[tokio::test]
    async fn test_malformed_keys_never_reach_the_store() {
        let (store, repo) = repository();
        store.set_available(false);

        assert!(matches!(
            repo.update_movie_by_id("nope", &doc! {}).await,
            Err(RepoError::MalformedIdentifier(_))
        ));
        assert!(matches!(
            repo.delete_movie_by_id("nope").await,
            Err(RepoError::MalformedIdentifier(_))
        ));
    }

    #[tokio::test]
    async fn test_store_failure_is_distinct_from_not_found() {
        let (store, repo) = repository();
        store.set_available(false);

        let err = repo.resolve_movie("Heat").await.unwrap_err();
        assert!(matches!(err, RepoError::Store(StoreError::Unavailable)));
        assert!(!err.is_not_found());
    }
}
