//! Data access for the `sample_mflix` movies and comments collections.
//!
//! Repositories take an injected [`DocumentStore`]: [`MongoStore`] in
//! production, [`MemoryStore`] for tests and local runs.

pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod response;
pub mod store;

pub use config::{CollectionNames, StoreConfig, StoreCredential};
pub use error::{EntityKind, GENERIC_FAILURE, RepoError, RepoResult, WriteAction};
pub use models::{Comment, Movie};
pub use repository::{CommentRepository, Mflix, MovieRepository, is_key_shaped, parse_key};
pub use response::{Created, Deleted, ErrorBody, shape_result};
pub use store::{DocumentStore, FindSpec, MemoryStore, MongoStore, StoreError, StoreResult};
