use mongodb::bson::oid::ObjectId;
use std::fmt;
use thiserror::Error;

use crate::store::StoreError;

pub type RepoResult<T> = Result<T, RepoError>;

/// Text callers see for any failure we do not describe further.
pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Movie,
    Comment,
}

impl EntityKind {
    pub fn singular(self) -> &'static str {
        match self {
            EntityKind::Movie => "movie",
            EntityKind::Comment => "comment",
        }
    }

    pub fn plural(self) -> &'static str {
        match self {
            EntityKind::Movie => "movies",
            EntityKind::Comment => "comments",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAction {
    Updated,
    Deleted,
}

impl fmt::Display for WriteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteAction::Updated => f.write_str("updated"),
            WriteAction::Deleted => f.write_str("deleted"),
        }
    }
}

/// Every way a repository operation can fail.
///
/// `Display` is the exact text callers receive in the `error` field.
#[derive(Debug, Error)]
pub enum RepoError {
    /// A required field was missing; the store was never contacted.
    #[error("{0}")]
    Validation(&'static str),

    #[error("No item found with identifier {identifier}.")]
    NotFound { identifier: String },

    /// Comment lookups report a miss with the generic text.
    #[error("Something went wrong. Please try again.")]
    CommentNotFound { id: ObjectId },

    #[error("Something went wrong. Please try again.")]
    WriteNotAcknowledged,

    #[error("Something went wrong. {count} {} were {action}. Please try again.", .entity.plural())]
    Cardinality {
        entity: EntityKind,
        action: WriteAction,
        count: u64,
    },

    #[error("Invalid identifier {0}.")]
    MalformedIdentifier(String),

    #[error("Something went wrong. Please try again.")]
    Store(#[from] StoreError),
}

impl RepoError {
    pub fn not_found(identifier: impl Into<String>) -> Self {
        RepoError::NotFound {
            identifier: identifier.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RepoError::NotFound { .. } | RepoError::CommentNotFound { .. }
        )
    }
}
