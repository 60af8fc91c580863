use anyhow::{Result, bail};
use std::fmt;

const DEFAULT_DATABASE: &str = "sample_mflix";
const DEFAULT_MOVIES_COLLECTION: &str = "movies";
const DEFAULT_COMMENTS_COLLECTION: &str = "comments";

/// Names of the two collections the repositories read and write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionNames {
    pub movies: String,
    pub comments: String,
}

impl Default for CollectionNames {
    fn default() -> Self {
        Self {
            movies: DEFAULT_MOVIES_COLLECTION.to_string(),
            comments: DEFAULT_COMMENTS_COLLECTION.to_string(),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct StoreCredential {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for StoreCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreCredential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Connection settings for the document store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub uri: String,
    /// Attached to the parsed client options when the URI carries none.
    pub credential: Option<StoreCredential>,
    pub database: String,
    pub collections: CollectionNames,
}

impl StoreConfig {
    /// Reads the process environment, honouring a `.env` file if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup.
    ///
    /// `MONGODB_URI` wins when set. Otherwise the URI is composed from
    /// `MONGODB_HOST` and the credential from `MONGODB_USER` / `MONGODB_PSWD`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let (uri, credential) = match var("MONGODB_URI") {
            Some(uri) => (uri, None),
            None => {
                let Some(host) = var("MONGODB_HOST") else {
                    bail!("MONGODB_URI or MONGODB_HOST must be set");
                };
                let (Some(username), Some(password)) = (var("MONGODB_USER"), var("MONGODB_PSWD"))
                else {
                    bail!("MONGODB_USER and MONGODB_PSWD must be set when MONGODB_URI is not");
                };
                (
                    format!("mongodb+srv://{}/?retryWrites=true&w=majority", host),
                    Some(StoreCredential { username, password }),
                )
            }
        };

        Ok(Self {
            uri,
            credential,
            database: var("MFLIX_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            collections: CollectionNames {
                movies: var("MFLIX_MOVIES_COLLECTION")
                    .unwrap_or_else(|| DEFAULT_MOVIES_COLLECTION.to_string()),
                comments: var("MFLIX_COMMENTS_COLLECTION")
                    .unwrap_or_else(|| DEFAULT_COMMENTS_COLLECTION.to_string()),
            },
        })
    }
}
