use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::{
    Client, Collection, Database,
    bson::{Document, doc},
    options::{Acknowledgment, ClientOptions, Credential, WriteConcern},
};

use super::{
    DeleteOutcome, DocumentStore, FindSpec, InsertOutcome, StoreResult, UpdateOutcome,
};
use crate::config::StoreConfig;

/// [`DocumentStore`] backed by a MongoDB database.
#[derive(Debug, Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    /// Connects to the configured cluster and binds to its database.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let client = create_client(config).await?;
        Ok(Self::from_database(get_database(&client, &config.database)))
    }

    pub fn from_database(db: Database) -> Self {
        Self { db }
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection::<Document>(name)
    }
}

/// Create MongoDB connection
pub async fn create_client(config: &StoreConfig) -> Result<Client> {
    let mut options = ClientOptions::parse(&config.uri)
        .await
        .context("Failed to parse MongoDB connection string")?;

    if let Some(credential) = &config.credential {
        options.credential = Some(
            Credential::builder()
                .username(credential.username.clone())
                .password(credential.password.clone())
                .build(),
        );
    }

    let client = Client::with_options(options).context("Failed to connect to MongoDB")?;

    // Ping to verify connection
    client
        .database("admin")
        .run_command(doc! {"ping": 1})
        .await
        .context("Failed to ping MongoDB")?;

    tracing::info!("Successfully connected to MongoDB");
    Ok(client)
}

/// Get database handle
pub fn get_database(client: &Client, db_name: &str) -> Database {
    client.database(db_name)
}

/// `w: 0` is the only write concern under which the server never reports back.
fn acknowledges(write_concern: Option<&WriteConcern>) -> bool {
    !matches!(
        write_concern.and_then(|wc| wc.w.as_ref()),
        Some(Acknowledgment::Nodes(0))
    )
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindSpec,
    ) -> StoreResult<Vec<Document>> {
        let coll = self.collection(collection);
        let mut find = coll.find(filter);
        if let Some(sort) = options.sort {
            find = find.sort(sort);
        }
        if let Some(limit) = options.limit {
            find = find.limit(limit);
        }
        if let Some(projection) = options.projection {
            find = find.projection(projection);
        }

        let cursor = find.await?;
        let documents: Vec<Document> = cursor.try_collect().await?;
        Ok(documents)
    }

    async fn find_one(&self, collection: &str, filter: Document) -> StoreResult<Option<Document>> {
        let document = self.collection(collection).find_one(filter).await?;
        Ok(document)
    }

    async fn insert_one(&self, collection: &str, document: Document) -> StoreResult<InsertOutcome> {
        let result = self.collection(collection).insert_one(document).await?;
        Ok(InsertOutcome {
            acknowledged: acknowledges(self.db.write_concern()),
            inserted_id: result.inserted_id,
        })
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> StoreResult<UpdateOutcome> {
        let result = self
            .collection(collection)
            .update_one(filter, update)
            .await?;
        Ok(UpdateOutcome {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
        })
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> StoreResult<DeleteOutcome> {
        let result = self.collection(collection).delete_one(filter).await?;
        Ok(DeleteOutcome {
            deleted_count: result.deleted_count,
        })
    }
}
