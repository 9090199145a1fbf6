use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document, doc};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::backend::{DocumentBackend, FindRequest, ReplaceOutcome};
use crate::connection::{CircuitBreaker, ReconnectPolicy, StoreConfig, StoreTarget, connect_with_retry};
use crate::core::{Result, StoreError};

const DUPLICATE_KEY: i32 = 11000;

/// Produces a connected database handle. Without one, the backend parses
/// its URL, builds a client and pings the server.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Database>;
}

/// MongoDB backend. The client is created on first use and shared afterwards.
pub struct MongoBackend {
    url: String,
    database: String,
    server_selection_timeout: Duration,
    policy: ReconnectPolicy,
    breaker: CircuitBreaker,
    connector: Option<Arc<dyn Connector>>,
    connection: OnceCell<Database>,
}

impl MongoBackend {
    pub fn new(url: &str, database: &str, policy: ReconnectPolicy) -> Self {
        Self {
            url: url.to_string(),
            database: database.to_string(),
            server_selection_timeout: Duration::from_secs(5),
            breaker: CircuitBreaker::from_policy(&policy),
            policy,
            connector: None,
            connection: OnceCell::new(),
        }
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        let StoreTarget::Document { url, database } = &config.target else {
            return Err(StoreError::ExecutionError(
                "MongoBackend requires a document store target".to_string(),
            ));
        };
        Ok(Self::new(url, database, config.reconnect.clone())
            .server_selection_timeout(config.server_selection_timeout))
    }

    pub fn server_selection_timeout(mut self, timeout: Duration) -> Self {
        self.server_selection_timeout = timeout;
        self
    }

    pub fn with_connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Connected database. Concurrent first callers share one connection cycle;
    /// a failed cycle is not cached, so the next caller starts a fresh one.
    async fn database(&self) -> Result<&Database> {
        self.connection
            .get_or_try_init(|| {
                connect_with_retry(&self.policy, &self.breaker, "document store", || {
                    self.connect_once()
                })
            })
            .await
    }

    async fn connect_once(&self) -> Result<Database> {
        match &self.connector {
            Some(connector) => connector.connect().await,
            None => self.connect_and_ping().await,
        }
    }

    async fn connect_and_ping(&self) -> Result<Database> {
        let mut options = ClientOptions::parse(&self.url).await?;
        options.server_selection_timeout = Some(self.server_selection_timeout);
        if options.app_name.is_none() {
            options.app_name = Some("shopfront".to_string());
        }

        let client = Client::with_options(options)?;
        let database = client.database(&self.database);
        database.run_command(doc! { "ping": 1 }).await?;

        info!(database = %self.database, "document store connected");
        Ok(database)
    }

    async fn collection(&self, name: &str) -> Result<Collection<Document>> {
        Ok(self.database().await?.collection::<Document>(name))
    }
}

#[async_trait]
impl DocumentBackend for MongoBackend {
    fn name(&self) -> &'static str {
        "mongodb"
    }

    async fn ensure_unique_index(&self, collection: &str, field: &str) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { field: 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection(collection).await?.create_index(index).await?;
        debug!(collection, field, "unique index ensured");
        Ok(())
    }

    async fn find(&self, collection: &str, request: FindRequest) -> Result<Vec<Document>> {
        let collection = self.collection(collection).await?;
        let mut action = collection.find(request.filter);
        if let Some(sort) = request.sort {
            action = action.sort(sort);
        }
        if let Some(limit) = request.limit {
            action = action.limit(limit);
        }

        let cursor = action.await?;
        Ok(cursor.try_collect().await?)
    }

    async fn count(&self, collection: &str, filter: Document) -> Result<u64> {
        Ok(self
            .collection(collection)
            .await?
            .count_documents(filter)
            .await?)
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<Bson> {
        let result = self
            .collection(collection)
            .await?
            .insert_one(document)
            .await
            .map_err(map_write_error)?;
        Ok(result.inserted_id)
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: Document,
        document: Document,
    ) -> Result<ReplaceOutcome> {
        let result = self
            .collection(collection)
            .await?
            .replace_one(filter, document)
            .upsert(true)
            .await
            .map_err(map_write_error)?;
        Ok(ReplaceOutcome {
            matched: result.matched_count,
            upserted_id: result.upserted_id,
        })
    }

    async fn update_many(&self, collection: &str, filter: Document, set: Document) -> Result<u64> {
        let result = self
            .collection(collection)
            .await?
            .update_many(filter, doc! { "$set": set })
            .await
            .map_err(map_write_error)?;
        Ok(result.matched_count)
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> Result<u64> {
        let result = self
            .collection(collection)
            .await?
            .delete_one(filter)
            .await?;
        Ok(result.deleted_count)
    }
}

/// Duplicate-key failures become [`StoreError::ConstraintViolation`].
fn map_write_error(err: mongodb::error::Error) -> StoreError {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_err))
            if write_err.code == DUPLICATE_KEY =>
        {
            StoreError::ConstraintViolation(write_err.message.clone())
        }
        _ => StoreError::Document(err),
    }
}
