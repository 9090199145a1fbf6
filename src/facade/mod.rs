//! Single entry point to whichever store the configuration selects.

use std::sync::Arc;

use tracing::info;

use crate::connection::{StoreConfig, StoreTarget};
use crate::core::{Record, Result, StoreError, Value};
use crate::query::{Condition, Delete, Filter, Insert, RunResult, Select, Statement, Update};
use crate::storage::{Backend, DocumentStore, MemoryBackend, MongoBackend, SqliteStore, Store};

/// Store handle shared by every request handler.
///
/// The adapter is chosen once in [`StoreFacade::open`]; callers never learn
/// which one is behind it except through [`StoreFacade::backend`].
#[derive(Clone)]
pub struct StoreFacade {
    store: Arc<dyn Store>,
}

impl StoreFacade {
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        config.validate()?;

        let store: Arc<dyn Store> = match &config.target {
            StoreTarget::Relational { url } => {
                Arc::new(SqliteStore::connect(url, config.max_connections).await?)
            }
            StoreTarget::Document { .. } if config.is_memory_document() => {
                Arc::new(DocumentStore::new(MemoryBackend::new()))
            }
            StoreTarget::Document { .. } => {
                Arc::new(DocumentStore::new(MongoBackend::from_config(config)?))
            }
        };

        info!(backend = %store.backend(), url = %config.redacted_url(), "store selected");
        Ok(Self { store })
    }

    pub fn from_store(store: impl Store + 'static) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    pub fn backend(&self) -> Backend {
        self.store.backend()
    }

    pub async fn init(&self) -> Result<()> {
        self.store.init().await
    }

    /// First record matched by a literal SELECT, or `None`.
    pub async fn get_one(&self, sql: &str, params: &[Value]) -> Result<Option<Record>> {
        self.store.get_one(sql, params).await
    }

    /// Every record matched by a literal SELECT; empty when nothing matches.
    pub async fn get_many(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>> {
        self.store.get_many(sql, params).await
    }

    /// Executes a literal INSERT, UPDATE or DELETE.
    pub async fn run(&self, sql: &str, params: &[Value]) -> Result<RunResult> {
        self.store.run(sql, params).await
    }

    pub async fn find_by_id(&self, collection: &str, id: &Value) -> Result<Option<Record>> {
        self.find_one(Select::from(collection).filter(Condition::id(id.clone())))
            .await
    }

    pub async fn find_one(&self, select: Select) -> Result<Option<Record>> {
        self.store.fetch_one(&select).await
    }

    pub async fn find(&self, select: Select) -> Result<Vec<Record>> {
        self.store.fetch_all(&select).await
    }

    pub async fn count(&self, collection: &str, filter: Filter) -> Result<u64> {
        let record = self
            .store
            .fetch_one(&Select::count(collection).with_filter(filter))
            .await?;
        let total = record.and_then(|r| r.get_i64("count")).unwrap_or(0);
        Ok(u64::try_from(total).unwrap_or(0))
    }

    /// Inserts with both timestamps stamped and returns the assigned identifier.
    pub async fn insert(&self, mut insert: Insert) -> Result<Value> {
        insert.stamp_timestamps();
        let collection = insert.collection.clone();
        let result = self.store.execute(&Statement::Insert(insert)).await?;
        result.last_id.ok_or_else(|| {
            StoreError::ExecutionError(format!("insert into {} reported no identifier", collection))
        })
    }

    /// Updates every match, refreshing `updated_at`.
    pub async fn update(&self, mut update: Update) -> Result<RunResult> {
        update.stamp_timestamp();
        self.store.execute(&Statement::Update(update)).await
    }

    /// Returns whether a record was updated.
    pub async fn update_by_id(
        &self,
        collection: &str,
        id: &Value,
        assignments: Vec<(String, Value)>,
    ) -> Result<bool> {
        let mut update = Update::table(collection).filter(Condition::id(id.clone()));
        update.assignments = assignments;
        Ok(self.update(update).await?.changes > 0)
    }

    /// Returns whether a record was removed.
    pub async fn delete_by_id(&self, collection: &str, id: &Value) -> Result<bool> {
        let delete = Delete::from(collection).filter(Condition::id(id.clone()));
        Ok(self.store.execute(&Statement::Delete(delete)).await?.changes > 0)
    }

    /// Removes every record matching `filter`; the document store removes one per call.
    pub async fn delete_where(&self, collection: &str, filter: Filter) -> Result<u64> {
        let mut removed = 0;
        loop {
            let delete = Delete::from(collection).with_filter(filter.clone());
            let changes = self.store.execute(&Statement::Delete(delete)).await?.changes;
            removed += changes;
            if changes == 0 || self.backend() == Backend::Relational {
                return Ok(removed);
            }
        }
    }
}
