use async_trait::async_trait;
use mongodb::bson::{Bson, Document};

use crate::core::Result;

/// Read request handed to a backend; filter and sort are already in document form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindRequest {
    pub filter: Document,
    pub sort: Option<Document>,
    pub limit: Option<i64>,
}

impl FindRequest {
    pub fn new(filter: Document) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }
}

/// Result of a replace-with-upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaceOutcome {
    pub matched: u64,
    /// Identifier of a newly created document, when the replace inserted.
    pub upserted_id: Option<Bson>,
}

/// Minimal collection operations the document adapter needs.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn ensure_unique_index(&self, collection: &str, field: &str) -> Result<()>;

    async fn find(&self, collection: &str, request: FindRequest) -> Result<Vec<Document>>;

    async fn count(&self, collection: &str, filter: Document) -> Result<u64>;

    /// Inserts `document`, failing on a duplicate `_id` or unique key. Returns the `_id`.
    async fn insert_one(&self, collection: &str, document: Document) -> Result<Bson>;

    /// Replaces the first document matching `filter`, inserting when none matches.
    async fn replace_one(
        &self,
        collection: &str,
        filter: Document,
        document: Document,
    ) -> Result<ReplaceOutcome>;

    /// Applies `$set` to every matching document. Returns the number matched.
    async fn update_many(&self, collection: &str, filter: Document, set: Document) -> Result<u64>;

    /// Removes the first matching document. Returns 0 or 1.
    async fn delete_one(&self, collection: &str, filter: Document) -> Result<u64>;
}
