//! Document store adapter.
//!
//! Typed statements become BSON filters, sorts and writes against a
//! [`DocumentBackend`]. Results are normalized so `_id` is published as `id`
//! and never leaks to callers.

mod backend;
mod memory;
mod mongo;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Bson, Document, Regex, doc};
use tracing::{debug, info};

use super::{Backend, Store};
use crate::core::{ID_FIELD, Record, Result, StoreError, Value};
use crate::query::pattern::like_to_regex;
use crate::query::{
    CompareOp, Condition, Delete, Filter, Insert, Projection, RunResult, Select, SortDirection,
    Statement, Update,
};
use crate::schema::{COLLECTIONS, unique_keys};

pub use backend::{DocumentBackend, FindRequest, ReplaceOutcome};
pub use memory::MemoryBackend;
pub use mongo::{Connector, MongoBackend};

/// Native identifier field of the document store.
pub const DOCUMENT_ID: &str = "_id";

pub struct DocumentStore<B: DocumentBackend> {
    backend: B,
}

impl<B: DocumentBackend> DocumentStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend_ref(&self) -> &B {
        &self.backend
    }

    async fn find(&self, select: &Select, limit: Option<i64>) -> Result<Vec<Record>> {
        let request = FindRequest {
            filter: filter_document(&select.filter)?,
            sort: select.sort.as_ref().map(|sort| {
                let direction = match sort.direction {
                    SortDirection::Asc => 1,
                    SortDirection::Desc => -1,
                };
                doc! { native_field(&sort.field): direction }
            }),
            limit,
        };
        debug!(collection = %select.collection, filter = %request.filter, "document find");

        let documents = self.backend.find(&select.collection, request).await?;
        Ok(documents
            .into_iter()
            .map(|document| {
                let mut record = normalize_document(document);
                if let Projection::Fields(fields) = &select.projection {
                    record.project(fields);
                }
                record
            })
            .collect())
    }

    async fn count(&self, select: &Select, alias: &str) -> Result<Record> {
        let filter = filter_document(&select.filter)?;
        let total = self.backend.count(&select.collection, filter).await?;
        let total = i64::try_from(total)
            .map_err(|_| StoreError::ExecutionError(format!("count overflow: {}", total)))?;
        Ok(Record::new().with(alias, total))
    }

    async fn insert(&self, insert: &Insert) -> Result<RunResult> {
        let document = insert_document(insert);

        if insert.replace
            && let Some(filter) = replace_filter(&insert.collection, &document)
        {
            let outcome = self
                .backend
                .replace_one(&insert.collection, filter.clone(), document.clone())
                .await?;

            let id = match outcome
                .upserted_id
                .or_else(|| document.get(DOCUMENT_ID).cloned())
            {
                Some(id) => Some(id),
                None => self.lookup_id(&insert.collection, filter).await?,
            };
            debug!(collection = %insert.collection, matched = outcome.matched, "document replace");

            return Ok(RunResult {
                last_id: id.map(Value::from_bson),
                changes: 1,
            });
        }

        let id = self.backend.insert_one(&insert.collection, document).await?;
        Ok(RunResult {
            last_id: Some(Value::from_bson(id)),
            changes: 1,
        })
    }

    async fn lookup_id(&self, collection: &str, filter: Document) -> Result<Option<Bson>> {
        let request = FindRequest {
            filter,
            sort: None,
            limit: Some(1),
        };
        Ok(self
            .backend
            .find(collection, request)
            .await?
            .into_iter()
            .next()
            .and_then(|mut document| document.remove(DOCUMENT_ID)))
    }

    async fn update(&self, update: &Update) -> Result<RunResult> {
        let mut set = Document::new();
        for (field, value) in &update.assignments {
            if field == ID_FIELD {
                return Err(StoreError::UnsupportedStatement(
                    "the identifier cannot be reassigned".to_string(),
                ));
            }
            set.insert(field.clone(), value.to_bson());
        }
        if set.is_empty() {
            return Err(StoreError::ParseError(format!(
                "UPDATE {} requires at least one assignment",
                update.collection
            )));
        }

        let filter = filter_document(&update.filter)?;
        let changes = self
            .backend
            .update_many(&update.collection, filter, set)
            .await?;
        Ok(RunResult {
            last_id: None,
            changes,
        })
    }

    async fn delete(&self, delete: &Delete) -> Result<RunResult> {
        let filter = filter_document(&delete.filter)?;
        let changes = self.backend.delete_one(&delete.collection, filter).await?;
        Ok(RunResult {
            last_id: None,
            changes,
        })
    }
}

#[async_trait]
impl<B: DocumentBackend> Store for DocumentStore<B> {
    fn backend(&self) -> Backend {
        Backend::Document
    }

    async fn init(&self) -> Result<()> {
        let mut indexes = 0;
        for schema in COLLECTIONS {
            for field in schema.unique {
                self.backend.ensure_unique_index(schema.name, field).await?;
                indexes += 1;
            }
        }
        info!(backend = self.backend.name(), indexes, "document indexes ready");
        Ok(())
    }

    async fn fetch_one(&self, select: &Select) -> Result<Option<Record>> {
        if select.limit == Some(0) {
            return Ok(None);
        }
        if let Projection::Count { alias } = &select.projection {
            return self.count(select, alias).await.map(Some);
        }
        Ok(self.find(select, Some(1)).await?.into_iter().next())
    }

    async fn fetch_all(&self, select: &Select) -> Result<Vec<Record>> {
        // Both drivers read a zero limit as "unlimited".
        if select.limit == Some(0) {
            return Ok(Vec::new());
        }
        if let Projection::Count { alias } = &select.projection {
            return Ok(vec![self.count(select, alias).await?]);
        }
        let limit = select.limit.map(|n| i64::try_from(n).unwrap_or(i64::MAX));
        self.find(select, limit).await
    }

    async fn execute(&self, statement: &Statement) -> Result<RunResult> {
        match statement {
            Statement::Insert(insert) => self.insert(insert).await,
            Statement::Update(update) => self.update(update).await,
            Statement::Delete(delete) => self.delete(delete).await,
            Statement::Select(_) => Err(StoreError::UnsupportedStatement(
                "SELECT cannot be executed as a mutation".to_string(),
            )),
        }
    }
}

fn native_field(field: &str) -> &str {
    if field == ID_FIELD { DOCUMENT_ID } else { field }
}

/// Identifier value in native form: 24-hex text becomes an ObjectId, integers stay 64-bit.
pub fn native_id(value: &Value) -> Bson {
    match value {
        Value::Text(text) => ObjectId::parse_str(text)
            .map(Bson::ObjectId)
            .unwrap_or_else(|_| Bson::String(text.clone())),
        other => other.to_bson(),
    }
}

fn native_value(field: &str, value: &Value) -> Bson {
    if field == ID_FIELD {
        native_id(value)
    } else {
        value.to_bson()
    }
}

/// Builds the query document for a conjunction; two or more conditions become `$and`.
pub fn filter_document(filter: &Filter) -> Result<Document> {
    let mut clauses = filter
        .conditions()
        .iter()
        .map(condition_document)
        .collect::<Result<Vec<_>>>()?;

    Ok(match clauses.len() {
        0 => Document::new(),
        1 => clauses.remove(0),
        _ => doc! { "$and": clauses },
    })
}

fn condition_document(condition: &Condition) -> Result<Document> {
    match condition {
        Condition::Compare { field, op, value } => {
            let operand = native_value(field, value);
            let field = native_field(field);
            Ok(match op {
                CompareOp::Eq => doc! { field: operand },
                CompareOp::NotEq => doc! { field: { "$ne": operand } },
                CompareOp::Lt => doc! { field: { "$lt": operand } },
                CompareOp::LtEq => doc! { field: { "$lte": operand } },
                CompareOp::Gt => doc! { field: { "$gt": operand } },
                CompareOp::GtEq => doc! { field: { "$gte": operand } },
            })
        }
        Condition::Like { field, pattern } => {
            let regex = Regex {
                pattern: like_to_regex(pattern),
                options: "i".to_string(),
            };
            Ok(doc! { native_field(field): Bson::RegularExpression(regex) })
        }
        Condition::Any(conditions) => {
            if conditions.is_empty() {
                return Err(StoreError::UnsupportedCondition(
                    "empty disjunction".to_string(),
                ));
            }
            let branches = conditions
                .iter()
                .map(condition_document)
                .collect::<Result<Vec<_>>>()?;
            Ok(doc! { "$or": branches })
        }
    }
}

fn insert_document(insert: &Insert) -> Document {
    insert
        .fields
        .iter()
        .map(|(field, value)| (native_field(field).to_string(), native_value(field, value)))
        .collect()
}

/// Filter selecting the document an `INSERT OR REPLACE` overwrites: by `_id`, else by a unique key.
fn replace_filter(collection: &str, document: &Document) -> Option<Document> {
    if let Some(id) = document.get(DOCUMENT_ID) {
        return Some(doc! { DOCUMENT_ID: id.clone() });
    }

    unique_keys(collection).iter().find_map(|key| {
        document
            .get(*key)
            .filter(|value| !matches!(value, Bson::Null))
            .map(|value| doc! { *key: value.clone() })
    })
}

/// Republishes `_id` as `id` and converts every field to a [`Value`].
pub fn normalize_document(document: Document) -> Record {
    document
        .into_iter()
        .map(|(field, value)| {
            let field = if field == DOCUMENT_ID {
                ID_FIELD.to_string()
            } else {
                field
            };
            (field, Value::from_bson(value))
        })
        .collect()
}
