use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Bson, Document};
use tokio::sync::RwLock;

use super::backend::{DocumentBackend, FindRequest, ReplaceOutcome};
use super::DOCUMENT_ID;
use crate::core::{Result, StoreError, Value};
use crate::query::pattern::cached_regex;

#[derive(Default)]
struct Collection {
    documents: Vec<Document>,
    unique: Vec<String>,
}

impl Collection {
    /// Fails when `candidate` collides with another document on `_id` or a unique key.
    fn check_unique(&self, candidate: &Document, skip: Option<usize>) -> Result<()> {
        let keys = std::iter::once(DOCUMENT_ID).chain(self.unique.iter().map(String::as_str));

        for key in keys {
            let Some(value) = candidate.get(key).filter(|v| !matches!(v, Bson::Null)) else {
                continue;
            };
            let clash = self
                .documents
                .iter()
                .enumerate()
                .filter(|(index, _)| Some(*index) != skip)
                .any(|(_, existing)| existing.get(key).is_some_and(|other| bson_eq(other, value)));
            if clash {
                return Err(StoreError::ConstraintViolation(format!(
                    "duplicate key: {} = {}",
                    key, value
                )));
            }
        }
        Ok(())
    }

    fn first_match(&self, filter: &Document) -> Result<Option<usize>> {
        for (index, document) in self.documents.iter().enumerate() {
            if matches_filter(document, filter)? {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }
}

/// In-process document store evaluating the query operators the adapter emits.
///
/// Supports equality, `$ne`, `$gt`/`$gte`/`$lt`/`$lte`, regular expressions,
/// `$and` and `$or`. Documents keep insertion order.
#[derive(Default)]
pub struct MemoryBackend {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn ensure_unique_index(&self, collection: &str, field: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        let entry = collections.entry(collection.to_string()).or_default();
        if !entry.unique.iter().any(|existing| existing == field) {
            entry.unique.push(field.to_string());
        }
        Ok(())
    }

    async fn find(&self, collection: &str, request: FindRequest) -> Result<Vec<Document>> {
        let collections = self.collections.read().await;
        let Some(entry) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut found = Vec::new();
        for document in &entry.documents {
            if matches_filter(document, &request.filter)? {
                found.push(document.clone());
            }
        }

        if let Some(sort) = &request.sort {
            found.sort_by(|a, b| compare_by_sort(a, b, sort));
        }
        if let Some(limit) = request.limit.filter(|n| *n > 0) {
            found.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }

        Ok(found)
    }

    async fn count(&self, collection: &str, filter: Document) -> Result<u64> {
        let collections = self.collections.read().await;
        let Some(entry) = collections.get(collection) else {
            return Ok(0);
        };

        let mut total = 0;
        for document in &entry.documents {
            if matches_filter(document, &filter)? {
                total += 1;
            }
        }
        Ok(total)
    }

    async fn insert_one(&self, collection: &str, mut document: Document) -> Result<Bson> {
        let id = document
            .get(DOCUMENT_ID)
            .cloned()
            .unwrap_or_else(|| Bson::ObjectId(ObjectId::new()));
        // _id first, as the server stores it
        let mut stored = Document::new();
        stored.insert(DOCUMENT_ID, id.clone());
        document.remove(DOCUMENT_ID);
        for (key, value) in document {
            stored.insert(key, value);
        }

        let mut collections = self.collections.write().await;
        let entry = collections.entry(collection.to_string()).or_default();
        entry.check_unique(&stored, None)?;
        entry.documents.push(stored);
        Ok(id)
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: Document,
        document: Document,
    ) -> Result<ReplaceOutcome> {
        let mut collections = self.collections.write().await;
        let entry = collections.entry(collection.to_string()).or_default();

        match entry.first_match(&filter)? {
            Some(index) => {
                let existing_id = entry.documents[index].get(DOCUMENT_ID).cloned();
                if let (Some(existing), Some(new_id)) = (&existing_id, document.get(DOCUMENT_ID))
                    && !bson_eq(existing, new_id)
                {
                    return Err(StoreError::ConstraintViolation(
                        "replacement would change the immutable _id".to_string(),
                    ));
                }

                let mut replacement = Document::new();
                if let Some(id) = existing_id {
                    replacement.insert(DOCUMENT_ID, id);
                }
                for (key, value) in document {
                    if key != DOCUMENT_ID {
                        replacement.insert(key, value);
                    }
                }

                entry.check_unique(&replacement, Some(index))?;
                entry.documents[index] = replacement;
                Ok(ReplaceOutcome {
                    matched: 1,
                    upserted_id: None,
                })
            }
            None => {
                let mut stored = Document::new();
                let id = document
                    .get(DOCUMENT_ID)
                    .cloned()
                    .unwrap_or_else(|| Bson::ObjectId(ObjectId::new()));
                stored.insert(DOCUMENT_ID, id.clone());
                // equality fields of the filter seed the upserted document
                for (key, value) in filter.iter() {
                    if !key.starts_with('$') && !matches!(value, Bson::Document(_)) {
                        stored.insert(key.clone(), value.clone());
                    }
                }
                for (key, value) in document {
                    if key != DOCUMENT_ID {
                        stored.insert(key, value);
                    }
                }

                entry.check_unique(&stored, None)?;
                entry.documents.push(stored);
                Ok(ReplaceOutcome {
                    matched: 0,
                    upserted_id: Some(id),
                })
            }
        }
    }

    async fn update_many(&self, collection: &str, filter: Document, set: Document) -> Result<u64> {
        let mut collections = self.collections.write().await;
        let Some(entry) = collections.get_mut(collection) else {
            return Ok(0);
        };

        let mut targets = Vec::new();
        for (index, document) in entry.documents.iter().enumerate() {
            if matches_filter(document, &filter)? {
                targets.push(index);
            }
        }

        // validate every change before applying any, so a clash leaves the collection untouched
        let mut updated = Vec::with_capacity(targets.len());
        for &index in &targets {
            let mut document = entry.documents[index].clone();
            for (key, value) in &set {
                document.insert(key.clone(), value.clone());
            }
            entry.check_unique(&document, Some(index))?;
            updated.push((index, document));
        }
        if !entry.unique.is_empty() && updated.len() > 1 {
            let touches_unique = set.keys().any(|key| entry.unique.contains(key));
            if touches_unique {
                return Err(StoreError::ConstraintViolation(
                    "update would assign one unique value to several documents".to_string(),
                ));
            }
        }

        for (index, document) in updated {
            entry.documents[index] = document;
        }
        Ok(targets.len() as u64)
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> Result<u64> {
        let mut collections = self.collections.write().await;
        let Some(entry) = collections.get_mut(collection) else {
            return Ok(0);
        };

        match entry.first_match(&filter)? {
            Some(index) => {
                entry.documents.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

fn matches_filter(document: &Document, filter: &Document) -> Result<bool> {
    for (key, expected) in filter {
        let matched = match key.as_str() {
            "$and" => all_branches(document, expected, true)?,
            "$or" => all_branches(document, expected, false)?,
            op if op.starts_with('$') => {
                return Err(StoreError::UnsupportedCondition(format!(
                    "unsupported operator {}",
                    op
                )));
            }
            field => matches_field(document.get(field).unwrap_or(&Bson::Null), expected)?,
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

/// `$and` (all) or `$or` (any) over an array of sub-filters.
fn all_branches(document: &Document, branches: &Bson, conjunction: bool) -> Result<bool> {
    let Bson::Array(branches) = branches else {
        return Err(StoreError::UnsupportedCondition(
            "$and/$or expects an array".to_string(),
        ));
    };

    for branch in branches {
        let Bson::Document(branch) = branch else {
            return Err(StoreError::UnsupportedCondition(
                "$and/$or branches must be documents".to_string(),
            ));
        };
        let matched = matches_filter(document, branch)?;
        if matched != conjunction {
            return Ok(matched);
        }
    }
    Ok(conjunction)
}

fn matches_field(actual: &Bson, expected: &Bson) -> Result<bool> {
    match expected {
        Bson::RegularExpression(regex) => match actual {
            Bson::String(text) => {
                let compiled = cached_regex(&regex.pattern, regex.options.contains('i'))?;
                Ok(compiled.is_match(text))
            }
            _ => Ok(false),
        },
        Bson::Document(operators) if operators.keys().all(|k| k.starts_with('$')) => {
            for (op, operand) in operators {
                let matched = match op.as_str() {
                    "$eq" => bson_eq(actual, operand),
                    "$ne" => !bson_eq(actual, operand),
                    "$gt" => ordered(actual, operand, |o| o == Ordering::Greater),
                    "$gte" => ordered(actual, operand, |o| o != Ordering::Less),
                    "$lt" => ordered(actual, operand, |o| o == Ordering::Less),
                    "$lte" => ordered(actual, operand, |o| o != Ordering::Greater),
                    other => {
                        return Err(StoreError::UnsupportedCondition(format!(
                            "unsupported operator {}",
                            other
                        )));
                    }
                };
                if !matched {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        expected => Ok(bson_eq(actual, expected)),
    }
}

fn bson_eq(a: &Bson, b: &Bson) -> bool {
    match (a, b) {
        (Bson::ObjectId(a), Bson::ObjectId(b)) => a == b,
        (Bson::ObjectId(_), _) | (_, Bson::ObjectId(_)) => false,
        _ => Value::from_bson(a.clone()) == Value::from_bson(b.clone()),
    }
}

/// Range operators only match values of comparable types, as on the server.
fn ordered(actual: &Bson, operand: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    if matches!(actual, Bson::Null) || matches!(operand, Bson::Null) {
        return false;
    }
    Value::from_bson(actual.clone())
        .compare(&Value::from_bson(operand.clone()))
        .map(accept)
        .unwrap_or(false)
}

fn type_rank(value: &Bson) -> u8 {
    match value {
        Bson::Null | Bson::Undefined => 0,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => 1,
        Bson::String(_) => 2,
        Bson::ObjectId(_) => 3,
        Bson::Boolean(_) => 4,
        _ => 5,
    }
}

fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    let (rank_a, rank_b) = (type_rank(a), type_rank(b));
    if rank_a != rank_b {
        return rank_a.cmp(&rank_b);
    }
    Value::from_bson(a.clone())
        .compare(&Value::from_bson(b.clone()))
        .unwrap_or(Ordering::Equal)
}

fn compare_by_sort(a: &Document, b: &Document, sort: &Document) -> Ordering {
    for (field, direction) in sort {
        let left = a.get(field).unwrap_or(&Bson::Null);
        let right = b.get(field).unwrap_or(&Bson::Null);
        let ordering = compare_bson(left, right);
        let ordering = match direction {
            Bson::Int32(d) if *d < 0 => ordering.reverse(),
            Bson::Int64(d) if *d < 0 => ordering.reverse(),
            _ => ordering,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{Regex, doc};

    async fn seeded() -> MemoryBackend {
        let backend = MemoryBackend::new();
        for (id, name, category, price, active) in [
            (1_i64, "Hand Saw", "Tools", 12.5, true),
            (2, "Hammer", "Tools", 9.0, true),
            (3, "Apple", "Food", 0.5, false),
            (4, "Sawdust", "Garden", 3.0, true),
        ] {
            backend
                .insert_one(
                    "products",
                    doc! { "_id": id, "name": name, "category": category, "price": price, "active": active },
                )
                .await
                .unwrap();
        }
        backend
    }

    fn ids(documents: &[Document]) -> Vec<i64> {
        documents
            .iter()
            .filter_map(|d| d.get_i64("_id").ok())
            .collect()
    }

    fn like(pattern: &str) -> Bson {
        Bson::RegularExpression(Regex {
            pattern: pattern.to_string(),
            options: "i".to_string(),
        })
    }

    #[tokio::test]
    async fn equality_and_ranges() {
        let backend = seeded().await;
        let found = backend
            .find("products", FindRequest::new(doc! { "category": "Tools" }))
            .await
            .unwrap();
        assert_eq!(ids(&found), vec![1, 2]);

        let found = backend
            .find(
                "products",
                FindRequest::new(doc! { "price": { "$gte": 3, "$lt": 12.5 } }),
            )
            .await
            .unwrap();
        assert_eq!(ids(&found), vec![2, 4]);

        let found = backend
            .find("products", FindRequest::new(doc! { "category": { "$ne": "Tools" } }))
            .await
            .unwrap();
        assert_eq!(ids(&found), vec![3, 4]);
    }

    #[tokio::test]
    async fn regex_and_disjunction() {
        let backend = seeded().await;
        let filter = doc! {
            "$and": [
                { "active": true },
                { "$or": [ { "name": like("^.*SAW.*$") }, { "category": like("^food$") } ] },
            ]
        };
        let found = backend
            .find("products", FindRequest::new(filter))
            .await
            .unwrap();
        assert_eq!(ids(&found), vec![1, 4]);
    }

    #[tokio::test]
    async fn sort_and_limit() {
        let backend = seeded().await;
        let request = FindRequest {
            filter: Document::new(),
            sort: Some(doc! { "price": -1 }),
            limit: Some(2),
        };
        let found = backend.find("products", request).await.unwrap();
        assert_eq!(ids(&found), vec![1, 2]);
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let backend = seeded().await;
        let err = backend
            .insert_one("products", doc! { "_id": 1_i64, "name": "Again" })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ConstraintViolation(_)));
        assert_eq!(backend.count("products", Document::new()).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn unique_index_is_enforced() {
        let backend = MemoryBackend::new();
        backend.ensure_unique_index("users", "email").await.unwrap();
        backend
            .insert_one("users", doc! { "email": "a@b.c" })
            .await
            .unwrap();
        let err = backend
            .insert_one("users", doc! { "email": "a@b.c" })
            .await
            .unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[tokio::test]
    async fn update_many_touches_all_matches() {
        let backend = seeded().await;
        let changed = backend
            .update_many("products", doc! { "category": "Tools" }, doc! { "price": 1.0 })
            .await
            .unwrap();
        assert_eq!(changed, 2);

        let found = backend
            .find("products", FindRequest::new(doc! { "price": 1.0 }))
            .await
            .unwrap();
        assert_eq!(ids(&found), vec![1, 2]);
    }

    #[tokio::test]
    async fn delete_one_removes_first_match_only() {
        let backend = seeded().await;
        let removed = backend
            .delete_one("products", doc! { "category": "Tools" })
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let found = backend
            .find("products", FindRequest::new(doc! { "category": "Tools" }))
            .await
            .unwrap();
        assert_eq!(ids(&found), vec![2]);
    }

    #[tokio::test]
    async fn replace_upserts_then_overwrites() {
        let backend = MemoryBackend::new();
        let outcome = backend
            .replace_one(
                "admin_settings",
                doc! { "setting_key": "tax" },
                doc! { "setting_key": "tax", "setting_value": "0.2" },
            )
            .await
            .unwrap();
        assert_eq!(outcome.matched, 0);
        let id = outcome.upserted_id.unwrap();

        let outcome = backend
            .replace_one(
                "admin_settings",
                doc! { "setting_key": "tax" },
                doc! { "setting_key": "tax", "setting_value": "0.1" },
            )
            .await
            .unwrap();
        assert_eq!(outcome.matched, 1);

        let all = backend
            .find("admin_settings", FindRequest::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].get(DOCUMENT_ID), Some(&id));
        assert_eq!(all[0].get_str("setting_value").unwrap(), "0.1");
    }

    #[tokio::test]
    async fn missing_fields_compare_as_null() {
        let backend = MemoryBackend::new();
        backend
            .insert_one("orders", doc! { "_id": 1_i64, "notes": "x" })
            .await
            .unwrap();
        backend
            .insert_one("orders", doc! { "_id": 2_i64 })
            .await
            .unwrap();

        let found = backend
            .find("orders", FindRequest::new(doc! { "notes": { "$ne": "x" } }))
            .await
            .unwrap();
        assert_eq!(ids(&found), vec![2]);

        let found = backend
            .find("orders", FindRequest::new(doc! { "notes": { "$gt": "a" } }))
            .await
            .unwrap();
        assert_eq!(ids(&found), vec![1]);
    }
}
