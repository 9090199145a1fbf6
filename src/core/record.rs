use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};

use crate::core::{Result, StoreError, Value};

/// Name of the single identifier field visible above the store facade.
pub const ID_FIELD: &str = "id";

/// One row or document, normalized so callers cannot tell which store produced it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn id(&self) -> Option<&Value> {
        self.get(ID_FIELD)
    }

    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(Value::as_f64)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.get(field).and_then(Value::as_bool)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Keeps only the named fields, in place.
    pub fn project(&mut self, keep: &[String]) {
        self.fields.retain(|name, _| keep.iter().any(|k| k == name));
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect(),
        )
    }

    /// Decodes into a typed model through its serde representation.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.to_json())
            .map_err(|e| StoreError::TypeMismatch(format!("Cannot decode record: {e}")))
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Product {
        id: Value,
        name: String,
        price: f64,
        active: bool,
    }

    #[test]
    fn decode_typed_model() {
        let record = Record::new()
            .with("id", 7)
            .with("name", "Widget")
            .with("price", 10)
            .with("active", true)
            .with("extra", "ignored");

        let product: Product = record.decode().unwrap();
        assert_eq!(product.id, Value::Integer(7));
        assert_eq!(product.name, "Widget");
        assert_eq!(product.price, 10.0);
        assert!(product.active);
    }

    #[test]
    fn project_keeps_named_fields() {
        let mut record = Record::new().with("id", 1).with("name", "a").with("price", 2.5);
        record.project(&["name".to_string()]);
        assert_eq!(record.len(), 1);
        assert_eq!(record.get_str("name"), Some("a"));
    }

    #[test]
    fn serializes_as_flat_object() {
        let record = Record::new().with("id", 3).with("name", "x");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json, serde_json::json!({"id": 3, "name": "x"}));
    }
}
