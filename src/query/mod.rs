//! Typed query model shared by both store adapters.
//!
//! Literal SQL is translated into these types by [`crate::parser`]; route
//! handlers build them directly through the builder methods.

pub mod pattern;
pub mod sql;

use std::fmt;

use crate::core::{ID_FIELD, Value, timestamp_now};

pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
    },
    /// Case-insensitive SQL LIKE pattern (`%` any sequence, `_` one character).
    Like { field: String, pattern: String },
    /// Disjunction of the nested conditions.
    Any(Vec<Condition>),
}

impl Condition {
    pub fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    pub fn id(value: impl Into<Value>) -> Self {
        Self::eq(ID_FIELD, value)
    }

    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::Like {
            field: field.into(),
            pattern: pattern.into(),
        }
    }

    pub fn any(conditions: Vec<Condition>) -> Self {
        Self::Any(conditions)
    }
}

/// Conjunction of conditions. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn push(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Equality value bound to `field`, if the filter pins it.
    pub fn equality(&self, field: &str) -> Option<&Value> {
        self.conditions.iter().find_map(|condition| match condition {
            Condition::Compare {
                field: f,
                op: CompareOp::Eq,
                value,
            } if f == field => Some(value),
            _ => None,
        })
    }
}

impl From<Condition> for Filter {
    fn from(condition: Condition) -> Self {
        Self::new().and(condition)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Projection {
    #[default]
    All,
    Fields(Vec<String>),
    /// Count of matching records, published under `alias`.
    Count { alias: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub collection: String,
    pub projection: Projection,
    pub filter: Filter,
    pub sort: Option<Sort>,
    pub limit: Option<u64>,
}

impl Select {
    pub fn from(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            projection: Projection::All,
            filter: Filter::new(),
            sort: None,
            limit: None,
        }
    }

    pub fn count(collection: impl Into<String>) -> Self {
        Self::from(collection).project(Projection::Count {
            alias: "count".to_string(),
        })
    }

    pub fn project(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.filter.push(condition);
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some(Sort {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn is_count(&self) -> bool {
        matches!(self.projection, Projection::Count { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub collection: String,
    pub fields: Vec<(String, Value)>,
    /// `INSERT OR REPLACE`: overwrite the record with the same identifier or unique key.
    pub replace: bool,
}

impl Insert {
    pub fn into(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            fields: Vec::new(),
            replace: false,
        }
    }

    pub fn value(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    pub fn or_replace(mut self) -> Self {
        self.replace = true;
        self
    }

    /// Sets `field`, replacing an earlier value for the same field.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((field, value)),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    /// Populates creation and update timestamps the caller did not supply.
    pub fn stamp_timestamps(&mut self) {
        let now = timestamp_now();
        for field in [CREATED_AT, UPDATED_AT] {
            if self.get(field).is_none() {
                self.fields.push((field.to_string(), Value::Text(now.clone())));
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub collection: String,
    pub filter: Filter,
    pub assignments: Vec<(String, Value)>,
}

impl Update {
    pub fn table(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filter: Filter::new(),
            assignments: Vec::new(),
        }
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.assignments.push((field.into(), value.into()));
        self
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.filter.push(condition);
        self
    }

    pub fn is_assigned(&self, field: &str) -> bool {
        self.assignments.iter().any(|(name, _)| name == field)
    }

    /// Refreshes the update timestamp unless the caller assigned it explicitly.
    pub fn stamp_timestamp(&mut self) {
        if !self.is_assigned(UPDATED_AT) {
            self.assignments
                .push((UPDATED_AT.to_string(), Value::Text(timestamp_now())));
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub collection: String,
    pub filter: Filter,
}

impl Delete {
    pub fn from(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filter: Filter::new(),
        }
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.filter.push(condition);
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(Select),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
}

impl Statement {
    pub fn collection(&self) -> &str {
        match self {
            Self::Select(s) => &s.collection,
            Self::Insert(i) => &i.collection,
            Self::Update(u) => &u.collection,
            Self::Delete(d) => &d.collection,
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Self::Select(_) => "SELECT",
            Self::Insert(_) => "INSERT",
            Self::Update(_) => "UPDATE",
            Self::Delete(_) => "DELETE",
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.verb(), self.collection())
    }
}

/// Outcome of a mutating statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunResult {
    /// Identifier assigned by an insert.
    pub last_id: Option<Value>,
    /// Rows or documents affected.
    pub changes: u64,
}
