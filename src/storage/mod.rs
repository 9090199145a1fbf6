//! Store adapters behind one interface.
//!
//! Both adapters execute the typed statements from [`crate::query`]. The
//! literal operations (`get_one`, `get_many`, `run`) translate SQL text into
//! those statements by default; the relational adapter overrides them and
//! hands the text to SQLite untouched.

pub mod document;
pub mod relational;

use std::fmt;

use async_trait::async_trait;

use crate::core::{Record, Result, StoreError, Value};
use crate::parser::QueryTranslator;
use crate::query::{RunResult, Select, Statement};

pub use document::{Connector, DocumentBackend, DocumentStore, MemoryBackend, MongoBackend};
pub use relational::SqliteStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Relational,
    Document,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relational => write!(f, "relational"),
            Self::Document => write!(f, "document"),
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    fn backend(&self) -> Backend;

    /// Creates tables or indexes declared by the schema registry. Idempotent.
    async fn init(&self) -> Result<()>;

    async fn fetch_one(&self, select: &Select) -> Result<Option<Record>>;

    async fn fetch_all(&self, select: &Select) -> Result<Vec<Record>>;

    async fn execute(&self, statement: &Statement) -> Result<RunResult>;

    async fn get_one(&self, sql: &str, params: &[Value]) -> Result<Option<Record>> {
        let select = translate_select(sql, params)?;
        self.fetch_one(&select).await
    }

    async fn get_many(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>> {
        let select = translate_select(sql, params)?;
        self.fetch_all(&select).await
    }

    async fn run(&self, sql: &str, params: &[Value]) -> Result<RunResult> {
        let statement = QueryTranslator::new().translate(sql, params)?;
        if matches!(statement, Statement::Select(_)) {
            return Err(StoreError::UnsupportedStatement(
                "run expects INSERT, UPDATE or DELETE".to_string(),
            ));
        }
        self.execute(&statement).await
    }
}

fn translate_select(sql: &str, params: &[Value]) -> Result<Select> {
    match QueryTranslator::new().translate(sql, params)? {
        Statement::Select(select) => Ok(select),
        other => Err(StoreError::UnsupportedStatement(format!(
            "{} cannot be read; use run",
            other.verb()
        ))),
    }
}
