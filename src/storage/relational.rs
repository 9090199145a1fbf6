use std::str::FromStr;

use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Column, Row, Sqlite, TypeInfo, ValueRef};
use tracing::{debug, info};

use super::{Backend, Store};
use crate::core::{Record, Result, StoreError, Value};
use crate::query::sql::render;
use crate::query::{RunResult, Select, Statement};
use crate::schema::COLLECTIONS;

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// SQLite adapter. Literal SQL runs natively with positional binding.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if missing) the database at `url`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        if is_memory_url(url) {
            return Self::in_memory().await;
        }

        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        info!(url = url, "relational store connected");
        Ok(Self::new(pool))
    }

    /// Private in-memory database. A single connection that never recycles keeps it alive.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn query_optional(&self, sql: &str, params: &[Value]) -> Result<Option<Record>> {
        debug!(sql = sql, params = params.len(), "relational fetch_one");
        let row = bind_all(sqlx::query(sql), params)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row.as_ref().map(decode_row).transpose()
    }

    async fn query_all(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>> {
        debug!(sql = sql, params = params.len(), "relational fetch_all");
        let rows = bind_all(sqlx::query(sql), params)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        rows.iter().map(decode_row).collect()
    }

    async fn execute_sql(&self, sql: &str, params: &[Value]) -> Result<RunResult> {
        debug!(sql = sql, params = params.len(), "relational run");
        let result = bind_all(sqlx::query(sql), params)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let changes = result.rows_affected();
        let last_id = (is_insert(sql) && changes > 0)
            .then(|| Value::Integer(result.last_insert_rowid()));

        Ok(RunResult { last_id, changes })
    }
}

#[async_trait]
impl Store for SqliteStore {
    fn backend(&self) -> Backend {
        Backend::Relational
    }

    async fn init(&self) -> Result<()> {
        for schema in COLLECTIONS {
            sqlx::query(&schema.create_table_sql())
                .execute(&self.pool)
                .await?;
        }
        info!(tables = COLLECTIONS.len(), "relational schema ready");
        Ok(())
    }

    async fn fetch_one(&self, select: &Select) -> Result<Option<Record>> {
        let rendered = render(&Statement::Select(select.clone()))?;
        self.query_optional(&rendered.sql, &rendered.params).await
    }

    async fn fetch_all(&self, select: &Select) -> Result<Vec<Record>> {
        let rendered = render(&Statement::Select(select.clone()))?;
        self.query_all(&rendered.sql, &rendered.params).await
    }

    async fn execute(&self, statement: &Statement) -> Result<RunResult> {
        let rendered = render(statement)?;
        self.execute_sql(&rendered.sql, &rendered.params).await
    }

    async fn get_one(&self, sql: &str, params: &[Value]) -> Result<Option<Record>> {
        self.query_optional(sql, params).await
    }

    async fn get_many(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>> {
        self.query_all(sql, params).await
    }

    async fn run(&self, sql: &str, params: &[Value]) -> Result<RunResult> {
        self.execute_sql(sql, params).await
    }
}

fn is_memory_url(url: &str) -> bool {
    matches!(url, "sqlite::memory:" | "sqlite://:memory:" | "sqlite::memory")
}

fn is_insert(sql: &str) -> bool {
    let head = sql.trim_start();
    ["INSERT", "REPLACE"].iter().any(|verb| {
        head.get(..verb.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(verb))
    })
}

fn bind_all<'q>(mut query: SqliteQuery<'q>, params: &[Value]) -> SqliteQuery<'q> {
    for value in params {
        query = match value {
            Value::Null => query.bind(None::<String>),
            Value::Integer(i) => query.bind(*i),
            Value::Float(f) => query.bind(*f),
            Value::Text(s) => query.bind(s.clone()),
            Value::Boolean(b) => query.bind(*b),
        };
    }
    query
}

/// Unique-key failures become [`StoreError::ConstraintViolation`], as they do for documents.
fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            StoreError::ConstraintViolation(db_err.message().to_string())
        }
        _ => StoreError::Relational(err),
    }
}

fn decode_row(row: &SqliteRow) -> Result<Record> {
    let mut record = Record::new();

    for column in row.columns() {
        let ordinal = column.ordinal();
        let raw = row.try_get_raw(ordinal)?;

        let value = if raw.is_null() {
            Value::Null
        } else {
            let storage = raw.type_info().name().to_ascii_uppercase();
            let declared = column.type_info().name().to_ascii_uppercase();

            match storage.as_str() {
                "INTEGER" if declared == "BOOLEAN" => {
                    Value::Boolean(row.try_get_unchecked::<i64, _>(ordinal)? != 0)
                }
                "INTEGER" | "BOOLEAN" => Value::Integer(row.try_get_unchecked::<i64, _>(ordinal)?),
                "REAL" => Value::Float(row.try_get_unchecked::<f64, _>(ordinal)?),
                "BLOB" => {
                    let bytes = row.try_get_unchecked::<Vec<u8>, _>(ordinal)?;
                    Value::Text(String::from_utf8_lossy(&bytes).into_owned())
                }
                _ => Value::Text(row.try_get_unchecked::<String, _>(ordinal)?),
            }
        };

        record.insert(column.name(), value);
    }

    Ok(record)
}
