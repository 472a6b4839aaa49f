use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    Column, Row as _, Sqlite, TypeInfo, ValueRef,
    query::Query as SqlxQuery,
    sqlite::{SqliteArguments, SqlitePool, SqlitePoolOptions, SqliteRow},
};

use crate::{
    adapters::{
        Adapter, Row,
        sql::{ColumnTypes, Dialect, Rendered},
    },
    error::Error,
    guard::Ident,
    plan::Statement,
};

/// SQLite adapter.
///
/// Identifiers are quoted with backticks, which SQLite accepts alongside
/// standard double quotes. SQLite compares across storage classes, so
/// placeholders are never cast.
pub struct SqliteAdapter {
    pub(crate) pool: SqlitePool,
}

impl SqliteAdapter {
    /// Create a new SQLite adapter with a file-based database
    pub async fn new_file(path: &str) -> Result<Self, Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&format!("sqlite:{}", path))
            .await
            .map_err(|e| Error::QueryFailed(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Create a new SQLite adapter with an in-memory database
    pub async fn new_memory() -> Result<Self, Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| Error::QueryFailed(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Create from an existing pool
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn prepare(rendered: &Rendered) -> SqlxQuery<'_, Sqlite, SqliteArguments<'_>> {
        tracing::debug!(sql = %rendered.sql, binds = rendered.binds.len(), "sqlite query");
        rendered
            .binds
            .iter()
            .fold(sqlx::query(&rendered.sql), |query, value| {
                Self::bind_value(query, value)
            })
    }

    fn bind_value<'a>(
        query: SqlxQuery<'a, Sqlite, SqliteArguments<'a>>,
        value: &Value,
    ) -> SqlxQuery<'a, Sqlite, SqliteArguments<'a>> {
        match value {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    query.bind(i)
                } else if let Some(f) = n.as_f64() {
                    query.bind(f)
                } else {
                    query.bind(n.to_string())
                }
            }
            Value::String(s) => query.bind(s.clone()),
            // Nested arrays and objects are compared as their JSON text.
            other => query.bind(other.to_string()),
        }
    }

    fn map_row(row: &SqliteRow) -> Result<Row, Error> {
        let de = |e: sqlx::Error| Error::Deserialize(e.to_string());
        let mut out = Row::with_capacity(row.len());
        for column in row.columns() {
            let idx = column.ordinal();
            let (is_null, type_name) = {
                let raw = row.try_get_raw(idx).map_err(de)?;
                (raw.is_null(), raw.type_info().name().to_string())
            };
            // Non-null values report their storage class, not the declared type.
            let value = if is_null {
                Value::Null
            } else {
                match type_name.as_str() {
                    "INTEGER" | "BOOLEAN" => {
                        Value::from(row.try_get_unchecked::<i64, _>(idx).map_err(de)?)
                    }
                    "REAL" | "NUMERIC" => serde_json::Number::from_f64(
                        row.try_get_unchecked::<f64, _>(idx).map_err(de)?,
                    )
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
                    "BLOB" => Value::from(row.try_get_unchecked::<Vec<u8>, _>(idx).map_err(de)?),
                    _ => Value::String(row.try_get_unchecked::<String, _>(idx).map_err(de)?),
                }
            };
            out.insert(column.name().to_string(), value);
        }
        Ok(out)
    }
}

#[async_trait]
impl Adapter for SqliteAdapter {
    async fn count(&self, stmt: &Statement) -> Result<i64, Error> {
        let rendered = Dialect::Sqlite.count(stmt, &ColumnTypes::new());
        let row = Self::prepare(&rendered)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::QueryFailed(e.to_string()))?;
        row.try_get::<i64, _>(0)
            .map_err(|e| Error::Deserialize(e.to_string()))
    }

    async fn fetch_rows(&self, stmt: &Statement) -> Result<Vec<Row>, Error> {
        let rendered = Dialect::Sqlite.select(stmt, &ColumnTypes::new());
        let rows = Self::prepare(&rendered)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::QueryFailed(e.to_string()))?;
        rows.iter().map(Self::map_row).collect()
    }

    async fn fetch_sums(&self, stmt: &Statement, fields: &[Ident]) -> Result<Row, Error> {
        let rendered = Dialect::Sqlite.sums(stmt, fields, &ColumnTypes::new());
        let row = Self::prepare(&rendered)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::QueryFailed(e.to_string()))?;
        Self::map_row(&row)
    }
}
