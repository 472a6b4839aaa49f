mod helper;

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use sqlx::{PgPool, Row as _};

use crate::{
    adapters::{
        Adapter, Row,
        sql::{ColumnTypes, Dialect},
    },
    error::Error,
    guard::Ident,
    plan::Statement,
};

/// PostgreSQL adapter.
///
/// Identifiers are double-quoted and placeholders numbered (`$1`, `$2`, ...).
/// Postgres types every parameter, so each placeholder is cast to its
/// column's type, read once per table from the catalog and cached. Call
/// [`PostgresAdapter::clear_column_cache`] after altering a queried table.
pub struct PostgresAdapter {
    pub(crate) pool: PgPool,
    columns: Mutex<HashMap<String, Arc<ColumnTypes>>>,
}

impl PostgresAdapter {
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            columns: Mutex::new(HashMap::new()),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn clear_column_cache(&self) {
        self.columns
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    async fn column_types(&self, table: &str) -> Result<Arc<ColumnTypes>, Error> {
        let cached = self
            .columns
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(table)
            .cloned();
        if let Some(types) = cached {
            return Ok(types);
        }

        let rows = sqlx::query(
            r#"
            SELECT a.attname::text, format_type(a.atttypid, NULL)
            FROM pg_attribute a
            WHERE a.attrelid = to_regclass($1)
              AND a.attnum > 0
              AND NOT a.attisdropped
            "#,
        )
        .bind(Dialect::Postgres.quote(table))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::QueryFailed(e.to_string()))?;

        let types = rows
            .iter()
            .map(|row| Ok((row.try_get::<String, _>(0)?, row.try_get::<String, _>(1)?)))
            .collect::<Result<ColumnTypes, sqlx::Error>>()
            .map_err(|e| Error::Deserialize(e.to_string()))?;
        let types = Arc::new(types);

        // Unknown tables are not cached; the query itself reports them.
        if !types.is_empty() {
            self.columns
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(table.to_string(), types.clone());
        }
        Ok(types)
    }
}

#[async_trait]
impl Adapter for PostgresAdapter {
    async fn count(&self, stmt: &Statement) -> Result<i64, Error> {
        let types = self.column_types(&stmt.table).await?;
        let rendered = Dialect::Postgres.count(stmt, &types);
        let row = Self::prepare(&rendered)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::QueryFailed(e.to_string()))?;
        row.try_get::<i64, _>(0)
            .map_err(|e| Error::Deserialize(e.to_string()))
    }

    async fn fetch_rows(&self, stmt: &Statement) -> Result<Vec<Row>, Error> {
        let types = self.column_types(&stmt.table).await?;
        let rendered = Dialect::Postgres.select(stmt, &types);
        let rows = Self::prepare(&rendered)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::QueryFailed(e.to_string()))?;
        rows.iter().map(Self::map_row).collect()
    }

    async fn fetch_sums(&self, stmt: &Statement, fields: &[Ident]) -> Result<Row, Error> {
        let types = self.column_types(&stmt.table).await?;
        let rendered = Dialect::Postgres.sums(stmt, fields, &types);
        let row = Self::prepare(&rendered)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::QueryFailed(e.to_string()))?;
        Self::map_row(&row)
    }
}
