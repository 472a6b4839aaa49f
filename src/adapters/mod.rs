#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub mod sql;

use async_trait::async_trait;

use crate::{error::Error, guard::Ident, plan::Statement};

/// A result row: column name to value, in column order.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// -----------------------------
/// Adapter contract
/// -----------------------------
///
/// The database side of a query. Statements arrive with every identifier
/// already guarded; adapters render them for their dialect, bind the filter
/// values as parameters and decode rows into [`Row`]s.
#[async_trait]
pub trait Adapter: Send + Sync + 'static {
    /// `COUNT(*)` under the statement's filters. Order and paging are ignored.
    async fn count(&self, stmt: &Statement) -> Result<i64, Error>;

    /// All rows matching the statement, ordered and paged.
    async fn fetch_rows(&self, stmt: &Statement) -> Result<Vec<Row>, Error>;

    /// One row holding `SUM(field) AS field` for every field, under the
    /// statement's filters. Order and paging are ignored.
    async fn fetch_sums(&self, stmt: &Statement, fields: &[Ident]) -> Result<Row, Error>;
}
