//! # Krino
//!
//! *κρίνω: Ancient Greek for "to sift, to separate, to judge".*
//!
//! Krino turns loosely-typed filter input into paged SQL queries. Callers hand
//! it a flat key/value map (typically a decoded request) or a condition struct;
//! krino works out which columns to filter on, with which operator, how to
//! order and page the result, and whether to add a column-wise sum.
//!
//! ## Condition keys
//!
//! A key names a column, optionally prefixed with an operator:
//!
//! | Key            | SQL                      |
//! |----------------|--------------------------|
//! | `age`          | `` `age` = ? ``          |
//! | `gtAge`        | `` `age` > ? ``          |
//! | `gte_age`      | `` `age` >= ? ``         |
//! | `ltAge`/`lteAge` | `<` / `<=`             |
//! | `neqStatus`    | `` `status` <> ? ``      |
//! | `inId`/`ninId` | `IN (...)` / `NOT IN (...)` |
//! | `likeName`/`nlikeName` | `LIKE` / `NOT LIKE` |
//!
//! `page`, `pagesize` and `orderKey` (`"desc_createdAt"`, `"asc_name"`) drive
//! paging and ordering. Keys starting with `#` are ignored, except
//! [`SUM_FIELDS_KEY`], which lists the fields to sum on page 1.
//!
//! Values are always bound parameters. Column names are interpolated, so every
//! one of them must consist of ASCII letters and underscores only; anything
//! else fails the query with [`Error::InjectionRejected`] before any SQL runs.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use krino::{Config, Engine, adapters::sqlite::SqliteAdapter};
//! use serde_json::json;
//!
//! let engine = Engine::new(Box::new(SqliteAdapter::new_memory().await?), Config::default());
//!
//! let search = json!({"gtAge": 18, "page": 1, "pagesize": 20, "#sum": ["score"]});
//! let envelope = engine
//!     .table("users")
//!     .query_with_map(search.as_object().unwrap())
//!     .await?;
//! ```
//!
//! Structured conditions derive their field list:
//!
//! ```rust,ignore
//! #[derive(Condition)]
//! struct UserSearch {
//!     base: BaseCondition,
//!     gt_age: Option<i64>,
//!     like_name: Option<String>,
//! }
//! ```
//!
//! ## Feature flags
//!
//! | Flag       | Default | Description                          |
//! |------------|---------|--------------------------------------|
//! | `derive`   | ✓       | `Condition` and `SumFields` derives  |
//! | `postgres` | ✓       | PostgreSQL adapter via sqlx          |
//! | `sqlite`   | ✓       | SQLite adapter (in-memory or file)   |

pub mod adapters;
pub mod compile;
pub mod condition;
pub mod config;
pub mod error;
pub mod guard;
pub mod naming;
pub mod plan;
pub mod project;
pub mod sieve;
pub mod walk;

use std::sync::Arc;

use serde_json::{Map, Value};

pub use crate::adapters::{Adapter, Row};
pub use crate::condition::{BaseCondition, NoSum, SumFields};
pub use crate::config::Config;
pub use crate::error::Error;
pub use crate::sieve::{Envelope, SUM_FIELDS_KEY, Sieve};
pub use crate::walk::{Shape, ToShape};

#[cfg(feature = "derive")]
pub use krino_derive::*;

/// The Engine holds the adapter and configuration shared by every query.
/// Each query runs on its own [`Sieve`].
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Krino>,
}

pub struct Krino {
    adapter: Arc<dyn Adapter>,
    config: Config,
}

impl Engine {
    pub fn new(adapter: Box<dyn Adapter>, config: Config) -> Self {
        Self {
            inner: Arc::new(Krino {
                adapter: Arc::from(adapter),
                config,
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Start a query against `table`. The name is quoted, not guarded; it must
    /// not come from caller input.
    pub fn table(&self, table: impl Into<String>) -> Sieve {
        Sieve::new(
            self.inner.adapter.clone(),
            table.into(),
            self.inner.config.clone(),
        )
    }

    /// Shorthand for `self.table(table).query_with_map(search)`.
    pub async fn query_with_map(
        &self,
        table: &str,
        search: &Map<String, Value>,
    ) -> Result<Envelope, Error> {
        self.table(table).query_with_map(search).await
    }
}
