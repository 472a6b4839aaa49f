use std::{sync::Arc, time::Instant};

use metrics::histogram;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::{
    adapters::{Adapter, Row},
    compile::{Compiled, Predicate, compile},
    condition::SumFields,
    config::Config,
    error::Error,
    guard::Ident,
    naming::to_snake,
    plan::{QueryState, Statement},
    project::project,
    walk::{ToShape, Walker},
};

/// Map-mode key holding the list of fields to sum on the first page.
pub const SUM_FIELDS_KEY: &str = "#sum";

/// The normalized result of a map-mode query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub total: i64,
    pub list: Vec<Row>,
    pub sum: Row,
}

/// A single query against one table.
///
/// Conditions are pushed in, then one of the `query_with_*` calls consumes the
/// sieve and runs count, page and (for page 1) sum.
pub struct Sieve {
    adapter: Arc<dyn Adapter>,
    table: String,
    config: Config,
    state: QueryState,
    predicates: Vec<Predicate>,
}

impl Sieve {
    pub(crate) fn new(adapter: Arc<dyn Adapter>, table: String, config: Config) -> Self {
        Self {
            adapter,
            table,
            config,
            state: QueryState::default(),
            predicates: Vec::new(),
        }
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Compiles one `(name, value)` pair into the pending query.
    pub fn push(&mut self, name: &str, value: &Value) -> Result<&mut Self, Error> {
        match compile(name, value, self.config.allow_empty_string)? {
            Compiled::State(directive) => self.state.apply(directive),
            Compiled::Predicate(predicate) => self.predicates.push(predicate),
            Compiled::Skip => {}
        }
        Ok(self)
    }

    /// Walks a structured condition and pushes every leaf it holds.
    pub fn push_condition<C: ToShape + ?Sized>(&mut self, condition: &C) -> Result<&mut Self, Error> {
        let shape = condition.to_shape();
        Walker::new(|name: &str, value: &Value| self.push(name, value).map(|_| ()))
            .walk("", &shape)?;
        Ok(self)
    }

    /// Guards every identifier and freezes the query.
    pub fn statement(&self) -> Result<Statement, Error> {
        self.state
            .statement(&self.table, &self.predicates, self.config.max_pagesize)
    }

    fn sum_idents<'a>(fields: impl IntoIterator<Item = &'a str>) -> Result<Vec<Ident>, Error> {
        fields
            .into_iter()
            .filter(|f| !f.is_empty())
            .map(|f| Ident::new(to_snake(f)))
            .collect()
    }

    /// Runs a query from a flat key/value map.
    ///
    /// Result rows have their column names converted with
    /// [`to_upper_camel`](crate::naming::to_upper_camel). Sums are requested
    /// with an array of field names under [`SUM_FIELDS_KEY`] and only computed
    /// on page 1.
    pub async fn query_with_map(self, search: &Map<String, Value>) -> Result<Envelope, Error> {
        let start = Instant::now();
        let table = self.table.clone();
        let result = self.run_map(search).await;
        record_duration(table, start);
        result
    }

    async fn run_map(mut self, search: &Map<String, Value>) -> Result<Envelope, Error> {
        for (key, value) in search {
            self.push(key, value)?;
        }

        let sum_fields = match search.get(SUM_FIELDS_KEY) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(fields)) => Self::sum_idents(
                fields
                    .iter()
                    .map(|f| {
                        f.as_str().ok_or_else(|| {
                            Error::InvalidArgument(format!("sum field must be a string, got {}", f))
                        })
                    })
                    .collect::<Result<Vec<_>, Error>>()?,
            )?,
            Some(other) => {
                return Err(Error::InvalidArgument(format!(
                    "{} must be an array of field names, got {}",
                    SUM_FIELDS_KEY, other
                )));
            }
        };
        let stmt = self.statement()?;

        let mut envelope = Envelope {
            total: self.adapter.count(&stmt).await?,
            ..Default::default()
        };
        if envelope.total > 0 {
            envelope.list = project(self.adapter.fetch_rows(&stmt).await?);
            if self.state.is_first_page() && !sum_fields.is_empty() {
                envelope.sum = self.adapter.fetch_sums(&stmt, &sum_fields).await?;
            }
        }
        Ok(envelope)
    }

    /// Runs a query from a structured condition into caller-owned destinations.
    ///
    /// Every destination is optional. Without `total` the count is skipped and
    /// the list is always fetched; with `total` and no match, the list is
    /// emptied and nothing else runs. Rows are decoded into `T` by column name.
    /// Every field of `S` is summed, on page 1 only.
    ///
    /// An all-NULL sum row (page 1 matched nothing) leaves `sum` untouched;
    /// NULL sums are left out before decoding so `#[serde(default)]` fields
    /// keep their defaults.
    pub async fn query_with_struct<C, T, S>(
        self,
        search: Option<&C>,
        list: Option<&mut Vec<T>>,
        sum: Option<&mut S>,
        total: Option<&mut i64>,
    ) -> Result<(), Error>
    where
        C: ToShape + ?Sized,
        T: DeserializeOwned,
        S: SumFields,
    {
        let start = Instant::now();
        let table = self.table.clone();
        let result = self.run_struct(search, list, sum, total).await;
        record_duration(table, start);
        result
    }

    async fn run_struct<C, T, S>(
        mut self,
        search: Option<&C>,
        list: Option<&mut Vec<T>>,
        sum: Option<&mut S>,
        total: Option<&mut i64>,
    ) -> Result<(), Error>
    where
        C: ToShape + ?Sized,
        T: DeserializeOwned,
        S: SumFields,
    {
        if let Some(search) = search {
            self.push_condition(search)?;
        }
        let sum_fields = if sum.is_some() {
            Self::sum_idents(S::FIELDS.iter().copied())?
        } else {
            Vec::new()
        };
        let stmt = self.statement()?;

        let matched = match total {
            Some(total) => {
                *total = self.adapter.count(&stmt).await?;
                *total > 0
            }
            None => true,
        };
        if !matched {
            if let Some(list) = list {
                list.clear();
            }
            return Ok(());
        }

        if let Some(list) = list {
            let rows = self.adapter.fetch_rows(&stmt).await?;
            *list = rows
                .into_iter()
                .map(|row| {
                    serde_json::from_value(Value::Object(row))
                        .map_err(|e| Error::Deserialize(e.to_string()))
                })
                .collect::<Result<Vec<T>, Error>>()?;
        }

        if let Some(sum) = sum {
            if self.state.is_first_page() && !sum_fields.is_empty() {
                let row: Row = self
                    .adapter
                    .fetch_sums(&stmt, &sum_fields)
                    .await?
                    .into_iter()
                    .filter(|(_, v)| !v.is_null())
                    .collect();
                if !row.is_empty() {
                    *sum = serde_json::from_value(Value::Object(row))
                        .map_err(|e| Error::InvalidSumDestination(e.to_string()))?;
                }
            }
        }
        Ok(())
    }
}

/// Recorded for failed queries too.
fn record_duration(table: String, start: Instant) {
    histogram!("krino.query.duration_ms",
        "table" => table
    )
    .record(start.elapsed().as_millis() as f64);
}
