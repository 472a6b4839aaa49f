use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde_json::Value;
use sqlx::{
    Column, Decode, Postgres, Row as _, Type, TypeInfo,
    postgres::{PgArguments, PgRow},
    query::Query as PgQuery,
};

use super::PostgresAdapter;
use crate::{
    adapters::{Row, sql::Rendered},
    error::Error,
};

impl PostgresAdapter {
    pub(super) fn prepare(rendered: &Rendered) -> PgQuery<'_, Postgres, PgArguments> {
        tracing::debug!(sql = %rendered.sql, binds = rendered.binds.len(), "postgres query");
        rendered
            .binds
            .iter()
            .fold(sqlx::query(&rendered.sql), |query, value| {
                Self::bind_value(query, value)
            })
    }

    fn bind_value<'a>(
        query: PgQuery<'a, Postgres, PgArguments>,
        value: &Value,
    ) -> PgQuery<'a, Postgres, PgArguments> {
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
            other => query.bind(other.clone()),
        }
    }

    fn get<'r, T>(row: &'r PgRow, idx: usize) -> Result<Option<T>, Error>
    where
        T: Decode<'r, Postgres> + Type<Postgres>,
    {
        row.try_get::<Option<T>, _>(idx)
            .map_err(|e| Error::Deserialize(e.to_string()))
    }

    pub(super) fn map_row(row: &PgRow) -> Result<Row, Error> {
        let mut out = Row::with_capacity(row.len());
        for column in row.columns() {
            let idx = column.ordinal();
            let value = match column.type_info().name() {
                "BOOL" => Self::get::<bool>(row, idx)?.map(Value::from),
                "INT2" => Self::get::<i16>(row, idx)?.map(Value::from),
                "INT4" => Self::get::<i32>(row, idx)?.map(Value::from),
                "INT8" => Self::get::<i64>(row, idx)?.map(Value::from),
                "FLOAT4" => Self::get::<f32>(row, idx)?.map(Value::from),
                "FLOAT8" => Self::get::<f64>(row, idx)?.map(Value::from),
                "NUMERIC" => Self::get::<Decimal>(row, idx)?.map(decimal_value),
                "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" => {
                    Self::get::<String>(row, idx)?.map(Value::String)
                }
                "JSON" | "JSONB" => Self::get::<Value>(row, idx)?,
                "BOOL[]" => Self::get::<Vec<bool>>(row, idx)?.map(Value::from),
                "INT4[]" => Self::get::<Vec<i32>>(row, idx)?.map(Value::from),
                "INT8[]" => Self::get::<Vec<i64>>(row, idx)?.map(Value::from),
                "FLOAT8[]" => Self::get::<Vec<f64>>(row, idx)?.map(Value::from),
                "TEXT[]" | "VARCHAR[]" => Self::get::<Vec<String>>(row, idx)?.map(Value::from),
                "UUID" => Self::get::<uuid::Uuid>(row, idx)?.map(|u| Value::String(u.to_string())),
                "TIMESTAMPTZ" => Self::get::<chrono::DateTime<chrono::Utc>>(row, idx)?
                    .map(|t| Value::String(t.to_rfc3339())),
                "TIMESTAMP" => Self::get::<chrono::NaiveDateTime>(row, idx)?
                    .map(|t| Value::String(t.to_string())),
                "DATE" => Self::get::<chrono::NaiveDate>(row, idx)?
                    .map(|t| Value::String(t.to_string())),
                "TIME" => Self::get::<chrono::NaiveTime>(row, idx)?
                    .map(|t| Value::String(t.to_string())),
                other => {
                    return Err(Error::Deserialize(format!(
                        "unsupported column type {} for {}",
                        other,
                        column.name()
                    )));
                }
            };
            out.insert(column.name().to_string(), value.unwrap_or(Value::Null));
        }
        Ok(out)
    }
}

/// Whole decimals become JSON integers, so sums of integer columns (which
/// Postgres returns as `NUMERIC`) decode into integer fields. Other values
/// become floats, or text when out of range.
fn decimal_value(d: Decimal) -> Value {
    if d.fract().is_zero() {
        if let Some(i) = d.to_i64() {
            return Value::from(i);
        }
    }
    d.to_f64()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(d.to_string()))
}
