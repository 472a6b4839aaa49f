//! Translation of a single `(name, value)` pair into a builder directive or a
//! WHERE predicate.

use serde_json::Value;

use crate::{error::Error, naming::to_snake};

/// Keys starting with this character are meta-fields and never compiled.
pub const RESERVED_MARKER: char = '#';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    In,
    NotIn,
    Like,
    NotLike,
}

impl Operator {
    /// Maps a key prefix such as `gte` to its operator.
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        let op = match prefix {
            "eq" => Operator::Equal,
            "neq" => Operator::NotEqual,
            "gt" => Operator::GreaterThan,
            "gte" => Operator::GreaterThanOrEqual,
            "lt" => Operator::LessThan,
            "lte" => Operator::LessThanOrEqual,
            "in" => Operator::In,
            "nin" => Operator::NotIn,
            "like" => Operator::Like,
            "nlike" => Operator::NotLike,
            _ => return None,
        };
        Some(op)
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "<>",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEqual => ">=",
            Operator::LessThan => "<",
            Operator::LessThanOrEqual => "<=",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
        }
    }

    /// `IN` and `NOT IN` take a parenthesised list instead of a single value.
    pub fn is_list(&self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }
}

/// A filter whose column has not been through the field guard yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column: String,
    pub operator: Operator,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Page(i64),
    PageSize(i64),
    Order { key: String, descending: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Compiled {
    State(Directive),
    Predicate(Predicate),
    Skip,
}

pub fn compile(name: &str, value: &Value, allow_empty_string: bool) -> Result<Compiled, Error> {
    if name.is_empty() || name.starts_with(RESERVED_MARKER) {
        return Ok(Compiled::Skip);
    }
    if !allow_empty_string && matches!(value, Value::String(s) if s.is_empty()) {
        return Ok(Compiled::Skip);
    }

    let key = to_snake(name);
    let compiled = match key.as_str() {
        "page" => Compiled::State(Directive::Page(coerce_int(&key, value)?)),
        "pagesize" | "page_size" => Compiled::State(Directive::PageSize(coerce_int(&key, value)?)),
        "orderkey" | "order_key" => {
            let Value::String(raw) = value else {
                return Err(Error::InvalidArgument(format!(
                    "{} must be a string, got {}",
                    key, value
                )));
            };
            let order = to_snake(raw);
            let directive = if let Some(rest) = order.strip_prefix("desc_") {
                Directive::Order {
                    key: rest.to_string(),
                    descending: true,
                }
            } else {
                Directive::Order {
                    key: order.strip_prefix("asc_").unwrap_or(&order).to_string(),
                    descending: false,
                }
            };
            Compiled::State(directive)
        }
        _ => {
            let (column, operator) = match key.split_once('_') {
                Some((prefix, rest)) => match Operator::from_prefix(prefix) {
                    Some(op) => (rest.to_string(), op),
                    None => (key.clone(), Operator::Equal),
                },
                None => (key.clone(), Operator::Equal),
            };
            Compiled::Predicate(Predicate {
                column,
                operator,
                value: value.clone(),
            })
        }
    };
    Ok(compiled)
}

/// Floats truncate toward zero; numeric strings are parsed the same way.
fn coerce_int(key: &str, value: &Value) -> Result<i64, Error> {
    let invalid = || Error::InvalidArgument(format!("{} must be numeric, got {}", key, value));
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else if let Some(u) = n.as_u64() {
                i64::try_from(u).map_err(|_| invalid())
            } else {
                n.as_f64().map(|f| f.trunc() as i64).ok_or_else(invalid)
            }
        }
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
                .ok_or_else(invalid)
        }
        _ => Err(invalid()),
    }
}
