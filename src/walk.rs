//! Structured conditions.
//!
//! A condition value describes itself as a [`Shape`]: absent, a scalar, a
//! structure with statically known fields, or a string-keyed map. Structures
//! usually get their [`ToShape`] impl from `#[derive(Condition)]`.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::Value;

use crate::error::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// An unset optional. Produces no predicate at all.
    Absent,
    Scalar(Value),
    Struct(Vec<(&'static str, Shape)>),
    Map(Vec<(String, Shape)>),
}

pub trait ToShape {
    fn to_shape(&self) -> Shape;
}

/// Visits a shape tree and hands every terminal `(name, value)` pair to `sink`.
///
/// Nested structures and maps are flattened: their leaves are emitted under
/// their own names with no path prefix. A leaf name seen twice is still
/// emitted twice, and logged.
pub(crate) struct Walker<F> {
    seen: HashSet<String>,
    sink: F,
}

impl<F> Walker<F>
where
    F: FnMut(&str, &Value) -> Result<(), Error>,
{
    pub(crate) fn new(sink: F) -> Self {
        Self {
            seen: HashSet::new(),
            sink,
        }
    }

    pub(crate) fn walk(&mut self, name: &str, shape: &Shape) -> Result<(), Error> {
        match shape {
            Shape::Absent => Ok(()),
            Shape::Scalar(value) => {
                if !name.is_empty() && !self.seen.insert(name.to_string()) {
                    tracing::warn!(
                        field = name,
                        "condition field appears at more than one nesting level"
                    );
                }
                (self.sink)(name, value)
            }
            Shape::Struct(fields) => {
                for (field, shape) in fields {
                    self.walk(field, shape)?;
                }
                Ok(())
            }
            Shape::Map(entries) => {
                for (key, shape) in entries {
                    self.walk(key, shape)?;
                }
                Ok(())
            }
        }
    }
}

impl Shape {
    /// Collapses a shape into a plain JSON value, for list elements.
    fn into_value(self) -> Value {
        match self {
            Shape::Absent => Value::Null,
            Shape::Scalar(v) => v,
            Shape::Struct(fields) => Value::Object(
                fields
                    .into_iter()
                    .map(|(k, s)| (k.to_string(), s.into_value()))
                    .collect(),
            ),
            Shape::Map(entries) => Value::Object(
                entries
                    .into_iter()
                    .map(|(k, s)| (k, s.into_value()))
                    .collect(),
            ),
        }
    }
}

macro_rules! scalar_shape {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ToShape for $ty {
                fn to_shape(&self) -> Shape {
                    Shape::Scalar(Value::from(self.clone()))
                }
            }
        )*
    };
}

scalar_shape!(
    i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, bool, String
);

impl ToShape for str {
    fn to_shape(&self) -> Shape {
        Shape::Scalar(Value::String(self.to_string()))
    }
}

impl ToShape for uuid::Uuid {
    fn to_shape(&self) -> Shape {
        Shape::Scalar(Value::String(self.to_string()))
    }
}

impl ToShape for chrono::DateTime<chrono::Utc> {
    fn to_shape(&self) -> Shape {
        Shape::Scalar(Value::String(
            self.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true),
        ))
    }
}

impl ToShape for chrono::NaiveDateTime {
    fn to_shape(&self) -> Shape {
        Shape::Scalar(Value::String(
            self.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
        ))
    }
}

impl ToShape for chrono::NaiveDate {
    fn to_shape(&self) -> Shape {
        Shape::Scalar(Value::String(self.format("%Y-%m-%d").to_string()))
    }
}

impl ToShape for chrono::NaiveTime {
    fn to_shape(&self) -> Shape {
        Shape::Scalar(Value::String(self.format("%H:%M:%S%.f").to_string()))
    }
}

impl ToShape for Value {
    fn to_shape(&self) -> Shape {
        match self {
            Value::Null => Shape::Absent,
            Value::Object(map) => map.to_shape(),
            other => Shape::Scalar(other.clone()),
        }
    }
}

impl ToShape for serde_json::Map<String, Value> {
    fn to_shape(&self) -> Shape {
        Shape::Map(
            self.iter()
                .map(|(k, v)| (k.clone(), v.to_shape()))
                .collect(),
        )
    }
}

impl<T: ToShape> ToShape for Option<T> {
    fn to_shape(&self) -> Shape {
        match self {
            Some(v) => v.to_shape(),
            None => Shape::Absent,
        }
    }
}

impl<T: ToShape + ?Sized> ToShape for &T {
    fn to_shape(&self) -> Shape {
        (**self).to_shape()
    }
}

impl<T: ToShape + ?Sized> ToShape for Box<T> {
    fn to_shape(&self) -> Shape {
        (**self).to_shape()
    }
}

impl<T: ToShape> ToShape for [T] {
    fn to_shape(&self) -> Shape {
        Shape::Scalar(Value::Array(
            self.iter().map(|v| v.to_shape().into_value()).collect(),
        ))
    }
}

impl<T: ToShape> ToShape for Vec<T> {
    fn to_shape(&self) -> Shape {
        self.as_slice().to_shape()
    }
}

impl<K: AsRef<str>, V: ToShape, S> ToShape for HashMap<K, V, S> {
    fn to_shape(&self) -> Shape {
        Shape::Map(
            self.iter()
                .map(|(k, v)| (k.as_ref().to_string(), v.to_shape()))
                .collect(),
        )
    }
}

impl<K: AsRef<str>, V: ToShape> ToShape for BTreeMap<K, V> {
    fn to_shape(&self) -> Shape {
        Shape::Map(
            self.iter()
                .map(|(k, v)| (k.as_ref().to_string(), v.to_shape()))
                .collect(),
        )
    }
}
