use serde::{Deserialize, Serialize};

use crate::walk::{Shape, ToShape};

/// Paging and ordering fields shared by most condition structs.
///
/// Decodes from a request payload as `{"page", "pagesize", "orderKey"}`.
/// Embed it in a condition struct to have its fields flattened into the query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseCondition {
    pub page: Option<i64>,
    pub pagesize: Option<i64>,
    /// Column to order by, optionally prefixed with `desc_` or `asc_`.
    pub order_key: Option<String>,
}

impl ToShape for BaseCondition {
    fn to_shape(&self) -> Shape {
        Shape::Struct(vec![
            ("page", self.page.to_shape()),
            ("pagesize", self.pagesize.to_shape()),
            ("order_key", self.order_key.to_shape()),
        ])
    }
}

/// A destination for the sum phase of a structured query.
///
/// `FIELDS` lists the columns to sum; the resulting row, keyed by those
/// column names, is deserialized into `Self`. Usually derived with
/// `#[derive(SumFields)]`.
pub trait SumFields: for<'de> Deserialize<'de> {
    const FIELDS: &'static [&'static str];
}

/// The sum destination for queries that do not sum anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct NoSum {}

impl SumFields for NoSum {
    const FIELDS: &'static [&'static str] = &[];
}
