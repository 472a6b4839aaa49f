use crate::{adapters::Row, naming::to_upper_camel};

/// Renames the keys of every row from snake_case columns to output field names.
pub fn project(rows: Vec<Row>) -> Vec<Row> {
    rows.into_iter()
        .map(|row| {
            row.into_iter()
                .map(|(k, v)| (to_upper_camel(&k), v))
                .collect()
        })
        .collect()
}
