use std::collections::HashMap;

use serde_json::Value;

use crate::{
    compile::Operator,
    guard::Ident,
    plan::{Filter, Statement},
};

/// Column name to SQL type name. Where a column has an entry, its
/// placeholders are cast to that type so string binds can meet timestamp,
/// date or uuid columns.
pub type ColumnTypes = HashMap<String, String>;

/// SQL text plus the values bound to its placeholders, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub sql: String,
    pub binds: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Backtick identifiers, `?` placeholders.
    Sqlite,
    /// Double-quoted identifiers, `$n` placeholders.
    Postgres,
}

impl Dialect {
    fn quote_char(&self) -> char {
        match self {
            Dialect::Sqlite => '`',
            Dialect::Postgres => '"',
        }
    }

    /// Quotes a trusted name such as a table, doubling embedded quote characters.
    pub fn quote(&self, name: &str) -> String {
        let q = self.quote_char();
        let mut out = String::with_capacity(name.len() + 2);
        out.push(q);
        for c in name.chars() {
            if c == q {
                out.push(q);
            }
            out.push(c);
        }
        out.push(q);
        out
    }

    pub fn column(&self, ident: &Ident) -> String {
        self.quote(ident.as_str())
    }

    fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::Sqlite => "?".to_string(),
            Dialect::Postgres => format!("${}", n),
        }
    }

    fn sum_projection(&self, ident: &Ident) -> String {
        let col = self.column(ident);
        format!("SUM({col}) AS {col}")
    }

    pub fn count(&self, stmt: &Statement, types: &ColumnTypes) -> Rendered {
        let mut binds = Vec::new();
        let where_clause = self.where_clause(&stmt.filters, types, &mut binds);
        Rendered {
            sql: format!(
                "SELECT COUNT(*) FROM {}{}",
                self.quote(&stmt.table),
                where_clause
            ),
            binds,
        }
    }

    pub fn select(&self, stmt: &Statement, types: &ColumnTypes) -> Rendered {
        let mut binds = Vec::new();
        let mut sql = format!(
            "SELECT * FROM {}{}",
            self.quote(&stmt.table),
            self.where_clause(&stmt.filters, types, &mut binds)
        );
        if let Some(order) = &stmt.order {
            sql.push_str(&format!(" ORDER BY {}", self.column(&order.column)));
            if order.descending {
                sql.push_str(" DESC");
            }
        }
        if let Some(limit) = stmt.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = stmt.offset {
            // SQLite only accepts OFFSET after a LIMIT.
            if stmt.limit.is_none() && *self == Dialect::Sqlite {
                sql.push_str(" LIMIT -1");
            }
            sql.push_str(&format!(" OFFSET {}", offset));
        }
        Rendered { sql, binds }
    }

    pub fn sums(&self, stmt: &Statement, fields: &[Ident], types: &ColumnTypes) -> Rendered {
        let mut binds = Vec::new();
        let projections = fields
            .iter()
            .map(|f| self.sum_projection(f))
            .collect::<Vec<_>>()
            .join(", ");
        Rendered {
            sql: format!(
                "SELECT {} FROM {}{}",
                projections,
                self.quote(&stmt.table),
                self.where_clause(&stmt.filters, types, &mut binds)
            ),
            binds,
        }
    }

    fn where_clause(
        &self,
        filters: &[Filter],
        types: &ColumnTypes,
        binds: &mut Vec<Value>,
    ) -> String {
        if filters.is_empty() {
            return String::new();
        }
        let conditions = filters
            .iter()
            .map(|f| self.condition(f, types, binds))
            .collect::<Vec<_>>();
        format!(" WHERE {}", conditions.join(" AND "))
    }

    fn condition(&self, filter: &Filter, types: &ColumnTypes, binds: &mut Vec<Value>) -> String {
        let col = self.column(&filter.column);
        let op = filter.operator.as_sql();
        // LIKE patterns are text whatever the column holds.
        let cast = match filter.operator {
            Operator::Like | Operator::NotLike => None,
            _ => types.get(filter.column.as_str()),
        };
        let placeholder = |n: usize| match cast {
            Some(ty) => format!("CAST({} AS {})", self.placeholder(n), ty),
            None => self.placeholder(n),
        };
        if !filter.operator.is_list() {
            binds.push(filter.value.clone());
            return format!("{} {} {}", col, op, placeholder(binds.len()));
        }

        let items = match &filter.value {
            Value::Array(items) => items.clone(),
            other => vec![other.clone()],
        };
        if items.is_empty() {
            return format!("{} {} (NULL)", col, op);
        }
        let placeholders = items
            .into_iter()
            .map(|item| {
                binds.push(item);
                placeholder(binds.len())
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("{} {} ({})", col, op, placeholders)
    }
}
