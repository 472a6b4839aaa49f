use serde_json::Value;

use crate::{
    compile::{Directive, Operator, Predicate},
    error::Error,
    guard::Ident,
};

/// Paging and ordering accumulated while a condition is compiled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryState {
    pub page: Option<i64>,
    pub pagesize: Option<i64>,
    /// Raw until [`QueryState::statement`] runs it through the field guard.
    pub order_key: Option<String>,
    pub descending: bool,
}

impl QueryState {
    pub fn apply(&mut self, directive: Directive) {
        match directive {
            Directive::Page(page) => self.page = Some(page),
            Directive::PageSize(size) => self.pagesize = Some(size),
            Directive::Order { key, descending } => {
                self.order_key = Some(key);
                self.descending = descending;
            }
        }
    }

    /// Requested page size capped at `max`; `max` when nothing was requested.
    pub fn effective_pagesize(&self, max: i64) -> i64 {
        match self.pagesize {
            Some(size) if size <= max => size,
            _ => max,
        }
    }

    /// `None` when the effective page size is not positive.
    pub fn limit(&self, max: i64) -> Option<u64> {
        let size = self.effective_pagesize(max);
        (size > 0).then_some(size as u64)
    }

    pub fn offset(&self, max: i64) -> Option<u64> {
        let page = self.page?;
        let offset = self.effective_pagesize(max).saturating_mul(page.saturating_sub(1));
        (offset > 0).then_some(offset as u64)
    }

    pub fn is_first_page(&self) -> bool {
        self.page == Some(1)
    }

    /// Builds the statement every phase of a query runs from.
    ///
    /// Every identifier that will be interpolated into SQL text goes through
    /// [`Ident::new`] here, before anything is sent to the database.
    pub fn statement(
        &self,
        table: &str,
        predicates: &[Predicate],
        max_pagesize: i64,
    ) -> Result<Statement, Error> {
        let filters = predicates
            .iter()
            .map(|p| {
                Ok(Filter {
                    column: Ident::new(p.column.as_str())?,
                    operator: p.operator,
                    value: p.value.clone(),
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let order = match self.order_key.as_deref() {
            Some(key) if !key.is_empty() => Some(Order {
                column: Ident::new(key)?,
                descending: self.descending,
            }),
            _ => None,
        };

        Ok(Statement {
            table: table.to_string(),
            filters,
            order,
            limit: self.limit(max_pagesize),
            offset: self.offset(max_pagesize),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: Ident,
    pub operator: Operator,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: Ident,
    pub descending: bool,
}

/// What the adapter executes. Filters are ANDed; count and sum queries use
/// only the filters, the row query uses everything.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub table: String,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    fn state(page: Option<i64>, pagesize: Option<i64>) -> QueryState {
        QueryState {
            page,
            pagesize,
            ..Default::default()
        }
    }

    #[test]
    fn test_page_and_size() {
        let s = state(Some(2), Some(10));
        assert_eq!(s.limit(100), Some(10));
        assert_eq!(s.offset(100), Some(10));
        assert!(!s.is_first_page());

        let s = state(Some(1), Some(10));
        assert_eq!(s.offset(100), None);
        assert!(s.is_first_page());
    }

    #[test]
    fn test_pagesize_cap() {
        assert_eq!(state(None, Some(10_000)).limit(100), Some(100));
        assert_eq!(state(None, None).limit(100), Some(100));
        assert_eq!(state(Some(3), None).offset(100), Some(200));
    }

    #[test]
    fn test_non_positive_pagesize_disables_limit() {
        assert_eq!(state(Some(2), Some(0)).limit(100), None);
        assert_eq!(state(Some(2), Some(-5)).limit(100), None);
        assert_eq!(state(Some(2), Some(-5)).offset(100), None);
        assert_eq!(state(None, None).limit(0), None);
        assert_eq!(state(Some(0), Some(10)).offset(100), None);
    }

    #[test]
    fn test_statement_guards_identifiers() {
        let predicates = vec![Predicate {
            column: "age".to_string(),
            operator: Operator::GreaterThan,
            value: json!(18),
        }];
        let mut s = state(Some(2), Some(10));
        s.apply(Directive::Order {
            key: "created_at".to_string(),
            descending: true,
        });
        let stmt = s.statement("users", &predicates, 100).unwrap();
        assert_eq!(stmt.filters[0].column.as_str(), "age");
        assert_eq!(stmt.order.as_ref().unwrap().column.as_str(), "created_at");
        assert!(stmt.order.as_ref().unwrap().descending);
        assert_eq!((stmt.limit, stmt.offset), (Some(10), Some(10)));

        s.order_key = Some("id desc; --".to_string());
        assert!(matches!(
            s.statement("users", &predicates, 100),
            Err(Error::InjectionRejected(_))
        ));

        let bad = vec![Predicate {
            column: "a=1 or 1".to_string(),
            operator: Operator::Equal,
            value: json!(1),
        }];
        assert!(matches!(
            QueryState::default().statement("users", &bad, 100),
            Err(Error::InjectionRejected(_))
        ));
    }

    #[test]
    fn test_empty_order_key_means_no_order() {
        let mut s = QueryState::default();
        s.apply(Directive::Order {
            key: String::new(),
            descending: true,
        });
        assert_eq!(s.statement("users", &[], 100).unwrap().order, None);
    }
}
