//! Dynamic query construction
//!
//! Renders `SELECT` statements from a base selection plus a declarative
//! [`QuerySpec`]. Only registry identifiers are written into the SQL text;
//! every filter value, limit and offset is bound as a `?` parameter.
//!
//! Clause order:
//! ```text
//! <base> [WHERE|AND c = ? ...] [GROUP BY ...] [ORDER BY ...] [LIMIT ? OFFSET ?]
//! ```

use super::error::QueryError;
use super::sanitize::validate_identifier;
use crate::registry::{Column, ColumnType, TableSchema};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Parameter value bound to a `?` placeholder
pub type SqlValue = rusqlite::types::Value;

/// Equality filters keyed by column. Sorted so rendering is deterministic.
pub type FilterSpec = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// Case-insensitive `asc`/`desc`
    pub fn parse(raw: &str) -> Result<Self, QueryError> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok(SortDirection::Asc),
            "DESC" => Ok(SortDirection::Desc),
            _ => Err(QueryError::InvalidDirection(raw.to_string())),
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTerm {
    pub column: String,
    pub direction: SortDirection,
}

impl OrderTerm {
    pub fn new(column: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }

    pub fn asc(column: impl Into<String>) -> Self {
        Self::new(column, SortDirection::Asc)
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self::new(column, SortDirection::Desc)
    }
}

/// `limit: None` means no limit; the offset is then ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    pub limit: Option<u64>,
    pub offset: u64,
}

impl Pagination {
    pub fn new(limit: u64, offset: u64) -> Self {
        Self {
            limit: Some(limit),
            offset,
        }
    }

    pub fn unlimited() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySpec {
    pub filter: FilterSpec,
    pub order: Vec<OrderTerm>,
    pub page: Pagination,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

#[derive(Debug, Clone)]
enum BaseSelection {
    /// `SELECT * FROM <schema name>`
    Table,
    /// Pre-written selection, optionally with its own bound parameters and `WHERE`
    Custom {
        sql: String,
        params: Vec<SqlValue>,
        has_where: bool,
    },
}

/// Builds parameterized `SELECT` statements against one schema
#[derive(Debug, Clone)]
pub struct QueryBuilder<'a> {
    schema: &'a TableSchema,
    base: BaseSelection,
    computed: Vec<&'a str>,
    group_by: Vec<&'a str>,
    default_order: Vec<OrderTerm>,
    filters_allowed: bool,
}

impl<'a> QueryBuilder<'a> {
    /// Select every column of a registered table
    pub fn table(schema: &'a TableSchema) -> Self {
        Self::with_base(schema, BaseSelection::Table)
    }

    /// Use `sql` verbatim as the base; clauses are appended after it
    pub fn custom(schema: &'a TableSchema, sql: impl Into<String>) -> Self {
        Self::with_base(
            schema,
            BaseSelection::Custom {
                sql: sql.into(),
                params: Vec::new(),
                has_where: false,
            },
        )
    }

    /// Base that already ends in a `WHERE` with its own `?` placeholders
    pub fn custom_where(
        schema: &'a TableSchema,
        sql: impl Into<String>,
        params: Vec<SqlValue>,
    ) -> Self {
        Self::with_base(
            schema,
            BaseSelection::Custom {
                sql: sql.into(),
                params,
                has_where: true,
            },
        )
    }

    fn with_base(schema: &'a TableSchema, base: BaseSelection) -> Self {
        Self {
            schema,
            base,
            computed: Vec::new(),
            group_by: Vec::new(),
            default_order: Vec::new(),
            filters_allowed: true,
        }
    }

    /// Aliases produced by the base (aggregates) that may be sorted on but not filtered on
    pub fn computed_columns(mut self, aliases: &[&'a str]) -> Self {
        self.computed.extend_from_slice(aliases);
        self
    }

    pub fn group_by(mut self, columns: &[&'a str]) -> Self {
        self.group_by.extend_from_slice(columns);
        self
    }

    /// Order used when the request carries none
    pub fn default_order(mut self, terms: Vec<OrderTerm>) -> Self {
        self.default_order = terms;
        self
    }

    /// Reject every filter (for bases whose column names would be ambiguous)
    pub fn without_filters(mut self) -> Self {
        self.filters_allowed = false;
        self
    }

    pub fn schema(&self) -> &'a TableSchema {
        self.schema
    }

    /// Render the full statement for `spec`
    pub fn build(&self, spec: &QuerySpec) -> Result<BuiltQuery, QueryError> {
        let (mut sql, mut params) = self.render_selection(&spec.filter)?;

        let order = if spec.order.is_empty() {
            &self.default_order
        } else {
            &spec.order
        };

        if !order.is_empty() {
            let mut terms = Vec::with_capacity(order.len());
            for term in order {
                if !self.is_orderable(&term.column) {
                    return Err(QueryError::UnknownOrderColumn {
                        column: term.column.clone(),
                    });
                }
                terms.push(format!("{} {}", term.column, term.direction.as_sql()));
            }
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }

        if let Some(limit) = spec.page.limit {
            sql.push_str(" LIMIT ? OFFSET ?");
            params.push(SqlValue::Integer(clamp_i64(limit)));
            params.push(SqlValue::Integer(clamp_i64(spec.page.offset)));
        }

        Ok(BuiltQuery { sql, params })
    }

    /// `COUNT(*)` over the same filtered (and grouped) selection, ignoring order and pagination
    pub fn build_count(&self, spec: &QuerySpec) -> Result<BuiltQuery, QueryError> {
        let (inner, params) = self.render_selection(&spec.filter)?;
        Ok(BuiltQuery {
            sql: format!("SELECT COUNT(*) FROM ({})", inner),
            params,
        })
    }

    fn render_selection(&self, filter: &FilterSpec) -> Result<(String, Vec<SqlValue>), QueryError> {
        let (mut sql, mut params, mut has_where) = match &self.base {
            BaseSelection::Table => {
                validate_identifier(self.schema.name)?;
                (format!("SELECT * FROM {}", self.schema.name), Vec::new(), false)
            }
            BaseSelection::Custom {
                sql,
                params,
                has_where,
            } => (sql.trim_end().to_string(), params.clone(), *has_where),
        };

        for (name, value) in filter {
            let column = self.filter_column(name)?;
            params.push(coerce_filter_value(column, value)?);
            sql.push_str(if has_where { " AND " } else { " WHERE " });
            sql.push_str(column.name);
            sql.push_str(" = ?");
            has_where = true;
        }

        if !self.group_by.is_empty() {
            for column in &self.group_by {
                validate_identifier(column)?;
            }
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }

        Ok((sql, params))
    }

    fn filter_column(&self, name: &str) -> Result<&'a Column, QueryError> {
        let unknown = || QueryError::UnknownFilterColumn {
            column: name.to_string(),
        };
        if !self.filters_allowed || self.computed.contains(&name) {
            return Err(unknown());
        }
        self.schema.column(name).ok_or_else(unknown)
    }

    fn is_orderable(&self, name: &str) -> bool {
        self.schema.has_column(name) || self.computed.contains(&name)
    }
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Convert an untyped filter value into a bound parameter of the column's type
fn coerce_filter_value(column: &Column, value: &Value) -> Result<SqlValue, QueryError> {
    let invalid = |reason: String| QueryError::InvalidFilterValue {
        column: column.name.to_string(),
        reason,
    };

    match value {
        Value::Null => Err(invalid("null is not a comparable value".to_string())),
        Value::Array(_) | Value::Object(_) => {
            Err(invalid("only single values are supported".to_string()))
        }
        _ => match column.ty {
            ColumnType::Integer => match value {
                Value::Number(n) => n
                    .as_i64()
                    .map(SqlValue::Integer)
                    .ok_or_else(|| invalid(format!("{} is not an integer", n))),
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(SqlValue::Integer)
                    .map_err(|_| invalid(format!("'{}' is not an integer", s))),
                Value::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
                _ => Err(invalid("unsupported value".to_string())),
            },
            ColumnType::Real => match value {
                Value::Number(n) => n
                    .as_f64()
                    .map(SqlValue::Real)
                    .ok_or_else(|| invalid(format!("{} is not a number", n))),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(SqlValue::Real)
                    .ok_or_else(|| invalid(format!("'{}' is not a number", s))),
                _ => Err(invalid("expected a number".to_string())),
            },
            ColumnType::Text | ColumnType::Date => match value {
                Value::String(s) => Ok(SqlValue::Text(s.clone())),
                Value::Number(n) => Ok(SqlValue::Text(n.to_string())),
                Value::Bool(b) => Ok(SqlValue::Text(b.to_string())),
                _ => Err(invalid("unsupported value".to_string())),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SchemaRegistry;
    use serde_json::json;

    fn drivers() -> TableSchema {
        SchemaRegistry::builtin().unwrap().table("drivers").unwrap().clone()
    }

    fn spec_with_filter(pairs: &[(&str, Value)]) -> QuerySpec {
        QuerySpec {
            filter: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_bare_table() {
        let schema = drivers();
        let built = QueryBuilder::table(&schema).build(&QuerySpec::default()).unwrap();
        assert_eq!(built.sql, "SELECT * FROM drivers");
        assert!(built.params.is_empty());
    }

    #[test]
    fn test_filter_values_are_bound() {
        let schema = drivers();
        let spec = spec_with_filter(&[
            ("nationality", json!("British'; DROP TABLE drivers; --")),
            ("id", json!("44")),
        ]);
        let built = QueryBuilder::table(&schema).build(&spec).unwrap();

        assert_eq!(
            built.sql,
            "SELECT * FROM drivers WHERE id = ? AND nationality = ?"
        );
        assert!(!built.sql.contains("British"));
        assert_eq!(
            built.params,
            vec![
                SqlValue::Integer(44),
                SqlValue::Text("British'; DROP TABLE drivers; --".to_string())
            ]
        );
    }

    #[test]
    fn test_unknown_filter_rejected() {
        let schema = drivers();
        let spec = spec_with_filter(&[("password", json!("x"))]);
        assert_eq!(
            QueryBuilder::table(&schema).build(&spec),
            Err(QueryError::UnknownFilterColumn {
                column: "password".to_string()
            })
        );
    }

    #[test]
    fn test_injection_in_column_name_rejected() {
        let schema = drivers();
        let spec = spec_with_filter(&[("1=1 OR id", json!(1))]);
        assert!(QueryBuilder::table(&schema).build(&spec).is_err());

        let spec = QuerySpec {
            order: vec![OrderTerm::asc("id; DROP TABLE drivers")],
            ..Default::default()
        };
        assert!(matches!(
            QueryBuilder::table(&schema).build(&spec),
            Err(QueryError::UnknownOrderColumn { .. })
        ));
    }

    #[test]
    fn test_filter_value_coercion() {
        let schema = drivers();
        let spec = spec_with_filter(&[("id", json!("abc"))]);
        assert!(matches!(
            QueryBuilder::table(&schema).build(&spec),
            Err(QueryError::InvalidFilterValue { .. })
        ));

        let spec = spec_with_filter(&[("id", json!([1, 2]))]);
        assert!(matches!(
            QueryBuilder::table(&schema).build(&spec),
            Err(QueryError::InvalidFilterValue { .. })
        ));

        let spec = spec_with_filter(&[("number", json!(44))]);
        let built = QueryBuilder::table(&schema).build(&spec).unwrap();
        assert_eq!(built.params, vec![SqlValue::Text("44".to_string())]);
    }

    #[test]
    fn test_order_and_default_order() {
        let schema = drivers();
        let builder = QueryBuilder::table(&schema).default_order(vec![OrderTerm::asc("id")]);

        let built = builder.build(&QuerySpec::default()).unwrap();
        assert_eq!(built.sql, "SELECT * FROM drivers ORDER BY id ASC");

        let spec = QuerySpec {
            order: vec![OrderTerm::desc("surname"), OrderTerm::asc("forename")],
            ..Default::default()
        };
        let built = builder.build(&spec).unwrap();
        assert_eq!(
            built.sql,
            "SELECT * FROM drivers ORDER BY surname DESC, forename ASC"
        );
    }

    #[test]
    fn test_direction_parsing() {
        assert_eq!(SortDirection::parse("asc"), Ok(SortDirection::Asc));
        assert_eq!(SortDirection::parse("DeSc"), Ok(SortDirection::Desc));
        assert_eq!(
            SortDirection::parse("sideways"),
            Err(QueryError::InvalidDirection("sideways".to_string()))
        );
    }

    #[test]
    fn test_pagination() {
        let schema = drivers();
        let spec = QuerySpec {
            page: Pagination::new(10, 20),
            ..Default::default()
        };
        let built = QueryBuilder::table(&schema).build(&spec).unwrap();
        assert_eq!(built.sql, "SELECT * FROM drivers LIMIT ? OFFSET ?");
        assert_eq!(
            built.params,
            vec![SqlValue::Integer(10), SqlValue::Integer(20)]
        );

        // No limit omits the clause, offset included
        let spec = QuerySpec {
            page: Pagination {
                limit: None,
                offset: 5,
            },
            ..Default::default()
        };
        let built = QueryBuilder::table(&schema).build(&spec).unwrap();
        assert!(!built.sql.contains("LIMIT"));
        assert!(built.params.is_empty());
    }

    #[test]
    fn test_custom_selection_with_group_and_computed_order() {
        let registry = SchemaRegistry::builtin().unwrap();
        let schema = registry.report("top_drivers_by_wins").unwrap();
        let builder = QueryBuilder::custom(schema, "WITH w AS (SELECT 1) SELECT *, count(*) AS number_of_wins FROM w\n")
            .computed_columns(&["number_of_wins"])
            .group_by(&["id", "full_name"])
            .default_order(vec![OrderTerm::desc("number_of_wins")]);

        let spec = QuerySpec {
            filter: [("nationality".to_string(), json!("German"))].into_iter().collect(),
            page: Pagination::new(5, 0),
            ..Default::default()
        };
        let built = builder.build(&spec).unwrap();
        assert_eq!(
            built.sql,
            "WITH w AS (SELECT 1) SELECT *, count(*) AS number_of_wins FROM w \
             WHERE nationality = ? GROUP BY id, full_name ORDER BY number_of_wins DESC LIMIT ? OFFSET ?"
        );
        assert_eq!(built.params.len(), 3);

        // Aggregates can be sorted on but never filtered on
        let spec = QuerySpec {
            filter: [("number_of_wins".to_string(), json!(3))].into_iter().collect(),
            ..Default::default()
        };
        assert!(matches!(
            builder.build(&spec),
            Err(QueryError::UnknownFilterColumn { .. })
        ));
    }

    #[test]
    fn test_custom_where_appends_and() {
        let registry = SchemaRegistry::builtin().unwrap();
        let schema = registry.table("circuits").unwrap();
        let builder = QueryBuilder::custom_where(
            schema,
            "SELECT * FROM circuits WHERE country = ?",
            vec![SqlValue::Text("Italy".to_string())],
        );
        let spec = QuerySpec {
            filter: [("name".to_string(), json!("Monza"))].into_iter().collect(),
            ..Default::default()
        };
        let built = builder.build(&spec).unwrap();
        assert_eq!(
            built.sql,
            "SELECT * FROM circuits WHERE country = ? AND name = ?"
        );
        assert_eq!(built.params.len(), 2);

        let locked = builder.without_filters();
        assert!(locked.build(&spec).is_err());
        assert!(locked.build(&QuerySpec::default()).is_ok());
    }

    #[test]
    fn test_count_query() {
        let schema = drivers();
        let spec = QuerySpec {
            filter: [("nationality".to_string(), json!("Finnish"))].into_iter().collect(),
            order: vec![OrderTerm::desc("id")],
            page: Pagination::new(10, 10),
        };
        let built = QueryBuilder::table(&schema).build_count(&spec).unwrap();
        assert_eq!(
            built.sql,
            "SELECT COUNT(*) FROM (SELECT * FROM drivers WHERE nationality = ?)"
        );
        assert_eq!(built.params, vec![SqlValue::Text("Finnish".to_string())]);
    }

    #[test]
    fn test_deterministic_output() {
        let schema = drivers();
        let builder = QueryBuilder::table(&schema).default_order(vec![OrderTerm::asc("id")]);
        let spec = spec_with_filter(&[
            ("surname", json!("Räikkönen")),
            ("code", json!("RAI")),
            ("nationality", json!("Finnish")),
        ]);
        let first = builder.build(&spec).unwrap();
        let second = builder.build(&spec.clone()).unwrap();
        assert_eq!(first, second);
    }
}
