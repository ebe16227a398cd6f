//! Query-string parsing for list endpoints
//!
//! Two client conventions are understood:
//! - react-admin simple-rest: `sort=["col","ASC"]`, `range=[0,24]` (inclusive), `filter={"col":v}`
//! - json-server: `_sort=col`, `_order=asc`, `_start=0`, `_end=25` (exclusive)
//!
//! `limit`/`offset` are accepted as well. Every other key is an equality filter.

use super::builder::{OrderTerm, Pagination, QuerySpec, SortDirection};
use super::error::QueryError;
use serde_json::Value;

fn invalid(name: &str, reason: impl Into<String>) -> QueryError {
    QueryError::InvalidParameter {
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn parse_u64(name: &str, raw: &str) -> Result<u64, QueryError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| invalid(name, format!("'{}' is not a non-negative integer", raw)))
}

fn parse_json(name: &str, raw: &str) -> Result<Value, QueryError> {
    serde_json::from_str(raw).map_err(|e| invalid(name, format!("malformed JSON: {}", e)))
}

/// Parse raw `(key, value)` pairs into a [`QuerySpec`]. Column names are not
/// checked here; the builder does that against the target schema.
pub fn parse_list_params(pairs: &[(String, String)]) -> Result<QuerySpec, QueryError> {
    let mut spec = QuerySpec::default();

    // (row count, first index)
    let mut range: Option<(u64, u64)> = None;
    let mut start: Option<u64> = None;
    let mut end: Option<u64> = None;
    let mut limit: Option<u64> = None;
    let mut offset: Option<u64> = None;
    let mut sort_columns: Vec<String> = Vec::new();
    let mut sort_directions: Vec<String> = Vec::new();

    for (key, raw) in pairs {
        match key.as_str() {
            "filter" => match parse_json(key, raw)? {
                Value::Object(map) => spec.filter.extend(map),
                Value::Null => {}
                _ => return Err(invalid(key, "expected a JSON object")),
            },
            "sort" => {
                let (column, direction) = match parse_json(key, raw)? {
                    Value::Array(items) => match items.as_slice() {
                        [Value::String(c)] => (c.clone(), "ASC".to_string()),
                        [Value::String(c), Value::String(d)] => (c.clone(), d.clone()),
                        _ => return Err(invalid(key, "expected [\"column\", \"ASC|DESC\"]")),
                    },
                    _ => return Err(invalid(key, "expected [\"column\", \"ASC|DESC\"]")),
                };
                spec.order
                    .push(OrderTerm::new(column, SortDirection::parse(&direction)?));
            }
            "range" => {
                let bounds = match parse_json(key, raw)? {
                    Value::Array(items) => match items.as_slice() {
                        [Value::Number(a), Value::Number(b)] => a.as_u64().zip(b.as_u64()),
                        _ => None,
                    },
                    _ => None,
                };
                let (first, last) =
                    bounds.ok_or_else(|| invalid(key, "expected [first, last] non-negative integers"))?;
                if last < first {
                    return Err(invalid(key, "last index precedes first index"));
                }
                let count = (last - first)
                    .checked_add(1)
                    .ok_or_else(|| invalid(key, "range spans too many rows"))?;
                range = Some((count, first));
            }
            "_sort" => sort_columns.extend(split_list(raw)),
            "_order" => sort_directions.extend(split_list(raw)),
            "_start" => start = Some(parse_u64(key, raw)?),
            "_end" => end = Some(parse_u64(key, raw)?),
            "limit" => limit = Some(parse_u64(key, raw)?),
            "offset" => offset = Some(parse_u64(key, raw)?),
            _ => {
                spec.filter
                    .insert(key.clone(), Value::String(raw.clone()));
            }
        }
    }

    for (i, column) in sort_columns.into_iter().enumerate() {
        let direction = match sort_directions.get(i) {
            Some(d) => SortDirection::parse(d)?,
            None => SortDirection::Asc,
        };
        spec.order.push(OrderTerm::new(column, direction));
    }

    spec.page = if let Some((count, first)) = range {
        Pagination::new(count, first)
    } else if start.is_some() || end.is_some() {
        let start = start.unwrap_or(0);
        match end {
            Some(end) if end < start => return Err(invalid("_end", "precedes _start")),
            Some(end) => Pagination::new(end - start, start),
            None => Pagination {
                limit: None,
                offset: start,
            },
        }
    } else {
        Pagination {
            limit,
            offset: offset.unwrap_or(0),
        }
    };

    Ok(spec)
}

fn split_list(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_params() {
        let spec = parse_list_params(&[]).unwrap();
        assert_eq!(spec, QuerySpec::default());
        assert_eq!(spec.page.limit, None);
    }

    #[test]
    fn test_simple_rest_params() {
        let spec = parse_list_params(&pairs(&[
            ("filter", r#"{"nationality":"British","id":3}"#),
            ("sort", r#"["surname","desc"]"#),
            ("range", "[10,19]"),
        ]))
        .unwrap();

        assert_eq!(spec.filter.get("nationality"), Some(&json!("British")));
        assert_eq!(spec.filter.get("id"), Some(&json!(3)));
        assert_eq!(spec.order, vec![OrderTerm::desc("surname")]);
        assert_eq!(spec.page, Pagination::new(10, 10));
    }

    #[test]
    fn test_json_server_params() {
        let spec = parse_list_params(&pairs(&[
            ("_sort", "year,round"),
            ("_order", "DESC,asc"),
            ("_start", "25"),
            ("_end", "50"),
        ]))
        .unwrap();

        assert_eq!(
            spec.order,
            vec![OrderTerm::desc("year"), OrderTerm::asc("round")]
        );
        assert_eq!(spec.page, Pagination::new(25, 25));
    }

    #[test]
    fn test_limit_offset_and_plain_filters() {
        let spec = parse_list_params(&pairs(&[
            ("limit", "5"),
            ("offset", "15"),
            ("year", "2009"),
        ]))
        .unwrap();
        assert_eq!(spec.page, Pagination::new(5, 15));
        assert_eq!(spec.filter.get("year"), Some(&json!("2009")));
    }

    #[test]
    fn test_invalid_params() {
        assert!(matches!(
            parse_list_params(&pairs(&[("filter", "{not json")])),
            Err(QueryError::InvalidParameter { .. })
        ));
        assert!(matches!(
            parse_list_params(&pairs(&[("filter", "[1,2]")])),
            Err(QueryError::InvalidParameter { .. })
        ));
        assert!(matches!(
            parse_list_params(&pairs(&[("range", "[5,2]")])),
            Err(QueryError::InvalidParameter { .. })
        ));
        assert!(matches!(
            parse_list_params(&pairs(&[("range", "[0,18446744073709551615]")])),
            Err(QueryError::InvalidParameter { .. })
        ));
        let widest = parse_list_params(&pairs(&[("range", "[1,18446744073709551615]")])).unwrap();
        assert_eq!(widest.page.limit, Some(u64::MAX));
        assert_eq!(widest.page.offset, 1);
        assert!(matches!(
            parse_list_params(&pairs(&[("limit", "-1")])),
            Err(QueryError::InvalidParameter { .. })
        ));
        assert!(matches!(
            parse_list_params(&pairs(&[("sort", r#"["id","up"]"#)])),
            Err(QueryError::InvalidDirection(_))
        ));
        assert!(matches!(
            parse_list_params(&pairs(&[("_start", "10"), ("_end", "5")])),
            Err(QueryError::InvalidParameter { .. })
        ));
    }
}
