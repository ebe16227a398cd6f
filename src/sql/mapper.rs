use super::builder::SqlValue;
use crate::registry::{ColumnType, TableSchema};
use chrono::NaiveDate;
use serde_json::{Map, Number, Value};
use thiserror::Error;

/// One output row, keyed by schema column name in declaration order
pub type Record = Map<String, Value>;

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("Row for '{schema}' has {actual} columns, schema declares {expected}")]
    ColumnCount {
        schema: String,
        expected: usize,
        actual: usize,
    },

    #[error("Failed to read column {index}: {source}")]
    Read {
        index: usize,
        #[source]
        source: rusqlite::Error,
    },
}

/// Map a live SQLite row onto `schema`
pub fn map_row(row: &rusqlite::Row<'_>, schema: &TableSchema) -> Result<Record, MappingError> {
    let statement = row.as_ref();
    let count = statement.column_count();

    let mut names = Vec::with_capacity(count);
    let mut values = Vec::with_capacity(count);
    for index in 0..count {
        let name = statement
            .column_name(index)
            .map_err(|source| MappingError::Read { index, source })?;
        names.push(name.to_string());

        let value = row
            .get_ref(index)
            .map_err(|source| MappingError::Read { index, source })?;
        values.push(SqlValue::from(value));
    }

    map_values(&names, values, schema)
}

/// Pair raw values with the schema's columns.
///
/// Values are matched by name when the row carries every schema column name,
/// positionally otherwise.
pub fn map_values(
    names: &[String],
    values: Vec<SqlValue>,
    schema: &TableSchema,
) -> Result<Record, MappingError> {
    if values.len() != schema.len() {
        return Err(MappingError::ColumnCount {
            schema: schema.name.to_string(),
            expected: schema.len(),
            actual: values.len(),
        });
    }

    let by_name = names.len() == values.len()
        && schema
            .columns
            .iter()
            .all(|c| names.iter().any(|n| n == c.name));

    let mut slots: Vec<Option<SqlValue>> = values.into_iter().map(Some).collect();
    let mut record = Record::new();

    for (position, column) in schema.columns.iter().enumerate() {
        let index = if by_name {
            names.iter().position(|n| n == column.name).unwrap_or(position)
        } else {
            position
        };
        let raw = slots[index].take().unwrap_or(SqlValue::Null);
        record.insert(column.name.to_string(), to_json(raw, column.ty));
    }

    Ok(record)
}

/// Convert one SQLite value to JSON, coercing text only where the declared type asks for it
fn to_json(value: SqlValue, ty: ColumnType) -> Value {
    match (value, ty) {
        (SqlValue::Null, _) => Value::Null,

        (SqlValue::Text(s), ColumnType::Integer) => match s.trim().parse::<i64>() {
            Ok(n) => Value::Number(n.into()),
            Err(_) => Value::String(s),
        },
        (SqlValue::Text(s), ColumnType::Real) => match s.trim().parse::<f64>().ok().and_then(Number::from_f64) {
            Some(n) => Value::Number(n),
            None => Value::String(s),
        },
        (SqlValue::Real(f), ColumnType::Real) => real(f),
        (SqlValue::Integer(i), ColumnType::Real) => real(i as f64),
        (SqlValue::Text(s), ColumnType::Date) => Value::String(normalize_date(s)),

        (SqlValue::Integer(i), _) => Value::Number(i.into()),
        (SqlValue::Real(f), _) => real(f),
        (SqlValue::Text(s), _) => Value::String(s),
        (SqlValue::Blob(bytes), _) => Value::String(hex::encode(bytes)),
    }
}

fn real(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

/// Canonical `YYYY-MM-DD` for dates SQLite stored with a time part or in another common layout
fn normalize_date(raw: String) -> String {
    let trimmed = raw.trim();
    let date_part = trimmed.get(..10).unwrap_or(trimmed);

    ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or(raw)
}
