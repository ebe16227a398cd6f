use thiserror::Error;

/// Client-side query construction failures. Raised before any SQL runs.
#[derive(Debug, Error, PartialEq)]
pub enum QueryError {
    #[error("Unknown table or query: {0}")]
    UnknownTable(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Cannot filter on unknown column '{column}'")]
    UnknownFilterColumn { column: String },

    #[error("Cannot sort on unknown column '{column}'")]
    UnknownOrderColumn { column: String },

    #[error("Invalid sort direction '{0}', expected ASC or DESC")]
    InvalidDirection(String),

    #[error("Invalid filter value for '{column}': {reason}")]
    InvalidFilterValue { column: String, reason: String },

    #[error("Invalid query parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },
}
