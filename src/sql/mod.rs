//! SQL construction and row mapping
//!
//! Everything that splices text into SQL lives here, so identifier
//! allow-listing and value binding are enforced in one place.

mod builder;
mod error;
mod mapper;
mod params;
mod sanitize;

pub use builder::{
    BuiltQuery, FilterSpec, OrderTerm, Pagination, QueryBuilder, QuerySpec, SortDirection,
    SqlValue,
};
pub use error::QueryError;
pub use mapper::{map_row, map_values, MappingError, Record};
pub use params::parse_list_params;
pub use sanitize::{is_valid_identifier, validate_identifier};
