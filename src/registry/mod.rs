//! Record Schema Registry
//!
//! Static descriptors for every table and report query the API serves.
//! Descriptors are declared in code and validated once at startup; nothing
//! in here changes after the registry is built.
//!
//! Two namespaces are kept apart:
//! ```text
//! tables   drivers, races, circuits, constructors, results, status, users
//! reports  top_drivers_by_wins, constructor_championships, ...
//! ```
//! Only table names may be spliced into `SELECT * FROM <table>`; report
//! schemas describe the shape of a custom selection.

mod catalog;
mod schema;

pub use catalog::SchemaRegistry;
pub use schema::{Column, ColumnType, TableSchema};
