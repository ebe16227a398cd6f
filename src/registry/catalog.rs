use super::schema::TableSchema;
use crate::sql::{validate_identifier, QueryError};
use std::collections::HashMap;
use tracing::debug;

use super::schema::ColumnType::{Date, Integer, Real, Text};

/// Immutable lookup of table and report descriptors
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    tables: HashMap<&'static str, TableSchema>,
    reports: HashMap<&'static str, TableSchema>,
}

impl SchemaRegistry {
    /// Build an empty registry. Use [`SchemaRegistry::builtin`] for the API's own tables.
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
            reports: HashMap::new(),
        }
    }

    pub fn register_table(&mut self, schema: TableSchema) -> Result<(), QueryError> {
        validate_schema(&schema)?;
        debug!("Registered table schema: {} ({} columns)", schema.name, schema.len());
        self.tables.insert(schema.name, schema);
        Ok(())
    }

    pub fn register_report(&mut self, schema: TableSchema) -> Result<(), QueryError> {
        validate_schema(&schema)?;
        debug!("Registered report schema: {} ({} columns)", schema.name, schema.len());
        self.reports.insert(schema.name, schema);
        Ok(())
    }

    pub fn table(&self, name: &str) -> Result<&TableSchema, QueryError> {
        self.tables
            .get(name)
            .ok_or_else(|| QueryError::UnknownTable(name.to_string()))
    }

    pub fn report(&self, name: &str) -> Result<&TableSchema, QueryError> {
        self.reports
            .get(name)
            .ok_or_else(|| QueryError::UnknownTable(name.to_string()))
    }

    pub fn table_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.tables.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// The F1 tables plus the public projection of `users` and the dashboard reports
    pub fn builtin() -> Result<Self, QueryError> {
        let mut registry = Self::new();

        registry.register_table(TableSchema::new(
            "drivers",
            &[
                ("id", Integer),
                ("driver_ref", Text),
                ("number", Text),
                ("code", Text),
                ("forename", Text),
                ("surname", Text),
                ("dob", Date),
                ("nationality", Text),
                ("url", Text),
            ],
        ))?;

        registry.register_table(TableSchema::new(
            "races",
            &[
                ("id", Integer),
                ("year", Integer),
                ("round", Integer),
                ("circuit_id", Integer),
                ("name", Text),
                ("date", Date),
                ("time", Text),
                ("url", Text),
            ],
        ))?;

        registry.register_table(TableSchema::new(
            "circuits",
            &[
                ("id", Integer),
                ("circuit_ref", Text),
                ("name", Text),
                ("location", Text),
                ("country", Text),
                ("lat", Real),
                ("lng", Real),
                ("alt", Integer),
                ("url", Text),
            ],
        ))?;

        registry.register_table(TableSchema::new(
            "constructors",
            &[
                ("id", Integer),
                ("constructor_ref", Text),
                ("name", Text),
                ("nationality", Text),
                ("url", Text),
            ],
        ))?;

        registry.register_table(TableSchema::new(
            "results",
            &[
                ("id", Integer),
                ("race_id", Integer),
                ("driver_id", Integer),
                ("constructor_id", Integer),
                ("number", Integer),
                ("grid", Integer),
                ("position", Integer),
                ("position_text", Text),
                ("position_order", Integer),
                ("points", Real),
                ("laps", Integer),
                ("time", Text),
                ("milliseconds", Integer),
                ("fastest_lap", Integer),
                ("rank", Integer),
                ("fastest_lap_time", Text),
                ("fastest_lap_speed", Text),
                ("status_id", Integer),
            ],
        ))?;

        registry.register_table(TableSchema::new(
            "status",
            &[("id", Integer), ("status", Text)],
        ))?;

        // Password hashes never leave the store, so the registered shape is the public one.
        registry.register_table(TableSchema::new(
            "users",
            &[
                ("id", Integer),
                ("username", Text),
                ("email", Text),
                ("full_name", Text),
                ("role", Text),
                ("created_at", Text),
            ],
        ))?;

        registry.register_report(TableSchema::new(
            "top_drivers_by_wins",
            &[
                ("id", Integer),
                ("full_name", Text),
                ("nationality", Text),
                ("dob", Date),
                ("age", Integer),
                ("url", Text),
                ("number_of_wins", Integer),
            ],
        ))?;

        registry.register_report(TableSchema::new(
            "constructor_championships",
            &[("year", Integer), ("constructor", Text), ("total_points", Real)],
        ))?;

        registry.register_report(TableSchema::new(
            "circuits_race_count",
            &[
                ("circuit_name", Text),
                ("location", Text),
                ("country", Text),
                ("race_count", Integer),
            ],
        ))?;

        registry.register_report(TableSchema::new(
            "driver_nationality_stats",
            &[
                ("nationality", Text),
                ("driver_count", Integer),
                ("winners_count", Integer),
            ],
        ))?;

        registry.register_report(TableSchema::new(
            "season_results_overview",
            &[
                ("year", Integer),
                ("total_races", Integer),
                ("unique_drivers", Integer),
                ("unique_constructors", Integer),
                ("avg_points_per_result", Real),
                ("total_wins", Integer),
            ],
        ))?;

        Ok(registry)
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_schema(schema: &TableSchema) -> Result<(), QueryError> {
    validate_identifier(schema.name)?;

    if schema.is_empty() {
        return Err(QueryError::InvalidIdentifier(format!(
            "schema '{}' declares no columns",
            schema.name
        )));
    }

    for (i, column) in schema.columns.iter().enumerate() {
        validate_identifier(column.name)?;
        if schema.columns[..i].iter().any(|c| c.name == column.name) {
            return Err(QueryError::InvalidIdentifier(format!(
                "column '{}' declared twice in '{}'",
                column.name, schema.name
            )));
        }
    }

    Ok(())
}
