use super::AppState;
use crate::error::{ApiError, Result};
use crate::registry::TableSchema;
use crate::sql::{BuiltQuery, QueryBuilder, QuerySpec, Record, SqlValue};
use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

const RACE_SQL: &str = "SELECT * FROM races WHERE id = ?";

const CIRCUIT_SQL: &str = "SELECT circuits.* FROM races \
     JOIN circuits ON races.circuit_id = circuits.id \
     WHERE races.id = ?";

const DRIVERS_SQL: &str = "SELECT DISTINCT drivers.* FROM results \
     JOIN drivers ON results.driver_id = drivers.id \
     WHERE results.race_id = ?";

const CONSTRUCTORS_SQL: &str = "SELECT DISTINCT constructors.* FROM results \
     JOIN constructors ON results.constructor_id = constructors.id \
     WHERE results.race_id = ?";

/// A join keyed on one race id. Column names are ambiguous across the join,
/// so these bases accept no extra filters.
fn related(schema: &TableSchema, sql: &str, race_id: i64) -> Result<BuiltQuery> {
    let query = QueryBuilder::custom_where(schema, sql, vec![SqlValue::Integer(race_id)])
        .without_filters()
        .build(&QuerySpec::default())?;
    Ok(query)
}

pub async fn race_circuit(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Record>> {
    let schema = state.registry.table("circuits")?;
    let query = related(schema, CIRCUIT_SQL, id)?;

    state
        .store
        .fetch_optional(query, schema)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Circuit not found"))
}

pub async fn race_drivers(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Vec<Record>>> {
    let schema = state.registry.table("drivers")?;
    let query = related(schema, DRIVERS_SQL, id)?;
    Ok(Json(state.store.fetch_all(query, schema).await?))
}

pub async fn race_constructors(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Record>>> {
    let schema = state.registry.table("constructors")?;
    let query = related(schema, CONSTRUCTORS_SQL, id)?;
    Ok(Json(state.store.fetch_all(query, schema).await?))
}

/// The race with its circuit, drivers and constructors, read on one connection
pub async fn race_details(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Record>> {
    let races = state.registry.table("races")?;
    let circuits = state.registry.table("circuits")?;
    let drivers = state.registry.table("drivers")?;
    let constructors = state.registry.table("constructors")?;

    let batch = vec![
        (related(races, RACE_SQL, id)?, races.clone()),
        (related(circuits, CIRCUIT_SQL, id)?, circuits.clone()),
        (related(drivers, DRIVERS_SQL, id)?, drivers.clone()),
        (related(constructors, CONSTRUCTORS_SQL, id)?, constructors.clone()),
    ];

    let mut results = state.store.fetch_batch(batch).await?.into_iter();
    let mut next = || results.next().unwrap_or_default();

    let mut race = next()
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::not_found("Race not found"))?;
    let circuit = next().into_iter().next().map(Value::Object).unwrap_or(Value::Null);
    let entrants = next().into_iter().map(Value::Object).collect();
    let teams = next().into_iter().map(Value::Object).collect();

    race.insert("circuit".to_string(), circuit);
    race.insert("drivers".to_string(), Value::Array(entrants));
    race.insert("constructors".to_string(), Value::Array(teams));

    Ok(Json(race))
}
