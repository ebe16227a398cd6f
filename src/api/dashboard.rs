//! Aggregate reports behind the dashboard charts

use super::AppState;
use crate::error::Result;
use crate::sql::{parse_list_params, OrderTerm, QueryBuilder, QuerySpec, Record};
use axum::{
    extract::{Query, State},
    Json,
};
use tracing::info;

/// Wins counted only from finished races where the driver was classified first
const TOP_DRIVERS_SQL: &str = "WITH driver_wins AS (
    SELECT d.id,
        d.forename || ' ' || d.surname AS full_name,
        d.nationality,
        d.dob,
        date() - date(d.dob) AS age,
        d.url
    FROM drivers d
        JOIN results r ON d.id = r.driver_id
        JOIN status s ON r.status_id = s.id
    WHERE s.status = 'Finished'
        AND r.position_order = 1
)
SELECT *, COUNT(*) AS number_of_wins
FROM driver_wins";

const CONSTRUCTOR_CHAMPIONSHIPS_SQL: &str = "SELECT r.year,
        c.name AS constructor,
        SUM(res.points) AS total_points
    FROM results res
        JOIN races r ON res.race_id = r.id
        JOIN constructors c ON res.constructor_id = c.id
    WHERE r.year >= 2005
    GROUP BY r.year, c.id, c.name
    HAVING total_points > 50
    ORDER BY r.year, total_points DESC";

const CIRCUITS_RACE_COUNT_SQL: &str = "SELECT c.name AS circuit_name,
        c.location,
        c.country,
        COUNT(r.id) AS race_count
    FROM circuits c
        JOIN races r ON c.id = r.circuit_id
    GROUP BY c.id, c.name, c.location, c.country
    ORDER BY race_count DESC
    LIMIT 15";

const DRIVER_NATIONALITY_SQL: &str = "SELECT d.nationality,
        COUNT(*) AS driver_count,
        COUNT(CASE WHEN wins.wins > 0 THEN 1 END) AS winners_count
    FROM drivers d
        LEFT JOIN (
            SELECT driver_id, COUNT(*) AS wins
            FROM results
            WHERE position_order = 1
            GROUP BY driver_id
        ) wins ON d.id = wins.driver_id
    GROUP BY d.nationality
    HAVING driver_count >= 3
    ORDER BY driver_count DESC";

const SEASON_OVERVIEW_SQL: &str = "SELECT r.year,
        COUNT(DISTINCT r.id) AS total_races,
        COUNT(DISTINCT res.driver_id) AS unique_drivers,
        COUNT(DISTINCT res.constructor_id) AS unique_constructors,
        ROUND(AVG(res.points), 2) AS avg_points_per_result,
        COUNT(CASE WHEN res.position_order = 1 THEN 1 END) AS total_wins
    FROM races r
        JOIN results res ON r.id = res.race_id
    WHERE r.year >= 2000
    GROUP BY r.year
    ORDER BY r.year";

/// Drivers ranked by wins. Accepts the usual list parameters.
pub async fn top_drivers_by_wins(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<Record>>> {
    let schema = state.registry.report("top_drivers_by_wins")?;
    let spec = parse_list_params(&params)?;

    let query = QueryBuilder::custom(schema, TOP_DRIVERS_SQL)
        .computed_columns(&["number_of_wins"])
        .group_by(&["id", "full_name", "nationality", "dob", "age", "url"])
        .default_order(vec![OrderTerm::desc("number_of_wins")])
        .build(&spec)?;

    let drivers = state.store.fetch_all(query, schema).await?;
    info!("Retrieved {} top drivers", drivers.len());
    Ok(Json(drivers))
}

/// Run one of the fixed report queries
async fn fixed_report(state: &AppState, report: &str, sql: &str) -> Result<Json<Vec<Record>>> {
    let schema = state.registry.report(report)?;
    let query = QueryBuilder::custom(schema, sql)
        .without_filters()
        .build(&QuerySpec::default())?;

    let rows = state.store.fetch_all(query, schema).await?;
    info!("Report {} returned {} rows", report, rows.len());
    Ok(Json(rows))
}

pub async fn constructor_championships(State(state): State<AppState>) -> Result<Json<Vec<Record>>> {
    fixed_report(&state, "constructor_championships", CONSTRUCTOR_CHAMPIONSHIPS_SQL).await
}

pub async fn circuits_race_count(State(state): State<AppState>) -> Result<Json<Vec<Record>>> {
    fixed_report(&state, "circuits_race_count", CIRCUITS_RACE_COUNT_SQL).await
}

pub async fn driver_nationality_stats(State(state): State<AppState>) -> Result<Json<Vec<Record>>> {
    fixed_report(&state, "driver_nationality_stats", DRIVER_NATIONALITY_SQL).await
}

pub async fn season_results_overview(State(state): State<AppState>) -> Result<Json<Vec<Record>>> {
    fixed_report(&state, "season_results_overview", SEASON_OVERVIEW_SQL).await
}
